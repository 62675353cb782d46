//! Confidence half-widths of the constrained coefficients.
//!
//! Covariance is the homoscedastic sandwich `σ²·G⁻¹(X'ᵀW²X')G⁻¹` of the
//! substituted regression, with `σ²` estimated from unweighted residuals. The
//! reference coefficient is `Δ - Σβ_free`, so its variance is the sum of every
//! covariance entry.

use super::solver::{ConstrainedProblem, SubsetFit};

/// Half-widths aligned with `fit.selected`.
pub fn widths(problem: &ConstrainedProblem<'_>, fit: &SubsetFit, level: f64) -> Vec<f64> {
    let k = fit.selected.len();
    let Some((&last, free)) = fit.selected.split_last() else {
        return Vec::new();
    };
    if free.is_empty() {
        return vec![0.0; k];
    }

    let df = problem.stats().rows() as f64 - free.len() as f64;
    if df <= 0.0 {
        return vec![0.0; k];
    }
    let Some(gram_inverse) = fit.gram_inverse.as_ref() else {
        return vec![f64::NAN; k];
    };

    let stats = problem.stats();
    let meat = ConstrainedProblem::substituted_gram(free, last, |i, j| stats.weighted_sq_xx(i, j));
    let covariance = gram_inverse.mul(&meat).mul(gram_inverse);
    let sigma2 = fit.unweighted_rss / df;
    let critical = student_t_quantile((1.0 + level) / 2.0, df);

    let n = free.len();
    let mut widths: Vec<f64> = (0..n)
        .map(|i| critical * (sigma2 * covariance[(i, i)]).max(0.0).sqrt())
        .collect();
    let total: f64 = (0..n)
        .flat_map(|i| (0..n).map(move |j| (i, j)))
        .map(|(i, j)| covariance[(i, j)])
        .sum();
    widths.push(critical * (sigma2 * total).max(0.0).sqrt());
    widths
}

/// Natural log of the gamma function (Lanczos, g = 7).
pub fn ln_gamma(x: f64) -> f64 {
    const COEFFICIENTS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let mut sum = COEFFICIENTS[0];
    for (i, c) in COEFFICIENTS.iter().enumerate().skip(1) {
        sum += c / (x + i as f64);
    }
    let t = x + 7.5;
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + sum.ln()
}

/// Continued fraction of the incomplete beta function (modified Lentz).
fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITERATIONS: usize = 500;
    const EPSILON: f64 = 1e-15;
    const TINY: f64 = 1e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITERATIONS {
        let m = m as f64;
        let m2 = 2.0 * m;
        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < EPSILON {
            break;
        }
    }
    h
}

/// Regularized incomplete beta function `I_x(a, b)`.
pub fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let front = (ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln()).exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

/// CDF of Student's t distribution with `df` degrees of freedom.
pub fn student_t_cdf(t: f64, df: f64) -> f64 {
    let t2 = t * t;
    let central_share = t2 / (df + t2);
    if central_share < 0.5 {
        // near zero, integrate the central part to keep precision
        let central = 0.5 * regularized_incomplete_beta(0.5, df / 2.0, central_share);
        return if t > 0.0 { 0.5 + central } else { 0.5 - central };
    }
    let tail = 0.5 * regularized_incomplete_beta(df / 2.0, 0.5, df / (df + t2));
    if t > 0.0 { 1.0 - tail } else { tail }
}

/// Quantile of Student's t distribution, by bisection on the CDF.
pub fn student_t_quantile(p: f64, df: f64) -> f64 {
    if p.is_nan() || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let mut hi = 1.0_f64;
    while student_t_cdf(hi, df) < p && hi < 1e12 {
        hi *= 2.0;
    }
    let mut lo = -1.0_f64;
    while student_t_cdf(lo, df) > p && lo > -1e12 {
        lo *= 2.0;
    }
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if student_t_cdf(mid, df) < p {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1e-12 * hi.abs().max(1.0) {
            break;
        }
    }
    0.5 * (lo + hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ln_gamma() {
        assert!((ln_gamma(1.0)).abs() < 1e-12);
        assert!((ln_gamma(5.0) - 24.0_f64.ln()).abs() < 1e-12);
        assert!((ln_gamma(0.5) - std::f64::consts::PI.sqrt().ln()).abs() < 1e-12);
    }

    #[test]
    fn test_student_t_quantiles() {
        let cases = [
            (0.975, 1.0, 12.706_204_736),
            (0.975, 10.0, 2.228_138_852),
            (0.995, 5.0, 4.032_142_984),
            (0.95, 30.0, 1.697_260_887),
            (0.975, 1e6, 1.959_966_3),
        ];
        for (p, df, expected) in cases {
            let q = student_t_quantile(p, df);
            assert!((q - expected).abs() < 1e-5, "t({p}, {df}) = {q}");
        }
        assert!((student_t_quantile(0.5, 7.0)).abs() < 1e-9);
        assert!((student_t_quantile(0.025, 10.0) + 2.228_138_852).abs() < 1e-5);
    }

    #[test]
    fn test_incomplete_beta_symmetry() {
        let a = regularized_incomplete_beta(2.5, 3.0, 0.3);
        let b = regularized_incomplete_beta(3.0, 2.5, 0.7);
        assert!((a + b - 1.0).abs() < 1e-12);
    }
}
