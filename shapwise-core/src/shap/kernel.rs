//! Binomial coefficients and the Shapley kernel.

/// `C(n, k)` in floating point. Saturates to `inf` for astronomically large values.
pub fn binomial_f64(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    let mut result = 1.0_f64;
    for i in 1..=k {
        result *= (n - k + i) as f64 / i as f64;
    }
    result.round()
}

/// `C(n, k)` exactly, or `None` when it does not fit in a `u128`.
pub fn binomial_u128(n: usize, k: usize) -> Option<u128> {
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k);
    let mut result: u128 = 1;
    for i in 1..=k {
        // result * (n - k + i) is divisible by i at every step
        result = result.checked_mul((n - k + i) as u128)? / i as u128;
    }
    Some(result)
}

/// Number of non-trivial coalitions `2^m - 2`, or `None` past `u128`.
pub fn coalition_space(m: usize) -> Option<u128> {
    if m == 0 {
        return Some(0);
    }
    if m >= 128 {
        return None;
    }
    Some((1u128 << m) - 2)
}

/// Shapley kernel weight of one coalition of size `k` among `m` players:
/// `(m - 1) / (C(m, k) * k * (m - k))`. The empty and full coalitions get an
/// infinite weight; they anchor the fit instead of entering it.
pub fn kernel_weight(m: usize, k: usize) -> f64 {
    if k == 0 || k >= m {
        return f64::INFINITY;
    }
    (m - 1) as f64 / (binomial_f64(m, k) * k as f64 * (m - k) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binomials() {
        assert_eq!(binomial_f64(5, 2), 10.0);
        assert_eq!(binomial_u128(5, 2), Some(10));
        assert_eq!(binomial_u128(50, 25), Some(126_410_606_437_752));
        assert_eq!(binomial_u128(3, 5), Some(0));
        assert!(binomial_u128(300, 150).is_none());
        assert!(binomial_f64(300, 150).is_finite());
    }

    #[test]
    fn test_coalition_space() {
        assert_eq!(coalition_space(1), Some(0));
        assert_eq!(coalition_space(5), Some(30));
        assert!(coalition_space(200).is_none());
    }

    #[test]
    fn test_kernel_weight_is_symmetric() {
        for m in 2..12 {
            for k in 1..m {
                let a = kernel_weight(m, k);
                let b = kernel_weight(m, m - k);
                assert!((a - b).abs() < 1e-15, "m={m} k={k}");
            }
        }
        assert_eq!(kernel_weight(5, 1), 4.0 / (5.0 * 4.0));
        assert!(kernel_weight(5, 0).is_infinite());
        assert!(kernel_weight(5, 5).is_infinite());
    }
}
