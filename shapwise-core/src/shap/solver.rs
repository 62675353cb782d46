//! Constrained weighted least squares with subset selection.
//!
//! For a selected player set `S` with reference player `l ∈ S`, the efficiency
//! constraint `Σβ = Δ` is enforced by substitution: the free coefficients are
//! `S \ {l}` and `β_l = Δ - Σβ_free`. All quantities come straight from the
//! accumulated moments, so no design matrix is ever built.

use tracing::{debug, warn};

use super::confidence;
use super::linalg::Matrix;
use super::stats::{Moments, SufficientStats};
use crate::config::Regularizer;

/// Floor applied to residual sums before taking logarithms.
const RSS_FLOOR: f64 = 1e-300;

/// `AUTO` skips regularization once this share of the coalition space was evaluated.
pub const AUTO_COVERAGE_THRESHOLD: f64 = 0.2;

/// Link-space values anchoring one output: the baseline and the explained prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchors {
    pub fnull: f64,
    pub fx: f64,
}

impl Anchors {
    pub fn delta(&self) -> f64 {
        self.fx - self.fnull
    }
}

/// Result of fitting one selected player set.
#[derive(Debug, Clone)]
pub struct SubsetFit {
    /// Selected players; the last one is the reference player.
    pub selected: Vec<usize>,
    /// Coefficients aligned with `selected`.
    pub coefficients: Vec<f64>,
    pub weighted_rss: f64,
    pub unweighted_rss: f64,
    /// Inverse of the substituted Gram matrix of the free coefficients.
    pub gram_inverse: Option<Matrix>,
}

/// Per-player attributions and confidence widths of one output.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSolution {
    pub attributions: Vec<f64>,
    pub widths: Vec<f64>,
}

/// The constrained regression of one output.
pub struct ConstrainedProblem<'a> {
    stats: &'a SufficientStats,
    output: usize,
    fnull: f64,
    delta: f64,
}

impl<'a> ConstrainedProblem<'a> {
    pub fn new(stats: &'a SufficientStats, output: usize, anchors: Anchors) -> Self {
        Self {
            stats,
            output,
            fnull: anchors.fnull,
            delta: anchors.delta(),
        }
    }

    pub fn stats(&self) -> &SufficientStats {
        self.stats
    }

    /// `G_jk = X_jk - X_jl - X_lk + X_ll` over the free players.
    pub fn substituted_gram(
        free: &[usize],
        last: usize,
        xx: impl Fn(usize, usize) -> f64,
    ) -> Matrix {
        Matrix::from_fn(free.len(), |a, b| {
            let (j, k) = (free[a], free[b]);
            xx(j, k) - xx(j, last) - xx(last, k) + xx(last, last)
        })
    }

    fn rhs(&self, m: &Moments, free: &[usize], last: usize) -> Vec<f64> {
        let o = self.output;
        free.iter()
            .map(|&j| {
                (m.xy(o, j) - m.xy(o, last))
                    - self.fnull * (m.xx(j, j) - m.xx(last, last))
                    - self.delta * (m.xx(j, last) - m.xx(last, last))
            })
            .collect()
    }

    /// Weighted sum of squares of `y - fnull - x_l·Δ`.
    fn residual_yy(&self, m: &Moments, last: usize) -> f64 {
        let o = self.output;
        let (f, d, ll) = (self.fnull, self.delta, m.xx(last, last));
        m.yy(o) - 2.0 * f * m.y(o) - 2.0 * d * m.xy(o, last)
            + f * f * m.total()
            + 2.0 * f * d * ll
            + d * d * ll
    }

    /// Fit the constrained model on `selected` (non-empty).
    pub fn fit(&self, selected: &[usize]) -> SubsetFit {
        let Some((&last, free)) = selected.split_last() else {
            return SubsetFit {
                selected: Vec::new(),
                coefficients: Vec::new(),
                weighted_rss: f64::NAN,
                unweighted_rss: f64::NAN,
                gram_inverse: None,
            };
        };
        let weighted = self.stats.weighted();
        let unweighted = self.stats.unweighted();
        let yy_w = self.residual_yy(weighted, last);
        let yy_u = self.residual_yy(unweighted, last);

        if free.is_empty() {
            return SubsetFit {
                selected: selected.to_vec(),
                coefficients: vec![self.delta],
                weighted_rss: yy_w.max(0.0),
                unweighted_rss: yy_u.max(0.0),
                gram_inverse: None,
            };
        }

        let gram = Self::substituted_gram(free, last, |i, j| weighted.xx(i, j));
        let h = self.rhs(weighted, free, last);
        let (beta, gram) = match gram.solve(&h) {
            Some(beta) => (beta, gram),
            None => {
                let lambda = 1e-8 * (gram.trace() / gram.dim() as f64).max(f64::MIN_POSITIVE);
                warn!(
                    output = self.output,
                    players = selected.len(),
                    lambda,
                    "singular normal equations, applying ridge"
                );
                let ridged = gram.with_ridge(lambda);
                match ridged.solve(&h) {
                    Some(beta) => (beta, ridged),
                    None => (vec![f64::NAN; free.len()], ridged),
                }
            }
        };

        let fitted: f64 = beta.iter().zip(&h).map(|(b, h)| b * h).sum();
        let weighted_rss = (yy_w - fitted).max(0.0);

        let gram_u = Self::substituted_gram(free, last, |i, j| unweighted.xx(i, j));
        let h_u = self.rhs(unweighted, free, last);
        let cross: f64 = beta.iter().zip(&h_u).map(|(b, h)| b * h).sum();
        let quad: f64 = beta.iter().zip(gram_u.mul_vec(&beta)).map(|(b, g)| b * g).sum();
        let unweighted_rss = (yy_u - 2.0 * cross + quad).max(0.0);

        let mut coefficients = beta;
        let last_coefficient = self.delta - coefficients.iter().sum::<f64>();
        coefficients.push(last_coefficient);

        SubsetFit {
            selected: selected.to_vec(),
            coefficients,
            weighted_rss,
            unweighted_rss,
            gram_inverse: gram.inverse(),
        }
    }

    /// Greedy forward inclusion path of up to `limit` players.
    ///
    /// The first player minimizes the single-player residual; it then stays the
    /// reference player, and the rest are added by sweeping the substituted Gram
    /// matrix, each step taking the largest residual reduction.
    pub fn inclusion_path(&self, limit: usize) -> InclusionPath {
        let players = self.stats.players();
        let weighted = self.stats.weighted();
        let limit = limit.min(players);
        let mut path = InclusionPath::default();
        if limit == 0 {
            return path;
        }

        let Some(first) = (0..players).min_by(|&a, &b| {
            self.residual_yy(weighted, a)
                .total_cmp(&self.residual_yy(weighted, b))
        }) else {
            return path;
        };
        let mut rss = self.residual_yy(weighted, first);
        path.push(first, rss);

        let candidates: Vec<usize> = (0..players).filter(|&p| p != first).collect();
        let mut gram = Self::substituted_gram(&candidates, first, |i, j| weighted.xx(i, j));
        let mut r = self.rhs(weighted, &candidates, first);
        let scale = (0..candidates.len())
            .map(|i| gram[(i, i)].abs())
            .fold(0.0_f64, f64::max);
        let tolerance = 1e-12 * scale.max(f64::MIN_POSITIVE);
        let mut active = vec![true; candidates.len()];

        while path.len() < limit {
            let mut best: Option<(usize, f64)> = None;
            for a in (0..candidates.len()).filter(|&a| active[a]) {
                let pivot = gram[(a, a)];
                if pivot > tolerance {
                    let gain = r[a] * r[a] / pivot;
                    if best.is_none_or(|(_, g)| gain > g) {
                        best = Some((a, gain));
                    }
                }
            }
            let Some((a, gain)) = best else {
                // Remaining players add nothing the path does not already span.
                for i in (0..candidates.len()).filter(|&i| active[i]) {
                    if path.len() == limit {
                        break;
                    }
                    path.push(candidates[i], rss);
                }
                break;
            };

            rss -= gain;
            let pivot = gram[(a, a)];
            let column: Vec<f64> = (0..candidates.len()).map(|i| gram[(i, a)]).collect();
            let ra = r[a];
            for i in (0..candidates.len()).filter(|&i| active[i]) {
                let factor = column[i] / pivot;
                for j in (0..candidates.len()).filter(|&j| active[j]) {
                    gram[(i, j)] -= factor * column[j];
                }
                r[i] -= factor * ra;
            }
            active[a] = false;
            path.push(candidates[a], rss);
        }
        path
    }
}

/// Players in inclusion order with the weighted residual after each step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InclusionPath {
    pub order: Vec<usize>,
    pub rss: Vec<f64>,
}

impl InclusionPath {
    fn push(&mut self, player: usize, rss: f64) {
        self.order.push(player);
        self.rss.push(rss.max(0.0));
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Selection size minimizing `n·ln(RSS/n) + penalty(k)`.
    fn best_size(&self, n: f64, penalty: impl Fn(f64) -> f64) -> usize {
        (1..=self.len())
            .min_by(|&a, &b| {
                self.criterion(a, n, &penalty)
                    .total_cmp(&self.criterion(b, n, &penalty))
            })
            .unwrap_or(1)
    }

    fn criterion(&self, k: usize, n: f64, penalty: &impl Fn(f64) -> f64) -> f64 {
        let rss = self.rss[k - 1].max(RSS_FLOOR);
        n * (rss / n).ln() + penalty(k as f64)
    }

    fn aicc(&self, k: usize, n: f64) -> f64 {
        let k_f = k as f64;
        let correction = if n - k_f - 1.0 > 0.0 {
            2.0 * k_f * (k_f + 1.0) / (n - k_f - 1.0)
        } else {
            f64::INFINITY
        };
        self.criterion(k, n, &|k| 2.0 * k) + correction
    }

    fn prefix(&self, k: usize) -> Vec<usize> {
        let mut selected = self.order[..k.min(self.len())].to_vec();
        selected.sort_unstable();
        selected
    }
}

/// Players kept non-zero under `regularizer`.
pub fn select_players(
    problem: &ConstrainedProblem<'_>,
    regularizer: Regularizer,
    coverage: f64,
) -> Vec<usize> {
    let players = problem.stats().players();
    let everyone: Vec<usize> = (0..players).collect();
    let n = problem.stats().rows() as f64;

    match regularizer {
        Regularizer::None => everyone,
        Regularizer::TopK(k) => {
            let k = k.clamp(1, players.max(1));
            problem.inclusion_path(k).prefix(k)
        }
        Regularizer::Aic => {
            let path = problem.inclusion_path(players);
            path.prefix(path.best_size(n, |k| 2.0 * k))
        }
        Regularizer::Bic => {
            let path = problem.inclusion_path(players);
            path.prefix(path.best_size(n, |k| k * n.ln()))
        }
        Regularizer::Auto => {
            if coverage >= AUTO_COVERAGE_THRESHOLD {
                return everyone;
            }
            let path = problem.inclusion_path(players);
            let candidates = [
                path.best_size(n, |k| 2.0 * k),
                path.best_size(n, |k| k * n.ln()),
                players.div_ceil(2).max(1),
            ];
            let chosen = candidates
                .into_iter()
                .min_by(|&a, &b| path.aicc(a, n).total_cmp(&path.aicc(b, n)))
                .unwrap_or(players);
            debug!(?candidates, chosen, coverage, "auto regularization");
            path.prefix(chosen)
        }
    }
}

/// Attributions and widths of every player for one output.
pub fn solve_output(
    stats: &SufficientStats,
    output: usize,
    anchors: Anchors,
    regularizer: Regularizer,
    coverage: f64,
    confidence_level: f64,
) -> OutputSolution {
    let players = stats.players();
    if players == 0 {
        return OutputSolution {
            attributions: Vec::new(),
            widths: Vec::new(),
        };
    }
    if !anchors.delta().is_finite() || !stats.is_finite(output) {
        debug!(output, ?anchors, "non-finite link values, attributions are NaN");
        return OutputSolution {
            attributions: vec![f64::NAN; players],
            widths: vec![f64::NAN; players],
        };
    }
    if players == 1 {
        return OutputSolution {
            attributions: vec![anchors.delta()],
            widths: vec![0.0],
        };
    }

    let problem = ConstrainedProblem::new(stats, output, anchors);
    let selected = select_players(&problem, regularizer, coverage);
    let fit = problem.fit(&selected);
    let widths = confidence::widths(&problem, &fit, confidence_level);

    let mut solution = OutputSolution {
        attributions: vec![0.0; players],
        widths: vec![0.0; players],
    };
    for (i, &player) in fit.selected.iter().enumerate() {
        solution.attributions[player] = fit.coefficients[i];
        solution.widths[player] = widths[i];
    }
    solution
}
