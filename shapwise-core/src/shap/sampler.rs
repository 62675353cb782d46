//! Coalition sampling.
//!
//! Small games are enumerated exhaustively with exact kernel weights. Larger
//! games follow the Kernel SHAP sampling plan: whole coalition sizes are
//! enumerated from the outside in (size `k` paired with `M - k`) while the
//! budget still covers them, and the remaining budget is spent on weighted
//! random draws over the sizes left over.

use std::collections::HashMap;

use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::index;
use tracing::{debug, warn};

use super::coalition::{Coalition, SampledCoalition};
use super::kernel::{binomial_f64, binomial_u128, coalition_space, kernel_weight};

/// Coalitions chosen for one explanation.
#[derive(Debug, Clone, PartialEq)]
pub struct CoalitionPlan {
    pub coalitions: Vec<SampledCoalition>,
    /// Every non-trivial coalition is present with its exact kernel weight.
    pub exhaustive: bool,
    /// Fraction of the `2^M - 2` coalition space covered by the plan.
    pub coverage: f64,
}

impl CoalitionPlan {
    pub fn len(&self) -> usize {
        self.coalitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coalitions.is_empty()
    }
}

/// Upper bound on coalitions in one plan, whatever budget is requested.
pub const MAX_SAMPLES: usize = 1 << 18;

#[derive(Debug, Clone, Copy)]
pub struct CoalitionSampler {
    players: usize,
    n_samples: usize,
}

impl CoalitionSampler {
    /// Budgets above [`MAX_SAMPLES`] are clamped to it.
    pub fn new(players: usize, n_samples: usize) -> Self {
        if n_samples > MAX_SAMPLES {
            warn!(
                requested = n_samples,
                limit = MAX_SAMPLES,
                "sample budget too large, clamping"
            );
        }
        Self {
            players,
            n_samples: n_samples.min(MAX_SAMPLES),
        }
    }

    /// Effective budget after clamping.
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Sample budget used when none is configured.
    pub fn default_samples(players: usize) -> usize {
        2 * players + 2048
    }

    pub fn plan<R: Rng + ?Sized>(&self, rng: &mut R) -> CoalitionPlan {
        let m = self.players;
        if m < 2 {
            return CoalitionPlan {
                coalitions: Vec::new(),
                exhaustive: true,
                coverage: 1.0,
            };
        }

        let space = coalition_space(m);
        let plan = match space {
            Some(space) if space <= self.n_samples as u128 => self.enumerate_all(),
            _ => self.sample(rng, space),
        };
        debug!(
            players = m,
            coalitions = plan.len(),
            exhaustive = plan.exhaustive,
            coverage = plan.coverage,
            "coalition plan ready"
        );
        plan
    }

    fn enumerate_all(&self) -> CoalitionPlan {
        let m = self.players;
        let mut coalitions = Vec::new();
        for size in 1..m {
            let weight = kernel_weight(m, size);
            for_each_combination(m, size, |present| {
                coalitions.push(SampledCoalition::new(
                    Coalition::from_indices(m, present),
                    weight,
                ));
            });
        }
        CoalitionPlan {
            coalitions,
            exhaustive: true,
            coverage: 1.0,
        }
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R, space: Option<u128>) -> CoalitionPlan {
        let m = self.players;
        let num_sizes = m / 2;
        let num_paired = (m - 1) / 2;

        // Kernel mass per size, with paired sizes counting both halves.
        let mut size_weights: Vec<f64> = (1..=num_sizes)
            .map(|s| (m - 1) as f64 / (s * (m - s)) as f64)
            .collect();
        for w in size_weights.iter_mut().take(num_paired) {
            *w *= 2.0;
        }
        let total: f64 = size_weights.iter().sum();
        for w in size_weights.iter_mut() {
            *w /= total;
        }

        let mut coalitions = Vec::new();
        let mut remaining = size_weights.clone();
        let mut budget = self.n_samples as f64;
        let mut full_sizes = 0;

        for (i, &weight) in size_weights.iter().enumerate() {
            let size = i + 1;
            let paired = i < num_paired;
            let per_size = binomial_f64(m, size);
            let count = if paired { 2.0 * per_size } else { per_size };
            if budget * remaining[i] / count < 1.0 - 1e-8 {
                break;
            }
            full_sizes += 1;
            budget -= count;
            if remaining[i] < 1.0 {
                let scale = 1.0 - remaining[i];
                for r in remaining.iter_mut() {
                    *r /= scale;
                }
            }

            let each = weight / count;
            for_each_combination(m, size, |present| {
                let coalition = Coalition::from_indices(m, present);
                let complement = paired.then(|| coalition.complement());
                coalitions.push(SampledCoalition::new(coalition, each));
                if let Some(complement) = complement {
                    coalitions.push(SampledCoalition::new(complement, each));
                }
            });
        }

        let fixed = coalitions.len();
        let target = self.n_samples.saturating_sub(fixed);
        if full_sizes < num_sizes && target > 0 {
            let weight_left: f64 = size_weights[full_sizes..].iter().sum();
            match WeightedIndex::new(&remaining[full_sizes..]) {
                Ok(size_dist) => {
                    self.draw_random(
                        rng,
                        &size_dist,
                        full_sizes,
                        num_paired,
                        target,
                        &mut coalitions,
                    );
                    let drawn: f64 = coalitions[fixed..].iter().map(|c| c.weight).sum();
                    if drawn > 0.0 {
                        let scale = weight_left / drawn;
                        for c in coalitions[fixed..].iter_mut() {
                            c.weight *= scale;
                        }
                    }
                }
                Err(e) => warn!(error = %e, "cannot sample remaining coalition sizes"),
            }
        }

        let coverage = match space {
            Some(space) if space > 0 => coalitions.len() as f64 / space as f64,
            _ => 0.0,
        };
        CoalitionPlan {
            coalitions,
            exhaustive: false,
            coverage,
        }
    }

    fn draw_random<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        size_dist: &WeightedIndex<f64>,
        size_offset: usize,
        num_paired: usize,
        target: usize,
        coalitions: &mut Vec<SampledCoalition>,
    ) {
        let m = self.players;
        let start = coalitions.len();
        let mut seen: HashMap<Coalition, usize> = HashMap::new();
        let max_attempts = target.saturating_mul(16).saturating_add(1024);
        let mut attempts = 0;

        while coalitions.len() - start < target && attempts < max_attempts {
            attempts += 1;
            let i = size_offset + size_dist.sample(rng);
            let paired = i < num_paired;
            let coalition = random_coalition(m, i + 1, rng);

            if let Some(&at) = seen.get(&coalition) {
                coalitions[at].weight += 1.0;
                if paired {
                    if let Some(&at) = seen.get(&coalition.complement()) {
                        coalitions[at].weight += 1.0;
                    }
                }
                continue;
            }

            let complement = paired.then(|| coalition.complement());
            seen.insert(coalition.clone(), coalitions.len());
            coalitions.push(SampledCoalition::new(coalition, 1.0));
            if let Some(complement) = complement {
                if coalitions.len() - start < target {
                    seen.insert(complement.clone(), coalitions.len());
                    coalitions.push(SampledCoalition::new(complement, 1.0));
                }
            }
        }

        if coalitions.len() - start < target {
            warn!(
                requested = target,
                drawn = coalitions.len() - start,
                attempts,
                "coalition sampling stopped early, continuing with fewer coalitions"
            );
        }
    }
}

/// A uniformly random coalition of `size` players among `m`.
///
/// Draws a rank in `[0, C(m, size))` and unranks it; when `C(m, size)` does not
/// fit a `u128` it samples the member indices directly instead.
pub fn random_coalition<R: Rng + ?Sized>(m: usize, size: usize, rng: &mut R) -> Coalition {
    match binomial_u128(m, size) {
        Some(total) if total > 0 => {
            let rank = rng.gen_range(0..total);
            Coalition::from_indices(m, &unrank_combination(m, size, rank))
        }
        _ => Coalition::from_indices(m, &index::sample(rng, m, size).into_vec()),
    }
}

/// The `rank`-th `k`-subset of `0..m` in lexicographic order.
pub fn unrank_combination(m: usize, k: usize, mut rank: u128) -> Vec<usize> {
    let mut chosen = Vec::with_capacity(k);
    let mut next = 0;
    while chosen.len() < k && next < m {
        let rest = k - chosen.len() - 1;
        let with_next = binomial_u128(m - next - 1, rest).unwrap_or(u128::MAX);
        if rank < with_next {
            chosen.push(next);
        } else {
            rank -= with_next;
        }
        next += 1;
    }
    chosen
}

/// Calls `f` with every `k`-subset of `0..m`, in lexicographic order.
pub fn for_each_combination(m: usize, k: usize, mut f: impl FnMut(&[usize])) {
    if k > m {
        return;
    }
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        f(&idx);
        let mut i = k;
        loop {
            if i == 0 {
                return;
            }
            i -= 1;
            if idx[i] < m - k + i {
                break;
            }
        }
        idx[i] += 1;
        for j in i + 1..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
}
