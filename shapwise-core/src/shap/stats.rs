//! Sufficient statistics of the coalition regression.
//!
//! Design rows are folded in as they arrive and never stored. Rows are added
//! in coalition order regardless of how they were batched, so the sums are
//! bit-identical for any batch layout.

use super::coalition::Coalition;

/// `Σw·x·xᵀ`, `Σw·x·y`, `Σw`, `Σw·y` and `Σw·y²` over binary design rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Moments {
    players: usize,
    xx: Vec<f64>,
    xy: Vec<Vec<f64>>,
    total: f64,
    y: Vec<f64>,
    yy: Vec<f64>,
}

impl Moments {
    fn new(players: usize, outputs: usize) -> Self {
        Self {
            players,
            xx: vec![0.0; players * players],
            xy: vec![vec![0.0; players]; outputs],
            total: 0.0,
            y: vec![0.0; outputs],
            yy: vec![0.0; outputs],
        }
    }

    fn add(&mut self, present: &[usize], weight: f64, ys: &[f64]) {
        for &i in present {
            for &j in present {
                self.xx[i * self.players + j] += weight;
            }
        }
        for (o, &y) in ys.iter().enumerate() {
            for &i in present {
                self.xy[o][i] += weight * y;
            }
            self.y[o] += weight * y;
            self.yy[o] += weight * y * y;
        }
        self.total += weight;
    }

    pub fn xx(&self, i: usize, j: usize) -> f64 {
        self.xx[i * self.players + j]
    }

    pub fn xy(&self, output: usize, i: usize) -> f64 {
        self.xy[output][i]
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn y(&self, output: usize) -> f64 {
        self.y[output]
    }

    pub fn yy(&self, output: usize) -> f64 {
        self.yy[output]
    }

    fn is_finite(&self, output: usize) -> bool {
        self.y[output].is_finite()
            && self.yy[output].is_finite()
            && self.xy[output].iter().all(|v| v.is_finite())
    }
}

/// Kernel-weighted and unweighted moments plus `Σw²·x·xᵀ`, enough for the
/// constrained fit, its residuals and the sandwich covariance.
#[derive(Debug, Clone, PartialEq)]
pub struct SufficientStats {
    players: usize,
    outputs: usize,
    rows: usize,
    weighted: Moments,
    unweighted: Moments,
    weighted_sq: Vec<f64>,
}

impl SufficientStats {
    pub fn new(players: usize, outputs: usize) -> Self {
        Self {
            players,
            outputs,
            rows: 0,
            weighted: Moments::new(players, outputs),
            unweighted: Moments::new(players, outputs),
            weighted_sq: vec![0.0; players * players],
        }
    }

    /// Fold one design row: a coalition, its kernel weight and the link-space
    /// value of every output.
    pub fn add_row(&mut self, coalition: &Coalition, weight: f64, ys: &[f64]) {
        debug_assert_eq!(ys.len(), self.outputs);
        let present = coalition.present();
        self.weighted.add(&present, weight, ys);
        self.unweighted.add(&present, 1.0, ys);
        let w2 = weight * weight;
        for &i in &present {
            for &j in &present {
                self.weighted_sq[i * self.players + j] += w2;
            }
        }
        self.rows += 1;
    }

    pub fn players(&self) -> usize {
        self.players
    }

    pub fn outputs(&self) -> usize {
        self.outputs
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn weighted(&self) -> &Moments {
        &self.weighted
    }

    pub fn unweighted(&self) -> &Moments {
        &self.unweighted
    }

    pub fn weighted_sq_xx(&self, i: usize, j: usize) -> f64 {
        self.weighted_sq[i * self.players + j]
    }

    /// False when any output-dependent sum for `output` overflowed or saw a `NaN`.
    pub fn is_finite(&self, output: usize) -> bool {
        self.weighted.is_finite(output) && self.unweighted.is_finite(output)
    }
}
