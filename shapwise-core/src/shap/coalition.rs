//! Coalition masks over the players of a game.

use std::fmt;

/// A subset of players. `true` marks a present player.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coalition {
    mask: Vec<bool>,
}

impl Coalition {
    pub fn from_mask(mask: Vec<bool>) -> Self {
        Self { mask }
    }

    /// Coalition of `players` players with exactly `present` set.
    pub fn from_indices(players: usize, present: &[usize]) -> Self {
        let mut mask = vec![false; players];
        for &i in present {
            mask[i] = true;
        }
        Self { mask }
    }

    pub fn players(&self) -> usize {
        self.mask.len()
    }

    pub fn size(&self) -> usize {
        self.mask.iter().filter(|present| **present).count()
    }

    pub fn contains(&self, player: usize) -> bool {
        self.mask.get(player).copied().unwrap_or(false)
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// Indices of present players, ascending.
    pub fn present(&self) -> Vec<usize> {
        self.mask
            .iter()
            .enumerate()
            .filter(|(_, present)| **present)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn complement(&self) -> Self {
        Self {
            mask: self.mask.iter().map(|present| !present).collect(),
        }
    }
}

impl fmt::Display for Coalition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for present in &self.mask {
            f.write_str(if *present { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// A coalition and its regression weight.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledCoalition {
    pub coalition: Coalition,
    pub weight: f64,
}

impl SampledCoalition {
    pub fn new(coalition: Coalition, weight: f64) -> Self {
        Self { coalition, weight }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coalition_basics() {
        let c = Coalition::from_indices(5, &[0, 3]);
        assert_eq!(c.size(), 2);
        assert_eq!(c.present(), vec![0, 3]);
        assert!(c.contains(3));
        assert!(!c.contains(7));
        assert_eq!(c.to_string(), "10010");
        assert_eq!(c.complement().present(), vec![1, 2, 4]);
        assert_eq!(c.complement().complement(), c);
    }
}
