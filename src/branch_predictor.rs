//! Branch predictors attached to a performance model.
//!
//! The timing core only needs a predictor to keep its own statistics and
//! report them in the core summary.

use serde::{Deserialize, Serialize};
use std::io::{self, Write};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchPredictorStats {
    pub predictions: u64,
    pub correct: u64,
    pub incorrect: u64,
}

pub trait BranchPredictor: Send {
    /// Predicts whether the branch at `address` is taken.
    fn predict(&self, address: u64) -> bool;

    /// Records the actual outcome of the branch at `address`.
    fn update(&mut self, address: u64, prediction: bool, actual: bool);

    fn stats(&self) -> BranchPredictorStats;

    fn output_summary(&self, out: &mut dyn Write) -> io::Result<()> {
        let stats = self.stats();
        writeln!(out, "  Branch Predictor Statistics:")?;
        writeln!(out, "    Num Correct: {}", stats.correct)?;
        writeln!(out, "    Num Incorrect: {}", stats.incorrect)
    }
}

/// Table of one-bit "last outcome" entries indexed by branch address.
#[derive(Debug, Clone)]
pub struct OneBitBranchPredictor {
    bits: Vec<bool>,
    stats: BranchPredictorStats,
}

impl OneBitBranchPredictor {
    /// Creates a predictor with `size` entries (at least one).
    pub fn new(size: usize) -> Self {
        Self {
            bits: vec![false; size.max(1)],
            stats: BranchPredictorStats::default(),
        }
    }

    fn index(&self, address: u64) -> usize {
        (address % self.bits.len() as u64) as usize
    }
}

impl Default for OneBitBranchPredictor {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl BranchPredictor for OneBitBranchPredictor {
    fn predict(&self, address: u64) -> bool {
        self.bits[self.index(address)]
    }

    fn update(&mut self, address: u64, prediction: bool, actual: bool) {
        self.stats.predictions += 1;
        if prediction == actual {
            self.stats.correct += 1;
        } else {
            self.stats.incorrect += 1;
        }
        let index = self.index(address);
        self.bits[index] = actual;
    }

    fn stats(&self) -> BranchPredictorStats {
        self.stats
    }
}
