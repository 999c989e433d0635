//! Balance tuning loaded from RON.
//!
//! Every number here is data: starting resources, the per-turn burn rates
//! and the thresholds that trigger events and terminal conditions. Values are
//! whole numbers in the file and become [`Amount`]s inside the simulation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{amount, Amount};

/// Balance values for one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Money at turn 0.
    pub starting_money: i64,
    /// Compute at turn 0.
    pub starting_compute: i64,
    /// Safety at turn 0.
    pub starting_safety: i64,
    /// Capabilities at turn 0.
    pub starting_capabilities: i64,
    /// Compute consumed at every turn end.
    pub compute_burn: i64,
    /// Money paid per employee at every turn end.
    pub maintenance_per_head: i64,
    /// Safety level at which the lab wins.
    pub victory_safety: i64,
    /// Turn on which the funding crisis can fire.
    pub funding_crisis_turn: u64,
    /// The funding crisis fires when money is below this.
    pub funding_crisis_threshold: i64,
    /// The compute shortage fires when compute is below this.
    pub compute_shortage_threshold: i64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            starting_money: 100_000,
            starting_compute: 100,
            starting_safety: 0,
            starting_capabilities: 0,
            compute_burn: 5,
            maintenance_per_head: 1_000,
            victory_safety: 100,
            funding_crisis_turn: 10,
            funding_crisis_threshold: 50_000,
            compute_shortage_threshold: 20,
        }
    }
}

impl Tuning {
    /// Load tuning from a RON file.
    ///
    /// # Errors
    /// Returns [`GameError::TuningLoad`] if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| GameError::TuningLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&contents, &path.display().to_string())
    }

    /// Load tuning from a RON string (useful for embedded presets).
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        Self::parse(ron, "<inline>")
    }

    fn parse(contents: &str, origin: &str) -> Result<Self> {
        ron::from_str(contents).map_err(|e| GameError::TuningLoad {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    /// Compute burned per turn.
    #[must_use]
    pub fn compute_burn(&self) -> Amount {
        amount(self.compute_burn)
    }

    /// Upkeep per employee per turn.
    #[must_use]
    pub fn maintenance_per_head(&self) -> Amount {
        amount(self.maintenance_per_head)
    }

    /// Safety needed to win.
    #[must_use]
    pub fn victory_safety(&self) -> Amount {
        amount(self.victory_safety)
    }
}
