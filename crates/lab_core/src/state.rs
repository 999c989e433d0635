//! The state container.
//!
//! [`GameState`] holds every mutable value of a session. The simulation owns
//! it; everything outside the core sees either a shared reference or one of
//! the derived projections ([`Snapshot`], resource and employee readouts).

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::math::{amount, to_display, Amount};
use crate::tuning::Tuning;

/// Employee roles the lab can hire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Works on alignment and safety.
    SafetyResearchers,
    /// Pushes model capabilities.
    CapabilitiesResearchers,
    /// Builds and runs infrastructure.
    ComputeResearchers,
}

impl Role {
    /// All roles in display order.
    pub const ALL: [Role; 3] = [
        Role::SafetyResearchers,
        Role::CapabilitiesResearchers,
        Role::ComputeResearchers,
    ];

    /// Stable key used in readouts and change lists.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Role::SafetyResearchers => "safety_researchers",
            Role::CapabilitiesResearchers => "capabilities_researchers",
            Role::ComputeResearchers => "compute_researchers",
        }
    }
}

/// One-off upgrades. Once bought they stay in [`GameState::upgrades`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeId {
    /// Hardened datacenter.
    SecureDatacenter,
    /// Internal red team.
    RedTeam,
}

impl UpgradeId {
    /// Stable identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            UpgradeId::SecureDatacenter => "secure_datacenter",
            UpgradeId::RedTeam => "red_team",
        }
    }
}

impl fmt::Display for UpgradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All mutable simulation data for one session.
///
/// Fields are public for reading and for building fixtures before a
/// [`Simulation`](crate::simulation::Simulation) takes ownership. After that
/// only the simulation mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    /// Completed turns.
    pub turn: u64,
    /// Cash on hand.
    pub money: Amount,
    /// Available compute.
    pub compute: Amount,
    /// Accumulated safety progress.
    pub safety: Amount,
    /// Accumulated capabilities progress.
    pub capabilities: Amount,
    /// Head count per role.
    pub employees: BTreeMap<Role, u32>,
    /// Purchased upgrades in purchase order.
    pub upgrades: Vec<UpgradeId>,
    /// Seed fixing every randomized outcome of the session.
    pub seed: String,
    /// Set once when the lab runs out of money or compute.
    pub game_over: bool,
    /// Set once when safety reaches the victory threshold.
    pub victory: bool,
    rng: ChaCha8Rng,
}

impl GameState {
    /// Create the turn 0 state for a seed.
    #[must_use]
    pub fn new(seed: impl Into<String>, tuning: &Tuning) -> Self {
        let seed = seed.into();
        let rng = ChaCha8Rng::seed_from_u64(seed_to_u64(&seed));
        Self {
            turn: 0,
            money: amount(tuning.starting_money),
            compute: amount(tuning.starting_compute),
            safety: amount(tuning.starting_safety),
            capabilities: amount(tuning.starting_capabilities),
            employees: Role::ALL.iter().map(|&role| (role, 0)).collect(),
            upgrades: Vec::new(),
            seed,
            game_over: false,
            victory: false,
            rng,
        }
    }

    /// Head count for one role.
    #[must_use]
    pub fn employee_count(&self, role: Role) -> u32 {
        self.employees.get(&role).copied().unwrap_or(0)
    }

    /// Total head count.
    #[must_use]
    pub fn total_employees(&self) -> u32 {
        self.employees.values().sum()
    }

    /// Whether an upgrade has been bought.
    #[must_use]
    pub fn has_upgrade(&self, upgrade: UpgradeId) -> bool {
        self.upgrades.contains(&upgrade)
    }

    /// Whether play has ended, by defeat or victory.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.game_over || self.victory
    }

    pub(crate) fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// Flat `resource -> value` mapping for resource readouts.
    #[must_use]
    pub fn resource_readout(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("money".to_string(), to_display(self.money)),
            ("compute".to_string(), to_display(self.compute)),
            ("safety".to_string(), to_display(self.safety)),
            ("capabilities".to_string(), to_display(self.capabilities)),
        ])
    }

    /// Flat `role -> count` mapping for employee readouts.
    #[must_use]
    pub fn employee_readout(&self) -> BTreeMap<String, u32> {
        Role::ALL
            .iter()
            .map(|&role| (role.key().to_string(), self.employee_count(role)))
            .collect()
    }

    /// Display-ready projection of the state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            turn: self.turn,
            money: to_display(self.money),
            compute: to_display(self.compute),
            safety: to_display(self.safety),
            capabilities: to_display(self.capabilities),
            game_over: self.game_over,
            victory: self.victory,
            employees: EmployeeSummary {
                safety: self.employee_count(Role::SafetyResearchers),
                capabilities: self.employee_count(Role::CapabilitiesResearchers),
                compute: self.employee_count(Role::ComputeResearchers),
                total: self.total_employees(),
            },
            upgrades: self.upgrades.iter().map(|u| u.as_str().to_string()).collect(),
        }
    }

    /// Hash of the complete state, RNG position included.
    ///
    /// Two sessions with the same seed and the same inputs hash equal.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.turn.hash(&mut hasher);
        self.money.to_bits().hash(&mut hasher);
        self.compute.to_bits().hash(&mut hasher);
        self.safety.to_bits().hash(&mut hasher);
        self.capabilities.to_bits().hash(&mut hasher);

        // BTreeMap iterates in role order
        for (role, count) in &self.employees {
            role.hash(&mut hasher);
            count.hash(&mut hasher);
        }

        self.upgrades.hash(&mut hasher);
        self.seed.hash(&mut hasher);
        self.game_over.hash(&mut hasher);
        self.victory.hash(&mut hasher);
        self.rng.get_word_pos().hash(&mut hasher);

        hasher.finish()
    }
}

/// Head counts as shown to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmployeeSummary {
    /// Safety researchers.
    pub safety: u32,
    /// Capabilities researchers.
    pub capabilities: u32,
    /// Compute researchers.
    pub compute: u32,
    /// Sum of all roles.
    pub total: u32,
}

/// Flattened, read-only projection of [`GameState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Completed turns.
    pub turn: u64,
    /// Cash on hand.
    pub money: f64,
    /// Available compute.
    pub compute: f64,
    /// Safety progress.
    pub safety: f64,
    /// Capabilities progress.
    pub capabilities: f64,
    /// Defeat flag.
    pub game_over: bool,
    /// Victory flag.
    pub victory: bool,
    /// Head counts.
    pub employees: EmployeeSummary,
    /// Purchased upgrade identifiers.
    pub upgrades: Vec<String>,
}

/// FNV-1a over the seed bytes.
///
/// Kept independent of `std`'s hasher so a seed string maps to the same RNG
/// stream on every toolchain.
#[must_use]
pub fn seed_to_u64(seed: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    seed.bytes().fold(OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(PRIME)
    })
}
