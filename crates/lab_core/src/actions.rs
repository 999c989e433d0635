//! Player actions.
//!
//! Actions form a closed set ([`ActionKind`]). Wire-level string ids are
//! resolved through an [`ActionTable`] built once per simulation; an id
//! missing from the table takes the "unknown action" failure path.
//!
//! Applying an action is split in two steps so that failures never mutate:
//! [`check`] validates every precondition against a shared reference, then
//! [`apply`] performs all effects at once.

use std::collections::{BTreeMap, HashMap};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{amount, format_money, to_display, Amount};
use crate::state::{GameState, Role, UpgradeId};

/// Lower bound of a fundraising round.
pub const FUNDRAISE_MIN: i64 = 15_000;

/// Upper bound (inclusive) of a fundraising round.
pub const FUNDRAISE_MAX: i64 = 45_000;

/// Every action a player can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Hire one safety researcher.
    HireSafetyResearcher,
    /// Hire one capabilities researcher.
    HireCapabilitiesResearcher,
    /// Hire one compute researcher.
    HireComputeResearcher,
    /// Buy a block of compute.
    BuyCompute,
    /// Fund a safety research sprint.
    SafetyResearch,
    /// Raise money from investors. The amount is drawn from the session RNG.
    Fundraise,
    /// Buy the secure datacenter upgrade.
    UpgradeSecureDatacenter,
    /// Buy the red team upgrade.
    UpgradeRedTeam,
}

impl ActionKind {
    /// All actions in catalog order.
    pub const ALL: [ActionKind; 8] = [
        ActionKind::HireSafetyResearcher,
        ActionKind::HireCapabilitiesResearcher,
        ActionKind::HireComputeResearcher,
        ActionKind::BuyCompute,
        ActionKind::SafetyResearch,
        ActionKind::Fundraise,
        ActionKind::UpgradeSecureDatacenter,
        ActionKind::UpgradeRedTeam,
    ];

    /// Wire identifier.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            ActionKind::HireSafetyResearcher => "hire_safety_researcher",
            ActionKind::HireCapabilitiesResearcher => "hire_capabilities_researcher",
            ActionKind::HireComputeResearcher => "hire_compute_researcher",
            ActionKind::BuyCompute => "buy_compute",
            ActionKind::SafetyResearch => "safety_research",
            ActionKind::Fundraise => "fundraise",
            ActionKind::UpgradeSecureDatacenter => "upgrade_secure_datacenter",
            ActionKind::UpgradeRedTeam => "upgrade_red_team",
        }
    }

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ActionKind::HireSafetyResearcher => "Hire Safety Researcher",
            ActionKind::HireCapabilitiesResearcher => "Hire Capabilities Researcher",
            ActionKind::HireComputeResearcher => "Hire Compute Researcher",
            ActionKind::BuyCompute => "Buy Compute",
            ActionKind::SafetyResearch => "Safety Research Sprint",
            ActionKind::Fundraise => "Fundraise",
            ActionKind::UpgradeSecureDatacenter => "Secure Datacenter",
            ActionKind::UpgradeRedTeam => "Red Team",
        }
    }

    /// Money cost, whole dollars.
    #[must_use]
    pub const fn cost(self) -> i64 {
        match self {
            ActionKind::HireSafetyResearcher => 50_000,
            ActionKind::HireCapabilitiesResearcher => 50_000,
            ActionKind::HireComputeResearcher => 40_000,
            ActionKind::BuyCompute => 25_000,
            ActionKind::SafetyResearch => 15_000,
            ActionKind::Fundraise => 0,
            ActionKind::UpgradeSecureDatacenter => 80_000,
            ActionKind::UpgradeRedTeam => 60_000,
        }
    }

    /// Upgrade granted by this action, if it is a one-off purchase.
    #[must_use]
    pub const fn upgrade(self) -> Option<UpgradeId> {
        match self {
            ActionKind::UpgradeSecureDatacenter => Some(UpgradeId::SecureDatacenter),
            ActionKind::UpgradeRedTeam => Some(UpgradeId::RedTeam),
            _ => None,
        }
    }

    /// Sound requested when the action succeeds.
    #[must_use]
    pub fn sound_id(self) -> String {
        format!("action_{}", self.id())
    }
}

/// Lookup table from wire id to [`ActionKind`].
#[derive(Debug, Clone)]
pub struct ActionTable {
    by_id: HashMap<&'static str, ActionKind>,
}

impl ActionTable {
    /// Build the table from [`ActionKind::ALL`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_id: ActionKind::ALL.iter().map(|&kind| (kind.id(), kind)).collect(),
        }
    }

    /// Resolve an id.
    #[must_use]
    pub fn lookup(&self, id: &str) -> Option<ActionKind> {
        self.by_id.get(id).copied()
    }

    /// Resolve an id, failing with [`GameError::UnknownAction`].
    pub fn resolve(&self, id: &str) -> Result<ActionKind> {
        self.lookup(id)
            .ok_or_else(|| GameError::UnknownAction(id.to_string()))
    }
}

impl Default for ActionTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Signed per-field deltas produced by an action or event choice.
pub type Changes = BTreeMap<String, f64>;

#[derive(Default)]
pub(crate) struct ChangeSet {
    changes: Changes,
}

impl ChangeSet {
    pub(crate) fn resource(&mut self, field: &str, delta: Amount) {
        *self.changes.entry(field.to_string()).or_insert(0.0) += to_display(delta);
    }

    pub(crate) fn role(&mut self, role: Role, delta: u32) {
        *self.changes.entry(role.key().to_string()).or_insert(0.0) += f64::from(delta);
    }

    pub(crate) fn upgrade(&mut self, upgrade: UpgradeId) {
        self.changes.insert(format!("upgrade_{upgrade}"), 1.0);
    }

    pub(crate) fn finish(self) -> Changes {
        self.changes
    }
}

/// Validate every precondition of `kind` without touching the state.
pub fn check(kind: ActionKind, state: &GameState) -> Result<()> {
    if let Some(upgrade) = kind.upgrade() {
        if state.has_upgrade(upgrade) {
            return Err(GameError::UpgradeOwned(upgrade.to_string()));
        }
    }

    let cost = amount(kind.cost());
    if state.money < cost {
        return Err(GameError::InsufficientFunds {
            action: kind.name().to_string(),
            required: format_money(cost),
            available: format_money(state.money),
        });
    }

    Ok(())
}

/// Apply every effect of `kind`. Callers run [`check`] first.
pub(crate) fn apply(kind: ActionKind, state: &mut GameState) -> Changes {
    let mut changes = ChangeSet::default();

    let cost = amount(kind.cost());
    if cost > Amount::ZERO {
        state.money -= cost;
        changes.resource("money", -cost);
    }

    match kind {
        ActionKind::HireSafetyResearcher => {
            hire(state, &mut changes, Role::SafetyResearchers);
            gain(&mut state.safety, &mut changes, "safety", amount(2));
        }
        ActionKind::HireCapabilitiesResearcher => {
            hire(state, &mut changes, Role::CapabilitiesResearchers);
            gain(&mut state.capabilities, &mut changes, "capabilities", amount(3));
        }
        ActionKind::HireComputeResearcher => {
            hire(state, &mut changes, Role::ComputeResearchers);
            gain(&mut state.compute, &mut changes, "compute", amount(15));
        }
        ActionKind::BuyCompute => {
            gain(&mut state.compute, &mut changes, "compute", amount(50));
        }
        ActionKind::SafetyResearch => {
            gain(&mut state.safety, &mut changes, "safety", amount(1));
        }
        ActionKind::Fundraise => {
            let raised = amount(state.rng_mut().gen_range(FUNDRAISE_MIN..=FUNDRAISE_MAX));
            gain(&mut state.money, &mut changes, "money", raised);
            gain(&mut state.capabilities, &mut changes, "capabilities", amount(1));
        }
        ActionKind::UpgradeSecureDatacenter => {
            purchase(state, &mut changes, UpgradeId::SecureDatacenter);
            gain(&mut state.safety, &mut changes, "safety", amount(5));
        }
        ActionKind::UpgradeRedTeam => {
            purchase(state, &mut changes, UpgradeId::RedTeam);
            gain(&mut state.safety, &mut changes, "safety", amount(3));
        }
    }

    changes.finish()
}

pub(crate) fn gain(field: &mut Amount, changes: &mut ChangeSet, name: &str, delta: Amount) {
    *field = field.saturating_add(delta);
    changes.resource(name, delta);
}

fn hire(state: &mut GameState, changes: &mut ChangeSet, role: Role) {
    *state.employees.entry(role).or_insert(0) += 1;
    changes.role(role, 1);
}

fn purchase(state: &mut GameState, changes: &mut ChangeSet, upgrade: UpgradeId) {
    state.upgrades.push(upgrade);
    changes.upgrade(upgrade);
}
