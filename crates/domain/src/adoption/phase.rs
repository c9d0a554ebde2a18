//! Adoption lifecycle phase state machine.

use serde::{Deserialize, Serialize};

/// The lifecycle phase of an adoption.
///
/// Phase transitions:
/// ```text
/// Prospect ──► InSales ──► Onboarding ──► Active
///     ▲           │             │            │
///     └───────────┴─────────────┴────────────┴──► Churned
/// ```
///
/// The happy path runs left to right; `SetPhase` can force any transition,
/// and a lost sale returns the adoption to `Prospect`. `Churned` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No sales process has started yet.
    #[default]
    Prospect,

    /// A sales process is underway.
    InSales,

    /// The sale closed and guided onboarding is running.
    Onboarding,

    /// The product is live; engagement processes may run.
    Active,

    /// The relationship ended (terminal).
    Churned,
}

impl Phase {
    /// Returns true if a sales process can start in this phase.
    pub fn can_start_sale(&self) -> bool {
        matches!(self, Phase::Prospect)
    }

    /// Returns true if attribute mutations are allowed in this phase.
    pub fn can_mutate_attributes(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if this is the terminal phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Churned)
    }

    /// Returns the phase name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Prospect => "prospect",
            Phase::InSales => "in_sales",
            Phase::Onboarding => "onboarding",
            Phase::Active => "active",
            Phase::Churned => "churned",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
