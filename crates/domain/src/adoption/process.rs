//! Process and stage reference data.
//!
//! Processes and their stages are read-only configuration, injected into the
//! service at startup. They are not part of the event stream: events refer to
//! process and stage ids, and the catalog resolves them at decision time.

use serde::{Deserialize, Serialize};

use super::Phase;

/// The kind of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessKind {
    /// Sales pipeline, run while the adoption is `in_sales`.
    Sales,

    /// Guided onboarding after a won sale.
    Onboarding,

    /// Ongoing engagement for an active adoption.
    Engagement,
}

impl ProcessKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessKind::Sales => "sales",
            ProcessKind::Onboarding => "onboarding",
            ProcessKind::Engagement => "engagement",
        }
    }
}

impl std::fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The outcome a terminal stage marks a process with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The sale closed successfully.
    Won,

    /// The sale was lost.
    Lost,

    /// The process ran to successful completion.
    Completed,

    /// The relationship ended.
    Churned,

    /// The process was abandoned.
    Cancelled,
}

impl Outcome {
    /// Returns the outcome name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Won => "won",
            Outcome::Lost => "lost",
            Outcome::Completed => "completed",
            Outcome::Churned => "churned",
            Outcome::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stage within a process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    /// Stage identifier, unique within its process.
    pub id: String,

    /// Human-readable stage name.
    pub name: String,

    /// Position of the stage within the process. Informational for
    /// reporting; advancing to a lower order (regression) is legal.
    pub order: u32,

    /// If set, entering this stage ends the process with the given outcome.
    #[serde(default)]
    pub terminal: Option<Outcome>,
}

/// A process definition with its ordered stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Process {
    /// Process identifier, unique within the catalog.
    pub id: String,

    /// What kind of process this is.
    pub kind: ProcessKind,

    /// Human-readable process name.
    pub name: String,

    /// The stages of this process, in order.
    pub stages: Vec<Stage>,
}

impl Process {
    /// Looks up a stage by id.
    pub fn stage(&self, stage_id: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == stage_id)
    }

    /// Returns true if the given stage belongs to this process.
    pub fn contains_stage(&self, stage_id: &str) -> bool {
        self.stage(stage_id).is_some()
    }

    /// Returns the first (lowest-order) non-terminal stage.
    pub fn first_stage(&self) -> Option<&Stage> {
        self.stages
            .iter()
            .filter(|s| s.terminal.is_none())
            .min_by_key(|s| s.order)
    }

    /// Returns the terminal stage marked with the given outcome, if any.
    pub fn terminal_stage_for(&self, outcome: Outcome) -> Option<&Stage> {
        self.stages.iter().find(|s| s.terminal == Some(outcome))
    }
}

/// The catalog of process definitions available to the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessCatalog {
    /// All known processes.
    pub processes: Vec<Process>,
}

impl ProcessCatalog {
    /// Looks up a process by id.
    pub fn process(&self, process_id: &str) -> Option<&Process> {
        self.processes.iter().find(|p| p.id == process_id)
    }

    /// Returns the first process of the given kind, if any.
    pub fn process_of_kind(&self, kind: ProcessKind) -> Option<&Process> {
        self.processes.iter().find(|p| p.kind == kind)
    }

    /// Parses a catalog from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Returns the phase an adoption moves to after a process of the given
    /// kind completes with the given outcome. `None` means the phase is
    /// unchanged.
    ///
    /// A `churned` outcome always wins. A won sale moves to onboarding when
    /// the catalog defines an onboarding process, otherwise straight to
    /// active. A lost or cancelled sale returns the adoption to prospect so
    /// a new sale can start later. Any non-churn onboarding outcome lands on
    /// active: the product is live, with or without guided onboarding.
    pub fn phase_after(&self, kind: ProcessKind, outcome: Outcome) -> Option<Phase> {
        match (kind, outcome) {
            (_, Outcome::Churned) => Some(Phase::Churned),
            (ProcessKind::Sales, Outcome::Won) => {
                if self.process_of_kind(ProcessKind::Onboarding).is_some() {
                    Some(Phase::Onboarding)
                } else {
                    Some(Phase::Active)
                }
            }
            (ProcessKind::Sales, Outcome::Completed) => Some(Phase::Active),
            (ProcessKind::Sales, Outcome::Lost | Outcome::Cancelled) => Some(Phase::Prospect),
            (ProcessKind::Onboarding, _) => Some(Phase::Active),
            (ProcessKind::Engagement, _) => None,
        }
    }

    /// Returns the built-in standard catalog: a sales pipeline, a guided
    /// onboarding, and an engagement process.
    pub fn standard() -> Self {
        fn stage(id: &str, name: &str, order: u32) -> Stage {
            Stage {
                id: id.to_string(),
                name: name.to_string(),
                order,
                terminal: None,
            }
        }

        fn terminal_stage(id: &str, name: &str, order: u32, outcome: Outcome) -> Stage {
            Stage {
                id: id.to_string(),
                name: name.to_string(),
                order,
                terminal: Some(outcome),
            }
        }

        Self {
            processes: vec![
                Process {
                    id: "sales_default".to_string(),
                    kind: ProcessKind::Sales,
                    name: "Sales pipeline".to_string(),
                    stages: vec![
                        stage("discovery", "Discovery", 1),
                        stage("qualification", "Qualification", 2),
                        stage("proposal", "Proposal", 3),
                        stage("negotiation", "Negotiation", 4),
                        terminal_stage("closed_won", "Closed won", 5, Outcome::Won),
                        terminal_stage("closed_lost", "Closed lost", 6, Outcome::Lost),
                        terminal_stage("cancelled", "Cancelled", 7, Outcome::Cancelled),
                    ],
                },
                Process {
                    id: "onboarding_default".to_string(),
                    kind: ProcessKind::Onboarding,
                    name: "Guided onboarding".to_string(),
                    stages: vec![
                        stage("kickoff", "Kickoff", 1),
                        stage("configuration", "Configuration", 2),
                        stage("training", "Training", 3),
                        stage("go_live", "Go live", 4),
                        terminal_stage("completed", "Completed", 5, Outcome::Completed),
                        terminal_stage("cancelled", "Cancelled", 6, Outcome::Cancelled),
                    ],
                },
                Process {
                    id: "engagement_default".to_string(),
                    kind: ProcessKind::Engagement,
                    name: "Ongoing engagement".to_string(),
                    stages: vec![
                        stage("steady_state", "Steady state", 1),
                        stage("expansion", "Expansion", 2),
                        stage("renewal", "Renewal", 3),
                        terminal_stage("churned", "Churned", 4, Outcome::Churned),
                    ],
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_has_all_kinds() {
        let catalog = ProcessCatalog::standard();
        assert!(catalog.process_of_kind(ProcessKind::Sales).is_some());
        assert!(catalog.process_of_kind(ProcessKind::Onboarding).is_some());
        assert!(catalog.process_of_kind(ProcessKind::Engagement).is_some());
    }

    #[test]
    fn test_process_lookup() {
        let catalog = ProcessCatalog::standard();
        let sales = catalog.process("sales_default").unwrap();
        assert_eq!(sales.kind, ProcessKind::Sales);
        assert!(sales.contains_stage("discovery"));
        assert!(!sales.contains_stage("kickoff"));
        assert!(catalog.process("unknown").is_none());
    }

    #[test]
    fn test_first_stage_skips_terminals() {
        let catalog = ProcessCatalog::standard();
        let sales = catalog.process("sales_default").unwrap();
        assert_eq!(sales.first_stage().unwrap().id, "discovery");
    }

    #[test]
    fn test_terminal_stage_for_outcome() {
        let catalog = ProcessCatalog::standard();
        let sales = catalog.process("sales_default").unwrap();
        assert_eq!(sales.terminal_stage_for(Outcome::Won).unwrap().id, "closed_won");
        assert_eq!(
            sales.terminal_stage_for(Outcome::Lost).unwrap().id,
            "closed_lost"
        );
        assert!(sales.terminal_stage_for(Outcome::Completed).is_none());
    }

    #[test]
    fn test_phase_after_sales_outcomes() {
        let catalog = ProcessCatalog::standard();
        assert_eq!(
            catalog.phase_after(ProcessKind::Sales, Outcome::Won),
            Some(Phase::Onboarding)
        );
        assert_eq!(
            catalog.phase_after(ProcessKind::Sales, Outcome::Lost),
            Some(Phase::Prospect)
        );
        assert_eq!(
            catalog.phase_after(ProcessKind::Sales, Outcome::Cancelled),
            Some(Phase::Prospect)
        );
    }

    #[test]
    fn test_phase_after_sales_won_without_onboarding_goes_active() {
        let mut catalog = ProcessCatalog::standard();
        catalog.processes.retain(|p| p.kind != ProcessKind::Onboarding);
        assert_eq!(
            catalog.phase_after(ProcessKind::Sales, Outcome::Won),
            Some(Phase::Active)
        );
    }

    #[test]
    fn test_phase_after_churn_always_wins() {
        let catalog = ProcessCatalog::standard();
        assert_eq!(
            catalog.phase_after(ProcessKind::Engagement, Outcome::Churned),
            Some(Phase::Churned)
        );
        assert_eq!(
            catalog.phase_after(ProcessKind::Onboarding, Outcome::Churned),
            Some(Phase::Churned)
        );
    }

    #[test]
    fn test_phase_after_onboarding_lands_on_active() {
        let catalog = ProcessCatalog::standard();
        assert_eq!(
            catalog.phase_after(ProcessKind::Onboarding, Outcome::Completed),
            Some(Phase::Active)
        );
        assert_eq!(
            catalog.phase_after(ProcessKind::Onboarding, Outcome::Cancelled),
            Some(Phase::Active)
        );
    }

    #[test]
    fn test_phase_after_engagement_keeps_phase() {
        let catalog = ProcessCatalog::standard();
        assert_eq!(
            catalog.phase_after(ProcessKind::Engagement, Outcome::Completed),
            None
        );
    }

    #[test]
    fn test_catalog_json_roundtrip() {
        let catalog = ProcessCatalog::standard();
        let json = serde_json::to_string(&catalog).unwrap();
        let parsed = ProcessCatalog::from_json(&json).unwrap();
        assert_eq!(parsed.processes.len(), catalog.processes.len());
        assert!(parsed.process("sales_default").is_some());
    }
}
