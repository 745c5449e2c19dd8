// ABOUTME: Prelude module - convenient imports for common use cases.
// ABOUTME: Use `use cadre::prelude::*;` to get started quickly.

pub use crate::agent::{AgentHandle, AgentRunner, AgentState, AgentStatus};
pub use crate::budget::{
    BudgetLedger, DenialReason, GrantDecision, LedgerStatus, RecordOutcome, ScopeStatus,
};
pub use crate::config::{
    AgentId, AgentSpec, BackoffConfig, BudgetConfig, FleetConfig, Persona, PersonaTone,
    RecoveryPolicy, RunnerConfig, TargetConfig, WindowConfig,
};
pub use crate::error::{CadreError, ConfigError, FleetError};
pub use crate::fleet::{FleetCoordinator, FleetStatus};
pub use crate::platform::{
    ActionOutcome, ContentGenerator, IntelligenceFeed, IntelligenceSnapshot, PlatformClient,
    PreparedAction,
};
pub use crate::registry::{Candidate, TargetCategory, TargetId, TargetRegistry};
pub use crate::strategy::{
    ActionKind, ActionProposal, CampaignObjective, CampaignPhase, ContentRequest, MessageCategory,
    StrategyConfig, StrategyEngine,
};
