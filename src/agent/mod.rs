// ABOUTME: Agent module - per-agent lifecycle state and the long-lived control loop.
// ABOUTME: Provides the observable AgentHandle and the AgentRunner cycle machinery.

mod handle;
mod runner;

pub use handle::{AgentHandle, AgentState, AgentStatus};
pub use runner::AgentRunner;
