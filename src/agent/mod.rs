//! Agents seated around the ring: their lifecycle and published statistics.

pub mod state;
pub mod worker;

pub use state::{AgentSnapshot, AgentState, AgentStats};
pub use worker::Agent;
