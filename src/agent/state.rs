//! Agent state and the statistics an agent publishes while it runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::time::Duration;

/// Phase of an agent's think / hungry / eat cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    Thinking,
    Hungry,
    Eating,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Thinking => "thinking",
            AgentState::Hungry => "hungry",
            AgentState::Eating => "eating",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => AgentState::Hungry,
            2 => AgentState::Eating,
            _ => AgentState::Thinking,
        }
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters written only by the owning agent thread and read by the
/// coordinator as an eventually-consistent snapshot.
///
/// None of these values take part in resource acquisition.
#[derive(Debug, Default)]
pub struct AgentStats {
    state: AtomicU8,
    meals: AtomicU64,
    failed_attempts: AtomicU64,
    /// Milliseconds since simulation start of the last meal (0 = never ate)
    last_meal_ms: AtomicU64,
    starving: AtomicBool,
}

impl AgentStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AgentState {
        AgentState::from_u8(self.state.load(Ordering::Relaxed))
    }

    pub(crate) fn set_state(&self, state: AgentState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    pub fn meals(&self) -> u64 {
        self.meals.load(Ordering::Relaxed)
    }

    pub(crate) fn record_meal(&self, at: Duration) {
        self.last_meal_ms.store(at.as_millis() as u64, Ordering::Relaxed);
        self.meals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed_attempts(&self) -> u64 {
        self.failed_attempts.load(Ordering::Relaxed)
    }

    pub(crate) fn record_failed_attempt(&self) {
        self.failed_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Offset from simulation start of the last meal
    pub fn last_meal(&self) -> Duration {
        Duration::from_millis(self.last_meal_ms.load(Ordering::Relaxed))
    }

    pub fn is_starving(&self) -> bool {
        self.starving.load(Ordering::Relaxed)
    }

    /// Sticky: there is no way to clear the flag once set
    pub(crate) fn mark_starving(&self) {
        self.starving.store(true, Ordering::Relaxed);
    }

    /// Capture the current values for agent `id`, `elapsed` after simulation start
    pub fn snapshot(&self, id: usize, elapsed: Duration) -> AgentSnapshot {
        AgentSnapshot {
            id,
            meals: self.meals(),
            failed_attempts: self.failed_attempts(),
            since_last_meal: elapsed.saturating_sub(self.last_meal()),
            state: self.state(),
            starving: self.is_starving(),
        }
    }
}

/// Point-in-time copy of one agent's statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: usize,
    pub meals: u64,
    pub failed_attempts: u64,
    #[serde(with = "humantime_serde")]
    pub since_last_meal: Duration,
    pub state: AgentState,
    pub starving: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trips_through_atomic() {
        let stats = AgentStats::new();
        assert_eq!(stats.state(), AgentState::Thinking);
        for state in [AgentState::Hungry, AgentState::Eating, AgentState::Thinking] {
            stats.set_state(state);
            assert_eq!(stats.state(), state);
        }
    }

    #[test]
    fn test_meals_and_snapshot() {
        let stats = AgentStats::new();
        stats.record_meal(Duration::from_millis(1200));
        stats.record_meal(Duration::from_millis(1500));
        stats.record_failed_attempt();

        let snapshot = stats.snapshot(4, Duration::from_millis(2000));
        assert_eq!(snapshot.id, 4);
        assert_eq!(snapshot.meals, 2);
        assert_eq!(snapshot.failed_attempts, 1);
        assert_eq!(snapshot.since_last_meal, Duration::from_millis(500));
        assert!(!snapshot.starving);
    }

    #[test]
    fn test_starving_is_sticky() {
        let stats = AgentStats::new();
        stats.mark_starving();
        stats.record_meal(Duration::from_secs(1));
        assert!(stats.is_starving());
    }
}
