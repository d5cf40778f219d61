//! The agent lifecycle: think, get hungry, try to take both neighbouring
//! resources within a bounded time, eat, repeat.
//!
//! Deadlock is broken by the acquisition timeout: an agent that cannot get
//! both resources within `acquire_timeout` releases what it holds and goes
//! back to thinking. Parity-based pickup order (even agents start left, odd
//! agents start right) makes a full circular wait less likely in the first
//! place but is not relied on for progress.

use super::state::{AgentState, AgentStats};
use crate::cancel::CancellationToken;
use crate::config::SimulationConfig;
use crate::resource::{Resource, ResourceGuard};
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Fixed base added to every randomized sleep
const BASE_SLEEP: Duration = Duration::from_millis(50);

/// Random range of the pause between an attempt and the next think phase
const BACKOFF_RANGE: Duration = Duration::from_millis(50);

/// One worker seated between two resources of the ring
pub struct Agent {
    id: usize,
    left: Arc<Resource>,
    right: Arc<Resource>,
    config: Arc<SimulationConfig>,
    rng: StdRng,
    stats: Arc<AgentStats>,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
    /// Simulation start; meal timestamps are offsets from it
    epoch: Instant,
}

impl Agent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        left: Arc<Resource>,
        right: Arc<Resource>,
        config: Arc<SimulationConfig>,
        stats: Arc<AgentStats>,
        running: Arc<AtomicBool>,
        cancel: CancellationToken,
        epoch: Instant,
    ) -> Self {
        Self {
            id,
            left,
            right,
            config,
            rng: StdRng::seed_from_u64(id as u64),
            stats,
            running,
            cancel,
            epoch,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Ids of the left and right resource
    pub fn neighbours(&self) -> (usize, usize) {
        (self.left.id(), self.right.id())
    }

    /// Run until the coordinator clears the running flag.
    ///
    /// The flag is checked once per cycle; an interrupted think phase sends
    /// the agent straight back to that check.
    pub fn run(mut self) {
        debug!(
            "Agent {} starting (left={}, right={})",
            self.id,
            self.left.id(),
            self.right.id()
        );

        while self.running.load(Ordering::Acquire) {
            if !self.think() {
                continue;
            }
            self.attempt_to_eat();
        }

        debug!("Agent {} stopping after {} meals", self.id, self.stats.meals());
    }

    /// Resources in pickup order: even ids go left first, odd ids right first
    pub(crate) fn pickup_order(&self) -> (Arc<Resource>, Arc<Resource>) {
        if self.id % 2 == 0 {
            (Arc::clone(&self.left), Arc::clone(&self.right))
        } else {
            (Arc::clone(&self.right), Arc::clone(&self.left))
        }
    }

    fn think(&mut self) -> bool {
        self.stats.set_state(AgentState::Thinking);
        let max = self.config.max_think;
        self.sleep_random(max)
    }

    /// One pass of the acquisition protocol. Returns whether the agent ate.
    pub(crate) fn attempt_to_eat(&mut self) -> bool {
        self.stats.set_state(AgentState::Hungry);
        let wait_start = Instant::now();
        let timeout = self.config.acquire_timeout;

        let (first, second) = self.pickup_order();
        let ate = {
            let first_guard = first
                .try_acquire(self.id, timeout, &self.cancel)
                .into_guard();
            let second_guard = first_guard.as_ref().and_then(|_| {
                let remaining = timeout.saturating_sub(wait_start.elapsed());
                second.try_acquire(self.id, remaining, &self.cancel).into_guard()
            });

            match (first_guard, second_guard) {
                (Some(first_guard), Some(second_guard)) => {
                    self.eat(&first_guard, &second_guard);
                    // Release in reverse acquisition order
                    drop(second_guard);
                    drop(first_guard);
                    true
                }
                // Any partial hold is released here when the guards drop
                _ => false,
            }
        };

        if !ate {
            self.stats.record_failed_attempt();
            trace!("Agent {} could not acquire both resources", self.id);
        }

        let since_meal = self.epoch.elapsed().saturating_sub(self.stats.last_meal());
        if since_meal > self.config.starvation_limit && !self.stats.is_starving() {
            debug!("Agent {} starving: {:?} since last meal", self.id, since_meal);
            self.stats.mark_starving();
        }

        self.sleep_random(BACKOFF_RANGE);
        ate
    }

    /// Only callable while holding both resources, which the guards prove
    fn eat(&mut self, first: &ResourceGuard<'_>, second: &ResourceGuard<'_>) {
        debug_assert_ne!(first.resource_id(), second.resource_id());
        self.stats.set_state(AgentState::Eating);
        self.stats.record_meal(self.epoch.elapsed());
        trace!(
            "Agent {} eating with resources {} and {}",
            self.id,
            first.resource_id(),
            second.resource_id()
        );

        let max = self.config.max_eat;
        self.sleep_random(max);
        self.stats.set_state(AgentState::Thinking);
    }

    /// Sleep in `[50ms, 50ms + max)`; returns false if cancelled
    fn sleep_random(&mut self, max: Duration) -> bool {
        let duration = random_sleep(&mut self.rng, max);
        self.cancel.sleep(duration)
    }
}

fn random_sleep(rng: &mut StdRng, max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return BASE_SLEEP;
    }
    BASE_SLEEP + Duration::from_millis(rng.gen_range(0..max_ms))
}
