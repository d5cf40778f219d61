//! Builds the ring, runs the agents for the configured duration and shuts
//! them down with a bounded wait.

use crate::agent::{Agent, AgentSnapshot, AgentStats};
use crate::cancel::CancellationToken;
use crate::config::{ConfigError, SimulationConfig};
use crate::resource::Resource;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Grace periods longer than this are clamped so the deadline cannot overflow
const MAX_GRACE: Duration = Duration::from_secs(24 * 60 * 60);

/// Indices of the left and right resource of agent `id` in a ring of `n`
///
/// # Examples
/// ```
/// use dinesim::coordinator::ring_neighbours;
///
/// assert_eq!(ring_neighbours(0, 5), (0, 1));
/// assert_eq!(ring_neighbours(4, 5), (4, 0));
/// ```
pub fn ring_neighbours(id: usize, n: usize) -> (usize, usize) {
    (id, (id + 1) % n)
}

/// Handles the coordinator keeps to observe and stop one agent
struct Seat {
    stats: Arc<AgentStats>,
    running: Arc<AtomicBool>,
}

/// Outcome of the bounded shutdown wait
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownSummary {
    /// Agents whose thread exited within the grace period
    pub joined: usize,
    /// Agents still running when the grace period expired
    pub abandoned: usize,
    /// Joined agents whose thread panicked
    pub panicked: usize,
}

/// Everything the reporter needs once the run is over
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    pub config: SimulationConfig,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub agents: Vec<AgentSnapshot>,
    pub shutdown: ShutdownSummary,
}

/// Owns the ring of resources and agents for a single run
pub struct Coordinator {
    config: Arc<SimulationConfig>,
    resources: Vec<Arc<Resource>>,
    agents: Vec<Agent>,
    seats: Vec<Seat>,
    cancel: CancellationToken,
    epoch: Instant,
}

/// Sends the agent id when dropped, so exits are seen even after a panic
struct ExitNotice {
    id: usize,
    tx: mpsc::Sender<usize>,
}

impl Drop for ExitNotice {
    fn drop(&mut self) {
        let _ = self.tx.send(self.id);
    }
}

impl Coordinator {
    /// Validate `config` and wire up the ring.
    ///
    /// No resource or agent is constructed if validation fails.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let n = config.agents;
        let config = Arc::new(config);
        let cancel = CancellationToken::new();
        let epoch = Instant::now();

        let resources: Vec<Arc<Resource>> =
            (0..n).map(|i| Arc::new(Resource::new(i))).collect();

        let mut agents = Vec::with_capacity(n);
        let mut seats = Vec::with_capacity(n);
        for id in 0..n {
            let (left, right) = ring_neighbours(id, n);
            let stats = Arc::new(AgentStats::new());
            let running = Arc::new(AtomicBool::new(true));
            agents.push(Agent::new(
                id,
                Arc::clone(&resources[left]),
                Arc::clone(&resources[right]),
                Arc::clone(&config),
                Arc::clone(&stats),
                Arc::clone(&running),
                cancel.clone(),
                epoch,
            ));
            seats.push(Seat { stats, running });
        }

        info!("Built ring of {} agents and {} resources", n, resources.len());

        Ok(Self {
            config,
            resources,
            agents,
            seats,
            cancel,
            epoch,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn resources(&self) -> &[Arc<Resource>] {
        &self.resources
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Launch every agent, let them run for `run_time`, stop them and
    /// return the final snapshot.
    pub fn run(mut self) -> Result<SimulationSnapshot> {
        let (tx, rx) = mpsc::channel();
        let mut handles = Vec::with_capacity(self.agents.len());

        for agent in std::mem::take(&mut self.agents) {
            let id = agent.id();
            let notice = ExitNotice { id, tx: tx.clone() };
            let spawned = thread::Builder::new()
                .name(format!("agent-{}", id))
                .spawn(move || {
                    let _notice = notice;
                    agent.run();
                });

            match spawned {
                Ok(handle) => handles.push((id, handle)),
                Err(err) => {
                    drop(tx);
                    self.stop();
                    Self::await_termination(handles, &rx, self.config.shutdown_grace);
                    return Err(err)
                        .wrap_err_with(|| format!("Failed to spawn agent {}", id));
                }
            }
        }
        drop(tx);

        info!(
            "Launched {} agents, running for {:?}",
            handles.len(),
            self.config.run_time
        );
        thread::sleep(self.config.run_time);

        self.stop();
        let shutdown = Self::await_termination(handles, &rx, self.config.shutdown_grace);
        if shutdown.abandoned > 0 {
            warn!(
                "{} agent(s) did not stop within {:?}; reporting their last observed state",
                shutdown.abandoned, self.config.shutdown_grace
            );
        } else {
            info!("All {} agents stopped", shutdown.joined);
        }

        Ok(self.snapshot(shutdown))
    }

    /// Clear every running flag, then force blocked waits to return
    fn stop(&self) {
        info!("Stopping agents");
        for seat in &self.seats {
            seat.running.store(false, Ordering::Release);
        }
        self.cancel.cancel();
        for resource in &self.resources {
            resource.interrupt();
        }
    }

    fn await_termination(
        handles: Vec<(usize, JoinHandle<()>)>,
        rx: &mpsc::Receiver<usize>,
        grace: Duration,
    ) -> ShutdownSummary {
        let now = Instant::now();
        let deadline = now.checked_add(grace).unwrap_or(now + MAX_GRACE);
        let slots = handles.iter().map(|(id, _)| id + 1).max().unwrap_or(0);
        let mut exited = vec![false; slots];
        let mut remaining = handles.len();

        while remaining > 0 {
            let wait = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(wait) {
                Ok(id) => {
                    if let Some(flag) = exited.get_mut(id) {
                        if !*flag {
                            *flag = true;
                            remaining -= 1;
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let mut summary = ShutdownSummary::default();
        for (id, handle) in handles {
            if !exited[id] {
                warn!("Abandoning agent {} after shutdown grace period", id);
                summary.abandoned += 1;
                continue;
            }
            summary.joined += 1;
            if handle.join().is_err() {
                warn!("Agent {} panicked", id);
                summary.panicked += 1;
            } else {
                debug!("Agent {} joined", id);
            }
        }
        summary
    }

    fn snapshot(&self, shutdown: ShutdownSummary) -> SimulationSnapshot {
        let elapsed = self.epoch.elapsed();
        let agents = self
            .seats
            .iter()
            .enumerate()
            .map(|(id, seat)| seat.stats.snapshot(id, elapsed))
            .collect();

        SimulationSnapshot {
            config: (*self.config).clone(),
            elapsed,
            agents,
            shutdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_config() -> SimulationConfig {
        SimulationConfig {
            agents: 4,
            run_time: Duration::from_millis(400),
            max_think: Duration::from_millis(20),
            max_eat: Duration::from_millis(20),
            acquire_timeout: Duration::from_millis(100),
            starvation_limit: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_ring_topology() {
        let coordinator = Coordinator::new(SimulationConfig {
            agents: 5,
            ..Default::default()
        })
        .unwrap();
        let n = coordinator.resources().len();
        assert_eq!(n, 5);
        assert_eq!(coordinator.config().agents, n);

        let mut as_left = vec![0; n];
        let mut as_right = vec![0; n];
        for (i, agent) in coordinator.agents().iter().enumerate() {
            let (left, right) = agent.neighbours();
            assert_eq!(left, i);
            assert_eq!(right, (i + 1) % n);
            as_left[left] += 1;
            as_right[right] += 1;
        }
        assert!(as_left.iter().all(|&count| count == 1));
        assert!(as_right.iter().all(|&count| count == 1));
    }

    #[test]
    fn test_invalid_config_builds_nothing() {
        let result = Coordinator::new(SimulationConfig {
            run_time: Duration::ZERO,
            ..Default::default()
        });
        assert!(matches!(
            result,
            Err(ConfigError::NonPositiveDuration { field: "run-time" })
        ));
    }

    #[test]
    fn test_run_joins_all_agents() {
        let coordinator = Coordinator::new(short_config()).unwrap();
        let snapshot = coordinator.run().unwrap();

        assert_eq!(snapshot.agents.len(), 4);
        assert_eq!(snapshot.shutdown.joined, 4);
        assert_eq!(snapshot.shutdown.abandoned, 0);
        assert_eq!(snapshot.shutdown.panicked, 0);
        assert!(snapshot.elapsed >= Duration::from_millis(400));
        for (i, agent) in snapshot.agents.iter().enumerate() {
            assert_eq!(agent.id, i);
        }
    }

    #[test]
    fn test_resources_free_after_run() {
        let coordinator = Coordinator::new(short_config()).unwrap();
        let resources: Vec<_> = coordinator.resources().to_vec();
        coordinator.run().unwrap();
        for resource in resources {
            assert_eq!(resource.holder(), None);
        }
    }

    #[test]
    fn test_exit_notice_fires_on_panic() {
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            let _notice = ExitNotice { id: 0, tx };
            panic!("agent failure");
        });

        let summary =
            Coordinator::await_termination(vec![(0, handle)], &rx, Duration::from_secs(2));
        assert_eq!(summary.joined, 1);
        assert_eq!(summary.panicked, 1);
    }

    #[test]
    fn test_oversized_grace_does_not_overflow() {
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            let _notice = ExitNotice { id: 0, tx };
        });

        let summary = Coordinator::await_termination(vec![(0, handle)], &rx, Duration::MAX);
        assert_eq!(summary.joined, 1);
        assert_eq!(summary.abandoned, 0);
    }

    #[test]
    fn test_run_with_huge_grace_from_yaml() {
        let yaml = "agents: 2\nrun_time: 100ms\nshutdown_grace: 500000000000years\n";
        let config: SimulationConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());

        let snapshot = Coordinator::new(config).unwrap().run().unwrap();
        assert_eq!(snapshot.shutdown.joined, 2);
        assert_eq!(snapshot.shutdown.abandoned, 0);
    }

    #[test]
    fn test_straggler_is_abandoned() {
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            let _notice = ExitNotice { id: 0, tx };
            thread::sleep(Duration::from_millis(500));
        });

        let start = Instant::now();
        let summary =
            Coordinator::await_termination(vec![(0, handle)], &rx, Duration::from_millis(50));
        assert!(start.elapsed() < Duration::from_millis(400));
        assert_eq!(summary.abandoned, 1);
        assert_eq!(summary.joined, 0);
    }
}
