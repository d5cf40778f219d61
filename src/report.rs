//! Report generation for a finished simulation run.
//!
//! Produces the human-readable results table, the two aggregate diagnostics
//! and an optional JSON export.

use std::fs;
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use serde::Serialize;

use crate::agent::AgentSnapshot;
use crate::coordinator::SimulationSnapshot;

/// Snapshot plus the conclusions derived from it
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub generated_at: String,
    pub snapshot: SimulationSnapshot,
    /// Heuristic: true when no agent completed a meal. A short run or a
    /// large timeout can produce the same outcome without a real deadlock.
    pub deadlock_suspected: bool,
    /// True when any agent was flagged as starving at some point
    pub starvation_detected: bool,
}

impl SimulationReport {
    pub fn new(snapshot: SimulationSnapshot) -> Self {
        let deadlock_suspected = deadlock_suspected(&snapshot.agents);
        let starvation_detected = starvation_detected(&snapshot.agents);
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            snapshot,
            deadlock_suspected,
            starvation_detected,
        }
    }

    /// Render the header, table and conclusions as text
    pub fn render(&self) -> String {
        let config = &self.snapshot.config;
        let mut lines: Vec<String> = Vec::new();

        lines.push("Dining Philosophers Simulation Results".to_string());
        lines.push(format!(
            "Agents: {} | Run duration: {:.2}s | Max think: {:.2}s | Max eat: {:.2}s | Timeout: {:.2}s | Starvation limit: {:.2}s",
            config.agents,
            config.run_time.as_secs_f64(),
            config.max_think.as_secs_f64(),
            config.max_eat.as_secs_f64(),
            config.acquire_timeout.as_secs_f64(),
            config.starvation_limit.as_secs_f64(),
        ));
        lines.push(
            "Asymmetric pickup (even: left->right, odd: right->left) with timeout-based release to avoid deadlock."
                .to_string(),
        );
        lines.push(String::new());

        lines.push(format!(
            "{:<6} {:<8} {:<8} {:<20} {:<10} {:<10}",
            "Agent", "Meals", "Missed", "Since Last Meal (s)", "State", "Starving?"
        ));
        for agent in &self.snapshot.agents {
            lines.push(format!(
                "{:<6} {:<8} {:<8} {:<20.2} {:<10} {:<10}",
                agent.id,
                agent.meals,
                agent.failed_attempts,
                agent.since_last_meal.as_secs_f64(),
                agent.state.as_str(),
                if agent.starving { "YES" } else { "NO" }
            ));
        }
        lines.push(String::new());

        if self.deadlock_suspected {
            lines.push("Deadlock suspected: no meals were completed.".to_string());
        } else {
            lines.push("No deadlock observed (meals were completed).".to_string());
        }
        if self.starvation_detected {
            lines.push(
                "Starvation detected: at least one agent exceeded the starvation limit."
                    .to_string(),
            );
        } else {
            lines.push("No starvation detected within the run window.".to_string());
        }

        let shutdown = &self.snapshot.shutdown;
        if shutdown.abandoned > 0 || shutdown.panicked > 0 {
            lines.push(format!(
                "Shutdown: {} joined, {} abandoned, {} panicked.",
                shutdown.joined, shutdown.abandoned, shutdown.panicked
            ));
        }

        lines.join("\n")
    }

    /// Print the rendered report to stdout
    pub fn print(&self) {
        println!("{}", self.render());
    }
}

/// Write the report as pretty-printed JSON
pub fn generate_json_report(report: &SimulationReport, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

    log::info!("JSON report written to {}", output_path.display());
    Ok(())
}

/// No agent completed a single meal
pub fn deadlock_suspected(agents: &[AgentSnapshot]) -> bool {
    agents.iter().all(|agent| agent.meals == 0)
}

pub fn starvation_detected(agents: &[AgentSnapshot]) -> bool {
    agents.iter().any(|agent| agent.starving)
}
