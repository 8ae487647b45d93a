//! Numbered menu driving the simulation workflow one step at a time.

use std::collections::HashSet;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use thiserror::Error;

use super::args::DEFAULT_TIMEOUT_SECS;
use super::{run_tasks, write_config_summary, write_plan_output};
use crate::config::SystemConfig;
use crate::executor::SimulationStatus;
use crate::paths::SCRIPTS_DIR;
use crate::plan::{
    execute_plan, generate_plan, ExecutePlanParams, PlanOutput, RunMode, SimulationPlan, TaskKey,
};
use crate::Result;

const MENU: [&str; 9] = [
    "Load configuration file",
    "Display current configuration",
    "Generate netlist script",
    "Generate netlist wrapper",
    "Generate simulation package",
    "Run simulation (shell wrapper)",
    "Run simulation (direct)",
    "View simulation status",
    "Exit",
];

/// Standard input was closed while waiting for a response.
#[derive(Debug, Error)]
#[error("input stream closed")]
pub struct InputClosed;

pub struct Session<R, W> {
    work_dir: PathBuf,
    system: Option<SystemConfig>,
    plan: Option<SimulationPlan>,
    status: Option<SimulationStatus>,
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Session<R, W> {
    pub fn new(work_dir: PathBuf, system: Option<SystemConfig>, input: R, output: W) -> Self {
        Self {
            work_dir,
            system,
            plan: None,
            status: None,
            input,
            output,
        }
    }

    /// Runs the menu until the user exits.
    ///
    /// Failed operations are reported and the menu is shown again. Closing
    /// the input ends the session with [`InputClosed`].
    pub fn run(mut self) -> Result<()> {
        writeln!(self.output, "{}", "=".repeat(60))?;
        writeln!(self.output, "Analog simulation automation - interactive mode")?;
        writeln!(self.output, "{}", "=".repeat(60))?;

        loop {
            writeln!(self.output, "\nAvailable operations:")?;
            for (i, item) in MENU.iter().enumerate() {
                writeln!(self.output, "{}. {}", i + 1, item)?;
            }

            let choice = self.prompt_text(&format!("\nSelect an operation (1-{})", MENU.len()), None)?;
            let res = match choice.parse::<usize>() {
                Ok(1) => self.load_config(),
                Ok(2) => self.show_config(),
                Ok(3) => self.generate(&[TaskKey::GenerateNetlist], RunMode::Package),
                Ok(4) => self.generate(&[TaskKey::GenerateNetlistWrapper], RunMode::Package),
                Ok(5) => self.generate_package(),
                Ok(6) => self.run_simulation(RunMode::Package),
                Ok(7) => self.run_simulation(RunMode::Direct),
                Ok(8) => self.show_status(),
                Ok(9) => {
                    writeln!(self.output, "Exiting")?;
                    return Ok(());
                }
                _ => {
                    writeln!(self.output, "Invalid selection, please try again")?;
                    Ok(())
                }
            };

            if let Err(e) = res {
                if e.is::<InputClosed>() {
                    return Err(e);
                }
                writeln!(self.output, "Operation failed: {e:#}")?;
            }
        }
    }

    fn prompt_text(&mut self, prompt: &str, default: Option<&str>) -> Result<String> {
        loop {
            if let Some(default) = default {
                write!(self.output, "{prompt} [{default}]: ")?;
            } else {
                write!(self.output, "{prompt}: ")?;
            }
            self.output
                .flush()
                .context("failed to flush prompt to stdout")?;

            let mut input = String::new();
            let read = self
                .input
                .read_line(&mut input)
                .context("failed to read response from stdin")?;
            if read == 0 {
                return Err(InputClosed.into());
            }
            let trimmed = input.trim();
            if trimmed.is_empty() {
                if let Some(default) = default {
                    return Ok(default.to_owned());
                }
                writeln!(self.output, "Input cannot be empty. Please try again.")?;
                continue;
            }
            return Ok(trimmed.to_owned());
        }
    }

    fn plan(&mut self) -> Result<&mut SimulationPlan> {
        self.plan
            .as_mut()
            .context("please load a configuration file first")
    }

    fn load_config(&mut self) -> Result<()> {
        let path = self.prompt_text("Configuration file path", None)?;
        let plan = generate_plan(&path, self.system.as_ref(), &self.work_dir, None)?;
        writeln!(
            self.output,
            "Loaded configuration for {}",
            plan.config.project_name()
        )?;
        self.plan = Some(plan);
        self.status = None;
        Ok(())
    }

    fn show_config(&mut self) -> Result<()> {
        let plan = self.plan.as_ref().context("please load a configuration file first")?;
        write_config_summary(&mut self.output, &plan.config)?;
        Ok(())
    }

    fn execute(
        &mut self,
        tasks: HashSet<TaskKey>,
        mode: RunMode,
        timeout: Duration,
    ) -> Result<PlanOutput> {
        let plan = self.plan.as_ref().context("please load a configuration file first")?;
        execute_plan(ExecutePlanParams {
            plan,
            tasks: &tasks,
            mode,
            timeout,
            ctx: None,
        })
    }

    fn generate(&mut self, tasks: &[TaskKey], mode: RunMode) -> Result<()> {
        let output = self.execute(tasks.iter().copied().collect(), mode, Duration::ZERO)?;
        write_plan_output(&mut self.output, &output)?;
        Ok(())
    }

    fn generate_package(&mut self) -> Result<()> {
        self.plan()?;
        let default = self.work_dir.join(SCRIPTS_DIR).to_string_lossy().to_string();
        let output_dir = self.prompt_text("Output directory", Some(&default))?;
        self.plan()?.output_dir = PathBuf::from(output_dir);
        self.generate(
            &[TaskKey::GenerateScript, TaskKey::GenerateWrapper],
            RunMode::Package,
        )?;
        writeln!(self.output, "Script generation completed")?;
        Ok(())
    }

    fn run_simulation(&mut self, mode: RunMode) -> Result<()> {
        self.plan()?;
        let timeout = self.prompt_text("Timeout in seconds", Some(&DEFAULT_TIMEOUT_SECS.to_string()))?;
        let timeout = timeout
            .parse::<u64>()
            .with_context(|| format!("invalid timeout `{timeout}`"))?;

        let output = self.execute(run_tasks(mode), mode, Duration::from_secs(timeout))?;
        if let Some(status) = &output.status {
            self.status = Some(status.clone());
        }
        write_plan_output(&mut self.output, &output)?;
        Ok(())
    }

    fn show_status(&mut self) -> Result<()> {
        match &self.status {
            Some(status) => writeln!(self.output, "{}", serde_json::to_string_pretty(status)?)?,
            None => writeln!(self.output, "No direct simulation has been run yet")?,
        }
        Ok(())
    }
}
