use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use itertools::Itertools;
use log::info;

use crate::cli::progress::StepContext;
use crate::config::{load_task_config, validate, SimulationConfig, SystemConfig};
use crate::error::ConfigError;
use crate::executor::{SimulationExecutor, SimulationResults, SimulationStatus};
use crate::ocean::OceanScriptGenerator;
use crate::paths::{out_netlist_ocean, out_ocean, SCRIPTS_DIR};
use crate::shell::{run_wrapper, PackagePaths, RunOutcome, ShellScriptGenerator};
use crate::Result;

/// Number of output lines quoted when a run fails.
const FAILURE_TAIL_LINES: usize = 20;

/// A loaded simulation task together with where its artifacts go.
pub struct SimulationPlan {
    pub config: SimulationConfig,
    pub task_path: PathBuf,
    pub work_dir: PathBuf,
    pub output_dir: PathBuf,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TaskKey {
    LoadConfig,
    ValidateConfig,
    GenerateNetlist,
    GenerateNetlistWrapper,
    GenerateScript,
    GenerateWrapper,
    RunSimulation,
    CollectResults,
}

impl TaskKey {
    pub const ALL: [TaskKey; 8] = [
        TaskKey::LoadConfig,
        TaskKey::ValidateConfig,
        TaskKey::GenerateNetlist,
        TaskKey::GenerateNetlistWrapper,
        TaskKey::GenerateScript,
        TaskKey::GenerateWrapper,
        TaskKey::RunSimulation,
        TaskKey::CollectResults,
    ];

    pub fn description(&self) -> &'static str {
        match self {
            TaskKey::LoadConfig => "Load configuration",
            TaskKey::ValidateConfig => "Validate configuration",
            TaskKey::GenerateNetlist => "Generate netlist script",
            TaskKey::GenerateNetlistWrapper => "Generate netlist wrapper",
            TaskKey::GenerateScript => "Generate OCEAN script",
            TaskKey::GenerateWrapper => "Generate shell wrapper",
            TaskKey::RunSimulation => "Run simulation",
            TaskKey::CollectResults => "Collect results",
        }
    }
}

/// How a simulation is launched.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum RunMode {
    /// Through the generated shell wrapper.
    #[default]
    Package,
    /// By invoking the simulator directly.
    Direct,
}

pub struct ExecutePlanParams<'a> {
    pub plan: &'a SimulationPlan,
    pub tasks: &'a HashSet<TaskKey>,
    pub mode: RunMode,
    pub timeout: Duration,
    pub ctx: Option<&'a mut StepContext>,
}

/// Artifacts produced by [`execute_plan`]. Fields are `None` for tasks that did not run.
#[derive(Debug, Default)]
pub struct PlanOutput {
    pub netlist_script: Option<PathBuf>,
    pub netlist_wrapper: Option<PathBuf>,
    pub batch_script: Option<PathBuf>,
    pub simulation_script: Option<PathBuf>,
    pub package: Option<PackagePaths>,
    pub run: Option<RunOutcome>,
    pub status: Option<SimulationStatus>,
    pub results: Option<SimulationResults>,
}

pub fn generate_plan(
    task_path: impl AsRef<Path>,
    system: Option<&SystemConfig>,
    work_dir: impl Into<PathBuf>,
    output_dir: Option<PathBuf>,
) -> Result<SimulationPlan> {
    let task_path = task_path.as_ref();
    let config = load_task_config(task_path, system)
        .with_context(|| format!("failed to load task configuration {task_path:?}"))?;

    if config.project_name().is_empty() {
        bail!("library_name and cell_name must both be set");
    }

    let work_dir = work_dir.into();
    let output_dir = output_dir.unwrap_or_else(|| work_dir.join(SCRIPTS_DIR));

    Ok(SimulationPlan {
        config,
        task_path: task_path.to_path_buf(),
        work_dir,
        output_dir,
    })
}

macro_rules! try_finish_task {
    ( $ctx:expr, $task:expr ) => {
        if let Some(ctx) = $ctx.as_mut() {
            ctx.finish($task);
        }
    };
}

pub fn execute_plan(params: ExecutePlanParams) -> Result<PlanOutput> {
    let ExecutePlanParams {
        plan,
        tasks,
        mode,
        timeout,
        mut ctx,
    } = params;

    let config = &plan.config;
    let name = config.project_name();
    let mut output = PlanOutput::default();

    if tasks.contains(&TaskKey::ValidateConfig) {
        let errors = validate(config);
        if !errors.is_empty() {
            return Err(ConfigError::from_errors(&errors).into());
        }
        try_finish_task!(ctx, TaskKey::ValidateConfig);
    }

    if tasks.contains(&TaskKey::GenerateNetlist) {
        let path = OceanScriptGenerator::new(config)
            .save_netlist(out_netlist_ocean(&plan.output_dir, &name))?;
        info!("wrote netlist script {path:?}");
        output.netlist_script = Some(path);
        try_finish_task!(ctx, TaskKey::GenerateNetlist);
    }

    if tasks.contains(&TaskKey::GenerateNetlistWrapper) {
        let generator = ShellScriptGenerator::new(config);
        output.netlist_wrapper = Some(generator.generate_netlist_script(&plan.output_dir)?);
        // Runs the netlist wrapper and then the simulation wrapper.
        output.batch_script = Some(generator.generate_batch_script(&plan.output_dir)?);
        try_finish_task!(ctx, TaskKey::GenerateNetlistWrapper);
    }

    match mode {
        RunMode::Package => {
            if tasks.contains(&TaskKey::GenerateWrapper) {
                let package = ShellScriptGenerator::new(config)
                    .generate_complete_package(&plan.output_dir)?;
                output.simulation_script = Some(package.simulation_script.clone());
                try_finish_task!(ctx, TaskKey::GenerateScript);
                output.package = Some(package);
                try_finish_task!(ctx, TaskKey::GenerateWrapper);
            } else if tasks.contains(&TaskKey::GenerateScript) {
                let path =
                    OceanScriptGenerator::new(config).save(out_ocean(&plan.output_dir, &name))?;
                output.simulation_script = Some(path);
                try_finish_task!(ctx, TaskKey::GenerateScript);
            }

            if tasks.contains(&TaskKey::RunSimulation) {
                let Some(package) = output.package.as_ref() else {
                    bail!("the shell wrapper must be generated before running a package");
                };
                let outcome = run_wrapper(&package.shell_script, timeout)?;
                if !outcome.success {
                    bail!(failure_message(&outcome, timeout));
                }
                output.run = Some(outcome);
                try_finish_task!(ctx, TaskKey::RunSimulation);
            }
        }
        RunMode::Direct => {
            let mut executor = SimulationExecutor::new(config.clone(), &plan.work_dir);

            if tasks.contains(&TaskKey::GenerateScript) {
                output.simulation_script = Some(executor.prepare()?);
                try_finish_task!(ctx, TaskKey::GenerateScript);
            }

            if tasks.contains(&TaskKey::RunSimulation) {
                let (success, message) = executor.run(timeout)?;
                executor.cleanup(true)?;
                output.status = Some(executor.status());
                if !success {
                    bail!("simulation failed:\n{}", tail(&message, FAILURE_TAIL_LINES));
                }
                try_finish_task!(ctx, TaskKey::RunSimulation);
            }

            if tasks.contains(&TaskKey::CollectResults) {
                output.results = Some(executor.collect_results());
                try_finish_task!(ctx, TaskKey::CollectResults);
            }
        }
    }

    Ok(output)
}

fn failure_message(outcome: &RunOutcome, timeout: Duration) -> String {
    if outcome.timed_out {
        return format!("simulation timed out after {} seconds", timeout.as_secs());
    }
    let text = [outcome.stdout.as_str(), outcome.stderr.as_str()]
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .join("\n");
    format!("simulation failed:\n{}", tail(&text, FAILURE_TAIL_LINES))
}

/// The last `n` lines of `text`.
fn tail(text: &str, n: usize) -> String {
    let lines = text.lines().collect::<Vec<_>>();
    lines[lines.len().saturating_sub(n)..].join("\n")
}
