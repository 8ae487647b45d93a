use std::collections::HashSet;
use std::fs::canonicalize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::warn;
use serde_json::Value;

use crate::cli::args::{
    Args, Command, PdkCommand, PdkFields, ProjectCommand, SimulationCommand, ToolCommand,
    ToolFields, DEFAULT_SYSTEM_CONFIG,
};
use crate::cli::progress::StepContext;
use crate::config::{load_system_config, SimulationConfig, SystemConfig};
use crate::executor::{SimulationResults, SimulationStatus};
use crate::plan::{execute_plan, generate_plan, ExecutePlanParams, PlanOutput, RunMode, TaskKey};
use crate::service::{
    EdaToolService, PdkService, PdkSpec, PdkUpdate, ProjectService, ServiceClient, ToolSpec,
    ToolUpdate,
};
use crate::Result;

pub mod args;
pub mod interactive;
pub mod progress;

pub const BANNER: &str = r"
   __ _ _ __   __ _ ___(_)_ __ ___
  / _` | '_ \ / _` / __| | '_ ` _ \
 | (_| | | | | (_| \__ \ | | | | | |
  \__,_|_| |_|\__,_|___/_|_| |_| |_|

ANASIM v0.2
";

pub fn run() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let system = load_system(args.system_config.as_deref())?;

    match args.command {
        Command::Tool(cmd) => run_tool(cmd, system.as_ref()),
        Command::Pdk(cmd) => run_pdk(cmd, system.as_ref()),
        Command::Project(cmd) => run_project(cmd, system.as_ref()),
        Command::Simulation(cmd) => run_simulation(cmd, system),
    }
}

/// Loads the system configuration.
///
/// The default path is optional; an explicitly given path must exist.
pub fn load_system(path: Option<&Path>) -> Result<Option<SystemConfig>> {
    let (path, explicit) = match path {
        Some(path) => (path, true),
        None => (Path::new(DEFAULT_SYSTEM_CONFIG), false),
    };
    if !explicit && !path.exists() {
        warn!("system configuration {path:?} not found; continuing without it");
        return Ok(None);
    }
    let system = load_system_config(path)
        .with_context(|| format!("failed to load system configuration {path:?}"))?;
    Ok(Some(system))
}

fn client(system: Option<&SystemConfig>) -> Result<ServiceClient> {
    let server = system.map(|s| s.server.clone()).unwrap_or_default();
    Ok(ServiceClient::from_server(&server)?)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_json(flag: &str, text: &str) -> Result<Value> {
    serde_json::from_str(text).with_context(|| format!("--{flag} must be valid JSON"))
}

fn run_tool(cmd: ToolCommand, system: Option<&SystemConfig>) -> Result<()> {
    let service = EdaToolService::new(client(system)?);
    match cmd {
        ToolCommand::Create(fields) => {
            let ToolFields {
                name,
                tool_version,
                launch_command,
                vendor,
                env_vars,
            } = fields;
            let tool = ToolSpec {
                name: name.context("--name is required to create a tool")?,
                version: tool_version.unwrap_or_default(),
                launch_command: launch_command.unwrap_or_default(),
                vendor: vendor.unwrap_or_default(),
                environment_variables: env_vars,
            };
            print_json(&service.create(&tool)?)
        }
        ToolCommand::Get { tool_id } => print_json(&service.get(&tool_id)?),
        ToolCommand::List => print_json(&Value::Array(service.list()?)),
        ToolCommand::Update { tool_id, fields } => {
            let update = ToolUpdate {
                name: fields.name,
                version: fields.tool_version,
                launch_command: fields.launch_command,
                vendor: fields.vendor,
                environment_variables: (!fields.env_vars.is_empty()).then_some(fields.env_vars),
            };
            print_json(&service.update(&tool_id, &update)?)
        }
        ToolCommand::Delete { tool_id } => {
            service.delete(&tool_id)?;
            println!("Deleted tool {tool_id}");
            Ok(())
        }
    }
}

fn pdk_update(fields: PdkFields) -> PdkUpdate {
    PdkUpdate {
        name: fields.name,
        version: fields.pdk_version,
        process: fields.process,
        vendor: fields.vendor,
        root_path: fields.root_path,
        drc_path: fields.drc_path,
        lvs_path: fields.lvs_path,
        xrc_path: fields.xrc_path,
        spectre_path: fields.spectre_path,
        hspice_path: fields.hspice_path,
    }
}

fn run_pdk(cmd: PdkCommand, system: Option<&SystemConfig>) -> Result<()> {
    let service = PdkService::new(client(system)?);
    match cmd {
        PdkCommand::Create(fields) => {
            let fields = pdk_update(fields);
            let pdk = PdkSpec {
                name: fields.name.context("--name is required to create a PDK")?,
                version: fields.version.unwrap_or_default(),
                process: fields.process.unwrap_or_default(),
                vendor: fields.vendor.unwrap_or_default(),
                root_path: fields.root_path.unwrap_or_default(),
                drc_path: fields.drc_path.unwrap_or_default(),
                lvs_path: fields.lvs_path.unwrap_or_default(),
                xrc_path: fields.xrc_path.unwrap_or_default(),
                spectre_path: fields.spectre_path.unwrap_or_default(),
                hspice_path: fields.hspice_path.unwrap_or_default(),
            };
            print_json(&service.create(&pdk)?)
        }
        PdkCommand::Get { pdk_id } => print_json(&service.get(&pdk_id)?),
        PdkCommand::List => print_json(&Value::Array(service.list()?)),
        PdkCommand::Update { pdk_id, fields } => {
            print_json(&service.update(&pdk_id, &pdk_update(fields))?)
        }
        PdkCommand::Delete { pdk_id } => {
            service.delete(&pdk_id)?;
            println!("Deleted PDK {pdk_id}");
            Ok(())
        }
    }
}

fn run_project(cmd: ProjectCommand, system: Option<&SystemConfig>) -> Result<()> {
    let service = ProjectService::new(client(system)?);
    let response = match cmd {
        ProjectCommand::Create {
            name,
            description,
            owner,
        } => service.create(&name, &description, owner.as_deref())?,
        ProjectCommand::Members {
            project_id,
            members,
        } => service.members(&project_id, parse_json("members", &members)?)?,
        ProjectCommand::Directory { project_id, path } => service.directory(&project_id, &path)?,
        ProjectCommand::Pdk { project_id, path } => service.pdk(&project_id, &path)?,
        ProjectCommand::Libraries {
            project_id,
            libraries,
        } => service.libraries(&project_id, parse_json("libraries", &libraries)?)?,
        ProjectCommand::Eda { project_id, config } => {
            service.eda_tools(&project_id, &parse_json("config", &config)?)?
        }
        ProjectCommand::Get { project_id } => service.get(&project_id)?,
        ProjectCommand::List => Value::Array(service.list()?),
        ProjectCommand::Delete { project_id } => {
            service.delete(&project_id)?;
            println!("Deleted project {project_id}");
            return Ok(());
        }
    };
    print_json(&response)
}

/// Creates `work_dir` and returns its absolute path.
pub(crate) fn prepare_work_dir(work_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(work_dir)
        .with_context(|| format!("failed to create work directory {work_dir:?}"))?;
    Ok(canonicalize(work_dir)?)
}

/// Tasks making up a simulation run in the given mode.
pub fn run_tasks(mode: RunMode) -> HashSet<TaskKey> {
    let mut tasks = HashSet::from([
        TaskKey::LoadConfig,
        TaskKey::ValidateConfig,
        TaskKey::GenerateScript,
        TaskKey::RunSimulation,
    ]);
    match mode {
        RunMode::Package => tasks.insert(TaskKey::GenerateWrapper),
        RunMode::Direct => tasks.insert(TaskKey::CollectResults),
    };
    tasks
}

fn run_simulation(cmd: SimulationCommand, system: Option<SystemConfig>) -> Result<()> {
    let (config_path, work_dir, output_dir, tasks, mode, timeout) = match cmd {
        SimulationCommand::Interactive { work_dir } => {
            let work_dir = prepare_work_dir(&work_dir)?;
            println!("{BANNER}");
            let stdin = io::stdin();
            return interactive::Session::new(work_dir, system, stdin.lock(), io::stdout())
                .run();
        }
        SimulationCommand::Generate {
            config,
            output_dir,
            work_dir,
        } => (
            config,
            work_dir,
            output_dir,
            HashSet::from([
                TaskKey::LoadConfig,
                TaskKey::GenerateScript,
                TaskKey::GenerateWrapper,
            ]),
            RunMode::Package,
            0,
        ),
        SimulationCommand::Netlist {
            config,
            work_dir,
            shell,
        } => {
            let mut tasks = HashSet::from([TaskKey::LoadConfig, TaskKey::GenerateNetlist]);
            if shell {
                tasks.insert(TaskKey::GenerateNetlistWrapper);
            }
            (config, work_dir, None, tasks, RunMode::Package, 0)
        }
        SimulationCommand::Run {
            config,
            work_dir,
            timeout,
            mode,
        } => (config, work_dir, None, run_tasks(mode), mode, timeout),
    };

    println!("{BANNER}");
    let config_path = canonicalize(&config_path)
        .with_context(|| format!("task configuration {config_path:?} not found"))?;
    let work_dir = prepare_work_dir(&work_dir)?;
    println!("Configuration file: {:?}", &config_path);
    println!("Work directory: {:?}\n", &work_dir);

    let mut ctx = StepContext::new(&tasks);

    let plan = ctx.check(generate_plan(
        &config_path,
        system.as_ref(),
        &work_dir,
        output_dir,
    ))?;
    ctx.finish(TaskKey::LoadConfig);

    let res = execute_plan(ExecutePlanParams {
        plan: &plan,
        tasks: &tasks,
        mode,
        timeout: Duration::from_secs(timeout),
        ctx: Some(&mut ctx),
    });
    let output = ctx.check(res)?;

    let mut stdout = io::stdout();
    write_config_summary(&mut stdout, &plan.config)?;
    write_plan_output(&mut stdout, &output)?;
    println!("Artifacts saved to: {:?}\n", &plan.output_dir);

    Ok(())
}

pub fn write_config_summary(out: &mut impl Write, config: &SimulationConfig) -> io::Result<()> {
    writeln!(out, "Simulation parameters:")?;
    writeln!(out, "\tProject: {}", config.project_name())?;
    writeln!(out, "\tSimulator: {}", config.simulator)?;
    writeln!(out, "\tLibrary: {}", config.library_name)?;
    writeln!(out, "\tCell: {}", config.cell_name)?;
    writeln!(out, "\tDesign type: {}", config.design_type)?;
    writeln!(out, "\tDesign path: {}", config.design_path())?;
    writeln!(out, "\tResults directory: {}", config.results_dir())?;
    writeln!(out, "\tTemperature: {} C", config.temperature)?;
    writeln!(out, "\tSupply voltage: {} V", config.supply_voltage)?;
    writeln!(
        out,
        "\tAnalyses: {}",
        config.analyses.keys().cloned().collect::<Vec<_>>().join(", ")
    )?;
    writeln!(out, "\tModel files: {}", config.model_files.len())?;
    writeln!(out, "\tDesign variables: {}", config.design_variables.len())?;
    writeln!(out, "\tSaved nodes: {}", config.save_nodes.len())?;
    Ok(())
}

pub fn write_plan_output(out: &mut impl Write, output: &PlanOutput) -> io::Result<()> {
    if let Some(path) = &output.netlist_script {
        writeln!(out, "Netlist script: {path:?}")?;
    }
    if let Some(path) = &output.netlist_wrapper {
        writeln!(out, "Netlist wrapper: {path:?}")?;
    }
    if let Some(path) = &output.batch_script {
        writeln!(out, "Batch wrapper: {path:?}")?;
    }
    if let Some(path) = &output.simulation_script {
        writeln!(out, "Simulation script: {path:?}")?;
    }
    if let Some(package) = &output.package {
        writeln!(out, "Shell wrapper: {:?}", package.shell_script)?;
    }
    if output.run.is_some() {
        writeln!(out, "Simulation completed successfully")?;
    }
    if let Some(status) = &output.status {
        write_results_summary(out, status, output.results.as_ref())?;
    }
    Ok(())
}

pub fn write_results_summary(
    out: &mut impl Write,
    status: &SimulationStatus,
    results: Option<&SimulationResults>,
) -> io::Result<()> {
    writeln!(out, "Simulation results:")?;
    writeln!(out, "\tStatus: {:?}", status.state)?;
    if let Some(secs) = status.duration_secs {
        writeln!(out, "\tDuration: {secs:.1}s")?;
    }
    writeln!(out, "\tResults directory: {}", status.results_dir)?;
    if let Some(results) = results {
        writeln!(out, "\tFiles: {}", results.files.len())?;
        writeln!(out, "\tPlots: {}", results.plots.len())?;
        writeln!(out, "\tData files: {}", results.data.len())?;
    }
    Ok(())
}
