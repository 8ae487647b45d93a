use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::plan::RunMode;

pub const DEFAULT_SYSTEM_CONFIG: &str = "system_config.yaml";
pub const DEFAULT_WORK_DIR: &str = ".sim_work";
pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about,
    help_template(
        "{before-help}{name} {version}\n{author-with-newline}{about-with-newline}\n{usage-heading} {usage}\n\n{all-args}{after-help}"
    )
)]
pub struct Args {
    /// Path to the system YAML configuration (server and EDA tools).
    #[arg(long, global = true)]
    pub system_config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage EDA tool records on the server.
    #[command(subcommand)]
    Tool(ToolCommand),
    /// Manage PDK records on the server.
    #[command(subcommand)]
    Pdk(PdkCommand),
    /// Manage projects on the server.
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Generate and run simulations.
    #[command(subcommand)]
    Simulation(SimulationCommand),
}

#[derive(ClapArgs, Debug)]
pub struct ToolFields {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long = "version")]
    pub tool_version: Option<String>,
    /// Command used to launch the tool.
    #[arg(long)]
    pub launch_command: Option<String>,
    #[arg(long)]
    pub vendor: Option<String>,
    /// Environment line (`export NAME=value` or `source FILE`); repeatable.
    #[arg(long = "env-var")]
    pub env_vars: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum ToolCommand {
    Create(ToolFields),
    Get {
        #[arg(long)]
        tool_id: String,
    },
    List,
    Update {
        #[arg(long)]
        tool_id: String,
        #[command(flatten)]
        fields: ToolFields,
    },
    Delete {
        #[arg(long)]
        tool_id: String,
    },
}

#[derive(ClapArgs, Debug)]
pub struct PdkFields {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long = "version")]
    pub pdk_version: Option<String>,
    #[arg(long)]
    pub process: Option<String>,
    #[arg(long)]
    pub vendor: Option<String>,
    #[arg(long)]
    pub root_path: Option<String>,
    #[arg(long)]
    pub drc_path: Option<String>,
    #[arg(long)]
    pub lvs_path: Option<String>,
    #[arg(long)]
    pub xrc_path: Option<String>,
    #[arg(long)]
    pub spectre_path: Option<String>,
    #[arg(long)]
    pub hspice_path: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum PdkCommand {
    Create(PdkFields),
    Get {
        #[arg(long)]
        pdk_id: String,
    },
    List,
    Update {
        #[arg(long)]
        pdk_id: String,
        #[command(flatten)]
        fields: PdkFields,
    },
    Delete {
        #[arg(long)]
        pdk_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Owner user id; defaults to the caller.
        #[arg(long)]
        owner: Option<String>,
    },
    /// Replace the member list with a JSON array of `{userId, role}`.
    Members {
        #[arg(long)]
        project_id: String,
        #[arg(long)]
        members: String,
    },
    Directory {
        #[arg(long)]
        project_id: String,
        #[arg(long)]
        path: String,
    },
    Pdk {
        #[arg(long)]
        project_id: String,
        #[arg(long)]
        path: String,
    },
    /// Replace the library list with a JSON array of `{name, cells}`.
    Libraries {
        #[arg(long)]
        project_id: String,
        #[arg(long)]
        libraries: String,
    },
    /// Set the project's EDA tool configuration from a JSON object.
    Eda {
        #[arg(long)]
        project_id: String,
        #[arg(long)]
        config: String,
    },
    Get {
        #[arg(long)]
        project_id: String,
    },
    List,
    Delete {
        #[arg(long)]
        project_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum SimulationCommand {
    /// Generate the OCEAN script and shell wrapper without running them.
    Generate {
        /// Path to the task YAML configuration.
        #[arg(short, long)]
        config: PathBuf,

        /// Directory to which generated scripts are saved (default `<work-dir>/scripts`).
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        #[arg(short, long, default_value = DEFAULT_WORK_DIR)]
        work_dir: PathBuf,
    },
    /// Generate the netlist-creation script.
    Netlist {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(short, long, default_value = DEFAULT_WORK_DIR)]
        work_dir: PathBuf,

        /// Also write a shell wrapper for the netlist script.
        #[arg(long)]
        shell: bool,
    },
    /// Generate and run a simulation.
    Run {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(short, long, default_value = DEFAULT_WORK_DIR)]
        work_dir: PathBuf,

        /// Timeout in seconds.
        #[arg(short, long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout: u64,

        #[arg(long, value_enum, default_value_t = RunMode::Package)]
        mode: RunMode,
    },
    /// Interactive menu.
    Interactive {
        #[arg(short, long, default_value = DEFAULT_WORK_DIR)]
        work_dir: PathBuf,
    },
}
