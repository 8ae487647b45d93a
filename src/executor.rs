//! Direct simulator invocation, bypassing the shell wrapper.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use serde::Serialize;
use walkdir::WalkDir;

use crate::config::{validate, SimulationConfig};
use crate::error::{ConfigError, ExecutionError};
use crate::ocean::OceanScriptGenerator;
use crate::paths::{out_ocean, out_run_log, LOGS_DIR, RESULTS_DIR, SCRIPTS_DIR, TEMP_DIR};
use crate::process::run_with_timeout;
use crate::Result;

pub const FALLBACK_EXECUTABLE: &str = "ocean";
pub const FALLBACK_ARGS: [&str; 2] = ["-nograph", "-replay"];

/// Environment variables set by a Cadence installation.
pub const CADENCE_VARS: [&str; 3] = ["CDS_ROOT", "MMSIM_ROOT", "CDS_INST_DIR"];

const RESULT_EXTENSIONS: [&str; 10] = [
    "log", "out", "raw", "tr0", "ac0", "dc0", "png", "pdf", "jpg", "jpeg",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationState {
    NotStarted,
    Prepared,
    Running,
    Completed,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationStatus {
    pub state: SimulationState,
    pub start_time: Option<DateTime<Local>>,
    pub end_time: Option<DateTime<Local>>,
    pub duration_secs: Option<f64>,
    pub work_dir: PathBuf,
    pub script: Option<PathBuf>,
    pub log_files: Vec<PathBuf>,
    pub results_dir: String,
    pub project_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Plot,
    Data,
    File,
}

impl ResultKind {
    /// Buckets a result file by extension, or `None` if it is not a result file.
    pub fn classify(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if !RESULT_EXTENSIONS.contains(&ext.as_str()) {
            return None;
        }
        Some(match ext.as_str() {
            "png" | "pdf" | "jpg" | "jpeg" => ResultKind::Plot,
            "raw" | "tr0" | "ac0" | "dc0" => ResultKind::Data,
            _ => ResultKind::File,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultFile {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub modified: Option<DateTime<Local>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationResults {
    pub state: SimulationState,
    pub files: Vec<ResultFile>,
    pub plots: Vec<ResultFile>,
    pub data: Vec<ResultFile>,
    pub logs: Vec<PathBuf>,
}

/// Returns `true` if `program` resolves to a file on `PATH`.
pub fn find_on_path(program: &str) -> bool {
    let Some(path) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path).any(|dir| dir.join(program).is_file())
}

fn probe_commands(simulator: &str) -> &'static [&'static str] {
    match simulator {
        "spectre" => &["spectre", "spectreX"],
        "virtuoso" => &["virtuoso"],
        _ => &[],
    }
}

/// Entries of `env` that differ from `base`. Everything else is inherited
/// untouched, including values that are not valid UTF-8.
fn changed_vars(
    base: &HashMap<String, String>,
    env: HashMap<String, String>,
) -> impl Iterator<Item = (String, String)> + '_ {
    env.into_iter().filter(move |(k, v)| base.get(k) != Some(v))
}

pub struct SimulationExecutor {
    config: SimulationConfig,
    work_dir: PathBuf,
    state: SimulationState,
    start_time: Option<DateTime<Local>>,
    end_time: Option<DateTime<Local>>,
    script: Option<PathBuf>,
    log_files: Vec<PathBuf>,
}

impl SimulationExecutor {
    pub fn new(config: SimulationConfig, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            work_dir: work_dir.into(),
            state: SimulationState::NotStarted,
            start_time: None,
            end_time: None,
            script: None,
            log_files: Vec::new(),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn script(&self) -> Option<&Path> {
        self.script.as_deref()
    }

    /// Validates the configuration, lays out the work directory and writes the
    /// OCEAN script into `scripts/`.
    pub fn prepare(&mut self) -> Result<PathBuf> {
        info!("preparing simulation in {:?}", self.work_dir);

        let errors = validate(&self.config);
        if !errors.is_empty() {
            for e in errors.iter() {
                error!("configuration error: {e}");
            }
            self.state = SimulationState::Failed;
            return Err(ConfigError::from_errors(&errors).into());
        }

        for dir in [SCRIPTS_DIR, RESULTS_DIR, LOGS_DIR, TEMP_DIR] {
            let dir = self.work_dir.join(dir);
            fs::create_dir_all(&dir)?;
            debug!("created {dir:?}");
        }

        let path = out_ocean(self.work_dir.join(SCRIPTS_DIR), &self.config.project_name());
        let script = OceanScriptGenerator::new(&self.config).save(path)?;
        info!("ocean script generated: {script:?}");
        self.script = Some(script.clone());

        if !self.check_environment() {
            warn!("simulator environment check failed; environment variables may need manual setup");
        }

        self.state = SimulationState::Prepared;
        Ok(script)
    }

    /// Looks for the simulator on `PATH` or a Cadence installation variable.
    pub fn check_environment(&self) -> bool {
        for cmd in probe_commands(&self.config.simulator.to_ascii_lowercase()) {
            if find_on_path(cmd) {
                info!("found simulator command: {cmd}");
                return true;
            }
        }
        for var in CADENCE_VARS {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    info!("found Cadence environment variable: {var}={value}");
                    return true;
                }
            }
        }
        false
    }

    fn command(&self, script: &Path) -> Command {
        let tool = self
            .config
            .tool()
            .ok()
            .filter(|t| !t.executable.trim().is_empty());

        let mut cmd = match tool {
            Some(tool) => {
                let mut cmd = Command::new(&tool.executable);
                cmd.args(&tool.launch_args);
                cmd
            }
            None => {
                let mut cmd = Command::new(FALLBACK_EXECUTABLE);
                cmd.args(FALLBACK_ARGS);
                cmd
            }
        };
        cmd.arg(script);

        let base: HashMap<String, String> = std::env::vars_os()
            .map(|(k, v)| (k.to_string_lossy().into_owned(), v.to_string_lossy().into_owned()))
            .collect();
        if let Ok(tool) = self.config.tool() {
            cmd.envs(changed_vars(&base, tool.environment(&base)));
        }
        cmd.current_dir(self.work_dir.join(TEMP_DIR));
        cmd
    }

    /// Runs the prepared script, returning success and the captured output.
    ///
    /// Every output line is written to a timestamped log under `logs/`.
    pub fn run(&mut self, timeout: Duration) -> Result<(bool, String)> {
        let script = self
            .script
            .clone()
            .ok_or(ExecutionError::ScriptNotGenerated)?;

        fs::create_dir_all(self.work_dir.join(TEMP_DIR))?;
        fs::create_dir_all(self.work_dir.join(LOGS_DIR))?;

        let start = Local::now();
        let run_log = out_run_log(&self.work_dir, &start.format("%Y%m%d_%H%M%S").to_string());
        let mut log_file = BufWriter::new(File::create(&run_log)?);
        self.log_files.push(run_log.clone());

        let cmd = self.command(&script);
        info!(
            "executing {} {:?} in {:?}",
            cmd.get_program().to_string_lossy(),
            cmd.get_args().collect::<Vec<_>>(),
            cmd.get_current_dir()
        );

        self.state = SimulationState::Running;
        self.start_time = Some(start);
        self.end_time = None;

        let mut lines = Vec::new();
        let mut write_error = None;
        let result = run_with_timeout(cmd, timeout, |_, line| {
            info!("simulation output: {line}");
            if write_error.is_none() {
                write_error = writeln!(log_file, "{line}").err();
            }
            lines.push(line.to_string());
        });

        let end = Local::now();
        self.end_time = Some(end);
        let output = match result {
            Ok(output) => output,
            Err(e) => {
                self.state = SimulationState::Failed;
                return Err(e.into());
            }
        };

        let (success, message) = if output.timed_out {
            self.state = SimulationState::TimedOut;
            let err = ExecutionError::Timeout {
                secs: timeout.as_secs(),
            };
            error!("{err}");
            (false, err.to_string())
        } else if output.success() {
            self.state = SimulationState::Completed;
            info!(
                "simulation completed in {:.1}s",
                (end - start).num_milliseconds() as f64 / 1000.0
            );
            (true, lines.join("\n"))
        } else {
            self.state = SimulationState::Failed;
            error!("simulation failed with {:?}", output.status);
            (false, lines.join("\n"))
        };

        if let Some(e) = write_error {
            warn!("failed to write run log {run_log:?}: {e}");
        }
        writeln!(log_file, "status: {:?}", self.state)?;
        log_file.flush()?;

        Ok((success, message))
    }

    pub fn status(&self) -> SimulationStatus {
        let duration_secs = match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        };
        SimulationStatus {
            state: self.state,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_secs,
            work_dir: self.work_dir.clone(),
            script: self.script.clone(),
            log_files: self.log_files.clone(),
            results_dir: self.config.results_dir(),
            project_name: self.config.project_name(),
        }
    }

    /// Walks the results directory and buckets result files by extension.
    pub fn collect_results(&self) -> SimulationResults {
        let mut results = SimulationResults {
            state: self.state,
            files: Vec::new(),
            plots: Vec::new(),
            data: Vec::new(),
            logs: self.log_files.clone(),
        };

        let results_dir = self.config.results_dir();
        if results_dir.is_empty() || !Path::new(&results_dir).is_dir() {
            return results;
        }

        for entry in WalkDir::new(&results_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let Some(kind) = ResultKind::classify(entry.path()) else {
                continue;
            };
            let metadata = entry.metadata().ok();
            let file = ResultFile {
                path: entry.path().to_path_buf(),
                name: entry.file_name().to_string_lossy().to_string(),
                size: metadata.as_ref().map(|m| m.len()).unwrap_or(0),
                modified: metadata
                    .and_then(|m| m.modified().ok())
                    .map(DateTime::<Local>::from),
            };
            match kind {
                ResultKind::Plot => results.plots.push(file),
                ResultKind::Data => results.data.push(file),
                ResultKind::File => results.files.push(file),
            }
        }
        results
    }

    /// Removes `temp/`; unless `keep_results`, also removes results and scripts.
    pub fn cleanup(&mut self, keep_results: bool) -> Result<()> {
        remove_dir(&self.work_dir.join(TEMP_DIR))?;
        if !keep_results {
            let results_dir = self.config.results_dir();
            if !results_dir.is_empty() {
                remove_dir(Path::new(&results_dir))?;
            }
            remove_dir(&self.work_dir.join(SCRIPTS_DIR))?;
            self.script = None;
        }
        Ok(())
    }
}

fn remove_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
        info!("removed {dir:?}");
    }
    Ok(())
}
