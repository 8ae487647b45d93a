//! Shell wrappers that set up the tool environment and launch the simulator.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::Context as _;
use log::{debug, error, info};
use serde::Serialize;
use tera::Context;

use crate::config::{EdaTool, SimulationConfig};
use crate::ocean::{write_script, OceanScriptGenerator};
use crate::paths::{out_netlist_ocean, out_ocean, out_run_dir, out_shell};
use crate::process::run_with_timeout;
use crate::{Result, TEMPLATES};

pub const MAIN_SCRIPT: &str = "shell/main_script.sh";
pub const NETLIST_SCRIPT: &str = "shell/netlist_script.sh";
pub const BATCH_SCRIPT: &str = "shell/batch_script.sh";

pub const KIND_OCEAN: &str = "ocean";
pub const KIND_NETLIST: &str = "netlist";
pub const KIND_BATCH: &str = "batch";

#[derive(Serialize)]
struct MainScriptParams<'a> {
    project_name: &'a str,
    simulator: &'a str,
    version: &'a str,
    source_commands: Vec<String>,
    export_commands: Vec<String>,
    run_dir: String,
    executable: &'a str,
    launch_args: &'a [String],
    target_script: String,
}

#[derive(Serialize)]
struct NetlistScriptParams<'a> {
    project_name: &'a str,
    simulator: &'a str,
    version: &'a str,
    source_commands: Vec<String>,
    export_commands: Vec<String>,
    netlist_script: String,
    design_path_dir: String,
    ocean_cmd: &'a str,
    launch_args: &'a [String],
}

#[derive(Serialize)]
struct BatchScriptParams<'a> {
    project_name: &'a str,
    version: &'a str,
    netlist_wrapper: String,
    simulation_wrapper: String,
}

/// Paths written by [`ShellScriptGenerator::generate_complete_package`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackagePaths {
    pub simulation_script: PathBuf,
    pub shell_script: PathBuf,
}

/// Result of running a generated package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Command used to drive netlisting for a simulator.
pub fn ocean_command(simulator: &str) -> &str {
    match simulator {
        "spectre" | "virtuoso" => "ocean",
        other => other,
    }
}

pub struct ShellScriptGenerator<'a> {
    config: &'a SimulationConfig,
}

impl<'a> ShellScriptGenerator<'a> {
    pub fn new(config: &'a SimulationConfig) -> Self {
        Self { config }
    }

    fn tool(&self) -> Result<&'a EdaTool> {
        Ok(self.config.tool()?)
    }

    fn project_name(&self) -> Result<String> {
        let name = self.config.project_name();
        if name.is_empty() {
            anyhow::bail!("library_name and cell_name must be set to name generated scripts");
        }
        Ok(name)
    }

    /// Writes the simulation wrapper that runs `target_script`.
    ///
    /// A relative `target_script` is resolved against the wrapper's own directory
    /// at run time.
    pub fn generate_shell_script(
        &self,
        target_script: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
    ) -> Result<PathBuf> {
        let tool = self.tool()?;
        let project_name = self.project_name()?;
        let target_script = target_script.as_ref();
        let target_script = if target_script.is_absolute() {
            target_script.to_string_lossy().to_string()
        } else {
            format!("$SCRIPT_DIR/{}", target_script.to_string_lossy())
        };

        let params = MainScriptParams {
            project_name: &project_name,
            simulator: &self.config.simulator,
            version: env!("CARGO_PKG_VERSION"),
            source_commands: tool.source_commands(),
            export_commands: tool.export_commands(),
            run_dir: file_name(&out_run_dir("", &project_name)),
            executable: &tool.executable,
            launch_args: &tool.launch_args,
            target_script,
        };
        let script = TEMPLATES.render(MAIN_SCRIPT, &Context::from_serialize(params)?)?;
        let path = out_shell(output_dir, &project_name, KIND_OCEAN);
        save_executable(&path, &script)
    }

    /// Writes the netlist wrapper, which runs `<project>_netlist.ocn` from the
    /// directory holding the design netlist.
    pub fn generate_netlist_script(&self, output_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let tool = self.tool()?;
        let project_name = self.project_name()?;
        let design_path = self.config.design_path();
        let design_path_dir = Path::new(&design_path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        let params = NetlistScriptParams {
            project_name: &project_name,
            simulator: &self.config.simulator,
            version: env!("CARGO_PKG_VERSION"),
            source_commands: tool.source_commands(),
            export_commands: tool.export_commands(),
            netlist_script: file_name(&out_netlist_ocean("", &project_name)),
            design_path_dir,
            ocean_cmd: ocean_command(&self.config.simulator),
            launch_args: &tool.launch_args,
        };
        let script = TEMPLATES.render(NETLIST_SCRIPT, &Context::from_serialize(params)?)?;
        let path = out_shell(output_dir, &project_name, KIND_NETLIST);
        save_executable(&path, &script)
    }

    /// Writes a wrapper running the netlist and simulation wrappers in sequence.
    pub fn generate_batch_script(&self, output_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let project_name = self.project_name()?;
        let params = BatchScriptParams {
            project_name: &project_name,
            version: env!("CARGO_PKG_VERSION"),
            netlist_wrapper: file_name(&out_shell("", &project_name, KIND_NETLIST)),
            simulation_wrapper: file_name(&out_shell("", &project_name, KIND_OCEAN)),
        };
        let script = TEMPLATES.render(BATCH_SCRIPT, &Context::from_serialize(params)?)?;
        let path = out_shell(output_dir, &project_name, KIND_BATCH);
        save_executable(&path, &script)
    }

    /// Writes the OCEAN script followed by the wrapper that runs it.
    pub fn generate_complete_package(&self, output_dir: impl AsRef<Path>) -> Result<PackagePaths> {
        let output_dir = output_dir.as_ref();
        // Fail before touching the disk if the simulator has no tool entry.
        self.tool()?;
        let project_name = self.project_name()?;

        let script_path = out_ocean(output_dir, &project_name);
        let simulation_script = OceanScriptGenerator::new(self.config).save(&script_path)?;
        info!("wrote simulation script {simulation_script:?}");

        let shell_script = self.generate_shell_script(file_name(&script_path), output_dir)?;
        info!("wrote shell wrapper {shell_script:?}");

        Ok(PackagePaths {
            simulation_script,
            shell_script,
        })
    }
}

fn save_executable(path: &Path, contents: &str) -> Result<PathBuf> {
    let path = write_script(path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .with_context(|| format!("failed to mark {path:?} executable"))?;
    }
    debug!("wrote {path:?}");
    Ok(path)
}

/// Runs a generated wrapper with `bash` from the wrapper's directory.
///
/// The child is killed once `timeout` elapses.
pub fn run_wrapper(shell_script: &Path, timeout: Duration) -> Result<RunOutcome> {
    let cwd = shell_script
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    info!("running {shell_script:?} in {cwd:?}");
    let mut cmd = Command::new("bash");
    cmd.arg(shell_script).current_dir(&cwd);
    let output = run_with_timeout(cmd, timeout, |_, line| debug!("{line}"))?;

    if output.timed_out {
        error!("simulation timed out after {} seconds", timeout.as_secs());
    }

    Ok(RunOutcome {
        success: output.success(),
        timed_out: output.timed_out,
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

/// Generates the complete package and runs its wrapper.
pub fn run_package(
    config: &SimulationConfig,
    output_dir: impl AsRef<Path>,
    timeout: Duration,
) -> Result<RunOutcome> {
    let package = ShellScriptGenerator::new(config).generate_complete_package(output_dir)?;
    run_wrapper(&package.shell_script, timeout)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::config::EdaTools;

    fn config(root: &Path, tool: EdaTool) -> SimulationConfig {
        SimulationConfig::builder()
            .project_dir(root.to_string_lossy().to_string())
            .library_name("amp_lib")
            .cell_name("ota")
            .simulation_path(root.join("sim").to_string_lossy().to_string())
            .eda_tools([("spectre", tool)].into_iter().collect::<EdaTools>())
            .build()
            .unwrap()
    }

    fn ocean_tool() -> EdaTool {
        EdaTool::new("ocean")
            .launch_args(["-nograph", "-replay"])
            .environment_variables([
                "export CDS_ROOT=/opt/cadence",
                "source /opt/cadence/setup.sh",
                "PATH=$CDS_ROOT/bin:$PATH",
            ])
    }

    #[test]
    fn wrapper_sources_then_exports_then_launches() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), ocean_tool());
        let path = ShellScriptGenerator::new(&config)
            .generate_shell_script("amp_lib_ota.ocn", dir.path())
            .unwrap();

        assert_eq!(file_name(&path), "run_amp_lib_ota_ocean.sh");
        let script = fs::read_to_string(&path).unwrap();
        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("set -o pipefail"));

        let source = script.find("source /opt/cadence/setup.sh").unwrap();
        let export_root = script.find("export CDS_ROOT=/opt/cadence").unwrap();
        let export_path = script.find("export PATH=$CDS_ROOT/bin:$PATH").unwrap();
        let mkdir = script.find("mkdir -p").unwrap();
        let launch = script
            .find("ocean -nograph -replay \"$SCRIPT_DIR/amp_lib_ota.ocn\"")
            .unwrap();
        assert!(source < export_root && export_root < export_path);
        assert!(export_path < mkdir && mkdir < launch);
        assert!(script.contains("amp_lib_ota_run"));
        assert!(script.contains("tee \"amp_lib_ota.log\""));
    }

    #[cfg(unix)]
    #[test]
    fn wrapper_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), ocean_tool());
        let path = ShellScriptGenerator::new(&config)
            .generate_batch_script(dir.path())
            .unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn netlist_wrapper_uses_ocean_command_and_design_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), ocean_tool());
        let path = ShellScriptGenerator::new(&config)
            .generate_netlist_script(dir.path())
            .unwrap();

        assert_eq!(file_name(&path), "run_amp_lib_ota_netlist.sh");
        let script = fs::read_to_string(&path).unwrap();
        let design_dir = Path::new(&config.design_path())
            .parent()
            .unwrap()
            .to_string_lossy()
            .to_string();
        assert!(script.contains(&format!("cd \"{design_dir}\"")));
        assert!(script.contains("amp_lib_ota_netlist.ocn"));
        assert!(script.contains("ocean -nograph -replay \"$NETLIST_SCRIPT\""));
    }

    #[test]
    fn ocean_command_by_simulator() {
        assert_eq!(ocean_command("spectre"), "ocean");
        assert_eq!(ocean_command("virtuoso"), "ocean");
        assert_eq!(ocean_command("hspice"), "hspice");
    }

    #[test]
    fn package_without_tool_fails_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), ocean_tool());
        config.simulator = "hspice".to_string();
        let out = dir.path().join("out");

        assert!(ShellScriptGenerator::new(&config)
            .generate_complete_package(&out)
            .is_err());
        assert!(!out.exists());
    }

    #[test]
    fn complete_package_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), ocean_tool());
        let out = dir.path().join("scripts");
        let paths = ShellScriptGenerator::new(&config)
            .generate_complete_package(&out)
            .unwrap();

        assert_eq!(file_name(&paths.simulation_script), "amp_lib_ota.ocn");
        assert_eq!(file_name(&paths.shell_script), "run_amp_lib_ota_ocean.sh");
        assert!(paths.simulation_script.is_absolute());
        assert!(fs::read_to_string(&paths.simulation_script)
            .unwrap()
            .contains("run()"));
    }

    #[cfg(unix)]
    #[test]
    fn run_package_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        let tool = EdaTool::new("cat").environment_variables(["export ANASIM_TEST=1"]);
        let config = config(dir.path(), tool);

        let outcome = run_package(&config, dir.path().join("scripts"), Duration::from_secs(30))
            .unwrap();
        assert!(outcome.success, "{outcome:?}");
        assert!(!outcome.timed_out);
        assert!(outcome.stdout.contains("simulator('spectre)"));
        assert!(dir
            .path()
            .join("scripts/amp_lib_ota_run/amp_lib_ota.log")
            .is_file());
    }

    #[cfg(unix)]
    #[test]
    fn run_package_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let tool = EdaTool::new("sleep 30 #");
        let config = config(dir.path(), tool);

        let outcome = run_package(
            &config,
            dir.path().join("scripts"),
            Duration::from_millis(500),
        )
        .unwrap();
        assert!(outcome.timed_out);
        assert!(!outcome.success);
    }
}
