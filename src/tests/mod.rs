use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::run_tasks;
use crate::config::{load_and_validate, load_system_config};
use crate::executor::SimulationState;
use crate::plan::{execute_plan, generate_plan, ExecutePlanParams, RunMode, TaskKey};
use crate::shell::ShellScriptGenerator;


use fixtures::Workspace;

/// Finds each needle in order, panicking with the missing one.
fn assert_in_order(haystack: &str, needles: &[&str]) {
    let mut from = 0;
    for needle in needles {
        match haystack[from..].find(needle) {
            Some(pos) => from += pos + needle.len(),
            None => panic!("`{needle}` not found after offset {from} in:\n{haystack}"),
        }
    }
}

#[test]
fn layered_config_generates_complete_package() {
    let ws = Workspace::new("ocean");
    let system = load_system_config(ws.system_config()).unwrap();
    let config = load_and_validate(ws.task(), Some(&system)).unwrap();

    assert_eq!(config.project_name(), "amp_lib_ota");
    assert_eq!(config.temperature, 85.0);
    assert_eq!(config.supply_voltage, 3.3);
    assert_eq!(config.server.url, "http://localhost:9000");

    let out = ws.root().join("out");
    let package = ShellScriptGenerator::new(&config)
        .generate_complete_package(&out)
        .unwrap();

    let script = fs::read_to_string(&package.simulation_script).unwrap();
    assert_in_order(
        &script,
        &[
            ";; OCEAN simulation script: amp_lib_ota",
            "simulator('spectre)",
            &format!("design(\"{}\")", config.design_path()),
            &format!("resultsDir(\"{}\")", config.results_dir()),
            "modelFile(",
            "\"tt\")",
            "stimulusFile(?xlate nil",
            "desVar(\"vdd\" 3.3)",
            "desVar(\"wn\" \"2u\")",
            "analysis('tran",
            "?stop \"10n\"",
            "analysis('dc",
            "; PZ analysis configuration",
            "save('v \"out\" \"in\")",
            "ic(\"out\" 0)",
            "temp(85)",
            "run()",
            "selectResult('tran)",
            "plot(v(\"out\"))",
            "ocnPrint(?output",
        ],
    );
    assert!(Path::new(&config.results_dir()).is_dir());

    let wrapper = fs::read_to_string(&package.shell_script).unwrap();
    assert_in_order(
        &wrapper,
        &[
            "source ",
            "export CDS_ROOT=",
            "ocean -nograph -replay \"$SCRIPT_DIR/amp_lib_ota.ocn\"",
        ],
    );
}

#[test]
fn validation_failure_stops_plan() {
    let ws = Workspace::new("ocean");
    fs::remove_file(ws.model_file()).unwrap();
    fs::remove_file(ws.stimulus_file()).unwrap();

    let plan = generate_plan(ws.task(), None, ws.work_dir(), None).unwrap();
    let err = execute_plan(ExecutePlanParams {
        plan: &plan,
        tasks: &run_tasks(RunMode::Package),
        mode: RunMode::Package,
        timeout: Duration::from_secs(30),
        ctx: None,
    })
    .unwrap_err()
    .to_string();

    assert!(err.starts_with("configuration validation failed:\n"));
    assert!(err.contains("model file"));
    assert!(err.contains("stimulus file"));
    assert!(!plan.output_dir.exists());
}

#[test]
fn netlist_plan_writes_netlist_artifacts() {
    let ws = Workspace::new("ocean");
    let system = load_system_config(ws.system_config()).unwrap();
    let plan = generate_plan(ws.task(), Some(&system), ws.work_dir(), None).unwrap();

    let output = execute_plan(ExecutePlanParams {
        plan: &plan,
        tasks: &HashSet::from([TaskKey::GenerateNetlist, TaskKey::GenerateNetlistWrapper]),
        mode: RunMode::Package,
        timeout: Duration::ZERO,
        ctx: None,
    })
    .unwrap();

    let netlist = fs::read_to_string(output.netlist_script.unwrap()).unwrap();
    assert!(netlist.contains("design(\"amp_lib\" \"ota\" \"schematic\")"));
    assert!(netlist.contains("createNetlist("));
    let wrapper = output.netlist_wrapper.unwrap();
    assert_eq!(wrapper.parent().unwrap(), plan.output_dir.canonicalize().unwrap());
    let batch = fs::read_to_string(output.batch_script.unwrap()).unwrap();
    assert!(batch.contains("run_amp_lib_ota_netlist.sh"));
    assert!(batch.contains("run_amp_lib_ota_ocean.sh"));
    assert!(output.package.is_none());
}

#[test]
fn generate_plan_requires_identity() {
    let ws = Workspace::new("ocean");
    let task = ws.root().join("anonymous.yaml");
    fs::write(&task, "simulation:\n  simulator: spectre\n").unwrap();
    assert!(generate_plan(&task, None, ws.work_dir(), None).is_err());
}

#[test]
fn default_output_dir_is_under_work_dir() {
    let ws = Workspace::new("ocean");
    let plan = generate_plan(ws.task(), None, ws.work_dir(), None).unwrap();
    assert_eq!(plan.output_dir, ws.work_dir().join("scripts"));

    let custom = PathBuf::from("/elsewhere");
    let plan = generate_plan(ws.task(), None, ws.work_dir(), Some(custom.clone())).unwrap();
    assert_eq!(plan.output_dir, custom);
}

#[cfg(unix)]
#[test]
fn package_mode_runs_wrapper() {
    let ws = Workspace::new("cat");
    let system = load_system_config(ws.system_config()).unwrap();
    let plan = generate_plan(ws.task(), Some(&system), ws.work_dir(), None).unwrap();

    let output = execute_plan(ExecutePlanParams {
        plan: &plan,
        tasks: &run_tasks(RunMode::Package),
        mode: RunMode::Package,
        timeout: Duration::from_secs(60),
        ctx: None,
    })
    .unwrap();

    let run = output.run.unwrap();
    assert!(run.success);
    assert!(run.stdout.contains("run()"));
    assert!(output.package.is_some());
    assert!(output.status.is_none());
}

#[cfg(unix)]
#[test]
fn direct_mode_runs_and_collects() {
    let ws = Workspace::new("cat");
    let system = load_system_config(ws.system_config()).unwrap();
    let plan = generate_plan(ws.task(), Some(&system), ws.work_dir(), None).unwrap();

    let results_dir = PathBuf::from(plan.config.results_dir());
    fs::create_dir_all(&results_dir).unwrap();
    fs::write(results_dir.join("tran.raw"), "data").unwrap();
    fs::write(results_dir.join("gain.png"), "png").unwrap();
    fs::write(results_dir.join("spectre.out"), "out").unwrap();
    fs::write(results_dir.join("ignored.txt"), "txt").unwrap();

    let output = execute_plan(ExecutePlanParams {
        plan: &plan,
        tasks: &run_tasks(RunMode::Direct),
        mode: RunMode::Direct,
        timeout: Duration::from_secs(60),
        ctx: None,
    })
    .unwrap();

    let status = output.status.unwrap();
    assert_eq!(status.state, SimulationState::Completed);
    assert_eq!(status.project_name, "amp_lib_ota");
    assert_eq!(status.log_files.len(), 1);
    let log = fs::read_to_string(&status.log_files[0]).unwrap();
    assert!(log.contains("simulator('spectre)"));
    assert!(log.ends_with("status: Completed\n"));
    assert!(!ws.work_dir().join("temp").exists());

    let results = output.results.unwrap();
    assert_eq!(results.data.len(), 1);
    assert_eq!(results.plots.len(), 1);
    assert_eq!(results.files.len(), 1);
    assert_eq!(results.files[0].name, "spectre.out");
    assert!(output.package.is_none());
}

#[cfg(unix)]
#[test]
fn failed_package_run_reports_output() {
    let ws = Workspace::new("false");
    let system = load_system_config(ws.system_config()).unwrap();
    let plan = generate_plan(ws.task(), Some(&system), ws.work_dir(), None).unwrap();

    let err = execute_plan(ExecutePlanParams {
        plan: &plan,
        tasks: &run_tasks(RunMode::Package),
        mode: RunMode::Package,
        timeout: Duration::from_secs(60),
        ctx: None,
    })
    .unwrap_err();
    assert!(err.to_string().starts_with("simulation failed:"));
}
