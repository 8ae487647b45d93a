use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Deserialize;

use super::testbench::{load_testbench_config, TestbenchConfig};
use super::tool::{EdaTools, ServerConfig, SystemConfig};
use super::{null_default, read_yaml, SimulationConfig, TestbenchSource};
use super::{DEFAULT_DESIGN_TYPE, DEFAULT_SIMULATOR};
use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Deserialize)]
struct SimulationSection {
    #[serde(default, deserialize_with = "null_default")]
    project_dir: String,
    #[serde(default, deserialize_with = "null_default")]
    library_name: String,
    #[serde(default, deserialize_with = "null_default")]
    cell_name: String,
    #[serde(default)]
    design_type: Option<String>,
    #[serde(default)]
    simulator: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    simulation_path: String,
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    supply_voltage: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TaskFile {
    #[serde(default, deserialize_with = "null_default")]
    simulation: SimulationSection,
    #[serde(default)]
    testbench_config: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    eda_tools: EdaTools,
    #[serde(default, deserialize_with = "null_default")]
    server: ServerConfig,
}

/// Locates a testbench reference, first as given and then next to the task file.
pub fn resolve_testbench(reference: &str, task_path: &Path) -> Option<PathBuf> {
    let given = PathBuf::from(reference);
    if given.is_file() {
        return Some(given);
    }
    if given.is_absolute() {
        return None;
    }
    let sibling = task_path.parent().map(|dir| dir.join(reference))?;
    sibling.is_file().then_some(sibling)
}

/// Loads a task file and merges it with its testbench and the system settings.
///
/// Missing optional fields fall back to defaults. A testbench reference that
/// cannot be located is recorded on the result and left for [`validate`]
/// to report.
///
/// [`validate`]: super::validate
pub fn load_task_config(
    task_path: impl AsRef<Path>,
    system: Option<&SystemConfig>,
) -> Result<SimulationConfig, ConfigError> {
    let task_path = task_path.as_ref();
    let task: TaskFile = read_yaml(task_path)?;
    let sim = task.simulation;

    let mut config = SimulationConfig {
        simulator: non_empty_or(sim.simulator, DEFAULT_SIMULATOR),
        project_dir: sim.project_dir,
        library_name: sim.library_name,
        cell_name: sim.cell_name,
        simulation_path: sim.simulation_path,
        design_type: non_empty_or(sim.design_type, DEFAULT_DESIGN_TYPE),
        eda_tools: task.eda_tools,
        server: task.server,
        ..Default::default()
    };
    if let Some(t) = sim.temperature {
        config.temperature = t;
    }
    if let Some(v) = sim.supply_voltage {
        config.supply_voltage = v;
    }

    if let Some(reference) = task.testbench_config.filter(|r| !r.trim().is_empty()) {
        match resolve_testbench(&reference, task_path) {
            Some(path) => {
                debug!("loading testbench from {path:?}");
                let testbench = load_testbench_config(&path)?;
                config.apply_testbench(testbench);
                config.testbench = TestbenchSource::Loaded(path);
            }
            None => {
                warn!("testbench file `{reference}` not found; testbench settings left at defaults");
                config.testbench = TestbenchSource::Missing(reference);
            }
        }
    }

    if let Some(system) = system {
        config.eda_tools.merge_missing(&system.eda_tools);
        if !config.server.is_configured() {
            config.server = system.server.clone();
        }
    }

    Ok(config)
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl SimulationConfig {
    /// Merges testbench settings over the task-level values.
    ///
    /// Temperature and supply voltage from the testbench take precedence over
    /// the task's `simulation` block when present.
    pub fn apply_testbench(&mut self, testbench: TestbenchConfig) {
        self.model_files = testbench.model_files;
        self.analyses = testbench.analyses;
        self.stimulus_files = testbench.stimulus_files;
        self.design_variables = testbench.design_variables;
        self.save_nodes = testbench.save_nodes;
        self.initial_conditions = testbench.initial_conditions;
        self.post_processing = testbench.post_processing;
        if let Some(t) = testbench.temperature {
            self.temperature = t;
        }
        if let Some(v) = testbench.supply_voltage {
            self.supply_voltage = v;
        }
    }
}
