use std::path::{Path, PathBuf};

use derive_builder::Builder;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_yaml::Value;

use crate::error::ConfigError;

pub mod task;
pub mod testbench;
pub mod tool;
pub mod validate;

pub use task::{load_task_config, resolve_testbench};
pub use testbench::{
    load_testbench_config, AnalysisParams, ModelFile, PlotSpec, PostProcessing, SaveItem,
    TestbenchConfig,
};
pub use tool::{load_system_config, EdaTool, EdaTools, ServerConfig, SystemConfig};
pub use validate::{load_and_validate, validate};

pub const SUPPORTED_SIMULATORS: [&str; 4] = ["spectre", "hspice", "eldo", "virtuoso"];

pub const DEFAULT_SIMULATOR: &str = "spectre";
pub const DEFAULT_DESIGN_TYPE: &str = "schematic";
pub const DEFAULT_TEMPERATURE: f64 = 27.0;
pub const DEFAULT_SUPPLY_VOLTAGE: f64 = 1.8;

/// Where the testbench portion of a task came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TestbenchSource {
    /// The task did not reference a testbench.
    #[default]
    None,
    /// The testbench was found and merged.
    Loaded(PathBuf),
    /// The task referenced a testbench that could not be located.
    Missing(String),
}

/// Fully merged configuration of one simulation task.
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(default, setter(into))]
pub struct SimulationConfig {
    pub simulator: String,
    pub project_dir: String,
    pub library_name: String,
    pub cell_name: String,
    pub simulation_path: String,
    pub design_type: String,

    pub eda_tools: EdaTools,
    pub server: ServerConfig,

    pub model_files: Vec<ModelFile>,
    pub analyses: IndexMap<String, AnalysisParams>,
    pub stimulus_files: Vec<String>,
    pub design_variables: IndexMap<String, Value>,
    pub save_nodes: Vec<String>,
    pub initial_conditions: IndexMap<String, f64>,
    pub post_processing: PostProcessing,

    /// Simulation temperature in degrees Celsius.
    pub temperature: f64,
    /// Supply voltage in volts.
    pub supply_voltage: f64,

    pub testbench: TestbenchSource,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            simulator: DEFAULT_SIMULATOR.to_string(),
            project_dir: String::new(),
            library_name: String::new(),
            cell_name: String::new(),
            simulation_path: String::new(),
            design_type: DEFAULT_DESIGN_TYPE.to_string(),
            eda_tools: EdaTools::default(),
            server: ServerConfig::default(),
            model_files: Vec::new(),
            analyses: IndexMap::new(),
            stimulus_files: Vec::new(),
            design_variables: IndexMap::new(),
            save_nodes: Vec::new(),
            initial_conditions: IndexMap::new(),
            post_processing: PostProcessing::default(),
            temperature: DEFAULT_TEMPERATURE,
            supply_voltage: DEFAULT_SUPPLY_VOLTAGE,
            testbench: TestbenchSource::None,
        }
    }
}

impl SimulationConfig {
    pub fn builder() -> SimulationConfigBuilder {
        SimulationConfigBuilder::default()
    }

    /// `<library_name>_<cell_name>`, or empty if either is unset.
    pub fn project_name(&self) -> String {
        if self.library_name.is_empty() || self.cell_name.is_empty() {
            return String::new();
        }
        format!("{}_{}", self.library_name, self.cell_name)
    }

    /// Netlist written by the design environment for this cell view.
    pub fn design_path(&self) -> String {
        self.view_path(&["netlist", "netlist"])
    }

    /// Directory the simulator writes its results into.
    pub fn results_dir(&self) -> String {
        self.view_path(&["psf"])
    }

    fn view_path(&self, tail: &[&str]) -> String {
        let mut components = vec![
            self.simulation_path.as_str(),
            self.cell_name.as_str(),
            self.simulator.as_str(),
            self.design_type.as_str(),
        ];
        components.extend_from_slice(tail);
        join_components(&components)
    }

    pub fn is_supported_simulator(&self) -> bool {
        SUPPORTED_SIMULATORS.contains(&self.simulator.as_str())
    }

    /// Tool entry for the selected simulator.
    pub fn tool(&self) -> Result<&EdaTool, ConfigError> {
        self.eda_tools.get(&self.simulator)
    }

    /// The analysis whose results post-processing selects by default.
    pub fn primary_analysis(&self) -> &str {
        self.analyses
            .keys()
            .next()
            .map(String::as_str)
            .unwrap_or("tran")
    }
}

/// Joins path components with `/`, yielding an empty string if any component is empty.
pub fn join_components(components: &[&str]) -> String {
    if components.iter().any(|c| c.is_empty()) {
        return String::new();
    }
    components.join("/")
}

pub(crate) fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub(crate) fn read_yaml<T>(path: &Path) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Default,
{
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "yaml" | "yml"))
        .unwrap_or(false);
    if !is_yaml {
        return Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    }

    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(T::default());
    }

    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SimulationConfig {
        SimulationConfig::builder()
            .project_dir("/proj")
            .library_name("amp_lib")
            .cell_name("ota")
            .simulation_path("/sim")
            .build()
            .unwrap()
    }

    #[test]
    fn derived_paths_concatenate_components() {
        let config = config();
        assert_eq!(
            config.design_path(),
            "/sim/ota/spectre/schematic/netlist/netlist"
        );
        assert_eq!(config.results_dir(), "/sim/ota/spectre/schematic/psf");
        assert_eq!(config.project_name(), "amp_lib_ota");
    }

    #[test]
    fn derived_paths_are_empty_when_a_component_is_missing() {
        for blank in ["simulation_path", "cell_name", "simulator", "design_type"] {
            let mut config = config();
            match blank {
                "simulation_path" => config.simulation_path.clear(),
                "cell_name" => config.cell_name.clear(),
                "simulator" => config.simulator.clear(),
                _ => config.design_type.clear(),
            }
            assert_eq!(config.design_path(), "", "blank {blank}");
            assert_eq!(config.results_dir(), "", "blank {blank}");
        }

        let mut config = config();
        config.library_name.clear();
        assert_eq!(config.project_name(), "");
    }

    #[test]
    fn builder_applies_defaults() {
        let config = SimulationConfig::builder().build().unwrap();
        assert_eq!(config.simulator, "spectre");
        assert_eq!(config.design_type, "schematic");
        assert_eq!(config.temperature, 27.0);
        assert_eq!(config.supply_voltage, 1.8);
        assert_eq!(config.primary_analysis(), "tran");
    }

    #[test]
    fn rejects_non_yaml_files() {
        let err = read_yaml::<SystemConfig>(Path::new("config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
    }
}
