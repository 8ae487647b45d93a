use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use super::{null_default, read_yaml};
use crate::error::ConfigError;

/// Parameters of a single analysis, in declaration order.
pub type AnalysisParams = IndexMap<String, Value>;

/// A model file with an optional process corner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawModelFile", into = "RawModelFile")]
pub struct ModelFile {
    pub path: String,
    pub corner: Option<String>,
}

impl ModelFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            corner: None,
        }
    }

    pub fn with_corner(path: impl Into<String>, corner: impl Into<String>) -> Self {
        let corner = corner.into();
        Self {
            path: path.into(),
            corner: if corner.is_empty() { None } else { Some(corner) },
        }
    }
}

/// Model files may be written as `[path, corner]`, a bare path, or a mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawModelFile {
    Pair(Vec<String>),
    Path(String),
    Map {
        path: String,
        #[serde(default)]
        corner: Option<String>,
    },
}

impl From<RawModelFile> for ModelFile {
    fn from(raw: RawModelFile) -> Self {
        match raw {
            RawModelFile::Pair(mut parts) => {
                let corner = if parts.len() > 1 {
                    parts.swap_remove(1)
                } else {
                    String::new()
                };
                let path = parts.into_iter().next().unwrap_or_default();
                ModelFile::with_corner(path, corner)
            }
            RawModelFile::Path(path) => ModelFile::new(path),
            RawModelFile::Map { path, corner } => {
                ModelFile::with_corner(path, corner.unwrap_or_default())
            }
        }
    }
}

impl From<ModelFile> for RawModelFile {
    fn from(file: ModelFile) -> Self {
        RawModelFile::Pair(vec![file.path, file.corner.unwrap_or_default()])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotSpec {
    pub data: String,
    #[serde(default)]
    pub xlabel: String,
    #[serde(default)]
    pub ylabel: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveItem {
    pub file: String,
    pub data: String,
}

/// Plot and save directives appended after the run command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostProcessing {
    #[serde(default)]
    pub plot_enabled: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub plots: Vec<PlotSpec>,
    #[serde(default)]
    pub save_data: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub save_items: Vec<SaveItem>,
}

impl PostProcessing {
    pub fn is_empty(&self) -> bool {
        !self.plot_enabled && !self.save_data && self.plots.is_empty() && self.save_items.is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct FileList<T> {
    #[serde(default = "Vec::new", deserialize_with = "null_default")]
    files: Vec<T>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Outputs {
    #[serde(default, deserialize_with = "null_default")]
    save_nodes: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Environment {
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    supply_voltage: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawTestbench {
    #[serde(default, deserialize_with = "null_default")]
    models: FileList<ModelFile>,
    #[serde(default, deserialize_with = "null_default")]
    analyses: IndexMap<String, Option<AnalysisParams>>,
    #[serde(default, deserialize_with = "null_default")]
    stimulus: FileList<String>,
    #[serde(default, deserialize_with = "null_default")]
    variables: IndexMap<String, Value>,
    #[serde(default, deserialize_with = "null_default")]
    outputs: Outputs,
    #[serde(default, deserialize_with = "null_default")]
    initial_conditions: IndexMap<String, f64>,
    #[serde(default, deserialize_with = "null_default")]
    environment: Environment,
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    supply_voltage: Option<f64>,
    #[serde(default, deserialize_with = "null_default")]
    post_processing: PostProcessing,
}

/// The analysis/stimulus portion of a simulation task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestbenchConfig {
    pub model_files: Vec<ModelFile>,
    pub analyses: IndexMap<String, AnalysisParams>,
    pub stimulus_files: Vec<String>,
    pub design_variables: IndexMap<String, Value>,
    pub save_nodes: Vec<String>,
    pub initial_conditions: IndexMap<String, f64>,
    pub temperature: Option<f64>,
    pub supply_voltage: Option<f64>,
    pub post_processing: PostProcessing,
}

impl From<RawTestbench> for TestbenchConfig {
    fn from(raw: RawTestbench) -> Self {
        Self {
            model_files: raw.models.files,
            analyses: raw
                .analyses
                .into_iter()
                .map(|(name, params)| (name, params.unwrap_or_default()))
                .collect(),
            stimulus_files: raw.stimulus.files,
            design_variables: raw.variables,
            save_nodes: raw.outputs.save_nodes,
            initial_conditions: raw.initial_conditions,
            temperature: raw.environment.temperature.or(raw.temperature),
            supply_voltage: raw.environment.supply_voltage.or(raw.supply_voltage),
            post_processing: raw.post_processing,
        }
    }
}

impl TestbenchConfig {
    pub fn from_yaml(s: &str) -> Result<Self, serde_yaml::Error> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: RawTestbench = serde_yaml::from_str(s)?;
        Ok(raw.into())
    }
}

pub fn load_testbench_config(path: impl AsRef<Path>) -> Result<TestbenchConfig, ConfigError> {
    let raw: RawTestbench = read_yaml(path.as_ref())?;
    Ok(raw.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TESTBENCH: &str = r#"
models:
  files:
    - ["/pdk/models/design.scs", ""]
    - ["/pdk/models/process.scs", "tt"]
    - "/pdk/models/parasitic.scs"
analyses:
  tran:
    stop: "100n"
    step: "1p"
  dc:
    saveOppoint: true
    start1: 0
    stop1: 1.8
  pz:
stimulus:
  files: ["/stim/input.scs"]
variables:
  vdd: 1.8
  load: "100f"
outputs:
  save_nodes: ["/vout", "/vin"]
initial_conditions:
  /vout: 0.9
environment:
  temperature: 85
post_processing:
  plot_enabled: true
  plots:
    - data: 'v("/vout")'
      xlabel: "Time (s)"
      ylabel: "Voltage (V)"
  save_data: true
  save_items:
    - file: "vout.csv"
      data: 'v("/vout")'
"#;

    #[test]
    fn parses_full_testbench() {
        let tb = TestbenchConfig::from_yaml(TESTBENCH).unwrap();

        assert_eq!(
            tb.model_files,
            vec![
                ModelFile::new("/pdk/models/design.scs"),
                ModelFile::with_corner("/pdk/models/process.scs", "tt"),
                ModelFile::new("/pdk/models/parasitic.scs"),
            ]
        );
        assert_eq!(
            tb.analyses.keys().collect::<Vec<_>>(),
            vec!["tran", "dc", "pz"]
        );
        assert!(tb.analyses["pz"].is_empty());
        assert_eq!(
            tb.analyses["tran"].keys().collect::<Vec<_>>(),
            vec!["stop", "step"]
        );
        assert_eq!(tb.stimulus_files, vec!["/stim/input.scs"]);
        assert_eq!(tb.save_nodes, vec!["/vout", "/vin"]);
        assert_eq!(tb.initial_conditions["/vout"], 0.9);
        assert_eq!(tb.temperature, Some(85.0));
        assert_eq!(tb.supply_voltage, None);
        assert!(tb.post_processing.plot_enabled);
        assert_eq!(tb.post_processing.save_items[0].file, "vout.csv");
    }

    #[test]
    fn null_sections_fall_back_to_defaults() {
        let tb = TestbenchConfig::from_yaml(
            "models:\nanalyses:\n  tran:\n    stop: 1n\nvariables:\npost_processing: {}\n",
        )
        .unwrap();
        assert!(tb.model_files.is_empty());
        assert!(tb.design_variables.is_empty());
        assert!(tb.post_processing.is_empty());
        assert_eq!(tb.analyses.len(), 1);
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(TestbenchConfig::from_yaml("  \n").unwrap(), TestbenchConfig::default());
    }
}
