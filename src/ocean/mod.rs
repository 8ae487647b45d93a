//! OCEAN script generation.
//!
//! A script is assembled from template fragments rendered in a fixed order:
//! header, simulator, design, results directory, model files, stimulus,
//! design variables, one block per analysis, save nodes, initial conditions,
//! environment, run and post-processing. Optional fragments are skipped when
//! the configuration has nothing for them.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use log::debug;
use serde::Serialize;
use tera::Context;

use crate::config::{PlotSpec, SaveItem, SimulationConfig};
use crate::{Result, TEMPLATES};

pub mod analysis;

pub use analysis::{analysis_template, generic_analysis, ocean_literal};
use analysis::{analysis_params, ocean_number, Param};

pub const HEADER: &str = "ocean/header.ocn";
pub const SIMULATOR: &str = "ocean/simulator.ocn";
pub const DESIGN: &str = "ocean/design.ocn";
pub const RESULTS_DIR: &str = "ocean/results_dir.ocn";
pub const MODEL_FILE: &str = "ocean/model_file.ocn";
pub const STIMULUS: &str = "ocean/stimulus.ocn";
pub const DESIGN_VARIABLES: &str = "ocean/design_variables.ocn";
pub const SAVE_NODES: &str = "ocean/save_nodes.ocn";
pub const INITIAL_CONDITIONS: &str = "ocean/initial_conditions.ocn";
pub const ENVIRONMENT: &str = "ocean/environment.ocn";
pub const RUN: &str = "ocean/run.ocn";
pub const POST_PROCESSING: &str = "ocean/post_processing.ocn";
pub const NETLIST_GENERATION: &str = "ocean/netlist_generation.ocn";

#[derive(Serialize)]
struct HeaderParams<'a> {
    project_name: &'a str,
    library_name: &'a str,
    cell_name: &'a str,
    version: &'a str,
}

#[derive(Serialize)]
struct SimulatorParams<'a> {
    simulator: &'a str,
}

#[derive(Serialize)]
struct DesignParams<'a> {
    simulator: &'a str,
    design_path: &'a str,
}

#[derive(Serialize)]
struct ResultsDirParams<'a> {
    results_dir: &'a str,
}

#[derive(Serialize)]
struct ModelEntry<'a> {
    path: &'a str,
    corner: &'a str,
}

#[derive(Serialize)]
struct ModelFileParams<'a> {
    model_files: Vec<ModelEntry<'a>>,
}

#[derive(Serialize)]
struct StimulusParams<'a> {
    stimulus_files: &'a [String],
}

#[derive(Serialize)]
struct NamedValues {
    entries: Vec<Param>,
}

#[derive(Serialize)]
struct AnalysisBlockParams<'a> {
    kind: &'a str,
    params: Vec<Param>,
}

#[derive(Serialize)]
struct SaveNodeParams<'a> {
    save_nodes: &'a [String],
}

#[derive(Serialize)]
struct EnvironmentParams {
    temperature: String,
    supply_voltage: String,
}

#[derive(Serialize)]
struct PostProcessingParams<'a> {
    analysis_type: &'a str,
    results_dir: &'a str,
    plot_enabled: bool,
    plots: &'a [PlotSpec],
    save_data: bool,
    save_items: &'a [SaveItem],
}

#[derive(Serialize)]
struct NetlistParams<'a> {
    simulator: &'a str,
    library_name: &'a str,
    cell_name: &'a str,
    design_type: &'a str,
}

fn render<T: Serialize>(template: &str, params: T) -> Result<String> {
    Ok(TEMPLATES.render(template, &Context::from_serialize(params)?)?)
}

pub struct OceanScriptGenerator<'a> {
    config: &'a SimulationConfig,
}

impl<'a> OceanScriptGenerator<'a> {
    pub fn new(config: &'a SimulationConfig) -> Self {
        Self { config }
    }

    /// Renders the full simulation script.
    ///
    /// Creates the configured results directory as a side effect.
    pub fn generate(&self) -> Result<String> {
        let config = self.config;
        let project_name = config.project_name();
        let design_path = config.design_path();
        let results_dir = config.results_dir();

        let mut fragments = Vec::new();

        fragments.push(render(
            HEADER,
            HeaderParams {
                project_name: &project_name,
                library_name: &config.library_name,
                cell_name: &config.cell_name,
                version: env!("CARGO_PKG_VERSION"),
            },
        )?);
        fragments.push(render(
            SIMULATOR,
            SimulatorParams {
                simulator: &config.simulator,
            },
        )?);
        fragments.push(render(
            DESIGN,
            DesignParams {
                simulator: &config.simulator,
                design_path: &design_path,
            },
        )?);

        if !results_dir.is_empty() {
            fs::create_dir_all(&results_dir)
                .with_context(|| format!("failed to create results directory {results_dir}"))?;
        }
        fragments.push(render(
            RESULTS_DIR,
            ResultsDirParams {
                results_dir: &results_dir,
            },
        )?);

        if !config.model_files.is_empty() {
            let model_files = config
                .model_files
                .iter()
                .map(|m| ModelEntry {
                    path: &m.path,
                    corner: m.corner.as_deref().unwrap_or(""),
                })
                .collect();
            fragments.push(render(MODEL_FILE, ModelFileParams { model_files })?);
        }

        if !config.stimulus_files.is_empty() {
            fragments.push(render(
                STIMULUS,
                StimulusParams {
                    stimulus_files: &config.stimulus_files,
                },
            )?);
        }

        if !config.design_variables.is_empty() {
            fragments.push(render(
                DESIGN_VARIABLES,
                NamedValues {
                    entries: analysis_params(&config.design_variables),
                },
            )?);
        }

        for (kind, params) in config.analyses.iter() {
            let block = match analysis_template(kind) {
                Some(template) => render(
                    template,
                    AnalysisBlockParams {
                        kind,
                        params: analysis_params(params),
                    },
                )?,
                None => {
                    debug!("no template for analysis `{kind}`; using generic block");
                    generic_analysis(kind, params)
                }
            };
            fragments.push(block);
        }

        if !config.save_nodes.is_empty() {
            fragments.push(render(
                SAVE_NODES,
                SaveNodeParams {
                    save_nodes: &config.save_nodes,
                },
            )?);
        }

        if !config.initial_conditions.is_empty() {
            let entries = config
                .initial_conditions
                .iter()
                .map(|(node, v)| Param {
                    name: node.clone(),
                    value: ocean_number(*v),
                })
                .collect();
            fragments.push(render(INITIAL_CONDITIONS, NamedValues { entries })?);
        }

        fragments.push(render(
            ENVIRONMENT,
            EnvironmentParams {
                temperature: ocean_number(config.temperature),
                supply_voltage: ocean_number(config.supply_voltage),
            },
        )?);
        fragments.push(TEMPLATES.render(RUN, &Context::new())?);

        let post = &config.post_processing;
        if !post.is_empty() {
            fragments.push(render(
                POST_PROCESSING,
                PostProcessingParams {
                    analysis_type: config.primary_analysis(),
                    results_dir: &results_dir,
                    plot_enabled: post.plot_enabled,
                    plots: &post.plots,
                    save_data: post.save_data,
                    save_items: &post.save_items,
                },
            )?);
        }

        Ok(fragments.join("\n"))
    }

    /// Writes the simulation script, returning its absolute path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let script = self.generate()?;
        write_script(path.as_ref(), &script)
    }

    /// Renders the netlist-only script: simulator, design view and netlist creation.
    pub fn generate_netlist(&self) -> Result<String> {
        render(
            NETLIST_GENERATION,
            NetlistParams {
                simulator: &self.config.simulator,
                library_name: &self.config.library_name,
                cell_name: &self.config.cell_name,
                design_type: &self.config.design_type,
            },
        )
    }

    pub fn save_netlist(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let script = self.generate_netlist()?;
        write_script(path.as_ref(), &script)
    }
}

pub(crate) fn write_script(path: &Path, contents: &str) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write {path:?}"))?;
    Ok(fs::canonicalize(path)?)
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use serde_yaml::Value;

    use super::*;
    use crate::config::{ModelFile, PostProcessing};

    fn config(root: &Path) -> SimulationConfig {
        let mut tran = IndexMap::new();
        tran.insert("stop".to_string(), Value::from("100n"));
        tran.insert("step".to_string(), Value::from("1p"));
        let mut dc = IndexMap::new();
        dc.insert("saveOppoint".to_string(), Value::Bool(true));
        let mut analyses = IndexMap::new();
        analyses.insert("tran".to_string(), tran);
        analyses.insert("dc".to_string(), dc);

        let mut variables = IndexMap::new();
        variables.insert("vdd".to_string(), Value::from(1.8));
        variables.insert("load".to_string(), Value::from("100f"));

        SimulationConfig::builder()
            .project_dir("/proj")
            .library_name("amp_lib")
            .cell_name("ota")
            .simulation_path(root.join("sim").to_string_lossy().to_string())
            .model_files(vec![
                ModelFile::new("/pdk/design.scs"),
                ModelFile::with_corner("/pdk/process.scs", "tt"),
            ])
            .analyses(analyses)
            .design_variables(variables)
            .save_nodes(vec!["/vout".to_string(), "/vin".to_string()])
            .build()
            .unwrap()
    }

    #[test]
    fn renders_analyses_in_declaration_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let script = OceanScriptGenerator::new(&config).generate().unwrap();

        let tran = script.find("analysis('tran").unwrap();
        let dc = script.find("analysis('dc").unwrap();
        assert!(tran < dc);
        assert_eq!(script.matches("analysis('").count(), 2);
        assert!(script.contains("?stop \"100n\""));
        assert!(script.contains("?saveOppoint t"));
    }

    #[test]
    fn fragments_appear_in_fixed_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let script = OceanScriptGenerator::new(&config).generate().unwrap();

        let markers = [
            "simulator('spectre)",
            "design(",
            "resultsDir(",
            "modelFile(",
            "desVar(",
            "analysis('tran",
            "save('v",
            "temp(27)",
            "run()",
        ];
        let positions = markers
            .iter()
            .map(|m| script.find(m).unwrap_or_else(|| panic!("missing {m}")))
            .collect::<Vec<_>>();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{script}");
        assert!(!script.contains("stimulusFile"));
        assert!(!script.contains("selectResult"));
    }

    #[test]
    fn creates_results_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        OceanScriptGenerator::new(&config).generate().unwrap();
        assert!(Path::new(&config.results_dir()).is_dir());
    }

    #[test]
    fn unknown_analysis_uses_generic_block() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        let mut pz = IndexMap::new();
        pz.insert("points".to_string(), Value::from(10));
        config.analyses.insert("pz".to_string(), pz);

        let script = OceanScriptGenerator::new(&config).generate().unwrap();
        assert!(script.contains("; PZ analysis configuration\nanalysis('pz\n         ?points 10\n)"));
    }

    #[test]
    fn post_processing_selects_first_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.post_processing = PostProcessing {
            plot_enabled: true,
            plots: vec![PlotSpec {
                data: "v(\"/vout\")".to_string(),
                xlabel: "Time".to_string(),
                ylabel: "Voltage".to_string(),
                title: Some("Output".to_string()),
            }],
            save_data: true,
            save_items: vec![SaveItem {
                file: "vout.csv".to_string(),
                data: "v(\"/vout\")".to_string(),
            }],
        };

        let script = OceanScriptGenerator::new(&config).generate().unwrap();
        assert!(script.contains("selectResult('tran)"));
        assert!(script.contains("plot(v(\"/vout\")"));
        assert!(script.contains(&format!(
            "ocnPrint(?output \"{}/vout.csv\"",
            config.results_dir()
        )));
    }

    #[test]
    fn strings_are_escaped_like_literals() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.model_files = vec![ModelFile::with_corner(r#"/pdk/"fast".scs"#, "ff")];
        config.stimulus_files = vec![r"C:\stim\input.scs".to_string()];
        config.save_nodes = vec![r#"/v"out"#.to_string()];

        let script = OceanScriptGenerator::new(&config).generate().unwrap();
        assert!(script.contains(r#"'("/pdk/\"fast\".scs" "ff")"#), "{script}");
        assert!(script.contains(r#""C:\\stim\\input.scs""#), "{script}");
        assert!(script.contains(r#"save('v "/v\"out")"#), "{script}");
        assert!(script.contains(&format!(
            "design({})",
            ocean_literal(&Value::from(config.design_path()))
        )));
    }

    #[test]
    fn saved_script_matches_generated() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let generator = OceanScriptGenerator::new(&config);

        let path = generator.save(dir.path().join("out/amp_lib_ota.ocn")).unwrap();
        assert!(path.is_absolute());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            generator.generate().unwrap()
        );
    }

    #[test]
    fn netlist_script_has_no_analyses() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let script = OceanScriptGenerator::new(&config).generate_netlist().unwrap();

        assert!(script.contains("simulator('spectre)"));
        assert!(script.contains("design(\"amp_lib\" \"ota\" \"schematic\")"));
        assert!(script.contains("createNetlist("));
        assert!(!script.contains("analysis("));
        assert!(!script.contains("resultsDir"));
    }
}
