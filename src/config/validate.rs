use std::path::Path;

use super::task::load_task_config;
use super::tool::SystemConfig;
use super::{SimulationConfig, TestbenchSource, SUPPORTED_SIMULATORS};
use crate::error::ConfigError;

/// Checks a merged configuration, returning every problem found.
///
/// An empty list means the configuration is ready for generation.
pub fn validate(config: &SimulationConfig) -> Vec<String> {
    let mut errors = Vec::new();

    for (field, value) in [
        ("project_dir", &config.project_dir),
        ("library_name", &config.library_name),
        ("cell_name", &config.cell_name),
        ("simulator", &config.simulator),
    ] {
        if value.trim().is_empty() {
            errors.push(format!("required field `{field}` is missing"));
        }
    }

    if !config.simulator.is_empty() && !config.is_supported_simulator() {
        errors.push(format!(
            "unsupported simulator `{}` (expected one of: {})",
            config.simulator,
            SUPPORTED_SIMULATORS.join(", ")
        ));
    }

    if let TestbenchSource::Missing(reference) = &config.testbench {
        errors.push(format!("testbench file not found: {reference}"));
    }

    if config.analyses.is_empty() {
        errors.push("at least one analysis must be configured".to_string());
    }

    if !config.project_dir.is_empty() && !Path::new(&config.project_dir).is_dir() {
        errors.push(format!(
            "project directory does not exist: {}",
            config.project_dir
        ));
    }

    let design_path = config.design_path();
    if design_path.is_empty() {
        errors.push(
            "design path cannot be derived (simulation_path, cell_name, simulator and design_type must all be set)"
                .to_string(),
        );
    } else if !Path::new(&design_path).exists() {
        errors.push(format!("design file does not exist: {design_path}"));
    }

    for model in &config.model_files {
        if !Path::new(&model.path).exists() {
            errors.push(format!("model file does not exist: {}", model.path));
        }
    }

    for stimulus in &config.stimulus_files {
        if !Path::new(stimulus).exists() {
            errors.push(format!("stimulus file does not exist: {stimulus}"));
        }
    }

    if !config.simulator.is_empty() {
        match config.tool() {
            Ok(tool) => {
                if tool.executable.trim().is_empty() {
                    errors.push(format!(
                        "no executable configured for simulator `{}`",
                        config.simulator
                    ));
                }
                if tool.environment_variables.is_empty() {
                    errors.push(format!(
                        "no environment variables configured for simulator `{}`",
                        config.simulator
                    ));
                }
            }
            Err(e) => errors.push(e.to_string()),
        }
    }

    errors
}

/// Loads a task and fails with the full list of validation problems, if any.
pub fn load_and_validate(
    task_path: impl AsRef<Path>,
    system: Option<&SystemConfig>,
) -> Result<SimulationConfig, ConfigError> {
    let config = load_task_config(task_path, system)?;
    let errors = validate(&config);
    if !errors.is_empty() {
        return Err(ConfigError::from_errors(&errors));
    }
    Ok(config)
}
