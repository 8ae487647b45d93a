use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration at {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unsupported configuration file format: {path:?} (only YAML is supported)")]
    UnsupportedFormat { path: PathBuf },

    #[error("no tool configuration found for simulator `{simulator}`")]
    UnknownTool { simulator: String },

    #[error("configuration validation failed:\n{details}")]
    Validation { details: String },
}

impl ConfigError {
    pub fn from_errors(errors: &[String]) -> Self {
        let details = errors
            .iter()
            .map(|e| format!("- {e}"))
            .collect::<Vec<_>>()
            .join("\n");
        Self::Validation { details }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server responded with {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("error serializing/deserializing JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("server URL is not configured")]
    MissingServer,
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("process timed out after {secs} seconds")]
    Timeout { secs: u64 },

    #[error("simulation script has not been generated")]
    ScriptNotGenerated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_every_entry() {
        let err = ConfigError::from_errors(&[
            "first problem".to_string(),
            "second problem".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "configuration validation failed:\n- first problem\n- second problem"
        );
    }
}
