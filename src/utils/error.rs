use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::gpu::{GlError, ShaderStage};

/// Failures of the shader, program and mesh helpers.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{stage} shader compilation failed: {log}")]
    ShaderCompilation { stage: ShaderStage, log: String },

    #[error("Program linking failed: {log}")]
    ProgramLink { log: String },

    #[error("Failed to create {object}: {reason}")]
    ObjectCreation { object: &'static str, reason: String },

    #[error("GL error {error} while {operation}")]
    Gl {
        operation: &'static str,
        error: GlError,
    },
}

impl RenderError {
    /// Driver diagnostic for compile and link failures.
    pub fn log(&self) -> Option<&str> {
        match self {
            Self::ShaderCompilation { log, .. } | Self::ProgramLink { log } => Some(log),
            Self::ObjectCreation { .. } | Self::Gl { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot infer shader stage from file name: {0}")]
    UnknownStage(PathBuf),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Couldn't determine project directory")]
    NoProjectDir,
}

/// Errors a sketch can raise while setting up or rendering.
#[derive(Debug, Error)]
pub enum SketchError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Asset(#[from] AssetError),
}
