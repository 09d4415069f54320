use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Config file not found: {path}\n\
        Run `fk-infra init` in this directory, or point FK_INFRA_CONFIG at an existing fk-infra.yml"
    )]
    ConfigFileNotFound { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
