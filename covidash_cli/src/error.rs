use covidash::error::CovidashError;
use polars::error::PolarsError;

#[derive(thiserror::Error, Debug)]
pub enum CovidashCliError {
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("serde JSON error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("covidash error: {0}")]
    CovidashError(#[from] CovidashError),
    #[error("std IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("invalid TOML in config file: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("`{command}` cannot write {format} output")]
    UnsupportedFormat {
        command: &'static str,
        format: String,
    },
}

pub type CovidashCliResult<T> = Result<T, CovidashCliError>;
