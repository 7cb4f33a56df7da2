//! Error types.

use chrono::NaiveDate;

use crate::source::Source;

#[derive(thiserror::Error, Debug)]
pub enum CovidashError {
    #[error("Failed to fetch {source_name} data: {reason}")]
    Fetch { source_name: String, reason: String },
    #[error("Series are not aligned: {left} dates vs {right} dates (first mismatch: {first:?})")]
    MisalignedSeries {
        left: usize,
        right: usize,
        first: Option<NaiveDate>,
    },
    #[error("Wrapped anyhow error: {0}")]
    AnyhowError(#[from] anyhow::Error),
    #[error("Wrapped polars error: {0}")]
    PolarsError(#[from] polars::error::PolarsError),
}

impl CovidashError {
    pub fn fetch(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub fn schema(source: Source, reason: impl Into<String>) -> Self {
        Self::fetch(source.to_string(), reason)
    }
}

pub type CovidashResult<T> = Result<T, CovidashError>;
