use anyhow::Result;
use log::debug;

use crate::{config::Config, dashboard::Dashboard};

// Re-exports
pub use column_names as COL;

// Modules
pub mod aggregate;
pub mod column_names;
pub mod config;
pub mod dashboard;
pub mod derived;
pub mod error;
#[cfg(feature = "formatters")]
pub mod formatters;
pub mod indicators;
pub mod map;
pub mod normalize;
pub mod series;
pub mod source;
pub mod view;

/// Type for the dashboard data and the configuration it was loaded with
pub struct Covidash {
    pub config: Config,
    pub dashboard: Dashboard,
}

impl Covidash {
    /// Load the dashboard from the default sources
    pub async fn new() -> Result<Self> {
        Self::new_with_config(Config::default()).await
    }

    /// Load the dashboard with custom configuration
    pub async fn new_with_config(config: Config) -> Result<Self> {
        debug!("config: {config:?}");
        let dashboard = Dashboard::build(&config).await?;
        Ok(Self { config, dashboard })
    }
}
