use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::source::Source;

pub const CONFIRMED_CSV: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_confirmed_global.csv";
pub const RECOVERED_CSV: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_recovered_global.csv";
pub const DEATHS_CSV: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_deaths_global.csv";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Location (URL or file path) of the confirmed cases time series
    pub confirmed: String,
    /// Location (URL or file path) of the recovered time series
    pub recovered: String,
    /// Location (URL or file path) of the deaths time series
    pub deaths: String,
    /// Location of the region centroid reference table
    pub coordinates: Option<String>,
    /// Region highlighted next to the world totals
    pub region: String,
    /// Width of one animated map frame in days
    pub map_bucket_days: u32,
    /// Window of the rolling mean drawn over "new" series
    pub rolling_window: usize,
    /// Optional per-request timeout for HTTP sources
    pub timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            confirmed: CONFIRMED_CSV.into(),
            recovered: RECOVERED_CSV.into(),
            deaths: DEATHS_CSV.into(),
            coordinates: None,
            region: "Russia".into(),
            map_bucket_days: 2,
            rolling_window: 7,
            timeout_secs: None,
        }
    }
}

impl Config {
    pub fn location(&self, source: Source) -> &str {
        match source {
            Source::Confirmed => &self.confirmed,
            Source::Recovered => &self.recovered,
            Source::Deaths => &self.deaths,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Config reading every source from `dir`, named `confirmed.csv`, `recovered.csv`, `deaths.csv`
    /// and `country_centroids.csv`
    pub fn from_dir(dir: &str) -> Self {
        Config {
            confirmed: format!("{dir}/confirmed.csv"),
            recovered: format!("{dir}/recovered.csv"),
            deaths: format!("{dir}/deaths.csv"),
            coordinates: Some(format!("{dir}/country_centroids.csv")),
            ..Config::default()
        }
    }
}
