//! Loading of the wide time-series files and of the coordinate reference table.

use std::io::Cursor;
use std::time::Duration;

use chrono::NaiveDate;
use log::{debug, info};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    config::Config,
    error::{CovidashError, CovidashResult},
    COL,
};

/// Header formats accepted for date columns. The first is the one used by the JHU CSSE files.
const DATE_FORMATS: [&str; 2] = ["%m/%d/%y", "%Y-%m-%d"];

/// The published time series, one file each.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Confirmed,
    Recovered,
    Deaths,
}

/// Parse a date column header, returning `None` if it isn't a date.
pub fn parse_date_header(header: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(header.trim(), format).ok())
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Read the bytes at `location`, either with a single GET request or from the local filesystem.
/// Failures are reported as `CovidashError::Fetch` for `name`.
pub async fn fetch_bytes(
    name: &str,
    location: &str,
    timeout: Option<Duration>,
) -> CovidashResult<Vec<u8>> {
    let fetch_error = |e: &dyn std::fmt::Display| CovidashError::fetch(name, format!("{e}"));
    if is_remote(location) {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let response = builder
            .build()
            .map_err(|e| fetch_error(&e))?
            .get(location)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| fetch_error(&e))?;
        let bytes = response.bytes().await.map_err(|e| fetch_error(&e))?;
        Ok(bytes.to_vec())
    } else {
        std::fs::read(location).map_err(|e| fetch_error(&format!("'{location}': {e}")))
    }
}

fn read_csv(name: &str, bytes: Vec<u8>) -> CovidashResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .map_err(|e| CovidashError::fetch(name, format!("invalid CSV: {e}")))
}

/// Value cells must be whole numbers. Empty cells are allowed and later count as zero.
fn check_counts(source: Source, column: &Series) -> CovidashResult<()> {
    let dtype = column.dtype();
    if dtype.is_integer() || dtype == &DataType::Null {
        return Ok(());
    }
    if dtype.is_float() {
        let values = column.cast(&DataType::Float64)?;
        return match values.f64()?.into_iter().flatten().find(|v| v.fract() != 0.0) {
            Some(value) => Err(CovidashError::schema(
                source,
                format!("column '{}' has the non-integer value {value}", column.name()),
            )),
            None => Ok(()),
        };
    }
    if dtype == &DataType::String {
        let counts = column.cast(&DataType::Int64)?;
        let invalid = column
            .str()?
            .into_iter()
            .zip(counts.i64()?)
            .find_map(|(cell, count)| match (cell, count) {
                (Some(cell), None) => Some(cell.to_string()),
                _ => None,
            });
        return match invalid {
            Some(cell) => Err(CovidashError::schema(
                source,
                format!("column '{}' has the non-integer value '{cell}'", column.name()),
            )),
            None => Ok(()),
        };
    }
    Err(CovidashError::schema(
        source,
        format!("column '{}' has unsupported type {dtype}", column.name()),
    ))
}

/// A wide time-series table as published: one row per region entry, one column per date.
///
/// Construction validates the schema: the region and coordinate columns must be present, the
/// sub-national column is dropped and every other column must be a date.
#[derive(Debug, Clone)]
pub struct RawTable {
    source: Source,
    data: DataFrame,
    date_columns: Vec<(String, NaiveDate)>,
}

impl RawTable {
    pub fn from_dataframe(source: Source, data: DataFrame) -> CovidashResult<Self> {
        let column_names: Vec<String> = data
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        for required in [COL::SOURCE_COUNTRY_REGION, COL::SOURCE_LAT, COL::SOURCE_LONG] {
            if !column_names.iter().any(|name| name == required) {
                return Err(CovidashError::schema(
                    source,
                    format!("missing column '{required}'"),
                ));
            }
        }
        let data = if column_names
            .iter()
            .any(|name| name == COL::SOURCE_PROVINCE_STATE)
        {
            data.drop(COL::SOURCE_PROVINCE_STATE)?
        } else {
            data
        };
        if data.column(COL::SOURCE_COUNTRY_REGION)?.dtype() != &DataType::String {
            return Err(CovidashError::schema(
                source,
                format!("column '{}' is not text", COL::SOURCE_COUNTRY_REGION),
            ));
        }
        if data.column(COL::SOURCE_COUNTRY_REGION)?.null_count() > 0 {
            return Err(CovidashError::schema(
                source,
                format!("column '{}' has empty cells", COL::SOURCE_COUNTRY_REGION),
            ));
        }

        let date_columns = column_names
            .into_iter()
            .filter(|name| {
                ![
                    COL::SOURCE_PROVINCE_STATE,
                    COL::SOURCE_COUNTRY_REGION,
                    COL::SOURCE_LAT,
                    COL::SOURCE_LONG,
                ]
                .contains(&name.as_str())
            })
            .map(|name| match parse_date_header(&name) {
                Some(date) => Ok((name, date)),
                None => Err(CovidashError::schema(
                    source,
                    format!("column '{name}' is not a date"),
                )),
            })
            .collect::<CovidashResult<Vec<_>>>()?;
        if date_columns.is_empty() {
            return Err(CovidashError::schema(source, "no date columns"));
        }
        for (name, _) in &date_columns {
            check_counts(source, data.column(name)?)?;
        }
        debug!(
            "{source}: {} date columns from {} to {}",
            date_columns.len(),
            date_columns[0].1,
            date_columns[date_columns.len() - 1].1
        );

        Ok(Self {
            source,
            data,
            date_columns,
        })
    }

    pub fn from_csv_bytes(source: Source, bytes: Vec<u8>) -> CovidashResult<Self> {
        let data = read_csv(&source.to_string(), bytes)?;
        Self::from_dataframe(source, data)
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn data(&self) -> &DataFrame {
        &self.data
    }

    /// Date columns in file order, paired with their parsed dates
    pub fn date_columns(&self) -> &[(String, NaiveDate)] {
        &self.date_columns
    }
}

/// Reference coordinates keyed by region name. Holds one row per region with the columns
/// `region`, `ref_lat` and `ref_long`.
#[derive(Debug, Clone)]
pub struct CoordinateRef(DataFrame);

impl CoordinateRef {
    /// A reference table with no regions: every region keeps its original coordinates.
    pub fn empty() -> PolarsResult<Self> {
        Ok(Self(DataFrame::new(vec![
            Series::new_empty(COL::REGION, &DataType::String),
            Series::new_empty(COL::REF_LAT, &DataType::Float64),
            Series::new_empty(COL::REF_LONG, &DataType::Float64),
        ])?))
    }

    pub fn from_rows(rows: &[(&str, f64, f64)]) -> PolarsResult<Self> {
        let df = DataFrame::new(vec![
            Series::new(
                COL::REGION,
                rows.iter().map(|row| row.0).collect::<Vec<&str>>(),
            ),
            Series::new(
                COL::REF_LAT,
                rows.iter().map(|row| row.1).collect::<Vec<f64>>(),
            ),
            Series::new(
                COL::REF_LONG,
                rows.iter().map(|row| row.2).collect::<Vec<f64>>(),
            ),
        ])?;
        Self::deduplicated(df)
    }

    /// Reads a centroid file with the columns `admin`, `Latitude` and `Longitude`.
    pub fn from_csv_bytes(bytes: Vec<u8>) -> CovidashResult<Self> {
        let name = "coordinates";
        let df = read_csv(name, bytes)?;
        let column_names = df.get_column_names();
        for required in [COL::REF_REGION, COL::REF_LATITUDE, COL::REF_LONGITUDE] {
            if !column_names.contains(&required) {
                return Err(CovidashError::fetch(
                    name,
                    format!("missing column '{required}'"),
                ));
            }
        }
        let df = df
            .lazy()
            .select([
                col(COL::REF_REGION).cast(DataType::String).alias(COL::REGION),
                col(COL::REF_LATITUDE)
                    .cast(DataType::Float64)
                    .alias(COL::REF_LAT),
                col(COL::REF_LONGITUDE)
                    .cast(DataType::Float64)
                    .alias(COL::REF_LONG),
            ])
            .filter(col(COL::REGION).is_not_null())
            .collect()?;
        Ok(Self::deduplicated(df)?)
    }

    // A region listed twice would duplicate rows in the left join, so keep the first entry
    fn deduplicated(df: DataFrame) -> PolarsResult<Self> {
        let df = df
            .lazy()
            .group_by_stable([col(COL::REGION)])
            .agg([col(COL::REF_LAT).first(), col(COL::REF_LONG).first()])
            .collect()?;
        Ok(Self(df))
    }

    pub fn data(&self) -> &DataFrame {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.height()
    }

    pub fn is_empty(&self) -> bool {
        self.0.height() == 0
    }
}

/// Fetch and validate the time series for `source` from its configured location.
pub async fn load_raw_table(source: Source, config: &Config) -> CovidashResult<RawTable> {
    let location = config.location(source);
    info!("Attempting to load {source} time series from {location}");
    let bytes = fetch_bytes(&source.to_string(), location, config.timeout()).await?;
    let table = RawTable::from_csv_bytes(source, bytes)?;
    info!(
        "Loaded {source} time series with shape: {:?}",
        table.data().shape()
    );
    Ok(table)
}

/// Fetch the coordinate reference table, or an empty one when no location is configured.
pub async fn load_coordinate_ref(config: &Config) -> CovidashResult<CoordinateRef> {
    let Some(location) = config.coordinates.as_deref() else {
        info!("No coordinate reference configured, keeping source coordinates");
        return Ok(CoordinateRef::empty()?);
    };
    info!("Attempting to load coordinate reference from {location}");
    let bytes = fetch_bytes("coordinates", location, config.timeout()).await?;
    let coordinates = CoordinateRef::from_csv_bytes(bytes)?;
    info!("Loaded {} reference coordinates", coordinates.len());
    Ok(coordinates)
}
