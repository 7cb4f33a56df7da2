use std::io::Write;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use enum_dispatch::enum_dispatch;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::COL;

/// Days between 0001-01-01 and the unix epoch, the origin of polars dates
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Utility function to convert from polars `AnyValue` to `serde_json::Value`.
/// Covers the types found in the dashboard tables.
fn any_value_to_json(value: &AnyValue) -> Result<Value> {
    match value {
        AnyValue::Null => Ok(Value::Null),
        AnyValue::Boolean(b) => Ok(Value::Bool(*b)),
        AnyValue::String(s) => Ok(Value::String((*s).to_string())),
        AnyValue::Int32(n) => Ok(json!(*n)),
        AnyValue::Int64(n) => Ok(json!(*n)),
        AnyValue::UInt32(n) => Ok(json!(*n)),
        AnyValue::UInt64(n) => Ok(json!(*n)),
        AnyValue::Float32(n) => Ok(json!(*n)),
        AnyValue::Float64(n) => Ok(json!(*n)),
        AnyValue::Date(days) => NaiveDate::from_num_days_from_ce_opt(days + EPOCH_DAYS_FROM_CE)
            .map(|date| json!(date.to_string()))
            .ok_or_else(|| anyhow!("Date out of range: {days}")),
        other => Err(anyhow!("Failed to convert {other:?} to JSON")),
    }
}

/// One GeoJSON point feature per row with both coordinates; every other column is a property.
fn point_features(df: &DataFrame) -> Result<Vec<geojson::Feature>> {
    let lat = df.column(COL::LAT)?.cast(&DataType::Float64)?;
    let long = df.column(COL::LONG)?.cast(&DataType::Float64)?;
    let properties_cols: Vec<&Series> = df
        .get_columns()
        .iter()
        .filter(|col| col.name() != COL::LAT && col.name() != COL::LONG)
        .collect();

    let mut features = vec![];
    for (idx, coords) in lat.f64()?.into_iter().zip(long.f64()?).enumerate() {
        let (Some(lat), Some(long)) = coords else {
            continue;
        };
        let mut properties = serde_json::Map::new();
        for col in &properties_cols {
            let val = any_value_to_json(&col.get(idx)?)?;
            properties.insert(col.name().to_string(), val);
        }
        features.push(geojson::Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::Point(vec![
                long, lat,
            ]))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        });
    }
    Ok(features)
}

/// Trait to define different output generators. Defines two
/// functions, format which generates a serialized string of the
/// `DataFrame` and save which writes it to a writer
#[enum_dispatch]
pub trait OutputGenerator {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()>;
    fn format(&self, df: &mut DataFrame) -> Result<String> {
        let mut data: Vec<u8> = vec![];
        self.save(&mut data, df)?;
        Ok(String::from_utf8(data)?)
    }
}

/// Enum of OutputFormatters one for each potential
/// output type
#[enum_dispatch(OutputGenerator)]
#[derive(Serialize, Deserialize, Debug)]
pub enum OutputFormatter {
    GeoJSON(GeoJSONFormatter),
    GeoJSONSeq(GeoJSONSeqFormatter),
    Csv(CSVFormatter),
}

/// Format the results as geojson sequence format
/// This is one line per feature serialized as a
/// geojson feature
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct GeoJSONSeqFormatter;

impl OutputGenerator for GeoJSONSeqFormatter {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()> {
        for feature in point_features(df)? {
            writeln!(writer, "{feature}")?;
        }
        Ok(())
    }
}

/// Format the results as a CSV file
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct CSVFormatter;

impl OutputGenerator for CSVFormatter {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()> {
        CsvWriter::new(writer).finish(df)?;
        Ok(())
    }
}

/// Format the results as a geojson feature collection of points
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct GeoJSONFormatter;

impl OutputGenerator for GeoJSONFormatter {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()> {
        let feature_collection = geojson::FeatureCollection {
            bbox: None,
            features: point_features(df)?,
            foreign_members: None,
        };
        writer.write_all(feature_collection.to_string().as_bytes())?;
        Ok(())
    }
}
