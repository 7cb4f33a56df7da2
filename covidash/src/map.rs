//! Frames of the animated map of confirmed cases.

use std::collections::BTreeMap;

use anyhow::bail;
use chrono::{Duration, NaiveDate};
use log::debug;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{normalize::LongTable, COL};

/// Marker size given to the largest value of the table.
pub const MAX_MARKER_SIZE: f64 = 50.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapPoint {
    pub region: String,
    pub lat: f64,
    pub long: f64,
    pub value: i64,
    /// Marker size, proportional to the square root of `value`
    pub norm: f64,
}

/// The points drawn for one time bucket, labelled with the bucket's first date.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapFrame {
    pub start: NaiveDate,
    pub points: Vec<MapPoint>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MapFrames(pub Vec<MapFrame>);

impl MapFrames {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flatten the frames into a dataframe with one row per drawn point.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let points = self
            .0
            .iter()
            .flat_map(|frame| frame.points.iter().map(move |point| (frame.start, point)));
        let mut frames = vec![];
        let mut regions = vec![];
        let mut lats = vec![];
        let mut longs = vec![];
        let mut values = vec![];
        let mut norms = vec![];
        for (start, point) in points {
            frames.push(start);
            regions.push(point.region.as_str());
            lats.push(point.lat);
            longs.push(point.long);
            values.push(point.value);
            norms.push(point.norm);
        }
        DataFrame::new(vec![
            Series::new(COL::FRAME, frames),
            Series::new(COL::REGION, regions),
            Series::new(COL::LAT, lats),
            Series::new(COL::LONG, longs),
            Series::new(COL::VALUE, values),
            Series::new(COL::NORM, norms),
        ])
    }
}

fn marker_size(value: i64, max_value: i64) -> f64 {
    if max_value <= 0 {
        return 0.0;
    }
    (value.max(0) as f64).sqrt() / (max_value as f64).sqrt() * MAX_MARKER_SIZE
}

/// Bucket the long table into frames of `bucket_days` days, anchored at the table's first date.
///
/// Within a frame each region keeps its largest value and marker size. Regions without both
/// coordinates cannot be placed and are left out.
pub fn map_frames(table: &LongTable, bucket_days: u32) -> anyhow::Result<MapFrames> {
    if bucket_days == 0 {
        bail!("Map frames must span at least one day");
    }
    let rows = table.rows()?;
    let Some(first_date) = rows.iter().map(|row| row.date).min() else {
        return Ok(MapFrames::default());
    };
    let max_value = rows.iter().map(|row| row.value).max().unwrap_or_default();

    let mut buckets: BTreeMap<NaiveDate, BTreeMap<String, MapPoint>> = BTreeMap::new();
    for row in rows {
        let (Some(lat), Some(long)) = (row.lat, row.long) else {
            continue;
        };
        let offset = (row.date - first_date).num_days() / i64::from(bucket_days);
        let start = first_date + Duration::days(offset * i64::from(bucket_days));
        let norm = marker_size(row.value, max_value);
        buckets
            .entry(start)
            .or_default()
            .entry(row.region.clone())
            .and_modify(|point| {
                point.value = point.value.max(row.value);
                point.norm = point.norm.max(norm);
            })
            .or_insert(MapPoint {
                region: row.region,
                lat,
                long,
                value: row.value,
                norm,
            });
    }
    debug!("Built {} map frames from {first_date}", buckets.len());

    Ok(MapFrames(
        buckets
            .into_iter()
            .map(|(start, points)| MapFrame {
                start,
                points: points.into_values().collect(),
            })
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::tests::{confirmed_long, day};

    #[test]
    fn frames_should_bucket_dates() -> anyhow::Result<()> {
        let frames = map_frames(&confirmed_long(), 2)?;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames.0[0].start, day(22));
        assert_eq!(frames.0[1].start, day(24));

        let first: Vec<(&str, i64)> = frames.0[0]
            .points
            .iter()
            .map(|p| (p.region.as_str(), p.value))
            .collect();
        assert_eq!(first, vec![("Russia", 3), ("Testland", 10)]);
        Ok(())
    }

    #[test]
    fn regions_without_coordinates_are_not_drawn() -> anyhow::Result<()> {
        let frames = map_frames(&confirmed_long(), 1)?;
        assert_eq!(frames.len(), 3);
        assert!(frames
            .0
            .iter()
            .flat_map(|frame| frame.points.iter())
            .all(|point| point.region != "Nocoordia"));
        Ok(())
    }

    #[test]
    fn norm_should_scale_with_square_root() -> anyhow::Result<()> {
        let frames = map_frames(&confirmed_long(), 2)?;
        let testland_last = &frames.0[1].points[1];
        assert_eq!(testland_last.region, "Testland");
        assert_eq!(testland_last.value, 15);
        assert!((testland_last.norm - MAX_MARKER_SIZE).abs() < 1e-9);

        let russia_first = &frames.0[0].points[0];
        let expected = 3f64.sqrt() / 15f64.sqrt() * MAX_MARKER_SIZE;
        assert!((russia_first.norm - expected).abs() < 1e-9);
        assert_eq!(marker_size(0, 0), 0.0);
        Ok(())
    }

    #[test]
    fn frames_should_flatten_to_dataframe() -> anyhow::Result<()> {
        let df = map_frames(&confirmed_long(), 2)?.to_dataframe()?;
        assert_eq!(df.shape(), (4, 6));
        assert_eq!(df.column(COL::FRAME)?.dtype(), &DataType::Date);
        Ok(())
    }

    #[test]
    fn zero_day_buckets_are_rejected() {
        assert!(map_frames(&confirmed_long(), 0).is_err());
    }
}
