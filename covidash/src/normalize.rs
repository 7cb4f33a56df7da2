//! Wide-to-long reshaping of the published time series.

use std::collections::BTreeMap;

use anyhow::Context;
use chrono::NaiveDate;
use itertools::izip;
use log::{debug, info, warn};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    source::{CoordinateRef, RawTable},
    COL,
};

/// One (region, date) observation of the long table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LongRow {
    pub region: String,
    pub date: NaiveDate,
    pub value: i64,
    pub lat: Option<f64>,
    pub long: Option<f64>,
}

/// The normalized table: columns `region`, `date`, `value`, `lat`, `long`, with exactly one row per
/// (region, date), sorted by region then date.
#[derive(Clone, Debug, PartialEq)]
pub struct LongTable(DataFrame);

impl LongTable {
    pub fn data(&self) -> &DataFrame {
        &self.0
    }

    pub fn height(&self) -> usize {
        self.0.height()
    }

    pub fn rows(&self) -> anyhow::Result<Vec<LongRow>> {
        let df = &self.0;
        izip!(
            df.column(COL::REGION)?.str()?,
            df.column(COL::DATE)?.date()?.as_date_iter(),
            df.column(COL::VALUE)?.i64()?,
            df.column(COL::LAT)?.f64()?,
            df.column(COL::LONG)?.f64()?,
        )
        .map(|(region, date, value, lat, long)| -> anyhow::Result<LongRow> {
            Ok(LongRow {
                region: region.context("Long table contains a null region")?.to_string(),
                date: date.context("Long table contains a null date")?,
                value: value.unwrap_or_default(),
                lat,
                long,
            })
        })
        .collect()
    }

    /// Distinct region names, sorted
    pub fn regions(&self) -> anyhow::Result<Vec<String>> {
        let regions = self.0.column(COL::REGION)?.str()?;
        let mut names: Vec<String> = regions
            .into_iter()
            .flatten()
            .map(|region| region.to_string())
            .collect();
        names.sort_unstable();
        names.dedup();
        Ok(names)
    }
}

/// Reshape a wide table into a `LongTable`.
///
/// Date columns are melted into (region, date, value) triples, entries sharing a region name are
/// summed and the reference coordinates are left-joined on the region name. A non-null reference
/// coordinate replaces the source one; regions missing from the reference keep their own
/// (possibly null) coordinates and are never dropped.
pub fn normalize(raw: &RawTable, coordinates: &CoordinateRef) -> anyhow::Result<LongTable> {
    let df = raw.data();
    let regions = df.column(COL::SOURCE_COUNTRY_REGION)?.str()?;
    let lats = df.column(COL::SOURCE_LAT)?.cast(&DataType::Float64)?;
    let longs = df.column(COL::SOURCE_LONG)?.cast(&DataType::Float64)?;

    // Static attributes: the first coordinates listed for each region
    let mut source_coordinates: BTreeMap<&str, (Option<f64>, Option<f64>)> = BTreeMap::new();
    for (region, lat, long) in izip!(regions, lats.f64()?, longs.f64()?) {
        let region = region.context("Source table contains a null region")?;
        source_coordinates.entry(region).or_insert((lat, long));
    }

    let n_cells = df.height() * raw.date_columns().len();
    let mut melted_regions: Vec<&str> = Vec::with_capacity(n_cells);
    let mut melted_dates: Vec<NaiveDate> = Vec::with_capacity(n_cells);
    let mut melted_values: Vec<i64> = Vec::with_capacity(n_cells);
    let mut null_cells = 0;
    let mut negative_cells = 0;
    for (column, date) in raw.date_columns() {
        let values = df.column(column)?.strict_cast(&DataType::Int64)?;
        for (region, value) in izip!(regions, values.i64()?) {
            let value = value.unwrap_or_else(|| {
                null_cells += 1;
                0
            });
            if value < 0 {
                negative_cells += 1;
            }
            melted_regions.push(region.unwrap_or_default());
            melted_dates.push(*date);
            melted_values.push(value);
        }
    }
    if null_cells > 0 {
        warn!(
            "{}: {null_cells} empty cells counted as zero",
            raw.source()
        );
    }
    if negative_cells > 0 {
        warn!(
            "{}: {negative_cells} negative cumulative values kept as published",
            raw.source()
        );
    }

    let melted = DataFrame::new(vec![
        Series::new(COL::REGION, melted_regions),
        Series::new(COL::DATE, melted_dates),
        Series::new(COL::VALUE, melted_values),
    ])?;
    debug!("{}: melted table shape {:?}", raw.source(), melted.shape());

    let source_coordinates = DataFrame::new(vec![
        Series::new(
            COL::REGION,
            source_coordinates.keys().copied().collect::<Vec<&str>>(),
        ),
        Series::new(
            COL::LAT,
            source_coordinates
                .values()
                .map(|c| c.0)
                .collect::<Vec<Option<f64>>>(),
        ),
        Series::new(
            COL::LONG,
            source_coordinates
                .values()
                .map(|c| c.1)
                .collect::<Vec<Option<f64>>>(),
        ),
    ])?;

    let long = melted
        .lazy()
        .group_by([col(COL::REGION), col(COL::DATE)])
        .agg([col(COL::VALUE).sum()])
        .join(
            coordinates.data().clone().lazy(),
            [col(COL::REGION)],
            [col(COL::REGION)],
            JoinArgs::new(JoinType::Left),
        )
        .join(
            source_coordinates.lazy(),
            [col(COL::REGION)],
            [col(COL::REGION)],
            JoinArgs::new(JoinType::Left),
        )
        .with_columns([
            when(col(COL::REF_LAT).is_not_null())
                .then(col(COL::REF_LAT))
                .otherwise(col(COL::LAT))
                .alias(COL::LAT),
            when(col(COL::REF_LONG).is_not_null())
                .then(col(COL::REF_LONG))
                .otherwise(col(COL::LONG))
                .alias(COL::LONG),
        ])
        .select([
            col(COL::REGION),
            col(COL::DATE),
            col(COL::VALUE),
            col(COL::LAT),
            col(COL::LONG),
        ])
        .sort_by_exprs(
            [col(COL::REGION), col(COL::DATE)],
            SortMultipleOptions::default(),
        )
        .collect()?;
    info!(
        "Normalized {} time series with shape: {:?}",
        raw.source(),
        long.shape()
    );

    Ok(LongTable(long))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::source::{
        tests::{raw, CENTROIDS_CSV, CONFIRMED_CSV},
        Source,
    };

    pub(crate) fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, d).unwrap()
    }

    pub(crate) fn confirmed_long() -> LongTable {
        let coordinates = CoordinateRef::from_csv_bytes(CENTROIDS_CSV.as_bytes().to_vec()).unwrap();
        normalize(&raw(Source::Confirmed, CONFIRMED_CSV), &coordinates).unwrap()
    }

    fn rows_for(table: &LongTable, region: &str) -> Vec<LongRow> {
        table
            .rows()
            .unwrap()
            .into_iter()
            .filter(|row| row.region == region)
            .collect()
    }

    #[test]
    fn sub_regions_should_be_summed() {
        let table = confirmed_long();
        let testland = rows_for(&table, "Testland");
        assert_eq!(
            testland.iter().map(|row| row.value).collect::<Vec<_>>(),
            vec![10, 10, 15]
        );
        assert_eq!(
            testland.iter().map(|row| row.date).collect::<Vec<_>>(),
            vec![day(22), day(23), day(24)]
        );
    }

    #[test]
    fn long_table_has_one_row_per_region_and_date() {
        let table = confirmed_long();
        assert_eq!(table.height(), 3 * 3, "three regions over three dates");
        assert_eq!(
            table.regions().unwrap(),
            vec!["Nocoordia", "Russia", "Testland"]
        );
        let rows = table.rows().unwrap();
        let mut keys: Vec<(String, NaiveDate)> =
            rows.iter().map(|row| (row.region.clone(), row.date)).collect();
        keys.dedup();
        assert_eq!(keys.len(), rows.len());
    }

    #[test]
    fn reference_coordinates_should_override_source() {
        let table = confirmed_long();
        for row in rows_for(&table, "Testland") {
            assert_eq!((row.lat, row.long), (Some(10.0), Some(20.0)));
        }
        for row in rows_for(&table, "Russia") {
            assert_eq!((row.lat, row.long), (Some(61.98052), Some(96.68656)));
        }
    }

    #[test]
    fn unmatched_regions_should_be_kept() {
        let table = confirmed_long();
        let nocoordia = rows_for(&table, "Nocoordia");
        assert_eq!(nocoordia.len(), 3);
        assert!(nocoordia.iter().all(|row| row.lat.is_none() && row.long.is_none()));
        assert_eq!(
            nocoordia.iter().map(|row| row.value).collect::<Vec<_>>(),
            vec![1, 1, 2]
        );
    }

    #[test]
    fn source_coordinates_should_be_kept_without_reference() {
        let table = normalize(
            &raw(Source::Confirmed, CONFIRMED_CSV),
            &CoordinateRef::empty().unwrap(),
        )
        .unwrap();
        // First listed entry wins for regions split over several rows
        for row in rows_for(&table, "Testland") {
            assert_eq!((row.lat, row.long), (Some(10.5), Some(20.25)));
        }
        for row in rows_for(&table, "Russia") {
            assert_eq!((row.lat, row.long), (Some(61.52401), Some(105.318756)));
        }
    }

    #[test]
    fn negative_values_should_be_kept() {
        let csv = "Country/Region,Lat,Long,1/22/20,1/23/20\nTestland,1.0,2.0,3,-1\nTestland,1.0,2.0,2,2\n";
        let table = normalize(
            &raw(Source::Confirmed, csv),
            &CoordinateRef::empty().unwrap(),
        )
        .unwrap();
        assert_eq!(
            table
                .rows()
                .unwrap()
                .iter()
                .map(|row| row.value)
                .collect::<Vec<_>>(),
            vec![5, 1]
        );
    }

    #[test]
    fn regions_should_be_sorted_and_distinct() {
        let csv = "Country/Region,Lat,Long,1/22/20\nZedland,1.0,2.0,1\nAland,1.0,2.0,1\nZedland,3.0,4.0,1\n";
        let table = normalize(
            &raw(Source::Deaths, csv),
            &CoordinateRef::empty().unwrap(),
        )
        .unwrap();
        assert_eq!(table.regions().unwrap(), vec!["Aland", "Zedland"]);
    }

    #[test]
    fn empty_cells_should_count_as_zero() {
        let csv = "Country/Region,Lat,Long,1/22/20,1/23/20\nTestland,1.0,2.0,,4\nTestland,1.0,2.0,3,\n";
        let table = normalize(
            &raw(Source::Recovered, csv),
            &CoordinateRef::empty().unwrap(),
        )
        .unwrap();
        assert_eq!(
            table
                .rows()
                .unwrap()
                .iter()
                .map(|row| row.value)
                .collect::<Vec<_>>(),
            vec![3, 4]
        );
    }
}
