//! Date-indexed series produced by the aggregator and the derived metric calculations.

use std::collections::BTreeMap;

use anyhow::Context;
use chrono::NaiveDate;
use itertools::izip;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::source::Source;
use crate::COL;

/// Metrics shown on the dashboard. `Active` has no source file of its own and is derived from
/// `Confirmed` and `Recovered`.
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
pub enum Metric {
    Confirmed,
    Recovered,
    Deaths,
    Active,
}

impl Metric {
    /// The source file a metric is read from, `None` for derived metrics.
    pub fn source(&self) -> Option<Source> {
        match self {
            Metric::Confirmed => Some(Source::Confirmed),
            Metric::Recovered => Some(Source::Recovered),
            Metric::Deaths => Some(Source::Deaths),
            Metric::Active => None,
        }
    }
}

impl From<Source> for Metric {
    fn from(source: Source) -> Self {
        match source {
            Source::Confirmed => Metric::Confirmed,
            Source::Recovered => Metric::Recovered,
            Source::Deaths => Metric::Deaths,
        }
    }
}

/// Whether a series holds running totals or per-date increments.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
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
pub enum Temporality {
    #[default]
    Cumulative,
    New,
}

/// An ordered date -> value mapping. Dates are unique and iterate in increasing order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeries(BTreeMap<NaiveDate, i64>);

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, date: &NaiveDate) -> Option<i64> {
        self.0.get(date).copied()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (NaiveDate, i64)> + '_ {
        self.0.iter().map(|(date, value)| (*date, *value))
    }

    pub fn dates(&self) -> impl DoubleEndedIterator<Item = NaiveDate> + '_ {
        self.0.keys().copied()
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = i64> + '_ {
        self.0.values().copied()
    }

    pub fn first(&self) -> Option<(NaiveDate, i64)> {
        self.iter().next()
    }

    /// Most recent entry, `None` for an empty series.
    pub fn latest(&self) -> Option<(NaiveDate, i64)> {
        self.iter().next_back()
    }

    /// Entry preceding the most recent one.
    pub fn previous(&self) -> Option<(NaiveDate, i64)> {
        self.iter().rev().nth(1)
    }

    /// Reads a series from a dataframe with a date column and an integer value column.
    pub fn from_dataframe(df: &DataFrame) -> anyhow::Result<Self> {
        let values = df.column(COL::VALUE)?.cast(&DataType::Int64)?;
        izip!(df.column(COL::DATE)?.date()?.as_date_iter(), values.i64()?)
            .map(|(date, value)| -> anyhow::Result<(NaiveDate, i64)> {
                let date = date.context("Series dataframe contains a null date")?;
                Ok((date, value.unwrap_or_default()))
            })
            .collect()
    }

    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        DataFrame::new(vec![
            Series::new(COL::DATE, self.dates().collect::<Vec<NaiveDate>>()),
            Series::new(COL::VALUE, self.values().collect::<Vec<i64>>()),
        ])
    }
}

impl FromIterator<(NaiveDate, i64)> for TimeSeries {
    fn from_iter<T: IntoIterator<Item = (NaiveDate, i64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
