//! Metrics derived from cumulative series. All functions are pure: the inputs are never modified
//! and the same inputs always give the same output.

use itertools::{EitherOrBoth, Itertools};

use crate::{
    error::{CovidashError, CovidashResult},
    series::TimeSeries,
};

/// Day-over-day increments of a cumulative series.
///
/// Each value is the difference with the previous entry of the series (by position, so a skipped
/// calendar day is still a lag of one). The first entry has no predecessor and is 0.
pub fn incremental(cumulative: &TimeSeries) -> TimeSeries {
    let mut previous: Option<i64> = None;
    cumulative
        .iter()
        .map(|(date, value)| {
            let delta = previous.map_or(0, |previous| value - previous);
            previous = Some(value);
            (date, delta)
        })
        .collect()
}

/// Active cases: `confirmed - recovered`, date by date. Deaths are not subtracted.
///
/// The result covers the dates of `recovered` that are also present in `confirmed`.
pub fn active(confirmed: &TimeSeries, recovered: &TimeSeries) -> TimeSeries {
    recovered
        .iter()
        .filter_map(|(date, recovered)| {
            confirmed
                .get(&date)
                .map(|confirmed| (date, confirmed - recovered))
        })
        .collect()
}

/// Same as `active` but fails with `MisalignedSeries` when the two date axes differ.
pub fn try_active(confirmed: &TimeSeries, recovered: &TimeSeries) -> CovidashResult<TimeSeries> {
    let first_mismatch = confirmed
        .dates()
        .zip_longest(recovered.dates())
        .find_map(|pair| match pair {
            EitherOrBoth::Both(left, right) if left == right => None,
            EitherOrBoth::Both(left, right) => Some(left.min(right)),
            EitherOrBoth::Left(date) | EitherOrBoth::Right(date) => Some(date),
        });
    match first_mismatch {
        None => Ok(active(confirmed, recovered)),
        Some(date) => Err(CovidashError::MisalignedSeries {
            left: confirmed.len(),
            right: recovered.len(),
            first: Some(date),
        }),
    }
}

/// Trailing mean over `window` entries, rounded half to even, aligned with the dates of `series`.
/// Entries with fewer than `window` values before them (inclusive) are `None`.
pub fn rolling_mean(series: &TimeSeries, window: usize) -> Vec<Option<i64>> {
    let values = series.values().collect_vec();
    if window == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|idx| {
            (idx + 1 >= window).then(|| {
                let sum: i64 = values[idx + 1 - window..=idx].iter().sum();
                (sum as f64 / window as f64).round_ties_even() as i64
            })
        })
        .collect()
}
