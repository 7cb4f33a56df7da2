use serde::{Deserialize, Serialize};

use crate::{
    series::{Temporality, TimeSeries},
    source::Source,
};

/// A headline number: the latest value of a series and, for running totals, its change since the
/// previous entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMetric {
    pub source: Source,
    pub value: Option<i64>,
    pub delta: Option<i64>,
}

impl KeyMetric {
    pub fn from_series(source: Source, series: &TimeSeries, temporality: Temporality) -> Self {
        let value = series.latest().map(|(_, value)| value);
        let delta = match temporality {
            Temporality::Cumulative => value
                .zip(series.previous())
                .map(|(latest, (_, previous))| latest - previous),
            Temporality::New => None,
        };
        Self {
            source,
            value,
            delta,
        }
    }
}

/// The three headline indicators shown above the charts.
pub fn key_metrics(
    confirmed: &TimeSeries,
    recovered: &TimeSeries,
    deaths: &TimeSeries,
    temporality: Temporality,
) -> [KeyMetric; 3] {
    [
        KeyMetric::from_series(Source::Confirmed, confirmed, temporality),
        KeyMetric::from_series(Source::Recovered, recovered, temporality),
        KeyMetric::from_series(Source::Deaths, deaths, temporality),
    ]
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn series(values: &[i64]) -> TimeSeries {
        values
            .iter()
            .enumerate()
            .map(|(idx, value)| {
                (
                    NaiveDate::from_ymd_opt(2020, 2, idx as u32 + 1).unwrap(),
                    *value,
                )
            })
            .collect()
    }

    #[test]
    fn cumulative_metrics_should_carry_delta() {
        let [confirmed, recovered, deaths] = key_metrics(
            &series(&[13, 14, 24]),
            &series(&[1, 4, 8]),
            &series(&[0, 0, 2]),
            Temporality::Cumulative,
        );
        assert_eq!(
            confirmed,
            KeyMetric {
                source: Source::Confirmed,
                value: Some(24),
                delta: Some(10)
            }
        );
        assert_eq!((recovered.value, recovered.delta), (Some(8), Some(4)));
        assert_eq!((deaths.value, deaths.delta), (Some(2), Some(2)));
    }

    #[test]
    fn new_metrics_should_have_no_delta() {
        let metric = KeyMetric::from_series(Source::Deaths, &series(&[0, 3, 1]), Temporality::New);
        assert_eq!((metric.value, metric.delta), (Some(1), None));
    }

    #[test]
    fn short_series_should_not_fail() {
        let empty = KeyMetric::from_series(
            Source::Confirmed,
            &TimeSeries::new(),
            Temporality::Cumulative,
        );
        assert_eq!((empty.value, empty.delta), (None, None));

        let single =
            KeyMetric::from_series(Source::Confirmed, &series(&[5]), Temporality::Cumulative);
        assert_eq!((single.value, single.delta), (Some(5), None));
    }
}
