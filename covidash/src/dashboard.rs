use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use log::{debug, info};
use serde::Serialize;
use strum::IntoEnumIterator;

use crate::{
    aggregate::{aggregate, Scope},
    config::Config,
    derived::{active, incremental, rolling_mean},
    indicators::{key_metrics, KeyMetric},
    map::{map_frames, MapFrames},
    normalize::{normalize, LongTable},
    series::{Metric, Temporality, TimeSeries},
    source::{load_coordinate_ref, load_raw_table, Source},
    view::{Panel, View},
};

/// Identifies one series of the bundle.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SeriesKey {
    pub metric: Metric,
    pub scope: Scope,
    pub temporality: Temporality,
}

/// A chart with its series and, when the chart draws one, the rolling mean
pub type PanelSeries = (Panel, TimeSeries, Option<Vec<Option<i64>>>);

/// Everything the presentation layer consumes: the long table of each source and every
/// {metric} x {world, highlighted region} x {cumulative, new} series.
///
/// A `Dashboard` is built in one go and never modified afterwards. Loading it again gives a fresh,
/// independent bundle.
#[derive(Clone, Debug)]
pub struct Dashboard {
    region: String,
    map_bucket_days: u32,
    rolling_window: usize,
    tables: BTreeMap<Source, LongTable>,
    series: BTreeMap<SeriesKey, TimeSeries>,
}

impl Dashboard {
    /// Run the full pipeline: fetch each source in turn, normalize it and derive the series.
    /// Any failure aborts the whole load.
    pub async fn build(config: &Config) -> Result<Self> {
        let coordinates = load_coordinate_ref(config).await?;
        let mut tables = BTreeMap::new();
        for source in Source::iter() {
            let raw = load_raw_table(source, config).await?;
            tables.insert(source, normalize(&raw, &coordinates)?);
        }
        Self::from_tables(config, tables)
    }

    /// Derive the bundle from already normalized tables. Requires a table for every source.
    pub fn from_tables(config: &Config, tables: BTreeMap<Source, LongTable>) -> Result<Self> {
        if let Some(missing) = Source::iter().find(|source| !tables.contains_key(source)) {
            return Err(anyhow!("No long table for the {missing} source"));
        }
        let mut dashboard = Self {
            region: config.region.clone(),
            map_bucket_days: config.map_bucket_days,
            rolling_window: config.rolling_window,
            tables,
            series: BTreeMap::new(),
        };
        let mut series = BTreeMap::new();
        for scope in [Scope::World, Scope::Region(dashboard.region.clone())] {
            for metric in Metric::iter() {
                for temporality in Temporality::iter() {
                    let values = dashboard.compute(metric, &scope, temporality)?;
                    debug!("{metric} {temporality} for {scope}: {} dates", values.len());
                    series.insert(
                        SeriesKey {
                            metric,
                            scope: scope.clone(),
                            temporality,
                        },
                        values,
                    );
                }
            }
        }
        info!("Built {} series for World and {}", series.len(), dashboard.region);
        dashboard.series = series;
        Ok(dashboard)
    }

    /// The highlighted region
    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn table(&self, source: Source) -> Result<&LongTable> {
        self.tables
            .get(&source)
            .ok_or_else(|| anyhow!("No long table for the {source} source"))
    }

    /// A series of the bundle. Only the world and the highlighted region are stored; use
    /// `compute` for other regions.
    pub fn series(
        &self,
        metric: Metric,
        scope: &Scope,
        temporality: Temporality,
    ) -> Option<&TimeSeries> {
        self.series.get(&SeriesKey {
            metric,
            scope: scope.clone(),
            temporality,
        })
    }

    pub fn all_series(&self) -> impl Iterator<Item = (&SeriesKey, &TimeSeries)> {
        self.series.iter()
    }

    /// Derive a series for any scope from the long tables.
    pub fn compute(
        &self,
        metric: Metric,
        scope: &Scope,
        temporality: Temporality,
    ) -> Result<TimeSeries> {
        match metric.source() {
            Some(source) => {
                let cumulative = aggregate(self.table(source)?, scope)?;
                Ok(match temporality {
                    Temporality::Cumulative => cumulative,
                    Temporality::New => incremental(&cumulative),
                })
            }
            None => {
                let confirmed = self.compute(Metric::Confirmed, scope, temporality)?;
                let recovered = self.compute(Metric::Recovered, scope, temporality)?;
                Ok(active(&confirmed, &recovered))
            }
        }
    }

    /// Stored series if available, computed otherwise
    pub fn series_or_compute(
        &self,
        metric: Metric,
        scope: &Scope,
        temporality: Temporality,
    ) -> Result<TimeSeries> {
        match self.series(metric, scope, temporality) {
            Some(series) => Ok(series.clone()),
            None => self.compute(metric, scope, temporality),
        }
    }

    pub fn scope(&self, view: View) -> Scope {
        view.tab().scope(&self.region)
    }

    /// Headline indicators of a view
    pub fn key_metrics(&self, view: View) -> Result<[KeyMetric; 3]> {
        let scope = self.scope(view);
        let mode = view.mode();
        Ok(key_metrics(
            &self.series_or_compute(Metric::Confirmed, &scope, mode)?,
            &self.series_or_compute(Metric::Recovered, &scope, mode)?,
            &self.series_or_compute(Metric::Deaths, &scope, mode)?,
            mode,
        ))
    }

    /// The charts of a view, in display order
    pub fn panels(&self, view: View) -> Result<Vec<PanelSeries>> {
        let scope = self.scope(view);
        view.panels()
            .iter()
            .map(|panel| -> Result<PanelSeries> {
                let series = self.series_or_compute(panel.metric, &scope, panel.temporality)?;
                let mean = panel
                    .rolling_mean
                    .then(|| rolling_mean(&series, self.rolling_window));
                Ok((*panel, series, mean))
            })
            .collect()
    }

    pub fn rolling_mean(&self, series: &TimeSeries) -> Vec<Option<i64>> {
        rolling_mean(series, self.rolling_window)
    }

    /// Frames of the animated map of confirmed cases
    pub fn map_frames(&self) -> Result<MapFrames> {
        map_frames(self.table(Source::Confirmed)?, self.map_bucket_days)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::normalize::tests::day;
    use crate::source::{
        tests::{raw, CENTROIDS_CSV, CONFIRMED_CSV, DEATHS_CSV, RECOVERED_CSV},
        CoordinateRef,
    };

    pub(crate) fn fixture_tables() -> BTreeMap<Source, LongTable> {
        let coordinates = CoordinateRef::from_csv_bytes(CENTROIDS_CSV.as_bytes().to_vec()).unwrap();
        [
            (Source::Confirmed, CONFIRMED_CSV),
            (Source::Recovered, RECOVERED_CSV),
            (Source::Deaths, DEATHS_CSV),
        ]
        .into_iter()
        .map(|(source, csv)| (source, normalize(&raw(source, csv), &coordinates).unwrap()))
        .collect()
    }

    pub(crate) fn fixture_dashboard() -> Dashboard {
        Dashboard::from_tables(&Config::default(), fixture_tables()).unwrap()
    }

    fn values(series: Option<&TimeSeries>) -> Vec<i64> {
        series.expect("series should exist").values().collect()
    }

    #[test]
    fn bundle_should_hold_every_series() {
        let dashboard = fixture_dashboard();
        assert_eq!(dashboard.all_series().count(), 4 * 2 * 2);
        assert_eq!(dashboard.region(), "Russia");
    }

    #[test]
    fn world_series_should_be_derived() {
        let dashboard = fixture_dashboard();
        let world = Scope::World;
        assert_eq!(
            values(dashboard.series(Metric::Confirmed, &world, Temporality::Cumulative)),
            vec![13, 14, 24]
        );
        assert_eq!(
            values(dashboard.series(Metric::Confirmed, &world, Temporality::New)),
            vec![0, 1, 10]
        );
        assert_eq!(
            values(dashboard.series(Metric::Recovered, &world, Temporality::Cumulative)),
            vec![1, 4, 8]
        );
        assert_eq!(
            values(dashboard.series(Metric::Active, &world, Temporality::Cumulative)),
            vec![12, 10, 16]
        );
        assert_eq!(
            values(dashboard.series(Metric::Deaths, &world, Temporality::New)),
            vec![0, 0, 2]
        );
    }

    #[test]
    fn region_series_should_be_derived() {
        let dashboard = fixture_dashboard();
        let russia = Scope::Region("Russia".into());
        assert_eq!(
            values(dashboard.series(Metric::Active, &russia, Temporality::Cumulative)),
            vec![2, 2, 5]
        );
        assert_eq!(
            values(dashboard.series(Metric::Active, &russia, Temporality::New)),
            vec![0, 0, 3]
        );
    }

    #[test]
    fn active_equals_confirmed_minus_recovered() {
        let dashboard = fixture_dashboard();
        for scope in [Scope::World, Scope::Region("Russia".into())] {
            let confirmed = dashboard
                .series(Metric::Confirmed, &scope, Temporality::Cumulative)
                .unwrap();
            let recovered = dashboard
                .series(Metric::Recovered, &scope, Temporality::Cumulative)
                .unwrap();
            let active = dashboard
                .series(Metric::Active, &scope, Temporality::Cumulative)
                .unwrap();
            for (date, value) in active.iter() {
                assert_eq!(
                    value,
                    confirmed.get(&date).unwrap() - recovered.get(&date).unwrap()
                );
            }
        }
    }

    #[test]
    fn other_regions_should_be_computed_on_demand() -> Result<()> {
        let dashboard = fixture_dashboard();
        let testland = Scope::Region("Testland".into());
        assert!(dashboard
            .series(Metric::Confirmed, &testland, Temporality::New)
            .is_none());
        let new = dashboard.compute(Metric::Confirmed, &testland, Temporality::New)?;
        assert_eq!(
            new.iter().collect::<Vec<_>>(),
            vec![(day(22), 0), (day(23), 0), (day(24), 5)]
        );

        let unknown = dashboard.compute(
            Metric::Active,
            &Scope::Region("Atlantis".into()),
            Temporality::Cumulative,
        )?;
        assert!(unknown.is_empty());
        Ok(())
    }

    #[test]
    fn key_metrics_should_follow_view() -> Result<()> {
        let dashboard = fixture_dashboard();
        let [confirmed, _, deaths] = dashboard.key_metrics(View::WorldCumulative)?;
        assert_eq!((confirmed.value, confirmed.delta), (Some(24), Some(10)));
        assert_eq!((deaths.value, deaths.delta), (Some(2), Some(2)));

        let [confirmed, _, _] = dashboard.key_metrics(View::RegionNew)?;
        assert_eq!((confirmed.value, confirmed.delta), (Some(4), None));
        Ok(())
    }

    #[test]
    fn panels_should_carry_rolling_mean() -> Result<()> {
        let dashboard = fixture_dashboard();
        let panels = dashboard.panels(View::WorldNew)?;
        assert_eq!(panels.len(), 4);
        let (panel, series, mean) = &panels[0];
        assert_eq!(panel.metric, Metric::Confirmed);
        assert_eq!(series.values().collect::<Vec<_>>(), vec![0, 1, 10]);
        assert_eq!(mean.as_deref(), Some(&[None, None, None][..]));
        assert!(panels[1].2.is_none());
        Ok(())
    }

    #[test]
    fn map_frames_should_use_confirmed_table() -> Result<()> {
        let frames = fixture_dashboard().map_frames()?;
        assert_eq!(frames.len(), 2);
        Ok(())
    }

    #[test]
    fn missing_table_is_an_error() {
        let mut tables = fixture_tables();
        tables.remove(&Source::Deaths);
        assert!(Dashboard::from_tables(&Config::default(), tables).is_err());
    }

    #[test]
    fn rebuilding_gives_identical_series() {
        let first = fixture_dashboard();
        let second = fixture_dashboard();
        assert!(first.all_series().eq(second.all_series()));
    }
}
