use std::fmt::Display;

use log::debug;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{normalize::LongTable, series::TimeSeries, COL};

/// The aggregation granularity of a series: the world total or a single region.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    World,
    Region(String),
}

impl Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::World => write!(f, "World"),
            Scope::Region(region) => write!(f, "{region}"),
        }
    }
}

/// Collapse a long table into the cumulative series of `scope`.
///
/// `Scope::World` sums all regions for each date, `Scope::Region` keeps the rows whose region
/// matches exactly (case-sensitive). A region absent from the table gives an empty series.
pub fn aggregate(table: &LongTable, scope: &Scope) -> anyhow::Result<TimeSeries> {
    let df = table.data().clone().lazy();
    let df = match scope {
        Scope::World => df,
        Scope::Region(region) => df.filter(col(COL::REGION).eq(lit(region.as_str()))),
    };
    let df = df
        .group_by([col(COL::DATE)])
        .agg([col(COL::VALUE).sum()])
        .sort_by_exprs([col(COL::DATE)], SortMultipleOptions::default())
        .collect()?;
    debug!("Aggregated '{scope}' to {} dates", df.height());
    TimeSeries::from_dataframe(&df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{
        normalize,
        tests::{confirmed_long, day},
    };
    use crate::source::{tests::raw, CoordinateRef, Source};

    #[test]
    fn world_should_sum_all_regions() -> anyhow::Result<()> {
        let csv = "Country/Region,Lat,Long,1/1/20,1/2/20\nA,1.0,1.0,5,8\nB,2.0,2.0,2,2\n";
        let table = normalize(&raw(Source::Confirmed, csv), &CoordinateRef::empty()?)?;
        let world = aggregate(&table, &Scope::World)?;
        assert_eq!(world.values().collect::<Vec<_>>(), vec![7, 10]);
        Ok(())
    }

    #[test]
    fn world_equals_sum_of_regions_at_each_date() -> anyhow::Result<()> {
        let table = confirmed_long();
        let world = aggregate(&table, &Scope::World)?;
        for (date, total) in world.iter() {
            let mut sum = 0;
            for region in table.regions()? {
                sum += aggregate(&table, &Scope::Region(region))?
                    .get(&date)
                    .unwrap_or_default();
            }
            assert_eq!(total, sum, "world total on {date}");
        }
        assert_eq!(world.values().collect::<Vec<_>>(), vec![13, 14, 24]);
        Ok(())
    }

    #[test]
    fn region_should_use_its_own_values() -> anyhow::Result<()> {
        let testland = aggregate(&confirmed_long(), &Scope::Region("Testland".into()))?;
        assert_eq!(
            testland.iter().collect::<Vec<_>>(),
            vec![(day(22), 10), (day(23), 10), (day(24), 15)]
        );
        Ok(())
    }

    #[test]
    fn unknown_region_gives_empty_series() -> anyhow::Result<()> {
        let table = confirmed_long();
        let series = aggregate(&table, &Scope::Region("Atlantis".into()))?;
        assert!(series.is_empty());
        assert_eq!(series.latest(), None);

        let series = aggregate(&table, &Scope::Region("testland".into()))?;
        assert!(series.is_empty(), "region matching is case-sensitive");
        Ok(())
    }
}
