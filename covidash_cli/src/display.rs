use comfy_table::{presets::NOTHING, *};
use covidash::{dashboard::PanelSeries, indicators::KeyMetric, series::TimeSeries};
use itertools::Itertools;

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_style(comfy_table::TableComponent::BottomBorder, '─')
        .set_style(comfy_table::TableComponent::MiddleHeaderIntersections, '─')
        .set_style(comfy_table::TableComponent::HeaderLines, '─')
        .set_style(comfy_table::TableComponent::BottomBorderIntersections, '─')
        .set_style(comfy_table::TableComponent::TopBorder, '─')
        .set_style(comfy_table::TableComponent::TopBorderIntersections, '─');
    table
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|name| Cell::new(name).add_attribute(Attribute::Bold))
        .collect()
}

fn align_right(table: &mut Table, columns: impl IntoIterator<Item = usize>) {
    for idx in columns {
        if let Some(column) = table.column_mut(idx) {
            column.set_cell_alignment(CellAlignment::Right);
        }
    }
}

fn format_value(value: Option<i64>) -> String {
    value.map_or_else(|| "-".to_string(), |value| value.to_string())
}

/// Headline indicators: latest value and, for running totals, the change since the day before.
pub fn key_metrics_table(metrics: &[KeyMetric]) -> Table {
    let mut table = new_table();
    table.set_header(header(&["Indicator", "Value", "Change"]));
    for metric in metrics {
        table.add_row(vec![
            Cell::new(metric.source).add_attribute(Attribute::Bold),
            Cell::new(format_value(metric.value)),
            Cell::new(
                metric
                    .delta
                    .map(|delta| format!("{delta:+}"))
                    .unwrap_or_default(),
            ),
        ]);
    }
    align_right(&mut table, [1, 2]);
    table
}

/// One row per date, with the rolling mean alongside when there is one.
pub fn series_table(series: &TimeSeries, rolling_mean: Option<&[Option<i64>]>) -> Table {
    let mut table = new_table();
    match rolling_mean {
        Some(means) => {
            table.set_header(header(&["Date", "Value", "Rolling mean"]));
            for ((date, value), mean) in series.iter().zip(means) {
                table.add_row(vec![
                    date.to_string(),
                    value.to_string(),
                    format_value(*mean),
                ]);
            }
            align_right(&mut table, [1, 2]);
        }
        None => {
            table.set_header(header(&["Date", "Value"]));
            for (date, value) in series.iter() {
                table.add_row(vec![date.to_string(), value.to_string()]);
            }
            align_right(&mut table, [1]);
        }
    }
    table
}

/// The charts of a view, summarised by their most recent point.
pub fn panels_table(panels: &[PanelSeries]) -> Table {
    let mut table = new_table();
    table.set_header(header(&["Panel", "Dates", "Latest", "Value", "Rolling mean"]));
    for (panel, series, mean) in panels {
        let (latest_date, latest_value) = series
            .latest()
            .map(|(date, value)| (date.to_string(), value.to_string()))
            .unwrap_or_default();
        let dates = series
            .first()
            .zip(series.latest())
            .map(|((first, _), (last, _))| format!("{first}..{last}"))
            .unwrap_or_default();
        let mean = mean
            .as_ref()
            .map(|means| format_value(means.last().copied().flatten()))
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(panel.title).add_attribute(Attribute::Bold),
            Cell::new(dates),
            Cell::new(latest_date),
            Cell::new(latest_value),
            Cell::new(mean),
        ]);
    }
    align_right(&mut table, [3, 4]);
    table
}

/// Comma separated region names, wrapped by the table width.
pub fn regions_table(regions: &[String]) -> Table {
    let mut table = new_table();
    table.set_header(header(&["Regions"]));
    table.add_row(vec![regions.iter().join(", ")]);
    table
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use covidash::{series::Temporality, source::Source};

    use super::*;

    fn series() -> TimeSeries {
        (22..=24)
            .zip([13, 14, 24])
            .map(|(d, v)| (NaiveDate::from_ymd_opt(2020, 1, d).unwrap(), v))
            .collect()
    }

    #[test]
    fn key_metrics_should_show_signed_change() {
        let metrics = [
            KeyMetric::from_series(Source::Confirmed, &series(), Temporality::Cumulative),
            KeyMetric::from_series(Source::Deaths, &TimeSeries::new(), Temporality::Cumulative),
        ];
        let output = key_metrics_table(&metrics).to_string();
        assert!(output.contains("confirmed"));
        assert!(output.contains("+10"));
        assert!(output.contains('-'));
    }

    #[test]
    fn series_table_should_have_a_row_per_date() {
        let output = series_table(&series(), Some(&[None, Some(14), Some(17)])).to_string();
        assert!(output.contains("Rolling mean"));
        assert!(output.contains("2020-01-24"));
        assert!(output.contains("17"));

        let output = series_table(&series(), None).to_string();
        assert!(!output.contains("Rolling mean"));
    }
}
