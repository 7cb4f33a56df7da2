use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{command, Args, Parser, Subcommand};
use covidash::{
    config::Config,
    derived::{rolling_mean, try_active},
    formatters::{
        CSVFormatter, GeoJSONFormatter, GeoJSONSeqFormatter, OutputFormatter, OutputGenerator,
    },
    series::{Metric, Temporality, TimeSeries},
    source::Source,
    view::{Tab, View},
    Covidash, COL,
};
use enum_dispatch::enum_dispatch;
use log::{debug, info};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use spinners::{Spinner, Spinners};
use strum_macros::{Display, EnumString};

use crate::display::{key_metrics_table, panels_table, regions_table, series_table};
use crate::error::{CovidashCliError, CovidashCliResult};

const DEFAULT_PROGRESS_SPINNER: Spinners = Spinners::Dots;
const COMPLETE_PROGRESS_STRING: &str = "✔";
const FAILED_PROGRESS_STRING: &str = "✘";
const RUNNING_TAIL_STRING: &str = "...";
const DOWNLOADING_STRING: &str = "Downloading and normalizing time series";

/// Defines the output formats we are able to produce data in.
#[derive(Clone, Debug, Deserialize, Serialize, EnumString, Display, PartialEq, Eq)]
#[strum(ascii_case_insensitive)]
pub enum OutputFormat {
    GeoJSON,
    GeoJSONSeq,
    Csv,
    Json,
}

impl TryFrom<&OutputFormat> for OutputFormatter {
    type Error = CovidashCliError;

    fn try_from(value: &OutputFormat) -> Result<Self, Self::Error> {
        match value {
            OutputFormat::GeoJSON => Ok(OutputFormatter::GeoJSON(GeoJSONFormatter)),
            OutputFormat::GeoJSONSeq => Ok(OutputFormatter::GeoJSONSeq(GeoJSONSeqFormatter)),
            OutputFormat::Csv => Ok(OutputFormatter::Csv(CSVFormatter)),
            OutputFormat::Json => Err(CovidashCliError::UnsupportedFormat {
                command: "dataframe",
                format: value.to_string(),
            }),
        }
    }
}

fn output_writer<U: AsRef<Path>>(output_file: Option<U>) -> CovidashCliResult<Box<dyn Write>> {
    Ok(match output_file {
        Some(output_file) => {
            Box::new(File::create(output_file).context("Failed to write output")?)
        }
        None => Box::new(std::io::stdout().lock()),
    })
}

fn write_output<T, U>(
    output_generator: T,
    mut data: DataFrame,
    output_file: Option<U>,
) -> CovidashCliResult<()>
where
    T: OutputGenerator,
    U: AsRef<Path>,
{
    let mut writer = output_writer(output_file)?;
    output_generator.save(&mut writer, &mut data)?;
    writer.flush()?;
    Ok(())
}

/// Formats without point coordinates are rejected for `command`.
fn tabular_formatter(
    format: &OutputFormat,
    command: &'static str,
) -> CovidashCliResult<OutputFormatter> {
    OutputFormatter::try_from(format).map_err(|_| CovidashCliError::UnsupportedFormat {
        command,
        format: format.to_string(),
    })
}

/// Load the dashboard, showing a spinner unless `quiet`.
async fn load(config: Config, quiet: bool) -> CovidashCliResult<Covidash> {
    let sp = (!quiet).then(|| {
        Spinner::with_timer(
            DEFAULT_PROGRESS_SPINNER,
            DOWNLOADING_STRING.to_string() + RUNNING_TAIL_STRING,
        )
    });
    let result = Covidash::new_with_config(config).await;
    if let Some(mut s) = sp {
        s.stop_with_symbol(match result {
            Ok(_) => COMPLETE_PROGRESS_STRING,
            Err(_) => FAILED_PROGRESS_STRING,
        });
    }
    Ok(result?)
}

/// Trait that defines what to run when a given subcommand is invoked.
#[enum_dispatch]
pub trait RunCommand {
    async fn run(&self, config: Config) -> CovidashCliResult<()>;
}

/// Tab and mode selecting one of the four dashboard views.
#[derive(Args, Debug, Clone)]
pub struct ViewArgs {
    #[arg(
        short,
        long,
        value_name = "region|world",
        default_value_t = Tab::Region,
        help = "Show the highlighted region or the world total"
    )]
    tab: Tab,
    #[arg(
        short,
        long,
        value_name = "cumulative|new",
        default_value_t = Temporality::Cumulative,
        help = "Show running totals or daily changes"
    )]
    mode: Temporality,
}

impl ViewArgs {
    fn view(&self) -> View {
        View::select(self.tab, self.mode)
    }
}

/// The `summary` command prints the headline indicators of a view.
#[derive(Args, Debug)]
pub struct SummaryCommand {
    #[command(flatten)]
    view_args: ViewArgs,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for SummaryCommand {
    async fn run(&self, config: Config) -> CovidashCliResult<()> {
        info!("Running `summary` subcommand");
        let covidash = load(config, self.quiet).await?;
        let view = self.view_args.view();
        let metrics = covidash.dashboard.key_metrics(view)?;
        println!(
            "\n{} ({})\n{}",
            covidash.dashboard.scope(view),
            view.mode(),
            key_metrics_table(&metrics)
        );
        Ok(())
    }
}

/// The `series` command outputs one derived series.
#[derive(Args, Debug)]
pub struct SeriesCommand {
    #[arg(value_name = "confirmed|recovered|deaths|active", help = "Metric of the series")]
    metric: Metric,
    #[command(flatten)]
    view_args: ViewArgs,
    #[arg(
        short = 'f',
        long,
        value_name = "csv|json",
        help = "Output format for the series; printed as a table when not set"
    )]
    output_format: Option<OutputFormat>,
    #[arg(short = 'o', long, help = "Output file to place the results")]
    output_file: Option<String>,
    #[arg(
        long,
        help = "Fail if confirmed and recovered dates differ instead of keeping the recovered dates"
    )]
    strict: bool,
    #[arg(from_global)]
    quiet: bool,
}

impl SeriesCommand {
    fn series(&self, covidash: &Covidash) -> CovidashCliResult<TimeSeries> {
        let dashboard = &covidash.dashboard;
        let scope = dashboard.scope(self.view_args.view());
        let mode = self.view_args.mode;
        if self.strict && self.metric == Metric::Active {
            let confirmed = dashboard.series_or_compute(Metric::Confirmed, &scope, mode)?;
            let recovered = dashboard.series_or_compute(Metric::Recovered, &scope, mode)?;
            return Ok(try_active(&confirmed, &recovered)?);
        }
        Ok(dashboard.series_or_compute(self.metric, &scope, mode)?)
    }
}

impl RunCommand for SeriesCommand {
    async fn run(&self, config: Config) -> CovidashCliResult<()> {
        info!("Running `series` subcommand");
        let covidash = load(config, self.quiet).await?;
        let series = self.series(&covidash)?;
        debug!("{} dates in {} series", series.len(), self.metric);
        let mean = (self.view_args.mode == Temporality::New)
            .then(|| rolling_mean(&series, covidash.config.rolling_window));
        match &self.output_format {
            None => println!("\n{}", series_table(&series, mean.as_deref())),
            Some(OutputFormat::Json) => {
                let mut writer = output_writer(self.output_file.as_deref())?;
                serde_json::to_writer_pretty(&mut writer, &series)?;
                writeln!(writer)?;
            }
            Some(format) => {
                let formatter = tabular_formatter(format, "series")?;
                let mut data = series.to_dataframe()?;
                if let Some(mean) = mean {
                    data.with_column(Series::new(COL::ROLLING_MEAN, mean))?;
                }
                write_output(formatter, data, self.output_file.as_deref())?;
            }
        }
        Ok(())
    }
}

/// The `long` command outputs the normalized long table of a source.
#[derive(Args, Debug)]
pub struct LongCommand {
    #[arg(value_name = "confirmed|recovered|deaths", help = "Source of the table")]
    source: Source,
    #[arg(
        short = 'f',
        long,
        value_name = "csv|geojson|geojsonseq",
        default_value = "csv",
        help = "Output format for the results"
    )]
    output_format: OutputFormat,
    #[arg(short = 'o', long, help = "Output file to place the results")]
    output_file: Option<String>,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for LongCommand {
    async fn run(&self, config: Config) -> CovidashCliResult<()> {
        info!("Running `long` subcommand");
        let formatter = tabular_formatter(&self.output_format, "long")?;
        let covidash = load(config, self.quiet).await?;
        let table = covidash.dashboard.table(self.source)?;
        write_output(formatter, table.data().clone(), self.output_file.as_deref())
    }
}

/// The `map` command outputs the frames of the animated map of confirmed cases.
#[derive(Args, Debug)]
pub struct MapCommand {
    #[arg(
        short = 'f',
        long,
        value_name = "geojson|geojsonseq|csv",
        default_value = "geojson",
        help = "Output format for the results"
    )]
    output_format: OutputFormat,
    #[arg(short = 'o', long, help = "Output file to place the results")]
    output_file: Option<String>,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for MapCommand {
    async fn run(&self, config: Config) -> CovidashCliResult<()> {
        info!("Running `map` subcommand");
        let formatter = tabular_formatter(&self.output_format, "map")?;
        let covidash = load(config, self.quiet).await?;
        let frames = covidash.dashboard.map_frames()?;
        info!("{} map frames", frames.len());
        write_output(formatter, frames.to_dataframe()?, self.output_file.as_deref())
    }
}

/// The `view` command prints what one dashboard view shows: headline indicators and panels.
#[derive(Args, Debug)]
pub struct ViewCommand {
    #[command(flatten)]
    view_args: ViewArgs,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for ViewCommand {
    async fn run(&self, config: Config) -> CovidashCliResult<()> {
        info!("Running `view` subcommand");
        let covidash = load(config, self.quiet).await?;
        let dashboard = &covidash.dashboard;
        let view = self.view_args.view();
        println!("\n{view}: {}", dashboard.scope(view));
        println!("{}", key_metrics_table(&dashboard.key_metrics(view)?));
        println!("{}", panels_table(&dashboard.panels(view)?));
        if view.shows_map() {
            let frames = dashboard.map_frames()?;
            println!(
                "Map: {} frames of {} days",
                frames.len(),
                covidash.config.map_bucket_days
            );
        }
        Ok(())
    }
}

/// The `regions` command lists the regions of the confirmed cases table.
#[derive(Args, Debug)]
pub struct RegionsCommand {
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for RegionsCommand {
    async fn run(&self, config: Config) -> CovidashCliResult<()> {
        info!("Running `regions` subcommand");
        let covidash = load(config, self.quiet).await?;
        let regions = covidash.dashboard.table(Source::Confirmed)?.regions()?;
        println!("\n{}", regions_table(&regions));
        Ok(())
    }
}

/// The entrypoint for the CLI.
#[derive(Parser, Debug)]
#[command(version, about="Covidash derives the series of a COVID-19 dashboard from the JHU CSSE time series", long_about = None, name="covidash")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    #[arg(
        short = 'q',
        long = "quiet",
        help = "\
            Do not print progress bar to stdout. Results and logs (when `RUST_LOG`\n\
            is set) will still be printed.",
        global = true
    )]
    quiet: bool,
    #[arg(
        long,
        global = true,
        help = "Region highlighted next to the world total, overriding the config file"
    )]
    pub region: Option<String>,
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Config file to use instead of the one in the user config directory"
    )]
    pub config: Option<PathBuf>,
}

/// Commands contains the list of subcommands avaliable for use in the CLI.
/// Each command should implmement the RunCommand trait and specify the list
/// of required args for that command.
#[derive(Subcommand, Debug)]
#[enum_dispatch(RunCommand)]
pub enum Commands {
    /// Headline indicators of a view
    Summary(SummaryCommand),
    /// Output one series for a metric, scope and mode
    Series(SeriesCommand),
    /// Output the normalized long table of a source
    Long(LongCommand),
    /// Output the frames of the animated map of confirmed cases
    Map(MapCommand),
    /// Headline indicators and panels of a view
    View(ViewCommand),
    /// List the regions of the confirmed cases table
    Regions(RegionsCommand),
}
