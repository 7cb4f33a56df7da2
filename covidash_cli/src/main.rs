mod cli;
mod display;
mod error;

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, RunCommand};
use covidash::config::Config;
use error::CovidashCliResult;
use log::debug;

const DEFAULT_LOGGING_LEVEL: &str = "warn";

#[tokio::main]
async fn main() -> Result<()> {
    // Set RUST_LOG to `DEFAULT_LOGGING_LEVEL` if not set
    let _ =
        std::env::var("RUST_LOG").map_err(|_| std::env::set_var("RUST_LOG", DEFAULT_LOGGING_LEVEL));
    pretty_env_logger::init_timed();
    let args = Cli::parse();
    debug!("args: {args:?}");
    let mut config = read_config_from_toml(args.config.as_deref())?;
    if let Some(region) = &args.region {
        config.region = region.clone();
    }
    debug!("config: {config:?}");

    if let Some(command) = args.command {
        command.run(config).await?;
    }
    Ok(())
}

/// Reads the config from `path`, or from the user config directory when no path is given.
/// A missing file in the config directory falls back to the defaults.
fn read_config_from_toml(path: Option<&Path>) -> CovidashCliResult<Config> {
    // macOS: ~/Library/Application Support/covidash/config.toml
    let file_path = match path {
        Some(path) => path.to_path_buf(),
        None => match dirs::config_dir() {
            Some(dir) => dir.join("covidash").join("config.toml"),
            None => return Ok(Config::default()),
        },
    };
    match std::fs::read_to_string(&file_path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && path.is_none() => {
            Ok(Config::default())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::error::CovidashCliError;

    #[test]
    fn config_should_be_read_from_given_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "region = \"Italy\"\nrolling_window = 5").unwrap();
        let config = read_config_from_toml(Some(file.path())).unwrap();
        assert_eq!(config.region, "Italy");
        assert_eq!(config.rolling_window, 5);
        assert_eq!(config.map_bucket_days, Config::default().map_bucket_days);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_config_from_toml(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(CovidashCliError::IOError(_))));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "region = ").unwrap();
        let result = read_config_from_toml(Some(file.path()));
        assert!(matches!(result, Err(CovidashCliError::TomlError(_))));
    }
}
