//! Command-line surface
//!
//! - `hedgerun` / `hedgerun --once` run one cycle and exit
//! - `hedgerun --continuous [MINUTES]` runs cycles until interrupted
//!
//! Anything else prints usage and does nothing.

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "hedgerun")]
#[command(version, about = "Runs control-plane managed trading strategies against AngelOne", long_about = None)]
pub struct Cli {
    /// Run a single cycle and exit (the default)
    #[arg(long, conflicts_with = "continuous")]
    pub once: bool,

    /// Run cycles indefinitely; interval in minutes (default: scheduler.interval_minutes)
    #[arg(
        long,
        value_name = "MINUTES",
        num_args = 0..=1,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub continuous: Option<Option<u64>>,

    /// Configuration directory (default.toml plus per-environment overrides)
    #[arg(short, long, default_value = "config")]
    pub config: PathBuf,
}

/// What the invocation asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Once,
    Continuous { interval_minutes: Option<u64> },
}

impl Cli {
    pub fn mode(&self) -> RunMode {
        match self.continuous {
            Some(interval_minutes) => RunMode::Continuous { interval_minutes },
            None => RunMode::Once,
        }
    }
}

/// Outcome of reading the command line
#[derive(Debug)]
pub enum Invocation {
    Run(Cli),
    /// Help, version or usage was printed; nothing should run
    Exit,
}

pub fn parse_from<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Parse the process arguments, printing usage instead of failing
pub fn parse_or_usage() -> Invocation {
    match Cli::try_parse() {
        Ok(cli) => Invocation::Run(cli),
        Err(e) => {
            match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    let _ = e.print();
                }
                _ => println!("{}", usage()),
            }
            Invocation::Exit
        }
    }
}

pub fn usage() -> String {
    Cli::command().render_help().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_arguments_runs_once() {
        let cli = parse_from(["hedgerun"]).unwrap();
        assert_eq!(cli.mode(), RunMode::Once);
        assert_eq!(cli.config, PathBuf::from("config"));
    }

    #[test]
    fn test_explicit_once() {
        let cli = parse_from(["hedgerun", "--once"]).unwrap();
        assert_eq!(cli.mode(), RunMode::Once);
    }

    #[test]
    fn test_continuous_with_and_without_interval() {
        let cli = parse_from(["hedgerun", "--continuous"]).unwrap();
        assert_eq!(cli.mode(), RunMode::Continuous { interval_minutes: None });

        let cli = parse_from(["hedgerun", "--continuous", "5"]).unwrap();
        assert_eq!(cli.mode(), RunMode::Continuous { interval_minutes: Some(5) });
    }

    #[test]
    fn test_config_directory_override() {
        let cli = parse_from(["hedgerun", "--config", "/etc/hedgerun", "--continuous"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/hedgerun"));
    }

    #[test]
    fn test_unrecognized_arguments_rejected() {
        assert!(parse_from(["hedgerun", "--bogus"]).is_err());
        assert!(parse_from(["hedgerun", "status"]).is_err());
        assert!(parse_from(["hedgerun", "--continuous", "0"]).is_err());
        assert!(parse_from(["hedgerun", "--continuous", "soon"]).is_err());
        assert!(parse_from(["hedgerun", "--once", "--continuous"]).is_err());
    }

    #[test]
    fn test_usage_mentions_modes() {
        let usage = usage();
        assert!(usage.contains("--once"));
        assert!(usage.contains("--continuous"));
    }
}
