use clap::Parser;
use std::path::PathBuf;

use crate::config::ReplayConfig;

/// Replay a JSON array item by item, paced to a target duration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// JSON file holding an array of items (reads stdin when omitted or "-")
    #[arg(value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Target total duration of the run in milliseconds (overrides config)
    #[arg(short = 'd', long = "duration-ms", value_name = "MS")]
    pub duration_ms: Option<u64>,

    /// Fixed delay after each item in milliseconds instead of a total duration
    #[arg(long = "fixed-ms", value_name = "MS", conflicts_with = "duration_ms")]
    pub fixed_ms: Option<u64>,

    /// Cancel the run once N items have been received
    #[arg(long = "cancel-after", value_name = "N")]
    pub cancel_after: Option<usize>,

    /// Print one JSON object per item instead of tab-separated text
    #[arg(long = "json")]
    pub json: bool,

    /// Enable logging to file (default: seqplay.log in the config directory)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

impl Args {
    /// Apply pacing overrides from the command line.
    pub fn apply(&self, config: &mut ReplayConfig) {
        if let Some(ms) = self.duration_ms {
            config.target_total_ms = ms;
            config.fixed_delay_ms = None;
        }
        if let Some(ms) = self.fixed_ms {
            config.fixed_delay_ms = Some(ms);
        }
    }

    /// Log level from the `-v` count
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbosity {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }

    /// Input path, `None` meaning stdin
    pub fn input_path(&self) -> Option<&PathBuf> {
        self.input.as_ref().filter(|p| p.as_os_str() != "-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pacing::Pacing;
    use std::time::Duration;

    #[test]
    fn test_duration_override() {
        let args = Args::try_parse_from(["seqplay", "points.json", "-d", "1200"]).unwrap();
        let mut config = ReplayConfig {
            fixed_delay_ms: Some(400),
            ..Default::default()
        };
        args.apply(&mut config);
        assert_eq!(config.pacing(), Pacing::Bounded(Duration::from_millis(1200)));
        assert_eq!(args.input_path(), Some(&PathBuf::from("points.json")));
    }

    #[test]
    fn test_fixed_override_and_stdin() {
        let args = Args::try_parse_from(["seqplay", "-", "--fixed-ms", "400", "-vv"]).unwrap();
        let mut config = ReplayConfig::default();
        args.apply(&mut config);
        assert_eq!(config.pacing(), Pacing::FixedPerItem(Duration::from_millis(400)));
        assert!(args.input_path().is_none());
        assert_eq!(args.log_level(), log::LevelFilter::Debug);
    }

    #[test]
    fn test_duration_and_fixed_conflict() {
        assert!(Args::try_parse_from(["seqplay", "-d", "10", "--fixed-ms", "5"]).is_err());
    }
}
