// Copyright 2025 HEM Sp. z o.o.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use clap::{Parser, ValueEnum};
use log::LevelFilter;
use player_core::config::MAX_FAST_SEEK_SECS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Plays items on a simulated engine and prints player state",
    long_about = None
)]
pub struct Cli {
    /// Set the log level
    #[arg(short, long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Preferred audio languages, most preferred first. Overrides PLAYER_PREFERRED_LANGUAGES.
    #[arg(short = 'L', long, value_delimiter = ',')]
    pub languages: Vec<String>,

    /// Seconds skipped by fast seek. Overrides PLAYER_FAST_SEEK_SECS.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=MAX_FAST_SEEK_SECS))]
    pub fast_seek_secs: Option<u64>,

    /// Play audio only
    #[arg(long)]
    pub audio_only: bool,

    /// Length of every simulated clip in seconds
    #[arg(long, default_value_t = 180)]
    pub clip_secs: u64,

    /// Simulate a network fault after this many seconds of playback
    #[arg(long)]
    pub fault_after: Option<u64>,

    /// Seconds between progress reports
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub progress_secs: u64,

    /// Items to play; the first starts playing, the rest are queued
    #[arg(required = true)]
    pub items: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_items_and_languages() {
        let cli =
            Cli::parse_from(["player-console", "-L", "de,en", "--audio-only", "intro", "outro"]);
        assert_eq!(cli.languages, vec!["de".to_string(), "en".to_string()]);
        assert!(cli.audio_only);
        assert_eq!(cli.items, vec!["intro".to_string(), "outro".to_string()]);
        assert_eq!(cli.log_level, LogLevel::Info);
        assert_eq!(cli.fault_after, None);
    }

    #[test]
    fn requires_an_item() {
        assert!(Cli::try_parse_from(["player-console"]).is_err());
    }

    #[test]
    fn log_level_maps_to_filter() {
        let cli = Cli::parse_from(["player-console", "--log-level", "trace", "intro"]);
        assert_eq!(cli.log_level.to_level_filter(), LevelFilter::Trace);
        assert!(Cli::try_parse_from(["player-console", "--log-level", "loud", "intro"]).is_err());
    }

    #[test]
    fn fast_seek_is_bounded() {
        let cli = Cli::parse_from(["player-console", "--fast-seek-secs", "30", "intro"]);
        assert_eq!(cli.fast_seek_secs, Some(30));
        for value in ["0", "3601", "18446744073709551615"] {
            let args = ["player-console", "--fast-seek-secs", value, "intro"];
            assert!(Cli::try_parse_from(args).is_err());
        }
    }
}
