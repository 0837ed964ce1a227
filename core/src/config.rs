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

use std::str::FromStr;
use std::time::Duration;

use log::warn;

pub const PREFERRED_LANGUAGES_VAR: &str = "PLAYER_PREFERRED_LANGUAGES";
pub const FAST_SEEK_SECS_VAR: &str = "PLAYER_FAST_SEEK_SECS";
pub const COMMAND_QUEUE_VAR: &str = "PLAYER_COMMAND_QUEUE";

/// Largest accepted fast seek step.
pub const MAX_FAST_SEEK_SECS: u64 = 3600;

/// Tunables of a player session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConfig {
    /// BCP-47 tags, most preferred first.
    pub preferred_languages: Vec<String>,
    pub fast_seek_amount: Duration,
    pub command_queue_capacity: usize,
    pub event_broadcast_capacity: usize,
    pub error_broadcast_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            preferred_languages: Vec::new(),
            fast_seek_amount: Duration::from_secs(10),
            command_queue_capacity: 64,
            event_broadcast_capacity: 100,
            error_broadcast_capacity: 100,
        }
    }
}

impl PlayerConfig {
    /// Defaults overridden by the `PLAYER_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the `PLAYER_*` keys.
    /// Malformed values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(value) = lookup(PREFERRED_LANGUAGES_VAR) {
            config.preferred_languages = parse_languages(&value);
        }
        match parse_var::<u64>(&lookup, FAST_SEEK_SECS_VAR) {
            Some(secs) if secs == 0 || secs > MAX_FAST_SEEK_SECS => warn!(
                "{} must be within 1..={}; keeping {:?}",
                FAST_SEEK_SECS_VAR, MAX_FAST_SEEK_SECS, config.fast_seek_amount
            ),
            Some(secs) => config.fast_seek_amount = Duration::from_secs(secs),
            None => {}
        }
        match parse_var::<usize>(&lookup, COMMAND_QUEUE_VAR) {
            Some(0) => warn!(
                "{} must be positive; keeping {}",
                COMMAND_QUEUE_VAR, config.command_queue_capacity
            ),
            Some(capacity) => config.command_queue_capacity = capacity,
            None => {}
        }
        config
    }
}

/// Splits a comma-separated tag list, dropping empty entries.
pub fn parse_languages(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect()
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring malformed {}={:?}", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn overrides_are_applied() {
        let config = PlayerConfig::from_lookup(lookup(&[
            (PREFERRED_LANGUAGES_VAR, "pl, en-US,,de"),
            (FAST_SEEK_SECS_VAR, "30"),
            (COMMAND_QUEUE_VAR, "8"),
        ]));
        assert_eq!(config.preferred_languages, vec!["pl", "en-US", "de"]);
        assert_eq!(config.fast_seek_amount, Duration::from_secs(30));
        assert_eq!(config.command_queue_capacity, 8);
    }

    #[test]
    fn malformed_values_keep_defaults() {
        let config = PlayerConfig::from_lookup(lookup(&[
            (FAST_SEEK_SECS_VAR, "ten"),
            (COMMAND_QUEUE_VAR, "0"),
        ]));
        assert_eq!(config, PlayerConfig::default());
    }

    #[test]
    fn out_of_range_fast_seek_is_ignored() {
        for value in ["0", "3601", &u64::MAX.to_string()] {
            let config = PlayerConfig::from_lookup(lookup(&[(FAST_SEEK_SECS_VAR, value)]));
            assert_eq!(config.fast_seek_amount, Duration::from_secs(10), "{value}");
        }
        let config = PlayerConfig::from_lookup(lookup(&[(FAST_SEEK_SECS_VAR, "3600")]));
        assert_eq!(config.fast_seek_amount, Duration::from_secs(MAX_FAST_SEEK_SECS));
    }
}
