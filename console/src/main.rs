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


mod cli;
mod demo_repository;
mod simulated_engine;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};
use player_core::error::{FaultKind, PlaybackFault};
use player_core::{
    FnRecoveryPolicy, Orchestrator, PlayMode, PlayerConfig, PlayerHandle, RecoveryContext,
    RecoveryResponse,
};
use tokio::sync::{broadcast, watch};

use crate::cli::Cli;
use crate::demo_repository::DemoRepository;
use crate::simulated_engine::SimulatedEngine;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_level.to_level_filter())
        .parse_default_env()
        .init();

    let mut config = PlayerConfig::from_env();
    if !cli.languages.is_empty() {
        config.preferred_languages = cli.languages.clone();
    }
    if let Some(secs) = cli.fast_seek_secs {
        config.fast_seek_amount = Duration::from_secs(secs);
    }
    info!("Starting with {:?}", config);

    let clip_length = Duration::from_secs(cli.clip_secs.max(1));
    let (engine, engine_rx) = SimulatedEngine::new(clip_length);
    let faults = engine.fault_injector();
    let repository = Arc::new(DemoRepository::new(clip_length));
    // Network faults reload the same item; it resumes where it stopped.
    let policy = Arc::new(FnRecoveryPolicy(|context: RecoveryContext| async move {
        match (context.fault.kind, context.item) {
            (FaultKind::Network, Some(item)) => {
                warn!("Reloading {} after {}", item, context.fault);
                RecoveryResponse::ReplaceItem(item)
            }
            _ => RecoveryResponse::NoResponse,
        }
    }));

    let (orchestrator, player) = Orchestrator::new(engine, engine_rx, repository, policy, config);
    let orchestrator_handle = orchestrator.run();
    print_state_changes(&player);

    let mode = if cli.audio_only { PlayMode::AudioForeground } else { PlayMode::EmbeddedVideo };
    let mut items = cli.items.iter();
    if let Some(first) = items.next() {
        if let Err(e) = player.play_item(first.as_str(), mode).await {
            error!("Cannot play {}: {}", first, e);
        }
    }
    for item in items {
        if let Err(e) = player.add_to_playlist(item.as_str()).await {
            error!("Cannot queue {}: {}", item, e);
        }
    }

    if let Some(secs) = cli.fault_after {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            faults.inject(PlaybackFault::new(FaultKind::Network, "simulated connection drop"));
        });
    }

    info!("Playing; press Ctrl+C to exit");
    let mut ticker = tokio::time::interval(Duration::from_secs(cli.progress_secs.max(1)));
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
            _ = ticker.tick() => match player.progress().await {
                Ok(progress) => println!(
                    "progress: {:.1}s / {} ({}% buffered)",
                    progress.position.as_secs_f64(),
                    progress
                        .duration
                        .map(|d| format!("{:.1}s", d.as_secs_f64()))
                        .unwrap_or_else(|| "-".to_string()),
                    progress.buffered_percentage,
                ),
                Err(e) => {
                    warn!("Player stopped: {}", e);
                    break;
                }
            },
        }
    }

    orchestrator_handle.shutdown().await?;
    Ok(())
}

fn print_state_changes(player: &PlayerHandle) {
    print_changes("current", player.current_entry(), |entry| match entry {
        Some(entry) => format!("{} {}", entry.correlation_id, entry.item),
        None => "-".to_string(),
    });
    print_changes("playlist", player.playlist(), |entries| {
        let items: Vec<_> =
            entries.iter().map(|e| format!("{} {}", e.correlation_id, e.item)).collect();
        format!("[{}]", items.join(", "))
    });
    print_changes("available tracks", player.available_tracks(), |tracks| {
        let tracks: Vec<_> = tracks.iter().map(|t| t.to_string()).collect();
        tracks.join(", ")
    });
    print_changes("playing tracks", player.playing_tracks(), |tracks| {
        let tracks: Vec<_> = tracks.iter().map(|t| t.to_string()).collect();
        tracks.join(", ")
    });
    print_changes("chapters", player.chapters(), |chapters| format!("{} chapters", chapters.len()));
    print_changes("mode", player.play_mode(), |mode| format!("{:?}", mode));
    print_changes("state", player.slot_state(), |state| format!("{:?}", state));

    let mut errors = player.subscribe_errors();
    tokio::spawn(async move {
        loop {
            match errors.recv().await {
                Ok(e) => println!("error: {}", e),
                Err(broadcast::error::RecvError::Lagged(n)) => warn!("Missed {} player errors", n),
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn print_changes<T, F>(label: &'static str, mut rx: watch::Receiver<T>, render: F)
where
    T: Send + Sync + 'static,
    F: Fn(&T) -> String + Send + 'static,
{
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let line = render(&rx.borrow_and_update());
            println!("{}: {}", label, line);
        }
    });
}
