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

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};

use crate::correlation::CorrelationId;
use crate::engine::EngineEvents;
use crate::error::PlayerError;
use crate::repository::Chapter;
use crate::track::StreamTrack;

/// How the application presents the current playback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlayMode {
    #[default]
    Idle,
    EmbeddedVideo,
    FullscreenVideo,
    Pip,
    AudioForeground,
    AudioBackground,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RepeatMode {
    #[default]
    DoNotRepeat,
    RepeatAll,
    RepeatOne,
}

/// Lifecycle of the active playback slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SlotState {
    /// Nothing queued.
    #[default]
    Idle,
    /// Queued, engine not ready yet.
    Preparing,
    Playing,
    Paused,
    /// A fault was observed and recovery is in progress.
    Faulted,
}

/// A queued entry as presented to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub correlation_id: CorrelationId,
    pub item: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackProgress {
    pub position: Duration,
    pub duration: Option<Duration>,
    pub buffered_percentage: u8,
}

/// Publish points for the observable player state.
///
/// Every `watch` channel holds only the latest value, so a new observer sees the
/// current state and no history. Only the orchestrator loop publishes.
pub(crate) struct PlayerChannels {
    pub current_entry: watch::Sender<Option<PlaylistEntry>>,
    pub playlist: watch::Sender<Vec<PlaylistEntry>>,
    pub available_tracks: watch::Sender<Vec<StreamTrack>>,
    pub playing_tracks: watch::Sender<Vec<StreamTrack>>,
    pub chapters: watch::Sender<Vec<Chapter>>,
    pub play_mode: watch::Sender<PlayMode>,
    pub slot_state: watch::Sender<SlotState>,
    pub repeat_mode: watch::Sender<RepeatMode>,
    pub shuffle: watch::Sender<bool>,
    pub progress: watch::Sender<PlaybackProgress>,
    pub errors: broadcast::Sender<Arc<PlayerError>>,
    pub engine_events: broadcast::Sender<EngineEvents>,
}

impl PlayerChannels {
    pub fn new(event_capacity: usize, error_capacity: usize) -> Self {
        Self {
            current_entry: watch::Sender::new(None),
            playlist: watch::Sender::new(Vec::new()),
            available_tracks: watch::Sender::new(Vec::new()),
            playing_tracks: watch::Sender::new(Vec::new()),
            chapters: watch::Sender::new(Vec::new()),
            play_mode: watch::Sender::new(PlayMode::Idle),
            slot_state: watch::Sender::new(SlotState::Idle),
            repeat_mode: watch::Sender::new(RepeatMode::DoNotRepeat),
            shuffle: watch::Sender::new(false),
            progress: watch::Sender::new(PlaybackProgress::default()),
            errors: broadcast::channel(error_capacity.max(1)).0,
            engine_events: broadcast::channel(event_capacity.max(1)).0,
        }
    }

    /// Publishes an error. Having no subscribers is fine.
    pub fn notify_error(&self, error: PlayerError) {
        let _ = self.errors.send(Arc::new(error));
    }

    /// Returns every derived channel to its initial value.
    pub fn reset(&self) {
        publish(&self.current_entry, None);
        publish(&self.playlist, Vec::new());
        publish(&self.available_tracks, Vec::new());
        publish(&self.playing_tracks, Vec::new());
        publish(&self.chapters, Vec::new());
        publish(&self.play_mode, PlayMode::Idle);
        publish(&self.slot_state, SlotState::Idle);
        publish(&self.progress, PlaybackProgress::default());
    }
}

/// Stores `value`, waking observers only when it differs from the current one.
pub(crate) fn publish<T: PartialEq>(sender: &watch::Sender<T>, value: T) -> bool {
    sender.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    })
}
