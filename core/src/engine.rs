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

use std::time::Duration;

use anyhow::Error;
use bitflags::bitflags;
use tokio::sync::mpsc;

use crate::correlation::CorrelationId;
use crate::error::PlaybackFault;
use crate::media_source::MediaSource;
use crate::player_state::RepeatMode;
use crate::track::StreamTrack;

bitflags! {
    /// Everything that changed in the engine during one event cycle.
    #[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
    pub struct EngineEvents: u16 {
        const TimelineChanged = 0x0001;
        const MediaItemTransition = 0x0002;
        const TracksChanged = 0x0004;
        const IsLoadingChanged = 0x0008;
        const PlaybackStateChanged = 0x0010;
        const PlayWhenReadyChanged = 0x0020;
        const IsPlayingChanged = 0x0040;
        const RepeatModeChanged = 0x0080;
        const ShuffleModeChanged = 0x0100;
        const PlayerError = 0x0200;
        const PositionDiscontinuity = 0x0400;
    }
}

/// Engine readiness as reported by [`PlaybackEngine::state`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EngineState {
    /// Nothing prepared, or stopped after an error.
    #[default]
    Idle,
    Buffering,
    Ready,
    Ended,
}

/// What the engine knows about a queued entry: only the id it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueEntry {
    pub correlation_id: CorrelationId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineChangeReason {
    PlaylistChanged,
    SourceUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionReason {
    Repeat,
    Auto,
    Seek,
    PlaylistChanged,
}

/// A track as reported by the engine for the current entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineTrack {
    pub track: StreamTrack,
    pub selected: bool,
}

/// Callbacks of the engine, posted as messages to the orchestrator.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Error(PlaybackFault),
    Events(EngineEvents),
    TimelineChanged(TimelineChangeReason),
    MediaItemTransition { entry: Option<QueueEntry>, reason: TransitionReason },
    TracksChanged(Vec<EngineTrack>),
}

pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;
pub type EngineEventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Creates the channel an engine integration posts its callbacks on.
pub fn engine_event_channel() -> (EngineEventSender, EngineEventReceiver) {
    mpsc::unbounded_channel()
}

/// The decoding and rendering engine, exclusively owned by the orchestrator.
///
/// Calls are synchronous and cheap; anything slow happens inside the engine, which
/// reports the outcome through [`EngineEvent`]s. Queue operations fail on indices
/// outside the queue.
pub trait PlaybackEngine: Send + 'static {
    /// Replaces the whole queue with `source`.
    fn set_source(&mut self, source: MediaSource) -> Result<(), Error>;

    fn add_source(&mut self, source: MediaSource) -> Result<(), Error>;

    fn insert_source(&mut self, index: usize, source: MediaSource) -> Result<(), Error>;

    fn move_entry(&mut self, from: usize, to: usize) -> Result<(), Error>;

    fn remove_entry(&mut self, index: usize) -> Result<(), Error>;

    fn entry_count(&self) -> usize;

    fn entry_at(&self, index: usize) -> Option<QueueEntry>;

    fn current_index(&self) -> Option<usize>;

    fn current_entry(&self) -> Option<QueueEntry> {
        self.current_index().and_then(|i| self.entry_at(i))
    }

    fn state(&self) -> EngineState;

    fn is_playing(&self) -> bool;

    fn prepare(&mut self);

    fn play(&mut self);

    fn pause(&mut self);

    fn set_play_when_ready(&mut self, play_when_ready: bool);

    fn seek_to(&mut self, position: Duration);

    fn seek_to_entry(&mut self, index: usize, position: Duration) -> Result<(), Error>;

    fn position(&self) -> Duration;

    fn duration(&self) -> Option<Duration>;

    fn buffered_percentage(&self) -> u8;

    fn set_repeat_mode(&mut self, mode: RepeatMode);

    fn set_shuffle(&mut self, enabled: bool);

    /// Frees decoder and network resources. The engine is unusable afterwards.
    fn release(&mut self);
}
