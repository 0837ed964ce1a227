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

//! In-memory collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Error};
use async_trait::async_trait;
use tokio::sync::Notify;

use crate::engine::{
    engine_event_channel, EngineEvent, EngineEventReceiver, EngineEventSender, EngineEvents,
    EngineState, EngineTrack, PlaybackEngine, QueueEntry, TimelineChangeReason, TransitionReason,
};
use crate::error::PlaybackFault;
use crate::media_source::MediaSource;
use crate::player_state::RepeatMode;
use crate::repository::{Chapter, MediaRepository, RepositoryInfo, TransportConfig};
use crate::stream::Stream;
use crate::track::{AudioTrack, VideoTrack};

/// A 1080p and a 720p video stream plus English and German audio.
pub fn sample_streams(item: &str) -> Vec<Stream> {
    vec![
        Stream::progressive(
            format!("{item}/1080.mp4"),
            vec![VideoTrack::new(1920, 1080, 30, "mp4").into()],
        ),
        Stream::progressive(
            format!("{item}/720.mp4"),
            vec![VideoTrack::new(1280, 720, 30, "mp4").into()],
        ),
        Stream::progressive(
            format!("{item}/en.m4a"),
            vec![AudioTrack::new(128_000, "m4a", Some("en")).into()],
        ),
        Stream::progressive(
            format!("{item}/de.m4a"),
            vec![AudioTrack::new(96_000, "m4a", Some("de")).into()],
        ),
    ]
}

#[derive(Default)]
struct RepositoryState {
    streams: HashMap<String, Vec<Stream>>,
    chapters: HashMap<String, Vec<Chapter>>,
    failing: HashSet<String>,
    gates: HashMap<String, Arc<Notify>>,
}

#[derive(Default)]
pub struct FakeRepository {
    state: Mutex<RepositoryState>,
}

impl FakeRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_streams(&self, item: &str, streams: Vec<Stream>) {
        self.state.lock().unwrap().streams.insert(item.to_string(), streams);
    }

    pub fn with_chapters(&self, item: &str, chapters: Vec<Chapter>) {
        self.state.lock().unwrap().chapters.insert(item.to_string(), chapters);
    }

    /// Every request for `item` fails from now on.
    pub fn fail_item(&self, item: &str) {
        self.state.lock().unwrap().failing.insert(item.to_string());
    }

    /// Stream requests for `item` wait until the returned gate is notified.
    pub fn gate_item(&self, item: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().unwrap().gates.insert(item.to_string(), gate.clone());
        gate
    }

    fn check(&self, item: &str) -> Result<(), Error> {
        if self.state.lock().unwrap().failing.contains(item) {
            bail!("repository offline for {}", item);
        }
        Ok(())
    }
}

#[async_trait]
impl MediaRepository for FakeRepository {
    fn info(&self) -> RepositoryInfo {
        RepositoryInfo { pulls_data_from_network: true }
    }

    async fn get_streams(&self, item: &str) -> Result<Vec<Stream>, Error> {
        let gate = self.state.lock().unwrap().gates.get(item).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.check(item)?;
        self.state
            .lock()
            .unwrap()
            .streams
            .get(item)
            .cloned()
            .ok_or_else(|| anyhow!("unknown item {}", item))
    }

    async fn get_chapters(&self, item: &str) -> Result<Vec<Chapter>, Error> {
        self.check(item)?;
        Ok(self.state.lock().unwrap().chapters.get(item).cloned().unwrap_or_default())
    }

    async fn get_transport_config(&self, item: &str) -> Result<TransportConfig, Error> {
        self.check(item)?;
        Ok(TransportConfig { user_agent: Some("fake".to_string()), ..Default::default() })
    }
}

/// Observable state of a [`FakeEngine`].
#[derive(Debug, Clone, Default)]
pub struct EngineSnapshot {
    pub queue: Vec<MediaSource>,
    pub current: Option<usize>,
    pub state: EngineState,
    pub playing: bool,
    pub play_when_ready: bool,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub repeat_mode: RepeatMode,
    pub shuffle: bool,
    pub prepare_calls: usize,
    pub released: bool,
}

impl EngineSnapshot {
    pub fn items(&self) -> Vec<String> {
        self.queue.iter().map(|s| s.item.clone()).collect()
    }

    pub fn current_source(&self) -> Option<&MediaSource> {
        self.current.and_then(|i| self.queue.get(i))
    }
}

/// Engine double that behaves like a simple queue player and reports its callbacks
/// on the event channel. Clones share state, so a test keeps one for inspection.
#[derive(Clone)]
pub struct FakeEngine {
    inner: Arc<Mutex<EngineSnapshot>>,
    events: EngineEventSender,
}

impl FakeEngine {
    pub fn new() -> (Self, EngineEventReceiver) {
        let (events, rx) = engine_event_channel();
        (Self { inner: Arc::new(Mutex::new(EngineSnapshot::default())), events }, rx)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.inner.lock().unwrap().clone()
    }

    pub fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }

    /// Stops playback the way a real engine does on an error, then reports it.
    pub fn fail(&self, fault: PlaybackFault) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.state = EngineState::Idle;
            inner.playing = false;
        }
        self.emit(EngineEvent::Error(fault));
    }

    pub fn set_position(&self, position: Duration) {
        self.inner.lock().unwrap().position = position;
    }

    pub fn set_duration(&self, duration: Duration) {
        self.inner.lock().unwrap().duration = Some(duration);
    }

    /// Queues a source behind the orchestrator's back.
    pub fn push_foreign(&self, source: MediaSource) {
        self.inner.lock().unwrap().queue.push(source);
        self.emit(EngineEvent::TimelineChanged(TimelineChangeReason::PlaylistChanged));
    }

    /// Drops a queued source without reporting a timeline change.
    pub fn remove_quietly(&self, index: usize) {
        self.inner.lock().unwrap().queue.remove(index);
    }

    fn timeline_changed(&self) {
        self.emit(EngineEvent::TimelineChanged(TimelineChangeReason::PlaylistChanged));
        self.emit(EngineEvent::Events(EngineEvents::TimelineChanged));
    }

    fn transition(&self, inner: &EngineSnapshot, reason: TransitionReason) {
        let source = inner.current_source();
        let entry = source.map(|s| QueueEntry { correlation_id: s.correlation_id });
        self.emit(EngineEvent::MediaItemTransition { entry, reason });
        if let Some(source) = source {
            let tracks = source
                .tracks
                .iter()
                .map(|t| EngineTrack { track: t.clone(), selected: true })
                .collect();
            self.emit(EngineEvent::TracksChanged(tracks));
        }
        self.emit(EngineEvent::Events(
            EngineEvents::MediaItemTransition | EngineEvents::TracksChanged,
        ));
    }

    fn check_index(inner: &EngineSnapshot, index: usize) -> Result<(), Error> {
        if index >= inner.queue.len() {
            bail!("index {} outside queue of {}", index, inner.queue.len());
        }
        Ok(())
    }
}

impl PlaybackEngine for FakeEngine {
    fn set_source(&mut self, source: MediaSource) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        inner.queue = vec![source];
        inner.current = Some(0);
        inner.position = Duration::ZERO;
        self.timeline_changed();
        self.transition(&inner, TransitionReason::PlaylistChanged);
        Ok(())
    }

    fn add_source(&mut self, source: MediaSource) -> Result<(), Error> {
        let index = self.inner.lock().unwrap().queue.len();
        self.insert_source(index, source)
    }

    fn insert_source(&mut self, index: usize, source: MediaSource) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        if index > inner.queue.len() {
            bail!("insert index {} outside queue of {}", index, inner.queue.len());
        }
        inner.queue.insert(index, source);
        self.timeline_changed();
        let current = inner.current;
        match current {
            None => {
                inner.current = Some(0);
                self.transition(&inner, TransitionReason::PlaylistChanged);
            }
            Some(c) if c >= index => inner.current = Some(c + 1),
            Some(_) => {}
        }
        Ok(())
    }

    fn move_entry(&mut self, from: usize, to: usize) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_index(&inner, from)?;
        Self::check_index(&inner, to)?;
        let source = inner.queue.remove(from);
        inner.queue.insert(to, source);
        inner.current = inner.current.map(|c| {
            if c == from {
                to
            } else if from < c && c <= to {
                c - 1
            } else if to <= c && c < from {
                c + 1
            } else {
                c
            }
        });
        self.timeline_changed();
        Ok(())
    }

    fn remove_entry(&mut self, index: usize) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_index(&inner, index)?;
        inner.queue.remove(index);
        self.timeline_changed();
        let current = inner.current;
        match current {
            Some(c) if c == index => {
                if inner.queue.is_empty() {
                    inner.current = None;
                    inner.state = EngineState::Ended;
                    inner.playing = false;
                } else {
                    inner.current = Some(index.min(inner.queue.len() - 1));
                }
                inner.position = Duration::ZERO;
                self.transition(&inner, TransitionReason::PlaylistChanged);
            }
            Some(c) if c > index => inner.current = Some(c - 1),
            _ => {}
        }
        Ok(())
    }

    fn entry_count(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    fn entry_at(&self, index: usize) -> Option<QueueEntry> {
        self.inner
            .lock()
            .unwrap()
            .queue
            .get(index)
            .map(|s| QueueEntry { correlation_id: s.correlation_id })
    }

    fn current_index(&self) -> Option<usize> {
        self.inner.lock().unwrap().current
    }

    fn state(&self) -> EngineState {
        self.inner.lock().unwrap().state
    }

    fn is_playing(&self) -> bool {
        self.inner.lock().unwrap().playing
    }

    fn prepare(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        inner.prepare_calls += 1;
        inner.state = if inner.queue.is_empty() { EngineState::Ended } else { EngineState::Ready };
        inner.playing = inner.play_when_ready && inner.state == EngineState::Ready;
        self.emit(EngineEvent::Events(EngineEvents::PlaybackStateChanged));
    }

    fn play(&mut self) {
        self.set_play_when_ready(true);
    }

    fn pause(&mut self) {
        self.set_play_when_ready(false);
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.play_when_ready = play_when_ready;
        inner.playing = play_when_ready && inner.state == EngineState::Ready;
        self.emit(EngineEvent::Events(
            EngineEvents::PlayWhenReadyChanged | EngineEvents::IsPlayingChanged,
        ));
    }

    fn seek_to(&mut self, position: Duration) {
        self.inner.lock().unwrap().position = position;
        self.emit(EngineEvent::Events(EngineEvents::PositionDiscontinuity));
    }

    fn seek_to_entry(&mut self, index: usize, position: Duration) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_index(&inner, index)?;
        inner.position = position;
        if inner.current != Some(index) {
            inner.current = Some(index);
            self.transition(&inner, TransitionReason::Seek);
        }
        Ok(())
    }

    fn position(&self) -> Duration {
        self.inner.lock().unwrap().position
    }

    fn duration(&self) -> Option<Duration> {
        self.inner.lock().unwrap().duration
    }

    fn buffered_percentage(&self) -> u8 {
        if self.inner.lock().unwrap().state == EngineState::Ready { 100 } else { 0 }
    }

    fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.inner.lock().unwrap().repeat_mode = mode;
        self.emit(EngineEvent::Events(EngineEvents::RepeatModeChanged));
    }

    fn set_shuffle(&mut self, enabled: bool) {
        self.inner.lock().unwrap().shuffle = enabled;
        self.emit(EngineEvent::Events(EngineEvents::ShuffleModeChanged));
    }

    fn release(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        inner.queue.clear();
        inner.current = None;
        inner.state = EngineState::Idle;
        inner.playing = false;
        inner.released = true;
    }
}
