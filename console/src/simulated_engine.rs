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


use std::time::{Duration, Instant};

use anyhow::{bail, Error};
use log::{debug, info};
use player_core::engine::{
    engine_event_channel, EngineEvent, EngineEventReceiver, EngineEventSender, EngineState,
    EngineTrack, PlaybackEngine, QueueEntry, TimelineChangeReason, TransitionReason,
};
use player_core::error::PlaybackFault;
use player_core::media_source::{MediaSource, SourceLayout};
use player_core::{EngineEvents, RepeatMode};

/// Posts faults on the engine's event channel as if the engine had hit them.
#[derive(Clone)]
pub struct FaultInjector {
    events: EngineEventSender,
}

impl FaultInjector {
    pub fn inject(&self, fault: PlaybackFault) {
        info!("Injecting fault: {}", fault);
        let _ = self.events.send(EngineEvent::Error(fault));
    }
}

/// Engine that decodes nothing. It keeps a queue, a wall-clock position and logs
/// every call; every source is `clip_length` long.
pub struct SimulatedEngine {
    queue: Vec<MediaSource>,
    current: Option<usize>,
    state: EngineState,
    play_when_ready: bool,
    // Position at `started`, or the frozen position while not playing.
    position: Duration,
    started: Option<Instant>,
    clip_length: Duration,
    events: EngineEventSender,
}

impl SimulatedEngine {
    pub fn new(clip_length: Duration) -> (Self, EngineEventReceiver) {
        let (events, rx) = engine_event_channel();
        let engine = Self {
            queue: Vec::new(),
            current: None,
            state: EngineState::Idle,
            play_when_ready: false,
            position: Duration::ZERO,
            started: None,
            clip_length,
            events,
        };
        (engine, rx)
    }

    pub fn fault_injector(&self) -> FaultInjector {
        FaultInjector { events: self.events.clone() }
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }

    fn is_playing_now(&self) -> bool {
        self.play_when_ready && self.state == EngineState::Ready
    }

    /// Folds elapsed wall-clock time into `position` and restarts the clock if playing.
    fn settle_clock(&mut self) {
        self.position = self.position();
        self.started = self.is_playing_now().then(Instant::now);
    }

    fn jump_to(&mut self, position: Duration) {
        self.position = position.min(self.clip_length);
        self.started = self.is_playing_now().then(Instant::now);
    }

    fn timeline_changed(&self) {
        self.emit(EngineEvent::TimelineChanged(TimelineChangeReason::PlaylistChanged));
        self.emit(EngineEvent::Events(EngineEvents::TimelineChanged));
    }

    fn transition(&self, reason: TransitionReason) {
        let source = self.current.and_then(|i| self.queue.get(i));
        if let Some(source) = source {
            info!("Now on {} ({})", source.item, describe(&source.layout));
        }
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

    fn check_index(&self, index: usize) -> Result<(), Error> {
        if index >= self.queue.len() {
            bail!("index {} outside queue of {}", index, self.queue.len());
        }
        Ok(())
    }
}

fn describe(layout: &SourceLayout) -> String {
    match layout {
        SourceLayout::Single(part) => part.uri.clone(),
        SourceLayout::Merged { video, audio } => format!("{} + {}", video.uri, audio.uri),
    }
}

impl PlaybackEngine for SimulatedEngine {
    fn set_source(&mut self, source: MediaSource) -> Result<(), Error> {
        debug!("set_source {}", source.correlation_id);
        self.queue = vec![source];
        self.current = Some(0);
        self.jump_to(Duration::ZERO);
        self.timeline_changed();
        self.transition(TransitionReason::PlaylistChanged);
        Ok(())
    }

    fn add_source(&mut self, source: MediaSource) -> Result<(), Error> {
        self.insert_source(self.queue.len(), source)
    }

    fn insert_source(&mut self, index: usize, source: MediaSource) -> Result<(), Error> {
        if index > self.queue.len() {
            bail!("insert index {} outside queue of {}", index, self.queue.len());
        }
        debug!("insert_source {} at {}", source.correlation_id, index);
        self.queue.insert(index, source);
        self.timeline_changed();
        match self.current {
            None => {
                self.current = Some(0);
                self.jump_to(Duration::ZERO);
                self.transition(TransitionReason::PlaylistChanged);
            }
            Some(c) if c >= index => self.current = Some(c + 1),
            Some(_) => {}
        }
        Ok(())
    }

    fn move_entry(&mut self, from: usize, to: usize) -> Result<(), Error> {
        self.check_index(from)?;
        self.check_index(to)?;
        debug!("move_entry {} -> {}", from, to);
        let source = self.queue.remove(from);
        self.queue.insert(to, source);
        self.current = self.current.map(|c| {
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
        self.check_index(index)?;
        debug!("remove_entry {}", index);
        self.queue.remove(index);
        self.timeline_changed();
        match self.current {
            Some(c) if c == index => {
                if self.queue.is_empty() {
                    self.current = None;
                    self.state = EngineState::Ended;
                } else {
                    self.current = Some(index.min(self.queue.len() - 1));
                }
                self.jump_to(Duration::ZERO);
                self.transition(TransitionReason::PlaylistChanged);
            }
            Some(c) if c > index => self.current = Some(c - 1),
            _ => {}
        }
        Ok(())
    }

    fn entry_count(&self) -> usize {
        self.queue.len()
    }

    fn entry_at(&self, index: usize) -> Option<QueueEntry> {
        self.queue.get(index).map(|s| QueueEntry { correlation_id: s.correlation_id })
    }

    fn current_index(&self) -> Option<usize> {
        self.current
    }

    fn state(&self) -> EngineState {
        self.state
    }

    fn is_playing(&self) -> bool {
        self.is_playing_now()
    }

    fn prepare(&mut self) {
        self.settle_clock();
        self.state = if self.queue.is_empty() { EngineState::Ended } else { EngineState::Ready };
        debug!("prepare -> {:?}", self.state);
        self.started = self.is_playing_now().then(Instant::now);
        self.emit(EngineEvent::Events(
            EngineEvents::PlaybackStateChanged | EngineEvents::IsLoadingChanged,
        ));
    }

    fn play(&mut self) {
        self.set_play_when_ready(true);
    }

    fn pause(&mut self) {
        self.set_play_when_ready(false);
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        self.settle_clock();
        self.play_when_ready = play_when_ready;
        self.started = self.is_playing_now().then(Instant::now);
        debug!("play_when_ready = {}", play_when_ready);
        self.emit(EngineEvent::Events(
            EngineEvents::PlayWhenReadyChanged | EngineEvents::IsPlayingChanged,
        ));
    }

    fn seek_to(&mut self, position: Duration) {
        debug!("seek_to {:?}", position);
        self.jump_to(position);
        self.emit(EngineEvent::Events(EngineEvents::PositionDiscontinuity));
    }

    fn seek_to_entry(&mut self, index: usize, position: Duration) -> Result<(), Error> {
        self.check_index(index)?;
        debug!("seek_to_entry {} at {:?}", index, position);
        self.jump_to(position);
        if self.current != Some(index) {
            self.current = Some(index);
            self.transition(TransitionReason::Seek);
        }
        self.emit(EngineEvent::Events(EngineEvents::PositionDiscontinuity));
        Ok(())
    }

    fn position(&self) -> Duration {
        let elapsed = self.started.map(|s| s.elapsed()).unwrap_or_default();
        (self.position + elapsed).min(self.clip_length)
    }

    fn duration(&self) -> Option<Duration> {
        self.current.map(|_| self.clip_length)
    }

    fn buffered_percentage(&self) -> u8 {
        match self.state {
            EngineState::Ready | EngineState::Ended => 100,
            EngineState::Buffering | EngineState::Idle => 0,
        }
    }

    fn set_repeat_mode(&mut self, mode: RepeatMode) {
        debug!("repeat mode {:?}", mode);
        self.emit(EngineEvent::Events(EngineEvents::RepeatModeChanged));
    }

    fn set_shuffle(&mut self, enabled: bool) {
        debug!("shuffle {}", enabled);
        self.emit(EngineEvent::Events(EngineEvents::ShuffleModeChanged));
    }

    fn release(&mut self) {
        info!("Releasing simulated engine");
        self.queue.clear();
        self.current = None;
        self.state = EngineState::Idle;
        self.play_when_ready = false;
        self.started = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use player_core::correlation::{CorrelationId, CorrelationTable};
    use player_core::media_source::SourcePart;
    use player_core::repository::TransportConfig;
    use player_core::stream::Delivery;

    fn source(id: CorrelationId, item: &str) -> MediaSource {
        MediaSource {
            correlation_id: id,
            item: item.to_string(),
            layout: SourceLayout::Single(SourcePart {
                uri: format!("demo://{item}"),
                delivery: Delivery::Progressive,
            }),
            transport: TransportConfig::default(),
            tracks: Vec::new(),
        }
    }

    #[test]
    fn removing_before_current_keeps_current_entry() {
        let mut ids = CorrelationTable::new();
        let (a, b) = (ids.allocate(), ids.allocate());
        let (mut engine, _rx) = SimulatedEngine::new(Duration::from_secs(60));
        engine.set_source(source(a, "a")).unwrap();
        engine.add_source(source(b, "b")).unwrap();
        engine.seek_to_entry(1, Duration::ZERO).unwrap();

        engine.remove_entry(0).unwrap();

        assert_eq!(engine.current_index(), Some(0));
        assert_eq!(engine.current_entry().map(|e| e.correlation_id), Some(b));
    }

    #[test]
    fn position_is_frozen_while_paused() {
        let (mut engine, _rx) = SimulatedEngine::new(Duration::from_secs(60));
        engine.set_source(source(CorrelationTable::new().allocate(), "a")).unwrap();
        engine.prepare();
        engine.seek_to(Duration::from_secs(90));
        assert_eq!(engine.position(), Duration::from_secs(60));

        engine.seek_to(Duration::from_secs(12));
        assert_eq!(engine.position(), Duration::from_secs(12));
        assert!(!engine.is_playing());
    }

    #[tokio::test]
    async fn injected_faults_arrive_as_engine_errors() {
        let (engine, mut rx) = SimulatedEngine::new(Duration::from_secs(60));
        let injector = engine.fault_injector();
        injector.inject(PlaybackFault::new(player_core::error::FaultKind::Network, "link down"));

        match rx.recv().await {
            Some(EngineEvent::Error(fault)) => assert_eq!(fault.message, "link down"),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
