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

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::select;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::PlayerConfig;
use crate::correlation::{CorrelationId, CorrelationTable};
use crate::engine::{
    EngineEvent, EngineEventReceiver, EngineEvents, EngineState, EngineTrack, PlaybackEngine,
    QueueEntry, TimelineChangeReason, TransitionReason,
};
use crate::error::{share, PlaybackFault, PlayerError};
use crate::handle::{OrchestratorHandle, PlayerHandle};
use crate::media_source::{MediaSource, SourceBuilder};
use crate::player_state::{
    publish, PlayMode, PlaybackProgress, PlayerChannels, PlaylistEntry, RepeatMode, SlotState,
};
use crate::recovery::{RecoveryContext, RecoveryPolicy, RecoveryResponse};
use crate::repository::{Chapter, MediaRepository};
use crate::stream::{available_tracks, StreamSelection};
use crate::stream_selector::StreamSelector;
use crate::track::StreamTrack;

pub(crate) type Reply<T> = oneshot::Sender<Result<T, PlayerError>>;

/// Requests sent by [`PlayerHandle`] to the orchestrator loop.
pub(crate) enum Command {
    PlayItem { item: String, mode: PlayMode, reply: Reply<()> },
    AddToPlaylist { item: String, reply: Reply<()> },
    MovePlaylistItem { from: usize, to: usize, reply: Reply<()> },
    RemovePlaylistItem { id: CorrelationId, reply: Reply<()> },
    SelectChapter { index: usize, reply: Reply<()> },
    SelectPlaylistItem { index: usize, reply: Reply<()> },
    ReplaceStreamSelection { selection: StreamSelection, reply: Reply<()> },
    ReplaceItem { item: String, reply: Reply<()> },
    Control { control: Control, reply: Reply<()> },
    ItemForEntry { id: CorrelationId, reply: Reply<String> },
    Progress { reply: Reply<PlaybackProgress> },
    Release { reply: Reply<()> },
}

/// Engine controls that complete synchronously.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Control {
    Play,
    Pause,
    Prepare,
    SetPlayWhenReady(bool),
    Seek(Duration),
    FastSeekForward,
    FastSeekBackward,
    SetRepeatMode(RepeatMode),
    SetShuffle(bool),
    SetPreferredLanguages(Vec<String>),
    SetLanguageConstraint(Option<String>),
}

/// What a built source is for.
enum Purpose {
    Play { mode: PlayMode, reply: Reply<()> },
    Append { reply: Reply<()> },
    Replace { target: CorrelationId, reply: Reply<()> },
    Recover { target: CorrelationId, resume_at: Duration },
}

/// Results of background work, applied by the loop.
enum TaskOutcome {
    CandidateTracks { item: String, tracks: Vec<StreamTrack> },
    SourceReady {
        id: CorrelationId,
        selection: StreamSelection,
        source: MediaSource,
        purpose: Purpose,
    },
    SourceFailed { id: CorrelationId, error: PlayerError, purpose: Purpose },
    AvailableTracks { id: CorrelationId, result: Result<Vec<StreamTrack>, PlayerError> },
    Chapters { id: CorrelationId, result: Result<Vec<Chapter>, PlayerError> },
    RecoveryEnded(RecoveryEnd),
}

enum RecoveryEnd {
    Unhandled(PlaybackFault),
    ActionDone,
    Failed(PlayerError),
}

/// Resolves items into sources off the loop.
#[derive(Clone)]
struct Resolver {
    repository: Arc<dyn MediaRepository>,
    builder: SourceBuilder,
    outcome_tx: mpsc::UnboundedSender<TaskOutcome>,
    preferred_languages: Vec<String>,
    language_constraint: Option<String>,
}

impl Resolver {
    async fn resolve(
        &self,
        item: &str,
        id: CorrelationId,
        publish_candidates: bool,
    ) -> Result<(StreamSelection, MediaSource), PlayerError> {
        let streams = self
            .repository
            .get_streams(item)
            .await
            .map_err(|e| PlayerError::Repository { item: item.to_owned(), source: share(e) })?;
        if publish_candidates {
            let tracks = available_tracks(&streams);
            let _ = self
                .outcome_tx
                .send(TaskOutcome::CandidateTracks { item: item.to_owned(), tracks });
        }
        let selection =
            StreamSelector::new(&self.preferred_languages, self.language_constraint.as_deref())
                .select(item, &streams)?;
        debug!("Selected {:?} for {}", selection.tracks(), item);
        self.build(selection, id).await
    }

    async fn build(
        &self,
        selection: StreamSelection,
        id: CorrelationId,
    ) -> Result<(StreamSelection, MediaSource), PlayerError> {
        let source = self.builder.build(&selection, id).await?;
        Ok((selection, source))
    }
}

/// Drives a [`PlaybackEngine`]: turns items into sources, keeps the observable state in
/// line with engine callbacks and runs fault recovery.
///
/// All mutations happen on the single task started by [`Orchestrator::run`]. Repository
/// work runs on background tasks whose results are applied by that same task.
pub struct Orchestrator<E: PlaybackEngine> {
    // Receivers
    engine_rx: EngineEventReceiver,
    command_rx: mpsc::Receiver<Command>,
    outcome_rx: mpsc::UnboundedReceiver<TaskOutcome>,
    outcome_tx: mpsc::UnboundedSender<TaskOutcome>,

    // Collaborators
    engine: E,
    repository: Arc<dyn MediaRepository>,
    builder: SourceBuilder,
    policy: Arc<dyn RecoveryPolicy>,
    config: PlayerConfig,

    // Session state
    channels: Arc<PlayerChannels>,
    table: CorrelationTable,
    preferred_languages: Vec<String>,
    language_constraint: Option<String>,
    recovering: bool,
    /// Faults reported while a recovery was running, oldest first.
    deferred_faults: VecDeque<PlaybackFault>,

    // Background work
    cancel: CancellationToken,
    tasks: JoinSet<()>,
    released: bool,
}

impl<E: PlaybackEngine> Orchestrator<E> {
    /// Creates an orchestrator for `engine`, whose callbacks arrive on `engine_rx`.
    /// The returned handle is the only way to talk to it once running.
    pub fn new(
        engine: E,
        engine_rx: EngineEventReceiver,
        repository: Arc<dyn MediaRepository>,
        policy: Arc<dyn RecoveryPolicy>,
        config: PlayerConfig,
    ) -> (Self, PlayerHandle) {
        let (command_tx, command_rx) = mpsc::channel(config.command_queue_capacity.max(1));
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let channels = Arc::new(PlayerChannels::new(
            config.event_broadcast_capacity,
            config.error_broadcast_capacity,
        ));
        let handle = PlayerHandle::new(command_tx, channels.clone(), repository.info());
        let orchestrator = Self {
            engine_rx,
            command_rx,
            outcome_rx,
            outcome_tx,
            engine,
            builder: SourceBuilder::new(repository.clone()),
            repository,
            policy,
            preferred_languages: config.preferred_languages.clone(),
            config,
            channels,
            table: CorrelationTable::new(),
            language_constraint: None,
            recovering: false,
            deferred_faults: VecDeque::new(),
            cancel: CancellationToken::new(),
            tasks: JoinSet::new(),
            released: false,
        };
        (orchestrator, handle)
    }

    /// Spawn the orchestrator event loop in background and return a handle.
    ///
    /// The loop ends on shutdown, on `release`, when the engine or every player handle
    /// goes away, or on an invariant violation. It always releases the engine on exit.
    pub fn run(mut self) -> OrchestratorHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let join = tokio::spawn(async move {
            let result = loop {
                select! {
                    biased;
                    _ = &mut shutdown_rx => {
                        info!("Player shutdown requested");
                        break Ok(());
                    }
                    evt = self.engine_rx.recv() => {
                        match evt {
                            Some(evt) => {
                                if let Err(e) = self.on_engine_event(evt) {
                                    break Err(e);
                                }
                            }
                            None => {
                                info!("Engine event channel closed; stopping player");
                                break Ok(());
                            }
                        }
                    }
                    Some(outcome) = self.outcome_rx.recv() => {
                        self.on_task_outcome(outcome);
                    }
                    cmd = self.command_rx.recv() => {
                        match cmd {
                            Some(Command::Release { reply }) => {
                                self.release().await;
                                let _ = reply.send(Ok(()));
                                break Ok(());
                            }
                            Some(cmd) => self.on_command(cmd),
                            None => {
                                info!("All player handles dropped; stopping player");
                                break Ok(());
                            }
                        }
                    }
                    Some(joined) = self.tasks.join_next() => {
                        if let Err(e) = joined {
                            if e.is_panic() {
                                error!("Background task panicked: {}", e);
                            }
                        }
                    }
                }
            };
            if let Err(e) = &result {
                error!("Player stopped on invariant violation: {}", e);
                self.channels.notify_error(e.clone());
            }
            self.release().await;
            result
        });
        OrchestratorHandle::new(join, shutdown_tx)
    }

    // Engine events

    /// Errors returned here are invariant violations and stop the loop.
    fn on_engine_event(&mut self, evt: EngineEvent) -> Result<(), PlayerError> {
        match evt {
            EngineEvent::Error(fault) => self.handle_playback_fault(fault),
            EngineEvent::Events(events) => self.handle_engine_events(events),
            EngineEvent::TimelineChanged(reason) => return self.handle_timeline_changed(reason),
            EngineEvent::MediaItemTransition { entry, reason } => {
                return self.handle_media_item_transition(entry, reason);
            }
            EngineEvent::TracksChanged(tracks) => self.handle_tracks_changed(tracks),
        }
        Ok(())
    }

    fn handle_engine_events(&mut self, events: EngineEvents) {
        let _ = self.channels.engine_events.send(events);
        if events.intersects(
            EngineEvents::PlaybackStateChanged
                | EngineEvents::IsPlayingChanged
                | EngineEvents::PlayWhenReadyChanged,
        ) {
            self.refresh_slot_state();
        }
        self.publish_progress();
    }

    fn handle_timeline_changed(&mut self, reason: TimelineChangeReason) -> Result<(), PlayerError> {
        if reason != TimelineChangeReason::PlaylistChanged {
            debug!("Timeline changed ({:?}); playlist untouched", reason);
            return Ok(());
        }
        let mut playlist = Vec::with_capacity(self.engine.entry_count());
        for index in 0..self.engine.entry_count() {
            let Some(entry) = self.engine.entry_at(index) else { continue };
            playlist.push(self.project(entry)?);
        }
        let live: HashSet<_> = playlist.iter().map(|e| e.correlation_id).collect();
        let dropped = self.table.retain_live(&live);
        if dropped > 0 {
            debug!("Dropped {} correlation entries of dequeued slots", dropped);
        }
        debug!("Playlist now has {} entries", playlist.len());
        publish(&self.channels.playlist, playlist);
        Ok(())
    }

    fn handle_media_item_transition(
        &mut self,
        entry: Option<QueueEntry>,
        reason: TransitionReason,
    ) -> Result<(), PlayerError> {
        debug!("Media item transition to {:?} ({:?})", entry, reason);
        if let Some(constraint) = self.language_constraint.take() {
            debug!("Language constraint {} cleared", constraint);
        }
        let current = self.engine.current_entry();
        if current != entry {
            debug!("Transition superseded; engine is at {:?}", current);
        }
        let projected = current.map(|e| self.project(e)).transpose()?;
        if !publish(&self.channels.current_entry, projected.clone()) {
            return Ok(());
        }
        match projected {
            Some(entry) => {
                info!("Now playing {} ({})", entry.item, entry.correlation_id);
                self.refresh_available_tracks(&entry);
                self.refresh_chapters(&entry);
            }
            None => {
                info!("Nothing is playing");
                publish(&self.channels.available_tracks, Vec::new());
                publish(&self.channels.playing_tracks, Vec::new());
                publish(&self.channels.chapters, Vec::new());
            }
        }
        self.refresh_slot_state();
        Ok(())
    }

    fn handle_tracks_changed(&mut self, tracks: Vec<EngineTrack>) {
        let selected: Vec<_> =
            tracks.iter().filter(|t| t.selected).map(|t| t.track.clone()).collect();
        let playing = if selected.is_empty() {
            tracks.into_iter().map(|t| t.track).collect()
        } else {
            selected
        };
        debug!("Playing tracks: {:?}", playing);
        publish(&self.channels.playing_tracks, playing);
    }

    fn handle_playback_fault(&mut self, fault: PlaybackFault) {
        warn!("Playback fault: {}", fault);
        self.engine.pause();
        if self.recovering {
            self.deferred_faults.push_back(fault);
            warn!("Recovery in progress; fault deferred ({} pending)", self.deferred_faults.len());
            return;
        }
        self.start_recovery(fault);
    }

    // Fault recovery

    fn start_recovery(&mut self, fault: PlaybackFault) {
        let entry = self.engine.current_entry();
        let item = entry.and_then(|e| self.table.item(e.correlation_id)).map(str::to_owned);
        let resume_at = self.engine.position();
        self.recovering = true;
        self.refresh_slot_state();
        info!("Recovering {:?} from fault at {:?}", item, resume_at);

        let context = RecoveryContext {
            item: item.clone(),
            entry,
            fault,
            repository: self.repository.clone(),
        };
        let policy = self.policy.clone();
        let resolver = self.resolver();
        let id = self.table.allocate();
        self.spawn(async move {
            let fault = context.fault.clone();
            let response = policy.rescue(context).await;
            debug!("Recovery policy answered {:?}", response);
            let (target, result) = match response {
                RecoveryResponse::NoResponse => {
                    return TaskOutcome::RecoveryEnded(RecoveryEnd::Unhandled(fault));
                }
                RecoveryResponse::RunAction(action) => {
                    action.await;
                    return TaskOutcome::RecoveryEnded(RecoveryEnd::ActionDone);
                }
                RecoveryResponse::ReplaceStreamSelection(selection) => {
                    let (Some(entry), Some(item)) = (entry, item) else {
                        return TaskOutcome::RecoveryEnded(RecoveryEnd::Failed(
                            PlayerError::NoCurrentEntry,
                        ));
                    };
                    let selection = if selection.item() == item {
                        selection
                    } else {
                        warn!("Replacement selection names {}; using {}", selection.item(), item);
                        selection.with_item(item)
                    };
                    (entry.correlation_id, resolver.build(selection, id).await)
                }
                RecoveryResponse::ReplaceItem(new_item) => {
                    let Some(entry) = entry else {
                        return TaskOutcome::RecoveryEnded(RecoveryEnd::Failed(
                            PlayerError::NoCurrentEntry,
                        ));
                    };
                    (entry.correlation_id, resolver.resolve(&new_item, id, false).await)
                }
            };
            let purpose = Purpose::Recover { target, resume_at };
            match result {
                Ok((selection, source)) => {
                    TaskOutcome::SourceReady { id, selection, source, purpose }
                }
                Err(error) => TaskOutcome::SourceFailed { id, error, purpose },
            }
        });
    }

    fn finish_recovery(&mut self) {
        self.recovering = false;
        match self.deferred_faults.pop_front() {
            Some(fault) => {
                info!("Handling deferred fault: {}", fault);
                self.start_recovery(fault);
            }
            None => self.refresh_slot_state(),
        }
    }

    // Background results

    fn on_task_outcome(&mut self, outcome: TaskOutcome) {
        if self.released {
            return;
        }
        match outcome {
            TaskOutcome::CandidateTracks { item, tracks } => {
                debug!("{} offers {} tracks", item, tracks.len());
                publish(&self.channels.available_tracks, tracks);
            }
            TaskOutcome::SourceReady { id, selection, source, purpose } => {
                self.apply_source(id, selection, source, purpose);
            }
            TaskOutcome::SourceFailed { id, error, purpose } => {
                warn!("Source {} failed: {}", id, error);
                match purpose {
                    Purpose::Play { reply, .. }
                    | Purpose::Append { reply }
                    | Purpose::Replace { reply, .. } => {
                        // Selection errors only concern the caller.
                        if !matches!(error, PlayerError::Selection(_)) {
                            self.channels.notify_error(error.clone());
                        }
                        let _ = reply.send(Err(error));
                    }
                    Purpose::Recover { .. } => {
                        self.channels.notify_error(error);
                        self.finish_recovery();
                    }
                }
            }
            TaskOutcome::AvailableTracks { id, result } => {
                if !self.is_current(id) {
                    warn!("Discarding available tracks of superseded entry {}", id);
                    return;
                }
                match result {
                    Ok(tracks) => {
                        publish(&self.channels.available_tracks, tracks);
                    }
                    Err(e) => self.channels.notify_error(e),
                }
            }
            TaskOutcome::Chapters { id, result } => {
                if !self.is_current(id) {
                    warn!("Discarding chapters of superseded entry {}", id);
                    return;
                }
                match result {
                    Ok(chapters) => {
                        publish(&self.channels.chapters, chapters);
                    }
                    Err(e) => self.channels.notify_error(e),
                }
            }
            TaskOutcome::RecoveryEnded(end) => {
                match end {
                    RecoveryEnd::Unhandled(fault) => {
                        warn!("No recovery for fault: {}", fault);
                        self.channels.notify_error(PlayerError::FaultWithoutRecovery(fault));
                    }
                    RecoveryEnd::ActionDone => debug!("Recovery action finished"),
                    RecoveryEnd::Failed(e) => {
                        warn!("Recovery failed: {}", e);
                        self.channels.notify_error(e);
                    }
                }
                self.finish_recovery();
            }
        }
    }

    fn apply_source(
        &mut self,
        id: CorrelationId,
        selection: StreamSelection,
        source: MediaSource,
        purpose: Purpose,
    ) {
        match purpose {
            Purpose::Play { mode, reply } => {
                let result = self.start_playback(id, selection, source, mode);
                let _ = reply.send(result);
            }
            Purpose::Append { reply } => {
                self.table.insert(id, selection);
                let result = self.engine.add_source(source).map_err(|e| {
                    self.table.remove(id);
                    PlayerError::Engine(share(e))
                });
                if result.is_ok() {
                    debug!("Queued {} at the end of the playlist", id);
                }
                let _ = reply.send(result);
            }
            Purpose::Replace { target, reply } => {
                let result = self.substitute(target, id, selection, source, None);
                let _ = reply.send(result);
            }
            Purpose::Recover { target, resume_at } => {
                if let Err(e) = self.substitute(target, id, selection, source, Some(resume_at)) {
                    if !matches!(e, PlayerError::MissingCorrelation(_)) {
                        self.channels.notify_error(e);
                    }
                }
                self.finish_recovery();
            }
        }
    }

    fn start_playback(
        &mut self,
        id: CorrelationId,
        selection: StreamSelection,
        source: MediaSource,
        mode: PlayMode,
    ) -> Result<(), PlayerError> {
        self.table.insert(id, selection);
        if let Err(e) = self.engine.set_source(source) {
            self.table.remove(id);
            return Err(PlayerError::Engine(share(e)));
        }
        publish(&self.channels.play_mode, mode);
        self.prepare_if_stopped();
        self.engine.play();
        self.prune_table();
        self.refresh_slot_state();
        info!("Started {} in {:?} mode", id, mode);
        Ok(())
    }

    /// Replaces the slot holding `target` with `source`, keeping its index.
    ///
    /// When the slot is the current one, playback resumes at `resume_at`, or at the
    /// position the engine reports right now. A slot that no longer exists leaves the
    /// engine untouched and yields `MissingCorrelation`.
    fn substitute(
        &mut self,
        target: CorrelationId,
        id: CorrelationId,
        selection: StreamSelection,
        source: MediaSource,
        resume_at: Option<Duration>,
    ) -> Result<(), PlayerError> {
        let Some(index) = self.index_of(target) else {
            warn!("Slot {} is gone; discarding replacement {}", target, id);
            return Err(PlayerError::MissingCorrelation(target));
        };
        let is_current = self.engine.current_index() == Some(index);
        let position = resume_at.unwrap_or_else(|| self.engine.position());

        self.table.insert(id, selection);
        if let Err(e) = self.engine.remove_entry(index) {
            self.table.remove(id);
            return Err(PlayerError::Engine(share(e)));
        }
        self.table.remove(target);
        if let Err(e) = self.engine.insert_source(index, source) {
            self.table.remove(id);
            return Err(PlayerError::Engine(share(e)));
        }

        if is_current {
            self.prepare_if_stopped();
            self.engine.seek_to_entry(index, position).map_err(|e| PlayerError::Engine(share(e)))?;
            self.engine.play();
        }
        info!("Slot {} replaced by {} at {:?}", index, id, position);
        Ok(())
    }

    // Commands

    fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::PlayItem { item, mode, reply } => {
                debug!("Play {} in {:?} mode", item, mode);
                let id = self.table.allocate();
                let resolver = self.resolver();
                self.language_constraint = None;
                self.spawn_resolve(resolver, item, id, true, Purpose::Play { mode, reply });
            }
            Command::AddToPlaylist { item, reply } => {
                debug!("Queue {}", item);
                let id = self.table.allocate();
                let resolver = self.resolver();
                self.spawn_resolve(resolver, item, id, false, Purpose::Append { reply });
            }
            Command::MovePlaylistItem { from, to, reply } => {
                let _ = reply.send(self.move_playlist_item(from, to));
            }
            Command::RemovePlaylistItem { id, reply } => {
                let _ = reply.send(self.remove_playlist_item(id));
            }
            Command::SelectChapter { index, reply } => {
                let _ = reply.send(self.select_chapter(index));
            }
            Command::SelectPlaylistItem { index, reply } => {
                let _ = reply.send(self.select_playlist_item(index));
            }
            Command::ReplaceStreamSelection { selection, reply } => match self.current_slot() {
                Ok((entry, item)) => {
                    let id = self.table.allocate();
                    let resolver = self.resolver();
                    let selection = selection.with_item(item);
                    let purpose = Purpose::Replace { target: entry.correlation_id, reply };
                    self.spawn(async move {
                        match resolver.build(selection, id).await {
                            Ok((selection, source)) => {
                                TaskOutcome::SourceReady { id, selection, source, purpose }
                            }
                            Err(error) => TaskOutcome::SourceFailed { id, error, purpose },
                        }
                    });
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            Command::ReplaceItem { item, reply } => match self.current_slot() {
                Ok((entry, _)) => {
                    let id = self.table.allocate();
                    let resolver = self.resolver();
                    let purpose = Purpose::Replace { target: entry.correlation_id, reply };
                    self.spawn_resolve(resolver, item, id, false, purpose);
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            Command::Control { control, reply } => {
                self.handle_control(control);
                let _ = reply.send(Ok(()));
            }
            Command::ItemForEntry { id, reply } => {
                let item = self
                    .table
                    .item(id)
                    .map(str::to_owned)
                    .ok_or(PlayerError::MissingCorrelation(id));
                let _ = reply.send(item);
            }
            Command::Progress { reply } => {
                let _ = reply.send(Ok(self.progress()));
            }
            Command::Release { reply } => {
                // Handled by the loop, which has to stop afterwards.
                let _ = reply.send(Err(PlayerError::Released));
            }
        }
    }

    fn handle_control(&mut self, control: Control) {
        debug!("Control: {:?}", control);
        match control {
            Control::Play => {
                if self.engine.current_entry().is_some() {
                    self.engine.play();
                } else {
                    info!("Nothing queued; play ignored");
                }
            }
            Control::Pause => self.engine.pause(),
            Control::Prepare => self.engine.prepare(),
            Control::SetPlayWhenReady(play_when_ready) => {
                self.engine.set_play_when_ready(play_when_ready)
            }
            Control::Seek(position) => self.engine.seek_to(position),
            Control::FastSeekForward => {
                let target = self.engine.position().saturating_add(self.config.fast_seek_amount);
                let target = self.engine.duration().map_or(target, |d| target.min(d));
                self.engine.seek_to(target);
            }
            Control::FastSeekBackward => {
                let target = self.engine.position().saturating_sub(self.config.fast_seek_amount);
                self.engine.seek_to(target);
            }
            Control::SetRepeatMode(mode) => {
                self.engine.set_repeat_mode(mode);
                publish(&self.channels.repeat_mode, mode);
            }
            Control::SetShuffle(enabled) => {
                self.engine.set_shuffle(enabled);
                publish(&self.channels.shuffle, enabled);
            }
            Control::SetPreferredLanguages(languages) => self.preferred_languages = languages,
            Control::SetLanguageConstraint(constraint) => self.language_constraint = constraint,
        }
        self.refresh_slot_state();
        self.publish_progress();
    }

    fn move_playlist_item(&mut self, from: usize, to: usize) -> Result<(), PlayerError> {
        let len = self.engine.entry_count();
        for index in [from, to] {
            if index >= len {
                return Err(PlayerError::IndexOutOfRange { what: "playlist", index, len });
            }
        }
        self.engine.move_entry(from, to).map_err(|e| PlayerError::Engine(share(e)))
    }

    fn remove_playlist_item(&mut self, id: CorrelationId) -> Result<(), PlayerError> {
        let Some(index) = self.index_of(id) else {
            warn!("No queued slot for {}; nothing removed", id);
            return Ok(());
        };
        self.engine.remove_entry(index).map_err(|e| PlayerError::Engine(share(e)))?;
        self.table.remove(id);
        debug!("Removed slot {} ({})", index, id);
        Ok(())
    }

    fn select_chapter(&mut self, index: usize) -> Result<(), PlayerError> {
        let start = {
            let chapters = self.channels.chapters.borrow();
            let chapter = chapters.get(index).ok_or(PlayerError::IndexOutOfRange {
                what: "chapter",
                index,
                len: chapters.len(),
            })?;
            chapter.start
        };
        self.engine.seek_to(start);
        self.publish_progress();
        Ok(())
    }

    fn select_playlist_item(&mut self, index: usize) -> Result<(), PlayerError> {
        let len = self.engine.entry_count();
        if index >= len {
            return Err(PlayerError::IndexOutOfRange { what: "playlist", index, len });
        }
        self.engine.seek_to_entry(index, Duration::ZERO).map_err(|e| PlayerError::Engine(share(e)))
    }

    async fn release(&mut self) {
        if self.released {
            return;
        }
        info!("Releasing player");
        self.cancel.cancel();
        self.tasks.shutdown().await;
        self.engine.release();
        self.channels.reset();
        self.table.reset();
        self.recovering = false;
        self.deferred_faults.clear();
        self.language_constraint = None;
        self.released = true;
    }

    // Helpers

    fn resolver(&self) -> Resolver {
        Resolver {
            repository: self.repository.clone(),
            builder: self.builder.clone(),
            outcome_tx: self.outcome_tx.clone(),
            preferred_languages: self.preferred_languages.clone(),
            language_constraint: self.language_constraint.clone(),
        }
    }

    /// Runs `work` under the session's cancellation scope and posts its outcome.
    fn spawn<F>(&mut self, work: F)
    where
        F: Future<Output = TaskOutcome> + Send + 'static,
    {
        let outcome_tx = self.outcome_tx.clone();
        let cancel = self.cancel.clone();
        self.tasks.spawn(async move {
            select! {
                _ = cancel.cancelled() => {}
                outcome = work => {
                    let _ = outcome_tx.send(outcome);
                }
            }
        });
    }

    fn spawn_resolve(
        &mut self,
        resolver: Resolver,
        item: String,
        id: CorrelationId,
        publish_candidates: bool,
        purpose: Purpose,
    ) {
        self.spawn(async move {
            match resolver.resolve(&item, id, publish_candidates).await {
                Ok((selection, source)) => {
                    TaskOutcome::SourceReady { id, selection, source, purpose }
                }
                Err(error) => TaskOutcome::SourceFailed { id, error, purpose },
            }
        });
    }

    fn refresh_available_tracks(&mut self, entry: &PlaylistEntry) {
        let repository = self.repository.clone();
        let id = entry.correlation_id;
        let item = entry.item.clone();
        self.spawn(async move {
            let result = repository
                .get_streams(&item)
                .await
                .map(|streams| available_tracks(&streams))
                .map_err(|e| PlayerError::Repository { item, source: share(e) });
            TaskOutcome::AvailableTracks { id, result }
        });
    }

    fn refresh_chapters(&mut self, entry: &PlaylistEntry) {
        let repository = self.repository.clone();
        let id = entry.correlation_id;
        let item = entry.item.clone();
        self.spawn(async move {
            let result = repository
                .get_chapters(&item)
                .await
                .map_err(|e| PlayerError::Repository { item, source: share(e) });
            TaskOutcome::Chapters { id, result }
        });
    }

    fn project(&self, entry: QueueEntry) -> Result<PlaylistEntry, PlayerError> {
        let item = self
            .table
            .item(entry.correlation_id)
            .ok_or(PlayerError::MissingCorrelation(entry.correlation_id))?;
        Ok(PlaylistEntry { correlation_id: entry.correlation_id, item: item.to_owned() })
    }

    fn current_slot(&self) -> Result<(QueueEntry, String), PlayerError> {
        let entry = self.engine.current_entry().ok_or(PlayerError::NoCurrentEntry)?;
        let item = self
            .table
            .item(entry.correlation_id)
            .ok_or(PlayerError::MissingCorrelation(entry.correlation_id))?;
        Ok((entry, item.to_owned()))
    }

    fn is_current(&self, id: CorrelationId) -> bool {
        self.channels.current_entry.borrow().as_ref().is_some_and(|e| e.correlation_id == id)
    }

    fn index_of(&self, id: CorrelationId) -> Option<usize> {
        (0..self.engine.entry_count())
            .find(|&i| self.engine.entry_at(i).is_some_and(|e| e.correlation_id == id))
    }

    /// An engine that stopped on an error or ran out of entries has to be prepared again.
    fn prepare_if_stopped(&mut self) {
        if matches!(self.engine.state(), EngineState::Idle | EngineState::Ended) {
            self.engine.prepare();
        }
    }

    fn prune_table(&mut self) {
        let live: HashSet<_> = (0..self.engine.entry_count())
            .filter_map(|i| self.engine.entry_at(i))
            .map(|e| e.correlation_id)
            .collect();
        let dropped = self.table.retain_live(&live);
        if dropped > 0 {
            debug!("Dropped {} correlation entries of replaced slots", dropped);
        }
    }

    fn refresh_slot_state(&mut self) {
        let state = if self.recovering {
            SlotState::Faulted
        } else if self.engine.entry_count() == 0 {
            SlotState::Idle
        } else {
            match self.engine.state() {
                EngineState::Buffering => SlotState::Preparing,
                EngineState::Ready if self.engine.is_playing() => SlotState::Playing,
                EngineState::Ready | EngineState::Idle | EngineState::Ended => SlotState::Paused,
            }
        };
        if publish(&self.channels.slot_state, state) {
            debug!("Slot state: {:?}", state);
        }
    }

    fn progress(&self) -> PlaybackProgress {
        PlaybackProgress {
            position: self.engine.position(),
            duration: self.engine.duration(),
            buffered_percentage: self.engine.buffered_percentage(),
        }
    }

    fn publish_progress(&mut self) {
        publish(&self.channels.progress, self.progress());
    }
}
