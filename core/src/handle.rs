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

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};

use crate::correlation::CorrelationId;
use crate::engine::EngineEvents;
use crate::error::PlayerError;
use crate::orchestrator::{Command, Control, Reply};
use crate::player_state::{
    PlayMode, PlaybackProgress, PlayerChannels, PlaylistEntry, RepeatMode, SlotState,
};
use crate::repository::{Chapter, RepositoryInfo};
use crate::stream::StreamSelection;
use crate::track::StreamTrack;

/// Handle to control the orchestrator task
pub struct OrchestratorHandle {
    join: JoinHandle<Result<(), PlayerError>>,
    shutdown_tx: oneshot::Sender<()>,
}

impl OrchestratorHandle {
    pub(crate) fn new(
        join: JoinHandle<Result<(), PlayerError>>,
        shutdown_tx: oneshot::Sender<()>,
    ) -> Self {
        Self { join, shutdown_tx }
    }

    /// Request cooperative shutdown and await task completion.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        let _ = self.shutdown_tx.send(());
        self.join.await.map(|_| ())
    }

    /// Await the loop without asking it to stop. Yields the invariant violation that
    /// stopped it, if any.
    pub async fn wait(self) -> Result<Result<(), PlayerError>, JoinError> {
        self.join.await
    }

    /// Forcefully abort the underlying task.
    pub fn abort(self) {
        self.join.abort();
    }
}

/// Cloneable front end of a running orchestrator.
///
/// Operations are queued to the orchestrator loop and resolve once it has handled
/// them; after `release` they fail with [`PlayerError::Released`]. Observers read the
/// latest state from `watch` channels.
#[derive(Clone)]
pub struct PlayerHandle {
    commands: mpsc::Sender<Command>,
    channels: Arc<PlayerChannels>,
    repository_info: RepositoryInfo,
}

impl PlayerHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<Command>,
        channels: Arc<PlayerChannels>,
        repository_info: RepositoryInfo,
    ) -> Self {
        Self { commands, channels, repository_info }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, PlayerError> {
        let (reply, rx) = oneshot::channel();
        self.commands.send(command(reply)).await.map_err(|_| PlayerError::Released)?;
        rx.await.map_err(|_| PlayerError::Released)?
    }

    async fn control(&self, control: Control) -> Result<(), PlayerError> {
        self.request(|reply| Command::Control { control, reply }).await
    }

    /// Resolves `item`, picks its tracks and replaces the playlist with it.
    /// Resolves once the engine has the source.
    pub async fn play_item(
        &self,
        item: impl Into<String>,
        mode: PlayMode,
    ) -> Result<(), PlayerError> {
        let item = item.into();
        self.request(|reply| Command::PlayItem { item, mode, reply }).await
    }

    pub async fn add_to_playlist(&self, item: impl Into<String>) -> Result<(), PlayerError> {
        let item = item.into();
        self.request(|reply| Command::AddToPlaylist { item, reply }).await
    }

    pub async fn move_playlist_item(&self, from: usize, to: usize) -> Result<(), PlayerError> {
        self.request(|reply| Command::MovePlaylistItem { from, to, reply }).await
    }

    /// Removes the slot queued under `id`. Unknown ids are ignored.
    pub async fn remove_playlist_item(&self, id: CorrelationId) -> Result<(), PlayerError> {
        self.request(|reply| Command::RemovePlaylistItem { id, reply }).await
    }

    pub async fn select_chapter(&self, index: usize) -> Result<(), PlayerError> {
        self.request(|reply| Command::SelectChapter { index, reply }).await
    }

    pub async fn select_playlist_item(&self, index: usize) -> Result<(), PlayerError> {
        self.request(|reply| Command::SelectPlaylistItem { index, reply }).await
    }

    /// Plays other tracks of the current item from the current position.
    pub async fn replace_current_stream_selection(
        &self,
        selection: StreamSelection,
    ) -> Result<(), PlayerError> {
        self.request(|reply| Command::ReplaceStreamSelection { selection, reply }).await
    }

    /// Plays another item in the current slot from the current position.
    pub async fn replace_current_item(&self, item: impl Into<String>) -> Result<(), PlayerError> {
        let item = item.into();
        self.request(|reply| Command::ReplaceItem { item, reply }).await
    }

    /// Plays if something is queued.
    pub async fn play(&self) -> Result<(), PlayerError> {
        self.control(Control::Play).await
    }

    pub async fn pause(&self) -> Result<(), PlayerError> {
        self.control(Control::Pause).await
    }

    pub async fn prepare(&self) -> Result<(), PlayerError> {
        self.control(Control::Prepare).await
    }

    pub async fn set_play_when_ready(&self, play_when_ready: bool) -> Result<(), PlayerError> {
        self.control(Control::SetPlayWhenReady(play_when_ready)).await
    }

    pub async fn seek(&self, position: Duration) -> Result<(), PlayerError> {
        self.control(Control::Seek(position)).await
    }

    pub async fn fast_seek_forward(&self) -> Result<(), PlayerError> {
        self.control(Control::FastSeekForward).await
    }

    pub async fn fast_seek_backward(&self) -> Result<(), PlayerError> {
        self.control(Control::FastSeekBackward).await
    }

    pub async fn set_repeat_mode(&self, mode: RepeatMode) -> Result<(), PlayerError> {
        self.control(Control::SetRepeatMode(mode)).await
    }

    pub async fn set_shuffle(&self, enabled: bool) -> Result<(), PlayerError> {
        self.control(Control::SetShuffle(enabled)).await
    }

    pub async fn set_preferred_languages(&self, languages: Vec<String>) -> Result<(), PlayerError> {
        self.control(Control::SetPreferredLanguages(languages)).await
    }

    /// Restricts audio selection of the next resolved item to `language`.
    /// Cleared on every item transition.
    pub async fn set_language_constraint(
        &self,
        language: Option<String>,
    ) -> Result<(), PlayerError> {
        self.control(Control::SetLanguageConstraint(language)).await
    }

    pub async fn item_for_entry(&self, id: CorrelationId) -> Result<String, PlayerError> {
        self.request(|reply| Command::ItemForEntry { id, reply }).await
    }

    /// Position, duration and buffering as the engine reports them right now.
    pub async fn progress(&self) -> Result<PlaybackProgress, PlayerError> {
        self.request(|reply| Command::Progress { reply }).await
    }

    pub async fn position(&self) -> Result<Duration, PlayerError> {
        Ok(self.progress().await?.position)
    }

    pub async fn duration(&self) -> Result<Option<Duration>, PlayerError> {
        Ok(self.progress().await?.duration)
    }

    pub async fn buffered_percentage(&self) -> Result<u8, PlayerError> {
        Ok(self.progress().await?.buffered_percentage)
    }

    /// Cancels background work, releases the engine, resets all state and stops the
    /// orchestrator.
    pub async fn release(&self) -> Result<(), PlayerError> {
        self.request(|reply| Command::Release { reply }).await
    }

    pub fn repository_info(&self) -> RepositoryInfo {
        self.repository_info
    }

    pub fn current_entry(&self) -> watch::Receiver<Option<PlaylistEntry>> {
        self.channels.current_entry.subscribe()
    }

    pub fn playlist(&self) -> watch::Receiver<Vec<PlaylistEntry>> {
        self.channels.playlist.subscribe()
    }

    pub fn available_tracks(&self) -> watch::Receiver<Vec<StreamTrack>> {
        self.channels.available_tracks.subscribe()
    }

    pub fn playing_tracks(&self) -> watch::Receiver<Vec<StreamTrack>> {
        self.channels.playing_tracks.subscribe()
    }

    pub fn chapters(&self) -> watch::Receiver<Vec<Chapter>> {
        self.channels.chapters.subscribe()
    }

    pub fn play_mode(&self) -> watch::Receiver<PlayMode> {
        self.channels.play_mode.subscribe()
    }

    pub fn slot_state(&self) -> watch::Receiver<SlotState> {
        self.channels.slot_state.subscribe()
    }

    pub fn repeat_mode(&self) -> watch::Receiver<RepeatMode> {
        self.channels.repeat_mode.subscribe()
    }

    pub fn shuffle(&self) -> watch::Receiver<bool> {
        self.channels.shuffle.subscribe()
    }

    pub fn progress_updates(&self) -> watch::Receiver<PlaybackProgress> {
        self.channels.progress.subscribe()
    }

    /// Errors from background work and unrecovered playback faults.
    pub fn subscribe_errors(&self) -> broadcast::Receiver<Arc<PlayerError>> {
        self.channels.errors.subscribe()
    }

    pub fn subscribe_engine_events(&self) -> broadcast::Receiver<EngineEvents> {
        self.channels.engine_events.subscribe()
    }
}
