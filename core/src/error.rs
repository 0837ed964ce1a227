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

use thiserror::Error;

use crate::correlation::CorrelationId;

/// A collaborator error that can be handed to several receivers.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Converts a collaborator error, keeping its cause chain.
pub fn share(error: anyhow::Error) -> SharedError {
    let boxed: Box<dyn std::error::Error + Send + Sync + 'static> = error.into();
    Arc::from(boxed)
}

/// Category of a fault reported by the playback engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Connection lost, HTTP error or timeout while fetching media.
    Network,
    /// The source itself is malformed or unsupported.
    Source,
    Decoding,
    Renderer,
    Unknown,
}

/// An error reported by the engine during active playback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind:?} playback fault: {message}")]
pub struct PlaybackFault {
    pub kind: FaultKind,
    pub message: String,
}

impl PlaybackFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    /// The repository offered neither a video nor an audio track.
    #[error("no playable tracks for item {item}")]
    NoPlayableTracks { item: String },
}

#[derive(Error, Debug, Clone)]
pub enum SourceBuildError {
    /// The repository could not provide a transport configuration.
    #[error("transport configuration for {item} unavailable")]
    Transport {
        item: String,
        #[source]
        source: SharedError,
    },
    /// A selected track points at a stream without a locator.
    #[error("selected stream of {item} has no uri")]
    MissingUri { item: String },
}

/// Errors returned by player operations and published on the error channel.
#[derive(Error, Debug, Clone)]
pub enum PlayerError {
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error("failed to build media source")]
    SourceBuild(#[from] SourceBuildError),
    /// A repository request other than transport configuration failed.
    #[error("repository request for {item} failed")]
    Repository {
        item: String,
        #[source]
        source: SharedError,
    },
    #[error("playback engine rejected the operation")]
    Engine(#[source] SharedError),
    /// The recovery policy produced no response for a playback fault.
    #[error("playback fault happened but no response was given by the recovery policy")]
    FaultWithoutRecovery(#[source] PlaybackFault),
    #[error("{what} index {index} out of range (length {len})")]
    IndexOutOfRange { what: &'static str, index: usize, len: usize },
    /// A queue entry without a correlation table entry.
    #[error("no stream selection recorded for queue entry {0}")]
    MissingCorrelation(CorrelationId),
    #[error("nothing is currently playing")]
    NoCurrentEntry,
    #[error("player has been released")]
    Released,
}

