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

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::engine::QueueEntry;
use crate::error::PlaybackFault;
use crate::repository::MediaRepository;
use crate::stream::StreamSelection;

/// Everything a recovery policy gets to know about a fault.
#[derive(Clone)]
pub struct RecoveryContext {
    /// Item of the faulted slot, if the engine had a current entry.
    pub item: Option<String>,
    pub entry: Option<QueueEntry>,
    pub fault: PlaybackFault,
    pub repository: Arc<dyn MediaRepository>,
}

impl fmt::Debug for RecoveryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryContext")
            .field("item", &self.item)
            .field("entry", &self.entry)
            .field("fault", &self.fault)
            .finish_non_exhaustive()
    }
}

/// How to proceed after a playback fault.
pub enum RecoveryResponse {
    /// The fault is surfaced on the error channel and playback stays paused.
    NoResponse,
    /// Runs a caller-supplied action; nothing else happens.
    RunAction(BoxFuture<'static, ()>),
    /// Same item, other tracks. Playback resumes at the fault position.
    ReplaceStreamSelection(StreamSelection),
    /// Other item, tracks chosen automatically. Playback resumes at the fault position.
    ReplaceItem(String),
}

impl fmt::Debug for RecoveryResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryResponse::NoResponse => f.write_str("NoResponse"),
            RecoveryResponse::RunAction(_) => f.write_str("RunAction(..)"),
            RecoveryResponse::ReplaceStreamSelection(s) => {
                f.debug_tuple("ReplaceStreamSelection").field(s).finish()
            }
            RecoveryResponse::ReplaceItem(item) => {
                f.debug_tuple("ReplaceItem").field(item).finish()
            }
        }
    }
}

/// Decides how a playback fault is handled. Called once per fault, and never while
/// another recovery is still in progress.
#[async_trait]
pub trait RecoveryPolicy: Send + Sync {
    async fn rescue(&self, context: RecoveryContext) -> RecoveryResponse;
}

/// Answers every fault with [`RecoveryResponse::NoResponse`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRecoveryPolicy;

#[async_trait]
impl RecoveryPolicy for NoRecoveryPolicy {
    async fn rescue(&self, _context: RecoveryContext) -> RecoveryResponse {
        RecoveryResponse::NoResponse
    }
}

/// Adapts an async closure into a [`RecoveryPolicy`].
pub struct FnRecoveryPolicy<F>(pub F);

#[async_trait]
impl<F, Fut> RecoveryPolicy for FnRecoveryPolicy<F>
where
    F: Fn(RecoveryContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RecoveryResponse> + Send + 'static,
{
    async fn rescue(&self, context: RecoveryContext) -> RecoveryResponse {
        (self.0)(context).await
    }
}
