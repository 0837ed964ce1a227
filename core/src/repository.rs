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
use async_trait::async_trait;

use crate::stream::Stream;

/// A chapter mark within an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub start: Duration,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
}

impl Chapter {
    pub fn new(start: Duration, title: Option<&str>) -> Self {
        Self { start, title: title.map(str::to_owned), thumbnail: None }
    }
}

/// Data-source settings the engine applies when fetching a source. Opaque to the core.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportConfig {
    pub user_agent: Option<String>,
    pub headers: Vec<(String, String)>,
    pub connect_timeout: Option<Duration>,
    pub allow_cross_protocol_redirects: bool,
}

/// Static facts about a repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepositoryInfo {
    /// True when content is fetched over the network; used when setting up the engine.
    pub pulls_data_from_network: bool,
}

/// Resolves items into streams, chapters and transport settings.
#[async_trait]
pub trait MediaRepository: Send + Sync {
    fn info(&self) -> RepositoryInfo;

    async fn get_streams(&self, item: &str) -> Result<Vec<Stream>, Error>;

    async fn get_chapters(&self, item: &str) -> Result<Vec<Chapter>, Error>;

    async fn get_transport_config(&self, item: &str) -> Result<TransportConfig, Error>;
}
