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

use anyhow::{bail, Error};
use async_trait::async_trait;
use log::debug;
use player_core::repository::{Chapter, MediaRepository, RepositoryInfo, TransportConfig};
use player_core::stream::Stream;
use player_core::track::{AudioTrack, VideoTrack};

/// Repository that knows every item: each one gets the same set of made-up streams
/// and a chapter per minute of `clip_length`.
pub struct DemoRepository {
    clip_length: Duration,
}

impl DemoRepository {
    pub fn new(clip_length: Duration) -> Self {
        Self { clip_length }
    }
}

#[async_trait]
impl MediaRepository for DemoRepository {
    fn info(&self) -> RepositoryInfo {
        RepositoryInfo { pulls_data_from_network: false }
    }

    async fn get_streams(&self, item: &str) -> Result<Vec<Stream>, Error> {
        if item.trim().is_empty() {
            bail!("empty item name");
        }
        debug!("Resolving streams for {}", item);
        Ok(vec![
            Stream::progressive(
                format!("demo://{item}/1080p.mp4"),
                vec![VideoTrack::new(1920, 1080, 30, "mp4").into()],
            ),
            Stream::progressive(
                format!("demo://{item}/720p60.mp4"),
                vec![VideoTrack::new(1280, 720, 60, "mp4").into()],
            ),
            Stream::progressive(
                format!("demo://{item}/en.m4a"),
                vec![AudioTrack::new(128_000, "m4a", Some("en")).into()],
            ),
            Stream::progressive(
                format!("demo://{item}/de.webm"),
                vec![AudioTrack::new(160_000, "webm", Some("de")).into()],
            ),
            Stream::adaptive(
                format!("demo://{item}/master.m3u8"),
                vec![
                    VideoTrack::new(1920, 1080, 30, "hls").into(),
                    AudioTrack::new(128_000, "hls", Some("en")).into(),
                ],
            ),
        ])
    }

    async fn get_chapters(&self, item: &str) -> Result<Vec<Chapter>, Error> {
        let minutes = self.clip_length.as_secs() / 60;
        Ok((0..minutes.max(1))
            .map(|m| {
                let title = format!("{item}, part {}", m + 1);
                Chapter::new(Duration::from_secs(m * 60), Some(&title))
            })
            .collect())
    }

    async fn get_transport_config(&self, _item: &str) -> Result<TransportConfig, Error> {
        Ok(TransportConfig {
            user_agent: Some(format!("player-console/{}", env!("CARGO_PKG_VERSION"))),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use player_core::stream_selector::StreamSelector;

    #[tokio::test]
    async fn every_item_resolves_to_playable_streams() {
        let repository = DemoRepository::new(Duration::from_secs(180));
        let streams = repository.get_streams("intro").await.unwrap();
        let preferred = vec!["de".to_string()];
        let selection = StreamSelector::new(&preferred, None).select("intro", &streams).unwrap();

        assert_eq!(selection.video().unwrap().uri, "demo://intro/1080p.mp4");
        assert_eq!(selection.audio().unwrap().uri, "demo://intro/de.webm");
    }

    #[tokio::test]
    async fn chapters_follow_clip_length() {
        let repository = DemoRepository::new(Duration::from_secs(150));
        let chapters = repository.get_chapters("intro").await.unwrap();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[1].start, Duration::from_secs(60));
        assert_eq!(chapters[1].title.as_deref(), Some("intro, part 2"));
    }

    #[tokio::test]
    async fn rejects_blank_items() {
        let repository = DemoRepository::new(Duration::from_secs(60));
        assert!(repository.get_streams("  ").await.is_err());
    }
}
