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

use log::debug;

use crate::correlation::CorrelationId;
use crate::error::{share, SourceBuildError};
use crate::repository::{MediaRepository, TransportConfig};
use crate::stream::{Delivery, StreamSelection};
use crate::track::StreamTrack;

/// One addressable part of a media source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePart {
    pub uri: String,
    pub delivery: Delivery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLayout {
    /// One stream carries every selected track.
    Single(SourcePart),
    /// Video and audio come from separate streams that the engine plays in lockstep.
    Merged { video: SourcePart, audio: SourcePart },
}

/// An engine-playable source, tagged with the correlation id the engine reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSource {
    pub correlation_id: CorrelationId,
    pub item: String,
    pub layout: SourceLayout,
    pub transport: TransportConfig,
    /// Tracks selected for this source, video first.
    pub tracks: Vec<StreamTrack>,
}

/// Turns stream selections into media sources.
#[derive(Clone)]
pub struct SourceBuilder {
    repository: Arc<dyn MediaRepository>,
}

impl SourceBuilder {
    pub fn new(repository: Arc<dyn MediaRepository>) -> Self {
        Self { repository }
    }

    pub async fn build(
        &self,
        selection: &StreamSelection,
        correlation_id: CorrelationId,
    ) -> Result<MediaSource, SourceBuildError> {
        let item = selection.item();
        let video = selection
            .video()
            .map(|v| SourcePart { uri: v.uri.clone(), delivery: v.delivery });
        let audio = selection
            .audio()
            .map(|a| SourcePart { uri: a.uri.clone(), delivery: a.delivery });

        if video.iter().chain(audio.iter()).any(|p| p.uri.is_empty()) {
            return Err(SourceBuildError::MissingUri { item: item.to_owned() });
        }

        let layout = match (video, audio) {
            (Some(video), Some(audio)) if video == audio => SourceLayout::Single(video),
            (Some(video), Some(audio)) => SourceLayout::Merged { video, audio },
            (Some(part), None) | (None, Some(part)) => SourceLayout::Single(part),
            (None, None) => return Err(SourceBuildError::MissingUri { item: item.to_owned() }),
        };

        let transport = self
            .repository
            .get_transport_config(item)
            .await
            .map_err(|e| SourceBuildError::Transport { item: item.to_owned(), source: share(e) })?;

        debug!("Built source {} for {}: {:?}", correlation_id, item, layout);
        Ok(MediaSource {
            correlation_id,
            item: item.to_owned(),
            layout,
            transport,
            tracks: selection.tracks(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::CorrelationTable;
    use crate::stream::{Stream, TrackSource};
    use crate::testing::FakeRepository;
    use crate::track::{AudioTrack, VideoTrack};

    fn muxed_selection(video_uri: &str, audio_uri: &str) -> StreamSelection {
        let video = VideoTrack::new(1920, 1080, 30, "mp4");
        let audio = AudioTrack::new(128_000, "m4a", Some("en"));
        let video_stream = Stream::progressive(video_uri, vec![video.clone().into()]);
        let audio_stream = Stream::progressive(audio_uri, vec![audio.clone().into()]);
        StreamSelection::new(
            "clip",
            Some(TrackSource::new(&video_stream, video)),
            Some(TrackSource::new(&audio_stream, audio)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn same_stream_builds_a_single_source() {
        let repository = FakeRepository::new();
        let builder = SourceBuilder::new(repository.clone());
        let id = CorrelationTable::new().allocate();
        let source = builder.build(&muxed_selection("clip.mp4", "clip.mp4"), id).await.unwrap();
        assert_eq!(source.correlation_id, id);
        assert_eq!(
            source.layout,
            SourceLayout::Single(SourcePart {
                uri: "clip.mp4".into(),
                delivery: Delivery::Progressive,
            })
        );
        assert_eq!(source.tracks.len(), 2);
    }

    #[tokio::test]
    async fn separate_streams_are_merged() {
        let builder = SourceBuilder::new(FakeRepository::new());
        let id = CorrelationTable::new().allocate();
        let source = builder.build(&muxed_selection("v.mp4", "a.m4a"), id).await.unwrap();
        match source.layout {
            SourceLayout::Merged { video, audio } => {
                assert_eq!(video.uri, "v.mp4");
                assert_eq!(audio.uri, "a.m4a");
            }
            other => panic!("unexpected layout {:?}", other),
        }
    }

    #[tokio::test]
    async fn transport_failure_is_wrapped() {
        let repository = FakeRepository::new();
        repository.fail_item("clip");
        let builder = SourceBuilder::new(repository.clone());
        let id = CorrelationTable::new().allocate();
        let err = builder.build(&muxed_selection("v.mp4", "a.m4a"), id).await.unwrap_err();
        assert!(matches!(err, SourceBuildError::Transport { ref item, .. } if item == "clip"));
    }
}
