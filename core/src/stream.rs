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

use std::collections::BTreeSet;

use crate::error::SelectionError;
use crate::track::{AudioTrack, StreamTrack, VideoTrack};

/// How a stream is delivered to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Delivery {
    /// A single file fetched as a whole.
    Progressive,
    /// A manifest (DASH/HLS-like) whose renditions the engine picks on its own.
    Adaptive,
}

/// One addressable stream as returned by the repository, with the tracks it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    pub uri: String,
    pub delivery: Delivery,
    pub tracks: Vec<StreamTrack>,
}

impl Stream {
    pub fn progressive(uri: impl Into<String>, tracks: Vec<StreamTrack>) -> Self {
        Self { uri: uri.into(), delivery: Delivery::Progressive, tracks }
    }

    pub fn adaptive(uri: impl Into<String>, tracks: Vec<StreamTrack>) -> Self {
        Self { uri: uri.into(), delivery: Delivery::Adaptive, tracks }
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &VideoTrack> {
        self.tracks.iter().filter_map(StreamTrack::as_video)
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &AudioTrack> {
        self.tracks.iter().filter_map(StreamTrack::as_audio)
    }
}

/// A chosen track together with the stream that carries it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSource<T> {
    pub uri: String,
    pub delivery: Delivery,
    pub track: T,
}

impl<T> TrackSource<T> {
    pub fn new(stream: &Stream, track: T) -> Self {
        Self { uri: stream.uri.clone(), delivery: stream.delivery, track }
    }
}

/// The concrete choice of tracks for one item.
///
/// Holds at most one video and at most one audio track, and never neither.
/// A selection is never modified; retargeting produces a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSelection {
    item: String,
    video: Option<TrackSource<VideoTrack>>,
    audio: Option<TrackSource<AudioTrack>>,
}

impl StreamSelection {
    pub fn new(
        item: impl Into<String>,
        video: Option<TrackSource<VideoTrack>>,
        audio: Option<TrackSource<AudioTrack>>,
    ) -> Result<Self, SelectionError> {
        let item = item.into();
        if video.is_none() && audio.is_none() {
            return Err(SelectionError::NoPlayableTracks { item });
        }
        Ok(Self { item, video, audio })
    }

    pub fn item(&self) -> &str {
        &self.item
    }

    pub fn video(&self) -> Option<&TrackSource<VideoTrack>> {
        self.video.as_ref()
    }

    pub fn audio(&self) -> Option<&TrackSource<AudioTrack>> {
        self.audio.as_ref()
    }

    /// The same tracks attributed to another item.
    pub fn with_item(&self, item: impl Into<String>) -> Self {
        Self { item: item.into(), video: self.video.clone(), audio: self.audio.clone() }
    }

    /// Chosen tracks, video first.
    pub fn tracks(&self) -> Vec<StreamTrack> {
        let video = self.video.iter().map(|v| StreamTrack::Video(v.track.clone()));
        let audio = self.audio.iter().map(|a| StreamTrack::Audio(a.track.clone()));
        video.chain(audio).collect()
    }
}

/// Tracks the user may pick from: those of non-adaptive streams, without duplicates,
/// best first.
pub fn available_tracks(streams: &[Stream]) -> Vec<StreamTrack> {
    streams
        .iter()
        .filter(|s| s.delivery != Delivery::Adaptive)
        .flat_map(|s| s.tracks.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(w: u32, h: u32) -> StreamTrack {
        VideoTrack::new(w, h, 30, "mp4").into()
    }
    fn audio(bitrate: u32) -> StreamTrack {
        AudioTrack::new(bitrate, "m4a", Some("en")).into()
    }

    #[test]
    fn selection_needs_at_least_one_track() {
        let err = StreamSelection::new("item", None, None).unwrap_err();
        assert_eq!(err, SelectionError::NoPlayableTracks { item: "item".into() });
    }

    #[test]
    fn available_tracks_skip_adaptive_and_duplicates() {
        let streams = vec![
            Stream::progressive("a.mp4", vec![video(1280, 720), audio(128_000)]),
            Stream::progressive("b.m4a", vec![audio(128_000), audio(64_000)]),
            Stream::adaptive("manifest.mpd", vec![video(3840, 2160)]),
        ];
        assert_eq!(
            available_tracks(&streams),
            vec![video(1280, 720), audio(128_000), audio(64_000)]
        );
    }

    #[test]
    fn retargeting_keeps_tracks() {
        let stream = Stream::progressive("a.m4a", vec![audio(96_000)]);
        let chosen = TrackSource::new(&stream, AudioTrack::new(96_000, "m4a", Some("en")));
        let original = StreamSelection::new("first", None, Some(chosen)).unwrap();
        let moved = original.with_item("second");
        assert_eq!(moved.item(), "second");
        assert_eq!(original.item(), "first");
        assert_eq!(moved.tracks(), original.tracks());
    }
}
