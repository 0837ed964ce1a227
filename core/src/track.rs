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

use std::cmp::Ordering;
use std::fmt;

/// A single video rendition offered by a stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoTrack {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    /// Container or codec format, e.g. "mp4" or "webm".
    pub format: String,
}

impl VideoTrack {
    pub fn new(width: u32, height: u32, frame_rate: u32, format: impl Into<String>) -> Self {
        Self { width, height, frame_rate, format: format.into() }
    }

    pub fn pixel_area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// "720p", or "1080p60" when the frame rate exceeds 30.
    pub fn short_identifier(&self) -> String {
        let lines = self.width.min(self.height);
        if self.frame_rate > 30 {
            format!("{}p{}", lines, self.frame_rate)
        } else {
            format!("{}p", lines)
        }
    }

    pub fn long_identifier(&self) -> String {
        format!("{} {}", self.format, self.short_identifier())
    }

    /// Compares by pixel area, then frame rate. `Greater` means better quality.
    pub fn cmp_quality(&self, other: &Self) -> Ordering {
        self.pixel_area()
            .cmp(&other.pixel_area())
            .then(self.frame_rate.cmp(&other.frame_rate))
    }
}

/// A single audio rendition offered by a stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AudioTrack {
    /// Bits per second.
    pub bitrate: u32,
    pub format: String,
    /// BCP-47 language tag, if the repository knows it.
    pub language: Option<String>,
}

impl AudioTrack {
    pub fn new(bitrate: u32, format: impl Into<String>, language: Option<&str>) -> Self {
        Self { bitrate, format: format.into(), language: language.map(str::to_owned) }
    }

    pub fn short_identifier(&self) -> String {
        if self.bitrate < 1000 {
            format!("{}bps", self.bitrate)
        } else {
            format!("{}kbps", self.bitrate / 1000)
        }
    }

    pub fn long_identifier(&self) -> String {
        format!("{} {}", self.format, self.short_identifier())
    }

    pub fn cmp_quality(&self, other: &Self) -> Ordering {
        self.bitrate.cmp(&other.bitrate)
    }
}

/// A track of either kind.
///
/// The `Ord` implementation sorts best first: every video track precedes every audio
/// track, and within a kind the higher quality precedes the lower one. Tracks of equal
/// quality fall back to format and language so the order stays total and consistent
/// with `Eq`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StreamTrack {
    Video(VideoTrack),
    Audio(AudioTrack),
}

impl StreamTrack {
    pub fn short_identifier(&self) -> String {
        match self {
            StreamTrack::Video(v) => v.short_identifier(),
            StreamTrack::Audio(a) => a.short_identifier(),
        }
    }

    pub fn long_identifier(&self) -> String {
        match self {
            StreamTrack::Video(v) => v.long_identifier(),
            StreamTrack::Audio(a) => a.long_identifier(),
        }
    }

    pub fn as_video(&self) -> Option<&VideoTrack> {
        match self {
            StreamTrack::Video(v) => Some(v),
            StreamTrack::Audio(_) => None,
        }
    }

    pub fn as_audio(&self) -> Option<&AudioTrack> {
        match self {
            StreamTrack::Audio(a) => Some(a),
            StreamTrack::Video(_) => None,
        }
    }
}

impl Ord for StreamTrack {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (StreamTrack::Video(_), StreamTrack::Audio(_)) => Ordering::Less,
            (StreamTrack::Audio(_), StreamTrack::Video(_)) => Ordering::Greater,
            (StreamTrack::Video(a), StreamTrack::Video(b)) => b
                .cmp_quality(a)
                .then_with(|| a.format.cmp(&b.format))
                .then_with(|| a.width.cmp(&b.width)),
            (StreamTrack::Audio(a), StreamTrack::Audio(b)) => b
                .cmp_quality(a)
                .then_with(|| a.format.cmp(&b.format))
                .then_with(|| a.language.cmp(&b.language)),
        }
    }
}

impl PartialOrd for StreamTrack {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for StreamTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.long_identifier())
    }
}

impl From<VideoTrack> for StreamTrack {
    fn from(v: VideoTrack) -> Self {
        StreamTrack::Video(v)
    }
}

impl From<AudioTrack> for StreamTrack {
    fn from(a: AudioTrack) -> Self {
        StreamTrack::Audio(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_identifiers_use_the_shorter_side() {
        let landscape = VideoTrack::new(1920, 1080, 30, "mp4");
        let portrait = VideoTrack::new(720, 1280, 60, "webm");
        assert_eq!(landscape.short_identifier(), "1080p");
        assert_eq!(landscape.long_identifier(), "mp4 1080p");
        assert_eq!(portrait.short_identifier(), "720p60");
        assert_eq!(portrait.long_identifier(), "webm 720p60");
    }

    #[test]
    fn audio_identifiers_switch_to_kbps() {
        assert_eq!(AudioTrack::new(999, "opus", None).short_identifier(), "999bps");
        assert_eq!(AudioTrack::new(128_000, "m4a", Some("en")).long_identifier(), "m4a 128kbps");
    }

    #[test]
    fn larger_area_beats_higher_frame_rate() {
        let full_hd = StreamTrack::from(VideoTrack::new(1920, 1080, 30, "mp4"));
        let hd60 = StreamTrack::from(VideoTrack::new(1280, 720, 60, "mp4"));
        let mut tracks = vec![hd60.clone(), full_hd.clone()];
        tracks.sort();
        assert_eq!(tracks, vec![full_hd, hd60]);
    }

    #[test]
    fn frame_rate_breaks_area_ties() {
        let a = StreamTrack::from(VideoTrack::new(1280, 720, 30, "mp4"));
        let b = StreamTrack::from(VideoTrack::new(1280, 720, 60, "mp4"));
        assert!(b < a);
    }

    #[test]
    fn video_sorts_before_audio_and_audio_by_bitrate() {
        let low_video = StreamTrack::from(VideoTrack::new(256, 144, 15, "mp4"));
        let hi_audio = StreamTrack::from(AudioTrack::new(320_000, "mp3", None));
        let lo_audio = StreamTrack::from(AudioTrack::new(64_000, "mp3", None));
        let mut tracks = vec![lo_audio.clone(), hi_audio.clone(), low_video.clone()];
        tracks.sort();
        assert_eq!(tracks, vec![low_video, hi_audio, lo_audio]);
    }
}
