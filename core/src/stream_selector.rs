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

use crate::error::SelectionError;
use crate::language::{languages_match, preference_rank};
use crate::stream::{Stream, StreamSelection, TrackSource};
use crate::track::{AudioTrack, VideoTrack};

/// Picks one video and one audio track out of the streams offered for an item.
///
/// Selection is deterministic: the same streams, preferences and constraint always
/// produce the same selection. Ties between equally ranked tracks go to the one listed
/// first by the repository.
#[derive(Debug, Clone, Copy)]
pub struct StreamSelector<'a> {
    preferred_languages: &'a [String],
    language_constraint: Option<&'a str>,
}

impl<'a> StreamSelector<'a> {
    pub fn new(preferred_languages: &'a [String], language_constraint: Option<&'a str>) -> Self {
        Self { preferred_languages, language_constraint }
    }

    pub fn select(
        &self,
        item: &str,
        streams: &[Stream],
    ) -> Result<StreamSelection, SelectionError> {
        let video = self
            .pick_video(streams)
            .map(|(stream, track)| TrackSource::new(stream, track.clone()));
        let audio = self
            .pick_audio(streams)
            .map(|(stream, track)| TrackSource::new(stream, track.clone()));
        StreamSelection::new(item, video, audio)
    }

    fn pick_video<'s>(&self, streams: &'s [Stream]) -> Option<(&'s Stream, &'s VideoTrack)> {
        streams
            .iter()
            .flat_map(|s| s.video_tracks().map(move |t| (s, t)))
            .min_by(|a, b| b.1.cmp_quality(a.1))
    }

    fn pick_audio<'s>(&self, streams: &'s [Stream]) -> Option<(&'s Stream, &'s AudioTrack)> {
        let all: Vec<_> = streams
            .iter()
            .flat_map(|s| s.audio_tracks().map(move |t| (s, t)))
            .collect();

        let candidates = match self.language_constraint {
            Some(constraint) => {
                let matching: Vec<_> = all
                    .iter()
                    .copied()
                    .filter(|(_, t)| {
                        t.language.as_deref().is_some_and(|l| languages_match(l, constraint))
                    })
                    .collect();
                if matching.is_empty() {
                    // Unsatisfiable constraint.
                    return highest_bitrate(&all);
                }
                matching
            }
            None => all,
        };

        let preferred = candidates
            .iter()
            .copied()
            .filter_map(|(s, t)| {
                let rank = preference_rank(t.language.as_deref()?, self.preferred_languages)?;
                Some((rank, s, t))
            })
            .min_by(|a, b| a.0.cmp(&b.0).then_with(|| by_bitrate(a.2, b.2)));

        match preferred {
            Some((_, stream, track)) => Some((stream, track)),
            None => highest_bitrate(&candidates),
        }
    }
}

fn by_bitrate(a: &AudioTrack, b: &AudioTrack) -> Ordering {
    b.cmp_quality(a)
}

fn highest_bitrate<'s>(
    candidates: &[(&'s Stream, &'s AudioTrack)],
) -> Option<(&'s Stream, &'s AudioTrack)> {
    candidates.iter().copied().min_by(|a, b| by_bitrate(a.1, b.1))
}
