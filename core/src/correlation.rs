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

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::stream::StreamSelection;

/// Key linking an engine queue entry to the selection that produced it.
///
/// Issued by [`CorrelationTable::allocate`] from a monotonic counter, so two live
/// entries never share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(u64);

impl CorrelationId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Maps queued correlation ids to their stream selections.
///
/// Owned by the orchestrator loop; nothing else mutates it.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    entries: HashMap<CorrelationId, StreamSelection>,
    last_issued: u64,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fresh id. The counter survives [`reset`](Self::reset).
    pub fn allocate(&mut self) -> CorrelationId {
        self.last_issued += 1;
        CorrelationId(self.last_issued)
    }

    pub fn insert(
        &mut self,
        id: CorrelationId,
        selection: StreamSelection,
    ) -> Option<StreamSelection> {
        self.entries.insert(id, selection)
    }

    pub fn get(&self, id: CorrelationId) -> Option<&StreamSelection> {
        self.entries.get(&id)
    }

    pub fn item(&self, id: CorrelationId) -> Option<&str> {
        self.entries.get(&id).map(StreamSelection::item)
    }

    pub fn remove(&mut self, id: CorrelationId) -> Option<StreamSelection> {
        self.entries.remove(&id)
    }

    /// Drops every entry whose id is not in `live`. Returns how many were dropped.
    pub fn retain_live(&mut self, live: &HashSet<CorrelationId>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|id, _| live.contains(id));
        before - self.entries.len()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{Stream, TrackSource};
    use crate::track::AudioTrack;

    fn selection(item: &str) -> StreamSelection {
        let track = AudioTrack::new(128_000, "m4a", None);
        let stream = Stream::progressive(format!("{item}.m4a"), vec![track.clone().into()]);
        StreamSelection::new(item, None, Some(TrackSource::new(&stream, track))).unwrap()
    }

    #[test]
    fn ids_are_unique_across_reset() {
        let mut table = CorrelationTable::new();
        let a = table.allocate();
        let b = table.allocate();
        table.insert(a, selection("a"));
        table.reset();
        let c = table.allocate();
        assert!(a < b && b < c);
        assert!(table.is_empty());
    }

    #[test]
    fn retain_live_prunes_orphans() {
        let mut table = CorrelationTable::new();
        let ids: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|item| {
                let id = table.allocate();
                table.insert(id, selection(item));
                id
            })
            .collect();
        let live: HashSet<_> = [ids[0], ids[2]].into_iter().collect();
        assert_eq!(table.retain_live(&live), 1);
        assert_eq!(table.item(ids[0]), Some("a"));
        assert_eq!(table.item(ids[1]), None);
        assert_eq!(table.get(ids[2]), Some(&selection("c")));
        assert_eq!(table.len(), 2);
    }
}
