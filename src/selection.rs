/*!
 * Selection model.
 *
 * Maps item identifiers to what is known about the item. Membership is the
 * only record of what an export will cover; both flows read and write it the
 * same way and nothing else keys state by item id.
 */

use std::collections::HashMap;

use crate::subtitle_processor::CaptionTrack;

/// One catalog item known to a flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    /// Stable external identifier
    pub id: String,
    /// Title as shown when the item was selected
    pub title: String,
    /// Discovered tracks; `None` until discovery has run
    pub tracks: Option<Vec<CaptionTrack>>,
}

impl ItemRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            tracks: None,
        }
    }

    /// Whether discovery ran and found at least one track
    pub fn has_tracks(&self) -> bool {
        self.tracks.as_ref().is_some_and(|tracks| !tracks.is_empty())
    }

    /// Track with `language_code`, if discovered
    pub fn track(&self, language_code: &str) -> Option<&CaptionTrack> {
        self.tracks
            .as_ref()?
            .iter()
            .find(|track| track.language_code == language_code)
    }
}

/// Selected items keyed by id
#[derive(Debug, Clone, Default)]
pub struct SelectionModel {
    items: HashMap<String, ItemRecord>,
}

impl SelectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for `id`
    pub fn set(&mut self, id: impl Into<String>, record: ItemRecord) {
        self.items.insert(id.into(), record);
    }

    /// Remove `id`, returning its record
    pub fn delete(&mut self, id: &str) -> Option<ItemRecord> {
        self.items.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&ItemRecord> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All records, in no particular order
    pub fn entries(&self) -> impl Iterator<Item = (&String, &ItemRecord)> {
        self.items.iter()
    }

    pub fn ids(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }

    /// Store discovery results for `id`; ignored when `id` is not selected
    pub fn set_tracks(&mut self, id: &str, tracks: Vec<CaptionTrack>) -> bool {
        match self.items.get_mut(id) {
            Some(record) => {
                record.tracks = Some(tracks);
                true
            }
            None => false,
        }
    }
}
