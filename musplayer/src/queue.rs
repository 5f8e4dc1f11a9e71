//! Ordered tracks plus the pointer to the current one

use musmodel::Track;

/// Play queue
///
/// `current_index` is `None` when the queue is empty or nothing is selected;
/// otherwise it always points inside the queue. Track ids are unique.
#[derive(Clone, Debug, Default)]
pub struct Queue {
    tracks: Vec<Track>,
    current_index: Option<usize>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a queue from `tracks`, dropping repeated ids
    pub fn from_tracks<I: IntoIterator<Item = Track>>(tracks: I) -> Self {
        let mut queue = Self::new();
        for track in tracks {
            queue.push(track);
        }
        queue
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub(crate) fn tracks_mut(&mut self) -> &mut [Track] {
        &mut self.tracks
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn current(&self) -> Option<&Track> {
        self.current_index.and_then(|i| self.tracks.get(i))
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    /// Appends `track` and returns its index; `None` if its id is already queued
    pub fn push(&mut self, track: Track) -> Option<usize> {
        if self.position(&track.id).is_some() {
            return None;
        }
        self.tracks.push(track);
        Some(self.tracks.len() - 1)
    }

    /// Makes `index` the current track; out of range is refused
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.tracks.len() {
            self.current_index = Some(index);
            true
        } else {
            false
        }
    }

    /// Removes the track at `index`
    ///
    /// Removing the current track deselects; removing an earlier one shifts
    /// the pointer so it keeps designating the same track.
    pub fn remove(&mut self, index: usize) -> Option<Track> {
        if index >= self.tracks.len() {
            return None;
        }
        let removed = self.tracks.remove(index);
        self.current_index = match self.current_index {
            Some(current) if current == index => None,
            Some(current) if current > index => Some(current - 1),
            other => other,
        };
        Some(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str) -> Track {
        Track::new(id, format!("Title {id}"), "Artist", 100, format!("http://m/{id}"))
    }

    fn ids(queue: &Queue) -> Vec<&str> {
        queue.tracks().iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_duplicate_ids_are_dropped() {
        let mut queue = Queue::from_tracks([track("a"), track("b"), track("a")]);
        assert_eq!(ids(&queue), vec!["a", "b"]);
        assert_eq!(queue.push(track("b")), None);
        assert_eq!(queue.push(track("c")), Some(2));
    }

    #[test]
    fn test_select_stays_in_bounds() {
        let mut queue = Queue::from_tracks([track("a"), track("b")]);
        assert!(queue.current().is_none());
        assert!(queue.select(1));
        assert!(!queue.select(2));
        assert_eq!(queue.current().map(|t| t.id.as_str()), Some("b"));
    }

    #[test]
    fn test_remove_keeps_pointer_on_same_track() {
        let mut queue = Queue::from_tracks([track("a"), track("b"), track("c")]);
        queue.select(2);

        assert_eq!(queue.remove(0).map(|t| t.id), Some("a".to_string()));
        assert_eq!(queue.current_index(), Some(1));
        assert_eq!(queue.current().map(|t| t.id.as_str()), Some("c"));

        queue.remove(1);
        assert_eq!(queue.current_index(), None);
        assert_eq!(queue.remove(5), None);
    }
}
