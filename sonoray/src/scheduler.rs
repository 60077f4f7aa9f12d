//! Quiescence tracking for acoustic events.

use crate::propagation::SoundId;
use std::collections::HashMap;

/// Tracks when each event last received a tap and reports the events that
/// have been quiet for long enough to bake.
#[derive(Debug, Clone)]
pub struct Debouncer {
    quiescence_ticks: u64,
    last_tap: HashMap<SoundId, u64>,
}

impl Debouncer {
    pub fn new(quiescence_ticks: u64) -> Self {
        Self {
            quiescence_ticks,
            last_tap: HashMap::new(),
        }
    }

    /// Notes that `sound` received a tap at `tick`.
    pub fn record(&mut self, sound: &SoundId, tick: u64) {
        let last = self.last_tap.entry(sound.clone()).or_insert(tick);
        *last = (*last).max(tick);
    }

    pub fn last_tap(&self, sound: &SoundId) -> Option<u64> {
        self.last_tap.get(sound).copied()
    }

    /// Removes and returns, in id order, every event whose last tap is at
    /// least `quiescence_ticks` before `tick`.
    pub fn take_quiescent(&mut self, tick: u64) -> Vec<SoundId> {
        let mut due: Vec<SoundId> = self
            .last_tap
            .iter()
            .filter(|&(_, &last)| tick.saturating_sub(last) >= self.quiescence_ticks)
            .map(|(sound, _)| sound.clone())
            .collect();
        due.sort();
        for sound in &due {
            self.last_tap.remove(sound);
        }
        due
    }

    /// Removes and returns every tracked event, in id order.
    pub fn take_all(&mut self) -> Vec<SoundId> {
        let mut all: Vec<SoundId> = self.last_tap.drain().map(|(sound, _)| sound).collect();
        all.sort();
        all
    }

    pub fn pending(&self) -> usize {
        self.last_tap.len()
    }
}
