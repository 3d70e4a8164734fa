use std::collections::VecDeque;

use bevy::prelude::*;
use serde::Serialize;

use crate::components::SessionId;

const EVENT_CAPACITY: usize = 500;
const OVERFLOW_LOG_INTERVAL: u64 = 60;

/// A session or gameplay milestone, kept for the `/events` endpoint.
#[derive(Serialize, Clone, Debug)]
pub struct PreviewEvent {
    /// Monotonic across the whole run; clients poll with `?since=<seq>`.
    pub seq: u64,
    pub name: String,
    pub data: serde_json::Value,
    pub frame: u64,
    pub session: Option<SessionId>,
}

/// Bounded history of preview events. Oldest entries go first.
#[derive(Resource, Default)]
pub struct GameEventBus {
    recent: VecDeque<PreviewEvent>,
    next_seq: u64,
    frame: u64,
    dropped: u64,
    last_overflow_log: u64,
}

impl GameEventBus {
    pub fn emit(
        &mut self,
        name: impl Into<String>,
        data: serde_json::Value,
        session: Option<SessionId>,
    ) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.recent.push_back(PreviewEvent {
            seq,
            name: name.into(),
            data,
            frame: self.frame,
            session,
        });
        let overflow = self.recent.len().saturating_sub(EVENT_CAPACITY);
        if overflow == 0 {
            return;
        }
        self.recent.drain(..overflow);
        self.dropped += overflow as u64;
        if self.frame.saturating_sub(self.last_overflow_log) >= OVERFLOW_LOG_INTERVAL {
            self.last_overflow_log = self.frame;
            warn!("[Preview events] history full, {} events discarded so far", self.dropped);
        }
    }

    /// Events with a sequence number greater than `after`, or all of them.
    pub fn since(&self, after: Option<u64>) -> Vec<PreviewEvent> {
        self.recent
            .iter()
            .filter(|e| after.map_or(true, |seq| e.seq > seq))
            .cloned()
            .collect()
    }

    #[cfg(test)]
    pub fn count(&self, name: &str) -> usize {
        self.recent.iter().filter(|e| e.name == name).count()
    }

    #[cfg(test)]
    pub fn last(&self) -> Option<&PreviewEvent> {
        self.recent.back()
    }
}

pub struct GameEventsPlugin;

impl Plugin for GameEventsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<GameEventBus>()
            .add_systems(First, advance_frame);
    }
}

fn advance_frame(mut bus: ResMut<GameEventBus>) {
    bus.frame += 1;
}
