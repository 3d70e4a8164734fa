use bevy::prelude::*;

use crate::components::SessionId;

#[derive(Clone, Debug)]
struct Scheduled<T> {
    due: f32,
    seq: u64,
    session: SessionId,
    step: T,
}

/// Ordered list of delayed steps owned by the running session.
///
/// Steps fire in due order (ties in scheduling order). `clear` drops every
/// pending step at once, so nothing scheduled for a stopped session can run.
#[derive(Resource)]
pub struct StepScheduler<T: Send + Sync + 'static> {
    now: f32,
    next_seq: u64,
    pending: Vec<Scheduled<T>>,
}

impl<T: Send + Sync + 'static> Default for StepScheduler<T> {
    fn default() -> Self {
        Self {
            now: 0.0,
            next_seq: 0,
            pending: Vec::new(),
        }
    }
}

impl<T: Send + Sync + 'static> StepScheduler<T> {
    pub fn schedule(&mut self, session: SessionId, delay_secs: f32, step: T) {
        self.pending.push(Scheduled {
            due: self.now + delay_secs.max(0.0),
            seq: self.next_seq,
            session,
            step,
        });
        self.next_seq += 1;
    }

    /// Advances the clock and removes every step that became due.
    pub fn advance(&mut self, dt: f32) -> Vec<(SessionId, T)> {
        self.now += dt.max(0.0);
        let now = self.now;
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|s| s.due <= now);
        self.pending = pending;
        due.sort_by(|a, b| a.due.total_cmp(&b.due).then(a.seq.cmp(&b.seq)));
        due.into_iter().map(|s| (s.session, s.step)).collect()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
