use super::note::NoteState;
use super::state::{Resolution, Session};

impl Session {
    /// Ages every live note once. Per note the first matching rule wins:
    /// a held hold past its tail completes, a pending note past the good
    /// window is missed, a released hold past its grace period fails.
    pub fn age(&mut self, raw_now_ms: f64) -> Vec<Resolution> {
        let now = self.sync.apply(raw_now_ms);
        let good_ms = self.profile.windows.good_ms;
        let grace_ms = self.profile.hold_grace_ms;

        let mut resolutions = Vec::new();
        for id in self.notes.ids() {
            let Some(note) = self.notes.get(id) else {
                continue;
            };
            let resolution = match note.state {
                NoteState::Holding if note.expected_end_ms.is_some_and(|end| now >= end) => self.complete_hold(id),
                NoteState::Pending if now > note.expected_hit_ms + good_ms => self.resolve_miss(id),
                NoteState::HeadHit if now > note.expected_hit_ms + grace_ms => self.resolve_miss(id),
                _ => None,
            };
            resolutions.extend(resolution);
        }
        resolutions
    }
}
