use super::ShakeState;

/// Watches published shake states for the end of an episode.
///
/// The detector zeroes intensity and duration on the same sample that ends a
/// shake, so the values that matter are the ones from the last active state.
#[derive(Debug, Default, Clone)]
pub struct ShakeEdgeTracker {
    last_active: Option<ShakeState>,
}

impl ShakeEdgeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last active state when `state` is an active to inactive
    /// transition, `None` otherwise.
    pub fn observe(&mut self, state: &ShakeState) -> Option<ShakeState> {
        if state.is_active {
            self.last_active = Some(*state);
            None
        } else {
            self.last_active.take()
        }
    }

    pub fn in_episode(&self) -> bool {
        self.last_active.is_some()
    }

    pub fn clear(&mut self) {
        self.last_active = None;
    }
}
