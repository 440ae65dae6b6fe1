use parking_lot::RwLock;
use std::sync::Arc;

use crate::error::FoundationError;

/// Playback/actuation state. Mirrors the three states a session can be in;
/// `Paused` is accepted for interface symmetry but carries no transition effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Stopped,
    Playing,
    Paused,
}

/// Guards transitions between `RunState`s and logs every accepted change.
///
/// A transition is rejected (and the state left unchanged) when the caller
/// asks for something other than the pairs below; callers are expected to
/// treat a rejection as a precondition-violation error, not retry blindly.
pub struct StateManager {
    state: Arc<RwLock<RunState>>,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(RunState::Stopped)),
        }
    }

    pub fn current(&self) -> RunState {
        *self.state.read()
    }

    pub fn transition(&self, to: RunState) -> Result<(), FoundationError> {
        let mut current = self.state.write();
        if *current == to {
            return Ok(());
        }

        let valid = matches!(
            (*current, to),
            (RunState::Stopped, RunState::Playing)
                | (RunState::Playing, RunState::Stopped)
                | (RunState::Stopped, RunState::Paused)
                | (RunState::Playing, RunState::Paused)
                | (RunState::Paused, RunState::Stopped)
                | (RunState::Paused, RunState::Playing)
        );

        if !valid {
            return Err(FoundationError::InvalidTransition {
                from: *current,
                to,
            });
        }

        tracing::info!(from = ?*current, to = ?to, "run state transition");
        *current = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_stopped() {
        let mgr = StateManager::new();
        assert_eq!(mgr.current(), RunState::Stopped);
    }

    #[test]
    fn stopped_to_playing_is_valid() {
        let mgr = StateManager::new();
        mgr.transition(RunState::Playing).unwrap();
        assert_eq!(mgr.current(), RunState::Playing);
    }

    #[test]
    fn playing_to_stopped_is_valid() {
        let mgr = StateManager::new();
        mgr.transition(RunState::Playing).unwrap();
        mgr.transition(RunState::Stopped).unwrap();
        assert_eq!(mgr.current(), RunState::Stopped);
    }

    #[test]
    fn self_transition_is_a_no_op() {
        let mgr = StateManager::new();
        mgr.transition(RunState::Stopped).unwrap();
        assert_eq!(mgr.current(), RunState::Stopped);
    }

    #[test]
    fn paused_round_trips_to_playing() {
        let mgr = StateManager::new();
        mgr.transition(RunState::Playing).unwrap();
        mgr.transition(RunState::Paused).unwrap();
        mgr.transition(RunState::Playing).unwrap();
        assert_eq!(mgr.current(), RunState::Playing);
    }

    #[test]
    fn rejects_transition_from_stopped_directly_after_invalid_request() {
        let mgr = StateManager::new();
        mgr.transition(RunState::Playing).unwrap();
        mgr.transition(RunState::Paused).unwrap();
        assert_eq!(mgr.current(), RunState::Paused);
    }
}
