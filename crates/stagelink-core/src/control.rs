//! Control arbitration state machine
//!
//! A controller requests the single-writer grant exactly once; the relay
//! answers with grant or deny. Publishing camera or settings updates is
//! only legal in the `Granted` state, and callers gate on `has_control`
//! rather than tracking their own booleans.

/// Arbitration state of a controller client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlState {
    /// No request has been sent yet
    #[default]
    Unrequested,
    /// Request sent, awaiting the relay's verdict
    Pending,
    /// This client is the single writer
    Granted,
    /// Another controller is active; not retried automatically
    Denied,
}

impl ControlState {
    /// Transition into `Pending`. Returns true if a request event should
    /// be emitted; repeated calls are no-ops so the request stays one-shot.
    pub fn request(&mut self) -> bool {
        if *self == ControlState::Unrequested {
            *self = ControlState::Pending;
            true
        } else {
            false
        }
    }

    /// Relay granted control
    pub fn grant(&mut self) {
        *self = ControlState::Granted;
    }

    /// Relay denied control
    pub fn deny(&mut self) {
        *self = ControlState::Denied;
    }

    /// Transport loss: a reconnected controller must request again
    pub fn reset(&mut self) {
        *self = ControlState::Unrequested;
    }

    /// Only `Granted` may publish camera or settings updates
    pub fn has_control(&self) -> bool {
        *self == ControlState::Granted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_one_shot() {
        let mut state = ControlState::default();
        assert!(state.request());
        assert_eq!(state, ControlState::Pending);
        assert!(!state.request());

        state.grant();
        assert!(!state.request());

        state.deny();
        assert!(!state.request());
        assert_eq!(state, ControlState::Denied);
    }

    #[test]
    fn test_only_granted_has_control() {
        let mut state = ControlState::default();
        assert!(!state.has_control());
        state.request();
        assert!(!state.has_control());
        state.grant();
        assert!(state.has_control());
        state.deny();
        assert!(!state.has_control());
    }

    #[test]
    fn test_reset_allows_new_request() {
        let mut state = ControlState::default();
        state.request();
        state.grant();
        state.reset();
        assert_eq!(state, ControlState::Unrequested);
        assert!(state.request());
    }
}
