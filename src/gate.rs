use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::error::SessionError;
use crate::model::InterviewSession;

/// Entry check run on load, before any start screen is shown.
pub fn check_entry(session: &InterviewSession, now: DateTime<Utc>) -> Result<(), SessionError> {
    if session.status.is_terminal() {
        warn!("session {} is {}; entry refused", session.id, session.status);
        return Err(SessionError::TerminalState(session.id.to_string()));
    }
    if session.is_past_deadline(now) {
        warn!("session {} passed its deadline; entry refused", session.id);
        return Err(SessionError::TerminalState(session.id.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveDecision {
    Leave,
    ConfirmRequired,
}

/// Asks for confirmation before quitting an in-progress session.
#[derive(Debug, Default)]
pub struct LeaveGuard {
    armed: bool,
    awaiting_confirmation: bool,
}

impl LeaveGuard {
    pub fn arm(&mut self) {
        if !self.armed {
            info!("leave guard armed");
        }
        self.armed = true;
        self.awaiting_confirmation = false;
    }

    pub fn disarm(&mut self) {
        if self.armed {
            info!("leave guard disarmed");
        }
        self.armed = false;
        self.awaiting_confirmation = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn is_awaiting_confirmation(&self) -> bool {
        self.awaiting_confirmation
    }

    pub fn request_leave(&mut self) -> LeaveDecision {
        if self.armed {
            self.awaiting_confirmation = true;
            LeaveDecision::ConfirmRequired
        } else {
            LeaveDecision::Leave
        }
    }

    pub fn confirm_leave(&mut self) -> LeaveDecision {
        if !self.armed || self.awaiting_confirmation {
            warn!("leaving with guard armed={}", self.armed);
            self.disarm();
            LeaveDecision::Leave
        } else {
            self.request_leave()
        }
    }

    pub fn cancel_leave(&mut self) {
        self.awaiting_confirmation = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Question, QuestionId, SessionId, SessionStatus};
    use std::num::NonZeroU32;

    fn session(status: SessionStatus, deadline: Option<&str>) -> InterviewSession {
        InterviewSession {
            id: SessionId::from("s"),
            status,
            title: "t".into(),
            description: None,
            deadline: deadline.map(|d| d.parse().unwrap()),
            questions: vec![Question {
                id: QuestionId("q".into()),
                text: "?".into(),
                max_score: 1.0,
                time_limit: NonZeroU32::new(5).unwrap(),
                ordinal: 0,
            }],
        }
    }

    fn now() -> DateTime<Utc> {
        "2025-06-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn open_session_may_enter() {
        assert!(check_entry(&session(SessionStatus::NotStarted, None), now()).is_ok());
        assert!(check_entry(&session(SessionStatus::InProgress, None), now()).is_ok());
    }

    #[test]
    fn terminal_sessions_are_refused() {
        for status in [SessionStatus::Submitted, SessionStatus::TimedOut] {
            assert!(matches!(
                check_entry(&session(status, None), now()),
                Err(SessionError::TerminalState(_))
            ));
        }
    }

    #[test]
    fn expired_deadline_is_refused() {
        let s = session(SessionStatus::NotStarted, Some("2025-05-31T00:00:00Z"));
        assert!(check_entry(&s, now()).is_err());
        let s = session(SessionStatus::NotStarted, Some("2025-06-02T00:00:00Z"));
        assert!(check_entry(&s, now()).is_ok());
    }

    #[test]
    fn unarmed_guard_lets_go() {
        let mut guard = LeaveGuard::default();
        assert_eq!(guard.request_leave(), LeaveDecision::Leave);
    }

    #[test]
    fn armed_guard_needs_confirmation() {
        let mut guard = LeaveGuard::default();
        guard.arm();
        assert_eq!(guard.request_leave(), LeaveDecision::ConfirmRequired);
        assert!(guard.is_awaiting_confirmation());
        guard.cancel_leave();
        assert!(!guard.is_awaiting_confirmation());

        // Confirming without a pending request only asks
        assert_eq!(guard.confirm_leave(), LeaveDecision::ConfirmRequired);
        assert_eq!(guard.confirm_leave(), LeaveDecision::Leave);
        assert!(!guard.is_armed());
    }

    #[test]
    fn disarm_clears_pending_prompt() {
        let mut guard = LeaveGuard::default();
        guard.arm();
        guard.request_leave();
        guard.disarm();
        assert!(!guard.is_awaiting_confirmation());
        assert_eq!(guard.request_leave(), LeaveDecision::Leave);
    }
}
