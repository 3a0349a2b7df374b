use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;

use quest_core::{SessionId, SessionStatus};

/// One bounded run of the step loop. Owned and mutated only by the controller.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub target: String,
    pub started_at: DateTime<Utc>,
    started: Instant,
    deadline: Instant,
    step_count: u32,
    step_limit: u32,
    status: SessionStatus,
}

impl Session {
    pub fn new(id: SessionId, target: impl Into<String>, budget: Duration, step_limit: u32) -> Self {
        let started = Instant::now();
        Self {
            id,
            target: target.into(),
            started_at: Utc::now(),
            started,
            deadline: started + budget,
            step_count: 0,
            step_limit,
            status: SessionStatus::Running,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    pub fn step_limit(&self) -> u32 {
        self.step_limit
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_past_deadline(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn steps_exhausted(&self) -> bool {
        self.step_count >= self.step_limit
    }

    /// Count a new step and return its 1-based number.
    pub fn begin_step(&mut self) -> u32 {
        self.step_count += 1;
        self.step_count
    }

    /// Move to a terminal status. Returns false, leaving the status untouched, when the
    /// session is already terminal or `status` is `Running`.
    pub fn finish(&mut self, status: SessionStatus) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_terminal_status_is_final() {
        let mut s = Session::new(Uuid::new_v4(), "https://quiz", Duration::from_secs(60), 5);
        assert_eq!(s.status(), SessionStatus::Running);
        assert!(!s.finish(SessionStatus::Running));
        assert!(s.finish(SessionStatus::Completed));
        assert!(!s.finish(SessionStatus::Failed));
        assert_eq!(s.status(), SessionStatus::Completed);
    }

    #[test]
    fn test_step_counting() {
        let mut s = Session::new(Uuid::new_v4(), "t", Duration::from_secs(60), 2);
        assert!(!s.steps_exhausted());
        assert_eq!(s.begin_step(), 1);
        assert_eq!(s.begin_step(), 2);
        assert!(s.steps_exhausted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_is_fixed_from_start() {
        let s = Session::new(Uuid::new_v4(), "t", Duration::from_secs(10), 100);
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(!s.is_past_deadline());
        assert_eq!(s.remaining(), Duration::from_secs(6));
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(s.is_past_deadline());
        assert_eq!(s.remaining(), Duration::ZERO);
    }
}
