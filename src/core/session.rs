use crate::core::story::PageStatus;
use log::warn;
use std::time::{Duration, Instant};

/// Transitions only move forward; a new run gets a new [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Running,
    Complete,
    Failed,
}

/// Owned by the orchestrator; everyone else reads [`ProgressSnapshot`] copies.
#[derive(Debug)]
pub struct Session {
    status: SessionStatus,
    statuses: Vec<PageStatus>,
    current_page: Option<u32>,
    started_at: Instant,
}

impl Session {
    pub fn new(total_pages: usize) -> Self {
        Self {
            status: SessionStatus::Idle,
            statuses: vec![PageStatus::Waiting; total_pages],
            current_page: None,
            started_at: Instant::now(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn total_pages(&self) -> usize {
        self.statuses.len()
    }

    pub fn start(&mut self) {
        match self.status {
            SessionStatus::Idle => {
                self.status = SessionStatus::Running;
                self.started_at = Instant::now();
            }
            other => warn!("ignoring start() on {:?} session", other),
        }
    }

    pub fn complete(&mut self) {
        match self.status {
            SessionStatus::Running => self.status = SessionStatus::Complete,
            other => warn!("ignoring complete() on {:?} session", other),
        }
    }

    pub fn fail(&mut self) {
        match self.status {
            SessionStatus::Running => self.status = SessionStatus::Failed,
            other => warn!("ignoring fail() on {:?} session", other),
        }
    }

    /// Page numbers are 1-based. A page already in a terminal state is left
    /// alone, so a polling confirmation racing a primary response cannot
    /// double-count or regress it.
    pub fn mark_page(&mut self, number: u32, status: PageStatus) {
        if number == 0 {
            warn!("mark_page: page numbers start at 1");
            return;
        }
        let Some(slot) = self.statuses.get_mut((number - 1) as usize) else {
            warn!("mark_page: page {} out of range", number);
            return;
        };
        if slot.is_terminal() {
            return;
        }
        *slot = status;
        if status == PageStatus::Generating {
            self.current_page = Some(number);
        }
    }

    pub fn done_count(&self) -> usize {
        self.statuses.iter().filter(|s| s.is_terminal()).count()
    }

    pub fn all_done(&self) -> bool {
        self.done_count() == self.statuses.len()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            completed: self.done_count(),
            total: self.statuses.len(),
            current_page: self.current_page,
            statuses: self.statuses.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
    pub current_page: Option<u32>,
    pub statuses: Vec<PageStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_happy_path() {
        let mut session = Session::new(2);
        assert_eq!(session.status(), SessionStatus::Idle);

        session.start();
        assert_eq!(session.status(), SessionStatus::Running);

        session.mark_page(1, PageStatus::Complete);
        session.mark_page(2, PageStatus::Error);
        assert!(session.all_done());

        session.complete();
        assert_eq!(session.status(), SessionStatus::Complete);
    }

    #[test]
    fn test_status_never_regresses() {
        let mut session = Session::new(1);
        session.start();
        session.complete();

        // A late start or fail must not move a finished session.
        session.start();
        assert_eq!(session.status(), SessionStatus::Complete);
        session.fail();
        assert_eq!(session.status(), SessionStatus::Complete);
    }

    #[test]
    fn test_mark_complete_is_idempotent() {
        let mut session = Session::new(3);
        session.start();
        session.mark_page(2, PageStatus::Complete);
        session.mark_page(2, PageStatus::Complete);
        assert_eq!(session.done_count(), 1);

        // A stale "generating" event after completion is ignored too.
        session.mark_page(2, PageStatus::Generating);
        assert_eq!(session.snapshot().statuses[1], PageStatus::Complete);
    }

    #[test]
    fn test_mark_page_out_of_range_is_ignored() {
        let mut session = Session::new(2);
        session.start();
        session.mark_page(0, PageStatus::Complete);
        session.mark_page(7, PageStatus::Complete);
        assert_eq!(session.done_count(), 0);
    }

    #[test]
    fn test_snapshot_reflects_current_page() {
        let mut session = Session::new(3);
        session.start();
        session.mark_page(1, PageStatus::Complete);
        session.mark_page(2, PageStatus::Generating);

        let snap = session.snapshot();
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.total, 3);
        assert_eq!(snap.current_page, Some(2));
        assert_eq!(snap.statuses[2], PageStatus::Waiting);
    }
}
