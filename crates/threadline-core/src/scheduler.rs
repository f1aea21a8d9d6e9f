//! Single-flight analysis scheduler state machine.
//!
//! Coordinates debounced text arrivals for one note with asynchronous
//! pipeline runs. At most one run is in flight; texts arriving meanwhile
//! go to a one-slot pending buffer where only the newest survives. When the
//! run completes, successfully or not, the pending text is started if it
//! differs from the text last analyzed.
//!
//! The machine is synchronous and owns no timers or tasks: a driver feeds
//! it events ([`Scheduler::on_text`], [`Scheduler::on_complete`]) and starts
//! the runs it hands back as [`RunTicket`]s.
//!
//! ```text
//!            on_text(T), T != last
//!   Idle ───────────────────────────▶ Analyzing(T)
//!    ▲                                   │  on_text(T'), T' != last → pending = T'
//!    │ on_complete, pending ∈ {∅, last}  │
//!    └───────────────────────────────────┤
//!                                        │ on_complete, pending = P != last
//!                                        ▼
//!                                   Analyzing(P)
//! ```
//!
//! Every run gets a monotonically increasing id. [`Scheduler::should_apply`]
//! rejects a result whose id is not newer than the last applied one, so a
//! slow stale run can never overwrite fresher output.

/// A run the driver must start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTicket {
    pub run_id: u64,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchedulerState {
    Idle,
    Analyzing { run_id: u64 },
}

#[derive(Debug)]
pub struct Scheduler {
    state: SchedulerState,
    last_analyzed: Option<String>,
    pending: Option<String>,
    next_run_id: u64,
    last_applied: u64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            state: SchedulerState::Idle,
            last_analyzed: None,
            pending: None,
            next_run_id: 1,
            last_applied: 0,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == SchedulerState::Idle
    }

    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    pub fn last_analyzed(&self) -> Option<&str> {
        self.last_analyzed.as_deref()
    }

    /// A debounced text arrived.
    ///
    /// Empty text and the text last analyzed are ignored in every state, so
    /// they neither start a run nor disturb the pending slot. Any other text
    /// starts a run when idle and replaces the pending text otherwise.
    pub fn on_text(&mut self, text: String) -> Option<RunTicket> {
        if text.is_empty() || self.last_analyzed.as_deref() == Some(text.as_str()) {
            return None;
        }
        match self.state {
            SchedulerState::Idle => Some(self.start(text)),
            SchedulerState::Analyzing { .. } => {
                self.pending = Some(text);
                None
            }
        }
    }

    /// The run `run_id` finished. Returns the follow-up run, if any.
    ///
    /// Completions for any run other than the one in flight are ignored.
    pub fn on_complete(&mut self, run_id: u64) -> Option<RunTicket> {
        match &self.state {
            SchedulerState::Analyzing { run_id: current } if *current == run_id => {}
            _ => return None,
        }
        self.state = SchedulerState::Idle;

        let next = self.pending.take()?;
        if self.last_analyzed.as_deref() == Some(next.as_str()) {
            return None;
        }
        Some(self.start(next))
    }

    /// Whether the result of `run_id` may be published. Accepting a result
    /// advances the watermark, so each id is accepted at most once.
    pub fn should_apply(&mut self, run_id: u64) -> bool {
        if run_id > self.last_applied {
            self.last_applied = run_id;
            true
        } else {
            false
        }
    }

    fn start(&mut self, text: String) -> RunTicket {
        let run_id = self.next_run_id;
        self.next_run_id += 1;
        self.last_analyzed = Some(text.clone());
        self.state = SchedulerState::Analyzing { run_id };
        RunTicket { run_id, text }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> String {
        text.to_string()
    }

    #[test]
    fn test_idle_text_starts_run() {
        let mut sched = Scheduler::new();
        let ticket = sched.on_text(s("first draft")).unwrap();
        assert_eq!(ticket.text, "first draft");
        assert_eq!(ticket.run_id, 1);
        assert!(!sched.is_idle());
        assert_eq!(sched.last_analyzed(), Some("first draft"));
    }

    #[test]
    fn test_empty_text_never_starts() {
        let mut sched = Scheduler::new();
        assert!(sched.on_text(String::new()).is_none());
        assert!(sched.is_idle());
    }

    #[test]
    fn test_same_text_is_not_reanalyzed() {
        let mut sched = Scheduler::new();
        let t = sched.on_text(s("draft")).unwrap();
        assert!(sched.on_complete(t.run_id).is_none());
        assert!(sched.on_text(s("draft")).is_none());
        assert!(sched.is_idle());
    }

    #[test]
    fn test_single_flight_latest_pending_wins() {
        let mut sched = Scheduler::new();
        let t1 = sched.on_text(s("T1")).unwrap();
        assert!(sched.on_text(s("T2")).is_none());
        assert!(sched.on_text(s("T3")).is_none());
        assert_eq!(sched.pending(), Some("T3"));

        let next = sched.on_complete(t1.run_id).unwrap();
        assert_eq!(next.text, "T3");
        assert_eq!(next.run_id, 2);

        assert!(sched.on_complete(next.run_id).is_none());
        assert!(sched.is_idle());
    }

    #[test]
    fn test_return_to_running_text_keeps_pending() {
        let mut sched = Scheduler::new();
        let t1 = sched.on_text(s("T1")).unwrap();
        sched.on_text(s("T2"));
        sched.on_text(s("T1"));
        assert_eq!(sched.pending(), Some("T2"));

        let next = sched.on_complete(t1.run_id).unwrap();
        assert_eq!(next.text, "T2");
    }

    #[test]
    fn test_empty_arrival_keeps_pending() {
        let mut sched = Scheduler::new();
        let t1 = sched.on_text(s("T1")).unwrap();
        sched.on_text(s("T2"));
        sched.on_text(String::new());
        assert_eq!(sched.pending(), Some("T2"));

        let next = sched.on_complete(t1.run_id).unwrap();
        assert_eq!(next.text, "T2");
    }

    #[test]
    fn test_running_text_alone_schedules_nothing() {
        let mut sched = Scheduler::new();
        let t1 = sched.on_text(s("T1")).unwrap();
        sched.on_text(s("T1"));
        assert!(sched.pending().is_none());
        assert!(sched.on_complete(t1.run_id).is_none());
        assert!(sched.is_idle());
    }

    #[test]
    fn test_failed_run_returns_to_idle_and_allows_new_text() {
        let mut sched = Scheduler::new();
        let t1 = sched.on_text(s("T1")).unwrap();
        sched.on_complete(t1.run_id);
        let t2 = sched.on_text(s("T2")).unwrap();
        assert_eq!(t2.run_id, 2);
    }

    #[test]
    fn test_unknown_completion_ignored() {
        let mut sched = Scheduler::new();
        let t1 = sched.on_text(s("T1")).unwrap();
        sched.on_text(s("T2"));
        assert!(sched.on_complete(t1.run_id + 7).is_none());
        assert!(!sched.is_idle());
        assert_eq!(sched.pending(), Some("T2"));
    }

    #[test]
    fn test_should_apply_is_monotonic() {
        let mut sched = Scheduler::new();
        assert!(sched.should_apply(2));
        assert!(!sched.should_apply(1));
        assert!(!sched.should_apply(2));
        assert!(sched.should_apply(3));
    }
}
