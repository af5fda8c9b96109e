//! Graceful shutdown supervision for stdio children.
//!
//! # Strategy
//! 1. `stop()` closes stdin and waits one grace period
//! 2. Still running: polite tree kill (SIGTERM), wait another grace period
//! 3. Still running: forceful tree kill (SIGKILL)
//!
//! A second `stop()` at any point skips whatever is left and kills forcefully
//! right away. Failed tree kills fall back to signalling the child directly.
//! Nothing in the escalation path ever returns an error to the caller.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use procward_core::{
    BROKEN_STDIN_GRACE_PERIOD, ChildControl, LifecycleState, ProcessTreeKiller, SupervisorConfig,
    TerminationSignal,
};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Drives one child through the stdin-close → polite → forceful sequence.
///
/// Must be used from within a Tokio runtime: escalation timers and kill
/// commands run as spawned tasks. Dropping the supervisor disposes it, which
/// cancels the pending timer but never kills the child.
pub struct ProcessLifecycleSupervisor {
    shared: Arc<Shared>,
}

struct Shared {
    child: Arc<dyn ChildControl>,
    killer: Arc<dyn ProcessTreeKiller>,
    grace_period: Duration,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    state: LifecycleState,
    pending: Option<PendingTimer>,
    /// Bumped for every scheduled timer; a firing timer only acts if it is
    /// still the pending one.
    epoch: u64,
}

struct PendingTimer {
    epoch: u64,
    handle: JoinHandle<()>,
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Polite,
    Forceful,
}

impl Inner {
    fn advance(&mut self, next: LifecycleState, pid: Option<u32>) -> bool {
        if !self.state.can_transition_to(next) {
            warn!(?pid, from = %self.state, to = %next, "rejected lifecycle transition");
            return false;
        }
        debug!(?pid, from = %self.state, to = %next, "lifecycle transition");
        self.state = next;
        true
    }

    fn cancel_pending(&mut self) {
        if let Some(timer) = self.pending.take() {
            timer.handle.abort();
        }
    }

    /// Take the pending slot if it still belongs to the timer `epoch`.
    fn claim(&mut self, epoch: u64) -> bool {
        match &self.pending {
            Some(timer) if timer.epoch == epoch => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}

impl ProcessLifecycleSupervisor {
    pub fn new(
        child: Arc<dyn ChildControl>,
        killer: Arc<dyn ProcessTreeKiller>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                child,
                killer,
                grace_period: config.grace_period(),
                inner: Mutex::new(Inner::default()),
            }),
        }
    }

    /// True once shutdown has begun.
    pub fn stopped(&self) -> bool {
        self.state().is_stopped()
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.lock().state
    }

    pub fn pid(&self) -> Option<u32> {
        self.shared.child.pid()
    }

    pub fn grace_period(&self) -> Duration {
        self.shared.grace_period
    }

    /// Whether an escalation timer is outstanding.
    pub fn has_pending_timer(&self) -> bool {
        self.shared.lock().pending.is_some()
    }

    /// Begin shutdown, or escalate it.
    ///
    /// The first call closes stdin and arms the polite-kill timer. Any later
    /// call cancels the pending timer and kills the process tree forcefully.
    pub fn stop(&self) {
        let shared = &self.shared;
        let pid = shared.child.pid();
        let mut inner = shared.lock();

        if inner.state == LifecycleState::Running {
            let delay = match shared.child.end_stdin() {
                Ok(()) => shared.grace_period,
                Err(e) => {
                    debug!(?pid, error = %e, "stdin already broken, escalating without grace");
                    BROKEN_STDIN_GRACE_PERIOD
                }
            };
            inner.advance(LifecycleState::StdinEnded, pid);
            shared.schedule(&mut inner, delay, Step::Polite);
            return;
        }

        shared.enter_forceful(&mut inner, pid);
        drop(inner);

        let shared = Arc::clone(shared);
        tokio::spawn(async move {
            shared.terminate(TerminationSignal::Forceful).await;
        });
    }

    /// Send `message` plus a newline to the child.
    ///
    /// Silently discarded once shutdown has begun.
    pub fn write(&self, message: &str) {
        let inner = self.shared.lock();
        if inner.state.is_stopped() {
            trace!(
                pid = ?self.shared.child.pid(),
                state = %inner.state,
                "discarding write to stopped child"
            );
            return;
        }

        if let Err(e) = self.shared.child.write_line(message) {
            warn!(pid = ?self.shared.child.pid(), error = %e, "failed to write to child stdin");
        }
    }

    /// Cancel the pending timer. Does not kill the child.
    pub fn dispose(&self) {
        self.shared.lock().cancel_pending();
    }
}

impl Drop for ProcessLifecycleSupervisor {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn schedule(self: &Arc<Self>, inner: &mut Inner, delay: Duration, step: Step) {
        inner.cancel_pending();
        inner.epoch += 1;
        let epoch = inner.epoch;

        let shared = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match step {
                Step::Polite => shared.kill_polite(epoch).await,
                Step::Forceful => shared.kill_forceful_on_timer(epoch).await,
            }
        });

        trace!(pid = ?self.child.pid(), ?step, ?delay, "escalation timer armed");
        inner.pending = Some(PendingTimer { epoch, handle });
    }

    fn enter_forceful(&self, inner: &mut Inner, pid: Option<u32>) {
        inner.cancel_pending();
        inner.advance(LifecycleState::KilledForceful, pid);
    }

    async fn kill_polite(self: &Arc<Self>, epoch: u64) {
        {
            let pid = self.child.pid();
            let mut inner = self.lock();
            if !inner.claim(epoch) || !inner.advance(LifecycleState::KilledPolite, pid) {
                return;
            }
            self.schedule(&mut inner, self.grace_period, Step::Forceful);
        }

        self.terminate(TerminationSignal::Polite).await;
    }

    async fn kill_forceful_on_timer(&self, epoch: u64) {
        {
            let pid = self.child.pid();
            let mut inner = self.lock();
            if !inner.claim(epoch) {
                return;
            }
            self.enter_forceful(&mut inner, pid);
        }

        self.terminate(TerminationSignal::Forceful).await;
    }

    /// Carry out one kill step. Never fails; every error is logged and dropped.
    async fn terminate(&self, signal: TerminationSignal) {
        if self.child.has_exited() {
            debug!(pid = ?self.child.pid(), %signal, "child already exited, nothing to kill");
            return;
        }

        let Some(pid) = self.child.pid() else {
            self.signal_directly(signal);
            return;
        };

        if !signal.is_forceful() && !self.killer.supports_polite() {
            debug!(pid, "no polite tree kill on this platform, waiting for forceful stage");
            return;
        }

        if let Err(e) = self.killer.kill_tree(pid, signal.is_forceful()).await {
            warn!(pid, %signal, error = %e, "tree kill failed, signalling process directly");
            self.signal_directly(signal);
        }
    }

    fn signal_directly(&self, signal: TerminationSignal) {
        if let Err(e) = self.child.signal(signal) {
            debug!(pid = ?self.child.pid(), %signal, error = %e, "direct signal failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use procward_core::{KillTreeError, MockChildControl, MockProcessTreeKiller};
    use std::io;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const PID: u32 = 4242;
    const GRACE: Duration = Duration::from_millis(100);
    const TICK: Duration = Duration::from_millis(1);

    #[derive(Default)]
    struct FakeChild {
        pid: Option<u32>,
        fail_end_stdin: bool,
        exited: AtomicBool,
        stdin_ends: AtomicUsize,
        writes: Mutex<Vec<String>>,
        signals: Mutex<Vec<TerminationSignal>>,
    }

    impl FakeChild {
        fn with_pid() -> Arc<Self> {
            Arc::new(Self {
                pid: Some(PID),
                ..Self::default()
            })
        }

        fn signals(&self) -> Vec<TerminationSignal> {
            self.signals.lock().unwrap().clone()
        }
    }

    impl ChildControl for FakeChild {
        fn pid(&self) -> Option<u32> {
            self.pid
        }

        fn write_line(&self, line: &str) -> io::Result<()> {
            self.writes.lock().unwrap().push(line.to_string());
            Ok(())
        }

        fn end_stdin(&self) -> io::Result<()> {
            self.stdin_ends.fetch_add(1, Ordering::SeqCst);
            if self.fail_end_stdin {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken"));
            }
            Ok(())
        }

        fn signal(&self, signal: TerminationSignal) -> io::Result<()> {
            self.signals.lock().unwrap().push(signal);
            Ok(())
        }

        fn has_exited(&self) -> bool {
            self.exited.load(Ordering::SeqCst)
        }
    }

    struct FakeKiller {
        polite: bool,
        fail: bool,
        calls: Mutex<Vec<(u32, bool)>>,
    }

    impl FakeKiller {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                polite: true,
                fail: false,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(u32, bool)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProcessTreeKiller for FakeKiller {
        async fn kill_tree(&self, pid: u32, forceful: bool) -> Result<(), KillTreeError> {
            self.calls.lock().unwrap().push((pid, forceful));
            if self.fail {
                return Err(KillTreeError::CommandFailed {
                    tool: "fake",
                    pid,
                    code: Some(1),
                    output: "no such process".to_string(),
                });
            }
            Ok(())
        }

        fn supports_polite(&self) -> bool {
            self.polite
        }
    }

    fn supervise(child: &Arc<FakeChild>, killer: &Arc<FakeKiller>) -> ProcessLifecycleSupervisor {
        ProcessLifecycleSupervisor::new(
            child.clone(),
            killer.clone(),
            SupervisorConfig::default().with_grace_period(GRACE),
        )
    }

    /// Let spawned tasks run without moving the clock.
    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    /// Move the paused clock forward and let woken tasks finish.
    async fn elapse(duration: Duration) {
        tokio::time::sleep(duration).await;
        settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_closes_stdin_and_waits_a_grace_period() {
        let child = FakeChild::with_pid();
        let killer = FakeKiller::new();
        let supervisor = supervise(&child, &killer);

        assert!(!supervisor.stopped());
        supervisor.stop();

        assert_eq!(supervisor.state(), LifecycleState::StdinEnded);
        assert!(supervisor.stopped());
        assert!(supervisor.has_pending_timer());
        assert_eq!(child.stdin_ends.load(Ordering::SeqCst), 1);

        elapse(GRACE - TICK).await;
        assert_eq!(supervisor.state(), LifecycleState::StdinEnded);
        assert!(killer.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn escalates_polite_then_forceful() {
        let child = FakeChild::with_pid();
        let killer = FakeKiller::new();
        let supervisor = supervise(&child, &killer);

        supervisor.stop();
        elapse(GRACE + TICK).await;
        assert_eq!(supervisor.state(), LifecycleState::KilledPolite);
        assert_eq!(killer.calls(), vec![(PID, false)]);
        assert!(supervisor.has_pending_timer());

        elapse(GRACE).await;
        assert_eq!(supervisor.state(), LifecycleState::KilledForceful);
        assert_eq!(killer.calls(), vec![(PID, false), (PID, true)]);
        assert!(!supervisor.has_pending_timer());
        assert!(child.signals().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn second_stop_kills_forcefully_at_once() {
        let child = FakeChild::with_pid();
        let killer = FakeKiller::new();
        let supervisor = supervise(&child, &killer);

        supervisor.stop();
        elapse(GRACE / 2).await;
        supervisor.stop();

        assert_eq!(supervisor.state(), LifecycleState::KilledForceful);
        assert!(!supervisor.has_pending_timer());
        settle().await;
        assert_eq!(killer.calls(), vec![(PID, true)]);

        // The cancelled polite timer must never fire
        elapse(GRACE * 3).await;
        assert_eq!(killer.calls(), vec![(PID, true)]);
        assert_eq!(child.stdin_ends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn broken_stdin_escalates_almost_immediately() {
        let child = Arc::new(FakeChild {
            pid: Some(PID),
            fail_end_stdin: true,
            ..FakeChild::default()
        });
        let killer = FakeKiller::new();
        let supervisor = supervise(&child, &killer);

        supervisor.stop();
        assert_eq!(supervisor.state(), LifecycleState::StdinEnded);

        elapse(TICK * 5).await;
        assert_eq!(supervisor.state(), LifecycleState::KilledPolite);
        assert_eq!(killer.calls(), vec![(PID, false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_tree_kill_falls_back_to_direct_signal() {
        let child = FakeChild::with_pid();
        let killer = Arc::new(FakeKiller {
            polite: true,
            fail: true,
            calls: Mutex::new(Vec::new()),
        });
        let supervisor = supervise(&child, &killer);

        supervisor.stop();
        elapse(GRACE + TICK).await;
        assert_eq!(child.signals(), vec![TerminationSignal::Polite]);

        elapse(GRACE).await;
        assert_eq!(
            child.signals(),
            vec![TerminationSignal::Polite, TerminationSignal::Forceful]
        );
        assert_eq!(supervisor.state(), LifecycleState::KilledForceful);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_pid_signals_the_handle() {
        let child = Arc::new(FakeChild::default());
        let killer = FakeKiller::new();
        let supervisor = supervise(&child, &killer);

        supervisor.stop();
        elapse(GRACE * 2 + TICK).await;

        assert!(killer.calls().is_empty());
        assert_eq!(
            child.signals(),
            vec![TerminationSignal::Polite, TerminationSignal::Forceful]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn polite_stage_is_silent_without_polite_tree_kill() {
        let child = FakeChild::with_pid();
        let killer = Arc::new(FakeKiller {
            polite: false,
            fail: false,
            calls: Mutex::new(Vec::new()),
        });
        let supervisor = supervise(&child, &killer);

        supervisor.stop();
        elapse(GRACE + TICK).await;
        assert_eq!(supervisor.state(), LifecycleState::KilledPolite);
        assert!(killer.calls().is_empty());
        assert!(child.signals().is_empty());

        elapse(GRACE).await;
        assert_eq!(killer.calls(), vec![(PID, true)]);
    }

    #[tokio::test(start_paused = true)]
    async fn exited_child_is_never_signalled() {
        let child = FakeChild::with_pid();
        let killer = FakeKiller::new();
        let supervisor = supervise(&child, &killer);

        supervisor.stop();
        child.exited.store(true, Ordering::SeqCst);
        elapse(GRACE * 2 + TICK).await;

        assert_eq!(supervisor.state(), LifecycleState::KilledForceful);
        assert!(killer.calls().is_empty());
        assert!(child.signals().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_cancels_timer_without_killing() {
        let child = FakeChild::with_pid();
        let killer = FakeKiller::new();
        let supervisor = supervise(&child, &killer);

        supervisor.stop();
        supervisor.dispose();
        supervisor.dispose();
        assert!(!supervisor.has_pending_timer());

        elapse(GRACE * 3).await;
        assert_eq!(supervisor.state(), LifecycleState::StdinEnded);
        assert!(killer.calls().is_empty());
        assert!(child.signals().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_supervisor_disposes_it() {
        let child = FakeChild::with_pid();
        let killer = FakeKiller::new();

        supervise(&child, &killer).stop();
        elapse(GRACE * 3).await;

        assert!(killer.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_state_is_idempotent() {
        let child = FakeChild::with_pid();
        let killer = FakeKiller::new();
        let supervisor = supervise(&child, &killer);

        supervisor.stop();
        supervisor.stop();
        for _ in 0..3 {
            supervisor.stop();
            assert_eq!(supervisor.state(), LifecycleState::KilledForceful);
            assert!(!supervisor.has_pending_timer());
        }

        elapse(GRACE * 3).await;
        assert_eq!(supervisor.state(), LifecycleState::KilledForceful);
        assert!(killer.calls().iter().all(|&(pid, forceful)| pid == PID && forceful));
        assert_eq!(child.stdin_ends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn writes_are_dropped_once_stopped() {
        let child = FakeChild::with_pid();
        let killer = FakeKiller::new();
        let supervisor = supervise(&child, &killer);

        supervisor.write("first");
        supervisor.stop();
        supervisor.write("during stdin-ended");
        elapse(GRACE + TICK).await;
        supervisor.write("during killed-polite");
        supervisor.stop();
        supervisor.write("after forceful");

        assert_eq!(*child.writes.lock().unwrap(), vec!["first".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn write_after_stop_never_reaches_the_stream() {
        let mut child = MockChildControl::new();
        child.expect_pid().return_const(Some(PID));
        child.expect_end_stdin().times(1).returning(|| Ok(()));
        child
            .expect_write_line()
            .withf(|line: &str| line == "hello")
            .times(1)
            .returning(|_| Ok(()));
        let killer = MockProcessTreeKiller::new();

        let supervisor = ProcessLifecycleSupervisor::new(
            Arc::new(child),
            Arc::new(killer),
            SupervisorConfig::default(),
        );
        supervisor.write("hello");
        supervisor.stop();
        supervisor.write("ignored");
        supervisor.write("also ignored");
        supervisor.dispose();
    }

    #[tokio::test(start_paused = true)]
    async fn mocked_killer_receives_escalating_requests() {
        let mut child = MockChildControl::new();
        child.expect_pid().return_const(Some(PID));
        child.expect_end_stdin().returning(|| Ok(()));
        child.expect_has_exited().return_const(false);

        let mut killer = MockProcessTreeKiller::new();
        killer.expect_supports_polite().return_const(true);
        let mut seq = mockall::Sequence::new();
        killer
            .expect_kill_tree()
            .withf(|pid, forceful| *pid == PID && !*forceful)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        killer
            .expect_kill_tree()
            .withf(|pid, forceful| *pid == PID && *forceful)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let supervisor = ProcessLifecycleSupervisor::new(
            Arc::new(child),
            Arc::new(killer),
            SupervisorConfig::default().with_grace_period(GRACE),
        );
        supervisor.stop();
        elapse(GRACE * 2 + TICK).await;
        assert_eq!(supervisor.state(), LifecycleState::KilledForceful);
    }

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Stop,
        HalfGrace,
        FullGrace,
    }

    #[tokio::test(start_paused = true)]
    async fn every_call_sequence_escalates_monotonically() {
        const OPS: [Op; 3] = [Op::Stop, Op::HalfGrace, Op::FullGrace];

        for index in 0..OPS.len().pow(4) {
            let mut remaining = index;
            let ops: Vec<Op> = (0..4)
                .map(|_| {
                    let op = OPS[remaining % OPS.len()];
                    remaining /= OPS.len();
                    op
                })
                .collect();

            let child = FakeChild::with_pid();
            let killer = FakeKiller::new();
            let supervisor = supervise(&child, &killer);
            let mut history = vec![supervisor.state()];

            for op in &ops {
                match op {
                    Op::Stop => {
                        supervisor.stop();
                        settle().await;
                    }
                    Op::HalfGrace => elapse(GRACE / 2).await,
                    Op::FullGrace => elapse(GRACE).await,
                }
                let state = supervisor.state();
                history.push(state);

                if state.is_terminal() {
                    assert!(!supervisor.has_pending_timer(), "{ops:?}");
                }
            }

            assert!(LifecycleState::is_valid_history(&history), "{ops:?} -> {history:?}");
            assert!(child.stdin_ends.load(Ordering::SeqCst) <= 1, "{ops:?}");
        }
    }
}
