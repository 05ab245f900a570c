//! Injected time: clock readings and one-shot timers.
//!
//! Nothing inside the engine reads the ambient clock; everything that
//! needs time holds an `Arc<dyn Clock>`. Production uses [`SystemClock`]
//! (wall clock plus a dedicated timer thread); tests use [`VirtualClock`],
//! whose `advance` fires due timers deterministically on the caller's
//! thread.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A scheduled callback.
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// Clock and timer source for the engine.
pub trait Clock: Send + Sync {
    /// Milliseconds since the epoch (or since an arbitrary test origin).
    fn now_ms(&self) -> u64;

    /// Run `task` once, `delay_ms` from now. The handle cancels it.
    fn schedule(&self, delay_ms: u64, task: TimerTask) -> TimerHandle;
}

/// Cancellation handle for a scheduled task.
///
/// Firing and cancelling race for a single claim flag; exactly one wins,
/// so a cancelled task never runs and a running task cannot be cancelled
/// into a half-fired state.
#[derive(Clone)]
pub struct TimerHandle {
    claimed: Arc<AtomicBool>,
}

impl TimerHandle {
    fn new() -> Self {
        Self { claimed: Arc::new(AtomicBool::new(false)) }
    }

    pub fn cancel(&self) {
        self.claimed.store(true, Ordering::SeqCst);
    }

    /// Claim the right to fire. False when already cancelled or fired.
    fn claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

// ============================================================================
// SystemClock: wall clock + timer thread
// ============================================================================

struct HeapEntry {
    deadline_ms: u64,
    seq: u64,
    handle: TimerHandle,
    task: Option<TimerTask>,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline_ms == other.deadline_ms && self.seq == other.seq
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.deadline_ms, self.seq).cmp(&(other.deadline_ms, other.seq))
    }
}

struct TimerState {
    heap: BinaryHeap<Reverse<HeapEntry>>,
    next_seq: u64,
    shutdown: bool,
}

struct TimerShared {
    state: Mutex<TimerState>,
    wakeup: Condvar,
}

/// Wall clock backed by a timer thread draining a deadline heap.
pub struct SystemClock {
    shared: Arc<TimerShared>,
    thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl SystemClock {
    pub fn new() -> Self {
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState { heap: BinaryHeap::new(), next_seq: 0, shutdown: false }),
            wakeup: Condvar::new(),
        });
        let worker = Arc::clone(&shared);
        let thread = std::thread::Builder::new()
            .name("atrion-timers".to_string())
            .spawn(move || timer_loop(worker))
            .expect("failed to spawn timer thread");
        Self { shared, thread: Mutex::new(Some(thread)) }
    }

    fn wall_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        Self::wall_ms()
    }

    fn schedule(&self, delay_ms: u64, task: TimerTask) -> TimerHandle {
        let handle = TimerHandle::new();
        let mut state = self.shared.state.lock().expect("timer state poisoned");
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(Reverse(HeapEntry {
            deadline_ms: Self::wall_ms().saturating_add(delay_ms),
            seq,
            handle: handle.clone(),
            task: Some(task),
        }));
        drop(state);
        self.shared.wakeup.notify_one();
        handle
    }
}

impl Drop for SystemClock {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock().expect("timer state poisoned");
            state.shutdown = true;
        }
        self.shared.wakeup.notify_one();
        if let Some(thread) = self.thread.lock().expect("timer thread poisoned").take() {
            let _ = thread.join();
        }
    }
}

fn timer_loop(shared: Arc<TimerShared>) {
    let mut state = shared.state.lock().expect("timer state poisoned");
    loop {
        if state.shutdown {
            return;
        }
        let now = SystemClock::wall_ms();
        // Fire everything due; tasks run outside the lock.
        let mut due: Vec<HeapEntry> = Vec::new();
        loop {
            let is_due = matches!(state.heap.peek(), Some(Reverse(entry)) if entry.deadline_ms <= now);
            if !is_due {
                break;
            }
            let Reverse(entry) = state.heap.pop().expect("peeked entry vanished");
            due.push(entry);
        }
        if !due.is_empty() {
            drop(state);
            for mut entry in due {
                if entry.handle.claim() {
                    if let Some(task) = entry.task.take() {
                        task();
                    }
                }
            }
            state = shared.state.lock().expect("timer state poisoned");
            continue;
        }
        let next_deadline = state.heap.peek().map(|Reverse(entry)| entry.deadline_ms);
        state = match next_deadline {
            Some(deadline) => {
                let wait = Duration::from_millis(deadline.saturating_sub(now));
                shared.wakeup.wait_timeout(state, wait).expect("timer state poisoned").0
            }
            None => shared.wakeup.wait(state).expect("timer state poisoned"),
        };
    }
}

// ============================================================================
// VirtualClock: deterministic test time
// ============================================================================

struct VirtualEntry {
    handle: TimerHandle,
    task: Option<TimerTask>,
}

struct VirtualState {
    now_ms: u64,
    timers: BTreeMap<(u64, u64), VirtualEntry>,
    next_seq: u64,
}

/// Manually advanced clock; due timers fire in deadline order on the
/// thread calling `advance`.
#[derive(Clone)]
pub struct VirtualClock {
    inner: Arc<Mutex<VirtualState>>,
}

impl VirtualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VirtualState {
                now_ms: start_ms,
                timers: BTreeMap::new(),
                next_seq: 0,
            })),
        }
    }

    /// Move time forward, firing every timer that comes due, in order.
    ///
    /// The lock is released while each task runs, so tasks may read the
    /// clock or schedule new timers (which may themselves come due within
    /// the same advance).
    pub fn advance(&self, delta_ms: u64) {
        let target = {
            let state = self.inner.lock().expect("virtual clock poisoned");
            state.now_ms.saturating_add(delta_ms)
        };
        loop {
            let entry = {
                let mut state = self.inner.lock().expect("virtual clock poisoned");
                match state.timers.keys().next().copied() {
                    Some(key) if key.0 <= target => {
                        state.now_ms = state.now_ms.max(key.0);
                        state.timers.remove(&key)
                    }
                    _ => {
                        state.now_ms = target;
                        return;
                    }
                }
            };
            if let Some(mut entry) = entry {
                if entry.handle.claim() {
                    if let Some(task) = entry.task.take() {
                        task();
                    }
                }
            }
        }
    }
}

impl Clock for VirtualClock {
    fn now_ms(&self) -> u64 {
        self.inner.lock().expect("virtual clock poisoned").now_ms
    }

    fn schedule(&self, delay_ms: u64, task: TimerTask) -> TimerHandle {
        let handle = TimerHandle::new();
        let mut state = self.inner.lock().expect("virtual clock poisoned");
        let deadline = state.now_ms.saturating_add(delay_ms);
        let seq = state.next_seq;
        state.next_seq += 1;
        state
            .timers
            .insert((deadline, seq), VirtualEntry { handle: handle.clone(), task: Some(task) });
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_virtual_clock_fires_in_deadline_order() {
        let clock = VirtualClock::new(0);
        let order = Arc::new(Mutex::new(Vec::new()));

        for (delay, label) in [(300u64, "c"), (100, "a"), (200, "b")] {
            let order = Arc::clone(&order);
            clock.schedule(delay, Box::new(move || order.lock().unwrap().push(label)));
        }

        clock.advance(250);
        assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);
        assert_eq!(clock.now_ms(), 250);

        clock.advance(100);
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_cancel_prevents_firing() {
        let clock = VirtualClock::new(0);
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let handle = clock.schedule(50, Box::new(move || flag.store(true, Ordering::SeqCst)));
        handle.cancel();
        clock.advance(100);
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_rescheduling_task_fires_within_same_advance() {
        let clock = VirtualClock::new(0);
        let count = Arc::new(AtomicUsize::new(0));

        fn arm(clock: &VirtualClock, count: &Arc<AtomicUsize>) {
            let clock2 = clock.clone();
            let count2 = Arc::clone(count);
            clock.schedule(
                100,
                Box::new(move || {
                    if count2.fetch_add(1, Ordering::SeqCst) < 4 {
                        arm(&clock2, &count2);
                    }
                }),
            );
        }

        arm(&clock, &count);
        clock.advance(1_000);
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_system_clock_schedules_and_cancels() {
        let clock = SystemClock::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        clock.schedule(10, Box::new(move || flag.store(true, Ordering::SeqCst)));

        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let handle = clock.schedule(10, Box::new(move || flag.store(true, Ordering::SeqCst)));
        handle.cancel();

        std::thread::sleep(Duration::from_millis(100));
        assert!(fired.load(Ordering::SeqCst));
        assert!(!cancelled.load(Ordering::SeqCst));
    }
}
