use std::{
    cell::RefCell,
    collections::BTreeSet,
    future::Future,
    pin::Pin,
    rc::Rc,
    sync::{Condvar, LazyLock, Mutex, MutexGuard},
    task::{Context, Poll, Waker},
    time::{Duration, Instant},
};

use futures::future::LocalBoxFuture;
use slabmap::SlabMap;


/// Source of delays for debounced validation.
pub trait Timer {
    /// Returns a future that completes after `duration`.
    ///
    /// Dropping the future cancels the delay.
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}

/// Wall-clock timer backed by a shared background thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTimer;

impl Timer for SystemTimer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        Box::pin(sleep(duration))
    }
}

/// Completes after `duration` of wall-clock time.
///
/// The deadline is fixed when this is called, not when the future is first polled.
pub fn sleep(duration: Duration) -> impl Future<Output = ()> + Send + 'static {
    SystemSleep {
        deadline: Instant::now() + duration,
        id: None,
    }
}

static DEADLINES: LazyLock<DeadlineRegistry> = LazyLock::new(|| DeadlineRegistry {
    queue: Mutex::new(DeadlineQueue {
        order: BTreeSet::new(),
        entries: SlabMap::new(),
        thread_running: false,
    }),
    condvar: Condvar::new(),
});

struct DeadlineRegistry {
    queue: Mutex<DeadlineQueue>,
    condvar: Condvar,
}
impl DeadlineRegistry {
    fn lock(&self) -> MutexGuard<'_, DeadlineQueue> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn run_worker(&self) {
        let mut wakes = Vec::new();
        let mut queue = self.lock();
        loop {
            let now = Instant::now();
            while let Some(&(deadline, id)) = queue.order.first() {
                if deadline > now {
                    break;
                }
                queue.order.pop_first();
                if let Some(waker) = queue.entries[id].take() {
                    wakes.push(waker);
                }
            }
            if !wakes.is_empty() {
                drop(queue);
                for waker in wakes.drain(..) {
                    waker.wake();
                }
                queue = self.lock();
                continue;
            }
            queue = match queue.order.first() {
                Some(&(deadline, _)) => {
                    let wait = deadline.saturating_duration_since(now);
                    self.condvar
                        .wait_timeout(queue, wait)
                        .unwrap_or_else(|e| e.into_inner())
                        .0
                }
                None => self.condvar.wait(queue).unwrap_or_else(|e| e.into_inner()),
            };
        }
    }
}

struct DeadlineQueue {
    order: BTreeSet<(Instant, usize)>,
    entries: SlabMap<Option<Waker>>,
    thread_running: bool,
}
impl DeadlineQueue {
    fn insert(&mut self, deadline: Instant, waker: Waker) -> usize {
        if !self.thread_running {
            self.thread_running = true;
            std::thread::spawn(|| DEADLINES.run_worker());
        }
        let id = self.entries.insert(Some(waker));
        let is_first = self.order.first().map_or(true, |first| (deadline, id) < *first);
        self.order.insert((deadline, id));
        if is_first {
            DEADLINES.condvar.notify_one();
        }
        id
    }
    fn remove(&mut self, deadline: Instant, id: usize) {
        self.order.remove(&(deadline, id));
        self.entries.remove(id);
    }
}

struct SystemSleep {
    deadline: Instant,
    id: Option<usize>,
}
impl Future for SystemSleep {
    type Output = ();
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        let mut queue = DEADLINES.lock();
        match this.id {
            None => {
                if Instant::now() >= this.deadline {
                    return Poll::Ready(());
                }
                this.id = Some(queue.insert(this.deadline, cx.waker().clone()));
                Poll::Pending
            }
            Some(id) => {
                if let Some(waker) = &mut queue.entries[id] {
                    waker.clone_from(cx.waker());
                    return Poll::Pending;
                }
                queue.remove(this.deadline, id);
                this.id = None;
                Poll::Ready(())
            }
        }
    }
}
impl Drop for SystemSleep {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            DEADLINES.lock().remove(self.deadline, id);
        }
    }
}

/// Timer driven by hand, for deterministic tests and simulations.
///
/// Time only moves when [`advance`](Self::advance) is called. Clones share the clock.
#[derive(Clone, Default)]
pub struct ManualTimer(Rc<RefCell<ManualClock>>);

#[derive(Default)]
struct ManualClock {
    now: Duration,
    sleepers: SlabMap<ManualSleeper>,
}

struct ManualSleeper {
    deadline: Duration,
    waker: Option<Waker>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed since the timer was created.
    pub fn now(&self) -> Duration {
        self.0.borrow().now
    }

    /// Number of sleeps that have not completed yet.
    pub fn pending(&self) -> usize {
        self.0
            .borrow()
            .sleepers
            .values()
            .filter(|s| s.deadline > self.now())
            .count()
    }

    /// Moves the clock forward and wakes every sleep whose deadline has passed.
    pub fn advance(&self, duration: Duration) {
        let wakers: Vec<Waker> = {
            let mut clock = self.0.borrow_mut();
            clock.now += duration;
            let now = clock.now;
            clock
                .sleepers
                .values_mut()
                .filter(|s| s.deadline <= now)
                .filter_map(|s| s.waker.take())
                .collect()
        };
        for waker in wakers {
            waker.wake();
        }
    }
}

impl Timer for ManualTimer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        let deadline = self.now() + duration;
        Box::pin(ManualSleep {
            clock: self.0.clone(),
            deadline,
            id: None,
        })
    }
}

struct ManualSleep {
    clock: Rc<RefCell<ManualClock>>,
    deadline: Duration,
    id: Option<usize>,
}
impl Future for ManualSleep {
    type Output = ();
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        let mut clock = this.clock.borrow_mut();
        if clock.now >= this.deadline {
            if let Some(id) = this.id.take() {
                clock.sleepers.remove(id);
            }
            return Poll::Ready(());
        }
        let waker = Some(cx.waker().clone());
        match this.id {
            Some(id) => clock.sleepers[id].waker = waker,
            None => {
                this.id = Some(clock.sleepers.insert(ManualSleeper {
                    deadline: this.deadline,
                    waker,
                }))
            }
        }
        Poll::Pending
    }
}
impl Drop for ManualSleep {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            self.clock.borrow_mut().sleepers.remove(id);
        }
    }
}
