use std::{
    cell::{Cell, RefCell},
    mem::take,
    rc::{Rc, Weak},
};

use slabmap::SlabMap;

use crate::Subscription;


thread_local! {
    static GLOBALS: RefCell<Globals> = RefCell::new(Globals::new());
}

struct Globals {
    batch_depth: usize,
    is_flushing: bool,
    notifys: Vec<Rc<dyn BindSink>>,
}
impl Globals {
    fn new() -> Self {
        Self {
            batch_depth: 0,
            is_flushing: false,
            notifys: Vec::new(),
        }
    }
    fn with<T>(f: impl FnOnce(&mut Self) -> T) -> T {
        GLOBALS.with(|g| f(&mut g.borrow_mut()))
    }
    fn push_notify(sink: Rc<dyn BindSink>) {
        Self::with(|g| g.notifys.push(sink));
    }
}

/// Proof that a batch is open.
///
/// Every write to a [`State`](crate::State) requires one. Notifications caused by writes made
/// through it are deferred until the outermost [`batch`] returns.
pub struct ActionContext {
    _private: (),
}

/// Runs `f` as one atomic notification batch.
///
/// Batches nest; only the outermost one dispatches notifications, and every affected effect
/// runs at most once per dispatch, after all writes of the batch have been applied.
pub fn batch<T>(f: impl FnOnce(&mut ActionContext) -> T) -> T {
    let guard = BatchGuard::enter();
    let ret = f(&mut ActionContext { _private: () });
    drop(guard);
    ret
}

struct BatchGuard;

impl BatchGuard {
    fn enter() -> Self {
        Globals::with(|g| g.batch_depth += 1);
        BatchGuard
    }
}
impl Drop for BatchGuard {
    fn drop(&mut self) {
        let flush = Globals::with(|g| {
            g.batch_depth -= 1;
            if g.batch_depth == 0 && !g.is_flushing && !std::thread::panicking() {
                g.is_flushing = true;
                true
            } else {
                false
            }
        });
        if flush {
            flush_notifys();
        }
    }
}

fn flush_notifys() {
    struct FlushingGuard;
    impl Drop for FlushingGuard {
        fn drop(&mut self) {
            Globals::with(|g| g.is_flushing = false);
        }
    }
    let _guard = FlushingGuard;
    let mut notifys = Vec::new();
    loop {
        Globals::with(|g| std::mem::swap(&mut notifys, &mut g.notifys));
        if notifys.is_empty() {
            break;
        }
        for sink in notifys.drain(..) {
            sink.notify();
        }
    }
}

pub(crate) trait BindSource: 'static {
    fn unbind(self: Rc<Self>, key: usize);
}

pub(crate) trait BindSink: 'static {
    fn schedule(self: Rc<Self>);
    fn notify(self: Rc<Self>);
}

struct SourceBinding {
    source: Rc<dyn BindSource>,
    key: usize,
}
impl SourceBinding {
    fn unbind(self) {
        self.source.unbind(self.key);
    }
}

/// Context for reads that subscribe.
///
/// Inside an [`effect`] every [`State`](crate::State) read through this context becomes a
/// dependency of the effect. A detached context (see [`SignalContext::detached`]) records nothing.
pub struct SignalContext {
    sink: Option<Weak<dyn BindSink>>,
    sources: Vec<SourceBinding>,
}

impl SignalContext {
    /// Creates a context that is not attached to any effect.
    ///
    /// Reads through it behave like peeks.
    pub fn detached() -> Self {
        Self {
            sink: None,
            sources: Vec::new(),
        }
    }

    /// Returns `true` if reads through this context subscribe an effect.
    pub fn is_tracking(&self) -> bool {
        self.sink.is_some()
    }

    pub(crate) fn bind(&mut self, source: Rc<dyn BindSource>, sinks: &RefCell<SinkBindings>) {
        if let Some(sink) = &self.sink {
            let key = sinks.borrow_mut().0.insert(sink.clone());
            self.sources.push(SourceBinding { source, key });
        }
    }
}

#[derive(Default)]
pub(crate) struct SinkBindings(SlabMap<Weak<dyn BindSink>>);

impl SinkBindings {
    pub fn new() -> Self {
        Self(SlabMap::new())
    }
    pub fn unbind(&mut self, key: usize) {
        self.0.remove(key);
    }
    pub fn notify(&self) {
        for sink in self.0.values() {
            if let Some(sink) = sink.upgrade() {
                sink.schedule();
            }
        }
    }
}

struct EffectNode {
    f: RefCell<Box<dyn FnMut(&mut SignalContext)>>,
    sources: RefCell<Vec<SourceBinding>>,
    is_scheduled: Cell<bool>,
    is_disposed: Cell<bool>,
}

impl EffectNode {
    fn run(self: &Rc<Self>) {
        self.clear_sources();
        let this: Rc<dyn BindSink> = self.clone();
        let mut sc = SignalContext {
            sink: Some(Rc::downgrade(&this)),
            sources: Vec::new(),
        };
        (self.f.borrow_mut())(&mut sc);
        if self.is_disposed.get() {
            for b in sc.sources {
                b.unbind();
            }
        } else {
            *self.sources.borrow_mut() = sc.sources;
        }
    }
    fn clear_sources(&self) {
        for b in take(&mut *self.sources.borrow_mut()) {
            b.unbind();
        }
    }
    fn dispose(self: Rc<Self>) {
        self.is_disposed.set(true);
        self.clear_sources();
    }
}
impl BindSink for EffectNode {
    fn schedule(self: Rc<Self>) {
        if !self.is_scheduled.replace(true) {
            Globals::push_notify(self);
        }
    }
    fn notify(self: Rc<Self>) {
        self.is_scheduled.set(false);
        if !self.is_disposed.get() {
            self.run();
        }
    }
}

/// Runs `f` now and again every time a state it read through the [`SignalContext`] is written.
///
/// The effect stays alive until the returned [`Subscription`] is dropped.
pub fn effect(f: impl FnMut(&mut SignalContext) + 'static) -> Subscription {
    let node = Rc::new(EffectNode {
        f: RefCell::new(Box::new(f)),
        sources: RefCell::new(Vec::new()),
        is_scheduled: Cell::new(false),
        is_disposed: Cell::new(false),
    });
    node.run();
    Subscription::from_rc_fn(node, EffectNode::dispose)
}
