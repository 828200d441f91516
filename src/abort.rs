use std::{
    cell::{Cell, RefCell},
    future::poll_fn,
    mem::take,
    rc::Rc,
    task::{Poll, Waker},
};

use slabmap::SlabMap;

use crate::Subscription;


struct AbortData {
    aborted: Cell<bool>,
    callbacks: RefCell<SlabMap<Box<dyn FnOnce()>>>,
    wakers: RefCell<SlabMap<Waker>>,
}

/// Owner side of a cooperative cancellation token.
#[derive(Clone)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    pub fn new() -> Self {
        Self {
            signal: AbortSignal(Rc::new(AbortData {
                aborted: Cell::new(false),
                callbacks: RefCell::new(SlabMap::new()),
                wakers: RefCell::new(SlabMap::new()),
            })),
        }
    }

    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Marks the signal aborted and runs the registered callbacks.
    ///
    /// Aborting again does nothing.
    pub fn abort(&self) {
        let data = &self.signal.0;
        if data.aborted.replace(true) {
            return;
        }
        let callbacks = take(&mut *data.callbacks.borrow_mut());
        for (_, f) in callbacks {
            f();
        }
        let wakers = take(&mut *data.wakers.borrow_mut());
        for (_, waker) in wakers {
            waker.wake();
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.signal.is_aborted()
    }

    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Rc::ptr_eq(&this.signal.0, &other.signal.0)
    }
}
impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}
impl std::fmt::Debug for AbortController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortController")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

/// Observer side of a cancellation token, handed to async validators.
#[derive(Clone)]
pub struct AbortSignal(Rc<AbortData>);

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        self.0.aborted.get()
    }

    /// Registers `f` to run when the signal is aborted.
    ///
    /// Runs `f` immediately if it already is. Dropping the subscription unregisters it.
    pub fn on_abort(&self, f: impl FnOnce() + 'static) -> Subscription {
        if self.is_aborted() {
            f();
            return Subscription::empty();
        }
        let key = self.0.callbacks.borrow_mut().insert(Box::new(f));
        Subscription::from_weak_fn(Rc::downgrade(&self.0), move |data| {
            data.callbacks.borrow_mut().remove(key);
        })
    }

    /// Completes once the signal is aborted.
    pub async fn aborted(&self) {
        let mut key = WakerKeyGuard {
            data: &self.0,
            key: None,
        };
        poll_fn(|cx| {
            if self.is_aborted() {
                return Poll::Ready(());
            }
            let mut wakers = self.0.wakers.borrow_mut();
            if let Some(key) = key.key {
                wakers[key].clone_from(cx.waker());
            } else {
                key.key = Some(wakers.insert(cx.waker().clone()));
            }
            Poll::Pending
        })
        .await
    }
}
impl std::fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

struct WakerKeyGuard<'a> {
    data: &'a AbortData,
    key: Option<usize>,
}
impl Drop for WakerKeyGuard<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key {
            self.data.wakers.borrow_mut().remove(key);
        }
    }
}
