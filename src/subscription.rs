use std::rc::{Rc, Weak};


/// Keeps an effect or a callback registration alive.
///
/// Dropping it unsubscribes.
#[derive(Default)]
#[must_use]
pub struct Subscription(Option<Box<dyn FnOnce()>>);

impl Subscription {
    pub fn empty() -> Self {
        Self(None)
    }

    /// Runs `f` on drop.
    pub fn from_fn(f: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    /// Holds `this` alive and passes it to `unsubscribe` on drop.
    pub fn from_rc_fn<T: 'static>(this: Rc<T>, unsubscribe: impl FnOnce(Rc<T>) + 'static) -> Self {
        Self::from_fn(move || unsubscribe(this))
    }

    /// Passes `this` to `unsubscribe` on drop, if it is still alive.
    pub fn from_weak_fn<T: 'static>(
        this: Weak<T>,
        unsubscribe: impl FnOnce(Rc<T>) + 'static,
    ) -> Self {
        Self::from_fn(move || {
            if let Some(this) = this.upgrade() {
                unsubscribe(this)
            }
        })
    }

    /// Returns `true` if dropping this subscription does nothing.
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}
impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}
impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            f.write_str("Subscription(empty)")
        } else {
            f.write_str("Subscription(active)")
        }
    }
}
