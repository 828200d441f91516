use std::{
    cell::{Ref, RefCell, RefMut},
    fmt,
    ops::{Deref, DerefMut},
    rc::Rc,
};

use derive_ex::derive_ex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    core::{BindSource, SinkBindings},
    ActionContext, SignalContext,
};


/// A shared mutable cell whose writes are observed by effects.
///
/// Clones are handles to the same cell.
#[derive(Default)]
#[derive_ex(Clone, bound())]
pub struct State<T: 'static>(Rc<StateNode<T>>);

impl<T: 'static> State<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(StateNode {
            sinks: RefCell::new(SinkBindings::new()),
            value: RefCell::new(value),
        }))
    }

    /// Borrows the value without subscribing.
    pub fn borrow_peek(&self) -> Ref<'_, T> {
        self.0.value.borrow()
    }

    /// Clones the value without subscribing.
    pub fn peek(&self) -> T
    where
        T: Clone,
    {
        self.borrow_peek().clone()
    }

    /// Borrows the value and subscribes the effect behind `sc`.
    pub fn borrow(&self, sc: &mut SignalContext) -> Ref<'_, T> {
        sc.bind(self.0.clone(), &self.0.sinks);
        self.0.value.borrow()
    }

    /// Clones the value and subscribes the effect behind `sc`.
    pub fn get(&self, sc: &mut SignalContext) -> T
    where
        T: Clone,
    {
        self.borrow(sc).clone()
    }

    /// Borrows the value for writing.
    ///
    /// Subscribers are notified when the guard is dropped, but only if it was dereferenced mutably.
    pub fn borrow_mut<'a>(&'a self, _ac: &'a mut ActionContext) -> StateRefMut<'a, T> {
        StateRefMut {
            value: self.0.value.borrow_mut(),
            is_dirty: false,
            node: &self.0,
        }
    }

    /// Replaces the value and notifies subscribers.
    pub fn set(&self, value: T, _ac: &mut ActionContext) {
        *self.0.value.borrow_mut() = value;
        self.0.notify();
    }

    /// Replaces the value, notifying subscribers only if it differs from the current one.
    pub fn set_dedup(&self, value: T, _ac: &mut ActionContext)
    where
        T: PartialEq,
    {
        let changed = {
            let mut current = self.0.value.borrow_mut();
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        };
        if changed {
            self.0.notify();
        }
    }

    /// Returns `true` if both handles refer to the same cell.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Rc::ptr_eq(&this.0, &other.0)
    }
}
impl<T: fmt::Debug> fmt::Debug for State<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.value.try_borrow() {
            Ok(value) => fmt::Debug::fmt(&*value, f),
            Err(_) => f.write_str("<borrowed>"),
        }
    }
}
impl<T: Serialize> Serialize for State<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value = self
            .0
            .value
            .try_borrow()
            .map_err(|_| <S::Error as serde::ser::Error>::custom("state is mutably borrowed"))?;
        value.serialize(serializer)
    }
}
impl<'de, T: Deserialize<'de>> Deserialize<'de> for State<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(State::new)
    }
}

#[derive(Default)]
struct StateNode<T: 'static> {
    sinks: RefCell<SinkBindings>,
    value: RefCell<T>,
}
impl<T: 'static> StateNode<T> {
    fn notify(&self) {
        self.sinks.borrow().notify();
    }
}
impl<T: 'static> BindSource for StateNode<T> {
    fn unbind(self: Rc<Self>, key: usize) {
        self.sinks.borrow_mut().unbind(key);
    }
}

/// Write guard returned by [`State::borrow_mut`].
pub struct StateRefMut<'a, T: 'static> {
    value: RefMut<'a, T>,
    is_dirty: bool,
    node: &'a StateNode<T>,
}
impl<T> Deref for StateRefMut<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.value
    }
}
impl<T> DerefMut for StateRefMut<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.is_dirty = true;
        &mut self.value
    }
}
impl<T> Drop for StateRefMut<'_, T> {
    fn drop(&mut self) {
        if self.is_dirty {
            self.node.notify();
        }
    }
}
