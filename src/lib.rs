//! Reactive form state.
//!
//! A plain [`Value`] is mirrored into a tree of reactive cells ([`TreeNode`]) that can be read,
//! written and removed by dotted path, merged with new values in place by [`reconcile`], and
//! validated field by field with [`FieldValidation`].

mod abort;
mod core;
mod equality;
pub mod path;
mod reconcile;
mod state;
mod subscription;
mod timer;
mod tree;
mod validation;
mod value;

pub use abort::*;
pub use crate::core::{batch, effect, ActionContext, SignalContext};
pub use equality::*;
pub use path::{get, Path, PathSegment};
pub use reconcile::*;
pub use state::*;
pub use subscription::*;
pub use timer::*;
pub use tree::*;
pub use validation::*;
pub use value::*;
