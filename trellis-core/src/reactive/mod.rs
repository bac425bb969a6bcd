//! Reactive Primitives
//!
//! This module implements the reactive graph: signals, computed values, and
//! effects. These primitives drive every update of the render tree.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! while an effect runs, the signal registers that effect as a subscriber.
//! When the signal is written, all subscribers re-run synchronously.
//!
//! ## Computed values
//!
//! A Computed is a derived value cached by an internal effect. It notifies its
//! own subscribers only when a recomputation actually changes the value.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that re-runs whenever something
//! it read during its last run changes. Effects declared while another effect
//! runs are its children and are torn down on the parent's next run.
//!
//! # Implementation Notes
//!
//! Dependency tracking goes through an explicit [`ReactiveContext`] that every
//! primitive is created against, instead of process-wide state. Reads consult
//! the context's stack of running computations to find who to subscribe.

mod computed;
mod context;
mod effect;
mod signal;
mod subscriber;
mod value;

pub use computed::Computed;
pub use context::ReactiveContext;
pub use effect::Effect;
pub use signal::Signal;
pub use subscriber::SubscriberId;
pub use value::{untrack_get, Gettable, Settable, Value};
