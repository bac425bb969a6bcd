//! Trellis Core
//!
//! This crate provides the core runtime for the Trellis fine-grained reactive
//! UI framework. It implements:
//!
//! - Reactive primitives (signals, computed values, effects)
//! - A render tree whose mutations are recorded, not applied
//! - A reconciler that applies them to a document once per frame
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Signals, computed values, effects and dependency tracking
//! - `tree`: Render tree nodes, change-tracked values and builder helpers
//! - `render`: The diff reconciler, frame scheduling, document sinks and
//!   HTML serialization
//! - `config` / `error`: Runtime configuration and the crate error type
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trellis_core::reactive::{ReactiveContext, Signal};
//! use trellis_core::render::{DiffRenderer, ManualFrames, MemorySink};
//! use trellis_core::tree::tags::p;
//!
//! let cx = ReactiveContext::new();
//! let sink = Arc::new(MemorySink::new());
//! let frames = Arc::new(ManualFrames::new());
//! let renderer = DiffRenderer::new(sink.clone(), frames.clone());
//! let root = renderer.mount(sink.create_root("BODY"), "BODY");
//!
//! let count = Signal::new(&cx, 0);
//! let label = p();
//! let (target, source) = (label.clone(), count.clone());
//! let _binding = trellis_core::reactive::Effect::new(&cx, move || {
//!     target.text(format!("Current count {}", source.get()));
//! });
//! root.children([label]);
//!
//! count.set(1);
//! frames.run_pending();
//! // The document now shows "Current count 1".
//! ```

pub mod config;
pub mod error;
pub mod reactive;
pub mod render;
pub mod tree;

pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use reactive::{Computed, Effect, ReactiveContext, Signal};
pub use render::{DiffRenderer, Renderer, TreeSink};
pub use tree::Node;
