//! # Venttiseiska
//!
//! A synchronous, in-process publish/subscribe emitter with tagged listeners.
//!
//! ## Key Features
//!
//! - **Tagged events**: bind to `"event:tagA:tagB"` and filter emits and
//!   unbinds by tag subsets
//! - **Listener handles**: every binding returns a [`Listener`] that can be
//!   invoked, updated, inspected or unbound on its own
//! - **Cycles**: listeners can retire themselves after a fixed number of calls
//! - **Context override**: emits can force the receiver passed to callbacks
//! - **Reentrancy**: callbacks may bind, unbind and emit on the same emitter
//!   while an emit is in progress
//!
//! ## Query Grammar
//!
//! Event queries are either one string whose tokens are separated by a space,
//! or a sequence of tokens. Inside a token the first `:`-separated segment is
//! the event name and the rest are tags: `"a:tagA:tagB b"` is event `a` with
//! tags `tagA` and `tagB`, followed by event `b` with no tags. Both delimiters
//! can be changed through [`EmitterConfig`].
//!
//! ## Usage
//!
//! ```rust
//! use venttiseiska::{BindOptions, Callback, Emitter};
//! use serde_json::{json, Value};
//! use std::sync::{Arc, Mutex};
//!
//! let emitter: Emitter = Emitter::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let log = seen.clone();
//! let listeners = emitter.bind(
//!     "save:ui save:sync",
//!     BindOptions::new(Callback::new(move |ctx: Option<&Value>, args: &[Value]| {
//!         log.lock().unwrap().push((ctx.cloned(), args.to_vec()));
//!         Ok(())
//!     }))
//!     .with_context(json!("editor"))
//!     .with_cycles(2),
//! );
//! assert_eq!(listeners.len(), 2);
//!
//! // Only the listener tagged `ui` fires.
//! emitter.emit("save:ui", &[json!(1)]).unwrap();
//! assert_eq!(seen.lock().unwrap().len(), 1);
//!
//! // Unbind everything tagged `sync`.
//! emitter.off("save:sync");
//! assert!(!listeners[1].is_bound());
//! ```

pub mod config;
pub mod emitter;
pub mod error;
pub mod listener;
pub mod query;
pub mod stats;

// Re-exports for convenience
pub use config::EmitterConfig;
pub use emitter::{BindOptions, Emitter};
pub use error::{CallbackError, EmitterError};
pub use listener::{
    Callback, CallbackResult, Listener, ListenerId, ListenerOptions, ListenerPatch,
    ListenerSnapshot, ListenerTarget,
};
pub use query::{parse_events, tags_match, EventQuery, EventSelector};
pub use stats::EmitterStats;

/// Version information
pub const VENTTISEISKA_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Emitter carrying JSON arguments and JSON contexts
pub type JsonEmitter = Emitter<serde_json::Value, serde_json::Value>;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, EmitterError>;
