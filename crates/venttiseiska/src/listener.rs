//! Listener records and their lifecycle.
//!
//! A [`Listener`] is an opaque handle to one subscription. Its mutable state
//! lives behind a mutex and is only reachable through accessor methods; the
//! owning [`Emitter`] holds one clone of the handle in its registry and the
//! caller may hold others.

use crate::emitter::{Emitter, EmitterShared};
use crate::error::{CallbackError, EmitterError};
use crate::query::tags_match;
use compact_str::CompactString;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// Process-unique listener id. Ids increase in bind order.
pub type ListenerId = u64;

/// Last id handed out. Starts at zero when the process starts and is never reset.
static LAST_LISTENER_ID: AtomicU64 = AtomicU64::new(0);

fn next_listener_id() -> ListenerId {
    LAST_LISTENER_ID.fetch_add(1, Ordering::Relaxed) + 1
}

/// Result type returned by listener callbacks
pub type CallbackResult = Result<(), CallbackError>;

type CallbackFn<A, C> = dyn Fn(Option<&C>, &[A]) -> CallbackResult + Send + Sync;

/// Shared listener callback.
///
/// Receives the invocation context (the receiver) and the positional
/// arguments. Two callbacks are the same callback when they share the
/// allocation, see [`Callback::ptr_eq`].
pub struct Callback<A = Value, C = Value>(Arc<CallbackFn<A, C>>);

impl<A: 'static, C: 'static> Callback<A, C> {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(Option<&C>, &[A]) -> CallbackResult + Send + Sync + 'static,
    {
        Self(Arc::new(callback))
    }
}

impl<A, C> Callback<A, C> {
    /// Identity comparison on the shared closure.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.0) as *const (),
            Arc::as_ptr(&other.0) as *const (),
        )
    }

    #[inline]
    pub(crate) fn call(&self, receiver: Option<&C>, args: &[A]) -> CallbackResult {
        (self.0)(receiver, args)
    }
}

impl<A, C> Clone for Callback<A, C> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<A, C> fmt::Debug for Callback<A, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

/// Selects which listeners of an event an unbind call removes.
pub enum ListenerTarget<A = Value, C = Value> {
    /// Exactly the listener with this id
    Id(ListenerId),
    /// Every listener sharing this callback
    Callback(Callback<A, C>),
}

impl<A, C> From<ListenerId> for ListenerTarget<A, C> {
    fn from(id: ListenerId) -> Self {
        ListenerTarget::Id(id)
    }
}

impl<A, C> From<Callback<A, C>> for ListenerTarget<A, C> {
    fn from(callback: Callback<A, C>) -> Self {
        ListenerTarget::Callback(callback)
    }
}

impl<A, C> From<&Callback<A, C>> for ListenerTarget<A, C> {
    fn from(callback: &Callback<A, C>) -> Self {
        ListenerTarget::Callback(callback.clone())
    }
}

/// How an invocation picks its receiver.
pub(crate) enum ContextOverride<'a, C> {
    /// Use the listener's stored context
    Inherit,
    /// Use this value instead, even when it is `None`
    Force(Option<&'a C>),
}

impl<C> Clone for ContextOverride<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for ContextOverride<'_, C> {}

/// Everything needed to create a listener directly.
pub struct ListenerOptions<A = Value, C = Value> {
    pub event: CompactString,
    pub callback: Callback<A, C>,
    pub tags: Vec<CompactString>,
    pub context: Option<C>,
    /// Invocations before the listener unbinds itself, `0` for unlimited
    pub cycles: u32,
}

impl<A, C> ListenerOptions<A, C> {
    pub fn new(event: impl Into<CompactString>, callback: Callback<A, C>) -> Self {
        Self {
            event: event.into(),
            callback,
            tags: Vec::new(),
            context: None,
            cycles: 0,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_context(mut self, context: C) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_cycles(mut self, cycles: u32) -> Self {
        self.cycles = cycles;
        self
    }
}

/// Partial update for [`Listener::update`]. Unset fields are left alone.
///
/// Only the mutable fields can be expressed; id, emitter, event and the
/// bound flag are fixed for the lifetime of a listener.
pub struct ListenerPatch<A = Value, C = Value> {
    pub callback: Option<Callback<A, C>>,
    pub tags: Option<Vec<CompactString>>,
    /// `Some(None)` clears the stored context
    pub context: Option<Option<C>>,
    pub cycles: Option<u32>,
    pub active: Option<bool>,
}

impl<A, C> Default for ListenerPatch<A, C> {
    fn default() -> Self {
        Self {
            callback: None,
            tags: None,
            context: None,
            cycles: None,
            active: None,
        }
    }
}

impl<A, C> ListenerPatch<A, C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(mut self, callback: Callback<A, C>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn context(mut self, context: Option<C>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn cycles(mut self, cycles: u32) -> Self {
        self.cycles = Some(cycles);
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.callback.is_none()
            && self.tags.is_none()
            && self.context.is_none()
            && self.cycles.is_none()
            && self.active.is_none()
    }
}

/// Point-in-time copy of a listener's data.
///
/// The tags are an owned copy; changing them has no effect on the listener.
#[derive(Debug, Clone)]
pub struct ListenerSnapshot<A = Value, C = Value> {
    pub id: ListenerId,
    pub emitter: Option<Emitter<A, C>>,
    pub event: CompactString,
    pub callback: Callback<A, C>,
    pub tags: Vec<CompactString>,
    pub context: Option<C>,
    pub remaining_cycles: u32,
    pub active: bool,
    pub bound: bool,
}

struct ListenerState<A, C> {
    callback: Callback<A, C>,
    tags: Vec<CompactString>,
    context: Option<C>,
    remaining_cycles: u32,
    active: bool,
    bound: bool,
}

struct ListenerInner<A, C> {
    id: ListenerId,
    /// Back-reference only; the emitter owns its listeners, not the other way round
    emitter: Weak<EmitterShared<A, C>>,
    event: CompactString,
    state: Mutex<ListenerState<A, C>>,
}

/// Handle to one subscription.
///
/// Clones share the same record. Methods that change the listener return
/// `&Self` so calls can be chained.
pub struct Listener<A = Value, C = Value> {
    inner: Arc<ListenerInner<A, C>>,
}

impl<A: 'static, C: Clone + 'static> Listener<A, C> {
    /// Creates a listener and registers it on `emitter`, exactly as
    /// [`Emitter::on`] does for a single event.
    pub fn new(
        emitter: &Emitter<A, C>,
        event: impl Into<CompactString>,
        callback: Callback<A, C>,
        tags: Vec<CompactString>,
        context: Option<C>,
        cycles: u32,
    ) -> Self {
        Self::with_options(
            emitter,
            ListenerOptions {
                event: event.into(),
                callback,
                tags,
                context,
                cycles,
            },
        )
    }

    /// Creates and registers a listener from an options struct.
    pub fn with_options(emitter: &Emitter<A, C>, options: ListenerOptions<A, C>) -> Self {
        let listener = Self {
            inner: Arc::new(ListenerInner {
                id: next_listener_id(),
                emitter: emitter.downgrade(),
                event: options.event,
                state: Mutex::new(ListenerState {
                    callback: options.callback,
                    tags: options.tags,
                    context: options.context,
                    remaining_cycles: options.cycles,
                    active: true,
                    bound: true,
                }),
            }),
        };
        emitter.attach(listener.clone());
        listener
    }

    /// Unbinds the listener from its emitter. Does nothing when already unbound.
    pub fn off(&self) -> &Self {
        if !self.is_bound() {
            return self;
        }
        if let Some(emitter) = self.emitter() {
            emitter.detach(&self.inner.event, self.inner.id);
        }
        // Emitter may be gone already; the flag still has to flip.
        self.mark_unbound();
        self
    }

    /// Invokes the callback with the listener's own context.
    pub fn emit(&self, args: &[A]) -> crate::Result<&Self> {
        self.invoke(args, ContextOverride::Inherit)?;
        Ok(self)
    }

    /// Invokes the callback with `context` as the receiver for this call only.
    pub fn emit_with(&self, args: &[A], context: Option<C>) -> crate::Result<&Self> {
        self.invoke(args, ContextOverride::Force(context.as_ref()))?;
        Ok(self)
    }

    /// Runs one invocation. Returns whether the callback actually ran.
    pub(crate) fn invoke(
        &self,
        args: &[A],
        context: ContextOverride<'_, C>,
    ) -> crate::Result<bool> {
        let (callback, stored_context) = {
            let state = self.inner.state.lock();
            if !(state.bound && state.active) {
                return Ok(false);
            }
            let stored = match context {
                ContextOverride::Inherit => state.context.clone(),
                ContextOverride::Force(_) => None,
            };
            (state.callback.clone(), stored)
        };

        let receiver = match context {
            ContextOverride::Inherit => stored_context.as_ref(),
            ContextOverride::Force(forced) => forced,
        };

        trace!("▶️ Invoking listener {} on '{}'", self.inner.id, self.inner.event);
        callback
            .call(receiver, args)
            .map_err(|source| EmitterError::CallbackFailed {
                id: self.inner.id,
                event: self.inner.event.clone(),
                source,
            })?;

        let exhausted = {
            let mut state = self.inner.state.lock();
            if state.remaining_cycles > 0 {
                state.remaining_cycles -= 1;
                state.remaining_cycles == 0
            } else {
                false
            }
        };

        if let Some(shared) = self.inner.emitter.upgrade() {
            shared.record_invocation();
        }

        if exhausted {
            debug!("⏹️ Listener {} on '{}' ran out of cycles", self.inner.id, self.inner.event);
            self.off();
        }

        Ok(true)
    }

    /// Applies a patch. Ignored once the listener is unbound.
    pub fn update(&self, patch: ListenerPatch<A, C>) -> &Self {
        if patch.is_empty() {
            return self;
        }
        let mut state = self.inner.state.lock();
        if !state.bound {
            return self;
        }

        if let Some(callback) = patch.callback {
            if !callback.ptr_eq(&state.callback) {
                state.callback = callback;
            }
        }
        if let Some(tags) = patch.tags {
            if tags != state.tags {
                state.tags = tags;
            }
        }
        if let Some(context) = patch.context {
            state.context = context;
        }
        if let Some(cycles) = patch.cycles {
            state.remaining_cycles = cycles;
        }
        if let Some(active) = patch.active {
            state.active = active;
        }
        self
    }

    /// Copies out the listener's current data.
    pub fn inspect(&self) -> ListenerSnapshot<A, C> {
        let state = self.inner.state.lock();
        ListenerSnapshot {
            id: self.inner.id,
            emitter: self.emitter(),
            event: self.inner.event.clone(),
            callback: state.callback.clone(),
            tags: state.tags.clone(),
            context: state.context.clone(),
            remaining_cycles: state.remaining_cycles,
            active: state.active,
            bound: state.bound,
        }
    }

    pub fn context(&self) -> Option<C> {
        self.inner.state.lock().context.clone()
    }
}

impl<A, C> Listener<A, C> {
    #[inline]
    pub fn id(&self) -> ListenerId {
        self.inner.id
    }

    #[inline]
    pub fn event(&self) -> &str {
        &self.inner.event
    }

    /// The owning emitter, if it is still alive.
    pub fn emitter(&self) -> Option<Emitter<A, C>> {
        self.inner.emitter.upgrade().map(Emitter::from_shared)
    }

    pub fn is_bound(&self) -> bool {
        self.inner.state.lock().bound
    }

    pub fn is_active(&self) -> bool {
        self.inner.state.lock().active
    }

    pub fn remaining_cycles(&self) -> u32 {
        self.inner.state.lock().remaining_cycles
    }

    pub fn tags(&self) -> Vec<CompactString> {
        self.inner.state.lock().tags.clone()
    }

    pub fn callback(&self) -> Callback<A, C> {
        self.inner.state.lock().callback.clone()
    }

    /// Same underlying record.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn has_tags<S: AsRef<str>>(&self, query: &[S]) -> bool {
        query.is_empty() || tags_match(query, &self.inner.state.lock().tags)
    }

    pub(crate) fn is_target(&self, target: &ListenerTarget<A, C>) -> bool {
        match target {
            ListenerTarget::Id(id) => self.inner.id == *id,
            ListenerTarget::Callback(callback) => self.inner.state.lock().callback.ptr_eq(callback),
        }
    }

    /// Flips `bound` to false. Returns whether this call did the flip.
    pub(crate) fn mark_unbound(&self) -> bool {
        let mut state = self.inner.state.lock();
        std::mem::replace(&mut state.bound, false)
    }
}

impl<A, C> Clone for Listener<A, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, C> PartialEq for Listener<A, C> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<A, C> Eq for Listener<A, C> {}

impl<A, C> fmt::Debug for Listener<A, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.inner.id)
            .field("event", &self.inner.event)
            .field("bound", &self.is_bound())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    type Calls = Arc<std::sync::Mutex<Vec<(Option<Value>, Vec<Value>)>>>;

    fn recorder() -> (Callback, Calls) {
        let calls: Calls = Arc::default();
        let log = calls.clone();
        let callback = Callback::new(move |ctx: Option<&Value>, args: &[Value]| {
            log.lock().unwrap().push((ctx.cloned(), args.to_vec()));
            Ok(())
        });
        (callback, calls)
    }

    #[test]
    fn test_defaults_after_construction() {
        let emitter: Emitter = Emitter::new();
        let (callback, _) = recorder();
        let listener = Listener::new(&emitter, "a", callback.clone(), Vec::new(), None, 0);

        let snapshot = listener.inspect();
        assert_eq!(snapshot.event.as_str(), "a");
        assert!(snapshot.callback.ptr_eq(&callback));
        assert!(snapshot.tags.is_empty());
        assert_eq!(snapshot.context, None);
        assert_eq!(snapshot.remaining_cycles, 0);
        assert!(snapshot.active);
        assert!(snapshot.bound);
        assert!(snapshot.emitter.unwrap().ptr_eq(&emitter));
        assert_eq!(emitter.get_listeners("a"), vec![listener]);
    }

    #[test]
    fn test_ids_increase_in_bind_order() {
        let emitter: Emitter = Emitter::new();
        let (callback, _) = recorder();
        let first = Listener::new(&emitter, "a", callback.clone(), Vec::new(), None, 0);
        let second = Listener::new(&emitter, "b", callback, Vec::new(), None, 0);
        assert!(second.id() > first.id());
    }

    #[test]
    fn test_emit_uses_stored_context_unless_forced() {
        let emitter: Emitter = Emitter::new();
        let (callback, calls) = recorder();
        let listener = Listener::with_options(
            &emitter,
            ListenerOptions::new("a", callback).with_context(json!("stored")),
        );

        listener.emit(&[json!(1)]).unwrap();
        listener.emit_with(&[], Some(json!("forced"))).unwrap();
        listener.emit_with(&[], None).unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0], (Some(json!("stored")), vec![json!(1)]));
        assert_eq!(calls[1].0, Some(json!("forced")));
        assert_eq!(calls[2].0, None);
    }

    #[test]
    fn test_cycles_count_down_then_unbind() {
        let emitter: Emitter = Emitter::new();
        let (callback, calls) = recorder();
        let listener =
            Listener::with_options(&emitter, ListenerOptions::new("a", callback).with_cycles(2));

        listener.emit(&[]).unwrap();
        assert_eq!(listener.remaining_cycles(), 1);
        assert!(listener.is_bound());

        listener.emit(&[]).unwrap();
        assert_eq!(listener.remaining_cycles(), 0);
        assert!(!listener.is_bound());
        assert!(emitter.get_listeners("a").is_empty());

        listener.emit(&[]).unwrap().emit(&[]).unwrap();
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_inactive_listener_is_skipped_without_using_cycles() {
        let emitter: Emitter = Emitter::new();
        let (callback, calls) = recorder();
        let listener =
            Listener::with_options(&emitter, ListenerOptions::new("a", callback).with_cycles(1));

        listener.update(ListenerPatch::new().active(false));
        listener.emit(&[]).unwrap();
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(listener.remaining_cycles(), 1);
        assert!(listener.is_bound());

        listener.update(ListenerPatch::new().active(true)).emit(&[]).unwrap();
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert!(!listener.is_bound());
    }

    #[test]
    fn test_update_replaces_mutable_fields() {
        let emitter: Emitter = Emitter::new();
        let (first, first_calls) = recorder();
        let (second, second_calls) = recorder();
        let listener = Listener::with_options(
            &emitter,
            ListenerOptions::new("a", first).with_tags(["old"]).with_cycles(5),
        );

        listener.update(
            ListenerPatch::new()
                .callback(second.clone())
                .tags(["new", "extra"])
                .context(Some(json!({"n": 1})))
                .cycles(3),
        );

        let snapshot = listener.inspect();
        assert!(snapshot.callback.ptr_eq(&second));
        assert_eq!(snapshot.tags, vec![CompactString::new("new"), CompactString::new("extra")]);
        assert_eq!(snapshot.context, Some(json!({"n": 1})));
        assert_eq!(snapshot.remaining_cycles, 3);
        assert_eq!(snapshot.event.as_str(), "a");

        listener.emit(&[]).unwrap();
        assert!(first_calls.lock().unwrap().is_empty());
        assert_eq!(second_calls.lock().unwrap().len(), 1);

        listener.update(ListenerPatch::new().context(None));
        assert_eq!(listener.context(), None);
    }

    #[test]
    fn test_update_after_unbind_is_ignored() {
        let emitter: Emitter = Emitter::new();
        let (callback, _) = recorder();
        let listener = Listener::with_options(&emitter, ListenerOptions::new("a", callback));

        listener.off();
        listener.update(ListenerPatch::new().tags(["late"]).active(false));

        assert!(listener.tags().is_empty());
        assert!(listener.is_active());
        assert!(!listener.is_bound());
    }

    #[test]
    fn test_empty_patch_changes_nothing() {
        let emitter: Emitter = Emitter::new();
        let (callback, _) = recorder();
        let listener =
            Listener::with_options(&emitter, ListenerOptions::new("a", callback).with_tags(["t"]));

        let patch = ListenerPatch::new();
        assert!(patch.is_empty());
        listener.update(patch);
        assert_eq!(listener.tags(), vec![CompactString::new("t")]);
        assert!(listener.is_active());

        let patch: ListenerPatch = ListenerPatch::new().active(false);
        assert!(!patch.is_empty());
        listener.update(patch);
        assert!(!listener.is_active());
    }

    #[test]
    fn test_inspect_returns_owned_tags() {
        let emitter: Emitter = Emitter::new();
        let (callback, _) = recorder();
        let listener =
            Listener::with_options(&emitter, ListenerOptions::new("a", callback).with_tags(["t"]));

        let mut snapshot = listener.inspect();
        snapshot.tags.push(CompactString::new("injected"));
        snapshot.tags[0] = CompactString::new("changed");

        assert_eq!(listener.tags(), vec![CompactString::new("t")]);
    }

    #[test]
    fn test_off_is_idempotent() {
        let emitter: Emitter = Emitter::new();
        let (callback, _) = recorder();
        let listener = Listener::with_options(&emitter, ListenerOptions::new("a", callback));

        listener.off().off();
        assert!(!listener.is_bound());
        assert_eq!(emitter.stats().listeners_unbound, 1);
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn test_off_removes_only_this_listener() {
        let emitter: Emitter = Emitter::new();
        let (callback, _) = recorder();
        let listeners = emitter.on("a a a", callback, None);

        listeners[1].off();
        assert_eq!(emitter.get_listeners("a"), vec![listeners[0].clone(), listeners[2].clone()]);
    }

    #[test]
    fn test_callback_error_propagates_and_keeps_cycle() {
        let emitter: Emitter = Emitter::new();
        let callback = Callback::new(|_: Option<&Value>, _: &[Value]| Err(CallbackError::failed("boom")));
        let listener =
            Listener::with_options(&emitter, ListenerOptions::new("a", callback).with_cycles(1));

        let error = listener.emit(&[]).unwrap_err();
        assert_eq!(error.listener_id(), Some(listener.id()));
        assert!(error.to_string().contains("boom"));
        assert_eq!(listener.remaining_cycles(), 1);
        assert!(listener.is_bound());
    }

    #[test]
    fn test_listener_outlives_emitter() {
        let (callback, calls) = recorder();
        let listener = {
            let emitter: Emitter = Emitter::new();
            Listener::with_options(&emitter, ListenerOptions::new("a", callback).with_cycles(1))
        };

        assert!(listener.emitter().is_none());
        listener.emit(&[]).unwrap();
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert!(!listener.is_bound());
    }
}
