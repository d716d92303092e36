//! The emitter: listener registry, binding, unbinding and dispatch.

use crate::config::EmitterConfig;
use crate::listener::{
    Callback, ContextOverride, Listener, ListenerId, ListenerOptions, ListenerPatch,
    ListenerTarget,
};
use crate::query::{parse_events, EventSelector};
use crate::stats::EmitterStats;
use compact_str::CompactString;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

type ListenerList<A, C> = SmallVec<[Listener<A, C>; 4]>;

/// Options for [`Emitter::bind`]; the struct form of [`Emitter::on`].
pub struct BindOptions<A = Value, C = Value> {
    pub callback: Callback<A, C>,
    pub context: Option<C>,
    /// Invocations before each listener unbinds itself, `0` for unlimited
    pub cycles: u32,
}

impl<A, C> BindOptions<A, C> {
    pub fn new(callback: Callback<A, C>) -> Self {
        Self {
            callback,
            context: None,
            cycles: 0,
        }
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

pub(crate) struct EmitterShared<A, C> {
    config: EmitterConfig,
    /// Event name to listeners in bind order. Emptied keys are kept.
    listeners: DashMap<CompactString, ListenerList<A, C>>,
    stats: Mutex<EmitterStats>,
}

impl<A, C> EmitterShared<A, C> {
    pub(crate) fn record_invocation(&self) {
        self.stats.lock().listeners_invoked += 1;
    }
}

/// One independent namespace of event subscriptions.
///
/// `Emitter` is a cheap handle: clones share the same registry. Everything is
/// synchronous; callbacks run on the calling thread before `emit` returns and
/// may freely call back into the emitter, since no lock is held while a
/// callback runs.
///
/// ```rust
/// use venttiseiska::{Callback, Emitter};
/// use serde_json::{json, Value};
///
/// let emitter: Emitter = Emitter::new();
/// emitter.on(
///     "greet:loud",
///     Callback::new(|_ctx: Option<&Value>, args: &[Value]| {
///         println!("hello {}", args[0]);
///         Ok(())
///     }),
///     None,
/// );
/// emitter.emit("greet:loud", &[json!("world")]).unwrap();
/// ```
pub struct Emitter<A = Value, C = Value> {
    shared: Arc<EmitterShared<A, C>>,
}

impl<A: 'static, C: Clone + 'static> Emitter<A, C> {
    /// Creates an emitter with the default query grammar.
    pub fn new() -> Self {
        Self::with_config(EmitterConfig::default())
    }

    /// Creates an emitter with custom delimiters and reporting.
    pub fn with_config(config: EmitterConfig) -> Self {
        Self {
            shared: Arc::new(EmitterShared {
                config,
                listeners: DashMap::new(),
                stats: Mutex::new(EmitterStats::default()),
            }),
        }
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.shared.config
    }

    /// Binds `callback` to every event in `events`. Returns one listener per
    /// parsed event token, in token order.
    pub fn on<E>(&self, events: &E, callback: Callback<A, C>, context: Option<C>) -> Vec<Listener<A, C>>
    where
        E: EventSelector + ?Sized,
    {
        self.bind(
            events,
            BindOptions {
                callback,
                context,
                cycles: 0,
            },
        )
    }

    /// Like [`Emitter::on`] but each listener fires once.
    ///
    /// The cycle is only used up after the callback returns, so a callback
    /// that emits its own event again re-enters itself without bound. Call
    /// [`Listener::off`] first if the callback has to re-emit.
    pub fn once<E>(&self, events: &E, callback: Callback<A, C>, context: Option<C>) -> Vec<Listener<A, C>>
    where
        E: EventSelector + ?Sized,
    {
        self.bind(
            events,
            BindOptions {
                callback,
                context,
                cycles: 1,
            },
        )
    }

    /// Binds listeners from an options struct.
    pub fn bind<E>(&self, events: &E, options: BindOptions<A, C>) -> Vec<Listener<A, C>>
    where
        E: EventSelector + ?Sized,
    {
        parse_events(events, &self.shared.config)
            .into_iter()
            .map(|query| {
                Listener::with_options(
                    self,
                    ListenerOptions {
                        event: CompactString::new(query.event),
                        callback: options.callback.clone(),
                        tags: query.tags.iter().map(|tag| CompactString::new(tag)).collect(),
                        context: options.context.clone(),
                        cycles: options.cycles,
                    },
                )
            })
            .collect()
    }

    /// [`Emitter::bind`] with `cycles` forced to 1.
    pub fn bind_once<E>(&self, events: &E, options: BindOptions<A, C>) -> Vec<Listener<A, C>>
    where
        E: EventSelector + ?Sized,
    {
        self.bind(events, options.with_cycles(1))
    }

    /// Unbinds every listener of every event.
    pub fn off_all(&self) {
        let mut removed = Vec::new();
        for mut entry in self.shared.listeners.iter_mut() {
            removed.extend(entry.value_mut().drain(..));
        }
        self.retire(removed);
    }

    /// Unbinds listeners of the given events. A token with tags only removes
    /// listeners carrying all of those tags; a bare token removes every
    /// listener of that event.
    pub fn off<E>(&self, events: &E)
    where
        E: EventSelector + ?Sized,
    {
        self.remove_matching(events, None);
    }

    /// Unbinds listeners of the given events that also match `target`, either
    /// by id or by callback identity. Tags in the query still apply.
    pub fn off_target<E>(&self, events: &E, target: impl Into<ListenerTarget<A, C>>)
    where
        E: EventSelector + ?Sized,
    {
        self.remove_matching(events, Some(&target.into()));
    }

    fn remove_matching<E>(&self, events: &E, target: Option<&ListenerTarget<A, C>>)
    where
        E: EventSelector + ?Sized,
    {
        let mut removed = Vec::new();

        for query in parse_events(events, &self.shared.config) {
            let Some(mut listeners) = self.shared.listeners.get_mut(query.event) else {
                continue;
            };

            if target.is_none() && !query.has_tags() {
                removed.extend(listeners.drain(..));
                continue;
            }

            // Walk backwards so removals do not shift unvisited entries.
            let mut index = listeners.len();
            while index > 0 {
                index -= 1;
                let listener = &listeners[index];
                let selected = listener.has_tags(&query.tags)
                    && target.map_or(true, |target| listener.is_target(target));
                if selected {
                    removed.push(listeners.remove(index));
                }
            }
        }

        self.retire(removed);
    }

    /// Removes one listener by event and id.
    pub(crate) fn detach(&self, event: &str, id: ListenerId) {
        let removed = self.shared.listeners.get_mut(event).and_then(|mut listeners| {
            let index = listeners.iter().position(|listener| listener.id() == id)?;
            Some(listeners.remove(index))
        });
        self.retire(removed);
    }

    fn retire(&self, removed: impl IntoIterator<Item = Listener<A, C>>) {
        let mut count = 0;
        for listener in removed {
            if listener.mark_unbound() {
                debug!("🔌 Unbound listener {} from '{}'", listener.id(), listener.event());
                count += 1;
            }
        }
        if count > 0 {
            self.shared.stats.lock().listeners_unbound += count;
        }
    }

    pub(crate) fn attach(&self, listener: Listener<A, C>) {
        debug!("📝 Bound listener {} to '{}'", listener.id(), listener.event());
        self.shared
            .listeners
            .entry(CompactString::new(listener.event()))
            .or_insert_with(SmallVec::new)
            .push(listener);
        self.shared.stats.lock().listeners_bound += 1;
    }

    /// Emits events, each listener receiving its own stored context.
    pub fn emit<E>(&self, events: &E, args: &[A]) -> crate::Result<()>
    where
        E: EventSelector + ?Sized,
    {
        self.dispatch(events, args, ContextOverride::Inherit)
    }

    /// Emits events with `context` as every invoked listener's receiver,
    /// `None` included.
    pub fn emit_with<E>(&self, events: &E, args: &[A], context: Option<C>) -> crate::Result<()>
    where
        E: EventSelector + ?Sized,
    {
        self.dispatch(events, args, ContextOverride::Force(context.as_ref()))
    }

    fn dispatch<E>(&self, events: &E, args: &[A], context: ContextOverride<'_, C>) -> crate::Result<()>
    where
        E: EventSelector + ?Sized,
    {
        self.shared.stats.lock().events_emitted += 1;

        for query in parse_events(events, &self.shared.config) {
            // Snapshot so callbacks can bind and unbind while we iterate.
            let listeners: ListenerList<A, C> = self
                .shared
                .listeners
                .get(query.event)
                .map(|entry| entry.value().clone())
                .unwrap_or_default();

            if listeners.is_empty() {
                if self.shared.config.warn_on_unhandled {
                    warn!("⚠️ No listeners for event: {}", query.event);
                }
                continue;
            }

            for listener in &listeners {
                if listener.has_tags(&query.tags) {
                    listener.invoke(args, context)?;
                }
            }
        }

        Ok(())
    }

    /// Temporarily mutes the matching listeners without unbinding them.
    pub fn disable<E>(&self, events: &E)
    where
        E: EventSelector + ?Sized,
    {
        for listener in self.get_listeners(events) {
            listener.update(ListenerPatch::new().active(false));
        }
    }

    /// Reactivates the matching listeners.
    pub fn enable<E>(&self, events: &E)
    where
        E: EventSelector + ?Sized,
    {
        for listener in self.get_listeners(events) {
            listener.update(ListenerPatch::new().active(true));
        }
    }

    pub fn disable_all(&self) {
        self.disable(&self.get_events());
    }

    pub fn enable_all(&self) {
        self.enable(&self.get_events());
    }

    /// Names of events that currently have at least one listener.
    pub fn get_events(&self) -> Vec<CompactString> {
        self.shared
            .listeners
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Listeners matching `events`. When more than one token is queried the
    /// result is de-duplicated and ordered by id, i.e. bind order.
    pub fn get_listeners<E>(&self, events: &E) -> Vec<Listener<A, C>>
    where
        E: EventSelector + ?Sized,
    {
        let queries = parse_events(events, &self.shared.config);
        let mut found = Vec::new();

        for query in &queries {
            if let Some(listeners) = self.shared.listeners.get(query.event) {
                found.extend(
                    listeners
                        .iter()
                        .filter(|listener| listener.has_tags(&query.tags))
                        .cloned(),
                );
            }
        }

        if queries.len() > 1 && found.len() > 1 {
            let mut seen = HashSet::with_capacity(found.len());
            found.retain(|listener| seen.insert(listener.id()));
            found.sort_by_key(Listener::id);
        }

        found
    }

    /// Every registered listener in bind order.
    pub fn listeners(&self) -> Vec<Listener<A, C>> {
        self.get_listeners(&self.get_events())
    }

    /// Number of registered listeners across all events.
    pub fn listener_count(&self) -> usize {
        self.shared.listeners.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn stats(&self) -> EmitterStats {
        self.shared.stats.lock().clone()
    }
}

impl<A, C> Emitter<A, C> {
    pub(crate) fn from_shared(shared: Arc<EmitterShared<A, C>>) -> Self {
        Self { shared }
    }

    pub(crate) fn downgrade(&self) -> Weak<EmitterShared<A, C>> {
        Arc::downgrade(&self.shared)
    }

    /// Whether both handles refer to the same emitter.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<A: 'static, C: Clone + 'static> Default for Emitter<A, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, C> Clone for Emitter<A, C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A, C> fmt::Debug for Emitter<A, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("config", &self.shared.config)
            .field("events", &self.shared.listeners.len())
            .finish()
    }
}
