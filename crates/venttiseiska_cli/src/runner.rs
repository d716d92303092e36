//! Replays a [`Scenario`] against a JSON emitter and records every callback
//! invocation.

use crate::config::{Scenario, Step};
use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use venttiseiska::{BindOptions, Callback, EmitterStats, JsonEmitter, ListenerTarget};

/// One callback invocation observed while replaying.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invocation {
    /// Index of the step that caused the call
    pub step: usize,
    /// Label of the bind entry whose callback ran
    pub label: String,
    /// Receiver passed to the callback
    pub context: Option<Value>,
    pub args: Vec<Value>,
}

/// Outcome of a full replay.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub invocations: Vec<Invocation>,
    /// Event names still holding listeners, sorted
    pub events: Vec<String>,
    pub stats: EmitterStats,
}

/// Scenario replay state.
pub struct ScenarioRunner {
    emitter: JsonEmitter,
    callbacks: HashMap<String, Callback>,
    invocations: Arc<Mutex<Vec<Invocation>>>,
    current_step: Arc<AtomicUsize>,
}

impl ScenarioRunner {
    /// Creates the emitter and binds every `[[bind]]` entry.
    pub fn new(scenario: &Scenario) -> Self {
        let emitter = JsonEmitter::with_config(scenario.emitter.clone());
        let invocations = Arc::new(Mutex::new(Vec::new()));
        let current_step = Arc::new(AtomicUsize::new(0));
        let mut callbacks = HashMap::new();

        for bind in &scenario.bind {
            let callback = recording_callback(&bind.label, &invocations, &current_step);
            let mut options = BindOptions::new(callback.clone()).with_cycles(bind.effective_cycles());
            if let Some(context) = &bind.context {
                options = options.with_context(context.clone());
            }
            let listeners = emitter.bind(bind.events.as_str(), options);
            debug!("🔧 Bound '{}' to {} event(s)", bind.label, listeners.len());
            callbacks.insert(bind.label.clone(), callback);
        }

        Self {
            emitter,
            callbacks,
            invocations,
            current_step,
        }
    }

    pub fn emitter(&self) -> &JsonEmitter {
        &self.emitter
    }

    /// Applies a single step.
    pub fn apply(&self, index: usize, step: &Step) -> anyhow::Result<()> {
        self.current_step.store(index, Ordering::SeqCst);
        match step {
            Step::Emit {
                events,
                args,
                context,
                clear_context,
            } => {
                let result = match (context, clear_context) {
                    (Some(context), _) => {
                        self.emitter.emit_with(events.as_str(), args, Some(context.clone()))
                    }
                    (None, true) => self.emitter.emit_with(events.as_str(), args, None),
                    (None, false) => self.emitter.emit(events.as_str(), args),
                };
                result.with_context(|| format!("Step {index}: emit '{events}' failed"))?;
            }
            Step::Off { events, label, id } => {
                let target = match (label, id) {
                    (Some(label), _) => Some(ListenerTarget::Callback(
                        self.callbacks
                            .get(label)
                            .cloned()
                            .with_context(|| format!("Step {index}: unknown bind label '{label}'"))?,
                    )),
                    (None, Some(id)) => Some(ListenerTarget::Id(*id)),
                    (None, None) => None,
                };
                match (events, target) {
                    (None, None) => self.emitter.off_all(),
                    (Some(events), None) => self.emitter.off(events.as_str()),
                    (Some(events), Some(target)) => self.emitter.off_target(events.as_str(), target),
                    (None, Some(target)) => {
                        // Targeted removal without events scans every event name.
                        let names = self.emitter.get_events();
                        self.emitter.off_target(&names, target);
                    }
                }
            }
            Step::Disable { events } => match events {
                Some(events) => self.emitter.disable(events.as_str()),
                None => self.emitter.disable_all(),
            },
            Step::Enable { events } => match events {
                Some(events) => self.emitter.enable(events.as_str()),
                None => self.emitter.enable_all(),
            },
        }
        Ok(())
    }

    /// Replays every step and returns the report.
    pub fn run(self, steps: &[Step]) -> anyhow::Result<Report> {
        for (index, step) in steps.iter().enumerate() {
            self.apply(index, step)?;
        }
        let report = self.report();
        info!(
            "✅ Scenario finished: {} invocation(s) across {} step(s)",
            report.invocations.len(),
            steps.len()
        );
        Ok(report)
    }

    /// Snapshot of everything recorded so far.
    pub fn report(&self) -> Report {
        let mut events: Vec<String> = self
            .emitter
            .get_events()
            .into_iter()
            .map(|name| name.to_string())
            .collect();
        events.sort();
        let invocations = match self.invocations.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        Report {
            invocations,
            events,
            stats: self.emitter.stats(),
        }
    }
}

/// Replays `scenario` from start to end.
pub fn run_scenario(scenario: &Scenario) -> anyhow::Result<Report> {
    ScenarioRunner::new(scenario).run(&scenario.step)
}

fn recording_callback(
    label: &str,
    invocations: &Arc<Mutex<Vec<Invocation>>>,
    current_step: &Arc<AtomicUsize>,
) -> Callback {
    let label = label.to_string();
    let invocations = invocations.clone();
    let current_step = current_step.clone();
    Callback::new(move |context: Option<&Value>, args: &[Value]| {
        let invocation = Invocation {
            step: current_step.load(Ordering::SeqCst),
            label: label.clone(),
            context: context.cloned(),
            args: args.to_vec(),
        };
        match invocations.lock() {
            Ok(mut guard) => guard.push(invocation),
            Err(poisoned) => poisoned.into_inner().push(invocation),
        }
        Ok(())
    })
}
