//! End-to-end behaviour of the emitter with non-JSON argument and context types.

use std::sync::{Arc, Mutex};
use venttiseiska::{BindOptions, Callback, Emitter, Listener, ListenerId, ListenerPatch};

type Calls = Arc<Mutex<Vec<(Option<String>, Vec<i64>)>>>;

fn recorder() -> (Callback<i64, String>, Calls) {
    let calls: Calls = Arc::default();
    let log = calls.clone();
    let callback = Callback::new(move |ctx: Option<&String>, args: &[i64]| {
        log.lock().unwrap().push((ctx.cloned(), args.to_vec()));
        Ok(())
    });
    (callback, calls)
}

fn ids(listeners: &[Listener<i64, String>]) -> Vec<ListenerId> {
    listeners.iter().map(Listener::id).collect()
}

#[test]
fn bind_returns_one_listener_per_token() {
    let emitter = Emitter::<i64, String>::new();
    let (callback, _) = recorder();

    let listeners = emitter.on("a:x  :orphan b c:y:z", callback.clone(), Some("ctx".to_string()));

    assert_eq!(listeners.len(), 3);
    let events: Vec<&str> = listeners.iter().map(Listener::event).collect();
    assert_eq!(events, vec!["a", "b", "c"]);
    assert_eq!(listeners[2].tags().len(), 2);
    for listener in &listeners {
        assert_eq!(listener.context().as_deref(), Some("ctx"));
        assert!(listener.callback().ptr_eq(&callback));
    }
}

#[test]
fn emit_without_context_passes_none() {
    let emitter = Emitter::<i64, String>::new();
    let (callback, calls) = recorder();
    emitter.on("x", callback, None);

    emitter.emit("x", &[1, 2, 3]).unwrap();

    assert_eq!(*calls.lock().unwrap(), vec![(None, vec![1, 2, 3])]);
}

#[test]
fn once_fires_exactly_once() {
    let emitter = Emitter::<i64, String>::new();
    let (callback, calls) = recorder();
    let listener = emitter.once("a", callback, None).remove(0);

    emitter.emit("a", &[]).unwrap();
    assert!(!listener.is_bound());
    emitter.emit("a", &[]).unwrap();

    assert_eq!(calls.lock().unwrap().len(), 1);
}

#[test]
fn two_cycles_then_retired() {
    let emitter = Emitter::<i64, String>::new();
    let (callback, calls) = recorder();
    let listener = emitter
        .bind("a", BindOptions::new(callback).with_cycles(2))
        .remove(0);

    let mut bound = vec![listener.is_bound()];
    for _ in 0..4 {
        emitter.emit("a", &[]).unwrap();
        bound.push(listener.is_bound());
    }

    assert_eq!(bound, vec![true, true, false, false, false]);
    assert_eq!(calls.lock().unwrap().len(), 2);
}

#[test]
fn context_override_is_per_call() {
    let emitter = Emitter::<i64, String>::new();
    let (callback, calls) = recorder();
    emitter.on("a", callback, Some("ctxA".to_string()));

    emitter.emit_with("a", &[], Some("ctxB".to_string())).unwrap();
    emitter.emit("a", &[]).unwrap();

    let receivers: Vec<Option<String>> = calls.lock().unwrap().iter().map(|c| c.0.clone()).collect();
    assert_eq!(receivers, vec![Some("ctxB".to_string()), Some("ctxA".to_string())]);
}

#[test]
fn tag_filtered_off_leaves_everything_else() {
    let emitter = Emitter::<i64, String>::new();
    let (callback, _) = recorder();
    let tagged = emitter.on("a:tagA a:tagA:tagB", callback.clone(), None);
    let plain = emitter.on("a a:tagB", callback.clone(), None);
    let other = emitter.on("b:tagA", callback, None);

    emitter.off("a:tagA");

    assert!(tagged.iter().all(|l| !l.is_bound()));
    assert!(plain.iter().all(Listener::is_bound));
    assert!(other[0].is_bound());
    assert_eq!(ids(&emitter.get_listeners("a")), ids(&plain));
}

#[test]
fn multi_event_query_is_deduplicated_in_bind_order() {
    let emitter = Emitter::<i64, String>::new();
    let (callback, _) = recorder();
    let mut expected = emitter.on("a", callback.clone(), None);
    expected.extend(emitter.on("b", callback.clone(), None));
    expected.extend(emitter.on("a:t", callback, None));

    let found = emitter.get_listeners(&["a", "b", "a:t"]);

    assert_eq!(ids(&found), ids(&expected));
}

#[test]
fn off_all_clears_listeners() {
    let emitter = Emitter::<i64, String>::new();
    let (callback, _) = recorder();
    emitter.on("a b c a", callback, None);

    emitter.off_all();

    assert!(emitter.listeners().is_empty());
    assert!(emitter.get_events().is_empty());
}

#[test]
fn patched_tags_change_matching() {
    let emitter = Emitter::<i64, String>::new();
    let (callback, calls) = recorder();
    let listener = emitter.on("a:old", callback, None).remove(0);

    listener.update(ListenerPatch::new().tags(["new"]));
    emitter.emit("a:old", &[]).unwrap();
    emitter.emit("a:new", &[]).unwrap();

    assert_eq!(calls.lock().unwrap().len(), 1);
}

#[test]
fn emptied_events_are_not_reported() {
    let emitter = Emitter::<i64, String>::new();
    let (callback, _) = recorder();
    let listener = emitter.on("a b", callback, None).remove(0);

    listener.off();

    let events: Vec<String> = emitter.get_events().iter().map(|e| e.to_string()).collect();
    assert_eq!(events, vec!["b".to_string()]);
}

#[test]
fn tagged_emit_picks_matching_listener_only() {
    let emitter = Emitter::<i64, String>::new();
    let (fn1, first) = recorder();
    let (fn2, second) = recorder();
    emitter.on("x:tagA", fn1, None);
    emitter.on("x:tagB", fn2, None);

    emitter.emit("x:tagA", &[]).unwrap();

    assert_eq!(first.lock().unwrap().len(), 1);
    assert!(second.lock().unwrap().is_empty());
}
