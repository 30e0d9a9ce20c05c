// Copyright 2025 the VizIR Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Named, ordered event emission.
//!
//! Handlers run synchronously on the emitting thread, in registration order. The handler list
//! is snapshotted before any handler runs, so handlers registered during an emission only see
//! later emissions, and handlers may freely call back into the hub.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hashbrown::HashMap;
use serde_json::Value;
use smallvec::SmallVec;

/// A registered event handler. Receives the emitted arguments positionally.
pub type Listener = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Lifecycle events emitted by a chart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChartEvent {
    /// A render pass is about to compile.
    BeforeRender,
    /// Compilation finished; painting is about to start.
    BeforePaint,
    /// Painting finished.
    AfterPaint,
    /// A render pass completed successfully.
    AfterRender,
    /// A size-triggered render pass completed.
    AfterChangeSize,
    /// The chart was cleared.
    AfterClear,
    /// The chart was destroyed.
    AfterDestroy,
}

impl ChartEvent {
    /// Returns the event name handlers subscribe to.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BeforeRender => "beforerender",
            Self::BeforePaint => "beforepaint",
            Self::AfterPaint => "afterpaint",
            Self::AfterRender => "afterrender",
            Self::AfterChangeSize => "afterchangesize",
            Self::AfterClear => "afterclear",
            Self::AfterDestroy => "afterdestroy",
        }
    }
}

impl AsRef<str> for ChartEvent {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ChartEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
struct Entry {
    listener: Listener,
    once: bool,
}

type Registry = HashMap<String, SmallVec<[Entry; 2]>>;

/// A shared event hub. Cloning yields another reference to the same handler table.
#[derive(Clone, Default)]
pub struct EventHub {
    handlers: Arc<Mutex<Registry>>,
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.lock();
        let mut map = f.debug_map();
        for (name, entries) in table.iter() {
            map.entry(name, &entries.len());
        }
        map.finish()
    }
}

impl EventHub {
    /// Creates a hub with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, event: &str, listener: Listener, once: bool) {
        self.lock()
            .entry(event.to_owned())
            .or_default()
            .push(Entry { listener, once });
    }

    /// Registers a handler that runs on every emission of `event`.
    pub fn on(&self, event: impl AsRef<str>, f: impl Fn(&[Value]) + Send + Sync + 'static) {
        self.register(event.as_ref(), Arc::new(f), false);
    }

    /// Registers a handler that runs on the next emission of `event` only.
    pub fn once(&self, event: impl AsRef<str>, f: impl Fn(&[Value]) + Send + Sync + 'static) {
        self.register(event.as_ref(), Arc::new(f), true);
    }

    /// Removes every handler of `event`.
    pub fn off(&self, event: impl AsRef<str>) {
        self.lock().remove(event.as_ref());
    }

    /// Removes every handler of every event.
    pub fn off_all(&self) {
        self.lock().clear();
    }

    /// Returns the number of handlers registered for `event`.
    pub fn listener_count(&self, event: impl AsRef<str>) -> usize {
        self.lock().get(event.as_ref()).map_or(0, SmallVec::len)
    }

    /// Invokes every handler of `event` in registration order. Returns how many ran.
    pub fn emit(&self, event: impl AsRef<str>, args: &[Value]) -> usize {
        let event = event.as_ref();
        let snapshot: SmallVec<[Listener; 4]> = {
            let mut table = self.lock();
            let Some(entries) = table.get_mut(event) else {
                return 0;
            };
            let snapshot = entries.iter().map(|e| e.listener.clone()).collect();
            entries.retain(|e| !e.once);
            if entries.is_empty() {
                table.remove(event);
            }
            snapshot
        };
        log::trace!("emit `{event}` to {} handler(s)", snapshot.len());
        for listener in &snapshot {
            listener(args);
        }
        snapshot.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, EventHub) {
        (Arc::new(Mutex::new(Vec::new())), EventHub::new())
    }

    #[test]
    fn handlers_run_in_registration_order_with_arguments() {
        let (log, hub) = recorder();
        for tag in ["a", "b", "c"] {
            let log = log.clone();
            hub.on("tick", move |args| {
                log.lock().unwrap().push(format!("{tag}:{}", args[0]));
            });
        }
        assert_eq!(hub.emit("tick", &[json!(7)]), 3);
        assert_eq!(*log.lock().unwrap(), ["a:7", "b:7", "c:7"]);
    }

    #[test]
    fn once_handlers_run_a_single_time() {
        let hub = EventHub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        hub.once(ChartEvent::AfterRender, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        hub.emit(ChartEvent::AfterRender, &[]);
        hub.emit("afterrender", &[]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(hub.listener_count(ChartEvent::AfterRender), 0);
    }

    #[test]
    fn off_removes_every_handler_of_one_event() {
        let hub = EventHub::new();
        hub.on("a", |_| {});
        hub.on("a", |_| {});
        hub.on("b", |_| {});
        hub.off("a");
        assert_eq!(hub.emit("a", &[]), 0);
        assert_eq!(hub.listener_count("b"), 1);
        hub.off_all();
        assert_eq!(hub.listener_count("b"), 0);
    }

    #[test]
    fn handlers_added_during_emission_wait_for_the_next_one() {
        let (log, hub) = recorder();
        let inner_hub = hub.clone();
        let inner_log = log.clone();
        hub.once("go", move |_| {
            let log = inner_log.clone();
            inner_hub.on("go", move |_| log.lock().unwrap().push("late".into()));
        });
        assert_eq!(hub.emit("go", &[]), 1);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(hub.emit("go", &[]), 1);
        assert_eq!(*log.lock().unwrap(), ["late"]);
    }
}
