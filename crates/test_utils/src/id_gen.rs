//! Deterministic identifier generation.

use rendezvous_api::id_gen::*;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// An [IdGenerator] that hands out a scripted sequence of ids, then falls
/// back to a counter. Queue the same id twice to force a collision.
#[derive(Debug, Default)]
pub struct ScriptedIdGenerator {
    queue: Mutex<VecDeque<String>>,
    counter: Mutex<u64>,
}

impl ScriptedIdGenerator {
    /// Construct a generator with an empty script.
    pub fn create() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue ids to be returned, in order, before falling back.
    pub fn push<'a>(&self, ids: impl IntoIterator<Item = &'a str>) {
        self.queue
            .lock()
            .unwrap()
            .extend(ids.into_iter().map(|s| s.to_string()));
    }
}

impl IdGenerator for ScriptedIdGenerator {
    /// Scripted ids are returned as-is, ignoring `len`.
    fn generate(&self, len: usize) -> String {
        if let Some(id) = self.queue.lock().unwrap().pop_front() {
            return id;
        }

        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        format!("{:0>len$}", *counter, len = len)
    }
}
