//! Deferred task queue
//!
//! Stands in for the host's microtask checkpoint: mutation-observer
//! notification, the backup element queue drain and resolved `when_defined`
//! callbacks are queued here and run when the host calls
//! [`Document::run_deferred`] once per turn.

use std::collections::VecDeque;

use crate::document::Document;

/// Deferred unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Microtask {
    NotifyMutationObservers,
    DrainBackupElementQueue,
    /// Run the oldest resolved `when_defined` callback
    ResolveWhenDefined,
}

#[derive(Debug, Default)]
pub(crate) struct MicrotaskQueue {
    queue: VecDeque<Microtask>,
}

impl MicrotaskQueue {
    pub(crate) fn enqueue(&mut self, task: Microtask) {
        self.queue.push_back(task);
    }

    fn pop(&mut self) -> Option<Microtask> {
        self.queue.pop_front()
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

impl Document {
    /// Run every queued deferred task, including ones queued while running
    pub fn run_deferred(&mut self) {
        let mut ran = 0usize;
        while let Some(task) = self.microtasks.pop() {
            match task {
                Microtask::NotifyMutationObservers => self.notify_mutation_observers(),
                Microtask::DrainBackupElementQueue => self.drain_backup_element_queue(),
                Microtask::ResolveWhenDefined => self.run_when_defined_callback(),
            }
            ran += 1;
        }
        if ran > 0 {
            tracing::trace!("Deferred phase ran {} task(s)", ran);
        }
    }

    pub fn has_pending_deferred(&self) -> bool {
        !self.microtasks.is_empty()
    }

    /// Number of queued deferred tasks
    pub fn pending_deferred_count(&self) -> usize {
        self.microtasks.len()
    }
}
