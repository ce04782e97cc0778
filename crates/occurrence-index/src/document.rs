//! Reusable index documents and the bounded document pool.
//!
//! A [`RecycleDoc`] keeps its field slots across uses so the per-record hot
//! path re-fills existing allocations instead of rebuilding a map per
//! document. The [`DocPool`] is a bounded blocking free-list: when every
//! document is sitting in an unflushed batch, producers block on `acquire`
//! until a flush returns documents to the pool. That block is the
//! pipeline's primary backpressure surface.

use std::collections::HashMap;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Mutex;

use tracing::warn;

use occurrence_types::FieldValue;

use crate::error::IndexError;

/// An immutable snapshot of a built document, as handed to a backend.
///
/// Multi-valued fields appear as repeated `(name, value)` entries, in the
/// order they were added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchDocument {
    fields: Vec<(String, FieldValue)>,
}

impl SearchDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.push((name.into(), value.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn first_value(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn values_of<'a>(&'a self, name: &str) -> Vec<&'a FieldValue> {
        self.fields
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v)
            .collect()
    }

    /// The document id, when one was set.
    pub fn id(&self) -> Option<&str> {
        self.first_value("id").and_then(FieldValue::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

struct FieldSlot {
    name: String,
    values: Vec<FieldValue>,
    live: bool,
}

/// A reusable document. Field slots persist across `reset` so repeated use
/// recycles both the slot vector and the per-slot value vectors.
#[derive(Default)]
pub struct RecycleDoc {
    slots: Vec<FieldSlot>,
    index: HashMap<String, usize>,
}

impl RecycleDoc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark every slot unused, keeping allocations for the next document.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.live = false;
        }
    }

    /// Overwrite an existing field's values in place.
    ///
    /// Returns true only when a slot for the field survived from an earlier
    /// document and this is its first touch this cycle; otherwise the
    /// caller should `add_value` (appending for multi-valued fields).
    pub fn set_field(&mut self, name: &str, value: FieldValue) -> bool {
        if let Some(&i) = self.index.get(name) {
            let slot = &mut self.slots[i];
            if !slot.live {
                slot.live = true;
                slot.values.clear();
                slot.values.push(value);
                return true;
            }
        }
        false
    }

    /// Append a value, creating the slot on first sight of the field.
    pub fn add_value(&mut self, name: &str, value: FieldValue) {
        match self.index.get(name) {
            Some(&i) => {
                let slot = &mut self.slots[i];
                if !slot.live {
                    slot.live = true;
                    slot.values.clear();
                }
                slot.values.push(value);
            }
            None => {
                self.index.insert(name.to_string(), self.slots.len());
                self.slots.push(FieldSlot {
                    name: name.to_string(),
                    values: vec![value],
                    live: true,
                });
            }
        }
    }

    /// Number of live fields in the current document.
    pub fn live_fields(&self) -> usize {
        self.slots.iter().filter(|s| s.live).count()
    }

    /// Snapshot the live slots into an owned [`SearchDocument`].
    pub fn to_document(&self) -> SearchDocument {
        let mut doc = SearchDocument::new();
        for slot in self.slots.iter().filter(|s| s.live) {
            for value in &slot.values {
                doc.add(slot.name.clone(), value.clone());
            }
        }
        doc
    }
}

/// Bounded blocking pool of [`RecycleDoc`]s.
pub struct DocPool {
    tx: SyncSender<RecycleDoc>,
    rx: Mutex<Receiver<RecycleDoc>>,
    capacity: usize,
}

impl DocPool {
    /// Create a pool holding exactly `capacity` documents.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = sync_channel(capacity);
        for _ in 0..capacity {
            // channel was just created with this capacity
            let _ = tx.try_send(RecycleDoc::new());
        }
        Self {
            tx,
            rx: Mutex::new(rx),
            capacity,
        }
    }

    /// Take a document, blocking until one is free.
    pub fn acquire(&self) -> Result<RecycleDoc, IndexError> {
        let rx = self
            .rx
            .lock()
            .map_err(|e| IndexError::Pool(e.to_string()))?;
        rx.recv()
            .map_err(|_| IndexError::Pool("document pool disconnected".to_string()))
    }

    /// Return a document to the pool.
    pub fn release(&self, doc: RecycleDoc) {
        match self.tx.try_send(doc) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                // foreign document; the pool never hands out more than
                // capacity, so dropping it keeps the invariant
                warn!("Document released into a full pool, dropping");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
