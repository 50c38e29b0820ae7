//! Per-call bookkeeping for graph saves.

use std::collections::{HashMap, HashSet};

use crate::core::object::ObjectId;
use crate::core::value::AssociationRef;

/// State of one top-level save (or class synthesis) call.
///
/// Objects reachable through several paths are written once; an object met
/// again while its own save is still running is a cycle and gets a
/// placeholder row instead of a recursive save.
#[derive(Debug, Default)]
pub struct Session {
    saved: HashMap<ObjectId, AssociationRef>,
    in_progress: HashSet<ObjectId>,
    schemas_ready: HashSet<String>,
    schemas_in_progress: HashSet<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference of an object already written during this call.
    pub fn saved(&self, id: ObjectId) -> Option<&AssociationRef> {
        self.saved.get(&id)
    }

    pub fn is_in_progress(&self, id: ObjectId) -> bool {
        self.in_progress.contains(&id)
    }

    pub fn begin_object(&mut self, id: ObjectId) {
        self.in_progress.insert(id);
    }

    pub fn finish_object(&mut self, id: ObjectId, reference: AssociationRef) {
        self.in_progress.remove(&id);
        self.saved.insert(id, reference);
    }

    pub fn objects_saved(&self) -> usize {
        self.saved.len()
    }

    pub fn schema_ready(&self, table: &str) -> bool {
        self.schemas_ready.contains(table)
    }

    /// Mark a table as being synthesized. Returns `false` if it already is,
    /// which means a class default refers back to its own class.
    pub fn begin_schema(&mut self, table: &str) -> bool {
        self.schemas_in_progress.insert(table.to_string())
    }

    pub fn finish_schema(&mut self, table: &str) {
        self.schemas_in_progress.remove(table);
        self.schemas_ready.insert(table.to_string());
    }

    /// Forget synthesized tables, e.g. after one was dropped.
    pub fn forget_schema(&mut self, table: &str) {
        self.schemas_ready.remove(table);
    }
}
