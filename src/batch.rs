//! Per-request grouping of events into subjects.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::protocol::messages as pb;
use crate::state::StateEntry;
use crate::subject::Subject;

type KeyedStates = HashMap<String, Vec<StateEntry>>;

/// Builds one [`Subject`] per distinct key seen in a batch request.
///
/// Subjects are created lazily on first reference and kept in creation
/// order, which is also the order of the response.
#[derive(Debug, Default)]
pub struct SubjectBatch {
    subjects: Vec<Subject>,
    index: HashMap<Vec<u8>, usize>,
    state: HashMap<Vec<u8>, KeyedStates>,
}

impl SubjectBatch {
    /// Create a batch from the per-key state the engine pre-fetched.
    pub fn new(key_states: Vec<pb::KeyState>) -> Self {
        let state = key_states
            .into_iter()
            .map(|key_state| {
                let namespaces = key_state
                    .state_entry_namespaces
                    .into_iter()
                    .map(|ns| {
                        let entries = ns.entries.into_iter().map(StateEntry::from).collect();
                        (ns.namespace, entries)
                    })
                    .collect();
                (key_state.key, namespaces)
            })
            .collect();

        Self {
            subjects: Vec::new(),
            index: HashMap::new(),
            state,
        }
    }

    /// Get the subject for `key`, creating it on first use.
    ///
    /// A returning key has its timestamp moved to `timestamp`.
    pub fn subject_for(&mut self, key: &[u8], timestamp: DateTime<Utc>) -> &mut Subject {
        if let Some(&idx) = self.index.get(key) {
            let subject = &mut self.subjects[idx];
            subject.set_timestamp(timestamp);
            return subject;
        }

        let state = self.state.remove(key).unwrap_or_default();
        let idx = self.subjects.len();
        self.subjects.push(Subject::new(key.to_vec(), timestamp, state));
        self.index.insert(key.to_vec(), idx);
        &mut self.subjects[idx]
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    /// Assemble the response: one key result per subject plus every sink
    /// request, both in subject creation order.
    pub fn response(mut self) -> Result<pb::ProcessEventBatchResponse> {
        let mut response = pb::ProcessEventBatchResponse {
            key_results: Vec::with_capacity(self.subjects.len()),
            sink_requests: Vec::new(),
        };
        for subject in &mut self.subjects {
            response.key_results.push(subject.encode()?);
            response.sink_requests.extend(subject.take_sink_requests());
        }
        Ok(response)
    }
}
