//! The per-key execution context handed to user callbacks.
//!
//! A [`Subject`] lives for exactly one batch request. It carries the key and
//! event timestamp, the state rows the engine pre-fetched for that key, and
//! everything the callbacks produce: timers, sink requests, and the state
//! items they touched.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::protocol::messages as pb;
use crate::protocol::to_timestamp;
use crate::state::{StateEntry, StateMutation};

/// Renders the pending mutations of a cached state item.
///
/// Called with the instance cached under the same name.
pub type LazyMutations =
    Box<dyn Fn(&(dyn Any + Send)) -> Result<Vec<StateMutation>> + Send + Sync>;

pub struct Subject {
    key: Vec<u8>,
    timestamp: DateTime<Utc>,
    state: HashMap<String, Vec<StateEntry>>,
    timers: Vec<DateTime<Utc>>,
    sink_requests: Vec<pb::SinkRequest>,
    // sorted so namespaces encode in a stable order
    used_states: BTreeMap<String, LazyMutations>,
    loaded_states: HashMap<String, Box<dyn Any + Send>>,
}

impl Subject {
    pub fn new(
        key: Vec<u8>,
        timestamp: DateTime<Utc>,
        state: HashMap<String, Vec<StateEntry>>,
    ) -> Self {
        Self {
            key,
            timestamp,
            state,
            timers: Vec::new(),
            sink_requests: Vec::new(),
            used_states: BTreeMap::new(),
            loaded_states: HashMap::new(),
        }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Timestamp of the event or timer currently being handled.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub(crate) fn set_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.timestamp = timestamp;
    }

    /// Register a timer that fires once the watermark passes `timestamp`.
    ///
    /// Timers are not deduplicated.
    pub fn set_timer(&mut self, timestamp: DateTime<Utc>) {
        self.timers.push(timestamp);
    }

    pub fn timers(&self) -> &[DateTime<Utc>] {
        &self.timers
    }

    /// The rows the engine delivered for a named state.
    pub fn state_entries(&self, name: &str) -> &[StateEntry] {
        self.state.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Record that a named state was used. A second registration replaces
    /// the first.
    pub fn register_state_use(&mut self, name: &str, mutations: LazyMutations) {
        self.used_states.insert(name.to_string(), mutations);
    }

    /// Buffer a request for the engine to deliver `payload` to a sink.
    pub fn add_sink_request(&mut self, sink_id: impl Into<String>, payload: Vec<u8>) {
        self.sink_requests.push(pb::SinkRequest {
            id: sink_id.into(),
            value: payload,
        });
    }

    pub fn sink_requests(&self) -> &[pb::SinkRequest] {
        &self.sink_requests
    }

    pub(crate) fn take_sink_requests(&mut self) -> Vec<pb::SinkRequest> {
        std::mem::take(&mut self.sink_requests)
    }

    pub(crate) fn has_loaded_state(&self, name: &str) -> bool {
        self.loaded_states.contains_key(name)
    }

    pub(crate) fn store_loaded_state(&mut self, name: &str, state: Box<dyn Any + Send>) {
        self.loaded_states.insert(name.to_string(), state);
    }

    pub(crate) fn loaded_state_mut<T: Any>(&mut self, name: &str) -> Option<&mut T> {
        self.loaded_states.get_mut(name)?.downcast_mut::<T>()
    }

    /// Render this subject's timers and coalesced state mutations.
    ///
    /// Per namespace only the latest mutation of each row key survives, and
    /// rows are sorted by key. Namespaces are sorted by name.
    ///
    /// # Errors
    ///
    /// [`Error::Internal`] if a touched state fails to render its mutations.
    /// Callbacks have already run at this point, so the whole response must
    /// be abandoned.
    pub fn encode(&self) -> Result<pb::KeyResult> {
        let mut namespaces = Vec::with_capacity(self.used_states.len());
        for (name, mutations_of) in &self.used_states {
            let mutations = self
                .loaded_states
                .get(name)
                .ok_or_else(|| Error::Internal(format!("state {name} was used but never loaded")))
                .and_then(|state| mutations_of(&**state))
                .map_err(|err| {
                    tracing::error!(state = %name, error = %err, "Failed to render state mutations");
                    Error::Internal(format!("failed to get mutations for state {name}: {err}"))
                })?;

            let mut latest = BTreeMap::new();
            for mutation in mutations {
                latest.insert(mutation.key().to_vec(), mutation);
            }

            namespaces.push(pb::StateMutationNamespace {
                namespace: name.clone(),
                mutations: latest.into_values().map(StateMutation::into_wire).collect(),
            });
        }

        Ok(pb::KeyResult {
            key: self.key.clone(),
            new_timers: self.timers.iter().map(to_timestamp).collect(),
            state_mutation_namespaces: namespaces,
        })
    }
}

impl std::fmt::Debug for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subject")
            .field("key", &self.key)
            .field("timestamp", &self.timestamp)
            .field("timers", &self.timers.len())
            .field("sink_requests", &self.sink_requests.len())
            .field("used_states", &self.used_states.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::state_mutation::Mutation;
    use chrono::Duration;

    fn subject() -> Subject {
        Subject::new(b"user-1".to_vec(), DateTime::<Utc>::UNIX_EPOCH, HashMap::new())
    }

    /// A state item whose rendered mutations are fixed up front.
    struct Scripted(Vec<StateMutation>);

    fn use_scripted(subject: &mut Subject, name: &str, mutations: Vec<StateMutation>) {
        subject.store_loaded_state(name, Box::new(Scripted(mutations)));
        subject.register_state_use(
            name,
            Box::new(|item: &(dyn Any + Send)| {
                let scripted = item.downcast_ref::<Scripted>().unwrap();
                Ok(scripted.0.clone())
            }),
        );
    }

    fn put(key: &str, value: &str) -> StateMutation {
        StateMutation::Put {
            key: key.as_bytes().to_vec(),
            value: value.as_bytes().to_vec(),
        }
    }

    fn delete(key: &str) -> StateMutation {
        StateMutation::Delete {
            key: key.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_timers_keep_call_order() {
        let mut subject = subject();
        let later = DateTime::<Utc>::UNIX_EPOCH + Duration::hours(2);
        let sooner = DateTime::<Utc>::UNIX_EPOCH + Duration::hours(1);
        subject.set_timer(later);
        subject.set_timer(sooner);
        subject.set_timer(sooner);

        let result = subject.encode().unwrap();
        let seconds: Vec<_> = result.new_timers.iter().map(|t| t.seconds).collect();
        assert_eq!(seconds, vec![7200, 3600, 3600]);
    }

    #[test]
    fn test_coalesce_latest_wins_sorted() {
        let mut subject = subject();
        use_scripted(
            &mut subject,
            "counts",
            vec![put("b", "1"), put("a", "1"), delete("b"), put("a", "2")],
        );

        let result = subject.encode().unwrap();
        let namespace = &result.state_mutation_namespaces[0];
        assert_eq!(namespace.namespace, "counts");
        assert_eq!(
            namespace.mutations,
            vec![put("a", "2").into_wire(), delete("b").into_wire()]
        );
    }

    #[test]
    fn test_encode_is_deterministic() {
        let mut subject = subject();
        use_scripted(&mut subject, "z", vec![put("k", "v")]);
        use_scripted(&mut subject, "a", vec![put("y", "1"), put("x", "1")]);

        let first = subject.encode().unwrap();
        let second = subject.encode().unwrap();
        assert_eq!(first, second);

        let names: Vec<_> = first
            .state_mutation_namespaces
            .iter()
            .map(|ns| ns.namespace.as_str())
            .collect();
        assert_eq!(names, vec!["a", "z"]);
        assert!(matches!(
            &first.state_mutation_namespaces[0].mutations[0].mutation,
            Some(Mutation::Put(p)) if p.key == b"x"
        ));
    }

    #[test]
    fn test_second_registration_replaces() {
        let mut subject = subject();
        use_scripted(&mut subject, "s", vec![put("old", "1")]);
        use_scripted(&mut subject, "s", vec![put("new", "1")]);

        let result = subject.encode().unwrap();
        assert_eq!(result.state_mutation_namespaces.len(), 1);
        assert_eq!(
            result.state_mutation_namespaces[0].mutations,
            vec![put("new", "1").into_wire()]
        );
    }

    #[test]
    fn test_sink_requests_keep_call_order() {
        let mut subject = subject();
        subject.add_sink_request("sink", b"1".to_vec());
        subject.add_sink_request("other", b"2".to_vec());
        subject.add_sink_request("sink", b"3".to_vec());

        let values: Vec<_> = subject
            .sink_requests()
            .iter()
            .map(|r| (r.id.as_str(), r.value.clone()))
            .collect();
        assert_eq!(
            values,
            vec![
                ("sink", b"1".to_vec()),
                ("other", b"2".to_vec()),
                ("sink", b"3".to_vec()),
            ]
        );
    }

    #[test]
    fn test_failing_producer_is_internal_error() {
        let mut subject = subject();
        subject.store_loaded_state("broken", Box::new(()));
        subject.register_state_use(
            "broken",
            Box::new(|_: &(dyn Any + Send)| Err(Error::Internal("boom".to_string()))),
        );

        let err = subject.encode().unwrap_err();
        assert!(matches!(err, Error::Internal(ref msg) if msg.contains("broken")));
    }

    #[test]
    fn test_state_entries_missing_is_empty() {
        let subject = subject();
        assert!(subject.state_entries("nope").is_empty());
    }

    mod props {
        use super::*;
        use prost::Message;
        use proptest::prelude::*;

        fn mutation() -> impl Strategy<Value = StateMutation> {
            let key = prop::collection::vec(0u8..4, 0..3);
            prop_oneof![
                (key.clone(), prop::collection::vec(any::<u8>(), 0..4))
                    .prop_map(|(key, value)| StateMutation::Put { key, value }),
                key.prop_map(|key| StateMutation::Delete { key }),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

            #[test]
            fn encode_coalesces_to_latest_sorted(
                scripts in prop::collection::btree_map("[a-c]", prop::collection::vec(mutation(), 0..20), 0..3)
            ) {
                let mut subject = subject();
                for (name, script) in &scripts {
                    use_scripted(&mut subject, name, script.clone());
                }

                let first = subject.encode().unwrap();
                let second = subject.encode().unwrap();
                prop_assert_eq!(first.encode_to_vec(), second.encode_to_vec());

                let names: Vec<_> = first
                    .state_mutation_namespaces
                    .iter()
                    .map(|ns| ns.namespace.clone())
                    .collect();
                prop_assert_eq!(names, scripts.keys().cloned().collect::<Vec<_>>());

                for namespace in &first.state_mutation_namespaces {
                    let script = &scripts[&namespace.namespace];
                    let mut latest = BTreeMap::new();
                    for mutation in script {
                        latest.insert(mutation.key().to_vec(), mutation.clone().into_wire());
                    }
                    // one row per key, ascending, equal to the last write
                    prop_assert_eq!(&namespace.mutations, &latest.into_values().collect::<Vec<_>>());
                }
            }
        }
    }
}
