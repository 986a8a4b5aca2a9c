use std::any::Any;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use super::{MapState, QueryType, StateEntry, StateItem, StateMutation, ValueState};
use crate::codec::{MapCodec, ValueCodec};
use crate::error::{Error, Result};
use crate::operator::Operator;
use crate::subject::Subject;

type LoadFn<T> = Arc<dyn Fn(&[StateEntry]) -> Result<T> + Send + Sync>;

/// Schema for one named state of an operator.
///
/// A spec is created once at operator setup and reused across requests. The
/// state instance itself lives in the [`Subject`] it was loaded for, so
/// nothing here grows with traffic.
pub struct StateSpec<T> {
    id: String,
    query: QueryType,
    load: LoadFn<T>,
    mutations_of: fn(&T) -> Result<Vec<StateMutation>>,
}

impl<T: Send + 'static> StateSpec<T> {
    pub fn new<F>(
        id: impl Into<String>,
        query: QueryType,
        load: F,
        mutations_of: fn(&T) -> Result<Vec<StateMutation>>,
    ) -> Self
    where
        F: Fn(&[StateEntry]) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            query,
            load: Arc::new(load),
            mutations_of,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn query(&self) -> QueryType {
        self.query
    }

    /// Get this state for a subject, loading it on first use.
    ///
    /// The first call loads the instance from the subject's declared entries,
    /// registers its mutations with the subject and caches it there. Later
    /// calls on the same subject return the cached instance without loading
    /// again.
    ///
    /// # Errors
    ///
    /// [`Error::StateLoad`] if the declared entries cannot be decoded. The
    /// enclosing batch must fail; the key is not skipped.
    pub fn state_for<'s>(&self, subject: &'s mut Subject) -> Result<&'s mut T> {
        if !subject.has_loaded_state(&self.id) {
            let state = (self.load)(subject.state_entries(&self.id)).map_err(|source| {
                Error::StateLoad {
                    name: self.id.clone(),
                    source: Box::new(source),
                }
            })?;

            let id = self.id.clone();
            let mutations_of = self.mutations_of;
            subject.register_state_use(
                &self.id,
                Box::new(move |item: &(dyn Any + Send)| match item.downcast_ref::<T>() {
                    Some(state) => mutations_of(state),
                    None => Err(type_mismatch(&id)),
                }),
            );
            subject.store_loaded_state(&self.id, Box::new(state));
        }

        subject
            .loaded_state_mut::<T>(&self.id)
            .ok_or_else(|| type_mismatch(&self.id))
    }
}

fn type_mismatch(id: &str) -> Error {
    Error::Internal(format!("state {id} is cached with a different type"))
}

impl<T> Clone for StateSpec<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            query: self.query,
            load: Arc::clone(&self.load),
            mutations_of: self.mutations_of,
        }
    }
}

impl<T> fmt::Debug for StateSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSpec")
            .field("id", &self.id)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

/// Spec for a [`ValueState`], registered as a point lookup.
pub struct ValueSpec<T, C> {
    inner: StateSpec<ValueState<T, C>>,
}

impl<T, C> ValueSpec<T, C>
where
    T: Default + Send + 'static,
    C: ValueCodec<T> + Clone,
{
    pub fn new(op: &mut Operator, id: impl Into<String>, codec: C) -> Self {
        let id = id.into();
        let name = id.clone();
        let inner = StateSpec::new(
            id,
            QueryType::Get,
            move |entries| {
                let mut state = ValueState::new(name.clone(), codec.clone());
                state.load(entries)?;
                Ok(state)
            },
            ValueState::mutations,
        );
        op.register_spec(inner.id(), inner.query());
        Self { inner }
    }

    pub fn id(&self) -> &str {
        self.inner.id()
    }

    pub fn state_for<'s>(&self, subject: &'s mut Subject) -> Result<&'s mut ValueState<T, C>> {
        self.inner.state_for(subject)
    }
}

impl<T, C> Clone for ValueSpec<T, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Spec for a [`MapState`], registered as a scan.
pub struct MapSpec<K, V, C> {
    inner: StateSpec<MapState<K, V, C>>,
}

impl<K, V, C> MapSpec<K, V, C>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
    C: MapCodec<K, V> + Clone,
{
    pub fn new(op: &mut Operator, id: impl Into<String>, codec: C) -> Self {
        let id = id.into();
        let name = id.clone();
        let inner = StateSpec::new(
            id,
            QueryType::Scan,
            move |entries| {
                let mut state = MapState::new(name.clone(), codec.clone());
                state.load(entries)?;
                Ok(state)
            },
            MapState::mutations,
        );
        op.register_spec(inner.id(), inner.query());
        Self { inner }
    }

    pub fn id(&self) -> &str {
        self.inner.id()
    }

    pub fn state_for<'s>(&self, subject: &'s mut Subject) -> Result<&'s mut MapState<K, V, C>> {
        self.inner.state_for(subject)
    }
}

impl<K, V, C> Clone for MapSpec<K, V, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}
