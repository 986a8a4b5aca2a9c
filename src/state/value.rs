use std::fmt;
use std::marker::PhantomData;

use super::{StateEntry, StateItem, StateMutation};
use crate::codec::ValueCodec;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Unset,
    Updated,
    Deleted,
}

/// A single value stored under the state's own name.
///
/// Only the final status is rendered: any number of `set`/`drop` calls
/// produce at most one mutation.
pub struct ValueState<T, C> {
    name: String,
    value: T,
    status: Status,
    codec: C,
    _marker: PhantomData<fn() -> T>,
}

impl<T, C> ValueState<T, C>
where
    T: Default,
    C: ValueCodec<T>,
{
    pub fn new(name: impl Into<String>, codec: C) -> Self {
        Self {
            name: name.into(),
            value: T::default(),
            status: Status::Unset,
            codec,
            _marker: PhantomData,
        }
    }

    /// The current in-memory value.
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn set(&mut self, value: T) {
        self.status = Status::Updated;
        self.value = value;
    }

    /// Delete the value and reset it to `T::default()`.
    #[allow(clippy::should_implement_trait)]
    pub fn drop(&mut self) {
        self.status = Status::Deleted;
        self.value = T::default();
    }
}

impl<T, C> StateItem for ValueState<T, C>
where
    T: Default + Send + 'static,
    C: ValueCodec<T>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&mut self, entries: &[StateEntry]) -> Result<()> {
        let Some(entry) = entries.first() else {
            return Ok(());
        };
        if entry.value.is_empty() {
            return Ok(());
        }
        self.value = self.codec.decode(&entry.value)?;
        Ok(())
    }

    fn mutations(&self) -> Result<Vec<StateMutation>> {
        let key = self.name.as_bytes().to_vec();
        match self.status {
            Status::Unset => Ok(Vec::new()),
            Status::Deleted => Ok(vec![StateMutation::Delete { key }]),
            Status::Updated => Ok(vec![StateMutation::Put {
                key,
                value: self.codec.encode(&self.value)?,
            }]),
        }
    }
}

impl<T: fmt::Debug, C> fmt::Debug for ValueState<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueState")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("status", &self.status)
            .finish()
    }
}
