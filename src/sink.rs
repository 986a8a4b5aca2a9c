//! Sink handles.
//!
//! Delivering to a sink is the engine's job. A [`Sink`] only buffers a
//! request on the current subject; the requests travel back in the batch
//! response.

use crate::codec::ValueCodec;
use crate::error::Result;
use crate::subject::Subject;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sink {
    id: String,
}

impl Sink {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Buffer a raw payload for this sink.
    pub fn collect(&self, subject: &mut Subject, payload: Vec<u8>) {
        subject.add_sink_request(self.id.clone(), payload);
    }

    /// Encode a value with `codec` and buffer it for this sink.
    pub fn collect_with<T, C>(&self, subject: &mut Subject, codec: &C, value: &T) -> Result<()>
    where
        C: ValueCodec<T>,
    {
        let payload = codec.encode(value)?;
        self.collect(subject, payload);
        Ok(())
    }
}
