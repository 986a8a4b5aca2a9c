//! Length-prefixed pipe transport.
//!
//! Reads framed [`HandlerCommand`]s from one stream, dispatches each to the
//! handler and writes the framed response to the other stream. Used for
//! local test runs where a companion process drives the handler over its
//! stdio.
//!
//! # Example
//!
//! ```ignore
//! use rxn_handler::handler::{Dispatcher, RequestContext};
//! use rxn_handler::transport::PipeHandler;
//!
//! let mut pipe = PipeHandler::new(Dispatcher::new(handler), child_stdout, child_stdin);
//! pipe.process_messages(&RequestContext::new()).await?;
//! ```

use prost::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::{debug, error};

use crate::config::PipeConfig;
use crate::error::{Error, Result};
use crate::handler::{Dispatcher, RequestContext, ServerHandler};
use crate::protocol::commands::{handler_command::Command, HandlerCommand};
use crate::protocol::{write_frame, FrameBuffer};

/// Size of a single read from the input stream.
const READ_BUFFER_SIZE: usize = 64 * 1024;

pub struct PipeHandler<H, R, W> {
    dispatcher: Dispatcher<H>,
    reader: R,
    writer: W,
    config: PipeConfig,
}

impl<H, R, W> PipeHandler<H, R, W>
where
    H: ServerHandler,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(dispatcher: Dispatcher<H>, reader: R, writer: W) -> Self {
        Self::with_config(dispatcher, reader, writer, PipeConfig::default())
    }

    pub fn with_config(dispatcher: Dispatcher<H>, reader: R, writer: W, config: PipeConfig) -> Self {
        Self {
            dispatcher,
            reader,
            writer,
            config,
        }
    }

    /// Handle commands until the input reaches end of stream.
    ///
    /// A clean end of stream between frames returns `Ok(())`. Any other
    /// failure ends the loop: a truncated frame, an undecodable command, or a
    /// dispatch error (including bad requests).
    pub async fn process_messages(&mut self, ctx: &RequestContext) -> Result<()> {
        let result = self.read_loop(ctx).await;
        if let Err(e) = &result {
            error!("Pipe read loop error: {}", e);
        }
        result
    }

    async fn read_loop(&mut self, ctx: &RequestContext) -> Result<()> {
        let mut frame_buffer = FrameBuffer::with_max_frame_size(self.config.max_frame_size);
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let n = self.reader.read(&mut buf).await?;
            if n == 0 {
                if frame_buffer.is_empty() {
                    return Ok(());
                }
                return Err(Error::Protocol(format!(
                    "stream ended inside a frame ({} bytes buffered)",
                    frame_buffer.len()
                )));
            }

            for payload in frame_buffer.push(&buf[..n])? {
                let command = HandlerCommand::decode(payload)?;
                self.handle_command(ctx, command).await?;
            }
        }
    }

    async fn handle_command(&mut self, ctx: &RequestContext, command: HandlerCommand) -> Result<()> {
        let response = match command.command {
            Some(Command::KeyEventBatch(batch)) => {
                debug!("Pipe command: KeyEventBatch");
                let request = batch.key_event_batch_request.unwrap_or_default();
                self.dispatcher.key_event_batch(ctx, request)?.encode_to_vec()
            }
            Some(Command::ProcessEventBatch(batch)) => {
                debug!("Pipe command: ProcessEventBatch");
                let request = batch.process_event_batch_request.unwrap_or_default();
                self.dispatcher
                    .process_event_batch(ctx, request)
                    .await?
                    .encode_to_vec()
            }
            None => return Err(Error::bad_request("handler command has no payload")),
        };
        write_frame(&mut self.writer, &response).await
    }

    /// Give back the underlying streams.
    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}
