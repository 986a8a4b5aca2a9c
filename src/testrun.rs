//! Local test runs against a companion `reduction testrun` process.
//!
//! A [`TestRun`] queues runner commands (keyed events and watermarks), starts
//! the companion process, sends it the commands and then serves the handler
//! commands it sends back over the same stdio pair until it closes its
//! output.
//!
//! # Example
//!
//! ```ignore
//! use rxn_handler::testrun::TestRun;
//!
//! let mut run = TestRun::new(handler);
//! run.add_record(b"{\"user\":\"a\"}".to_vec());
//! run.add_watermark();
//! run.run().await?;
//! ```

use std::process::Stdio;

use prost::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};
use crate::handler::{Dispatcher, RequestContext, ServerHandler};
use crate::protocol::commands::RunnerCommand;
use crate::protocol::messages as pb;
use crate::protocol::write_frame;
use crate::transport::PipeHandler;

/// Program started by [`TestRun::run`] unless overridden.
pub const DEFAULT_PROGRAM: &str = "reduction";

const STDERR_CHUNK_SIZE: usize = 8 * 1024;

/// Accumulates runner commands and plays them through the companion process.
pub struct TestRun<H> {
    dispatcher: Dispatcher<H>,
    commands: Vec<Vec<u8>>,
    err: Option<Error>,
    program: String,
    args: Vec<String>,
}

impl<H: ServerHandler> TestRun<H> {
    pub fn new(handler: H) -> Self {
        Self {
            dispatcher: Dispatcher::new(handler),
            commands: Vec::new(),
            err: None,
            program: DEFAULT_PROGRAM.to_string(),
            args: vec!["testrun".to_string()],
        }
    }

    /// Replace the companion command line.
    pub fn command<I, S>(mut self, program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.program = program.into();
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Key a raw record and queue one event per keyed event it produces.
    ///
    /// Errors are kept and returned from [`run`](Self::run); once one has
    /// happened further commands are ignored.
    pub fn add_record(&mut self, record: impl AsRef<[u8]>) {
        if self.err.is_some() {
            return;
        }

        let ctx = RequestContext::new();
        match self.dispatcher.handler().key_event(&ctx, record.as_ref()) {
            Ok(events) => {
                for event in events {
                    let command = RunnerCommand::add_keyed_event(pb::KeyedEvent::from(event));
                    self.commands.push(command.encode_to_vec());
                }
            }
            Err(e) => {
                self.err = Some(Error::handler(format!("failed to create keyed event: {e}")));
            }
        }
    }

    /// Queue a watermark advance.
    pub fn add_watermark(&mut self) {
        if self.err.is_some() {
            return;
        }
        self.commands.push(RunnerCommand::add_watermark().encode_to_vec());
    }

    /// Number of queued runner commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Start the companion process and play the queued commands through it.
    ///
    /// Returns [`Error::Command`] carrying the companion's stderr when it
    /// exits unsuccessfully. Its stderr is also forwarded to this process's
    /// stderr while it runs.
    pub async fn run(mut self) -> Result<()> {
        if let Some(err) = self.err.take() {
            return Err(err);
        }
        self.commands.push(RunnerCommand::run().encode_to_vec());

        debug!(program = %self.program, commands = self.commands.len(), "Starting test run");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Internal("companion stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Internal("companion stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Internal("companion stderr not captured".to_string()))?;

        let stderr_task = tokio::spawn(tee_stderr(stderr));

        for command in &self.commands {
            write_frame(&mut stdin, command).await?;
        }

        let mut pipe = PipeHandler::new(self.dispatcher.clone(), stdout, stdin);
        pipe.process_messages(&RequestContext::new()).await?;
        drop(pipe);

        let stderr = stderr_task
            .await
            .map_err(|e| Error::Internal(format!("stderr collector failed: {e}")))??;

        let status = child.wait().await?;
        if !status.success() {
            return Err(Error::Command {
                message: status.to_string(),
                stderr,
            });
        }
        Ok(())
    }
}

/// Key every record, advance the watermark once and run.
pub async fn test_run<H, I>(handler: H, records: I) -> Result<()>
where
    H: ServerHandler,
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
{
    let mut run = TestRun::new(handler);
    for record in records {
        run.add_record(record);
    }
    run.add_watermark();
    run.run().await
}

/// Copy the companion's stderr to ours, keeping everything that was read.
async fn tee_stderr<R: AsyncRead + Unpin>(mut reader: R) -> Result<Vec<u8>> {
    let mut collected = Vec::new();
    let mut out = tokio::io::stderr();
    let mut buf = vec![0u8; STDERR_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        collected.extend_from_slice(&buf[..n]);
        out.write_all(&buf[..n]).await?;
    }
    out.flush().await?;
    Ok(collected)
}
