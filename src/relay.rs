//! Sidecar relay: host events in, renderer messages out.
//!
//! The calling thread forwards parsed host events into the session while a
//! scoped writer thread drains a lossless subscription into the output, so
//! writing never competes with reading for the same loop. On shutdown the
//! session is closed first and the writer keeps draining until the
//! subscription disconnects, which flushes everything the worker published
//! while finishing its queue.

use crate::host::source::EventSource;
use crate::publish::RendererMessage;
use crate::session::{Session, SessionError};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ScopedJoinHandle};
use std::time::Duration;
use thiserror::Error;

/// How long the forwarding loop waits for input before re-checking its
/// stop conditions.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Errors that can end a relay.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Failed to write renderer message: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to encode renderer message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Output writer thread panicked")]
    WriterPanicked,
}

/// What a finished relay moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayReport {
    pub events_forwarded: u64,
    pub messages_written: u64,
    /// The output went away (broken pipe) before the session closed.
    pub output_closed: bool,
}

/// Relay `source` into `session` and every renderer message into `out` as
/// JSON lines, until input ends, `running` clears, or the output closes.
///
/// The session is closed before this returns, also on error.
pub fn relay<W>(
    session: &mut Session,
    source: &mut EventSource,
    out: &mut W,
    running: &AtomicBool,
) -> Result<RelayReport, RelayError>
where
    W: Write + Send,
{
    let messages = session.subscribe_unbounded()?;
    tracing::info!(session = %session.id(), "relaying host events");

    thread::scope(|scope| -> Result<RelayReport, RelayError> {
        let spawned = thread::Builder::new()
            .name("renderer-writer".to_string())
            .spawn_scoped(scope, move || write_messages(out, &messages));
        let writer = match spawned {
            Ok(writer) => writer,
            Err(e) => {
                session.close();
                return Err(e.into());
            }
        };

        let forwarded = forward_events(session, source, running, &writer);

        source.stop();
        session.close();

        let (messages_written, output_closed) =
            writer.join().map_err(|_| RelayError::WriterPanicked)??;

        Ok(RelayReport {
            events_forwarded: forwarded?,
            messages_written,
            output_closed,
        })
    })
}

fn forward_events<T>(
    session: &Session,
    source: &EventSource,
    running: &AtomicBool,
    writer: &ScopedJoinHandle<'_, T>,
) -> Result<u64, SessionError> {
    let mut forwarded = 0;

    while running.load(Ordering::SeqCst) {
        if writer.is_finished() {
            tracing::info!("renderer output closed");
            break;
        }
        if source.is_exhausted() {
            tracing::info!(events = forwarded, "host input ended");
            break;
        }

        match source.receiver().recv_timeout(POLL_INTERVAL) {
            Ok(event) => {
                tracing::trace!(event = event.label(), "host event");
                session.handle_event(event)?;
                forwarded += 1;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    Ok(forwarded)
}

/// Write messages until the subscription disconnects or the output is gone.
fn write_messages<W: Write>(
    out: &mut W,
    messages: &Receiver<RendererMessage>,
) -> Result<(u64, bool), RelayError> {
    let mut written = 0;
    for message in messages.iter() {
        let line = serde_json::to_string(&message)?;
        match writeln!(out, "{line}").and_then(|_| out.flush()) {
            Ok(()) => written += 1,
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => return Ok((written, true)),
            Err(e) => return Err(e.into()),
        }
    }
    Ok((written, false))
}
