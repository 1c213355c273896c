// src/server/connection_loop.rs

//! Contains the main event loop: waits for readiness, accepts connections,
//! services readable and writable connections, and streams cooperatively.

use super::context::ServerContext;
use super::registry::{ConnectionRegistry, LISTENER, ReadOutcome, WAKER};
use crate::connection::{ConnectionHandler, NextAction, StreamProgress};
use crate::core::{MediaError, StatsSnapshot};
use anyhow::{Result, anyhow};
use indexmap::IndexSet;
use mio::{Events, Interest, Token};
use std::io;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const EVENTS_CAPACITY: usize = 1024;

/// Work left over from earlier rounds. Edge-triggered readiness will not
/// report any of it again, so the loop revisits it explicitly.
#[derive(Debug, Default)]
struct Backlog {
    /// Sessions that spent their chunk budget while still writable.
    streams: IndexSet<Token>,
    /// Connections that spent their read budget with input still pending.
    reads: IndexSet<Token>,
    /// The listener stopped accepting for a reason unrelated to a single
    /// connection and may still hold a backlog.
    accept: bool,
}

impl Backlog {
    /// True if the next wait for readiness must not block.
    fn has_ready_work(&self) -> bool {
        !self.streams.is_empty() || !self.reads.is_empty()
    }

    fn forget(&mut self, token: Token) {
        self.streams.shift_remove(&token);
        self.reads.shift_remove(&token);
    }
}

/// Runs the server until a `CLOSE` command or a shutdown request arrives.
/// Everything the context owns is released before this returns.
pub fn run(mut ctx: ServerContext) -> Result<StatsSnapshot> {
    let mut events = Events::with_capacity(EVENTS_CAPACITY);
    let mut handler = ConnectionHandler::new(ctx.source.clone(), ctx.stats.clone(), &ctx.config);
    let mut backlog = Backlog::default();

    info!("Server is waiting for client connections...");

    'event_loop: loop {
        let timeout = if backlog.has_ready_work() {
            Duration::ZERO
        } else {
            ctx.config.poll_timeout
        };

        if let Err(e) = ctx.poll.poll(&mut events, Some(timeout)) {
            if e.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            error!("CRITICAL: Polling for readiness failed: {}", e);
            return Err(anyhow!("poll failed: {}", e));
        }

        if ctx.shutdown.is_triggered() {
            info!("Shutdown requested, stopping the event loop.");
            break;
        }

        if std::mem::take(&mut backlog.accept) {
            accept_connections(&mut ctx.registry, &mut backlog);
        }

        for event in events.iter() {
            match event.token() {
                LISTENER => accept_connections(&mut ctx.registry, &mut backlog),
                WAKER => debug!("Event loop woken."),
                token => {
                    let readable = event.is_readable() || event.is_read_closed() || event.is_error();
                    let next = service_connection(
                        &mut ctx.registry,
                        &mut handler,
                        &mut backlog,
                        token,
                        readable,
                    );
                    if next == NextAction::Shutdown {
                        break 'event_loop;
                    }
                }
            }
        }

        // One cooperative round over the leftovers. Connections serviced for
        // their reads also got a streaming step, so they are not pumped twice.
        let streams = std::mem::take(&mut backlog.streams);
        let reads = std::mem::take(&mut backlog.reads);
        for &token in &reads {
            let next = service_connection(&mut ctx.registry, &mut handler, &mut backlog, token, true);
            if next == NextAction::Shutdown {
                break 'event_loop;
            }
        }
        for token in streams {
            if !reads.contains(&token) {
                advance_stream(&mut ctx.registry, &mut handler, &mut backlog, token);
            }
        }
    }

    info!("Server is closing. Releasing {} connection(s).", ctx.registry.len());
    ctx.registry.close_all();
    let snapshot = ctx.stats.snapshot();
    info!(
        "Served {} connection(s), {} command(s) ({} unknown), {} byte(s) streamed.",
        snapshot.total_connections,
        snapshot.total_commands,
        snapshot.unknown_commands,
        snapshot.bytes_streamed
    );
    drop(ctx);
    info!("Server shutdown complete.");
    Ok(snapshot)
}

fn accept_connections(registry: &mut ConnectionRegistry, backlog: &mut Backlog) {
    let summary = registry.accept_pending();
    debug!("Accepted {} connection(s) this round.", summary.accepted);
    if summary.retry {
        backlog.accept = true;
    }
}

/// Handles one readiness event for a client connection. Errors close only
/// that connection.
fn service_connection(
    registry: &mut ConnectionRegistry,
    handler: &mut ConnectionHandler,
    backlog: &mut Backlog,
    token: Token,
    readable: bool,
) -> NextAction {
    if readable {
        let outcome = match registry.on_readable(token) {
            Ok(ReadOutcome::NotRegistered) => return NextAction::Continue,
            Ok(outcome) => outcome,
            Err(e) => {
                close_connection(registry, backlog, token, &e);
                return NextAction::Continue;
            }
        };
        let Some(conn) = registry.get_mut(token) else {
            return NextAction::Continue;
        };

        match outcome {
            ReadOutcome::Budget(_) => {
                backlog.reads.insert(token);
                if handler.process_inbound(conn) == NextAction::Shutdown {
                    return NextAction::Shutdown;
                }
            }
            ReadOutcome::PeerClosed(_) => {
                backlog.reads.shift_remove(&token);
                // Commands that arrived together with the FIN still count,
                // so a client can send `CLOSE` and hang up at once.
                if handler.process_final(conn) == NextAction::Shutdown {
                    return NextAction::Shutdown;
                }
                if !conn.session.is_streaming() {
                    release_connection(registry, backlog, token);
                    return NextAction::Continue;
                }
                debug!(
                    "Peer {} half-closed; streaming continues until the end",
                    conn.addr()
                );
            }
            ReadOutcome::Data(_) | ReadOutcome::NotRegistered => {
                if handler.process_inbound(conn) == NextAction::Shutdown {
                    return NextAction::Shutdown;
                }
            }
        }
    }

    // Whether new commands arrived or the socket became writable again, try
    // to make progress on the stream.
    advance_stream(registry, handler, backlog, token);
    NextAction::Continue
}

/// Runs one streaming step for a connection and updates its interest.
/// A half-closed connection is released once it has nothing left to send.
fn advance_stream(
    registry: &mut ConnectionRegistry,
    handler: &mut ConnectionHandler,
    backlog: &mut Backlog,
    token: Token,
) {
    let Some(conn) = registry.get_mut(token) else {
        return;
    };

    let progress = handler.pump(conn);
    let read_closed = conn.is_read_closed();
    let interest = match progress {
        Ok(StreamProgress::Blocked) if read_closed => Interest::WRITABLE,
        Ok(StreamProgress::Blocked) => Interest::READABLE | Interest::WRITABLE,
        Ok(StreamProgress::Yielded) => {
            backlog.streams.insert(token);
            if read_closed {
                Interest::WRITABLE
            } else {
                Interest::READABLE
            }
        }
        Ok(StreamProgress::Idle) | Ok(StreamProgress::Finished) if read_closed => {
            release_connection(registry, backlog, token);
            return;
        }
        Ok(StreamProgress::Idle) | Ok(StreamProgress::Finished) => Interest::READABLE,
        Err(e) => {
            close_connection(registry, backlog, token, &e);
            return;
        }
    };

    if let Err(e) = registry.set_interest(token, interest) {
        close_connection(registry, backlog, token, &e);
    }
}

fn close_connection(
    registry: &mut ConnectionRegistry,
    backlog: &mut Backlog,
    token: Token,
    e: &MediaError,
) {
    if e.is_disconnect() {
        debug!("Connection {:?} went away: {}", token, e);
    } else {
        warn!("Closing connection {:?} after error: {}", token, e);
    }
    release_connection(registry, backlog, token);
}

fn release_connection(registry: &mut ConnectionRegistry, backlog: &mut Backlog, token: Token) {
    backlog.forget(token);
    drop(registry.remove(token));
}
