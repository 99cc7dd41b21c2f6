// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Command relay bridge
//!
//! Maintains one logical duplex connection to the constrained client,
//! decodes inbound frames, runs each command through an ordered chain of
//! registered handlers, and writes back exactly one correlated response
//! per command. The handler registry lives for the server process;
//! connections come and go underneath it.
//!
//! Responses produced while the transport is down are buffered and
//! redelivered after reconnect rather than dropped.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;

use super::protocol::{decode_frame, RelayCommand, RelayResponse};
use crate::error::Result;

const RECONNECT_INITIAL: Duration = Duration::from_millis(500);
const RECONNECT_MAX: Duration = Duration::from_secs(30);

/// A registered command handler
///
/// `handle` returns `None` to decline a command so the chain can move on,
/// or `Some(result)` to accept it and produce the response.
#[async_trait::async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, command: &RelayCommand) -> Option<Result<Value>>;
}

type BoxedHandlerFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// A handler bound to one exact command name, backed by a closure
pub struct FnHandler {
    command: String,
    f: Box<dyn Fn(RelayCommand) -> BoxedHandlerFuture + Send + Sync>,
}

impl FnHandler {
    /// Create a handler that accepts frames whose `command` equals `command`
    pub fn new<F, Fut>(command: impl Into<String>, f: F) -> Self
    where
        F: Fn(RelayCommand) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            command: command.into(),
            f: Box::new(move |cmd| Box::pin(f(cmd))),
        }
    }
}

#[async_trait::async_trait]
impl CommandHandler for FnHandler {
    async fn handle(&self, command: &RelayCommand) -> Option<Result<Value>> {
        if command.command != self.command {
            return None;
        }
        Some((self.f)(command.clone()).await)
    }
}

/// Outbound responses awaiting transmission
///
/// Survives connection loss: a response that fails to write goes back to
/// the front of the queue and is redelivered on the next connection.
struct OutboundQueue {
    items: std::sync::Mutex<VecDeque<RelayResponse>>,
    notify: Notify,
}

impl OutboundQueue {
    fn new() -> Self {
        Self {
            items: std::sync::Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    fn push(&self, response: RelayResponse) {
        match self.items.lock() {
            Ok(mut items) => items.push_back(response),
            Err(poisoned) => poisoned.into_inner().push_back(response),
        }
        self.notify.notify_one();
    }

    fn push_front(&self, response: RelayResponse) {
        match self.items.lock() {
            Ok(mut items) => items.push_front(response),
            Err(poisoned) => poisoned.into_inner().push_front(response),
        }
        self.notify.notify_one();
    }

    async fn pop(&self) -> RelayResponse {
        loop {
            let notified = self.notify.notified();
            {
                let mut items = match self.items.lock() {
                    Ok(items) => items,
                    Err(poisoned) => poisoned.into_inner(),
                };
                if let Some(response) = items.pop_front() {
                    return response;
                }
            }
            notified.await;
        }
    }

    fn len(&self) -> usize {
        match self.items.lock() {
            Ok(items) => items.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// The command relay bridge
pub struct RelayBridge {
    handlers: Arc<RwLock<Vec<Arc<dyn CommandHandler>>>>,
    outbound: Arc<OutboundQueue>,
    conn_task: Mutex<Option<JoinHandle<()>>>,
}

impl RelayBridge {
    /// Create a bridge with an empty handler registry, not yet connected
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(Vec::new())),
            outbound: Arc::new(OutboundQueue::new()),
            conn_task: Mutex::new(None),
        }
    }

    /// Append a handler to the registry
    ///
    /// Handlers are tried in registration order and never automatically
    /// removed.
    pub async fn register_handler(&self, handler: Arc<dyn CommandHandler>) {
        self.handlers.write().await.push(handler);
    }

    /// Connect to the client on `127.0.0.1:port`
    ///
    /// Safe to call repeatedly: an existing connection task is cancelled
    /// first. The spawned task reconnects on its own whenever the
    /// transport drops.
    pub async fn connect(&self, port: u16) {
        let mut conn_task = self.conn_task.lock().await;
        if let Some(previous) = conn_task.take() {
            previous.abort();
        }

        let handlers = Arc::clone(&self.handlers);
        let outbound = Arc::clone(&self.outbound);
        *conn_task = Some(tokio::spawn(async move {
            run_connection(port, handlers, outbound).await;
        }));
    }

    /// Tear down the connection task, if any
    pub async fn shutdown(&self) {
        if let Some(task) = self.conn_task.lock().await.take() {
            task.abort();
        }
    }

    /// Run one command through the handler chain and produce its response
    ///
    /// Sequential and short-circuiting: the first handler that accepts
    /// wins, a handler error becomes an error response for this command
    /// only, and a full miss yields an unrecognized-command error.
    pub async fn dispatch(&self, command: &RelayCommand) -> RelayResponse {
        let handlers = self.handlers.read().await.clone();
        dispatch_chain(&handlers, command).await
    }

    /// Number of responses waiting for a connection
    pub fn pending_responses(&self) -> usize {
        self.outbound.len()
    }
}

impl Default for RelayBridge {
    fn default() -> Self {
        Self::new()
    }
}

async fn dispatch_chain(
    handlers: &[Arc<dyn CommandHandler>],
    command: &RelayCommand,
) -> RelayResponse {
    for handler in handlers {
        match handler.handle(command).await {
            None => continue,
            Some(Ok(data)) => return RelayResponse::success(&command.command, &command.id, data),
            Some(Err(e)) => {
                tracing::warn!("handler failed for command '{}': {}", command.command, e);
                return RelayResponse::error(&command.command, &command.id, e.to_string());
            }
        }
    }

    let miss = crate::error::SidecarError::UnhandledCommand(command.command.clone());
    RelayResponse::error(&command.command, &command.id, miss.to_string())
}

async fn run_connection(
    port: u16,
    handlers: Arc<RwLock<Vec<Arc<dyn CommandHandler>>>>,
    outbound: Arc<OutboundQueue>,
) {
    let mut backoff = RECONNECT_INITIAL;
    loop {
        match TcpStream::connect(("127.0.0.1", port)).await {
            Ok(stream) => {
                tracing::info!("relay connected on port {}", port);
                backoff = RECONNECT_INITIAL;
                serve_connection(stream, Arc::clone(&handlers), Arc::clone(&outbound)).await;
                tracing::warn!("relay connection lost, reconnecting");
            }
            Err(e) => {
                tracing::debug!("relay connect to port {} failed: {}", port, e);
            }
        }

        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(RECONNECT_MAX);
    }
}

/// Aborts the wrapped task when dropped.
///
/// Ties the writer's lifetime to its connection: however the connection
/// ends (read EOF, read error, or the whole connection task being
/// cancelled by a reconnect or shutdown), the writer goes with it and
/// can never drain responses meant for a newer connection.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// A response popped from the queue but not yet on the wire.
///
/// Unless the write is committed, dropping this (write failure or the
/// writer being aborted mid-write) puts the response back at the head
/// of the queue for the next connection.
struct PendingWrite<'a> {
    queue: &'a OutboundQueue,
    response: Option<RelayResponse>,
}

impl Drop for PendingWrite<'_> {
    fn drop(&mut self) {
        if let Some(response) = self.response.take() {
            self.queue.push_front(response);
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    handlers: Arc<RwLock<Vec<Arc<dyn CommandHandler>>>>,
    outbound: Arc<OutboundQueue>,
) {
    let (read_half, mut write_half) = stream.into_split();

    // Writes run on their own task so a partially read frame is never
    // dropped by cancellation
    let write_queue = Arc::clone(&outbound);
    let _writer = AbortOnDrop(tokio::spawn(async move {
        loop {
            let response = write_queue.pop().await;
            let mut raw = match serde_json::to_string(&response) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::error!("failed to encode relay response: {}", e);
                    continue;
                }
            };
            raw.push('\n');

            let mut pending = PendingWrite {
                queue: &write_queue,
                response: Some(response),
            };
            match write_half.write_all(raw.as_bytes()).await {
                Ok(()) => {
                    pending.response = None;
                }
                Err(e) => {
                    tracing::debug!("relay write failed: {}", e);
                    return;
                }
            }
        }
    }));

    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                handle_frame(&line, &handlers, &outbound);
            }
            Ok(None) => return,
            Err(e) => {
                tracing::debug!("relay read failed: {}", e);
                return;
            }
        }
    }
}

fn handle_frame(
    raw: &str,
    handlers: &Arc<RwLock<Vec<Arc<dyn CommandHandler>>>>,
    outbound: &Arc<OutboundQueue>,
) {
    let command = match decode_frame(raw) {
        Ok(command) => command,
        Err(failure) => {
            tracing::warn!("relay decode failed: {}", failure.message);
            if let Some(response) = failure.to_response() {
                outbound.push(response);
            }
            return;
        }
    };

    // Each command runs in its own task; commands with different ids
    // proceed concurrently and responses may complete out of order.
    let handlers = Arc::clone(handlers);
    let outbound = Arc::clone(outbound);
    tokio::spawn(async move {
        let name = command.command.clone();
        let id = command.id.clone();

        let dispatched = tokio::spawn(async move {
            let chain = handlers.read().await.clone();
            dispatch_chain(&chain, &command).await
        })
        .await;

        let response = match dispatched {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("handler task for command '{}' aborted: {}", name, e);
                RelayResponse::error(name, id, "internal handler failure")
            }
        };
        outbound.push(response);
    });
}
