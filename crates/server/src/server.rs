//! The per-node session server.
//!
//! A single task owns the node-local session map and its GC timers; every
//! other component talks to it through a [`SessionServerHandle`]. Durable
//! store calls run on spawned tasks and report back through the mailbox,
//! so the map is only ever touched by the actor loop.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use durable_store::SharedDurableStore;
use session_bus::CommandHandler;
use session_core::{Action, Command, Reply, SessionConfig};
use telemetry::{health, metrics};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::gc::{self, GcTimers};
use crate::pending::PendingReads;

/// Mailbox capacity of a session server.
const MAILBOX_CAPACITY: usize = 1024;

pub(crate) enum Message {
    Command {
        command: Command,
        reply: oneshot::Sender<Reply>,
    },
    /// Durable read-through finished for a local miss.
    Hydrated {
        id: String,
        payload: Option<String>,
        epoch: u64,
        reply: oneshot::Sender<Reply>,
    },
    /// Durable side of a GET_FAILOVER finished; install under the new id.
    Rehomed {
        old_id: String,
        new_id: String,
        payload: Option<String>,
        epoch: u64,
        reply: oneshot::Sender<Reply>,
    },
    Probe {
        id: String,
        reply: oneshot::Sender<SessionProbe>,
    },
    Stats {
        reply: oneshot::Sender<ServerStats>,
    },
}

/// Local view of one session id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionProbe {
    /// Present in the local map
    pub stored: bool,
    /// A GC timer is armed for it
    pub gc_armed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServerStats {
    pub sessions: usize,
    pub timers: usize,
}

/// Session server actor state.
pub struct SessionServer {
    address: String,
    ttl: Duration,
    sessions: HashMap<String, String>,
    timers: GcTimers,
    reads: PendingReads,
    durable: Option<SharedDurableStore>,
    mailbox: mpsc::WeakSender<Message>,
}

impl SessionServer {
    /// Starts the server for the configured node and returns its handle.
    ///
    /// The server stops once every handle is dropped.
    pub fn spawn(config: &SessionConfig, durable: Option<SharedDurableStore>) -> SessionServerHandle {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let address = config.local_address();

        let server = Self {
            address: address.clone(),
            ttl: config.ttl(),
            sessions: HashMap::new(),
            timers: GcTimers::new(config.ttl()),
            reads: PendingReads::default(),
            durable,
            mailbox: tx.downgrade(),
        };

        info!(
            address = %address,
            ttl_secs = config.ttl_secs,
            durable = server.durable.as_ref().map(|d| d.backend()).unwrap_or("none"),
            "Session server started"
        );
        health().session_server.set_healthy();

        tokio::spawn(server.run(rx));

        SessionServerHandle { address, tx }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Message>) {
        loop {
            let deadline = self.timers.next_deadline();
            tokio::select! {
                message = rx.recv() => match message {
                    Some(message) => self.dispatch(message),
                    None => break,
                },
                _ = gc::sleep_until(deadline) => self.sweep(),
            }
        }

        let dropped = self.timers.cancel_all();
        info!(address = %self.address, dropped, "Session server stopped");
    }

    fn dispatch(&mut self, message: Message) {
        match message {
            Message::Command { command, reply } => self.execute(command, reply),
            Message::Hydrated {
                id,
                payload,
                epoch,
                reply,
            } => self.hydrated(id, payload, epoch, reply),
            Message::Rehomed {
                old_id,
                new_id,
                payload,
                epoch,
                reply,
            } => self.rehomed(old_id, new_id, payload, epoch, reply),
            Message::Probe { id, reply } => {
                let _ = reply.send(SessionProbe {
                    stored: self.sessions.contains_key(&id),
                    gc_armed: self.timers.contains(&id),
                });
            }
            Message::Stats { reply } => {
                let _ = reply.send(ServerStats {
                    sessions: self.sessions.len(),
                    timers: self.timers.len(),
                });
            }
        }
    }

    fn execute(&mut self, command: Command, reply: oneshot::Sender<Reply>) {
        let Some(action) = command.action() else {
            warn!(address = %self.address, act = command.act, "Unknown session command");
            let _ = reply.send(Reply::Empty);
            return;
        };

        debug!(address = %self.address, action = action.name(), id = %command.id, "Session command");

        match action {
            Action::Get => self.get(command.id, reply),
            Action::Save => {
                let stored = self.save(command.id, command.data);
                let _ = reply.send(Reply::Ack(stored));
            }
            Action::SaveFailover => self.save_failover(command.id, command.data, reply),
            Action::Destroy | Action::DestroyFailover => {
                self.destroy(&command.id);
                let _ = reply.send(Reply::Ack(true));
            }
            Action::DestroyAll => {
                let count = self.destroy_all();
                let _ = reply.send(Reply::Count(count));
            }
            Action::GetFailover => match command.new_id {
                Some(new_id) if !new_id.is_empty() => self.get_failover(command.id, new_id, reply),
                _ => {
                    warn!(id = %command.id, "GET_FAILOVER without a new id");
                    let _ = reply.send(Reply::Record(None));
                }
            },
        }
    }

    fn get(&mut self, id: String, reply: oneshot::Sender<Reply>) {
        if id.is_empty() {
            let _ = reply.send(Reply::Record(None));
            return;
        }

        if let Some(payload) = self.sessions.get(&id).cloned() {
            self.touch(&id);
            let _ = reply.send(Reply::Record(Some(payload)));
            return;
        }

        let Some(durable) = self.durable.clone() else {
            let _ = reply.send(Reply::Record(None));
            return;
        };

        let epoch = self.reads.begin(&id);
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            metrics().durable_reads.inc();
            let payload = match durable.get(&id).await {
                Ok(payload) => payload,
                Err(e) => {
                    metrics().durable_errors.inc();
                    error!(id = %id, "Durable read-through failed: {}", e);
                    None
                }
            };
            if let Some(tx) = mailbox.upgrade() {
                let _ = tx
                    .send(Message::Hydrated {
                        id,
                        payload,
                        epoch,
                        reply,
                    })
                    .await;
            }
        });
    }

    fn hydrated(&mut self, id: String, payload: Option<String>, epoch: u64, reply: oneshot::Sender<Reply>) {
        let current = self.reads.finish(&id, epoch);

        // A SAVE may have landed while the durable read was in flight.
        if let Some(local) = self.sessions.get(&id).cloned() {
            self.touch(&id);
            let _ = reply.send(Reply::Record(Some(local)));
            return;
        }

        match payload {
            Some(payload) if current => {
                self.store(&id, payload.clone());
                self.touch(&id);
                let _ = reply.send(Reply::Record(Some(payload)));
            }
            Some(_) => {
                debug!(id = %id, "Session destroyed during read-through, not installed");
                let _ = reply.send(Reply::Record(None));
            }
            None => {
                let _ = reply.send(Reply::Record(None));
            }
        }
    }

    /// Overwrites the local entry and mirrors it to the durable store in
    /// the background.
    fn save(&mut self, id: String, data: Option<String>) -> bool {
        let Some(payload) = self.accept(&id, data) else {
            return false;
        };

        if let Some(durable) = self.durable.clone() {
            let ttl = self.ttl;
            tokio::spawn(async move {
                if let Err(e) = durable.setex(&id, ttl, &payload).await {
                    metrics().durable_errors.inc();
                    warn!(id = %id, "Durable mirror of session save failed: {}", e);
                }
            });
        }
        true
    }

    /// Like `save`, but answers only once the durable write has settled,
    /// acknowledging only a write the durable store accepted.
    fn save_failover(&mut self, id: String, data: Option<String>, reply: oneshot::Sender<Reply>) {
        let Some(payload) = self.accept(&id, data) else {
            let _ = reply.send(Reply::Ack(false));
            return;
        };

        let Some(durable) = self.durable.clone() else {
            let _ = reply.send(Reply::Ack(true));
            return;
        };

        let ttl = self.ttl;
        tokio::spawn(async move {
            let written = match durable.setex(&id, ttl, &payload).await {
                Ok(()) => true,
                Err(e) => {
                    metrics().durable_errors.inc();
                    warn!(id = %id, "Durable write of failover save failed: {}", e);
                    false
                }
            };
            let _ = reply.send(Reply::Ack(written));
        });
    }

    fn accept(&mut self, id: &str, data: Option<String>) -> Option<String> {
        let payload = data.filter(|d| !d.is_empty());
        match payload {
            Some(payload) if !id.is_empty() => {
                self.store(id, payload.clone());
                self.timers.arm(id);
                Some(payload)
            }
            _ => {
                warn!(id = %id, "Rejected session save with empty id or payload");
                None
            }
        }
    }

    fn destroy(&mut self, id: &str) {
        self.sessions.remove(id);
        self.timers.cancel(id);
        self.reads.invalidate(id);
        self.publish_size();

        if let Some(durable) = self.durable.clone() {
            let id = id.to_string();
            tokio::spawn(async move {
                if let Err(e) = durable.del(&id).await {
                    metrics().durable_errors.inc();
                    warn!(id = %id, "Durable delete failed: {}", e);
                }
            });
        }
    }

    fn destroy_all(&mut self) -> usize {
        let count = self.sessions.len();
        self.sessions.clear();
        self.timers.cancel_all();
        self.reads.invalidate_all();
        self.publish_size();
        info!(address = %self.address, count, "Dropped all local sessions");
        count
    }

    fn get_failover(&mut self, old_id: String, new_id: String, reply: oneshot::Sender<Reply>) {
        if self.sessions.remove(&old_id).is_some() {
            self.publish_size();
        }
        self.timers.cancel(&old_id);

        let Some(durable) = self.durable.clone() else {
            let _ = reply.send(Reply::Record(None));
            return;
        };

        let epoch = self.reads.begin(&old_id);
        let ttl = self.ttl;
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            metrics().durable_reads.inc();
            let payload = match durable.get(&old_id).await {
                Ok(Some(payload)) => {
                    let payload = payload.replace(&old_id, &new_id);

                    if let Err(e) = durable.setex(&new_id, ttl, &payload).await {
                        metrics().durable_errors.inc();
                        warn!(id = %new_id, "Durable write of rehomed session failed: {}", e);
                    }
                    if let Err(e) = durable.del(&old_id).await {
                        metrics().durable_errors.inc();
                        warn!(id = %old_id, "Durable delete of superseded session failed: {}", e);
                    }
                    Some(payload)
                }
                Ok(None) => {
                    debug!(id = %old_id, "No durable copy to fail over");
                    None
                }
                Err(e) => {
                    metrics().durable_errors.inc();
                    error!(id = %old_id, "Durable read during failover failed: {}", e);
                    None
                }
            };

            if let Some(tx) = mailbox.upgrade() {
                let _ = tx
                    .send(Message::Rehomed {
                        old_id,
                        new_id,
                        payload,
                        epoch,
                        reply,
                    })
                    .await;
            }
        });
    }

    fn rehomed(
        &mut self,
        old_id: String,
        new_id: String,
        payload: Option<String>,
        epoch: u64,
        reply: oneshot::Sender<Reply>,
    ) {
        let current = self.reads.finish(&old_id, epoch);

        match payload {
            Some(payload) if current => {
                info!(old_id = %old_id, new_id = %new_id, "Session rehomed");
                self.store(&new_id, payload.clone());
                self.timers.arm(&new_id);
                let _ = reply.send(Reply::Record(Some(payload)));
            }
            Some(_) => {
                // Destroyed mid-failover: drop the copy just written under the new id.
                info!(old_id = %old_id, new_id = %new_id, "Session destroyed during failover");
                self.destroy(&new_id);
                let _ = reply.send(Reply::Record(None));
            }
            None => {
                let _ = reply.send(Reply::Record(None));
            }
        }
    }

    /// Drops every session whose GC timer is due.
    fn sweep(&mut self) {
        for id in self.timers.drain_due(Instant::now()) {
            if self.sessions.remove(&id).is_some() {
                metrics().gc_expired.inc();
                debug!(id = %id, "Session expired");
            }
        }
        self.publish_size();
    }

    /// Re-arms the GC timer and refreshes the durable expiry.
    fn touch(&mut self, id: &str) {
        self.timers.arm(id);

        if let Some(durable) = self.durable.clone() {
            let id = id.to_string();
            let ttl = self.ttl;
            tokio::spawn(async move {
                if let Err(e) = durable.expire(&id, ttl).await {
                    metrics().durable_errors.inc();
                    warn!(id = %id, "Durable expiry refresh failed: {}", e);
                }
            });
        }
    }

    fn store(&mut self, id: &str, payload: String) {
        self.sessions.insert(id.to_string(), payload);
        self.publish_size();
    }

    fn publish_size(&self) {
        metrics().local_sessions.set(self.sessions.len() as u64);
    }
}


/// Cloneable handle to a running [`SessionServer`].
///
/// Every call resolves; if the server is gone the reply is empty.
#[derive(Clone)]
pub struct SessionServerHandle {
    address: String,
    tx: mpsc::Sender<Message>,
}

impl SessionServerHandle {
    /// Bus address the server answers on.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Executes a raw command.
    pub async fn call(&self, command: Command) -> Reply {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(Message::Command { command, reply })
            .await
            .is_err()
        {
            warn!(address = %self.address, "Session server is not running");
            return Reply::Empty;
        }
        rx.await.unwrap_or(Reply::Empty)
    }

    pub async fn get(&self, id: &str) -> Option<String> {
        self.call(Command::get(id)).await.into_record()
    }

    pub async fn save(&self, id: &str, payload: &str) -> bool {
        self.call(Command::save(id, payload)).await.is_ack()
    }

    pub async fn destroy(&self, id: &str) -> bool {
        self.call(Command::destroy(id)).await.is_ack()
    }

    pub async fn destroy_all(&self) -> usize {
        self.call(Command::destroy_all()).await.count()
    }

    pub async fn get_failover(&self, old_id: &str, new_id: &str) -> Option<String> {
        self.call(Command::get_failover(old_id, new_id))
            .await
            .into_record()
    }

    pub async fn save_failover(&self, id: &str, payload: &str) -> bool {
        self.call(Command::save_failover(id, payload)).await.is_ack()
    }

    pub async fn destroy_failover(&self, id: &str) -> bool {
        self.call(Command::destroy_failover(id)).await.is_ack()
    }

    /// Reports whether `id` is held locally and has a GC timer.
    pub async fn probe(&self, id: &str) -> SessionProbe {
        let (reply, rx) = oneshot::channel();
        let message = Message::Probe {
            id: id.to_string(),
            reply,
        };
        if self.tx.send(message).await.is_err() {
            return SessionProbe::default();
        }
        rx.await.unwrap_or_default()
    }

    pub async fn stats(&self) -> ServerStats {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Message::Stats { reply }).await.is_err() {
            return ServerStats::default();
        }
        rx.await.unwrap_or_default()
    }
}

#[async_trait]
impl CommandHandler for SessionServerHandle {
    async fn handle(&self, command: Command) -> Reply {
        self.call(command).await
    }
}
