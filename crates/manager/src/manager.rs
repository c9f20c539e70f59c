//! Session routing and failover.

use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, Utc};
use session_bus::{BusError, SharedBus};
use session_core::{Command, IdCodec, Reply, SessionConfig, SessionDetail, SessionRecord};
use session_server::SessionServerHandle;
use telemetry::metrics;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cookie::{purge_time, SessionContext, SetCookie, INVALIDATED, SESSION_COOKIE};

/// Resolves the session of a request, wherever in the cluster it lives.
///
/// Cheap to clone; one instance per node is shared by every request.
#[derive(Clone)]
pub struct SessionManager {
    config: Arc<SessionConfig>,
    codec: IdCodec,
    local: SessionServerHandle,
    bus: SharedBus,
    failover: bool,
}

impl SessionManager {
    /// Creates a manager for the node described by `config`.
    ///
    /// Failover is enabled when the config names a durable store.
    pub fn new(config: SessionConfig, local: SessionServerHandle, bus: SharedBus) -> Self {
        let codec = IdCodec::from_secret(&config.secret);
        let failover = config.failover_enabled();
        Self {
            config: Arc::new(config),
            codec,
            local,
            bus,
            failover,
        }
    }

    /// Replaces the identifier codec, e.g. to plug in another cipher.
    pub fn with_codec(mut self, codec: IdCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Overrides whether timed-out remote calls fall back to the durable store.
    pub fn with_failover(mut self, enabled: bool) -> Self {
        self.failover = enabled;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn codec(&self) -> &IdCodec {
        &self.codec
    }

    pub fn local_server(&self) -> &SessionServerHandle {
        &self.local
    }

    pub fn local_address(&self) -> &str {
        self.local.address()
    }

    /// Address of the server owning `id`, or `None` if the id does not decode.
    pub fn address_for(&self, id: &str) -> Option<String> {
        match self.codec.owner_of(id) {
            Ok(node_id) => Some(self.config.address_of(node_id)),
            Err(e) => {
                metrics().invalid_identifiers.inc();
                warn!(id = %id, "Undecodable session id: {}", e);
                None
            }
        }
    }

    pub fn session_detail(&self, id: &str) -> Option<SessionDetail> {
        self.codec.decode(id).ok()
    }

    pub fn has_session_cookie(&self, ctx: &SessionContext) -> bool {
        ctx.session_id().is_some()
    }

    /// Mints a session owned by this node and sets its cookie.
    pub fn start_session(&self, ctx: &mut SessionContext) -> SessionRecord {
        let id = self.codec.generate(self.config.node_id, &ctx.client_host);
        self.start_session_with_id(ctx, id.as_str())
    }

    /// Sets the cookie for an existing id and returns an empty record for it.
    pub fn start_session_with_id(&self, ctx: &mut SessionContext, id: &str) -> SessionRecord {
        metrics().sessions_started.inc();
        self.set_session_cookie(ctx, id);
        debug!(id = %id, "Session started");
        SessionRecord::new(id)
    }

    /// Loads the session named by the request cookie.
    ///
    /// `None` means the caller has no usable session and should start one;
    /// no failure of the session subsystem is surfaced any other way.
    pub async fn get_session(&self, ctx: &mut SessionContext) -> Option<SessionRecord> {
        let id = ctx.session_id()?.to_string();
        let address = self.address_for(&id)?;

        let payload = if address == self.local_address() {
            metrics().local_gets.inc();
            self.local.get(&id).await
        } else {
            metrics().remote_gets.inc();
            match self.remote(&address, Command::get(id.as_str())).await {
                Ok(reply) => reply.into_record(),
                Err(_) => return self.failover_get(ctx, &id).await,
            }
        };

        payload.and_then(|payload| decode_record(&id, &payload))
    }

    /// Persists `record` on its owning node.
    ///
    /// Returns whether the write was accepted. On success the record is no
    /// longer marked modified.
    pub async fn save_session_data(&self, record: Option<&mut SessionRecord>) -> bool {
        let Some(record) = record else {
            return false;
        };
        if record.id.is_empty() {
            return false;
        }

        record.touch();
        let payload = match record.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                error!(id = %record.id, "Failed to serialize session: {}", e);
                return false;
            }
        };
        let Some(address) = self.address_for(&record.id) else {
            return false;
        };

        metrics().saves.inc();
        let saved = if address == self.local_address() {
            self.local.save(&record.id, &payload).await
        } else {
            let command = Command::save(record.id.as_str(), payload);
            match self.remote(&address, command.clone()).await {
                Ok(reply) => reply.is_ack(),
                Err(_) if self.failover => {
                    metrics().save_failovers.inc();
                    info!(id = %record.id, address = %address, "Saving session through failover");
                    self.local.call(command.into_failover()).await.is_ack()
                }
                Err(_) => false,
            }
        };

        if saved {
            record.reset_modified(false);
        }
        saved
    }

    /// Purges the session cookie and destroys the session in the background.
    ///
    /// The cookie is invalidated before anything else so the browser stops
    /// presenting it whatever the backend outcome. The returned handle may
    /// be awaited but callers need not.
    pub fn destroy_session(
        &self,
        ctx: &mut SessionContext,
        record: &SessionRecord,
    ) -> Option<JoinHandle<()>> {
        if record.id.is_empty() {
            return None;
        }

        ctx.jar.set(SetCookie {
            expires: Some(purge_time()),
            ..self.cookie(INVALIDATED)
        });

        let address = self.address_for(&record.id)?;
        metrics().destroys.inc();

        let manager = self.clone();
        let id = record.id.clone();
        Some(tokio::spawn(async move {
            manager.route_destroy(&address, &id).await;
        }))
    }

    async fn route_destroy(&self, address: &str, id: &str) {
        if address == self.local_address() {
            self.local.destroy(id).await;
            return;
        }

        let command = Command::destroy(id);
        match self.remote(address, command.clone()).await {
            Ok(_) => {}
            Err(_) if self.failover => {
                metrics().destroy_failovers.inc();
                info!(id = %id, address = %address, "Destroying session through failover");
                self.local.call(command.into_failover()).await;
            }
            Err(_) => warn!(id = %id, "Session destroy was not delivered"),
        }
    }

    /// Rehomes `id` onto this node from the durable store after its owner
    /// failed to answer.
    async fn failover_get(&self, ctx: &mut SessionContext, id: &str) -> Option<SessionRecord> {
        if !self.failover {
            metrics().sessions_lost.inc();
            warn!(id = %id, "Owner unreachable and no durable store, session lost");
            return None;
        }

        metrics().get_failovers.inc();
        let new_id = self.codec.generate(self.config.node_id, &ctx.client_host);

        match self.local.get_failover(id, new_id.as_str()).await {
            Some(payload) => {
                info!(old_id = %id, new_id = %new_id, "Session failed over to local node");
                self.set_session_cookie(ctx, new_id.as_str());
                decode_record(new_id.as_str(), &payload)
            }
            None => {
                metrics().sessions_lost.inc();
                warn!(id = %id, "Owner unreachable and no durable copy, session lost");
                None
            }
        }
    }

    async fn remote(&self, address: &str, command: Command) -> Result<Reply, BusError> {
        let start = Instant::now();
        let result = self
            .bus
            .request(address, command, self.config.bus_timeout())
            .await;
        metrics()
            .bus_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        if let Err(e) = &result {
            if e.is_timeout() {
                metrics().bus_timeouts.inc();
            } else {
                metrics().bus_errors.inc();
            }
            warn!(address = %address, "Session server call failed: {}", e);
        }
        result
    }

    fn set_session_cookie(&self, ctx: &mut SessionContext, id: &str) {
        let expires = (self.config.cookie_ttl_secs > 0)
            .then(|| Utc::now() + Duration::seconds(self.config.cookie_ttl_secs as i64));
        ctx.jar.set(SetCookie {
            expires,
            ..self.cookie(id)
        });
    }

    fn cookie(&self, value: &str) -> SetCookie {
        SetCookie {
            name: SESSION_COOKIE.to_string(),
            value: value.to_string(),
            expires: None,
            path: self.config.cookie_path.clone(),
            domain: self.config.cookie_domain.clone(),
            http_only: true,
        }
    }
}

fn decode_record(id: &str, payload: &str) -> Option<SessionRecord> {
    match SessionRecord::from_payload(payload) {
        Ok(record) => Some(record),
        Err(e) => {
            error!(id = %id, "Stored session is corrupt: {}", e);
            None
        }
    }
}
