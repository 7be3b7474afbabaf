use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::pipeline::{spawn_finish, FinishPipeline};
use super::protocol::{ClientMessage, ServerMessage};
use super::registry::SessionRegistry;
use super::sink::OwnerId;
use crate::store::{ChunkMeta, ChunkStore};

/// Audio parameters applied when a `start` message omits them
#[derive(Debug, Clone, Copy)]
pub struct AudioDefaults {
    pub sample_rate: u32,
    pub channels: u16,
}

/// One capture session bound to one connection
struct ActiveSession {
    session_id: String,
    sample_rate: u32,
    channels: u16,
    /// Set by `chunk_meta`, consumed by the next binary frame
    pending_meta: Option<ChunkMeta>,
    /// Set once `stop` has been accepted; no further chunks allowed
    finishing: bool,
}

/// Protocol state machine for one connection.
///
/// Owns the session exclusively: no state here is shared across connections.
/// Protocol errors on a single chunk are reported and absorbed rather than
/// aborting the session, since they typically reflect a transient client bug.
pub struct SessionManager {
    registry: Arc<SessionRegistry>,
    store: Arc<ChunkStore>,
    pipeline: Arc<FinishPipeline>,
    defaults: AudioDefaults,
    owner: OwnerId,
    outbound: mpsc::UnboundedSender<ServerMessage>,
    active: Option<ActiveSession>,
}

impl SessionManager {
    pub fn new(
        registry: Arc<SessionRegistry>,
        store: Arc<ChunkStore>,
        pipeline: Arc<FinishPipeline>,
        defaults: AudioDefaults,
        owner: OwnerId,
        outbound: mpsc::UnboundedSender<ServerMessage>,
    ) -> Self {
        Self {
            registry,
            store,
            pipeline,
            defaults,
            owner,
            outbound,
            active: None,
        }
    }

    /// Handle one text (control) frame
    pub async fn handle_text(&mut self, text: &str) {
        // A chunk_meta must be followed immediately by its binary frame; any
        // other interleaved message voids the pending meta.
        let stale = self
            .active
            .as_mut()
            .and_then(|s| s.pending_meta.take().map(|m| (s.session_id.clone(), m.seq)));
        if let Some((session_id, seq)) = stale {
            warn!(
                "[{}] chunk_meta seq={} had no following binary frame; discarded",
                session_id, seq
            );
            self.send_error(format!(
                "chunk_meta seq={} was not followed by a binary frame",
                seq
            ));
        }

        let message: ClientMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Invalid control message: {}", e);
                self.send_error("invalid control message".to_string());
                return;
            }
        };

        match message {
            ClientMessage::Start {
                session_id,
                sample_rate,
                channels,
            } => self.on_start(session_id, sample_rate, channels).await,
            ClientMessage::ChunkMeta {
                seq,
                sample_count,
                valid_sample_count,
                sample_rate,
                channels,
                timestamp,
            } => {
                self.on_chunk_meta(ChunkMeta {
                    seq,
                    sample_count,
                    valid_sample_count,
                    sample_rate,
                    channels,
                    timestamp,
                });
            }
            ClientMessage::Stop { session_id } => self.on_stop(session_id).await,
        }
    }

    /// Handle one binary frame (raw Float32 PCM for the pending chunk_meta)
    pub async fn handle_binary(&mut self, bytes: Vec<u8>) {
        let pending = self
            .active
            .as_mut()
            .map(|s| (s.session_id.clone(), s.pending_meta.take()));

        let (session_id, meta) = match pending {
            None => {
                warn!(
                    "Binary frame with no active session (ignored, {} bytes)",
                    bytes.len()
                );
                self.send_error("binary frame without an active session".to_string());
                return;
            }
            Some((session_id, None)) => {
                warn!(
                    "[{}] binary frame without preceding chunk_meta (ignored, {} bytes)",
                    session_id,
                    bytes.len()
                );
                self.send_error("binary frame without preceding chunk_meta".to_string());
                return;
            }
            Some((session_id, Some(meta))) => (session_id, meta),
        };

        let seq = meta.seq;

        // Durable before the next frame for this session is processed
        match self.store.put(&session_id, seq, &bytes, &meta).await {
            Ok(()) => {
                info!(
                    "[{}] saved chunk seq={} ({} bytes, declared={} valid={:?})",
                    session_id,
                    seq,
                    bytes.len(),
                    meta.sample_count,
                    meta.valid_sample_count
                );
            }
            Err(e) => {
                warn!("[{}] failed to persist chunk seq={}: {:#}", session_id, seq, e);
                self.send_error(format!("failed to persist chunk seq={}", seq));
            }
        }
    }

    /// Connection teardown. A session that never received `stop` is
    /// abandoned: its chunks stay on disk for the orphan sweeper.
    pub async fn handle_disconnect(&mut self) {
        if let Some(session) = self.active.take() {
            if !session.finishing {
                self.registry.remove_abandoned(&session.session_id).await;
            }
        }
    }

    async fn on_start(
        &mut self,
        session_id: Option<String>,
        sample_rate: Option<u32>,
        channels: Option<u16>,
    ) {
        if let Some(session) = &self.active {
            self.send_error(format!(
                "session {} already started on this connection",
                session.session_id
            ));
            return;
        }

        let session_id = match session_id {
            Some(id) if is_valid_session_id(&id) => id,
            Some(id) => {
                warn!("Rejected invalid session_id {:?}", id);
                self.send_error("invalid session_id".to_string());
                return;
            }
            None => format!("sess_{}", &uuid::Uuid::new_v4().simple().to_string()[..8]),
        };

        if let Err(e) = self.registry.register(&session_id).await {
            self.send_error(format!("{:#}", e));
            return;
        }

        if let Err(e) = self.store.create_session(&session_id) {
            warn!("[{}] failed to allocate chunk storage: {:#}", session_id, e);
            self.registry.remove_abandoned(&session_id).await;
            self.send_error("failed to allocate session storage".to_string());
            return;
        }

        let sample_rate = sample_rate.unwrap_or(self.defaults.sample_rate);
        let channels = channels.unwrap_or(self.defaults.channels);

        info!(
            "[{}] started (owner={}, {}Hz, {} channels)",
            session_id, self.owner, sample_rate, channels
        );

        self.active = Some(ActiveSession {
            session_id: session_id.clone(),
            sample_rate,
            channels,
            pending_meta: None,
            finishing: false,
        });

        self.send(ServerMessage::Started { session_id });
    }

    fn on_chunk_meta(&mut self, meta: ChunkMeta) {
        let Some(session) = self.active.as_mut() else {
            self.send_error("no active session".to_string());
            return;
        };

        if session.finishing {
            let msg = format!("session {} is already finishing", session.session_id);
            self.send_error(msg);
            return;
        }

        session.pending_meta = Some(meta);
    }

    async fn on_stop(&mut self, session_id: Option<String>) {
        let Some(session) = self.active.as_mut() else {
            self.send_error("no active session to stop".to_string());
            return;
        };

        if let Some(requested) = session_id {
            if requested != session.session_id {
                let msg = format!("unknown session {}", requested);
                self.send_error(msg);
                return;
            }
        }

        let id = session.session_id.clone();
        let sample_rate = session.sample_rate;
        let channels = session.channels;

        // Rejects a redundant stop: only Active -> Finishing passes
        if let Err(e) = self.registry.begin_finish(&id).await {
            self.send_error(format!("{:#}", e));
            return;
        }

        if let Some(session) = self.active.as_mut() {
            session.finishing = true;
        }

        // Ack first; the pipeline is detached and never joined by this loop
        self.send(ServerMessage::Processing);

        spawn_finish(
            Arc::clone(&self.pipeline),
            Arc::clone(&self.registry),
            self.outbound.clone(),
            id,
            self.owner.clone(),
            sample_rate,
            channels,
        );
    }

    fn send(&self, message: ServerMessage) {
        if self.outbound.send(message).is_err() {
            info!("Connection closed; dropping outbound message");
        }
    }

    fn send_error(&self, message: String) {
        self.send(ServerMessage::Error { message });
    }
}

/// Session identifiers become directory names; anything outside this
/// alphabet is rejected as a protocol error.
fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_validation() {
        assert!(is_valid_session_id("sess_1a2b3c4d"));
        assert!(is_valid_session_id("meeting-2026-01-01"));
        assert!(!is_valid_session_id(""));
        assert!(!is_valid_session_id("../escape"));
        assert!(!is_valid_session_id("has space"));
        assert!(!is_valid_session_id(&"x".repeat(200)));
    }
}
