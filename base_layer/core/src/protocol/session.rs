//  Copyright 2024, The Tari Project
//
//  Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
//  following conditions are met:
//
//  1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
//  disclaimer.
//
//  2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
//  following disclaimer in the documentation and/or other materials provided with the distribution.
//
//  3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
//  products derived from this software without specific prior written permission.
//
//  THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
//  INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
//  DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
//  SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
//  SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
//  WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
//  USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
};

use chainsync_common_types::types::{BlockHash, Difficulty};
use log::*;
use tokio::{
    sync::{broadcast, oneshot, watch},
    time,
};

use crate::protocol::{
    Capability,
    ChainStatus,
    HandshakeError,
    MessageCode,
    MessageSender,
    ProtocolConfig,
    ProtocolError,
    ProtocolMessage,
};

const LOG_TARGET: &str = "c::protocol::session";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Unconnected,
    Handshaking,
    Ready,
    Closed,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = match self {
            SessionState::Unconnected => "Unconnected",
            SessionState::Handshaking => "Handshaking",
            SessionState::Ready => "Ready",
            SessionState::Closed => "Closed",
        };
        f.write_str(state)
    }
}

type ReplySender = oneshot::Sender<Result<ProtocolMessage, ProtocolError>>;

struct PendingRequest {
    id: u64,
    reply: ReplySender,
}

type PendingRequests = Mutex<HashMap<MessageCode, PendingRequest>>;

/// Releases a pending slot when the request future completes or is dropped. A slot that has since been taken by a
/// newer request is left alone.
struct PendingGuard<'a> {
    pending: &'a PendingRequests,
    code: MessageCode,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.get(&self.code).map(|p| p.id) == Some(self.id) {
            pending.remove(&self.code);
        }
    }
}

/// Handshake and request correlation for one protocol spoken with one peer
pub struct ProtocolSession {
    capability: Capability,
    config: ProtocolConfig,
    sender: Arc<dyn MessageSender>,
    state: watch::Sender<SessionState>,
    remote_status: watch::Sender<Option<ChainStatus>>,
    /// Keyed by the code of the expected reply
    pending: PendingRequests,
    next_request_id: AtomicU64,
    unsolicited: broadcast::Sender<Arc<ProtocolMessage>>,
}

impl ProtocolSession {
    pub fn new(capability: Capability, config: ProtocolConfig, sender: Arc<dyn MessageSender>) -> Self {
        let (state, _) = watch::channel(SessionState::Unconnected);
        let (remote_status, _) = watch::channel(None);
        let (unsolicited, _) = broadcast::channel(config.event_buffer_size.max(1));
        Self {
            capability,
            config,
            sender,
            state,
            remote_status,
            pending: Mutex::new(HashMap::new()),
            next_request_id: AtomicU64::new(0),
            unsolicited,
        }
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// The status of the remote peer once the handshake has completed
    pub fn status(&self) -> Option<ChainStatus> {
        if self.is_ready() {
            self.remote_status.borrow().clone()
        } else {
            None
        }
    }

    /// Subscribe to messages that did not answer a pending request
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ProtocolMessage>> {
        self.unsolicited.subscribe()
    }

    /// Send the local status and wait for the peer's. Calling this on a ready session returns the negotiated status
    /// without sending anything. A failed handshake closes the session.
    pub async fn handshake(&self, local: &ChainStatus) -> Result<ChainStatus, HandshakeError> {
        let mut started = false;
        self.state.send_if_modified(|state| {
            if *state == SessionState::Unconnected {
                *state = SessionState::Handshaking;
                started = true;
                return true;
            }
            false
        });
        if !started {
            return self.wait_for_handshake().await;
        }

        if let Err(err) = self.sender.send_status(local).await {
            return Err(self.fail_handshake(HandshakeError::SendFailed(err.to_string())));
        }

        let mut status_rx = self.remote_status.subscribe();
        let mut state_rx = self.state.subscribe();
        let wait_for_status = async {
            tokio::select! {
                status = status_rx.wait_for(Option::is_some) => status.ok().and_then(|s| s.clone()),
                _ = state_rx.wait_for(|s| *s == SessionState::Closed) => None,
            }
        };
        let timeout = self.config.handshake_timeout;
        let remote = match time::timeout(timeout, wait_for_status).await {
            Ok(Some(remote)) => remote,
            Ok(None) => return Err(self.fail_handshake(HandshakeError::SessionClosed)),
            Err(_) => return Err(self.fail_handshake(HandshakeError::Timeout(timeout))),
        };

        if !remote.is_compatible_with(local) {
            let details = format!(
                "network {} genesis {}, expected network {} genesis {}",
                remote.network_id,
                remote.genesis_hash.short_str(),
                local.network_id,
                local.genesis_hash.short_str()
            );
            return Err(self.fail_handshake(HandshakeError::IncompatibleChain(details)));
        }

        self.state.send_replace(SessionState::Ready);
        debug!(target: LOG_TARGET, "{} handshake complete ({})", self.capability, remote);
        Ok(remote)
    }

    async fn wait_for_handshake(&self) -> Result<ChainStatus, HandshakeError> {
        let mut state_rx = self.state.subscribe();
        let wait = state_rx.wait_for(|s| matches!(s, SessionState::Ready | SessionState::Closed));
        match time::timeout(self.config.handshake_timeout, wait).await {
            Ok(Ok(state)) if *state == SessionState::Ready => {},
            Ok(_) => return Err(HandshakeError::SessionClosed),
            Err(_) => return Err(HandshakeError::Timeout(self.config.handshake_timeout)),
        }
        self.status().ok_or(HandshakeError::SessionClosed)
    }

    fn fail_handshake(&self, err: HandshakeError) -> HandshakeError {
        debug!(target: LOG_TARGET, "{} handshake failed: {}", self.capability, err);
        self.close();
        err
    }

    /// Feed a status received from the peer. Before the handshake completes this is the peer's half of the
    /// handshake. Afterwards it refreshes the advertised head; network id and genesis are fixed by the handshake.
    pub fn handle_status(&self, status: ChainStatus) {
        match self.state() {
            SessionState::Closed => {
                trace!(target: LOG_TARGET, "Ignoring status on closed {} session", self.capability);
            },
            SessionState::Ready => {
                self.remote_status.send_modify(|current| {
                    if let Some(current) = current {
                        current.total_difficulty = status.total_difficulty;
                        current.best_hash = status.best_hash;
                        if status.head_number.is_some() {
                            current.head_number = status.head_number;
                        }
                    }
                });
            },
            SessionState::Unconnected | SessionState::Handshaking => {
                self.remote_status.send_replace(Some(status));
            },
        }
    }

    /// Feed a message received from the peer. A reply resolves the pending request of its kind, anything else is
    /// published to subscribers.
    pub fn handle_message(&self, message: ProtocolMessage) {
        if !self.is_ready() {
            trace!(
                target: LOG_TARGET,
                "Dropping {} received on {} session that is {}",
                message,
                self.capability,
                self.state()
            );
            return;
        }

        let waiter = self.pending_access().remove(&message.code());
        if let Some(waiter) = waiter {
            if waiter.reply.send(Ok(message)).is_err() {
                trace!(target: LOG_TARGET, "Requester went away before the reply arrived");
            }
            return;
        }

        match &message {
            ProtocolMessage::Announce(head) => self.refresh_head(head.total_difficulty, head.hash, head.number),
            ProtocolMessage::NewBlock {
                block,
                total_difficulty,
            } => self.refresh_head(*total_difficulty, block.hash(), block.number()),
            _ => {},
        }
        // No receivers is not an error
        let _result = self.unsolicited.send(Arc::new(message));
    }

    fn refresh_head(&self, total_difficulty: Difficulty, hash: BlockHash, number: u64) {
        self.remote_status.send_modify(|current| {
            if let Some(current) = current {
                current.total_difficulty = total_difficulty;
                current.best_hash = hash;
                current.head_number = Some(number);
            }
        });
    }

    /// Send a request and wait for the reply of the matching kind. Fails immediately with `DuplicateRequest` if a
    /// request of the same kind is outstanding.
    pub async fn request(&self, request: ProtocolMessage) -> Result<ProtocolMessage, ProtocolError> {
        let code = request.code();
        let reply_code = code.reply_code().ok_or(ProtocolError::NotARequest(code))?;
        self.check_sendable(code)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut pending = self.pending_access();
            if pending.contains_key(&reply_code) {
                return Err(ProtocolError::DuplicateRequest(code));
            }
            pending.insert(reply_code, PendingRequest { id, reply: reply_tx });
        }
        let _guard = PendingGuard {
            pending: &self.pending,
            code: reply_code,
            id,
        };

        trace!(target: LOG_TARGET, "Sending {} request #{}: {}", self.capability, id, request);
        self.sender.send_message(&request).await?;

        let timeout = self.config.request_timeout;
        match time::timeout(timeout, reply_rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(ProtocolError::SessionClosed),
            Err(_) => Err(ProtocolError::RequestTimeout { code, timeout }),
        }
    }

    /// Send a message that expects no reply
    pub async fn send(&self, message: &ProtocolMessage) -> Result<(), ProtocolError> {
        self.check_sendable(message.code())?;
        self.sender.send_message(message).await
    }

    fn check_sendable(&self, code: MessageCode) -> Result<(), ProtocolError> {
        match self.state() {
            SessionState::Ready => {},
            SessionState::Closed => return Err(ProtocolError::SessionClosed),
            state => return Err(ProtocolError::NotReady(state)),
        }
        if code.wire_code(self.capability).is_none() {
            return Err(ProtocolError::UnsupportedMessage {
                code,
                capability: self.capability,
            });
        }
        Ok(())
    }

    /// Close the session, rejecting every pending request with `SessionClosed`
    pub fn close(&self) {
        let previous = self.state.send_replace(SessionState::Closed);
        let pending = self.pending_access().drain().collect::<Vec<_>>();
        for (_, waiter) in pending {
            let _result = waiter.reply.send(Err(ProtocolError::SessionClosed));
        }
        if previous != SessionState::Closed {
            debug!(target: LOG_TARGET, "{} session closed", self.capability);
        }
    }

    fn pending_access(&self) -> MutexGuard<'_, HashMap<MessageCode, PendingRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;
    use crate::{
        blocks::BlockHeader,
        protocol::{ChainHead, GetBlockHeaders},
        test_helpers::{create_status, MockSender, SentMessage},
    };

    fn create_session() -> (Arc<ProtocolSession>, tokio::sync::mpsc::UnboundedReceiver<SentMessage>) {
        let (sender, sent) = MockSender::new();
        let session = ProtocolSession::new(Capability::Les, ProtocolConfig::default(), sender);
        (Arc::new(session), sent)
    }

    async fn ready_session() -> (Arc<ProtocolSession>, tokio::sync::mpsc::UnboundedReceiver<SentMessage>) {
        let (session, mut sent) = create_session();
        session.handle_status(create_status(200));
        session.handshake(&create_status(100)).await.unwrap();
        assert!(matches!(sent.recv().await, Some(SentMessage::Status(_))));
        (session, sent)
    }

    fn headers_reply(count: u64) -> ProtocolMessage {
        let mut prev = BlockHeader::genesis(1.into());
        let headers = (0..count)
            .map(|_| {
                prev = BlockHeader::from_previous(&prev);
                prev.clone()
            })
            .collect();
        ProtocolMessage::BlockHeaders {
            headers,
            buffer_value: Some(1000),
        }
    }

    #[tokio::test]
    async fn handshake_is_idempotent() {
        let (session, mut sent) = ready_session().await;
        assert!(session.is_ready());
        let status = session.handshake(&create_status(100)).await.unwrap();
        assert_eq!(status.total_difficulty, 200.into());
        assert!(sent.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn handshake_times_out() {
        let (session, _sent) = create_session();
        let err = session.handshake(&create_status(100)).await.unwrap_err();
        assert!(matches!(err, HandshakeError::Timeout(t) if t == Duration::from_secs(10)));
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.status().is_none());
    }

    #[tokio::test]
    async fn handshake_rejects_other_networks() {
        let (session, _sent) = create_session();
        let mut remote = create_status(100);
        remote.network_id += 1;
        session.handle_status(remote);
        let err = session.handshake(&create_status(100)).await.unwrap_err();
        assert!(matches!(err, HandshakeError::IncompatibleChain(_)));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn requests_require_a_ready_session() {
        let (session, _sent) = create_session();
        let err = session
            .request(ProtocolMessage::GetBlockHeaders(GetBlockHeaders::range(1, 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::NotReady(SessionState::Unconnected)));
    }

    #[tokio::test]
    async fn it_rejects_a_second_request_of_the_same_kind() {
        let (session, mut sent) = ready_session().await;
        let first = tokio::spawn({
            let session = session.clone();
            async move {
                session
                    .request(ProtocolMessage::GetBlockHeaders(GetBlockHeaders::range(1, 2)))
                    .await
            }
        });
        assert!(matches!(sent.recv().await, Some(SentMessage::Message(_))));

        let err = session
            .request(ProtocolMessage::GetBlockHeaders(GetBlockHeaders::range(3, 2)))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::DuplicateRequest(MessageCode::GetBlockHeaders)));

        // The first request is still pending and resolves normally
        session.handle_message(headers_reply(2));
        let reply = first.await.unwrap().unwrap();
        assert_eq!(reply, headers_reply(2));
    }

    #[tokio::test]
    async fn requests_of_different_kinds_may_overlap() {
        let (session, mut sent) = ready_session().await;
        let headers = tokio::spawn({
            let session = session.clone();
            async move {
                session
                    .request(ProtocolMessage::GetBlockHeaders(GetBlockHeaders::range(1, 1)))
                    .await
            }
        });
        sent.recv().await.unwrap();
        let bodies = tokio::spawn({
            let session = session.clone();
            async move { session.request(ProtocolMessage::GetBlockBodies(vec![])).await }
        });
        sent.recv().await.unwrap();
        session.handle_message(ProtocolMessage::BlockBodies {
            bodies: vec![],
            buffer_value: None,
        });
        session.handle_message(headers_reply(1));
        assert_eq!(headers.await.unwrap().unwrap().code(), MessageCode::BlockHeaders);
        assert_eq!(bodies.await.unwrap().unwrap().code(), MessageCode::BlockBodies);
    }

    #[tokio::test(start_paused = true)]
    async fn a_timed_out_request_frees_its_slot() {
        let (session, mut sent) = ready_session().await;
        let err = session
            .request(ProtocolMessage::GetBlockHeaders(GetBlockHeaders::range(1, 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::RequestTimeout {
            code: MessageCode::GetBlockHeaders,
            ..
        }));
        sent.recv().await.unwrap();

        let retry = tokio::spawn({
            let session = session.clone();
            async move {
                session
                    .request(ProtocolMessage::GetBlockHeaders(GetBlockHeaders::range(1, 1)))
                    .await
            }
        });
        sent.recv().await.unwrap();
        session.handle_message(headers_reply(1));
        assert!(retry.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn a_dropped_request_frees_its_slot() {
        let (session, mut sent) = ready_session().await;
        let request = tokio::spawn({
            let session = session.clone();
            async move {
                session
                    .request(ProtocolMessage::GetBlockHeaders(GetBlockHeaders::range(1, 1)))
                    .await
            }
        });
        sent.recv().await.unwrap();
        request.abort();
        assert!(request.await.unwrap_err().is_cancelled());
        assert!(session.pending_access().is_empty());
    }

    #[tokio::test]
    async fn unmatched_messages_are_published() {
        let (session, _sent) = ready_session().await;
        let mut events = session.subscribe();
        session.handle_message(headers_reply(1));
        assert_eq!(*events.recv().await.unwrap(), headers_reply(1));
    }

    #[tokio::test]
    async fn announcements_refresh_the_head_only() {
        let (session, _sent) = ready_session().await;
        let before = session.status().unwrap();
        session.handle_message(ProtocolMessage::Announce(ChainHead {
            hash: [1u8; 32].into(),
            number: 42,
            total_difficulty: 500.into(),
        }));
        let mut status = create_status(900);
        status.network_id += 7;
        session.handle_status(status);

        let after = session.status().unwrap();
        assert_eq!(after.head_number, Some(42));
        assert_eq!(after.best_hash, [1u8; 32].into());
        assert_eq!(after.total_difficulty, 900.into());
        assert_eq!(after.network_id, before.network_id);
        assert_eq!(after.genesis_hash, before.genesis_hash);
    }

    #[tokio::test]
    async fn close_rejects_pending_requests() {
        let (session, mut sent) = ready_session().await;
        let request = tokio::spawn({
            let session = session.clone();
            async move {
                session
                    .request(ProtocolMessage::GetBlockHeaders(GetBlockHeaders::range(1, 1)))
                    .await
            }
        });
        sent.recv().await.unwrap();
        session.close();
        assert!(matches!(request.await.unwrap(), Err(ProtocolError::SessionClosed)));
        assert!(!session.is_ready());
    }
}
