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
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chainsync_common_types::types::PeerId;
use tokio::sync::{broadcast, mpsc};

use crate::{
    peers::{Peer, PeerServer, PeerServerError, ServerEvent},
    protocol::{ChainStatus, MessageSender, ProtocolError, ProtocolMessage},
};

/// A server that records bans and lets tests inject connection events
pub struct MockServer {
    events: broadcast::Sender<ServerEvent>,
    bans: Mutex<Vec<(PeerId, Duration)>>,
    started: AtomicBool,
}

impl MockServer {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(20);
        Arc::new(Self {
            events,
            bans: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        })
    }

    pub fn bans(&self) -> Vec<(PeerId, Duration)> {
        self.bans.lock().unwrap().clone()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn connect(&self, peer: Arc<Peer>) {
        assert!(self.events.send(ServerEvent::PeerConnected(peer)).is_ok());
    }

    pub fn disconnect(&self, peer_id: PeerId) {
        assert!(self.events.send(ServerEvent::PeerDisconnected(peer_id)).is_ok());
    }
}

#[async_trait]
impl PeerServer for MockServer {
    fn name(&self) -> &str {
        "mock"
    }

    fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    async fn open(&self) -> Result<(), PeerServerError> {
        Ok(())
    }

    async fn start(&self) -> Result<(), PeerServerError> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), PeerServerError> {
        self.started.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn ban(&self, peer_id: &PeerId, duration: Duration) -> Result<(), PeerServerError> {
        self.bans.lock().unwrap().push((*peer_id, duration));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SentMessage {
    Status(ChainStatus),
    Message(ProtocolMessage),
}

/// A sender that forwards everything sent to it into a channel
pub struct MockSender {
    sent: mpsc::UnboundedSender<SentMessage>,
}

impl MockSender {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<SentMessage>) {
        let (sent, receiver) = mpsc::unbounded_channel();
        (Arc::new(Self { sent }), receiver)
    }
}

#[async_trait]
impl MessageSender for MockSender {
    async fn send_status(&self, status: &ChainStatus) -> Result<(), ProtocolError> {
        // Tests that do not inspect sent messages drop the receiver
        let _result = self.sent.send(SentMessage::Status(status.clone()));
        Ok(())
    }

    async fn send_message(&self, message: &ProtocolMessage) -> Result<(), ProtocolError> {
        let _result = self.sent.send(SentMessage::Message(message.clone()));
        Ok(())
    }
}
