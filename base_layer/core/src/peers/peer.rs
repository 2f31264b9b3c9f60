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
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use chainsync_common_types::types::PeerId;

use crate::{
    peers::{PeerError, PeerServer},
    protocol::{Capability, ProtocolSession},
};

/// A connected peer and its protocol sessions.
///
/// The idle flag is owned by the fetcher: only the component that claimed a peer releases it.
pub struct Peer {
    id: PeerId,
    address: String,
    inbound: bool,
    server: Arc<dyn PeerServer>,
    sessions: HashMap<Capability, Arc<ProtocolSession>>,
    idle: AtomicBool,
}

impl Peer {
    pub fn new(
        id: PeerId,
        address: impl Into<String>,
        inbound: bool,
        server: Arc<dyn PeerServer>,
        sessions: Vec<Arc<ProtocolSession>>,
    ) -> Self {
        Self {
            id,
            address: address.into(),
            inbound,
            server,
            sessions: sessions.into_iter().map(|s| (s.capability(), s)).collect(),
            idle: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> &PeerId {
        &self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// True if the remote side opened the connection
    pub fn is_inbound(&self) -> bool {
        self.inbound
    }

    pub fn server(&self) -> &Arc<dyn PeerServer> {
        &self.server
    }

    pub fn capabilities(&self) -> impl Iterator<Item = Capability> + '_ {
        self.sessions.keys().copied()
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.sessions.contains_key(&capability)
    }

    pub fn session(&self, capability: Capability) -> Result<&Arc<ProtocolSession>, PeerError> {
        self.sessions.get(&capability).ok_or(PeerError::CapabilityMissing {
            peer: self.id,
            capability,
        })
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Arc<ProtocolSession>> {
        self.sessions.values()
    }

    pub fn is_idle(&self) -> bool {
        self.idle.load(Ordering::Acquire)
    }

    /// Mark the peer busy. Returns false if it already was.
    pub(crate) fn claim(&self) -> bool {
        self.idle
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn release(&self) {
        self.idle.store(true, Ordering::Release);
    }

    pub(crate) fn close(&self) {
        self.sessions.values().for_each(|s| s.close());
    }
}

impl Display for Peer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut capabilities = self.capabilities().map(|c| c.to_string()).collect::<Vec<_>>();
        capabilities.sort();
        write!(
            f,
            "Peer({} {} [{}]{})",
            self.id.short_str(),
            self.address,
            capabilities.join(", "),
            if self.inbound { " inbound" } else { "" }
        )
    }
}
