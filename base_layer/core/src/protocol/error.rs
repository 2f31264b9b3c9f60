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

use std::time::Duration;

use thiserror::Error;

use crate::{
    peers::PeerError,
    protocol::{Capability, MessageCode, SessionState},
};

#[derive(Debug, Clone, Error)]
pub enum HandshakeError {
    #[error("No status received within {0:.2?}")]
    Timeout(Duration),
    #[error("Remote chain is incompatible: {0}")]
    IncompatibleChain(String),
    #[error("Failed to send status: {0}")]
    SendFailed(String),
    #[error("Session closed during handshake")]
    SessionClosed,
}

#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    #[error("Session is not ready, it is {0}")]
    NotReady(SessionState),
    #[error("Session closed")]
    SessionClosed,
    #[error("A {0} request is already outstanding")]
    DuplicateRequest(MessageCode),
    #[error("{code} request timed out after {timeout:.2?}")]
    RequestTimeout { code: MessageCode, timeout: Duration },
    #[error("{0} is not a request")]
    NotARequest(MessageCode),
    #[error("{code} is not part of {capability}")]
    UnsupportedMessage { code: MessageCode, capability: Capability },
    #[error("Failed to send message: {0}")]
    SendFailed(String),
}

#[derive(Debug, Clone, Error)]
pub enum FlowControlError {
    #[error("No cost is configured for {0}")]
    UnknownCost(MessageCode),
    #[error("Peer did not advertise flow control parameters")]
    NotAdvertised,
    #[error(transparent)]
    PeerError(#[from] PeerError),
}
