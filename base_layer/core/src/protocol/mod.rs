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

//! # Protocol sessions
//!
//! A [`ProtocolSession`] exists for every (peer, capability) pair. It performs the status handshake and correlates
//! requests with replies over an abstract [`MessageSender`]. Only one request per message kind may be outstanding on
//! a session, which makes replies of that kind unambiguous without request ids.
//!
//! [`FlowControl`] implements the credit scheme of the light protocol: the serving side charges every request
//! against the requester's buffer, and the requesting side uses the buffer value reported in replies to decide how
//! much it may still ask for.

mod capability;
pub use capability::Capability;

mod config;
pub use config::ProtocolConfig;

mod error;
pub use error::{FlowControlError, HandshakeError, ProtocolError};

mod flow_control;
pub use flow_control::{FlowControl, FlowControlParams, RequestCost};

mod messages;
pub use messages::{ChainHead, GetBlockHeaders, HeaderOrigin, MessageCode, ProtocolMessage};

mod sender;
pub use sender::MessageSender;

mod session;
pub use session::{ProtocolSession, SessionState};

mod status;
pub use status::ChainStatus;
