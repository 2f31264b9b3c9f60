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

use std::fmt::{Display, Formatter};

use chainsync_common_types::types::{BlockHash, Difficulty};
use serde::{Deserialize, Serialize};

use crate::{
    blocks::{Block, BlockBody, BlockHeader},
    protocol::Capability,
};

/// The kind of a protocol message. Requests and their replies are correlated by kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MessageCode {
    Status,
    NewBlockHashes,
    Announce,
    GetBlockHeaders,
    BlockHeaders,
    GetBlockBodies,
    BlockBodies,
    NewBlock,
}

impl MessageCode {
    /// The numeric code of this message kind on the wire of `capability`, or `None` if the protocol does not
    /// define it.
    pub fn wire_code(&self, capability: Capability) -> Option<u8> {
        use MessageCode::*;
        match capability {
            Capability::Eth => match self {
                Status => Some(0x00),
                NewBlockHashes => Some(0x01),
                GetBlockHeaders => Some(0x03),
                BlockHeaders => Some(0x04),
                GetBlockBodies => Some(0x05),
                BlockBodies => Some(0x06),
                NewBlock => Some(0x07),
                Announce => None,
            },
            Capability::Les => match self {
                Status => Some(0x00),
                Announce => Some(0x01),
                GetBlockHeaders => Some(0x02),
                BlockHeaders => Some(0x03),
                GetBlockBodies => Some(0x04),
                BlockBodies => Some(0x05),
                NewBlockHashes | NewBlock => None,
            },
        }
    }

    pub fn from_wire_code(capability: Capability, code: u8) -> Option<Self> {
        use MessageCode::*;
        [
            Status,
            NewBlockHashes,
            Announce,
            GetBlockHeaders,
            BlockHeaders,
            GetBlockBodies,
            BlockBodies,
            NewBlock,
        ]
        .into_iter()
        .find(|c| c.wire_code(capability) == Some(code))
    }

    /// The kind of the reply that answers a request of this kind
    pub fn reply_code(&self) -> Option<MessageCode> {
        match self {
            MessageCode::GetBlockHeaders => Some(MessageCode::BlockHeaders),
            MessageCode::GetBlockBodies => Some(MessageCode::BlockBodies),
            _ => None,
        }
    }
}

impl Display for MessageCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Where a header query starts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderOrigin {
    Number(u64),
    Hash(BlockHash),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBlockHeaders {
    pub origin: HeaderOrigin,
    pub max: u64,
    /// Number of headers to skip between consecutive results
    pub skip: u64,
    /// Walk towards the genesis block instead of the tip
    pub reverse: bool,
}

impl GetBlockHeaders {
    pub fn range(first: u64, count: u64) -> Self {
        Self {
            origin: HeaderOrigin::Number(first),
            max: count,
            skip: 0,
            reverse: false,
        }
    }

    pub fn head(hash: BlockHash) -> Self {
        Self {
            origin: HeaderOrigin::Hash(hash),
            max: 1,
            skip: 0,
            reverse: false,
        }
    }
}

/// Head of a remote chain as announced by the peer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHead {
    pub hash: BlockHash,
    pub number: u64,
    pub total_difficulty: Difficulty,
}

/// Decoded eth/63 and les/2 messages. Encoding is left to the [`MessageSender`](crate::protocol::MessageSender)
/// implementation. Replies under les carry the buffer value of the serving peer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolMessage {
    NewBlockHashes(Vec<(BlockHash, u64)>),
    Announce(ChainHead),
    GetBlockHeaders(GetBlockHeaders),
    BlockHeaders {
        headers: Vec<BlockHeader>,
        buffer_value: Option<u64>,
    },
    GetBlockBodies(Vec<BlockHash>),
    BlockBodies {
        bodies: Vec<BlockBody>,
        buffer_value: Option<u64>,
    },
    NewBlock {
        block: Box<Block>,
        total_difficulty: Difficulty,
    },
}

impl ProtocolMessage {
    pub fn code(&self) -> MessageCode {
        match self {
            ProtocolMessage::NewBlockHashes(_) => MessageCode::NewBlockHashes,
            ProtocolMessage::Announce(_) => MessageCode::Announce,
            ProtocolMessage::GetBlockHeaders(_) => MessageCode::GetBlockHeaders,
            ProtocolMessage::BlockHeaders { .. } => MessageCode::BlockHeaders,
            ProtocolMessage::GetBlockBodies(_) => MessageCode::GetBlockBodies,
            ProtocolMessage::BlockBodies { .. } => MessageCode::BlockBodies,
            ProtocolMessage::NewBlock { .. } => MessageCode::NewBlock,
        }
    }
}

impl Display for ProtocolMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolMessage::NewBlockHashes(hashes) => write!(f, "NewBlockHashes({})", hashes.len()),
            ProtocolMessage::Announce(head) => write!(f, "Announce(#{} {})", head.number, head.hash.short_str()),
            ProtocolMessage::GetBlockHeaders(req) => write!(
                f,
                "GetBlockHeaders({:?}, max: {}, skip: {}, reverse: {})",
                req.origin, req.max, req.skip, req.reverse
            ),
            ProtocolMessage::BlockHeaders { headers, .. } => write!(f, "BlockHeaders({})", headers.len()),
            ProtocolMessage::GetBlockBodies(hashes) => write!(f, "GetBlockBodies({})", hashes.len()),
            ProtocolMessage::BlockBodies { bodies, .. } => write!(f, "BlockBodies({})", bodies.len()),
            ProtocolMessage::NewBlock { block, .. } => write!(f, "NewBlock({})", block),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wire_codes_differ_between_protocols() {
        assert_eq!(MessageCode::GetBlockHeaders.wire_code(Capability::Eth), Some(0x03));
        assert_eq!(MessageCode::GetBlockHeaders.wire_code(Capability::Les), Some(0x02));
        assert_eq!(MessageCode::Announce.wire_code(Capability::Eth), None);
        assert_eq!(MessageCode::NewBlock.wire_code(Capability::Les), None);
        assert_eq!(
            MessageCode::from_wire_code(Capability::Les, 0x03),
            Some(MessageCode::BlockHeaders)
        );
        assert_eq!(
            MessageCode::from_wire_code(Capability::Eth, 0x03),
            Some(MessageCode::GetBlockHeaders)
        );
        assert_eq!(MessageCode::from_wire_code(Capability::Eth, 0x10), None);
    }

    #[test]
    fn only_requests_have_reply_codes() {
        assert_eq!(MessageCode::GetBlockHeaders.reply_code(), Some(MessageCode::BlockHeaders));
        assert_eq!(MessageCode::GetBlockBodies.reply_code(), Some(MessageCode::BlockBodies));
        assert_eq!(MessageCode::BlockHeaders.reply_code(), None);
        assert_eq!(MessageCode::Announce.reply_code(), None);
    }
}
