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
    convert::TryFrom,
    fmt::{Display, Formatter},
    str::FromStr,
};

use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Chain weight. Total difficulty of a mature chain exceeds the range of a `u64`.
pub type Difficulty = primitive_types::U256;

pub const FIXED_HASH_SIZE: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid size: expected {expected} bytes, got {actual}")]
pub struct FixedHashSizeError {
    expected: usize,
    actual: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HexError {
    #[error("Invalid hex string: {0}")]
    InvalidHex(String),
    #[error(transparent)]
    InvalidSize(#[from] FixedHashSizeError),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FixedHash([u8; FIXED_HASH_SIZE]);

pub type BlockHash = FixedHash;

impl FixedHash {
    pub const fn zero() -> Self {
        Self([0u8; FIXED_HASH_SIZE])
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, HexError> {
        let bytes = hex::decode(s).map_err(|e| HexError::InvalidHex(e.to_string()))?;
        Ok(Self::try_from(bytes.as_slice())?)
    }

    /// The first 8 hex characters followed by an ellipsis, used in log lines
    pub fn short_str(&self) -> String {
        format!("{}...", &self.to_hex()[..8])
    }
}

impl From<[u8; FIXED_HASH_SIZE]> for FixedHash {
    fn from(hash: [u8; FIXED_HASH_SIZE]) -> Self {
        Self(hash)
    }
}

impl TryFrom<&[u8]> for FixedHash {
    type Error = FixedHashSizeError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let hash = <[u8; FIXED_HASH_SIZE]>::try_from(bytes).map_err(|_| FixedHashSizeError {
            expected: FIXED_HASH_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self(hash))
    }
}

impl AsRef<[u8]> for FixedHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for FixedHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

pub const PEER_ID_SIZE: usize = 16;

/// Opaque identity of a remote peer as assigned by its transport
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId([u8; PEER_ID_SIZE]);

impl PeerId {
    pub fn new(bytes: [u8; PEER_ID_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn random() -> Self {
        let mut bytes = [0u8; PEER_ID_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn short_str(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl From<u64> for PeerId {
    fn from(n: u64) -> Self {
        let mut bytes = [0u8; PEER_ID_SIZE];
        bytes[PEER_ID_SIZE - 8..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }
}

impl FromStr for PeerId {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| HexError::InvalidHex(e.to_string()))?;
        let id = <[u8; PEER_ID_SIZE]>::try_from(bytes.as_slice()).map_err(|_| FixedHashSizeError {
            expected: PEER_ID_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self(id))
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
