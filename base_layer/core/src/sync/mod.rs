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

//! # Synchronization
//!
//! A [`Synchronizer`] repeatedly selects the syncable peer with the heaviest chain ([`Synchronizer::best`]),
//! asks it for the height of its head, and drives a [`Fetcher`](crate::fetcher::Fetcher) over the missing block
//! numbers. The [`SyncVariant`] decides what is fetched:
//!
//! - [`FastSync`]: full blocks from eth peers, written with `put_blocks`
//! - [`LightSync`]: headers from les peers that serve them, written with `put_headers`
//!
//! [`start_sync`] wires a pool, the [`PeerHandshaker`], an optional [`HeaderServer`] and the synchronizer of the
//! configured [`SyncMode`] together and returns a [`SyncHandle`].

mod config;
pub use config::{SyncConfig, SyncMode};

mod error;
pub use error::SyncError;

mod events;
pub use events::{SyncEvent, SyncState};

mod handshaker;
pub use handshaker::PeerHandshaker;

mod header_server;
pub use header_server::{HeaderServer, MAX_HEADERS_SERVED};

mod hooks;

mod initializer;
pub use initializer::{start_sync, SyncHandle};

mod sync_peer;
pub use sync_peer::SyncPeer;

mod synchronizer;
pub use synchronizer::Synchronizer;

mod variant;
pub use variant::{FastSync, LightSync, SyncVariant};
