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

//! # Ordered fetching
//!
//! The [`Fetcher`] splits a unit of work into tasks with ascending indexes, assigns them to idle peers from the
//! pool, and hands results to a [`FetchWriter`] strictly in index order however the replies interleave. What a task
//! is, how it is requested and how a reply is validated is supplied by a [`FetchStrategy`].
//!
//! A task is never lost: a peer that does not answer in time is banned and the task requeued, a peer that answers
//! with something unusable is skipped for a while and the task requeued. Only a failed write ends the fetch early.

mod ban;
pub use ban::PeerBanManager;

mod block_fetcher;
pub use block_fetcher::BlockFetchStrategy;

mod config;
pub use config::FetcherConfig;

mod error;
pub use error::{FetchError, RequestError};

#[allow(clippy::module_inception)]
mod fetcher;
pub use fetcher::{FetchProgress, FetchSummary, Fetcher};

mod header_fetcher;
pub use header_fetcher::{HeaderFetchStrategy, HeaderRange};

mod job;

mod strategy;
pub use strategy::{FetchStrategy, FetchWriter, ProcessOutcome};

mod writer;
pub use writer::{BlockWriter, HeaderWriter};
