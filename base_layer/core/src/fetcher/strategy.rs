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

use std::fmt::Debug;

use async_trait::async_trait;

use crate::{chain_storage::ChainStorageError, fetcher::RequestError, peers::Peer};

/// The result of validating a reply
#[derive(Debug, PartialEq, Eq)]
pub enum ProcessOutcome<T> {
    /// The task is done and produced these items
    Complete(Vec<T>),
    /// The reply was unusable; the task must be given to a different peer
    Retry(String),
}

/// Describes one kind of fetch: which peers can serve it, how to ask and how to judge the answer
#[async_trait]
pub trait FetchStrategy: Send + Sync + 'static {
    type Task: Clone + Debug + Send + Sync + 'static;
    type Reply: Send + 'static;
    type Item: Send + 'static;

    /// Whether `peer` can be assigned tasks of this kind
    fn peer_filter(&self, peer: &Peer) -> bool;

    async fn request(&self, task: &Self::Task, peer: &Peer) -> Result<Self::Reply, RequestError>;

    fn process(&self, task: &Self::Task, peer: &Peer, reply: Self::Reply) -> ProcessOutcome<Self::Item>;
}

/// Receives fetched items in order
#[async_trait]
pub trait FetchWriter<T>: Send + Sync {
    /// Persist `items` and return the local height afterwards
    async fn write(&self, items: Vec<T>) -> Result<u64, ChainStorageError>;
}
