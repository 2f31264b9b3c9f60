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

use std::{cmp::Ordering, sync::Arc};

use tokio::time::Instant;

use crate::peers::Peer;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum JobState {
    Idle,
    Active,
    Expired,
}

/// A task and the peer it is assigned to, if any. Ordered so that a `BinaryHeap` pops the lowest index first.
pub(super) struct Job<T> {
    pub index: u64,
    pub task: T,
    pub state: JobState,
    pub time: Instant,
    pub peer: Option<Arc<Peer>>,
}

impl<T> Job<T> {
    pub fn new(index: u64, task: T) -> Self {
        Self {
            index,
            task,
            state: JobState::Idle,
            time: Instant::now(),
            peer: None,
        }
    }

    pub fn assign(&mut self, peer: Arc<Peer>) {
        self.state = JobState::Active;
        self.time = Instant::now();
        self.peer = Some(peer);
    }

    /// Return the job to the idle state so that it can be requeued
    pub fn reset(&mut self) -> Option<Arc<Peer>> {
        self.state = JobState::Idle;
        self.time = Instant::now();
        self.peer.take()
    }
}

impl<T> PartialEq for Job<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Job<T> {}

impl<T> PartialOrd for Job<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Job<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.index.cmp(&self.index)
    }
}

/// Items of a completed task awaiting delivery, ordered like `Job`
pub(super) struct Completed<T> {
    pub index: u64,
    pub items: Vec<T>,
}

impl<T> PartialEq for Completed<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Completed<T> {}

impl<T> PartialOrd for Completed<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Completed<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.index.cmp(&self.index)
    }
}

#[cfg(test)]
mod test {
    use std::collections::BinaryHeap;

    use super::*;

    #[test]
    fn heaps_pop_the_lowest_index() {
        let mut heap = BinaryHeap::new();
        for index in [3, 0, 2, 1] {
            heap.push(Job::new(index, ()));
        }
        let order = std::iter::from_fn(|| heap.pop().map(|j| j.index)).collect::<Vec<_>>();
        assert_eq!(order, vec![0, 1, 2, 3]);

        let mut heap = BinaryHeap::new();
        for index in [2, 0, 1] {
            heap.push(Completed::<u8> { index, items: vec![] });
        }
        assert_eq!(heap.pop().unwrap().index, 0);
    }
}
