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

#![allow(clippy::type_complexity)]

use crate::sync::SyncPeer;

#[derive(Default)]
pub(super) struct Hooks {
    on_progress: Vec<Box<dyn FnMut(u64, u64, &SyncPeer) + Send + Sync>>,
    on_complete: Vec<Box<dyn FnMut(u64) + Send + Sync>>,
}

impl Hooks {
    pub fn add_on_progress_hook<H>(&mut self, hook: H)
    where H: FnMut(u64, u64, &SyncPeer) + Send + Sync + 'static {
        self.on_progress.push(Box::new(hook));
    }

    pub fn call_on_progress_hooks(&mut self, local_height: u64, remote_height: u64, target: &SyncPeer) {
        self.on_progress
            .iter_mut()
            .for_each(|f| (*f)(local_height, remote_height, target));
    }

    pub fn add_on_complete_hook<H>(&mut self, hook: H)
    where H: FnMut(u64) + Send + Sync + 'static {
        self.on_complete.push(Box::new(hook));
    }

    pub fn call_on_complete_hooks(&mut self, count: u64) {
        self.on_complete.iter_mut().for_each(|f| (*f)(count));
    }
}
