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

use std::{sync::Arc, time::Duration};

use chainsync_shutdown::{Shutdown, ShutdownSignal};
use log::*;
use tokio::{
    sync::{broadcast, watch},
    task::{AbortHandle, JoinHandle},
    time,
};

use crate::{
    chain_storage::ChainStorage,
    peers::PeerPool,
    protocol::FlowControl,
    sync::{
        FastSync,
        HeaderServer,
        LightSync,
        PeerHandshaker,
        SyncConfig,
        SyncError,
        SyncEvent,
        SyncMode,
        SyncState,
        SyncVariant,
        Synchronizer,
    },
};

const LOG_TARGET: &str = "c::sync::initializer";

/// Controls a running synchronizer and the tasks started alongside it
pub struct SyncHandle {
    shutdown: Shutdown,
    pool: Arc<PeerPool>,
    state: watch::Receiver<SyncState>,
    events: broadcast::Sender<SyncEvent>,
    tasks: Vec<JoinHandle<()>>,
    stop_timeout: Duration,
}

impl SyncHandle {
    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<SyncState> {
        self.state.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn pool(&self) -> &Arc<PeerPool> {
        &self.pool
    }

    /// Stop every task, waiting up to the stop timeout for active fetches to drain, then close the pool
    pub async fn stop(mut self) -> Result<(), SyncError> {
        info!(target: LOG_TARGET, "Stopping synchronization");
        self.shutdown.trigger();
        let timeout = self.stop_timeout;
        let aborts = self.tasks.iter().map(JoinHandle::abort_handle).collect::<Vec<_>>();
        let joined = time::timeout(timeout, futures::future::join_all(self.tasks)).await;
        if joined.is_err() {
            warn!(
                target: LOG_TARGET,
                "Sync tasks did not stop within {:.2?}, aborting them", timeout
            );
            aborts.iter().for_each(AbortHandle::abort);
        }
        self.pool.close().await;
        let joined = joined.map_err(|_| SyncError::StopTimeout(timeout))?;
        for result in joined {
            result.map_err(|err| SyncError::JoinError(err.to_string()))?;
        }
        Ok(())
    }
}

/// Open the pool and start the handshaker, the header server if `light_serve` is set, and the synchronizer for
/// the configured mode
pub async fn start_sync(
    config: SyncConfig,
    pool: Arc<PeerPool>,
    storage: Arc<dyn ChainStorage>,
) -> Result<SyncHandle, SyncError> {
    let shutdown = Shutdown::new();
    pool.open(shutdown.to_signal()).await?;

    let flow_control = Arc::new(FlowControl::new(config.flow_control.clone()));
    let mut tasks = Vec::new();
    let handshaker = PeerHandshaker::new(&config, pool.clone(), storage.clone());
    tasks.push(tokio::spawn(handshaker.run(shutdown.to_signal())));
    if config.light_serve {
        let server = HeaderServer::new(pool.clone(), storage.clone(), flow_control.clone());
        tasks.push(tokio::spawn(server.run(shutdown.to_signal())));
    }

    let stop_timeout = config.stop_timeout;
    let (state, events, task) = match config.mode {
        SyncMode::Fast => spawn(
            Synchronizer::new(config, FastSync::new(), pool.clone(), storage),
            shutdown.to_signal(),
        ),
        SyncMode::Light => spawn(
            Synchronizer::new(config, LightSync::new(flow_control), pool.clone(), storage),
            shutdown.to_signal(),
        ),
    };
    tasks.push(task);

    Ok(SyncHandle {
        shutdown,
        pool,
        state,
        events,
        tasks,
        stop_timeout,
    })
}

fn spawn<V: SyncVariant>(
    synchronizer: Synchronizer<V>,
    shutdown: ShutdownSignal,
) -> (watch::Receiver<SyncState>, broadcast::Sender<SyncEvent>, JoinHandle<()>) {
    let state = synchronizer.watch_state();
    let events = synchronizer.event_publisher();
    (state, events, synchronizer.spawn(shutdown))
}
