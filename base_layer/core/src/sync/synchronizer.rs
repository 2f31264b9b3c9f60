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

use std::{ops::RangeInclusive, sync::Arc};

use chainsync_shutdown::ShutdownSignal;
use log::*;
use num_format::{Locale, ToFormattedString};
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
    time,
};

use super::hooks::Hooks;
use crate::{
    chain_storage::ChainStorage,
    fetcher::{FetchError, Fetcher, HeaderRange},
    peers::PeerPool,
    protocol::ProtocolError,
    sync::{SyncConfig, SyncError, SyncEvent, SyncPeer, SyncState, SyncVariant},
};

const LOG_TARGET: &str = "c::sync::synchronizer";

const EVENT_BUFFER_SIZE: usize = 100;

/// Selects the heaviest peer as sync target and fetches the local chain up to its head
pub struct Synchronizer<V> {
    config: SyncConfig,
    variant: V,
    pool: Arc<PeerPool>,
    storage: Arc<dyn ChainStorage>,
    state: watch::Sender<SyncState>,
    event_publisher: broadcast::Sender<SyncEvent>,
    hooks: Hooks,
}

impl<V: SyncVariant> Synchronizer<V> {
    pub fn new(mut config: SyncConfig, variant: V, pool: Arc<PeerPool>, storage: Arc<dyn ChainStorage>) -> Self {
        let (event_publisher, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        // Mode defaults follow the variant
        config.mode = variant.mode();
        Self {
            config,
            variant,
            pool,
            storage,
            state: watch::Sender::new(SyncState::Idle),
            event_publisher,
            hooks: Default::default(),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_publisher.subscribe()
    }

    pub(super) fn event_publisher(&self) -> broadcast::Sender<SyncEvent> {
        self.event_publisher.clone()
    }

    /// Called with the local height, the target height and the target after every write
    pub fn on_progress<H>(&mut self, hook: H)
    where H: FnMut(u64, u64, &SyncPeer) + Send + Sync + 'static {
        self.hooks.add_on_progress_hook(hook);
    }

    /// Called with the number of imported items after every successful cycle
    pub fn on_complete<H>(&mut self, hook: H)
    where H: FnMut(u64) + Send + Sync + 'static {
        self.hooks.add_on_complete_hook(hook);
    }

    /// The syncable peer advertising the heaviest chain that is at least as heavy as the local one. `None` while
    /// fewer than the minimum number of syncable peers are connected, unless sync is forced.
    pub async fn best(&self) -> Result<Option<SyncPeer>, SyncError> {
        let local_difficulty = self.storage.total_difficulty().await?;
        let capability = self.variant.capability();
        let candidates = self
            .pool
            .peers()
            .into_iter()
            .filter(|p| self.variant.syncable(p))
            .filter_map(|p| {
                let status = p.session(capability).ok()?.status()?;
                Some(SyncPeer::new(p, status))
            })
            .collect::<Vec<_>>();

        let min_peers = self.config.min_peers();
        if candidates.len() < min_peers && !self.config.force_sync {
            debug!(
                target: LOG_TARGET,
                "{} of {} syncable peer(s) connected, not selecting a target",
                candidates.len(),
                min_peers
            );
            return Ok(None);
        }

        Ok(candidates
            .into_iter()
            .filter(|p| *p.total_difficulty() >= local_difficulty)
            .max())
    }

    /// The block numbers missing locally up to the head of `target`. `None` if the local chain reaches it already.
    pub async fn fetch_range(&self, target: &SyncPeer) -> Result<Option<RangeInclusive<u64>>, SyncError> {
        let local_height = self.storage.height().await?;
        let remote_height = self.variant.remote_height(target).await?;
        if remote_height <= local_height {
            debug!(
                target: LOG_TARGET,
                "Peer {} is at height {}, local height is {}: nothing to fetch",
                target.id().short_str(),
                remote_height,
                local_height
            );
            return Ok(None);
        }
        Ok(Some(local_height + 1..=remote_height))
    }

    /// Run one sync cycle and return the number of items imported. Finding nothing to do is a success.
    #[tracing::instrument(level = "debug", skip(self, shutdown), err)]
    pub async fn sync(&mut self, shutdown: ShutdownSignal) -> Result<u64, SyncError> {
        let result = match self.attempt_sync(shutdown).await {
            Err(SyncError::NoSyncTarget) => {
                debug!(target: LOG_TARGET, "No sync target available");
                Ok(0)
            },
            result => result,
        };
        let result = match result {
            Ok(count) => self.storage.height().await.map(|height| (count, height)).map_err(SyncError::from),
            Err(err) => Err(err),
        };

        match result {
            Ok((count, height)) => {
                self.hooks.call_on_complete_hooks(count);
                self.set_state(SyncState::Synchronized { height });
                self.publish(SyncEvent::Synchronized { count });
                Ok(count)
            },
            Err(err) => {
                self.set_state(SyncState::Failed(err.to_string()));
                self.publish(SyncEvent::Failed(err.to_string()));
                Err(err)
            },
        }
    }

    async fn attempt_sync(&mut self, shutdown: ShutdownSignal) -> Result<u64, SyncError> {
        self.set_state(SyncState::SelectingTarget);
        let target = self.best().await?.ok_or(SyncError::NoSyncTarget)?;

        let range = match self.fetch_range(&target).await {
            Ok(Some(range)) => range,
            Ok(None) => return Ok(0),
            Err(err) => {
                self.penalize(&target, &err).await;
                return Err(err);
            },
        };
        let (first, last) = (*range.start(), *range.end());
        info!(
            target: LOG_TARGET,
            "Synchronizing blocks #{} to #{} from {}",
            first.to_formatted_string(&Locale::en),
            last.to_formatted_string(&Locale::en),
            target
        );
        self.publish(SyncEvent::TargetSelected {
            peer: *target.id(),
            height: last,
        });
        self.set_state(SyncState::Fetching {
            target: *target.id(),
            first,
            last,
        });

        let tasks = HeaderRange::split(range, self.config.max_per_request());
        let mut fetcher = Fetcher::new(
            self.config.fetcher.clone(),
            self.variant.strategy(),
            self.variant.writer(self.storage.clone()),
            self.pool.clone(),
            tasks,
            shutdown,
        );
        let hooks = &mut self.hooks;
        let events = &self.event_publisher;
        let target_ref = &target;
        fetcher.on_progress(move |progress| {
            hooks.call_on_progress_hooks(progress.local_height, last, target_ref);
            let _result = events.send(SyncEvent::Imported {
                count: progress.items,
                height: progress.local_height,
            });
        });

        let summary = fetcher.run().await.map_err(|err| match err {
            FetchError::Interrupted => SyncError::Interrupted,
            err => err.into(),
        })?;
        info!(
            target: LOG_TARGET,
            "Imported {} item(s) from {} ({} task(s) retried, {} peer(s) banned)",
            summary.items,
            target.id().short_str(),
            summary.retries,
            summary.bans
        );
        Ok(summary.items)
    }

    /// Ban a target that cannot produce the head it advertised
    async fn penalize(&self, target: &SyncPeer, err: &SyncError) {
        match err {
            SyncError::RemoteHeightUnavailable { .. } | SyncError::ProtocolError(ProtocolError::RequestTimeout { .. }) => {
                warn!(target: LOG_TARGET, "Banning sync target {}: {}", target.id().short_str(), err);
                self.pool.ban(target.peer(), self.config.fetcher.ban_time).await;
            },
            _ => {},
        }
    }

    fn set_state(&self, state: SyncState) {
        trace!(target: LOG_TARGET, "Sync state: {}", state);
        self.state.send_replace(state);
    }

    fn publish(&self, event: SyncEvent) {
        // No subscribers is not an error
        let _result = self.event_publisher.send(event);
    }

    /// Run sync cycles every `interval` until shutdown
    pub async fn run(mut self, mut shutdown: ShutdownSignal) {
        info!(target: LOG_TARGET, "{:?} synchronizer started", self.variant.mode());
        loop {
            if shutdown.is_triggered() {
                break;
            }
            match self.sync(shutdown.clone()).await {
                Ok(0) => {},
                Ok(count) => debug!(target: LOG_TARGET, "Sync cycle imported {} item(s)", count),
                Err(SyncError::Interrupted) => break,
                Err(err) => warn!(target: LOG_TARGET, "Sync cycle failed: {}", err),
            }
            tokio::select! {
                _ = time::sleep(self.config.interval) => {},
                _ = shutdown.wait() => break,
            }
        }
        self.set_state(SyncState::Idle);
        info!(target: LOG_TARGET, "{:?} synchronizer stopped", self.variant.mode());
    }

    pub fn spawn(self, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
