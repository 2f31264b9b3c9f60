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
    collections::{BinaryHeap, HashMap},
    sync::Arc,
};

use chainsync_common_types::types::PeerId;
use chainsync_shutdown::ShutdownSignal;
use futures::{future::BoxFuture, stream::FuturesUnordered, StreamExt};
use log::*;
use num_format::{Locale, ToFormattedString};
use tokio::time::{self, error::Elapsed, Instant};

use super::job::{Completed, Job, JobState};
use crate::{
    fetcher::{
        FetchError,
        FetchStrategy,
        FetchWriter,
        FetcherConfig,
        PeerBanManager,
        ProcessOutcome,
        RequestError,
    },
    peers::{Peer, PeerPool},
    protocol::ProtocolError,
};

const LOG_TARGET: &str = "c::fetcher";

type RequestResult<R> = Result<Result<R, RequestError>, Elapsed>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// Tasks delivered
    pub tasks: u64,
    /// Items written
    pub items: u64,
    /// Tasks that had to be requeued
    pub retries: u64,
    pub bans: u64,
}

/// Reported after every write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchProgress {
    /// Tasks delivered so far
    pub tasks_delivered: u64,
    /// Items in this write
    pub items: u64,
    /// Local height after the write
    pub local_height: u64,
}

/// Runs the tasks of one fetch to completion. See the [module documentation](crate::fetcher).
pub struct Fetcher<'a, S: FetchStrategy> {
    config: FetcherConfig,
    strategy: Arc<S>,
    writer: Arc<dyn FetchWriter<S::Item>>,
    pool: Arc<PeerPool>,
    ban_manager: PeerBanManager,
    shutdown: ShutdownSignal,
    tasks: Box<dyn Iterator<Item = S::Task> + Send + 'a>,
    tasks_exhausted: bool,
    /// Index given to the next task taken from `tasks`
    next_index: u64,
    /// Index of the next task to be delivered
    next_delivery: u64,
    queue: BinaryHeap<Job<S::Task>>,
    results: BinaryHeap<Completed<S::Item>>,
    active: HashMap<u64, Job<S::Task>>,
    in_flight: FuturesUnordered<BoxFuture<'static, (u64, RequestResult<S::Reply>)>>,
    /// Peers that recently failed to serve a task, with the time they may be assigned again
    deferred: HashMap<PeerId, Instant>,
    on_progress: Vec<Box<dyn FnMut(&FetchProgress) + Send + 'a>>,
    summary: FetchSummary,
}

impl<'a, S: FetchStrategy> Fetcher<'a, S> {
    pub fn new<I>(
        config: FetcherConfig,
        strategy: Arc<S>,
        writer: Arc<dyn FetchWriter<S::Item>>,
        pool: Arc<PeerPool>,
        tasks: I,
        shutdown: ShutdownSignal,
    ) -> Self
    where
        I: IntoIterator<Item = S::Task>,
        I::IntoIter: Send + 'a,
    {
        Self {
            ban_manager: PeerBanManager::new(pool.clone(), config.ban_time),
            config,
            strategy,
            writer,
            pool,
            shutdown,
            tasks: Box::new(tasks.into_iter()),
            tasks_exhausted: false,
            next_index: 0,
            next_delivery: 0,
            queue: BinaryHeap::new(),
            results: BinaryHeap::new(),
            active: HashMap::new(),
            in_flight: FuturesUnordered::new(),
            deferred: HashMap::new(),
            on_progress: Vec::new(),
            summary: FetchSummary::default(),
        }
    }

    pub fn on_progress<H>(&mut self, hook: H)
    where H: FnMut(&FetchProgress) + Send + 'a {
        self.on_progress.push(Box::new(hook));
    }

    /// Fetch and deliver every task. Whatever the outcome, no peer is left claimed when this returns.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub async fn run(mut self) -> Result<FetchSummary, FetchError> {
        let result = self.fetch().await;
        self.teardown();
        result
    }

    async fn fetch(&mut self) -> Result<FetchSummary, FetchError> {
        let mut shutdown = self.shutdown.clone();
        loop {
            if shutdown.is_triggered() {
                self.drain().await;
                return Err(FetchError::Interrupted);
            }

            let assigned = self.assign();
            let delivered = self.deliver().await?;
            if self.is_complete() {
                debug!(
                    target: LOG_TARGET,
                    "Fetch complete: {} task(s), {} item(s), {} retried, {} ban(s)",
                    self.summary.tasks,
                    self.summary.items,
                    self.summary.retries,
                    self.summary.bans
                );
                return Ok(self.summary.clone());
            }
            if assigned || delivered {
                continue;
            }

            tokio::select! {
                Some((index, result)) = self.in_flight.next() => self.handle_completion(index, result).await,
                _ = time::sleep(self.config.interval) => {},
                _ = shutdown.wait() => {},
            }
        }
    }

    fn window(&self) -> u64 {
        self.config.max_queue.max(1) as u64
    }

    fn fill_queue(&mut self) {
        let limit = self.next_delivery + self.window();
        while !self.tasks_exhausted && self.next_index < limit {
            match self.tasks.next() {
                Some(task) => {
                    self.queue.push(Job::new(self.next_index, task));
                    self.next_index += 1;
                },
                None => self.tasks_exhausted = true,
            }
        }
    }

    /// Assign queued tasks to idle peers until the window is full or no peer is available
    fn assign(&mut self) -> bool {
        let now = Instant::now();
        self.deferred.retain(|_, until| *until > now);
        let window = self.window();
        let mut assigned = false;
        loop {
            self.fill_queue();
            match self.queue.peek() {
                Some(job) if job.index < self.next_delivery + window => {},
                _ => break,
            }

            let strategy = &self.strategy;
            let deferred = &self.deferred;
            let peer = match self
                .pool
                .idle(|p| !deferred.contains_key(p.id()) && strategy.peer_filter(p))
            {
                Some(peer) => peer,
                None => break,
            };
            if !peer.claim() {
                break;
            }
            let mut job = match self.queue.pop() {
                Some(job) => job,
                None => {
                    peer.release();
                    break;
                },
            };

            trace!(target: LOG_TARGET, "Assigning task #{} {:?} to {}", job.index, job.task, peer);
            job.assign(peer.clone());
            let index = job.index;
            let task = job.task.clone();
            let strategy = self.strategy.clone();
            let timeout = self.config.timeout;
            self.in_flight.push(Box::pin(async move {
                let result = time::timeout(timeout, strategy.request(&task, &peer)).await;
                (index, result)
            }));
            self.active.insert(index, job);
            assigned = true;
        }
        assigned
    }

    async fn handle_completion(&mut self, index: u64, result: RequestResult<S::Reply>) {
        let job = match self.active.remove(&index) {
            Some(job) => job,
            None => return,
        };
        let peer = match job.peer.clone() {
            Some(peer) => peer,
            None => return,
        };
        peer.release();

        match result {
            Ok(Ok(reply)) => match self.strategy.process(&job.task, &peer, reply) {
                ProcessOutcome::Complete(items) => {
                    trace!(
                        target: LOG_TARGET,
                        "Task #{} completed by {} with {} item(s)",
                        index,
                        peer,
                        items.len()
                    );
                    self.results.push(Completed { index, items });
                },
                ProcessOutcome::Retry(reason) => {
                    debug!(
                        target: LOG_TARGET,
                        "Reply from {} to task #{} {:?} is unusable: {}", peer, index, job.task, reason
                    );
                    self.defer(&peer);
                    self.requeue(job);
                },
            },
            Err(_) => {
                let reason = format!("it did not complete task #{} within {:.2?}", index, self.config.timeout);
                self.expire(job, &peer, &reason).await;
            },
            Ok(Err(RequestError::ProtocolError(err @ ProtocolError::RequestTimeout { .. }))) => {
                self.expire(job, &peer, &err.to_string()).await;
            },
            Ok(Err(RequestError::ProtocolError(ProtocolError::SessionClosed))) => {
                debug!(
                    target: LOG_TARGET,
                    "Peer {} disconnected while performing task #{} {:?}", peer, index, job.task
                );
                self.requeue(job);
            },
            Ok(Err(err)) => {
                debug!(
                    target: LOG_TARGET,
                    "Peer {} failed task #{} {:?}: {}", peer, index, job.task, err
                );
                self.defer(&peer);
                self.requeue(job);
            },
        }
    }

    async fn expire(&mut self, mut job: Job<S::Task>, peer: &Peer, reason: &str) {
        job.state = JobState::Expired;
        debug!(target: LOG_TARGET, "Task #{} {:?} expired", job.index, job.task);
        if self.ban_manager.ban_peer_if_required(peer, reason).await {
            self.summary.bans += 1;
        }
        self.requeue(job);
    }

    fn defer(&mut self, peer: &Peer) {
        self.deferred.insert(*peer.id(), Instant::now() + self.config.interval);
    }

    fn requeue(&mut self, mut job: Job<S::Task>) {
        job.reset();
        self.summary.retries += 1;
        self.queue.push(job);
    }

    /// Write every result that continues the delivered sequence as a single batch
    async fn deliver(&mut self) -> Result<bool, FetchError> {
        let first = self.next_delivery;
        let mut batch = Vec::new();
        while self.results.peek().map_or(false, |c| c.index == self.next_delivery) {
            if let Some(completed) = self.results.pop() {
                batch.extend(completed.items);
                self.next_delivery += 1;
            }
        }
        let tasks = self.next_delivery - first;
        if tasks == 0 {
            return Ok(false);
        }
        self.summary.tasks += tasks;
        if batch.is_empty() {
            return Ok(true);
        }

        let items = batch.len() as u64;
        let local_height = self.writer.write(batch).await?;
        self.summary.items += items;
        debug!(
            target: LOG_TARGET,
            "Delivered {} item(s) from {} task(s), local height is {}",
            items,
            tasks,
            local_height.to_formatted_string(&Locale::en)
        );
        let progress = FetchProgress {
            tasks_delivered: self.next_delivery,
            items,
            local_height,
        };
        self.on_progress.iter_mut().for_each(|f| (*f)(&progress));
        Ok(true)
    }

    fn is_complete(&self) -> bool {
        self.tasks_exhausted && self.queue.is_empty() && self.active.is_empty() && self.results.is_empty()
    }

    /// Wait, bounded by the drain timeout, for active tasks to settle
    async fn drain(&mut self) {
        if self.active.is_empty() {
            return;
        }
        debug!(
            target: LOG_TARGET,
            "Waiting up to {:.2?} for {} active task(s) to settle",
            self.config.drain_timeout,
            self.active.len()
        );
        let deadline = time::sleep(self.config.drain_timeout);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                next = self.in_flight.next() => match next {
                    Some((index, _)) => self.release_job(index),
                    None => break,
                },
                _ = &mut deadline => {
                    warn!(
                        target: LOG_TARGET,
                        "{} task(s) did not settle before the fetcher stopped",
                        self.active.len()
                    );
                    break;
                },
            }
        }
    }

    fn release_job(&mut self, index: u64) {
        if let Some(peer) = self.active.remove(&index).and_then(|job| job.peer) {
            peer.release();
        }
    }

    fn teardown(&mut self) {
        for (_, job) in self.active.drain() {
            if let Some(peer) = job.peer {
                peer.release();
            }
        }
        // Dropping the request futures releases their session slots
        self.in_flight = FuturesUnordered::new();
        self.queue.clear();
        self.results.clear();
        self.deferred.clear();
    }
}

#[cfg(test)]
mod test {
    use std::{
        collections::HashSet,
        sync::{
            atomic::{AtomicBool, Ordering},
            Mutex,
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use chainsync_shutdown::Shutdown;
    use futures::FutureExt;

    use super::*;
    use crate::{
        chain_storage::ChainStorageError,
        peers::PeerSelection,
        test_helpers::{create_peer, MockServer},
    };

    const BAD_REPLY: u64 = u64::MAX;

    type Behaviour = Box<dyn Fn(u64, PeerId) -> BoxFuture<'static, Result<u64, RequestError>> + Send + Sync>;

    struct ActiveGuard<'a>(&'a Mutex<HashSet<PeerId>>, PeerId);

    impl Drop for ActiveGuard<'_> {
        fn drop(&mut self) {
            self.0.lock().unwrap().remove(&self.1);
        }
    }

    /// Replies with the task number after the behaviour's delay, and asserts that no peer is ever asked twice at once
    struct TestStrategy {
        behaviour: Behaviour,
        active: Mutex<HashSet<PeerId>>,
        requests: Mutex<Vec<(u64, PeerId)>>,
    }

    impl TestStrategy {
        fn new<F>(behaviour: F) -> Arc<Self>
        where F: Fn(u64, PeerId) -> BoxFuture<'static, Result<u64, RequestError>> + Send + Sync + 'static {
            Arc::new(Self {
                behaviour: Box::new(behaviour),
                active: Mutex::new(HashSet::new()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests_for(&self, task: u64) -> Vec<PeerId> {
            let requests = self.requests.lock().unwrap();
            requests.iter().filter(|(t, _)| *t == task).map(|(_, p)| *p).collect()
        }
    }

    #[async_trait]
    impl FetchStrategy for TestStrategy {
        type Item = u64;
        type Reply = u64;
        type Task = u64;

        fn peer_filter(&self, _peer: &Peer) -> bool {
            true
        }

        async fn request(&self, task: &u64, peer: &Peer) -> Result<u64, RequestError> {
            assert!(
                self.active.lock().unwrap().insert(*peer.id()),
                "peer {} was assigned two tasks",
                peer
            );
            let _guard = ActiveGuard(&self.active, *peer.id());
            self.requests.lock().unwrap().push((*task, *peer.id()));
            (self.behaviour)(*task, *peer.id()).await
        }

        fn process(&self, _task: &u64, _peer: &Peer, reply: u64) -> ProcessOutcome<u64> {
            if reply == BAD_REPLY {
                ProcessOutcome::Retry("bad reply".to_string())
            } else {
                ProcessOutcome::Complete(vec![reply])
            }
        }
    }

    #[derive(Default)]
    struct TestWriter {
        batches: Mutex<Vec<Vec<u64>>>,
        fail: bool,
    }

    impl TestWriter {
        fn written(&self) -> Vec<u64> {
            self.batches.lock().unwrap().iter().flatten().copied().collect()
        }
    }

    #[async_trait]
    impl FetchWriter<u64> for TestWriter {
        async fn write(&self, items: Vec<u64>) -> Result<u64, ChainStorageError> {
            if self.fail {
                return Err(ChainStorageError::AccessError("disk full".to_string()));
            }
            let mut batches = self.batches.lock().unwrap();
            batches.push(items);
            Ok(batches.iter().map(|b| b.len() as u64).sum())
        }
    }

    fn create_pool(num_peers: u64) -> (Arc<PeerPool>, Arc<MockServer>) {
        let server = MockServer::new();
        let pool = PeerPool::new(vec![], vec![]).with_selection(PeerSelection::Lowest);
        for i in 1..=num_peers {
            pool.add(create_peer(PeerId::from(i), &[], server.clone()));
        }
        (Arc::new(pool), server)
    }

    fn create_fetcher<'a>(
        config: FetcherConfig,
        strategy: Arc<TestStrategy>,
        writer: Arc<TestWriter>,
        pool: Arc<PeerPool>,
        num_tasks: u64,
        shutdown: &Shutdown,
    ) -> Fetcher<'a, TestStrategy> {
        Fetcher::new(config, strategy, writer, pool, 0..num_tasks, shutdown.to_signal())
    }

    fn delayed(task: u64, millis: u64) -> BoxFuture<'static, Result<u64, RequestError>> {
        async move {
            time::sleep(Duration::from_millis(millis)).await;
            Ok(task)
        }
        .boxed()
    }

    #[tokio::test(start_paused = true)]
    async fn it_delivers_in_task_order() {
        // Tasks complete in the order 2, 0, 1
        const DELAYS: [u64; 3] = [20, 30, 10];
        let (pool, _) = create_pool(3);
        let strategy = TestStrategy::new(|task, _| delayed(task, DELAYS[task as usize]));
        let writer = Arc::new(TestWriter::default());
        let shutdown = Shutdown::new();
        let fetcher = create_fetcher(
            FetcherConfig::default(),
            strategy,
            writer.clone(),
            pool.clone(),
            3,
            &shutdown,
        );
        let summary = fetcher.run().await.unwrap();

        assert_eq!(*writer.batches.lock().unwrap(), vec![vec![0], vec![1, 2]]);
        assert_eq!(summary.tasks, 3);
        assert_eq!(summary.items, 3);
        assert!(pool.peers().iter().all(|p| p.is_idle()));
    }

    #[tokio::test(start_paused = true)]
    async fn it_never_assigns_a_peer_twice() {
        let (pool, _) = create_pool(3);
        let strategy = TestStrategy::new(|task, _| delayed(task, (task * 7) % 11));
        let writer = Arc::new(TestWriter::default());
        let shutdown = Shutdown::new();
        let fetcher = create_fetcher(
            FetcherConfig::default(),
            strategy.clone(),
            writer.clone(),
            pool,
            50,
            &shutdown,
        );
        let summary = fetcher.run().await.unwrap();

        assert_eq!(writer.written(), (0..50).collect::<Vec<_>>());
        assert_eq!(summary.retries, 0);
        assert_eq!(strategy.requests.lock().unwrap().len(), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn it_bans_unresponsive_peers_and_requeues_once() {
        let (pool, server) = create_pool(2);
        let silent = PeerId::from(1);
        let strategy = TestStrategy::new(move |task, peer| {
            if peer == silent {
                futures::future::pending().boxed()
            } else {
                delayed(task, 1)
            }
        });
        let writer = Arc::new(TestWriter::default());
        let shutdown = Shutdown::new();
        let fetcher = create_fetcher(
            FetcherConfig::default(),
            strategy.clone(),
            writer.clone(),
            pool.clone(),
            2,
            &shutdown,
        );
        let summary = fetcher.run().await.unwrap();

        assert_eq!(writer.written(), vec![0, 1]);
        assert_eq!(server.bans(), vec![(silent, Duration::from_secs(60))]);
        assert_eq!(strategy.requests_for(0), vec![silent, PeerId::from(2)]);
        assert_eq!(summary.bans, 1);
        assert_eq!(summary.retries, 1);
        assert!(!pool.contains(&silent));
    }

    #[tokio::test(start_paused = true)]
    async fn it_does_not_ban_peers_that_already_left() {
        let (pool, server) = create_pool(2);
        let silent = PeerId::from(1);
        let strategy = TestStrategy::new(move |task, peer| {
            if peer == silent {
                futures::future::pending().boxed()
            } else {
                delayed(task, 1)
            }
        });
        let writer = Arc::new(TestWriter::default());
        let shutdown = Shutdown::new();
        let fetcher = create_fetcher(
            FetcherConfig::default(),
            strategy.clone(),
            writer.clone(),
            pool.clone(),
            2,
            &shutdown,
        );
        let disconnect = tokio::spawn({
            let pool = pool.clone();
            async move {
                time::sleep(Duration::from_secs(1)).await;
                pool.remove(&silent);
            }
        });
        let summary = fetcher.run().await.unwrap();
        disconnect.await.unwrap();

        assert_eq!(writer.written(), vec![0, 1]);
        assert!(server.bans().is_empty());
        assert_eq!(summary.bans, 0);
        assert_eq!(summary.retries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unusable_replies_are_retried_without_a_ban() {
        let (pool, server) = create_pool(2);
        let strategy = TestStrategy::new(|task, peer| {
            if peer == PeerId::from(1) {
                if task % 2 == 0 {
                    async { Err(RequestError::Declined("no budget".to_string())) }.boxed()
                } else {
                    delayed(BAD_REPLY, 1)
                }
            } else {
                delayed(task, 1)
            }
        });
        let writer = Arc::new(TestWriter::default());
        let shutdown = Shutdown::new();
        let fetcher = create_fetcher(
            FetcherConfig::default(),
            strategy.clone(),
            writer.clone(),
            pool.clone(),
            6,
            &shutdown,
        );
        let summary = fetcher.run().await.unwrap();

        assert_eq!(writer.written(), (0..6).collect::<Vec<_>>());
        assert!(server.bans().is_empty());
        assert_eq!(pool.len(), 2);
        assert!(summary.retries >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn it_bounds_work_ahead_of_delivery() {
        let (pool, _) = create_pool(10);
        let first_done = Arc::new(AtomicBool::new(false));
        let strategy = TestStrategy::new({
            let first_done = first_done.clone();
            move |task, _| {
                if task == 0 {
                    let first_done = first_done.clone();
                    return async move {
                        time::sleep(Duration::from_secs(1)).await;
                        first_done.store(true, Ordering::SeqCst);
                        Ok(0)
                    }
                    .boxed();
                }
                if task >= 4 {
                    assert!(first_done.load(Ordering::SeqCst), "task {} started too early", task);
                }
                delayed(task, 1)
            }
        });
        let writer = Arc::new(TestWriter::default());
        let shutdown = Shutdown::new();
        let config = FetcherConfig {
            max_queue: 4,
            ..Default::default()
        };
        let fetcher = create_fetcher(config, strategy, writer.clone(), pool, 12, &shutdown);
        fetcher.run().await.unwrap();

        assert_eq!(writer.written(), (0..12).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn a_failed_write_tears_the_fetch_down() {
        let (pool, _) = create_pool(2);
        let strategy = TestStrategy::new(|task, _| delayed(task, 1));
        let writer = Arc::new(TestWriter {
            fail: true,
            ..Default::default()
        });
        let shutdown = Shutdown::new();
        let fetcher = create_fetcher(FetcherConfig::default(), strategy, writer, pool.clone(), 10, &shutdown);
        let err = fetcher.run().await.unwrap_err();

        assert!(matches!(err, FetchError::ChainStorageError(_)));
        assert!(pool.peers().iter().all(|p| p.is_idle()));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_releases_every_peer() {
        let (pool, _) = create_pool(2);
        let strategy = TestStrategy::new(|_, _| futures::future::pending().boxed());
        let writer = Arc::new(TestWriter::default());
        let mut shutdown = Shutdown::new();
        let config = FetcherConfig {
            timeout: Duration::from_secs(30),
            drain_timeout: Duration::from_secs(2),
            ..Default::default()
        };
        let fetcher = create_fetcher(config, strategy, writer.clone(), pool.clone(), 4, &shutdown);
        let run = tokio::spawn(fetcher.run());
        time::sleep(Duration::from_secs(1)).await;
        assert!(pool.peers().iter().all(|p| !p.is_idle()));

        shutdown.trigger();
        let err = run.await.unwrap().unwrap_err();
        assert!(matches!(err, FetchError::Interrupted));
        assert!(pool.peers().iter().all(|p| p.is_idle()));
        assert!(writer.written().is_empty());
    }

    #[tokio::test]
    async fn no_tasks_is_an_immediate_success() {
        let (pool, _) = create_pool(1);
        let strategy = TestStrategy::new(|task, _| delayed(task, 1));
        let writer = Arc::new(TestWriter::default());
        let shutdown = Shutdown::new();
        let summary = create_fetcher(FetcherConfig::default(), strategy.clone(), writer, pool, 0, &shutdown)
            .run()
            .await
            .unwrap();
        assert_eq!(summary, FetchSummary::default());
        assert!(strategy.requests.lock().unwrap().is_empty());
    }
}
