//! Bounded worker pool for background image retrieval
//!
//! Workers resolve an [`ImageSource`] to raw bytes, decode it, and report the
//! outcome through a callback. Submission is fail-fast: when every worker is
//! occupied the request is rejected instead of queued, so decode work can
//! never build a backlog that outlives the frames that asked for it.

use crate::config::RetrievalConfig;
use crate::retrieve::{ImageData, ImageSource, RetrieveError, RetrieveResult, SourceKey};
use std::collections::HashSet;
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Source of bundled asset bytes (application resources, archive readers).
///
/// Implementations are called from worker threads and may block on I/O.
pub trait AssetLocator: Send + Sync {
    /// Read the raw bytes of the named asset.
    fn read_asset(&self, name: &str) -> std::io::Result<Vec<u8>>;
}

/// Outcome receiver for a retrieval.
///
/// Exactly one of the three methods is invoked per accepted or rejected
/// request. `succeeded` and `failed` run on a worker thread: implementations
/// must not touch the graphics context and should only enqueue data for the
/// render thread to pick up later. `rejected` is invoked synchronously from
/// [`AsyncImageRetriever::retrieve`].
pub trait RetrievalCallback: Send + Sync {
    /// The source was resolved and decoded.
    fn succeeded(&self, source: &ImageSource, pixels: ImageData);

    /// The source could not be resolved or decoded. No automatic retry is
    /// performed; the caller decides whether to re-request on a later frame.
    fn failed(&self, source: &ImageSource, error: RetrieveError);

    /// The request was refused before any work started (pool saturated or a
    /// retrieval for the same source already in flight).
    fn rejected(&self, source: &ImageSource);
}

struct Job {
    source: ImageSource,
    callback: Arc<dyn RetrievalCallback>,
}

/// Background image retriever with a bounded worker pool.
///
/// At most `max_workers` retrievals are outstanding at any moment, and at
/// most one per distinct source. Everything beyond that is rejected fast.
pub struct AsyncImageRetriever {
    sender: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    in_flight: Arc<Mutex<HashSet<SourceKey>>>,
    busy: Arc<AtomicUsize>,
    max_workers: usize,
}

impl AsyncImageRetriever {
    /// Create a retriever without asset support.
    pub fn new(config: &RetrievalConfig) -> Self {
        Self::with_asset_locator(config, None)
    }

    /// Create a retriever that resolves [`ImageSource::Asset`] sources
    /// through `locator`.
    pub fn with_asset_locator(
        config: &RetrievalConfig,
        locator: Option<Arc<dyn AssetLocator>>,
    ) -> Self {
        let max_workers = config.max_workers.max(1);
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let in_flight = Arc::new(Mutex::new(HashSet::new()));
        let busy = Arc::new(AtomicUsize::new(0));
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.network_timeout_secs.max(1)))
            .build();

        let mut workers = Vec::with_capacity(max_workers);
        for id in 0..max_workers {
            let receiver = Arc::clone(&receiver);
            let in_flight = Arc::clone(&in_flight);
            let busy = Arc::clone(&busy);
            let agent = agent.clone();
            let locator = locator.clone();
            let handle = thread::Builder::new()
                .name(format!("image-retriever-{id}"))
                .spawn(move || Self::run_worker(&receiver, &in_flight, &busy, &agent, locator))
                .expect("Failed to spawn retriever worker thread");
            workers.push(handle);
        }

        log::info!("Started image retriever with {max_workers} workers");

        Self {
            sender,
            workers,
            in_flight,
            busy,
            max_workers,
        }
    }

    /// Submit a retrieval for `source`.
    ///
    /// Returns `Ok` when a worker accepted the request. A duplicate of an
    /// in-flight source or a saturated pool is refused immediately; in both
    /// cases `callback.rejected` has been invoked before this returns.
    pub fn retrieve(
        &self,
        source: ImageSource,
        callback: Arc<dyn RetrievalCallback>,
    ) -> RetrieveResult<()> {
        let key = source.key();

        {
            let mut in_flight = self.in_flight.lock().unwrap();
            if !in_flight.insert(key.clone()) {
                drop(in_flight);
                log::debug!("Duplicate retrieval rejected for {key:?}");
                callback.rejected(&source);
                return Err(RetrieveError::AlreadyInFlight);
            }
        }

        // Claim a worker slot before handing the job over; the claim is what
        // bounds outstanding work, the channel itself never accumulates.
        let max = self.max_workers;
        let claimed = self
            .busy
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                if n < max {
                    Some(n + 1)
                } else {
                    None
                }
            });
        if claimed.is_err() {
            self.in_flight.lock().unwrap().remove(&key);
            log::debug!("Retrieval pool saturated, rejected {key:?}");
            callback.rejected(&source);
            return Err(RetrieveError::PoolSaturated);
        }

        match self.sender.send(Job { source, callback }) {
            Ok(()) => Ok(()),
            Err(mpsc::SendError(job)) => {
                self.busy.fetch_sub(1, Ordering::AcqRel);
                self.in_flight.lock().unwrap().remove(&key);
                job.callback.rejected(&job.source);
                Err(RetrieveError::ShutDown)
            }
        }
    }

    /// Number of retrievals currently being worked on.
    pub fn active_count(&self) -> usize {
        self.busy.load(Ordering::Acquire)
    }

    /// Number of distinct sources currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }

    /// Stop accepting work and wait for the workers to finish their current
    /// jobs and exit.
    pub fn shutdown(self) {
        let Self {
            sender, workers, ..
        } = self;
        drop(sender);
        for worker in workers {
            if worker.join().is_err() {
                log::error!("Retriever worker panicked during shutdown");
            }
        }
    }

    fn run_worker(
        receiver: &Mutex<Receiver<Job>>,
        in_flight: &Mutex<HashSet<SourceKey>>,
        busy: &AtomicUsize,
        agent: &ureq::Agent,
        locator: Option<Arc<dyn AssetLocator>>,
    ) {
        loop {
            let job = {
                let guard = receiver.lock().unwrap();
                guard.recv()
            };
            let job = match job {
                Ok(job) => job,
                Err(_) => break, // sender dropped, shutting down
            };

            let result = Self::resolve_and_decode(&job.source, agent, locator.as_deref());

            // Retire the in-flight mark before the callback so a follow-up
            // request triggered by the callback is not spuriously rejected.
            in_flight.lock().unwrap().remove(&job.source.key());

            match result {
                Ok(pixels) => job.callback.succeeded(&job.source, pixels),
                Err(error) => {
                    match &error {
                        RetrieveError::HttpTimeout(url) => {
                            log::warn!("Image fetch timed out: {url}");
                        }
                        other => log::warn!("Image retrieval failed: {other}"),
                    }
                    job.callback.failed(&job.source, error);
                }
            }

            busy.fetch_sub(1, Ordering::AcqRel);
        }
    }

    fn resolve_and_decode(
        source: &ImageSource,
        agent: &ureq::Agent,
        locator: Option<&dyn AssetLocator>,
    ) -> RetrieveResult<ImageData> {
        match source {
            ImageSource::Pixels { image, .. } => Ok((**image).clone()),
            ImageSource::Bytes { bytes, .. } => ImageData::from_encoded(bytes),
            ImageSource::Asset(name) => {
                let locator =
                    locator.ok_or_else(|| RetrieveError::AssetUnavailable(name.clone()))?;
                let bytes = locator
                    .read_asset(name)
                    .map_err(|e| RetrieveError::ReadFailed(format!("{name}: {e}")))?;
                ImageData::from_encoded(&bytes)
            }
            ImageSource::File(path) => {
                let bytes = std::fs::read(path)
                    .map_err(|e| RetrieveError::ReadFailed(format!("{}: {e}", path.display())))?;
                ImageData::from_encoded(&bytes)
            }
            ImageSource::Url(url) => {
                let bytes = Self::fetch_url(agent, url)?;
                ImageData::from_encoded(&bytes)
            }
        }
    }

    fn fetch_url(agent: &ureq::Agent, url: &str) -> RetrieveResult<Vec<u8>> {
        match agent.get(url).call() {
            Ok(response) => {
                let mut bytes = Vec::new();
                response
                    .into_reader()
                    .read_to_end(&mut bytes)
                    .map_err(|e| Self::classify_io_error(url, &e))?;
                Ok(bytes)
            }
            Err(ureq::Error::Status(code, _)) => {
                Err(RetrieveError::HttpFailed(format!("{url}: status {code}")))
            }
            Err(ureq::Error::Transport(transport)) => {
                Err(Self::classify_transport_error(url, &transport))
            }
        }
    }

    fn classify_io_error(url: &str, error: &std::io::Error) -> RetrieveError {
        if matches!(
            error.kind(),
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
        ) {
            RetrieveError::HttpTimeout(url.to_string())
        } else {
            RetrieveError::HttpFailed(format!("{url}: {error}"))
        }
    }

    fn classify_transport_error(url: &str, transport: &ureq::Transport) -> RetrieveError {
        let timed_out = std::error::Error::source(transport)
            .and_then(|source| source.downcast_ref::<std::io::Error>())
            .is_some_and(|io| {
                matches!(
                    io.kind(),
                    std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
                )
            });
        if timed_out {
            RetrieveError::HttpTimeout(url.to_string())
        } else {
            RetrieveError::HttpFailed(format!("{url}: {transport}"))
        }
    }
}
