use crate::error::ResultsError;
use crate::models::Election;
use crate::results::{self, ResultSnapshot};
use crate::store::ElectionStore;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

type SharedResult = Result<Arc<ResultSnapshot>, ResultsError>;
type Pending = watch::Receiver<Option<SharedResult>>;

#[derive(Default)]
struct Entries {
    // Results of closed/archived elections, never recomputed
    permanent: HashMap<String, Arc<ResultSnapshot>>,
    // Computations currently running for closed/archived elections
    in_flight: HashMap<String, Pending>,
}

struct Inner {
    store: Arc<dyn ElectionStore>,
    entries: Mutex<Entries>,
    computations: AtomicU64,
}

impl Inner {
    // Entries are only ever replaced whole, so a poisoned map is still consistent.
    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn compute(&self, election: Election) -> Result<ResultSnapshot, ResultsError> {
        self.computations.fetch_add(1, Ordering::SeqCst);
        results::compute(self.store.as_ref(), election).await
    }
}

enum Lookup {
    Ready(Arc<ResultSnapshot>),
    Pending(Pending),
}

/// Serves election results, computing each closed election's tally once.
///
/// Results for closed and archived elections are pinned for the life of
/// the cache. Concurrent requests for one that is not pinned yet share a
/// single computation, which runs on its own task so a caller giving up
/// does not cancel it. Results for any other status are recomputed on
/// every request and never stored.
///
/// Cloning is cheap and every clone shares the same entries.
#[derive(Clone)]
pub struct ResultsCache {
    inner: Arc<Inner>,
    preload_on_close: bool,
}

impl ResultsCache {
    pub fn new(store: Arc<dyn ElectionStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                entries: Mutex::new(Entries::default()),
                computations: AtomicU64::new(0),
            }),
            preload_on_close: true,
        }
    }

    /// Whether `on_election_closed` computes the results right away.
    pub fn preload_on_close(mut self, enabled: bool) -> Self {
        self.preload_on_close = enabled;
        self
    }

    pub async fn get(&self, election_id: &str) -> Result<Arc<ResultSnapshot>, ResultsError> {
        // Only terminal elections are ever pinned, and they never reopen.
        if let Some(snapshot) = self.pinned(election_id) {
            debug!("Serving pinned results for election {}", election_id);
            return Ok(snapshot);
        }

        let election = self.inner.store.fetch_election(election_id).await?;
        if !election.status.is_terminal() {
            debug!(
                "Election {} is {}, computing live results",
                election_id, election.status
            );
            return self.inner.compute(election).await.map(Arc::new);
        }

        self.shared(election).await
    }

    /// Drop the pinned results of an election, if any.
    ///
    /// Meant to be called once, as the election closes. Returns whether
    /// anything was dropped.
    pub fn invalidate(&self, election_id: &str) -> bool {
        let removed = self.inner.lock().permanent.remove(election_id).is_some();
        if removed {
            info!("Invalidated cached results for election {}", election_id);
        }
        removed
    }

    /// Compute and pin results ahead of the first request. Does nothing for
    /// elections that are still open.
    pub async fn preload(&self, election_id: &str) -> Result<(), ResultsError> {
        if self.is_cached(election_id) {
            return Ok(());
        }

        let election = self.inner.store.fetch_election(election_id).await?;
        if !election.status.is_terminal() {
            debug!(
                "Not preloading election {}: status is {}",
                election_id, election.status
            );
            return Ok(());
        }

        self.shared(election).await.map(|_| ())
    }

    /// Lifecycle hook for when an election has just been closed.
    pub async fn on_election_closed(&self, election_id: &str) -> Result<(), ResultsError> {
        self.invalidate(election_id);
        if self.preload_on_close {
            self.preload(election_id).await?;
        }
        Ok(())
    }

    pub fn is_cached(&self, election_id: &str) -> bool {
        self.pinned(election_id).is_some()
    }

    /// Number of tallies computed so far, pinned or live.
    pub fn computations(&self) -> u64 {
        self.inner.computations.load(Ordering::SeqCst)
    }

    fn pinned(&self, election_id: &str) -> Option<Arc<ResultSnapshot>> {
        self.inner.lock().permanent.get(election_id).cloned()
    }

    async fn shared(&self, election: Election) -> SharedResult {
        let election_id = election.id.clone();
        match self.join_or_start(election) {
            Lookup::Ready(snapshot) => Ok(snapshot),
            Lookup::Pending(pending) => self.wait(&election_id, pending).await,
        }
    }

    fn join_or_start(&self, election: Election) -> Lookup {
        let mut entries = self.inner.lock();

        if let Some(snapshot) = entries.permanent.get(&election.id) {
            return Lookup::Ready(Arc::clone(snapshot));
        }
        if let Some(pending) = entries.in_flight.get(&election.id) {
            debug!("Joining in-flight computation for election {}", election.id);
            return Lookup::Pending(pending.clone());
        }

        let (tx, rx) = watch::channel(None);
        entries.in_flight.insert(election.id.clone(), rx.clone());
        drop(entries);

        debug!("Starting shared computation for election {}", election.id);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let election_id = election.id.clone();
            let outcome = inner.compute(election).await;

            let shared = {
                let mut entries = inner.lock();
                entries.in_flight.remove(&election_id);
                match outcome {
                    Ok(snapshot) => {
                        let pinned = entries
                            .permanent
                            .entry(election_id.clone())
                            .or_insert_with(|| Arc::new(snapshot));
                        Ok(Arc::clone(pinned))
                    }
                    Err(e) => {
                        // Not remembered: the next request gets a fresh attempt.
                        warn!("Computing results for election {} failed: {}", election_id, e);
                        Err(e)
                    }
                }
            };

            tx.send_replace(Some(shared));
        });

        Lookup::Pending(rx)
    }

    async fn wait(&self, election_id: &str, mut pending: Pending) -> SharedResult {
        // Copy the value out so the channel's read guard is released here.
        let waited = pending
            .wait_for(Option::is_some)
            .await
            .map(|value| (*value).clone());
        match waited {
            Ok(value) => value.unwrap_or_else(|| Err(abandoned(election_id))),
            Err(_) => {
                // The computing task died without publishing anything.
                let mut entries = self.inner.lock();
                if entries
                    .in_flight
                    .get(election_id)
                    .is_some_and(|current| current.same_channel(&pending))
                {
                    entries.in_flight.remove(election_id);
                }
                Err(abandoned(election_id))
            }
        }
    }
}

fn abandoned(election_id: &str) -> ResultsError {
    ResultsError::ComputationInvariant(format!(
        "results computation for election {} ended without a result",
        election_id
    ))
}
