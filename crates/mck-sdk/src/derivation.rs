use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Semaphore};
use tracing::{debug, info, warn};

use mck_fabric::{ChannelBus, EventKind, EventPayload};
use mck_ledger::OutpointState;
use mck_store::DerivedObjectStore;
use mck_types::{ChannelKey, DerivedObjectRecord, Outpoint};

use crate::deriver::{Derivation, Deriver};
use crate::mockchain::Ledger;

/// Configuration for the [`DerivationPipeline`].
#[derive(Clone, Debug)]
pub struct DerivationConfig {
    /// Maximum derivations running at once.
    pub workers: usize,
    /// Capacity of the completion notification channel.
    pub completion_capacity: usize,
}

impl Default for DerivationConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            completion_capacity: 1024,
        }
    }
}

/// One output waiting to be derived.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DerivationJob {
    pub outpoint: Outpoint,
    /// Ledger commit sequence of the output, stamped as `observed_at_seq`.
    pub created_at_seq: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DerivationOutcome {
    /// Stored and published under owner, kind and origin.
    Derived(DerivedObjectRecord),
    NotApplicable,
    /// The ledger does not know the outpoint (yet); skipped.
    NotYetVisible,
    /// Logged and dropped; the output stays un-derived.
    Failed(String),
}

/// Signalled once per finished job, in completion order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DerivationCompletion {
    pub outpoint: Outpoint,
    pub outcome: DerivationOutcome,
}

/// Derives objects for new outputs on a bounded pool of tasks.
///
/// Jobs are independent: they may run concurrently and finish in any order.
/// Nothing here reports back to the broadcast that enqueued the job.
pub struct DerivationPipeline {
    jobs: mpsc::UnboundedSender<DerivationJob>,
    completions: broadcast::Sender<DerivationCompletion>,
}

struct Worker {
    deriver: Arc<dyn Deriver>,
    ledger: Arc<dyn Ledger>,
    store: Arc<dyn DerivedObjectStore>,
    bus: ChannelBus,
    completions: broadcast::Sender<DerivationCompletion>,
}

impl DerivationPipeline {
    /// Start the dispatcher. Must be called from within a Tokio runtime.
    pub fn start(
        config: DerivationConfig,
        deriver: Arc<dyn Deriver>,
        ledger: Arc<dyn Ledger>,
        store: Arc<dyn DerivedObjectStore>,
        bus: ChannelBus,
    ) -> Self {
        let (jobs, queue) = mpsc::unbounded_channel();
        let (completions, _) = broadcast::channel(config.completion_capacity.max(1));
        let worker = Arc::new(Worker {
            deriver,
            ledger,
            store,
            bus,
            completions: completions.clone(),
        });
        let limit = Arc::new(Semaphore::new(config.workers.max(1)));

        tokio::spawn(dispatch(queue, worker, limit));
        info!(workers = config.workers, "derivation pipeline started");

        Self { jobs, completions }
    }

    /// Queue a job. Returns `false` if the dispatcher has stopped.
    pub fn enqueue(&self, job: DerivationJob) -> bool {
        self.jobs.send(job).is_ok()
    }

    /// Receive a [`DerivationCompletion`] for every job finished from now on.
    pub fn completions(&self) -> broadcast::Receiver<DerivationCompletion> {
        self.completions.subscribe()
    }
}

async fn dispatch(
    mut queue: mpsc::UnboundedReceiver<DerivationJob>,
    worker: Arc<Worker>,
    limit: Arc<Semaphore>,
) {
    while let Some(job) = queue.recv().await {
        let Ok(permit) = Arc::clone(&limit).acquire_owned().await else {
            break;
        };
        let worker = Arc::clone(&worker);
        tokio::spawn(async move {
            worker.run(job).await;
            drop(permit);
        });
    }
    debug!("derivation dispatcher stopped");
}

impl Worker {
    async fn run(&self, job: DerivationJob) {
        let outcome = self.derive(job).await;
        match &outcome {
            DerivationOutcome::Derived(record) => {
                debug!(location = %record.location, kind = %record.kind, "derived object recorded")
            }
            DerivationOutcome::NotApplicable => {}
            DerivationOutcome::NotYetVisible => {
                debug!(outpoint = %job.outpoint, "outpoint not visible, derivation skipped")
            }
            DerivationOutcome::Failed(detail) => {
                warn!(outpoint = %job.outpoint, %detail, "derivation dropped")
            }
        }
        // No receivers is fine.
        let _ = self.completions.send(DerivationCompletion {
            outpoint: job.outpoint,
            outcome,
        });
    }

    async fn derive(&self, job: DerivationJob) -> DerivationOutcome {
        match self.ledger.outpoint_state(&job.outpoint) {
            Ok(OutpointState::Unknown) => return DerivationOutcome::NotYetVisible,
            Ok(_) => {}
            Err(e) => return DerivationOutcome::Failed(e.to_string()),
        }

        let record = match self.deriver.derive(&job.outpoint).await {
            Ok(Derivation::Derived(record)) => record,
            Ok(Derivation::NotApplicable) => return DerivationOutcome::NotApplicable,
            Err(e) => return DerivationOutcome::Failed(e.to_string()),
        };
        if record.location != job.outpoint {
            return DerivationOutcome::Failed(format!(
                "derived location {} does not match {}",
                record.location, job.outpoint
            ));
        }

        let record = DerivedObjectRecord {
            observed_at_seq: job.created_at_seq,
            ..record
        };
        if let Err(e) = self.store.upsert(record.clone()) {
            return DerivationOutcome::Failed(e.to_string());
        }

        for channel in derived_channels(&record) {
            let payload = EventPayload::Derived(record.clone());
            if let Err(e) = self.bus.publish(&channel, EventKind::Derived, payload) {
                return DerivationOutcome::Failed(e.to_string());
            }
        }
        DerivationOutcome::Derived(record)
    }
}

/// Owner, kind and origin channels, each at most once.
fn derived_channels(record: &DerivedObjectRecord) -> Vec<ChannelKey> {
    let mut seen = BTreeSet::new();
    [&record.owner, &record.kind, &record.origin]
        .into_iter()
        .filter(|key| seen.insert(key.as_str()))
        .map(|key| ChannelKey::new(key.as_str()))
        .collect()
}
