use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

use mck_fabric::{ChannelBus, EventKind, EventPayload, FabricConfig, SubscriberHandle, Subscription};
use mck_ledger::{
    AppliedTransaction, InMemoryLedger, LedgerReader, LedgerWriter, Transaction, TxOutput,
};
use mck_store::{
    DerivedObjectStore, InMemoryDerivedObjectStore, InMemoryMessageStore, MessageStore,
};
use mck_types::{
    Address, ChannelKey, DerivedObjectFilter, DerivedObjectRecord, MessageBody, MessageId,
    MessageRecord, Outpoint, SequenceId, TransactionId, UtxoRecord,
};

use crate::broadcast::BroadcastPipeline;
use crate::derivation::{DerivationCompletion, DerivationConfig, DerivationJob, DerivationPipeline};
use crate::deriver::Deriver;
use crate::error::{SdkError, SdkResult};

/// A ledger backend usable by the pipelines.
pub trait Ledger: LedgerWriter + LedgerReader {}

impl<T: LedgerWriter + LedgerReader> Ledger for T {}

#[derive(Clone, Debug)]
pub struct MockchainConfig {
    pub fabric: FabricConfig,
    pub derivation: DerivationConfig,
    /// Amount paid by [`Mockchain::fund`] when none is given.
    pub default_fund_amount: u64,
}

impl Default for MockchainConfig {
    fn default() -> Self {
        Self {
            fabric: FabricConfig::default(),
            derivation: DerivationConfig::default(),
            default_fund_amount: 100_000_000,
        }
    }
}

/// High-level Mockchain API.
///
/// Owns one ledger, one channel bus, one derived object store and one
/// message store, and exposes the operations a transport layer needs on top of them.
pub struct Mockchain {
    config: MockchainConfig,
    ledger: Arc<dyn Ledger>,
    bus: ChannelBus,
    derived: Arc<dyn DerivedObjectStore>,
    messages: Arc<dyn MessageStore>,
    derivation: Arc<DerivationPipeline>,
    broadcaster: BroadcastPipeline,
}

impl Mockchain {
    /// In-memory ledger and derived store with the reference codec.
    ///
    /// Starts the derivation pipeline, so this must run inside a Tokio
    /// runtime.
    pub fn new(config: MockchainConfig, deriver: Arc<dyn Deriver>) -> Self {
        Self::with_parts(
            config,
            Arc::new(InMemoryLedger::default()),
            Arc::new(InMemoryDerivedObjectStore::new()),
            deriver,
        )
    }

    pub fn with_parts(
        config: MockchainConfig,
        ledger: Arc<dyn Ledger>,
        derived: Arc<dyn DerivedObjectStore>,
        deriver: Arc<dyn Deriver>,
    ) -> Self {
        let bus = ChannelBus::new(config.fabric.clone());
        let derivation = Arc::new(DerivationPipeline::start(
            config.derivation.clone(),
            deriver,
            Arc::clone(&ledger),
            Arc::clone(&derived),
            bus.clone(),
        ));
        let broadcaster =
            BroadcastPipeline::new(Arc::clone(&ledger), bus.clone(), Arc::clone(&derivation));
        info!("mockchain ready");

        Self {
            config,
            ledger,
            bus,
            derived,
            messages: Arc::new(InMemoryMessageStore::new()),
            derivation,
            broadcaster,
        }
    }

    pub fn config(&self) -> &MockchainConfig {
        &self.config
    }

    // ---- Transactions ----

    /// Validate and apply a raw transaction, returning its id.
    pub fn apply_transaction(&self, raw: &[u8]) -> SdkResult<TransactionId> {
        Ok(self.broadcast(raw)?.transaction_id)
    }

    /// Like [`apply_transaction`](Self::apply_transaction), but returns
    /// everything the transaction created and spent.
    pub fn broadcast(&self, raw: &[u8]) -> SdkResult<AppliedTransaction> {
        self.broadcaster.broadcast(raw)
    }

    pub fn fetch_transaction(&self, id: &TransactionId) -> SdkResult<Vec<u8>> {
        self.ledger
            .fetch_transaction(id)?
            .ok_or_else(|| SdkError::NotFound(format!("transaction {id}")))
    }

    /// Pay `amount` (or the configured default) to `address` out of thin air.
    ///
    /// The funding transaction goes through the normal broadcast path, so
    /// subscribers and derivation see it like any other.
    pub fn fund(&self, address: &Address, amount: Option<u64>) -> SdkResult<AppliedTransaction> {
        let amount = amount.unwrap_or(self.config.default_fund_amount);
        let nonce: [u8; 16] = rand::random();
        let funding = Transaction::new(
            vec![],
            vec![TxOutput::data(nonce.to_vec()), TxOutput::pay_to(address.clone(), amount)],
        );
        let raw = funding
            .to_bytes()
            .map_err(|e| SdkError::Internal(format!("encoding funding transaction: {e}")))?;
        let applied = self.broadcast(&raw)?;
        info!(address = %address.as_str(), amount, txid = %applied.transaction_id.short_hex(), "funded");
        Ok(applied)
    }

    // ---- Queries ----

    pub fn list_unspent_for_address(&self, address: &Address) -> SdkResult<Vec<UtxoRecord>> {
        Ok(self.ledger.list_unspent_for_address(address)?)
    }

    /// The transaction that spent `outpoint`, if it has been spent.
    pub fn lookup_spend(&self, outpoint: &Outpoint) -> SdkResult<Option<TransactionId>> {
        Ok(self.ledger.lookup_spend(outpoint)?)
    }

    /// [`lookup_spend`](Self::lookup_spend) for many outpoints, in order.
    pub fn lookup_spends(&self, outpoints: &[Outpoint]) -> SdkResult<Vec<Option<TransactionId>>> {
        outpoints.iter().map(|o| self.lookup_spend(o)).collect()
    }

    pub fn get_unspent(&self, outpoint: &Outpoint) -> SdkResult<Option<UtxoRecord>> {
        Ok(self.ledger.get_unspent(outpoint)?)
    }

    pub fn list_derived_objects(
        &self,
        filter: &DerivedObjectFilter,
    ) -> SdkResult<Vec<DerivedObjectRecord>> {
        Ok(self.derived.list(filter)?)
    }

    pub fn get_derived_object(&self, location: &Outpoint) -> SdkResult<DerivedObjectRecord> {
        self.derived
            .get(location)?
            .ok_or_else(|| SdkError::NotFound(format!("derived object {location}")))
    }

    /// Derived objects sitting on outputs `address` can currently spend.
    pub fn derived_objects_for_address(
        &self,
        address: &Address,
    ) -> SdkResult<Vec<DerivedObjectRecord>> {
        let mut found = Vec::new();
        for utxo in self.ledger.list_unspent_for_address(address)? {
            if let Some(record) = self.derived.get(&utxo.outpoint)? {
                found.push(record);
            }
        }
        Ok(found)
    }

    /// Queue `outpoint` for derivation again. The stored record is replaced
    /// in place, never duplicated.
    pub fn rederive(&self, outpoint: &Outpoint) -> SdkResult<()> {
        let utxo = self
            .ledger
            .get_unspent(outpoint)?
            .ok_or_else(|| SdkError::NotFound(format!("unspent output {outpoint}")))?;
        let job = DerivationJob {
            outpoint: utxo.outpoint,
            created_at_seq: utxo.created_at_seq,
        };
        if !self.derivation.enqueue(job) {
            return Err(SdkError::Internal("derivation pipeline stopped".into()));
        }
        Ok(())
    }

    /// Completion notifications from the derivation pipeline.
    pub fn completions(&self) -> broadcast::Receiver<DerivationCompletion> {
        self.derivation.completions()
    }

    // ---- Messages ----

    /// Store a message and deliver one copy to each distinct recipient
    /// channel, in the order recipients are listed.
    pub fn post_message(&self, body: MessageBody) -> SdkResult<MessageRecord> {
        if body.to.iter().any(|to| to.is_empty()) {
            return Err(SdkError::ValidationFailed("message recipient is empty".into()));
        }
        let message = MessageRecord::from(body);
        if self.messages.put(message.clone())? {
            debug!(id = %message.id, "message re-posted");
        }

        let mut delivered: Vec<&str> = Vec::with_capacity(message.body.to.len());
        for to in &message.body.to {
            if delivered.contains(&to.as_str()) {
                continue;
            }
            self.bus.publish(
                &ChannelKey::new(to.as_str()),
                EventKind::Message,
                EventPayload::Message(message.clone()),
            )?;
            delivered.push(to);
        }
        info!(id = %message.id, from = %message.body.from, recipients = delivered.len(), "message relayed");
        Ok(message)
    }

    pub fn get_message(&self, id: &MessageId) -> SdkResult<MessageRecord> {
        self.messages
            .get(id)?
            .ok_or_else(|| SdkError::NotFound(format!("message {id}")))
    }

    // ---- Channels ----

    pub fn subscribe(
        &self,
        channel: &ChannelKey,
        last_seen: Option<SequenceId>,
    ) -> SdkResult<Subscription> {
        Ok(self.bus.subscribe(channel, last_seen)?)
    }

    /// Returns `false` if the handle was already gone.
    pub fn unsubscribe(&self, handle: &SubscriberHandle) -> SdkResult<bool> {
        Ok(self.bus.unsubscribe(handle)?)
    }

    pub fn last_sequence(&self) -> SdkResult<SequenceId> {
        Ok(self.bus.last_sequence()?)
    }

    pub fn bus(&self) -> &ChannelBus {
        &self.bus
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }
}

impl std::fmt::Debug for Mockchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mockchain")
            .field("config", &self.config)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}
