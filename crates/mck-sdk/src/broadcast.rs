use std::sync::{Arc, Mutex};

use tracing::{error, info};

use mck_fabric::{ChannelBus, EventKind, EventPayload};
use mck_ledger::AppliedTransaction;
use mck_types::ChannelKey;

use crate::derivation::{DerivationJob, DerivationPipeline};
use crate::error::{SdkError, SdkResult};
use crate::mockchain::Ledger;

/// Applies transactions to the ledger one at a time and announces the
/// result on the channel bus.
///
/// For each accepted transaction, in this order:
///
/// 1. a `txn` event on the `txns` channel
/// 2. a `spend` event on the owner channel of every consumed UTXO
/// 3. a `utxo` event on the owner channel of every created UTXO
/// 4. one derivation job per created UTXO
///
/// A rejected transaction touches neither the bus nor the derivation queue.
/// Once the ledger accepts a transaction, `broadcast` returns it even if
/// publishing its events failed; subscribers then recover nothing for it.
pub struct BroadcastPipeline {
    serial: Mutex<()>,
    ledger: Arc<dyn Ledger>,
    bus: ChannelBus,
    derivation: Arc<DerivationPipeline>,
}

impl BroadcastPipeline {
    pub fn new(ledger: Arc<dyn Ledger>, bus: ChannelBus, derivation: Arc<DerivationPipeline>) -> Self {
        Self {
            serial: Mutex::new(()),
            ledger,
            bus,
            derivation,
        }
    }

    pub fn broadcast(&self, raw: &[u8]) -> SdkResult<AppliedTransaction> {
        // Held across apply and publish so channel order follows commit order.
        let _serial = self
            .serial
            .lock()
            .map_err(|_| SdkError::Internal("broadcast lock poisoned".into()))?;

        let applied = self.ledger.apply_transaction(raw)?;

        // The ledger has already committed, so a publish failure is logged
        // and the transaction is still reported accepted and derived.
        if let Err(e) = self.announce(&applied) {
            error!(txid = %applied.transaction_id, error = %e, "failed to publish transaction events");
        }

        let mut queued = 0;
        for utxo in &applied.created {
            let job = DerivationJob {
                outpoint: utxo.outpoint,
                created_at_seq: utxo.created_at_seq,
            };
            if self.derivation.enqueue(job) {
                queued += 1;
            }
        }
        if queued < applied.created.len() {
            error!(txid = %applied.transaction_id, "derivation pipeline is not running");
        }

        info!(
            txid = %applied.transaction_id.short_hex(),
            created = applied.created.len(),
            spent = applied.spent.len(),
            "broadcast accepted"
        );
        Ok(applied)
    }

    fn announce(&self, applied: &AppliedTransaction) -> SdkResult<()> {
        self.bus.publish(
            &ChannelKey::txns(),
            EventKind::Txn,
            EventPayload::Txn {
                transaction_id: applied.transaction_id,
            },
        )?;
        for spent in &applied.spent {
            self.bus.publish(
                &ChannelKey::from(&spent.utxo.owner_address),
                EventKind::Spend,
                EventPayload::Spend(spent.spend.clone()),
            )?;
        }
        for utxo in &applied.created {
            self.bus.publish(
                &ChannelKey::from(&utxo.owner_address),
                EventKind::Utxo,
                EventPayload::Utxo(utxo.clone()),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mck_ledger::{InMemoryLedger, LedgerReader, Transaction, TxOutput};
    use mck_store::InMemoryDerivedObjectStore;
    use mck_types::{Address, Outpoint, TransactionId};

    use crate::derivation::{DerivationConfig, DerivationOutcome};
    use crate::deriver::NoopDeriver;

    use super::*;

    fn pipeline() -> (BroadcastPipeline, Arc<InMemoryLedger>, ChannelBus, Arc<DerivationPipeline>) {
        let ledger = Arc::new(InMemoryLedger::default());
        let bus = ChannelBus::default();
        let derivation = Arc::new(DerivationPipeline::start(
            DerivationConfig::default(),
            Arc::new(NoopDeriver),
            ledger.clone(),
            Arc::new(InMemoryDerivedObjectStore::new()),
            bus.clone(),
        ));
        let broadcast = BroadcastPipeline::new(ledger.clone(), bus.clone(), derivation.clone());
        (broadcast, ledger, bus, derivation)
    }

    fn funding(address: &str, amount: u64) -> Transaction {
        Transaction::new(
            vec![],
            vec![TxOutput::data(address.as_bytes().to_vec()), TxOutput::pay_to(address, amount)],
        )
    }

    #[tokio::test]
    async fn events_follow_commit_order() {
        let (broadcast, _, bus, _) = pipeline();
        let mut txns = bus.subscribe(&ChannelKey::txns(), None).unwrap();
        let mut a1 = bus.subscribe(&ChannelKey::from("A1"), None).unwrap();
        let mut a2 = bus.subscribe(&ChannelKey::from("A2"), None).unwrap();

        let genesis = funding("A1", 100);
        let genesis_applied = broadcast.broadcast(&genesis.to_bytes().unwrap()).unwrap();

        let spend = Transaction::new(
            vec![genesis.outpoint(1).unwrap()],
            vec![TxOutput::pay_to("A2", 100)],
        );
        let spend_applied = broadcast.broadcast(&spend.to_bytes().unwrap()).unwrap();

        let t1 = txns.try_next().unwrap();
        let t2 = txns.try_next().unwrap();
        assert!(t1.sequence_id < t2.sequence_id);
        assert_eq!(
            t2.payload,
            EventPayload::Txn { transaction_id: spend_applied.transaction_id }
        );

        let created = a1.try_next().unwrap();
        assert_eq!(created.kind, EventKind::Utxo);
        assert_eq!(created.payload, EventPayload::Utxo(genesis_applied.created[0].clone()));
        let spent = a1.try_next().unwrap();
        assert_eq!(spent.kind, EventKind::Spend);
        assert!(a1.try_next().is_none());

        let moved = a2.try_next().unwrap();
        assert_eq!(moved.kind, EventKind::Utxo);
        assert!(spent.sequence_id < moved.sequence_id);
    }

    #[tokio::test]
    async fn rejected_transaction_publishes_nothing() {
        let (broadcast, ledger, bus, _) = pipeline();
        let orphan = Transaction::new(
            vec![Outpoint::new(TransactionId::from_raw(b"nowhere"), 0)],
            vec![TxOutput::pay_to("A2", 5)],
        );

        let err = broadcast.broadcast(&orphan.to_bytes().unwrap()).unwrap_err();
        assert!(matches!(err, SdkError::ValidationFailed(_)));
        assert_eq!(bus.last_sequence().unwrap().value(), 0);
        assert!(ledger
            .list_unspent_for_address(&Address::from("A2"))
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn malformed_bytes_are_a_client_error() {
        let (broadcast, _, bus, _) = pipeline();
        let err = broadcast.broadcast(b"definitely not a transaction").unwrap_err();
        assert!(matches!(err, SdkError::MalformedTransaction(_)));
        assert_eq!(bus.channel_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn created_outputs_are_queued_for_derivation() {
        let (broadcast, _, _, derivation) = pipeline();
        let mut completions = derivation.completions();

        let applied = broadcast
            .broadcast(&funding("A1", 7).to_bytes().unwrap())
            .unwrap();

        let done = tokio::time::timeout(Duration::from_secs(2), completions.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.outpoint, applied.created[0].outpoint);
        assert_eq!(done.outcome, DerivationOutcome::NotApplicable);
    }
}
