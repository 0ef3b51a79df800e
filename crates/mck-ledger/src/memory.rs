use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use mck_store::{InMemoryTransactionArchive, TransactionArchive};
use mck_types::{Address, Outpoint, SpendRecord, TransactionId, UtxoRecord};
use tracing::{debug, info};

use crate::codec::{BincodeCodec, TransactionCodec};
use crate::error::LedgerError;
use crate::records::{AppliedTransaction, OutpointState, SpentOutput};
use crate::traits::{LedgerReader, LedgerWriter};

/// In-memory UTXO ledger for tests, local demos, and embedding.
///
/// All state sits behind one `RwLock`: writers are serialized by the write
/// guard, readers share a consistent snapshot.
pub struct InMemoryLedger {
    codec: Arc<dyn TransactionCodec>,
    archive: Arc<dyn TransactionArchive>,
    inner: RwLock<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    unspent: HashMap<Outpoint, UtxoRecord>,
    by_address: HashMap<Address, BTreeSet<(u64, Outpoint)>>,
    spends: HashMap<Outpoint, TransactionId>,
    commit_seq: u64,
}

impl LedgerState {
    fn insert_unspent(&mut self, utxo: UtxoRecord) {
        self.by_address
            .entry(utxo.owner_address.clone())
            .or_default()
            .insert((utxo.created_at_seq, utxo.outpoint));
        self.unspent.insert(utxo.outpoint, utxo);
    }

    fn remove_unspent(&mut self, outpoint: &Outpoint) -> Option<UtxoRecord> {
        let utxo = self.unspent.remove(outpoint)?;
        if let Some(index) = self.by_address.get_mut(&utxo.owner_address) {
            index.remove(&(utxo.created_at_seq, *outpoint));
            if index.is_empty() {
                self.by_address.remove(&utxo.owner_address);
            }
        }
        Some(utxo)
    }
}

impl InMemoryLedger {
    pub fn new(codec: Arc<dyn TransactionCodec>, archive: Arc<dyn TransactionArchive>) -> Self {
        Self {
            codec,
            archive,
            inner: RwLock::new(LedgerState::default()),
        }
    }

    /// Ledger with the given codec and an in-memory archive.
    pub fn with_codec(codec: Arc<dyn TransactionCodec>) -> Self {
        Self::new(codec, Arc::new(InMemoryTransactionArchive::new()))
    }

    /// Number of unspent outputs.
    pub fn unspent_count(&self) -> Result<usize, LedgerError> {
        Ok(self.read_state()?.unspent.len())
    }

    /// Number of spent outpoints on record.
    pub fn spent_count(&self) -> Result<usize, LedgerError> {
        Ok(self.read_state()?.spends.len())
    }

    /// Commit sequence of the most recently applied transaction (0 if none).
    pub fn commit_seq(&self) -> Result<u64, LedgerError> {
        Ok(self.read_state()?.commit_seq)
    }

    /// Check that no outpoint is both spent and unspent and that the address
    /// index mirrors the unspent set.
    pub fn validate_state(&self) -> Result<(), LedgerError> {
        let state = self.read_state()?;

        for outpoint in state.unspent.keys() {
            if state.spends.contains_key(outpoint) {
                return Err(LedgerError::Integrity(format!("{outpoint} is both unspent and spent")));
            }
        }

        let indexed: usize = state.by_address.values().map(BTreeSet::len).sum();
        if indexed != state.unspent.len() {
            return Err(LedgerError::Integrity(format!(
                "address index holds {indexed} entries, unspent set holds {}",
                state.unspent.len()
            )));
        }

        for (address, entries) in &state.by_address {
            for (seq, outpoint) in entries {
                match state.unspent.get(outpoint) {
                    Some(utxo) if utxo.owner_address == *address && utxo.created_at_seq == *seq => {}
                    _ => {
                        return Err(LedgerError::Integrity(format!(
                            "stale address index entry {outpoint} for {address}"
                        )))
                    }
                }
            }
        }

        Ok(())
    }

    fn read_state(&self) -> Result<std::sync::RwLockReadGuard<'_, LedgerState>, LedgerError> {
        self.inner.read().map_err(|_| LedgerError::LockPoisoned)
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::with_codec(Arc::new(BincodeCodec))
    }
}

impl LedgerWriter for InMemoryLedger {
    fn apply_transaction(&self, raw: &[u8]) -> Result<AppliedTransaction, LedgerError> {
        let decoded = self.codec.decode(raw)?;
        let txid = decoded.transaction_id;

        let mut state = self.inner.write().map_err(|_| LedgerError::LockPoisoned)?;

        // Validation pass: nothing below may fail once mutation starts,
        // except the archive append, which runs before any map is touched.
        if self.archive.contains(&txid)? {
            return Err(LedgerError::AlreadyArchived(txid));
        }
        let mut seen = HashSet::with_capacity(decoded.inputs.len());
        for outpoint in &decoded.inputs {
            if !seen.insert(*outpoint) || !state.unspent.contains_key(outpoint) {
                debug!(%txid, input = %outpoint, "input missing");
                return Err(LedgerError::InputMissing(*outpoint));
            }
        }

        self.archive.append(txid, raw.to_vec())?;

        // Mutation pass.
        state.commit_seq += 1;
        let commit_seq = state.commit_seq;

        let mut spent = Vec::with_capacity(decoded.inputs.len());
        for outpoint in &decoded.inputs {
            if let Some(utxo) = state.remove_unspent(outpoint) {
                state.spends.insert(*outpoint, txid);
                spent.push(SpentOutput {
                    spend: SpendRecord {
                        outpoint: *outpoint,
                        spending_transaction_id: txid,
                    },
                    utxo,
                });
            }
        }

        let mut created = Vec::new();
        for (index, output) in decoded.outputs.iter().enumerate() {
            let Some(address) = &output.address else {
                continue;
            };
            let output_index = index as u32;
            let utxo = UtxoRecord {
                outpoint: Outpoint::new(txid, output_index),
                transaction_id: txid,
                output_index,
                locking_script_hex: output.script_hex.clone(),
                owner_address: address.clone(),
                amount: output.amount,
                created_at_seq: commit_seq,
            };
            state.insert_unspent(utxo.clone());
            created.push(utxo);
        }

        info!(
            %txid,
            commit_seq,
            spent = spent.len(),
            created = created.len(),
            "transaction applied"
        );

        Ok(AppliedTransaction {
            transaction_id: txid,
            commit_seq,
            created,
            spent,
        })
    }
}

impl LedgerReader for InMemoryLedger {
    fn fetch_transaction(&self, id: &TransactionId) -> Result<Option<Vec<u8>>, LedgerError> {
        Ok(self.archive.get(id)?)
    }

    fn list_unspent_for_address(
        &self,
        address: &Address,
    ) -> Result<Vec<UtxoRecord>, LedgerError> {
        let state = self.read_state()?;
        let Some(index) = state.by_address.get(address) else {
            return Ok(vec![]);
        };
        Ok(index
            .iter()
            .filter_map(|(_, outpoint)| state.unspent.get(outpoint).cloned())
            .collect())
    }

    fn lookup_spend(&self, outpoint: &Outpoint) -> Result<Option<TransactionId>, LedgerError> {
        Ok(self.read_state()?.spends.get(outpoint).copied())
    }

    fn get_unspent(&self, outpoint: &Outpoint) -> Result<Option<UtxoRecord>, LedgerError> {
        Ok(self.read_state()?.unspent.get(outpoint).cloned())
    }

    fn outpoint_state(&self, outpoint: &Outpoint) -> Result<OutpointState, LedgerError> {
        let state = self.read_state()?;
        if let Some(utxo) = state.unspent.get(outpoint) {
            return Ok(OutpointState::Unspent(utxo.clone()));
        }
        Ok(match state.spends.get(outpoint) {
            Some(txid) => OutpointState::Spent {
                spending_transaction_id: *txid,
            },
            None => OutpointState::Unknown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Transaction, TxOutput};

    fn fund(ledger: &InMemoryLedger, address: &str, amount: u64, nonce: &str) -> AppliedTransaction {
        let tx = Transaction::new(
            vec![],
            vec![TxOutput::data(nonce.as_bytes().to_vec()), TxOutput::pay_to(address, amount)],
        );
        ledger.apply_transaction(&tx.to_bytes().unwrap()).unwrap()
    }

    fn raw(inputs: Vec<Outpoint>, outputs: Vec<TxOutput>) -> Vec<u8> {
        Transaction::new(inputs, outputs).to_bytes().unwrap()
    }

    #[test]
    fn funding_creates_single_utxo() {
        let ledger = InMemoryLedger::default();
        let applied = fund(&ledger, "A1", 100_000_000, "n1");

        assert_eq!(applied.commit_seq, 1);
        assert!(applied.spent.is_empty());
        assert_eq!(applied.created.len(), 1);

        let utxo = &applied.created[0];
        assert_eq!(utxo.output_index, 1);
        assert_eq!(utxo.owner_address, Address::from("A1"));
        assert_eq!(utxo.amount, 100_000_000);

        let listed = ledger.list_unspent_for_address(&Address::from("A1")).unwrap();
        assert_eq!(listed, vec![utxo.clone()]);
        ledger.validate_state().unwrap();
    }

    #[test]
    fn spend_moves_outpoint_to_spent() {
        let ledger = InMemoryLedger::default();
        let funded = fund(&ledger, "A1", 100_000_000, "n1");
        let input = funded.created[0].outpoint;

        let spend_raw = raw(vec![input], vec![TxOutput::pay_to("A2", 99_000_000)]);
        let applied = ledger.apply_transaction(&spend_raw).unwrap();

        assert_eq!(applied.spent.len(), 1);
        assert_eq!(applied.spent[0].spend.outpoint, input);
        assert_eq!(applied.spent[0].utxo.owner_address, Address::from("A1"));

        assert!(ledger
            .list_unspent_for_address(&Address::from("A1"))
            .unwrap()
            .is_empty());
        assert_eq!(
            ledger.lookup_spend(&input).unwrap(),
            Some(applied.transaction_id)
        );
        assert_eq!(
            ledger.outpoint_state(&input).unwrap(),
            OutpointState::Spent {
                spending_transaction_id: applied.transaction_id
            }
        );

        let a2 = ledger.list_unspent_for_address(&Address::from("A2")).unwrap();
        assert_eq!(a2.len(), 1);
        assert_eq!(a2[0].amount, 99_000_000);
        assert_eq!(a2[0].transaction_id, applied.transaction_id);
        ledger.validate_state().unwrap();
    }

    #[test]
    fn missing_input_leaves_state_untouched() {
        let ledger = InMemoryLedger::default();
        let funded = fund(&ledger, "A1", 10, "n1");
        let good = funded.created[0].outpoint;
        let bogus = Outpoint::new(TransactionId::from_raw(b"nowhere"), 0);

        let bad_raw = raw(vec![good, bogus], vec![TxOutput::pay_to("A2", 10)]);
        let err = ledger.apply_transaction(&bad_raw).unwrap_err();
        assert_eq!(err, LedgerError::InputMissing(bogus));

        // The valid input was not consumed and nothing was archived.
        assert!(ledger.get_unspent(&good).unwrap().is_some());
        assert_eq!(ledger.lookup_spend(&good).unwrap(), None);
        assert_eq!(ledger.spent_count().unwrap(), 0);
        assert_eq!(ledger.unspent_count().unwrap(), 1);
        assert_eq!(ledger.commit_seq().unwrap(), 1);
        let txid = TransactionId::from_raw(&bad_raw);
        assert_eq!(ledger.fetch_transaction(&txid).unwrap(), None);
    }

    #[test]
    fn double_spend_is_rejected() {
        let ledger = InMemoryLedger::default();
        let funded = fund(&ledger, "A1", 10, "n1");
        let input = funded.created[0].outpoint;

        ledger
            .apply_transaction(&raw(vec![input], vec![TxOutput::pay_to("A2", 10)]))
            .unwrap();
        let err = ledger
            .apply_transaction(&raw(vec![input], vec![TxOutput::pay_to("A3", 10)]))
            .unwrap_err();

        assert_eq!(err, LedgerError::InputMissing(input));
        assert!(ledger
            .list_unspent_for_address(&Address::from("A3"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn same_input_twice_in_one_transaction_is_rejected() {
        let ledger = InMemoryLedger::default();
        let funded = fund(&ledger, "A1", 10, "n1");
        let input = funded.created[0].outpoint;

        let err = ledger
            .apply_transaction(&raw(vec![input, input], vec![TxOutput::pay_to("A2", 20)]))
            .unwrap_err();
        assert_eq!(err, LedgerError::InputMissing(input));
        assert!(ledger.get_unspent(&input).unwrap().is_some());
    }

    #[test]
    fn replaying_a_transaction_is_rejected() {
        let ledger = InMemoryLedger::default();
        let tx = raw(vec![], vec![TxOutput::pay_to("A1", 1)]);
        let applied = ledger.apply_transaction(&tx).unwrap();

        let err = ledger.apply_transaction(&tx).unwrap_err();
        assert_eq!(err, LedgerError::AlreadyArchived(applied.transaction_id));
        assert_eq!(ledger.unspent_count().unwrap(), 1);
    }

    #[test]
    fn malformed_bytes_are_rejected() {
        let ledger = InMemoryLedger::default();
        let err = ledger.apply_transaction(b"not a transaction").unwrap_err();
        assert!(matches!(err, LedgerError::Malformed(_)));
        assert_eq!(ledger.commit_seq().unwrap(), 0);
    }

    #[test]
    fn non_address_outputs_are_archived_but_not_indexed() {
        let ledger = InMemoryLedger::default();
        let tx = raw(vec![], vec![TxOutput::data(b"memo".to_vec())]);
        let applied = ledger.apply_transaction(&tx).unwrap();

        assert!(applied.created.is_empty());
        assert_eq!(ledger.unspent_count().unwrap(), 0);
        assert_eq!(
            ledger.fetch_transaction(&applied.transaction_id).unwrap(),
            Some(tx)
        );
        let data_outpoint = Outpoint::new(applied.transaction_id, 0);
        assert_eq!(
            ledger.outpoint_state(&data_outpoint).unwrap(),
            OutpointState::Unknown
        );
    }

    #[test]
    fn unspent_list_is_ordered_by_creation() {
        let ledger = InMemoryLedger::default();
        let first = fund(&ledger, "A1", 1, "n1");
        let second = fund(&ledger, "A1", 2, "n2");
        let multi = ledger
            .apply_transaction(&raw(
                vec![],
                vec![TxOutput::pay_to("A1", 3), TxOutput::pay_to("A1", 4)],
            ))
            .unwrap();

        let amounts: Vec<u64> = ledger
            .list_unspent_for_address(&Address::from("A1"))
            .unwrap()
            .iter()
            .map(|u| u.amount)
            .collect();
        assert_eq!(amounts, vec![1, 2, 3, 4]);
        assert!(first.commit_seq < second.commit_seq);
        assert_eq!(multi.created[0].created_at_seq, multi.created[1].created_at_seq);
    }

    #[test]
    fn concurrent_spenders_of_one_output_have_one_winner() {
        use std::thread;

        let ledger = Arc::new(InMemoryLedger::default());
        let funded = fund(&ledger, "A1", 10, "n1");
        let input = funded.created[0].outpoint;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || {
                    let tx = raw(vec![input], vec![TxOutput::pay_to(format!("B{i}"), 10)]);
                    ledger.apply_transaction(&tx).is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(ledger.spent_count().unwrap(), 1);
        ledger.validate_state().unwrap();
    }

    #[test]
    fn applied_transaction_serializes() {
        let ledger = InMemoryLedger::default();
        let applied = fund(&ledger, "A1", 5, "n1");
        let json = serde_json::to_value(&applied).unwrap();
        assert_eq!(json["commit_seq"], 1);
        assert_eq!(json["created"][0]["owner_address"], "A1");
    }

    #[test]
    fn corrupted_index_is_an_integrity_error() {
        let ledger = InMemoryLedger::default();
        let funded = fund(&ledger, "A1", 10, "n1");
        let outpoint = funded.created[0].outpoint;

        ledger
            .inner
            .write()
            .unwrap()
            .spends
            .insert(outpoint, funded.transaction_id);
        let err = ledger.validate_state().unwrap_err();
        assert!(matches!(err, LedgerError::Integrity(ref d) if d.contains("both unspent and spent")));

        let ledger = InMemoryLedger::default();
        fund(&ledger, "A1", 10, "n1");
        ledger.inner.write().unwrap().by_address.clear();
        assert!(matches!(
            ledger.validate_state(),
            Err(LedgerError::Integrity(ref d)) if d.contains("address index")
        ));
    }
}
