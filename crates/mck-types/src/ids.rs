use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identifier of an accepted transaction.
///
/// A `TransactionId` is the BLAKE3 hash of the transaction's raw bytes, so the
/// same bytes always produce the same id. It is rendered and serialized as a
/// lowercase hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionId([u8; 32]);

impl TransactionId {
    /// Compute the id of a raw transaction.
    pub fn from_raw(raw: &[u8]) -> Self {
        Self(*blake3::hash(raw).as_bytes())
    }

    /// Create a `TransactionId` from a pre-computed hash.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", self.short_hex())
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for TransactionId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for TransactionId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<TransactionId> for String {
    fn from(id: TransactionId) -> Self {
        id.to_hex()
    }
}

/// Reference to one output of one transaction.
///
/// The text form is `"{transactionId}_o{outputIndex}"`, which is also the
/// serialized form and the key under which spends are looked up.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Outpoint {
    pub transaction_id: TransactionId,
    pub output_index: u32,
}

impl Outpoint {
    pub fn new(transaction_id: TransactionId, output_index: u32) -> Self {
        Self {
            transaction_id,
            output_index,
        }
    }
}

impl fmt::Debug for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Outpoint({}_o{})",
            self.transaction_id.short_hex(),
            self.output_index
        )
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_o{}", self.transaction_id, self.output_index)
    }
}

impl FromStr for Outpoint {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (txid, index) = s
            .rsplit_once("_o")
            .ok_or_else(|| TypeError::InvalidOutpoint(s.to_string()))?;
        let transaction_id = TransactionId::from_hex(txid)?;
        let output_index = index
            .parse::<u32>()
            .map_err(|_| TypeError::InvalidOutpoint(s.to_string()))?;
        Ok(Self::new(transaction_id, output_index))
    }
}

impl TryFrom<String> for Outpoint {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Outpoint> for String {
    fn from(outpoint: Outpoint) -> Self {
        outpoint.to_string()
    }
}

/// A pay-to-address destination. Opaque to the ledger beyond equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn transaction_id_is_hash_of_raw_bytes() {
        let a = TransactionId::from_raw(b"tx-a");
        let b = TransactionId::from_raw(b"tx-a");
        let c = TransactionId::from_raw(b"tx-c");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_hex().len(), 64);
    }

    #[test]
    fn transaction_id_rejects_wrong_length() {
        let err = TransactionId::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
        assert!(matches!(
            TransactionId::from_hex("zz"),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn outpoint_text_form() {
        let txid = TransactionId::from_hash([0xab; 32]);
        let outpoint = Outpoint::new(txid, 3);
        assert_eq!(outpoint.to_string(), format!("{}_o3", "ab".repeat(32)));
        assert_eq!(format!("{outpoint:?}"), "Outpoint(abababab_o3)");
    }

    #[test]
    fn outpoint_rejects_garbage() {
        assert!(matches!(
            "no-separator".parse::<Outpoint>(),
            Err(TypeError::InvalidOutpoint(_))
        ));
        let bad_index = format!("{}_ox", "00".repeat(32));
        assert!(matches!(
            bad_index.parse::<Outpoint>(),
            Err(TypeError::InvalidOutpoint(_))
        ));
    }

    #[test]
    fn outpoint_serializes_as_string() {
        let outpoint = Outpoint::new(TransactionId::from_hash([1; 32]), 0);
        let json = serde_json::to_string(&outpoint).unwrap();
        assert_eq!(json, format!("\"{}_o0\"", "01".repeat(32)));
        let back: Outpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, outpoint);
    }

    #[test]
    fn address_is_transparent() {
        let json = serde_json::to_string(&Address::from("A1")).unwrap();
        assert_eq!(json, "\"A1\"");
    }

    proptest! {
        #[test]
        fn outpoint_parse_inverts_display(hash in any::<[u8; 32]>(), index in any::<u32>()) {
            let outpoint = Outpoint::new(TransactionId::from_hash(hash), index);
            let parsed: Outpoint = outpoint.to_string().parse().unwrap();
            prop_assert_eq!(parsed, outpoint);
        }
    }
}
