//! Durable entities from the data model: schemas, states, locks,
//! nullifiers, transactions, reliable messages, dispatches and privacy
//! groups.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A 32-byte content hash. Displayed/parsed as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(data);
        let out = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&out);
        Self(bytes)
    }

    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash({})", hex::encode(self.0))
    }
}

impl std::fmt::Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl std::str::FromStr for Hash {
    type Err = hex::FromHexError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim_start_matches("0x"))?;
        let mut out = [0u8; 32];
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

/// JSON-normalized transaction inputs (§3): wraps a `serde_json::Value`
/// and recursively sorts object keys on construction, so two
/// semantically-identical inputs documents always compare and hash
/// equal regardless of the order their keys arrived in (request body,
/// a plugin's crafted `json!{}`, a row read back from storage).
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalJson(serde_json::Value);

impl CanonicalJson {
    pub fn new(value: serde_json::Value) -> Self {
        Self(canonicalize(value))
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

impl From<serde_json::Value> for CanonicalJson {
    fn from(value: serde_json::Value) -> Self {
        Self::new(value)
    }
}

impl PartialEq<serde_json::Value> for CanonicalJson {
    fn eq(&self, other: &serde_json::Value) -> bool {
        &self.0 == other
    }
}

impl Serialize for CanonicalJson {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CanonicalJson {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(CanonicalJson::new)
    }
}

fn canonicalize(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: std::collections::BTreeMap<String, serde_json::Value> =
                map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
            serde_json::Value::Object(sorted.into_iter().collect())
        }
        serde_json::Value::Array(items) => serde_json::Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Label value kinds a schema may declare for indexing, per §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelType {
    String,
    Int64,
    Bool,
    HexBytes,
    Timestamp,
    Uint256,
}

/// A single indexed field path declared by a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelDeclaration {
    pub path: String,
    pub kind: LabelType,
}

/// A materialised label value attached to one state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LabelValue {
    String(String),
    Int64(i64),
    Bool(bool),
    HexBytes(Vec<u8>),
    Timestamp(i64),
    Uint256(String),
}

/// Schema: (domain, id = hash of declaration, declaration, labels).
/// Immutable once inserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub id: Hash,
    pub domain: String,
    pub declaration: serde_json::Value,
    pub labels: Vec<LabelDeclaration>,
}

impl Schema {
    /// Deterministic schema id: hash of (domain, declaration).
    pub fn compute_id(domain: &str, declaration: &serde_json::Value) -> Hash {
        let canonical = format!("{domain}:{declaration}");
        Hash::from_bytes(canonical.as_bytes())
    }

    pub fn new(domain: String, declaration: serde_json::Value, labels: Vec<LabelDeclaration>) -> Self {
        let id = Self::compute_id(&domain, &declaration);
        Self { id, domain, declaration, labels }
    }
}

/// A content-addressed unit of private data, visible only within its
/// (domain, contract-address) scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub id: Hash,
    pub schema_id: Hash,
    pub domain: String,
    pub contract_address: String,
    pub data: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Kinds of in-memory state lock a domain context may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockKind {
    Create,
    Read,
    Spend,
}

/// Transient, in-memory-only lock on a state held by one domain context
/// on behalf of one transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateLock {
    pub state_id: Hash,
    pub tx_id: Uuid,
    pub kind: LockKind,
}

/// At most one nullifier per state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nullifier {
    pub id: Hash,
    pub state_id: Hash,
    pub domain: String,
}

/// Submission mode / type of a public-record transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxType {
    Public,
    Private,
}

/// The public, durable transaction record. Immutable after insert except
/// through the narrow update path of §4.6 (public-type transactions only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub tx_type: TxType,
    pub created: chrono::DateTime<chrono::Utc>,
    pub from: String,
    pub to: Option<String>,
    pub domain: Option<String>,
    pub function: String,
    pub abi_reference: Hash,
    pub inputs: CanonicalJson,
    pub idempotency_key: Option<String>,
    pub depends_on: Vec<Uuid>,
}

/// A reliable, at-least-once delivered message. `sequence` is
/// monotonically increasing per sending node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliableMessage {
    pub sequence: i64,
    pub id: Uuid,
    pub target_node: String,
    pub kind: String,
    pub metadata: HashMap<String, String>,
}

/// The durable ack row for a `ReliableMessage`. Its presence is the
/// single source of truth that the message is "done".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliableMessageAck {
    pub message_id: Uuid,
    pub time: chrono::DateTime<chrono::Utc>,
    pub error: Option<String>,
}

/// Durable binding of a private transaction to the public submission
/// that consumed its prepared call. Per §9's decided Open Question this
/// is keyed by `(public_tx_id, private_tx_id)`; the legacy
/// `public_tx_nonce` column is not carried (see DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispatch {
    pub public_tx_id: Uuid,
    pub private_tx_id: Uuid,
}

/// A privacy group: its genesis state lives in the state store like any
/// other state; this is the side table of members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivacyGroup {
    pub domain: String,
    pub id: Hash,
    pub members: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_round_trips_through_hex() {
        let h = Hash::from_bytes(b"hello");
        let s = h.to_string();
        let parsed: Hash = s.parse().unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn canonical_json_sorts_keys_regardless_of_insertion_order() {
        let a = CanonicalJson::new(serde_json::json!({"b": 1, "a": {"z": 1, "y": 2}}));
        let b = CanonicalJson::new(serde_json::json!({"a": {"y": 2, "z": 1}, "b": 1}));
        assert_eq!(a, b);
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }

    #[test]
    fn schema_id_is_deterministic() {
        let decl = serde_json::json!({"fields": ["amount", "owner"]});
        let a = Schema::compute_id("noto", &decl);
        let b = Schema::compute_id("noto", &decl);
        assert_eq!(a, b);
        let c = Schema::compute_id("zeto", &decl);
        assert_ne!(a, c);
    }
}
