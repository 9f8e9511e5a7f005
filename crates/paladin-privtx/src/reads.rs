//! Supplemented read path (§4.8): fetch a transaction's durable record
//! and, once produced, its receipt.

use chrono::{DateTime, Utc};
use paladin_persistence::Gateway;
use paladin_types::{CanonicalJson, Hash, TxType};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::PrivTxError;

#[derive(Debug, Clone)]
pub struct TransactionView {
    pub id: Uuid,
    pub tx_type: TxType,
    pub created: DateTime<Utc>,
    pub from: String,
    pub to: Option<String>,
    pub domain: Option<String>,
    pub function: String,
    pub abi_reference: Hash,
    pub inputs: CanonicalJson,
    pub idempotency_key: Option<String>,
    pub depends_on: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct ReceiptView {
    pub tx_id: Uuid,
    pub success: bool,
    pub onchain_location: Option<String>,
    pub failure_message: Option<String>,
    pub domain_data: Option<Value>,
    pub recorded_at: DateTime<Utc>,
}

pub async fn get_transaction(gateway: &Gateway, tx_id: Uuid) -> Result<TransactionView, PrivTxError> {
    let row: Option<(Uuid, String, DateTime<Utc>, String, Option<String>, Option<String>, String, Vec<u8>, Value, Option<String>)> =
        sqlx::query_as(
            "SELECT id, tx_type, created, \"from\", \"to\", domain, function, abi_reference, inputs, idempotency_key
             FROM transactions WHERE id = $1",
        )
        .bind(tx_id)
        .fetch_optional(gateway.pool())
        .await
        .map_err(paladin_persistence::PersistenceError::from)?;

    let (id, tx_type, created, from, to, domain, function, abi_reference, inputs, idempotency_key) =
        row.ok_or(PrivTxError::NotFound(tx_id))?;

    let depends_on: Vec<(Uuid,)> =
        sqlx::query_as("SELECT depends_on_id FROM transaction_deps WHERE tx_id = $1")
            .bind(tx_id)
            .fetch_all(gateway.pool())
            .await
            .map_err(paladin_persistence::PersistenceError::from)?;

    let abi_reference: [u8; 32] = abi_reference.try_into().map_err(|_| PrivTxError::NotFound(tx_id))?;

    Ok(TransactionView {
        id,
        tx_type: if tx_type == "public" { TxType::Public } else { TxType::Private },
        created,
        from,
        to,
        domain,
        function,
        abi_reference: Hash(abi_reference),
        inputs: CanonicalJson::new(inputs),
        idempotency_key,
        depends_on: depends_on.into_iter().map(|(d,)| d).collect(),
    })
}

pub async fn get_receipt(gateway: &Gateway, tx_id: Uuid) -> Result<Option<ReceiptView>, PrivTxError> {
    let row: Option<(Uuid, bool, Option<String>, Option<String>, Option<Value>, DateTime<Utc>)> = sqlx::query_as(
        "SELECT tx_id, success, onchain_location, failure_message, domain_data, recorded_at
         FROM transaction_receipts WHERE tx_id = $1",
    )
    .bind(tx_id)
    .fetch_optional(gateway.pool())
    .await
    .map_err(paladin_persistence::PersistenceError::from)?;

    Ok(row.map(|(tx_id, success, onchain_location, failure_message, domain_data, recorded_at)| ReceiptView {
        tx_id,
        success,
        onchain_location,
        failure_message,
        domain_data,
        recorded_at,
    }))
}
