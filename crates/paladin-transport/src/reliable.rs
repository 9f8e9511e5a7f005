//! Durable reliable-message queue backing the "reliable" delivery class
//! (§4.4): written once with a monotonic per-target sequence, delivered
//! repeatedly until the peer writes an ack row.

use chrono::Utc;
use paladin_persistence::Gateway;
use paladin_types::ReliableMessage;
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::TransportError;

/// Reserved `message_type` for the application-level ack reply a
/// receiver sends back once it has taken in a reliable message (§4.4).
/// Never appears in `reliable_messages`; it only ever travels as a
/// fire-and-forget `TransportMessage` whose `correlation_id` names the
/// original message being acked.
pub const RELIABLE_ACK_KIND: &str = "__reliable_ack__";

#[derive(Clone)]
pub struct ReliableStore {
    gateway: Gateway,
}

impl ReliableStore {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub async fn enqueue(&self, message: ReliableMessage) -> Result<(), TransportError> {
        self.gateway
            .transaction(|tx| {
                let message = message.clone();
                async move {
                    sqlx::query(
                        "INSERT INTO reliable_messages (id, target_node, kind, metadata) VALUES ($1, $2, $3, $4)",
                    )
                    .bind(message.id)
                    .bind(&message.target_node)
                    .bind(&message.kind)
                    .bind(serde_json::to_value(&message.metadata).unwrap())
                    .execute(tx.conn().as_mut())
                    .await?;
                    Ok(())
                }
            })
            .await?;
        Ok(())
    }

    /// Full scan: every unacked message for `target_node`, ordered by
    /// sequence. Used on the first pass and every resend interval.
    pub async fn full_scan(&self, target_node: &str) -> Result<Vec<ReliableMessage>, TransportError> {
        let rows: Vec<(i64, Uuid, String, String, serde_json::Value)> = sqlx::query_as(
            "SELECT m.sequence, m.id, m.target_node, m.kind, m.metadata
             FROM reliable_messages m
             LEFT JOIN reliable_message_acks a ON a.message_id = m.id
             WHERE m.target_node = $1 AND a.message_id IS NULL
             ORDER BY m.sequence ASC",
        )
        .bind(target_node)
        .fetch_all(self.gateway.pool())
        .await
        .map_err(paladin_persistence::PersistenceError::from)?;
        Ok(rows
            .into_iter()
            .map(|(sequence, id, target_node, kind, metadata)| ReliableMessage {
                sequence,
                id,
                target_node,
                kind,
                metadata: serde_json::from_value(metadata).unwrap_or_default(),
            })
            .collect())
    }

    /// Incremental scan: only messages above `high_water_mark`.
    pub async fn incremental_scan(
        &self,
        target_node: &str,
        high_water_mark: i64,
    ) -> Result<Vec<ReliableMessage>, TransportError> {
        let rows: Vec<(i64, Uuid, String, String, serde_json::Value)> = sqlx::query_as(
            "SELECT m.sequence, m.id, m.target_node, m.kind, m.metadata
             FROM reliable_messages m
             LEFT JOIN reliable_message_acks a ON a.message_id = m.id
             WHERE m.target_node = $1 AND a.message_id IS NULL AND m.sequence > $2
             ORDER BY m.sequence ASC",
        )
        .bind(target_node)
        .bind(high_water_mark)
        .fetch_all(self.gateway.pool())
        .await
        .map_err(paladin_persistence::PersistenceError::from)?;
        Ok(rows
            .into_iter()
            .map(|(sequence, id, target_node, kind, metadata)| ReliableMessage {
                sequence,
                id,
                target_node,
                kind,
                metadata: serde_json::from_value(metadata).unwrap_or_default(),
            })
            .collect())
    }

    /// Acks a message, optionally carrying a permanent-failure `error` so
    /// it never resends (messages that fail to build due to permanent
    /// data errors are acked this way per §4.4).
    pub async fn ack(&self, message_id: Uuid, error: Option<String>) -> Result<(), TransportError> {
        self.gateway
            .transaction(|tx| async move {
                sqlx::query(
                    "INSERT INTO reliable_message_acks (message_id, time, error) VALUES ($1, $2, $3)
                     ON CONFLICT (message_id) DO NOTHING",
                )
                .bind(message_id)
                .bind(Utc::now())
                .bind(error)
                .execute(tx.conn().as_mut())
                .await?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

/// Tracks each peer's last-drained sequence so `incremental_scan` can
/// avoid re-walking the whole unacked set every pass.
#[derive(Default)]
pub struct DrainWatermarks {
    marks: HashMap<String, i64>,
}

impl DrainWatermarks {
    pub fn get(&self, target_node: &str) -> i64 {
        *self.marks.get(target_node).unwrap_or(&0)
    }

    pub fn advance(&mut self, target_node: &str, sequence: i64) {
        let entry = self.marks.entry(target_node.to_string()).or_insert(0);
        if sequence > *entry {
            *entry = sequence;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watermark_only_moves_forward() {
        let mut marks = DrainWatermarks::default();
        marks.advance("node-a", 5);
        marks.advance("node-a", 3);
        assert_eq!(marks.get("node-a"), 5);
        marks.advance("node-a", 9);
        assert_eq!(marks.get("node-a"), 9);
    }

    #[test]
    fn unseen_node_has_zero_watermark() {
        let marks = DrainWatermarks::default();
        assert_eq!(marks.get("node-unknown"), 0);
    }
}
