use anyhow::{Context, Result};
use chat_hub::{NewMessage, StoredMessage};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::ChatRepository;

fn stored_message(r: SqliteRow) -> StoredMessage {
    StoredMessage {
        id: r.get("id"),
        sender: r.get("sender"),
        recipient: r.get("recipient"),
        body: r.get("body"),
        timestamp: r.get("timestamp"),
        is_group: r.get("is_group"),
    }
}

impl ChatRepository {
    pub async fn insert_message(&self, msg: &NewMessage) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO messages (sender, recipient, body, timestamp, is_group)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(msg.sender.as_str())
        .bind(&msg.recipient)
        .bind(&msg.body)
        .bind(&msg.timestamp)
        .bind(msg.is_group)
        .execute(&self.pool)
        .await
        .context("Failed to insert message")?;

        Ok(result.last_insert_rowid())
    }

    /// Delete message `id` only if `sender` wrote it. `true` iff a row went away.
    pub async fn delete_message_by_sender(&self, id: i64, sender: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE id = ? AND sender = ?")
            .bind(id)
            .bind(sender)
            .execute(&self.pool)
            .await
            .context("Failed to delete message")?;
        Ok(result.rows_affected() > 0)
    }

    /// The newest `limit` messages (optionally older than `before_id`),
    /// returned oldest-first.
    pub async fn get_history(&self, before_id: Option<i64>, limit: i64) -> Result<Vec<StoredMessage>> {
        let rows = match before_id {
            Some(bid) => {
                sqlx::query(
                    r#"
                    SELECT id, sender, recipient, body, timestamp, is_group
                    FROM messages
                    WHERE id < ?
                    ORDER BY id DESC
                    LIMIT ?
                    "#,
                )
                .bind(bid)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, sender, recipient, body, timestamp, is_group
                    FROM messages
                    ORDER BY id DESC
                    LIMIT ?
                    "#,
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut messages: Vec<StoredMessage> = rows.into_iter().map(stored_message).collect();
        // Oldest first (natural reading order)
        messages.reverse();
        Ok(messages)
    }

    #[cfg(test)]
    pub async fn get_message_by_id(&self, id: i64) -> Result<Option<StoredMessage>> {
        let row = sqlx::query(
            "SELECT id, sender, recipient, body, timestamp, is_group FROM messages WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(stored_message))
    }
}
