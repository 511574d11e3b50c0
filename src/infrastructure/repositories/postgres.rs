use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row, postgres::PgPoolOptions};

use crate::domain::{
    models::{Delivery, MarkSent, Message, MessageId, NewMessage},
    repositories::MessageRepository,
};

pub type PgPool = Pool<Postgres>;

const COLUMNS: &str =
    "id, phone_number, content, is_sent, message_id, sent_at, created_at, updated_at";

pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Clone)]
pub struct PostgresMessageRepository {
    pool: PgPool,
}

impl PostgresMessageRepository {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

#[async_trait]
impl MessageRepository for PostgresMessageRepository {
    async fn create(&self, message: NewMessage) -> anyhow::Result<Message> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO messages (phone_number, content, is_sent, created_at, updated_at)
            VALUES ($1, $2, FALSE, $3, $3)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&message.phone_number)
        .bind(&message.content)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Message::try_from(row)
    }

    async fn get(&self, id: MessageId) -> anyhow::Result<Option<Message>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM messages WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Message::try_from).transpose()
    }

    async fn find_unsent(&self, limit: u32) -> anyhow::Result<Vec<Message>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {COLUMNS}
            FROM messages
            WHERE is_sent = FALSE
            ORDER BY id ASC
            LIMIT $1
            "#
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Message::try_from).collect()
    }

    async fn mark_sent(
        &self,
        id: MessageId,
        external_id: &str,
        sent_at: DateTime<Utc>,
    ) -> anyhow::Result<Option<MarkSent>> {
        let updated = sqlx::query(&format!(
            r#"
            UPDATE messages
            SET is_sent = TRUE,
                message_id = $2,
                sent_at = $3,
                updated_at = $3
            WHERE id = $1
              AND is_sent = FALSE
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(external_id)
        .bind(sent_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = updated {
            return Ok(Some(MarkSent::Updated(Message::try_from(row)?)));
        }

        // guard did not match: either already sent or gone
        Ok(self.get(id).await?.map(MarkSent::AlreadySent))
    }

    async fn list_sent(&self) -> anyhow::Result<Vec<Message>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {COLUMNS}
            FROM messages
            WHERE is_sent = TRUE
            ORDER BY sent_at DESC, id DESC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            match Message::try_from(row) {
                Ok(message) => messages.push(message),
                Err(err) => tracing::warn!(error = %err, "skipping undecodable sent message row"),
            }
        }
        Ok(messages)
    }
}

impl TryFrom<sqlx::postgres::PgRow> for Message {
    type Error = anyhow::Error;

    fn try_from(row: sqlx::postgres::PgRow) -> Result<Self, Self::Error> {
        let id: i64 = row.try_get("id")?;
        let is_sent: bool = row.try_get("is_sent")?;
        let message_id: Option<String> = row.try_get("message_id")?;
        let sent_at: Option<DateTime<Utc>> = row.try_get("sent_at")?;

        Ok(Message {
            id,
            phone_number: row.try_get("phone_number")?,
            content: row.try_get("content")?,
            delivery: delivery_from_fields(id, is_sent, message_id, sent_at)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn delivery_from_fields(
    id: MessageId,
    is_sent: bool,
    message_id: Option<String>,
    sent_at: Option<DateTime<Utc>>,
) -> anyhow::Result<Option<Delivery>> {
    match (is_sent, message_id, sent_at) {
        (true, Some(message_id), Some(sent_at)) => Ok(Some(Delivery {
            message_id,
            sent_at,
        })),
        (false, None, None) => Ok(None),
        (is_sent, message_id, sent_at) => anyhow::bail!(
            "message {id} has inconsistent delivery state: is_sent={is_sent}, message_id={}, sent_at={}",
            message_id.is_some(),
            sent_at.is_some()
        ),
    }
}
