use std::collections::HashMap;
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow, types::Json};
use tracing::debug;
use uuid::Uuid;
use crate::config::{validate_table_name, ConfigError, DEFAULT_TABLE};
use crate::table::{ConditionFailure, PollRecord, PollTable, TableError};

/// Poll table backed by PostgreSQL.
///
/// Reads go to the primary, so they observe every committed vote. The vote
/// update carries its condition in the `WHERE` clause: concurrent updates of
/// the same row queue on the row lock and re-check the predicate against the
/// newest version before applying.
#[derive(Debug, Clone)]
pub struct PgPollTable {
    pool: PgPool,
    table: String,
}

impl PgPollTable {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, table: DEFAULT_TABLE.into() }
    }

    pub fn with_table(pool: PgPool, table: impl Into<String>) -> Result<Self, ConfigError> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self { pool, table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Creates the configured table if it is missing. The bundled migration
    /// only provisions the default table.
    pub async fn ensure_table(&self) -> Result<(), TableError> {
        sqlx::query(&create_table_sql(&self.table))
            .execute(&self.pool)
            .await?;

        debug!("Ensured poll table {}", self.table);
        Ok(())
    }

    async fn classify_rejected_vote(&self, id: Uuid, voter: &str, option: &str) -> Result<ConditionFailure, TableError> {
        let sql = format!(
            "SELECT $2::text = ANY(voters) AS voted, options ? $3::text AS has_option
             FROM {} WHERE id = $1",
            self.table
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .bind(voter)
            .bind(option)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else { return Ok(ConditionFailure::MissingItem) };

        let voted: bool = row.try_get("voted")?;
        let has_option: bool = row.try_get("has_option")?;

        if voted {
            Ok(ConditionFailure::AlreadyVoted)
        } else if !has_option {
            Ok(ConditionFailure::MissingOption)
        } else {
            Err(TableError::Unavailable(format!("conditional update on {} matched no rows", id)))
        }
    }
}

pub(crate) fn create_table_sql(table: &str) -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS {} (
               id UUID PRIMARY KEY,
               "user" TEXT NOT NULL,
               votes BIGINT NOT NULL DEFAULT 0 CHECK (votes >= 0),
               voters TEXT[] NOT NULL DEFAULT '{{}}',
               options JSONB NOT NULL DEFAULT '{{}}'::jsonb
           )"#,
        table
    )
}

fn record_from_row(row: &PgRow) -> Result<PollRecord, sqlx::Error> {
    let options: Json<HashMap<String, i64>> = row.try_get("options")?;

    Ok(PollRecord {
        id: row.try_get("id")?,
        user: row.try_get("user")?,
        votes: row.try_get("votes")?,
        voters: row.try_get("voters")?,
        options: options.0,
    })
}

#[async_trait]
impl PollTable for PgPollTable {
    async fn put_item(&self, record: &PollRecord) -> Result<(), TableError> {
        let sql = format!(
            r#"INSERT INTO {} (id, "user", votes, voters, options)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (id) DO UPDATE SET
                   "user" = EXCLUDED."user",
                   votes = EXCLUDED.votes,
                   voters = EXCLUDED.voters,
                   options = EXCLUDED.options"#,
            self.table
        );

        sqlx::query(&sql)
            .bind(record.id)
            .bind(&record.user)
            .bind(record.votes)
            .bind(&record.voters)
            .bind(Json(&record.options))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_item(&self, id: Uuid) -> Result<(), TableError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", self.table);

        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await?;

        debug!("Deleted {} rows for poll {}", result.rows_affected(), id);
        Ok(())
    }

    async fn get_item(&self, id: Uuid) -> Result<Option<PollRecord>, TableError> {
        let sql = format!(
            r#"SELECT id, "user", votes, voters, options FROM {} WHERE id = $1"#,
            self.table
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref()
            .map(record_from_row)
            .transpose()
            .map_err(|e| TableError::Malformed(e.to_string()))
    }

    async fn update_vote(&self, id: Uuid, voter: &str, option: &str) -> Result<(), TableError> {
        let sql = format!(
            "UPDATE {}
             SET votes = votes + 1,
                 voters = array_append(voters, $2::text),
                 options = jsonb_set(options, ARRAY[$3::text], to_jsonb((options ->> $3::text)::bigint + 1))
             WHERE id = $1
               AND NOT ($2::text = ANY(voters))
               AND options ? $3::text",
            self.table
        );

        let result = sqlx::query(&sql)
            .bind(id)
            .bind(voter)
            .bind(option)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let failure = self.classify_rejected_vote(id, voter, option).await?;
        Err(TableError::ConditionalCheckFailed(failure))
    }
}
