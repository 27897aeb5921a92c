//! SQLite record store.
//!
//! Async SQLite access through SQLx. The schema lives in `migrations/` and
//! is applied on open. Timestamps are stored as Unix milliseconds.

use super::{NewMove, RecordStore, SessionUpdate, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duet_proto::{GameStatus, MoveRecord, ParticipantId, SessionRecord};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{info, warn};

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

type SessionRow = (
    String,
    i64,
    Option<i64>,
    Option<String>,
    String,
    Option<String>,
    i64,
    i64,
);

type MoveRow = (String, i64, String, String, String, String, i64, i64);

/// SQLx-backed store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connection acquire timeout - prevents connection storms from blocking indefinitely.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum time a connection can remain idle before being closed.
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Open (or create) the database at `path` and apply migrations.
    ///
    /// `":memory:"` opens a private in-memory database.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let (options, max_connections) = if path == ":memory:" {
            // Uniquely named shared-cache database per call so parallel tests never collide.
            let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
            let memdb_uri = format!(
                "file:duetd-memdb-{}-{}?mode=memory&cache=shared",
                std::process::id(),
                id
            );
            let options = SqliteConnectOptions::new()
                .filename(&memdb_uri)
                .shared_cache(true)
                .create_if_missing(true)
                .foreign_keys(true);
            (options, 1)
        } else {
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
                && let Err(e) = std::fs::create_dir_all(parent)
            {
                warn!(path = %parent.display(), error = %e, "Failed to create database directory");
            }
            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .foreign_keys(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
            (options, 5)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Self::ACQUIRE_TIMEOUT)
            .idle_timeout(Some(Self::IDLE_TIMEOUT))
            .test_before_acquire(true)
            .connect_with(options)
            .await?;

        info!(path = %path, "Database connected");

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database migrations checked/applied");

        Ok(Self { pool })
    }

    fn record_from_row(row: SessionRow) -> Result<SessionRecord, StoreError> {
        let (id, first, second, metadata, status, winner, created_at, updated_at) = row;
        let metadata = metadata
            .map(|raw| serde_json::from_str(&raw))
            .transpose()?;
        let status = status.parse().unwrap_or_else(|e| {
            warn!(session = %id, error = %e, "Stored status unreadable, treating as waiting");
            GameStatus::Waiting
        });
        Ok(SessionRecord {
            id,
            first,
            second,
            metadata,
            status,
            winner,
            created_at: from_millis(created_at),
            updated_at: from_millis(updated_at),
        })
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn create_session(
        &self,
        session: &str,
        first: ParticipantId,
    ) -> Result<SessionRecord, StoreError> {
        let record = SessionRecord::new(session, first);
        let result = sqlx::query(
            r#"
            INSERT INTO games (id, white_player_id, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&record.id)
        .bind(first)
        .bind(record.status.as_str())
        .bind(record.created_at.timestamp_millis())
        .bind(record.updated_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists(session.to_string()));
        }
        Ok(record)
    }

    async fn join_session(&self, session: &str, second: ParticipantId) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE games
            SET black_player_id = ?, status = 'active', updated_at = ?
            WHERE id = ? AND black_player_id IS NULL AND white_player_id != ?
            "#,
        )
        .bind(second)
        .bind(Utc::now().timestamp_millis())
        .bind(session)
        .bind(second)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        // Nothing matched: report why.
        let record = self.get_session(session).await?;
        if record.first == second {
            Err(StoreError::SameParticipant {
                session: session.to_string(),
                participant: second,
            })
        } else {
            Err(StoreError::SeatTaken(session.to_string()))
        }
    }

    async fn get_session(&self, session: &str) -> Result<SessionRecord, StoreError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, white_player_id, black_player_id, metadata, status, winner, created_at, updated_at
            FROM games
            WHERE id = ?
            "#,
        )
        .bind(session)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::record_from_row(row),
            None => Err(StoreError::NotFound(session.to_string())),
        }
    }

    async fn update_session(
        &self,
        session: &str,
        update: SessionUpdate,
    ) -> Result<(), StoreError> {
        let metadata = update
            .state
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let result = sqlx::query(
            r#"
            UPDATE games
            SET status = COALESCE(?, status),
                winner = COALESCE(?, winner),
                metadata = COALESCE(?, metadata),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.winner)
        .bind(metadata)
        .bind(Utc::now().timestamp_millis())
        .bind(session)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(session.to_string()));
        }
        Ok(())
    }

    async fn delete_session(&self, session: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM game_moves WHERE game_id = ?")
            .bind(session)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM games WHERE id = ?")
            .bind(session)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(session.to_string()));
        }
        Ok(())
    }

    async fn append_move(&self, mv: NewMove) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO game_moves (game_id, player_id, move_from, move_to, piece, fen_after, move_number, created_at)
            SELECT id, ?, ?, ?, ?, ?, ?, ? FROM games WHERE id = ?
            "#,
        )
        .bind(mv.participant_id)
        .bind(&mv.from)
        .bind(&mv.to)
        .bind(&mv.piece)
        .bind(&mv.state_after)
        .bind(i64::from(mv.move_number))
        .bind(Utc::now().timestamp_millis())
        .bind(&mv.session_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(mv.session_id));
        }
        Ok(())
    }

    async fn set_active_session(
        &self,
        participant: ParticipantId,
        session: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO participants (id, active_game) VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET active_game = excluded.active_game
            "#,
        )
        .bind(participant)
        .bind(session)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_disconnected_at(
        &self,
        participant: ParticipantId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO participants (id, disconnected_at) VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET disconnected_at = excluded.disconnected_at
            "#,
        )
        .bind(participant)
        .bind(at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_moves(&self, session: &str) -> Result<Vec<MoveRecord>, StoreError> {
        let rows = sqlx::query_as::<_, MoveRow>(
            r#"
            SELECT game_id, player_id, move_from, move_to, piece, fen_after, move_number, created_at
            FROM game_moves
            WHERE game_id = ?
            ORDER BY id
            "#,
        )
        .bind(session)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(session_id, participant_id, from, to, piece, state_after, move_number, created_at)| {
                    MoveRecord {
                        session_id,
                        participant_id,
                        from,
                        to,
                        piece,
                        state_after,
                        move_number: u32::try_from(move_number).unwrap_or_default(),
                        created_at: from_millis(created_at),
                    }
                },
            )
            .collect())
    }
}
