//! `SQLite` metadata store for code chunks.
//!
//! One row per chunk, keyed by an `INTEGER PRIMARY KEY` id that doubles as
//! the vector index key, with a unique content hash for dedup. Rows are
//! append-only: nothing in this module updates or deletes a chunk.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::Result;
use crate::languages::Lang;
use crate::types::{ChunkId, ChunkInsert, ChunkRecord, ContentHash, Inserted};

type ChunkRow = (i64, String, Option<String>, i64, i64, String, String);

const SELECT_CHUNK: &str =
    "SELECT id, path, language, start_line, end_line, content, content_hash FROM chunks";

/// Metadata table of one store generation.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    pool: SqlitePool,
}

impl ChunkStore {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub async fn open(path: &Path) -> Result<Self> {
        let url = format!("sqlite:{}?mode=rwc", path.display());
        let opts = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;

        Self::with_pool(pool).await
    }

    /// In-memory store. A single connection keeps every query on the same database.
    ///
    /// # Errors
    ///
    /// Returns an error if migrations fail.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!().run(&pool).await?;
        Ok(Self { pool })
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn exists(&self, hash: &ContentHash) -> Result<bool> {
        Ok(self.id_for_hash(hash).await?.is_some())
    }

    /// Look up the id stored under `hash`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn id_for_hash(&self, hash: &ContentHash) -> Result<Option<ChunkId>> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM chunks WHERE content_hash = ?")
            .bind(hash.to_hex())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(id,)| ChunkId(id)))
    }

    /// Insert one chunk, or return the id already stored under its hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn insert(&self, chunk: &ChunkInsert<'_>) -> Result<Inserted> {
        let mut inserted = self.insert_batch(std::slice::from_ref(chunk)).await?;
        inserted
            .pop()
            .ok_or_else(|| crate::error::IndexError::Other("insert returned no id".into()))
    }

    /// Insert all chunks of one file in a single transaction.
    ///
    /// Chunks whose hash is already stored resolve to the existing id and
    /// write nothing. Either every new row is committed or none is.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement or the commit fails.
    pub async fn insert_batch(&self, chunks: &[ChunkInsert<'_>]) -> Result<Vec<Inserted>> {
        let mut tx = self.pool.begin().await?;
        let mut results = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let hash = chunk.content_hash.to_hex();
            let row: Option<(i64,)> = sqlx::query_as(
                "INSERT INTO chunks (path, language, start_line, end_line, content, content_hash) \
                 VALUES (?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(content_hash) DO NOTHING \
                 RETURNING id",
            )
            .bind(chunk.path)
            .bind(chunk.language.map(Lang::id))
            .bind(i64::try_from(chunk.start_line)?)
            .bind(i64::try_from(chunk.end_line)?)
            .bind(chunk.content)
            .bind(&hash)
            .fetch_optional(&mut *tx)
            .await?;

            let inserted = if let Some((id,)) = row {
                Inserted::New(ChunkId(id))
            } else {
                let (id,): (i64,) = sqlx::query_as("SELECT id FROM chunks WHERE content_hash = ?")
                    .bind(&hash)
                    .fetch_one(&mut *tx)
                    .await?;
                Inserted::Existing(ChunkId(id))
            };
            results.push(inserted);
        }

        tx.commit().await?;
        Ok(results)
    }

    /// Fetch records in the order of `ids`. Ids without a record are omitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored row is malformed.
    pub async fn fetch_many(&self, ids: &[ChunkId]) -> Result<Vec<ChunkRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders: String = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let query = format!("{SELECT_CHUNK} WHERE id IN ({placeholders})");
        let mut q = sqlx::query_as::<_, ChunkRow>(&query);
        for id in ids {
            q = q.bind(id.0);
        }

        let mut by_id: HashMap<i64, ChunkRecord> = HashMap::with_capacity(ids.len());
        for row in q.fetch_all(&self.pool).await? {
            let record = record_from_row(row)?;
            by_id.insert(record.id.0, record);
        }

        Ok(ids
            .iter()
            .filter_map(|id| by_id.get(&id.0).cloned())
            .collect())
    }

    /// All records stored for `path`, ordered by start line.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored row is malformed.
    pub async fn chunks_for_path(&self, path: &str) -> Result<Vec<ChunkRecord>> {
        let query = format!("{SELECT_CHUNK} WHERE path = ? ORDER BY start_line, id");
        let rows: Vec<ChunkRow> = sqlx::query_as(&query)
            .bind(path)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(record_from_row).collect()
    }

    /// Distinct file paths with at least one chunk.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn indexed_files(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT DISTINCT path FROM chunks ORDER BY path")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(p,)| p).collect())
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count(&self) -> Result<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(count)?)
    }

    /// Highest id issued so far, `None` for an empty table.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn max_id(&self) -> Result<Option<ChunkId>> {
        let (max,): (Option<i64>,) = sqlx::query_as("SELECT MAX(id) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(max.map(ChunkId))
    }

    /// Every stored id in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn all_ids(&self) -> Result<Vec<ChunkId>> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT id FROM chunks ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| ChunkId(id)).collect())
    }

    /// Close the pool, checkpointing the WAL so the database file is self-contained.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn record_from_row(row: ChunkRow) -> Result<ChunkRecord> {
    let (id, path, language, start_line, end_line, content, hash) = row;
    Ok(ChunkRecord {
        id: ChunkId(id),
        path,
        language: language.as_deref().and_then(Lang::from_id),
        start_line: usize::try_from(start_line)?,
        end_line: usize::try_from(end_line)?,
        content,
        content_hash: ContentHash::from_hex(&hash)?,
    })
}
