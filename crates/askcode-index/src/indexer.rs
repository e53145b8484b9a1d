//! Indexing orchestrator: chunk → dedup → embed → commit, one file at a time.

use std::time::Instant;

use askcode_llm::LlmProvider;
use tracing::{debug, info, warn};

use crate::chunker::{ChunkerConfig, chunk_lines};
use crate::descriptor::StoreDescriptor;
use crate::error::{IndexError, Result};
use crate::generation::{Presence, StagedGeneration, StoreGeneration, StoreLayout, StoreLock};
use crate::types::{ChunkId, ChunkInsert};
use crate::vector_index::IndexParams;
use crate::walker::SourceFile;

/// Text embedded once per run to learn the model's dimension.
pub const PROBE_TEXT: &str = "dimension probe";

const RECONCILE_BATCH: usize = 64;

/// Files indexed between saves of the vector index blob.
pub const DEFAULT_SAVE_EVERY: usize = 64;

/// Indexer configuration.
#[derive(Debug, Clone, Copy)]
pub struct IndexerConfig {
    pub chunker: ChunkerConfig,
    pub params: IndexParams,
    /// Save the vector index after this many files that added points; 0 saves only at the end.
    pub save_every: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            chunker: ChunkerConfig::default(),
            params: IndexParams::default(),
            save_every: DEFAULT_SAVE_EVERY,
        }
    }
}

/// Summary of an indexing run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub files_scanned: usize,
    pub files_indexed: usize,
    pub chunks_created: usize,
    pub chunks_skipped: usize,
    /// Records that had no vector and were re-embedded before indexing.
    pub chunks_recovered: usize,
    /// Times the vector index blob was written while indexing files.
    pub index_saves: usize,
    pub duration_ms: u64,
}

/// Orchestrates indexing of source files into a store generation.
pub struct CodeIndexer<P: LlmProvider> {
    provider: P,
    config: IndexerConfig,
}

impl<P: LlmProvider> CodeIndexer<P> {
    /// # Errors
    ///
    /// Returns `InvalidChunking` if the chunker configuration is unusable.
    pub fn new(provider: P, config: IndexerConfig) -> Result<Self> {
        config.chunker.validate()?;
        Ok(Self { provider, config })
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Embed [`PROBE_TEXT`] and return the vector length.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding call fails or yields an empty vector.
    pub async fn probe_dimension(&self) -> Result<usize> {
        let probe = self.provider.embed(PROBE_TEXT).await?;
        if probe.is_empty() {
            return Err(IndexError::Other(format!(
                "embedding model {} returned an empty vector",
                self.provider.embedding_model()
            )));
        }
        Ok(probe.len())
    }

    /// Index `files` into the store at `layout` under an exclusive lock.
    ///
    /// With `rebuild`, or when no store exists yet, a new generation is
    /// staged and swapped in. Otherwise the existing generation is opened,
    /// checked against the probed model and dimension, reconciled, and
    /// appended to.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is locked, absent-but-partial,
    /// mismatched, or if embedding or persistence fails. Files committed
    /// before the failure stay committed.
    pub async fn run(
        &self,
        layout: &StoreLayout,
        files: impl IntoIterator<Item = SourceFile>,
        rebuild: bool,
    ) -> Result<IndexReport> {
        let start = Instant::now();
        let lock = StoreLock::exclusive(layout)?;
        let dimension = self.probe_dimension().await?;
        let model = self.provider.embedding_model().to_owned();

        let fresh = rebuild || layout.presence() == Presence::Absent;
        let mut report = if fresh {
            self.rebuild(layout, &lock, StoreDescriptor::new(model, dimension), files)
                .await?
        } else {
            self.append(layout, &model, dimension, files).await?
        };
        drop(lock);

        report.duration_ms = start.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
        info!(
            provider = self.provider.name(),
            files_scanned = report.files_scanned,
            files_indexed = report.files_indexed,
            created = report.chunks_created,
            skipped = report.chunks_skipped,
            recovered = report.chunks_recovered,
            index_saves = report.index_saves,
            duration_ms = report.duration_ms,
            "indexing complete"
        );
        Ok(report)
    }

    async fn rebuild(
        &self,
        layout: &StoreLayout,
        lock: &StoreLock,
        descriptor: StoreDescriptor,
        files: impl IntoIterator<Item = SourceFile>,
    ) -> Result<IndexReport> {
        let staged =
            StagedGeneration::begin(layout.clone(), lock, descriptor, self.config.params).await?;

        match self.index_files(staged.generation(), files).await {
            Ok(report) => {
                staged.commit(self.config.params).await?.close().await;
                Ok(report)
            }
            Err(e @ IndexError::Llm(_)) => {
                // The staged generation is consistent up to the last file; keep it so
                // an append run can resume from there.
                let committed = staged.generation().store().count().await?;
                staged.commit(self.config.params).await?.close().await;
                warn!(committed, "rebuild interrupted by embedding failure; re-run to resume");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn append(
        &self,
        layout: &StoreLayout,
        model: &str,
        dimension: usize,
        files: impl IntoIterator<Item = SourceFile>,
    ) -> Result<IndexReport> {
        let generation = StoreGeneration::open(layout.clone(), self.config.params).await?;
        generation.descriptor().check(model, dimension)?;

        let recovered = self.reconcile(&generation).await?;
        let result = self.index_files(&generation, files).await;
        generation.close().await;

        let mut report = result?;
        report.chunks_recovered = recovered;
        Ok(report)
    }

    /// Bring the vector index level with the metadata store.
    ///
    /// Records without a point are re-embedded and added. Points without a
    /// record cannot be repaired and fail with `Misaligned`.
    ///
    /// # Errors
    ///
    /// Returns `Misaligned`, or an embedding/persistence error.
    pub async fn reconcile(&self, generation: &StoreGeneration) -> Result<usize> {
        let index = generation.index();
        let ids = generation.store().all_ids().await?;

        let mut missing: Vec<ChunkId> = Vec::new();
        for &id in &ids {
            if !index.contains(id)? {
                missing.push(id);
            }
        }
        let aligned = ids.len() - missing.len();
        if index.len() != aligned {
            return Err(IndexError::Misaligned {
                points: index.len(),
                records: ids.len(),
            });
        }
        if missing.is_empty() {
            return Ok(0);
        }

        warn!(count = missing.len(), "re-embedding records without vectors");
        let dimension = generation.descriptor().dimension;
        let mut recovered = 0;
        for batch in missing.chunks(RECONCILE_BATCH) {
            for record in generation.store().fetch_many(batch).await? {
                let vector = self.embed_checked(&record.content, dimension).await?;
                index.add(record.id, &vector)?;
                recovered += 1;
            }
            generation.save_index()?;
        }
        Ok(recovered)
    }

    /// Chunk, dedup, embed and commit each file in order.
    ///
    /// Each file's new records are written in one transaction and their
    /// vectors added right after. The index blob is saved every
    /// `save_every` files that added points, and once more when the loop
    /// ends, whether it finished or failed. Records whose points were never
    /// saved are re-embedded by the next [`reconcile`](Self::reconcile).
    ///
    /// # Errors
    ///
    /// Returns the first embedding, dimension or persistence error.
    pub async fn index_files(
        &self,
        generation: &StoreGeneration,
        files: impl IntoIterator<Item = SourceFile>,
    ) -> Result<IndexReport> {
        let mut report = IndexReport::default();
        let mut unsaved = 0usize;

        let result = self
            .index_each(generation, files, &mut report, &mut unsaved)
            .await;
        if unsaved > 0 {
            let saved = generation.save_index();
            if saved.is_ok() {
                report.index_saves += 1;
            }
            result?;
            saved?;
        } else {
            result?;
        }
        Ok(report)
    }

    async fn index_each(
        &self,
        generation: &StoreGeneration,
        files: impl IntoIterator<Item = SourceFile>,
        report: &mut IndexReport,
        unsaved: &mut usize,
    ) -> Result<()> {
        let dimension = generation.descriptor().dimension;

        for (i, file) in files.into_iter().enumerate() {
            report.files_scanned += 1;
            let (created, skipped) = self.index_file(generation, &file, dimension).await?;
            if created > 0 {
                report.files_indexed += 1;
                *unsaved += 1;
            }
            report.chunks_created += created;
            report.chunks_skipped += skipped;
            info!(file = %file.path, progress = i + 1, created, skipped);

            if self.config.save_every > 0 && *unsaved >= self.config.save_every {
                generation.save_index()?;
                report.index_saves += 1;
                *unsaved = 0;
            }
        }
        Ok(())
    }

    async fn index_file(
        &self,
        generation: &StoreGeneration,
        file: &SourceFile,
        dimension: usize,
    ) -> Result<(usize, usize)> {
        let windows = chunk_lines(&file.text, &self.config.chunker);
        let mut skipped = 0usize;
        let mut inserts = Vec::with_capacity(windows.len());
        let mut vectors = Vec::with_capacity(windows.len());

        for window in &windows {
            let insert = ChunkInsert::new(
                &file.path,
                file.language,
                window.start_line,
                window.end_line,
                &window.content,
            );
            if generation.store().exists(&insert.content_hash).await? {
                skipped += 1;
                continue;
            }
            vectors.push(self.embed_checked(&window.content, dimension).await?);
            inserts.push(insert);
        }

        if inserts.is_empty() {
            return Ok((0, skipped));
        }

        let inserted = generation.store().insert_batch(&inserts).await?;
        let mut created = 0usize;
        for (outcome, vector) in inserted.iter().zip(&vectors) {
            if outcome.is_new() {
                generation.index().add(outcome.id(), vector)?;
                created += 1;
            } else {
                skipped += 1;
            }
        }

        debug!("{}: {created} chunks indexed, {skipped} unchanged", file.path);
        Ok((created, skipped))
    }

    async fn embed_checked(&self, text: &str, dimension: usize) -> Result<Vec<f32>> {
        let vector = self.provider.embed(text).await?;
        if vector.len() != dimension {
            return Err(IndexError::DimensionMismatch {
                expected: dimension,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }
}
