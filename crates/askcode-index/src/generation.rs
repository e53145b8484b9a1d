//! Store generations: the on-disk layout, locking, and atomic rebuild.
//!
//! A generation is one directory holding three artifacts that are only
//! meaningful together: the metadata table, the vector index blob and the
//! descriptor. Opening validates that all three are present and agree;
//! anything less is reported as an error that requires a rebuild, never
//! repaired in place.
//!
//! Rebuilds are staged in a sibling directory and swapped into place with
//! renames, so readers see either the previous generation or the finished
//! new one.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, info, warn};

use crate::descriptor::StoreDescriptor;
use crate::error::{IndexError, Result};
use crate::store::ChunkStore;
use crate::vector_index::{IndexParams, VectorIndex};

pub const METADATA_FILE: &str = "chunks.sqlite";
pub const INDEX_FILE: &str = "index.usearch";
pub const DESCRIPTOR_FILE: &str = "meta.json";

/// Paths of one store directory and its siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
}

/// Which artifacts of a layout exist on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    Absent,
    Complete,
    Incomplete { missing: Vec<&'static str> },
}

impl StoreLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    #[must_use]
    pub fn descriptor_path(&self) -> PathBuf {
        self.root.join(DESCRIPTOR_FILE)
    }

    /// `<root>.lock`, beside the store so it survives a rebuild swap.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.sibling("lock")
    }

    #[must_use]
    pub fn staging(&self) -> Self {
        Self::new(self.sibling("staging"))
    }

    fn retired(&self) -> PathBuf {
        self.sibling("old")
    }

    /// The store directory and every sibling a session may create beside it.
    #[must_use]
    pub fn footprint(&self) -> [PathBuf; 4] {
        [
            self.root.clone(),
            self.sibling("staging"),
            self.retired(),
            self.lock_path(),
        ]
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.root.file_name().unwrap_or_default().to_os_string();
        name.push(".");
        name.push(suffix);
        self.root.with_file_name(name)
    }

    #[must_use]
    pub fn presence(&self) -> Presence {
        let artifacts = [
            (METADATA_FILE, self.metadata_path()),
            (INDEX_FILE, self.index_path()),
            (DESCRIPTOR_FILE, self.descriptor_path()),
        ];
        let missing: Vec<&'static str> = artifacts
            .iter()
            .filter(|(_, path)| !path.is_file())
            .map(|(name, _)| *name)
            .collect();

        match missing.len() {
            0 => Presence::Complete,
            n if n == artifacts.len() => Presence::Absent,
            _ => Presence::Incomplete { missing },
        }
    }
}

/// Advisory lock on `<root>.lock`. Released on drop.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    exclusive: bool,
}

impl StoreLock {
    /// Lock for a write or rebuild session. Fails instead of waiting.
    ///
    /// # Errors
    ///
    /// Returns `Locked` if any other session holds the lock.
    pub fn exclusive(layout: &StoreLayout) -> Result<Self> {
        Self::acquire(layout, true)
    }

    /// Lock for a read session; any number may coexist.
    ///
    /// # Errors
    ///
    /// Returns `Locked` if a write session holds the lock.
    pub fn shared(layout: &StoreLayout) -> Result<Self> {
        Self::acquire(layout, false)
    }

    fn acquire(layout: &StoreLayout, exclusive: bool) -> Result<Self> {
        let path = layout.lock_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        let locked = if exclusive {
            FileExt::try_lock_exclusive(&file)
        } else {
            FileExt::try_lock_shared(&file)
        };
        locked.map_err(|_| IndexError::Locked(layout.root().to_path_buf()))?;
        debug!(path = %path.display(), exclusive, "acquired store lock");

        Ok(Self { file, exclusive })
    }

    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// An open, validated store generation.
#[derive(Debug)]
pub struct StoreGeneration {
    layout: StoreLayout,
    descriptor: StoreDescriptor,
    store: ChunkStore,
    index: VectorIndex,
}

impl StoreGeneration {
    /// Open an existing generation.
    ///
    /// # Errors
    ///
    /// Returns `StoreAbsent` when no artifact exists, `StoreIncomplete` when
    /// some are missing, `StoreMismatch` when the descriptor and index blob
    /// disagree on dimension, or an IO/database error.
    pub async fn open(layout: StoreLayout, params: IndexParams) -> Result<Self> {
        match layout.presence() {
            Presence::Complete => {}
            Presence::Absent => return Err(IndexError::StoreAbsent(layout.root().to_path_buf())),
            Presence::Incomplete { missing } => {
                return Err(IndexError::StoreIncomplete {
                    path: layout.root().to_path_buf(),
                    missing,
                });
            }
        }

        let descriptor = StoreDescriptor::read(&layout.descriptor_path())?;
        let index = match VectorIndex::load(&layout.index_path(), descriptor.dimension, params) {
            Ok(index) => index,
            Err(IndexError::DimensionMismatch { expected, actual }) => {
                return Err(IndexError::StoreMismatch {
                    path: layout.root().to_path_buf(),
                    descriptor: expected,
                    index: actual,
                });
            }
            Err(e) => return Err(e),
        };
        let store = ChunkStore::open(&layout.metadata_path()).await?;

        debug!(
            root = %layout.root().display(),
            model = %descriptor.embedding_model,
            dimension = descriptor.dimension,
            points = index.len(),
            "opened store generation"
        );

        Ok(Self {
            layout,
            descriptor,
            store,
            index,
        })
    }

    /// Create an empty generation with all three artifacts written.
    ///
    /// # Errors
    ///
    /// Returns an error if any artifact already exists or cannot be written.
    pub async fn create(
        layout: StoreLayout,
        descriptor: StoreDescriptor,
        params: IndexParams,
    ) -> Result<Self> {
        if layout.presence() != Presence::Absent {
            return Err(IndexError::Other(format!(
                "refusing to create a store over existing artifacts in {}",
                layout.root().display()
            )));
        }
        std::fs::create_dir_all(layout.root())?;

        let index = VectorIndex::new(descriptor.dimension, params)?;
        let store = ChunkStore::open(&layout.metadata_path()).await?;
        index.save(&layout.index_path())?;
        descriptor.write(&layout.descriptor_path())?;

        Ok(Self {
            layout,
            descriptor,
            store,
            index,
        })
    }

    #[must_use]
    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    #[must_use]
    pub fn descriptor(&self) -> &StoreDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    #[must_use]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Persist the in-memory vector index.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob cannot be written.
    pub fn save_index(&self) -> Result<()> {
        self.index.save(&self.layout.index_path())
    }

    pub async fn close(self) {
        self.store.close().await;
    }
}

/// A new generation being built beside the live one.
///
/// Dropping without [`StagedGeneration::commit`] leaves the live store
/// untouched; the next rebuild clears the abandoned staging directory.
#[derive(Debug)]
pub struct StagedGeneration {
    target: StoreLayout,
    generation: StoreGeneration,
}

impl StagedGeneration {
    /// Start a rebuild of `target`. The caller must hold an exclusive [`StoreLock`].
    ///
    /// # Errors
    ///
    /// Returns an error if the staging directory cannot be prepared.
    pub async fn begin(
        target: StoreLayout,
        lock: &StoreLock,
        descriptor: StoreDescriptor,
        params: IndexParams,
    ) -> Result<Self> {
        if !lock.is_exclusive() {
            return Err(IndexError::Other("rebuild requires an exclusive lock".into()));
        }
        let staging = target.staging();
        if staging.root().exists() {
            warn!(path = %staging.root().display(), "removing abandoned staging directory");
            std::fs::remove_dir_all(staging.root())?;
        }
        let generation = StoreGeneration::create(staging, descriptor, params).await?;
        info!(
            target = %target.root().display(),
            model = %generation.descriptor().embedding_model,
            dimension = generation.descriptor().dimension,
            "started rebuild"
        );
        Ok(Self { target, generation })
    }

    #[must_use]
    pub fn generation(&self) -> &StoreGeneration {
        &self.generation
    }

    /// Swap the staged generation into place and reopen it there.
    ///
    /// # Errors
    ///
    /// Returns an error if saving, renaming or reopening fails.
    pub async fn commit(self, params: IndexParams) -> Result<StoreGeneration> {
        self.generation.save_index()?;
        let staging_root = self.generation.layout().root().to_path_buf();
        self.generation.close().await;

        let retired = self.target.retired();
        if retired.exists() {
            std::fs::remove_dir_all(&retired)?;
        }
        if self.target.root().exists() {
            std::fs::rename(self.target.root(), &retired)?;
        }
        std::fs::rename(&staging_root, self.target.root())?;
        if retired.exists() {
            std::fs::remove_dir_all(&retired)?;
        }

        info!(path = %self.target.root().display(), "rebuild committed");
        StoreGeneration::open(self.target, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkId, ChunkInsert};

    fn params() -> IndexParams {
        IndexParams {
            initial_capacity: 4,
            ..IndexParams::default()
        }
    }

    #[test]
    fn sibling_paths() {
        let layout = StoreLayout::new("/tmp/x/rag_store");
        assert_eq!(layout.lock_path(), PathBuf::from("/tmp/x/rag_store.lock"));
        assert_eq!(
            layout.staging().root(),
            Path::new("/tmp/x/rag_store.staging")
        );
        assert_eq!(layout.index_path(), PathBuf::from("/tmp/x/rag_store/index.usearch"));
        assert_eq!(
            layout.footprint(),
            [
                PathBuf::from("/tmp/x/rag_store"),
                PathBuf::from("/tmp/x/rag_store.staging"),
                PathBuf::from("/tmp/x/rag_store.old"),
                PathBuf::from("/tmp/x/rag_store.lock"),
            ]
        );
    }

    #[tokio::test]
    async fn open_reports_absent_and_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path().join("rag_store"));

        let err = StoreGeneration::open(layout.clone(), params()).await.unwrap_err();
        assert!(matches!(err, IndexError::StoreAbsent(_)));

        std::fs::create_dir_all(layout.root()).unwrap();
        StoreDescriptor::new("m", 3)
            .write(&layout.descriptor_path())
            .unwrap();
        let err = StoreGeneration::open(layout, params()).await.unwrap_err();
        match err {
            IndexError::StoreIncomplete { missing, .. } => {
                assert_eq!(missing, vec![METADATA_FILE, INDEX_FILE]);
            }
            other => panic!("expected StoreIncomplete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path().join("rag_store"));
        let generation =
            StoreGeneration::create(layout.clone(), StoreDescriptor::new("m", 3), params())
                .await
                .unwrap();
        assert_eq!(layout.presence(), Presence::Complete);
        generation.close().await;

        let generation = StoreGeneration::open(layout, params()).await.unwrap();
        assert_eq!(generation.descriptor().dimension, 3);
        assert!(generation.index().is_empty());
        assert_eq!(generation.store().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn open_rejects_descriptor_index_disagreement() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path().join("rag_store"));
        StoreGeneration::create(layout.clone(), StoreDescriptor::new("m", 3), params())
            .await
            .unwrap()
            .close()
            .await;
        StoreDescriptor::new("m", 5)
            .write(&layout.descriptor_path())
            .unwrap();

        let err = StoreGeneration::open(layout, params()).await.unwrap_err();
        assert!(err.requires_rebuild(), "unexpected error: {err:?}");
    }

    #[test]
    fn exclusive_lock_excludes_everyone() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path().join("rag_store"));

        let writer = StoreLock::exclusive(&layout).unwrap();
        assert!(matches!(StoreLock::shared(&layout), Err(IndexError::Locked(_))));
        assert!(matches!(StoreLock::exclusive(&layout), Err(IndexError::Locked(_))));
        drop(writer);

        let r1 = StoreLock::shared(&layout).unwrap();
        let _r2 = StoreLock::shared(&layout).unwrap();
        assert!(matches!(StoreLock::exclusive(&layout), Err(IndexError::Locked(_))));
        drop(r1);
    }

    #[tokio::test]
    async fn staged_rebuild_replaces_live_store() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path().join("rag_store"));
        let live = StoreGeneration::create(layout.clone(), StoreDescriptor::new("m", 3), params())
            .await
            .unwrap();
        let id = live
            .store()
            .insert(&ChunkInsert::new("a.rs", None, 1, 1, "x"))
            .await
            .unwrap()
            .id();
        live.index().add(id, &[1.0, 0.0, 0.0]).unwrap();
        live.save_index().unwrap();
        live.close().await;

        let lock = StoreLock::exclusive(&layout).unwrap();
        let staged = StagedGeneration::begin(
            layout.clone(),
            &lock,
            StoreDescriptor::new("m2", 2),
            params(),
        )
        .await
        .unwrap();
        assert_eq!(staged.generation().store().count().await.unwrap(), 0);
        assert!(staged.generation().index().is_empty());

        let generation = staged.commit(params()).await.unwrap();
        assert_eq!(generation.descriptor().embedding_model, "m2");
        assert_eq!(generation.store().count().await.unwrap(), 0);
        assert!(!generation.index().contains(ChunkId(1)).unwrap());
        assert!(!layout.staging().root().exists());
        assert!(!layout.retired().exists());
    }

    #[tokio::test]
    async fn rebuild_requires_exclusive_lock() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path().join("rag_store"));
        let lock = StoreLock::shared(&layout).unwrap();
        let result =
            StagedGeneration::begin(layout, &lock, StoreDescriptor::new("m", 3), params()).await;
        assert!(result.is_err());
    }
}
