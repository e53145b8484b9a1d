//! Source file discovery: which files under a repository get indexed.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use ignore::WalkBuilder;
use tracing::{debug, warn};

use crate::languages::{Lang, detect_language};

/// Extensions indexed when no `include` list is configured.
pub const DEFAULT_INCLUDE: &[&str] = &[
    "py", "ipynb", "js", "jsx", "ts", "tsx", "vue", "css", "scss", "html", "go", "rs", "java",
    "kt", "c", "h", "cpp", "cc", "hpp", "m", "mm", "cs", "php", "rb", "swift", "scala", "sql",
    "sh", "bash", "zsh", "ps1", "yml", "yaml", "toml", "ini", "cfg", "json", "md", "txt",
];

/// Directory names never descended into.
pub const DEFAULT_EXCLUDE: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".history",
    "node_modules",
    "dist",
    "build",
    "__pycache__",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
    ".idea",
    ".vscode",
    ".DS_Store",
    ".venv",
    "venv",
    "rag-local",
    ".venvs",
    "env",
    ".env",
    ".direnv",
    "site-packages",
    "__pypackages__",
];

/// Files above this size are skipped as likely binaries or lockfiles.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 1_500_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkerConfig {
    /// Extensions to index, with or without a leading dot. Empty means [`DEFAULT_INCLUDE`].
    pub include: Vec<String>,
    /// Extra directory names to skip, on top of [`DEFAULT_EXCLUDE`].
    pub exclude: Vec<String>,
    pub max_file_bytes: u64,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

impl WalkerConfig {
    /// Effective extension set, lowercased and without dots.
    #[must_use]
    pub fn include_set(&self) -> HashSet<String> {
        if self.include.is_empty() {
            DEFAULT_INCLUDE.iter().map(|e| (*e).to_owned()).collect()
        } else {
            self.include
                .iter()
                .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect()
        }
    }

    /// Effective excluded directory names.
    #[must_use]
    pub fn exclude_set(&self) -> HashSet<String> {
        DEFAULT_EXCLUDE
            .iter()
            .map(|d| (*d).to_owned())
            .chain(self.exclude.iter().map(|d| d.trim().to_owned()))
            .filter(|d| !d.is_empty())
            .collect()
    }
}

/// One file handed to the indexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the walked root, `/`-separated.
    pub path: String,
    pub language: Option<Lang>,
    pub text: String,
}

/// Deterministic walk over a repository tree.
#[derive(Debug, Clone)]
pub struct SourceWalker {
    root: PathBuf,
    config: WalkerConfig,
    skip_paths: Vec<PathBuf>,
}

impl SourceWalker {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, config: WalkerConfig) -> Self {
        Self {
            root: root.into(),
            config,
            skip_paths: Vec::new(),
        }
    }

    /// Never yield these paths or anything beneath them, e.g. a store that
    /// lives inside the repository. Paths need not exist yet.
    #[must_use]
    pub fn skipping(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.skip_paths.extend(paths);
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Matching files in file-name order. Unreadable and oversized files are
    /// skipped; text is decoded as UTF-8 with invalid sequences replaced.
    pub fn files(&self) -> impl Iterator<Item = SourceFile> + '_ {
        let include = self.config.include_set();
        let exclude = self.config.exclude_set();
        let max_bytes = self.config.max_file_bytes;
        let root = resolve(&self.root);
        let skip: Vec<PathBuf> = self.skip_paths.iter().map(|p| resolve(p)).collect();

        WalkBuilder::new(&root)
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                if entry.depth() == 0 {
                    return true;
                }
                if skip.iter().any(|p| entry.path() == p) {
                    return false;
                }
                !entry.file_type().is_some_and(|ft| ft.is_dir())
                    || !entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| exclude.contains(name))
            })
            .build()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("walk error: {e}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .filter(move |entry| has_included_extension(entry.path(), &include))
            .filter_map(move |entry| load(&root, entry.path(), max_bytes))
    }
}

fn load(root: &Path, path: &Path, max_bytes: u64) -> Option<SourceFile> {
    let size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) => {
            warn!(file = %path.display(), "skipping unreadable file: {e}");
            return None;
        }
    };
    if size > max_bytes {
        debug!(file = %path.display(), size, "skipping oversized file");
        return None;
    }
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(file = %path.display(), "skipping unreadable file: {e}");
            return None;
        }
    };

    Some(SourceFile {
        path: relative_path(root, path),
        language: detect_language(path),
        text: String::from_utf8_lossy(&bytes).into_owned(),
    })
}

/// Canonical form of `path`; for a path that does not exist yet, its
/// canonical parent joined with the file name.
fn resolve(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    match (parent.canonicalize(), path.file_name()) {
        (Ok(parent), Some(name)) => parent.join(name),
        _ => path.to_path_buf(),
    }
}

fn has_included_extension(path: &Path, include: &HashSet<String>) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| include.contains(&e.to_ascii_lowercase()))
}

fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
