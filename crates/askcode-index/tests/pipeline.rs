use std::collections::HashSet;

use askcode_index::chunker::ChunkerConfig;
use askcode_index::descriptor::StoreDescriptor;
use askcode_index::error::IndexError;
use askcode_index::generation::{StoreGeneration, StoreLayout, StoreLock};
use askcode_index::languages::Lang;
use askcode_index::retriever::{RetrievalConfig, Retriever};
use askcode_index::types::{ChunkId, ChunkInsert};
use askcode_index::vector_index::IndexParams;
use askcode_index::walker::{SourceFile, SourceWalker, WalkerConfig};
use askcode_index::{CodeIndexer, IndexerConfig};
use askcode_llm::mock::MockProvider;

fn config(max_lines: usize, initial_capacity: usize) -> IndexerConfig {
    IndexerConfig {
        chunker: ChunkerConfig::new(max_lines, 0).unwrap(),
        params: IndexParams {
            initial_capacity,
            ..IndexParams::default()
        },
        ..IndexerConfig::default()
    }
}

fn params() -> IndexParams {
    config(2, 4).params
}

fn source(path: &str, text: &str) -> SourceFile {
    SourceFile {
        path: path.into(),
        language: Some(Lang::Rust),
        text: text.into(),
    }
}

fn numbered(prefix: &str, n: usize) -> String {
    (1..=n)
        .map(|i| format!("{prefix} line {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn new_layout(dir: &tempfile::TempDir) -> StoreLayout {
    StoreLayout::new(dir.path().join("rag_store"))
}

async fn open(layout: &StoreLayout) -> StoreGeneration {
    StoreGeneration::open(layout.clone(), params()).await.unwrap()
}

async fn assert_aligned(generation: &StoreGeneration) {
    let ids = generation.store().all_ids().await.unwrap();
    assert_eq!(generation.index().len(), ids.len());
    for id in ids {
        assert!(generation.index().contains(id).unwrap(), "no point for {id}");
    }
}

#[tokio::test]
async fn same_chunk_is_stored_and_embedded_once() {
    let dir = tempfile::tempdir().unwrap();
    let layout = new_layout(&dir);
    let provider = MockProvider::default();
    let indexer = CodeIndexer::new(provider.clone(), config(2, 4)).unwrap();
    let file = source("a.rs", "fn a() {}\nfn b() {}");

    let report = indexer
        .run(&layout, [file.clone(), file.clone()], false)
        .await
        .unwrap();
    assert_eq!(report.chunks_created, 1);
    assert_eq!(report.chunks_skipped, 1);
    // probe + one chunk
    assert_eq!(provider.embed_calls(), 2);

    let report = indexer.run(&layout, [file], false).await.unwrap();
    assert_eq!(report.chunks_created, 0);
    assert_eq!(report.chunks_skipped, 1);
    assert_eq!(provider.embed_calls(), 3);

    let generation = open(&layout).await;
    assert_eq!(generation.store().count().await.unwrap(), 1);
    assert_eq!(generation.index().len(), 1);
}

#[tokio::test]
async fn ids_and_points_align_after_run() {
    let dir = tempfile::tempdir().unwrap();
    let layout = new_layout(&dir);
    let indexer = CodeIndexer::new(MockProvider::default(), config(3, 4)).unwrap();

    indexer
        .run(
            &layout,
            [source("a.rs", &numbered("a", 10)), source("b.rs", &numbered("b", 7))],
            false,
        )
        .await
        .unwrap();
    indexer
        .run(&layout, [source("c.rs", &numbered("c", 5))], false)
        .await
        .unwrap();

    let generation = open(&layout).await;
    let ids = generation.store().all_ids().await.unwrap();
    let expected: Vec<ChunkId> = (1..=i64::try_from(ids.len()).unwrap()).map(ChunkId).collect();
    assert_eq!(ids, expected);
    assert_eq!(ids.len(), 4 + 3 + 2);
    assert_aligned(&generation).await;
}

#[tokio::test]
async fn index_grows_past_initial_capacity() {
    let dir = tempfile::tempdir().unwrap();
    let layout = new_layout(&dir);
    let indexer = CodeIndexer::new(MockProvider::default(), config(1, 3)).unwrap();

    let report = indexer
        .run(&layout, [source("big.rs", &numbered("x", 40))], false)
        .await
        .unwrap();
    assert_eq!(report.chunks_created, 40);

    let generation = open(&layout).await;
    assert_eq!(generation.index().len(), 40);
    assert!(generation.index().capacity() >= 40);
    assert_aligned(&generation).await;
}

#[tokio::test]
async fn rebuild_starts_from_an_empty_generation() {
    let dir = tempfile::tempdir().unwrap();
    let layout = new_layout(&dir);
    let indexer = CodeIndexer::new(MockProvider::default(), config(2, 4)).unwrap();
    indexer
        .run(&layout, [source("a.rs", &numbered("a", 6))], false)
        .await
        .unwrap();

    let report = indexer
        .run(&layout, Vec::<SourceFile>::new(), true)
        .await
        .unwrap();
    assert_eq!(report.chunks_created, 0);

    let generation = open(&layout).await;
    assert_eq!(generation.store().count().await.unwrap(), 0);
    assert!(generation.index().is_empty());
    generation.close().await;

    indexer
        .run(&layout, [source("b.rs", "fn b() {}")], false)
        .await
        .unwrap();
    let generation = open(&layout).await;
    assert_eq!(generation.store().all_ids().await.unwrap(), [ChunkId(1)]);
}

#[tokio::test]
async fn new_dimension_rejected_without_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let layout = new_layout(&dir);
    CodeIndexer::new(MockProvider::with_dimension(8), config(2, 4))
        .unwrap()
        .run(&layout, [source("a.rs", "fn a() {}")], false)
        .await
        .unwrap();

    let narrower = CodeIndexer::new(MockProvider::with_dimension(4), config(2, 4)).unwrap();
    let err = narrower
        .run(&layout, [source("b.rs", "fn b() {}")], false)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IndexError::DimensionMismatch {
            expected: 8,
            actual: 4
        }
    ));

    let generation = open(&layout).await;
    assert_eq!(generation.descriptor().dimension, 8);
    assert_eq!(generation.store().count().await.unwrap(), 1);
    generation.close().await;

    narrower
        .run(&layout, [source("b.rs", "fn b() {}")], true)
        .await
        .unwrap();
    let generation = StoreGeneration::open(layout.clone(), params()).await.unwrap();
    assert_eq!(generation.descriptor().dimension, 4);
}

#[tokio::test]
async fn embedding_failure_keeps_committed_files_and_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let layout = new_layout(&dir);
    let files = || {
        vec![
            source("a.rs", &numbered("a", 4)),
            source("b.rs", &numbered("b", 4)),
            source("c.rs", &numbered("c", 4)),
        ]
    };

    // probe, a1, a2, b1 succeed; b2 fails
    let flaky = CodeIndexer::new(MockProvider::default().failing_after(4), config(2, 4)).unwrap();
    let err = flaky.run(&layout, files(), false).await.unwrap_err();
    assert!(matches!(err, IndexError::Llm(_)));

    let generation = open(&layout).await;
    let committed = generation.store().indexed_files().await.unwrap();
    assert_eq!(committed, ["a.rs"]);
    assert_aligned(&generation).await;
    generation.close().await;

    let provider = MockProvider::default();
    let healthy = CodeIndexer::new(provider.clone(), config(2, 4)).unwrap();
    let report = healthy.run(&layout, files(), false).await.unwrap();
    assert_eq!(report.chunks_skipped, 2);
    assert_eq!(report.chunks_created, 4);
    assert_eq!(provider.embed_calls(), 1 + 4);

    let generation = open(&layout).await;
    assert_eq!(generation.store().count().await.unwrap(), 6);
    assert_aligned(&generation).await;
}

#[tokio::test]
async fn failed_rebuild_keeps_staged_files_and_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let layout = new_layout(&dir);
    let files = || {
        vec![
            source("a.rs", &numbered("a", 4)),
            source("b.rs", &numbered("b", 4)),
            source("c.rs", &numbered("c", 4)),
        ]
    };

    CodeIndexer::new(MockProvider::default(), config(2, 4))
        .unwrap()
        .run(&layout, files(), false)
        .await
        .unwrap();

    // dimension embed, a1, a2, b1 succeed; b2 fails
    let flaky = CodeIndexer::new(MockProvider::default().failing_after(4), config(2, 4)).unwrap();
    let err = flaky.run(&layout, files(), true).await.unwrap_err();
    assert!(matches!(err, IndexError::Llm(_)));
    assert!(!layout.staging().root().exists());

    let generation = open(&layout).await;
    assert_eq!(generation.store().indexed_files().await.unwrap(), ["a.rs"]);
    assert_eq!(generation.store().count().await.unwrap(), 2);
    assert_aligned(&generation).await;
    generation.close().await;

    let provider = MockProvider::default();
    let report = CodeIndexer::new(provider.clone(), config(2, 4))
        .unwrap()
        .run(&layout, files(), false)
        .await
        .unwrap();
    assert_eq!(report.chunks_skipped, 2);
    assert_eq!(report.chunks_created, 4);
    assert_eq!(report.chunks_recovered, 0);
    assert_eq!(provider.embed_calls(), 1 + 4);

    let generation = open(&layout).await;
    assert_eq!(generation.store().count().await.unwrap(), 6);
    assert_aligned(&generation).await;
}

#[tokio::test]
async fn store_inside_repository_is_not_indexed() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();
    let layout = new_layout(&dir);
    let walker =
        SourceWalker::new(dir.path(), WalkerConfig::default()).skipping(layout.footprint());
    let indexer = CodeIndexer::new(MockProvider::default(), config(2, 4)).unwrap();

    indexer.run(&layout, walker.files(), false).await.unwrap();
    std::fs::write(layout.root().join("summary_notes_20260101-000000.txt"), "notes").unwrap();
    let report = indexer.run(&layout, walker.files(), false).await.unwrap();
    assert_eq!(report.files_scanned, 1);
    let report = indexer.run(&layout, walker.files(), true).await.unwrap();
    assert_eq!(report.files_scanned, 1);

    let generation = open(&layout).await;
    assert_eq!(generation.store().indexed_files().await.unwrap(), ["main.rs"]);
}

#[tokio::test]
async fn records_without_points_are_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let layout = new_layout(&dir);
    let provider = MockProvider::default();

    let generation = StoreGeneration::create(
        layout.clone(),
        StoreDescriptor::new(provider.model.clone(), provider.dimension),
        params(),
    )
    .await
    .unwrap();
    generation
        .store()
        .insert(&ChunkInsert::new("lost.rs", Some(Lang::Rust), 1, 1, "fn lost() {}"))
        .await
        .unwrap();
    generation.close().await;

    let indexer = CodeIndexer::new(provider.clone(), config(2, 4)).unwrap();
    let report = indexer
        .run(&layout, [source("new.rs", "fn new() {}")], false)
        .await
        .unwrap();
    assert_eq!(report.chunks_recovered, 1);
    assert_eq!(report.chunks_created, 1);

    let generation = open(&layout).await;
    assert_eq!(generation.index().len(), 2);
    assert_aligned(&generation).await;
}

#[tokio::test]
async fn points_without_records_are_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let layout = new_layout(&dir);
    let provider = MockProvider::default();

    let generation = StoreGeneration::create(
        layout.clone(),
        StoreDescriptor::new(provider.model.clone(), provider.dimension),
        params(),
    )
    .await
    .unwrap();
    generation
        .index()
        .add(ChunkId(99), &provider.vector_for("orphan"))
        .unwrap();
    generation.save_index().unwrap();
    generation.close().await;

    let indexer = CodeIndexer::new(provider, config(2, 4)).unwrap();
    let err = indexer
        .run(&layout, [source("a.rs", "x")], false)
        .await
        .unwrap_err();
    assert!(matches!(err, IndexError::Misaligned { points: 1, records: 0 }));
    assert!(err.requires_rebuild());
}

#[tokio::test]
async fn point_without_record_is_skipped_at_query_time() {
    let dir = tempfile::tempdir().unwrap();
    let layout = new_layout(&dir);
    let provider = MockProvider::default();

    let generation = StoreGeneration::create(
        layout.clone(),
        StoreDescriptor::new(provider.model.clone(), provider.dimension),
        params(),
    )
    .await
    .unwrap();
    let kept = generation
        .store()
        .insert(&ChunkInsert::new("a.rs", Some(Lang::Rust), 1, 1, "fn a() {}"))
        .await
        .unwrap()
        .id();
    generation
        .index()
        .add(kept, &provider.vector_for("fn a() {}"))
        .unwrap();
    generation
        .index()
        .add(ChunkId(99), &provider.vector_for("orphan"))
        .unwrap();

    let snippets = Retriever::new(&generation)
        .retrieve(&provider.vector_for("orphan"), 2, 12_000)
        .await
        .unwrap();
    assert!(snippets.iter().all(|s| s.id != ChunkId(99)));
    assert_eq!(snippets.len(), 1);
    assert_eq!(snippets[0].path, "a.rs");
    assert_eq!(snippets[0].id, kept);
}

#[tokio::test]
async fn query_returns_closest_chunk_first_one_per_file() {
    let dir = tempfile::tempdir().unwrap();
    let layout = new_layout(&dir);
    let provider = MockProvider::default();
    let indexer = CodeIndexer::new(provider.clone(), config(1, 4)).unwrap();
    indexer
        .run(
            &layout,
            [
                source("parser.rs", "fn parse_header(input: &str) -> Header\nfn parse_body()"),
                source("render.rs", "fn render_page(page: &Page) -> Html"),
                source("store.rs", "fn open_database(path: &Path) -> Pool"),
            ],
            false,
        )
        .await
        .unwrap();

    let _reader = StoreLock::shared(&layout).unwrap();
    let generation = open(&layout).await;
    let retriever = Retriever::new(&generation);

    let question = "fn render_page(page: &Page) -> Html";
    let snippets = retriever
        .search(
            &provider,
            question,
            &RetrievalConfig {
                k: 3,
                max_context_chars: 12_000,
            },
        )
        .await
        .unwrap();

    assert_eq!(snippets[0].path, "render.rs");
    assert_eq!((snippets[0].start_line, snippets[0].end_line), (1, 1));
    assert!(snippets[0].text.starts_with("# Path: render.rs  (lines 1-1)\n```rust\n"));
    assert!(snippets.windows(2).all(|w| w[0].distance <= w[1].distance));

    let paths: HashSet<&str> = snippets.iter().map(|s| s.path.as_str()).collect();
    assert_eq!(paths.len(), snippets.len());
    assert_eq!(snippets.len(), 3);
}

#[tokio::test]
async fn query_respects_context_budget() {
    let dir = tempfile::tempdir().unwrap();
    let layout = new_layout(&dir);
    let provider = MockProvider::default();
    let indexer = CodeIndexer::new(provider.clone(), config(1, 4)).unwrap();
    let files: Vec<SourceFile> = (0..5)
        .map(|i| source(&format!("f{i}.rs"), &format!("fn f{i}() {{ {} }}", "x".repeat(80))))
        .collect();
    indexer.run(&layout, files, false).await.unwrap();

    let generation = open(&layout).await;
    let retriever = Retriever::new(&generation);
    let query = provider.vector_for("fn f0()");

    let all = retriever.retrieve(&query, 5, 100_000).await.unwrap();
    assert_eq!(all.len(), 5);

    let budget = all[0].char_len() + all[1].char_len();
    let trimmed = retriever.retrieve(&query, 5, budget).await.unwrap();
    assert_eq!(trimmed.len(), 2);
    assert_eq!(trimmed[0].id, all[0].id);
    assert_eq!(trimmed[1].id, all[1].id);
    assert!(trimmed.iter().map(|s| s.char_len()).sum::<usize>() <= budget);

    let err = retriever.retrieve(&[1.0, 0.0], 5, budget).await.unwrap_err();
    assert!(matches!(err, IndexError::DimensionMismatch { .. }));
}

#[tokio::test]
async fn query_on_empty_store_returns_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let layout = new_layout(&dir);
    let provider = MockProvider::default();
    CodeIndexer::new(provider.clone(), config(2, 4))
        .unwrap()
        .run(&layout, Vec::<SourceFile>::new(), false)
        .await
        .unwrap();

    let generation = open(&layout).await;
    let snippets = Retriever::new(&generation)
        .retrieve(&provider.vector_for("anything"), 8, 12_000)
        .await
        .unwrap();
    assert!(snippets.is_empty());
}
