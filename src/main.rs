mod cli;
mod config;
mod summary;

use std::collections::BTreeSet;

use anyhow::{Context, bail};
use askcode_index::generation::Presence;
use askcode_index::snippet::{format_context, preview};
use askcode_index::walker::SourceWalker;
use askcode_index::{
    CodeIndexer, IndexReport, IndexerConfig, Retriever, StoreGeneration, StoreLayout, StoreLock,
};
use askcode_llm::LlmProvider;
use askcode_llm::ollama::OllamaProvider;
use clap::Parser;

use crate::cli::{AskArgs, Cli, Command, IndexArgs};
use crate::config::{Config, resolve_config_path};

const PREVIEW_LINES: usize = 7;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber(cli.log_level());

    let config_path = resolve_config_path(cli.config.as_deref());
    let mut config = Config::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    match &cli.command {
        Command::Index(args) => run_index(&config, args).await,
        Command::Ask(args) => run_ask(&config, args).await,
        Command::Status => run_status(&config).await,
        Command::Config => print_config(&config),
    }
}

fn init_subscriber(default_level: &str) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

async fn run_index(config: &Config, args: &IndexArgs) -> anyhow::Result<()> {
    if !args.repo.is_dir() {
        bail!("repository root {} is not a directory", args.repo.display());
    }

    let provider = OllamaProvider::new(
        &config.llm.base_url,
        config.llm.generation_model.clone(),
        config.llm.embedding_model.clone(),
    );
    provider
        .health_check()
        .await
        .with_context(|| format!("Ollama is not reachable at {}", config.llm.base_url))?;

    let indexer = CodeIndexer::new(
        provider,
        IndexerConfig {
            chunker: config.chunker.chunker(),
            params: config.store.index_params(),
            save_every: config.store.save_every,
        },
    )?;
    let layout = StoreLayout::new(&config.store.path);
    let walker =
        SourceWalker::new(&args.repo, config.walker.walker()).skipping(layout.footprint());

    tracing::info!(
        repo = %args.repo.display(),
        store = %layout.root().display(),
        model = %config.llm.embedding_model,
        rebuild = args.rebuild,
        "indexing"
    );

    let report = tokio::select! {
        result = indexer.run(&layout, walker.files(), args.rebuild) => {
            result.context("indexing failed")?
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
            bail!("indexing interrupted; files committed so far are kept, re-run to resume");
        }
    };

    print_report(&report, &layout);
    Ok(())
}

fn print_report(report: &IndexReport, layout: &StoreLayout) {
    println!("Indexed into {}", layout.root().display());
    println!("  files scanned:    {}", report.files_scanned);
    println!("  files indexed:    {}", report.files_indexed);
    println!("  chunks created:   {}", report.chunks_created);
    println!("  chunks skipped:   {}", report.chunks_skipped);
    if report.chunks_recovered > 0 {
        println!("  chunks recovered: {}", report.chunks_recovered);
    }
    println!("  duration:         {} ms", report.duration_ms);
}

/// Open the store read-only under a shared lock, with a hint when a rebuild is needed.
async fn open_for_reading(config: &Config) -> anyhow::Result<(StoreLock, StoreGeneration)> {
    let layout = StoreLayout::new(&config.store.path);
    let lock = StoreLock::shared(&layout)?;
    match StoreGeneration::open(layout, config.store.index_params()).await {
        Ok(generation) => Ok((lock, generation)),
        Err(e) if e.requires_rebuild() => {
            Err(e).context("the store is missing or incomplete; run `askcode index --rebuild`")
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_ask(config: &Config, args: &AskArgs) -> anyhow::Result<()> {
    let (_lock, generation) = open_for_reading(config).await?;
    let descriptor = generation.descriptor();

    if descriptor.embedding_model != config.llm.embedding_model {
        tracing::warn!(
            store = %descriptor.embedding_model,
            configured = %config.llm.embedding_model,
            "querying with the model the store was built with"
        );
    }

    let provider = OllamaProvider::new(
        &config.llm.base_url,
        config.llm.generation_model.clone(),
        descriptor.embedding_model.clone(),
    );
    let retrieval = config.retrieval.retrieval();

    println!("Question:        {}", args.question);
    println!("Embed model:     {}", provider.embedding_model());
    if args.summarize {
        println!("Generator model: {}", config.llm.generation_model);
    }
    println!("Top k:           {}", retrieval.k);
    println!();

    let snippets = Retriever::new(&generation)
        .search(&provider, &args.question, &retrieval)
        .await
        .context("retrieval failed")?;

    if snippets.is_empty() {
        println!("No indexed code matched the question.");
        generation.close().await;
        return Ok(());
    }

    for snippet in &snippets {
        println!(
            "{}  lines {}-{}  distance {:.4}",
            snippet.path, snippet.start_line, snippet.end_line, snippet.distance
        );
        for line in preview(&snippet.content, PREVIEW_LINES).lines() {
            println!("    {line}");
        }
        println!();
    }

    let context = format_context(&snippets);

    if args.summarize {
        let summary = provider
            .chat(
                summary::SUMMARY_SYSTEM_PROMPT,
                &summary::summary_prompt(&args.question, &context),
                config.retrieval.chat_options(),
            )
            .await
            .with_context(|| {
                format!("summarizing with {} failed", config.llm.generation_model)
            })?;
        let path = summary::write_summary(
            generation.layout().root(),
            args.task.as_deref(),
            &args.question,
            &summary,
        )?;
        println!("{summary}");
        println!();
        println!("Summary saved to {}", path.display());
    } else {
        println!("{context}");
    }

    generation.close().await;
    Ok(())
}

async fn run_status(config: &Config) -> anyhow::Result<()> {
    let layout = StoreLayout::new(&config.store.path);
    println!("Store: {}", layout.root().display());

    match layout.presence() {
        Presence::Absent => {
            println!("  not created yet; run `askcode index`");
            return Ok(());
        }
        Presence::Incomplete { missing } => {
            println!("  incomplete, missing: {}", missing.join(", "));
            println!("  run `askcode index --rebuild`");
            return Ok(());
        }
        Presence::Complete => {}
    }

    let (_lock, generation) = open_for_reading(config).await?;
    let descriptor = generation.descriptor();
    let store = generation.store();
    let index = generation.index();

    let records = store.count().await?;
    let files = store.indexed_files().await?.len();
    let mut without_point = 0usize;
    for id in store.all_ids().await? {
        if !index.contains(id)? {
            without_point += 1;
        }
    }

    println!("  embedding model: {}", descriptor.embedding_model);
    println!("  dimension:       {}", descriptor.dimension);
    println!("  created at:      {}", descriptor.created_at.to_rfc3339());
    println!("  files:           {files}");
    println!("  records:         {records}");
    println!("  index points:    {}", index.len());
    println!("  index capacity:  {}", index.capacity());
    let orphan_points = index.len().saturating_sub(records - without_point);
    if orphan_points > 0 {
        println!(
            "  alignment:       {orphan_points} point(s) without a record; run `askcode index --rebuild`"
        );
    } else if without_point > 0 {
        println!(
            "  alignment:       {without_point} record(s) without a point; the next `askcode index` run re-embeds them"
        );
    } else {
        println!("  alignment:       ok");
    }

    generation.close().await;
    Ok(())
}

fn print_config(config: &Config) -> anyhow::Result<()> {
    println!("{}", config.to_toml()?);

    let walker = config.walker.walker();
    let include: BTreeSet<String> = walker.include_set().into_iter().collect();
    let exclude: BTreeSet<String> = walker.exclude_set().into_iter().collect();
    println!(
        "# effective include: {}",
        include.into_iter().collect::<Vec<_>>().join(", ")
    );
    println!(
        "# effective exclude: {}",
        exclude.into_iter().collect::<Vec<_>>().join(", ")
    );
    Ok(())
}
