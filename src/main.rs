use std::io::{self, Write};

use anyhow::Result;
use clap::Parser;
use framework_vectorizer::controls::{Options, SearchArgs};
use framework_vectorizer::{
    report, search, upload_all_with_progress, Cli, Command, Embedder, VectorStore,
};
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = &cli.options;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command() {
        Command::Schema { dimensions } => {
            write!(out, "{}", options.schema_plan(dimensions)?.script())?;
        }
        Command::Upload => {
            let embedder = options.build_embedder()?;
            let store = options.build_store()?;
            run_upload(&mut out, options, &*embedder, &*store)?;
        }
        Command::Search => {
            let embedder = options.build_embedder()?;
            let store = options.build_store()?;
            run_search(&mut out, options, &cli.search, &*embedder, &*store)?;
        }
        Command::Run => {
            let embedder = options.build_embedder()?;
            let store = options.build_store()?;
            run_upload(&mut out, options, &*embedder, &*store)?;
            run_search(&mut out, options, &cli.search, &*embedder, &*store)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run_upload<W: Write>(
    out: &mut W,
    options: &Options,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
) -> Result<()> {
    let corpus = options.load_corpus()?;
    let stamp = options.stamp();
    report::render_banner(out, &stamp, embedder.model())?;
    report::render_upload_start(out, corpus.len())?;
    out.flush()?;

    let mut progress: io::Result<()> = Ok(());
    let upload = upload_all_with_progress(&corpus, &stamp, embedder, store, |index, total, outcome| {
        if progress.is_ok() {
            progress = report::render_outcome(out, index, total, outcome)
                .and_then(|()| out.flush());
        }
    });
    progress?;

    report::render_upload_summary(out, &upload, &stamp)?;
    Ok(())
}

fn run_search<W: Write>(
    out: &mut W,
    options: &Options,
    args: &SearchArgs,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
) -> Result<()> {
    let controls = args.controls()?;
    match search(&args.query, &controls, embedder, store) {
        Ok(matches) => report::render_matches(out, &args.query, &matches)?,
        Err(err) => {
            error!(query = %args.query, error = %format!("{err:#}"), "search probe failed");
            report::render_search_failure(out, &err, &options.match_function)?;
        }
    }
    Ok(())
}
