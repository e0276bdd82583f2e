//! `gridview` - page, sort and filter tabular data from the terminal
//!
//! ```text
//! gridview --rows people.json --sort name:desc --filter smith -i --page 2
//! gridview --url https://example.test/rows --config view.toml --json
//! ```

mod input;
mod logging;
mod render;

use std::path::PathBuf;
#[cfg(feature = "http")]
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use gridview_engine::{
    FilterPattern, FilterPredicate, SortDirection, ViewConfig, ViewEngine, ViewEvent,
};
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Parser, Debug)]
#[command(name = "gridview", version, about = "Page, sort and filter tabular data")]
struct Cli {
    /// JSON file holding the rows (array of arrays or of objects)
    #[arg(long, conflicts_with = "url")]
    rows: Option<PathBuf>,

    /// Endpoint serving rows as {"rows": [...], "total_rows": n}
    #[arg(long, env = "GRIDVIEW_URL")]
    url: Option<String>,

    /// View configuration (TOML)
    #[arg(long, env = "GRIDVIEW_CONFIG")]
    config: Option<PathBuf>,

    /// Sort column, by name or 1-based number, with optional `:asc`/`:desc`
    #[arg(long)]
    sort: Option<String>,

    /// Filter pattern; `/regex/flags` for regular expressions. Repeatable.
    #[arg(long = "filter")]
    filters: Vec<String>,

    /// Restrict filters to one column (1-based)
    #[arg(long)]
    column: Option<usize>,

    /// Keep the rows the filters do not match
    #[arg(long)]
    inverse: bool,

    /// Match filters case-insensitively
    #[arg(short = 'i', long)]
    ignore_case: bool,

    /// Page to show (1-based, clamped)
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    page: i64,

    /// Rows per page
    #[arg(long)]
    page_size: Option<usize>,

    /// Print the page as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Also write JSON logs to the data directory
    #[arg(long)]
    log_file: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let logging_config = match (cli.log_file, cli.verbose) {
        (true, 0) => logging::LoggingConfig::production(),
        (log_file, verbose) => logging::LoggingConfig::for_verbosity(verbose).with_json_logs(log_file),
    };
    logging::init(logging_config)?;
    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => ViewConfig::load(path)
            .with_context(|| format!("Failed to load view config {}", path.display()))?,
        None => ViewConfig::default(),
    };
    if let Some(page_size) = cli.page_size {
        config = config.with_page_size(page_size);
    }

    let mut view = match (&cli.rows, &cli.url) {
        (Some(path), _) => {
            let loaded = input::load_rows(path)?;
            if config.columns.is_empty() {
                config = config.with_columns(loaded.column_specs());
            }
            ViewEngine::from_rows(config, loaded.rows)
        }
        (None, Some(url)) => remote_view(config, url)?,
        (None, None) => bail!("Either --rows or --url is required"),
    };
    let mut events = view.subscribe();

    view.load();
    settle(&mut view, &mut events).await?;

    for pattern in &cli.filters {
        let pattern = FilterPattern::parse(pattern)
            .with_context(|| format!("Invalid filter pattern {pattern}"))?;
        let predicate = FilterPredicate::new(pattern)
            .case_insensitive(cli.ignore_case)
            .column(cli.column.map(|c| c.saturating_sub(1)))
            .inverse(cli.inverse);
        let outcome = view.filter_rows(predicate);
        tracing::info!(
            filtered = outcome.filtered_rows.len(),
            remaining = outcome.remaining_rows.len(),
            "filter applied"
        );
    }

    if let Some(sort) = &cli.sort {
        let (column, direction) = parse_sort(sort, view.config())?;
        view.sort(column, direction);
        settle(&mut view, &mut events).await?;
    }

    view.goto_page(cli.page);
    settle(&mut view, &mut events).await?;

    let output = if cli.json {
        render::render_json(&view)?
    } else {
        render::render_table(&view)
    };
    println!("{output}");
    Ok(())
}

#[cfg(feature = "http")]
fn remote_view(mut config: ViewConfig, url: &str) -> Result<ViewEngine> {
    if !config.server_paging && !config.server_sort {
        config.load_all_on_init = true;
    }
    let source = gridview_engine::HttpDataSource::new(url);
    Ok(ViewEngine::new(config, gridview_core::MemoryRowStore::new()).with_remote(Arc::new(source)))
}

#[cfg(not(feature = "http"))]
fn remote_view(_config: ViewConfig, _url: &str) -> Result<ViewEngine> {
    bail!("gridview was built without the `http` feature")
}

/// Run scheduled work to completion and surface failed fetches
async fn settle(view: &mut ViewEngine, events: &mut UnboundedReceiver<ViewEvent>) -> Result<()> {
    view.run_until_idle().await;
    while let Ok(event) = events.try_recv() {
        if let ViewEvent::FetchFailed {
            key,
            status,
            message,
        } = event
        {
            match status {
                Some(status) => bail!("Fetching {key} failed with status {status}: {message}"),
                None => bail!("Fetching {key} failed: {message}"),
            }
        }
    }
    Ok(())
}

/// `name`, `3`, `name:desc` or `3:asc` to a 1-based column and direction
fn parse_sort(input: &str, config: &ViewConfig) -> Result<(usize, Option<SortDirection>)> {
    let (column, direction) = match input.rsplit_once(':') {
        Some((column, direction)) => {
            let direction = SortDirection::parse(direction)
                .with_context(|| format!("Unknown sort direction {direction:?}"))?;
            (column, Some(direction))
        }
        None => (input, None),
    };

    let by_name = config
        .columns
        .iter()
        .find(|spec| spec.name.as_deref() == Some(column))
        .map(|spec| spec.index + 1);
    match by_name.or_else(|| column.parse().ok()) {
        Some(number) => Ok((number, direction)),
        None => bail!("Unknown sort column {column:?}"),
    }
}
