mod api;
mod backend;
mod config;
mod controller;
mod store;
mod thread;
mod types;
mod ui;
mod vote;

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::backend::FileBackend;
use crate::config::Config;
use crate::controller::ThreadController;
use crate::types::SortMode;
use crate::ui::App;

const LOGO: &str = r#"
  会話
  kaiwa
"#;

/// Set to a filter (e.g. `debug`) to write a log file next to the config
const LOG_ENV: &str = "KAIWA_LOG";

#[derive(Parser)]
#[command(name = "kaiwa")]
#[command(about = "A fast TUI for reading threaded comment discussions")]
#[command(version)]
struct Args {
    /// Discussion file (JSON with id, title and comments)
    file: PathBuf,

    /// Initial sort: best, new, top or controversial
    #[arg(short, long)]
    sort: Option<SortMode>,

    /// Root comments per page (0 loads everything at once)
    #[arg(long)]
    page_size: Option<usize>,

    /// Print the thread to stdout instead of starting the viewer
    #[arg(long)]
    print: bool,
}

/// Install the file logger when `KAIWA_LOG` is set; the TUI owns stdout
fn init_logging() -> Result<()> {
    let Ok(filter) = std::env::var(LOG_ENV) else {
        return Ok(());
    };
    let Some(dir) = Config::config_dir() else {
        return Ok(());
    };

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join("kaiwa.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn print_thread(controller: &ThreadController<FileBackend>, title: &str) -> Result<()> {
    let width = crossterm::terminal::size()
        .map(|(w, _)| w as usize)
        .unwrap_or(100);
    let rows = controller.flat_list();
    let status = controller.status();

    let mut out = io::stdout().lock();
    writeln!(out, "{} ({} comments, sorted by {})", title, status.comment_count, status.sort)?;
    writeln!(out)?;
    for line in ui::render::plain_lines(&rows, width, Utc::now()) {
        writeln!(out, "{}", line)?;
    }
    if status.has_more {
        writeln!(out)?;
        writeln!(
            out,
            "... {} more threads (use --page-size 0 to print everything)",
            status
                .total_root_count
                .saturating_sub(rows.iter().filter(|r| r.item.depth == 0).count())
        )?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging()?;

    let config = Config::load();
    let sort = args.sort.unwrap_or_else(|| config.default_sort());
    let page_size = args.page_size.unwrap_or(config.backend.page_size);

    let backend = FileBackend::open(&args.file, page_size)
        .await?
        .with_author(config.backend.author.clone());
    let thread_id = backend.thread_id().to_string();
    let title = if backend.title().is_empty() {
        thread_id.clone()
    } else {
        backend.title().to_string()
    };

    let controller = ThreadController::new(Arc::new(backend), &thread_id, sort);

    if args.print {
        controller.refetch().await?;
        return print_thread(&controller, &title);
    }

    eprintln!("{}", LOGO);

    let runtime = tokio::runtime::Handle::current();
    let mut app = App::new(controller, title, config, runtime);
    tokio::task::block_in_place(|| app.run())
}
