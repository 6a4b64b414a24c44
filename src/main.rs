use clap::Parser;
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Mutex, mpsc};
use std::thread;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod columns;
mod controller;
mod domain;
mod filter;
mod inputter;
mod model;
mod pagination;
mod record;
mod snapshot;
mod sort;
mod store;
mod ui;
mod views;

use controller::{Controller, LoadResult};
use domain::{Message, TVConfig, TVError};
use model::{Model, Status};
use pagination::PageSize;
use record::{CsvProvider, RecordProvider};
use store::{FileStore, KeyValueStore, MemoryStore};
use ui::TableUI;
use views::{KeyScheme, ViewStore};

#[derive(Debug, Parser)]
#[command(version, about = "A tui based carrier data explorer with saved and shareable views.")]
struct Args {
    /// Data file (csv, parquet or arrow)
    #[arg(default_value = "tests/fixtures/carriers.csv")]
    path: PathBuf,

    /// File holding saved and shared views
    #[arg(long, default_value = "~/.local/share/fmcsa-tv/views.json")]
    store: String,

    /// Keep views in memory only
    #[arg(long)]
    ephemeral: bool,

    /// Store named views under their bare name and list every stored key
    #[arg(long)]
    flat_keys: bool,

    /// Base of generated share links
    #[arg(long, default_value = "tv://fmcsa")]
    base_url: String,

    /// Open a share link (url, query string or share id) at startup
    #[arg(long)]
    view: Option<String>,

    /// Rows per page: 5, 10 or 25
    #[arg(long, default_value_t = 10)]
    page_size: usize,

    #[arg(long, default_value = "fmcsa-tv.log")]
    log_file: PathBuf,

    /// Used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Event poll time in ms
    #[arg(long, default_value_t = 100)]
    event_poll_time: u64,

    /// Do not copy generated share links to the clipboard
    #[arg(long)]
    no_clipboard: bool,
}

impl Args {
    fn config(&self) -> Result<TVConfig, TVError> {
        let key_scheme = if self.flat_keys {
            KeyScheme::Flat
        } else {
            KeyScheme::Namespaced
        };
        Ok(TVConfig::default()
            .with_event_poll_time(self.event_poll_time)
            .with_base_url(self.base_url.clone())
            .with_key_scheme(key_scheme)
            .with_page_size(PageSize::try_from(self.page_size)?)
            .with_copy_share_link(!self.no_clipboard))
    }
}

fn init_tracing(args: &Args) -> Result<(), TVError> {
    // The terminal belongs to the ui, logs go to a file.
    let file = File::create(&args.log_file)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_tracing(&args) {
        eprintln!("Error: could not open log file: {e}");
        return ExitCode::FAILURE;
    }
    match run(&args) {
        Err(e) => {
            error!("Exiting with error: {e:?}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn open_store(args: &Args) -> Result<Box<dyn KeyValueStore>, TVError> {
    if args.ephemeral {
        return Ok(Box::new(MemoryStore::new()));
    }
    Ok(Box::new(FileStore::open(&args.store)?))
}

/// Fetch the dataset on its own thread; the controller picks up the result.
fn spawn_loader(provider: impl RecordProvider + 'static) -> mpsc::Receiver<LoadResult> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = provider.load();
        if let Err(e) = &result {
            error!("Error fetching data: {e}");
        }
        // The receiver is gone if the ui quit before loading finished.
        let _ = tx.send(result);
    });
    rx
}

fn run(args: &Args) -> Result<(), TVError> {
    info!("Starting fmcsa-tv with {:?}", args.path);
    let cfg = args.config()?;

    let views = ViewStore::new(open_store(args)?, cfg.key_scheme, &cfg.base_url)
        .with_page_size(cfg.page_size);
    let mut model = Model::init(&cfg, views);
    if let Some(link) = &args.view {
        model.update(Message::OpenShareLink(link.clone()))?;
    }

    let mut controller = Controller::new(&cfg, spawn_loader(CsvProvider::new(&args.path)));
    let mut ui = TableUI::new(&cfg);

    let mut terminal = ratatui::init();
    let result = (|| -> Result<(), TVError> {
        while model.status != Status::QUITTING {
            // Render the current view
            terminal.draw(|f| ui.draw(&model, f))?;

            // Handle events and map to a Message
            if let Some(message) = controller.handle_event(&model)? {
                model.update(message)?;
            };
        }
        Ok(())
    })();
    ratatui::restore();

    if let Some(link) = model.share_link() {
        println!("Last share link: {link}");
    }
    result
}
