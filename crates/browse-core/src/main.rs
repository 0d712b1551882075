use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use browse_core::client::LibraryClient;
use browse_core::core::{BrowseCore, CoreEvent};
use browse_core::jellyfin::JellyfinClient;
use browse_core::sort::{default_order, SortSpec};
use browse_core::surface::{ChannelSurface, SurfaceEvent};
use browse_proto::config::Config;
use browse_proto::protocol::{SortField, SortOrder};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::{broadcast, mpsc};

#[derive(Parser, Debug)]
#[command(name = "mediabrowse")]
#[command(about = "Browse a Jellyfin library: probe item variants or stream a playlist")]
struct Cli {
    /// Config file (defaults to the per-user config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show one item and refresh the stream info of all its versions
    Item { id: String },
    /// List a playlist or folder progressively
    Playlist {
        id: String,
        #[arg(long, value_enum)]
        sort: Option<SortArg>,
        #[arg(long, value_enum)]
        order: Option<OrderArg>,
        /// Extra pages to request after the list settles
        #[arg(long, default_value_t = 0)]
        pages: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    Name,
    Added,
    Premiere,
    Rating,
    Aired,
}

impl From<SortArg> for SortField {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Name => SortField::SortName,
            SortArg::Added => SortField::DateCreated,
            SortArg::Premiere => SortField::PremiereDate,
            SortArg::Rating => SortField::CriticRating,
            SortArg::Aired => SortField::AiredEpisodeOrder,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OrderArg {
    Asc,
    Desc,
}

impl From<OrderArg> for SortOrder {
    fn from(arg: OrderArg) -> Self {
        match arg {
            OrderArg::Asc => SortOrder::Ascending,
            OrderArg::Desc => SortOrder::Descending,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let data_dir = browse_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = browse_proto::platform::log_path();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Allow RUST_LOG override; default to debug for app code but suppress noisy
    // connection-level DEBUG from HTTP client internals (hyper_util, reqwest).
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("mediabrowse log: {}", log_path.display());
    tracing::info!("mediabrowse starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => Config::load().unwrap_or_default(),
    };
    let client: Arc<dyn LibraryClient> = Arc::new(
        JellyfinClient::new(&config.server).context("building library client")?,
    );
    // Upper bound for any single wait below.
    let patience = Duration::from_secs(config.server.request_timeout_secs * 2 + 5);

    // ── Surface (BrowseCore → printer) ───────────────────────────────────────
    let surface = Arc::new(ChannelSurface::new(1024));
    let mut surface_rx = surface.subscribe();

    // ── CoreEvent channel (CLI/tasks → BrowseCore) ───────────────────────────
    let (event_tx, event_rx) = mpsc::channel::<CoreEvent>(1024);
    let core = BrowseCore::new(&config, client, surface.clone(), event_tx.clone());
    let core_task = tokio::spawn(async move {
        if let Err(e) = core.run(event_rx).await {
            tracing::error!("BrowseCore exited with error: {}", e);
        }
    });

    match cli.command {
        Command::Item { id } => {
            event_tx.send(CoreEvent::OpenItem(id)).await?;
            let shown = wait_until_idle(&mut surface_rx, patience).await;
            if shown == 0 {
                eprintln!("nothing received; see the log for details");
            }
        }
        Command::Playlist {
            id,
            sort,
            order,
            pages,
        } => {
            let sort = sort.map(|field| {
                let field = SortField::from(field);
                let order = order.map(SortOrder::from).unwrap_or(default_order(field));
                SortSpec::new(field, order)
            });
            let sort = match (sort, order) {
                (None, Some(order)) => {
                    let mut spec = SortSpec::from(&config.browse);
                    spec.order = order.into();
                    Some(spec)
                }
                (sort, _) => sort,
            };
            event_tx
                .send(CoreEvent::OpenPlaylist {
                    container_id: id,
                    sort,
                })
                .await?;
            wait_until_idle(&mut surface_rx, patience).await;

            let debounce = Duration::from_millis(config.loader.debounce_ms);
            for page in 0..pages {
                tokio::time::sleep(debounce).await;
                event_tx.send(CoreEvent::ScrolledToBottom).await?;
                if wait_until_idle(&mut surface_rx, patience).await == 0 {
                    println!("-- no more entries after page {}", page);
                    break;
                }
            }
        }
    }

    event_tx.send(CoreEvent::ViewClosed).await?;
    event_tx.send(CoreEvent::Shutdown).await?;
    core_task.await?;
    Ok(())
}

/// Print surface events until the busy indicator drops back to hidden.
/// Returns how many item/entry events were printed.
async fn wait_until_idle(rx: &mut broadcast::Receiver<SurfaceEvent>, patience: Duration) -> usize {
    let mut printed = 0;
    let mut seen_busy = false;
    loop {
        // Until something starts, a short wait is enough to tell "nothing to do".
        let wait = if seen_busy {
            patience
        } else {
            Duration::from_secs(1)
        };
        let evt = match tokio::time::timeout(wait, rx.recv()).await {
            Err(_) => {
                tracing::debug!("surface: wait timed out (busy seen: {})", seen_busy);
                return printed;
            }
            Ok(Err(broadcast::error::RecvError::Lagged(n))) => {
                tracing::warn!("surface: printer lagged by {} events", n);
                continue;
            }
            Ok(Err(broadcast::error::RecvError::Closed)) => return printed,
            Ok(Ok(evt)) => evt,
        };
        match evt {
            SurfaceEvent::BusyVisible(true) => seen_busy = true,
            SurfaceEvent::BusyVisible(false) => return printed,
            SurfaceEvent::ItemUpdated(item) => {
                printed += 1;
                println!("{} ({:?})", item.name, item.kind);
                for variant in &item.media_sources {
                    println!("  [{}] {}", variant.id, variant.summary());
                }
            }
            SurfaceEvent::EntriesRevealed {
                start_index,
                entries,
            } => {
                printed += entries.len();
                for (offset, entry) in entries.iter().enumerate() {
                    println!("{:>5}  {}", start_index + offset, entry.name);
                }
            }
        }
    }
}
