mod config;
mod constants;
mod display;
mod fallback;
mod feeds;
mod history;
mod models;
mod normalize;
mod seed;
mod stats;
mod storage;
mod suggest;
mod youtube;

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use config::{Config, Settings, parse_key_list, project_dirs};
use display::{OutputFormat, render_records, render_strings};
use feeds::FeedService;
use history::ListKind;
use storage::{FileStorage, MemoryStorage, Storage};

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// Output format
  #[arg(short, long, value_enum, default_value = "table", global = true)]
  format: OutputFormat,

  /// Serve seed data when the catalog can't be reached (overrides YOUTUBE_USE_MOCK)
  #[arg(long, global = true)]
  mock: bool,

  /// Path of the local store file (overrides YPFEED_STORAGE and prefs.toml)
  #[arg(long, global = true)]
  storage: Option<PathBuf>,

  /// Keep caches and lists in memory only
  #[arg(long, global = true, conflicts_with = "storage")]
  ephemeral: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Most popular videos in your region
  Popular,
  /// Live broadcasts
  Live,
  /// Most viewed music videos
  Music,
  /// Most viewed gaming videos
  Gaming,
  /// Home feed
  Home,
  /// Search the catalog
  Search {
    #[arg(required = true)]
    query: Vec<String>,
  },
  /// Autocomplete suggestions for a partial query
  Suggest {
    #[arg(required = true)]
    query: Vec<String>,
  },
  /// Watch history feed
  History,
  /// Recent search queries
  Searches {
    #[arg(long)]
    clear: bool,
  },
  /// Show a saved list
  List {
    #[arg(value_enum)]
    list: ListKind,
  },
  /// Add a video seen in a feed to a saved list
  Save {
    #[arg(value_enum)]
    list: ListKind,
    id: String,
  },
  /// Remove a video from one list, or from all of them
  Unsave {
    id: String,
    #[arg(long, value_enum)]
    list: Option<ListKind>,
  },
  /// Prefetch every category feed
  Warm,
  /// Update prefs.toml
  Config {
    /// Comma-separated catalog API keys
    #[arg(long)]
    keys: Option<String>,
    #[arg(long)]
    region: Option<String>,
    #[arg(long)]
    use_mock: Option<bool>,
  },
  /// Print shell completions
  Completions {
    #[arg(value_enum)]
    shell: clap_complete::Shell,
  },
}

// --- Setup ---

/// Log to a file in the data directory; stdout is for command output.
fn init_tracing() -> Option<WorkerGuard> {
  let log_dir = project_dirs()?.data_dir().join("logs");
  std::fs::create_dir_all(&log_dir).ok()?;
  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(&log_dir, "ypfeed.log"));
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ypfeed=info"));
  tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).init();
  Some(guard)
}

fn open_storage(args: &Args, settings: &Settings) -> Result<Arc<dyn Storage>> {
  if args.ephemeral {
    return Ok(Arc::new(MemoryStorage::new()));
  }
  match args.storage.clone().or_else(|| settings.storage_path.clone()) {
    Some(path) => {
      let storage = FileStorage::open(&path).with_context(|| format!("Failed to open store {}", path.display()))?;
      info!(path = %storage.path().display(), "storage: opened");
      Ok(Arc::new(storage))
    }
    None => {
      warn!("storage: no data directory, keeping everything in memory");
      Ok(Arc::new(MemoryStorage::new()))
    }
  }
}

fn update_config(keys: Option<String>, region: Option<String>, use_mock: Option<bool>) -> Result<()> {
  let mut config = Config::load();
  if let Some(keys) = keys {
    config.api_keys = parse_key_list(&keys);
  }
  if let Some(region) = region {
    config.region_code = Some(region);
  }
  if use_mock.is_some() {
    config.use_mock = use_mock;
  }
  config.save()?;
  println!("Saved {} API key(s).", config.api_keys.len());
  Ok(())
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  let _guard = init_tracing();
  run(args).await
}

async fn run(args: Args) -> Result<()> {
  match args.command {
    Command::Completions { shell } => {
      clap_complete::generate(shell, &mut Args::command(), "ypfeed", &mut std::io::stdout());
      return Ok(());
    }
    Command::Config { ref keys, ref region, use_mock } => {
      return update_config(keys.clone(), region.clone(), use_mock);
    }
    _ => {}
  }

  let mut settings = Settings::load();
  if args.mock {
    settings.use_mock = true;
  }
  if settings.api_keys.is_empty() && !settings.use_mock {
    warn!("config: no API keys configured, feeds will come from caches or seed data");
  }
  let storage = open_storage(&args, &settings)?;
  let feeds = FeedService::new(&settings, storage)?;
  let format = args.format;

  let output = match args.command {
    Command::Popular | Command::Home => render_records(&feeds.popular().await, format)?,
    Command::Live => render_records(&feeds.live().await, format)?,
    Command::Music => render_records(&feeds.music().await, format)?,
    Command::Gaming => render_records(&feeds.gaming().await, format)?,
    Command::Search { query } => {
      let records = feeds.search(&query.join(" ")).await;
      if records.is_empty() && format == OutputFormat::Table {
        "No results found.".to_string()
      } else {
        render_records(&records, format)?
      }
    }
    Command::Suggest { query } => render_strings(&feeds.suggestions(&query.join(" ")).await, format)?,
    Command::History => render_records(&feeds.history_videos().await, format)?,
    Command::Searches { clear } => {
      if clear {
        feeds.search_history().clear()?;
        "Search history cleared.".to_string()
      } else {
        render_strings(&feeds.search_history().entries(), format)?
      }
    }
    Command::List { list } => render_records(&feeds.collections().list(list), format)?,
    Command::Save { list, id } => {
      let Some(record) = feeds.find_record(&id) else {
        bail!("Video {} not found in any cached feed", id);
      };
      if feeds.collections().add(list, record)? { format!("Saved {}.", id) } else { format!("{} is already saved.", id) }
    }
    Command::Unsave { id, list } => {
      let removed = match list {
        Some(list) => usize::from(feeds.collections().remove(list, &id)?),
        None => feeds.collections().remove_everywhere(&id)?,
      };
      format!("Removed {} from {} list(s).", id, removed)
    }
    Command::Warm => {
      let counts = feeds.warm().await;
      counts.iter().map(|(category, n)| format!("{:<8} {}", category, n)).collect::<Vec<_>>().join("\n")
    }
    Command::Config { .. } | Command::Completions { .. } => return Ok(()),
  };

  println!("{}", output);
  Ok(())
}
