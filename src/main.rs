use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use mc_scan_rs::aggregate::{select, AggregatedResultSet, ResultFilter, SortOrder};
use mc_scan_rs::favorites::Favorites;
use mc_scan_rs::logging::init_logging;
use mc_scan_rs::store;
use mc_scan_rs::types::{CoreKind, ProbeResult, ProbeTarget};

/// mc-scan-rs: manage favorites, scan history and saved results of the server scanner.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "mc-scan-rs",
    version,
    about = "Manage favorites, scan history and saved results of the server scanner.",
    long_about = None
)]
struct Cli {
    /// Favorites file.
    #[arg(long, global = true, default_value = store::FAVORITES_FILE)]
    favorites: PathBuf,

    /// Scan history file.
    #[arg(long, global = true, default_value = store::HISTORY_FILE)]
    history: PathBuf,

    /// Append log lines to this file.
    #[arg(long = "log-file", global = true, default_value = "scanner.log")]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Manage favorite servers.
    Favorites {
        #[command(subcommand)]
        action: FavoritesAction,
    },
    /// Inspect past scans.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Show a saved results file.
    Results {
        #[arg(default_value = store::RESULTS_FILE)]
        file: PathBuf,
        #[command(flatten)]
        view: ViewArgs,
    },
}

#[derive(Debug, Clone, Subcommand)]
enum FavoritesAction {
    List,
    /// Add `host:port`.
    Add {
        target: ProbeTarget,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    Remove {
        target: ProbeTarget,
    },
    Tag {
        target: ProbeTarget,
        tag: String,
    },
    /// Import `host:port` lines from a text file.
    Import {
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Subcommand)]
enum HistoryAction {
    List,
    /// Show the servers found by history entry INDEX.
    Show {
        index: usize,
        #[command(flatten)]
        view: ViewArgs,
    },
}

#[derive(Debug, Clone, Args)]
struct ViewArgs {
    /// Only servers with players online.
    #[arg(long)]
    players: bool,

    /// Only this server core (Vanilla, Paper, Spigot, Forge, Fabric).
    #[arg(long)]
    core: Option<CoreKind>,

    /// Version substring.
    #[arg(long = "game-version")]
    version: Option<String>,

    /// MOTD substring.
    #[arg(long)]
    motd: Option<String>,

    #[arg(long, value_enum, default_value_t = SortArg::None)]
    sort: SortArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    None,
    Ping,
    Players,
}

impl ViewArgs {
    fn filter(&self) -> ResultFilter {
        ResultFilter {
            with_players: self.players,
            core: self.core,
            version: self.version.clone(),
            motd: self.motd.clone(),
        }
    }

    fn order(&self) -> SortOrder {
        match self.sort {
            SortArg::None => SortOrder::None,
            SortArg::Ping => SortOrder::PingAscending,
            SortArg::Players => SortOrder::PlayersDescending,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(Some(cli.log_file.as_path()))?;

    match &cli.command {
        Command::Favorites { action } => run_favorites(&cli, action),
        Command::History { action } => run_history(&cli, action),
        Command::Results { file, view } => {
            let saved = store::load_results(file)?;
            println!("Scanned at {}", saved.scanned_at);
            print_view(saved.results, view);
            Ok(())
        }
    }
}

fn run_favorites(cli: &Cli, action: &FavoritesAction) -> Result<()> {
    let mut favorites = store::load_favorites(&cli.favorites)?;
    let changed = match action {
        FavoritesAction::List => {
            print_favorites(&favorites);
            false
        }
        FavoritesAction::Add { target, tags } => {
            if !favorites.add(target.clone()) {
                println!("{target} is already a favorite");
            }
            for tag in tags {
                favorites.add_tag(target, tag);
            }
            true
        }
        FavoritesAction::Remove { target } => {
            if !favorites.remove(target) {
                bail!("{target} is not a favorite");
            }
            true
        }
        FavoritesAction::Tag { target, tag } => {
            if !favorites.add_tag(target, tag) {
                bail!("cannot tag {target}: not a favorite or empty tag");
            }
            true
        }
        FavoritesAction::Import { file } => {
            let content = fs::read_to_string(file)
                .with_context(|| format!("failed to read import file: {}", file.display()))?;
            let summary = favorites.import_lines(&content);
            for line in &summary.rejected {
                log::warn!("invalid import line: {line}");
                eprintln!("Warning: invalid format: {line}");
            }
            println!("Imported {} servers", summary.added);
            log::info!("imported {} servers from {}", summary.added, file.display());
            summary.added > 0
        }
    };

    if changed {
        store::save_favorites(&cli.favorites, &favorites)?;
    }
    Ok(())
}

fn run_history(cli: &Cli, action: &HistoryAction) -> Result<()> {
    let history = store::load_history(&cli.history)?;
    match action {
        HistoryAction::List => {
            for (i, entry) in history.iter().enumerate() {
                println!(
                    "{i:>3}  {} | {}:{} | {} servers",
                    entry.time, entry.ip, entry.ports, entry.servers
                );
            }
            if history.is_empty() {
                println!("No scans recorded in {}", cli.history.display());
            }
        }
        HistoryAction::Show { index, view } => {
            let entry = history
                .get(*index)
                .with_context(|| format!("no history entry at index {index}"))?;
            println!("{} | {}:{}", entry.time, entry.ip, entry.ports);
            print_view(entry.results.clone(), view);
        }
    }
    Ok(())
}

fn print_favorites(favorites: &Favorites) {
    if favorites.is_empty() {
        println!("No favorite servers");
        return;
    }
    for entry in favorites.iter() {
        let tags: Vec<&str> = entry.tags.iter().map(String::as_str).collect();
        if tags.is_empty() {
            println!("{}", entry.target);
        } else {
            println!("{}  [{}]", entry.target, tags.join(", "));
        }
    }
}

fn print_view(results: Vec<ProbeResult>, view: &ViewArgs) {
    let set = AggregatedResultSet::from_results(results);
    let rows = select(&set, &view.filter(), view.order());
    print_results_table(&rows, set.len());
}

fn print_results_table(rows: &[&ProbeResult], total: usize) {
    const MOTD_MAX: usize = 30;

    let mut addr_w = "address".len();
    let mut version_w = "version".len();
    let mut motd_w = "motd".len();
    for r in rows {
        addr_w = addr_w.max(r.target.to_string().len());
        version_w = version_w.max(r.version.chars().count());
        motd_w = motd_w.max(r.motd.chars().count().min(MOTD_MAX + 3));
    }
    let players_w = "players".len().max(9);
    let ping_w = "ping_ms".len();

    println!("\nServers: {} (of {})", rows.len(), total);
    println!(
        "{:<addr_w$}  {:<motd_w$}  {:<version_w$}  {:>players_w$}  {:>ping_w$}",
        "address", "motd", "version", "players", "ping_ms",
    );
    println!(
        "{:-<addr_w$}  {:-<motd_w$}  {:-<version_w$}  {:-<players_w$}  {:-<ping_w$}",
        "", "", "", "", "",
    );
    for r in rows {
        let mut motd: String = r.motd.replace('\n', " ").chars().take(MOTD_MAX).collect();
        if r.motd.chars().count() > MOTD_MAX {
            motd.push_str("...");
        }
        println!(
            "{:<addr_w$}  {:<motd_w$}  {:<version_w$}  {:>players_w$}  {:>ping_w$.0}",
            r.target.to_string(),
            motd,
            r.version,
            format!("{}/{}", r.players_online, r.players_max),
            r.ping_ms,
        );
    }
}
