use std::path::PathBuf;

use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};

use myspotbackup::{cli, config, error};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the login server
    Serve,

    /// Authorize with Spotify API and cache the token
    Auth,

    /// Back up playlists and saved tracks to a JSON file
    Export(ExportOptions),

    /// Restore a backup file into the account
    Import(ImportOptions),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct ExportOptions {
    /// Output file (defaults to spotify_backup_<date>.json)
    #[clap(long, short)]
    output: Option<PathBuf>,

    /// Access token to use instead of the cached one
    #[clap(long)]
    token: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ImportOptions {
    /// Backup file to import
    file: PathBuf,

    /// Print the plan without changing anything
    #[clap(long)]
    dry_run: bool,

    /// Access token to use instead of the cached one
    #[clap(long)]
    token: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

#[tokio::main]
async fn main() {
    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    let cli = Cli::parse();

    if let Command::Completions(opt) = &cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(opt.shell, &mut cmd, name, &mut std::io::stdout());
        return;
    }

    let config = match config::Config::from_env() {
        Ok(config) => config,
        Err(e) => error!("Invalid configuration: {}", e),
    };

    match cli.command {
        Command::Serve => cli::serve(config).await,
        Command::Auth => cli::auth(config).await,
        Command::Export(opt) => cli::export(config, opt.output, opt.token).await,
        Command::Import(opt) => cli::import(config, opt.file, opt.dry_run, opt.token).await,
        Command::Completions(_) => {}
    }
}
