use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};

use notevibes::{cli, config, error};

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
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the Spotify link HTTP service
    Serve,

    /// Connect a user's Spotify account through the browser
    Connect(UserOptions),

    /// Show whether a user is connected (refreshes an expired token)
    Status(UserOptions),

    /// Delete a user's Spotify credential
    Disconnect(UserOptions),

    /// Show recent playback history
    History(HistoryOptions),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct UserOptions {
    /// Notes-app user id (defaults to NOTEVIBES_LOCAL_USER)
    #[clap(long)]
    pub user: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct HistoryOptions {
    /// Notes-app user id (defaults to NOTEVIBES_LOCAL_USER)
    #[clap(long)]
    pub user: Option<String>,

    /// Number of entries to show
    #[clap(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Command::Completions(opt) = &cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(opt.shell, &mut cmd, name, &mut std::io::stdout());
        return;
    }

    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    let config = match config::Config::from_env() {
        Ok(config) => config,
        Err(e) => error!("{}", e),
    };

    match cli.command {
        Command::Serve => {
            cli::init_tracing("info");
            cli::serve(config).await
        }
        Command::Connect(opt) => {
            cli::init_tracing("warn");
            cli::connect(config, opt.user).await
        }
        Command::Status(opt) => cli::status(config, opt.user).await,
        Command::Disconnect(opt) => cli::disconnect(config, opt.user).await,
        Command::History(opt) => cli::history(config, opt.user, opt.limit).await,
        Command::Completions(_) => {}
    }
}
