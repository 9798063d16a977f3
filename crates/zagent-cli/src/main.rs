use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use zagent_cli::GlobalArgs;
use zagent_cli::commands;

#[derive(Parser)]
#[command(name = "zagent")]
#[command(author, version, about, long_about = None)]
#[command(
    about = "Read Zendesk tickets, queues and searches through a Chrome you own",
    long_about = "zagent drives a logged-in Zendesk agent tab over the Chrome DevTools Protocol. \
                  It reuses (or launches) a Chrome with its own profile, asks the Zendesk API \
                  from inside the page first, and falls back to reading the rendered page."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    globals: GlobalArgs,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ticket commands
    #[command(subcommand)]
    Ticket(TicketCommands),

    /// Queue (view) commands
    #[command(subcommand)]
    Queue(QueueCommands),

    /// Search commands
    #[command(subcommand)]
    Search(SearchCommands),

    /// Zendesk sign-in commands
    #[command(subcommand)]
    Auth(AuthCommands),

    /// Run environment diagnostics (config, CDP, and Zendesk auth)
    Doctor,

    /// Generate shell completion scripts
    #[command(after_help = "SUPPORTED SHELLS:\n  \
        bash, zsh, fish, powershell, elvish\n\n\
        INSTALLATION:\n  \
        bash:  zagent completion --shell bash > ~/.local/share/bash-completion/completions/zagent\n         \
        (or source it from ~/.bashrc)\n  \
        zsh:   zagent completion --shell zsh > \"${fpath[1]}/_zagent\"\n         \
        (make sure compinit runs in ~/.zshrc)\n  \
        fish:  zagent completion --shell fish > ~/.config/fish/completions/zagent.fish")]
    Completion {
        /// Shell to generate completions for
        #[arg(long, value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum TicketCommands {
    /// Read a Zendesk ticket by id
    Read {
        /// Ticket id (digits are extracted, e.g. "#123" works)
        #[arg(value_name = "TICKET_ID")]
        ticket_id: String,

        /// Max number of comments to return
        #[arg(long, default_value_t = 10)]
        comments: usize,
    },
}

#[derive(Subcommand)]
enum QueueCommands {
    /// List configured queue aliases from zendesk config
    List {
        /// Filter queues by team
        #[arg(long)]
        team: Option<String>,
    },

    /// Read a queue by name, alias or id (uses the configured default when omitted)
    Read {
        #[arg(value_name = "NAME")]
        name: Option<String>,

        /// Max number of tickets to return (omit for full queue sync)
        #[arg(long)]
        count: Option<usize>,
    },
}

#[derive(Subcommand)]
enum SearchCommands {
    /// Search Zendesk tickets by phrase
    Tickets {
        #[arg(value_name = "QUERY")]
        query: String,

        /// Max number of search hits to return
        #[arg(long, default_value_t = 20)]
        count: usize,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Check CDP reachability, config validity, and Zendesk auth status
    Check,

    /// Open Zendesk and wait for a signed-in session
    Login {
        /// Max seconds to wait for login confirmation
        #[arg(long, default_value_t = 300)]
        timeout: u64,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        let payload = serde_json::json!({ "ok": false, "error": e.to_string() });
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&payload).unwrap_or_else(|_| e.to_string())
        );
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let globals = &cli.globals;
    match cli.command {
        Commands::Ticket(TicketCommands::Read {
            ticket_id,
            comments,
        }) => commands::ticket::read(globals, &ticket_id, comments),
        Commands::Queue(QueueCommands::List { team }) => {
            commands::queue::list(globals, team.as_deref())
        }
        Commands::Queue(QueueCommands::Read { name, count }) => {
            commands::queue::read(globals, name.as_deref(), count)
        }
        Commands::Search(SearchCommands::Tickets { query, count }) => {
            commands::search::tickets(globals, &query, count)
        }
        Commands::Auth(AuthCommands::Check) => commands::auth::check(globals),
        Commands::Auth(AuthCommands::Login { timeout }) => commands::auth::login(globals, timeout),
        Commands::Doctor => commands::doctor::execute(globals),
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            commands::completion::execute(shell, &mut cmd)
        }
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let rust_log = std::env::var("RUST_LOG").ok();
    let directives = zagent_cli::log_directives(verbose, rust_log.as_deref());
    let filter = EnvFilter::try_new(&directives)
        .unwrap_or_else(|_| EnvFilter::new(zagent_cli::log_directives(verbose, None)));

    // stderr keeps stdout clean for --json
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}
