mod commands;
mod output;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::Result;
use tracing::info;
use warden_core::{SystemClock, Warden, WardenConfig, config};

use crate::output::Output;

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Warden moderation policy operator tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Database file path (overrides config and WARDEN_DB_PATH)
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and apply pending migrations
    Migrate,
    /// Escalation rule management
    Rules {
        #[command(subcommand)]
        cmd: RuleCommands,
    },
    /// Infraction counters
    Infraction {
        #[command(subcommand)]
        cmd: InfractionCommands,
    },
    /// Verification tokens
    Verify {
        #[command(subcommand)]
        cmd: VerifyCommands,
    },
    /// Delete expired verification tokens
    Sweep,
    /// Show database statistics
    Stats,
    /// Print the effective configuration
    Config {
        /// Write it to this path instead of printing
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum RuleCommands {
    /// List all rules
    List,
    /// Create or replace a rule
    Set {
        /// Unique rule name
        name: String,
        /// Count at which the rule applies
        threshold: u64,
        /// warn, mute (or timeout), kick or ban
        action: String,
        /// Duration in seconds (mute and ban only)
        #[arg(long, short = 'd')]
        duration: Option<u64>,
    },
    /// Delete a rule by name
    Remove { name: String },
}

#[derive(Subcommand)]
enum InfractionCommands {
    /// Record an infraction and print the resulting decision
    Record {
        user_id: String,
        /// Infraction kind, used to look up its weight
        #[arg(long, short = 'k', default_value = "manual")]
        kind: String,
        #[arg(long, short = 'r')]
        reason: Option<String>,
        #[arg(long, short = 'm')]
        moderator: Option<String>,
        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a user's count and recent infractions
    Show {
        user_id: String,
        #[arg(long, short = 'n', default_value_t = 10)]
        limit: u32,
    },
    /// Reset a user's count to zero
    Reset { user_id: String },
}

#[derive(Subcommand)]
enum VerifyCommands {
    /// Issue a token for a user
    Issue {
        user_id: String,
        /// Seconds until the token expires (defaults to verification.default_ttl_secs)
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Consume a token
    Complete { token: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .rgb_colors(miette::RgbColors::Preferred)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))?;
    miette::set_panic_hook();
    let cli = Cli::parse();

    init_tracing(cli.debug);

    let mut config = if let Some(config_path) = &cli.config {
        info!("Loading config from: {:?}", config_path);
        config::load_config(config_path).await?
    } else {
        info!("Loading config from standard locations");
        config::load_config_from_standard_locations().await?
    };
    if let Some(db_path) = &cli.db_path {
        config.database.path = db_path.clone();
    }

    let output = Output::new();

    if let Commands::Config { output: path } = &cli.command {
        return commands::config::show(&config, path.as_deref(), &output).await;
    }

    let db = warden_core::open_store(&config).await?;
    let warden = Warden::new(Arc::new(db.clone()), Arc::new(SystemClock), &config);

    let result = run(&cli.command, &warden, &db, &config, &output).await;
    db.close().await;
    result
}

async fn run(
    command: &Commands,
    warden: &Warden,
    db: &warden_core::WardenDb,
    config: &WardenConfig,
    output: &Output,
) -> Result<()> {
    match command {
        Commands::Migrate => {
            db.health_check().await?;
            output.success("Database is up to date");
            output.kv("Path", &config.database.path.display().to_string());
        }
        Commands::Rules { cmd } => match cmd {
            RuleCommands::List => commands::rules::list(warden, output).await?,
            RuleCommands::Set {
                name,
                threshold,
                action,
                duration,
            } => commands::rules::set(warden, name, *threshold, action, *duration, output).await?,
            RuleCommands::Remove { name } => commands::rules::remove(warden, name, output).await?,
        },
        Commands::Infraction { cmd } => match cmd {
            InfractionCommands::Record {
                user_id,
                kind,
                reason,
                moderator,
                json,
            } => {
                commands::infraction::record(
                    warden,
                    user_id,
                    kind,
                    reason.as_deref(),
                    moderator.as_deref(),
                    *json,
                    output,
                )
                .await?
            }
            InfractionCommands::Show { user_id, limit } => {
                commands::infraction::show(warden, user_id, *limit, output).await?
            }
            InfractionCommands::Reset { user_id } => {
                commands::infraction::reset(warden, user_id, output).await?
            }
        },
        Commands::Verify { cmd } => match cmd {
            VerifyCommands::Issue { user_id, ttl } => {
                commands::verify::issue(warden, user_id, *ttl, output).await?
            }
            VerifyCommands::Complete { token } => {
                commands::verify::complete(warden, token, output).await?
            }
        },
        Commands::Sweep => commands::verify::sweep(warden, output).await?,
        Commands::Stats => commands::stats::show(db, config, output).await?,
        Commands::Config { .. } => {}
    }
    Ok(())
}

fn init_tracing(debug: bool) {
    use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    // RUST_LOG wins over the --debug preset when set
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            EnvFilter::new("warden_core=debug,warden_db=debug,warden=debug,sqlx=info,info")
        } else {
            EnvFilter::new("warden_core=info,warden_db=info,warden=info,sqlx=warn,warn")
        }
    });

    let terminal_layer = if debug {
        fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(std::io::stderr)
            .pretty()
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(std::io::stderr)
            .compact()
            .boxed()
    };

    tracing_subscriber::registry()
        .with(terminal_layer.with_filter(env_filter))
        .init();
}
