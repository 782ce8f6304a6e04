use clap::Parser;
use loginlimit::{BanTarget, LoginLimitBuilder, LoginLimitConfig};
use tracing_subscriber::EnvFilter;

/// Command line interface for loginlimit
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database connection string
    #[arg(long, env = "LOGINLIMIT_DATABASE_URL")]
    db_url: String,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(clap::Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Print version information
    Version,
    /// List all bans, most recently renewed first
    Bans,
    /// Ban an IP address or username
    Ban(TargetArgs),
    /// Remove the ban for an IP address or username
    Unban(TargetArgs),
    /// Delete failed login attempts older than the given age
    Prune {
        /// Minimum age in seconds, must not be shorter than the find-time window
        #[arg(long)]
        older_than_secs: i64,
    },
}

#[derive(clap::Args)]
#[group(required = true, multiple = false)]
struct TargetArgs {
    /// IP address
    #[arg(long)]
    ip: Option<String>,

    /// Username, matched exactly
    #[arg(long)]
    username: Option<String>,
}

impl TargetArgs {
    fn into_target(self) -> Option<BanTarget> {
        match (self.ip, self.username) {
            (Some(ip), _) => Some(BanTarget::Ip(ip)),
            (None, Some(username)) => Some(BanTarget::Username(username)),
            (None, None) => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("loginlimit v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let limiter = LoginLimitBuilder::new()
        .with_sqlite(&cli.db_url)
        .await?
        .with_config(LoginLimitConfig::from_env()?)
        .build()
        .await?;

    match cli.command {
        Commands::Migrate => {
            println!("Running migrations...");
            limiter.migrate().await?;
        }
        Commands::Version => {}
        Commands::Bans => {
            for ban in limiter.list_bans().await? {
                let target = ban
                    .target()
                    .map(|target| target.to_string())
                    .unwrap_or_else(|| "<invalid>".to_string());
                println!(
                    "{}\t{}\tcreated {}\tupdated {}",
                    ban.id,
                    target,
                    ban.created_at.to_rfc3339(),
                    ban.updated_at.to_rfc3339()
                );
            }
        }
        Commands::Ban(args) => {
            let target = args.into_target().ok_or("--ip or --username is required")?;
            let result = limiter.ban(target.clone()).await?;
            if result.is_created() {
                println!("Banned {target}");
            } else {
                println!("Renewed ban for {target}");
            }
        }
        Commands::Unban(args) => {
            let target = args.into_target().ok_or("--ip or --username is required")?;
            if limiter.lift_ban(target.clone()).await? {
                println!("Lifted ban for {target}");
            } else {
                println!("No ban found for {target}");
            }
        }
        Commands::Prune { older_than_secs } => {
            let deleted = limiter
                .prune_attempts(chrono::Duration::seconds(older_than_secs))
                .await?;
            println!("Deleted {deleted} login attempts");
        }
    }

    Ok(())
}
