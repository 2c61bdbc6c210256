use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "rcl")]
#[command(about = "Risk & execution control layer operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base first, overrides after)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Load and validate the control document without starting anything
    ConfigCheck {
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Verify the hash chain of a policy audit log
    AuditVerify {
        path: String,
    },

    /// Per-day trade summary for one account
    LedgerSummary {
        #[arg(long)]
        account: String,

        /// Most recent N trading days
        #[arg(long, default_value_t = 7)]
        days: u32,

        /// Ledger URL; falls back to RCL_LEDGER_URL
        #[arg(long)]
        ledger: Option<String>,
    },

    /// Latest broker snapshot recorded for one account
    LedgerSnapshot {
        #[arg(long)]
        account: String,

        #[arg(long)]
        ledger: Option<String>,
    },

    /// Print the persisted policy state file
    PolicyShow {
        #[arg(long)]
        state: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience).
    let _ = dotenvy::from_filename(".env.local");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::ConfigHash { paths } => commands::config::config_hash(&paths),
        Commands::ConfigCheck { paths } => commands::config::config_check(&paths),
        Commands::AuditVerify { path } => commands::audit::audit_verify(&path),
        Commands::LedgerSummary {
            account,
            days,
            ledger,
        } => commands::ledger::ledger_summary(ledger, &account, days).await,
        Commands::LedgerSnapshot { account, ledger } => {
            commands::ledger::ledger_snapshot(ledger, &account).await
        }
        Commands::PolicyShow { state } => commands::policy::policy_show(&state),
    }
}
