use clap::Parser;
use clipstash::cli::{Cli, Command};
use clipstash::{client, daemon};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Daemon {
            max_items,
            data_dir,
            sync_quota_bytes,
            local_quota_bytes,
        } => {
            let Some(data_dir) = data_dir.or_else(daemon::default_data_dir) else {
                eprintln!("clipstash daemon: cannot determine data directory, pass --data-dir");
                std::process::exit(1);
            };
            let config = daemon::DaemonConfig {
                data_dir,
                max_items,
                sync_quota_bytes,
                local_quota_bytes,
            };
            if let Err(e) = daemon::run(config).await {
                tracing::error!(error = %e, "daemon failed");
                eprintln!("clipstash daemon: {e}");
                std::process::exit(1);
            }
        }
        Command::Client { action } => {
            if let Err(e) = client::run(action).await {
                tracing::error!(error = %e, "client failed");
                eprintln!("clipstash client: {e}");
                std::process::exit(1);
            }
        }
    }
}
