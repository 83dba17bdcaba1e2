//! Operator-facing CLI for database migrations and task-generation queue
//! inspection.

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "wms")]
#[command(about = "Warehouse task-lifecycle engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },
    /// Task-generation queue commands
    Queue {
        #[command(subcommand)]
        cmd: QueueCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    /// Connectivity and schema presence check
    Status,
    /// Apply pending migrations
    Migrate,
}

#[derive(Subcommand)]
enum QueueCmd {
    /// Print job counts grouped by status
    Status,
    /// Reset a job back to pending, ready for immediate reclaim
    Requeue {
        /// The queue job id (equal to the order event's eventKey)
        job_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = wms_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = wms_db::status(&pool).await?;
                    println!("db_ok={} has_tasks_table={}", s.ok, s.has_tasks_table);
                }
                DbCmd::Migrate => {
                    wms_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::Queue { cmd } => {
            let pool = wms_db::connect_from_env().await?;
            match cmd {
                QueueCmd::Status => {
                    let counts = wms_db::generation::queue_status_counts(&pool).await?;
                    if counts.is_empty() {
                        println!("queue is empty");
                    }
                    for (status, count) in counts {
                        println!("{status}={count}");
                    }
                }
                QueueCmd::Requeue { job_id } => {
                    wms_db::generation::requeue(&pool, &job_id).await?;
                    println!("requeued job_id={job_id}");
                }
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
