/// Run one delivery sweep per studio and print the JSON reports.
/// For cron hosts that do not call the HTTP trigger, e.g.:
///   * * * * * /app/run-sweep
///
/// Usage: run-sweep [--tenant SLUG] [--batch N]
use clap::Parser;
use serde_json::json;

use shutterbook_notify::{config::Config, db, middleware::tenant::is_valid_slug, Services};

#[derive(Parser)]
#[command(name = "run-sweep", about = "Send due WhatsApp notifications")]
struct Args {
    /// Studio slug (all active studios if not specified)
    #[arg(long)]
    tenant: Option<String>,

    /// Maximum notifications per studio (DELIVERY_BATCH_SIZE by default)
    #[arg(long)]
    batch: Option<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;
    let services = Services::build(pool.clone(), &config)?;

    let studios = match args.tenant {
        Some(slug) if is_valid_slug(&slug) => vec![slug],
        Some(slug) => anyhow::bail!("invalid studio slug '{slug}'"),
        None => db::active_studios(&pool).await?,
    };
    let batch = args.batch.unwrap_or(config.delivery_batch_size);

    for slug in studios {
        let report = match services.worker.process_due(&slug, batch).await {
            Ok(report) => json!({ "tenant": slug, "success": true, "report": report }),
            Err(e) => {
                tracing::warn!("Sweep for '{}' did not run: {}", slug, e);
                json!({ "tenant": slug, "success": false, "error": e.to_string() })
            }
        };
        println!("{report}");
    }

    Ok(())
}
