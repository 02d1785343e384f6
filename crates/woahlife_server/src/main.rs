//! Journal API server entrypoint.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use woahlife_core::cipher::PayloadCipher;
use woahlife_core::{EnvelopeCipher, IndexSync, DEFAULT_PORT};
use woahlife_server::{config::Config, db::Database, maintenance, serve_router, AppState, SyncWorker};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct CliFlags {
    help: bool,
    rebuild_index: bool,
    encrypt_existing: bool,
    cleanup_entries: bool,
    export_year: Option<i32>,
    list_dead_letters: bool,
    requeue_dead_letters: bool,
    purge_dead_letters: bool,
}

fn parse_year(value: &str) -> anyhow::Result<i32> {
    if value.len() != 4 || !value.bytes().all(|b| b.is_ascii_digit()) {
        anyhow::bail!("Invalid year '{}': expected YYYY", value);
    }
    Ok(value.parse()?)
}

fn parse_cli_flags(args: &[String]) -> anyhow::Result<CliFlags> {
    let mut flags = CliFlags::default();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" => flags.help = true,
            "--rebuild-index" => flags.rebuild_index = true,
            "--encrypt-existing" => flags.encrypt_existing = true,
            "--cleanup-entries" => flags.cleanup_entries = true,
            "--list-dead-letters" => flags.list_dead_letters = true,
            "--requeue-dead-letters" => flags.requeue_dead_letters = true,
            "--purge-dead-letters" => flags.purge_dead_letters = true,
            "--export-year" => {
                let Some(value) = iter.next() else {
                    anyhow::bail!("--export-year requires a year (YYYY)");
                };
                flags.export_year = Some(parse_year(value)?);
            }
            value if value.starts_with("--export-year=") => {
                flags.export_year = Some(parse_year(&value["--export-year=".len()..])?);
            }
            value if value.starts_with('-') => {
                anyhow::bail!(
                    "Unknown option: '{}'. Use --help to see supported options.",
                    value
                );
            }
            value => {
                anyhow::bail!(
                    "Unexpected positional argument: '{}'. Use --help to see supported options.",
                    value
                );
            }
        }
    }
    Ok(flags)
}

fn runs_maintenance_mode(flags: CliFlags) -> bool {
    flags.rebuild_index
        || flags.encrypt_existing
        || flags.cleanup_entries
        || flags.export_year.is_some()
        || flags.list_dead_letters
        || flags.requeue_dead_letters
        || flags.purge_dead_letters
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "woahlife=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let cli_flags = parse_cli_flags(&args)?;

    if cli_flags.help {
        print_help();
        return Ok(());
    }

    let config = Config::from_env();
    let database = Database::open(&config.db_path, config.max_document_bytes)?;

    if runs_maintenance_mode(cli_flags) {
        return run_maintenance(cli_flags, &config, &database);
    }

    let state = AppState::new(config.clone(), database);

    let allow_public = woahlife_server::config::env_flag_enabled("ALLOW_PUBLIC_ACCESS");
    if allow_public {
        tracing::warn!("Public access enabled - server will accept requests from any origin");
    }

    let bind_addr = woahlife_server::resolve_bind_address(&config, allow_public);
    if !bind_addr.ip().is_loopback() {
        tracing::warn!(
            "Binding to non-localhost address: {} - ensure proper security measures are in place",
            bind_addr
        );
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let worker = SyncWorker::from_state(&state).spawn(shutdown_rx);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let actual_addr = listener.local_addr().unwrap_or(bind_addr);
    tracing::info!("woahlife running at http://{}", actual_addr);

    let serve_result = serve_router(listener, state, allow_public, shutdown_signal()).await;

    if shutdown_tx.send(true).is_err() {
        tracing::debug!("Sync worker already stopped");
    }
    if let Err(err) = worker.await {
        tracing::error!("Sync worker panicked: {}", err);
    }

    serve_result?;

    Ok(())
}

fn run_maintenance(flags: CliFlags, config: &Config, database: &Database) -> anyhow::Result<()> {
    let cipher: Arc<dyn PayloadCipher> =
        Arc::new(EnvelopeCipher::from_reference(&config.master_key));

    if flags.list_dead_letters {
        let letters = database.changes.dead_letters(usize::MAX)?;
        for (sequence, letter) in &letters {
            println!(
                "{}\t{}\t{:?}\t{}",
                sequence, letter.event.key, letter.event.kind, letter.reason
            );
        }
        println!("{} dead letter(s)", letters.len());
    }

    if flags.requeue_dead_letters {
        let requeued = maintenance::requeue_dead_letters(&database.entries, &database.changes)?;
        println!("Requeued {} day(s); they sync on the next server start", requeued);
    }

    if flags.purge_dead_letters {
        let purged = database.changes.purge_dead_letters()?;
        println!("Purged {} dead letter(s)", purged);
    }

    if flags.cleanup_entries {
        let cleaned = maintenance::cleanup_entries(&database.entries, cipher.as_ref())?;
        println!("Cleaned {} record(s)", cleaned);
    }

    if flags.encrypt_existing {
        let encrypted =
            maintenance::encrypt_unencrypted_entries(&database.entries, cipher.as_ref())?;
        println!("Encrypted plaintext entries in {} record(s)", encrypted);
    }

    if flags.rebuild_index {
        let pipeline = IndexSync::new(
            Arc::new(database.index.clone()),
            cipher.clone(),
            config.max_document_bytes,
        );
        let report = maintenance::rebuild_index(&database.entries, &pipeline)?;
        println!(
            "Indexed {} day(s); {} too large; {} unreadable entr(ies) skipped",
            report.indexed, report.skipped_too_large, report.skipped_entries
        );
    }

    if let Some(year) = flags.export_year {
        let export = maintenance::export_year(&database.entries, cipher.as_ref(), year)?;
        print!("{}", export);
    }

    Ok(())
}

fn print_help() {
    println!("woahlife server\n");
    println!("Usage: woahlife-server [OPTIONS]\n");
    println!("Options:");
    println!("  --rebuild-index       Re-derive every search document from the journal");
    println!("  --encrypt-existing    Encrypt plaintext entries in place");
    println!("  --cleanup-entries     Fix legacy quoted-printable artifacts in entries");
    println!("  --export-year <YYYY>  Print one year of entries as plain text");
    println!("  --list-dead-letters   Show change events that failed permanently");
    println!("  --requeue-dead-letters  Re-sync dead-lettered days from their current records");
    println!("  --purge-dead-letters  Drop all dead-lettered change events");
    println!("  --help                Show this help message");
    println!("\nEnvironment variables:");
    println!("  DB_PATH               Database path (default: ~/.cache/woahlife/db)");
    println!(
        "  PORT                  Server port (default: {})",
        DEFAULT_PORT
    );
    println!("  MAX_ENTRY_SIZE        Maximum entry size in bytes (default: 1MB)");
    println!("  MAX_DOCUMENT_BYTES    Search document size ceiling (default: 10000)");
    println!("  ENCRYPT_ENTRIES       Encrypt new entries with the master key");
    println!("  MASTER_KEY_FILE       File holding the base64 master key");
    println!("  MASTER_KEY_ENV        Env var holding the base64 master key (default: WOAHLIFE_MASTER_KEY)");
    println!("  SYNC_INTERVAL_MS      Change-log poll interval (default: 1000)");
    println!("  SYNC_BATCH_SIZE       Events per sync pass (default: 64)");
    println!("  IO_TIMEOUT_MS         Bound on each store/index call (default: 5000)");
    println!("  ALLOW_PUBLIC_ACCESS   Allow CORS from any origin");
    println!(
        "  BIND                  Override bind address (e.g. 0.0.0.0:{})",
        DEFAULT_PORT
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
