use std::sync::Arc;
use std::sync::atomic::Ordering;

use mail_digest::config::DigestConfig;
use mail_digest::dispatch::Dispatcher;
use mail_digest::error::{Error, PipelineError};
use mail_digest::llm::OllamaClient;
use mail_digest::mailbox::ImapMailbox;
use mail_digest::pipeline::DigestPipeline;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // .env is optional; real environment variables win.
    let _ = dotenvy::dotenv();

    let config = DigestConfig::from_env()?;
    tracing::info!(
        imap = %config.imap_host,
        lookback_hours = config.lookback_hours,
        categorise_model = %config.categorise_model,
        summarise_model = %config.summarise_model,
        "Starting digest run"
    );

    let mailbox = Arc::new(ImapMailbox::new(&config));
    let llm = Arc::new(OllamaClient::new(config.ollama_url.clone()));
    let pipeline = DigestPipeline::new(config.clone(), mailbox, llm);

    // Ctrl-C requests cooperative cancellation; the pipeline flushes the
    // checkpoint and stops before its next unit of work.
    let cancel = pipeline.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing current unit then stopping");
            cancel.store(true, Ordering::Relaxed);
        }
    });

    let started = chrono::Utc::now();
    let report = match pipeline.run().await {
        Ok(report) => report,
        Err(Error::Pipeline(PipelineError::Interrupted)) => {
            tracing::warn!("Run interrupted; checkpoint saved, no report sent");
            return Ok(());
        }
        Err(Error::Pipeline(PipelineError::EmptyMailbox)) => {
            tracing::info!("No messages in the lookback window, nothing to report");
            return Ok(());
        }
        Err(e) => {
            tracing::error!(error = %e, "Run halted; resume from the checkpoint with the next run");
            return Err(e.into());
        }
    };

    let dispatcher = Dispatcher::new(&config);
    dispatcher.send(&report)?;

    if config.keep_checkpoint {
        tracing::info!(path = %pipeline.checkpoint().path().display(), "Checkpoint kept for inspection");
    } else {
        pipeline.checkpoint().clear()?;
    }

    tracing::info!(
        elapsed_secs = (chrono::Utc::now() - started).num_seconds(),
        "Digest run complete"
    );
    Ok(())
}
