use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mailhook::config::Config;
use mailhook::decode::MimeDecoder;
use mailhook::delivery::DeliveryClient;
use mailhook::queue::QueueClient;
use mailhook::worker::{EntryProcessor, Worker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Missing required configuration is fatal — the worker never starts.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    eprintln!("📮 mailhook v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Queue: {} (dlq: {})", config.queue_name, config.dlq_name);
    eprintln!("   Store: {}", config.queue_url);
    eprintln!("   Endpoint: {}", config.endpoint);
    eprintln!(
        "   Retry: {} attempts, base delay {}ms",
        config.max_attempts,
        config.base_delay.as_millis()
    );
    eprintln!(
        "   Attachments: {}, bounces: {}\n",
        if config.include_content {
            "metadata + content"
        } else {
            "metadata only"
        },
        if config.forward_bounces {
            "forwarded"
        } else {
            "skipped"
        },
    );

    // Termination is cooperative: the signal sets a flag, the in-flight
    // message finishes, then the loop exits.
    let draining = Arc::new(AtomicBool::new(false));
    {
        let draining = Arc::clone(&draining);
        tokio::spawn(async move {
            let ctrl_c = tokio::signal::ctrl_c();
            #[cfg(unix)]
            {
                let mut sigterm =
                    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                        .expect("failed to install SIGTERM handler");
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = ctrl_c.await;
            }
            tracing::info!("Termination signal received, draining");
            draining.store(true, Ordering::Relaxed);
        });
    }

    let queue = QueueClient::new(&config.queue_url);
    let delivery = DeliveryClient::new(
        &config.endpoint,
        config.api_key.clone(),
        config.max_attempts,
        config.base_delay,
    );
    let processor = EntryProcessor::new(MimeDecoder::with_default_strategies(), delivery, &config);

    let worker = Worker::new(config, queue, processor, draining);
    worker.run().await?;

    Ok(())
}
