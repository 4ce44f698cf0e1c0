use anyhow::Result;
use reflect_rs::app::LoopControl;
use reflect_rs::{ConfigManager, JournalFormatter, ReflectApp};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reflect_rs=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().event_format(JournalFormatter::new()))
        .init();

    info!("🌅 reflect starting up");

    // Load configuration
    let config_manager = ConfigManager::load()?;
    config_manager.start_watching();
    let mut config_rx = config_manager.subscribe();
    let config = config_manager.get();
    info!("✅ Configuration loaded");
    info!("   Prompt model: {}", config.prompt_model);
    info!("   Voice: {}", config.tts_voice);

    // Initialize application
    let mut app = ReflectApp::new(config_manager)?;

    println!("Reflect & Reset - your personal space for daily clarity.");
    println!("Type 'help' for commands.");

    // Set up stdin reader
    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin).lines();

    // Set up signal handling
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Received SIGINT (Ctrl+C)");
        let _ = shutdown_tx.send(());
    });

    // Main loop
    loop {
        tokio::select! {
            line = reader.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        match app.handle_line(&line).await {
                            Ok(LoopControl::Continue) => {}
                            Ok(LoopControl::Quit) => break,
                            Err(e) => {
                                info!("Error: {:#}", e);
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        info!("Error reading input: {}", e);
                        break;
                    }
                }
            }
            result = config_rx.changed() => {
                match result {
                    Ok(()) => {
                        let updated = config_rx.borrow().clone();
                        if let Err(err) = app.apply_config_update(updated) {
                            info!("Failed to apply config update: {}", err);
                        }
                    }
                    Err(_) => {
                        info!("Configuration watcher closed");
                        break;
                    }
                }
            }
            _ = &mut shutdown_rx => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("🛑 Shutting down reflect...");
    info!("✅ Shutdown complete");

    Ok(())
}
