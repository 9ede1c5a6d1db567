//! Registration bot
//!
//! Walks chat users through a short registration form, collects proof of
//! payment and hands the result to a human operator.

mod api;
mod config;
mod messages;
mod runtime;
mod state_machine;
mod telegram;

use api::create_router;
use config::BotConfig;
use runtime::{Dispatcher, InMemorySessionStore};
use std::net::SocketAddr;
use std::sync::Arc;
use telegram::{Poller, TelegramClient, TelegramOperatorNotifier};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "registration_bot=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = BotConfig::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
    })?;

    tracing::info!(
        fields = ?config.context.schema.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
        proof_text_policy = ?config.context.proof_text_policy,
        "Registration form loaded"
    );
    if config.admin_chat.is_none() {
        tracing::warn!("ADMIN_ID is not set; completed registrations will not reach an operator");
    }
    let unset = config.context.texts.unset_payment_details();
    if !unset.is_empty() {
        tracing::warn!(
            ?unset,
            "Payment copy still holds placeholders; set DEPOSIT_AMOUNT, PAYMENT_DETAILS, PAYMENT_RECIPIENT and OFFER_LINK"
        );
    }

    let client = Arc::new(TelegramClient::new(&config.api_url, &config.token)?);
    telegram::prepare(&client).await.inspect_err(|e| {
        tracing::error!(error = %e, "Failed to prepare bot");
    })?;

    let notifier = Arc::new(TelegramOperatorNotifier::new(
        client.clone(),
        config.admin_chat,
        config.context.texts.clone(),
    ));
    let start_label = config.context.texts.start_button.clone();
    let dispatcher = Arc::new(Dispatcher::new(
        config.context,
        Arc::new(InMemorySessionStore::new()),
        client.clone(),
        notifier,
    ));

    let shutdown = CancellationToken::new();
    if let Some(max_idle) = config.session_idle_timeout {
        tracing::info!(max_idle_secs = max_idle.as_secs(), "Idle session eviction enabled");
        dispatcher.spawn_sweeper(max_idle, shutdown.clone());
    }

    let poller = tokio::spawn(Poller::new(client, dispatcher, start_label).run(shutdown.clone()));
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    // Start liveness server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Liveness server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server_shutdown = shutdown.clone();
    axum::serve(listener, create_router())
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await?;

    // The server can also stop on its own; take the poller down with it
    shutdown.cancel();
    poller.await?;
    tracing::info!("Shut down");

    Ok(())
}

async fn shutdown_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("Shutdown requested");
    shutdown.cancel();
}
