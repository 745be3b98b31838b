use crate::config::Config;
use crate::data::PgStore;
use crate::ingest::CommandIngestor;
use crate::ranking::FeatherlessClient;
use crate::state::AppState;
use crate::suggestions::SuggestionService;
use crate::utils::fmt_duration;
use crate::web::create_router;
use anyhow::Context;
use sqlx::ConnectOptions;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Slack added on top of the ranking timeout before the HTTP layer gives up on a request.
const REQUEST_TIMEOUT_SLACK: Duration = Duration::from_secs(10);

/// Main application struct containing all necessary components
pub struct App {
    config: Config,
    app_state: AppState,
}

impl App {
    /// Connect to the database, run migrations, and wire the suggestion service.
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        let slow_threshold = Duration::from_millis(500);

        let connect_options = sqlx::postgres::PgConnectOptions::from_str(&config.database_url)
            .context("Failed to parse database URL")?
            .log_statements(tracing::log::LevelFilter::Debug)
            .log_slow_statements(tracing::log::LevelFilter::Warn, Duration::from_secs(1));

        let db_pool = PgPoolOptions::new()
            .min_connections(0)
            .max_connections(4)
            .acquire_slow_threshold(slow_threshold)
            .acquire_timeout(Duration::from_secs(4))
            .idle_timeout(Duration::from_secs(60 * 2))
            .max_lifetime(Duration::from_secs(60 * 30))
            .connect_with(connect_options)
            .await
            .context("Failed to create database pool")?;

        info!(
            min_connections = 0,
            max_connections = 4,
            acquire_timeout = "4s",
            idle_timeout = "2m",
            max_lifetime = "30m",
            acquire_slow_threshold = fmt_duration(slow_threshold),
            "database pool established"
        );

        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("Failed to run database migrations")?;
        info!("Database migrations completed successfully");

        let ranker = FeatherlessClient::new(config.featherless())
            .context("Failed to create ranking client")?;
        let ingestor = CommandIngestor::from_command_line(&config.ingest_command)
            .context("Invalid INGEST_COMMAND")?;

        let settings = config.suggestion_settings();
        info!(
            window_days = settings.window_days,
            event_limit = settings.event_limit,
            model_limit = settings.model_limit,
            cache_ttl = fmt_duration(settings.cache_ttl),
            fallback_retry_after = fmt_duration(settings.fallback_retry_after),
            ranking_timeout = fmt_duration(settings.ranking_timeout),
            ingest_program = ingestor.program(),
            "suggestion settings loaded"
        );

        let suggestions = SuggestionService::new(
            Arc::new(PgStore::new(db_pool.clone())),
            Arc::new(ranker),
            Arc::new(ingestor),
            settings,
        );

        Ok(App {
            config,
            app_state: AppState::new(db_pool, suggestions),
        })
    }

    /// Serve HTTP until a shutdown signal arrives, then drain within the configured timeout.
    pub async fn run(self) -> ExitCode {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(error = %e, %addr, "Failed to bind web server");
                return ExitCode::FAILURE;
            }
        };

        let request_timeout =
            self.app_state.suggestions.settings().ranking_timeout + REQUEST_TIMEOUT_SLACK;
        let router = create_router(self.app_state.clone(), request_timeout);
        let shutdown = CancellationToken::new();

        info!(%addr, request_timeout = fmt_duration(request_timeout), "web server listening");

        let server_token = shutdown.clone();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { server_token.cancelled().await })
                .await
        });

        tokio::select! {
            result = &mut server => {
                return match result {
                    Ok(Ok(())) => ExitCode::SUCCESS,
                    Ok(Err(e)) => {
                        error!(error = %e, "Web server exited unexpectedly");
                        ExitCode::FAILURE
                    }
                    Err(e) => {
                        error!(error = %e, "Web server task panicked");
                        ExitCode::FAILURE
                    }
                };
            }
            _ = shutdown_signal() => {
                info!(
                    timeout = fmt_duration(self.config.shutdown_timeout),
                    "Shutdown signal received, draining connections"
                );
                shutdown.cancel();
            }
        }

        match tokio::time::timeout(self.config.shutdown_timeout, server).await {
            Ok(Ok(Ok(()))) => {
                info!("Graceful shutdown complete");
                ExitCode::SUCCESS
            }
            Ok(Ok(Err(e))) => {
                error!(error = %e, "Web server failed during shutdown");
                ExitCode::FAILURE
            }
            Ok(Err(e)) => {
                error!(error = %e, "Web server task panicked during shutdown");
                ExitCode::FAILURE
            }
            Err(_) => {
                warn!(
                    in_flight = self.app_state.suggestions.generations_in_flight(),
                    "Shutdown timed out, exiting with requests still open"
                );
                ExitCode::FAILURE
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
