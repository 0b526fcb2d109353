mod config;
mod email;
mod scheduler;
mod subscribers;
mod web;
mod words;

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::{
    config::EmailConfig,
    email::SmtpMailer,
    scheduler::DailyScheduler,
    web::AppState,
};

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_tracing();

    if let Err(err) = app_main().await {
        error!(?err, "application error");
        std::process::exit(1);
    }
}

async fn app_main() -> Result<()> {
    let state = AppState::new().await?;

    // A misconfigured transport disables the daily emails but never keeps
    // the HTTP service from starting.
    let mut scheduler = match build_mailer() {
        Ok(mailer) => {
            let mut scheduler = DailyScheduler::new(state.clone(), mailer);
            scheduler.start();
            Some(scheduler)
        }
        Err(err) => {
            error!(?err, "email transport unavailable; daily word emails disabled");
            None
        }
    };

    let app = web::router::build_router(state);

    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "listening");

    let listener = TcpListener::bind(addr)
        .await
        .context("failed to bind listener")?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(scheduler) = scheduler.as_mut() {
        scheduler.stop();
    }

    Ok(())
}

fn build_mailer() -> Result<Arc<SmtpMailer>> {
    let config = EmailConfig::from_env()?;
    let mailer = SmtpMailer::new(&config).context("failed to initialize SMTP transport")?;
    Ok(Arc::new(mailer))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(?err, "failed to listen for shutdown signal");
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
