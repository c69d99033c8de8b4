use anyhow::{Context, Result};
use fwconsole::api::UpdaterClient;
use fwconsole::config::AppConfig;
use fwconsole::launcher::UpdateLauncher;
use fwconsole::notify::NotificationChannel;
use fwconsole::poller::StatusPoller;
use fwconsole::presenter::{DisplaySurface, Presenter};
use fwconsole::session::ConsoleSession;
use fwconsole::web::{self, AppState};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = Arc::new(AppConfig::from_env());

    tracing::info!(
        "Starting fwconsole on {} (updater: {})",
        config.http_bind,
        config.updater_url
    );

    let client = UpdaterClient::new(&config.updater_url, config.request_timeout())
        .context("Unable to build updater HTTP client")?;

    let session = Arc::new(ConsoleSession::new(Presenter::bound(
        DisplaySurface::update_page(config.log_panel_lines),
    )));

    let poller = Arc::new(StatusPoller::new(
        Arc::new(client.clone()),
        Arc::clone(&session),
        config.poll_interval(),
    ));
    let launcher = Arc::new(UpdateLauncher::new(
        Arc::new(client.clone()),
        Arc::clone(&session),
    ));

    let notifications = Arc::new(NotificationChannel::new(
        config.notify_url(),
        config.notify_reconnect(),
        Arc::clone(&session),
    ));
    notifications.setup();

    let poll_task = tokio::spawn(Arc::clone(&poller).run());

    let state = AppState {
        config: config.clone(),
        client,
        session,
        poller,
        launcher,
        notifications: Arc::clone(&notifications),
    };

    web::serve(state).await?;

    poll_task.abort();
    notifications.shutdown();
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    let _ = fmt().with_env_filter(env_filter).try_init();
}
