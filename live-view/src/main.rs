use live_view::config::Config;
use live_view::{app, AppState};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "invalid configuration");
            std::process::exit(2);
        }
    };

    let state = AppState::from_config(&config).await;
    let poller = state.start_polling(config.poll_interval);

    info!(
        addr = %config.bind_addr,
        upstream = %config.upstream_url,
        "starting live view"
    );
    axum::serve(
        tokio::net::TcpListener::bind(&config.bind_addr)
            .await
            .expect("bind"),
        app(state.clone()),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
    .expect("server error");

    poller.stop();
    state.shutdown().await;
    info!("live view stopped");
}
