use clap::Parser;
use han2prom::{
    config::ConfigError, ApiManager, ApiState, BroadcastSink, Config, HanManager, MqttManager,
    SinkFanout, StatusBoard, TelegramStore, TelemetrySink,
};
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const FEED_CAPACITY: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "han2prom", version, about = "Prometheus exporter for HAN port serial bridges")]
struct Cli {
    /// Configuration file, defaults to config/han2prom.yaml or han2prom.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial bridge servers in host:port form
    endpoints: Vec<String>,
}

async fn wait_for_signal(shutdown: &CancellationToken) {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!("Unable to listen for SIGTERM: {e}");
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                    _ = shutdown.cancelled() => {}
                }
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = shutdown.cancelled() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
        _ = shutdown.cancelled() => {}
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logging
    let default_filter = std::env::var("H2P_LOG_LEVEL").unwrap_or("info".to_string());
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));

    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };
    config.add_endpoints(cli.endpoints);

    match config.validate() {
        Ok(()) => {}
        Err(ConfigError::NoEndpoints) => {
            println!("Specify the serial bridge server(s) to connect to:\nExample\n\than2prom tasmota-D84B8F-2959:8232");
            std::process::exit(1);
        }
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    }

    let shutdown = CancellationToken::new();
    let store = Arc::new(TelegramStore::new(config.freshness()));
    let feed = BroadcastSink::new(FEED_CAPACITY);
    let status = Arc::new(StatusBoard::new());

    let mut sinks: Vec<Arc<dyn TelemetrySink>> = vec![store.clone(), Arc::new(feed.clone())];

    /* MQTT is optional, the exporter works without a broker */
    let mut mqtt_thread = None;
    if let Some(mqtt_config) = config.mqtt.as_ref() {
        let (mqtt, mqtt_sink) = MqttManager::new(mqtt_config);
        sinks.push(Arc::new(mqtt_sink));
        let token = shutdown.clone();
        mqtt_thread = Some(tokio::spawn(async move {
            mqtt.start_thread(token).await;
        }));
    }

    let sink: Arc<dyn TelemetrySink> = Arc::new(SinkFanout::new(sinks));
    let mut han = HanManager::new(config.connection.settings(), sink, status.clone(), shutdown.clone());
    han.start_clients(&config.endpoints);

    /* Run our api gateway now */
    let mut server_handle = None;
    if config.httpd.enabled {
        let api = ApiManager::new(config.httpd.clone(), ApiState::new(store.clone(), status.clone(), feed.clone()));
        match api.start() {
            Ok(server) => {
                server_handle = Some(server.handle());
                actix_web::rt::spawn(async move {
                    if let Err(e) = server.await {
                        error!("HTTP server failed: {e}");
                    }
                });
            }
            Err(e) => {
                error!("Unable to start HTTP server on port {}: {e}", config.httpd.port);
                shutdown.cancel();
            }
        }
    }

    info!("All modules started, now waiting for a signal to exit");
    wait_for_signal(&shutdown).await;
    shutdown.cancel();

    han.stop_clients(config.shutdown_grace()).await;

    if let Some(handle) = server_handle {
        handle.stop(true).await;
    }

    if let Some(thread) = mqtt_thread {
        if tokio::time::timeout(Duration::from_secs(5), thread).await.is_err() {
            warn!("MQTT thread did not stop in time");
        }
    }

    info!("All good things must come to an end...");
    Ok(())
}
