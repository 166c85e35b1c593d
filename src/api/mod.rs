use actix_web::{dev::Server, web, App, HttpRequest, HttpResponse, HttpServer, Responder};
use log::{debug, error, info, warn};
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::HttpdConfig;
use crate::metering_han::{EndpointHealth, StatusBoard};
use crate::obis_utils::get_obis_description;
use crate::sink::{BroadcastSink, TelegramStore};
use crate::get_unix_ts;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
    #[error("Metrics are not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Everything the handlers need, shared between all workers
pub struct ApiState {
    pub store: Arc<TelegramStore>,
    pub status: Arc<StatusBoard>,
    pub feed: BroadcastSink,
    pub start_time: Instant,
}

impl ApiState {
    pub fn new(store: Arc<TelegramStore>, status: Arc<StatusBoard>, feed: BroadcastSink) -> Self {
        return ApiState { store, status, feed, start_time: Instant::now() };
    }
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub timestamp: u64,
    pub meters: usize,
    pub endpoints: Vec<EndpointHealth>,
}

#[derive(Serialize, ToSchema)]
pub struct MeasurementView {
    pub obis_code: String,
    pub value: f64,
    pub unit: String,
    pub description: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct TelegramView {
    pub identity: String,
    /// RFC 3339 receive time
    pub received_at: String,
    pub measurements: Vec<MeasurementView>,
}

/// Renders the fresh telegrams in the Prometheus text format
pub fn render_metrics(store: &TelegramStore) -> Result<String, ApiError> {
    let registry = Registry::new();
    let obis = GaugeVec::new(
        Opts::new("OBIS", "Latest value reported by the meter").namespace("hanporten"),
        &["ident", "obis", "unit"],
    )?;
    registry.register(Box::new(obis.clone()))?;

    for stored in store.fresh() {
        let ident = stored.telegram.identity.as_str();
        for m in stored.telegram.measurements.iter() {
            obis.with_label_values(&[ident, m.obis_code.as_str(), m.unit.as_str()]).set(m.value);
        }
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[utoipa::path(get,
    path = "/metrics",
    summary = "Current meter values in prometheus format",
    responses(
        (status = 200, description = "One hanporten_OBIS gauge per value of every fresh telegram"),
        (status = 500, description = "Metrics could not be rendered")
    ),
)]
async fn metrics(state: web::Data<ApiState>) -> impl Responder {
    match render_metrics(&state.store) {
        Ok(body) => HttpResponse::Ok().content_type(prometheus::TEXT_FORMAT).body(body),
        Err(e) => {
            error!("Unable to render metrics: {e}");
            HttpResponse::InternalServerError().body(e.to_string())
        }
    }
}

#[utoipa::path(get,
    path = "/health",
    summary = "Health check endpoint for container monitoring",
    responses(
        (status = 200, description = "At least one bridge is connected", body = HealthResponse),
        (status = 503, description = "No bridge is connected", body = HealthResponse)
    ),
)]
async fn health_check(state: web::Data<ApiState>) -> impl Responder {
    let endpoints = state.status.snapshot();
    let healthy = endpoints.iter().any(|e| e.state == "connected");

    let response = HealthResponse {
        status: if healthy { "healthy".to_string() } else { "unhealthy".to_string() },
        uptime_seconds: state.start_time.elapsed().as_secs(),
        timestamp: get_unix_ts(),
        meters: state.store.len(),
        endpoints,
    };

    if healthy {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

#[utoipa::path(get,
    path = "/api/v1/telegrams",
    summary = "Latest telegram of every meter that reported within the freshness window",
    responses(
        (status = 200, description = "List of telegrams", body = Vec<TelegramView>)
    ),
)]
async fn get_telegrams(state: web::Data<ApiState>) -> impl Responder {
    let telegrams: Vec<TelegramView> = state.store.fresh().into_iter().map(|stored| TelegramView {
        identity: stored.telegram.identity,
        received_at: stored.received_at.to_rfc3339(),
        measurements: stored.telegram.measurements.into_iter().map(|m| MeasurementView {
            description: get_obis_description(&m.obis_code).map(|d| d.to_string()),
            obis_code: m.obis_code,
            value: m.value,
            unit: m.unit,
        }).collect(),
    }).collect();

    HttpResponse::Ok().json(telegrams)
}

// Websocket to push every decoded telegram to the client
#[utoipa::path(get,
    path = "/api/v1/ws/telegrams",
    summary = "Websocket with a live feed of decoded telegrams",
    responses(
        (status = 101, description = "The websocket is active and sends one JSON message per telegram"),
    ),
)]
async fn ws_telegrams(req: HttpRequest, body: web::Payload, state: web::Data<ApiState>) -> actix_web::Result<impl Responder> {
    let (response, mut session, _msg_stream) = actix_ws::handle(&req, body)?;

    let mut receiver = state.feed.subscribe();
    actix_web::rt::spawn(async move {
        loop {
            let telegram = match receiver.recv().await {
                Ok(t) => t,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Websocket client is too slow, skipped {skipped} telegrams");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let text = match serde_json::to_string(&telegram) {
                Ok(text) => text,
                Err(e) => {
                    error!("Unable to serialize telegram: {e}");
                    continue;
                }
            };
            if session.text(text).await.is_err() {
                debug!("Websocket client went away");
                break;
            }
        }

        let _ = session.close(None).await;
    });

    Ok(response)
}

#[derive(OpenApi)]
#[openapi(
    info(description = "han2prom API description"),
    paths(
        metrics,
        health_check,
        get_telegrams,
        ws_telegrams,
    ),
    components(schemas(HealthResponse, EndpointHealth, TelegramView, MeasurementView))
)]
struct ApiDoc;

/// Registers all routes, shared by the server and the tests
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(metrics))
        .route("/health", web::get().to(health_check))
        .route("/api/v1/telegrams", web::get().to(get_telegrams))
        .route("/api/v1/ws/telegrams", web::get().to(ws_telegrams));
}

pub struct ApiManager {
    config: HttpdConfig,
    state: web::Data<ApiState>,
}

impl ApiManager {
    pub fn new(config: HttpdConfig, state: ApiState) -> Self {
        return ApiManager { config, state: web::Data::new(state) };
    }

    /// Binds the listener, the returned server still has to be awaited or spawned
    pub fn start(&self) -> std::io::Result<Server> {
        let state = self.state.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(state.clone())
                .configure(routes)
                .service(
                    SwaggerUi::new("/swagger-ui/{_:.*}")
                        .url("/api/v1/openapi.json", ApiDoc::openapi()),
                )
        })
        .disable_signals()
        .bind(("0.0.0.0", self.config.port))?
        .run();

        info!("Prometheus metrics available on http://0.0.0.0:{}/metrics", self.config.port);
        Ok(server)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metering_han::{state::SupervisorState, MeasurementPoint, Telegram};
    use crate::sink::TelemetrySink;
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;
    use std::time::Duration;

    fn state() -> ApiState {
        ApiState::new(
            Arc::new(TelegramStore::default()),
            Arc::new(StatusBoard::new()),
            BroadcastSink::new(4),
        )
    }

    fn telegram() -> Telegram {
        Telegram {
            identity: "LGF5E360".to_string(),
            measurements: vec![
                MeasurementPoint { obis_code: "1-0:1.8.0".to_string(), value: 5895.962, unit: "kWh".to_string() },
                MeasurementPoint { obis_code: "1-0:32.7.0".to_string(), value: 228.4, unit: "V".to_string() },
            ],
        }
    }

    #[test]
    fn test_render_metrics() {
        let store = TelegramStore::default();
        assert!(!render_metrics(&store).unwrap().contains("hanporten_OBIS{"));

        store.accept(telegram());
        let body = render_metrics(&store).unwrap();
        assert!(body.contains("# TYPE hanporten_OBIS gauge"));
        assert!(body.contains(r#"hanporten_OBIS{ident="LGF5E360",obis="1-0:1.8.0",unit="kWh"} 5895.962"#));
        assert!(body.contains(r#"hanporten_OBIS{ident="LGF5E360",obis="1-0:32.7.0",unit="V"} 228.4"#));
    }

    #[test]
    fn test_stale_telegrams_are_not_exported() {
        let store = TelegramStore::new(Duration::from_millis(10));
        store.accept(telegram());
        std::thread::sleep(Duration::from_millis(30));
        assert!(!render_metrics(&store).unwrap().contains("LGF5E360"));
    }

    #[actix_rt::test]
    async fn test_metrics_endpoint() {
        let state = state();
        state.store.accept(telegram());
        let app = actix_test::init_service(App::new().app_data(web::Data::new(state)).configure(routes)).await;

        let req = actix_test::TestRequest::get().uri("/metrics").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = actix_test::read_body(resp).await;
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("obis=\"1-0:32.7.0\""));
    }

    #[actix_rt::test]
    async fn test_health_endpoint() {
        let state = state();
        let status = state.status.clone();
        status.register("bridge:8232");
        let app = actix_test::init_service(App::new().app_data(web::Data::new(state)).configure(routes)).await;

        let req = actix_test::TestRequest::get().uri("/health").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        status.set_state("bridge:8232", SupervisorState::Connected);
        let req = actix_test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["endpoints"][0]["address"], "bridge:8232");
        assert_eq!(body["endpoints"][0]["state"], "connected");
    }

    #[actix_rt::test]
    async fn test_telegrams_endpoint() {
        let state = state();
        state.store.accept(telegram());
        let app = actix_test::init_service(App::new().app_data(web::Data::new(state)).configure(routes)).await;

        let req = actix_test::TestRequest::get().uri("/api/v1/telegrams").to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body[0]["identity"], "LGF5E360");
        assert_eq!(body[0]["measurements"][1]["value"], 228.4);
        assert_eq!(body[0]["measurements"][1]["description"], "Voltage (L1)");
    }
}
