use axum::{
    Extension, Router,
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use logbook::{Attr, FilterContext, HandlerError, LogContext, RequestLogConfig, RequestLogLayer};
use std::sync::Arc;
use std::time::Duration;
use tokio::{net::TcpListener, time::sleep};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{Level, info};

async fn hello_handler() -> impl IntoResponse {
    sleep(Duration::from_millis(100)).await; // Simulate some work
    "Hello, World!"
}

async fn echo_handler(body: Bytes) -> impl IntoResponse {
    sleep(Duration::from_millis(50)).await;
    format!("Echo: {}", String::from_utf8_lossy(&body))
}

async fn cart_handler(Extension(log): Extension<LogContext>) -> impl IntoResponse {
    log.record(Attr::new("cart.items", 3i64));
    log.record(Attr::new("cart.total-cents", 4999i64));
    if let Some(id) = log.request_id() {
        info!(request_id = %id, "processing cart");
    }
    "checkout complete"
}

async fn error_handler() -> Response {
    let mut response = StatusCode::BAD_GATEWAY.into_response();
    response.extensions_mut().insert(HandlerError::Http {
        status: StatusCode::BAD_GATEWAY,
        message: "upstream payment provider unreachable".to_owned(),
    });
    response
}

async fn healthz_handler() -> impl IntoResponse {
    "ok"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    info!("Starting request logging demo server");

    let config = RequestLogConfig {
        with_request_body: true,
        with_response_body: true,
        with_request_header: true,
        with_response_header: true,
        // Health checks are noise.
        filters: vec![Arc::new(|ctx: &FilterContext<'_>| ctx.path != "/healthz")],
        ..Default::default()
    };

    let app = Router::new()
        .route("/hello", get(hello_handler))
        .route("/echo", post(echo_handler))
        .route("/cart", get(cart_handler))
        .route("/error", get(error_handler))
        .route("/healthz", get(healthz_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestLogLayer::new(config))
                .into_inner(),
        );

    info!("Demo server endpoints:");
    info!("  GET  /hello    - Simple greeting (logged at INFO)");
    info!("  POST /echo     - Echo request body (bodies captured)");
    info!("  GET  /cart     - Registers custom attributes");
    info!("  GET  /error    - Structured handler error (logged at ERROR)");
    info!("  GET  /healthz  - Filtered out of the log entirely");
    info!("");
    info!("Try these commands:");
    info!("  curl http://localhost:3000/hello");
    info!("  curl -X POST -d 'Hello from client' http://localhost:3000/echo");
    info!("  curl http://localhost:3000/cart");
    info!("  curl http://localhost:3000/error");
    info!("  curl http://localhost:3000/healthz");

    let listener = TcpListener::bind("0.0.0.0:3000").await?;
    info!("Demo server listening on http://localhost:3000");

    axum::serve(listener, app).await?;

    Ok(())
}
