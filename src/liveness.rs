//! Liveness Endpoint
//!
//! A single `GET /` serving a static status page, so the hosting
//! platform's monitor can tell the process is alive. No application
//! semantics.

use anyhow::Result;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::info;

const STATUS_PAGE: &str = "<!DOCTYPE html>\n\
<html>\n\
<head><title>fieldbot</title></head>\n\
<body>\n\
<h1>fieldbot is running</h1>\n\
<p>The agent process is alive. See the logs for connection state.</p>\n\
</body>\n\
</html>\n";

fn router() -> Router {
    Router::new()
        .route("/", get(|| async { Html(STATUS_PAGE) }))
        .layer(TraceLayer::new_for_http())
}

/// Serve the status page until the process exits.
pub async fn serve(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Liveness endpoint listening on http://{addr}/");
    axum::serve(listener, router()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_page_is_html() {
        assert!(STATUS_PAGE.starts_with("<!DOCTYPE html>"));
        assert!(STATUS_PAGE.contains("fieldbot"));
    }

    #[tokio::test]
    async fn test_serve_binds_ephemeral_port() {
        // Bind on port 0 to prove the router and listener wire up.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, router()).await;
        });
        server.abort();
    }
}
