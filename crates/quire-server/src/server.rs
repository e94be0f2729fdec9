//! Development server implementation.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::services::ServeDir;

use crate::websocket::{ReloadHub, ReloadMessage, RELOAD_CLIENT_SCRIPT};

/// Tag added to every HTML page served with reload enabled.
const RELOAD_TAG: &str = "<script src=\"/__reload.js\"></script>";

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Directory to serve
    pub root: PathBuf,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,

    /// Inject the reload client and expose the reload socket
    pub reload: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("dist"),
            port: 3000,
            host: "127.0.0.1".to_string(),
            open: false,
            reload: true,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("Server error: {0}")]
    Serve(String),

    #[error("File watch error: {0}")]
    WatchError(String),
}

/// Development server.
pub struct DevServer {
    config: DevServerConfig,
    hub: ReloadHub,
}

impl DevServer {
    /// Create a server broadcasting reloads from `hub`.
    pub fn new(config: DevServerConfig, hub: ReloadHub) -> Self {
        Self { config, hub }
    }

    pub fn config(&self) -> &DevServerConfig {
        &self.config
    }

    /// Address the server binds to.
    pub fn addr(&self) -> Result<SocketAddr, ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        addr.parse().map_err(|_| ServerError::InvalidAddress(addr))
    }

    /// The server's routes.
    pub fn router(&self) -> Router {
        let files = Router::new().fallback_service(ServeDir::new(&self.config.root));

        if !self.config.reload {
            return files;
        }

        Router::new()
            .route("/__reload", get(ws_handler))
            .route("/__reload.js", get(reload_script_handler))
            .with_state(self.hub.clone())
            .merge(files)
            .layer(middleware::map_response(inject_into_html))
    }

    /// Serve until the process is stopped.
    pub async fn start(self) -> Result<(), ServerError> {
        let addr = self.addr()?;
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        tracing::info!(
            "Serving {} at http://{}",
            self.config.root.display(),
            addr
        );

        if self.config.open {
            if let Err(e) = open::that(format!("http://{}", addr)) {
                tracing::warn!("Failed to open browser: {}", e);
            }
        }

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))
    }
}

/// Insert the reload client before `</body>`, or append it.
pub fn inject_reload_script(html: &str) -> String {
    match html.rfind("</body>") {
        Some(pos) => format!("{}{}{}", &html[..pos], RELOAD_TAG, &html[pos..]),
        None => format!("{}{}", html, RELOAD_TAG),
    }
}

async fn inject_into_html(response: Response) -> Response {
    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    if !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to read response body: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = inject_reload_script(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

/// Handler for the reload WebSocket endpoint.
async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<ReloadHub>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, hub))
}

/// Forward hub messages to one client.
async fn handle_ws(mut socket: WebSocket, hub: ReloadHub) {
    let mut rx = hub.subscribe();

    if send_json(&mut socket, &ReloadMessage::Connected).await.is_err() {
        return;
    }

    while let Ok(msg) = rx.recv().await {
        if send_json(&mut socket, &msg).await.is_err() {
            break;
        }
    }
}

async fn send_json(socket: &mut WebSocket, msg: &ReloadMessage) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

async fn reload_script_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        RELOAD_CLIENT_SCRIPT,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use std::fs;
    use tempfile::tempdir;
    use tower::ServiceExt;

    fn server(root: PathBuf, reload: bool) -> DevServer {
        DevServer::new(
            DevServerConfig {
                root,
                reload,
                ..Default::default()
            },
            ReloadHub::new(),
        )
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn injects_before_closing_body() {
        assert_eq!(
            inject_reload_script("<html><body><p>x</p></body></html>"),
            "<html><body><p>x</p><script src=\"/__reload.js\"></script></body></html>"
        );
        assert_eq!(
            inject_reload_script("<p>x</p>"),
            "<p>x</p><script src=\"/__reload.js\"></script>"
        );
    }

    #[test]
    fn default_address() {
        let server = server(PathBuf::from("dist"), true);
        assert_eq!(server.addr().unwrap().port(), 3000);
    }

    #[test]
    fn rejects_invalid_host() {
        let server = DevServer::new(
            DevServerConfig {
                host: "not a host".to_string(),
                ..Default::default()
            },
            ReloadHub::new(),
        );
        assert!(matches!(server.addr(), Err(ServerError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn serves_html_with_reload_client() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("index.html"), "<body>hi</body>").unwrap();
        fs::write(temp.path().join("app.js"), "var a;").unwrap();
        let app = server(temp.path().to_path_buf(), true).router();

        let (status, body) = get_body(app.clone(), "/index.html").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<body>hi<script src=\"/__reload.js\"></script></body>");

        let (_, body) = get_body(app.clone(), "/app.js").await;
        assert_eq!(body, "var a;");

        let (status, body) = get_body(app, "/__reload.js").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("/__reload"));
    }

    #[tokio::test]
    async fn preview_mode_serves_files_untouched() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("index.html"), "<body>hi</body>").unwrap();
        let app = server(temp.path().to_path_buf(), false).router();

        let (_, body) = get_body(app.clone(), "/index.html").await;
        assert_eq!(body, "<body>hi</body>");

        let (status, _) = get_body(app, "/__reload.js").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
