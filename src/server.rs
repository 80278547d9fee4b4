// HTTP server for the Kick REST and MCP endpoints
//
// Every route is authenticated with a bearer token and checked against the
// scope it needs. When Kick is disabled the router has no routes at all.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::app::Kick;
use crate::auth::scopes;
use crate::error::KickError;
use crate::logs::ReadRequest;
use crate::mcp;
use crate::queue::{DEFAULT_FAILED_LIMIT, MAX_FAILED_LIMIT};

type AppState = Arc<Kick>;

/// A [`KickError`] rendered as a JSON response
#[derive(Debug)]
pub struct ApiError(pub KickError);

impl From<KickError> for ApiError {
    fn from(err: KickError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let message = self.0.public_message();

        let body = match &self.0 {
            KickError::Internal(detail) => {
                error!("Request failed: {}", detail);
                json!({ "error": message })
            }
            KickError::NotAllowed { allowed, .. } => json!({
                "success": false,
                "error": message,
                "allowed_commands": allowed,
            }),
            _ => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}

/// Build the router for `kick`.
///
/// REST routes live under `/{prefix}`; the MCP endpoint is `/mcp/{prefix}`.
pub fn router(kick: Arc<Kick>) -> Router {
    if !kick.is_enabled() {
        return Router::new();
    }

    let prefix = kick.config().route_prefix().to_string();

    let api = Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/logs", get(logs_index))
        .route("/logs/{file}", get(logs_show))
        .route("/queue", get(queue_index))
        .route("/queue/failed", get(queue_failed))
        .route("/queue/retry/{id}", post(queue_retry))
        .route("/queue/retry-all", post(queue_retry_all))
        .route("/artisan", get(artisan_index).post(artisan_execute));

    let mut app = Router::new().nest(&format!("/{}", prefix), api);
    if kick.config().mcp.enabled {
        app = app.route(&format!("/mcp/{}", prefix), post(mcp::handle_http));
    }

    app.layer(TraceLayer::new_for_http()).with_state(kick)
}

/// Serve Kick on the configured address until Ctrl-C
///
/// # Arguments
/// * `kick` - Fully built Kick instance
///
/// # Returns
/// Ok on clean shutdown, error if the listener cannot be bound
pub async fn serve(kick: Arc<Kick>) -> Result<()> {
    let bind = kick.config().server.bind.clone();

    if !kick.is_enabled() {
        warn!("Kick is disabled; every route will return 404");
    }
    if kick.authority().is_empty() {
        warn!("No tokens configured; every request will be rejected");
    }

    let app = router(kick);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind Kick server to {}", bind))?;

    info!("Kick server listening on {}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .context("Kick server error")?;

    Ok(())
}

fn authorize(kick: &Kick, headers: &HeaderMap, scope: &str) -> Result<(), ApiError> {
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    kick.authorize(header, scope).map_err(ApiError)
}

fn join_error(e: tokio::task::JoinError) -> ApiError {
    ApiError(KickError::Internal(format!("blocking task failed: {}", e)))
}

async fn health(State(kick): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    authorize(&kick, &headers, scopes::HEALTH_READ)?;

    let report = kick.health().check().await;
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    Ok((status, Json(report)).into_response())
}

async fn stats(State(kick): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    authorize(&kick, &headers, scopes::STATS_READ)?;

    let collector = kick.stats().clone();
    let stats = tokio::task::spawn_blocking(move || collector.collect())
        .await
        .map_err(join_error)?;

    Ok(Json(stats).into_response())
}

async fn logs_index(State(kick): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    authorize(&kick, &headers, scopes::LOGS_READ)?;

    let reader = kick.logs().clone();
    let files = tokio::task::spawn_blocking(move || reader.list_files())
        .await
        .map_err(join_error)?
        .map_err(|e| ApiError(e.into()))?;

    Ok(Json(json!({ "files": files })).into_response())
}

async fn logs_show(
    State(kick): State<AppState>,
    headers: HeaderMap,
    Path(file): Path<String>,
    query: Result<Query<ReadRequest>, QueryRejection>,
) -> Result<Response, ApiError> {
    authorize(&kick, &headers, scopes::LOGS_READ)?;

    let Query(request) =
        query.map_err(|e| ApiError(KickError::InvalidInput(e.body_text())))?;

    let reader = kick.logs().clone();
    let (target, req) = (file.clone(), request.clone());
    let result = tokio::task::spawn_blocking(move || reader.read(&target, &req))
        .await
        .map_err(join_error)?
        .map_err(|e| ApiError(e.into()))?;

    Ok(Json(json!({
        "file": file,
        "entries": result.entries,
        "total_lines": result.total_lines,
        "has_more": result.has_more,
        "lines_requested": request.lines,
        "offset": request.offset,
    }))
    .into_response())
}

async fn queue_index(State(kick): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    authorize(&kick, &headers, scopes::QUEUE_READ)?;

    Ok(Json(kick.queue().overview().await).into_response())
}

#[derive(Debug, Deserialize)]
struct FailedQuery {
    limit: Option<usize>,
}

async fn queue_failed(
    State(kick): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<FailedQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    authorize(&kick, &headers, scopes::QUEUE_READ)?;

    let Query(query) = query.map_err(|e| ApiError(KickError::InvalidInput(e.body_text())))?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_FAILED_LIMIT)
        .clamp(1, MAX_FAILED_LIMIT);

    let response = match kick.queue().failed_jobs(limit).await {
        Ok(jobs) => {
            let count = jobs.len();
            Json(json!({ "failed_jobs": jobs, "count": count })).into_response()
        }
        Err(e) => {
            let err = KickError::from(e);
            warn!("Unable to retrieve failed jobs: {}", err);
            (
                err.status_code(),
                Json(json!({
                    "failed_jobs": [],
                    "count": 0,
                    "error": "Unable to retrieve failed jobs",
                })),
            )
                .into_response()
        }
    };

    Ok(response)
}

fn status_for(success: bool) -> StatusCode {
    if success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    }
}

async fn queue_retry(
    State(kick): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    authorize(&kick, &headers, scopes::QUEUE_RETRY)?;

    let result = kick.queue().retry_job(&id).await;
    Ok((status_for(result.success), Json(result)).into_response())
}

async fn queue_retry_all(
    State(kick): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&kick, &headers, scopes::QUEUE_RETRY)?;

    let result = kick.queue().retry_all().await;
    Ok((status_for(result.success), Json(result)).into_response())
}

async fn artisan_index(
    State(kick): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&kick, &headers, scopes::ARTISAN_LIST)?;

    let commands = kick.commands().list_commands();
    let count = commands.len();
    Ok(Json(json!({ "commands": commands, "count": count })).into_response())
}

#[derive(Debug, Default, Deserialize)]
struct ExecuteRequest {
    #[serde(default)]
    command: Option<String>,
}

fn execute_rejected(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "success": false, "error": message })),
    )
        .into_response()
}

async fn artisan_execute(
    State(kick): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ExecuteRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    authorize(&kick, &headers, scopes::ARTISAN_EXECUTE)?;

    let request = body.map(|Json(r)| r).unwrap_or_default();
    let input = request.command.unwrap_or_default();
    if input.trim().is_empty() {
        return Ok(execute_rejected("No command provided."));
    }

    let runner = kick.commands();
    let parsed = runner.parse_command(&input);
    if parsed.command.is_empty() {
        return Ok(execute_rejected("Invalid command format."));
    }

    if !runner.is_allowed(&parsed.command) {
        return Err(ApiError(KickError::NotAllowed {
            command: parsed.command,
            allowed: runner.available_command_names(),
        }));
    }

    info!(
        command = %parsed.command,
        args = parsed.parameters.to_args().len(),
        "Executing command"
    );

    let result = runner
        .run(&parsed.command, &parsed.parameters)
        .await
        .map_err(|e| ApiError(e.into()))?;

    Ok((
        status_for(result.success),
        Json(json!({
            "success": result.success,
            "command": parsed.command,
            "output": result.output,
            "exit_code": result.exit_code,
        })),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{
        CommandInfo, CommandOutput, CommandRegistry, Parameters, RegistryError,
    };
    use crate::config::{KickConfig, LogsConfig};
    use crate::health::{CheckResult, HealthCheck};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::collections::HashMap;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const ADMIN: &str = "admin-token";
    const READER: &str = "reader-token";

    #[derive(Debug)]
    struct StaticRegistry;

    #[async_trait]
    impl CommandRegistry for StaticRegistry {
        fn commands(&self) -> Vec<CommandInfo> {
            vec![CommandInfo {
                name: "about".to_string(),
                description: "Display basic information".to_string(),
            }]
        }

        async fn call(
            &self,
            _name: &str,
            parameters: &Parameters,
        ) -> Result<CommandOutput, RegistryError> {
            let fail = parameters.option("--fail").is_some();
            Ok(CommandOutput {
                exit_code: if fail { 2 } else { 0 },
                output: "Environment: production, owner admin@example.com\n".to_string(),
            })
        }
    }

    #[derive(Debug)]
    struct DownCheck;

    #[async_trait]
    impl HealthCheck for DownCheck {
        fn name(&self) -> &str {
            "database"
        }

        async fn check(&self) -> CheckResult {
            CheckResult::unhealthy("Connection refused")
        }
    }

    fn config(dir: &TempDir) -> KickConfig {
        KickConfig {
            enabled: true,
            allowed_commands: vec!["about".to_string()],
            tokens: HashMap::from([
                (ADMIN.to_string(), vec!["*".to_string()]),
                (READER.to_string(), vec![scopes::LOGS_READ.to_string()]),
            ]),
            logs: LogsConfig {
                path: dir.path().to_path_buf(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn app(dir: &TempDir) -> Router {
        let kick = Kick::builder(config(dir))
            .command_registry(Arc::new(StaticRegistry))
            .health_checks(Vec::new())
            .build()
            .unwrap();
        router(Arc::new(kick))
    }

    async fn send(
        app: Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn write_log(dir: &TempDir, name: &str, lines: &[&str]) {
        let mut content = lines.join("\n");
        content.push('\n');
        std::fs::write(dir.path().join(name), content).unwrap();
    }

    #[tokio::test]
    async fn test_missing_token_is_401() {
        let dir = TempDir::new().unwrap();
        let (status, body) = send(app(&dir), Method::GET, "/kick/logs", None, None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Authentication token required.");
    }

    #[tokio::test]
    async fn test_unknown_token_is_401() {
        let dir = TempDir::new().unwrap();
        let (status, body) =
            send(app(&dir), Method::GET, "/kick/logs", Some("nope"), None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid authentication token.");
    }

    #[tokio::test]
    async fn test_missing_scope_is_403() {
        let dir = TempDir::new().unwrap();
        let (status, body) =
            send(app(&dir), Method::GET, "/kick/stats", Some(READER), None).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Token does not have required scope: stats:read");
    }

    #[tokio::test]
    async fn test_disabled_serves_nothing() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.enabled = false;
        let app = router(Arc::new(Kick::from_config(config).unwrap()));

        let (status, _) = send(app, Method::GET, "/kick/logs", Some(ADMIN), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_custom_prefix() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.prefix = "/ops/".to_string();
        let kick = Arc::new(Kick::from_config(config).unwrap());

        let (status, _) = send(router(kick.clone()), Method::GET, "/ops/logs", Some(ADMIN), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(router(kick), Method::GET, "/kick/logs", Some(ADMIN), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_logs_index_and_show() {
        let dir = TempDir::new().unwrap();
        write_log(
            &dir,
            "laravel.log",
            &[
                "[2024-01-15] local.INFO: boot",
                "[2024-01-15] local.ERROR: mail to jane@example.com failed",
                "[2024-01-15] local.INFO: done",
            ],
        );

        let (status, body) = send(app(&dir), Method::GET, "/kick/logs", Some(READER), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["files"][0]["name"], "laravel.log");

        let (status, body) = send(
            app(&dir),
            Method::GET,
            "/kick/logs/laravel.log?lines=2&level=ERROR",
            Some(READER),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["file"], "laravel.log");
        assert_eq!(body["total_lines"], 1);
        assert_eq!(body["lines_requested"], 2);
        assert_eq!(body["offset"], 0);
        assert_eq!(body["has_more"], false);
        assert_eq!(body["entries"][0]["line"], 2);
        assert_eq!(
            body["entries"][0]["content"],
            "[2024-01-15] local.ERROR: mail to [EMAIL] failed"
        );
    }

    #[tokio::test]
    async fn test_logs_show_errors() {
        let dir = TempDir::new().unwrap();
        write_log(&dir, "notes.txt", &["hello"]);

        let (status, body) =
            send(app(&dir), Method::GET, "/kick/logs/missing.log", Some(READER), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Log file not found: missing.log");

        let (status, body) =
            send(app(&dir), Method::GET, "/kick/logs/notes.txt", Some(READER), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "File type not allowed.");

        let (status, body) =
            send(app(&dir), Method::GET, "/kick/logs/..%2Fsecret.log", Some(READER), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid filename.");

        let (status, _) = send(
            app(&dir),
            Method::GET,
            "/kick/logs/missing.log?lines=lots",
            Some(READER),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_logs_show_rejects_unusable_names() {
        let dir = TempDir::new().unwrap();
        let overlong = format!("/kick/logs/{}.log", "a".repeat(300));

        for uri in ["/kick/logs/a%00.log", overlong.as_str()] {
            let (status, body) = send(app(&dir), Method::GET, uri, Some(READER), None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body["error"], "Invalid filename.");
        }
    }

    #[tokio::test]
    async fn test_logs_show_rejects_oversized_filter() {
        let dir = TempDir::new().unwrap();
        write_log(&dir, "app.log", &["local.ERROR: boom"]);
        let uri = format!("/kick/logs/app.log?search={}", "x".repeat(2048));

        let (status, body) = send(app(&dir), Method::GET, &uri, Some(READER), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid log filter"));
    }

    #[tokio::test]
    async fn test_health_without_probes_is_healthy() {
        let dir = TempDir::new().unwrap();
        let (status, body) = send(app(&dir), Method::GET, "/kick/health", Some(ADMIN), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_unhealthy_is_503() {
        let dir = TempDir::new().unwrap();
        let kick = Kick::builder(config(&dir))
            .health_checks(vec![Arc::new(DownCheck)])
            .build()
            .unwrap();

        let (status, body) = send(
            router(Arc::new(kick)),
            Method::GET,
            "/kick/health",
            Some(ADMIN),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["checks"]["database"]["status"], "unhealthy");
    }

    #[tokio::test]
    async fn test_queue_without_backend() {
        let dir = TempDir::new().unwrap();

        let (status, body) = send(app(&dir), Method::GET, "/kick/queue", Some(ADMIN), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["failed_count"], Value::Null);

        let (status, body) =
            send(app(&dir), Method::GET, "/kick/queue/failed?limit=500", Some(ADMIN), None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["failed_jobs"], json!([]));
        assert_eq!(body["count"], 0);
        assert_eq!(body["error"], "Unable to retrieve failed jobs");

        let (status, body) =
            send(app(&dir), Method::POST, "/kick/queue/retry/abc", Some(ADMIN), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, _) =
            send(app(&dir), Method::POST, "/kick/queue/retry-all", Some(ADMIN), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_artisan_index() {
        let dir = TempDir::new().unwrap();
        let (status, body) = send(app(&dir), Method::GET, "/kick/artisan", Some(ADMIN), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["commands"][0]["name"], "about");
    }

    #[tokio::test]
    async fn test_artisan_execute_success_scrubs_output() {
        let dir = TempDir::new().unwrap();
        let (status, body) = send(
            app(&dir),
            Method::POST,
            "/kick/artisan",
            Some(ADMIN),
            Some(json!({"command": "about"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["command"], "about");
        assert_eq!(body["exit_code"], 0);
        assert_eq!(body["output"], "Environment: production, owner [EMAIL]");
    }

    #[tokio::test]
    async fn test_artisan_execute_nonzero_exit_is_400() {
        let dir = TempDir::new().unwrap();
        let (status, body) = send(
            app(&dir),
            Method::POST,
            "/kick/artisan",
            Some(ADMIN),
            Some(json!({"command": "about --fail"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["command"], "about");
        assert_eq!(body["exit_code"], 2);
    }

    #[tokio::test]
    async fn test_artisan_execute_rejections() {
        let dir = TempDir::new().unwrap();

        let (status, body) = send(
            app(&dir),
            Method::POST,
            "/kick/artisan",
            Some(ADMIN),
            Some(json!({"command": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No command provided.");

        let (status, body) = send(
            app(&dir),
            Method::POST,
            "/kick/artisan",
            Some(ADMIN),
            Some(json!({"command": "migrate:fresh --force"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Command not allowed: migrate:fresh");
        assert_eq!(body["allowed_commands"], json!(["about"]));
    }

    #[tokio::test]
    async fn test_not_allowed_lists_only_registered_commands() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.allowed_commands = vec!["about".to_string(), "inspire".to_string()];
        let kick = Kick::builder(config)
            .command_registry(Arc::new(StaticRegistry))
            .build()
            .unwrap();

        let (status, body) = send(
            router(Arc::new(kick)),
            Method::POST,
            "/kick/artisan",
            Some(ADMIN),
            Some(json!({"command": "down"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["allowed_commands"], json!(["about"]));
    }

    #[tokio::test]
    async fn test_mcp_requires_wildcard() {
        let dir = TempDir::new().unwrap();
        let ping = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});

        let (status, _) =
            send(app(&dir), Method::POST, "/mcp/kick", Some(READER), Some(ping.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) =
            send(app(&dir), Method::POST, "/mcp/kick", Some(ADMIN), Some(ping)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 1);
        assert_eq!(body["result"], json!({}));
    }

    #[tokio::test]
    async fn test_mcp_notification_is_202() {
        let dir = TempDir::new().unwrap();
        let (status, body) = send(
            app(&dir),
            Method::POST,
            "/mcp/kick",
            Some(ADMIN),
            Some(json!({"jsonrpc": "2.0", "method": "notifications/initialized"})),
        )
        .await;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, Value::Null);
    }

    #[tokio::test]
    async fn test_mcp_disabled() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.mcp.enabled = false;
        let app = router(Arc::new(Kick::from_config(config).unwrap()));

        let (status, _) = send(
            app,
            Method::POST,
            "/mcp/kick",
            Some(ADMIN),
            Some(json!({"jsonrpc": "2.0", "id": 1, "method": "ping"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_not_allowed_body_lists_commands() {
        let response = ApiError(KickError::NotAllowed {
            command: "down".to_string(),
            allowed: vec!["about".to_string()],
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
