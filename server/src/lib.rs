//! HTTP API for the rulegate executor.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use rulegate_artifact_host::{ArtifactHostError, FlowFactResult, ModuleInfo};
use rulegate_executor::{DecisionOutcome, ExecutionOrchestrator, ExecutorError};
use serde::Deserialize;
use serde_json::Value;
use tracing::error;

/// Query string of the reload routes.
#[derive(Debug, Default, Deserialize)]
pub struct ReloadQuery {
    #[serde(default, rename = "forceReload")]
    pub force_reload: bool,
}

/// An error rendered as a plain-text `Error: ...` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ExecutorError> for ApiError {
    fn from(e: ExecutorError) -> Self {
        let status = match &e {
            ExecutorError::ArtifactNotFound { .. }
            | ExecutorError::Host(ArtifactHostError::ArtifactNotFound(_)) => StatusCode::NOT_FOUND,
            ExecutorError::WrongArtifactKind { .. }
            | ExecutorError::Host(
                ArtifactHostError::UnknownFact { .. }
                | ArtifactHostError::SchemaMismatch { .. }
                | ArtifactHostError::Fact(_),
            ) => StatusCode::UNPROCESSABLE_ENTITY,
            ExecutorError::NoArtifactsAvailable { .. }
            | ExecutorError::Host(ArtifactHostError::MissingLocation { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

// Malformed bodies and query strings keep axum's status but use the same
// plain-text body as every other error.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, format!("Error: {}", self.message)).into_response()
    }
}

/// Runs blocking executor work off the async runtime.
async fn blocking<T, F>(orchestrator: Arc<ExecutionOrchestrator>, work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&ExecutionOrchestrator) -> Result<T, ExecutorError> + Send + 'static,
{
    let result = tokio::task::spawn_blocking(move || work(&orchestrator))
        .await
        .map_err(|e| ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("execution task failed: {e}"),
        })?;
    result.map_err(|e| {
        error!("{}", e);
        ApiError::from(e)
    })
}

async fn execute_decision_handler(
    State(orchestrator): State<Arc<ExecutionOrchestrator>>,
    Path((prefix, conclusion, view, version)): Path<(String, String, String, String)>,
    body: Result<Json<BTreeMap<String, Value>>, JsonRejection>,
) -> Result<Json<DecisionOutcome>, ApiError> {
    let Json(facts) = body?;
    blocking(orchestrator, move |o| {
        o.execute_decision(&prefix, &conclusion, &view, &version, &facts)
    })
    .await
    .map(Json)
}

async fn execute_flow_handler(
    State(orchestrator): State<Arc<ExecutionOrchestrator>>,
    Path((prefix, name, version)): Path<(String, String, String)>,
    body: Result<Json<BTreeMap<String, Value>>, JsonRejection>,
) -> Result<Json<BTreeMap<String, FlowFactResult>>, ApiError> {
    let Json(facts) = body?;
    blocking(orchestrator, move |o| o.execute_flow(&prefix, &name, &version, &facts))
        .await
        .map(Json)
}

async fn reload_from_handler(
    State(orchestrator): State<Arc<ExecutionOrchestrator>>,
    Path(path): Path<String>,
    query: Result<Query<ReloadQuery>, QueryRejection>,
) -> Result<String, ApiError> {
    let Query(query) = query?;
    blocking(orchestrator, move |o| o.reload_from(&path, query.force_reload)).await
}

async fn reload_default_handler(
    State(orchestrator): State<Arc<ExecutionOrchestrator>>,
    query: Result<Query<ReloadQuery>, QueryRejection>,
) -> Result<String, ApiError> {
    let Query(query) = query?;
    blocking(orchestrator, move |o| o.reload_default(query.force_reload)).await
}

async fn modules_handler(
    State(orchestrator): State<Arc<ExecutionOrchestrator>>,
) -> Result<Json<Vec<ModuleInfo>>, ApiError> {
    blocking(orchestrator, |o| Ok(o.modules())).await.map(Json)
}

/// Build the HTTP API router over the given orchestrator.
pub fn build_router(orchestrator: Arc<ExecutionOrchestrator>) -> Router {
    Router::new()
        .route(
            "/execute/decision/{prefix}/{conclusion}/{view}/{version}",
            post(execute_decision_handler),
        )
        .route("/execute/flow/{prefix}/{name}/{version}", post(execute_flow_handler))
        .route("/reload/artifacts/jars/from/default/path", get(reload_default_handler))
        .route("/reload/artifacts/jars/from/{path}", get(reload_from_handler))
        .route("/artifacts/modules", get(modules_handler))
        .with_state(orchestrator)
}
