//! Admin HTTP server: Prometheus metrics and account provisioning.
//!
//! Runs on a separate tokio task.
//!
//! - `GET /metrics`
//! - `POST /users` `{"id", "name"}`
//! - `DELETE /users/:id`
//! - `POST /rooms` `{"id", "name", "owner"}`

use crate::error::AccountError;
use crate::handlers::AccountService;
use crate::repo::RepoError;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chat_proto::{Room, User};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct NewRoom {
    id: String,
    #[serde(default)]
    name: String,
    owner: String,
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::MissingField(_) => StatusCode::BAD_REQUEST,
            Self::Repository(RepoError::UserNotFound(_) | RepoError::RoomNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            Self::Repository(RepoError::UserExists(_) | RepoError::RoomExists(_)) => {
                StatusCode::CONFLICT
            }
            Self::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Broker(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, self.to_string()).into_response()
    }
}

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

async fn create_user(
    State(accounts): State<Arc<AccountService>>,
    Json(user): Json<User>,
) -> Result<StatusCode, AccountError> {
    accounts.register_user(&user).await?;
    Ok(StatusCode::CREATED)
}

async fn delete_user(
    State(accounts): State<Arc<AccountService>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AccountError> {
    accounts.unregister_user(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_room(
    State(accounts): State<Arc<AccountService>>,
    Json(room): Json<NewRoom>,
) -> Result<StatusCode, AccountError> {
    let owner = room.owner;
    let room = Room {
        id: room.id,
        name: room.name,
    };
    accounts.create_room(&room, &owner).await?;
    Ok(StatusCode::CREATED)
}

pub fn router(accounts: Arc<AccountService>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/users", post(create_user))
        .route("/users/:id", delete(delete_user))
        .route("/rooms", post(create_room))
        .with_state(accounts)
}

/// Run the admin HTTP server.
///
/// Binds to `0.0.0.0:port`. This is a long-running task that should be
/// spawned in the background.
pub async fn run_http_server(port: u16, accounts: Arc<AccountService>) {
    let app = router(accounts);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Admin HTTP server listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind HTTP server on {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("HTTP server error: {}", e);
    }
}
