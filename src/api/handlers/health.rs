//! Store-aware health endpoint.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::error;
use utoipa::ToSchema;

use crate::store::Store;
use crate::GIT_COMMIT_HASH;

const HEALTH_STORE_TIMEOUT_SECONDS: u64 = 2;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    store: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Store connection is healthy", body = Health),
        (status = 503, description = "Store is unreachable", body = Health)
    ),
    tag = "health"
)]
pub async fn health(store: Extension<Arc<dyn Store>>) -> impl IntoResponse {
    let probe = timeout(
        Duration::from_secs(HEALTH_STORE_TIMEOUT_SECONDS),
        store.get("health:probe"),
    )
    .await;

    let store_healthy = match probe {
        Ok(Ok(_)) => true,
        Ok(Err(err)) => {
            error!("Health store probe failed: {err}");
            false
        }
        Err(_) => {
            error!("Health store probe timed out");
            false
        }
    };

    let body = Json(Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: if store_healthy { "ok" } else { "error" }.to_string(),
    });

    let short_hash = if GIT_COMMIT_HASH.len() > 7 {
        &GIT_COMMIT_HASH[0..7]
    } else {
        ""
    };
    let mut headers = HeaderMap::new();
    if let Ok(value) = format!(
        "{}:{}:{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_hash
    )
    .parse()
    {
        headers.insert("X-App", value);
    }

    let status = if store_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, headers, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn reports_ok_against_live_store() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let response = health(Extension(store)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("X-App"));
    }
}
