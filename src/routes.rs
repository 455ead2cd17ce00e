//! `POST /reviews/trigger` — the one HTTP entry point: runs the
//! orchestrator for one (platform, repo, PR number) and returns the
//! resulting review, or `{skipped: true}` when a gate short-circuited it.

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, http::StatusCode, response::Response, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use revman_core::models::Review;
use revman_core::orchestrator::{self, OrchestratorContext};
use revman_core::platform::{PlatformClient, PlatformConfig, PlatformKind};

use crate::app_state::AppState;
use crate::response_envelope::ApiResponse;

#[derive(Deserialize)]
pub struct TriggerRequest {
    pub platform: PlatformName,
    pub repo: String,
    pub pr_number: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformName {
    GitHub,
    GitLab,
    Bitbucket,
}

impl From<PlatformName> for PlatformKind {
    fn from(p: PlatformName) -> Self {
        match p {
            PlatformName::GitHub => PlatformKind::GitHub,
            PlatformName::GitLab => PlatformKind::GitLab,
            PlatformName::Bitbucket => PlatformKind::Bitbucket,
        }
    }
}

#[derive(Serialize)]
pub struct TriggerResponse {
    pub skipped: bool,
    pub review: Option<Review>,
}

pub async fn trigger_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<TriggerRequest>,
) -> Response {
    if !state.trigger_secret.is_empty() {
        let provided = headers.get("X-Trigger-Secret").and_then(|h| h.to_str().ok()).unwrap_or("");
        if provided != state.trigger_secret {
            return ApiResponse::<()>::error("UNAUTHORIZED", "missing or invalid X-Trigger-Secret")
                .into_response_with_status(StatusCode::UNAUTHORIZED);
        }
    }

    let kind: PlatformKind = req.platform.into();
    let Some(creds) = state.credentials_for(kind) else {
        return ApiResponse::<()>::error("PLATFORM_NOT_CONFIGURED", "no credentials configured for this platform")
            .into_response_with_status(StatusCode::BAD_REQUEST);
    };

    let platform = match PlatformClient::from_config(PlatformConfig {
        kind,
        base_api: creds.base_api.clone(),
        token: creds.token.clone(),
    }) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "failed to build platform client");
            return ApiResponse::<()>::error("PLATFORM_CLIENT_ERROR", e.to_string())
                .into_response_with_status(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let ctx = OrchestratorContext::new(platform, &state.config);

    info!(repo = %req.repo, pr_number = req.pr_number, "trigger: starting review run");
    match orchestrator::run(&ctx, &state.config, &state.providers, &req.repo, req.pr_number).await {
        Ok(Some(review)) => {
            ApiResponse::success(TriggerResponse { skipped: false, review: Some(review) })
                .into_response_with_status(StatusCode::OK)
        }
        Ok(None) => {
            ApiResponse::success(TriggerResponse { skipped: true, review: None })
                .into_response_with_status(StatusCode::OK)
        }
        Err(e) => {
            warn!(error = %e, "orchestrator run failed");
            ApiResponse::<()>::error("RUN_FAILED", e.to_string())
                .into_response_with_status(StatusCode::BAD_GATEWAY)
        }
    }
}

pub async fn healthz() -> &'static str {
    "ok"
}
