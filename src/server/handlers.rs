use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::linking::{AddressQuery, IndexStats, ScoredCandidate};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

fn required(value: Option<&str>, name: &str) -> Result<String, ApiError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Missing '{}' parameter", name),
        )),
    }
}

// ─── GET /api/resolve ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ResolveParams {
    pub city: Option<String>,
    pub postal_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

pub async fn resolve(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ResolveParams>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let start = Instant::now();

    let city = required(params.city.as_deref(), "city")?;
    let postal_code = required(params.postal_code.as_deref(), "postal_code")?;
    let query = AddressQuery {
        city_name: Some(city),
        postal_code: Some(postal_code),
    };

    let scored = state.resolver().resolve_scored(&query);

    tracing::debug!(
        city = ?query.city_name,
        postal_code = ?query.postal_code,
        matched = scored.is_some(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "GET /api/resolve"
    );

    Ok(Json(match scored {
        Some(c) => ResolveResponse {
            matched: true,
            entity_id: Some(c.entity_id),
            label: Some(c.label),
            distance: Some(c.distance),
        },
        None => ResolveResponse {
            matched: false,
            entity_id: None,
            label: None,
            distance: None,
        },
    }))
}

// ─── GET /api/candidates ─────────────────────────────────────────

#[derive(Deserialize)]
pub struct CandidateParams {
    pub postal_code: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CandidateResponse {
    pub postal_code: String,
    pub threshold: f64,
    pub candidates: Vec<ScoredCandidate>,
}

/// Every candidate at a postal code. Ranked by distance when `city` is
/// given, otherwise listed in index order with distance 1.0.
pub async fn candidates(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CandidateParams>,
) -> Result<Json<CandidateResponse>, ApiError> {
    let postal_code = required(params.postal_code.as_deref(), "postal_code")?;
    let resolver = state.resolver();

    let candidates = match params.city.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(city) => {
            resolver.ranked_candidates(&AddressQuery::new(Some(city), Some(postal_code.as_str())))
        }
        None => state
            .index
            .candidates(&postal_code)
            .unwrap_or_default()
            .iter()
            .map(|e| ScoredCandidate {
                entity_id: e.entity_id.clone(),
                label: e.label.clone(),
                distance: 1.0,
            })
            .collect(),
    };

    Ok(Json(CandidateResponse {
        postal_code,
        threshold: resolver.threshold(),
        candidates,
    }))
}

// ─── GET /api/stats ──────────────────────────────────────────────

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<IndexStats> {
    Json(state.index.stats())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linking::{PostalCodeIndex, RawCityRecord};

    fn state() -> Arc<AppState> {
        let index = PostalCodeIndex::build(&[
            RawCityRecord::new("72", Some("8000,8001"), "Zurich"),
            RawCityRecord::new("73", Some("8001"), "Zollikon"),
        ]);
        Arc::new(AppState {
            index,
            threshold: 0.3,
        })
    }

    #[tokio::test]
    async fn test_resolve_match() {
        let params = ResolveParams {
            city: Some("Zürich".into()),
            postal_code: Some("8000".into()),
        };
        let Json(resp) = resolve(State(state()), Query(params)).await.ok().unwrap();
        assert!(resp.matched);
        assert_eq!(resp.entity_id.as_deref(), Some("72"));
    }

    #[tokio::test]
    async fn test_resolve_no_match_is_ok() {
        let params = ResolveParams {
            city: Some("Geneva".into()),
            postal_code: Some("8000".into()),
        };
        let Json(resp) = resolve(State(state()), Query(params)).await.ok().unwrap();
        assert!(!resp.matched);
        assert!(resp.entity_id.is_none());
    }

    #[tokio::test]
    async fn test_resolve_missing_param() {
        let params = ResolveParams {
            city: Some("  ".into()),
            postal_code: Some("8000".into()),
        };
        let err = resolve(State(state()), Query(params)).await.err().unwrap();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_candidates_ranked() {
        let params = CandidateParams {
            postal_code: Some("8001".into()),
            city: Some("Zollikon".into()),
        };
        let Json(resp) = candidates(State(state()), Query(params)).await.ok().unwrap();
        let ids: Vec<&str> = resp.candidates.iter().map(|c| c.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["73", "72"]);
    }

    #[tokio::test]
    async fn test_candidates_unknown_code() {
        let params = CandidateParams {
            postal_code: Some("0000".into()),
            city: None,
        };
        let Json(resp) = candidates(State(state()), Query(params)).await.ok().unwrap();
        assert!(resp.candidates.is_empty());
    }

    #[tokio::test]
    async fn test_stats() {
        let Json(stats) = stats(State(state())).await;
        assert_eq!(stats.postal_codes, 2);
        assert_eq!(stats.entries, 3);
    }
}
