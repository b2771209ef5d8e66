//! HTTP endpoint handlers. These are thin wrappers that forward to the engine.
//! Each handler is instrumented and logs its parameters and basic result info.

use std::sync::Arc;
use axum::{extract::{rejection::JsonRejection, State, Query}, http::StatusCode, Json, response::IntoResponse};
use tracing::{info, instrument, warn};

use crate::domain::TaxonomyFilter;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_get_taxonomy(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(TaxonomyOut { units: state.taxonomy.units().to_vec() })
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_select(
  State(state): State<Arc<AppState>>,
  body: Result<Json<TaxonomyFilter>, JsonRejection>,
) -> Result<Json<SelectOut>, (StatusCode, Json<ErrorOut>)> {
  let Json(filter) = body.map_err(|rejection| {
    warn!(target: "retrieval", error = %rejection.body_text(), "HTTP selection body rejected");
    (rejection.status(), Json(ErrorOut { error: rejection.body_text() }))
  })?;
  info!(target: "retrieval", majors = filter.major_topics.len(), minors = filter.minor_topics.len(), excluded = filter.excluded_ids.len(), "HTTP selection requested");
  match state.select_problems(&filter).await {
    Ok(selection) => {
      let out = SelectOut::from(selection);
      info!(target: "retrieval", total = out.total, partial = out.partial, "HTTP selection served");
      Ok(Json(out))
    }
    Err(e) => {
      warn!(target: "retrieval", error = %e, "HTTP selection rejected");
      Err((StatusCode::BAD_REQUEST, Json(ErrorOut { error: e.to_string() })))
    }
  }
}

#[instrument(level = "info", skip(state), fields(student_id = %q.student_id, class_id = %q.class_id))]
pub async fn http_get_weakness(
  State(state): State<Arc<AppState>>,
  Query(q): Query<WeaknessQuery>,
) -> impl IntoResponse {
  let diagnosis = state.diagnose(&q.student_id, &q.class_id).await;
  let out = WeaknessOut::from(&diagnosis);
  info!(target: "weakness", status = out.status, topics = out.estimates.len(), "HTTP weakness served");
  Json(out)
}
