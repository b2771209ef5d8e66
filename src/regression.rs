//! Regression solving: the external numeric service client and the local
//! closed-form solver used when no service is configured.
//!
//! Service contract: POST `{ "matrix_X": [[..]], "vector_Y": [..] }` and receive
//! `{ "weights": [..] }`, one least-squares coefficient per column, in column
//! order. Error bodies look like `{ "error": ".." }`.
//!
//! NOTE: the service has no auth, retry or versioning; none is attempted here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::error::SolverError;

#[async_trait]
pub trait RegressionSolver: Send + Sync {
  fn name(&self) -> &'static str;

  /// Least-squares coefficients for `matrix_x · w ≈ vector_y`, one per column.
  async fn solve(&self, matrix_x: &[Vec<f64>], vector_y: &[f64]) -> Result<Vec<f64>, SolverError>;
}

fn column_count(matrix_x: &[Vec<f64>]) -> usize {
  matrix_x.first().map(Vec::len).unwrap_or(0)
}

#[derive(Clone)]
pub struct HttpRegressionClient {
  pub client: reqwest::Client,
  pub url: String,
}

impl HttpRegressionClient {
  pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SolverError> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self { client, url: url.into() })
  }

  /// REGRESSION_API_URL wins over the configured URL; None when neither is set.
  pub fn from_env(configured_url: Option<&str>, timeout: Duration) -> Option<Self> {
    let url = std::env::var("REGRESSION_API_URL")
      .ok()
      .filter(|u| !u.trim().is_empty())
      .or_else(|| configured_url.map(str::to_string))?;
    match Self::new(url, timeout) {
      Ok(c) => Some(c),
      Err(e) => {
        error!(target: "weakness", error = %e, "Failed to build regression HTTP client");
        None
      }
    }
  }
}

#[async_trait]
impl RegressionSolver for HttpRegressionClient {
  fn name(&self) -> &'static str {
    "http"
  }

  #[instrument(level = "info", skip(self, matrix_x, vector_y), fields(url = %self.url, rows = matrix_x.len(), cols = column_count(matrix_x)))]
  async fn solve(&self, matrix_x: &[Vec<f64>], vector_y: &[f64]) -> Result<Vec<f64>, SolverError> {
    let req = SolveRequest { matrix_x, vector_y };
    let start = std::time::Instant::now();

    let res = self.client.post(&self.url)
      .header(USER_AGENT, "rmcontents-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_service_error(&body).unwrap_or(body);
      return Err(SolverError::Status { status: status.as_u16(), message });
    }

    let body: SolveResponse = res.json().await?;
    let expected = column_count(matrix_x);
    if body.weights.len() != expected {
      return Err(SolverError::Shape { expected, got: body.weights.len() });
    }
    info!(elapsed = ?start.elapsed(), "Regression service responded");
    Ok(body.weights)
  }
}

/// Closed-form least squares for one-hot designs.
///
/// With at most one non-zero per row the columns are orthogonal, so the
/// pseudo-inverse solution decouples into `w_j = Σ x_ij·y_i / Σ x_ij²`
/// (0 for an all-zero column).
#[derive(Clone, Copy, Debug, Default)]
pub struct OneHotSolver;

#[async_trait]
impl RegressionSolver for OneHotSolver {
  fn name(&self) -> &'static str {
    "local_one_hot"
  }

  async fn solve(&self, matrix_x: &[Vec<f64>], vector_y: &[f64]) -> Result<Vec<f64>, SolverError> {
    if matrix_x.len() != vector_y.len() {
      return Err(SolverError::Unsupported(format!(
        "{} rows but {} targets", matrix_x.len(), vector_y.len()
      )));
    }
    let cols = column_count(matrix_x);
    let mut num = vec![0.0; cols];
    let mut den = vec![0.0; cols];

    for (i, (row, y)) in matrix_x.iter().zip(vector_y).enumerate() {
      if row.len() != cols {
        return Err(SolverError::Unsupported(format!("row {i} has {} columns, expected {cols}", row.len())));
      }
      let mut hot = row.iter().enumerate().filter(|(_, x)| **x != 0.0);
      if let Some((j, x)) = hot.next() {
        if hot.next().is_some() {
          return Err(SolverError::Unsupported(format!("row {i} is not one-hot")));
        }
        num[j] += x * y;
        den[j] += x * x;
      }
    }

    let weights = num.iter().zip(&den).map(|(n, d)| if *d == 0.0 { 0.0 } else { n / d }).collect();
    debug!(target: "weakness", rows = matrix_x.len(), cols, "Solved one-hot regression locally");
    Ok(weights)
  }
}

// --- Wire DTOs ---

#[derive(Serialize)]
struct SolveRequest<'a> {
  #[serde(rename = "matrix_X")]
  matrix_x: &'a [Vec<f64>],
  #[serde(rename = "vector_Y")]
  vector_y: &'a [f64],
}

#[derive(Deserialize)]
struct SolveResponse {
  weights: Vec<f64>,
}

/// Try to extract the service's `{ "error": ".." }` message.
fn extract_service_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error)
}

#[cfg(test)]
mod tests {
  use super::*;
  use mockito::Matcher;
  use serde_json::json;

  #[tokio::test]
  async fn test_one_hot_solver_weighted_means() {
    // Column 0: weights 4, 3, 4 with targets 4, 3, 0 → (16 + 9) / 41.
    let x = vec![
      vec![4.0, 0.0],
      vec![3.0, 0.0],
      vec![4.0, 0.0],
      vec![0.0, 5.0],
      vec![0.0, 5.0],
    ];
    let y = vec![4.0, 3.0, 0.0, 5.0, 0.0];
    let w = OneHotSolver.solve(&x, &y).await.unwrap();
    assert!((w[0] - 25.0 / 41.0).abs() < 1e-12);
    assert!((w[1] - 0.5).abs() < 1e-12);
  }

  #[tokio::test]
  async fn test_one_hot_solver_empty_column_is_zero() {
    let w = OneHotSolver.solve(&[vec![2.0, 0.0]], &[2.0]).await.unwrap();
    assert_eq!(w, vec![1.0, 0.0]);
  }

  #[tokio::test]
  async fn test_one_hot_solver_rejects_dense_rows() {
    let err = OneHotSolver.solve(&[vec![1.0, 1.0]], &[1.0]).await.unwrap_err();
    assert!(matches!(err, SolverError::Unsupported(_)));
  }

  #[tokio::test]
  async fn test_http_client_posts_contract_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("POST", "/calculate-weakness")
      .match_header("content-type", "application/json")
      .match_body(Matcher::Json(json!({
        "matrix_X": [[1.0, 0.0], [0.0, 2.0]],
        "vector_Y": [1.0, 0.0]
      })))
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"weights":[1.0,0.0]}"#)
      .create_async()
      .await;

    let client = HttpRegressionClient::new(format!("{}/calculate-weakness", server.url()), Duration::from_secs(5)).unwrap();
    let w = client.solve(&[vec![1.0, 0.0], vec![0.0, 2.0]], &[1.0, 0.0]).await.unwrap();

    assert_eq!(w, vec![1.0, 0.0]);
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_http_client_surfaces_service_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
      .mock("POST", "/")
      .with_status(500)
      .with_body(r#"{"error":"SVD did not converge"}"#)
      .create_async()
      .await;

    let client = HttpRegressionClient::new(server.url(), Duration::from_secs(5)).unwrap();
    let err = client.solve(&[vec![1.0]], &[1.0]).await.unwrap_err();
    match err {
      SolverError::Status { status, message } => {
        assert_eq!(status, 500);
        assert_eq!(message, "SVD did not converge");
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[tokio::test]
  async fn test_http_client_rejects_wrong_weight_count() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
      .mock("POST", "/")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"weights":[0.5]}"#)
      .create_async()
      .await;

    let client = HttpRegressionClient::new(server.url(), Duration::from_secs(5)).unwrap();
    let err = client.solve(&[vec![1.0, 0.0], vec![0.0, 1.0]], &[1.0, 0.0]).await.unwrap_err();
    assert!(matches!(err, SolverError::Shape { expected: 2, got: 1 }));
  }

  #[test]
  fn test_extract_service_error() {
    assert_eq!(extract_service_error(r#"{"error":"No JSON data provided"}"#).as_deref(), Some("No JSON data provided"));
    assert_eq!(extract_service_error("gateway timeout"), None);
  }
}
