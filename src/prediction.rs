use log::{ info, error };
use reqwest::Client as HttpClient;
use thiserror::Error;
use url::Url;

use crate::models::prediction::{ PredictionForm, PredictionResult };

pub const DEFAULT_PREDICTION_URL: &str = "http://localhost:5000";

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("prediction service unreachable: {0}")]
    Http(#[from] reqwest::Error),
    #[error("prediction service returned {status}: {body}")]
    Status {
        status: u16,
        body: String,
    },
    #[error("invalid prediction service URL '{0}'")]
    InvalidUrl(String),
}

/// Forwards intake forms to the external prediction service.
pub struct PredictionClient {
    http: HttpClient,
    base_url: String,
}

impl PredictionClient {
    pub fn new(base_url: &str) -> Result<Self, PredictionError> {
        Url::parse(base_url).map_err(|_| PredictionError::InvalidUrl(base_url.to_string()))?;
        Ok(Self {
            http: HttpClient::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn predict(&self, form: &PredictionForm) -> Result<PredictionResult, PredictionError> {
        let url = format!("{}/predict", self.base_url);
        let resp = self.http.post(&url).json(form).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!("Prediction service at {} returned {}: {}", url, status, body);
            return Err(PredictionError::Status { status: status.as_u16(), body });
        }

        let result = resp.json::<PredictionResult>().await?;
        info!(
            "Prediction received: survival={:.3}, risk={}",
            result.survival_probability,
            result.risk_category
        );
        Ok(result)
    }
}
