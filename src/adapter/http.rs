//! HTTP client for the external points service.
//!
//! One service owns both balances and accounts, so a single client
//! implements both ports. Credits carry the idempotency key in a header;
//! the service deduplicates on it, which is what makes settlement retries
//! safe.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::LedgerConfig;
use crate::domain::UserId;
use crate::error::{Error, LedgerError, Result};
use crate::port::{PointLedger, UserDirectory};

/// Client for the points service's ledger and directory endpoints.
#[derive(Debug, Clone)]
pub struct HttpLedgerClient {
    client: Client,
    base_url: String,
}

impl HttpLedgerClient {
    /// Build a client from config.
    pub fn new(config: &LedgerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[derive(Serialize)]
struct MovePointsRequest<'a> {
    user_id: &'a str,
    amount: i64,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct ExistsResponse {
    exists: bool,
}

async fn error_body(response: reqwest::Response) -> ErrorBody {
    response.json().await.unwrap_or(ErrorBody {
        code: String::new(),
        message: String::new(),
    })
}

impl PointLedger for HttpLedgerClient {
    async fn debit(&self, user: &UserId, amount: i64) -> Result<()> {
        let response = self
            .client
            .post(self.url("/points/debit"))
            .json(&MovePointsRequest {
                user_id: user.as_str(),
                amount,
            })
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNPROCESSABLE_ENTITY | StatusCode::PAYMENT_REQUIRED => {
                Err(LedgerError::InsufficientBalance {
                    user: user.to_string(),
                    requested: amount,
                }
                .into())
            }
            status => {
                let body = error_body(response).await;
                Err(LedgerError::Unavailable(format!(
                    "debit failed with {status}: {} {}",
                    body.code, body.message
                ))
                .into())
            }
        }
    }

    async fn credit(&self, user: &UserId, amount: i64, idempotency_key: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("/points/credit"))
            .header("Idempotency-Key", idempotency_key)
            .json(&MovePointsRequest {
                user_id: user.as_str(),
                amount,
            })
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            // 409 means the key was already processed: success by contract.
            StatusCode::CONFLICT => Ok(()),
            status => {
                let body = error_body(response).await;
                Err(LedgerError::CreditRejected {
                    user: user.to_string(),
                    key: idempotency_key.to_string(),
                    reason: format!("{status}: {} {}", body.code, body.message),
                }
                .into())
            }
        }
    }
}

impl UserDirectory for HttpLedgerClient {
    async fn exists(&self, user: &UserId) -> Result<bool> {
        let response = self
            .client
            .get(self.url(&format!("/users/{}/exists", user.as_str())))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => {
                let body: ExistsResponse = response
                    .json()
                    .await
                    .map_err(|e| Error::Parse(e.to_string()))?;
                Ok(body.exists)
            }
            status => Err(LedgerError::Unavailable(format!(
                "directory lookup failed with {status}"
            ))
            .into()),
        }
    }
}
