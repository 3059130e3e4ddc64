//! Remote Collection Store client.
//!
//! [`Remote`] is the seam between the sync engine and the network; the
//! production implementation is [`HttpRemote`], tests substitute their own.

use async_trait::async_trait;
use gramseva_types::api::{
    ErrorResponse, HealthResponse, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
    SettleBillResponse, SuccessResponse,
};
use gramseva_types::{Account, Collection, OFFICER_KEYS, Payment};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    /// Connection refused, DNS failure, timeout.
    #[error("server unreachable: {0}")]
    Unreachable(String),
    /// Non-2xx with the server's `{error}` message.
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// True when the server could not do its job at all: unreachable or 5xx.
    pub fn is_connectivity(&self) -> bool {
        match self {
            RemoteError::Unreachable(_) => true,
            RemoteError::Status { status, .. } => *status >= 500,
            RemoteError::Decode(_) => false,
        }
    }

    /// HTTP status, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::Decode(e.to_string())
        } else {
            RemoteError::Unreachable(e.to_string())
        }
    }
}

/// Everything the client asks of the server.
#[async_trait]
pub trait Remote: Send + Sync {
    async fn health(&self) -> Result<(), RemoteError>;

    /// Entire collection as a JSON array.
    async fn fetch(&self, collection: Collection) -> Result<Value, RemoteError>;

    /// Replace the collection wholesale.
    async fn push(&self, collection: Collection, value: &Value) -> Result<(), RemoteError>;

    async fn officer_keys(&self) -> Result<Vec<String>, RemoteError>;

    async fn login(&self, req: &LoginRequest) -> Result<Account, RemoteError>;

    async fn register(&self, req: &RegisterRequest) -> Result<RegisterResponse, RemoteError>;

    async fn settle_bill(&self, bill_id: &str, payment: &Payment) -> Result<SettleBillResponse, RemoteError>;
}

/// [`Remote`] over the `/api` HTTP surface.
pub struct HttpRemote {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpRemote {
    pub fn new(config: &ClientConfig) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        self.config.api_url(path)
    }
}

/// Decode a 2xx body, or turn anything else into [`RemoteError::Status`].
async fn decode<T: DeserializeOwned>(res: reqwest::Response) -> Result<T, RemoteError> {
    let status = res.status();
    if !status.is_success() {
        return Err(status_error(status, res).await);
    }
    Ok(res.json::<T>().await?)
}

async fn status_error(status: StatusCode, res: reqwest::Response) -> RemoteError {
    let message = match res.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
    };
    RemoteError::Status {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl Remote for HttpRemote {
    async fn health(&self) -> Result<(), RemoteError> {
        let res = self.http.get(self.url("health")).send().await?;
        let body: HealthResponse = decode(res).await?;
        if body.status == "ok" {
            Ok(())
        } else {
            Err(RemoteError::Decode(format!("health status {}", body.status)))
        }
    }

    async fn fetch(&self, collection: Collection) -> Result<Value, RemoteError> {
        let res = self.http.get(self.url(collection.name())).send().await?;
        let value: Value = decode(res).await?;
        if !value.is_array() {
            return Err(RemoteError::Decode(format!("{collection} is not an array")));
        }
        debug!(collection = %collection, "fetched");
        Ok(value)
    }

    async fn push(&self, collection: Collection, value: &Value) -> Result<(), RemoteError> {
        let res = self.http.post(self.url(collection.name())).json(value).send().await?;
        let _: SuccessResponse = decode(res).await?;
        Ok(())
    }

    async fn officer_keys(&self) -> Result<Vec<String>, RemoteError> {
        let res = self.http.get(self.url(OFFICER_KEYS)).send().await?;
        decode(res).await
    }

    async fn login(&self, req: &LoginRequest) -> Result<Account, RemoteError> {
        let res = self.http.post(self.url("auth/login")).json(req).send().await?;
        let body: LoginResponse = decode(res).await?;
        Ok(body.account)
    }

    async fn register(&self, req: &RegisterRequest) -> Result<RegisterResponse, RemoteError> {
        let res = self.http.post(self.url("auth/register")).json(req).send().await?;
        decode(res).await
    }

    async fn settle_bill(&self, bill_id: &str, payment: &Payment) -> Result<SettleBillResponse, RemoteError> {
        let res = self
            .http
            .post(self.url(&format!("bills/{bill_id}/settle")))
            .json(payment)
            .send()
            .await?;
        decode(res).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_classification() {
        assert!(RemoteError::Unreachable("refused".into()).is_connectivity());
        let io = RemoteError::Status {
            status: 500,
            message: "disk full".into(),
        };
        assert!(io.is_connectivity());
        let conflict = RemoteError::Status {
            status: 409,
            message: "bill BILL-1 is already paid".into(),
        };
        assert!(!conflict.is_connectivity());
        assert_eq!(conflict.status(), Some(409));
        assert_eq!(conflict.to_string(), "bill BILL-1 is already paid");
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let mut config = ClientConfig::new("http://127.0.0.1:9", "/tmp/unused");
        config.request_timeout = std::time::Duration::from_secs(2);
        let remote = HttpRemote::new(&config).unwrap();
        let err = remote.fetch(Collection::Bills).await.unwrap_err();
        assert!(err.is_connectivity(), "{err:?}");
    }
}
