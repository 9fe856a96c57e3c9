//! Decision source reached over HTTP.
//!
//! The snapshot is POSTed as JSON and the service answers with `{"actions": [...]}` using the
//! tagged action format. Any transport, status or decoding problem is reported as an
//! [`OracleError`]; the orchestrator's own timeout bounds the whole exchange.

use crate::oracle::{DecisionFut, DecisionOracle};
use crate::{OracleError, OracleResult};
use serde::Deserialize;
use wardflow_core::{Action, WorldSnapshot};

#[derive(Debug, Deserialize)]
struct DecisionBatch {
    actions: Vec<Action>,
}

#[derive(Debug, Clone)]
pub struct HttpOracle {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl HttpOracle {
    /// # Errors
    ///
    /// Returns [`OracleError::Unavailable`] if `url` is not a valid absolute URL.
    pub fn new(url: &str) -> OracleResult<Self> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| OracleError::Unavailable(format!("invalid oracle url '{url}': {e}")))?;
        Ok(Self {
            client: reqwest::Client::new(),
            url,
        })
    }

    pub fn url(&self) -> &reqwest::Url {
        &self.url
    }

    async fn request(&self, snapshot: &WorldSnapshot) -> OracleResult<Vec<Action>> {
        let response = self
            .client
            .post(self.url.clone())
            .json(snapshot)
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Unavailable(format!("HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        let batch: DecisionBatch =
            serde_json::from_slice(&body).map_err(|e| OracleError::Parse(e.to_string()))?;

        tracing::debug!("oracle at {} proposed {} actions", self.url, batch.actions.len());
        Ok(batch.actions)
    }
}

impl DecisionOracle for HttpOracle {
    fn name(&self) -> &'static str {
        "http"
    }

    fn decide<'a>(&'a self, snapshot: &'a WorldSnapshot) -> DecisionFut<'a> {
        Box::pin(self.request(snapshot))
    }
}
