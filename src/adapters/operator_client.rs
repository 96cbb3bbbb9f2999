use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use crate::domain::ShopPage;
use crate::error::OperatorError;
use crate::ports::{ShopQuery, ShopSource};

/// HTTP client for the marketplace-operator shop listing (`GET /api/shops`).
#[derive(Clone)]
pub struct OperatorClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl OperatorClient {
    pub fn new(base_url: String, api_key: SecretString, timeout: Duration) -> Self {
        Self::with_circuit_breaker(base_url, api_key, timeout, 3, 60)
    }

    pub fn with_circuit_breaker(
        base_url: String,
        api_key: SecretString,
        timeout: Duration,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        OperatorClient {
            client,
            base_url,
            api_key,
            circuit_breaker,
        }
    }

    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }

    fn query_params(query: &ShopQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("paginate", query.paginate.to_string()),
            ("offset", query.offset.to_string()),
        ];
        if let Some(since) = query.updated_since {
            params.push(("updated_since", since.to_rfc3339()));
        }
        if !query.shop_ids.is_empty() {
            params.push(("shop_ids", query.shop_ids.join(",")));
        }
        params
    }
}

#[async_trait]
impl ShopSource for OperatorClient {
    async fn get_shops(&self, query: &ShopQuery) -> Result<ShopPage, OperatorError> {
        let url = format!("{}/api/shops", self.base_url.trim_end_matches('/'));
        let request = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, self.api_key.expose_secret())
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&Self::query_params(query));

        let result = self
            .circuit_breaker
            .call(async move {
                let response = request.send().await?;
                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(OperatorError::UnexpectedStatus {
                        status: status.as_u16(),
                        body,
                    });
                }

                let body = response.text().await?;
                serde_json::from_str::<ShopPage>(&body)
                    .map_err(|e| OperatorError::InvalidResponse(e.to_string()))
            })
            .await;

        match result {
            Ok(page) => {
                tracing::debug!(
                    offset = query.offset,
                    returned = page.shops.len(),
                    total_count = page.total_count,
                    "Fetched shop page"
                );
                Ok(page)
            }
            Err(FailsafeError::Rejected) => Err(OperatorError::CircuitBreakerOpen(
                "operator API circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}
