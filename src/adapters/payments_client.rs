use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use crate::domain::{CreateAccountHolderRequest, CreateAccountHolderResponse, ProviderError};
use crate::error::PaymentsError;
use crate::ports::AccountHolderApi;

/// HTTP client for the payments marketplace account service.
#[derive(Clone)]
pub struct PaymentsClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl PaymentsClient {
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

        PaymentsClient {
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
}

/// Failures that count against the circuit breaker. A 4xx rejection concerns
/// one account holder, not the health of the payments API.
pub fn is_outage(error: &PaymentsError) -> bool {
    match error {
        PaymentsError::Api { status, .. } => *status >= 500,
        _ => true,
    }
}

#[async_trait]
impl AccountHolderApi for PaymentsClient {
    async fn create_account_holder(
        &self,
        request: &CreateAccountHolderRequest,
    ) -> Result<CreateAccountHolderResponse, PaymentsError> {
        let url = format!("{}/createAccountHolder", self.base_url.trim_end_matches('/'));
        let http_request = self
            .client
            .post(&url)
            .header("X-API-Key", self.api_key.expose_secret())
            .json(request);

        let result = self
            .circuit_breaker
            .call_with(is_outage, async move {
                let response = http_request.send().await?;
                let status = response.status();
                let body = response.text().await?;

                if !status.is_success() {
                    let error = serde_json::from_str::<ProviderError>(&body).map_err(|_| {
                        PaymentsError::InvalidResponse(format!(
                            "status {} with unparseable body: {}",
                            status.as_u16(),
                            body
                        ))
                    })?;
                    return Err(PaymentsError::Api {
                        status: status.as_u16(),
                        error,
                    });
                }

                serde_json::from_str::<CreateAccountHolderResponse>(&body)
                    .map_err(|e| PaymentsError::InvalidResponse(e.to_string()))
            })
            .await;

        match result {
            Ok(response) => Ok(response),
            Err(FailsafeError::Rejected) => Err(PaymentsError::CircuitBreakerOpen(
                "payments API circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}
