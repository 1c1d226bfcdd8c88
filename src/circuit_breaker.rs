use failsafe::{backoff, failure_policy, Config, StateMachine};
use std::time::Duration;

use crate::errors::AppError;

/// Breaker guarding the outbound identity-provider calls.
pub type ProviderBreaker =
    StateMachine<failure_policy::ConsecutiveFailures<backoff::Exponential>, ()>;

/// Creates a circuit breaker for identity-provider requests.
///
/// # Configuration
///
/// - **Failure threshold**: 5 consecutive transport failures trigger OPEN state.
/// - **Backoff**: Exponential backoff from 10s to 60s before attempting recovery.
///
/// # States
///
/// - **CLOSED**: Normal operation, requests pass through.
/// - **OPEN**: Too many failures, requests fail fast.
/// - **HALF_OPEN**: Testing if the provider recovered.
///
/// Only transport errors are recorded; a provider answering 401 is a healthy
/// provider.
pub fn create_provider_circuit_breaker() -> ProviderBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(10), // Initial delay
        Duration::from_secs(60), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(5, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}

/// Maps a breaker outcome for `provider` onto `AppError`.
pub fn provider_error(provider: &str, err: failsafe::Error<reqwest::Error>) -> AppError {
    match err {
        failsafe::Error::Rejected => {
            tracing::warn!("{} circuit open, failing fast", provider);
            AppError::ExternalApiError(format!("{} is temporarily unavailable", provider))
        }
        failsafe::Error::Inner(e) => {
            AppError::ExternalApiError(format!("{} request failed: {}", provider, e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use failsafe::{CircuitBreaker, Error};

    #[test]
    fn test_circuit_breaker_opens_after_failures() {
        let cb = create_provider_circuit_breaker();

        // Simulate 5 consecutive failures
        for _ in 0..5 {
            let result: Result<(), Error<&str>> = cb.call(|| Err::<(), &str>("connection reset"));
            assert!(result.is_err());
        }

        // Next call should be rejected (circuit is open)
        let result: Result<(), Error<&str>> = cb.call(|| Ok::<(), &str>(()));

        match result {
            Err(Error::Rejected) => {}
            _ => panic!("Expected circuit to be open and reject requests"),
        }
    }

    #[test]
    fn test_circuit_breaker_allows_success() {
        let cb = create_provider_circuit_breaker();

        let result: Result<i32, Error<&str>> = cb.call(|| Ok::<i32, &str>(42));

        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn rejected_maps_to_bad_gateway() {
        let err = provider_error("Google tokeninfo", Error::Rejected);
        assert_eq!(err.status(), axum::http::StatusCode::BAD_GATEWAY);
    }
}
