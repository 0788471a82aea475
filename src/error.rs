//! Error types for the niabot API client library.

use reqwest::StatusCode;
use thiserror::Error;

/// The main error type for all upstream API operations.
#[derive(Error, Debug)]
pub enum NiaError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP request with middleware failed
    #[error("HTTP request failed: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// A reservation asked for more calls than are currently free.
    #[error("Insufficient capacity: requested {requested} calls, {available} available")]
    InsufficientCapacity {
        /// Number of calls the caller tried to reserve
        requested: u32,
        /// Free calls at the time of the request
        available: u32,
    },

    /// A reservation was used for more requests than it was granted.
    #[error("Reservation of {amount} calls is exhausted")]
    ReservationExhausted {
        /// Number of calls the reservation was granted
        amount: u32,
    },

    /// The upstream answered 429 despite local budgeting.
    #[error("Rate limit exceeded, retry after {retry_after_ms:?}ms")]
    RateLimited {
        /// Suggested wait time in milliseconds before retrying
        retry_after_ms: Option<u64>,
    },

    /// The upstream answered with an unexpected error status.
    #[error("Unexpected HTTP status {status}: {body}")]
    Status {
        /// Response status code
        status: StatusCode,
        /// Response body, as text
        body: String,
    },

    /// Invalid response from the API
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The caller passed arguments the upstream would reject.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl NiaError {
    /// Check if the failure is worth retrying later.
    ///
    /// Covers network failures, 5xx responses and upstream 429s. The client
    /// never retries on its own; this only classifies the error for the caller.
    pub fn is_transient(&self) -> bool {
        match self {
            NiaError::Http(_) | NiaError::HttpMiddleware(_) => true,
            NiaError::RateLimited { .. } => true,
            NiaError::Status { status, .. } => status.is_server_error(),
            _ => false,
        }
    }

    /// Check if this is a local capacity refusal (reservation too large or used up).
    pub fn is_not_enough_capacity(&self) -> bool {
        matches!(
            self,
            NiaError::InsufficientCapacity { .. } | NiaError::ReservationExhausted { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let server = NiaError::Status {
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
        };
        assert!(server.is_transient());

        let client = NiaError::Status {
            status: StatusCode::BAD_REQUEST,
            body: "bad".to_string(),
        };
        assert!(!client.is_transient());

        assert!(NiaError::RateLimited { retry_after_ms: None }.is_transient());
        assert!(
            !NiaError::InsufficientCapacity {
                requested: 3,
                available: 1
            }
            .is_transient()
        );
    }

    #[tokio::test]
    async fn test_network_failure_is_transient() {
        // Nothing listens on port 1.
        let url = "http://127.0.0.1:1/";

        let err = reqwest::Client::new().get(url).send().await.unwrap_err();
        let err = NiaError::from(err);
        assert!(matches!(err, NiaError::Http(_)));
        assert!(err.is_transient());

        let client = reqwest_middleware::ClientBuilder::new(reqwest::Client::new()).build();
        let err = NiaError::from(client.get(url).send().await.unwrap_err());
        assert!(matches!(err, NiaError::HttpMiddleware(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_error_display() {
        let error = NiaError::InsufficientCapacity {
            requested: 80,
            available: 70,
        };
        assert_eq!(
            error.to_string(),
            "Insufficient capacity: requested 80 calls, 70 available"
        );
        assert!(error.is_not_enough_capacity());
    }
}
