//! Rate limit header parsing.
//!
//! Upstreams do not agree on header names. Wynncraft sends
//! `x-ratelimit-remaining-minute` and `ratelimit-reset`; the rest follow the
//! [IETF draft](https://datatracker.ietf.org/doc/draft-ietf-httpapi-ratelimit-headers/)
//! in one spelling or another.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};

const REMAINING_HEADERS: &[&str] = &[
    "x-ratelimit-remaining-minute",
    "x-ratelimit-remaining",
    "ratelimit-remaining",
];

const RESET_HEADERS: &[&str] = &["ratelimit-reset", "x-ratelimit-reset"];

/// Rate limit information carried by one response.
///
/// Every field is optional; a missing or unparsable header leaves the
/// corresponding budget value untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitFeedback {
    /// Calls left in the current upstream window.
    pub remaining: Option<u32>,
    /// Time until the upstream window resets.
    pub reset_after: Option<Duration>,
    /// `Retry-After` delay, only sent with 429 responses.
    pub retry_after: Option<Duration>,
}

impl RateLimitFeedback {
    /// Extract rate limit information from response headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            remaining: parse_header_value(headers, REMAINING_HEADERS),
            reset_after: parse_header_value::<u64>(headers, RESET_HEADERS)
                .map(Duration::from_secs),
            retry_after: parse_header_value::<u64>(headers, &[RETRY_AFTER.as_str()])
                .map(Duration::from_secs),
        }
    }

    /// Feedback for a 429 response: the budget is spent until the upstream
    /// says otherwise.
    pub fn exhausted(&self) -> Self {
        Self {
            remaining: Some(0),
            reset_after: self.retry_after.or(self.reset_after),
            retry_after: self.retry_after,
        }
    }

    /// Check if the response carried any rate limit information.
    pub fn is_empty(&self) -> bool {
        self.remaining.is_none() && self.reset_after.is_none() && self.retry_after.is_none()
    }
}

/// Parse the first of `header_names` that holds a valid number.
fn parse_header_value<T: std::str::FromStr>(headers: &HeaderMap, header_names: &[&str]) -> Option<T> {
    header_names.iter().find_map(|header_name| {
        headers
            .get(*header_name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<T>().ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_wynncraft_headers() {
        let feedback = RateLimitFeedback::from_headers(&headers(&[
            ("x-ratelimit-remaining-minute", "118"),
            ("ratelimit-reset", "42"),
        ]));

        assert_eq!(feedback.remaining, Some(118));
        assert_eq!(feedback.reset_after, Some(Duration::from_secs(42)));
        assert_eq!(feedback.retry_after, None);
    }

    #[test]
    fn test_fallback_header_names() {
        let feedback = RateLimitFeedback::from_headers(&headers(&[
            ("ratelimit-remaining", "7"),
            ("x-ratelimit-reset", "3"),
        ]));

        assert_eq!(feedback.remaining, Some(7));
        assert_eq!(feedback.reset_after, Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_invalid_header_falls_through_to_next_name() {
        let feedback = RateLimitFeedback::from_headers(&headers(&[
            ("x-ratelimit-remaining-minute", "many"),
            ("x-ratelimit-remaining", " 12 "),
        ]));

        assert_eq!(feedback.remaining, Some(12));
    }

    #[test]
    fn test_missing_or_invalid_headers_are_ignored() {
        assert!(RateLimitFeedback::from_headers(&HeaderMap::new()).is_empty());

        let feedback = RateLimitFeedback::from_headers(&headers(&[
            ("x-ratelimit-remaining-minute", "-1"),
            ("ratelimit-reset", "soon"),
        ]));
        assert!(feedback.is_empty());
    }

    #[test]
    fn test_exhausted_prefers_retry_after() {
        let feedback = RateLimitFeedback::from_headers(&headers(&[
            ("ratelimit-reset", "30"),
            ("retry-after", "5"),
        ]));

        let exhausted = feedback.exhausted();
        assert_eq!(exhausted.remaining, Some(0));
        assert_eq!(exhausted.reset_after, Some(Duration::from_secs(5)));
    }
}
