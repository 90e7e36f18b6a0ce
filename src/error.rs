//! Error taxonomy shared by adapters, normalization and the aggregator.

use thiserror::Error;

use crate::report::ProviderId;

/// Why a traffic fetch did not produce a report.
///
/// Adapters classify transport and shape failures; everything above them
/// passes the variant through unchanged. `Clone` so a single in-flight
/// result can be handed to every waiter on the same cache key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("not signed in")]
    Unauthenticated,
    #[error("upstream unreachable")]
    UpstreamUnreachable,
    #[error("upstream rejected request with status {status}: {message}")]
    UpstreamRejected { status: u16, message: String },
    #[error("upstream response could not be parsed")]
    UnparsableResponse,
    #[error("no data for domain")]
    NoDataForDomain,
    #[error("upstream rate limit hit")]
    RateLimited,
    #[error("invalid domain: {0:?}")]
    InvalidDomain(String),
    #[error("provider {0} is not configured")]
    ProviderNotConfigured(ProviderId),
}

impl FetchError {
    /// Stable snake_case tag, used for metric labels and API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Unauthenticated => "unauthenticated",
            FetchError::UpstreamUnreachable => "upstream_unreachable",
            FetchError::UpstreamRejected { .. } => "upstream_rejected",
            FetchError::UnparsableResponse => "unparsable_response",
            FetchError::NoDataForDomain => "no_data_for_domain",
            FetchError::RateLimited => "rate_limited",
            FetchError::InvalidDomain(_) => "invalid_domain",
            FetchError::ProviderNotConfigured(_) => "provider_not_configured",
        }
    }

    /// Short text a dashboard can show next to the search box.
    pub fn user_message(&self) -> String {
        match self {
            FetchError::Unauthenticated => "Please sign in to view traffic data.".to_string(),
            FetchError::UpstreamUnreachable => {
                "The traffic provider could not be reached. Please try again.".to_string()
            }
            FetchError::UpstreamRejected { status, .. } => {
                format!("The traffic provider rejected the request (HTTP {status}).")
            }
            FetchError::UnparsableResponse => {
                "The traffic provider returned data we could not read.".to_string()
            }
            FetchError::NoDataForDomain => {
                "No data available for the entered website.".to_string()
            }
            FetchError::RateLimited => {
                "Too many requests to the traffic provider. Please wait a moment.".to_string()
            }
            FetchError::InvalidDomain(_) => "Please enter a valid website domain.".to_string(),
            FetchError::ProviderNotConfigured(p) => {
                format!("The {} data source is not available.", p.display_name())
            }
        }
    }

    /// 401/403 from an upstream means the session token is dead.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(
            self,
            FetchError::UpstreamRejected { status: 401 | 403, .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_rejection_only_for_401_and_403() {
        let e401 = FetchError::UpstreamRejected {
            status: 401,
            message: "expired".into(),
        };
        let e403 = FetchError::UpstreamRejected {
            status: 403,
            message: String::new(),
        };
        let e500 = FetchError::UpstreamRejected {
            status: 500,
            message: String::new(),
        };
        assert!(e401.is_auth_rejection());
        assert!(e403.is_auth_rejection());
        assert!(!e500.is_auth_rejection());
        assert!(!FetchError::Unauthenticated.is_auth_rejection());
    }

    #[test]
    fn user_messages_are_short_and_non_empty() {
        for e in [
            FetchError::Unauthenticated,
            FetchError::UpstreamUnreachable,
            FetchError::UnparsableResponse,
            FetchError::NoDataForDomain,
            FetchError::RateLimited,
            FetchError::InvalidDomain(" ".into()),
        ] {
            let msg = e.user_message();
            assert!(!msg.is_empty());
            assert!(msg.len() < 100, "message too long: {msg}");
        }
    }
}
