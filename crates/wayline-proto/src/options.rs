//! Per-call options

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options for a single call.
///
/// The default waits for exactly one response with no deadline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOptions {
    /// Fire-and-forget: send without waiting for any response
    pub no_response: bool,
    /// Deadline for the exchange, enforced by the transport
    pub timeout: Option<Duration>,
    /// Routing hint passed through to the transport untouched
    pub route: Option<String>,
}

impl CallOptions {
    /// Options for a fire-and-forget call
    pub fn no_response() -> Self {
        Self {
            no_response: true,
            ..Default::default()
        }
    }

    /// Set the call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the route hint
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_waits_for_response() {
        let opts = CallOptions::default();
        assert!(!opts.no_response);
        assert_eq!(opts.timeout, None);
        assert_eq!(opts.route, None);
    }

    #[test]
    fn test_builder() {
        let opts = CallOptions::no_response()
            .with_timeout(Duration::from_secs(5))
            .with_route("conn:wsl://Ubuntu");

        assert!(opts.no_response);
        assert_eq!(opts.timeout, Some(Duration::from_secs(5)));
        assert_eq!(opts.route.as_deref(), Some("conn:wsl://Ubuntu"));
    }
}
