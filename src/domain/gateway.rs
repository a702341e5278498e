use super::sponsorship::SponsorshipStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Structured codes the gateway uses for subscriptions that no longer exist
/// or can no longer change state.
pub const TERMINAL_CODES: &[&str] = &["resource_missing", "subscription_canceled"];

/// Message fragments that indicate the same condition when no code is sent.
const TERMINAL_MESSAGE_FRAGMENTS: &[&str] = &[
    "no such subscription",
    "canceled subscription",
    "already canceled",
];

/// What the gateway does with invoices while collection is paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionBehavior {
    /// Invoices are voided; nothing is owed for the paused period.
    Void,
    KeepAsDraft,
    MarkUncollectible,
}

/// Subscription state as the gateway sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayState {
    Active,
    Paused,
    Canceled,
    /// Unknown to the gateway.
    Missing,
}

impl GatewayState {
    /// The gateway state a consistent local record implies.
    pub fn mirroring(status: SponsorshipStatus) -> Self {
        match status {
            SponsorshipStatus::Paused => GatewayState::Paused,
            SponsorshipStatus::Canceled => GatewayState::Canceled,
            _ => GatewayState::Active,
        }
    }
}

/// A failed call to the payment gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct GatewayError {
    pub code: Option<String>,
    pub message: String,
    pub timed_out: bool,
}

impl GatewayError {
    pub fn new(code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code: code.map(str::to_string),
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn resource_missing(subscription_id: &str) -> Self {
        Self::new(
            Some("resource_missing"),
            format!("No such subscription: '{subscription_id}'"),
        )
    }

    pub fn already_canceled() -> Self {
        Self::new(
            None,
            "A canceled subscription can only update its cancellation_details and metadata.",
        )
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Some("api_connection_error"), message)
    }

    pub fn timeout(after: Duration) -> Self {
        Self {
            code: None,
            message: format!("gateway call timed out after {}ms", after.as_millis()),
            timed_out: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayFailure {
    /// The subscription is already in its end state at the gateway.
    AlreadyTerminal,
    /// Anything else; the record is left for a later pass.
    Transient,
}

/// How gateway errors are sorted into [`GatewayFailure`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorClassifier {
    /// Structured code first, then message fragments.
    #[default]
    CodeOrMessage,
    /// Structured code only.
    CodeOnly,
}

impl ErrorClassifier {
    pub fn classify(&self, error: &GatewayError) -> GatewayFailure {
        if error.timed_out {
            return GatewayFailure::Transient;
        }
        if error
            .code
            .as_deref()
            .is_some_and(|code| TERMINAL_CODES.contains(&code))
        {
            return GatewayFailure::AlreadyTerminal;
        }
        if *self == ErrorClassifier::CodeOrMessage {
            let message = error.message.to_lowercase();
            if TERMINAL_MESSAGE_FRAGMENTS
                .iter()
                .any(|fragment| message.contains(fragment))
            {
                return GatewayFailure::AlreadyTerminal;
            }
        }
        GatewayFailure::Transient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_missing_code_is_terminal() {
        let err = GatewayError::new(Some("resource_missing"), "whatever");
        assert_eq!(
            ErrorClassifier::CodeOnly.classify(&err),
            GatewayFailure::AlreadyTerminal
        );
        assert_eq!(
            ErrorClassifier::CodeOrMessage.classify(&err),
            GatewayFailure::AlreadyTerminal
        );
    }

    #[test]
    fn test_message_fallback() {
        let err = GatewayError::already_canceled();
        assert_eq!(
            ErrorClassifier::CodeOrMessage.classify(&err),
            GatewayFailure::AlreadyTerminal
        );
        // Strict mode ignores prose.
        assert_eq!(
            ErrorClassifier::CodeOnly.classify(&err),
            GatewayFailure::Transient
        );

        let err = GatewayError::new(None, "No Such Subscription: 'sub_9'");
        assert_eq!(
            ErrorClassifier::CodeOrMessage.classify(&err),
            GatewayFailure::AlreadyTerminal
        );
    }

    #[test]
    fn test_timeout_is_never_terminal() {
        let mut err = GatewayError::timeout(Duration::from_millis(250));
        assert_eq!(
            ErrorClassifier::CodeOrMessage.classify(&err),
            GatewayFailure::Transient
        );
        err.code = Some("resource_missing".to_string());
        assert_eq!(
            ErrorClassifier::CodeOrMessage.classify(&err),
            GatewayFailure::Transient
        );
    }

    #[test]
    fn test_gateway_state_mirrors_local_status() {
        assert_eq!(
            GatewayState::mirroring(SponsorshipStatus::Confirmed),
            GatewayState::Active
        );
        assert_eq!(
            GatewayState::mirroring(SponsorshipStatus::Paused),
            GatewayState::Paused
        );
        assert_eq!(
            GatewayState::mirroring(SponsorshipStatus::Canceled),
            GatewayState::Canceled
        );
    }

    #[test]
    fn test_other_errors_are_transient() {
        let err = GatewayError::unavailable("connection reset by peer");
        assert_eq!(
            ErrorClassifier::CodeOrMessage.classify(&err),
            GatewayFailure::Transient
        );
        let err = GatewayError::new(Some("rate_limit"), "Too many requests");
        assert_eq!(
            ErrorClassifier::CodeOrMessage.classify(&err),
            GatewayFailure::Transient
        );
    }
}
