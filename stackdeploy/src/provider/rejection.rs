//! Provider rejection reasons.
//!
//! The provider only signals why it refused a mutation through free text.
//! This is the one place that text is matched; everything downstream works
//! with [`RejectionCode`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why the provider refused a create or update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionCode {
    /// The stack does not exist yet.
    StackDoesNotExist,
    /// The template matches what is deployed.
    NoUpdates,
    /// A create is already running on the stack.
    CreateInProgress,
    /// An update is already running on the stack.
    UpdateInProgress,
    /// A delete is already running on the stack.
    DeleteInProgress,
    /// Anything else.
    Other,
}

/// Reason fragments in match order. First hit wins.
const REASON_PATTERNS: [(&str, RejectionCode); 5] = [
    ("does not exist", RejectionCode::StackDoesNotExist),
    ("No updates are to be performed", RejectionCode::NoUpdates),
    ("CREATE_IN_PROGRESS", RejectionCode::CreateInProgress),
    ("UPDATE_IN_PROGRESS", RejectionCode::UpdateInProgress),
    ("DELETE_IN_PROGRESS", RejectionCode::DeleteInProgress),
];

impl RejectionCode {
    /// Classifies a rejection reason (case-sensitive substring match).
    #[must_use]
    pub fn from_reason(reason: &str) -> Self {
        REASON_PATTERNS
            .iter()
            .find(|(fragment, _)| reason.contains(fragment))
            .map_or(Self::Other, |(_, code)| *code)
    }
}

impl fmt::Display for RejectionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackDoesNotExist => write!(f, "stack_does_not_exist"),
            Self::NoUpdates => write!(f, "no_updates"),
            Self::CreateInProgress => write!(f, "create_in_progress"),
            Self::UpdateInProgress => write!(f, "update_in_progress"),
            Self::DeleteInProgress => write!(f, "delete_in_progress"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// A refused mutation: the classified code plus the provider's own words.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{reason}")]
pub struct Rejection {
    /// Classified code.
    pub code: RejectionCode,
    /// Verbatim reason text.
    pub reason: String,
}

impl Rejection {
    /// Creates a rejection by classifying its reason.
    #[must_use]
    pub fn from_reason(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            code: RejectionCode::from_reason(&reason),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reason_fixtures() {
        let fixtures = [
            (
                "An error occurred (ValidationError) when calling the UpdateStack operation: Stack [shop-app] does not exist",
                RejectionCode::StackDoesNotExist,
            ),
            (
                "An error occurred (ValidationError) when calling the UpdateStack operation: No updates are to be performed.",
                RejectionCode::NoUpdates,
            ),
            (
                "An error occurred (ValidationError) when calling the UpdateStack operation: Stack:arn:aws:cloudformation:us-east-1:1:stack/shop/abc is in CREATE_IN_PROGRESS state and can not be updated.",
                RejectionCode::CreateInProgress,
            ),
            (
                "Stack:arn:aws:cloudformation:us-east-1:1:stack/shop/abc is in UPDATE_IN_PROGRESS state and can not be updated.",
                RejectionCode::UpdateInProgress,
            ),
            (
                "Stack:arn:aws:cloudformation:us-east-1:1:stack/shop/abc is in DELETE_IN_PROGRESS state and can not be updated.",
                RejectionCode::DeleteInProgress,
            ),
            ("Template format error: unsupported structure.", RejectionCode::Other),
            ("", RejectionCode::Other),
        ];

        for (reason, expected) in fixtures {
            assert_eq!(RejectionCode::from_reason(reason), expected, "{reason}");
        }
    }

    #[test]
    fn test_match_is_case_sensitive() {
        assert_eq!(RejectionCode::from_reason("DOES NOT EXIST"), RejectionCode::Other);
        assert_eq!(
            RejectionCode::from_reason("no updates are to be performed"),
            RejectionCode::Other
        );
        assert_eq!(
            RejectionCode::from_reason("is in update_in_progress state"),
            RejectionCode::Other
        );
    }

    #[test]
    fn test_first_match_wins() {
        // Both fragments present: "does not exist" is checked first.
        let reason = "Stack does not exist while UPDATE_IN_PROGRESS";
        assert_eq!(RejectionCode::from_reason(reason), RejectionCode::StackDoesNotExist);

        let reason = "UPDATE_IN_PROGRESS after CREATE_IN_PROGRESS";
        assert_eq!(RejectionCode::from_reason(reason), RejectionCode::CreateInProgress);
    }

    #[test]
    fn test_rejection_display_is_verbatim() {
        let rejection = Rejection::from_reason("Template format error");
        assert_eq!(rejection.code, RejectionCode::Other);
        assert_eq!(rejection.to_string(), "Template format error");
    }
}
