//! Filing status state machine
//!
//! `pending -> submitted -> (processing) -> accepted | rejected`
//!
//! Both reconciliation paths (webhook push and scheduled poll) funnel
//! provider statuses through [`map_provider_status`] and then
//! [`FilingStatus::can_transition_to`], so they always agree on whether a
//! write is allowed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;

/// Stored status of a filing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilingStatus {
    Pending,
    Submitted,
    Processing,
    Accepted,
    Rejected,
}

impl FilingStatus {
    /// Statuses the poll reconciler considers unresolved
    pub const POLLABLE: [FilingStatus; 2] = [FilingStatus::Pending, FilingStatus::Submitted];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilingStatus::Pending => "pending",
            FilingStatus::Submitted => "submitted",
            FilingStatus::Processing => "processing",
            FilingStatus::Accepted => "accepted",
            FilingStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FilingStatus::Accepted | FilingStatus::Rejected)
    }

    fn rank(&self) -> u8 {
        match self {
            FilingStatus::Pending => 0,
            FilingStatus::Submitted => 1,
            FilingStatus::Processing => 2,
            FilingStatus::Accepted | FilingStatus::Rejected => 3,
        }
    }

    /// Whether a stored status may be overwritten by `incoming`
    ///
    /// Terminal statuses never change, `pending` is never written over
    /// anything, and a status never moves backwards (late or reordered
    /// deliveries are dropped).
    pub fn can_transition_to(&self, incoming: FilingStatus) -> bool {
        if self.is_terminal() || incoming == FilingStatus::Pending || incoming == *self {
            return false;
        }
        incoming.rank() > self.rank()
    }
}

impl fmt::Display for FilingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilingStatus {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FilingStatus::Pending),
            "submitted" => Ok(FilingStatus::Submitted),
            "processing" => Ok(FilingStatus::Processing),
            "accepted" => Ok(FilingStatus::Accepted),
            "rejected" => Ok(FilingStatus::Rejected),
            other => Err(ReconcileError::InvalidPayload(format!(
                "unknown filing status '{}'",
                other
            ))),
        }
    }
}

/// Map a provider record status onto the local state machine
///
/// `"Pending"` maps to [`FilingStatus::Pending`], which the transition rule
/// never applies; every unrecognised provider status means the filing is
/// still in flight.
pub fn map_provider_status(provider_status: &str) -> FilingStatus {
    let status = provider_status.trim();
    if status.eq_ignore_ascii_case("accepted") {
        FilingStatus::Accepted
    } else if status.eq_ignore_ascii_case("rejected") {
        FilingStatus::Rejected
    } else if status.eq_ignore_ascii_case("pending") {
        FilingStatus::Pending
    } else {
        FilingStatus::Processing
    }
}

/// Tax form types handled by the e-filing provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormType {
    #[serde(rename = "w2")]
    W2,
    #[serde(rename = "1099-nec")]
    Form1099Nec,
    #[serde(rename = "1099-misc")]
    Form1099Misc,
    #[serde(rename = "1099-int")]
    Form1099Int,
    #[serde(rename = "1099-div")]
    Form1099Div,
}

impl FormType {
    pub const ALL: [FormType; 5] = [
        FormType::W2,
        FormType::Form1099Nec,
        FormType::Form1099Misc,
        FormType::Form1099Int,
        FormType::Form1099Div,
    ];

    /// Value stored in the `form_type` column
    pub fn as_str(&self) -> &'static str {
        match self {
            FormType::W2 => "w2",
            FormType::Form1099Nec => "1099-nec",
            FormType::Form1099Misc => "1099-misc",
            FormType::Form1099Int => "1099-int",
            FormType::Form1099Div => "1099-div",
        }
    }

    /// Path segment used by the provider's API (`/v1/{FormType}/Status`)
    pub fn provider_path(&self) -> &'static str {
        match self {
            FormType::W2 => "FormW2",
            FormType::Form1099Nec => "Form1099NEC",
            FormType::Form1099Misc => "Form1099MISC",
            FormType::Form1099Int => "Form1099INT",
            FormType::Form1099Div => "Form1099DIV",
        }
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormType {
    type Err = ReconcileError;

    /// Accepts both the stored form (`1099-nec`) and the provider form
    /// (`Form1099NEC`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        let normalized = normalized
            .strip_prefix("form")
            .unwrap_or(normalized.as_str());

        match normalized {
            "w2" => Ok(FormType::W2),
            "1099nec" => Ok(FormType::Form1099Nec),
            "1099misc" => Ok(FormType::Form1099Misc),
            "1099int" => Ok(FormType::Form1099Int),
            "1099div" => Ok(FormType::Form1099Div),
            _ => Err(ReconcileError::InvalidPayload(format!(
                "unknown form type '{}'",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [FilingStatus; 5] = [
        FilingStatus::Pending,
        FilingStatus::Submitted,
        FilingStatus::Processing,
        FilingStatus::Accepted,
        FilingStatus::Rejected,
    ];

    #[test]
    fn test_provider_status_mapping() {
        assert_eq!(map_provider_status("Accepted"), FilingStatus::Accepted);
        assert_eq!(map_provider_status("Rejected"), FilingStatus::Rejected);
        assert_eq!(map_provider_status("ACCEPTED"), FilingStatus::Accepted);
        assert_eq!(map_provider_status("Pending"), FilingStatus::Pending);
        assert_eq!(map_provider_status("Transmitted"), FilingStatus::Processing);
        assert_eq!(map_provider_status(""), FilingStatus::Processing);
    }

    #[test]
    fn test_terminal_statuses_never_transition() {
        for stored in [FilingStatus::Accepted, FilingStatus::Rejected] {
            for incoming in ALL_STATUSES {
                assert!(
                    !stored.can_transition_to(incoming),
                    "{} must not move to {}",
                    stored,
                    incoming
                );
            }
        }
    }

    #[test]
    fn test_pending_is_never_applied() {
        for stored in ALL_STATUSES {
            assert!(!stored.can_transition_to(FilingStatus::Pending));
        }
    }

    #[test]
    fn test_forward_transitions_allowed() {
        assert!(FilingStatus::Pending.can_transition_to(FilingStatus::Submitted));
        assert!(FilingStatus::Pending.can_transition_to(FilingStatus::Accepted));
        assert!(FilingStatus::Submitted.can_transition_to(FilingStatus::Processing));
        assert!(FilingStatus::Submitted.can_transition_to(FilingStatus::Rejected));
        assert!(FilingStatus::Processing.can_transition_to(FilingStatus::Accepted));
    }

    #[test]
    fn test_backwards_and_same_status_rejected() {
        assert!(!FilingStatus::Processing.can_transition_to(FilingStatus::Submitted));
        assert!(!FilingStatus::Processing.can_transition_to(FilingStatus::Processing));
        assert!(!FilingStatus::Submitted.can_transition_to(FilingStatus::Submitted));
    }

    #[test]
    fn test_form_type_parses_both_spellings() {
        assert_eq!("1099-nec".parse::<FormType>().unwrap(), FormType::Form1099Nec);
        assert_eq!("Form1099NEC".parse::<FormType>().unwrap(), FormType::Form1099Nec);
        assert_eq!("FormW2".parse::<FormType>().unwrap(), FormType::W2);
        assert_eq!("W-2".parse::<FormType>().unwrap(), FormType::W2);
        assert!("1040".parse::<FormType>().is_err());
    }

    #[test]
    fn test_status_round_trips_through_column_value() {
        for status in ALL_STATUSES {
            assert_eq!(status.as_str().parse::<FilingStatus>().unwrap(), status);
        }
    }
}
