use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

/// Listing lifecycle of a firm.
///
/// ```text
/// Draft ──submit──▶ AwaitingReview ──approve──▶ Approved ──activate──▶ Active
///                      ▲        └──reject──▶ Rejected                    │
///                      └────────resubmit──────┘          suspend ◀───────┘
///                                                   Suspended ──reinstate──▶ Active
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "firm_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum FirmStatus {
    Draft,
    AwaitingReview,
    Approved,
    Rejected,
    Active,
    Suspended,
}

/// Events that move a firm between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmAction {
    Submit,
    Approve,
    Reject,
    Activate,
    Suspend,
    Reinstate,
}

impl Display for FirmAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FirmAction::Submit => write!(f, "submit"),
            FirmAction::Approve => write!(f, "approve"),
            FirmAction::Reject => write!(f, "reject"),
            FirmAction::Activate => write!(f, "activate"),
            FirmAction::Suspend => write!(f, "suspend"),
            FirmAction::Reinstate => write!(f, "reinstate"),
        }
    }
}

impl FirmStatus {
    /// Apply `action` to the current status.
    ///
    /// Approve and reject are only legal from `AwaitingReview`; nothing else leaves it.
    pub fn apply(self, action: FirmAction) -> Result<FirmStatus, AppError> {
        use FirmAction::*;
        use FirmStatus::*;

        let next = match (self, action) {
            (Draft, Submit) | (Rejected, Submit) => Some(AwaitingReview),
            (AwaitingReview, Approve) => Some(Approved),
            (AwaitingReview, Reject) => Some(Rejected),
            (Approved, Activate) => Some(Active),
            (Approved, Suspend) | (Active, Suspend) => Some(Suspended),
            (Suspended, Reinstate) => Some(Active),
            _ => None,
        };

        next.ok_or_else(|| AppError::InvalidStateTransition {
            from: self.to_string(),
            to: action.to_string(),
        })
    }

    /// Status after the owner edits the profile: published listings go back to review.
    pub fn after_edit(self) -> FirmStatus {
        match self {
            FirmStatus::Approved | FirmStatus::Active => FirmStatus::AwaitingReview,
            other => other,
        }
    }

    /// Visible to anonymous visitors.
    pub fn is_public(self) -> bool {
        matches!(self, FirmStatus::Approved | FirmStatus::Active)
    }
}

impl Display for FirmStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FirmStatus::Draft => write!(f, "draft"),
            FirmStatus::AwaitingReview => write!(f, "awaiting_review"),
            FirmStatus::Approved => write!(f, "approved"),
            FirmStatus::Rejected => write!(f, "rejected"),
            FirmStatus::Active => write!(f, "active"),
            FirmStatus::Suspended => write!(f, "suspended"),
        }
    }
}

impl FromStr for FirmStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(FirmStatus::Draft),
            "awaiting_review" => Ok(FirmStatus::AwaitingReview),
            "approved" => Ok(FirmStatus::Approved),
            "rejected" => Ok(FirmStatus::Rejected),
            "active" => Ok(FirmStatus::Active),
            "suspended" => Ok(FirmStatus::Suspended),
            _ => Err(anyhow::anyhow!("Invalid firm status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Firm {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: FirmStatus,
    pub rejection_reason: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FirmContact {
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(length(max = 200))]
    pub contact_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FirmLinks {
    #[validate(url(message = "Invalid URL"))]
    pub website: Option<String>,
    #[validate(url(message = "Invalid URL"))]
    pub linkedin: Option<String>,
    #[validate(url(message = "Invalid URL"))]
    pub twitter: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FirmLocation {
    #[validate(length(max = 300))]
    pub address_line: Option<String>,
    #[validate(length(max = 120))]
    pub city: Option<String>,
    #[validate(length(max = 20))]
    pub postal_code: Option<String>,
    #[validate(length(equal = 2, message = "Use an ISO 3166-1 alpha-2 country code"))]
    pub country: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
}

/// Firm with its profile sub-records and selected services.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FirmDetails {
    #[serde(flatten)]
    pub firm: Firm,
    pub contact: FirmContact,
    pub links: FirmLinks,
    pub location: FirmLocation,
    pub service_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct CreateFirmRequest {
    #[validate(length(min = 2, max = 200, message = "Name must be 2-200 characters"))]
    pub name: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct UpdateFirmRequest {
    #[validate(length(min = 2, max = 200, message = "Name must be 2-200 characters"))]
    pub name: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(nested)]
    #[serde(default)]
    pub contact: FirmContact,
    #[validate(nested)]
    #[serde(default)]
    pub links: FirmLinks,
    #[validate(nested)]
    #[serde(default)]
    pub location: FirmLocation,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateFirmServicesRequest {
    pub service_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct RejectFirmRequest {
    #[validate(length(min = 1, max = 2000, message = "A reason is required"))]
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FirmListQuery {
    pub status: Option<FirmStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_lifecycle() {
        let status = FirmStatus::Draft;
        let status = status.apply(FirmAction::Submit).unwrap();
        assert_eq!(status, FirmStatus::AwaitingReview);
        let status = status.apply(FirmAction::Approve).unwrap();
        assert_eq!(status, FirmStatus::Approved);
        let status = status.apply(FirmAction::Activate).unwrap();
        assert_eq!(status, FirmStatus::Active);
        let status = status.apply(FirmAction::Suspend).unwrap();
        assert_eq!(status, FirmStatus::Suspended);
        let status = status.apply(FirmAction::Reinstate).unwrap();
        assert_eq!(status, FirmStatus::Active);
    }

    #[test]
    fn test_approve_requires_awaiting_review() {
        for status in [
            FirmStatus::Draft,
            FirmStatus::Approved,
            FirmStatus::Rejected,
            FirmStatus::Active,
            FirmStatus::Suspended,
        ] {
            let err = status.apply(FirmAction::Approve).unwrap_err();
            assert!(matches!(err, AppError::InvalidStateTransition { .. }));
        }
    }

    #[test]
    fn test_reject_then_resubmit() {
        let status = FirmStatus::AwaitingReview
            .apply(FirmAction::Reject)
            .unwrap();
        assert_eq!(status, FirmStatus::Rejected);
        assert_eq!(
            status.apply(FirmAction::Submit).unwrap(),
            FirmStatus::AwaitingReview
        );
    }

    #[test]
    fn test_only_review_actions_leave_awaiting_review() {
        for action in [
            FirmAction::Submit,
            FirmAction::Activate,
            FirmAction::Suspend,
            FirmAction::Reinstate,
        ] {
            assert!(FirmStatus::AwaitingReview.apply(action).is_err());
        }
    }

    #[test]
    fn test_editing_published_firm_requires_new_review() {
        assert_eq!(FirmStatus::Active.after_edit(), FirmStatus::AwaitingReview);
        assert_eq!(FirmStatus::Approved.after_edit(), FirmStatus::AwaitingReview);
        assert_eq!(FirmStatus::Draft.after_edit(), FirmStatus::Draft);
        assert_eq!(FirmStatus::Suspended.after_edit(), FirmStatus::Suspended);
    }

    #[test]
    fn test_status_round_trips_through_str() {
        let parsed: FirmStatus = "awaiting_review".parse().unwrap();
        assert_eq!(parsed, FirmStatus::AwaitingReview);
        assert_eq!(parsed.to_string(), "awaiting_review");
    }
}
