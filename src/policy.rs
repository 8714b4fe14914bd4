use crate::errors::{AppError, AppResult};
use crate::models::{Complaint, ComplaintStatus, SubmitComplaintPayload, User, UserRole};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const MAX_ATTACHMENTS: usize = 10;

static ATTACHMENT_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://\S+$").expect("valid attachment regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionPolicy {
    #[default]
    Strict,
    Permissive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    SubmitComplaint,
    AssignComplaint,
    UpdateStatus,
    Respond,
}

impl Capability {
    fn as_str(self) -> &'static str {
        match self {
            Self::SubmitComplaint => "submit complaints",
            Self::AssignComplaint => "assign complaints",
            Self::UpdateStatus => "change complaint status",
            Self::Respond => "respond to complaints",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    transitions: TransitionPolicy,
    enforce_capabilities: bool,
}

impl PolicyEngine {
    pub fn new(transitions: TransitionPolicy, enforce_capabilities: bool) -> Self {
        Self {
            transitions,
            enforce_capabilities,
        }
    }

    pub fn enforces_capabilities(&self) -> bool {
        self.enforce_capabilities
    }

    /// Checks `actor` may exercise `capability`, optionally against a specific complaint.
    pub fn authorize(&self, actor: &User, capability: Capability, complaint: Option<&Complaint>) -> AppResult<()> {
        if !self.enforce_capabilities {
            return Ok(());
        }

        let assigned_agency = || {
            actor.role == UserRole::Agency
                && complaint
                    .and_then(|complaint| complaint.assigned_to.as_deref())
                    .is_some_and(|assignee| assignee == actor.id)
        };

        let allowed = match capability {
            Capability::SubmitComplaint => matches!(actor.role, UserRole::Citizen | UserRole::Admin),
            Capability::AssignComplaint => actor.role == UserRole::Admin,
            Capability::UpdateStatus | Capability::Respond => actor.role == UserRole::Admin || assigned_agency(),
        };

        if allowed {
            Ok(())
        } else {
            Err(AppError::Policy(format!(
                "{} '{}' may not {}",
                actor.role.as_str(),
                actor.id,
                capability.as_str()
            )))
        }
    }

    pub fn validate_transition(&self, from: ComplaintStatus, to: ComplaintStatus) -> AppResult<()> {
        if self.transitions == TransitionPolicy::Permissive || is_legal_transition(from, to) {
            return Ok(());
        }
        Err(AppError::Policy(format!(
            "Status change {} -> {} is not allowed",
            from.as_str(),
            to.as_str()
        )))
    }

    pub fn validate_submission(&self, payload: &SubmitComplaintPayload) -> AppResult<()> {
        if payload.submitted_by.trim().is_empty() {
            return Err(AppError::Validation("Submitter is required".to_string()));
        }
        require_text("Title", &payload.title)?;
        require_text("Description", &payload.description)?;
        require_text("Location", &payload.location)?;

        if let Some(attachments) = &payload.attachments {
            if attachments.len() > MAX_ATTACHMENTS {
                return Err(AppError::Validation(format!(
                    "At most {} attachments are allowed",
                    MAX_ATTACHMENTS
                )));
            }
            if let Some(bad) = attachments.iter().find(|url| !ATTACHMENT_URL.is_match(url)) {
                return Err(AppError::Validation(format!("Attachment '{}' is not an http(s) URL", bad)));
            }
        }
        Ok(())
    }

    pub fn validate_response_text(&self, text: &str) -> AppResult<()> {
        require_text("Response", text)
    }
}

/// Assignment is the only way into `in-review`, so it never appears as a target here.
pub fn is_legal_transition(from: ComplaintStatus, to: ComplaintStatus) -> bool {
    use ComplaintStatus::*;
    if from == to {
        return true;
    }
    matches!(
        (from, to),
        (InReview, InProgress)
            | (InReview, Resolved)
            | (InReview, Rejected)
            | (InProgress, Resolved)
            | (InProgress, Rejected)
            | (Resolved, InProgress)
            | (Rejected, InProgress)
    )
}

/// Whitespace-only counts as missing. The stored value is left as typed.
fn require_text(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(())
}
