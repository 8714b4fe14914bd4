use crate::errors::{AppError, AppResult};
use crate::models::{
    AppRecord, Complaint, ComplaintCategory, ComplaintPriority, ComplaintStatus, Notification, RelatedKind,
    RelatedTo, Response, User, UserRole,
};
use chrono::{DateTime, Utc};

/// Fixed demo dataset written the first time an empty slot is loaded.
pub fn seed_record() -> AppResult<AppRecord> {
    let users = vec![
        seed_user("1", "John Citizen", "citizen@example.com", UserRole::Citizen, None),
        seed_user("2", "Admin User", "admin@gov.example", UserRole::Admin, None),
        seed_user("3", "Water Department", "water@gov.example", UserRole::Agency, Some("water")),
        seed_user("4", "Roads Department", "roads@gov.example", UserRole::Agency, Some("roads")),
    ];

    let complaints = vec![
        Complaint {
            id: "1".to_string(),
            title: "Pothole on Main Street".to_string(),
            description: "Large pothole causing traffic hazards near the intersection of Main and 1st Ave.".to_string(),
            category: ComplaintCategory::Roads,
            location: "Main Street & 1st Avenue".to_string(),
            status: ComplaintStatus::InProgress,
            priority: ComplaintPriority::High,
            submitted_by: "1".to_string(),
            submitted_at: at("2025-04-01T10:30:00Z")?,
            assigned_to: Some("4".to_string()),
            responses: vec![Response {
                id: "1".to_string(),
                complaint_id: "1".to_string(),
                text: "We have dispatched a team to assess the damage. Repairs will be scheduled within 48 hours."
                    .to_string(),
                responded_by: "4".to_string(),
                responded_at: at("2025-04-02T09:15:00Z")?,
            }],
            attachments: None,
        },
        Complaint {
            id: "2".to_string(),
            title: "Water outage in Riverside neighborhood".to_string(),
            description: "No water supply since yesterday evening in the entire Riverside area.".to_string(),
            category: ComplaintCategory::Water,
            location: "Riverside neighborhood".to_string(),
            status: ComplaintStatus::Resolved,
            priority: ComplaintPriority::High,
            submitted_by: "1".to_string(),
            submitted_at: at("2025-04-02T18:45:00Z")?,
            assigned_to: Some("3".to_string()),
            responses: vec![
                Response {
                    id: "2".to_string(),
                    complaint_id: "2".to_string(),
                    text: "A main water pipe burst has been identified. Emergency repair crews are on site."
                        .to_string(),
                    responded_by: "3".to_string(),
                    responded_at: at("2025-04-02T20:30:00Z")?,
                },
                Response {
                    id: "3".to_string(),
                    complaint_id: "2".to_string(),
                    text: "Repairs have been completed and water service has been restored to all affected areas."
                        .to_string(),
                    responded_by: "3".to_string(),
                    responded_at: at("2025-04-03T08:45:00Z")?,
                },
            ],
            attachments: None,
        },
    ];

    let notifications = vec![
        Notification {
            id: "1".to_string(),
            user_id: "1".to_string(),
            message: "Your complaint about the pothole has been updated with a new response.".to_string(),
            read: false,
            created_at: at("2025-04-02T09:15:00Z")?,
            related_to: Some(RelatedTo {
                kind: RelatedKind::Complaint,
                id: "1".to_string(),
            }),
        },
        Notification {
            id: "2".to_string(),
            user_id: "1".to_string(),
            message: "Your water outage complaint has been marked as resolved.".to_string(),
            read: false,
            created_at: at("2025-04-03T08:45:00Z")?,
            related_to: Some(RelatedTo {
                kind: RelatedKind::Complaint,
                id: "2".to_string(),
            }),
        },
    ];

    Ok(AppRecord {
        users,
        complaints,
        notifications,
        current_user: None,
        is_authenticated: false,
    })
}

fn seed_user(id: &str, name: &str, email: &str, role: UserRole, department: Option<&str>) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        role,
        department: department.map(ToString::to_string),
    }
}

fn at(raw: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| AppError::Internal(format!("invalid seed timestamp {}: {}", raw, error)))
}
