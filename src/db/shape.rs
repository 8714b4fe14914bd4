use crate::errors::{AppError, AppResult};
use crate::models::AppRecord;
use once_cell::sync::Lazy;
use serde_json::Value;

static RECORD_SCHEMA: Lazy<Value> = Lazy::new(|| {
    let timestamp = serde_json::json!({ "type": "string", "minLength": 1 });
    let user = serde_json::json!({
        "type": "object",
        "required": ["id", "name", "email", "role"],
        "properties": {
            "id": { "type": "string" },
            "name": { "type": "string" },
            "email": { "type": "string" },
            "role": { "enum": ["citizen", "admin", "agency"] },
            "department": { "type": ["string", "null"] }
        }
    });
    serde_json::json!({
        "type": "object",
        "required": ["users", "complaints", "notifications"],
        "properties": {
            "users": { "type": "array", "items": user },
            "complaints": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": [
                        "id", "title", "description", "category", "location",
                        "status", "priority", "submittedBy", "submittedAt"
                    ],
                    "properties": {
                        "status": { "enum": ["pending", "in-review", "in-progress", "resolved", "rejected"] },
                        "priority": { "enum": ["low", "medium", "high", "urgent"] },
                        "category": {
                            "enum": ["water", "electricity", "roads", "sanitation", "public-safety", "other"]
                        },
                        "submittedAt": timestamp,
                        "assignedTo": { "type": ["string", "null"] },
                        "attachments": { "type": ["array", "null"], "items": { "type": "string" } },
                        "responses": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["id", "complaintId", "text", "respondedBy", "respondedAt"],
                                "properties": { "respondedAt": timestamp }
                            }
                        }
                    }
                }
            },
            "notifications": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id", "userId", "message", "createdAt"],
                    "properties": {
                        "read": { "type": "boolean" },
                        "createdAt": timestamp,
                        "relatedTo": {
                            "type": ["object", "null"],
                            "required": ["type", "id"],
                            "properties": { "type": { "enum": ["complaint", "response"] } }
                        }
                    }
                }
            },
            "currentUser": { "oneOf": [{ "type": "null" }, user] },
            "isAuthenticated": { "type": "boolean" }
        }
    })
});

static RECORD_VALIDATOR: Lazy<Result<jsonschema::JSONSchema, String>> =
    Lazy::new(|| jsonschema::JSONSchema::compile(&RECORD_SCHEMA).map_err(|error| error.to_string()));

/// Parses a stored blob, rejecting anything that does not have the record's shape.
pub fn parse_record(raw: &str) -> AppResult<AppRecord> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|error| AppError::MalformedRecord(vec![format!("stored record is not JSON: {}", error)]))?;

    let errors = shape_errors(&value)?;
    if !errors.is_empty() {
        return Err(AppError::MalformedRecord(errors));
    }

    serde_json::from_value(value).map_err(|error| AppError::MalformedRecord(vec![error.to_string()]))
}

fn shape_errors(value: &Value) -> AppResult<Vec<String>> {
    let compiled = RECORD_VALIDATOR
        .as_ref()
        .map_err(|error| AppError::Internal(format!("record schema failed to compile: {}", error)))?;

    let errors = compiled
        .validate(value)
        .err()
        .map(|errors| {
            errors
                .map(|error| {
                    let path = error.instance_path.to_string();
                    if path.is_empty() {
                        error.to_string()
                    } else {
                        format!("{}: {}", path, error)
                    }
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    Ok(errors)
}
