use crate::errors::{AppError, AppResult};
use crate::models::{
    AddResponsePayload, AssignComplaintPayload, AuthenticatePayload, BooleanResponse, ListComplaintsFilters,
    SetComplaintStatusPayload, SubmitComplaintPayload,
};
use crate::AppState;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const GENERIC_CLIENT_ERROR: &str = "Something went wrong, please try again.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdArgs {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserArgs {
    user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgencyArgs {
    agency_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordArgs {
    raw: String,
}

/// Runs the named command against `state`. Errors come back as client-facing strings.
pub fn invoke(state: &AppState, command: &str, args: Value) -> Result<Value, String> {
    dispatch(state, command, args).map_err(to_client_error)
}

fn dispatch(state: &AppState, command: &str, args: Value) -> AppResult<Value> {
    let service = &state.service;
    match command {
        "authenticate" => {
            let payload: AuthenticatePayload = parse_args(args)?;
            reply(service.authenticate(&payload.email, payload.role)?)
        }
        "logout" => {
            service.logout()?;
            reply(BooleanResponse { success: true })
        }
        "current_user" => reply(service.current_user()?),
        "list_users" => reply(service.list_users()?),
        "get_user" => {
            let IdArgs { id } = parse_args(args)?;
            reply(service.get_user(&id)?)
        }
        "list_agencies" => reply(service.list_agencies()?),
        "submit_complaint" => {
            let payload: SubmitComplaintPayload = parse_args(args)?;
            reply(service.submit_complaint(payload)?)
        }
        "assign_complaint" => {
            let payload: AssignComplaintPayload = parse_args(args)?;
            reply(service.assign_complaint(payload)?)
        }
        "set_complaint_status" => {
            let payload: SetComplaintStatusPayload = parse_args(args)?;
            reply(service.set_complaint_status(payload)?)
        }
        "add_response" => {
            let payload: AddResponsePayload = parse_args(args)?;
            reply(service.add_response(payload)?)
        }
        "list_complaints" => {
            let filters: ListComplaintsFilters = if args.is_null() {
                ListComplaintsFilters::default()
            } else {
                parse_args(args)?
            };
            reply(service.list_complaints(&filters)?)
        }
        "get_complaint" => {
            let IdArgs { id } = parse_args(args)?;
            reply(service.get_complaint(&id)?)
        }
        "complaints_by_user" => {
            let UserArgs { user_id } = parse_args(args)?;
            reply(service.complaints_by_user(&user_id)?)
        }
        "complaints_by_agency" => {
            let AgencyArgs { agency_id } = parse_args(args)?;
            reply(service.complaints_by_agency(&agency_id)?)
        }
        "notifications_for_user" => {
            let UserArgs { user_id } = parse_args(args)?;
            reply(service.notifications_for_user(&user_id)?)
        }
        "mark_notification_read" => {
            let IdArgs { id } = parse_args(args)?;
            reply(BooleanResponse {
                success: service.mark_notification_read(&id)?,
            })
        }
        "get_statistics" => reply(service.statistics()?),
        "agency_summary" => {
            let AgencyArgs { agency_id } = parse_args(args)?;
            reply(service.agency_summary(&agency_id)?)
        }
        "reset_store" => {
            service.reset_store()?;
            reply(BooleanResponse { success: true })
        }
        "export_record" => reply(state.database.export_json()?),
        "import_record" => {
            let RecordArgs { raw } = parse_args(args)?;
            reply(service.import_record(&raw)?)
        }
        other => Err(AppError::NotFound(format!("Unknown command '{}'", other))),
    }
}

fn parse_args<T: DeserializeOwned>(args: Value) -> AppResult<T> {
    serde_json::from_value(args).map_err(|error| AppError::Validation(format!("invalid arguments: {}", error)))
}

fn reply<T: Serialize>(value: T) -> AppResult<Value> {
    Ok(serde_json::to_value(value)?)
}

fn to_client_error(error: AppError) -> String {
    if error.is_user_facing() {
        return error.to_string();
    }
    tracing::error!(error = %error, "command failed");
    GENERIC_CLIENT_ERROR.to_string()
}
