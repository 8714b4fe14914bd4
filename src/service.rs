use crate::db::{parse_record, RecordStore};
use crate::errors::{AppError, AppResult};
use crate::models::{
    AddResponsePayload, AgencySummary, AppRecord, AssignComplaintPayload, Complaint, ComplaintSortKey,
    ComplaintStatistics, ComplaintStatus, ListComplaintsFilters, Notification, RelatedKind, RelatedTo, Response,
    SetComplaintStatusPayload, SortOrder, SubmitComplaintPayload, User, UserRole,
};
use crate::policy::{Capability, PolicyEngine};
use crate::stats;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Domain operations and read views over a single persisted record.
pub struct ComplaintService {
    store: Arc<dyn RecordStore>,
    policy: PolicyEngine,
    write_lock: Mutex<()>,
}

impl ComplaintService {
    pub fn new(store: Arc<dyn RecordStore>, policy: PolicyEngine) -> Self {
        Self {
            store,
            policy,
            write_lock: Mutex::new(()),
        }
    }

    /// Read-modify-write under the writer lock. Saves only when `apply` changed the record.
    fn mutate<T>(&self, apply: impl FnOnce(&mut AppRecord) -> AppResult<T>) -> AppResult<T> {
        let _guard = self.write_guard()?;

        let before = self.store.load()?;
        let mut record = before.clone();
        let value = apply(&mut record)?;
        if record != before {
            self.store.save(&record)?;
        }
        Ok(value)
    }

    fn write_guard(&self) -> AppResult<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| AppError::Internal("writer lock poisoned".to_string()))
    }

    /// Drops the stored record under the writer lock; the next read re-seeds it.
    pub fn reset_store(&self) -> AppResult<()> {
        let _guard = self.write_guard()?;
        self.store.reset()?;
        tracing::info!("record store reset to seed data");
        Ok(())
    }

    /// Replaces the stored record with `raw` once it parses as a record.
    pub fn import_record(&self, raw: &str) -> AppResult<AppRecord> {
        let record = parse_record(raw)?;
        let _guard = self.write_guard()?;
        self.store.save(&record)?;
        tracing::info!(
            users = record.users.len(),
            complaints = record.complaints.len(),
            "record imported"
        );
        Ok(record)
    }

    fn authorize(
        &self,
        record: &AppRecord,
        actor_id: &str,
        capability: Capability,
        complaint: Option<&Complaint>,
    ) -> AppResult<()> {
        if !self.policy.enforces_capabilities() {
            return Ok(());
        }
        let actor = record
            .user(actor_id)
            .ok_or_else(|| AppError::Policy(format!("Unknown user '{}'", actor_id)))?;
        self.policy.authorize(actor, capability, complaint)
    }

    pub fn authenticate(&self, email: &str, role: UserRole) -> AppResult<Option<User>> {
        self.mutate(|record| {
            let Some(user) = record
                .users
                .iter()
                .find(|user| user.email == email && user.role == role)
                .cloned()
            else {
                tracing::info!(role = role.as_str(), "authentication failed");
                return Ok(None);
            };

            record.current_user = Some(user.clone());
            record.is_authenticated = true;
            tracing::info!(user_id = %user.id, role = role.as_str(), "user authenticated");
            Ok(Some(user))
        })
    }

    pub fn logout(&self) -> AppResult<()> {
        self.mutate(|record| {
            if let Some(user) = record.current_user.take() {
                tracing::info!(user_id = %user.id, "user logged out");
            }
            record.is_authenticated = false;
            Ok(())
        })
    }

    pub fn current_user(&self) -> AppResult<Option<User>> {
        let record = self.store.load()?;
        Ok(record.current_user.filter(|_| record.is_authenticated))
    }

    pub fn submit_complaint(&self, payload: SubmitComplaintPayload) -> AppResult<Complaint> {
        self.policy.validate_submission(&payload)?;

        self.mutate(|record| {
            self.authorize(record, &payload.submitted_by, Capability::SubmitComplaint, None)?;

            let complaint = Complaint {
                id: fresh_id(|id| record.complaints.iter().any(|complaint| complaint.id == id)),
                title: payload.title.clone(),
                description: payload.description.clone(),
                category: payload.category,
                location: payload.location.clone(),
                status: ComplaintStatus::Pending,
                priority: payload.priority,
                submitted_by: payload.submitted_by.clone(),
                submitted_at: Utc::now(),
                assigned_to: None,
                responses: Vec::new(),
                attachments: payload.attachments.clone().filter(|urls| !urls.is_empty()),
            };

            record.complaints.push(complaint.clone());
            tracing::info!(
                complaint_id = %complaint.id,
                submitted_by = %complaint.submitted_by,
                category = complaint.category.as_str(),
                priority = complaint.priority.as_str(),
                "complaint submitted"
            );
            Ok(complaint)
        })
    }

    /// Sets the assignee and forces `in-review`, whatever the prior status was.
    pub fn assign_complaint(&self, payload: AssignComplaintPayload) -> AppResult<Option<Complaint>> {
        self.mutate(|record| {
            let Some(existing) = record.complaint(&payload.complaint_id) else {
                tracing::debug!(complaint_id = %payload.complaint_id, "assign skipped: unknown complaint");
                return Ok(None);
            };
            self.authorize(record, &payload.actor_id, Capability::AssignComplaint, Some(existing))?;

            if !record
                .user(&payload.agency_id)
                .is_some_and(|user| user.role == UserRole::Agency)
            {
                tracing::warn!(agency_id = %payload.agency_id, "assigning complaint to a non-agency user");
            }

            let Some(complaint) = record.complaint_mut(&payload.complaint_id) else {
                return Ok(None);
            };
            let previous = complaint.status;
            complaint.assigned_to = Some(payload.agency_id.clone());
            complaint.status = ComplaintStatus::InReview;
            tracing::info!(
                complaint_id = %complaint.id,
                agency_id = %payload.agency_id,
                from = previous.as_str(),
                "complaint assigned"
            );
            Ok(Some(complaint.clone()))
        })
    }

    pub fn set_complaint_status(&self, payload: SetComplaintStatusPayload) -> AppResult<Option<Complaint>> {
        self.mutate(|record| {
            let Some(existing) = record.complaint(&payload.complaint_id) else {
                tracing::debug!(complaint_id = %payload.complaint_id, "status change skipped: unknown complaint");
                return Ok(None);
            };
            self.authorize(record, &payload.actor_id, Capability::UpdateStatus, Some(existing))?;
            self.policy.validate_transition(existing.status, payload.status)?;

            let Some(complaint) = record.complaint_mut(&payload.complaint_id) else {
                return Ok(None);
            };
            let previous = complaint.status;
            complaint.status = payload.status;
            tracing::info!(
                complaint_id = %complaint.id,
                from = previous.as_str(),
                to = payload.status.as_str(),
                actor_id = %payload.actor_id,
                "complaint status changed"
            );
            Ok(Some(complaint.clone()))
        })
    }

    /// Appends a response and notifies the original submitter. Unknown complaints are a no-op.
    pub fn add_response(&self, payload: AddResponsePayload) -> AppResult<Option<Response>> {
        self.policy.validate_response_text(&payload.text)?;

        self.mutate(|record| {
            let Some(existing) = record.complaint(&payload.complaint_id) else {
                tracing::debug!(complaint_id = %payload.complaint_id, "response skipped: unknown complaint");
                return Ok(None);
            };
            self.authorize(record, &payload.responded_by, Capability::Respond, Some(existing))?;

            let response_id = fresh_id(|id| {
                record
                    .complaints
                    .iter()
                    .flat_map(|complaint| complaint.responses.iter())
                    .any(|response| response.id == id)
            });
            let response = Response {
                id: response_id,
                complaint_id: payload.complaint_id.clone(),
                text: payload.text.clone(),
                responded_by: payload.responded_by.clone(),
                responded_at: Utc::now(),
            };

            let Some(complaint) = record.complaint_mut(&payload.complaint_id) else {
                return Ok(None);
            };
            complaint.responses.push(response.clone());
            let submitter = complaint.submitted_by.clone();
            let message = format!("Your complaint \"{}\" has received a new response.", complaint.title);

            push_notification(
                record,
                &submitter,
                message,
                Some(RelatedTo {
                    kind: RelatedKind::Response,
                    id: response.id.clone(),
                }),
            );
            tracing::info!(
                complaint_id = %response.complaint_id,
                response_id = %response.id,
                responded_by = %response.responded_by,
                notified = %submitter,
                "response added"
            );
            Ok(Some(response))
        })
    }

    pub fn add_notification(
        &self,
        user_id: &str,
        message: &str,
        related_to: Option<RelatedTo>,
    ) -> AppResult<Notification> {
        if message.trim().is_empty() {
            return Err(AppError::Validation("Notification message is required".to_string()));
        }
        self.mutate(|record| Ok(push_notification(record, user_id, message.to_string(), related_to)))
    }

    /// Returns whether a notification with `id` exists. Marking twice is the same as once.
    pub fn mark_notification_read(&self, id: &str) -> AppResult<bool> {
        self.mutate(|record| {
            let Some(notification) = record.notifications.iter_mut().find(|notification| notification.id == id)
            else {
                return Ok(false);
            };
            if !notification.read {
                notification.read = true;
                tracing::debug!(notification_id = %id, "notification marked read");
            }
            Ok(true)
        })
    }

    pub fn list_users(&self) -> AppResult<Vec<User>> {
        Ok(self.store.load()?.users)
    }

    pub fn get_user(&self, id: &str) -> AppResult<Option<User>> {
        Ok(self.store.load()?.user(id).cloned())
    }

    pub fn list_agencies(&self) -> AppResult<Vec<User>> {
        Ok(self
            .store
            .load()?
            .users
            .into_iter()
            .filter(|user| user.role == UserRole::Agency)
            .collect())
    }

    pub fn list_complaints(&self, filters: &ListComplaintsFilters) -> AppResult<Vec<Complaint>> {
        let complaints = self.store.load()?.complaints;
        Ok(filter_complaints(complaints, filters))
    }

    pub fn get_complaint(&self, id: &str) -> AppResult<Option<Complaint>> {
        Ok(self.store.load()?.complaint(id).cloned())
    }

    pub fn complaints_by_user(&self, user_id: &str) -> AppResult<Vec<Complaint>> {
        Ok(self
            .store
            .load()?
            .complaints
            .into_iter()
            .filter(|complaint| complaint.submitted_by == user_id)
            .collect())
    }

    pub fn complaints_by_agency(&self, agency_id: &str) -> AppResult<Vec<Complaint>> {
        Ok(self
            .store
            .load()?
            .complaints
            .into_iter()
            .filter(|complaint| complaint.assigned_to.as_deref() == Some(agency_id))
            .collect())
    }

    pub fn notifications_for_user(&self, user_id: &str) -> AppResult<Vec<Notification>> {
        Ok(self
            .store
            .load()?
            .notifications
            .into_iter()
            .filter(|notification| notification.user_id == user_id)
            .collect())
    }

    pub fn unread_notification_count(&self, user_id: &str) -> AppResult<usize> {
        Ok(self
            .notifications_for_user(user_id)?
            .iter()
            .filter(|notification| !notification.read)
            .count())
    }

    pub fn statistics(&self) -> AppResult<ComplaintStatistics> {
        Ok(stats::complaint_statistics(&self.store.load()?.complaints))
    }

    pub fn agency_summary(&self, agency_id: &str) -> AppResult<AgencySummary> {
        Ok(stats::agency_summary(agency_id, &self.store.load()?.complaints))
    }
}

fn push_notification(
    record: &mut AppRecord,
    user_id: &str,
    message: String,
    related_to: Option<RelatedTo>,
) -> Notification {
    let notification = Notification {
        id: fresh_id(|id| record.notifications.iter().any(|notification| notification.id == id)),
        user_id: user_id.to_string(),
        message,
        read: false,
        created_at: Utc::now(),
        related_to,
    };
    record.notifications.push(notification.clone());
    notification
}

fn fresh_id(taken: impl Fn(&str) -> bool) -> String {
    loop {
        let id = Uuid::new_v4().to_string();
        if !taken(&id) {
            return id;
        }
    }
}

pub fn filter_complaints(complaints: Vec<Complaint>, filters: &ListComplaintsFilters) -> Vec<Complaint> {
    let needle = filters
        .search
        .as_deref()
        .map(|search| search.trim().to_lowercase())
        .filter(|search| !search.is_empty());

    let mut matched: Vec<Complaint> = complaints
        .into_iter()
        .filter(|complaint| {
            let matches_search = needle.as_deref().map_or(true, |needle| {
                complaint.title.to_lowercase().contains(needle)
                    || complaint.description.to_lowercase().contains(needle)
                    || complaint.location.to_lowercase().contains(needle)
            });
            matches_search
                && filters.status.map_or(true, |status| complaint.status == status)
                && filters.category.map_or(true, |category| complaint.category == category)
        })
        .collect();

    matched.sort_by(|a, b| {
        let ordering = match filters.sort_by {
            ComplaintSortKey::Date => a.submitted_at.cmp(&b.submitted_at),
            ComplaintSortKey::Priority => a.priority.rank().cmp(&b.priority.rank()),
        };
        match filters.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
    matched
}

#[cfg(test)]
mod tests {
    use super::{filter_complaints, ComplaintService};
    use crate::db::{MemoryStore, RecordStore};
    use crate::errors::{AppError, AppResult};
    use crate::models::{
        AddResponsePayload, AppRecord, AssignComplaintPayload, ComplaintCategory, ComplaintPriority, ComplaintSortKey,
        ComplaintStatus, ListComplaintsFilters, RelatedKind, SetComplaintStatusPayload, SortOrder,
        SubmitComplaintPayload, UserRole,
    };
    use crate::policy::{PolicyEngine, TransitionPolicy};
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    fn service(transitions: TransitionPolicy, enforce: bool) -> (ComplaintService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let service = ComplaintService::new(store.clone(), PolicyEngine::new(transitions, enforce));
        (service, store)
    }

    fn submission(title: &str) -> SubmitComplaintPayload {
        SubmitComplaintPayload {
            submitted_by: "1".to_string(),
            title: title.to_string(),
            description: "Street lights have been out for a week".to_string(),
            category: ComplaintCategory::Electricity,
            location: "Elm Street".to_string(),
            priority: ComplaintPriority::Medium,
            attachments: None,
        }
    }

    #[test]
    fn submission_starts_pending_with_fresh_id() {
        let (service, _) = service(TransitionPolicy::Strict, true);
        let existing: HashSet<String> = service
            .list_complaints(&ListComplaintsFilters::default())
            .expect("list")
            .into_iter()
            .map(|complaint| complaint.id)
            .collect();

        let created = service.submit_complaint(submission("Dark street")).expect("submit");
        assert_eq!(created.status, ComplaintStatus::Pending);
        assert!(created.responses.is_empty());
        assert!(created.assigned_to.is_none());
        assert!(!existing.contains(&created.id));

        let stored = service.get_complaint(&created.id).expect("get").expect("exists");
        assert_eq!(stored, created);
    }

    #[test]
    fn submitted_text_is_stored_as_typed() {
        let (service, _) = service(TransitionPolicy::Strict, true);
        let mut payload = submission("  Pothole  ");
        payload.location = " Main St ".to_string();
        let created = service.submit_complaint(payload).expect("submit");
        assert_eq!(created.title, "  Pothole  ");
        assert_eq!(created.location, " Main St ");

        let response = service
            .add_response(AddResponsePayload {
                complaint_id: "2".to_string(),
                text: "  On it\n".to_string(),
                responded_by: "3".to_string(),
            })
            .expect("respond")
            .expect("exists");
        assert_eq!(response.text, "  On it\n");
    }

    #[test]
    fn long_title_is_accepted() {
        let (service, _) = service(TransitionPolicy::Strict, true);
        let created = service.submit_complaint(submission(&"x".repeat(201))).expect("submit");
        assert_eq!(created.status, ComplaintStatus::Pending);
        assert_eq!(created.title.chars().count(), 201);
    }

    #[test]
    fn agencies_may_not_submit_when_enforced() {
        let (service, _) = service(TransitionPolicy::Strict, true);
        let mut payload = submission("Agency filing");
        payload.submitted_by = "3".to_string();
        assert!(matches!(service.submit_complaint(payload), Err(AppError::Policy(_))));
    }

    #[test]
    fn assignment_forces_in_review_from_any_status() {
        let (service, _) = service(TransitionPolicy::Strict, true);
        // complaint 2 is resolved in the seed data
        let assigned = service
            .assign_complaint(AssignComplaintPayload {
                complaint_id: "2".to_string(),
                agency_id: "4".to_string(),
                actor_id: "2".to_string(),
            })
            .expect("assign")
            .expect("complaint exists");
        assert_eq!(assigned.status, ComplaintStatus::InReview);
        assert_eq!(assigned.assigned_to.as_deref(), Some("4"));
    }

    #[test]
    fn assignment_of_unknown_complaint_is_a_no_op() {
        let (service, store) = service(TransitionPolicy::Strict, true);
        let before = store.load().expect("load");
        let result = service
            .assign_complaint(AssignComplaintPayload {
                complaint_id: "missing".to_string(),
                agency_id: "3".to_string(),
                actor_id: "2".to_string(),
            })
            .expect("assign");
        assert!(result.is_none());
        assert_eq!(store.load().expect("load"), before);
    }

    #[test]
    fn citizens_cannot_assign() {
        let (service, _) = service(TransitionPolicy::Strict, true);
        let result = service.assign_complaint(AssignComplaintPayload {
            complaint_id: "1".to_string(),
            agency_id: "3".to_string(),
            actor_id: "1".to_string(),
        });
        assert!(matches!(result, Err(AppError::Policy(_))));
    }

    #[test]
    fn response_appends_and_notifies_submitter_once() {
        let (service, _) = service(TransitionPolicy::Strict, true);
        let before = service.get_complaint("2").expect("get").expect("exists");
        let notifications_before = service.notifications_for_user("1").expect("notifications").len();

        let response = service
            .add_response(AddResponsePayload {
                complaint_id: "2".to_string(),
                text: "Follow-up inspection booked".to_string(),
                responded_by: "3".to_string(),
            })
            .expect("respond")
            .expect("complaint exists");

        let after = service.get_complaint("2").expect("get").expect("exists");
        assert_eq!(after.responses.len(), before.responses.len() + 1);
        assert_eq!(&after.responses[..before.responses.len()], &before.responses[..]);
        assert_eq!(after.responses.last(), Some(&response));

        let notifications = service.notifications_for_user("1").expect("notifications");
        assert_eq!(notifications.len(), notifications_before + 1);
        let newest = notifications.last().expect("notification");
        assert!(!newest.read);
        assert!(newest.message.contains("Water outage in Riverside neighborhood"));
        let related = newest.related_to.as_ref().expect("related");
        assert_eq!(related.kind, RelatedKind::Response);
        assert_eq!(related.id, response.id);
    }

    #[test]
    fn unassigned_agency_cannot_respond() {
        let (service, _) = service(TransitionPolicy::Strict, true);
        let result = service.add_response(AddResponsePayload {
            complaint_id: "2".to_string(),
            text: "Not ours".to_string(),
            responded_by: "4".to_string(),
        });
        assert!(matches!(result, Err(AppError::Policy(_))));
    }

    #[test]
    fn response_to_unknown_complaint_creates_nothing() {
        let (service, store) = service(TransitionPolicy::Strict, true);
        let before = store.load().expect("load");
        let result = service
            .add_response(AddResponsePayload {
                complaint_id: "missing".to_string(),
                text: "hello".to_string(),
                responded_by: "2".to_string(),
            })
            .expect("respond");
        assert!(result.is_none());
        assert_eq!(store.load().expect("load"), before);
    }

    #[test]
    fn strict_policy_rejects_skipping_review() {
        let (service, _) = service(TransitionPolicy::Strict, true);
        let created = service.submit_complaint(submission("Skip")).expect("submit");
        let result = service.set_complaint_status(SetComplaintStatusPayload {
            complaint_id: created.id.clone(),
            status: ComplaintStatus::Resolved,
            actor_id: "2".to_string(),
        });
        assert!(matches!(result, Err(AppError::Policy(_))));

        let reopened = service
            .set_complaint_status(SetComplaintStatusPayload {
                complaint_id: "2".to_string(),
                status: ComplaintStatus::InProgress,
                actor_id: "3".to_string(),
            })
            .expect("reopen")
            .expect("exists");
        assert_eq!(reopened.status, ComplaintStatus::InProgress);
    }

    #[test]
    fn permissive_policy_accepts_any_status() {
        let (service, _) = service(TransitionPolicy::Permissive, false);
        let updated = service
            .set_complaint_status(SetComplaintStatusPayload {
                complaint_id: "1".to_string(),
                status: ComplaintStatus::Pending,
                actor_id: "nobody".to_string(),
            })
            .expect("status")
            .expect("exists");
        assert_eq!(updated.status, ComplaintStatus::Pending);
    }

    #[test]
    fn authenticate_matches_email_and_role() {
        let (service, _) = service(TransitionPolicy::Strict, true);
        let user = service
            .authenticate("citizen@example.com", UserRole::Citizen)
            .expect("auth")
            .expect("matched");
        assert_eq!(user.id, "1");
        assert_eq!(service.current_user().expect("current"), Some(user));

        service.logout().expect("logout");
        assert!(service.current_user().expect("current").is_none());

        let denied = service
            .authenticate("citizen@example.com", UserRole::Admin)
            .expect("auth");
        assert!(denied.is_none());
        assert!(service.current_user().expect("current").is_none());
    }

    #[test]
    fn marking_read_twice_matches_once() {
        let (service, store) = service(TransitionPolicy::Strict, true);
        assert!(service.mark_notification_read("1").expect("mark"));
        let once = store.load().expect("load");
        assert!(service.mark_notification_read("1").expect("mark"));
        assert_eq!(store.load().expect("load"), once);
        assert_eq!(service.unread_notification_count("1").expect("count"), 1);

        assert!(!service.mark_notification_read("missing").expect("mark"));
    }

    #[test]
    fn direct_notifications_start_unread() {
        let (service, _) = service(TransitionPolicy::Strict, true);
        let created = service
            .add_notification("4", "New complaint assigned to you", None)
            .expect("notify");
        assert!(!created.read);
        assert_eq!(service.unread_notification_count("4").expect("count"), 1);
        assert!(service.add_notification("4", "  ", None).is_err());
    }

    #[test]
    fn list_filters_search_and_sorts_by_priority() {
        let (service, _) = service(TransitionPolicy::Strict, true);
        let mut urgent = submission("Gas smell");
        urgent.priority = ComplaintPriority::Urgent;
        urgent.category = ComplaintCategory::PublicSafety;
        service.submit_complaint(urgent).expect("submit");

        let filters = ListComplaintsFilters {
            sort_by: ComplaintSortKey::Priority,
            sort_order: SortOrder::Desc,
            ..ListComplaintsFilters::default()
        };
        let sorted = service.list_complaints(&filters).expect("list");
        assert_eq!(sorted[0].title, "Gas smell");

        let search = ListComplaintsFilters {
            search: Some("RIVERSIDE".to_string()),
            ..ListComplaintsFilters::default()
        };
        let found = service.list_complaints(&search).expect("list");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "2");

        let by_category = ListComplaintsFilters {
            category: Some(ComplaintCategory::Roads),
            status: Some(ComplaintStatus::InProgress),
            ..ListComplaintsFilters::default()
        };
        assert_eq!(service.list_complaints(&by_category).expect("list").len(), 1);
    }

    #[test]
    fn default_sort_is_newest_first() {
        let (service, store) = service(TransitionPolicy::Strict, true);
        let complaints = store.load().expect("load").complaints;
        let sorted = filter_complaints(complaints, &ListComplaintsFilters::default());
        assert_eq!(sorted[0].id, "2");
        assert_eq!(sorted[1].id, "1");
        drop(service);
    }

    #[test]
    fn statistics_read_from_injected_record() {
        let mut record = crate::db::seed_record().expect("seed");
        let complaint = &mut record.complaints[0];
        complaint.responses.truncate(1);
        complaint.responses[0].responded_at = complaint.submitted_at + chrono::Duration::hours(2);
        record.complaints.truncate(1);

        let store = Arc::new(MemoryStore::with_record(&record).expect("store"));
        let service = ComplaintService::new(store, PolicyEngine::default());
        let stats = service.statistics().expect("stats");
        assert_eq!(stats.total, 1);
        assert_eq!(stats.average_response_time, 2);

        record.complaints[0].responses.clear();
        let store = Arc::new(MemoryStore::with_record(&record).expect("store"));
        let service = ComplaintService::new(store, PolicyEngine::default());
        assert_eq!(service.statistics().expect("stats").average_response_time, 0);
    }

    #[test]
    fn read_views_filter_by_owner() {
        let (service, _) = service(TransitionPolicy::Strict, true);
        assert_eq!(service.complaints_by_user("1").expect("by user").len(), 2);
        assert!(service.complaints_by_user("2").expect("by user").is_empty());
        assert_eq!(service.complaints_by_agency("4").expect("by agency").len(), 1);
        assert_eq!(service.list_agencies().expect("agencies").len(), 2);
        assert_eq!(
            service.get_user("3").expect("user").map(|user| user.role),
            Some(UserRole::Agency)
        );
    }

    /// Logs every store call and holds each load open long enough for other threads to run.
    struct SlowLoggingStore {
        inner: MemoryStore,
        events: Mutex<Vec<&'static str>>,
    }

    impl SlowLoggingStore {
        fn log(&self, event: &'static str) {
            self.events.lock().expect("events").push(event);
        }
    }

    impl RecordStore for SlowLoggingStore {
        fn load(&self) -> AppResult<AppRecord> {
            self.log("load");
            thread::sleep(Duration::from_millis(5));
            self.inner.load()
        }

        fn save(&self, record: &AppRecord) -> AppResult<()> {
            self.log("save");
            self.inner.save(record)
        }

        fn reset(&self) -> AppResult<()> {
            self.log("reset");
            self.inner.reset()
        }
    }

    #[test]
    fn reset_and_import_never_land_inside_a_write_cycle() {
        let store = Arc::new(SlowLoggingStore {
            inner: MemoryStore::new(),
            events: Mutex::new(Vec::new()),
        });
        let service = Arc::new(ComplaintService::new(store.clone(), PolicyEngine::default()));
        let blob = serde_json::to_string(&crate::db::seed_record().expect("seed")).expect("serialize");

        let writers: Vec<_> = (0..4)
            .map(|n| {
                let service = service.clone();
                thread::spawn(move || {
                    for i in 0..5 {
                        service.submit_complaint(submission(&format!("w{}-{}", n, i))).expect("submit");
                    }
                })
            })
            .collect();
        let resetter = {
            let service = service.clone();
            thread::spawn(move || {
                for _ in 0..5 {
                    service.reset_store().expect("reset");
                    service.import_record(&blob).expect("import");
                }
            })
        };
        for handle in writers {
            handle.join().expect("writer");
        }
        resetter.join().expect("resetter");

        let events = store.events.lock().expect("events");
        for (index, event) in events.iter().enumerate() {
            if *event == "load" {
                assert_eq!(events.get(index + 1), Some(&"save"), "write cycle interrupted at {}", index);
            }
        }
    }
}
