use crate::models::{
    AgencySummary, CategoryCounts, Complaint, ComplaintCategory, ComplaintPriority, ComplaintStatistics,
    ComplaintStatus, PriorityCounts, StatusCounts,
};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

pub fn complaint_statistics(complaints: &[Complaint]) -> ComplaintStatistics {
    let mut by_status = StatusCounts::default();
    let mut by_category = CategoryCounts::default();
    let mut by_priority = PriorityCounts::default();

    for complaint in complaints {
        match complaint.status {
            ComplaintStatus::Pending => by_status.pending += 1,
            ComplaintStatus::InReview => by_status.in_review += 1,
            ComplaintStatus::InProgress => by_status.in_progress += 1,
            ComplaintStatus::Resolved => by_status.resolved += 1,
            ComplaintStatus::Rejected => by_status.rejected += 1,
        }
        match complaint.category {
            ComplaintCategory::Water => by_category.water += 1,
            ComplaintCategory::Electricity => by_category.electricity += 1,
            ComplaintCategory::Roads => by_category.roads += 1,
            ComplaintCategory::Sanitation => by_category.sanitation += 1,
            ComplaintCategory::PublicSafety => by_category.public_safety += 1,
            ComplaintCategory::Other => by_category.other += 1,
        }
        match complaint.priority {
            ComplaintPriority::Low => by_priority.low += 1,
            ComplaintPriority::Medium => by_priority.medium += 1,
            ComplaintPriority::High => by_priority.high += 1,
            ComplaintPriority::Urgent => by_priority.urgent += 1,
        }
    }

    ComplaintStatistics {
        total: complaints.len(),
        by_status,
        by_category,
        by_priority,
        average_response_time: average_response_hours(complaints),
    }
}

/// Mean first-response latency in whole hours; 0 when nothing has been answered.
pub fn average_response_hours(complaints: &[Complaint]) -> i64 {
    let latencies: Vec<i64> = complaints
        .iter()
        .filter_map(|complaint| {
            complaint
                .first_response()
                .map(|response| (response.responded_at - complaint.submitted_at).num_milliseconds())
        })
        .collect();

    if latencies.is_empty() {
        return 0;
    }

    let total: i64 = latencies.iter().sum();
    let mean_hours = total as f64 / latencies.len() as f64 / MILLIS_PER_HOUR;
    // halves round toward +inf
    (mean_hours + 0.5).floor() as i64
}

pub fn agency_summary(agency_id: &str, complaints: &[Complaint]) -> AgencySummary {
    let assigned: Vec<&Complaint> = complaints
        .iter()
        .filter(|complaint| complaint.assigned_to.as_deref() == Some(agency_id))
        .collect();

    let count = |wanted: &[ComplaintStatus]| {
        assigned
            .iter()
            .filter(|complaint| wanted.contains(&complaint.status))
            .count()
    };

    AgencySummary {
        agency_id: agency_id.to_string(),
        total: assigned.len(),
        awaiting_action: count(&[ComplaintStatus::Pending, ComplaintStatus::InReview]),
        in_progress: count(&[ComplaintStatus::InProgress]),
        resolved: count(&[ComplaintStatus::Resolved]),
        total_responses: assigned.iter().map(|complaint| complaint.responses.len()).sum(),
    }
}
