use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Leave,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::Late => "Late",
            AttendanceStatus::Leave => "Leave",
        }
    }

    pub fn parse(s: &str) -> Option<AttendanceStatus> {
        match s {
            "Present" => Some(AttendanceStatus::Present),
            "Absent" => Some(AttendanceStatus::Absent),
            "Late" => Some(AttendanceStatus::Late),
            "Leave" => Some(AttendanceStatus::Leave),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeStatus {
    Pending,
    Paid,
}

impl FeeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeeStatus::Pending => "Pending",
            FeeStatus::Paid => "Paid",
        }
    }

    pub fn parse(s: &str) -> Option<FeeStatus> {
        match s {
            "Pending" => Some(FeeStatus::Pending),
            "Paid" => Some(FeeStatus::Paid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub class_name: String,
    pub roll_no: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeeRecord {
    pub id: String,
    pub student_id: String,
    pub amount: f64,
    pub status: FeeStatus,
    pub payment_date: Option<NaiveDate>,
    pub recorded_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_students: usize,
    pub present_today: usize,
    pub absent_today: usize,
    pub pending_fees_count: usize,
    pub paid_fees_count: usize,
}

impl DashboardStats {
    pub fn zero() -> DashboardStats {
        DashboardStats {
            total_students: 0,
            present_today: 0,
            absent_today: 0,
            pending_fees_count: 0,
            paid_fees_count: 0,
        }
    }
}

/// Derives the dashboard summary from the four raw fetches. `None` marks a
/// failed fetch; if any fetch failed the whole summary degrades to zeros so a
/// caller never shows a half-correct dashboard.
pub fn compute_dashboard_stats(
    students: Option<&[Student]>,
    todays_attendance: Option<&[AttendanceStatus]>,
    pending_fees: Option<&[FeeRecord]>,
    paid_fees: Option<&[FeeRecord]>,
) -> DashboardStats {
    let (Some(students), Some(attendance), Some(pending), Some(paid)) =
        (students, todays_attendance, pending_fees, paid_fees)
    else {
        return DashboardStats::zero();
    };

    DashboardStats {
        total_students: students.len(),
        present_today: attendance
            .iter()
            .filter(|s| **s == AttendanceStatus::Present)
            .count(),
        absent_today: attendance
            .iter()
            .filter(|s| **s == AttendanceStatus::Absent)
            .count(),
        pending_fees_count: pending.len(),
        paid_fees_count: paid.len(),
    }
}

/// Latest fee = the record with the greatest `created_at`. First-seen wins on
/// an exact timestamp tie so the result stays deterministic.
pub fn latest_fee_for(fees: &[FeeRecord]) -> Option<&FeeRecord> {
    let mut latest: Option<&FeeRecord> = None;
    for fee in fees {
        match latest {
            Some(best) if fee.created_at <= best.created_at => {}
            _ => latest = Some(fee),
        }
    }
    latest
}

/// payment_date is non-null iff the fee is Paid: a supplied date is honored
/// for Paid, a missing one falls back to `today`, and Pending always clears it
/// even when a date was supplied.
pub fn payment_date_for(
    status: FeeStatus,
    supplied: Option<NaiveDate>,
    today: NaiveDate,
) -> Option<NaiveDate> {
    match status {
        FeeStatus::Paid => Some(supplied.unwrap_or(today)),
        FeeStatus::Pending => None,
    }
}
