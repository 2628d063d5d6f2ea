//! Shift — a single posting of short-term work.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Draft,
    Open,
    Filled,
    InProgress,
    Completed,
    Cancelled,
}

/// A posted shift.
///
/// Invariants: `0 <= spots_filled <= spots_total`; `clock_out_at >=
/// clock_in_at` when both set; Mode-B shifts (agency-managed, posted for a
/// client company) have both `posted_by_agency_id` and `client_company_id`
/// set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shift {
    pub id: i64,
    pub company_id: i64,
    pub posted_by_agency_id: Option<i64>,
    pub client_company_id: Option<i64>,
    pub is_agency_managed: bool,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub hourly_rate: Money,
    pub spots_total: i32,
    pub spots_filled: i32,
    pub status: ShiftStatus,
    pub clock_in_at: Option<DateTime<Utc>>,
    pub clock_out_at: Option<DateTime<Utc>>,
    pub actual_hours_worked: Option<f64>,
}

impl Shift {
    /// Wall-clock instant the shift is scheduled to start (first day only).
    pub fn start_at(&self) -> DateTime<Utc> {
        self.date.and_time(self.start_time).and_utc()
    }

    /// Wall-clock instant the shift is scheduled to end on its first day.
    /// Overnight shifts (`end_time < start_time`) wrap to the next day.
    pub fn end_at(&self) -> DateTime<Utc> {
        if self.end_time < self.start_time {
            (self.date + chrono::Duration::days(1))
                .and_time(self.end_time)
                .and_utc()
        } else {
            self.date.and_time(self.end_time).and_utc()
        }
    }

    /// Scheduled duration in hours for the first day, spanning midnight for
    /// overnight shifts.
    pub fn scheduled_hours(&self) -> f64 {
        (self.end_at() - self.start_at()).num_seconds() as f64 / 3600.0
    }

    /// `daily_cost = round2(duration_hours * hourly_rate)` for the first day.
    pub fn daily_cost(&self) -> Money {
        self.hourly_rate.mul_f64_round(self.scheduled_hours())
    }

    pub fn is_mode_b(&self) -> bool {
        self.is_agency_managed
            && self.posted_by_agency_id.is_some()
            && self.client_company_id.is_some()
    }

    /// The wallet that pays for this shift: the agency's in Mode B,
    /// otherwise the posting company's.
    pub fn payer_company_id(&self) -> i64 {
        if self.is_agency_managed {
            self.posted_by_agency_id.unwrap_or(self.company_id)
        } else {
            self.company_id
        }
    }
}
