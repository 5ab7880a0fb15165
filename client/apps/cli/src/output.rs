//! Terminal rendering of attendance records

use std::fmt;

use attendance::models::{AttendanceRecord, ClockState, VerificationMethod};
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Serialize;

/// Serializable view of one attendance record
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordView {
    pub date: NaiveDate,
    pub state: ClockState,
    pub clock_in: Option<DateTime<Utc>>,
    pub clock_out: Option<DateTime<Utc>>,
    pub verification_method: Option<VerificationMethod>,
}

impl From<&AttendanceRecord> for RecordView {
    fn from(record: &AttendanceRecord) -> Self {
        Self {
            date: record.day_key,
            state: record.state(),
            clock_in: record.clock_in_at,
            clock_out: record.clock_out_at,
            verification_method: record.verification_method,
        }
    }
}

fn local_time(at: Option<DateTime<Utc>>) -> String {
    at.map(|at| at.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

impl fmt::Display for RecordView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  in {}  out {}  {}",
            self.date,
            local_time(self.clock_in),
            local_time(self.clock_out),
            self.state
        )?;
        if let Some(method) = self.verification_method {
            write!(f, " ({})", method)?;
        }
        Ok(())
    }
}

/// Hours between clock-in and clock-out, when both are set
pub fn worked_hours(record: &AttendanceRecord) -> Option<f64> {
    let (clock_in, clock_out) = (record.clock_in_at?, record.clock_out_at?);
    Some((clock_out - clock_in).num_seconds() as f64 / 3600.0)
}
