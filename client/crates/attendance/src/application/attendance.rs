//! Attendance State Machine
//!
//! Owns the mirror of today's attendance record and applies gated
//! transitions:
//!
//! ```text
//! NOT_CLOCKED_IN --clock_in-->  CLOCKED_IN --clock_out--> CLOCKED_OUT
//! ```
//!
//! Each attempt runs guard -> gate -> commit, in that order. At most one
//! attempt is in flight; a second one fails with `VerificationInProgress`.
//! A failed commit marks the mirror stale and the next attempt re-fetches
//! the authoritative record first.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

use crate::application::gate::{Verdict, VerificationContext, VerificationGate};
use crate::application::session::Session;
use crate::domain::entities::{AttendanceRecord, RecordError};
use crate::domain::repository::{AttendanceRepository, ClockCommit};
use crate::domain::services::Clock;
use crate::domain::value_objects::{ClockDirection, ClockState};
use crate::error::{ClockError, ClockResult};

/// Observable state of the machine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClockSnapshot {
    pub state: ClockState,
    #[serde(skip)]
    pub record: AttendanceRecord,
    /// Mirror may not match the backend; re-fetched before the next attempt
    pub stale: bool,
    pub in_flight: bool,
}

impl ClockSnapshot {
    fn unloaded(day: NaiveDate) -> Self {
        Self {
            state: ClockState::NotClockedIn,
            record: AttendanceRecord::empty(day),
            stale: true,
            in_flight: false,
        }
    }
}

/// Holds the in-flight flag for one attempt; released on drop, including
/// when the attempt's future is dropped mid-await
struct InFlight<'a> {
    flag: &'a AtomicBool,
    snapshot: &'a watch::Sender<ClockSnapshot>,
}

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool, snapshot: &'a watch::Sender<ClockSnapshot>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        snapshot.send_modify(|s| s.in_flight = true);
        Some(Self { flag, snapshot })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        self.snapshot.send_modify(|s| s.in_flight = false);
    }
}

/// Attendance state machine for one signed-in user
pub struct AttendanceStateMachine<R, G>
where
    R: AttendanceRepository,
    G: VerificationGate,
{
    repo: Arc<R>,
    gate: Arc<G>,
    session: Arc<Session>,
    clock: Arc<dyn Clock>,
    in_flight: AtomicBool,
    snapshot: watch::Sender<ClockSnapshot>,
}

impl<R, G> AttendanceStateMachine<R, G>
where
    R: AttendanceRepository,
    G: VerificationGate,
{
    pub fn new(repo: Arc<R>, gate: Arc<G>, session: Arc<Session>, clock: Arc<dyn Clock>) -> Self {
        let (snapshot, _) = watch::channel(ClockSnapshot::unloaded(clock.today()));
        Self {
            repo,
            gate,
            session,
            clock,
            in_flight: AtomicBool::new(false),
            snapshot,
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> ClockSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receive every snapshot change
    pub fn subscribe(&self) -> watch::Receiver<ClockSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn state(&self) -> ClockState {
        self.snapshot.borrow().state
    }

    /// Re-fetch today's record from the backend
    pub async fn refresh(&self) -> ClockResult<ClockSnapshot> {
        self.ensure_open()?;
        let _guard = self.acquire()?;
        self.reload(self.clock.today()).await?;
        Ok(self.snapshot())
    }

    /// NOT_CLOCKED_IN -> CLOCKED_IN
    pub async fn clock_in(&self) -> ClockResult<AttendanceRecord> {
        self.transition(ClockDirection::In).await
    }

    /// CLOCKED_IN -> CLOCKED_OUT
    pub async fn clock_out(&self) -> ClockResult<AttendanceRecord> {
        self.transition(ClockDirection::Out).await
    }

    /// Records within an inclusive date range, oldest first
    pub async fn history(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ClockResult<Vec<AttendanceRecord>> {
        if start > end {
            return Err(ClockError::InvalidRange { start, end });
        }
        self.ensure_open()?;
        let mut records = self.repo.fetch_records(start, end).await?;
        records.sort_by_key(|r| r.day_key);
        Ok(records)
    }

    async fn transition(&self, direction: ClockDirection) -> ClockResult<AttendanceRecord> {
        self.ensure_open()?;
        let _guard = self.acquire()?;
        let attempt_id = Uuid::new_v4();

        let today = self.clock.today();
        let current = self.snapshot();
        if current.stale || current.record.day_key != today {
            tracing::debug!(%attempt_id, stale = current.stale, "Re-syncing attendance record");
            self.reload(today).await?;
        }
        let record = self.snapshot().record;

        // Guard before verification: a duplicate never reaches the gate
        match (direction, record.state()) {
            (ClockDirection::In, ClockState::NotClockedIn) => {}
            (ClockDirection::In, _) => return Err(self.reject(ClockError::DuplicateClockIn)),
            (ClockDirection::Out, ClockState::ClockedIn) => {}
            (ClockDirection::Out, _) => return Err(self.reject(ClockError::DuplicateClockOut)),
        }

        let context = VerificationContext {
            user_id: self.session.user_id().clone(),
            direction,
            attempt_id,
        };
        let evidence = match self.gate.verify(&context).await {
            Verdict::Verified(evidence) => evidence,
            Verdict::Denied(reason) => return Err(self.reject(ClockError::Denied(reason))),
        };

        let at = self.clock.now();
        let mut next = record.clone();
        let applied = match direction {
            ClockDirection::In => next.record_clock_in(at, evidence.method()),
            ClockDirection::Out => next.record_clock_out(at),
        };
        if let Err(err) = applied {
            return Err(self.reject(match err {
                RecordError::AlreadyClockedIn => ClockError::DuplicateClockIn,
                RecordError::NotClockedIn => ClockError::DuplicateClockOut,
                RecordError::OutOfOrder {
                    clock_in_at,
                    clock_out_at,
                } => ClockError::ClockOrderViolation {
                    clock_in_at,
                    clock_out_at,
                },
            }));
        }

        let commit = ClockCommit {
            user_id: context.user_id,
            direction,
            evidence,
            requested_at: at,
        };
        match self.repo.commit(&commit).await {
            Ok(receipt) => {
                tracing::info!(
                    %attempt_id,
                    user_id = %commit.user_id,
                    %direction,
                    method = %commit.evidence.method(),
                    message = receipt.message.as_deref().unwrap_or(""),
                    "Clock action committed"
                );
                self.mirror(next.clone());
                Ok(next)
            }
            Err(err) => {
                self.snapshot.send_modify(|s| s.stale = true);
                Err(self.reject(ClockError::from(err)))
            }
        }
    }

    /// Replace the mirror with today's authoritative record
    ///
    /// Only today is fetched. A record left open on an earlier day is closed
    /// or rejected by the backend, which owns the one-open-record rule.
    async fn reload(&self, today: NaiveDate) -> ClockResult<()> {
        let records = match self.repo.fetch_records(today, today).await {
            Ok(records) => records,
            Err(err) => {
                self.snapshot.send_modify(|s| s.stale = true);
                return Err(self.reject(ClockError::from(err)));
            }
        };
        let record = records
            .into_iter()
            .find(|r| r.day_key == today)
            .unwrap_or_else(|| AttendanceRecord::empty(today));
        if let Err(err) = record.check_invariants() {
            tracing::warn!(day = %today, error = %err, "Backend record breaks clock order");
        }
        tracing::debug!(day = %today, state = %record.state(), "Attendance record loaded");
        self.mirror(record);
        Ok(())
    }

    fn mirror(&self, record: AttendanceRecord) {
        self.snapshot.send_modify(|s| {
            s.state = record.state();
            s.record = record;
            s.stale = false;
        });
    }

    fn acquire(&self) -> ClockResult<InFlight<'_>> {
        InFlight::acquire(&self.in_flight, &self.snapshot)
            .ok_or_else(|| self.reject(ClockError::VerificationInProgress))
    }

    fn ensure_open(&self) -> ClockResult<()> {
        if self.session.is_open() {
            Ok(())
        } else {
            Err(ClockError::SessionClosed)
        }
    }

    fn reject(&self, err: ClockError) -> ClockError {
        err.log();
        err
    }
}
