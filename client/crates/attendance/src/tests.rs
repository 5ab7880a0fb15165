//! Unit tests for the attendance crate
//!
//! In-memory fakes of every port count their calls, so "never verified" and
//! "committed once" are asserted directly.

#[cfg(test)]
mod fakes {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
    use kernel::id::{CredentialId, LocationId, UserId};
    use platform::crypto::to_base64;
    use platform::secret::{BearerToken, SignInPassword};
    use tokio::sync::Notify;

    use crate::application::gate::{Verdict, VerificationContext, VerificationGate};
    use crate::application::session::Session;
    use crate::domain::ceremony::{
        Assertion, Attestation, CeremonyError, CreationOptions, CredentialAuthenticator,
        EncodedAssertion, EncodedAttestation, IssuedAuthenticationChallenge,
        IssuedRegistrationChallenge, RequestOptions,
    };
    use crate::domain::entities::{AttendanceRecord, BiometricCredential, GeofenceLocation};
    use crate::domain::repository::{
        AttendanceRepository, BiometricRepository, ClockCommit, CommitReceipt, Evidence,
        GeofenceRepository, LocationDraft, SessionGateway, SignInGrant,
    };
    use crate::domain::services::{Clock, EARTH_RADIUS_METERS};
    use crate::domain::value_objects::{ClockDirection, LatLng, VerificationMethod};
    use crate::error::{ApiError, ApiResult};

    pub const METERS_PER_DEGREE: f64 = EARTH_RADIUS_METERS * std::f64::consts::PI / 180.0;

    pub fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    pub fn at(d: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, d, hour, minute, 0).unwrap()
    }

    pub fn session() -> Arc<Session> {
        session_with_roles(&["employee"])
    }

    pub fn session_with_roles(roles: &[&str]) -> Arc<Session> {
        Arc::new(Session::new(
            UserId::new("42"),
            "Ana Cruz",
            roles.iter().map(|r| r.to_string()).collect(),
            BearerToken::new("tok-42").unwrap(),
        ))
    }

    pub fn office(radius_meters: f64) -> GeofenceLocation {
        GeofenceLocation::new(
            LocationId::new("hq"),
            "Head Office",
            "1 Main St",
            LatLng::new(14.5995, 120.9842).unwrap(),
            radius_meters,
        )
        .unwrap()
    }

    pub fn north_of(location: &GeofenceLocation, meters: f64) -> LatLng {
        LatLng::new(location.latitude + meters / METERS_PER_DEGREE, location.longitude).unwrap()
    }

    // ------------------------------------------------------------------------
    // Clock
    // ------------------------------------------------------------------------

    pub struct FakeClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl FakeClock {
        pub fn at(now: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(now),
            })
        }

        pub fn set(&self, now: DateTime<Utc>) {
            *self.now.lock().unwrap() = now;
        }

        pub fn advance(&self, delta: TimeDelta) {
            *self.now.lock().unwrap() += delta;
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }

        fn today(&self) -> NaiveDate {
            self.now().date_naive()
        }
    }

    // ------------------------------------------------------------------------
    // Attendance backend
    // ------------------------------------------------------------------------

    #[derive(Default)]
    pub struct FakeAttendanceRepo {
        pub records: Mutex<Vec<AttendanceRecord>>,
        pub commits: Mutex<Vec<ClockCommit>>,
        pub fetches: AtomicUsize,
        pub fail_fetch: AtomicBool,
        pub fail_commit: AtomicBool,
        /// Apply a failing commit server-side anyway (response lost)
        pub apply_failed_commit: AtomicBool,
    }

    impl FakeAttendanceRepo {
        pub fn with_record(record: AttendanceRecord) -> Self {
            let repo = Self::default();
            repo.records.lock().unwrap().push(record);
            repo
        }

        pub fn commit_count(&self) -> usize {
            self.commits.lock().unwrap().len()
        }

        pub fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }

        fn apply(&self, commit: &ClockCommit) {
            let day = commit.requested_at.date_naive();
            let mut records = self.records.lock().unwrap();
            let index = match records.iter().position(|r| r.day_key == day) {
                Some(index) => index,
                None => {
                    records.push(AttendanceRecord::empty(day));
                    records.len() - 1
                }
            };
            let record = &mut records[index];
            let _ = match commit.direction {
                ClockDirection::In => {
                    record.record_clock_in(commit.requested_at, commit.evidence.method())
                }
                ClockDirection::Out => record.record_clock_out(commit.requested_at),
            };
        }
    }

    impl AttendanceRepository for FakeAttendanceRepo {
        async fn fetch_records(
            &self,
            start: NaiveDate,
            end: NaiveDate,
        ) -> ApiResult<Vec<AttendanceRecord>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_fetch.load(Ordering::SeqCst) {
                return Err(ApiError::Transport("connection reset".to_string()));
            }
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.day_key >= start && r.day_key <= end)
                .cloned()
                .collect())
        }

        async fn commit(&self, commit: &ClockCommit) -> ApiResult<CommitReceipt> {
            self.commits.lock().unwrap().push(commit.clone());
            if self.fail_commit.load(Ordering::SeqCst) {
                if self.apply_failed_commit.load(Ordering::SeqCst) {
                    self.apply(commit);
                }
                return Err(ApiError::Status {
                    status: 503,
                    message: "Service unavailable".to_string(),
                });
            }
            self.apply(commit);
            Ok(CommitReceipt {
                message: Some("ok".to_string()),
            })
        }
    }

    // ------------------------------------------------------------------------
    // Gate
    // ------------------------------------------------------------------------

    pub struct FakeGate {
        verdict: Verdict,
        pub calls: AtomicUsize,
        hold: Option<Arc<Notify>>,
    }

    impl FakeGate {
        pub fn verified() -> Self {
            Self::returning(Verdict::Verified(Evidence::Unverified { position: None }))
        }

        pub fn returning(verdict: Verdict) -> Self {
            Self {
                verdict,
                calls: AtomicUsize::new(0),
                hold: None,
            }
        }

        /// Verified, but only after `release` is notified
        pub fn held(release: Arc<Notify>) -> Self {
            Self {
                hold: Some(release),
                ..Self::verified()
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl VerificationGate for FakeGate {
        fn method(&self) -> VerificationMethod {
            VerificationMethod::None
        }

        async fn verify(&self, _context: &VerificationContext) -> Verdict {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(release) = &self.hold {
                release.notified().await;
            }
            self.verdict.clone()
        }
    }

    // ------------------------------------------------------------------------
    // Geofence backend
    // ------------------------------------------------------------------------

    #[derive(Default)]
    pub struct FakeGeofenceRepo {
        pub locations: Mutex<Vec<GeofenceLocation>>,
        pub lists: AtomicUsize,
        pub writes: AtomicUsize,
        pub fail_list: AtomicBool,
    }

    impl FakeGeofenceRepo {
        pub fn with(locations: Vec<GeofenceLocation>) -> Self {
            Self {
                locations: Mutex::new(locations),
                ..Default::default()
            }
        }
    }

    impl GeofenceRepository for FakeGeofenceRepo {
        async fn list_locations(&self) -> ApiResult<Vec<GeofenceLocation>> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            if self.fail_list.load(Ordering::SeqCst) {
                return Err(ApiError::Transport("connection refused".to_string()));
            }
            Ok(self.locations.lock().unwrap().clone())
        }

        async fn verify_location(
            &self,
            point: LatLng,
            location_id: &LocationId,
        ) -> ApiResult<bool> {
            let locations = self.locations.lock().unwrap();
            let location = locations
                .iter()
                .find(|l| &l.id == location_id)
                .ok_or(ApiError::Status {
                    status: 404,
                    message: "Location not found".to_string(),
                })?;
            Ok(crate::domain::services::within_geofence(point, location))
        }

        async fn create_location(&self, draft: &LocationDraft) -> ApiResult<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            let mut locations = self.locations.lock().unwrap();
            let id = LocationId::new(format!("loc-{}", locations.len() + 1));
            if let Some(location) = GeofenceLocation::new(
                id,
                draft.name.clone(),
                draft.address.clone(),
                draft.center,
                draft.radius_meters,
            ) {
                locations.push(location);
            }
            Ok(())
        }

        async fn update_location(&self, _id: &LocationId, _draft: &LocationDraft) -> ApiResult<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn delete_location(&self, id: &LocationId) -> ApiResult<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.locations.lock().unwrap().retain(|l| &l.id != id);
            Ok(())
        }
    }

    // ------------------------------------------------------------------------
    // Biometric backend and authenticator
    // ------------------------------------------------------------------------

    pub struct FakeBiometricRepo {
        pub verified: Option<bool>,
        issued: AtomicUsize,
        pub verifications: AtomicUsize,
    }

    impl FakeBiometricRepo {
        /// `None` makes the verify call fail in transport
        pub fn answering(verified: Option<bool>) -> Self {
            Self {
                verified,
                issued: AtomicUsize::new(0),
                verifications: AtomicUsize::new(0),
            }
        }

        fn fresh_challenge(&self) -> String {
            let n = self.issued.fetch_add(1, Ordering::SeqCst);
            to_base64(format!("challenge-{}", n).as_bytes())
        }
    }

    impl BiometricRepository for FakeBiometricRepo {
        async fn registration_challenge(
            &self,
            _user_id: &UserId,
        ) -> ApiResult<IssuedRegistrationChallenge> {
            Ok(IssuedRegistrationChallenge {
                challenge: self.fresh_challenge(),
                user_id: None,
            })
        }

        async fn register_credential(
            &self,
            _user_id: &UserId,
            _credential: &EncodedAttestation,
        ) -> ApiResult<()> {
            Ok(())
        }

        async fn authentication_challenge(
            &self,
            _user_id: &UserId,
        ) -> ApiResult<IssuedAuthenticationChallenge> {
            Ok(IssuedAuthenticationChallenge {
                challenge: self.fresh_challenge(),
                allow_credentials: vec![to_base64(b"cred-1")],
            })
        }

        async fn verify_assertion(
            &self,
            _user_id: &UserId,
            _assertion: &EncodedAssertion,
        ) -> ApiResult<bool> {
            self.verifications.fetch_add(1, Ordering::SeqCst);
            self.verified
                .ok_or(ApiError::Transport("connection refused".to_string()))
        }

        async fn list_credentials(&self, _user_id: &UserId) -> ApiResult<Vec<BiometricCredential>> {
            Ok(Vec::new())
        }

        async fn remove_credential(
            &self,
            _user_id: &UserId,
            _credential_id: &CredentialId,
        ) -> ApiResult<()> {
            Ok(())
        }
    }

    /// Authenticator that signs every request immediately
    pub struct SigningAuthenticator;

    impl CredentialAuthenticator for SigningAuthenticator {
        fn is_supported(&self) -> bool {
            true
        }

        async fn create(&self, options: CreationOptions) -> Result<Attestation, CeremonyError> {
            Ok(Attestation {
                credential_id: b"cred-1".to_vec(),
                attestation_object: vec![0xa3],
                client_data_json: options.challenge,
            })
        }

        async fn get(&self, options: RequestOptions) -> Result<Assertion, CeremonyError> {
            Ok(Assertion {
                credential_id: b"cred-1".to_vec(),
                authenticator_data: vec![0x49; 37],
                client_data_json: options.challenge,
                signature: vec![0x30],
                user_handle: None,
            })
        }
    }

    // ------------------------------------------------------------------------
    // Sign-in gateway
    // ------------------------------------------------------------------------

    pub enum SignInScript {
        Grant { token: Option<&'static str> },
        Reject(u16),
    }

    pub struct FakeGateway {
        pub script: SignInScript,
        pub calls: AtomicUsize,
    }

    impl SessionGateway for FakeGateway {
        async fn sign_in(&self, _email: &str, _password: &SignInPassword) -> ApiResult<SignInGrant> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script {
                SignInScript::Grant { token } => Ok(SignInGrant {
                    token: token.and_then(BearerToken::new),
                    user_id: UserId::new("42"),
                    user_name: "Ana Cruz".to_string(),
                    roles: vec!["employee".to_string()],
                }),
                SignInScript::Reject(status) => Err(ApiError::Status {
                    status,
                    message: String::new(),
                }),
            }
        }
    }
}

// ============================================================================
// State machine
// ============================================================================

#[cfg(test)]
mod state_machine_tests {
    use std::sync::Arc;

    use chrono::TimeDelta;
    use tokio::sync::Notify;
    use tokio_test::{assert_pending, assert_ready};

    use super::fakes::*;
    use crate::application::attendance::AttendanceStateMachine;
    use crate::application::gate::Verdict;
    use crate::domain::entities::AttendanceRecord;
    use crate::domain::value_objects::{ClockState, VerificationMethod};
    use crate::error::{ApiError, ClockError, DenialReason};

    type Machine = AttendanceStateMachine<FakeAttendanceRepo, FakeGate>;

    fn machine(
        repo: FakeAttendanceRepo,
        gate: FakeGate,
        clock: Arc<FakeClock>,
    ) -> (Machine, Arc<FakeAttendanceRepo>, Arc<FakeGate>) {
        let repo = Arc::new(repo);
        let gate = Arc::new(gate);
        let machine = AttendanceStateMachine::new(repo.clone(), gate.clone(), session(), clock);
        (machine, repo, gate)
    }

    #[tokio::test]
    async fn test_initial_state_is_loaded_from_backend() {
        let mut open = AttendanceRecord::empty(day(1));
        open.clock_in_at = Some(at(1, 8, 0));
        let (machine, repo, _) = machine(
            FakeAttendanceRepo::with_record(open),
            FakeGate::verified(),
            FakeClock::at(at(1, 12, 0)),
        );

        assert!(machine.snapshot().stale);
        let snapshot = machine.refresh().await.unwrap();
        assert_eq!(snapshot.state, ClockState::ClockedIn);
        assert!(!snapshot.stale);
        assert_eq!(repo.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_clock_in_commits_once_and_mirrors() {
        let clock = FakeClock::at(at(1, 8, 0));
        let (machine, repo, gate) =
            machine(FakeAttendanceRepo::default(), FakeGate::verified(), clock);

        let record = machine.clock_in().await.unwrap();
        assert_eq!(record.clock_in_at, Some(at(1, 8, 0)));
        assert_eq!(record.verification_method, Some(VerificationMethod::None));
        assert_eq!(machine.state(), ClockState::ClockedIn);
        assert_eq!(gate.call_count(), 1);
        assert_eq!(repo.commit_count(), 1);
        assert!(!machine.snapshot().in_flight);
    }

    #[tokio::test]
    async fn test_second_clock_in_is_duplicate_without_verification() {
        let clock = FakeClock::at(at(1, 8, 0));
        let (machine, repo, gate) =
            machine(FakeAttendanceRepo::default(), FakeGate::verified(), clock.clone());

        let first = machine.clock_in().await.unwrap();
        clock.advance(TimeDelta::minutes(5));

        assert_eq!(machine.clock_in().await, Err(ClockError::DuplicateClockIn));
        assert_eq!(gate.call_count(), 1);
        assert_eq!(repo.commit_count(), 1);
        assert_eq!(machine.snapshot().record, first);
    }

    #[tokio::test]
    async fn test_clock_out_requires_clock_in() {
        let (machine, repo, gate) = machine(
            FakeAttendanceRepo::default(),
            FakeGate::verified(),
            FakeClock::at(at(1, 17, 0)),
        );

        assert_eq!(machine.clock_out().await, Err(ClockError::DuplicateClockOut));
        assert_eq!(gate.call_count(), 0);
        assert_eq!(repo.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_full_day_then_clock_in_again_is_duplicate() {
        let clock = FakeClock::at(at(1, 8, 0));
        let (machine, repo, gate) =
            machine(FakeAttendanceRepo::default(), FakeGate::verified(), clock.clone());

        machine.clock_in().await.unwrap();
        clock.set(at(1, 17, 0));
        let record = machine.clock_out().await.unwrap();
        assert!(record.clock_out_at.unwrap() > record.clock_in_at.unwrap());
        assert_eq!(machine.state(), ClockState::ClockedOut);

        clock.set(at(1, 18, 0));
        assert_eq!(machine.clock_in().await, Err(ClockError::DuplicateClockIn));
        assert_eq!(machine.clock_out().await, Err(ClockError::DuplicateClockOut));
        assert_eq!(gate.call_count(), 2);
        assert_eq!(repo.commit_count(), 2);
    }

    #[tokio::test]
    async fn test_denial_leaves_state_and_skips_commit() {
        let (machine, repo, _) = machine(
            FakeAttendanceRepo::default(),
            FakeGate::returning(Verdict::Denied(DenialReason::OutsideGeofence {
                distance_meters: 150.0,
            })),
            FakeClock::at(at(1, 8, 0)),
        );

        assert_eq!(
            machine.clock_in().await,
            Err(ClockError::Denied(DenialReason::OutsideGeofence {
                distance_meters: 150.0
            }))
        );
        assert_eq!(machine.state(), ClockState::NotClockedIn);
        assert_eq!(repo.commit_count(), 0);
        assert!(!machine.snapshot().in_flight);
    }

    #[tokio::test]
    async fn test_clock_out_not_after_clock_in_is_rejected() {
        let clock = FakeClock::at(at(1, 8, 0));
        let (machine, repo, _) =
            machine(FakeAttendanceRepo::default(), FakeGate::verified(), clock.clone());

        machine.clock_in().await.unwrap();
        clock.advance(TimeDelta::seconds(-30));

        assert!(matches!(
            machine.clock_out().await,
            Err(ClockError::ClockOrderViolation { .. })
        ));
        assert_eq!(repo.commit_count(), 1);
        assert_eq!(machine.state(), ClockState::ClockedIn);
    }

    #[tokio::test]
    async fn test_second_attempt_while_pending_is_refused() {
        let release = Arc::new(Notify::new());
        let (machine, repo, gate) = machine(
            FakeAttendanceRepo::default(),
            FakeGate::held(release.clone()),
            FakeClock::at(at(1, 8, 0)),
        );

        let mut first = tokio_test::task::spawn(machine.clock_in());
        assert_pending!(first.poll());
        assert!(machine.snapshot().in_flight);

        assert_eq!(
            machine.clock_in().await,
            Err(ClockError::VerificationInProgress)
        );
        assert_eq!(
            machine.clock_out().await,
            Err(ClockError::VerificationInProgress)
        );
        assert_eq!(repo.commit_count(), 0);

        release.notify_one();
        assert!(first.is_woken());
        let record = assert_ready!(first.poll()).unwrap();
        assert!(record.clock_in_at.is_some());

        assert_eq!(gate.call_count(), 1);
        assert_eq!(repo.commit_count(), 1);
        assert!(!machine.snapshot().in_flight);
    }

    #[tokio::test]
    async fn test_dropped_attempt_releases_lock() {
        let release = Arc::new(Notify::new());
        let (machine, repo, _) = machine(
            FakeAttendanceRepo::default(),
            FakeGate::held(release.clone()),
            FakeClock::at(at(1, 8, 0)),
        );

        let mut first = tokio_test::task::spawn(machine.clock_in());
        assert_pending!(first.poll());
        drop(first);

        assert!(!machine.snapshot().in_flight);
        release.notify_one();
        machine.clock_in().await.unwrap();
        assert_eq!(repo.commit_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_commit_forces_refetch_before_next_attempt() {
        let clock = FakeClock::at(at(1, 8, 0));
        let (machine, repo, gate) =
            machine(FakeAttendanceRepo::default(), FakeGate::verified(), clock.clone());
        machine.refresh().await.unwrap();
        let fetches = repo.fetch_count();

        repo.fail_commit.store(true, std::sync::atomic::Ordering::SeqCst);
        let err = machine.clock_in().await.unwrap_err();
        assert!(matches!(
            err,
            ClockError::Network(ApiError::Status { status: 503, .. })
        ));
        assert!(machine.snapshot().stale);
        assert_eq!(machine.state(), ClockState::NotClockedIn);

        repo.fail_commit.store(false, std::sync::atomic::Ordering::SeqCst);
        clock.advance(TimeDelta::minutes(1));
        machine.clock_in().await.unwrap();
        assert_eq!(repo.fetch_count(), fetches + 1);
        assert_eq!(gate.call_count(), 2);
        assert_eq!(repo.commit_count(), 2);
    }

    #[tokio::test]
    async fn test_lost_commit_response_is_resolved_by_refetch() {
        let clock = FakeClock::at(at(1, 8, 0));
        let (machine, repo, gate) =
            machine(FakeAttendanceRepo::default(), FakeGate::verified(), clock.clone());

        repo.fail_commit.store(true, std::sync::atomic::Ordering::SeqCst);
        repo.apply_failed_commit
            .store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(machine.clock_in().await.is_err());

        // the backend did record the clock-in; the re-fetch reveals it
        repo.fail_commit.store(false, std::sync::atomic::Ordering::SeqCst);
        assert_eq!(machine.clock_in().await, Err(ClockError::DuplicateClockIn));
        assert_eq!(machine.state(), ClockState::ClockedIn);
        assert_eq!(gate.call_count(), 1);
    }

    #[tokio::test]
    async fn test_refetch_failure_keeps_state_stale() {
        let (machine, repo, gate) = machine(
            FakeAttendanceRepo::default(),
            FakeGate::verified(),
            FakeClock::at(at(1, 8, 0)),
        );
        repo.fail_fetch.store(true, std::sync::atomic::Ordering::SeqCst);

        assert!(matches!(
            machine.clock_in().await,
            Err(ClockError::Network(ApiError::Transport(_)))
        ));
        assert!(machine.snapshot().stale);
        assert_eq!(gate.call_count(), 0);
        assert_eq!(repo.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_new_day_starts_not_clocked_in() {
        let clock = FakeClock::at(at(1, 8, 0));
        let (machine, repo, _) =
            machine(FakeAttendanceRepo::default(), FakeGate::verified(), clock.clone());

        machine.clock_in().await.unwrap();
        clock.set(at(1, 17, 0));
        machine.clock_out().await.unwrap();

        clock.set(at(2, 8, 0));
        let record = machine.clock_in().await.unwrap();
        assert_eq!(record.day_key, day(2));
        assert_eq!(repo.commit_count(), 3);
    }

    #[tokio::test]
    async fn test_open_record_from_previous_day_is_left_to_backend() {
        let mut forgotten = AttendanceRecord::empty(day(1));
        forgotten.clock_in_at = Some(at(1, 8, 0));
        let (machine, repo, _) = machine(
            FakeAttendanceRepo::with_record(forgotten),
            FakeGate::verified(),
            FakeClock::at(at(2, 8, 0)),
        );

        let snapshot = machine.refresh().await.unwrap();
        assert_eq!(snapshot.state, ClockState::NotClockedIn);
        assert_eq!(snapshot.record.day_key, day(2));

        let record = machine.clock_in().await.unwrap();
        assert_eq!(record.day_key, day(2));
        assert_eq!(repo.commit_count(), 1);
    }

    #[tokio::test]
    async fn test_disposed_session_refuses_attempts() {
        let repo = Arc::new(FakeAttendanceRepo::default());
        let gate = Arc::new(FakeGate::verified());
        let session = session();
        let machine = AttendanceStateMachine::new(
            repo.clone(),
            gate.clone(),
            session.clone(),
            FakeClock::at(at(1, 8, 0)),
        );

        session.dispose();
        assert_eq!(machine.clock_in().await, Err(ClockError::SessionClosed));
        assert_eq!(repo.fetch_count(), 0);
        assert_eq!(gate.call_count(), 0);
    }

    #[tokio::test]
    async fn test_history_range() {
        let mut first = AttendanceRecord::empty(day(2));
        first.clock_in_at = Some(at(2, 8, 0));
        let repo = FakeAttendanceRepo::with_record(first);
        repo.records
            .lock()
            .unwrap()
            .insert(0, AttendanceRecord::empty(day(3)));
        let (machine, _, _) = machine(repo, FakeGate::verified(), FakeClock::at(at(3, 8, 0)));

        assert_eq!(
            machine.history(day(5), day(1)).await,
            Err(ClockError::InvalidRange {
                start: day(5),
                end: day(1)
            })
        );

        let records = machine.history(day(1), day(3)).await.unwrap();
        let days: Vec<_> = records.iter().map(|r| r.day_key).collect();
        assert_eq!(days, vec![day(2), day(3)]);
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let (machine, _, _) = machine(
            FakeAttendanceRepo::default(),
            FakeGate::verified(),
            FakeClock::at(at(1, 8, 0)),
        );
        let mut rx = machine.subscribe();
        rx.borrow_and_update();

        machine.clock_in().await.unwrap();
        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.state, ClockState::ClockedIn);
        assert!(!snapshot.in_flight);
    }
}

// ============================================================================
// Gates
// ============================================================================

#[cfg(test)]
mod gate_tests {
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use kernel::id::UserId;
    use uuid::Uuid;

    use super::fakes::*;
    use crate::application::attendance::AttendanceStateMachine;
    use crate::application::catalog::GeofenceCatalog;
    use crate::application::config::AttendanceConfig;
    use crate::application::credential::CredentialChallengeClient;
    use crate::application::gate::{
        BiometricGate, GeofenceGate, NoneGate, Verdict, VerificationContext, VerificationGate,
    };
    use crate::application::position::PositionProvider;
    use crate::domain::device::PositionOptions;
    use crate::domain::repository::Evidence;
    use crate::domain::value_objects::{ClockDirection, ClockState, LatLng};
    use crate::error::{ClockError, DenialReason};
    use crate::infra::device::StaticPositionSource;

    fn context() -> VerificationContext {
        VerificationContext {
            user_id: UserId::new("42"),
            direction: ClockDirection::In,
            attempt_id: Uuid::new_v4(),
        }
    }

    fn provider(source: StaticPositionSource) -> Arc<PositionProvider<StaticPositionSource>> {
        Arc::new(PositionProvider::new(
            Arc::new(source),
            PositionOptions::default(),
        ))
    }

    fn catalog(selected: bool) -> Arc<GeofenceCatalog<FakeGeofenceRepo>> {
        let config = AttendanceConfig {
            geofence_location_id: selected.then(|| office(100.0).id),
            ..Default::default()
        };
        Arc::new(GeofenceCatalog::new(
            Arc::new(FakeGeofenceRepo::with(vec![office(100.0)])),
            Arc::new(config),
        ))
    }

    fn geofence_gate(
        point: Option<LatLng>,
        selected: bool,
    ) -> GeofenceGate<StaticPositionSource, FakeGeofenceRepo> {
        let source = match point {
            Some(point) => StaticPositionSource::fixed(point, 5.0),
            None => StaticPositionSource::absent(),
        };
        GeofenceGate::new(provider(source), catalog(selected))
    }

    #[tokio::test]
    async fn test_geofence_gate_inside_radius() {
        let gate = geofence_gate(Some(north_of(&office(100.0), 95.0)), true);
        match gate.verify(&context()).await {
            Verdict::Verified(Evidence::Geofence {
                location_id,
                distance_meters,
                ..
            }) => {
                assert_eq!(location_id.as_str(), "hq");
                assert!((distance_meters - 95.0).abs() < 0.01);
            }
            other => panic!("unexpected verdict: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_geofence_gate_outside_radius() {
        let gate = geofence_gate(Some(north_of(&office(100.0), 150.0)), true);
        match gate.verify(&context()).await {
            Verdict::Denied(DenialReason::OutsideGeofence { distance_meters }) => {
                assert_eq!(distance_meters.round(), 150.0);
            }
            other => panic!("unexpected verdict: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_geofence_gate_requires_selection() {
        let gate = geofence_gate(Some(north_of(&office(100.0), 10.0)), false);
        assert_eq!(
            gate.verify(&context()).await,
            Verdict::Denied(DenialReason::NoLocationSelected)
        );
    }

    #[tokio::test]
    async fn test_geofence_gate_without_location_capability() {
        let gate = geofence_gate(None, true);
        assert_eq!(
            gate.verify(&context()).await,
            Verdict::Denied(DenialReason::LocationUnavailable)
        );
    }

    #[tokio::test]
    async fn test_geofence_denial_through_state_machine() {
        let repo = Arc::new(FakeAttendanceRepo::default());
        let gate = Arc::new(geofence_gate(Some(north_of(&office(100.0), 150.0)), true));
        let machine =
            AttendanceStateMachine::new(repo.clone(), gate, session(), FakeClock::at(at(1, 8, 0)));

        let err = machine.clock_in().await.unwrap_err();
        assert!(matches!(
            err,
            ClockError::Denied(DenialReason::OutsideGeofence { .. })
        ));
        assert_eq!(machine.state(), ClockState::NotClockedIn);
        assert_eq!(repo.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_geofence_commit_carries_location() {
        let repo = Arc::new(FakeAttendanceRepo::default());
        let gate = Arc::new(geofence_gate(Some(north_of(&office(100.0), 95.0)), true));
        let machine =
            AttendanceStateMachine::new(repo.clone(), gate, session(), FakeClock::at(at(1, 8, 0)));

        machine.clock_in().await.unwrap();
        let commits = repo.commits.lock().unwrap();
        assert!(matches!(
            &commits[0].evidence,
            Evidence::Geofence { location_id, .. } if location_id.as_str() == "hq"
        ));
    }

    #[tokio::test]
    async fn test_none_gate_verifies_without_location() {
        let gate = NoneGate::new(Some(provider(StaticPositionSource::absent())));
        assert_eq!(
            gate.verify(&context()).await,
            Verdict::Verified(Evidence::Unverified { position: None })
        );

        let point = LatLng::new(14.6, 121.0).unwrap();
        let gate = NoneGate::new(Some(provider(StaticPositionSource::fixed(point, 12.0))));
        match gate.verify(&context()).await {
            Verdict::Verified(Evidence::Unverified {
                position: Some(position),
            }) => assert_eq!(position.coordinates(), point),
            other => panic!("unexpected verdict: {:?}", other),
        }
    }

    fn biometric_gate(
        verified: Option<bool>,
    ) -> (
        BiometricGate<FakeBiometricRepo, SigningAuthenticator>,
        Arc<FakeBiometricRepo>,
    ) {
        let repo = Arc::new(FakeBiometricRepo::answering(verified));
        let client = CredentialChallengeClient::new(
            repo.clone(),
            Arc::new(SigningAuthenticator),
            Arc::new(AttendanceConfig::default()),
        );
        (BiometricGate::new(Arc::new(client)), repo)
    }

    #[tokio::test]
    async fn test_biometric_gate_verified() {
        let (gate, _) = biometric_gate(Some(true));
        assert!(matches!(
            gate.verify(&context()).await,
            Verdict::Verified(Evidence::Biometric {
                credential_id: Some(_)
            })
        ));
    }

    #[tokio::test]
    async fn test_verified_false_never_transitions() {
        let (gate, biometric) = biometric_gate(Some(false));
        let repo = Arc::new(FakeAttendanceRepo::default());
        let machine = AttendanceStateMachine::new(
            repo.clone(),
            Arc::new(gate),
            session(),
            FakeClock::at(at(1, 8, 0)),
        );

        assert_eq!(
            machine.clock_in().await,
            Err(ClockError::Denied(DenialReason::BiometricVerificationFailed))
        );
        assert_eq!(biometric.verifications.load(Ordering::SeqCst), 1);
        assert_eq!(machine.state(), ClockState::NotClockedIn);
        assert_eq!(repo.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_verifier_transport_failure_is_not_authenticated() {
        let (gate, _) = biometric_gate(None);
        assert_eq!(
            gate.verify(&context()).await,
            Verdict::Denied(DenialReason::BiometricVerificationFailed)
        );
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[cfg(test)]
mod catalog_tests {
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use kernel::error::{app_error::AppError, kind::ErrorKind};
    use kernel::id::LocationId;

    use super::fakes::*;
    use crate::application::catalog::GeofenceCatalog;
    use crate::application::config::AttendanceConfig;
    use crate::domain::repository::LocationDraft;
    use crate::domain::value_objects::LatLng;
    use crate::error::{ApiError, DenialReason, GeofenceError};

    fn catalog() -> (GeofenceCatalog<FakeGeofenceRepo>, Arc<FakeGeofenceRepo>) {
        let repo = Arc::new(FakeGeofenceRepo::with(vec![office(100.0)]));
        let catalog = GeofenceCatalog::new(repo.clone(), Arc::new(AttendanceConfig::default()));
        (catalog, repo)
    }

    fn draft(radius_meters: f64) -> LocationDraft {
        LocationDraft {
            name: "Warehouse".to_string(),
            address: "9 Dock Rd".to_string(),
            center: LatLng::new(14.55, 121.05).unwrap(),
            radius_meters,
        }
    }

    #[tokio::test]
    async fn test_select_requires_known_location() {
        let (catalog, _) = catalog();
        assert_eq!(
            catalog.select(&LocationId::new("hq")),
            Err(GeofenceError::UnknownLocation(LocationId::new("hq")))
        );

        catalog.refresh().await.unwrap();
        let location = catalog.select(&LocationId::new("hq")).unwrap();
        assert_eq!(location.name, "Head Office");
        assert_eq!(catalog.selected_id(), Some(LocationId::new("hq")));
    }

    #[tokio::test]
    async fn test_preselected_location_loads_lazily() {
        let repo = Arc::new(FakeGeofenceRepo::with(vec![office(100.0)]));
        let config = AttendanceConfig {
            geofence_location_id: Some(LocationId::new("gone")),
            ..Default::default()
        };
        let catalog = GeofenceCatalog::new(repo.clone(), Arc::new(config));

        assert_eq!(
            catalog.selected_location().await,
            Err(DenialReason::UnknownLocation(LocationId::new("gone")))
        );
        assert_eq!(repo.lists.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_location_fetch_failure_is_a_network_denial() {
        let repo = Arc::new(FakeGeofenceRepo::with(vec![office(100.0)]));
        repo.fail_list.store(true, Ordering::SeqCst);
        let config = AttendanceConfig {
            geofence_location_id: Some(LocationId::new("hq")),
            ..Default::default()
        };
        let catalog = GeofenceCatalog::new(repo.clone(), Arc::new(config));

        let reason = catalog.selected_location().await.unwrap_err();
        assert_eq!(
            reason,
            DenialReason::Network(ApiError::Transport("connection refused".to_string()))
        );
        let app_err = AppError::from(reason);
        assert_eq!(app_err.kind(), ErrorKind::Network);
        assert_eq!(app_err.action(), Some("Check your connection and try again"));

        // a failed load is retried on the next lookup
        repo.fail_list.store(false, Ordering::SeqCst);
        let location = catalog.selected_location().await.unwrap();
        assert_eq!(location.id, LocationId::new("hq"));
        assert_eq!(repo.lists.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_preview_reports_rounded_distance() {
        let (catalog, _) = catalog();
        catalog.refresh().await.unwrap();
        catalog.select(&LocationId::new("hq")).unwrap();

        let verdict = catalog
            .preview(north_of(&office(100.0), 150.0))
            .await
            .unwrap();
        assert_eq!(verdict.rounded_distance(), 150);
        assert!(!verdict.within);
    }

    #[tokio::test]
    async fn test_management_requires_manager_role() {
        let (catalog, repo) = catalog();
        assert_eq!(
            catalog.create(&session(), draft(50.0)).await,
            Err(GeofenceError::Forbidden)
        );
        assert_eq!(repo.writes.load(Ordering::SeqCst), 0);

        let manager = session_with_roles(&["Manager"]);
        let locations = catalog.create(&manager, draft(50.0)).await.unwrap();
        assert_eq!(locations.len(), 2);
        assert_eq!(catalog.locations().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_draft_is_not_sent() {
        let (catalog, repo) = catalog();
        let admin = session_with_roles(&["admin"]);
        assert!(matches!(
            catalog.create(&admin, draft(0.0)).await,
            Err(GeofenceError::InvalidLocation(_))
        ));
        assert_eq!(repo.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_delete_refreshes_cache() {
        let (catalog, _) = catalog();
        let admin = session_with_roles(&["admin"]);
        catalog.refresh().await.unwrap();
        let locations = catalog.delete(&admin, &LocationId::new("hq")).await.unwrap();
        assert!(locations.is_empty());
        assert!(catalog.find(&LocationId::new("hq")).is_none());
    }

    #[tokio::test]
    async fn test_verify_remote() {
        let (catalog, _) = catalog();
        let inside = north_of(&office(100.0), 20.0);
        assert!(
            catalog
                .verify_remote(inside, &LocationId::new("hq"))
                .await
                .unwrap()
        );
    }
}

// ============================================================================
// Sign in
// ============================================================================

#[cfg(test)]
mod sign_in_tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use platform::secret::SignInPassword;

    use super::fakes::*;
    use crate::application::sign_in::{SignInInput, SignInUseCase};
    use crate::error::SessionError;

    fn use_case(script: SignInScript) -> (SignInUseCase<FakeGateway>, Arc<FakeGateway>) {
        let gateway = Arc::new(FakeGateway {
            script,
            calls: AtomicUsize::new(0),
        });
        (SignInUseCase::new(gateway.clone()), gateway)
    }

    fn input(email: &str, password: &str) -> SignInInput {
        SignInInput {
            email: email.to_string(),
            password: SignInPassword::new(password),
        }
    }

    #[tokio::test]
    async fn test_sign_in_opens_session() {
        let (use_case, _) = use_case(SignInScript::Grant {
            token: Some("tok-1"),
        });
        let session = use_case
            .execute(input("ana@example.com", "hunter22"))
            .await
            .unwrap();
        assert!(session.is_open());
        assert_eq!(session.user_id().as_str(), "42");
        assert_eq!(session.authorization().unwrap(), "Bearer tok-1");
    }

    #[tokio::test]
    async fn test_blank_credentials_not_sent() {
        let (use_case, gateway) = use_case(SignInScript::Grant {
            token: Some("tok-1"),
        });
        assert_eq!(
            use_case.execute(input("  ", "hunter22")).await.unwrap_err(),
            SessionError::MissingCredentials
        );
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_token() {
        let (use_case, _) = use_case(SignInScript::Grant { token: None });
        assert_eq!(
            use_case
                .execute(input("ana@example.com", "hunter22"))
                .await
                .unwrap_err(),
            SessionError::MissingToken
        );
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let (use_case, _) = use_case(SignInScript::Reject(401));
        assert_eq!(
            use_case
                .execute(input("ana@example.com", "wrong"))
                .await
                .unwrap_err(),
            SessionError::Rejected("Please check your credentials.".to_string())
        );
    }
}

// ============================================================================
// Error mapping
// ============================================================================

#[cfg(test)]
mod error_tests {
    use kernel::error::app_error::AppError;
    use kernel::error::kind::ErrorKind;

    use crate::error::{ApiError, BiometricError, ClockError, DenialReason, LocationError};

    #[test]
    fn test_clock_error_kinds() {
        assert_eq!(ClockError::DuplicateClockIn.kind(), ErrorKind::Conflict);
        assert_eq!(ClockError::DuplicateClockOut.kind(), ErrorKind::Conflict);
        assert_eq!(ClockError::VerificationInProgress.kind(), ErrorKind::Busy);
        assert_eq!(ClockError::SessionClosed.kind(), ErrorKind::Session);
        assert_eq!(
            ClockError::Denied(DenialReason::OutsideGeofence {
                distance_meters: 150.0
            })
            .kind(),
            ErrorKind::Geofence
        );
        assert_eq!(
            ClockError::Network(ApiError::Transport("reset".to_string())).kind(),
            ErrorKind::Network
        );
    }

    #[test]
    fn test_denial_message_and_action() {
        let app: AppError = ClockError::Denied(DenialReason::OutsideGeofence {
            distance_meters: 149.6,
        })
        .into();
        assert_eq!(app.category(), "Outside Work Location");
        assert_eq!(app.message(), "You are 150 m from the work location");
        assert!(app.action().is_some());
        assert!(!app.is_retryable());
    }

    #[test]
    fn test_backend_message_preferred() {
        let err = ClockError::from(ApiError::Status {
            status: 409,
            message: "Already clocked in today".to_string(),
        });
        assert_eq!(err.to_app_error().message(), "Already clocked in today");
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_session_closed_api_error_maps_to_session_closed() {
        assert_eq!(
            ClockError::from(ApiError::SessionClosed),
            ClockError::SessionClosed
        );
    }

    #[test]
    fn test_location_and_biometric_denials() {
        assert_eq!(
            DenialReason::from(LocationError::PermissionDenied),
            DenialReason::LocationPermissionDenied
        );
        assert_eq!(
            DenialReason::from(BiometricError::Cancelled),
            DenialReason::BiometricCancelled
        );
        assert_eq!(
            DenialReason::from(BiometricError::Api(ApiError::Transport("x".to_string()))),
            DenialReason::BiometricVerificationFailed
        );
        assert_eq!(
            DenialReason::from(BiometricError::ChallengeReused),
            DenialReason::BiometricVerificationFailed
        );
        assert!(ErrorKind::Biometric.is_retryable());
    }
}
