//! Position Provider
//!
//! Wraps a [`PositionSource`] binding:
//! - fails fast with `Unavailable` when the device has no location capability
//! - bounds each request by its timeout
//! - refuses fixes older than the permitted maximum age
//! - coalesces concurrent requests with the same options into one device request

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use tokio::sync::Mutex;

use crate::domain::device::{PositionOptions, PositionSource};
use crate::domain::value_objects::{LatLng, Position};
use crate::error::LocationError;

type FixFuture = BoxFuture<'static, Result<Position, LocationError>>;

/// Request in flight; held weakly so it ends once every caller has gone
struct InFlight {
    options: PositionOptions,
    fix: WeakShared<FixFuture>,
}

/// Device position provider with request coalescing
pub struct PositionProvider<S>
where
    S: PositionSource + Send + Sync + 'static,
{
    source: Arc<S>,
    options: PositionOptions,
    clock_skew: TimeDelta,
    in_flight: Mutex<Option<InFlight>>,
}

impl<S> PositionProvider<S>
where
    S: PositionSource + Send + Sync + 'static,
{
    pub fn new(source: Arc<S>, options: PositionOptions) -> Self {
        Self {
            source,
            options,
            clock_skew: TimeDelta::seconds(1),
            in_flight: Mutex::new(None),
        }
    }

    /// Tolerated difference between the device clock and a fresh fix
    pub fn with_clock_skew(mut self, skew: std::time::Duration) -> Self {
        self.clock_skew = TimeDelta::from_std(skew).unwrap_or(self.clock_skew);
        self
    }

    pub fn is_available(&self) -> bool {
        self.source.is_available()
    }

    pub fn options(&self) -> PositionOptions {
        self.options
    }

    /// Current position using the configured options
    pub async fn get_position(&self) -> Result<Position, LocationError> {
        self.get_position_with(self.options).await
    }

    /// Current position; joins a request already in flight with the same
    /// options instead of issuing a second one
    pub async fn get_position_with(
        &self,
        options: PositionOptions,
    ) -> Result<Position, LocationError> {
        if !self.source.is_available() {
            tracing::debug!("Location capability absent");
            return Err(LocationError::Unavailable);
        }

        let fix = {
            let mut slot = self.in_flight.lock().await;
            let joined = slot
                .as_ref()
                .filter(|pending| pending.options == options)
                .and_then(|pending| pending.fix.upgrade())
                .filter(|fix| fix.peek().is_none());
            match joined {
                Some(fix) => {
                    tracing::debug!("Joining in-flight location request");
                    fix
                }
                None => {
                    let fix = request_fix(self.source.clone(), options, self.clock_skew)
                        .boxed()
                        .shared();
                    *slot = fix.downgrade().map(|weak| InFlight { options, fix: weak });
                    fix
                }
            }
        };

        fix.await
    }
}

async fn request_fix<S>(
    source: Arc<S>,
    options: PositionOptions,
    clock_skew: TimeDelta,
) -> Result<Position, LocationError>
where
    S: PositionSource + Send + Sync + 'static,
{
    let requested_at = Utc::now();

    let position = match tokio::time::timeout(options.timeout, source.current_position(options))
        .await
    {
        Ok(result) => result?,
        Err(_) => {
            tracing::warn!(
                timeout_ms = options.timeout.as_millis() as u64,
                "Location request timed out"
            );
            return Err(LocationError::Timeout);
        }
    };

    if LatLng::new(position.latitude, position.longitude).is_none()
        || !position.accuracy_meters.is_finite()
    {
        tracing::warn!("Location fix had invalid coordinates");
        return Err(LocationError::Unavailable);
    }

    let max_age = TimeDelta::from_std(options.maximum_age).unwrap_or(TimeDelta::MAX);
    let oldest = max_age
        .checked_add(&clock_skew)
        .and_then(|window| requested_at.checked_sub_signed(window));
    if let Some(oldest) = oldest {
        if position.captured_at < oldest {
            tracing::warn!(
                captured_at = %position.captured_at,
                max_age_ms = options.maximum_age.as_millis() as u64,
                "Location fix is older than allowed"
            );
            return Err(LocationError::Unavailable);
        }
    }

    tracing::debug!(
        accuracy_m = position.accuracy_meters,
        "Location fix acquired"
    );
    Ok(position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio_test::{assert_pending, task};

    struct FakeSource {
        available: bool,
        delay: Duration,
        age: TimeDelta,
        result: Result<(f64, f64), LocationError>,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn fix(latitude: f64, longitude: f64) -> Self {
            Self {
                available: true,
                delay: Duration::ZERO,
                age: TimeDelta::zero(),
                result: Ok((latitude, longitude)),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl PositionSource for FakeSource {
        fn is_available(&self) -> bool {
            self.available
        }

        async fn current_position(
            &self,
            _options: PositionOptions,
        ) -> Result<Position, LocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let (latitude, longitude) = self.result?;
            Ok(Position {
                latitude,
                longitude,
                accuracy_meters: 8.0,
                captured_at: Utc::now() - self.age,
            })
        }
    }

    fn provider(source: FakeSource) -> (Arc<FakeSource>, PositionProvider<FakeSource>) {
        let source = Arc::new(source);
        let provider = PositionProvider::new(source.clone(), PositionOptions::default());
        (source, provider)
    }

    #[tokio::test]
    async fn test_returns_fresh_fix() {
        let (source, provider) = provider(FakeSource::fix(14.5, 121.0));
        let position = provider.get_position().await.unwrap();
        assert_eq!(position.latitude, 14.5);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_fails_without_request() {
        let (source, provider) = provider(FakeSource {
            available: false,
            ..FakeSource::fix(0.0, 0.0)
        });
        assert_eq!(provider.get_position().await, Err(LocationError::Unavailable));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_permission_denied_passes_through() {
        let (_, provider) = provider(FakeSource {
            result: Err(LocationError::PermissionDenied),
            ..FakeSource::fix(0.0, 0.0)
        });
        assert_eq!(
            provider.get_position().await,
            Err(LocationError::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn test_cached_fix_rejected_when_max_age_zero() {
        let (_, provider) = provider(FakeSource {
            age: TimeDelta::minutes(5),
            ..FakeSource::fix(14.5, 121.0)
        });
        assert_eq!(provider.get_position().await, Err(LocationError::Unavailable));
    }

    #[tokio::test]
    async fn test_cached_fix_accepted_within_max_age() {
        let source = Arc::new(FakeSource {
            age: TimeDelta::seconds(30),
            ..FakeSource::fix(14.5, 121.0)
        });
        let provider = PositionProvider::new(
            source,
            PositionOptions {
                maximum_age: Duration::from_secs(60),
                ..Default::default()
            },
        );
        assert!(provider.get_position().await.is_ok());
    }

    #[tokio::test]
    async fn test_out_of_range_fix_is_unavailable() {
        let (_, provider) = provider(FakeSource::fix(95.0, 0.0));
        assert_eq!(provider.get_position().await, Err(LocationError::Unavailable));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let (_, provider) = provider(FakeSource {
            delay: Duration::from_secs(30),
            ..FakeSource::fix(14.5, 121.0)
        });
        assert_eq!(provider.get_position().await, Err(LocationError::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_coalesce() {
        let (source, provider) = provider(FakeSource {
            delay: Duration::from_secs(2),
            ..FakeSource::fix(14.5, 121.0)
        });

        let (a, b) = tokio::join!(provider.get_position(), provider.get_position());
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(source.calls(), 1);

        // a settled request is not reused
        provider.get_position().await.unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_options_are_not_coalesced() {
        let (source, provider) = provider(FakeSource {
            delay: Duration::from_secs(2),
            ..FakeSource::fix(14.5, 121.0)
        });
        let relaxed = PositionOptions {
            maximum_age: Duration::from_secs(60),
            ..Default::default()
        };

        let (a, b) = tokio::join!(provider.get_position(), provider.get_position_with(relaxed));
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_request_is_not_joined_later() {
        let (source, provider) = provider(FakeSource {
            delay: Duration::from_secs(30),
            ..FakeSource::fix(14.5, 121.0)
        });

        let mut abandoned = task::spawn(provider.get_position());
        assert_pending!(abandoned.poll());
        drop(abandoned);
        assert_eq!(source.calls(), 1);

        tokio::time::advance(Duration::from_secs(11)).await;

        // the next caller gets its own device request and full timeout
        let started = tokio::time::Instant::now();
        assert_eq!(provider.get_position().await, Err(LocationError::Timeout));
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert_eq!(source.calls(), 2);
    }
}
