//! Connection and service wiring
//!
//! Configuration, sign-in and the attendance services for one command run.

use std::sync::Arc;

use anyhow::Context;
use attendance::application::catalog::GeofenceCatalog;
use attendance::application::credential::CredentialChallengeClient;
use attendance::application::gate::ConfiguredGate;
use attendance::application::position::PositionProvider;
use attendance::application::sign_in::{SignInInput, SignInUseCase};
use attendance::domain::services::SystemClock;
use attendance::domain::value_objects::LatLng;
use attendance::infra::device::{StaticPositionSource, UnsupportedAuthenticator};
use attendance::{AttendanceConfig, AttendanceStateMachine, RestApi, Session};
use clap::Args;
use kernel::id::LocationId;
use platform::secret::SignInPassword;
use platform::transport::Transport;

use crate::AppError;

pub type Gate = ConfiguredGate<StaticPositionSource, RestApi, RestApi, UnsupportedAuthenticator>;
pub type Machine = AttendanceStateMachine<RestApi, Gate>;
pub type Catalog = GeofenceCatalog<RestApi>;
pub type Credentials = CredentialChallengeClient<RestApi, UnsupportedAuthenticator>;

/// Account and backend options shared by every command
#[derive(Args)]
pub struct ConnectArgs {
    /// Account email.
    #[arg(long, env = "EMAIL", global = true)]
    pub email: Option<String>,

    /// Account password.
    #[arg(long, env = "PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// API root, e.g. https://hr.example.com/api (overrides API_BASE_URL).
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Development defaults: plain clock without verification.
    #[arg(long, global = true)]
    pub dev: bool,
}

/// Device position and work location for commands that need them
#[derive(Args, Default)]
pub struct PositionArgs {
    /// Latitude of the current position.
    #[arg(long, requires = "lng", allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Longitude of the current position.
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    pub lng: Option<f64>,

    /// Reported accuracy of the position in meters.
    #[arg(long, default_value_t = 10.0)]
    pub accuracy: f64,

    /// Work location id (overrides GEOFENCE_LOCATION_ID).
    #[arg(long)]
    pub location: Option<String>,
}

impl PositionArgs {
    pub fn point(&self) -> anyhow::Result<Option<LatLng>> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => LatLng::new(lat, lng)
                .map(Some)
                .with_context(|| format!("position {}, {} is out of range", lat, lng)),
            _ => Ok(None),
        }
    }
}

/// Services built for one command
pub struct Services {
    pub position: Arc<PositionProvider<StaticPositionSource>>,
    pub catalog: Arc<Catalog>,
    pub credentials: Arc<Credentials>,
}

/// Signed-in connection to the backend
pub struct Connection {
    pub config: Arc<AttendanceConfig>,
    pub session: Arc<Session>,
    pub api: Arc<RestApi>,
}

impl Connection {
    /// Load configuration and sign in
    pub async fn open(args: &ConnectArgs) -> anyhow::Result<Self> {
        let base = if args.dev {
            AttendanceConfig::development()
        } else {
            AttendanceConfig::default()
        };
        let mut config = base.overlay(|key| std::env::var(key).ok())?;
        if let Some(url) = &args.api_url {
            config = config.overlay(|key| (key == "API_BASE_URL").then(|| url.clone()))?;
        }
        tracing::debug!(
            api = %config.api_base_url,
            mode = %config.verification_mode,
            "Configuration loaded"
        );

        let transport = Transport::new(&config.transport_config())?;
        let email = args
            .email
            .clone()
            .context("EMAIL is not set (use --email)")?;
        let password = args
            .password
            .as_deref()
            .map(SignInPassword::new)
            .context("PASSWORD is not set (use --password)")?;

        let session = SignInUseCase::new(Arc::new(RestApi::anonymous(transport.clone())))
            .execute(SignInInput { email, password })
            .await
            .map_err(AppError::from)?;

        let api = Arc::new(RestApi::with_session(transport, session.clone()));
        Ok(Self {
            config: Arc::new(config),
            session,
            api,
        })
    }

    /// Build the services, selecting `--location` when given
    pub async fn services(&self, args: &PositionArgs) -> anyhow::Result<Services> {
        let source = match args.point()? {
            Some(point) => StaticPositionSource::fixed(point, args.accuracy),
            None => StaticPositionSource::absent(),
        };
        let position = Arc::new(
            PositionProvider::new(Arc::new(source), self.config.position_options())
                .with_clock_skew(self.config.location_clock_skew),
        );

        let catalog = Arc::new(GeofenceCatalog::new(self.api.clone(), self.config.clone()));
        if let Some(id) = &args.location {
            catalog.refresh().await.map_err(AppError::from)?;
            catalog
                .select(&LocationId::new(id.as_str()))
                .map_err(AppError::from)?;
        }

        let credentials = Arc::new(CredentialChallengeClient::new(
            self.api.clone(),
            Arc::new(UnsupportedAuthenticator),
            self.config.clone(),
        ));

        Ok(Services {
            position,
            catalog,
            credentials,
        })
    }

    /// State machine guarded by the configured verification gate
    pub fn state_machine(&self, services: &Services) -> Machine {
        let gate = ConfiguredGate::for_method(
            self.config.verification_mode,
            services.position.clone(),
            services.catalog.clone(),
            services.credentials.clone(),
        );
        AttendanceStateMachine::new(
            self.api.clone(),
            Arc::new(gate),
            self.session.clone(),
            Arc::new(SystemClock),
        )
    }

    /// Dispose the session; the token is zeroized
    pub fn close(&self) {
        self.session.dispose();
        tracing::debug!(user_id = %self.session.user_id(), "Session closed");
    }
}
