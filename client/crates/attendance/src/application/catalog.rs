//! Geofence Catalog
//!
//! Read-only cache of the backend's work locations plus the location
//! selected for the geofence gate. Management calls require a manager role
//! and re-fetch the cache afterwards.

use std::sync::{Arc, PoisonError, RwLock};

use kernel::id::LocationId;

use crate::application::config::AttendanceConfig;
use crate::application::session::Session;
use crate::domain::entities::GeofenceLocation;
use crate::domain::repository::{GeofenceRepository, LocationDraft};
use crate::domain::services::{GeofenceVerdict, evaluate};
use crate::domain::value_objects::LatLng;
use crate::error::{ApiResult, DenialReason, GeofenceError};

#[derive(Debug, Default)]
struct CatalogState {
    locations: Vec<GeofenceLocation>,
    selected: Option<LocationId>,
    loaded: bool,
}

/// Geofence location catalog
pub struct GeofenceCatalog<R>
where
    R: GeofenceRepository,
{
    repo: Arc<R>,
    config: Arc<AttendanceConfig>,
    state: RwLock<CatalogState>,
}

impl<R> GeofenceCatalog<R>
where
    R: GeofenceRepository,
{
    pub fn new(repo: Arc<R>, config: Arc<AttendanceConfig>) -> Self {
        let state = CatalogState {
            selected: config.geofence_location_id.clone(),
            ..Default::default()
        };
        Self {
            repo,
            config,
            state: RwLock::new(state),
        }
    }

    /// Re-fetch every location from the backend
    pub async fn refresh(&self) -> Result<Vec<GeofenceLocation>, GeofenceError> {
        Ok(self.load().await?)
    }

    async fn load(&self) -> ApiResult<Vec<GeofenceLocation>> {
        let locations = self.repo.list_locations().await?;
        tracing::debug!(count = locations.len(), "Geofence locations loaded");

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.locations = locations.clone();
        state.loaded = true;
        Ok(locations)
    }

    /// Cached locations (empty until the first refresh)
    pub fn locations(&self) -> Vec<GeofenceLocation> {
        self.read(|state| state.locations.clone())
    }

    pub fn find(&self, id: &LocationId) -> Option<GeofenceLocation> {
        self.read(|state| state.locations.iter().find(|l| &l.id == id).cloned())
    }

    /// Select the location the geofence gate checks against
    pub fn select(&self, id: &LocationId) -> Result<GeofenceLocation, GeofenceError> {
        let location = self
            .find(id)
            .ok_or_else(|| GeofenceError::UnknownLocation(id.clone()))?;
        self.write(|state| state.selected = Some(id.clone()));
        tracing::info!(location_id = %id, name = %location.name, "Work location selected");
        Ok(location)
    }

    pub fn clear_selection(&self) {
        self.write(|state| state.selected = None);
    }

    pub fn selected_id(&self) -> Option<LocationId> {
        self.read(|state| state.selected.clone())
    }

    /// Resolve the selected location, loading the catalog on first use
    pub async fn selected_location(&self) -> Result<GeofenceLocation, DenialReason> {
        let id = self.selected_id().ok_or(DenialReason::NoLocationSelected)?;

        if let Some(location) = self.find(&id) {
            return Ok(location);
        }
        if !self.read(|state| state.loaded) {
            self.load().await.map_err(|err| {
                tracing::warn!(error = %err, "Could not load geofence locations");
                DenialReason::Network(err)
            })?;
        }
        self.find(&id).ok_or(DenialReason::UnknownLocation(id))
    }

    /// Distance and verdict for display, without committing anything
    pub async fn preview(&self, point: LatLng) -> Result<GeofenceVerdict, DenialReason> {
        let location = self.selected_location().await?;
        Ok(evaluate(point, &location))
    }

    /// Ask the backend whether the point is within a location (advisory)
    pub async fn verify_remote(
        &self,
        point: LatLng,
        location_id: &LocationId,
    ) -> Result<bool, GeofenceError> {
        Ok(self.repo.verify_location(point, location_id).await?)
    }

    pub async fn create(
        &self,
        session: &Session,
        draft: LocationDraft,
    ) -> Result<Vec<GeofenceLocation>, GeofenceError> {
        self.authorize(session)?;
        validate_draft(&draft)?;
        self.repo.create_location(&draft).await?;
        tracing::info!(user_id = %session.user_id(), name = %draft.name, "Work location created");
        self.refresh().await
    }

    pub async fn update(
        &self,
        session: &Session,
        id: &LocationId,
        draft: LocationDraft,
    ) -> Result<Vec<GeofenceLocation>, GeofenceError> {
        self.authorize(session)?;
        validate_draft(&draft)?;
        self.repo.update_location(id, &draft).await?;
        tracing::info!(user_id = %session.user_id(), location_id = %id, "Work location updated");
        self.refresh().await
    }

    pub async fn delete(
        &self,
        session: &Session,
        id: &LocationId,
    ) -> Result<Vec<GeofenceLocation>, GeofenceError> {
        self.authorize(session)?;
        self.repo.delete_location(id).await?;
        tracing::info!(user_id = %session.user_id(), location_id = %id, "Work location deleted");
        self.refresh().await
    }

    fn authorize(&self, session: &Session) -> Result<(), GeofenceError> {
        if !session.is_open() || !session.has_any_role(self.config.manager_roles.as_slice()) {
            tracing::warn!(user_id = %session.user_id(), "Location management refused");
            return Err(GeofenceError::Forbidden);
        }
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&CatalogState) -> T) -> T {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write(&self, f: impl FnOnce(&mut CatalogState)) {
        f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner))
    }
}

fn validate_draft(draft: &LocationDraft) -> Result<(), GeofenceError> {
    if draft.name.trim().is_empty() {
        return Err(GeofenceError::InvalidLocation("name is required".to_string()));
    }
    if LatLng::new(draft.center.latitude, draft.center.longitude).is_none() {
        return Err(GeofenceError::InvalidLocation(
            "coordinates out of range".to_string(),
        ));
    }
    if !(draft.radius_meters.is_finite() && draft.radius_meters > 0.0) {
        return Err(GeofenceError::InvalidLocation(
            "radius must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
