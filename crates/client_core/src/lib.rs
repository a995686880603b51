use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use shared::{
    domain::{EvidencePurpose, TripId, TripScope, UserId, VehicleFilter, VehicleId},
    protocol::{
        EvidenceAsset, FinishTripRequest, FinishTripResponse, StartTripRequest, Trip, UserForm,
        UserSummary, Vehicle, VehicleForm,
    },
};

pub mod cache;
pub mod error;
pub mod evidence;
pub mod notifications;
pub mod roster;
pub mod transport;
pub mod trip_session;
pub mod wash_gate;

pub use cache::ProjectionCache;
pub use error::{ClientError, ValidationError};
pub use evidence::{EvidenceUploader, UploadError};
pub use notifications::{Notification, NotificationRelay, NotificationSink, Severity};
pub use roster::{FleetSummary, RosterManager};
pub use transport::{HttpFleetApi, Session};
pub use trip_session::{
    FinishForm, ResumeTarget, StartForm, TripPhase, TripSession, TripSessionEvent,
    TripSessionOptions, WashForm,
};
pub use wash_gate::requires_wash_before_finalize;

/// One photo selected for upload. The bytes are sent as-is; image checks
/// happen before a photo reaches the uploader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidencePhoto {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl EvidencePhoto {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read photo '{}'", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo".to_string());
        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self {
            file_name,
            content_type,
            bytes,
        })
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// Calls the trip workflow needs from the fleet backend.
#[async_trait]
pub trait TripApi: Send + Sync {
    async fn start_trip(&self, request: &StartTripRequest) -> Result<TripId, ClientError>;
    async fn upload_evidence(
        &self,
        trip_id: TripId,
        purpose: EvidencePurpose,
        photo: &EvidencePhoto,
    ) -> Result<(), ClientError>;
    async fn finish_trip(
        &self,
        trip_id: TripId,
        request: &FinishTripRequest,
    ) -> Result<FinishTripResponse, ClientError>;
    async fn mark_washed(&self, trip_id: TripId) -> Result<(), ClientError>;
    async fn list_trips(&self, scope: TripScope) -> Result<Vec<Trip>, ClientError>;
    async fn list_vehicles(&self, filter: VehicleFilter) -> Result<Vec<Vehicle>, ClientError>;
    async fn list_trip_evidence(&self, trip_id: TripId) -> Result<Vec<EvidenceAsset>, ClientError>;
}

/// Administrator calls over the vehicle and user rosters.
#[async_trait]
pub trait RosterApi: Send + Sync {
    async fn create_vehicle(&self, form: &VehicleForm) -> Result<Vehicle, ClientError>;
    async fn update_vehicle(
        &self,
        vehicle_id: VehicleId,
        form: &VehicleForm,
    ) -> Result<(), ClientError>;
    async fn delete_vehicle(&self, vehicle_id: VehicleId) -> Result<(), ClientError>;
    async fn toggle_vehicle_active(&self, vehicle_id: VehicleId) -> Result<(), ClientError>;
    async fn list_vehicle_evidence(
        &self,
        vehicle_id: VehicleId,
    ) -> Result<Vec<EvidenceAsset>, ClientError>;
    async fn list_users(&self) -> Result<Vec<UserSummary>, ClientError>;
    async fn register_user(&self, form: &UserForm) -> Result<(), ClientError>;
    async fn update_user(&self, user_id: UserId, form: &UserForm) -> Result<(), ClientError>;
    async fn delete_user(&self, user_id: UserId) -> Result<(), ClientError>;
    async fn toggle_user_active(&self, user_id: UserId) -> Result<(), ClientError>;
    async fn my_profile(&self) -> Result<UserSummary, ClientError>;
    async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ClientError>;
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
