//! Administrator operations over the vehicle and user rosters.

use std::sync::Arc;

use serde::Serialize;
use shared::{
    domain::{UserId, VehicleFilter, VehicleId, VehicleStatus},
    protocol::{EvidenceAsset, UserForm, UserSummary, Vehicle, VehicleForm},
};
use tracing::{info, warn};

use crate::{
    cache::ProjectionCache,
    error::{ClientError, ValidationError},
    notifications::NotificationSink,
    RosterApi,
};

/// Vehicle counts for the dashboard header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FleetSummary {
    pub total: usize,
    pub available: usize,
    pub in_use: usize,
    pub maintenance: usize,
    pub blocked: usize,
    pub requiring_wash: usize,
}

impl FleetSummary {
    pub fn from_vehicles(vehicles: &[Vehicle]) -> Self {
        vehicles.iter().fold(Self::default(), |mut summary, vehicle| {
            summary.total += 1;
            match vehicle.status {
                VehicleStatus::Available => summary.available += 1,
                VehicleStatus::InUse => summary.in_use += 1,
                VehicleStatus::Maintenance => summary.maintenance += 1,
                VehicleStatus::Blocked => summary.blocked += 1,
                VehicleStatus::Unknown => {}
            }
            if vehicle.requires_wash {
                summary.requiring_wash += 1;
            }
            summary
        })
    }
}

pub struct RosterManager {
    api: Arc<dyn RosterApi>,
    cache: Arc<ProjectionCache>,
    notifications: Arc<dyn NotificationSink>,
}

impl RosterManager {
    pub fn new(
        api: Arc<dyn RosterApi>,
        cache: Arc<ProjectionCache>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            api,
            cache,
            notifications,
        }
    }

    pub async fn vehicles(&self, filter: VehicleFilter) -> Result<Vec<Vehicle>, ClientError> {
        self.cache.vehicles(filter).await
    }

    pub async fn fleet_summary(&self) -> Result<FleetSummary, ClientError> {
        let vehicles = self.cache.vehicles(VehicleFilter::All).await?;
        Ok(FleetSummary::from_vehicles(&vehicles))
    }

    pub async fn create_vehicle(&self, form: &VehicleForm) -> Result<Vehicle, ClientError> {
        let result = self.api.create_vehicle(form).await;
        if result.is_ok() {
            self.cache.invalidate_vehicles().await;
        }
        self.settle(result, "Could not create vehicle", |vehicle| {
            info!(vehicle_id = vehicle.id.0, plate = %vehicle.plate, "roster: vehicle created");
            format!("Vehicle {} created", vehicle.plate)
        })
    }

    pub async fn update_vehicle(
        &self,
        vehicle_id: VehicleId,
        form: &VehicleForm,
    ) -> Result<(), ClientError> {
        let result = self.api.update_vehicle(vehicle_id, form).await;
        if result.is_ok() {
            self.cache.invalidate_vehicles().await;
        }
        self.settle(result, "Could not update vehicle", |_| {
            format!("Vehicle {} updated", form.plate)
        })
    }

    pub async fn delete_vehicle(&self, vehicle_id: VehicleId) -> Result<(), ClientError> {
        let result = self.api.delete_vehicle(vehicle_id).await;
        if result.is_ok() {
            self.cache.invalidate_vehicles().await;
        }
        self.settle(result, "Could not delete vehicle", |_| {
            info!(vehicle_id = vehicle_id.0, "roster: vehicle deleted");
            format!("Vehicle {vehicle_id} deleted")
        })
    }

    pub async fn toggle_vehicle_active(&self, vehicle_id: VehicleId) -> Result<(), ClientError> {
        let result = self.api.toggle_vehicle_active(vehicle_id).await;
        if result.is_ok() {
            self.cache.invalidate_vehicles().await;
        }
        self.settle(result, "Could not change vehicle status", |_| {
            format!("Vehicle {vehicle_id} status changed")
        })
    }

    pub async fn vehicle_evidence(
        &self,
        vehicle_id: VehicleId,
    ) -> Result<Vec<EvidenceAsset>, ClientError> {
        self.api.list_vehicle_evidence(vehicle_id).await
    }

    pub async fn users(&self) -> Result<Vec<UserSummary>, ClientError> {
        self.api.list_users().await
    }

    pub async fn register_user(&self, form: &UserForm) -> Result<(), ClientError> {
        if form.password != form.password_confirm {
            return Err(self.reject(ValidationError::PasswordMismatch));
        }
        let result = self.api.register_user(form).await;
        self.settle(result, "Could not register user", |_| {
            info!(email = %form.email, "roster: user registered");
            format!("User {} registered", form.name)
        })
    }

    pub async fn update_user(&self, user_id: UserId, form: &UserForm) -> Result<(), ClientError> {
        if form.password.is_some() && form.password != form.password_confirm {
            return Err(self.reject(ValidationError::PasswordMismatch));
        }
        let result = self.api.update_user(user_id, form).await;
        self.settle(result, "Could not update user", |_| {
            format!("User {} updated", form.name)
        })
    }

    pub async fn delete_user(&self, user_id: UserId) -> Result<(), ClientError> {
        let result = self.api.delete_user(user_id).await;
        self.settle(result, "Could not delete user", |_| {
            format!("User {user_id} deleted")
        })
    }

    pub async fn toggle_user_active(&self, user_id: UserId) -> Result<(), ClientError> {
        let result = self.api.toggle_user_active(user_id).await;
        self.settle(result, "Could not change user status", |_| {
            format!("User {user_id} status changed")
        })
    }

    pub async fn profile(&self) -> Result<UserSummary, ClientError> {
        self.api.my_profile().await
    }

    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
        confirmation: &str,
    ) -> Result<(), ClientError> {
        if new_password != confirmation {
            return Err(self.reject(ValidationError::PasswordMismatch));
        }
        let result = self.api.change_password(current_password, new_password).await;
        self.settle(result, "Could not change password", |_| {
            "Password changed".to_string()
        })
    }

    fn reject(&self, err: ValidationError) -> ClientError {
        self.notifications.error(err.to_string());
        ClientError::Validation(err)
    }

    fn settle<T>(
        &self,
        result: Result<T, ClientError>,
        failure: &str,
        success: impl FnOnce(&T) -> String,
    ) -> Result<T, ClientError> {
        match &result {
            Ok(value) => {
                self.notifications.success(success(value));
            }
            Err(err) => {
                warn!(error = %err, "roster: {failure}");
                self.notifications
                    .error(format!("{failure}: {}", err.user_message()));
            }
        }
        result
    }
}

#[cfg(test)]
#[path = "tests/roster_tests.rs"]
mod tests;
