//! Client-side projections of the trip and vehicle lists.
//!
//! Projections are read-through and never edited in place: after a
//! confirmed server-side change callers invalidate, and the next read
//! re-fetches the authoritative list.

use std::{collections::HashMap, sync::Arc};

use shared::{
    domain::{TripId, TripScope, VehicleFilter, VehicleId},
    protocol::{Trip, Vehicle},
};
use tokio::sync::Mutex;
use tracing::debug;

use crate::{ClientError, TripApi};

#[derive(Default)]
struct CacheState {
    trips: HashMap<TripScope, Vec<Trip>>,
    vehicles: HashMap<VehicleFilter, Vec<Vehicle>>,
    trip_generation: u64,
    vehicle_generation: u64,
}

pub struct ProjectionCache {
    api: Arc<dyn TripApi>,
    inner: Mutex<CacheState>,
}

impl ProjectionCache {
    pub fn new(api: Arc<dyn TripApi>) -> Self {
        Self {
            api,
            inner: Mutex::new(CacheState::default()),
        }
    }

    pub async fn trips(&self, scope: TripScope) -> Result<Vec<Trip>, ClientError> {
        let generation = {
            let guard = self.inner.lock().await;
            if let Some(trips) = guard.trips.get(&scope) {
                return Ok(trips.clone());
            }
            guard.trip_generation
        };

        let trips = self.api.list_trips(scope).await?;
        let mut guard = self.inner.lock().await;
        // An invalidation raced the fetch; serve the result but do not keep it.
        if guard.trip_generation == generation {
            guard.trips.insert(scope, trips.clone());
        }
        debug!(?scope, count = trips.len(), "cache: trip projection loaded");
        Ok(trips)
    }

    pub async fn vehicles(&self, filter: VehicleFilter) -> Result<Vec<Vehicle>, ClientError> {
        let generation = {
            let guard = self.inner.lock().await;
            if let Some(vehicles) = guard.vehicles.get(&filter) {
                return Ok(vehicles.clone());
            }
            guard.vehicle_generation
        };

        let vehicles = self.api.list_vehicles(filter).await?;
        let mut guard = self.inner.lock().await;
        if guard.vehicle_generation == generation {
            guard.vehicles.insert(filter, vehicles.clone());
        }
        debug!(?filter, count = vehicles.len(), "cache: vehicle projection loaded");
        Ok(vehicles)
    }

    /// Looks the vehicle up among active vehicles, falling back to the
    /// full roster.
    pub async fn find_vehicle(
        &self,
        vehicle_id: VehicleId,
    ) -> Result<Option<Vehicle>, ClientError> {
        for filter in [VehicleFilter::Active, VehicleFilter::All] {
            if let Some(vehicle) = self.find_in(filter, vehicle_id).await? {
                return Ok(Some(vehicle));
            }
        }
        Ok(None)
    }

    /// Only vehicles that can take a new trip.
    pub async fn find_active_vehicle(
        &self,
        vehicle_id: VehicleId,
    ) -> Result<Option<Vehicle>, ClientError> {
        Ok(self
            .find_in(VehicleFilter::Active, vehicle_id)
            .await?
            .filter(|vehicle| vehicle.active))
    }

    async fn find_in(
        &self,
        filter: VehicleFilter,
        vehicle_id: VehicleId,
    ) -> Result<Option<Vehicle>, ClientError> {
        Ok(self
            .vehicles(filter)
            .await?
            .into_iter()
            .find(|vehicle| vehicle.id == vehicle_id))
    }

    pub async fn find_open_trip(&self, trip_id: TripId) -> Result<Option<Trip>, ClientError> {
        Ok(self
            .trips(TripScope::Active)
            .await?
            .into_iter()
            .find(|trip| trip.id == trip_id))
    }

    /// Trips in `scope` whose vehicle hit its wash cycle and that have no
    /// wash recorded yet, open or finalized.
    pub async fn trips_awaiting_wash(&self, scope: TripScope) -> Result<Vec<Trip>, ClientError> {
        let mut trips = self.trips(scope).await?;
        trips.retain(Trip::awaits_wash);
        Ok(trips)
    }

    pub async fn invalidate_trips(&self) {
        let mut guard = self.inner.lock().await;
        guard.trips.clear();
        guard.trip_generation += 1;
    }

    pub async fn invalidate_vehicles(&self) {
        let mut guard = self.inner.lock().await;
        guard.vehicles.clear();
        guard.vehicle_generation += 1;
    }

    /// Number of trip-list invalidations so far.
    pub async fn trip_invalidations(&self) -> u64 {
        self.inner.lock().await.trip_generation
    }

    pub async fn vehicle_invalidations(&self) -> u64 {
        self.inner.lock().await.vehicle_generation
    }
}

#[cfg(test)]
#[path = "tests/cache_tests.rs"]
mod tests;
