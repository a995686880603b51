//! In-memory fleet backend used by the controller, uploader and cache tests.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::Utc;
use shared::{
    domain::{
        EvidenceId, EvidencePurpose, TripId, TripScope, VehicleFilter, VehicleId, VehicleStatus,
    },
    error::{ApiException, ErrorCode},
    protocol::{
        EvidenceAsset, FinishTripRequest, FinishTripResponse, StartTripRequest, Trip, Vehicle,
    },
};
use tokio::sync::Notify;

use crate::{ClientError, EvidencePhoto, TripApi};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ApiCall {
    StartTrip(VehicleId),
    UploadEvidence {
        trip_id: TripId,
        purpose: EvidencePurpose,
        file_name: String,
    },
    FinishTrip(TripId),
    MarkWashed(TripId),
    ListTrips(TripScope),
    ListVehicles(VehicleFilter),
    ListTripEvidence(TripId),
}

#[derive(Default)]
struct FakeState {
    vehicles: Vec<Vehicle>,
    trips: Vec<Trip>,
    evidence: Vec<EvidenceAsset>,
    calls: Vec<ApiCall>,
    next_trip_id: i64,
    next_evidence_id: i64,
    failing_uploads: HashSet<String>,
    start_error: Option<ClientError>,
    finish_error: Option<ClientError>,
    mark_error: Option<ClientError>,
    // consumed by the next trip-list read
    list_trips_error: Option<ClientError>,
    trigger_wash_on_finish: bool,
    enforce_wash_gate: bool,
}

#[derive(Default)]
pub(crate) struct FakeFleetApi {
    state: Mutex<FakeState>,
    hold: Mutex<Option<Arc<Notify>>>,
}

impl FakeFleetApi {
    pub(crate) fn new() -> Arc<Self> {
        let api = Self::default();
        api.state().next_trip_id = 100;
        Arc::new(api)
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake state")
    }

    pub(crate) fn add_vehicle(&self, vehicle: Vehicle) {
        self.state().vehicles.push(vehicle);
    }

    pub(crate) fn add_trip(&self, trip: Trip) {
        self.state().trips.push(trip);
    }

    pub(crate) fn fail_upload(&self, file_name: &str) {
        self.state().failing_uploads.insert(file_name.to_string());
    }

    pub(crate) fn allow_upload(&self, file_name: &str) {
        self.state().failing_uploads.remove(file_name);
    }

    pub(crate) fn fail_start(&self, err: ClientError) {
        self.state().start_error = Some(err);
    }

    pub(crate) fn fail_finish(&self, err: ClientError) {
        self.state().finish_error = Some(err);
    }

    pub(crate) fn fail_mark_washed(&self, err: ClientError) {
        self.state().mark_error = Some(err);
    }

    pub(crate) fn fail_next_list_trips(&self, err: ClientError) {
        self.state().list_trips_error = Some(err);
    }

    pub(crate) fn clear_failures(&self) {
        let mut state = self.state();
        state.failing_uploads.clear();
        state.start_error = None;
        state.finish_error = None;
        state.mark_error = None;
    }

    /// Finishing a trip flags the vehicle for its next wash cycle.
    pub(crate) fn trigger_wash_on_finish(&self) {
        self.state().trigger_wash_on_finish = true;
    }

    /// Rejects finalize server-side while the vehicle is unwashed.
    pub(crate) fn enforce_wash_gate(&self) {
        self.state().enforce_wash_gate = true;
    }

    pub(crate) fn set_vehicle_requires_wash(&self, vehicle_id: VehicleId, requires_wash: bool) {
        if let Some(vehicle) = self
            .state()
            .vehicles
            .iter_mut()
            .find(|vehicle| vehicle.id == vehicle_id)
        {
            vehicle.requires_wash = requires_wash;
        }
    }

    /// Start and finish calls wait for a permit on the returned handle.
    pub(crate) fn hold_requests(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.hold.lock().expect("hold") = Some(notify.clone());
        notify
    }

    pub(crate) fn calls(&self) -> Vec<ApiCall> {
        self.state().calls.clone()
    }

    pub(crate) fn count_calls(&self, predicate: impl Fn(&ApiCall) -> bool) -> usize {
        self.state().calls.iter().filter(|call| predicate(call)).count()
    }

    pub(crate) fn uploads(&self) -> Vec<(EvidencePurpose, String)> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                ApiCall::UploadEvidence {
                    purpose, file_name, ..
                } => Some((*purpose, file_name.clone())),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn evidence(&self) -> Vec<EvidenceAsset> {
        self.state().evidence.clone()
    }

    pub(crate) fn trip(&self, trip_id: TripId) -> Option<Trip> {
        self.state()
            .trips
            .iter()
            .find(|trip| trip.id == trip_id)
            .cloned()
    }

    async fn wait_for_release(&self) {
        let hold = self.hold.lock().expect("hold").clone();
        if let Some(notify) = hold {
            notify.notified().await;
        }
    }
}

#[async_trait]
impl TripApi for FakeFleetApi {
    async fn start_trip(&self, request: &StartTripRequest) -> Result<TripId, ClientError> {
        self.state().calls.push(ApiCall::StartTrip(request.vehicle_id));
        self.wait_for_release().await;

        let mut state = self.state();
        if let Some(err) = state.start_error.clone() {
            return Err(err);
        }
        let trip_id = TripId(state.next_trip_id);
        state.next_trip_id += 1;
        let vehicle = state
            .vehicles
            .iter_mut()
            .find(|vehicle| vehicle.id == request.vehicle_id)
            .ok_or_else(|| {
                ClientError::Api(ApiException::new(404, ErrorCode::NotFound, "Vehículo no encontrado"))
            })?;
        vehicle.status = VehicleStatus::InUse;
        let requires_wash = vehicle.requires_wash;
        state.trips.push(Trip {
            id: trip_id,
            user_id: None,
            vehicle_id: request.vehicle_id,
            started_at: Some(Utc::now()),
            ended_at: None,
            start_odometer: request.start_odometer,
            end_odometer: None,
            start_fuel: request.start_fuel,
            end_fuel: None,
            notes: None,
            requires_wash,
            washed: false,
            vehicle: None,
            user: None,
        });
        Ok(trip_id)
    }

    async fn upload_evidence(
        &self,
        trip_id: TripId,
        purpose: EvidencePurpose,
        photo: &EvidencePhoto,
    ) -> Result<(), ClientError> {
        let mut state = self.state();
        state.calls.push(ApiCall::UploadEvidence {
            trip_id,
            purpose,
            file_name: photo.file_name.clone(),
        });
        if state.failing_uploads.contains(&photo.file_name) {
            return Err(ClientError::Transport("connection reset by peer".to_string()));
        }
        state.next_evidence_id += 1;
        let id = EvidenceId(state.next_evidence_id);
        state.evidence.push(EvidenceAsset {
            id,
            trip_id: Some(trip_id),
            vehicle_id: None,
            purpose,
            url: format!("/uploads/{}", photo.file_name),
            file_name: Some(photo.file_name.clone()),
            created_at: Some(Utc::now()),
        });
        Ok(())
    }

    async fn finish_trip(
        &self,
        trip_id: TripId,
        request: &FinishTripRequest,
    ) -> Result<FinishTripResponse, ClientError> {
        self.state().calls.push(ApiCall::FinishTrip(trip_id));
        self.wait_for_release().await;

        let mut state = self.state();
        if let Some(err) = state.finish_error.clone() {
            return Err(err);
        }
        let trigger = state.trigger_wash_on_finish;
        let enforce = state.enforce_wash_gate;
        let trip_index = state
            .trips
            .iter()
            .position(|trip| trip.id == trip_id)
            .ok_or_else(|| {
                ClientError::Api(ApiException::new(404, ErrorCode::NotFound, "Viaje no encontrado"))
            })?;
        let vehicle_id = state.trips[trip_index].vehicle_id;
        let washed = state.trips[trip_index].washed;
        let vehicle = state
            .vehicles
            .iter_mut()
            .find(|vehicle| vehicle.id == vehicle_id)
            .ok_or_else(|| {
                ClientError::Api(ApiException::new(404, ErrorCode::NotFound, "Vehículo no encontrado"))
            })?;
        if enforce && vehicle.requires_wash && !washed {
            return Err(ClientError::Api(ApiException::new(
                400,
                ErrorCode::WashRequired,
                "Debe registrar el lavado antes de finalizar",
            )));
        }
        vehicle.current_odometer = request.end_odometer;
        vehicle.status = VehicleStatus::Available;
        if trigger {
            vehicle.requires_wash = true;
        }
        let trip = &mut state.trips[trip_index];
        trip.ended_at = Some(Utc::now());
        trip.end_odometer = Some(request.end_odometer);
        trip.end_fuel = request.end_fuel;
        trip.notes = request.notes.clone();
        trip.requires_wash |= trigger;
        Ok(FinishTripResponse {
            requires_wash: trigger,
            message: None,
        })
    }

    async fn mark_washed(&self, trip_id: TripId) -> Result<(), ClientError> {
        let mut state = self.state();
        state.calls.push(ApiCall::MarkWashed(trip_id));
        if let Some(err) = state.mark_error.clone() {
            return Err(err);
        }
        let vehicle_id = match state.trips.iter_mut().find(|trip| trip.id == trip_id) {
            Some(trip) => {
                trip.washed = true;
                trip.vehicle_id
            }
            None => {
                return Err(ClientError::Api(ApiException::new(
                    404,
                    ErrorCode::NotFound,
                    "Viaje no encontrado",
                )))
            }
        };
        if let Some(vehicle) = state
            .vehicles
            .iter_mut()
            .find(|vehicle| vehicle.id == vehicle_id)
        {
            vehicle.requires_wash = false;
        }
        Ok(())
    }

    async fn list_trips(&self, scope: TripScope) -> Result<Vec<Trip>, ClientError> {
        let mut state = self.state();
        state.calls.push(ApiCall::ListTrips(scope));
        if let Some(err) = state.list_trips_error.take() {
            return Err(err);
        }
        let open_only = matches!(scope, TripScope::Active | TripScope::MineActive);
        Ok(state
            .trips
            .iter()
            .filter(|trip| !open_only || trip.is_open())
            .cloned()
            .collect())
    }

    async fn list_vehicles(&self, filter: VehicleFilter) -> Result<Vec<Vehicle>, ClientError> {
        let mut state = self.state();
        state.calls.push(ApiCall::ListVehicles(filter));
        Ok(state
            .vehicles
            .iter()
            .filter(|vehicle| match filter {
                VehicleFilter::Active => vehicle.active,
                VehicleFilter::Inactive => !vehicle.active,
                VehicleFilter::All => true,
            })
            .cloned()
            .collect())
    }

    async fn list_trip_evidence(&self, trip_id: TripId) -> Result<Vec<EvidenceAsset>, ClientError> {
        let mut state = self.state();
        state.calls.push(ApiCall::ListTripEvidence(trip_id));
        Ok(state
            .evidence
            .iter()
            .filter(|asset| asset.trip_id == Some(trip_id))
            .cloned()
            .collect())
    }
}

pub(crate) fn vehicle(id: i64, plate: &str, odometer: f64) -> Vehicle {
    Vehicle {
        id: VehicleId(id),
        plate: plate.to_string(),
        brand: Some("Toyota".to_string()),
        model: Some("Hilux".to_string()),
        year: Some(2021),
        color: None,
        active: true,
        status: VehicleStatus::Available,
        current_odometer: odometer,
        trips_since_wash: None,
        requires_wash: false,
    }
}

pub(crate) fn open_trip(id: i64, vehicle: &Vehicle, start_odometer: f64) -> Trip {
    Trip {
        id: TripId(id),
        user_id: None,
        vehicle_id: vehicle.id,
        started_at: Some(Utc::now()),
        ended_at: None,
        start_odometer,
        end_odometer: None,
        start_fuel: None,
        end_fuel: None,
        notes: None,
        requires_wash: vehicle.requires_wash,
        washed: false,
        vehicle: None,
        user: None,
    }
}

pub(crate) fn photo(file_name: &str) -> EvidencePhoto {
    EvidencePhoto::new(file_name, "image/jpeg", file_name.as_bytes().to_vec())
}
