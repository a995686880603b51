//! Client-side state machine for one trip: start, finalize, wash.
//!
//! Every operation returns the phase the session ended up in. Failures
//! never escape as errors; they become notifications and a retryable
//! phase. The state lock is never held across a network call, so
//! [`TripSession::cancel`] can run while a request is in flight; results
//! of requests issued before a cancel are dropped on arrival.

use std::{fmt, sync::Arc, time::Duration};

use chrono::Utc;
use shared::{
    domain::{EvidencePurpose, TripId, TripScope, VehicleId},
    protocol::{FinishTripRequest, StartTripRequest, Trip, Vehicle},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    cache::ProjectionCache,
    error::{ClientError, ValidationError},
    evidence::EvidenceUploader,
    notifications::{NotificationSink, Severity},
    wash_gate::requires_wash_before_finalize,
    EvidencePhoto, TripApi,
};

pub const DEFAULT_ODOMETER_TOLERANCE: f64 = 0.1;
const WASH_TRIGGER_NOTICE: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeTarget {
    Idle,
    Active,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TripPhase {
    Idle,
    Starting,
    Active,
    Finalizing,
    WashRequired,
    MarkingWashed,
    Finalized,
    Failed { reason: String, resume: ResumeTarget },
}

impl TripPhase {
    pub fn name(&self) -> &'static str {
        match self {
            TripPhase::Idle => "idle",
            TripPhase::Starting => "starting",
            TripPhase::Active => "active",
            TripPhase::Finalizing => "finalizing",
            TripPhase::WashRequired => "wash-required",
            TripPhase::MarkingWashed => "marking-washed",
            TripPhase::Finalized => "finalized",
            TripPhase::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for TripPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TripPhase::Failed { reason, .. } => write!(f, "failed ({reason})"),
            other => f.write_str(other.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartForm {
    pub vehicle_id: VehicleId,
    pub start_odometer: f64,
    pub start_fuel: Option<f64>,
    pub odometer_photos: Vec<EvidencePhoto>,
    pub fuel_photos: Vec<EvidencePhoto>,
}

impl StartForm {
    pub fn new(vehicle_id: VehicleId, start_odometer: f64) -> Self {
        Self {
            vehicle_id,
            start_odometer,
            start_fuel: None,
            odometer_photos: Vec::new(),
            fuel_photos: Vec::new(),
        }
    }

    pub fn with_fuel(mut self, level: f64) -> Self {
        self.start_fuel = Some(level);
        self
    }

    pub fn with_odometer_photos(mut self, photos: Vec<EvidencePhoto>) -> Self {
        self.odometer_photos = photos;
        self
    }

    pub fn with_fuel_photos(mut self, photos: Vec<EvidencePhoto>) -> Self {
        self.fuel_photos = photos;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinishForm {
    pub end_odometer: f64,
    pub end_fuel: Option<f64>,
    pub notes: Option<String>,
    pub odometer_photos: Vec<EvidencePhoto>,
    pub fuel_photos: Vec<EvidencePhoto>,
}

impl FinishForm {
    pub fn new(end_odometer: f64) -> Self {
        Self {
            end_odometer,
            end_fuel: None,
            notes: None,
            odometer_photos: Vec::new(),
            fuel_photos: Vec::new(),
        }
    }

    pub fn with_fuel(mut self, level: f64) -> Self {
        self.end_fuel = Some(level);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_odometer_photos(mut self, photos: Vec<EvidencePhoto>) -> Self {
        self.odometer_photos = photos;
        self
    }

    pub fn with_fuel_photos(mut self, photos: Vec<EvidencePhoto>) -> Self {
        self.fuel_photos = photos;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WashForm {
    pub photos: Vec<EvidencePhoto>,
}

impl WashForm {
    pub fn new(photos: Vec<EvidencePhoto>) -> Self {
        Self { photos }
    }
}

#[derive(Debug, Clone)]
pub enum TripSessionEvent {
    PhaseChanged {
        trip_id: Option<TripId>,
        phase: TripPhase,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct TripSessionOptions {
    pub odometer_tolerance: f64,
}

impl Default for TripSessionOptions {
    fn default() -> Self {
        Self {
            odometer_tolerance: DEFAULT_ODOMETER_TOLERANCE,
        }
    }
}

struct SessionState {
    phase: TripPhase,
    epoch: u64,
    trip: Option<Trip>,
    start_form: Option<StartForm>,
    finish_draft: Option<FinishForm>,
    wash_form: Option<WashForm>,
    // marcar-lavado already confirmed for the current wash attempt
    wash_marked: bool,
}

pub struct TripSession {
    api: Arc<dyn TripApi>,
    cache: Arc<ProjectionCache>,
    uploader: EvidenceUploader,
    notifications: Arc<dyn NotificationSink>,
    options: TripSessionOptions,
    inner: Mutex<SessionState>,
    events: broadcast::Sender<TripSessionEvent>,
}

impl TripSession {
    pub fn new(
        api: Arc<dyn TripApi>,
        cache: Arc<ProjectionCache>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Arc<Self> {
        Self::with_options(api, cache, notifications, TripSessionOptions::default())
    }

    pub fn with_options(
        api: Arc<dyn TripApi>,
        cache: Arc<ProjectionCache>,
        notifications: Arc<dyn NotificationSink>,
        options: TripSessionOptions,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            uploader: EvidenceUploader::new(api.clone()),
            api,
            cache,
            notifications,
            options,
            inner: Mutex::new(SessionState {
                phase: TripPhase::Idle,
                epoch: 0,
                trip: None,
                start_form: None,
                finish_draft: None,
                wash_form: None,
                wash_marked: false,
            }),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TripSessionEvent> {
        self.events.subscribe()
    }

    pub async fn phase(&self) -> TripPhase {
        self.inner.lock().await.phase.clone()
    }

    pub async fn trip(&self) -> Option<Trip> {
        self.inner.lock().await.trip.clone()
    }

    pub async fn start_form(&self) -> Option<StartForm> {
        self.inner.lock().await.start_form.clone()
    }

    pub async fn finish_draft(&self) -> Option<FinishForm> {
        self.inner.lock().await.finish_draft.clone()
    }

    pub async fn wash_form(&self) -> Option<WashForm> {
        self.inner.lock().await.wash_form.clone()
    }

    pub async fn start(&self, form: StartForm) -> TripPhase {
        {
            let state = self.inner.lock().await;
            if state.phase != TripPhase::Idle {
                return self.reject(&state, invalid_phase("start a trip", &state.phase));
            }
        }

        let vehicle = match self.cache.find_active_vehicle(form.vehicle_id).await {
            Ok(Some(vehicle)) => vehicle,
            Ok(None) => {
                let state = self.inner.lock().await;
                return self.reject(&state, ValidationError::UnknownVehicle(form.vehicle_id));
            }
            Err(err) => {
                let state = self.inner.lock().await;
                return self.report(&state, "Could not load vehicles", &err);
            }
        };

        let (epoch, request) = {
            let mut state = self.inner.lock().await;
            if state.phase != TripPhase::Idle {
                return self.reject(&state, invalid_phase("start a trip", &state.phase));
            }
            if let Err(err) = self.validate_start(&form, &vehicle) {
                return self.reject(&state, err);
            }
            state.epoch += 1;
            state.trip = None;
            state.start_form = Some(form.clone());
            state.finish_draft = None;
            state.wash_form = None;
            state.wash_marked = false;
            self.set_phase(&mut state, TripPhase::Starting);
            (
                state.epoch,
                StartTripRequest {
                    vehicle_id: form.vehicle_id,
                    start_odometer: form.start_odometer,
                    start_fuel: form.start_fuel,
                },
            )
        };
        info!(
            vehicle_id = form.vehicle_id.0,
            start_odometer = form.start_odometer,
            "trip: starting"
        );

        let trip_id = match self.api.start_trip(&request).await {
            Ok(trip_id) => trip_id,
            Err(err) => {
                let mut state = self.inner.lock().await;
                if state.epoch != epoch {
                    return discard(&state, "start");
                }
                let reason = err.user_message();
                self.notifications.error(format!("Could not start trip: {reason}"));
                self.set_phase(
                    &mut state,
                    TripPhase::Failed {
                        reason,
                        resume: ResumeTarget::Idle,
                    },
                );
                return state.phase.clone();
            }
        };

        let uploads = self
            .uploader
            .upload_in_order(
                trip_id,
                &[
                    (EvidencePurpose::Start, form.odometer_photos.as_slice()),
                    (EvidencePurpose::StartFuel, form.fuel_photos.as_slice()),
                ],
            )
            .await;
        self.cache.invalidate_trips().await;
        self.cache.invalidate_vehicles().await;
        let trip = match self.refreshed_open_trip(trip_id).await {
            Some(trip) => trip,
            None => provisional_trip(trip_id, &request, &vehicle),
        };

        let mut state = self.inner.lock().await;
        if state.epoch != epoch {
            return discard(&state, "start");
        }
        state.trip = Some(trip);
        state.start_form = None;
        match uploads {
            Ok(_) => self
                .notifications
                .success(format!("Trip {trip_id} started on {}", vehicle.plate)),
            Err(err) => self.notifications.error(format!("Trip {trip_id} started, but {err}")),
        };
        info!(trip_id = trip_id.0, "trip: active");
        self.set_phase(&mut state, TripPhase::Active);
        state.phase.clone()
    }

    /// Attaches the session to a trip that is already open on the server.
    pub async fn resume(&self, trip_id: TripId) -> TripPhase {
        {
            let state = self.inner.lock().await;
            if state.phase != TripPhase::Idle {
                return self.reject(&state, invalid_phase("resume a trip", &state.phase));
            }
        }

        let found = self.cache.find_open_trip(trip_id).await;
        let mut state = self.inner.lock().await;
        match found {
            Ok(Some(trip)) if state.phase == TripPhase::Idle => {
                state.epoch += 1;
                state.trip = Some(trip);
                state.start_form = None;
                state.finish_draft = None;
                state.wash_form = None;
                state.wash_marked = false;
                self.set_phase(&mut state, TripPhase::Active);
                state.phase.clone()
            }
            Ok(Some(_)) => self.reject(&state, invalid_phase("resume a trip", &state.phase)),
            Ok(None) => self.reject(&state, ValidationError::UnknownTrip(trip_id)),
            Err(err) => self.report(&state, "Could not load trips", &err),
        }
    }

    /// Keeps an unsubmitted finalize form. Nothing else changes.
    pub async fn draft_finish(&self, form: FinishForm) -> TripPhase {
        let mut state = self.inner.lock().await;
        if state.phase != TripPhase::Active {
            return self.reject(&state, invalid_phase("edit the finish form", &state.phase));
        }
        state.finish_draft = Some(form);
        state.phase.clone()
    }

    pub async fn request_finalize(&self, form: FinishForm) -> TripPhase {
        let trip = {
            let state = self.inner.lock().await;
            let trip = match (&state.phase, &state.trip) {
                (TripPhase::Active, Some(trip)) => trip.clone(),
                _ => return self.reject(&state, invalid_phase("finalize", &state.phase)),
            };
            if let Err(err) = validate_finish(&form, &trip) {
                return self.reject(&state, err);
            }
            trip
        };

        let vehicle = match self.cache.find_vehicle(trip.vehicle_id).await {
            Ok(vehicle) => vehicle,
            Err(err) => {
                warn!(
                    trip_id = trip.id.0,
                    error = %err,
                    "trip: vehicle projection unavailable, gating on trip flags"
                );
                None
            }
        };
        let gated = requires_wash_before_finalize(vehicle.as_ref(), &trip);

        let epoch = {
            let mut state = self.inner.lock().await;
            if state.phase != TripPhase::Active
                || state.trip.as_ref().map(|current| current.id) != Some(trip.id)
            {
                return self.reject(&state, invalid_phase("finalize", &state.phase));
            }
            state.finish_draft = Some(form.clone());
            if gated {
                info!(trip_id = trip.id.0, "trip: finalize blocked until wash is recorded");
                state.wash_form = Some(WashForm::default());
                self.notifications.warning(format!(
                    "Vehicle {} must be washed before trip {} can be finalized",
                    vehicle_label(vehicle.as_ref(), &trip),
                    trip.id
                ));
                self.set_phase(&mut state, TripPhase::WashRequired);
                return state.phase.clone();
            }
            state.epoch += 1;
            self.set_phase(&mut state, TripPhase::Finalizing);
            state.epoch
        };

        let request = FinishTripRequest {
            end_odometer: form.end_odometer,
            end_fuel: form.end_fuel,
            notes: form
                .notes
                .clone()
                .filter(|notes| !notes.trim().is_empty()),
        };
        let response = match self.api.finish_trip(trip.id, &request).await {
            Ok(response) => response,
            Err(err) => {
                let mut state = self.inner.lock().await;
                if state.epoch != epoch {
                    return discard(&state, "finalize");
                }
                let reason = err.user_message();
                self.notifications.error(reason.clone());
                if err.is_wash_required() {
                    info!(trip_id = trip.id.0, "trip: server requires wash before finalize");
                    state.wash_form = Some(WashForm::default());
                    self.set_phase(&mut state, TripPhase::WashRequired);
                } else {
                    self.set_phase(
                        &mut state,
                        TripPhase::Failed {
                            reason,
                            resume: ResumeTarget::Active,
                        },
                    );
                }
                return state.phase.clone();
            }
        };

        let uploads = self
            .uploader
            .upload_in_order(
                trip.id,
                &[
                    (EvidencePurpose::End, form.odometer_photos.as_slice()),
                    (EvidencePurpose::EndFuel, form.fuel_photos.as_slice()),
                ],
            )
            .await;
        self.cache.invalidate_trips().await;
        self.cache.invalidate_vehicles().await;

        let mut state = self.inner.lock().await;
        if state.epoch != epoch {
            return discard(&state, "finalize");
        }
        state.finish_draft = None;
        state.wash_form = None;
        match uploads {
            Ok(_) => self.notifications.success(format!("Trip {} finalized", trip.id)),
            Err(err) => self.notifications.error(format!("Trip {} finalized, but {err}", trip.id)),
        };
        if response.requires_wash {
            self.notifications.notify(
                format!(
                    "Vehicle {} has reached its wash cycle; wash it before the next trip is finalized",
                    vehicle_label(vehicle.as_ref(), &trip)
                ),
                Severity::Warning,
                Some(WASH_TRIGGER_NOTICE),
            );
        }
        info!(
            trip_id = trip.id.0,
            wash_triggered = response.requires_wash,
            "trip: finalized"
        );
        self.set_phase(&mut state, TripPhase::Finalized);
        state.phase.clone()
    }

    pub async fn submit_wash(&self, form: WashForm) -> TripPhase {
        let (epoch, trip_id, already_marked) = {
            let mut state = self.inner.lock().await;
            if state.phase != TripPhase::WashRequired {
                return self.reject(&state, invalid_phase("record a wash", &state.phase));
            }
            if form.photos.is_empty() {
                return self.reject(&state, ValidationError::MissingWashPhotos);
            }
            let Some(trip_id) = state.trip.as_ref().map(|trip| trip.id) else {
                return self.reject(&state, invalid_phase("record a wash", &state.phase));
            };
            state.epoch += 1;
            state.wash_form = Some(form.clone());
            self.set_phase(&mut state, TripPhase::MarkingWashed);
            (state.epoch, trip_id, state.wash_marked)
        };

        if already_marked {
            debug!(trip_id = trip_id.0, "trip: wash already recorded, uploading remaining photos");
        } else if let Err(err) = self.api.mark_washed(trip_id).await {
            let mut state = self.inner.lock().await;
            if state.epoch != epoch {
                return discard(&state, "mark washed");
            }
            self.notifications.error(format!("Could not record wash: {}", err.user_message()));
            self.set_phase(&mut state, TripPhase::WashRequired);
            return state.phase.clone();
        }

        let upload = self
            .uploader
            .upload_batch(trip_id, EvidencePurpose::Wash, &form.photos)
            .await;
        self.cache.invalidate_trips().await;
        self.cache.invalidate_vehicles().await;

        match upload {
            Err(err) => {
                let mut state = self.inner.lock().await;
                if state.epoch != epoch {
                    return discard(&state, "mark washed");
                }
                state.wash_marked = true;
                mark_trip_washed(&mut state, trip_id);
                state.wash_form = Some(WashForm::new(err.remaining.clone()));
                self.notifications.error(format!("Wash recorded, but {err}"));
                self.set_phase(&mut state, TripPhase::WashRequired);
                state.phase.clone()
            }
            Ok(uploaded) => {
                let refreshed = self.refreshed_open_trip(trip_id).await;
                let mut state = self.inner.lock().await;
                if state.epoch != epoch {
                    return discard(&state, "mark washed");
                }
                if let Some(trip) = refreshed {
                    state.trip = Some(trip);
                }
                mark_trip_washed(&mut state, trip_id);
                state.wash_marked = false;
                state.wash_form = None;
                self.notifications.success(format!(
                    "Wash recorded for trip {trip_id} with {uploaded} photo(s)"
                ));
                info!(trip_id = trip_id.0, uploaded, "trip: wash recorded");
                self.set_phase(&mut state, TripPhase::Active);
                state.phase.clone()
            }
        }
    }

    /// Records a wash for any trip still waiting on one, open or already
    /// finalized. When it is the trip this session is blocked on, finalize
    /// opens again.
    pub async fn record_wash(
        &self,
        trip_id: TripId,
        form: WashForm,
    ) -> Result<usize, ClientError> {
        {
            let state = self.inner.lock().await;
            if matches!(
                state.phase,
                TripPhase::Starting | TripPhase::Finalizing | TripPhase::MarkingWashed
            ) {
                return Err(self.refuse(&state, invalid_phase("record a wash", &state.phase)));
            }
            if form.photos.is_empty() {
                return Err(self.refuse(&state, ValidationError::MissingWashPhotos));
            }
        }

        let pending = match self.cache.trips_awaiting_wash(TripScope::All).await {
            Ok(pending) => pending,
            Err(err) => {
                let state = self.inner.lock().await;
                self.report(&state, "Could not load trips", &err);
                return Err(err);
            }
        };
        if !pending.iter().any(|trip| trip.id == trip_id) {
            let state = self.inner.lock().await;
            return Err(self.refuse(&state, ValidationError::NoWashPending(trip_id)));
        }

        if let Err(err) = self.api.mark_washed(trip_id).await {
            self.notifications.error(format!("Could not record wash: {}", err.user_message()));
            return Err(err);
        }
        let upload = self
            .uploader
            .upload_batch(trip_id, EvidencePurpose::Wash, &form.photos)
            .await;
        self.cache.invalidate_trips().await;
        self.cache.invalidate_vehicles().await;

        let mut state = self.inner.lock().await;
        mark_trip_washed(&mut state, trip_id);
        let blocked_here = state.phase == TripPhase::WashRequired
            && state.trip.as_ref().map(|trip| trip.id) == Some(trip_id);
        if blocked_here {
            state.epoch += 1;
            state.wash_form = None;
            state.wash_marked = false;
            self.set_phase(&mut state, TripPhase::Active);
        }
        match upload {
            Ok(uploaded) => {
                self.notifications.success(format!(
                    "Wash recorded for trip {trip_id} with {uploaded} photo(s)"
                ));
                info!(trip_id = trip_id.0, uploaded, "trip: wash recorded");
                Ok(uploaded)
            }
            Err(err) => {
                self.notifications.error(format!("Wash recorded for trip {trip_id}, but {err}"));
                Err(err.source)
            }
        }
    }

    /// Leaves the current step. In-flight requests keep running; their
    /// results are ignored.
    pub async fn cancel(&self) -> TripPhase {
        let mut state = self.inner.lock().await;
        match state.phase.clone() {
            TripPhase::Idle => state.start_form = None,
            TripPhase::Active => state.finish_draft = None,
            TripPhase::Finalized => {}
            TripPhase::Starting => {
                state.epoch += 1;
                state.start_form = None;
                self.set_phase(&mut state, TripPhase::Idle);
            }
            TripPhase::Finalizing | TripPhase::WashRequired | TripPhase::MarkingWashed => {
                state.epoch += 1;
                state.finish_draft = None;
                state.wash_form = None;
                self.set_phase(&mut state, TripPhase::Active);
            }
            TripPhase::Failed { resume, .. } => {
                state.start_form = None;
                state.finish_draft = None;
                self.set_phase(&mut state, resume_phase(resume));
            }
        }
        debug!(phase = %state.phase, "trip: cancelled");
        state.phase.clone()
    }

    /// Returns from `Failed` to the last stable phase, keeping the form
    /// that failed so it can be resubmitted.
    pub async fn recover(&self) -> TripPhase {
        let mut state = self.inner.lock().await;
        if let TripPhase::Failed { resume, .. } = state.phase {
            self.set_phase(&mut state, resume_phase(resume));
        }
        state.phase.clone()
    }

    /// Re-reads the server projections and reports whether finalizing
    /// the current trip is blocked on a wash.
    pub async fn refresh(&self) -> Result<bool, ClientError> {
        self.cache.invalidate_trips().await;
        self.cache.invalidate_vehicles().await;

        let Some(trip_id) = self.trip().await.map(|trip| trip.id) else {
            return Ok(false);
        };
        if let Some(trip) = self.cache.find_open_trip(trip_id).await? {
            let mut state = self.inner.lock().await;
            if state.trip.as_ref().map(|current| current.id) == Some(trip_id) {
                state.trip = Some(trip);
            }
        }
        Ok(self.wash_gate_closed().await)
    }

    pub async fn wash_gate_closed(&self) -> bool {
        let Some(trip) = self.trip().await else {
            return false;
        };
        let vehicle = self
            .cache
            .find_vehicle(trip.vehicle_id)
            .await
            .ok()
            .flatten();
        requires_wash_before_finalize(vehicle.as_ref(), &trip)
    }

    fn validate_start(&self, form: &StartForm, vehicle: &Vehicle) -> Result<(), ValidationError> {
        ensure_non_negative("start odometer", form.start_odometer)?;
        if let Some(fuel) = form.start_fuel {
            ensure_non_negative("start fuel", fuel)?;
        }
        if (form.start_odometer - vehicle.current_odometer).abs() > self.options.odometer_tolerance
        {
            return Err(ValidationError::OdometerMismatch {
                entered: form.start_odometer,
                current: vehicle.current_odometer,
            });
        }
        Ok(())
    }

    async fn refreshed_open_trip(&self, trip_id: TripId) -> Option<Trip> {
        match self.cache.find_open_trip(trip_id).await {
            Ok(trip) => trip,
            Err(err) => {
                warn!(trip_id = trip_id.0, error = %err, "trip: could not refresh trip projection");
                None
            }
        }
    }

    fn set_phase(&self, state: &mut SessionState, phase: TripPhase) {
        state.phase = phase.clone();
        let _ = self.events.send(TripSessionEvent::PhaseChanged {
            trip_id: state.trip.as_ref().map(|trip| trip.id),
            phase,
        });
    }

    fn reject(&self, state: &SessionState, err: ValidationError) -> TripPhase {
        warn!(phase = %state.phase, error = %err, "trip: action rejected");
        self.notifications.error(err.to_string());
        state.phase.clone()
    }

    fn refuse(&self, state: &SessionState, err: ValidationError) -> ClientError {
        self.reject(state, err.clone());
        ClientError::Validation(err)
    }

    fn report(&self, state: &SessionState, context: &str, err: &ClientError) -> TripPhase {
        warn!(phase = %state.phase, error = %err, "trip: {context}");
        self.notifications.error(format!("{context}: {}", err.user_message()));
        state.phase.clone()
    }
}

fn discard(state: &SessionState, action: &'static str) -> TripPhase {
    debug!(action, phase = %state.phase, "trip: dropping result of cancelled request");
    state.phase.clone()
}

fn invalid_phase(action: &'static str, phase: &TripPhase) -> ValidationError {
    ValidationError::InvalidPhase {
        action,
        phase: phase.to_string(),
    }
}

fn resume_phase(target: ResumeTarget) -> TripPhase {
    match target {
        ResumeTarget::Idle => TripPhase::Idle,
        ResumeTarget::Active => TripPhase::Active,
    }
}

fn ensure_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value < 0.0 || value.is_nan() {
        return Err(ValidationError::NegativeReading { field });
    }
    Ok(())
}

fn validate_finish(form: &FinishForm, trip: &Trip) -> Result<(), ValidationError> {
    ensure_non_negative("end odometer", form.end_odometer)?;
    if let Some(fuel) = form.end_fuel {
        ensure_non_negative("end fuel", fuel)?;
    }
    if form.end_odometer < trip.start_odometer {
        return Err(ValidationError::EndBeforeStart {
            start: trip.start_odometer,
            end: form.end_odometer,
        });
    }
    Ok(())
}

/// `marcar-lavado` succeeded; the held trip no longer waits on a wash even
/// if the refreshed projection is unavailable.
fn mark_trip_washed(state: &mut SessionState, trip_id: TripId) {
    if let Some(trip) = state.trip.as_mut().filter(|trip| trip.id == trip_id) {
        trip.washed = true;
    }
}

fn vehicle_label(vehicle: Option<&Vehicle>, trip: &Trip) -> String {
    vehicle
        .or(trip.vehicle.as_ref())
        .map(|vehicle| vehicle.plate.clone())
        .unwrap_or_else(|| trip.vehicle_id.to_string())
}

fn provisional_trip(trip_id: TripId, request: &StartTripRequest, vehicle: &Vehicle) -> Trip {
    Trip {
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
        requires_wash: vehicle.requires_wash,
        washed: false,
        vehicle: Some(vehicle.clone()),
        user: None,
    }
}

#[cfg(test)]
#[path = "tests/trip_session_tests.rs"]
mod tests;
