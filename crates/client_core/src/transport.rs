use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, RequestBuilder, Response,
};
use serde::{de::DeserializeOwned, Deserialize};
use shared::{
    domain::{EvidencePurpose, TripId, TripScope, UserId, VehicleFilter, VehicleId},
    error::ApiError,
    protocol::{
        ChangePasswordRequest, EvidenceAsset, FinishTripRequest, FinishTripResponse,
        LoginRequest, LoginResponse, StartTripRequest, Trip, UserForm, UserSummary, Vehicle,
        VehicleForm,
    },
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    error::{classify_rejection, ClientError},
    EvidencePhoto, RosterApi, TripApi,
};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// In-memory login state. Persisting it is the host's concern.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: Option<UserSummary>,
}

#[derive(Debug, Deserialize)]
struct CreatedTrip {
    id: TripId,
}

pub struct HttpFleetApi {
    http: Client,
    base_url: String,
    timeout: Duration,
    session: RwLock<Option<Session>>,
}

impl HttpFleetApi {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| ClientError::Transport(format!("invalid api url '{base_url}': {e}")))?;
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            timeout,
            session: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<UserSummary, ClientError> {
        let body: LoginResponse = self
            .send_json(self.http.post(self.url("/auth/login")).json(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            }))
            .await?;
        info!(user_id = body.user.id.0, "auth: logged in");
        *self.session.write().await = Some(Session {
            token: body.token,
            user: Some(body.user.clone()),
        });
        Ok(body.user)
    }

    /// Adopts a token obtained elsewhere (e.g. from the host's session store).
    pub async fn set_token(&self, token: impl Into<String>) {
        *self.session.write().await = Some(Session {
            token: token.into(),
            user: None,
        });
    }

    pub async fn logout(&self) {
        *self.session.write().await = None;
    }

    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.session.read().await.as_ref() {
            Some(session) => builder.bearer_auth(&session.token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ClientError> {
        let response = self
            .authorized(builder)
            .await
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ClientError::Timeout(self.timeout)
                } else {
                    ClientError::from(err)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let raw = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<ApiError>(&raw).unwrap_or_else(|_| ApiError {
            code: None,
            message: (!raw.trim().is_empty()).then(|| raw.trim().to_string()),
        });
        let rejection = classify_rejection(status.as_u16(), body);
        warn!(
            status = status.as_u16(),
            code = ?rejection.code,
            "transport: request rejected"
        );
        if rejection.status == 401 {
            *self.session.write().await = None;
        }
        Err(ClientError::Api(rejection))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.send(builder).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn send_empty(&self, builder: RequestBuilder) -> Result<(), ClientError> {
        self.send(builder).await.map(|_| ())
    }
}

#[async_trait]
impl TripApi for HttpFleetApi {
    async fn start_trip(&self, request: &StartTripRequest) -> Result<TripId, ClientError> {
        let created: CreatedTrip = self
            .send_json(self.http.post(self.url("/viajes/iniciar")).json(request))
            .await?;
        Ok(created.id)
    }

    async fn upload_evidence(
        &self,
        trip_id: TripId,
        purpose: EvidencePurpose,
        photo: &EvidencePhoto,
    ) -> Result<(), ClientError> {
        let part = Part::bytes(photo.bytes.clone())
            .file_name(photo.file_name.clone())
            .mime_str(&photo.content_type)?;
        let form = Form::new()
            .part("file", part)
            .text("tipo", purpose.as_wire());
        debug!(
            trip_id = trip_id.0,
            %purpose,
            file = %photo.file_name,
            "transport: uploading evidence"
        );
        self.send_empty(
            self.http
                .post(self.url(&format!("/viajes/{trip_id}/evidencia")))
                .multipart(form),
        )
        .await
    }

    async fn finish_trip(
        &self,
        trip_id: TripId,
        request: &FinishTripRequest,
    ) -> Result<FinishTripResponse, ClientError> {
        let response = self
            .send(
                self.http
                    .put(self.url(&format!("/viajes/{trip_id}/finalizar")))
                    .json(request),
            )
            .await?;
        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(FinishTripResponse::default());
        }
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn mark_washed(&self, trip_id: TripId) -> Result<(), ClientError> {
        self.send_empty(self.http.put(self.url(&format!("/viajes/{trip_id}/marcar-lavado"))))
            .await
    }

    async fn list_trips(&self, scope: TripScope) -> Result<Vec<Trip>, ClientError> {
        self.send_json(self.http.get(self.url(scope.path()))).await
    }

    async fn list_vehicles(&self, filter: VehicleFilter) -> Result<Vec<Vehicle>, ClientError> {
        self.send_json(
            self.http
                .get(self.url("/vehiculos"))
                .query(&[("filtro", filter.as_query())]),
        )
        .await
    }

    async fn list_trip_evidence(&self, trip_id: TripId) -> Result<Vec<EvidenceAsset>, ClientError> {
        self.send_json(
            self.http
                .get(self.url(&format!("/viajes/{trip_id}/evidencias"))),
        )
        .await
    }
}

#[async_trait]
impl RosterApi for HttpFleetApi {
    async fn create_vehicle(&self, form: &VehicleForm) -> Result<Vehicle, ClientError> {
        self.send_json(self.http.post(self.url("/vehiculos")).json(form)).await
    }

    async fn update_vehicle(
        &self,
        vehicle_id: VehicleId,
        form: &VehicleForm,
    ) -> Result<(), ClientError> {
        self.send_empty(
            self.http
                .put(self.url(&format!("/vehiculos/{vehicle_id}")))
                .json(form),
        )
        .await
    }

    async fn delete_vehicle(&self, vehicle_id: VehicleId) -> Result<(), ClientError> {
        self.send_empty(
            self.http
                .delete(self.url(&format!("/vehiculos/{vehicle_id}"))),
        )
        .await
    }

    async fn toggle_vehicle_active(&self, vehicle_id: VehicleId) -> Result<(), ClientError> {
        self.send_empty(
            self.http
                .put(self.url(&format!("/vehiculos/{vehicle_id}/toggle-activo")))
                .json(&serde_json::json!({})),
        )
        .await
    }

    async fn list_vehicle_evidence(
        &self,
        vehicle_id: VehicleId,
    ) -> Result<Vec<EvidenceAsset>, ClientError> {
        self.send_json(
            self.http
                .get(self.url(&format!("/vehiculos/{vehicle_id}/evidencias"))),
        )
        .await
    }

    async fn list_users(&self) -> Result<Vec<UserSummary>, ClientError> {
        self.send_json(self.http.get(self.url("/usuarios"))).await
    }

    async fn register_user(&self, form: &UserForm) -> Result<(), ClientError> {
        self.send_empty(self.http.post(self.url("/auth/register")).json(form)).await
    }

    async fn update_user(&self, user_id: UserId, form: &UserForm) -> Result<(), ClientError> {
        self.send_empty(self.http.put(self.url(&format!("/usuarios/{user_id}"))).json(form))
            .await
    }

    async fn delete_user(&self, user_id: UserId) -> Result<(), ClientError> {
        self.send_empty(self.http.delete(self.url(&format!("/usuarios/{user_id}"))))
            .await
    }

    async fn toggle_user_active(&self, user_id: UserId) -> Result<(), ClientError> {
        self.send_empty(
            self.http
                .put(self.url(&format!("/usuarios/{user_id}/toggle-activo")))
                .json(&serde_json::json!({})),
        )
        .await
    }

    async fn my_profile(&self) -> Result<UserSummary, ClientError> {
        if self.session.read().await.is_none() {
            return Err(ClientError::Unauthenticated);
        }
        self.send_json(self.http.get(self.url("/usuarios/mi-perfil")))
            .await
    }

    async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ClientError> {
        if self.session.read().await.is_none() {
            return Err(ClientError::Unauthenticated);
        }
        self.send_empty(
            self.http
                .put(self.url("/usuarios/cambiar-contrasena"))
                .json(&ChangePasswordRequest {
                    current_password: current_password.to_string(),
                    new_password: new_password.to_string(),
                }),
        )
        .await
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
