use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{EvidenceId, EvidencePurpose, TripId, UserId, VehicleId, VehicleStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    #[serde(rename = "placa")]
    pub plate: String,
    #[serde(rename = "marca", default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(rename = "modelo", default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(rename = "ano", default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(rename = "activo", default = "default_true")]
    pub active: bool,
    #[serde(rename = "estado", default)]
    pub status: VehicleStatus,
    #[serde(
        rename = "kilometrajeActual",
        default,
        deserialize_with = "lenient::number"
    )]
    pub current_odometer: f64,
    #[serde(
        rename = "viajesDesdeLavado",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub trips_since_wash: Option<u32>,
    #[serde(rename = "debeLavar", default)]
    pub requires_wash: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripUser {
    pub id: UserId,
    #[serde(rename = "nombre", default)]
    pub name: String,
    #[serde(rename = "cargo", default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    #[serde(rename = "usuarioId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(rename = "vehiculoId")]
    pub vehicle_id: VehicleId,
    #[serde(rename = "fechaInicio", default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "fechaFin", default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(rename = "kmInicial", default, deserialize_with = "lenient::number")]
    pub start_odometer: f64,
    #[serde(
        rename = "kmFinal",
        default,
        deserialize_with = "lenient::optional_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_odometer: Option<f64>,
    #[serde(
        rename = "gasolinaInicial",
        default,
        deserialize_with = "lenient::optional_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_fuel: Option<f64>,
    #[serde(
        rename = "gasolinaFinal",
        default,
        deserialize_with = "lenient::optional_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_fuel: Option<f64>,
    #[serde(rename = "observaciones", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(rename = "debeLavar", default)]
    pub requires_wash: bool,
    #[serde(rename = "lavo", default)]
    pub washed: bool,
    #[serde(rename = "vehiculo", default, skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<Vehicle>,
    #[serde(rename = "usuario", default, skip_serializing_if = "Option::is_none")]
    pub user: Option<TripUser>,
}

impl Trip {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none() && self.end_odometer.is_none()
    }

    /// The vehicle reached its wash cycle on this trip and no wash has
    /// been recorded against it.
    pub fn awaits_wash(&self) -> bool {
        self.requires_wash && !self.washed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceAsset {
    pub id: EvidenceId,
    #[serde(rename = "viajeId", default, skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<TripId>,
    #[serde(rename = "vehiculoId", default, skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<VehicleId>,
    #[serde(rename = "tipo")]
    pub purpose: EvidencePurpose,
    #[serde(rename = "urlArchivo", alias = "url", default)]
    pub url: String,
    #[serde(rename = "nombreArchivo", default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartTripRequest {
    #[serde(rename = "vehiculoId")]
    pub vehicle_id: VehicleId,
    #[serde(rename = "kmInicial")]
    pub start_odometer: f64,
    #[serde(rename = "gasolinaInicial", skip_serializing_if = "Option::is_none")]
    pub start_fuel: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishTripRequest {
    #[serde(rename = "kmFinal")]
    pub end_odometer: f64,
    #[serde(rename = "gasolinaFinal", skip_serializing_if = "Option::is_none")]
    pub end_fuel: Option<f64>,
    #[serde(rename = "observaciones", skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Success payload of `PUT /viajes/{id}/finalizar`. Anything beyond the
/// wash trigger is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinishTripResponse {
    #[serde(rename = "debeLavar", default)]
    pub requires_wash: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    #[serde(rename = "nombre")]
    pub name: String,
    pub email: String,
    #[serde(rename = "telefono", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "esAdmin", default)]
    pub is_admin: bool,
    #[serde(rename = "activo", default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "usuario")]
    pub user: UserSummary,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleForm {
    #[serde(rename = "placa")]
    pub plate: String,
    #[serde(rename = "marca")]
    pub brand: String,
    #[serde(rename = "modelo")]
    pub model: String,
    #[serde(rename = "ano")]
    pub year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserForm {
    #[serde(rename = "nombre")]
    pub name: String,
    pub email: String,
    #[serde(rename = "telefono", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(
        rename = "passwordConfirm",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub password_confirm: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(rename = "passwordActual")]
    pub current_password: String,
    #[serde(rename = "passwordNueva")]
    pub new_password: String,
}

fn default_true() -> bool {
    true
}

/// The backend serializes decimal columns either as JSON numbers or as
/// numeric strings depending on the driver.
mod lenient {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        Text(String),
    }

    fn parse<E: serde::de::Error>(raw: NumberOrString) -> Result<Option<f64>, E> {
        match raw {
            NumberOrString::Number(value) => Ok(Some(value)),
            NumberOrString::Text(text) if text.trim().is_empty() => Ok(None),
            NumberOrString::Text(text) => text
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| E::custom(format!("invalid numeric string '{text}'"))),
        }
    }

    pub fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<NumberOrString>::deserialize(deserializer)?;
        match raw {
            Some(raw) => Ok(parse::<D::Error>(raw)?.unwrap_or_default()),
            None => Ok(0.0),
        }
    }

    pub fn optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<NumberOrString>::deserialize(deserializer)? {
            Some(raw) => parse::<D::Error>(raw),
            None => Ok(None),
        }
    }
}
