use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(VehicleId);
id_newtype!(TripId);
id_newtype!(EvidenceId);

/// Operational status reported by the backend in `estado`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VehicleStatus {
    #[default]
    #[serde(rename = "disponible")]
    Available,
    #[serde(rename = "en_uso")]
    InUse,
    #[serde(rename = "mantenimiento")]
    Maintenance,
    #[serde(rename = "bloqueado")]
    Blocked,
    #[serde(other, rename = "desconocido")]
    Unknown,
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VehicleStatus::Available => "disponible",
            VehicleStatus::InUse => "en_uso",
            VehicleStatus::Maintenance => "mantenimiento",
            VehicleStatus::Blocked => "bloqueado",
            VehicleStatus::Unknown => "desconocido",
        };
        f.pad(label)
    }
}

/// Workflow step an evidence photo documents. Serialized as the `tipo`
/// field of the evidence upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvidencePurpose {
    #[serde(rename = "inicio")]
    Start,
    #[serde(rename = "fin")]
    End,
    #[serde(rename = "lavado")]
    Wash,
    #[serde(rename = "gasolina_inicial")]
    StartFuel,
    #[serde(rename = "gasolina_final")]
    EndFuel,
}

impl EvidencePurpose {
    pub const ALL: [EvidencePurpose; 5] = [
        EvidencePurpose::Start,
        EvidencePurpose::End,
        EvidencePurpose::Wash,
        EvidencePurpose::StartFuel,
        EvidencePurpose::EndFuel,
    ];

    pub fn as_wire(self) -> &'static str {
        match self {
            EvidencePurpose::Start => "inicio",
            EvidencePurpose::End => "fin",
            EvidencePurpose::Wash => "lavado",
            EvidencePurpose::StartFuel => "gasolina_inicial",
            EvidencePurpose::EndFuel => "gasolina_final",
        }
    }

    pub fn from_wire(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|purpose| purpose.as_wire() == raw.trim())
    }
}

impl fmt::Display for EvidencePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_wire())
    }
}

/// Server-side filter for `GET /vehiculos?filtro=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VehicleFilter {
    #[default]
    Active,
    Inactive,
    All,
}

impl VehicleFilter {
    pub fn as_query(self) -> &'static str {
        match self {
            VehicleFilter::Active => "activos",
            VehicleFilter::Inactive => "inactivos",
            VehicleFilter::All => "todos",
        }
    }
}

/// Which trip list projection a read refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TripScope {
    Active,
    All,
    Mine,
    MineActive,
}

impl TripScope {
    pub fn path(self) -> &'static str {
        match self {
            TripScope::Active => "/viajes/activos",
            TripScope::All => "/viajes",
            TripScope::Mine => "/viajes/mis-viajes",
            TripScope::MineActive => "/viajes/mis-viajes/activos",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purpose_wire_names_match_serde() {
        for purpose in EvidencePurpose::ALL {
            let encoded = serde_json::to_value(purpose).expect("serialize");
            assert_eq!(encoded, serde_json::Value::from(purpose.as_wire()));
            assert_eq!(EvidencePurpose::from_wire(purpose.as_wire()), Some(purpose));
        }
        assert_eq!(EvidencePurpose::from_wire("selfie"), None);
    }

    #[test]
    fn unknown_status_does_not_fail_decoding() {
        let status: VehicleStatus = serde_json::from_str("\"dado_de_baja\"").expect("status");
        assert_eq!(status, VehicleStatus::Unknown);
        assert_eq!(VehicleStatus::InUse.to_string(), "en_uso");
    }

    #[test]
    fn ids_serialize_as_bare_numbers() {
        assert_eq!(serde_json::to_string(&TripId(42)).expect("serialize"), "42");
        assert_eq!(VehicleId(7).to_string(), "7");
    }
}
