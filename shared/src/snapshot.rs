//! Wire model of `GET /estado`.
//!
//! Field names follow the service's camelCase JSON. Spanish aliases and the
//! `LIBRE`/`OCUPADO` status spellings are accepted so older service builds
//! still decode.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::MAP_LOGICAL_EXTENT;

macro_rules! numeric_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

numeric_id!(TaxiId);
numeric_id!(ClientId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaxiStatus {
    #[serde(rename = "FREE", alias = "LIBRE", alias = "free", alias = "libre")]
    Free,
    #[serde(rename = "BUSY", alias = "OCUPADO", alias = "busy", alias = "ocupado")]
    Busy,
}

impl TaxiStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Busy => "BUSY",
        }
    }

    #[must_use]
    pub const fn is_free(&self) -> bool {
        matches!(self, Self::Free)
    }
}

impl fmt::Display for TaxiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoordinateError {
    #[error("{axis} coordinate is not a finite number")]
    NonFinite { axis: Axis },
    #[error("{axis} coordinate {value} is outside 0..=100")]
    OutOfRange { axis: Axis, value: OrderedValue },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::X => "x",
            Self::Y => "y",
        })
    }
}

/// An `f64` carried in an error. Errors are only built from finite values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderedValue(pub f64);

impl Eq for OrderedValue {}

impl fmt::Display for OrderedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated point on the 100x100 logical grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogicalPoint {
    x: f64,
    y: f64,
}

impl LogicalPoint {
    pub fn new(x: f64, y: f64) -> Result<Self, CoordinateError> {
        Self::check(Axis::X, x)?;
        Self::check(Axis::Y, y)?;
        Ok(Self { x, y })
    }

    fn check(axis: Axis, value: f64) -> Result<(), CoordinateError> {
        if !value.is_finite() {
            return Err(CoordinateError::NonFinite { axis });
        }
        if !(0.0..=MAP_LOGICAL_EXTENT).contains(&value) {
            return Err(CoordinateError::OutOfRange {
                axis,
                value: OrderedValue(value),
            });
        }
        Ok(())
    }

    #[must_use]
    pub const fn x(&self) -> f64 {
        self.x
    }

    #[must_use]
    pub const fn y(&self) -> f64 {
        self.y
    }

    /// Pixel position with the map origin at the top-left.
    #[must_use]
    pub fn to_pixels(&self, scale: f64) -> (f64, f64) {
        (self.x * scale, self.y * scale)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Taxi {
    pub id: TaxiId,
    #[serde(default, alias = "modelo")]
    pub model: String,
    #[serde(default, alias = "placa")]
    pub plate: String,
    #[serde(alias = "estado")]
    pub status: TaxiStatus,
    pub x: f64,
    pub y: f64,
    #[serde(default, alias = "ganancias")]
    pub earnings: f64,
    #[serde(default, alias = "viajes")]
    pub trips: u64,
    #[serde(default, alias = "calificacion")]
    pub rating: f64,
}

impl Taxi {
    pub fn position(&self) -> Result<LogicalPoint, CoordinateError> {
        LogicalPoint::new(self.x, self.y)
    }

    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(self.status, TaxiStatus::Busy)
    }

    fn validate(&self) -> Result<(), SnapshotError> {
        self.position()
            .map_err(|source| SnapshotError::InvalidPosition {
                taxi_id: self.id,
                source,
            })?;
        if !self.earnings.is_finite() || self.earnings < 0.0 {
            return Err(SnapshotError::InvalidEarnings { taxi_id: self.id });
        }
        if !self.rating.is_finite() {
            return Err(SnapshotError::InvalidRating { taxi_id: self.id });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: ClientId,
    #[serde(default, alias = "nombre")]
    pub name: String,
    #[serde(default, alias = "viajes")]
    pub trips: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyTotals {
    #[serde(default, alias = "ganancias", alias = "ganancias_totales")]
    pub revenue: f64,
    #[serde(default, alias = "viajes", alias = "viajes_totales")]
    pub trips: u64,
}

/// One full read of world state. Replaced wholesale on each successful poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub taxis: Vec<Taxi>,
    #[serde(default, alias = "clientes")]
    pub clients: Vec<Client>,
    #[serde(default, alias = "empresa")]
    pub company: CompanyTotals,
    #[serde(default, alias = "mejorTaxi", alias = "mejor_taxi", alias = "top_taxi")]
    pub top_taxi: Option<Taxi>,
    #[serde(
        default,
        alias = "simulacionActiva",
        alias = "simulacion_activa",
        alias = "simulation_active"
    )]
    pub simulation_active: bool,
    #[serde(default, alias = "reloj", alias = "simulation_clock")]
    pub simulation_clock: String,
    /// Seconds between simulation steps, when the service reports it.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "intervalo",
        alias = "simulation_interval"
    )]
    pub simulation_interval: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("duplicate taxi id {0}")]
    DuplicateTaxiId(TaxiId),

    #[error("duplicate client id {0}")]
    DuplicateClientId(ClientId),

    #[error("taxi {taxi_id} has an invalid position: {source}")]
    InvalidPosition {
        taxi_id: TaxiId,
        #[source]
        source: CoordinateError,
    },

    #[error("taxi {taxi_id} has invalid earnings")]
    InvalidEarnings { taxi_id: TaxiId },

    #[error("taxi {taxi_id} has an invalid rating")]
    InvalidRating { taxi_id: TaxiId },

    #[error("company revenue is invalid")]
    InvalidRevenue,

    #[error("simulation interval is invalid")]
    InvalidInterval,
}

impl Snapshot {
    #[must_use]
    pub fn taxi(&self, id: TaxiId) -> Option<&Taxi> {
        self.taxis.iter().find(|t| t.id == id)
    }

    #[must_use]
    pub fn client(&self, id: ClientId) -> Option<&Client> {
        self.clients.iter().find(|c| c.id == id)
    }

    #[must_use]
    pub fn contains_taxi(&self, id: TaxiId) -> bool {
        self.taxi(id).is_some()
    }

    #[must_use]
    pub fn free_taxis(&self) -> usize {
        self.taxis.iter().filter(|t| t.status.is_free()).count()
    }

    /// Checks the structural guarantees the view relies on. A snapshot that
    /// fails here is never shown.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        let mut taxi_ids = HashSet::with_capacity(self.taxis.len());
        for taxi in &self.taxis {
            if !taxi_ids.insert(taxi.id) {
                return Err(SnapshotError::DuplicateTaxiId(taxi.id));
            }
            taxi.validate()?;
        }

        let mut client_ids = HashSet::with_capacity(self.clients.len());
        for client in &self.clients {
            if !client_ids.insert(client.id) {
                return Err(SnapshotError::DuplicateClientId(client.id));
            }
        }

        if let Some(top) = &self.top_taxi {
            top.validate()?;
        }

        if !self.company.revenue.is_finite() || self.company.revenue < 0.0 {
            return Err(SnapshotError::InvalidRevenue);
        }

        if let Some(interval) = self.simulation_interval {
            if !interval.is_finite() || interval <= 0.0 {
                return Err(SnapshotError::InvalidInterval);
            }
        }

        Ok(())
    }
}
