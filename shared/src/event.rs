use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use crate::actions::TripOutcome;
use crate::error::{ActionError, TransportError};
use crate::model::{SessionEpoch, Settings};
use crate::snapshot::{ClientId, Snapshot, TaxiId};
use crate::snapshot_client::PollSeq;
use crate::ui_state::{ConfigToken, Role};

// --- Card number: redacted Debug, zeroized on drop by secrecy ---

pub struct CardNumber(SecretString);

impl CardNumber {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(SecretString::new(raw.into()))
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Digits only; spaces and dashes are accepted as separators.
    #[must_use]
    pub fn digits(&self) -> Option<String> {
        let raw = self.expose();
        if raw
            .chars()
            .any(|c| !c.is_ascii_digit() && c != ' ' && c != '-')
        {
            return None;
        }
        Some(raw.chars().filter(char::is_ascii_digit).collect())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expose().trim().is_empty()
    }
}

impl Clone for CardNumber {
    fn clone(&self) -> Self {
        Self::new(self.expose().to_owned())
    }
}

impl fmt::Debug for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CardNumber([REDACTED])")
    }
}

// --- Event enum: shell inputs, user intents, and effect resolutions ---

#[derive(Debug)]
pub enum Event {
    // Lifecycle & polling
    Mounted {
        settings: Settings,
    },
    Unmounted,
    Tick,
    RefreshRequested,
    SnapshotFetched {
        poll: PollSeq,
        result: Box<Result<Snapshot, TransportError>>,
    },

    // Local UI state
    RoleSelected {
        role: Role,
    },
    TaxiSelected {
        taxi_id: TaxiId,
    },
    TaxiDeselected,
    MyClientIdEdited {
        text: String,
    },
    MyTaxiIdEdited {
        text: String,
    },
    ClientNameEdited {
        text: String,
    },
    CardNumberEdited {
        card: CardNumber,
    },

    // Commands and their responses. Every response names the session that
    // issued the command.
    CreateTaxiRequested,
    TaxiCreated {
        session: SessionEpoch,
        plate: String,
        result: Result<TaxiId, ActionError>,
    },
    DeleteTaxiRequested {
        taxi_id: TaxiId,
    },
    TaxiDeleted {
        session: SessionEpoch,
        taxi_id: TaxiId,
        result: Result<(), ActionError>,
    },
    ConfigureSimulationRequested {
        active: Option<bool>,
        interval_secs: Option<f64>,
    },
    SimulationConfigured {
        session: SessionEpoch,
        token: ConfigToken,
        result: Result<(), ActionError>,
    },
    TripRequested,
    TripResolved {
        session: SessionEpoch,
        client_id: ClientId,
        result: Result<TripOutcome, ActionError>,
    },
    RegisterClientRequested,
    ClientRegistered {
        session: SessionEpoch,
        result: Result<ClientId, ActionError>,
    },
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Mounted { .. } => "mounted",
            Self::Unmounted => "unmounted",
            Self::Tick => "tick",
            Self::RefreshRequested => "refresh_requested",
            Self::SnapshotFetched { .. } => "snapshot_fetched",
            Self::RoleSelected { .. } => "role_selected",
            Self::TaxiSelected { .. } => "taxi_selected",
            Self::TaxiDeselected => "taxi_deselected",
            Self::MyClientIdEdited { .. } => "my_client_id_edited",
            Self::MyTaxiIdEdited { .. } => "my_taxi_id_edited",
            Self::ClientNameEdited { .. } => "client_name_edited",
            Self::CardNumberEdited { .. } => "card_number_edited",
            Self::CreateTaxiRequested => "create_taxi_requested",
            Self::TaxiCreated { .. } => "taxi_created",
            Self::DeleteTaxiRequested { .. } => "delete_taxi_requested",
            Self::TaxiDeleted { .. } => "taxi_deleted",
            Self::ConfigureSimulationRequested { .. } => "configure_simulation_requested",
            Self::SimulationConfigured { .. } => "simulation_configured",
            Self::TripRequested => "trip_requested",
            Self::TripResolved { .. } => "trip_resolved",
            Self::RegisterClientRequested => "register_client_requested",
            Self::ClientRegistered { .. } => "client_registered",
        }
    }

    /// True for events that come from an operator gesture rather than the
    /// timer or an effect resolution.
    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::RefreshRequested
                | Self::RoleSelected { .. }
                | Self::TaxiSelected { .. }
                | Self::TaxiDeselected
                | Self::MyClientIdEdited { .. }
                | Self::MyTaxiIdEdited { .. }
                | Self::ClientNameEdited { .. }
                | Self::CardNumberEdited { .. }
                | Self::CreateTaxiRequested
                | Self::DeleteTaxiRequested { .. }
                | Self::ConfigureSimulationRequested { .. }
                | Self::TripRequested
                | Self::RegisterClientRequested
        )
    }

    /// The session an action response was issued in. `None` for events that
    /// are not action responses.
    #[must_use]
    pub const fn session(&self) -> Option<SessionEpoch> {
        match self {
            Self::TaxiCreated { session, .. }
            | Self::TaxiDeleted { session, .. }
            | Self::SimulationConfigured { session, .. }
            | Self::TripResolved { session, .. }
            | Self::ClientRegistered { session, .. } => Some(*session),
            _ => None,
        }
    }

    /// Events the core accepts while unmounted.
    #[must_use]
    pub const fn allowed_unmounted(&self) -> bool {
        matches!(self, Self::Mounted { .. })
    }
}
