use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::capabilities::HttpError;
use crate::reconcile::ConnectionHealth;
use crate::snapshot_client::SnapshotClient;
use crate::snapshot_store::SnapshotStore;
use crate::ui_state::UiState;
use crate::{
    DEFAULT_BASE_URL, DEFAULT_MAP_SCALE_PX, DEFAULT_POLL_INTERVAL_MS, MAX_MAP_SCALE_PX, MIN_MAP_SCALE_PX,
    MIN_POLL_INTERVAL_MS,
};

/// Core tunables. The shell loads these and passes them in `Event::Mounted`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Dispatch service root every request path is joined onto.
    pub base_url: String,
    pub poll_interval_ms: u64,
    pub map_scale_px: f64,
    /// Seeds plate, model and trip generation. `None` seeds from the OS.
    pub rng_seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            map_scale_px: DEFAULT_MAP_SCALE_PX,
            rng_seed: None,
        }
    }
}

impl Settings {
    /// The poll period, never shorter than the floor.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }

    /// Parses the base url, adding the trailing slash `Url::join` needs to
    /// keep a path prefix.
    pub fn service_url(&self) -> Result<Url, HttpError> {
        let mut url = Url::parse(self.base_url.trim()).map_err(|e| HttpError::InvalidRequest {
            reason: format!("invalid dispatch service url '{}': {e}", self.base_url),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HttpError::InvalidRequest {
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    #[must_use]
    pub fn map_scale(&self) -> f64 {
        if self.map_scale_px.is_finite() {
            self.map_scale_px.clamp(MIN_MAP_SCALE_PX, MAX_MAP_SCALE_PX)
        } else {
            DEFAULT_MAP_SCALE_PX
        }
    }
}

#[derive(Default, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    #[default]
    Unmounted,
    Mounted,
}

/// Counts mount sessions. Action responses carry the session that issued
/// them and are dropped once it has ended.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SessionEpoch(pub u64);

impl SessionEpoch {
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for SessionEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session {}", self.0)
    }
}

#[derive(Debug)]
pub struct Model {
    pub lifecycle: Lifecycle,
    pub session: SessionEpoch,
    pub settings: Settings,
    /// `None` when the configured base url does not parse; every request
    /// then fails locally.
    pub base_url: Option<Url>,
    pub client: SnapshotClient,
    pub store: SnapshotStore,
    pub ui: UiState,
    pub rng: StdRng,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            lifecycle: Lifecycle::default(),
            session: SessionEpoch::default(),
            settings: Settings::default(),
            base_url: None,
            client: SnapshotClient::default(),
            store: SnapshotStore::default(),
            ui: UiState::default(),
            rng: StdRng::from_entropy(),
        }
    }
}

impl Model {
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.lifecycle == Lifecycle::Mounted
    }

    /// Starts a session with `settings`, reseeding the generator when a seed
    /// is configured.
    pub fn mount(&mut self, settings: Settings) {
        if let Some(seed) = settings.rng_seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        self.base_url = match settings.service_url() {
            Ok(url) => Some(url),
            Err(err) => {
                tracing::error!(error = %err, "dispatch service url rejected");
                None
            }
        };
        self.settings = settings;
        self.lifecycle = Lifecycle::Mounted;
    }

    /// Drops the snapshot and all UI state and ends the session. The poll
    /// sequence survives so a response from the old session can never be
    /// applied.
    pub fn unmount(&mut self) {
        self.lifecycle = Lifecycle::Unmounted;
        self.session = self.session.next();
        self.client.reset();
        self.store.clear();
        self.ui.reset();
    }

    pub fn service_url(&self) -> Result<&Url, HttpError> {
        self.base_url
            .as_ref()
            .ok_or_else(|| HttpError::InvalidRequest {
                reason: "dispatch service url is not configured".to_string(),
            })
    }

    #[must_use]
    pub fn connection_health(&self) -> ConnectionHealth {
        ConnectionHealth {
            last_error: self.store.last_error().map(ToString::to_string),
            consecutive_failures: self.store.consecutive_failures(),
            total_failures: self.store.total_failures(),
            polls_skipped: self.client.polls_skipped(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn poll_interval_has_floor() {
        let settings = Settings {
            poll_interval_ms: 1,
            ..Settings::default()
        };
        assert_eq!(settings.poll_interval(), Duration::from_millis(MIN_POLL_INTERVAL_MS));
    }

    #[test]
    fn map_scale_clamped() {
        let mut settings = Settings {
            map_scale_px: 1000.0,
            ..Settings::default()
        };
        assert!((settings.map_scale() - MAX_MAP_SCALE_PX).abs() < f64::EPSILON);
        settings.map_scale_px = f64::NAN;
        assert!((settings.map_scale() - DEFAULT_MAP_SCALE_PX).abs() < f64::EPSILON);
    }

    #[test]
    fn settings_deserialize_partial() {
        let settings: Settings = serde_json::from_str(r#"{"poll_interval_ms": 250}"#).unwrap();
        assert_eq!(settings.poll_interval_ms, 250);
        assert!((settings.map_scale_px - DEFAULT_MAP_SCALE_PX).abs() < f64::EPSILON);
        assert_eq!(settings.rng_seed, None);
    }

    #[test]
    fn seeded_mount_is_deterministic() {
        let seeded = Settings {
            rng_seed: Some(99),
            ..Settings::default()
        };
        let mut a = Model::default();
        let mut b = Model::default();
        a.mount(seeded.clone());
        b.mount(seeded);
        assert_eq!(a.rng.gen::<u64>(), b.rng.gen::<u64>());
    }

    #[test]
    fn unmount_resets_ui_and_store() {
        let mut model = Model::default();
        model.mount(Settings::default());
        model.ui.set_client_id_text("4".into());
        model.unmount();
        assert!(!model.is_mounted());
        assert!(model.ui.my_client_id().is_none());
        assert!(model.store.current().is_none());
    }

    #[test]
    fn unmount_starts_a_new_session() {
        let mut model = Model::default();
        model.mount(Settings::default());
        let first = model.session;
        model.unmount();
        model.mount(Settings::default());
        assert_eq!(model.session, first.next());
    }

    #[test]
    fn service_url_gains_trailing_slash() {
        let settings = Settings {
            base_url: "http://localhost:8000/api".into(),
            ..Settings::default()
        };
        assert_eq!(
            settings.service_url().unwrap().as_str(),
            "http://localhost:8000/api/"
        );
    }

    #[test]
    fn bad_service_url_fails_requests_locally() {
        let mut model = Model::default();
        model.mount(Settings {
            base_url: "ftp://example.com".into(),
            ..Settings::default()
        });
        assert!(model.is_mounted());
        assert!(model.service_url().unwrap_err().is_local());
    }
}
