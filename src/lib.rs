pub mod capture;
pub mod detection;
pub mod generation;
pub mod models;
pub mod recording;
pub mod results;
pub mod settings;
pub mod store;
pub mod utils;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;

use capture::MediaGateway;
use recording::{EventBus, RecordingController};
use settings::SettingsStore;
use store::Database;

/// Initialize logging from the RUST_LOG env var. Call once at startup;
/// repeat calls are ignored.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

/// Everything the application needs, constructed once at startup and passed
/// by reference to consumers.
pub struct Services {
    pub db: Database,
    pub settings: SettingsStore,
    pub events: EventBus,
    pub recorder: RecordingController,
}

impl Services {
    pub fn init(
        data_dir: &Path,
        gateway: Arc<dyn MediaGateway>,
        battery: Option<watch::Receiver<f64>>,
    ) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;

        let db = Database::new(data_dir.join("shopreel.sqlite3"))?;
        let settings = SettingsStore::new(data_dir.join("settings.json"))?;
        let events = EventBus::default();
        let recorder = RecordingController::new(
            db.clone(),
            gateway,
            battery,
            settings.capture(),
            events.clone(),
        );

        Ok(Self {
            db,
            settings,
            events,
            recorder,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use capture::{FrameSource, SyntheticSource};

    struct OneShotGateway {
        source: Mutex<Option<Box<dyn FrameSource>>>,
    }

    impl MediaGateway for OneShotGateway {
        fn open_screen(&self) -> Result<Option<Box<dyn FrameSource>>> {
            Ok(self.source.lock().unwrap().take())
        }

        fn open_camera(&self) -> Result<Option<Box<dyn FrameSource>>> {
            Ok(self.source.lock().unwrap().take())
        }
    }

    #[tokio::test]
    async fn init_wires_recorder_to_the_stores() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(OneShotGateway {
            source: Mutex::new(Some(Box::new(SyntheticSource::new()) as Box<dyn FrameSource>)),
        });
        let services = Services::init(dir.path(), gateway, None).unwrap();

        let session = services
            .recorder
            .start_screen_session(Default::default())
            .await
            .unwrap()
            .expect("gateway grants the screen source");
        let stopped = services.recorder.stop_session(&session.id).await.unwrap();
        assert_eq!(stopped.id, session.id);
        assert!(services.recorder.save_session(&session.id).await);
        assert!(services
            .db
            .load_session(&session.id)
            .await
            .unwrap()
            .is_some());
    }
}
