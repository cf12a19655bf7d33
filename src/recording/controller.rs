use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    capture::source::{EncodedFrame, FrameSource, MediaGateway, UploadSource},
    models::session::{
        CaptureSettings, CaptureSettingsPatch, CapturedFrame, RecordingSession, SessionStatus,
        SourceKind, UploadMeta,
    },
    store::Database,
};

use super::events::{EventBus, PauseReason, RecordingEvent};

const ENABLE_LOGS: bool = true;
use crate::{log_error, log_info, log_warn};

/// Floor for the capture interval so a zero/garbage setting cannot spin.
const MIN_INTERVAL_MS: u64 = 10;

struct TickerHandle {
    cancel: CancellationToken,
    ticker: JoinHandle<()>,
}

impl TickerHandle {
    fn shut_down(self) {
        self.cancel.cancel();
        self.ticker.abort();
    }
}

#[derive(Default)]
struct ControllerInner {
    sessions: HashMap<String, RecordingSession>,
    sources: HashMap<String, Box<dyn FrameSource>>,
    uploads: HashMap<String, Box<dyn UploadSource>>,
    tickers: HashMap<String, TickerHandle>,
    /// Stream-ended watchers for live sources. Separate from the tickers: a
    /// pause/resume or interval change cycles the ticker, but the watcher
    /// lives until stop/delete so a vanished stream always stops the session.
    watchers: HashMap<String, JoinHandle<()>>,
}

#[derive(PartialEq)]
enum TickOutcome {
    Continue,
    StopTicker,
}

/// Owns every active `RecordingSession`: mediates hardware access through the
/// gateway, runs the periodic capture loops, reacts to battery dips, and
/// bridges sessions to chunked storage.
///
/// Constructed once at application start and handed to consumers; cloning
/// shares the same state.
#[derive(Clone)]
pub struct RecordingController {
    inner: Arc<Mutex<ControllerInner>>,
    gateway: Arc<dyn MediaGateway>,
    battery: Option<watch::Receiver<f64>>,
    events: EventBus,
    db: Database,
    defaults: CaptureSettings,
}

impl RecordingController {
    pub fn new(
        db: Database,
        gateway: Arc<dyn MediaGateway>,
        battery: Option<watch::Receiver<f64>>,
        defaults: CaptureSettings,
        events: EventBus,
    ) -> Self {
        let controller = Self {
            inner: Arc::new(Mutex::new(ControllerInner::default())),
            gateway,
            battery,
            events,
            db,
            defaults,
        };

        if let Some(rx) = controller.battery.clone() {
            let watcher = controller.clone();
            tokio::spawn(async move {
                watcher.battery_watch_loop(rx).await;
            });
        }

        controller
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // --- session lookup -------------------------------------------------

    pub async fn get_session(&self, session_id: &str) -> Option<RecordingSession> {
        self.inner.lock().await.sessions.get(session_id).cloned()
    }

    pub async fn list_sessions(&self) -> Vec<RecordingSession> {
        let guard = self.inner.lock().await;
        let mut sessions: Vec<_> = guard.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        sessions
    }

    // --- start / create -------------------------------------------------

    /// `None` when the hosting environment refuses screen capture; the
    /// caller decides whether to re-invoke.
    pub async fn start_screen_session(
        &self,
        patch: CaptureSettingsPatch,
    ) -> Result<Option<RecordingSession>> {
        let source = match self.gateway.open_screen() {
            Ok(Some(source)) => source,
            Ok(None) => {
                log_warn!("screen capture permission denied");
                return Ok(None);
            }
            Err(err) => {
                log_warn!("screen capture unavailable: {err:?}");
                return Ok(None);
            }
        };
        Ok(Some(
            self.start_live_session(SourceKind::Screen, source, patch)
                .await,
        ))
    }

    pub async fn start_camera_session(
        &self,
        patch: CaptureSettingsPatch,
    ) -> Result<Option<RecordingSession>> {
        let source = match self.gateway.open_camera() {
            Ok(Some(source)) => source,
            Ok(None) => {
                log_warn!("camera capture permission denied");
                return Ok(None);
            }
            Err(err) => {
                log_warn!("camera capture unavailable: {err:?}");
                return Ok(None);
            }
        };
        Ok(Some(
            self.start_live_session(SourceKind::Camera, source, patch)
                .await,
        ))
    }

    async fn start_live_session(
        &self,
        kind: SourceKind,
        source: Box<dyn FrameSource>,
        patch: CaptureSettingsPatch,
    ) -> RecordingSession {
        let settings = self.defaults.merged(&patch);
        let session = RecordingSession::new(kind, source.source_id(), settings);
        let session_id = session.id.clone();
        let interval_ms = session.settings.capture_interval_ms;
        let snapshot = session.clone();

        let ended = source.ended();
        let watcher = {
            let controller = self.clone();
            let sid = session_id.clone();
            tokio::spawn(async move {
                ended.cancelled().await;
                log_info!("capture stream ended for session {sid}; stopping");
                if let Err(err) = controller.stop_session(&sid).await {
                    log_error!("auto-stop after stream end failed: {err:?}");
                }
            })
        };

        let handle = self.spawn_ticker(session_id.clone(), interval_ms);

        let mut guard = self.inner.lock().await;
        guard.sessions.insert(session_id.clone(), session);
        guard.sources.insert(session_id.clone(), source);
        guard.tickers.insert(session_id.clone(), handle);
        guard.watchers.insert(session_id.clone(), watcher);

        log_info!("started {} session {session_id}", snapshot.source.as_str());
        snapshot
    }

    /// Wraps an uploaded video in a paused session; no frames are captured
    /// until [`process_upload_session`] runs.
    pub async fn create_upload_session(
        &self,
        source: Box<dyn UploadSource>,
        patch: CaptureSettingsPatch,
        category_hints: Vec<String>,
    ) -> RecordingSession {
        let settings = self.defaults.merged(&patch);
        let mut session = RecordingSession::new(SourceKind::Upload, None, settings);
        session.upload = Some(UploadMeta {
            file_name: source.file_name(),
            duration_ms: source.duration_ms(),
            category_hints,
        });
        session.processing_progress = Some(0.0);

        let snapshot = session.clone();
        let mut guard = self.inner.lock().await;
        guard.uploads.insert(session.id.clone(), source);
        guard.sessions.insert(session.id.clone(), session);
        snapshot
    }

    /// Drives a virtual playhead across the uploaded video, capturing one
    /// frame per interval step. Stops early if the session status is changed
    /// away from `Recording` by a concurrent call; the source handle is
    /// always released.
    pub async fn process_upload_session(&self, session_id: &str) -> Result<RecordingSession> {
        let mut source = {
            let mut guard = self.inner.lock().await;
            let session = guard
                .sessions
                .get_mut(session_id)
                .ok_or_else(|| anyhow!("unknown session {session_id}"))?;
            if session.battery_warning {
                bail!("battery warning active; processing refused");
            }
            session.status = SessionStatus::Recording;
            session.processing_progress = Some(0.0);
            guard
                .uploads
                .remove(session_id)
                .ok_or_else(|| anyhow!("session {session_id} has no upload source"))?
        };

        let outcome = self.drive_upload(session_id, source.as_mut()).await;
        drop(source);

        let mut guard = self.inner.lock().await;
        let session = guard
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| anyhow!("session {session_id} deleted during processing"))?;

        match outcome {
            Ok(true) => {
                session.status = SessionStatus::Completed;
                session.processing_progress = Some(100.0);
                session.ended_at = Some(Utc::now());
                let snapshot = session.clone();
                self.events.emit(RecordingEvent::SessionCompleted {
                    session_id: session_id.to_string(),
                    frame_count: snapshot.frame_count(),
                });
                Ok(snapshot)
            }
            // Interrupted by a concurrent pause/stop; leave that status alone.
            Ok(false) => Ok(session.clone()),
            Err(err) => {
                log_error!("upload processing failed for {session_id}: {err:?}");
                session.status = SessionStatus::Error;
                session.error_message = Some(err.to_string());
                Ok(session.clone())
            }
        }
    }

    /// Returns Ok(true) when the playhead reached the end, Ok(false) when a
    /// concurrent status change stopped the run.
    async fn drive_upload(&self, session_id: &str, source: &mut dyn UploadSource) -> Result<bool> {
        let duration_ms = source.duration_ms();
        if duration_ms == 0 {
            bail!("upload source reports zero duration");
        }

        let mut position_ms = 0u64;
        loop {
            let (interval_ms, resolution, quality) = {
                let guard = self.inner.lock().await;
                let session = guard
                    .sessions
                    .get(session_id)
                    .ok_or_else(|| anyhow!("session {session_id} deleted during processing"))?;
                if session.status != SessionStatus::Recording {
                    return Ok(false);
                }
                (
                    session.settings.capture_interval_ms.max(MIN_INTERVAL_MS),
                    session.settings.resolution,
                    session.settings.jpeg_quality,
                )
            };

            if position_ms >= duration_ms {
                return Ok(true);
            }

            let frame = source.grab_at(position_ms, resolution, quality)?;
            let battery_level = self.battery.as_ref().map(|rx| *rx.borrow());

            let progress = ((position_ms + interval_ms).min(duration_ms) as f64
                / duration_ms as f64)
                * 100.0;
            {
                let mut guard = self.inner.lock().await;
                let session = guard
                    .sessions
                    .get_mut(session_id)
                    .ok_or_else(|| anyhow!("session {session_id} deleted during processing"))?;
                append_frame(session, frame, battery_level, &self.events);
                session.processing_progress = Some(progress);
            }
            self.events.emit(RecordingEvent::ProcessingProgress {
                session_id: session_id.to_string(),
                progress,
            });

            position_ms += interval_ms;
            // Cooperative cancellation point; a concurrent stop is observed
            // on the next iteration.
            tokio::task::yield_now().await;
        }
    }

    // --- lifecycle ------------------------------------------------------

    /// Idempotent; pausing an already-paused session is a no-op success.
    pub async fn pause_session(&self, session_id: &str) -> Result<RecordingSession> {
        let (snapshot, handle) = {
            let mut guard = self.inner.lock().await;
            let session = guard
                .sessions
                .get_mut(session_id)
                .ok_or_else(|| anyhow!("unknown session {session_id}"))?;
            if session.status == SessionStatus::Paused {
                return Ok(session.clone());
            }
            session.status = SessionStatus::Paused;
            let snapshot = session.clone();
            (snapshot, guard.tickers.remove(session_id))
        };

        if let Some(handle) = handle {
            handle.shut_down();
        }
        self.events.emit(RecordingEvent::SessionPaused {
            session_id: session_id.to_string(),
            reason: PauseReason::Explicit,
        });
        Ok(snapshot)
    }

    /// Refused while a battery warning is active; the caller must wait for
    /// the level to recover and try again.
    pub async fn resume_session(&self, session_id: &str) -> Result<RecordingSession> {
        let (snapshot, needs_ticker, interval_ms) = {
            let mut guard = self.inner.lock().await;
            let session = guard
                .sessions
                .get_mut(session_id)
                .ok_or_else(|| anyhow!("unknown session {session_id}"))?;
            if session.battery_warning {
                bail!("battery warning active; resume refused");
            }
            if session.status == SessionStatus::Recording {
                return Ok(session.clone());
            }
            if session.status == SessionStatus::Completed {
                bail!("session {session_id} already completed");
            }
            session.status = SessionStatus::Recording;
            let snapshot = session.clone();
            let interval_ms = snapshot.settings.capture_interval_ms;
            let needs_ticker = guard.sources.contains_key(session_id);
            (snapshot, needs_ticker, interval_ms)
        };

        if needs_ticker {
            let handle = self.spawn_ticker(session_id.to_string(), interval_ms);
            self.inner
                .lock()
                .await
                .tickers
                .insert(session_id.to_string(), handle);
        }
        self.events.emit(RecordingEvent::SessionResumed {
            session_id: session_id.to_string(),
        });
        Ok(snapshot)
    }

    pub async fn stop_session(&self, session_id: &str) -> Result<RecordingSession> {
        let (snapshot, handle, watcher) = {
            let mut guard = self.inner.lock().await;
            let session = guard
                .sessions
                .get_mut(session_id)
                .ok_or_else(|| anyhow!("unknown session {session_id}"))?;
            session.status = SessionStatus::Completed;
            session.ended_at = Some(Utc::now());
            let snapshot = session.clone();
            guard.sources.remove(session_id);
            guard.uploads.remove(session_id);
            (
                snapshot,
                guard.tickers.remove(session_id),
                guard.watchers.remove(session_id),
            )
        };

        self.events.emit(RecordingEvent::SessionCompleted {
            session_id: session_id.to_string(),
            frame_count: snapshot.frame_count(),
        });
        // Aborts last: the watcher task itself may be the caller here, so all
        // state changes and events land before its handle dies.
        if let Some(handle) = handle {
            handle.shut_down();
        }
        if let Some(watcher) = watcher {
            watcher.abort();
        }
        Ok(snapshot)
    }

    /// Safe on unknown ids: returns false instead of failing.
    pub async fn delete_session(&self, session_id: &str) -> bool {
        let (handle, watcher) = {
            let mut guard = self.inner.lock().await;
            if guard.sessions.remove(session_id).is_none() {
                return false;
            }
            guard.sources.remove(session_id);
            guard.uploads.remove(session_id);
            (
                guard.tickers.remove(session_id),
                guard.watchers.remove(session_id),
            )
        };
        if let Some(handle) = handle {
            handle.shut_down();
        }
        if let Some(watcher) = watcher {
            watcher.abort();
        }
        log_info!("deleted session {session_id}");
        true
    }

    /// Merges partial settings; an interval change while recording restarts
    /// the capture timer without touching already-captured frames.
    pub async fn adjust_settings(
        &self,
        session_id: &str,
        patch: CaptureSettingsPatch,
    ) -> Result<CaptureSettings> {
        let (settings, restart, old_handle) = {
            let mut guard = self.inner.lock().await;
            let session = guard
                .sessions
                .get_mut(session_id)
                .ok_or_else(|| anyhow!("unknown session {session_id}"))?;
            let old_interval = session.settings.capture_interval_ms;
            session.settings = session.settings.merged(&patch);
            let settings = session.settings.clone();
            let restart = settings.capture_interval_ms != old_interval
                && session.status == SessionStatus::Recording
                && guard.sources.contains_key(session_id);
            let old_handle = if restart {
                guard.tickers.remove(session_id)
            } else {
                None
            };
            (settings, restart, old_handle)
        };

        if let Some(handle) = old_handle {
            handle.shut_down();
        }
        if restart {
            let handle = self.spawn_ticker(session_id.to_string(), settings.capture_interval_ms);
            self.inner
                .lock()
                .await
                .tickers
                .insert(session_id.to_string(), handle);
        }
        Ok(settings)
    }

    // --- persistence ----------------------------------------------------

    /// Storage failures are logged and reported as `false`; session state is
    /// left unchanged either way.
    pub async fn save_session(&self, session_id: &str) -> bool {
        let snapshot = match self.get_session(session_id).await {
            Some(session) => session,
            None => {
                log_warn!("save requested for unknown session {session_id}");
                return false;
            }
        };
        match self.db.save_session(&snapshot).await {
            Ok(()) => true,
            Err(err) => {
                log_error!("failed to save session {session_id}: {err:?}");
                false
            }
        }
    }

    /// Reconstitutes a stored session into the active set. A session stored
    /// mid-recording comes back paused: its timer no longer exists.
    pub async fn load_session(&self, session_id: &str) -> Result<Option<RecordingSession>> {
        let Some(mut session) = self.db.load_session(session_id).await? else {
            return Ok(None);
        };
        if session.status == SessionStatus::Recording {
            session.status = SessionStatus::Paused;
        }
        let snapshot = session.clone();
        self.inner
            .lock()
            .await
            .sessions
            .insert(session.id.clone(), session);
        Ok(Some(snapshot))
    }

    // --- internals ------------------------------------------------------

    fn spawn_ticker(&self, session_id: String, interval_ms: u64) -> TickerHandle {
        let inner = self.inner.clone();
        let events = self.events.clone();
        let battery = self.battery.clone();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let ticker = tokio::spawn(async move {
            let mut interval =
                time::interval(Duration::from_millis(interval_ms.max(MIN_INTERVAL_MS)));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of `interval` fires immediately; skip it so the
            // first frame lands one interval after start.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let outcome = capture_tick(
                            &inner,
                            &events,
                            battery.as_ref(),
                            &session_id,
                        )
                        .await;
                        if outcome == TickOutcome::StopTicker {
                            break;
                        }
                    }
                    _ = token.cancelled() => {
                        break;
                    }
                }
            }
        });

        TickerHandle { cancel, ticker }
    }

    async fn battery_watch_loop(self, mut rx: watch::Receiver<f64>) {
        while rx.changed().await.is_ok() {
            let level = *rx.borrow();
            let mut paused: Vec<String> = Vec::new();
            {
                let mut guard = self.inner.lock().await;
                let inner = &mut *guard;
                for session in inner.sessions.values_mut() {
                    let threshold = session.settings.battery_pause_threshold;
                    if session.status == SessionStatus::Recording && level < threshold {
                        session.status = SessionStatus::Paused;
                        session.battery_warning = true;
                        paused.push(session.id.clone());
                    } else if session.battery_warning && level >= threshold {
                        // Recovery only unblocks resume; no auto-resume.
                        session.battery_warning = false;
                    }
                }
                for id in &paused {
                    if let Some(handle) = inner.tickers.remove(id) {
                        handle.shut_down();
                    }
                }
            }
            for id in paused {
                log_warn!("battery at {level:.0}%; auto-paused session {id}");
                self.events.emit(RecordingEvent::BatteryWarning {
                    session_id: id.clone(),
                    level,
                });
                self.events.emit(RecordingEvent::SessionPaused {
                    session_id: id,
                    reason: PauseReason::Battery,
                });
            }
        }
    }
}

/// One capture-loop tick: grab, append, account storage, notify. A grab
/// error skips the tick; reaching the frame cap auto-pauses the session.
async fn capture_tick(
    inner: &Arc<Mutex<ControllerInner>>,
    events: &EventBus,
    battery: Option<&watch::Receiver<f64>>,
    session_id: &str,
) -> TickOutcome {
    let mut guard = inner.lock().await;
    let state = &mut *guard;

    let Some(session) = state.sessions.get_mut(session_id) else {
        return TickOutcome::StopTicker;
    };
    if session.status != SessionStatus::Recording {
        return TickOutcome::StopTicker;
    }
    let Some(source) = state.sources.get_mut(session_id) else {
        return TickOutcome::StopTicker;
    };

    let frame = match source.grab(session.settings.resolution, session.settings.jpeg_quality) {
        Ok(frame) => frame,
        Err(err) => {
            log_warn!("frame grab failed for session {session_id}: {err:?}");
            return TickOutcome::Continue;
        }
    };

    let battery_level = battery.map(|rx| *rx.borrow());
    let capped = append_frame(session, frame, battery_level, events);
    if capped {
        log_info!(
            "session {session_id} hit max frames ({}); auto-pausing",
            session.settings.max_frames
        );
        events.emit(RecordingEvent::SessionPaused {
            session_id: session_id.to_string(),
            reason: PauseReason::FrameCap,
        });
        return TickOutcome::StopTicker;
    }
    TickOutcome::Continue
}

/// Appends an encoded frame and returns true when the session just hit its
/// frame cap (which flips it to `Paused`, never `Completed`).
fn append_frame(
    session: &mut RecordingSession,
    frame: EncodedFrame,
    battery_level: Option<f64>,
    events: &EventBus,
) -> bool {
    let captured = CapturedFrame {
        id: Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        data: frame.data,
        width: frame.width,
        height: frame.height,
        battery_level,
        detections: None,
    };
    let bytes = captured.data.len();
    let frame_id = captured.id.clone();
    session.storage_bytes += bytes as u64;
    session.frames.push(captured);

    events.emit(RecordingEvent::FrameCaptured {
        session_id: session.id.clone(),
        frame_id,
        frame_count: session.frames.len(),
        bytes,
    });

    if session.at_frame_cap() {
        session.status = SessionStatus::Paused;
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::battery::BatteryFeed;
    use crate::capture::encoder::{SyntheticSource, SyntheticUpload};
    use crate::models::session::Resolution;
    use std::sync::Mutex as StdMutex;
    use tempfile::tempdir;
    use tokio::time::sleep;

    /// Hands out at most one pre-built source; further requests look like a
    /// permission denial.
    struct HandoffGateway(StdMutex<Option<Box<dyn FrameSource>>>);

    impl HandoffGateway {
        fn with_synthetic() -> Self {
            Self(StdMutex::new(Some(Box::new(SyntheticSource::new()))))
        }

        fn with_source(source: Box<dyn FrameSource>) -> Self {
            Self(StdMutex::new(Some(source)))
        }

        fn denying() -> Self {
            Self(StdMutex::new(None))
        }
    }

    impl MediaGateway for HandoffGateway {
        fn open_screen(&self) -> Result<Option<Box<dyn FrameSource>>> {
            Ok(self.0.lock().unwrap().take())
        }

        fn open_camera(&self) -> Result<Option<Box<dyn FrameSource>>> {
            Ok(self.0.lock().unwrap().take())
        }
    }

    fn fast_settings() -> CaptureSettings {
        CaptureSettings {
            capture_interval_ms: 20,
            max_frames: 1_000,
            jpeg_quality: 0.5,
            resolution: Resolution::new(8, 8),
            battery_pause_threshold: 15.0,
            detect_inactivity: false,
        }
    }

    struct TestRig {
        _dir: tempfile::TempDir,
        controller: RecordingController,
    }

    fn rig(gateway: Arc<dyn MediaGateway>, battery: Option<watch::Receiver<f64>>) -> TestRig {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("test.sqlite3")).unwrap();
        let controller = RecordingController::new(
            db,
            gateway,
            battery,
            fast_settings(),
            EventBus::default(),
        );
        TestRig {
            _dir: dir,
            controller,
        }
    }

    #[tokio::test]
    async fn permission_denial_returns_none() {
        let rig = rig(Arc::new(HandoffGateway::denying()), None);
        let started = rig
            .controller
            .start_screen_session(CaptureSettingsPatch::default())
            .await
            .unwrap();
        assert!(started.is_none());
        assert!(rig.controller.list_sessions().await.is_empty());
    }

    #[tokio::test]
    async fn frame_cap_auto_pauses_instead_of_completing() {
        let rig = rig(Arc::new(HandoffGateway::with_synthetic()), None);
        let session = rig
            .controller
            .start_screen_session(CaptureSettingsPatch {
                max_frames: Some(3),
                ..Default::default()
            })
            .await
            .unwrap()
            .unwrap();

        // 20ms interval, 3-frame cap: half a second is plenty.
        sleep(Duration::from_millis(500)).await;

        let session = rig.controller.get_session(&session.id).await.unwrap();
        assert_eq!(session.frames.len(), 3);
        assert_eq!(session.status, SessionStatus::Paused);
        assert!(session.ended_at.is_none());
        assert!(session.storage_bytes > 0);
    }

    #[tokio::test]
    async fn capture_emits_frame_events() {
        let rig = rig(Arc::new(HandoffGateway::with_synthetic()), None);
        let mut events = rig.controller.events().subscribe();
        let session = rig
            .controller
            .start_screen_session(CaptureSettingsPatch {
                max_frames: Some(2),
                ..Default::default()
            })
            .await
            .unwrap()
            .unwrap();

        sleep(Duration::from_millis(400)).await;

        let mut captured = 0;
        let mut paused = false;
        while let Ok(event) = events.try_recv() {
            match event {
                RecordingEvent::FrameCaptured { session_id, .. } => {
                    assert_eq!(session_id, session.id);
                    captured += 1;
                }
                RecordingEvent::SessionPaused { reason, .. } => {
                    assert_eq!(reason, PauseReason::FrameCap);
                    paused = true;
                }
                _ => {}
            }
        }
        assert_eq!(captured, 2);
        assert!(paused);
    }

    #[tokio::test]
    async fn pause_is_idempotent_and_stop_records_end() {
        let rig = rig(Arc::new(HandoffGateway::with_synthetic()), None);
        let session = rig
            .controller
            .start_screen_session(CaptureSettingsPatch::default())
            .await
            .unwrap()
            .unwrap();

        let paused = rig.controller.pause_session(&session.id).await.unwrap();
        assert_eq!(paused.status, SessionStatus::Paused);
        // Pausing again is a no-op success.
        let paused_again = rig.controller.pause_session(&session.id).await.unwrap();
        assert_eq!(paused_again.status, SessionStatus::Paused);

        let stopped = rig.controller.stop_session(&session.id).await.unwrap();
        assert_eq!(stopped.status, SessionStatus::Completed);
        assert!(stopped.ended_at.is_some());
    }

    #[tokio::test]
    async fn battery_dip_pauses_and_blocks_resume_until_recovery() {
        let feed = BatteryFeed::new(80.0);
        let rig = rig(
            Arc::new(HandoffGateway::with_synthetic()),
            Some(feed.subscribe()),
        );
        let session = rig
            .controller
            .start_screen_session(CaptureSettingsPatch {
                battery_pause_threshold: Some(30.0),
                ..Default::default()
            })
            .await
            .unwrap()
            .unwrap();

        feed.publish(20.0);
        sleep(Duration::from_millis(100)).await;

        let paused = rig.controller.get_session(&session.id).await.unwrap();
        assert_eq!(paused.status, SessionStatus::Paused);
        assert!(paused.battery_warning);

        // Resume is refused while the warning is active and state is unchanged.
        assert!(rig.controller.resume_session(&session.id).await.is_err());
        let still_paused = rig.controller.get_session(&session.id).await.unwrap();
        assert_eq!(still_paused.status, SessionStatus::Paused);

        // Recovery clears the warning but does not auto-resume.
        feed.publish(90.0);
        sleep(Duration::from_millis(100)).await;
        let recovered = rig.controller.get_session(&session.id).await.unwrap();
        assert_eq!(recovered.status, SessionStatus::Paused);
        assert!(!recovered.battery_warning);

        let resumed = rig.controller.resume_session(&session.id).await.unwrap();
        assert_eq!(resumed.status, SessionStatus::Recording);
    }

    #[tokio::test]
    async fn upload_five_second_video_yields_five_frames() {
        let rig = rig(Arc::new(HandoffGateway::denying()), None);
        let source = Box::new(SyntheticUpload::new("haul.mp4", 5_000));
        let session = rig
            .controller
            .create_upload_session(
                source,
                CaptureSettingsPatch {
                    capture_interval_ms: Some(1_000),
                    max_frames: Some(100),
                    ..Default::default()
                },
                vec!["apparel".into()],
            )
            .await;

        assert_eq!(session.status, SessionStatus::Paused);
        assert_eq!(session.processing_progress, Some(0.0));
        assert_eq!(session.upload.as_ref().unwrap().duration_ms, 5_000);

        let processed = rig
            .controller
            .process_upload_session(&session.id)
            .await
            .unwrap();
        assert_eq!(processed.frames.len(), 5);
        assert_eq!(processed.status, SessionStatus::Completed);
        assert_eq!(processed.processing_progress, Some(100.0));
        assert!(processed.ended_at.is_some());
    }

    #[tokio::test]
    async fn upload_respects_frame_cap_by_pausing() {
        let rig = rig(Arc::new(HandoffGateway::denying()), None);
        let source = Box::new(SyntheticUpload::new("haul.mp4", 10_000));
        let session = rig
            .controller
            .create_upload_session(
                source,
                CaptureSettingsPatch {
                    capture_interval_ms: Some(1_000),
                    max_frames: Some(4),
                    ..Default::default()
                },
                Vec::new(),
            )
            .await;

        let processed = rig
            .controller
            .process_upload_session(&session.id)
            .await
            .unwrap();
        // Cap reached mid-run: the loop observes the auto-pause and stops
        // without marking the session completed.
        assert_eq!(processed.frames.len(), 4);
        assert_eq!(processed.status, SessionStatus::Paused);
        assert_ne!(processed.processing_progress, Some(100.0));
    }

    #[tokio::test]
    async fn save_and_load_round_trip_through_the_controller() {
        let rig = rig(Arc::new(HandoffGateway::denying()), None);
        let source = Box::new(SyntheticUpload::new("haul.mp4", 3_000));
        let session = rig
            .controller
            .create_upload_session(
                source,
                CaptureSettingsPatch {
                    capture_interval_ms: Some(1_000),
                    ..Default::default()
                },
                Vec::new(),
            )
            .await;
        let processed = rig
            .controller
            .process_upload_session(&session.id)
            .await
            .unwrap();
        assert_eq!(processed.frames.len(), 3);

        assert!(rig.controller.save_session(&session.id).await);
        assert!(rig.controller.delete_session(&session.id).await);
        assert!(rig.controller.get_session(&session.id).await.is_none());

        let loaded = rig
            .controller
            .load_session(&session.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.frames, processed.frames);
        assert_eq!(loaded.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn save_unknown_session_reports_failure() {
        let rig = rig(Arc::new(HandoffGateway::denying()), None);
        assert!(!rig.controller.save_session("missing").await);
        assert!(!rig.controller.delete_session("missing").await);
    }

    #[tokio::test]
    async fn adjust_interval_restarts_capture_without_losing_frames() {
        let rig = rig(Arc::new(HandoffGateway::with_synthetic()), None);
        let session = rig
            .controller
            .start_screen_session(CaptureSettingsPatch::default())
            .await
            .unwrap()
            .unwrap();

        sleep(Duration::from_millis(150)).await;
        let before = rig.controller.get_session(&session.id).await.unwrap();
        assert!(!before.frames.is_empty());

        let settings = rig
            .controller
            .adjust_settings(
                &session.id,
                CaptureSettingsPatch {
                    capture_interval_ms: Some(15),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(settings.capture_interval_ms, 15);

        sleep(Duration::from_millis(150)).await;
        let after = rig.controller.get_session(&session.id).await.unwrap();
        assert!(after.frames.len() > before.frames.len());
        // Earlier frames survive the timer restart.
        assert_eq!(
            &after.frames[..before.frames.len()],
            before.frames.as_slice()
        );
    }

    #[tokio::test]
    async fn stream_end_still_stops_after_pause_resume_and_interval_change() {
        let source = SyntheticSource::new();
        let ended = source.ended_token();
        let rig = rig(
            Arc::new(HandoffGateway::with_source(Box::new(source))),
            None,
        );
        let session = rig
            .controller
            .start_screen_session(CaptureSettingsPatch::default())
            .await
            .unwrap()
            .unwrap();

        // Cycle the capture timer; the ended-watcher must survive both.
        rig.controller.pause_session(&session.id).await.unwrap();
        rig.controller.resume_session(&session.id).await.unwrap();
        rig.controller
            .adjust_settings(
                &session.id,
                CaptureSettingsPatch {
                    capture_interval_ms: Some(15),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        ended.cancel();
        sleep(Duration::from_millis(200)).await;

        let stopped = rig.controller.get_session(&session.id).await.unwrap();
        assert_eq!(stopped.status, SessionStatus::Completed);
        assert!(stopped.ended_at.is_some());
    }

    #[tokio::test]
    async fn stream_end_stops_the_session() {
        let source = SyntheticSource::new();
        let ended = source.ended_token();
        let rig = rig(
            Arc::new(HandoffGateway::with_source(Box::new(source))),
            None,
        );
        let session = rig
            .controller
            .start_screen_session(CaptureSettingsPatch::default())
            .await
            .unwrap()
            .unwrap();

        ended.cancel();
        sleep(Duration::from_millis(100)).await;

        let stopped = rig.controller.get_session(&session.id).await.unwrap();
        assert_eq!(stopped.status, SessionStatus::Completed);
    }
}
