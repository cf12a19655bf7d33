//! Chunked session persistence.
//!
//! Encoded frames are large, so a session is stored as one metadata row plus
//! its frames split into fixed-size chunks keyed by `(session_id,
//! chunk_index)`. Load reassembles chunks in index order; no separate chunk
//! count is stored or trusted.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::oneshot;

mod migrations;

use crate::models::session::{CapturedFrame, RecordingSession};
use migrations::run_migrations;

/// Frames per persisted chunk.
pub const FRAMES_PER_CHUNK: usize = 10;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

/// SQLite behind a dedicated worker thread; all access goes through
/// [`Database::execute`], which bridges back to async callers.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("shopreel-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode:{err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Database initialized at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }

    /// Persist the session: metadata row plus frame chunks, atomically.
    pub async fn save_session(&self, session: &RecordingSession) -> Result<()> {
        let metadata = serde_json::to_string(session)
            .with_context(|| format!("failed to serialize session {}", session.id))?;
        let session_id = session.id.clone();

        let mut chunks: Vec<Vec<u8>> = Vec::new();
        for chunk in session.frames.chunks(FRAMES_PER_CHUNK) {
            chunks.push(
                serde_json::to_vec(chunk)
                    .with_context(|| format!("failed to serialize frame chunk for {session_id}"))?,
            );
        }

        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR REPLACE INTO sessions (id, metadata, updated_at)
                 VALUES (?1, ?2, ?3)",
                params![session_id, metadata, Utc::now().to_rfc3339()],
            )
            .with_context(|| "failed to upsert session metadata")?;

            tx.execute(
                "DELETE FROM frame_chunks WHERE session_id = ?1",
                params![session_id],
            )?;

            for (index, payload) in chunks.iter().enumerate() {
                tx.execute(
                    "INSERT INTO frame_chunks (session_id, chunk_index, payload)
                     VALUES (?1, ?2, ?3)",
                    params![session_id, index as i64, payload],
                )
                .with_context(|| format!("failed to insert frame chunk {index}"))?;
            }

            tx.commit().context("failed to commit session save")?;
            Ok(())
        })
        .await
    }

    /// Reconstitute a session: metadata, then chunks in index order.
    pub async fn load_session(&self, session_id: &str) -> Result<Option<RecordingSession>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let metadata: Option<String> = conn
                .query_row(
                    "SELECT metadata FROM sessions WHERE id = ?1",
                    params![session_id],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(metadata) = metadata else {
                return Ok(None);
            };

            let mut session: RecordingSession = serde_json::from_str(&metadata)
                .with_context(|| format!("failed to parse metadata for session {session_id}"))?;

            let mut stmt = conn.prepare(
                "SELECT payload FROM frame_chunks
                 WHERE session_id = ?1
                 ORDER BY chunk_index ASC",
            )?;
            let mut rows = stmt.query(params![session_id])?;
            while let Some(row) = rows.next()? {
                let payload: Vec<u8> = row.get(0)?;
                let frames: Vec<CapturedFrame> = serde_json::from_slice(&payload)
                    .with_context(|| format!("corrupt frame chunk for session {session_id}"))?;
                session.frames.extend(frames);
            }

            Ok(Some(session))
        })
        .await
    }

    pub async fn list_saved_sessions(&self) -> Result<Vec<RecordingSession>> {
        self.execute(|conn| {
            let mut stmt =
                conn.prepare("SELECT metadata FROM sessions ORDER BY updated_at DESC")?;
            let mut rows = stmt.query([])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                let metadata: String = row.get(0)?;
                sessions.push(
                    serde_json::from_str(&metadata)
                        .context("failed to parse stored session metadata")?,
                );
            }
            Ok(sessions)
        })
        .await
    }

    /// Returns false when the session was not stored.
    pub async fn delete_saved_session(&self, session_id: &str) -> Result<bool> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM frame_chunks WHERE session_id = ?1",
                params![session_id],
            )?;
            let removed = tx.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
            tx.commit()?;
            Ok(removed > 0)
        })
        .await
    }

    #[cfg(test)]
    pub(crate) async fn chunk_count(&self, session_id: &str) -> Result<i64> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM frame_chunks WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::{CaptureSettings, SourceKind};
    use chrono::Utc;
    use tempfile::tempdir;

    fn frame(index: usize) -> CapturedFrame {
        CapturedFrame {
            id: format!("frame-{index}"),
            timestamp: Utc::now(),
            data: vec![index as u8; 32],
            width: 4,
            height: 4,
            battery_level: Some(90.0),
            detections: None,
        }
    }

    fn session_with_frames(count: usize) -> RecordingSession {
        let mut session =
            RecordingSession::new(SourceKind::Screen, None, CaptureSettings::default());
        for index in 0..count {
            let f = frame(index);
            session.storage_bytes += f.data.len() as u64;
            session.frames.push(f);
        }
        session
    }

    async fn open_temp_db() -> (tempfile::TempDir, Database) {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("shopreel.sqlite3")).unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn round_trips_a_session_spanning_multiple_chunks() {
        let (_dir, db) = open_temp_db().await;
        let session = session_with_frames(25);

        db.save_session(&session).await.unwrap();
        assert_eq!(db.chunk_count(&session.id).await.unwrap(), 3);

        let loaded = db.load_session(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.frames.len(), 25);
        assert_eq!(loaded.frames, session.frames);
        assert_eq!(loaded.storage_bytes, session.storage_bytes);
        assert_eq!(loaded.status, session.status);
    }

    #[tokio::test]
    async fn round_trips_an_empty_session() {
        let (_dir, db) = open_temp_db().await;
        let session = session_with_frames(0);

        db.save_session(&session).await.unwrap();
        assert_eq!(db.chunk_count(&session.id).await.unwrap(), 0);

        let loaded = db.load_session(&session.id).await.unwrap().unwrap();
        assert!(loaded.frames.is_empty());
    }

    #[tokio::test]
    async fn resave_replaces_stale_chunks() {
        let (_dir, db) = open_temp_db().await;
        let mut session = session_with_frames(25);
        db.save_session(&session).await.unwrap();

        session.frames.truncate(5);
        db.save_session(&session).await.unwrap();

        assert_eq!(db.chunk_count(&session.id).await.unwrap(), 1);
        let loaded = db.load_session(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.frames.len(), 5);
    }

    #[tokio::test]
    async fn load_unknown_session_returns_none() {
        let (_dir, db) = open_temp_db().await;
        assert!(db.load_session("missing").await.unwrap().is_none());
        assert!(!db.delete_saved_session("missing").await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_metadata_and_chunks() {
        let (_dir, db) = open_temp_db().await;
        let session = session_with_frames(12);
        db.save_session(&session).await.unwrap();

        assert!(db.delete_saved_session(&session.id).await.unwrap());
        assert!(db.load_session(&session.id).await.unwrap().is_none());
        assert_eq!(db.chunk_count(&session.id).await.unwrap(), 0);
    }
}
