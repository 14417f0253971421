//! Per-room session registry.

use crate::config::{AgentConfig, AgentSettings, Discipline, PipelineConfig};
use crate::error::SessionError;
use crate::providers::Pipeline;
use crate::room::RoomHandle;
use crate::session::AgentSession;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument};

/// Builds a fresh pipeline for each session.
pub type PipelineFactory = Arc<dyn Fn() -> Result<Pipeline, SessionError> + Send + Sync>;

struct ActiveSession {
    id: u64,
    cancel: CancellationToken,
    /// Cancelled once the session task has fully torn down.
    finished: CancellationToken,
}

/// Removes a session's registry entry when its task ends, including when the
/// task is aborted.
struct Registration {
    worker: AgentWorker,
    room: String,
    id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.worker.release(&self.room, self.id);
    }
}

/// Spawns and tracks one agent session per room.
///
/// A join for a room that already has a session replaces it: the old session
/// is cancelled and torn down before the new one attaches.
#[derive(Clone)]
pub struct AgentWorker {
    agent: AgentConfig,
    discipline: Discipline,
    pipelines: PipelineFactory,
    sessions: Arc<Mutex<HashMap<String, ActiveSession>>>,
    next_id: Arc<AtomicU64>,
}

impl AgentWorker {
    pub fn new(agent: AgentConfig, discipline: Discipline, pipelines: PipelineFactory) -> Self {
        Self {
            agent,
            discipline,
            pipelines,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Worker whose sessions use the OpenAI-compatible providers from
    /// `settings.pipeline`.
    pub fn from_settings(settings: AgentSettings) -> Self {
        let agent = settings.agent_config();
        let pipeline: PipelineConfig = settings.pipeline;
        Self::new(
            agent,
            settings.discipline,
            Arc::new(move || Pipeline::from_config(&pipeline)),
        )
    }

    /// Rooms with a live session, sorted.
    pub fn active_rooms(&self) -> Vec<String> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let mut rooms: Vec<String> = sessions.keys().cloned().collect();
        rooms.sort();
        rooms
    }

    /// Starts a session for `room` on behalf of `participant`.
    ///
    /// The returned handle resolves with the session's outcome, which is
    /// also logged here.
    pub fn on_participant_joined(
        &self,
        room: Arc<dyn RoomHandle>,
        participant: &str,
    ) -> JoinHandle<Result<(), SessionError>> {
        let room_name = room.name().to_string();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let finished = CancellationToken::new();

        let previous = {
            let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            sessions.insert(
                room_name.clone(),
                ActiveSession {
                    id,
                    cancel: cancel.clone(),
                    finished: finished.clone(),
                },
            )
        };

        let registration = Registration {
            worker: self.clone(),
            room: room_name.clone(),
            id,
        };
        let participant = participant.to_string();
        let span = tracing::info_span!("agent_session", room = %room_name, session = id);

        tokio::spawn(
            async move {
                // Declared after `_done` so the entry is released before
                // a replacement waiting on `finished` starts.
                let _done = finished.drop_guard();
                let registration = registration;

                if let Some(previous) = previous {
                    info!("replacing existing session");
                    previous.cancel.cancel();
                    previous.finished.cancelled().await;
                }

                let result = registration
                    .worker
                    .run_session(room, &participant, cancel)
                    .await;
                match &result {
                    Ok(()) => info!("agent session ended"),
                    Err(e) => error!(error = %e, "agent session failed"),
                }
                result
            }
            .instrument(span),
        )
    }

    async fn run_session(
        &self,
        room: Arc<dyn RoomHandle>,
        participant: &str,
        cancel: CancellationToken,
    ) -> Result<(), SessionError> {
        if cancel.is_cancelled() {
            return Ok(());
        }

        let pipeline = (self.pipelines)()?;
        info!(%participant, "starting agent session");

        AgentSession::new(self.agent.clone(), pipeline, self.discipline.clone())
            .with_participant(participant)
            .with_cancellation(cancel)
            .run(room)
            .await
    }

    fn release(&self, room: &str, id: u64) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if sessions.get(room).is_some_and(|s| s.id == id) {
            sessions.remove(room);
        }
    }

    /// Cancels every session.
    pub fn shutdown(&self) {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        info!(sessions = sessions.len(), "shutting down agent worker");
        for session in sessions.values() {
            session.cancel.cancel();
        }
    }
}
