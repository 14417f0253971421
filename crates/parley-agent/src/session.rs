//! One agent session per room.
//!
//! The session task owns every piece of mutable state: the conversation
//! context, the manual [`TurnMachine`] or the automatic [`Detectors`], and the
//! in-flight turn. Room events and turn updates are handled one at a time in
//! arrival order. The reply pipeline for a user turn runs in a child task and
//! reports back through a channel; every report carries the turn's generation
//! so that output from a cancelled turn is discarded.

use crate::audio::AudioBuffer;
use crate::config::{AgentConfig, Discipline};
use crate::context::ConversationContext;
use crate::detect::{DetectorOutput, Detectors};
use crate::error::SessionError;
use crate::providers::Pipeline;
use crate::room::{RoomEvent, RoomHandle};
use crate::turn::{TurnEffect, TurnMachine};
use parley_types::{ControlSignal, TurnState, UnknownSignal};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Progress report from a turn task.
#[derive(Debug)]
enum TurnUpdate {
    /// The user's words, to be recorded in history.
    Transcribed { transcript: String },
    /// Synthesized audio for `reply` is about to be published and will play
    /// for `playback`.
    SpeakingStarted { reply: String, playback: Duration },
    /// Playback completed, or there was nothing to say.
    Finished,
    Failed(SessionError),
}

#[derive(Debug)]
struct TurnMessage {
    generation: u64,
    update: TurnUpdate,
}

struct InFlightTurn {
    generation: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Turn-taking state that depends on the discipline.
enum Turns {
    Manual {
        machine: TurnMachine,
        capture: AudioBuffer,
    },
    Automatic {
        detectors: Detectors,
    },
}

impl Turns {
    fn for_discipline(discipline: &Discipline) -> Self {
        match discipline {
            Discipline::Manual => Turns::Manual {
                machine: TurnMachine::new(),
                capture: AudioBuffer::default(),
            },
            Discipline::Automatic(config) => Turns::Automatic {
                detectors: Detectors::from_config(config),
            },
        }
    }
}

/// One user turn's trip through the pipeline, run off the session task.
struct TurnJob {
    generation: u64,
    pipeline: Pipeline,
    context: ConversationContext,
    utterance: AudioBuffer,
    room: Arc<dyn RoomHandle>,
    updates: mpsc::UnboundedSender<TurnMessage>,
}

impl TurnJob {
    async fn run(mut self) {
        if let Err(err) = self.reply().await {
            self.report(TurnUpdate::Failed(err));
        }
    }

    fn report(&self, update: TurnUpdate) {
        let _ = self.updates.send(TurnMessage {
            generation: self.generation,
            update,
        });
    }

    async fn reply(&mut self) -> Result<(), SessionError> {
        if self.utterance.is_empty() {
            self.report(TurnUpdate::Finished);
            return Ok(());
        }

        let transcript = self
            .pipeline
            .transcriber
            .transcribe(&self.utterance)
            .await?;
        if transcript.trim().is_empty() {
            debug!(room = %self.room.name(), "empty transcript, skipping reply");
            self.report(TurnUpdate::Finished);
            return Ok(());
        }

        self.context.push_user(transcript.clone());
        self.report(TurnUpdate::Transcribed { transcript });
        let reply = self.pipeline.completion.complete(&self.context).await?;
        if reply.trim().is_empty() {
            self.report(TurnUpdate::Finished);
            return Ok(());
        }

        let audio = self.pipeline.synthesizer.synthesize(&reply).await?;
        let playback = audio.duration();
        self.report(TurnUpdate::SpeakingStarted { reply, playback });
        self.room.publish_audio(audio).await?;
        // The room owns the audio now; the turn lasts until it has played.
        tokio::time::sleep(playback).await;
        self.report(TurnUpdate::Finished);
        Ok(())
    }
}

pub struct AgentSession {
    agent: AgentConfig,
    pipeline: Pipeline,
    discipline: Discipline,
    context: ConversationContext,
    participant: Option<String>,
    cancel: CancellationToken,
    state: watch::Sender<TurnState>,
    updates_tx: mpsc::UnboundedSender<TurnMessage>,
    updates_rx: mpsc::UnboundedReceiver<TurnMessage>,
    generation: u64,
    in_flight: Option<InFlightTurn>,
    /// When agent audio already handed to the room stops playing.
    playback_until: Option<Instant>,
}

impl AgentSession {
    pub fn new(agent: AgentConfig, pipeline: Pipeline, discipline: Discipline) -> Self {
        let (state, _) = watch::channel(TurnState::Idle);
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let context = ConversationContext::with_instructions(agent.instructions.clone());

        Self {
            agent,
            pipeline,
            discipline,
            context,
            participant: None,
            cancel: CancellationToken::new(),
            state,
            updates_tx,
            updates_rx,
            generation: 0,
            in_flight: None,
            playback_until: None,
        }
    }

    /// Cancelling `token` ends the session and any reply in progress.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Ends the session when this participant leaves. Without one, the first
    /// departure ends it.
    pub fn with_participant(mut self, identity: impl Into<String>) -> Self {
        self.participant = Some(identity.into());
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Observes the manual turn state. Stays `Idle` in the automatic
    /// discipline.
    pub fn state_watch(&self) -> watch::Receiver<TurnState> {
        self.state.subscribe()
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    /// Attaches to the room under the agent persona, connects, then speaks
    /// the greeting. Nothing is synthesized unless both attach and connect
    /// succeed.
    pub async fn start(&mut self, room: &dyn RoomHandle) -> Result<(), SessionError> {
        room.attach(&self.agent.persona).await?;
        room.connect().await?;
        info!(room = %room.name(), persona = %self.agent.persona, "agent joined room");

        let prompt = self.context.with_turn_instructions(&self.agent.greeting);
        let greeting = self.pipeline.completion.complete(&prompt).await?;
        if greeting.trim().is_empty() {
            debug!(room = %room.name(), "empty greeting, nothing to say");
            return Ok(());
        }

        let audio = self.pipeline.synthesizer.synthesize(&greeting).await?;
        let playback = audio.duration();
        room.publish_audio(audio).await?;
        self.playback_until = Some(Instant::now() + playback);
        self.context.push_assistant(greeting);
        Ok(())
    }

    /// Runs the session until the participant leaves, the room goes away,
    /// the session is cancelled, or a turn fails.
    ///
    /// The room is always disconnected on the way out.
    pub async fn run(mut self, room: Arc<dyn RoomHandle>) -> Result<(), SessionError> {
        let cancel = self.cancel.clone();
        let started = tokio::select! {
            _ = cancel.cancelled() => None,
            result = self.start(room.as_ref()) => Some(result),
        };

        let result = match started {
            None => Ok(()),
            Some(Err(e)) => Err(e),
            Some(Ok(())) => self.event_loop(&room).await,
        };

        self.halt_turn();
        room.disconnect().await;
        result
    }

    async fn event_loop(&mut self, room: &Arc<dyn RoomHandle>) -> Result<(), SessionError> {
        let mut turns = Turns::for_discipline(&self.discipline);
        let cancel = self.cancel.clone();

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!(room = %room.name(), "session cancelled");
                    return Ok(());
                }

                Some(message) = self.updates_rx.recv() => {
                    self.on_turn_update(&mut turns, message)?;
                }

                event = room.next_event() => match event {
                    None | Some(RoomEvent::Disconnected) => {
                        info!(room = %room.name(), "room disconnected");
                        return Ok(());
                    }
                    Some(RoomEvent::ParticipantLeft { identity }) => {
                        if self.participant.as_deref().map_or(true, |p| p == identity) {
                            info!(room = %room.name(), %identity, "participant left");
                            return Ok(());
                        }
                    }
                    Some(RoomEvent::ParticipantJoined { identity }) => {
                        debug!(room = %room.name(), %identity, "participant joined");
                    }
                    Some(RoomEvent::Data { participant, payload }) => {
                        self.on_data(&mut turns, room, participant, &payload).await?;
                    }
                    Some(RoomEvent::Audio { frame, .. }) => {
                        self.on_audio(&mut turns, room, frame).await?;
                    }
                },
            }
        }
    }

    async fn on_data(
        &mut self,
        turns: &mut Turns,
        room: &Arc<dyn RoomHandle>,
        participant: Option<String>,
        payload: &[u8],
    ) -> Result<(), SessionError> {
        let Turns::Manual { machine, capture } = turns else {
            debug!(room = %room.name(), "ignoring data packet in automatic mode");
            return Ok(());
        };

        let signal = match ControlSignal::from_payload(payload) {
            Ok(signal) => signal,
            Err(UnknownSignal(raw)) => {
                warn!(
                    room = %room.name(),
                    participant = participant.as_deref().unwrap_or("unknown"),
                    payload = %raw,
                    "ignoring unknown control signal"
                );
                return Ok(());
            }
        };

        let previous = machine.state();
        match machine.apply(signal) {
            TurnEffect::BeginCapture => capture.clear(),
            TurnEffect::SubmitUtterance => {
                let utterance = std::mem::take(capture);
                self.spawn_turn(room, utterance);
            }
            TurnEffect::BargeIn { halt_reply } => {
                if halt_reply {
                    self.halt_turn();
                }
                // Published audio may still be playing, even from Idle.
                self.stop_playback(room).await?;
                capture.clear();
            }
            TurnEffect::Ignored => {
                debug!(
                    room = %room.name(),
                    state = %previous,
                    signal = signal.as_str(),
                    "signal not valid in current state"
                );
            }
        }

        if machine.state() != previous {
            info!(room = %room.name(), from = %previous, to = %machine.state(), "turn state changed");
            self.state.send_replace(machine.state());
        }
        Ok(())
    }

    async fn on_audio(
        &mut self,
        turns: &mut Turns,
        room: &Arc<dyn RoomHandle>,
        frame: AudioBuffer,
    ) -> Result<(), SessionError> {
        match turns {
            Turns::Manual { machine, capture } => {
                if machine.is_listening() {
                    capture.extend(&frame);
                }
            }
            Turns::Automatic { detectors } => match detectors.push_frame(frame)? {
                DetectorOutput::Continue => {}
                DetectorOutput::TurnStarted => {
                    if self.agent_audible() {
                        info!(room = %room.name(), "user barged in");
                        self.halt_turn();
                        self.stop_playback(room).await?;
                    }
                }
                DetectorOutput::TurnEnded(utterance) => {
                    debug!(
                        room = %room.name(),
                        duration_ms = utterance.duration().as_millis() as u64,
                        "user turn ended"
                    );
                    self.spawn_turn(room, utterance);
                }
            },
        }
        Ok(())
    }

    fn on_turn_update(&mut self, turns: &mut Turns, message: TurnMessage) -> Result<(), SessionError> {
        let current = self.in_flight.as_ref().map(|t| t.generation);
        if current != Some(message.generation) {
            debug!(generation = message.generation, "discarding update from cancelled turn");
            return Ok(());
        }

        match message.update {
            TurnUpdate::Transcribed { transcript } => {
                info!(user = %transcript, "user turn transcribed");
                self.context.push_user(transcript);
            }
            TurnUpdate::SpeakingStarted { reply, playback } => {
                info!(agent = %reply, "agent speaking");
                self.context.push_assistant(reply);
                self.playback_until = Some(Instant::now() + playback);
                if let Turns::Manual { machine, .. } = turns {
                    if machine.speaking_started() {
                        self.state.send_replace(machine.state());
                    }
                }
            }
            TurnUpdate::Finished => {
                self.in_flight = None;
                self.playback_until = None;
                if let Turns::Manual { machine, .. } = turns {
                    if machine.reply_finished() {
                        self.state.send_replace(machine.state());
                    }
                }
            }
            TurnUpdate::Failed(err) => {
                self.in_flight = None;
                return Err(err);
            }
        }
        Ok(())
    }

    fn spawn_turn(&mut self, room: &Arc<dyn RoomHandle>, utterance: AudioBuffer) {
        self.halt_turn();
        self.generation += 1;

        let job = TurnJob {
            generation: self.generation,
            pipeline: self.pipeline.clone(),
            context: self.context.clone(),
            utterance,
            room: Arc::clone(room),
            updates: self.updates_tx.clone(),
        };
        let cancel = self.cancel.child_token();
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = task_cancel.cancelled() => {}
                _ = job.run() => {}
            }
        });

        self.in_flight = Some(InFlightTurn {
            generation: self.generation,
            cancel,
            handle,
        });
    }

    /// Whether a reply is being prepared or agent audio is still playing.
    fn agent_audible(&self) -> bool {
        self.in_flight.is_some() || self.playback_until.is_some_and(|t| Instant::now() < t)
    }

    async fn stop_playback(&mut self, room: &Arc<dyn RoomHandle>) -> Result<(), SessionError> {
        self.playback_until = None;
        room.clear_audio().await?;
        Ok(())
    }

    /// Cancels the in-flight turn, if any. Its pending reports go stale.
    fn halt_turn(&mut self) {
        if let Some(turn) = self.in_flight.take() {
            debug!(generation = turn.generation, "halting in-flight turn");
            turn.cancel.cancel();
            turn.handle.abort();
        }
    }
}
