//! Manual turn-taking state machine.
//!
//! Pure and synchronous: the session owns one [`TurnMachine`] and applies
//! signals to it one at a time, then carries out the returned
//! [`TurnEffect`].

use parley_types::{ControlSignal, TurnState};

/// Side effect the session must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEffect {
    /// Clear the capture buffer and start recording user audio.
    BeginCapture,
    /// Stop recording and run the reply pipeline on the captured audio.
    SubmitUtterance,
    /// Cancel the in-flight reply (if `halt_reply`), stop playback, and start
    /// recording afresh.
    BargeIn { halt_reply: bool },
    /// The signal is not valid in the current state.
    Ignored,
}

#[derive(Debug, Clone, Default)]
pub struct TurnMachine {
    state: TurnState,
}

impl TurnMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        self.state == TurnState::Listening
    }

    pub fn is_speaking(&self) -> bool {
        self.state == TurnState::Speaking
    }

    pub fn apply(&mut self, signal: ControlSignal) -> TurnEffect {
        match (self.state, signal) {
            (TurnState::Idle, ControlSignal::StartListening) => {
                self.state = TurnState::Listening;
                TurnEffect::BeginCapture
            }
            (TurnState::Listening, ControlSignal::StopListening) => {
                self.state = TurnState::Processing;
                TurnEffect::SubmitUtterance
            }
            (previous, ControlSignal::Interrupt) => {
                self.state = TurnState::Listening;
                TurnEffect::BargeIn {
                    halt_reply: matches!(previous, TurnState::Processing | TurnState::Speaking),
                }
            }
            _ => TurnEffect::Ignored,
        }
    }

    /// Synthesized audio started playing. Returns `false` if no reply was
    /// being processed.
    pub fn speaking_started(&mut self) -> bool {
        if self.state == TurnState::Processing {
            self.state = TurnState::Speaking;
            true
        } else {
            false
        }
    }

    /// The reply finished playing, or there was nothing to say.
    pub fn reply_finished(&mut self) -> bool {
        if matches!(self.state, TurnState::Processing | TurnState::Speaking) {
            self.state = TurnState::Idle;
            true
        } else {
            false
        }
    }
}
