//! Noise suppression, voice activity detection, and turn detection for the
//! automatic discipline.
//!
//! The coordinator feeds every inbound frame through
//! `NoiseFilter -> VoiceActivityDetector -> TurnDetector` and only reacts to
//! the [`TurnBoundary`] values coming out the far end. Whether the user is
//! mid-turn is the turn detector's state, not the coordinator's.

use crate::audio::AudioBuffer;
use crate::config::DetectorConfig;
use crate::error::PipelineError;
use std::time::Duration;

/// Cleans inbound audio in place before detection.
pub trait NoiseFilter: Send {
    fn process(&mut self, samples: &mut [i16]);
}

/// Classifies a frame as speech or non-speech.
pub trait VoiceActivityDetector: Send {
    fn is_speech(&mut self, samples: &[i16]) -> Result<bool, PipelineError>;
}

/// A change in whether the user holds the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnBoundary {
    Started,
    Ended,
}

/// Turns a stream of per-frame speech decisions into turn boundaries.
pub trait TurnDetector: Send {
    fn observe(&mut self, speech: bool, frame: Duration) -> Option<TurnBoundary>;
    fn in_turn(&self) -> bool;
}

/// Silences samples below a fixed magnitude.
#[derive(Debug, Clone)]
pub struct NoiseGate {
    floor: i16,
}

impl NoiseGate {
    pub fn new(floor: i16) -> Self {
        Self { floor: floor.max(0) }
    }
}

impl NoiseFilter for NoiseGate {
    fn process(&mut self, samples: &mut [i16]) {
        for sample in samples.iter_mut() {
            if sample.unsigned_abs() < self.floor as u16 {
                *sample = 0;
            }
        }
    }
}

/// Pass-through filter used when noise suppression is disabled.
#[derive(Debug, Clone, Default)]
pub struct NoFilter;

impl NoiseFilter for NoFilter {
    fn process(&mut self, _samples: &mut [i16]) {}
}

/// RMS energy threshold detector.
#[derive(Debug, Clone)]
pub struct EnergyVad {
    threshold: f32,
}

impl EnergyVad {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }
}

/// Root-mean-square level normalized to `0.0..=1.0`.
pub fn rms_level(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples
        .iter()
        .map(|s| {
            let v = f64::from(*s) / 32768.0;
            v * v
        })
        .sum();
    (sum / samples.len() as f64).sqrt() as f32
}

impl VoiceActivityDetector for EnergyVad {
    fn is_speech(&mut self, samples: &[i16]) -> Result<bool, PipelineError> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(PipelineError::Detection(format!(
                "invalid VAD threshold: {}",
                self.threshold
            )));
        }
        Ok(!samples.is_empty() && rms_level(samples) >= self.threshold)
    }
}

/// Starts a turn after a run of speech, ends it after a run of silence.
#[derive(Debug, Clone)]
pub struct SilenceTurnDetector {
    min_speech: Duration,
    end_silence: Duration,
    speech_run: Duration,
    silence_run: Duration,
    in_turn: bool,
}

impl SilenceTurnDetector {
    pub fn new(min_speech: Duration, end_silence: Duration) -> Self {
        Self {
            min_speech,
            end_silence,
            speech_run: Duration::ZERO,
            silence_run: Duration::ZERO,
            in_turn: false,
        }
    }
}

impl TurnDetector for SilenceTurnDetector {
    fn observe(&mut self, speech: bool, frame: Duration) -> Option<TurnBoundary> {
        if speech {
            self.silence_run = Duration::ZERO;
            self.speech_run += frame;
            if !self.in_turn && self.speech_run >= self.min_speech {
                self.in_turn = true;
                return Some(TurnBoundary::Started);
            }
            return None;
        }

        if !self.in_turn {
            self.speech_run = Duration::ZERO;
            return None;
        }

        self.silence_run += frame;
        if self.silence_run >= self.end_silence {
            self.in_turn = false;
            self.speech_run = Duration::ZERO;
            self.silence_run = Duration::ZERO;
            return Some(TurnBoundary::Ended);
        }
        None
    }

    fn in_turn(&self) -> bool {
        self.in_turn
    }
}

/// What a frame did to the user's turn, with the audio to keep.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorOutput {
    /// Nothing changed.
    Continue,
    /// The user started talking.
    TurnStarted,
    /// The user finished; carries the captured utterance.
    TurnEnded(AudioBuffer),
}

/// The detector chain attached to one session.
pub struct Detectors {
    noise: Box<dyn NoiseFilter>,
    vad: Box<dyn VoiceActivityDetector>,
    turns: Box<dyn TurnDetector>,
    /// Speech heard before the turn officially started.
    pending: AudioBuffer,
    utterance: AudioBuffer,
}

impl Detectors {
    pub fn new(
        noise: Box<dyn NoiseFilter>,
        vad: Box<dyn VoiceActivityDetector>,
        turns: Box<dyn TurnDetector>,
    ) -> Self {
        Self {
            noise,
            vad,
            turns,
            pending: AudioBuffer::default(),
            utterance: AudioBuffer::default(),
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        let noise: Box<dyn NoiseFilter> = if config.noise_suppression {
            Box::new(NoiseGate::new(config.noise_floor))
        } else {
            Box::new(NoFilter)
        };
        Self::new(
            noise,
            Box::new(EnergyVad::new(config.vad_threshold)),
            Box::new(SilenceTurnDetector::new(
                config.min_speech(),
                config.end_of_turn_silence(),
            )),
        )
    }

    /// Runs one inbound frame through the chain.
    pub fn push_frame(&mut self, mut frame: AudioBuffer) -> Result<DetectorOutput, PipelineError> {
        self.noise.process(&mut frame.samples);
        let speech = self.vad.is_speech(&frame.samples)?;
        let boundary = self.turns.observe(speech, frame.duration());

        match boundary {
            Some(TurnBoundary::Started) => {
                self.utterance = std::mem::take(&mut self.pending);
                self.utterance.extend(&frame);
                Ok(DetectorOutput::TurnStarted)
            }
            Some(TurnBoundary::Ended) => {
                self.utterance.extend(&frame);
                Ok(DetectorOutput::TurnEnded(std::mem::take(&mut self.utterance)))
            }
            None => {
                if self.turns.in_turn() {
                    self.utterance.extend(&frame);
                } else if speech {
                    self.pending.extend(&frame);
                } else {
                    self.pending.clear();
                }
                Ok(DetectorOutput::Continue)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16_000;
    const FRAME_SAMPLES: usize = 320; // 20 ms

    fn tone(amplitude: i16) -> AudioBuffer {
        AudioBuffer::from_samples(vec![amplitude; FRAME_SAMPLES], RATE)
    }

    fn config() -> DetectorConfig {
        DetectorConfig {
            min_speech_ms: 60,
            end_of_turn_silence_ms: 100,
            ..DetectorConfig::default()
        }
    }

    #[test]
    fn noise_gate_silences_quiet_samples() {
        let mut gate = NoiseGate::new(100);
        let mut samples = vec![50, -50, 150, -150, 99];
        gate.process(&mut samples);
        assert_eq!(samples, vec![0, 0, 150, -150, 0]);
    }

    #[test]
    fn energy_vad_thresholds() {
        let mut vad = EnergyVad::new(0.05);
        assert!(!vad.is_speech(&[0; 320]).unwrap());
        assert!(!vad.is_speech(&[]).unwrap());
        assert!(vad.is_speech(&[8000; 320]).unwrap());
    }

    #[test]
    fn energy_vad_rejects_bad_threshold() {
        let mut vad = EnergyVad::new(f32::NAN);
        assert!(matches!(
            vad.is_speech(&[0; 10]),
            Err(PipelineError::Detection(_))
        ));
    }

    #[test]
    fn short_blip_does_not_start_turn() {
        let mut turns = SilenceTurnDetector::new(Duration::from_millis(60), Duration::from_millis(100));
        assert_eq!(turns.observe(true, Duration::from_millis(20)), None);
        assert_eq!(turns.observe(false, Duration::from_millis(20)), None);
        assert_eq!(turns.observe(true, Duration::from_millis(20)), None);
        assert!(!turns.in_turn());
    }

    #[test]
    fn turn_starts_and_ends() {
        let mut turns = SilenceTurnDetector::new(Duration::from_millis(60), Duration::from_millis(100));
        let frame = Duration::from_millis(20);
        assert_eq!(turns.observe(true, frame), None);
        assert_eq!(turns.observe(true, frame), None);
        assert_eq!(turns.observe(true, frame), Some(TurnBoundary::Started));
        for _ in 0..4 {
            assert_eq!(turns.observe(false, frame), None);
        }
        assert_eq!(turns.observe(false, frame), Some(TurnBoundary::Ended));
        assert!(!turns.in_turn());
    }

    #[test]
    fn speech_resets_silence_run() {
        let mut turns = SilenceTurnDetector::new(Duration::from_millis(20), Duration::from_millis(60));
        let frame = Duration::from_millis(20);
        assert_eq!(turns.observe(true, frame), Some(TurnBoundary::Started));
        assert_eq!(turns.observe(false, frame), None);
        assert_eq!(turns.observe(false, frame), None);
        assert_eq!(turns.observe(true, frame), None);
        assert_eq!(turns.observe(false, frame), None);
        assert_eq!(turns.observe(false, frame), None);
        assert_eq!(turns.observe(false, frame), Some(TurnBoundary::Ended));
    }

    #[test]
    fn chain_captures_whole_utterance_including_preroll() {
        let mut detectors = Detectors::from_config(&config());

        assert_eq!(detectors.push_frame(tone(0)).unwrap(), DetectorOutput::Continue);
        assert_eq!(detectors.push_frame(tone(8000)).unwrap(), DetectorOutput::Continue);
        assert_eq!(detectors.push_frame(tone(8000)).unwrap(), DetectorOutput::Continue);
        assert_eq!(detectors.push_frame(tone(8000)).unwrap(), DetectorOutput::TurnStarted);
        assert_eq!(detectors.push_frame(tone(8000)).unwrap(), DetectorOutput::Continue);

        let mut ended = None;
        for _ in 0..5 {
            if let DetectorOutput::TurnEnded(utterance) = detectors.push_frame(tone(0)).unwrap() {
                ended = Some(utterance);
            }
        }

        let utterance = ended.expect("turn should end after 100 ms of silence");
        // 4 speech frames plus 5 trailing silence frames.
        assert_eq!(utterance.len(), 9 * FRAME_SAMPLES);
        assert_eq!(utterance.samples[0], 8000);
    }

    #[test]
    fn noise_below_floor_is_not_speech() {
        let mut detectors = Detectors::from_config(&DetectorConfig {
            noise_floor: 2000,
            vad_threshold: 0.01,
            ..config()
        });
        for _ in 0..10 {
            assert_eq!(detectors.push_frame(tone(1500)).unwrap(), DetectorOutput::Continue);
        }
    }
}
