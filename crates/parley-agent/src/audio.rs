//! PCM audio buffers and WAV conversion.

use std::io::Cursor;
use std::time::Duration;

/// Sample rate used for captured room audio unless a frame says otherwise.
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Mono signed 16-bit PCM audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBuffer {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self::empty(DEFAULT_SAMPLE_RATE)
    }
}

impl AudioBuffer {
    pub fn empty(sample_rate: u32) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate,
        }
    }

    pub fn from_samples(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Appends another buffer. The first non-empty append fixes the sample
    /// rate; frames are assumed to share it afterwards.
    pub fn extend(&mut self, frame: &AudioBuffer) {
        if self.samples.is_empty() {
            self.sample_rate = frame.sample_rate;
        }
        self.samples.extend_from_slice(&frame.samples);
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }

    /// Reads raw little-endian PCM16. Returns `None` for an odd byte count.
    pub fn from_pcm16_le(bytes: &[u8], sample_rate: u32) -> Option<Self> {
        if bytes.len() % 2 != 0 {
            return None;
        }
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Some(Self::from_samples(samples, sample_rate))
    }

    pub fn to_pcm16_le(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    /// Encodes the buffer as a mono 16-bit WAV file.
    pub fn to_wav(&self) -> Result<Vec<u8>, hound::Error> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::with_capacity(44 + self.samples.len() * 2));
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
            for sample in &self.samples {
                writer.write_sample(*sample)?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }

    /// Decodes a 16-bit integer WAV file, mixing multi-channel audio down to
    /// mono.
    pub fn from_wav(bytes: &[u8]) -> Result<Self, hound::Error> {
        let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(hound::Error::Unsupported);
        }

        let interleaved = reader.samples::<i16>().collect::<Result<Vec<_>, _>>()?;
        let channels = usize::from(spec.channels.max(1));
        let samples = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks(channels)
                .map(|frame| {
                    let sum: i32 = frame.iter().map(|s| i32::from(*s)).sum();
                    (sum / frame.len() as i32) as i16
                })
                .collect()
        };

        Ok(Self::from_samples(samples, spec.sample_rate))
    }
}
