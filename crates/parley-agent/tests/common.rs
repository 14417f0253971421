#![allow(dead_code)]

use async_trait::async_trait;
use parley_agent::{
    AudioBuffer, ChannelRoom, CompletionEngine, ConversationContext, Pipeline, PipelineError,
    RoomEvent, RoomHandle, RoomOutput, RoomRemote, Synthesizer, Transcriber, TransportError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const WAIT: Duration = Duration::from_secs(5);

/// Ordered record of provider and room calls, shared by every fake.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|e| e.starts_with(prefix)).count()
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.entries().iter().position(|e| e.starts_with(prefix))
    }

    pub async fn wait_for(&self, prefix: &str, count: usize) {
        tokio::time::timeout(WAIT, async {
            while self.count(prefix) < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {count} x {prefix}: {:?}", self.entries()));
    }
}

pub struct FakeTranscriber {
    pub log: CallLog,
    pub transcript: String,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio: &AudioBuffer) -> Result<String, PipelineError> {
        self.log.push(format!("transcribe:{}", audio.len()));
        Ok(self.transcript.clone())
    }
}

pub struct FakeCompletion {
    pub log: CallLog,
    pub calls: AtomicUsize,
    /// Calls after this many fail.
    pub fail_after: Option<usize>,
}

#[async_trait]
impl CompletionEngine for FakeCompletion {
    async fn complete(&self, context: &ConversationContext) -> Result<String, PipelineError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.push(format!("complete:{}", context.messages().len()));
        if self.fail_after.is_some_and(|n| call >= n) {
            return Err(PipelineError::Completion("model unavailable".to_string()));
        }
        if call == 0 {
            Ok("Hello! Tap to speak.".to_string())
        } else {
            Ok(format!("reply {}", call))
        }
    }
}

pub struct FakeSynthesizer {
    pub log: CallLog,
    pub calls: AtomicUsize,
    /// Calls after this many never return.
    pub block_after: Option<usize>,
    pub samples: usize,
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<AudioBuffer, PipelineError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.push(format!("synthesize:{}", text));
        if self.block_after.is_some_and(|n| call >= n) {
            std::future::pending::<()>().await;
        }
        Ok(AudioBuffer::from_samples(vec![7; self.samples], 16_000))
    }
}

#[derive(Default)]
pub struct FakeOptions {
    pub transcript: Option<String>,
    pub completion_fail_after: Option<usize>,
    pub synthesis_block_after: Option<usize>,
    /// Length of every synthesized clip. Defaults to 10 ms.
    pub synthesis_samples: Option<usize>,
}

pub fn fake_pipeline(log: &CallLog, options: FakeOptions) -> Pipeline {
    Pipeline::new(
        Arc::new(FakeTranscriber {
            log: log.clone(),
            transcript: options
                .transcript
                .unwrap_or_else(|| "what's the weather".to_string()),
        }),
        Arc::new(FakeCompletion {
            log: log.clone(),
            calls: AtomicUsize::new(0),
            fail_after: options.completion_fail_after,
        }),
        Arc::new(FakeSynthesizer {
            log: log.clone(),
            calls: AtomicUsize::new(0),
            block_after: options.synthesis_block_after,
            samples: options.synthesis_samples.unwrap_or(160),
        }),
    )
}

/// Wraps a room so its calls land in the same log as the providers.
pub struct LoggingRoom {
    pub inner: Arc<ChannelRoom>,
    pub log: CallLog,
    pub fail_connect: bool,
}

#[async_trait]
impl RoomHandle for LoggingRoom {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn attach(&self, persona: &str) -> Result<(), TransportError> {
        self.log.push(format!("attach:{}", persona));
        self.inner.attach(persona).await
    }

    async fn connect(&self) -> Result<(), TransportError> {
        self.log.push("connect");
        if self.fail_connect {
            return Err(TransportError::Connect("signal server unreachable".to_string()));
        }
        self.inner.connect().await
    }

    async fn next_event(&self) -> Option<RoomEvent> {
        self.inner.next_event().await
    }

    async fn publish_audio(&self, audio: AudioBuffer) -> Result<(), TransportError> {
        self.log.push("publish");
        self.inner.publish_audio(audio).await
    }

    async fn clear_audio(&self) -> Result<(), TransportError> {
        self.log.push("clear");
        self.inner.clear_audio().await
    }

    async fn disconnect(&self) {
        self.log.push("disconnect");
        self.inner.disconnect().await
    }
}

pub fn logging_room(name: &str, log: &CallLog) -> (Arc<dyn RoomHandle>, RoomRemote) {
    let (inner, remote) = ChannelRoom::pair(name);
    let room: Arc<dyn RoomHandle> = Arc::new(LoggingRoom {
        inner,
        log: log.clone(),
        fail_connect: false,
    });
    (room, remote)
}

pub async fn next_output(remote: &mut RoomRemote) -> RoomOutput {
    tokio::time::timeout(WAIT, remote.next_output())
        .await
        .expect("timed out waiting for room output")
        .expect("room output channel closed")
}

/// Drains attach, connect, and the greeting audio.
pub async fn expect_greeting(remote: &mut RoomRemote) {
    assert!(matches!(next_output(remote).await, RoomOutput::Attached { .. }));
    assert_eq!(next_output(remote).await, RoomOutput::Connected);
    assert!(matches!(next_output(remote).await, RoomOutput::Audio(_)));
}

/// 20 ms of constant-amplitude audio.
pub fn frame(amplitude: i16) -> AudioBuffer {
    AudioBuffer::from_samples(vec![amplitude; 320], 16_000)
}

pub fn signal(kind: &str) -> Vec<u8> {
    format!(r#"{{"type":"{}"}}"#, kind).into_bytes()
}
