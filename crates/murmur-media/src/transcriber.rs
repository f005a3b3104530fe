//! Dictation and speech-to-text backends.
//!
//! The [`Transcriber`] drives a live dictation session concurrently with
//! recording and appends only *finalized* utterances — interim fragments the
//! engine may still revise never reach the transcript. Engine failures are
//! soft: finalized text survives, the caller decides whether to keep it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use murmur_core::{Error, Result};

/// One fragment of recognized speech.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechFragment {
    pub text: String,
    /// Finalized fragments are committed; interim ones may still change.
    pub is_final: bool,
}

impl SpeechFragment {
    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }

    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }
}

/// A live recognition session bound 1:1 to one recording session.
#[async_trait]
pub trait SpeechSession: Send {
    /// Await the next fragment. `Ok(None)` means the session has settled and
    /// no further fragments will arrive.
    async fn next_fragment(&mut self) -> Result<Option<SpeechFragment>>;

    /// Ask the engine to stop listening. Fragments already recognized may
    /// still be delivered before the session settles.
    fn request_stop(&mut self);
}

/// Speech-to-text engine boundary. External, fallible, and potentially
/// unavailable on some platforms.
pub trait SpeechEngine: Send + Sync {
    /// Open a live dictation session. Fails with `Transcription` when the
    /// engine is unsupported here.
    fn open_session(&self) -> Result<Box<dyn SpeechSession>>;
}

// =============================================================================
// TRANSCRIBER
// =============================================================================

/// Accumulates finalized dictation text for one capture session.
pub struct Transcriber {
    engine: Arc<dyn SpeechEngine>,
    session: Option<Box<dyn SpeechSession>>,
    transcript: String,
}

impl Transcriber {
    pub fn new(engine: Arc<dyn SpeechEngine>) -> Self {
        Self {
            engine,
            session: None,
            transcript: String::new(),
        }
    }

    /// Start a dictation session, clearing any previous transcript.
    pub fn begin(&mut self) -> Result<()> {
        self.session = Some(self.engine.open_session()?);
        self.transcript.clear();
        Ok(())
    }

    /// True while a session is open and not yet settled.
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Finalized transcript accumulated so far. Survives engine failures.
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Await one fragment from the engine and fold it in.
    ///
    /// Returns `Ok(true)` while the session is live, `Ok(false)` once it has
    /// settled. An engine error closes the session and propagates, leaving
    /// already-finalized text intact.
    pub async fn pump(&mut self) -> Result<bool> {
        let Some(session) = self.session.as_mut() else {
            return Ok(false);
        };
        match session.next_fragment().await {
            Ok(Some(fragment)) => {
                if fragment.is_final {
                    if !self.transcript.is_empty() {
                        self.transcript.push(' ');
                    }
                    self.transcript.push_str(fragment.text.trim());
                }
                Ok(true)
            }
            Ok(None) => {
                self.session = None;
                Ok(false)
            }
            Err(e) => {
                warn!(error = %e, "dictation session failed; keeping finalized text");
                self.session = None;
                Err(Error::Transcription(e.to_string()))
            }
        }
    }

    /// Ask the engine to stop. The session settles once remaining finalized
    /// fragments have been drained via [`Transcriber::settle`].
    pub fn end(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.request_stop();
        }
    }

    /// Drain the session to completion and return the finalized transcript.
    ///
    /// Submit paths await this so a save can never race a still-appending
    /// transcript.
    pub async fn settle(&mut self) -> Result<String> {
        while self.pump().await? {}
        Ok(self.transcript.clone())
    }
}

// =============================================================================
// SCRIPTED ENGINE (deterministic test double)
// =============================================================================

type ScriptStep = Result<SpeechFragment>;

/// Scripted speech engine for deterministic tests.
///
/// Sessions replay a fixed sequence of fragments (or a mid-stream error),
/// then settle. The script models audio that was already recognized, so
/// `request_stop` does not discard it: remaining fragments are still
/// delivered before the session settles, as the trait contract allows.
pub struct ScriptedSpeechEngine {
    script: Arc<Mutex<VecDeque<ScriptStep>>>,
    supported: bool,
}

impl ScriptedSpeechEngine {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            script: Arc::new(Mutex::new(steps.into_iter().collect())),
            supported: true,
        }
    }

    /// An engine whose `open_session` always fails (unsupported platform).
    pub fn unsupported() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            supported: false,
        }
    }
}

impl SpeechEngine for ScriptedSpeechEngine {
    fn open_session(&self) -> Result<Box<dyn SpeechSession>> {
        if !self.supported {
            return Err(Error::Transcription(
                "speech recognition is not supported here".into(),
            ));
        }
        Ok(Box::new(ScriptedSession {
            script: Arc::clone(&self.script),
        }))
    }
}

struct ScriptedSession {
    script: Arc<Mutex<VecDeque<ScriptStep>>>,
}

#[async_trait]
impl SpeechSession for ScriptedSession {
    async fn next_fragment(&mut self) -> Result<Option<SpeechFragment>> {
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(fragment)) => Ok(Some(fragment)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    fn request_stop(&mut self) {}
}

// =============================================================================
// HTTP BATCH BACKEND
// =============================================================================

/// Whisper-compatible HTTP transcription backend.
///
/// Used server-side to transcribe an uploaded recording in one shot when the
/// client had no live dictation available.
pub struct HttpSpeechEngine {
    base_url: String,
    model: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl HttpSpeechEngine {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            client: reqwest::Client::new(),
            timeout_secs: 300, // 5 min for long audio
        }
    }

    /// Create from environment variables.
    /// Returns None if the base url is not set.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var(murmur_core::defaults::ENV_SPEECH_BASE_URL).ok()?;
        if base_url.is_empty() {
            return None;
        }
        let model = std::env::var(murmur_core::defaults::ENV_SPEECH_MODEL)
            .unwrap_or_else(|_| murmur_core::defaults::DEFAULT_SPEECH_MODEL.to_string());
        Some(Self::new(base_url, model))
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Transcribe a complete recording; returns the full text.
    pub async fn transcribe(&self, audio_data: &[u8], mime_type: &str) -> Result<String> {
        let url = format!("{}/v1/audio/transcriptions", self.base_url);

        let ext = match mime_type {
            "audio/mpeg" | "audio/mp3" => "mp3",
            "audio/ogg" => "ogg",
            "audio/webm" => "webm",
            _ => "wav",
        };

        let file_part = reqwest::multipart::Part::bytes(audio_data.to_vec())
            .file_name(format!("audio.{}", ext))
            .mime_str(mime_type)
            .map_err(|e| Error::Transcription(format!("failed to build multipart: {}", e)))?;

        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "json");

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .send()
            .await
            .map_err(|e| Error::Transcription(format!("transcription request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transcription(format!(
                "speech backend returned {}: {}",
                status, body
            )));
        }

        let result: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| Error::Transcription(format!("failed to parse response: {}", e)))?;

        debug!(
            model = %self.model,
            size_bytes = audio_data.len(),
            chars = result.text.len(),
            "transcription complete"
        );
        Ok(result.text)
    }
}
