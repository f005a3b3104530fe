//! Capture session: one note's recorder, dictation, and staged media.
//!
//! Enforces the submit ordering rules: a save may only begin after the
//! recording is fully stopped and the dictation session has settled, and a
//! second save cannot start while one is in flight.

use std::sync::Arc;

use murmur_core::{format_mm_ss, Error, Result};

use crate::recorder::{AudioInput, Recorder};
use crate::stager::{MediaSnapshot, MediaStager};
use crate::transcriber::{SpeechEngine, Transcriber};

/// Everything the note service needs to persist one capture.
#[derive(Debug, Clone)]
pub struct CaptureResult {
    /// Finalized transcript (may be empty if dictation produced none).
    pub transcript: String,
    /// Captured audio, empty when nothing was recorded.
    pub audio: Vec<u8>,
    /// Recording length as `mm:ss`.
    pub duration: String,
}

/// Owns the Recorder, Transcriber, and MediaStager for one note being
/// created or edited. No two sessions may share these.
pub struct CaptureSession {
    recorder: Recorder,
    transcriber: Transcriber,
    stager: MediaStager,
    save_pending: bool,
}

impl CaptureSession {
    pub fn new(input: impl AudioInput + 'static, engine: Arc<dyn SpeechEngine>) -> Self {
        Self {
            recorder: Recorder::new(input),
            transcriber: Transcriber::new(engine),
            stager: MediaStager::new(),
            save_pending: false,
        }
    }

    pub fn recorder(&mut self) -> &mut Recorder {
        &mut self.recorder
    }

    pub fn transcriber(&mut self) -> &mut Transcriber {
        &mut self.transcriber
    }

    pub fn stager(&mut self) -> &mut MediaStager {
        &mut self.stager
    }

    /// Start recording and dictation together.
    ///
    /// A dictation failure here is soft: recording proceeds and the note can
    /// still be typed or transcribed server-side. The error is returned so
    /// the caller can surface it.
    pub fn start_capture(&mut self) -> Result<Option<Error>> {
        self.recorder.start()?;
        match self.transcriber.begin() {
            Ok(()) => Ok(None),
            Err(e) => Ok(Some(e)),
        }
    }

    /// Stop recording, settle dictation, and stage the captured audio.
    ///
    /// Both halves are stopped together and awaited before this returns, so
    /// a subsequent save can never observe a still-growing transcript. A
    /// mid-session engine error is returned after the transcript has
    /// settled; finalized text is kept either way.
    pub async fn finish_capture(&mut self) -> Result<CaptureResult> {
        let audio = self.recorder.stop();
        let duration = format_mm_ss(self.recorder.elapsed_secs());

        self.transcriber.end();
        let settle_result = self.transcriber.settle().await;
        let transcript = self.transcriber.transcript().to_string();

        if !audio.is_empty() {
            self.stager.attach_audio(audio.clone(), duration.clone());
        }

        match settle_result {
            Ok(_) => Ok(CaptureResult {
                transcript,
                audio,
                duration,
            }),
            Err(e) => Err(e),
        }
    }

    /// Begin a save. Fails while another save of this session is in flight;
    /// the submit action stays disabled until the first save resolves.
    pub fn begin_save(&mut self) -> Result<MediaSnapshot> {
        if self.save_pending {
            return Err(Error::Validation("a save is already in progress".into()));
        }
        if self.recorder.is_recording() || self.transcriber.is_active() {
            return Err(Error::Validation(
                "capture must be stopped before saving".into(),
            ));
        }
        self.save_pending = true;
        Ok(self.stager.snapshot())
    }

    /// Mark the in-flight save successful and reset the session.
    pub fn complete_save(&mut self) {
        self.save_pending = false;
        self.stager.clear();
        self.recorder.reset();
    }

    /// Mark the in-flight save failed; staged media is kept so the caller
    /// can re-issue the same request.
    pub fn abort_save(&mut self) {
        self.save_pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::StubMicrophone;
    use crate::transcriber::{ScriptedSpeechEngine, SpeechFragment};

    fn session_with(script: Vec<Result<SpeechFragment>>) -> CaptureSession {
        CaptureSession::new(
            StubMicrophone::granted(),
            Arc::new(ScriptedSpeechEngine::new(script)),
        )
    }

    #[tokio::test]
    async fn test_capture_produces_transcript_and_audio() {
        let mut session = session_with(vec![
            Ok(SpeechFragment::interim("remem")),
            Ok(SpeechFragment::final_text("remember the milk")),
        ]);

        session.start_capture().unwrap();
        session.recorder().push_chunk(b"pcm");
        session.recorder().tick();
        session.recorder().tick();

        let result = session.finish_capture().await.unwrap();
        assert_eq!(result.transcript, "remember the milk");
        assert_eq!(result.audio, b"pcm");
        assert_eq!(result.duration, "00:02");
    }

    #[tokio::test]
    async fn test_save_guard_rejects_overlapping_saves() {
        let mut session = session_with(vec![]);
        session.start_capture().unwrap();
        session.finish_capture().await.unwrap();

        let _snapshot = session.begin_save().unwrap();
        let err = session.begin_save().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        session.complete_save();
        assert!(session.begin_save().is_ok());
    }

    #[tokio::test]
    async fn test_abort_save_keeps_staged_media() {
        let mut session = session_with(vec![]);
        session
            .stager()
            .add_images(vec![("x.png".to_string(), vec![9])]);

        let snap = session.begin_save().unwrap();
        assert_eq!(snap.new_images.len(), 1);

        session.abort_save();
        // The retry sees the same staged media.
        let snap = session.begin_save().unwrap();
        assert_eq!(snap.new_images.len(), 1);
    }

    #[tokio::test]
    async fn test_save_rejected_while_recording() {
        let mut session = session_with(vec![]);
        session.start_capture().unwrap();
        let err = session.begin_save().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_engine_failure_keeps_partial_transcript() {
        let mut session = session_with(vec![
            Ok(SpeechFragment::final_text("kept text")),
            Err(Error::Transcription("engine died".into())),
        ]);
        session.start_capture().unwrap();
        session.recorder().push_chunk(b"a");

        let err = session.finish_capture().await.unwrap_err();
        assert!(matches!(err, Error::Transcription(_)));
        // The caller may still save a note with the partial transcript.
        assert_eq!(session.transcriber().transcript(), "kept text");
        let snap = session.begin_save().unwrap();
        assert!(snap.audio.is_some());
    }

    #[tokio::test]
    async fn test_dictation_unsupported_is_soft() {
        let mut session = CaptureSession::new(
            StubMicrophone::granted(),
            Arc::new(ScriptedSpeechEngine::unsupported()),
        );
        let warning = session.start_capture().unwrap();
        assert!(warning.is_some());
        // Recording still runs.
        session.recorder().push_chunk(b"pcm");
        let result = session.finish_capture().await.unwrap();
        assert_eq!(result.transcript, "");
        assert_eq!(result.audio, b"pcm");
    }
}
