//! Speech-to-text sessions.
//!
//! A [`SpeechEngine`] produces raw events from some platform capability. The
//! session layer in this module sits between the engine and the caller's
//! [`TranscriptionCallbacks`] and enforces the delivery rules:
//!
//! - `on_end` fires exactly once per session, however the session stops;
//! - an error is reported through `on_error` and then ends the session;
//! - events that arrive after the end are dropped.
//!
//! [`Transcript`] is the usual callback target: finals accumulate, interims
//! replace each other.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use thiserror::Error;

use crate::capability::Capability;
use crate::error::JournalError;

/// Every session listens in this locale.
pub const SESSION_LOCALE: &str = "en-US";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub locale: &'static str,
    /// Keep listening across pauses instead of stopping after one phrase.
    pub continuous: bool,
    pub interim_results: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            locale: SESSION_LOCALE,
            continuous: true,
            interim_results: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptionError {
    #[error("Microphone access was denied. Allow microphone access and try again.")]
    PermissionDenied,
    #[error("No speech was detected. Please try again.")]
    NoSpeech,
    #[error("Network error while transcribing. Check your connection and try again.")]
    Network,
    #[error("Voice input was stopped.")]
    Aborted,
    #[error("Voice input failed: {0}")]
    Other(String),
}

impl TranscriptionError {
    /// Map an engine error code onto the fixed set of causes.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "not-allowed" | "service-not-allowed" => Self::PermissionDenied,
            "no-speech" => Self::NoSpeech,
            "network" => Self::Network,
            "aborted" => Self::Aborted,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Receives the events of one session.
///
/// Implementations must not call back into the session from inside a
/// callback.
pub trait TranscriptionCallbacks: Send {
    /// `is_final == false` results are provisional and are superseded by
    /// the next result.
    fn on_result(&mut self, text: &str, is_final: bool);
    fn on_error(&mut self, message: &str);
    fn on_end(&mut self);
}

/// Platform speech recognizer.
pub trait SpeechEngine: Send {
    /// Start listening and push events into `sink` until halted or done.
    fn begin(&mut self, config: &SessionConfig, sink: EventSink) -> Result<()>;

    /// Stop listening. May be called after the engine has already finished.
    fn halt(&mut self);
}

struct SessionState {
    /// `None` once the session has ended.
    callbacks: Option<Box<dyn TranscriptionCallbacks>>,
}

/// Handle the engine uses to deliver events. Cheap to clone.
#[derive(Clone)]
pub struct EventSink {
    state: Arc<Mutex<SessionState>>,
}

impl EventSink {
    fn new(callbacks: Box<dyn TranscriptionCallbacks>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState {
                callbacks: Some(callbacks),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn result(&self, text: &str, is_final: bool) {
        let mut state = self.lock();
        match state.callbacks.as_mut() {
            Some(callbacks) => callbacks.on_result(text, is_final),
            None => tracing::trace!("dropping transcription result after session end"),
        }
    }

    /// Report `err` and end the session.
    pub fn error(&self, err: &TranscriptionError) {
        let callbacks = self.lock().callbacks.take();
        match callbacks {
            Some(mut callbacks) => {
                tracing::debug!(error = %err, "transcription error");
                callbacks.on_error(&err.to_string());
                callbacks.on_end();
            }
            None => tracing::trace!(error = %err, "dropping transcription error after session end"),
        }
    }

    pub fn end(&self) {
        let callbacks = self.lock().callbacks.take();
        if let Some(mut callbacks) = callbacks {
            callbacks.on_end();
        }
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.lock().callbacks.is_none()
    }
}

/// Start a transcription session.
///
/// Fails without touching `callbacks` when the capability is unsupported or
/// the engine refuses to start.
pub fn start(
    engine: Capability<Box<dyn SpeechEngine>>,
    callbacks: Box<dyn TranscriptionCallbacks>,
) -> Result<SessionHandle> {
    let Capability::Supported(mut engine) = engine else {
        return Err(JournalError::DictationUnavailable.into());
    };
    let config = SessionConfig::default();
    let sink = EventSink::new(callbacks);
    engine.begin(&config, sink.clone())?;
    tracing::debug!(locale = config.locale, "transcription session started");
    Ok(SessionHandle {
        engine,
        sink,
        halted: false,
    })
}

/// Owner of a running session. Dropping it stops the session.
pub struct SessionHandle {
    engine: Box<dyn SpeechEngine>,
    sink: EventSink,
    halted: bool,
}

impl SessionHandle {
    /// Stop listening and end the session. Safe to call any number of
    /// times, including after the session ended on its own.
    pub fn stop(&mut self) {
        if !self.halted {
            self.halted = true;
            self.engine.halt();
        }
        self.sink.end();
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.sink.is_ended()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Accumulated dictation text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    finalized: String,
    interim: String,
    error: Option<String>,
    ended: bool,
}

impl Transcript {
    pub fn push(&mut self, text: &str, is_final: bool) {
        if is_final {
            let text = text.trim();
            if !text.is_empty() {
                if !self.finalized.is_empty() {
                    self.finalized.push(' ');
                }
                self.finalized.push_str(text);
            }
            self.interim.clear();
        } else {
            self.interim = text.trim().to_string();
        }
    }

    /// Final text followed by the current interim guess.
    #[must_use]
    pub fn text(&self) -> String {
        match (self.finalized.is_empty(), self.interim.is_empty()) {
            (_, true) => self.finalized.clone(),
            (true, false) => self.interim.clone(),
            (false, false) => format!("{} {}", self.finalized, self.interim),
        }
    }

    #[must_use]
    pub fn final_text(&self) -> &str {
        &self.finalized
    }

    #[must_use]
    pub fn interim_text(&self) -> &str {
        &self.interim
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub fn has_ended(&self) -> bool {
        self.ended
    }
}

/// A [`Transcript`] that can be handed to a session while the caller keeps
/// reading it.
#[derive(Debug, Clone, Default)]
pub struct SharedTranscript(Arc<Mutex<Transcript>>);

impl SharedTranscript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn snapshot(&self) -> Transcript {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Transcript) -> R) -> R {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl TranscriptionCallbacks for SharedTranscript {
    fn on_result(&mut self, text: &str, is_final: bool) {
        self.with(|t| t.push(text, is_final));
    }

    fn on_error(&mut self, message: &str) {
        self.with(|t| t.error = Some(message.to_string()));
    }

    fn on_end(&mut self) {
        self.with(|t| t.ended = true);
    }
}
