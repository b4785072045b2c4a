use std::io::{self, BufRead, IsTerminal};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tokio::sync::oneshot;

use flare_core::capability::Capability;
use flare_core::transcription::{
    self, EventSink, SessionConfig, SharedTranscript, SpeechEngine, TranscriptionCallbacks,
    TranscriptionError,
};

/// Dictation from the terminal: each line typed is one final phrase, and an
/// empty line or end of input finishes the session.
#[derive(Default)]
pub(crate) struct StdinDictation {
    halted: Arc<AtomicBool>,
}

impl SpeechEngine for StdinDictation {
    fn begin(&mut self, config: &SessionConfig, sink: EventSink) -> Result<()> {
        tracing::debug!(
            locale = config.locale,
            continuous = config.continuous,
            "starting terminal dictation"
        );
        let halted = Arc::clone(&self.halted);
        std::thread::Builder::new()
            .name("dictation".to_string())
            .spawn(move || read_phrases(io::stdin().lock(), &sink, &halted))
            .context("Failed to start dictation")?;
        Ok(())
    }

    fn halt(&mut self) {
        self.halted.store(true, Ordering::Relaxed);
    }
}

fn read_phrases(input: impl BufRead, sink: &EventSink, halted: &AtomicBool) {
    for line in input.lines() {
        if halted.load(Ordering::Relaxed) {
            break;
        }
        match line {
            Ok(line) if line.trim().is_empty() => break,
            Ok(line) => sink.result(&line, true),
            Err(e) => {
                sink.error(&TranscriptionError::Other(e.to_string()));
                return;
            }
        }
    }
    sink.end();
}

/// Terminal dictation is offered only when a person is at the keyboard.
pub(crate) fn stdin_capability() -> Capability<Box<dyn SpeechEngine>> {
    if io::stdin().is_terminal() {
        Capability::Supported(Box::new(StdinDictation::default()))
    } else {
        tracing::debug!("stdin is not a terminal; dictation unavailable");
        Capability::Unsupported
    }
}

struct CliCallbacks {
    transcript: SharedTranscript,
    done: Option<oneshot::Sender<()>>,
}

impl TranscriptionCallbacks for CliCallbacks {
    fn on_result(&mut self, text: &str, is_final: bool) {
        self.transcript.on_result(text, is_final);
        if is_final {
            eprintln!("  heard: {}", text.trim());
        }
    }

    fn on_error(&mut self, message: &str) {
        self.transcript.on_error(message);
        eprintln!("{message}");
    }

    fn on_end(&mut self) {
        self.transcript.on_end();
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

/// Run one dictation session on an available engine and return whatever
/// text was captured.
pub(crate) async fn dictate(engine: Box<dyn SpeechEngine>) -> Result<String> {
    let transcript = SharedTranscript::new();
    let (tx, rx) = oneshot::channel();
    let callbacks = CliCallbacks {
        transcript: transcript.clone(),
        done: Some(tx),
    };

    let mut handle = transcription::start(Capability::Supported(engine), Box::new(callbacks))?;
    eprintln!(
        "Listening. Describe the meal one phrase per line; press Enter on an empty line to finish."
    );
    // The sender is dropped without sending only if the session is torn down.
    let _ = rx.await;
    handle.stop();

    Ok(transcript.snapshot().text())
}
