//! Text-to-speech playback.
//!
//! [`SpeechController`] is what the rest of the app talks to. It drives a
//! [`SpeechBackend`], which is the platform capability: an external
//! synthesizer program ([`CommandBackend`]) or nothing at all
//! ([`SilentBackend`]). At most one utterance plays at a time because every
//! `speak` cancels first.

use std::process::Stdio;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::SpeechConfig;

pub const SPEECH_LOCALE: &str = "en-US";
pub const NORMAL_RATE: f32 = 1.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    /// Backend-specific identifier used to select the voice
    pub id: String,
    pub name: String,
    /// BCP 47 tag, e.g. `en-US`
    pub lang: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    /// `None` means the backend default
    pub voice: Option<Voice>,
    pub lang: String,
    pub rate: f32,
}

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to stop synthesizer: {0}")]
    Kill(#[source] std::io::Error),
    #[error("'{program}' could not list voices: {detail}")]
    VoiceList { program: String, detail: String },
}

pub trait SpeechBackend: Send + Sync {
    fn voices(&self) -> Vec<Voice>;

    /// Start playback and return without waiting for it to finish
    fn speak(&self, utterance: Utterance) -> Result<(), SpeechError>;

    /// Stop whatever is playing; fine to call when idle
    fn cancel(&self) -> Result<(), SpeechError>;
}

/// Prefer an exact `en-US` voice, else the first one listed
pub fn select_voice(voices: &[Voice]) -> Option<Voice> {
    voices
        .iter()
        .find(|v| v.lang == SPEECH_LOCALE)
        .or_else(|| voices.first())
        .cloned()
}

pub struct SpeechController {
    backend: Arc<dyn SpeechBackend>,
}

impl SpeechController {
    pub fn new(backend: Arc<dyn SpeechBackend>) -> Self {
        Self { backend }
    }

    pub fn silent() -> Self {
        Self::new(Arc::new(SilentBackend))
    }

    pub fn speak(&self, text: &str) {
        if let Err(e) = self.backend.cancel() {
            warn!("Failed to cancel previous utterance: {}", e);
        }

        let utterance = Utterance {
            text: text.to_string(),
            voice: select_voice(&self.backend.voices()),
            lang: SPEECH_LOCALE.to_string(),
            rate: NORMAL_RATE,
        };
        debug!(
            "Speaking {} chars with voice {:?}",
            utterance.text.len(),
            utterance.voice.as_ref().map(|v| v.name.as_str())
        );

        if let Err(e) = self.backend.speak(utterance) {
            warn!("Speech playback failed: {}", e);
        }
    }

    pub fn stop(&self) {
        if let Err(e) = self.backend.cancel() {
            warn!("Failed to stop speech: {}", e);
        }
    }
}

/// Backend for hosts without speech synthesis
#[derive(Debug, Default)]
pub struct SilentBackend;

impl SpeechBackend for SilentBackend {
    fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }

    fn speak(&self, _utterance: Utterance) -> Result<(), SpeechError> {
        Ok(())
    }

    fn cancel(&self) -> Result<(), SpeechError> {
        Ok(())
    }
}

/// Drives an espeak-compatible synthesizer as a child process
pub struct CommandBackend {
    program: String,
    words_per_minute: u32,
    voices: Vec<Voice>,
    active: Mutex<Option<Child>>,
}

impl CommandBackend {
    pub fn new(config: &SpeechConfig, voices: Vec<Voice>) -> Self {
        Self {
            program: config.program.clone(),
            words_per_minute: config.words_per_minute,
            voices,
            active: Mutex::new(None),
        }
    }

    /// Ask the synthesizer for its voices; fails if the program can't be run
    pub async fn detect(config: &SpeechConfig) -> Result<Self, SpeechError> {
        let output = Command::new(&config.program)
            .arg("--voices")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| SpeechError::Spawn {
                program: config.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SpeechError::VoiceList {
                program: config.program.clone(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let voices = Self::parse_voice_list(&String::from_utf8_lossy(&output.stdout));
        info!("Found {} voices for '{}'", voices.len(), config.program);
        Ok(Self::new(config, voices))
    }

    /// Parse `espeak-ng --voices` output:
    ///
    /// ```text
    /// Pty Language       Age/Gender VoiceName          File                 Other Languages
    ///  2  en-us           --/M      English_(America)  gmw/en-US            (en 3)
    /// ```
    pub fn parse_voice_list(listing: &str) -> Vec<Voice> {
        listing
            .lines()
            .skip(1)
            .filter_map(|line| {
                let fields: Vec<&str> = line.split_whitespace().collect();
                if fields.len() < 4 {
                    return None;
                }
                Some(Voice {
                    id: fields[1].to_string(),
                    name: fields[3].replace('_', " "),
                    lang: normalize_lang_tag(fields[1]),
                })
            })
            .collect()
    }

    pub fn command_args(&self, utterance: &Utterance) -> Vec<String> {
        let voice = utterance
            .voice
            .as_ref()
            .map(|v| v.id.clone())
            .unwrap_or_else(|| utterance.lang.to_lowercase());
        let wpm = (self.words_per_minute as f32 * utterance.rate).round() as u32;

        // A leading '-' would be read as an option
        let text = if utterance.text.starts_with('-') {
            format!(" {}", utterance.text)
        } else {
            utterance.text.clone()
        };

        vec![
            "-v".to_string(),
            voice,
            "-s".to_string(),
            wpm.to_string(),
            text,
        ]
    }

    fn kill_active(active: &mut Option<Child>) -> Result<(), SpeechError> {
        let Some(mut child) = active.take() else {
            return Ok(());
        };

        match child.try_wait() {
            Ok(Some(_)) => Ok(()),
            Ok(None) => child.start_kill().map_err(SpeechError::Kill),
            Err(e) => Err(SpeechError::Kill(e)),
        }
    }
}

impl SpeechBackend for CommandBackend {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(&self, utterance: Utterance) -> Result<(), SpeechError> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        Self::kill_active(&mut active)?;

        let child = Command::new(&self.program)
            .args(self.command_args(&utterance))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SpeechError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        *active = Some(child);
        Ok(())
    }

    fn cancel(&self) -> Result<(), SpeechError> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        Self::kill_active(&mut active)
    }
}

/// `en-us` -> `en-US`, `cmn-latn-pinyin` -> `cmn-Latn-pinyin`
pub fn normalize_lang_tag(tag: &str) -> String {
    tag.split('-')
        .enumerate()
        .map(|(i, part)| {
            if i == 0 {
                part.to_lowercase()
            } else if part.len() == 2 && part.chars().all(|c| c.is_ascii_alphabetic()) {
                part.to_uppercase()
            } else if part.len() == 4 && part.chars().all(|c| c.is_ascii_alphabetic()) {
                let (first, rest) = part.split_at(1);
                first.to_uppercase() + &rest.to_lowercase()
            } else {
                part.to_lowercase()
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
