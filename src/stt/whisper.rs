//! Client for a whisper.cpp compatible transcription server.
//!
//! Segments are encoded as 16-bit PCM WAV with `hound` and posted to
//! `POST /inference` as `multipart/form-data`; the server answers
//! `{"text": "..."}`.

use std::io::Cursor;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, info};

use super::Transcriber;
use crate::config::SttConfig;
use crate::error::{AssistantError, Result};
use crate::pipeline::messages::SpeechSegment;

const BOUNDARY: &str = "----atlas-stt-boundary";

/// Transcriber backed by a whisper.cpp HTTP server.
pub struct WhisperServerStt {
    endpoint: String,
    language: String,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    #[serde(default)]
    text: String,
}

impl WhisperServerStt {
    pub fn new(config: &SttConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build();
        Self {
            endpoint: format!("{}/inference", config.api_url.trim_end_matches('/')),
            language: config.language.clone(),
            agent,
        }
    }
}

impl Transcriber for WhisperServerStt {
    fn transcribe(&self, segment: &SpeechSegment) -> Result<String> {
        let duration_s = segment.samples.len() as f32 / segment.sample_rate.max(1) as f32;
        debug!("transcribing {duration_s:.1}s audio segment");

        let wav = encode_wav(&segment.samples, segment.sample_rate)?;
        let body = multipart_body(&wav, &self.language);

        let started = Instant::now();
        let response = self
            .agent
            .post(&self.endpoint)
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .send_bytes(&body)
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => {
                    AssistantError::Stt(format!("server returned status {code}"))
                }
                ureq::Error::Transport(t) => AssistantError::Stt(format!("request failed: {t}")),
            })?;

        let raw = response
            .into_string()
            .map_err(|e| AssistantError::Stt(format!("cannot read response: {e}")))?;
        let parsed: InferenceResponse = serde_json::from_str(&raw)
            .map_err(|e| AssistantError::Stt(format!("invalid response: {e}")))?;
        let text = parsed.text.trim().to_owned();
        info!(
            "transcribed in {}ms: {text:?}",
            started.elapsed().as_millis()
        );
        Ok(text)
    }
}

/// Mono 16-bit PCM WAV bytes.
pub(crate) fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut bytes = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)
            .map_err(|e| AssistantError::Stt(format!("cannot encode audio: {e}")))?;
        for &sample in samples {
            let pcm = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
            writer
                .write_sample(pcm)
                .map_err(|e| AssistantError::Stt(format!("cannot encode audio: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| AssistantError::Stt(format!("cannot encode audio: {e}")))?;
    }
    Ok(bytes)
}

fn multipart_body(wav: &[u8], language: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(wav.len() + 512);
    for (name, value) in [("response_format", "json"), ("language", language)] {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"audio.wav\"\r\nContent-Type: audio/wav\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(wav);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}
