//! Reply parsing: turns raw service replies into core types.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lullaby_core::{Story, SynthesizedAudio};
use url::Url;

use crate::error::{RemoteError, RemoteResult};
use crate::http::HttpReply;
use crate::models::{GenerateStoryReply, TtsJsonReply};
use crate::url::{build_audio_url, resolve_reference};

/// Parse a `/generate_story` reply. An empty story is an invalid reply.
pub fn parse_story_reply(reply: &HttpReply) -> RemoteResult<Story> {
    let parsed: GenerateStoryReply = reply.parse_json()?;
    let text = parsed.story.trim();
    if text.is_empty() {
        return Err(RemoteError::invalid("service returned an empty story"));
    }
    Ok(Story::new(text))
}

/// Normalize a `/tts` reply into [`SynthesizedAudio`].
///
/// | Reply | Result |
/// |---|---|
/// | `audio/*` or `application/octet-stream` body | `Bytes` |
/// | `{"audio_base64": ..}` | `Bytes` |
/// | `{"url": ..}` | `Reference` (resolved against `base`) |
/// | `{"filename": ..}` | `Reference` to `{base}/audio/{filename}` |
pub fn parse_tts_reply(reply: HttpReply, base: &Url) -> RemoteResult<SynthesizedAudio> {
    if reply.is_audio() {
        return non_empty(reply.body).map(SynthesizedAudio::Bytes);
    }

    let parsed: TtsJsonReply = reply.parse_json()?;
    if let Some(encoded) = parsed.audio_base64 {
        let bytes = STANDARD.decode(encoded.trim())?;
        return non_empty(bytes).map(SynthesizedAudio::Bytes);
    }
    if let Some(url) = parsed.url.filter(|url| !url.trim().is_empty()) {
        let url = resolve_reference(base, url.trim())?;
        return Ok(SynthesizedAudio::Reference(url.to_string()));
    }
    if let Some(filename) = parsed.filename.filter(|name| !name.trim().is_empty()) {
        let url = build_audio_url(base, filename.trim());
        return Ok(SynthesizedAudio::Reference(url.to_string()));
    }

    Err(RemoteError::invalid(
        "synthesis reply has neither audio, audio_base64, url nor filename",
    ))
}

fn non_empty(bytes: Vec<u8>) -> RemoteResult<Vec<u8>> {
    if bytes.is_empty() {
        Err(RemoteError::invalid("synthesis reply contained no audio"))
    } else {
        Ok(bytes)
    }
}
