//! URL construction helpers for the story service.

use url::Url;

use crate::error::RemoteResult;

pub const GENERATE_STORY_ENDPOINT: &str = "generate_story";
pub const TTS_ENDPOINT: &str = "tts";
const AUDIO_ENDPOINT: &str = "audio";

/// `{base}/{endpoint}`, keeping any path prefix of the base URL.
pub fn build_endpoint_url(base: &Url, endpoint: &str) -> Url {
    let mut url = base.clone();
    let base_path = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{base_path}/{endpoint}"));
    url.set_query(None);
    url
}

/// `{base}/audio/{filename}` with the file name percent-encoded.
pub fn build_audio_url(base: &Url, filename: &str) -> Url {
    let encoded = urlencoding::encode(filename);
    build_endpoint_url(base, &format!("{AUDIO_ENDPOINT}/{encoded}"))
}

/// Resolve a reference returned by the service: absolute URLs are kept,
/// relative ones are joined onto the base URL.
pub fn resolve_reference(base: &Url, reference: &str) -> RemoteResult<Url> {
    match Url::parse(reference) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Ok(base.join(reference)?),
        Err(e) => Err(e.into()),
    }
}
