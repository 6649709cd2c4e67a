//! Mime type guessing from URL extensions.

/// Known audio extensions and the mime type browsers report for them.
const EXTENSIONS: &[(&str, &str)] = &[
    ("mp3", "audio/mpeg"),
    ("mpga", "audio/mpeg"),
    ("aac", "audio/aac"),
    ("m4a", "audio/mp4"),
    ("mp4", "audio/mp4"),
    ("oga", "audio/ogg"),
    ("ogg", "audio/ogg"),
    ("opus", "audio/opus"),
    ("wav", "audio/wav"),
    ("flac", "audio/flac"),
    ("webm", "audio/webm"),
    ("m3u8", "application/vnd.apple.mpegurl"),
    ("m3u", "audio/x-mpegurl"),
    ("pls", "audio/x-scpls"),
];

/// Lowercased file extension of a URL's last path segment.
///
/// Query string and fragment are ignored. URLs whose last segment has no dot
/// have no extension.
///
/// ```
/// use core_playback::mime::extension;
///
/// assert_eq!(extension("http://x.test/live/Stream.M3U8?token=1").as_deref(), Some("m3u8"));
/// assert_eq!(extension("/good/1000/test"), None);
/// ```
pub fn extension(url: &str) -> Option<String> {
    let path = url.split(|c: char| c == '?' || c == '#').next().unwrap_or(url);
    let segment = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Mime type implied by a URL's extension, if the extension is a known audio one.
pub fn guess_mime_type(url: &str) -> Option<&'static str> {
    let ext = extension(url)?;
    EXTENSIONS
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
}
