//! Drive sharing-link normalisation.
//!
//! Product images are frequently pasted as Drive "share" links, which do not
//! render in an `<img>` tag. This rewrites them to the thumbnail endpoint on
//! the same host. Anything that is not recognisably a Drive link, or from
//! which no file id can be extracted, is returned unchanged.

use url::Url;

/// Width requested from the thumbnail endpoint.
const THUMBNAIL_SIZE: &str = "w1000";

/// Resolve a raw image reference to something directly loadable.
///
/// Recognised shapes (host beginning with `drive.`):
/// - `/file/d/<id>/view` (path-segment form)
/// - `/open?id=<id>` (query-parameter form)
/// - `/uc?id=<id>` and `/thumbnail?id=<id>` (direct-access forms)
pub fn resolve_image_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(url) = Url::parse(trimmed) else {
        return raw.to_string();
    };
    let Some(host) = url.host_str() else {
        return raw.to_string();
    };
    if !is_drive_host(host) {
        return raw.to_string();
    }

    match drive_file_id(&url) {
        Some(id) => format!(
            "{}://{}/thumbnail?id={}&sz={}",
            url.scheme(),
            host,
            id,
            THUMBNAIL_SIZE
        ),
        None => raw.to_string(),
    }
}

fn is_drive_host(host: &str) -> bool {
    host.to_ascii_lowercase().starts_with("drive.")
}

fn drive_file_id(url: &Url) -> Option<String> {
    if let Some(segments) = url.path_segments() {
        let segments: Vec<&str> = segments.collect();
        if let Some(pos) = segments.iter().position(|s| *s == "d") {
            if let Some(id) = segments.get(pos + 1).filter(|id| is_file_id(id)) {
                return Some((*id).to_string());
            }
        }
    }

    url.query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
        .filter(|id| is_file_id(id))
}

fn is_file_id(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
}
