//! Random, collision-resistant names for stored assets.

use base64::{Engine as _, engine::general_purpose};

const ASSET_KEY_BYTES: usize = 32;

/// Generate `<random>.<ext>` for an upload declared as `content_type`.
///
/// The random part is 32 bytes of CSPRNG output in URL-safe base64 without
/// padding, so it is safe both as a file name and as an object key.
pub fn asset_path(content_type: &str) -> String {
    let key: [u8; ASSET_KEY_BYTES] = rand::random();
    let file_name = general_purpose::URL_SAFE_NO_PAD.encode(key);
    format!("{}{}", file_name, media_type_to_ext(content_type))
}

/// Extension for a MIME type: `.` plus the subtype, or `.bin` when the type
/// does not contain exactly one `/`.
pub fn media_type_to_ext(content_type: &str) -> String {
    let mut parts = content_type.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(subtype), None) => format!(".{}", subtype),
        _ => ".bin".to_string(),
    }
}

/// Object key for a processed video: `<prefix>/<random>.<ext>`.
pub fn prefixed_asset_path(prefix: &str, content_type: &str) -> String {
    format!("{}/{}", prefix, asset_path(content_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn extension_follows_subtype() {
        assert_eq!(media_type_to_ext("image/png"), ".png");
        assert_eq!(media_type_to_ext("video/mp4"), ".mp4");
        assert_eq!(media_type_to_ext("image/"), ".");
    }

    #[test]
    fn unexpected_shapes_fall_back_to_bin() {
        assert_eq!(media_type_to_ext("png"), ".bin");
        assert_eq!(media_type_to_ext(""), ".bin");
        assert_eq!(media_type_to_ext("a/b/c"), ".bin");
    }

    #[test]
    fn asset_path_is_url_safe_base64_plus_extension() {
        let path = asset_path("image/jpeg");
        let (name, ext) = path.split_once('.').unwrap();
        assert_eq!(ext, "jpeg");
        // 32 bytes -> 43 chars without padding
        assert_eq!(name.len(), 43);
        assert!(
            name.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert!(general_purpose::URL_SAFE_NO_PAD.decode(name).is_ok());
    }

    #[test]
    fn asset_paths_do_not_repeat() {
        let paths: HashSet<String> = (0..1000).map(|_| asset_path("image/png")).collect();
        assert_eq!(paths.len(), 1000);
    }

    #[test]
    fn prefixed_path_nests_under_prefix() {
        let key = prefixed_asset_path("portrait", "video/mp4");
        assert!(key.starts_with("portrait/"));
        assert!(key.ends_with(".mp4"));
        assert_eq!(key.matches('/').count(), 1);
    }
}
