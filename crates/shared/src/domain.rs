//! Client-side validation vocabulary shared by the controllers and tests.

/// Largest image accepted for analysis.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Prompt eligibility bounds, counted in characters.
pub const PROMPT_MIN_CHARS: usize = 3;
pub const PROMPT_MAX_CHARS: usize = 500;

/// Extensions the file picker offers and the selection controller accepts.
pub const ACCEPTED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

const IMAGE_MEDIA_TYPE_PREFIX: &str = "image/";

/// Whether a prompt is eligible for submission.
///
/// Counted in Unicode scalar values, not bytes, so multibyte prompts are
/// measured the way a text input reports length.
pub fn prompt_within_bounds(prompt: &str) -> bool {
    let chars = prompt.chars().count();
    (PROMPT_MIN_CHARS..=PROMPT_MAX_CHARS).contains(&chars)
}

pub fn media_type_is_image(media_type: &str) -> bool {
    media_type.starts_with(IMAGE_MEDIA_TYPE_PREFIX)
}

/// Case-insensitive allow-list check on the filename's extension.
pub fn extension_is_accepted(filename: &str) -> bool {
    let Some((_, extension)) = filename.rsplit_once('.') else {
        return false;
    };
    let extension = extension.to_ascii_lowercase();
    ACCEPTED_EXTENSIONS.contains(&extension.as_str())
}

/// Media type a picker reports for an accepted extension.
pub fn media_type_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_bounds_are_inclusive() {
        assert!(!prompt_within_bounds("ab"));
        assert!(prompt_within_bounds("abc"));
        assert!(prompt_within_bounds(&"x".repeat(500)));
        assert!(!prompt_within_bounds(&"x".repeat(501)));
    }

    #[test]
    fn prompt_length_counts_characters_not_bytes() {
        // Three characters, nine bytes.
        assert!(prompt_within_bounds("猫は何"));
        assert!(!prompt_within_bounds("猫は"));
    }

    #[test]
    fn extension_allow_list_is_case_insensitive() {
        assert!(extension_is_accepted("photo.png"));
        assert!(extension_is_accepted("PHOTO.JPG"));
        assert!(extension_is_accepted("anim.Gif"));
        assert!(!extension_is_accepted("scan.webp"));
        assert!(!extension_is_accepted("noextension"));
    }

    #[test]
    fn media_type_family_check() {
        assert!(media_type_is_image("image/png"));
        assert!(media_type_is_image("image/x-custom"));
        assert!(!media_type_is_image("application/pdf"));
    }

    #[test]
    fn extension_media_type_mapping_covers_allow_list() {
        for extension in ACCEPTED_EXTENSIONS {
            assert!(media_type_for_extension(extension).is_some());
        }
        assert_eq!(media_type_for_extension("webp"), None);
    }
}
