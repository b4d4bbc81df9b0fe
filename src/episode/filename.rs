// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

/// Extension of every mirrored media file
pub const MEDIA_EXTENSION: &str = "ogg";

/// Replacement for every character or run the downloader rejects
const REPLACEMENT: char = '_';

/// Device names reserved on Windows, matched case-insensitively at the start
const RESERVED_NAMES: [&str; 6] = ["AUX", "COM", "CON", "LPT", "NUL", "PRN"];

/// Characters the downloader strips anywhere in a name
fn is_illegal_char(c: char) -> bool {
    matches!(c, '/' | '\\' | ':' | '|' | '<' | '>' | '"' | '?' | '*') || ('\0'..='\x1f').contains(&c)
}

/// Sanitize a name exactly the way the external downloader does.
///
/// Each of the following is replaced by a single `_`, scanning left to right:
///
/// - any of `/ \ : | < > " ? *` or a control character (U+0000 to U+001F)
/// - a leading reserved device name (`AUX`, `CON`, `NUL`, `PRN`, `COM1`-`COM9`,
///   `LPT1`-`LPT9`, any case) followed by the end of the name or a `.`
/// - one leading whitespace character
/// - one trailing whitespace character or `.`, where "trailing" also covers the
///   position just before a final newline
///
/// The staging file can only be found if this matches the downloader's own
/// rule character for character.
pub fn sanitize_filename(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let len = chars.len();
    let mut result = String::with_capacity(name.len());
    let mut i = 0;

    while i < len {
        let c = chars[i];

        if is_illegal_char(c) {
            result.push(REPLACEMENT);
            i += 1;
            continue;
        }

        if i == 0
            && let Some(reserved_len) = reserved_prefix_len(&chars)
        {
            result.push(REPLACEMENT);
            i += reserved_len;
            continue;
        }

        if i == 0 && c.is_whitespace() {
            result.push(REPLACEMENT);
            i += 1;
            continue;
        }

        if (c.is_whitespace() || c == '.') && is_at_end(&chars, i + 1) {
            result.push(REPLACEMENT);
            i += 1;
            continue;
        }

        result.push(c);
        i += 1;
    }

    result
}

/// Length of a reserved device name at the start of `chars`, if one is there
fn reserved_prefix_len(chars: &[char]) -> Option<usize> {
    let upper = |i: usize| chars.get(i).map(|c| c.to_ascii_uppercase());

    for name in RESERVED_NAMES {
        let matches_name = name.chars().enumerate().all(|(i, n)| upper(i) == Some(n));
        if !matches_name {
            continue;
        }

        let len = match name {
            "COM" | "LPT" => match chars.get(3) {
                Some(d) if ('1'..='9').contains(d) => 4,
                _ => continue,
            },
            _ => 3,
        };

        // Only a whole name counts: it must be followed by nothing or a dot
        return match chars.get(len) {
            None | Some('.') => Some(len),
            Some(_) => None,
        };
    }

    None
}

/// Whether position `pos` is the end of the name, or just before a final newline
fn is_at_end(chars: &[char], pos: usize) -> bool {
    pos == chars.len() || (pos + 1 == chars.len() && chars[pos] == '\n')
}

/// Canonical location of an episode: keyed by IDs, never by title
pub fn canonical_path(output_root: &Path, collection_id: &str, episode_id: &str) -> PathBuf {
    output_root
        .join(collection_id)
        .join(format!("{episode_id}.{MEDIA_EXTENSION}"))
}

/// Where the downloader leaves an episode before it is relocated.
///
/// The downloader nests files in a directory named after the show and names
/// them `"{show} - {episode}"`, both parts sanitized separately.
pub fn staging_path(staging_root: &Path, collection_name: &str, episode_title: &str) -> PathBuf {
    let show = sanitize_filename(collection_name);
    let episode = sanitize_filename(episode_title);

    staging_root
        .join(&show)
        .join(format!("{show} - {episode}.{MEDIA_EXTENSION}"))
}

/// Map media file extensions to MIME types
pub fn media_mime_type(extension: &str) -> &'static str {
    match extension.to_lowercase().as_str() {
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "mp3" => "audio/mpeg",
        "m4a" | "mp4" => "audio/mp4",
        "aac" => "audio/aac",
        "flac" => "audio/flac",
        "wav" => "audio/wav",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // === Character class ===

    #[test]
    fn sanitize_preserves_plain_titles() {
        assert_eq!(sanitize_filename("Episode 42: The End"), "Episode 42_ The End");
        assert_eq!(sanitize_filename("Heavyweight"), "Heavyweight");
    }

    #[test]
    fn sanitize_replaces_each_illegal_char() {
        assert_eq!(sanitize_filename(r#"a/b\c:d|e<f>g"h?i*j"#), "a_b_c_d_e_f_g_h_i_j");
    }

    #[test]
    fn sanitize_does_not_collapse_runs() {
        assert_eq!(sanitize_filename("a:::b"), "a___b");
    }

    #[test]
    fn sanitize_replaces_control_chars() {
        assert_eq!(sanitize_filename("line1\nline2\ttab\0"), "line1_line2_tab_");
        assert_eq!(sanitize_filename("bell\x07"), "bell_");
    }

    #[test]
    fn sanitize_keeps_unicode() {
        assert_eq!(sanitize_filename("Café résumé 🎙️"), "Café résumé 🎙️");
    }

    // === Reserved names ===

    #[test]
    fn sanitize_replaces_bare_reserved_names() {
        assert_eq!(sanitize_filename("CON"), "_");
        assert_eq!(sanitize_filename("nul"), "_");
        assert_eq!(sanitize_filename("Com1"), "_");
        assert_eq!(sanitize_filename("LPT9"), "_");
    }

    #[test]
    fn sanitize_replaces_reserved_name_before_dot() {
        assert_eq!(sanitize_filename("aux.txt"), "_.txt");
        // The trailing dot is then handled separately
        assert_eq!(sanitize_filename("PRN."), "__");
    }

    #[test]
    fn sanitize_ignores_reserved_names_inside_words() {
        assert_eq!(sanitize_filename("Contact"), "Contact");
        assert_eq!(sanitize_filename("COM0"), "COM0");
        assert_eq!(sanitize_filename("COM"), "COM");
        assert_eq!(sanitize_filename("The CON"), "The CON");
        assert_eq!(sanitize_filename("Nullable"), "Nullable");
    }

    // === Edges ===

    #[test]
    fn sanitize_replaces_one_leading_whitespace() {
        assert_eq!(sanitize_filename(" hello"), "_hello");
        assert_eq!(sanitize_filename("  hello"), "_ hello");
    }

    #[test]
    fn sanitize_replaces_one_trailing_dot_or_space() {
        assert_eq!(sanitize_filename("hello."), "hello_");
        assert_eq!(sanitize_filename("hello "), "hello_");
        assert_eq!(sanitize_filename("hello.."), "hello._");
        assert_eq!(sanitize_filename("Wait..."), "Wait.._");
    }

    #[test]
    fn sanitize_treats_position_before_final_newline_as_end() {
        assert_eq!(sanitize_filename("abc \n"), "abc__");
        assert_eq!(sanitize_filename("abc.\n"), "abc__");
    }

    #[test]
    fn sanitize_handles_empty_string() {
        assert_eq!(sanitize_filename(""), "");
    }

    #[test]
    fn sanitize_is_deterministic() {
        let inputs = ["CON", " trailing. ", "a\x01b", "Ep. 3: \"Quotes\"?", "LPT1.log"];
        for input in inputs {
            assert_eq!(sanitize_filename(input), sanitize_filename(input));
        }
    }

    // === Paths ===

    #[test]
    fn canonical_path_is_keyed_by_ids() {
        assert_eq!(
            canonical_path(Path::new("/data/podcasts"), "abc123", "ep1"),
            PathBuf::from("/data/podcasts/abc123/ep1.ogg")
        );
    }

    #[test]
    fn staging_path_follows_downloader_layout() {
        assert_eq!(
            staging_path(Path::new("/data/staging"), "My Show?", "Ep 1: Start"),
            PathBuf::from("/data/staging/My Show_/My Show_ - Ep 1_ Start.ogg")
        );
    }

    #[test]
    fn staging_path_sanitizes_parts_separately() {
        // A trailing space in the show name is replaced before the separator is added
        assert_eq!(
            staging_path(Path::new("/s"), "Show ", "Title"),
            PathBuf::from("/s/Show_/Show_ - Title.ogg")
        );
    }

    #[test]
    fn mime_types_follow_extension() {
        assert_eq!(media_mime_type("ogg"), "audio/ogg");
        assert_eq!(media_mime_type("MP3"), "audio/mpeg");
        assert_eq!(media_mime_type("bin"), "application/octet-stream");
    }
}
