//! Stored file names.
//!
//! A stored name is `<normalized display name>_<id, at least two digits><extension>`,
//! e.g. `Contrato_07.txt`. The id makes names unique; the display name keeps
//! them readable on disk.

use unicode_normalization::UnicodeNormalization;

use crate::document::DocumentId;

/// Longest normalized display name kept in a stored name, in bytes.
pub const MAX_NAME_BYTES: usize = 200;

/// Longest extension kept in a stored name, in bytes, dot included.
///
/// With the id (at most 20 digits) and the `_` separator a stored name stays
/// under the 255-byte file name limit of common filesystems.
pub const MAX_EXTENSION_BYTES: usize = 32;

/// Strip diacritics and replace spaces with underscores.
///
/// Path separators and control characters are also replaced so the result
/// can never leave the upload directory. The result is cut to
/// [`MAX_NAME_BYTES`] on a character boundary.
pub fn normalize(display_name: &str) -> String {
    let normalized: String = display_name
        .nfd()
        .filter(|c| !is_combining_diacritic(*c))
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    truncate_to(&normalized, MAX_NAME_BYTES).to_string()
}

fn truncate_to(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Combining Diacritical Marks block (U+0300..U+036F).
fn is_combining_diacritic(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}

/// Extension of the original file name, dot included; empty if there is none.
///
/// Only the last path component is considered, and at most
/// [`MAX_EXTENSION_BYTES`] of it are kept.
pub fn extension(original_file_name: &str) -> &str {
    let base = original_file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_file_name);
    match base.rfind('.') {
        Some(idx) => truncate_to(&base[idx..], MAX_EXTENSION_BYTES),
        None => "",
    }
}

pub fn generate_stored_name(display_name: &str, id: DocumentId, original_file_name: &str) -> String {
    format!(
        "{}_{:02}{}",
        normalize(display_name),
        id,
        extension(original_file_name)
    )
}

/// File name offered to clients in `Content-Disposition`.
///
/// Keeps the last path component and drops characters that would break the
/// quoted header value.
pub fn download_file_name(stored_file_name: &str) -> String {
    let base = stored_file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(stored_file_name);
    base.chars()
        .filter(|c| *c != '"' && !c.is_control())
        .collect()
}
