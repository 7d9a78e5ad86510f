//! Entity naming and identifier derivation.
//!
//! Names are slugs built from the document, path and operation names in
//! scope order. Identifiers are version-5 UUIDs over `<base name>.<suffix>`,
//! so an unchanged document always yields the same identifiers.

use deunicode::deunicode;
use uuid::Uuid;

/// Longest capture name accepted in a route regex.
pub const MAX_CAPTURE_NAME_LEN: usize = 32;

/// Separator placed between scope names.
pub fn separator(inso_compat: bool) -> char {
    if inso_compat {
        '-'
    } else {
        '_'
    }
}

/// Slugify each part and join the non-empty ones with the mode separator.
pub fn slugify(inso_compat: bool, parts: &[&str]) -> String {
    let sep = separator(inso_compat).to_string();
    parts
        .iter()
        .map(|part| slug_part(part))
        .filter(|slug| !slug.is_empty())
        .collect::<Vec<_>>()
        .join(&sep)
}

/// Append the slug of `child` to an already slugified `parent`.
pub fn scoped_name(inso_compat: bool, parent: &str, child: &str) -> String {
    let child = slug_part(child);
    if child.is_empty() {
        parent.to_string()
    } else if parent.is_empty() {
        child
    } else {
        format!("{}{}{}", parent, separator(inso_compat), child)
    }
}

/// Transliterate to ASCII, then keep lowercase letters and digits; every
/// other run of characters collapses into a single `-`, trimmed at both ends.
fn slug_part(part: &str) -> String {
    let ascii = deunicode(part);
    let mut slug = String::with_capacity(ascii.len());
    let mut gap = false;
    for ch in ascii.chars() {
        if ch.is_ascii_alphanumeric() {
            if gap && !slug.is_empty() {
                slug.push('-');
            }
            gap = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            gap = true;
        }
    }
    slug
}

/// Derive the identifier for `<base_name>.<suffix>` in `namespace`.
pub fn derive_id(namespace: &Uuid, base_name: &str, suffix: &str) -> String {
    Uuid::new_v5(namespace, format!("{}.{}", base_name, suffix).as_bytes()).to_string()
}

/// Turn a path-parameter name into a regex capture name.
///
/// Inso mode only replaces characters that are illegal in a capture name;
/// the default mode slugifies and uses `_` as separator. A name that does
/// not start with a letter or `_` gets a `_` prefix. Length is checked by
/// the caller against [`MAX_CAPTURE_NAME_LEN`].
pub fn sanitize_capture_name(name: &str, inso_compat: bool) -> String {
    let mut capture: String = if inso_compat {
        name.chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    } else {
        slug_part(name).replace('-', "_")
    };
    if !capture.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        capture.insert(0, '_');
    }
    capture
}
