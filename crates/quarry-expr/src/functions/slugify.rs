//! Slug generation.

use std::sync::LazyLock;

use regex::Regex;

static STRIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9-]+").expect("STRIP_RE is a valid regex pattern"));

static HYPHEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-+").expect("HYPHEN_RE is a valid regex pattern"));

/// Turn a string into a slug: lowercase, spaces and underscores become
/// hyphens, anything outside `[a-z0-9-]` is dropped, hyphen runs collapse,
/// and leading/trailing hyphens are trimmed. Idempotent.
pub fn slugify(s: &str) -> String {
    let slug = s.to_lowercase().replace([' ', '_'], "-");
    let slug = STRIP_RE.replace_all(&slug, "");
    let slug = HYPHEN_RE.replace_all(&slug, "-");
    slug.trim_matches('-').to_string()
}
