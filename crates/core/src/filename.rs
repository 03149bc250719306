//! Output filename sanitization.
//!
//! Download filenames are derived from user-supplied video titles, so they
//! must be scrubbed before touching the filesystem: reserved characters
//! replaced, path components stripped, the stem capped, and the extension
//! forced onto a whitelist.

/// Extensions accepted for served artifacts. Anything else becomes `mp4`.
pub const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "webm", "mkv", "avi", "mov"];

/// Maximum length of the filename stem, in characters.
const MAX_STEM_LEN: usize = 100;

/// Sanitize a user-supplied filename into a safe `stem.ext` form.
///
/// Reserved and control characters become `-`, whitespace becomes `_`,
/// and everything outside ASCII alphanumerics plus `-_.` is dropped.
/// The extension is lowercased and must be in [`ALLOWED_EXTENSIONS`],
/// falling back to `mp4`; an empty stem falls back to `video`.
pub fn sanitize_filename(raw: &str) -> String {
    let mut safe = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|' => safe.push('-'),
            c if c.is_control() => safe.push('-'),
            c if c.is_whitespace() => safe.push('_'),
            c if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') => safe.push(c),
            _ => {}
        }
    }

    // No hidden files or bare-dot names.
    let safe = safe.trim_matches('.');

    let (stem, ext) = match safe.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, ext.to_ascii_lowercase()),
        _ => (safe, String::new()),
    };

    let ext = if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        ext
    } else {
        "mp4".to_string()
    };

    let mut stem: String = stem.chars().take(MAX_STEM_LEN).collect();
    if stem.is_empty() {
        stem = "video".to_string();
    }

    format!("{stem}.{ext}")
}

/// Strip the `{task_id}_` prefix the executor puts on artifact files,
/// recovering the name the user should see in their browser/save dialog.
pub fn display_name(file_name: &str) -> &str {
    file_name
        .split_once('_')
        .map(|(_, rest)| rest)
        .filter(|rest| !rest.is_empty())
        .unwrap_or(file_name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
