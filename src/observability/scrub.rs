use std::borrow::Cow;

const MAX_ERROR_CHARS: usize = 240;

const MARKER_PATTERNS: [&str; 8] = [
    "X-Plex-Token=",
    "x-plex-token=",
    "\"X-Plex-Token\":\"",
    "apikey=",
    "api_key=",
    "\"apikey\":\"",
    "token=",
    "\"token\":\"",
];

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '+' | '/' | '=' | '%')
}

fn token_end(input: &str, from: usize) -> usize {
    let mut end = from;
    for (i, c) in input[from..].char_indices() {
        if is_secret_char(c) {
            end = from + i + c.len_utf8();
        } else {
            break;
        }
    }
    end
}

fn scrub_after_marker(scrubbed: &mut String, marker: &str) {
    let mut search_from = 0;
    while let Some(rel) = scrubbed[search_from..].find(marker) {
        let start = search_from + rel;
        let content_start = start + marker.len();
        let end = token_end(scrubbed, content_start);

        // Bare marker without a value.
        if end == content_start {
            search_from = content_start;
            continue;
        }

        scrubbed.replace_range(start..end, "[REDACTED]");
        search_from = start + "[REDACTED]".len();
    }
}

/// Redact Plex tokens and Tautulli API keys from transport error text.
///
/// `reqwest` errors embed the full request URL, query string included, so
/// every error that reaches a log line goes through here first.
pub fn scrub_secrets(input: &str) -> Cow<'_, str> {
    if !MARKER_PATTERNS.iter().any(|m| input.contains(m)) {
        return Cow::Borrowed(input);
    }

    let mut scrubbed = input.to_string();
    for marker in MARKER_PATTERNS {
        scrub_after_marker(&mut scrubbed, marker);
    }
    Cow::Owned(scrubbed)
}

/// Scrub and truncate error text for logging.
pub fn sanitize_error(input: &str) -> String {
    let scrubbed = scrub_secrets(input);

    if scrubbed.chars().count() <= MAX_ERROR_CHARS {
        return scrubbed.into_owned();
    }

    let scrubbed = scrubbed.as_ref();
    let mut end = MAX_ERROR_CHARS;
    while end > 0 && !scrubbed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &scrubbed[..end])
}
