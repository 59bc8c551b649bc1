use serde::Serialize;

/// Pretty-prints `value` for a debug log line; skipped unless DEBUG is enabled.
pub(crate) fn with_pretty_json_debug<T, F>(value: &T, log_action: F)
where
    T: Serialize,
    F: FnOnce(&str),
{
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    let pretty_json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|error| format!("<pretty serialize failed: {error}>"));
    log_action(pretty_json.as_str());
}

/// Lossy UTF-8 view of an upstream body, cut to `max_chars`.
pub(crate) fn body_preview(bytes: &[u8], max_chars: usize) -> String {
    let raw_body = String::from_utf8_lossy(bytes);
    format!("{:.len$}", raw_body, len = max_chars)
}
