//! Server-sent event extraction for single-response streams.
//!
//! Format: `event: message\ndata: {...}\n\n`

/// Returns the `data` payload of the first event that carries one.
///
/// Multiple `data:` lines within one event are joined with `\n`.
pub fn first_event_data(body: &str) -> Option<String> {
    let mut data: Vec<&str> = Vec::new();

    for line in body.lines() {
        let line = line.trim_end_matches('\r');

        if line.is_empty() {
            if !data.is_empty() {
                break;
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("data:") {
            data.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }

    if data.is_empty() {
        None
    } else {
        Some(data.join("\n"))
    }
}

/// Cheap check used before attempting extraction on untyped bodies
pub fn looks_like_event_stream(body: &str) -> bool {
    body.lines().any(|line| {
        let line = line.trim_start();
        line.starts_with("data:") || line.starts_with("event:")
    })
}
