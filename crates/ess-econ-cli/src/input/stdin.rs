use serde_json::Value;
use std::io::{self, Read};

/// JSON piped on stdin, if any.
///
/// Interactive sessions (stdin is a TTY) and empty pipes yield `None` so
/// callers can fall back to an all-defaults parameter bag or demand an
/// explicit request file.
pub fn piped_json() -> Result<Option<Value>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut raw = String::new();
    io::stdin().read_to_string(&mut raw)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let value: Value =
        serde_json::from_str(raw).map_err(|e| format!("Invalid JSON on stdin: {e}"))?;
    Ok(Some(value))
}
