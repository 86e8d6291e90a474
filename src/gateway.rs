use std::collections::HashMap;

use serde_json::{Number, Value};

use crate::{config::ChatConfig, hub::Discard, presence::ConnId};

/// Cap applied to the sender label of global chat messages.
pub const MAX_NAME_LEN: usize = 50;

/// Truncates to at most `max` characters.
pub fn cap(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Escapes `&`, `<` and `>`.
pub fn escape(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

/// A `mensaje` payload that passed validation, still unsanitised.
#[derive(Debug, PartialEq)]
pub struct ChatDraft<'a> {
    pub user: Option<&'a str>,
    pub text: &'a str,
    /// Client timestamp, kept exactly as sent.
    pub ts: Option<Number>,
}

/// Validates a legacy global chat payload.
pub fn validate_chat(payload: &Value, max_len: usize) -> Result<ChatDraft<'_>, Discard> {
    let text = payload.get("text").and_then(Value::as_str).ok_or(Discard::Invalid)?;
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.chars().count() > max_len {
        return Err(Discard::Invalid);
    }

    let user = match payload.get("user") {
        None | Some(Value::Null) => None,
        Some(Value::String(user)) => Some(user.as_str()),
        Some(_) => return Err(Discard::Invalid),
    };

    let ts = match payload.get("ts") {
        Some(Value::Number(ts)) => Some(ts.clone()),
        _ => None,
    };

    Ok(ChatDraft { user, text, ts })
}

/// Trims and caps a room message. Blank text is rejected.
pub fn room_text(text: &str, max_len: usize) -> Result<String, Discard> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Discard::EmptyText);
    }
    Ok(cap(trimmed, max_len))
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u32,
    window_start: i64,
}

/// Fixed-window limiter for the legacy global channel, one bucket per
/// connection.
#[derive(Debug)]
pub struct RateLimiter {
    window_ms: i64,
    max_messages: u32,
    buckets: HashMap<ConnId, Bucket>,
}

impl RateLimiter {
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            window_ms: config.rate_limit_window_ms,
            max_messages: config.rate_limit_max_messages,
            buckets: HashMap::new(),
        }
    }

    /// Charges one message to `conn`'s bucket. `false` once over budget.
    pub fn check(&mut self, conn: ConnId, now: i64) -> bool {
        let bucket = self.buckets.entry(conn).or_insert(Bucket { count: 0, window_start: now });
        if now - bucket.window_start > self.window_ms {
            bucket.count = 0;
            bucket.window_start = now;
        }
        bucket.count += 1;
        bucket.count <= self.max_messages
    }

    pub fn forget(&mut self, conn: ConnId) {
        self.buckets.remove(&conn);
    }

    pub fn tracked(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("<script>a & b</script>"), "&lt;script&gt;a &amp; b&lt;/script&gt;");
    }

    #[test]
    fn cap_counts_characters() {
        assert_eq!(cap("ñandú", 3), "ñan");
        assert_eq!(cap("hi", 10), "hi");
    }

    #[test]
    fn message_length_boundary() {
        let at_limit = json!({ "text": "a".repeat(500) });
        let over = json!({ "text": "a".repeat(501) });

        assert!(validate_chat(&at_limit, 500).is_ok());
        assert_eq!(validate_chat(&over, 500), Err(Discard::Invalid));
    }

    #[test]
    fn rejects_bad_payloads() {
        for payload in [
            json!(null),
            json!("hello"),
            json!({}),
            json!({ "text": "   " }),
            json!({ "text": 5 }),
            json!({ "text": "hi", "user": 12 }),
        ] {
            assert_eq!(validate_chat(&payload, 500), Err(Discard::Invalid), "{payload}");
        }
    }

    #[test]
    fn keeps_client_timestamp_when_numeric() {
        let payload = json!({ "text": "hi", "user": "Ana", "ts": 1234 });
        let draft = validate_chat(&payload, 500).unwrap();
        assert_eq!(draft, ChatDraft { user: Some("Ana"), text: "hi", ts: Some(Number::from(1234)) });

        let payload = json!({ "text": "hi", "ts": "soon" });
        let draft = validate_chat(&payload, 500).unwrap();
        assert_eq!(draft.ts, None);
    }

    #[test]
    fn fractional_timestamp_is_not_truncated() {
        let payload = json!({ "text": "hi", "ts": 1700000000123.75 });
        let draft = validate_chat(&payload, 500).unwrap();
        assert_eq!(draft.ts.as_ref().and_then(Number::as_f64), Some(1700000000123.75));
        assert_eq!(draft.ts.map(|ts| ts.to_string()), Some("1700000000123.75".to_owned()));
    }

    #[test]
    fn room_text_is_trimmed_and_capped() {
        assert_eq!(room_text("  hola  ", 500), Ok("hola".to_owned()));
        assert_eq!(room_text(&"b".repeat(600), 500).map(|t| t.len()), Ok(500));
        assert_eq!(room_text(" \n ", 500), Err(Discard::EmptyText));
    }

    #[test]
    fn five_per_window_then_fresh_window() {
        let mut limiter = RateLimiter::new(&ChatConfig::default());
        let conn = ConnId::new();

        for offset in 0..5 {
            assert!(limiter.check(conn, 1_000 + offset * 100));
        }
        assert!(!limiter.check(conn, 1_900));
        // exactly one window later is still the same window
        assert!(!limiter.check(conn, 2_000));

        for offset in 0..5 {
            assert!(limiter.check(conn, 2_001 + offset));
        }
        assert!(!limiter.check(conn, 2_010));
    }

    #[test]
    fn buckets_are_per_connection() {
        let mut limiter = RateLimiter::new(&ChatConfig::default());
        let noisy = ConnId::new();
        let quiet = ConnId::new();
        for _ in 0..6 {
            limiter.check(noisy, 0);
        }
        assert!(limiter.check(quiet, 0));

        limiter.forget(noisy);
        assert_eq!(limiter.tracked(), 1);
        assert!(limiter.check(noisy, 1));
    }
}
