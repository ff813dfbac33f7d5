use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

/// Wall-clock instant used on every audit record.
pub type Timestamp = DateTime<Utc>;

/// Current time at microsecond precision.
pub fn now() -> Timestamp {
    Utc::now().trunc_subsecs(6)
}

/// Canonical RFC 3339 rendering (`Z` suffix, nanoseconds).
///
/// Lossless: two instants render the same only if they are equal, so the
/// string can sit inside signed bytes.
pub fn rfc3339(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendering_is_stable_across_serde() {
        let ts = now();
        let json = serde_json::to_string(&ts).unwrap();
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(rfc3339(&ts), rfc3339(&back));
        assert!(rfc3339(&ts).ends_with('Z'));
    }

    #[test]
    fn rendering_keeps_nanoseconds() {
        let ts = now();
        let later = ts + chrono::Duration::nanoseconds(1);
        assert_ne!(rfc3339(&ts), rfc3339(&later));
        assert_eq!(rfc3339(&later).parse::<Timestamp>().unwrap(), later);
    }
}
