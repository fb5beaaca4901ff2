//! Trace id generation
//!
//! Trace ids follow `<context>_<identifier>_<isoTimestamp>`. The timestamp
//! carries nanoseconds and is forced strictly increasing within the
//! process, so two evaluations never share an id.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

static LAST_TRACE_NANOS: AtomicI64 = AtomicI64::new(0);

fn next_timestamp() -> DateTime<Utc> {
    let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
    let mut last = LAST_TRACE_NANOS.load(Ordering::Relaxed);
    loop {
        let candidate = if now > last { now } else { last + 1 };
        match LAST_TRACE_NANOS.compare_exchange_weak(
            last,
            candidate,
            Ordering::AcqRel,
            Ordering::Relaxed,
        ) {
            Ok(_) => return Utc.timestamp_nanos(candidate),
            Err(observed) => last = observed,
        }
    }
}

fn sanitize(part: &str) -> String {
    let trimmed = part.trim();
    if trimmed.is_empty() {
        return "unknown".to_string();
    }
    trimmed
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect()
}

/// Create a new trace id for one evaluation
pub fn new_trace_id(context: &str, identifier: &str) -> String {
    format!(
        "{}_{}_{}",
        sanitize(context),
        sanitize(identifier),
        next_timestamp().to_rfc3339_opts(SecondsFormat::Nanos, true)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_trace_id_format() {
        let id = new_trace_id("facility_creation", "DEAL 001");
        assert!(id.starts_with("facility_creation_DEAL-001_"));
        let ts = id.rsplit('_').next().unwrap();
        assert!(DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[test]
    fn test_trace_ids_unique_under_contention() {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                std::thread::spawn(|| {
                    (0..500)
                        .map(|_| new_trace_id("trade", "T-1"))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate trace id");
            }
        }
        assert_eq!(seen.len(), 4000);
    }
}
