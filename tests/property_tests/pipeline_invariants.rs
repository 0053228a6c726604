//! Queue accounting and request body sanitization

use allmitools::domain::RequestLogRecord;
use allmitools::request_logging::headers::REDACTED_BODY;
use allmitools::request_logging::{QueueCapacity, RequestLogQueue, RequestLoggingConfig};
use chrono::Utc;
use proptest::prelude::*;

fn record(endpoint: String) -> RequestLogRecord {
    RequestLogRecord {
        timestamp: Utc::now(),
        endpoint,
        method: "POST".to_string(),
        content_type: String::new(),
        request_body: String::new(),
        query_params: String::new(),
        response_status: 200,
        response_time_ms: 0,
        user_agent: String::new(),
        ip_address: String::new(),
    }
}

proptest! {
    #[test]
    fn queue_never_exceeds_capacity_and_counts_every_submission(
        capacity in 1usize..64,
        submissions in 0usize..200,
    ) {
        let queue = RequestLogQueue::new(QueueCapacity::try_new(capacity).unwrap());

        let accepted = (0..submissions)
            .filter(|i| queue.submit(record(format!("/r/{i}"))))
            .count();

        let stats = queue.stats();
        prop_assert_eq!(accepted, submissions.min(capacity));
        prop_assert_eq!(stats.submitted + stats.dropped, submissions as u64);
        prop_assert!(stats.pending <= capacity);
    }

    #[test]
    fn bodies_outside_auth_paths_are_stored_verbatim(
        segment in "[a-k0-9]{1,16}",
        body in ".*",
    ) {
        let config = RequestLoggingConfig::default();
        let path = format!("/tools/{segment}");
        prop_assert_eq!(config.sanitize_body(body.clone(), &path), body);
    }

    #[test]
    fn login_paths_never_store_the_body(
        prefix in "(/[a-z]{1,8}){0,3}",
        body in ".+",
    ) {
        let config = RequestLoggingConfig::default();
        let sanitized = config.sanitize_body(body, &format!("{prefix}/login"));
        prop_assert_eq!(sanitized, REDACTED_BODY);
    }

    #[test]
    fn skip_list_covers_every_health_and_static_subpath(suffix in "[a-z/]{0,20}") {
        let config = RequestLoggingConfig::default();
        let health = format!("/health{suffix}");
        let asset = format!("/static/{suffix}");
        prop_assert!(config.should_skip(&health));
        prop_assert!(config.should_skip(&asset));
    }
}
