//! Attempt counting of the retry loop

use allmitools::infrastructure::{MaxAttempts, RetryPolicy};
use allmitools::Error;
use proptest::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

/// Fails transiently `failures` times, then succeeds
fn run_with_failures(max_attempts: u32, failures: u32) -> (Result<u32, Error>, u32) {
    let policy = RetryPolicy::new(
        MaxAttempts::try_new(max_attempts).unwrap(),
        Duration::from_millis(10),
        Duration::from_millis(200),
    );
    let calls = AtomicU32::new(0);

    let result = paused_runtime().block_on(policy.run("ping database", || {
        let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            if call <= failures {
                Err(sqlx::Error::PoolTimedOut)
            } else {
                Ok(call)
            }
        }
    }));

    (result, calls.load(Ordering::SeqCst))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn recovers_after_fewer_failures_than_the_budget(
        max_attempts in 1u32..8,
        failures in 0u32..8,
    ) {
        prop_assume!(failures < max_attempts);

        let (result, calls) = run_with_failures(max_attempts, failures);

        prop_assert_eq!(result.unwrap(), failures + 1);
        prop_assert_eq!(calls, failures + 1);
    }

    #[test]
    fn gives_up_after_exactly_max_attempts(
        max_attempts in 1u32..8,
        extra in 0u32..4,
    ) {
        let (result, calls) = run_with_failures(max_attempts, max_attempts + extra);

        prop_assert_eq!(calls, max_attempts);
        match result {
            Err(Error::Transient { attempts, .. }) => prop_assert_eq!(attempts, max_attempts),
            other => prop_assert!(false, "expected transient error, got {:?}", other),
        }
    }
}
