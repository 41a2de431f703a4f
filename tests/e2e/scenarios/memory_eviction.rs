use crate::harness::{Assertion, Scenario};

#[test]
fn test_recent_context_survives_eviction() {
    Scenario::new("recent_context")
        .with_starter_template()
        .model_replies("Done.")
        .user_says("update the footer")
        .wait_days(3)
        .evict_idle_contexts()
        .assert_message_count(2)
        .run()
        .unwrap();
}

#[test]
fn test_idle_context_is_evicted() {
    Scenario::new("idle_context")
        .with_starter_template()
        .model_replies("Done.")
        .user_says("update the footer")
        .wait_days(8) // past the 7 day window
        .evict_idle_contexts()
        .assert(Assertion::ContextEvicted)
        .run()
        .unwrap();
}

#[test]
fn test_activity_resets_idle_window() {
    Scenario::new("activity_resets_window")
        .with_starter_template()
        .model_replies("Done.")
        .user_says("update the footer")
        .wait_days(5)
        .model_replies("Done again.")
        .user_says("update the header")
        .wait_days(5)
        .evict_idle_contexts()
        .assert_message_count(4)
        .run()
        .unwrap();
}

#[test]
fn test_evicted_context_stays_gone_after_restart() {
    Scenario::new("eviction_persists")
        .with_starter_template()
        .model_replies("Done.")
        .user_says("update the footer")
        .wait_days(10)
        .evict_idle_contexts()
        .crash()
        .restart()
        // a fresh, empty context is created for the reopened project
        .assert_message_count(0)
        .assert_file_count(3)
        .run()
        .unwrap();
}
