use crate::harness::{Assertion, Scenario};
use forge_core::WorkflowMode;

#[test]
fn test_small_fix_edits_one_file() {
    Scenario::new("small_fix")
        .with_starter_template()
        .model_edits(
            "The button is red now.",
            &[("styles/style.css", Some("h1 { color: black; } button { color: red; }"))],
        )
        .user_says("fix the button color")
        .assert_last_mode(WorkflowMode::Action)
        .assert_success()
        .assert_reply_contains("red now")
        .assert_file_contains("styles/style.css", "button { color: red; }")
        .assert(Assertion::LastActionsLen(1))
        .assert(Assertion::LastTurnNotVersioned)
        .assert_version_count(1) // Project created
        .assert_message_count(2)
        .assert_mode(WorkflowMode::Discussion)
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_first_message_replaces_template() {
    Scenario::new("first_message")
        .with_starter_template()
        .model_edits(
            "Here is your bakery page.",
            &[
                ("index.html", Some("<main>Fresh bread daily</main>")),
                ("styles/main.css", Some("main { font-family: serif; }")),
            ],
        )
        .user_starts_project("make a landing page for my bakery")
        .assert_success()
        .assert_file_count(2)
        .assert_no_file("scripts/app.js")
        .assert_file_contains("index.html", "Fresh bread")
        .assert(Assertion::LastTurnVersioned)
        .assert_version_count(2)
        .run()
        .unwrap();
}

#[test]
fn test_delete_and_add_in_one_turn() {
    Scenario::new("delete_and_add")
        .with_starter_template()
        .model_edits(
            "Moved the script.",
            &[("scripts/app.js", None), ("js/main.js", Some("console.log('moved');"))],
        )
        .user_says("move the script into a js folder")
        .assert_success()
        .assert_no_file("scripts/app.js")
        .assert_file_contains("js/main.js", "moved")
        .assert(Assertion::LastActionsLen(2))
        .run()
        .unwrap();
}

#[test]
fn test_plain_reply_is_a_successful_no_op() {
    Scenario::new("plain_reply")
        .with_starter_template()
        .model_replies("Sure, done!")
        .user_says("update the page")
        .assert_success()
        .assert_reply_contains("Sure, done!")
        .assert(Assertion::LastActionsLen(0))
        .assert_file_count(3)
        .run()
        .unwrap();
}

#[test]
fn test_discussion_turn_leaves_files_alone() {
    Scenario::new("discussion")
        .with_starter_template()
        .model_replies(
            "Flexbox lays items out along one axis.\n\nSuggestions:\n- Try justify-content\n\nNext steps:\n1. Build a navbar",
        )
        .user_says("explain how flexbox works")
        .assert_last_mode(WorkflowMode::Discussion)
        .assert_success()
        .assert_last_prompt_contains("DISCUSSION MODE")
        .assert(Assertion::Custom(Box::new(|orchestrator| {
            assert_eq!(orchestrator.file_tree().len(), 3);
            Ok(())
        })))
        .run()
        .unwrap();
}

#[test]
fn test_forced_discussion_ignores_edits() {
    Scenario::new("forced_discussion")
        .with_starter_template()
        .model_edits("Here is how I would do it.", &[("index.html", Some("<p>replaced</p>"))])
        .user_discusses("fix the button color")
        .assert_last_mode(WorkflowMode::Discussion)
        .assert_file_contains("index.html", "<h1>Hello</h1>")
        .run()
        .unwrap();
}

#[test]
fn test_backend_failure_is_reported_not_raised() {
    Scenario::new("backend_failure")
        .with_starter_template()
        .model_fails("connection reset")
        .user_says("fix the button color")
        .assert_failure()
        .assert_reply_contains("Something went wrong")
        .assert_file_count(3)
        .assert_message_count(0)
        .assert_mode(WorkflowMode::Discussion)
        // the next turn works normally
        .model_replies("All good.")
        .user_says("fix the button color")
        .assert_success()
        .assert_message_count(2)
        .run()
        .unwrap();
}

#[test]
fn test_memory_reaches_the_next_prompt() {
    Scenario::new("memory_in_prompt")
        .with_starter_template()
        .model_replies("Footer updated.")
        .user_says("update the footer text")
        .model_replies("Header updated.")
        .user_says("update the header text")
        .assert(Assertion::LastSystemInstructionContains(
            "user: update the footer text".to_string(),
        ))
        .assert(Assertion::LastSystemInstructionContains(
            "assistant: Footer updated.".to_string(),
        ))
        .assert(Assertion::RequestCount(2))
        .run()
        .unwrap();
}

#[test]
fn test_summary_after_ten_messages() {
    let mut scenario = Scenario::new("rolling_summary").with_starter_template();
    for _ in 0..5 {
        scenario = scenario
            .model_replies("Done.")
            .user_says("the footer color is broken");
    }
    scenario
        .assert_message_count(10)
        .assert(Assertion::SummaryContains("design and styling".to_string()))
        .assert(Assertion::SummaryContains("bug fixing".to_string()))
        .run()
        .unwrap();
}
