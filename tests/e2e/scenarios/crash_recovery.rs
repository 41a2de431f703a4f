use super::SHOP_REQUEST;
use crate::harness::{Assertion, Scenario};
use forge_core::WorkflowMode;

#[test]
fn test_files_and_versions_survive_restart() {
    Scenario::new("files_survive")
        .with_starter_template()
        .model_edits("Added contact.", &[("contact.html", Some("<form></form>"))])
        .user_says("add a contact page")
        .crash()
        .restart()
        .assert_file_contains("contact.html", "<form>")
        .assert_version_count(2)
        .assert_message_count(2)
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_pending_plan_survives_restart() {
    Scenario::new("plan_survives")
        .model_plans("Plan ready.", &["Catalog", "Checkout"])
        .user_says(SHOP_REQUEST)
        .crash()
        .restart()
        .assert_awaiting_approval()
        .assert_mode(WorkflowMode::Plan)
        .model_edits("Built.", &[("index.html", Some("<h1>Shop</h1>"))])
        .user_approves()
        .assert_success()
        .assert_last_prompt_contains("APPROVED PLAN:\n1. Catalog\n2. Checkout")
        .run()
        .unwrap();
}

#[test]
fn test_restart_without_crash_is_an_error() {
    let result = Scenario::new("restart_without_crash").restart().run();
    assert!(!result.success);
    assert_eq!(result.failure_step, Some(0));
}

#[test]
fn test_saved_version_survives_restart() {
    Scenario::new("saved_version_survives")
        .with_starter_template()
        .user_saves_version("Checkpoint")
        .crash()
        .restart()
        .assert(Assertion::LatestVersionNameContains("Checkpoint".to_string()))
        .assert_version_count(2)
        .run()
        .unwrap();
}
