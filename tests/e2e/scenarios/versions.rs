use crate::harness::{Assertion, Scenario};

#[test]
fn test_manual_save_and_restore() {
    Scenario::new("save_restore")
        .with_starter_template()
        .user_saves_version("Before redesign")
        .assert_version_count(2)
        .assert(Assertion::LatestVersionNameContains("Before redesign".to_string()))
        .model_edits("Redesigned.", &[("styles/style.css", Some("body { background: black; }"))])
        .user_says("change the background")
        .assert_file_contains("styles/style.css", "background: black")
        .user_restores_version(0)
        .assert_file_contains("styles/style.css", "button { color: blue; }")
        .run()
        .unwrap();
}

#[test]
fn test_structural_change_gets_auto_version() {
    Scenario::new("auto_version")
        .with_starter_template()
        .model_edits("Added an about page.", &[("about.html", Some("<h1>About us</h1>"))])
        .user_says("add an about page")
        .assert(Assertion::LastTurnVersioned)
        .assert_version_count(2)
        .assert(Assertion::LatestVersionNameContains("v2 feature: add an about page".to_string()))
        .run()
        .unwrap();
}

#[test]
fn test_many_files_is_major() {
    Scenario::new("many_files")
        .with_starter_template()
        .model_edits(
            "Split the styles.",
            &[
                ("styles/base.css", Some("body{}")),
                ("styles/header.css", Some("h1{}")),
                ("styles/buttons.css", Some("button{}")),
                ("styles/footer.css", Some("footer{}")),
            ],
        )
        .user_says("split the css into several files")
        .assert(Assertion::LastTurnVersioned)
        .assert(Assertion::LatestVersionNameContains("style".to_string()))
        .run()
        .unwrap();
}

#[test]
fn test_undo_restores_previous_tree() {
    Scenario::new("undo")
        .with_starter_template()
        .model_edits("Gone.", &[("scripts/app.js", None)])
        .user_says("delete the script")
        .assert_no_file("scripts/app.js")
        .user_undoes()
        .assert_file_contains("scripts/app.js", "ready")
        .run()
        .unwrap();
}
