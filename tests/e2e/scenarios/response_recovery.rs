use crate::harness::{Assertion, Scenario};

#[test]
fn test_unterminated_fence_still_applies() {
    Scenario::new("unterminated_fence")
        .with_starter_template()
        .model_replies(
            "```json\n{\"message\": \"Styled the header\", \"file_changes\": {\"styles/style.css\": \"h1 { color: teal; }\"}}",
        )
        .user_says("change the header color to teal")
        .assert_success()
        .assert_reply_contains("Styled the header")
        .assert_file_contains("styles/style.css", "teal")
        .run()
        .unwrap();
}

#[test]
fn test_truncated_object_is_repaired() {
    // the reply was cut off after a complete object plus trailing noise
    Scenario::new("truncated_object")
        .with_starter_template()
        .model_replies(
            "```json\n{\"message\": \"Updated\", \"file_changes\": {\"index.html\": \"<h1>Hi {there}</h1>\"}}\n  \"extra\": tru",
        )
        .user_says("update the heading")
        .assert_success()
        .assert_file_contains("index.html", "Hi {there}")
        .run()
        .unwrap();
}

#[test]
fn test_delete_sentinel_and_null_both_delete() {
    Scenario::new("delete_markers")
        .with_starter_template()
        .model_replies(
            "```json\n{\"message\": \"Removed\", \"file_changes\": {\"scripts/app.js\": \"DELETE\", \"styles/style.css\": null}}\n```",
        )
        .user_says("remove the script and the stylesheet")
        .assert_success()
        .assert_file_count(1)
        .assert(Assertion::LastActionsLen(2))
        .run()
        .unwrap();
}

#[test]
fn test_garbage_fence_fails_without_touching_files() {
    Scenario::new("garbage_fence")
        .with_starter_template()
        .model_replies("```json\nnot json at all\n```")
        .user_says("fix the layout")
        .assert_failure()
        .assert_reply_contains("couldn't process")
        .assert_file_count(3)
        .assert_message_count(0)
        .run()
        .unwrap();
}

#[test]
fn test_file_tool_blocks_edit_the_project() {
    Scenario::new("file_tool_blocks")
        .with_starter_template()
        .model_replies(
            "Made the button red and dropped the script.\n\
             <replace_in_file><path>styles/style.css</path><diff>\n\
             <<<<<<< SEARCH\nbutton { color: blue; }\n=======\nbutton { color: red; }\n>>>>>>> REPLACE\n\
             <<<<<<< SEARCH\nfooter { }\n=======\nfooter { margin: 0; }\n>>>>>>> REPLACE\n\
             </diff></replace_in_file>\n\
             <delete_file><path>scripts/app.js</path></delete_file>",
        )
        .user_says("fix the button color and remove the script")
        .assert_success()
        .assert_file_contains("styles/style.css", "button { color: red; }")
        .assert_file_contains("styles/style.css", "h1 { color: black; }")
        .assert_no_file("scripts/app.js")
        .assert_file_count(2)
        .run()
        .unwrap();
}
