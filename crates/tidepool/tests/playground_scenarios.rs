//! End-to-end playground scenarios through the public API.

use std::rc::Rc;
use std::time::Duration;

use tidepool::playground::{MemoryClipboard, NO_OUTPUT_MESSAGE};
use tidepool::{
    Channel, ExecutionResult, LanguageMode, ManualClock, Playground, TreeWalkBackend,
};

fn playground() -> Playground<TreeWalkBackend, MemoryClipboard, Rc<ManualClock>> {
    Playground::with_parts(
        TreeWalkBackend::default(),
        MemoryClipboard::default(),
        Rc::new(ManualClock::new()),
    )
}

fn run_source(
    playground: &mut Playground<TreeWalkBackend, MemoryClipboard, Rc<ManualClock>>,
    mode: LanguageMode,
    source: &str,
) -> ExecutionResult {
    playground.set_mode(mode);
    playground.set_source(source);
    playground.run();
    playground
        .state()
        .result
        .as_ref()
        .expect("run stores a result")
        .result
        .clone()
}

#[test]
fn hello_world_prints_exactly_one_line() {
    let mut playground = playground();
    let result = run_source(
        &mut playground,
        LanguageMode::Script,
        r#"console.log("Hello, " + "World!")"#,
    );
    let ExecutionResult::Success { entries, .. } = result else {
        panic!("expected success");
    };
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].text, "Hello, World!");
}

#[test]
fn completion_value_is_reported_as_four() {
    let mut playground = playground();
    let result = run_source(&mut playground, LanguageMode::Script, "return 2 + 2;");
    let ExecutionResult::Success {
        entries,
        completion_value,
    } = result
    else {
        panic!("expected success");
    };
    assert_eq!(completion_value.as_deref(), Some("4"));
    assert!(entries.iter().any(|entry| entry.text.contains('4')));
}

#[test]
fn thrown_error_is_one_error_entry_in_a_success() {
    let mut playground = playground();
    let result = run_source(
        &mut playground,
        LanguageMode::Script,
        r#"throw new Error("boom")"#,
    );
    let ExecutionResult::Success { entries, .. } = result else {
        panic!("user-code errors are surfaced as output, not failure");
    };
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].channel, Channel::Error);
    assert!(entries[0].text.contains("boom"));
}

#[test]
fn malformed_source_is_a_failure_with_message() {
    let mut playground = playground();
    let result = run_source(&mut playground, LanguageMode::Script, "function( {");
    let ExecutionResult::Failure { entries, message } = result else {
        panic!("expected failure");
    };
    assert!(entries.is_empty());
    assert!(!message.is_empty());
}

#[test]
fn markup_run_forwards_source_verbatim_to_the_frame() {
    let mut playground = playground();
    let result = run_source(&mut playground, LanguageMode::Markup, "<b>hi</b>");
    let ExecutionResult::Success { entries, .. } = result else {
        panic!("expected success");
    };
    assert_eq!(entries.len(), 1);
    assert!(entries[0].text.contains("<b>hi</b>"));

    let frame = playground.frame().expect("markup run builds a frame");
    assert_eq!(frame.text_content(), "hi");
}

#[test]
fn copy_indicator_clears_after_the_delay() {
    let clock = Rc::new(ManualClock::new());
    let mut playground = Playground::with_parts(
        TreeWalkBackend::default(),
        MemoryClipboard::default(),
        clock.clone(),
    );
    playground.copy();
    assert!(playground.copied_indicator());
    clock.advance(Duration::from_secs(3));
    assert!(!playground.copied_indicator());
}

#[test]
fn every_mode_yields_a_result_with_defined_entries() {
    for mode in LanguageMode::ALL {
        let mut playground = playground();
        let result = run_source(&mut playground, mode, "1");
        match result {
            ExecutionResult::Success { entries, .. } => {
                if !mode.is_script() {
                    assert!(!entries.is_empty(), "{mode} must produce an entry");
                }
            }
            ExecutionResult::Failure { message, .. } => {
                panic!("mode {mode} unexpectedly failed: {message}")
            }
        }
    }
}

#[test]
fn silent_script_success_substitutes_the_no_output_message() {
    let mut playground = playground();
    run_source(&mut playground, LanguageMode::Script, "let silent = true");
    assert_eq!(playground.output_text().as_deref(), Some(NO_OUTPUT_MESSAGE));
}

#[test]
fn sandbox_failures_leave_the_controller_usable() {
    let mut playground = playground();
    run_source(&mut playground, LanguageMode::Script, "while (true) {}");
    // The aborted run reported itself as output; the next run is unaffected.
    let result = run_source(&mut playground, LanguageMode::Script, "console.log(\"ok\")");
    let ExecutionResult::Success { entries, .. } = result else {
        panic!("expected success");
    };
    assert_eq!(entries[0].text, "ok");
}

#[test]
fn frame_scripts_cannot_disturb_the_playground_result() {
    let mut playground = playground();
    let markup = "<p>shown</p><script>throw new Error(\"inside frame\")</script>";
    let result = run_source(&mut playground, LanguageMode::Markup, markup);

    // The playground-level result stays a clean markup pass-through.
    let ExecutionResult::Success { entries, .. } = result else {
        panic!("expected success");
    };
    assert_eq!(entries.len(), 1);

    // The failure is recorded only inside the frame.
    let frame = playground.frame().expect("frame exists");
    let script_entries = frame.script_results()[0].entries();
    assert!(script_entries[0].text.contains("inside frame"));
}

#[test]
fn stylesheet_mode_never_builds_a_frame() {
    let mut playground = playground();
    run_source(
        &mut playground,
        LanguageMode::Stylesheet,
        ".x { color: red }",
    );
    assert!(playground.frame().is_none());
}

#[test]
fn results_serialize_for_the_wire() {
    let mut playground = playground();
    run_source(&mut playground, LanguageMode::Script, "console.warn(\"w\")");
    let outcome = playground.state().result.as_ref().unwrap();
    let json = serde_json::to_string(outcome).unwrap();
    assert!(json.contains("\"status\":\"success\""));
    assert!(json.contains("WARN: w"));
}
