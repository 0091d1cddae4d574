//! The playground controller: owns all interactive sandbox state.
//!
//! Every mutation of `PlaygroundState` flows through the named actions here.
//! Collaborators (clipboard, clock, execution backend) are injected, so
//! multiple playground instances coexist without shared mutable globals.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;
use ulid::Ulid;

use crate::dispatch::{Dispatch, ExecutionResult, LanguageMode, dispatch};
use crate::frame::MarkupFrame;
use crate::interpreter::{ExecutionBackend, TreeWalkBackend};

/// How long the transient "copied" indicator stays on.
pub const COPIED_INDICATOR_DURATION: Duration = Duration::from_secs(2);

/// Shown when a script run produced no diagnostics and no completion value.
pub const NO_OUTPUT_MESSAGE: &str = "Code executed successfully (no output)";

/// Write-only clipboard collaborator.
pub trait Clipboard {
    fn write_text(&mut self, text: &str);
}

/// For embeddings without a clipboard.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullClipboard;

impl Clipboard for NullClipboard {
    fn write_text(&mut self, _text: &str) {}
}

/// An in-memory clipboard; handy for tests and headless embeddings.
#[derive(Debug, Default, Clone)]
pub struct MemoryClipboard {
    pub contents: Option<String>,
}

impl Clipboard for MemoryClipboard {
    fn write_text(&mut self, text: &str) {
        self.contents = Some(text.to_string());
    }
}

/// Monotonic time source for the copy-indicator deadline.
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock advanced by hand, for deterministic tests.
#[derive(Debug)]
pub struct ManualClock {
    now: std::cell::Cell<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: std::cell::Cell::new(Instant::now()),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

impl<K: Clock + ?Sized> Clock for std::rc::Rc<K> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// One stored run, tagged for log correlation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub id: Ulid,
    pub mode: LanguageMode,
    pub result: ExecutionResult,
}

/// The controller-owned state. Nothing else mutates it.
#[derive(Debug, Clone)]
pub struct PlaygroundState {
    pub source: String,
    pub mode: LanguageMode,
    pub result: Option<RunOutcome>,
    pub is_running: bool,
    pub is_expanded: bool,
    pub dark_theme: bool,
    pub compact_layout: bool,
}

pub struct Playground<B = TreeWalkBackend, C = NullClipboard, K = SystemClock> {
    backend: B,
    clipboard: C,
    clock: K,
    state: PlaygroundState,
    frame: Option<MarkupFrame>,
    copied_until: Option<Instant>,
}

impl Default for Playground {
    fn default() -> Self {
        Self::new()
    }
}

impl Playground {
    pub fn new() -> Self {
        Self::with_parts(TreeWalkBackend::default(), NullClipboard, SystemClock)
    }
}

impl<B: ExecutionBackend, C: Clipboard, K: Clock> Playground<B, C, K> {
    pub fn with_parts(backend: B, clipboard: C, clock: K) -> Self {
        let mode = LanguageMode::Script;
        Self {
            backend,
            clipboard,
            clock,
            state: PlaygroundState {
                source: default_snippet(mode).to_string(),
                mode,
                result: None,
                is_running: false,
                is_expanded: false,
                dark_theme: true,
                compact_layout: false,
            },
            frame: None,
            copied_until: None,
        }
    }

    pub fn state(&self) -> &PlaygroundState {
        &self.state
    }

    /// The current markup preview frame, when the last markup run built one.
    pub fn frame(&self) -> Option<&MarkupFrame> {
        self.frame.as_ref()
    }

    pub fn clipboard(&self) -> &C {
        &self.clipboard
    }

    /// Editor callback: replaces the source buffer.
    pub fn set_source(&mut self, source: impl Into<String>) {
        self.state.source = source.into();
    }

    /// Switching modes keeps both the buffer and the previous result; it only
    /// changes what the next run does.
    pub fn set_mode(&mut self, mode: LanguageMode) {
        self.state.mode = mode;
    }

    /// Runs the current buffer. A no-op while a run is already in flight.
    pub fn run(&mut self) {
        if self.state.is_running {
            debug!("run ignored: evaluation already in flight");
            return;
        }
        self.state.is_running = true;
        let id = Ulid::new();
        debug!(%id, mode = %self.state.mode, "run started");
        let Dispatch {
            result,
            frame_markup,
        } = dispatch(self.state.mode, &self.state.source, &self.backend);
        if let Some(markup) = frame_markup {
            // The frame is replaced wholesale, never patched.
            self.frame = Some(MarkupFrame::new(&markup));
        }
        self.state.result = Some(RunOutcome {
            id,
            mode: self.state.mode,
            result,
        });
        self.state.is_running = false;
    }

    /// Restores the canonical default snippet for the current mode and clears
    /// the last result.
    pub fn reset(&mut self) {
        self.state.source = default_snippet(self.state.mode).to_string();
        self.state.result = None;
    }

    /// Copies the buffer verbatim and arms the transient "copied" indicator.
    pub fn copy(&mut self) {
        self.clipboard.write_text(&self.state.source);
        self.copied_until = Some(self.clock.now() + COPIED_INDICATOR_DURATION);
    }

    /// True while the "copied" indicator should be visible; clears itself
    /// once the deadline passes.
    pub fn copied_indicator(&self) -> bool {
        self.copied_until
            .is_some_and(|until| self.clock.now() < until)
    }

    pub fn toggle_expand(&mut self) {
        self.state.is_expanded = !self.state.is_expanded;
    }

    pub fn toggle_theme(&mut self) {
        self.state.dark_theme = !self.state.dark_theme;
    }

    /// Viewport-driven layout flag, carried as explicit state rather than a
    /// module-level global.
    pub fn set_compact(&mut self, compact: bool) {
        self.state.compact_layout = compact;
    }

    /// The text for the output panel, or `None` when the panel is collapsed
    /// (no run yet). Empty script successes substitute a fixed message.
    pub fn output_text(&self) -> Option<String> {
        let outcome = self.state.result.as_ref()?;
        Some(match &outcome.result {
            ExecutionResult::Failure { message, .. } => message.clone(),
            ExecutionResult::Success { entries, .. } if entries.is_empty() => {
                NO_OUTPUT_MESSAGE.to_string()
            }
            ExecutionResult::Success { entries, .. } => entries
                .iter()
                .map(|entry| entry.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        })
    }

    pub fn output_visible(&self) -> bool {
        self.state.result.is_some()
    }
}

/// The canonical per-mode default snippet, used at mount and by `reset`.
pub fn default_snippet(mode: LanguageMode) -> &'static str {
    match mode {
        LanguageMode::Script => DEFAULT_SCRIPT_SNIPPET,
        LanguageMode::TypedScript => DEFAULT_TYPED_SNIPPET,
        LanguageMode::Markup => DEFAULT_MARKUP_SNIPPET,
        LanguageMode::Stylesheet => DEFAULT_STYLESHEET_SNIPPET,
    }
}

const DEFAULT_SCRIPT_SNIPPET: &str = r#"// Welcome to the playground!
// Run this snippet to see its captured output.

function greet(name) {
  return "Hello, " + name + "!";
}

const message = greet("Developer");
console.log(message);
console.log({ language: "script", ready: true });
"#;

const DEFAULT_TYPED_SNIPPET: &str = r#"// Annotations are parsed, then erased before execution.

function greet(name: string): string {
  return "Hello, " + name + "!";
}

let message: string = greet("Developer");
console.log(message);
"#;

const DEFAULT_MARKUP_SNIPPET: &str = r#"<h1>Playground</h1>
<p>Edit this markup and run to refresh the preview.</p>
"#;

const DEFAULT_STYLESHEET_SNIPPET: &str = r#".playground {
  color: #4a90d9;
  padding: 12px;
}
"#;

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;

    fn playground() -> Playground<TreeWalkBackend, MemoryClipboard, Rc<ManualClock>> {
        Playground::with_parts(
            TreeWalkBackend::default(),
            MemoryClipboard::default(),
            Rc::new(ManualClock::new()),
        )
    }

    #[test]
    fn reset_is_idempotent() {
        let mut playground = playground();
        playground.set_source("console.log(1)");
        playground.run();
        playground.reset();
        let after_one = playground.state().source.clone();
        playground.reset();
        assert_eq!(playground.state().source, after_one);
        assert!(playground.state().result.is_none());
    }

    #[test]
    fn run_while_running_is_a_no_op() {
        let mut playground = playground();
        playground.set_source("console.log(1)");
        playground.state.is_running = true;
        playground.run();
        assert!(playground.state().result.is_none());
        playground.state.is_running = false;
        playground.run();
        assert!(playground.state().result.is_some());
    }

    #[test]
    fn copy_indicator_self_clears_after_two_seconds() {
        let clock = Rc::new(ManualClock::new());
        let mut playground = Playground::with_parts(
            TreeWalkBackend::default(),
            MemoryClipboard::default(),
            clock.clone(),
        );
        playground.set_source("copied text");
        playground.copy();
        assert!(playground.copied_indicator());
        assert_eq!(
            playground.clipboard().contents.as_deref(),
            Some("copied text")
        );
        clock.advance(Duration::from_millis(2100));
        assert!(!playground.copied_indicator());
    }

    #[test]
    fn mode_change_keeps_source_and_result() {
        let mut playground = playground();
        playground.set_source("console.log(\"kept\")");
        playground.run();
        playground.set_mode(LanguageMode::Markup);
        assert_eq!(playground.state().source, "console.log(\"kept\")");
        assert!(playground.state().result.is_some());
    }

    #[test]
    fn markup_run_rebuilds_the_frame_each_time() {
        let mut playground = playground();
        playground.set_mode(LanguageMode::Markup);
        playground.set_source("<b>hi</b>");
        playground.run();
        assert_eq!(playground.frame().unwrap().text_content(), "hi");

        playground.set_source("<i>other</i>");
        playground.run();
        // Nothing from the first frame survives; the instance is replaced.
        assert_eq!(playground.frame().unwrap().text_content(), "other");
    }

    #[test]
    fn script_run_does_not_touch_the_frame() {
        let mut playground = playground();
        playground.set_mode(LanguageMode::Markup);
        playground.set_source("<b>hi</b>");
        playground.run();
        playground.set_mode(LanguageMode::Script);
        playground.set_source("console.log(1)");
        playground.run();
        assert!(playground.frame().is_some());
        assert_eq!(playground.frame().unwrap().text_content(), "hi");
    }

    #[test]
    fn empty_script_output_substitutes_the_fixed_message() {
        let mut playground = playground();
        playground.set_source("let unused = 1");
        playground.run();
        assert_eq!(playground.output_text().as_deref(), Some(NO_OUTPUT_MESSAGE));
    }

    #[test]
    fn output_panel_is_collapsed_until_the_first_run() {
        let mut playground = playground();
        assert!(!playground.output_visible());
        assert_eq!(playground.output_text(), None);
        playground.run();
        assert!(playground.output_visible());
    }

    #[test]
    fn failure_message_reaches_the_output_panel() {
        let mut playground = playground();
        playground.set_source("function( {");
        playground.run();
        let output = playground.output_text().unwrap();
        assert!(!output.is_empty());
        let outcome = playground.state().result.as_ref().unwrap();
        assert!(outcome.result.is_failure());
    }

    #[test]
    fn toggles_do_not_disturb_the_result() {
        let mut playground = playground();
        playground.set_source("console.log(1)");
        playground.run();
        let before = playground.state().result.clone();
        playground.toggle_expand();
        playground.toggle_theme();
        playground.set_compact(true);
        assert_eq!(playground.state().result, before);
        assert!(playground.state().is_expanded);
        assert!(!playground.state().dark_theme);
        assert!(playground.state().compact_layout);
    }

    #[test]
    fn default_snippets_run_cleanly_in_their_modes() {
        for mode in LanguageMode::ALL {
            let mut playground = playground();
            playground.set_mode(mode);
            playground.reset();
            playground.run();
            let outcome = playground.state().result.as_ref().unwrap();
            assert!(
                !outcome.result.is_failure(),
                "default snippet for {mode} must not fail"
            );
            assert!(!outcome.result.entries().is_empty());
        }
    }

    #[test]
    fn runs_are_tagged_with_distinct_ids() {
        let mut playground = playground();
        playground.set_source("1");
        playground.run();
        let first = playground.state().result.as_ref().unwrap().id;
        playground.run();
        let second = playground.state().result.as_ref().unwrap().id;
        assert_ne!(first, second);
    }
}
