//! Tidepool: an embeddable, multi-mode code playground engine.
//!
//! Visitors type source text in one of four modes (a dynamic script dialect,
//! its typed superset, markup, or stylesheet text); the engine evaluates or
//! passes it through, captures diagnostics in order, and hands the embedder
//! one `ExecutionResult` per run. Script evaluation is sandboxed: the only
//! injected binding is `console`, and fuel/call-depth limits bound runaway
//! code. See `Playground` for the interactive controller.

pub mod console;
pub mod dispatch;
pub mod format;
pub mod frame;
pub mod interpreter;
pub mod parser;
pub mod playground;
pub mod value;

pub use console::{CaptureEntry, Channel, Console};
pub use dispatch::{Dispatch, ExecutionResult, LanguageMode, dispatch};
pub use frame::{MarkupFrame, MarkupNode};
pub use interpreter::{
    DisabledBackend, EvalLimits, EvalOutcome, ExecutionBackend, TreeWalkBackend, evaluate_source,
};
pub use playground::{
    Clipboard, Clock, ManualClock, MemoryClipboard, NullClipboard, Playground, PlaygroundState,
    RunOutcome, SystemClock, default_snippet,
};
