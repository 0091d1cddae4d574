//! Language modes and the run dispatcher.
//!
//! The dispatcher picks one of three strategies: evaluate as script, pass
//! through as markup (and signal a preview-frame rebuild), or pass through as
//! stylesheet text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::console::{CaptureEntry, Channel};
use crate::interpreter::ExecutionBackend;

/// The closed set of content interpretations the playground supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LanguageMode {
    Script,
    TypedScript,
    Markup,
    Stylesheet,
}

impl LanguageMode {
    pub const ALL: [Self; 4] = [
        Self::Script,
        Self::TypedScript,
        Self::Markup,
        Self::Stylesheet,
    ];

    /// Both script dialects route through the execution backend.
    pub fn is_script(self) -> bool {
        matches!(self, Self::Script | Self::TypedScript)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Script => "Script",
            Self::TypedScript => "Typed Script",
            Self::Markup => "Markup",
            Self::Stylesheet => "Stylesheet",
        }
    }
}

impl fmt::Display for LanguageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Script => "script",
            Self::TypedScript => "typed-script",
            Self::Markup => "markup",
            Self::Stylesheet => "stylesheet",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMode(pub String);

impl fmt::Display for UnknownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown language mode '{}' (expected script, typed-script, markup, or stylesheet)",
            self.0
        )
    }
}

impl std::error::Error for UnknownMode {}

impl FromStr for LanguageMode {
    type Err = UnknownMode;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "script" => Ok(Self::Script),
            "typed-script" => Ok(Self::TypedScript),
            "markup" => Ok(Self::Markup),
            "stylesheet" => Ok(Self::Stylesheet),
            other => Err(UnknownMode(other.to_string())),
        }
    }
}

/// The total outcome of one dispatch/evaluate cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionResult {
    Success {
        entries: Vec<CaptureEntry>,
        completion_value: Option<String>,
    },
    Failure {
        entries: Vec<CaptureEntry>,
        message: String,
    },
}

impl ExecutionResult {
    pub fn entries(&self) -> &[CaptureEntry] {
        match self {
            Self::Success { entries, .. } | Self::Failure { entries, .. } => entries,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}

pub const MARKUP_PREVIEW_LABEL: &str = "Markup preview:";
pub const STYLESHEET_LABEL: &str = "Stylesheet source:";

/// One dispatched run: the result, plus the markup to forward verbatim to the
/// isolated render frame when the mode asked for one.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub result: ExecutionResult,
    pub frame_markup: Option<String>,
}

/// Picks the execution strategy for `mode` and runs it over `source_code`.
pub fn dispatch(
    mode: LanguageMode,
    source_code: &str,
    backend: &dyn ExecutionBackend,
) -> Dispatch {
    debug!(%mode, bytes = source_code.len(), "dispatching run");
    match mode {
        LanguageMode::Script | LanguageMode::TypedScript => Dispatch {
            result: backend.evaluate(source_code),
            frame_markup: None,
        },
        LanguageMode::Markup => Dispatch {
            result: ExecutionResult::Success {
                entries: vec![CaptureEntry {
                    channel: Channel::Log,
                    text: format!("{MARKUP_PREVIEW_LABEL}\n\n{source_code}"),
                }],
                completion_value: None,
            },
            frame_markup: Some(source_code.to_string()),
        },
        LanguageMode::Stylesheet => Dispatch {
            result: ExecutionResult::Success {
                entries: vec![CaptureEntry {
                    channel: Channel::Log,
                    text: format!("{STYLESHEET_LABEL}\n\n{source_code}"),
                }],
                completion_value: None,
            },
            frame_markup: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::{DisabledBackend, TreeWalkBackend};

    #[test]
    fn script_modes_route_through_the_backend() {
        let backend = TreeWalkBackend::default();
        for mode in [LanguageMode::Script, LanguageMode::TypedScript] {
            let dispatched = dispatch(mode, "console.log(\"hi\")", &backend);
            assert_eq!(dispatched.frame_markup, None);
            assert_eq!(dispatched.result.entries().len(), 1);
        }
    }

    #[test]
    fn markup_mode_passes_source_through_and_requests_a_frame() {
        let backend = TreeWalkBackend::default();
        let dispatched = dispatch(LanguageMode::Markup, "<b>hi</b>", &backend);
        let entries = dispatched.result.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].text.contains("<b>hi</b>"));
        assert_eq!(dispatched.frame_markup.as_deref(), Some("<b>hi</b>"));
    }

    #[test]
    fn stylesheet_mode_passes_source_through_without_a_frame() {
        let backend = TreeWalkBackend::default();
        let dispatched = dispatch(LanguageMode::Stylesheet, ".a { color: red }", &backend);
        let entries = dispatched.result.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].text.contains(".a { color: red }"));
        assert_eq!(dispatched.frame_markup, None);
    }

    #[test]
    fn entries_are_present_for_every_mode() {
        let backend = TreeWalkBackend::default();
        for mode in LanguageMode::ALL {
            let dispatched = dispatch(mode, "1", &backend);
            // Entries may be empty only for script modes with no output.
            if !mode.is_script() {
                assert!(!dispatched.result.entries().is_empty());
            }
        }
    }

    #[test]
    fn a_disabled_backend_does_not_affect_passthrough_modes() {
        let dispatched = dispatch(LanguageMode::Markup, "<i>x</i>", &DisabledBackend);
        assert!(!dispatched.result.is_failure());
        let dispatched = dispatch(LanguageMode::Script, "1", &DisabledBackend);
        assert!(dispatched.result.is_failure());
    }

    #[test]
    fn mode_names_round_trip_through_from_str() {
        for mode in LanguageMode::ALL {
            assert_eq!(mode.to_string().parse::<LanguageMode>().unwrap(), mode);
        }
        assert!("basic".parse::<LanguageMode>().is_err());
    }
}
