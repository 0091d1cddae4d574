//! Renders parse errors into plain-text reports.

use std::fmt;
use std::io::Cursor;

use ariadne::{Config, Label, Report, ReportKind, Source};

use super::ParseError;

/// Renders every error as an ariadne report (color disabled) and concatenates
/// them into the human-readable failure message shown in the output panel.
pub fn render<'code, T: fmt::Display + 'code>(
    errors: impl IntoIterator<Item = ParseError<'code, T>>,
    filename: &str,
    source_code: &str,
) -> String {
    let mut rendered = String::new();
    for error in errors {
        let mut report_bytes = Cursor::new(Vec::new());
        let written = Report::build(ReportKind::Error, (filename, error.span().into_range()))
            .with_config(Config::default().with_color(false))
            .with_message(error.to_string())
            .with_label(
                Label::new((filename, error.span().into_range()))
                    .with_message(error.reason().to_string()),
            )
            .finish()
            .write((filename, Source::from(source_code)), &mut report_bytes);
        match written {
            Ok(()) => rendered.push_str(&String::from_utf8_lossy(report_bytes.get_ref())),
            // Writing into a Vec cannot realistically fail; keep the message anyway.
            Err(_) => {
                rendered.push_str(&error.to_string());
                rendered.push('\n');
            }
        }
    }
    rendered
}
