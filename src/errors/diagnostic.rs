//! Pretty error reporting using ariadne
//!
//! Provides colorful, user-friendly error messages with source context.

use crate::errors::CarlosError;
use ariadne::{Color, Label, Report, ReportKind, Source};

fn error_parts(error: &CarlosError) -> (String, Option<crate::errors::SourceSpan>, &'static str) {
    match error {
        CarlosError::Lexer { message, span } => (message.clone(), Some(*span), "Lexer error"),
        CarlosError::Parser { message, span } => (message.clone(), Some(*span), "Parser error"),
        CarlosError::Analysis { message, span } => (message.clone(), Some(*span), "Analysis error"),
        CarlosError::Io(e) => (e.to_string(), None, "IO error"),
    }
}

/// Print an error with source context
pub fn print_error(source: &str, filename: &str, error: &CarlosError) {
    let (message, span, kind) = error_parts(error);

    if span.is_none() {
        eprintln!("{}: {}", kind, message);
        return;
    }

    let span_range = span.map(|s| s.start..s.end).unwrap_or(0..0);

    let header = if filename.is_empty() {
        kind.to_string()
    } else {
        format!("{} in {}", kind, filename)
    };

    let mut report =
        Report::build(ReportKind::Error, (), span_range.start).with_message(header);

    if let Some(s) = span {
        report = report.with_label(
            Label::new(s.start..s.end)
                .with_message(message)
                .with_color(Color::Red),
        );
    }

    report
        .finish()
        .print(Source::from(source))
        .expect("failed to print error report");
}

/// Format an error as a string (for testing)
pub fn format_error(source: &str, filename: &str, error: &CarlosError) -> String {
    let (message, span, kind) = error_parts(error);

    if span.is_none() {
        return format!("{}: {}", kind, message);
    }

    let mut output = Vec::new();
    let span_range = span.map(|s| s.start..s.end).unwrap_or(0..0);

    let header = if filename.is_empty() {
        kind.to_string()
    } else {
        format!("{} in {}", kind, filename)
    };

    let mut report =
        Report::build(ReportKind::Error, (), span_range.start).with_message(header);

    if let Some(s) = span {
        report = report.with_label(
            Label::new(s.start..s.end)
                .with_message(message)
                .with_color(Color::Red),
        );
    }

    report
        .finish()
        .write(Source::from(source), &mut output)
        .expect("failed to write error report");

    String::from_utf8(output).expect("error report should be valid UTF-8")
}
