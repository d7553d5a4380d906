//! Turns a subscriber's forecast warnings into an email subject and body.

use crate::config::AlertConfig;
use crate::core::{AlertMessage, BodyFormat, ForecastWarning, Subscriber};

/// Builds alert messages in the markup expected by the active backend.
#[derive(Debug, Clone)]
pub struct AlertComposer {
    subject: String,
    signature: String,
}

impl AlertComposer {
    pub fn new(subject: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            signature: signature.into(),
        }
    }

    pub fn from_config(config: &AlertConfig) -> Self {
        Self::new(config.subject.clone(), config.signature.clone())
    }

    /// Composes the alert for one subscriber.
    ///
    /// Returns `None` when there is nothing to report, in which case the caller
    /// must not dispatch anything.
    pub fn compose(
        &self,
        subscriber: &Subscriber,
        warnings: &[ForecastWarning],
        format: BodyFormat,
    ) -> Option<AlertMessage> {
        if warnings.is_empty() {
            return None;
        }

        let body = match format {
            BodyFormat::PlainText => self.plain_body(warnings),
            BodyFormat::Html => self.html_body(warnings),
        };

        Some(AlertMessage {
            recipient: subscriber.clone(),
            subject: self.subject.clone(),
            body,
            format,
        })
    }

    fn plain_body(&self, warnings: &[ForecastWarning]) -> String {
        let lines: Vec<String> = warnings.iter().map(format_line).collect();
        format!(
            "🚨 HARSH WEATHER ALERT 🚨\n\n{}\n\nStay safe,\n{}",
            lines.join("\n"),
            self.signature
        )
    }

    fn html_body(&self, warnings: &[ForecastWarning]) -> String {
        let lines: Vec<String> = warnings
            .iter()
            .map(|warning| escape_html(&format_line(warning)))
            .collect();
        format!(
            "🚨 <b>Harsh Weather Alert</b> 🚨<br><br>{}<br><br>Stay safe,<br><b>{}</b>",
            lines.join("<br>"),
            escape_html(&self.signature)
        )
    }
}

/// `<timestamp>: <label>, <label>`
fn format_line(warning: &ForecastWarning) -> String {
    let labels: Vec<&str> = warning.hazards.iter().map(|tag| tag.label()).collect();
    format!("{}: {}", warning.entry_timestamp, labels.join(", "))
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
