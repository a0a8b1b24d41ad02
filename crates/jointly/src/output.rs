//! Rendering behind the `--output` flag.
//!
//! Commands build their own table rows and plain identifiers; the
//! structured formats serialize the underlying record instead, so
//! `-o json` carries the full data even where the table view condenses
//! it (e.g. the joints gauge column).

use std::io::{self, IsTerminal, Write};

use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};

// ── Renderer ─────────────────────────────────────────────────────────

/// Output sink for one CLI invocation: selected format plus quiet mode.
pub struct Renderer {
    format: OutputFormat,
    quiet: bool,
}

impl Renderer {
    pub fn new(global: &GlobalOpts) -> Self {
        Self {
            format: global.output,
            quiet: global.quiet,
        }
    }

    /// Print a listing. `row` feeds the table view; `name` feeds the
    /// one-per-line plain view.
    pub fn listing<T, R>(&self, records: &[T], row: impl Fn(&T) -> R, name: impl Fn(&T) -> String)
    where
        T: Serialize,
        R: Tabled,
    {
        self.emit(&listing_text(self.format, records, row, name));
    }

    /// Print a single record; `body` is the prebuilt human view and
    /// `name` the plain-format identifier.
    pub fn record<T: Serialize>(&self, record: &T, body: String, name: String) {
        let text = match self.format {
            OutputFormat::Table => body,
            OutputFormat::Plain => name,
            _ => structured(self.format, record),
        };
        self.emit(&text);
    }

    /// Print one message of a stream. `line` supplies the human view;
    /// both json formats stay one message per line so the stream pipes
    /// into line-oriented tools, and yaml messages become documents of
    /// a multi-doc stream.
    pub fn stream_item<T: Serialize + ?Sized>(&self, item: &T, line: impl FnOnce() -> String) {
        let text = match self.format {
            OutputFormat::Table | OutputFormat::Plain => line(),
            OutputFormat::Json | OutputFormat::JsonCompact => json_compact(item),
            OutputFormat::Yaml => format!("---\n{}", yaml(item)),
        };
        self.emit(&text);
    }

    /// Write one block to stdout, unless quiet or empty.
    pub fn emit(&self, text: &str) {
        if self.quiet || text.is_empty() {
            return;
        }
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{text}");
    }
}

fn listing_text<T, R>(
    format: OutputFormat,
    records: &[T],
    row: impl Fn(&T) -> R,
    name: impl Fn(&T) -> String,
) -> String
where
    T: Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = records.iter().map(row).collect();
            Table::new(rows).with(Style::rounded()).to_string()
        }
        OutputFormat::Plain => records.iter().map(name).collect::<Vec<_>>().join("\n"),
        _ => structured(format, records),
    }
}

fn structured<T: Serialize + ?Sized>(format: OutputFormat, record: &T) -> String {
    match format {
        OutputFormat::JsonCompact => json_compact(record),
        OutputFormat::Yaml => yaml(record),
        _ => json_pretty(record),
    }
}

// ── Serde renderers ──────────────────────────────────────────────────

pub(crate) fn json_pretty<T: Serialize + ?Sized>(record: &T) -> String {
    serde_json::to_string_pretty(record).expect("record serializes")
}

pub(crate) fn json_compact<T: Serialize + ?Sized>(record: &T) -> String {
    serde_json::to_string(record).expect("record serializes")
}

pub(crate) fn yaml<T: Serialize + ?Sized>(record: &T) -> String {
    serde_yaml::to_string(record).expect("record serializes")
}

// ── Color ────────────────────────────────────────────────────────────

/// Whether colored output is allowed for `mode` on this stdout.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Reading {
        name: &'static str,
        value: f64,
    }

    #[derive(Tabled)]
    struct ReadingRow {
        name: &'static str,
    }

    fn samples() -> Vec<Reading> {
        vec![
            Reading {
                name: "left_elbow_pitch",
                value: 0.5,
            },
            Reading {
                name: "left_elbow_roll",
                value: -0.1,
            },
        ]
    }

    #[test]
    fn plain_listing_is_one_name_per_line() {
        let text = listing_text(
            OutputFormat::Plain,
            &samples(),
            |r| ReadingRow { name: r.name },
            |r| r.name.to_owned(),
        );
        assert_eq!(text, "left_elbow_pitch\nleft_elbow_roll");
    }

    #[test]
    fn table_listing_uses_rows() {
        let text = listing_text(
            OutputFormat::Table,
            &samples(),
            |r| ReadingRow { name: r.name },
            |r| r.name.to_owned(),
        );
        assert!(text.contains("left_elbow_pitch"));
        // Table shows the row shape, not the serialized record.
        assert!(!text.contains("0.5"));
    }

    #[test]
    fn structured_listing_serializes_full_records() {
        let text = listing_text(
            OutputFormat::JsonCompact,
            &samples(),
            |r| ReadingRow { name: r.name },
            |r| r.name.to_owned(),
        );
        assert_eq!(
            text,
            r#"[{"name":"left_elbow_pitch","value":0.5},{"name":"left_elbow_roll","value":-0.1}]"#
        );
    }

    #[test]
    fn structured_yaml_round_trips() {
        let text = structured(
            OutputFormat::Yaml,
            &Reading {
                name: "head_yaw",
                value: 1.0,
            },
        );
        assert!(text.contains("name: head_yaw"));
    }
}
