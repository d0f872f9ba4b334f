//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.

use std::io::{self, Write};

use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::OutputFormat;

/// Resolved output settings handed to every command handler.
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl Printer {
    pub fn print(self, rendered: &str) {
        print_output(rendered, self.quiet);
    }

    /// Short status line on stderr, suppressed by `--quiet`.
    pub fn status(self, message: &str) {
        if !self.quiet {
            eprintln!("{message}");
        }
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serializable items, mapping each to a table row.
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => data.iter().map(&id_fn).collect::<Vec<_>>().join("\n"),
    }
}

/// Render one item. Table mode uses `detail_fn` for a key/value view.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: Serialize + ?Sized,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => id_fn(data),
    }
}

/// Render an untyped JSON payload (history, logbook, tool results).
///
/// There is no sensible table for arbitrary JSON, so table and plain
/// modes fall back to pretty JSON; a bare string is printed as-is.
pub fn render_value(format: OutputFormat, value: &serde_json::Value) -> String {
    match (format, value) {
        (OutputFormat::Table | OutputFormat::Plain, serde_json::Value::String(text)) => {
            text.clone()
        }
        (OutputFormat::Table | OutputFormat::Plain | OutputFormat::Json, _) => {
            render_json(value, false)
        }
        (OutputFormat::JsonCompact, _) => render_json(value, true),
        (OutputFormat::Yaml, _) => render_yaml(value),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

/// Key/value detail view used by `render_single` in table mode.
pub fn detail_lines(pairs: &[(&str, String)]) -> String {
    let width = pairs.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    pairs
        .iter()
        .map(|(k, v)| format!("{k:<width$}  {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: Serialize + ?Sized>(data: &T, compact: bool) -> String {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.unwrap_or_else(|e| format!("{{\"error\": \"serialization failed: {e}\"}}"))
}

fn render_yaml<T: Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).unwrap_or_else(|e| format!("# serialization failed: {e}"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Serialize)]
    struct Item {
        id: String,
    }

    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "ID")]
        id: String,
    }

    fn items() -> Vec<Item> {
        vec![Item { id: "a".into() }, Item { id: "b".into() }]
    }

    #[test]
    fn plain_lists_identifiers() {
        let out = render_list(
            OutputFormat::Plain,
            &items(),
            |i| Row { id: i.id.clone() },
            |i| i.id.clone(),
        );
        assert_eq!(out, "a\nb");
    }

    #[test]
    fn table_has_header_and_rows() {
        let out = render_list(
            OutputFormat::Table,
            &items(),
            |i| Row { id: i.id.clone() },
            |i| i.id.clone(),
        );
        assert!(out.contains("ID"));
        assert!(out.contains('a'));
        assert!(out.contains('b'));
    }

    #[test]
    fn compact_json_is_single_line() {
        let out = render_value(OutputFormat::JsonCompact, &json!({ "ok": true }));
        assert_eq!(out, r#"{"ok":true}"#);
    }

    #[test]
    fn raw_text_body_prints_verbatim_in_table_mode() {
        let out = render_value(OutputFormat::Table, &json!("plain text"));
        assert_eq!(out, "plain text");
    }

    #[test]
    fn detail_lines_align_keys() {
        let out = detail_lines(&[("id", "x".into()), ("state", "on".into())]);
        assert_eq!(out, "id     x\nstate  on");
    }
}
