//! Compact output rendering helpers for CLI surfaces.

use crate::core::error::FleetError;
use crate::core::time;

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn is_json(&self) -> bool {
        *self == OutputFormat::Json
    }
}

/// Print the standard command envelope as pretty JSON.
pub fn print_envelope(cmd: &str, status: &str, extra: serde_json::Value) -> Result<(), FleetError> {
    let envelope = time::command_envelope(cmd, status, extra);
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

/// Collapse newlines/extra whitespace and bound length for terminal display.
pub fn compact_line(input: &str, max_chars: usize) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    let preview: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", preview)
    } else {
        preview
    }
}

/// Bay grid rendering: `[ 1 E][ 2 A]...`, `per_row` cells per line.
pub fn bay_grid(cells: &[(u32, char)], per_row: usize) -> String {
    let per_row = per_row.max(1);
    cells
        .chunks(per_row)
        .map(|row| {
            row.iter()
                .map(|(id, glyph)| format!("[{:>2} {}]", id, glyph))
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
