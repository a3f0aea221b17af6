//! UI utilities for command output.

use crossterm::style::Stylize;

/// Print a small section title.
pub fn print_section(title: &str) {
    println!();
    println!("  {} {}", "▸".dark_cyan(), title.white().bold());
    println!("  {}", "─".repeat(50).dark_grey());
}

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green(), msg);
}

/// Print an info message on stderr so streamed output stays clean.
pub fn print_info(msg: &str) {
    eprintln!("  {} {}", "ℹ".blue(), msg);
}

/// Print a key-value pair.
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<14} {}", format!("{}:", key).dark_grey(), value);
}

/// Print a table header.
pub fn print_table_header(columns: &[(&str, usize)]) {
    let header: String = columns
        .iter()
        .map(|(name, width)| format!("{:<width$}", name, width = width))
        .collect::<Vec<_>>()
        .join(" ");
    println!("  {}", header.white().bold());
    let separator: String = columns
        .iter()
        .map(|(_, width)| "─".repeat(*width))
        .collect::<Vec<_>>()
        .join(" ");
    println!("  {}", separator.dark_grey());
}

/// Print an empty state message.
pub fn print_empty(msg: &str) {
    println!();
    println!("  {}", msg.dark_grey().italic());
    println!();
}

/// Print a hint/tip message.
pub fn print_hint(msg: &str) {
    println!("  {} {}", "💡".yellow(), msg.dark_grey());
}

/// Comma separated stream types, `all` when empty.
pub fn format_types(types: &[String]) -> String {
    if types.is_empty() {
        "all".to_string()
    } else {
        types.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn types_column() {
        assert_eq!(format_types(&[]), "all");
        assert_eq!(
            format_types(&["stdout".to_string(), "stderr".to_string()]),
            "stdout,stderr"
        );
    }
}
