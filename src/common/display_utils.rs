//! Display utility functions for formatting status output.

use console::Style;

/// Format a byte count as a human-readable string
pub fn format_size(size: u64) -> String {
    #[allow(clippy::cast_precision_loss)]
    let value = size as f64;
    if value < 1024.0 {
        format!("{size} B")
    } else if value < 1024.0 * 1024.0 {
        format!("{:.1} KB", value / 1024.0)
    } else if value < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.1} MB", value / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", value / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Print a bold label followed by a value, indented by two spaces
pub fn print_field(label: &str, value: impl std::fmt::Display) {
    println!("  {} {}", Style::new().bold().apply_to(label), value);
}
