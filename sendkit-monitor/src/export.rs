//! Text metrics export (spec §4.G Export; DESIGN.md Open Question #2):
//! `metric_name{label="value",...} numeric_value` lines, newline
//! terminated, no `# HELP`/`# TYPE` comments.

use std::fmt::Write as _;

/// Accumulates metric lines in the order they're pushed. `push` escapes
/// nothing beyond what the spec requires (label values here are always
/// queue names or domains, never free text).
#[derive(Default)]
pub struct TextExporter {
    buffer: String,
}

impl TextExporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, labels: &[(&str, &str)], value: f64) {
        let _ = write!(self.buffer, "{name}");
        if !labels.is_empty() {
            let _ = write!(self.buffer, "{{");
            for (i, (k, v)) in labels.iter().enumerate() {
                if i > 0 {
                    let _ = write!(self.buffer, ",");
                }
                let _ = write!(self.buffer, "{k}=\"{v}\"");
            }
            let _ = write!(self.buffer, "}}");
        }
        let _ = writeln!(self.buffer, " {value}");
    }

    #[must_use]
    pub fn finish(self) -> String {
        self.buffer
    }
}

/// Human-readable byte formatting, part of the export surface (spec §4.G).
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes}B")
    } else {
        format!("{value:.1}{}", UNITS[unit])
    }
}

/// Human-readable duration formatting, part of the export surface.
#[must_use]
pub fn format_duration_ms(ms: u64) -> String {
    if ms < 1000 {
        format!("{ms}ms")
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{:.1}m", ms as f64 / 60_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_formats_labeled_line() {
        let mut exporter = TextExporter::new();
        exporter.push("queue_depth", &[("queue", "HIGH_PRIORITY")], 12.0);
        assert_eq!(exporter.finish(), "queue_depth{queue=\"HIGH_PRIORITY\"} 12\n");
    }

    #[test]
    fn push_without_labels_omits_braces() {
        let mut exporter = TextExporter::new();
        exporter.push("error_rate", &[], 0.2);
        assert_eq!(exporter.finish(), "error_rate 0.2\n");
    }

    #[test]
    fn bytes_and_duration_formatting() {
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(2048), "2.0KB");
        assert_eq!(format_duration_ms(500), "500ms");
        assert_eq!(format_duration_ms(1500), "1.5s");
        assert_eq!(format_duration_ms(90_000), "1.5m");
    }
}
