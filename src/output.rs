use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use crate::cli::OutputFormat;

static FORMAT: AtomicU8 = AtomicU8::new(0);
static QUIET: AtomicBool = AtomicBool::new(false);

pub fn set_format(format: OutputFormat) {
    let code = match format {
        OutputFormat::Table => 0,
        OutputFormat::Json => 1,
        OutputFormat::Compact => 2,
    };
    FORMAT.store(code, Ordering::Relaxed);
}

pub fn format() -> OutputFormat {
    match FORMAT.load(Ordering::Relaxed) {
        1 => OutputFormat::Json,
        2 => OutputFormat::Compact,
        _ => OutputFormat::Table,
    }
}

pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

pub fn is_json() -> bool {
    matches!(format(), OutputFormat::Json)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

/// Print rows as a table, one compact line each, or JSON.
pub fn print_table<T, R, F, C>(items: &[T], to_row: F, to_compact: C)
where
    T: Serialize,
    R: Tabled,
    F: Fn(&T) -> R,
    C: Fn(&T) -> String,
{
    match format() {
        OutputFormat::Json => print_json(items),
        OutputFormat::Compact => {
            for item in items {
                println!("{}", to_compact(item));
            }
        }
        OutputFormat::Table => {
            let rows: Vec<R> = items.iter().map(to_row).collect();
            println!("{}", Table::new(rows).with(Style::rounded()));
        }
    }
}

/// Print a single item or JSON depending on output mode
pub fn print_item<T: Serialize + ?Sized>(item: &T, display: impl FnOnce(&T)) {
    if is_json() {
        print_json(item);
    } else {
        display(item);
    }
}

/// Success message; silent under `--quiet`.
pub fn print_message(message: &str) {
    if QUIET.load(Ordering::Relaxed) {
        return;
    }
    if is_json() {
        print_json(&serde_json::json!({ "message": message }));
    } else {
        println!("{message}");
    }
}

pub fn format_date(iso: &str) -> String {
    match iso.parse::<DateTime<Utc>>() {
        Ok(dt) => DateTime::<Local>::from(dt).format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => date_part(iso),
    }
}

pub fn format_date_only(iso: &str) -> String {
    match iso.parse::<DateTime<Utc>>() {
        Ok(dt) => dt.format("%Y-%m-%d").to_string(),
        Err(_) => date_part(iso),
    }
}

/// "just now", "5 mins ago", ... falling back to the date after 30 days.
pub fn format_relative(iso: &str) -> String {
    let Ok(dt) = iso.parse::<DateTime<Utc>>() else {
        return date_part(iso);
    };
    let diff = Utc::now().signed_duration_since(dt);

    let (n, unit) = if diff.num_seconds() < 60 {
        return "just now".to_string();
    } else if diff.num_minutes() < 60 {
        (diff.num_minutes(), "min")
    } else if diff.num_hours() < 24 {
        (diff.num_hours(), "hour")
    } else if diff.num_days() < 30 {
        (diff.num_days(), "day")
    } else {
        return format_date_only(iso);
    };
    format!("{n} {unit}{} ago", if n == 1 { "" } else { "s" })
}

fn date_part(iso: &str) -> String {
    iso.split(['T', ' ']).next().unwrap_or(iso).to_string()
}

pub fn date_or_dash(value: Option<&str>) -> String {
    value.map(|v| format_date(v)).unwrap_or_else(|| "-".to_string())
}

/// Truncate on a character boundary, with an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

pub fn human_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Impresora sin tóner en el piso", 12), "Impresora...");
        assert_eq!(truncate("ñññññ", 4), "ñ...");
    }

    #[test]
    fn test_date_fallbacks() {
        assert_eq!(format_date_only("2024-05-01T10:00:00Z"), "2024-05-01");
        assert_eq!(format_date_only("2024-05-01 10:00:00"), "2024-05-01");
        assert_eq!(format_relative("garbage"), "garbage");
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(10 * 1024 * 1024), "10.0 MB");
    }
}
