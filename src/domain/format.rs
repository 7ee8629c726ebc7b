// Human-readable magnitudes for axis labels and legends
use super::chart::ValueFormat;

const BYTE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
const BIT_RATE_UNITS: [&str; 4] = ["bps", "Kbps", "Mbps", "Gbps"];

/// Render `value` with at most `digits` decimals, dropping trailing zeros
/// ("1.50" becomes "1.5", "2.00" becomes "2").
fn trimmed(value: f64, digits: usize) -> String {
    let text = format!("{:.*}", digits, value);
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

fn scaled(value: f64, base: f64, units: &[&str]) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("0 {}", units[0]);
    }

    let exponent = (value.abs().ln() / base.ln()).floor();
    let idx = exponent.clamp(0.0, (units.len() - 1) as f64) as usize;
    let unit_value = value / base.powi(idx as i32);
    format!("{} {}", trimmed(unit_value, 2), units[idx])
}

/// Base-1024 byte count, e.g. `1536.0` -> `"1.5 KB"`.
pub fn format_bytes(bytes: f64) -> String {
    scaled(bytes, 1024.0, &BYTE_UNITS)
}

/// Base-1000 bit rate, e.g. `2_500_000.0` -> `"2.5 Mbps"`.
pub fn format_bps(bps: f64) -> String {
    scaled(bps, 1000.0, &BIT_RATE_UNITS)
}

pub fn format_percent(value: f64) -> String {
    format!("{}%", trimmed(value, 1))
}

pub fn format_value(value: f64, format: ValueFormat) -> String {
    match format {
        ValueFormat::Bytes => format_bytes(value),
        ValueFormat::BytesPerSecond => format!("{}/s", format_bytes(value)),
        ValueFormat::BitsPerSecond => format_bps(value),
        ValueFormat::Percent => format_percent(value),
        ValueFormat::Plain => trimmed(value, 2),
    }
}

/// Theme token for a 0-100 utilisation reading.
pub fn health_color(value: f64) -> &'static str {
    if value >= 90.0 {
        "rose"
    } else if value >= 75.0 {
        "amber"
    } else if value >= 50.0 {
        "blue"
    } else {
        "emerald"
    }
}
