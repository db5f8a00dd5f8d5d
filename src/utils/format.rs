use std::time::Duration;

/// 紧凑的字节数显示：整数不带小数（"5MB"），否则保留一位（"1.5MB"）
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut unit = 0;
    let mut whole = bytes;
    while whole >= 1024 && unit < UNITS.len() - 1 {
        whole /= 1024;
        unit += 1;
    }

    let scale = 1u64 << (10 * unit);
    if bytes % scale == 0 {
        return format!("{}{}", bytes / scale, UNITS[unit]);
    }

    let tenths = (bytes as f64 / scale as f64 * 10.0).round() / 10.0;
    if tenths.fract() == 0.0 {
        format!("{}{}", tenths as u64, UNITS[unit])
    } else {
        format!("{:.1}{}", tenths, UNITS[unit])
    }
}

/// 格式化持续时间
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else if secs > 0 {
        format!("{}s", seconds)
    } else {
        format!("{}ms", duration.as_millis())
    }
}
