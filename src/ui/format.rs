use chrono::{DateTime, Utc};
use unicode_width::UnicodeWidthStr;

/// `mm:ss`, or `h:mm:ss` past the hour
pub fn format_clock(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

pub fn format_deadline(deadline: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let stamp = deadline.format("%Y-%m-%d %H:%M UTC");
    let left = deadline - now;
    if left.num_seconds() <= 0 {
        return format!("closed {}", stamp);
    }
    let (days, hours, mins) = (left.num_days(), left.num_hours() % 24, left.num_minutes() % 60);
    let rough = if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else {
        format!("{}m", mins.max(1))
    };
    format!("due {} (in {})", stamp, rough)
}

/// Rows a wrapped paragraph of `text` needs at `width` columns.
pub fn wrapped_height(text: &str, width: u16) -> u16 {
    let width = width.max(1) as usize;
    let rows: usize = text
        .split('\n')
        .map(|line| line.width().div_ceil(width).max(1))
        .sum();
    rows.min(u16::MAX as usize) as u16
}
