use vendorwatch_domain::{StoredState, ThreadSummaryEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Compact,
    Full,
}

impl Format {
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("full") => Self::Full,
            _ => Self::Compact,
        }
    }
}

pub fn format_state(state: &StoredState, fmt: Format) -> String {
    match fmt {
        Format::Compact => {
            let mut lines = Vec::with_capacity(3);
            lines.push(format!(
                "vendor: {}",
                state.vendor_email.as_deref().unwrap_or("(not set)")
            ));
            match (&state.last_summary, state.last_summary_at) {
                (Some(summary), at) => {
                    let when = at.map(format_timestamp).unwrap_or_else(|| "unknown".to_string());
                    lines.push(format!("last summary ({when}):"));
                    lines.push(summary.trim_end().to_string());
                }
                (None, _) => lines.push("last summary: (none)".to_string()),
            }
            lines.join("\n")
        }
        Format::Full => to_json(state),
    }
}

pub fn format_entries(entries: &[ThreadSummaryEntry], fmt: Format) -> String {
    match fmt {
        Format::Compact => {
            let mut lines: Vec<String> = Vec::with_capacity(entries.len() + 1);
            let noun = if entries.len() == 1 { "email" } else { "emails" };
            lines.push(format!("{} {noun}:", entries.len()));
            for (i, e) in entries.iter().enumerate() {
                lines.push(format!("  {}. {}", i + 1, truncate(&e.to_string(), 120)));
            }
            lines.join("\n")
        }
        Format::Full => to_json(entries),
    }
}

pub fn format_timestamp(ts: i64) -> String {
    match chrono::DateTime::from_timestamp(ts, 0) {
        Some(dt) => dt.format("%b %d %H:%M UTC").to_string(),
        None => format!("{ts}"),
    }
}

fn truncate(s: &str, max: usize) -> String {
    let oneline: String = s
        .chars()
        .filter(|c| *c != '\r')
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();
    if oneline.chars().count() > max {
        let truncated: String = oneline.chars().take(max).collect();
        format!("{truncated}...")
    } else {
        oneline
    }
}

fn to_json<T: serde::Serialize + ?Sized>(val: &T) -> String {
    serde_json::to_string(val).unwrap_or_else(|e| format!("serialization error: {e}"))
}
