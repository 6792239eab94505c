use super::Formatter;
use crate::processing::NavigationSnapshot;

/// One JSON object per snapshot, `null` for gated values
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self, snapshot: &NavigationSnapshot) -> String {
        serde_json::to_string(snapshot).unwrap_or_else(|e| {
            log::warn!("failed to serialize snapshot: {}", e);
            String::from("{}")
        })
    }
}
