//! Notification fan-out helpers

use serde_json::json;
use tracing::{info, warn};

use super::host::EntityHost;

/// Split a `domain.service` identifier
pub fn parse_service_id(id: &str) -> Option<(&str, &str)> {
    let (domain, service) = id.trim().split_once('.')?;
    if domain.is_empty() || service.is_empty() {
        return None;
    }
    Some((domain, service))
}

/// Send `{message, title}` to every target, fire-and-forget.
///
/// A failing or malformed target is logged and skipped; the rest still go
/// out. Returns how many calls the host accepted.
pub async fn dispatch(
    host: &dyn EntityHost,
    targets: &[String],
    message: &str,
    title: &str,
    context: &str,
) -> usize {
    let mut sent = 0;
    for target in targets {
        let Some((domain, service)) = parse_service_id(target) else {
            warn!("[{}] Invalid notification service format: {:?}", context, target);
            continue;
        };

        info!("[{}] Sending notification to {}.{}: '{}'", context, domain, service, message);
        match host
            .call_service(domain, service, json!({"message": message, "title": title}), false)
            .await
        {
            Ok(()) => sent += 1,
            Err(e) => warn!("[{}] Failed to send notification to {}: {}", context, target, e),
        }
    }
    sent
}

/// Render a usage counter for operator messages.
///
/// Returns the formatted value and its unit label.
pub fn format_usage(total_seconds: i64, show_seconds: bool) -> (String, &'static str) {
    let total = total_seconds.max(0);
    if show_seconds {
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;
        (format!("{:02}:{:02}:{:02}", hours, minutes, seconds), "(hh:mm:ss)")
    } else {
        let total_minutes = total / 60;
        (
            format!("{:02}:{:02}", total_minutes / 60, total_minutes % 60),
            "(hh:mm)",
        )
    }
}
