//! Alert message formatting.

use crate::notify::geo::{Coordinates, MonitoredSite, NearestLocation, SafeLocation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the evaluation loop knows when an escalation fires.
#[derive(Debug, Clone, PartialEq)]
pub struct EscalationContext {
    pub tick: u64,
    pub probability: f64,
    pub contributing_factors: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// A formatted notification, ready to send. Not retained after dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: Uuid,
    pub message: String,
    pub current_coordinates: Coordinates,
    pub nearest_location: Option<SafeLocation>,
    pub distance_km: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Render a timestamp in the site's timezone, falling back to UTC.
fn local_time(timestamp: DateTime<Utc>, timezone: &str) -> String {
    match timezone.parse::<chrono_tz::Tz>() {
        Ok(tz) => timestamp
            .with_timezone(&tz)
            .format("%Y-%m-%d %H:%M %Z")
            .to_string(),
        Err(_) => timestamp.format("%Y-%m-%d %H:%M UTC").to_string(),
    }
}

/// Build the SMS body for an escalation.
pub fn format_alert(
    site: &MonitoredSite,
    context: &EscalationContext,
    nearest: Option<&NearestLocation>,
) -> String {
    let mut lines = vec![
        format!(
            "GLOF ALERT: high flood risk ({:.0}%) at {}.",
            context.probability * 100.0,
            site.name
        ),
        format!(
            "Risk location: {} {}",
            site.coordinates,
            site.coordinates.maps_url()
        ),
    ];

    match nearest {
        Some(nearest) => {
            lines.push(format!(
                "Nearest safe location: {} ({}), {:.1} km away.",
                nearest.location.name, nearest.location.coordinates, nearest.distance_km
            ));
            lines.push(format!(
                "Route: {}",
                nearest.location.coordinates.maps_url()
            ));
        }
        None => lines.push(
            "No safe location available; follow local evacuation orders.".to_string(),
        ),
    }

    if !context.contributing_factors.is_empty() {
        lines.push(format!(
            "Contributing factors: {}",
            context.contributing_factors.join(", ")
        ));
    }
    lines.push(format!(
        "Issued {}",
        local_time(context.timestamp, &site.timezone)
    ));

    lines.join("\n")
}
