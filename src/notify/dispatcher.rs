//! Notification dispatch.
//!
//! Finds the nearest safe location, formats the alert, and hands it to the
//! messaging port under a timeout. Failures come back as [`NotifyError`] and
//! are never fatal to the caller.

use crate::notify::geo::{
    nearest_safe_location, DistancePort, Haversine, MonitoredSite, SafeLocation,
};
use crate::notify::message::{format_alert, EscalationContext, NotificationEvent};
use crate::notify::transport::{Ack, Messenger, TransportError};
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Default bound on a single send.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default pause before the single retry.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Delivery tunables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatcherConfig {
    /// Upper bound for one send attempt
    pub timeout: Duration,
    /// Retry once after `backoff` when the first attempt fails
    pub retry: bool,
    pub backoff: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_NOTIFY_TIMEOUT,
            retry: true,
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

/// Dispatch failures.
#[derive(Debug, Clone, PartialEq)]
pub enum NotifyError {
    /// The messaging call did not finish in time
    Timeout(Duration),
    /// The messaging port reported an error
    Transport(TransportError),
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Timeout(d) => write!(f, "notification timed out after {:?}", d),
            NotifyError::Transport(e) => write!(f, "notification failed: {e}"),
        }
    }
}

impl std::error::Error for NotifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NotifyError::Transport(e) => Some(e),
            NotifyError::Timeout(_) => None,
        }
    }
}

impl From<TransportError> for NotifyError {
    fn from(e: TransportError) -> Self {
        NotifyError::Transport(e)
    }
}

/// Sends escalation alerts through a [`Messenger`].
pub struct NotificationDispatcher<M: Messenger> {
    messenger: M,
    recipient: String,
    site: MonitoredSite,
    safe_locations: Vec<SafeLocation>,
    distance: Box<dyn DistancePort>,
    config: DispatcherConfig,
}

impl<M: Messenger> NotificationDispatcher<M> {
    /// Create a dispatcher using haversine distances.
    pub fn new(
        messenger: M,
        recipient: impl Into<String>,
        site: MonitoredSite,
        safe_locations: Vec<SafeLocation>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            messenger,
            recipient: recipient.into(),
            site,
            safe_locations,
            distance: Box::new(Haversine),
            config,
        }
    }

    /// Swap the distance implementation.
    pub fn with_distance(mut self, distance: Box<dyn DistancePort>) -> Self {
        self.distance = distance;
        self
    }

    pub fn messenger(&self) -> &M {
        &self.messenger
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn site(&self) -> &MonitoredSite {
        &self.site
    }

    pub fn config(&self) -> DispatcherConfig {
        self.config
    }

    /// Build the notification without sending it.
    pub fn prepare(&self, context: &EscalationContext) -> NotificationEvent {
        let nearest = nearest_safe_location(
            self.distance.as_ref(),
            self.site.coordinates,
            &self.safe_locations,
        );

        NotificationEvent {
            id: Uuid::new_v4(),
            message: format_alert(&self.site, context, nearest.as_ref()),
            current_coordinates: self.site.coordinates,
            distance_km: nearest.as_ref().map(|n| n.distance_km),
            nearest_location: nearest.map(|n| n.location),
            timestamp: context.timestamp,
        }
    }

    /// Format and deliver an alert for `context`.
    pub async fn dispatch(&self, context: &EscalationContext) -> Result<Ack, NotifyError> {
        let event = self.prepare(context);
        if event.nearest_location.is_none() {
            warn!("No safe location configured; sending alert without guidance");
        }

        let first = self.attempt(&event).await;
        let result = match first {
            Err(e) if self.config.retry => {
                warn!(
                    notification = %event.id,
                    error = %e,
                    "Notification failed, retrying in {:?}",
                    self.config.backoff
                );
                tokio::time::sleep(self.config.backoff).await;
                self.attempt(&event).await
            }
            other => other,
        };

        match &result {
            Ok(ack) => info!(
                notification = %event.id,
                message_id = %ack.message_id,
                tick = context.tick,
                "Escalation alert delivered"
            ),
            Err(e) => error!(
                notification = %event.id,
                tick = context.tick,
                error = %e,
                "Escalation alert not delivered"
            ),
        }
        result
    }

    async fn attempt(&self, event: &NotificationEvent) -> Result<Ack, NotifyError> {
        match tokio::time::timeout(
            self.config.timeout,
            self.messenger.send(&self.recipient, &event.message),
        )
        .await
        {
            Ok(sent) => sent.map_err(NotifyError::from),
            Err(_) => Err(NotifyError::Timeout(self.config.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::geo::Coordinates;
    use crate::notify::transport::DryRunMessenger;
    use chrono::Utc;

    fn site() -> MonitoredSite {
        MonitoredSite {
            name: "Imja Tsho".to_string(),
            coordinates: Coordinates::new(27.8983, 86.9250),
            timezone: "Asia/Kathmandu".to_string(),
        }
    }

    fn context() -> EscalationContext {
        EscalationContext {
            tick: 3,
            probability: 0.9,
            contributing_factors: vec!["Water_Level_m".to_string()],
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_prepare_picks_nearest() {
        let dispatcher = NotificationDispatcher::new(
            DryRunMessenger,
            "+100",
            site(),
            vec![
                SafeLocation::new("Namche Bazaar", 27.8050, 86.7139),
                SafeLocation::new("Dingboche", 27.8925, 86.8306),
            ],
            DispatcherConfig::default(),
        );
        let event = dispatcher.prepare(&context());
        assert_eq!(event.nearest_location.unwrap().name, "Dingboche");
        assert!(event.distance_km.unwrap() < 10.0);
        assert_eq!(event.current_coordinates, site().coordinates);
    }

    #[test]
    fn test_prepare_without_locations() {
        let dispatcher = NotificationDispatcher::new(
            DryRunMessenger,
            "+100",
            site(),
            Vec::new(),
            DispatcherConfig::default(),
        );
        let event = dispatcher.prepare(&context());
        assert!(event.nearest_location.is_none());
        assert!(event.distance_km.is_none());
        assert!(event.message.contains("No safe location available"));
    }

    #[test]
    fn test_notify_error_display() {
        let err = NotifyError::Timeout(Duration::from_secs(10));
        assert!(err.to_string().contains("timed out"));

        let err = NotifyError::from(TransportError::Server {
            status: 401,
            message: "bad auth".to_string(),
        });
        assert!(err.to_string().contains("401"));
    }
}
