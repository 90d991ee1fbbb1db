//! Escalation notifications.
//!
//! This module contains:
//! - Coordinates, safe locations, and the distance port
//! - Alert message formatting
//! - The messaging port with SMS and dry-run transports
//! - The dispatcher that ties them together

pub mod dispatcher;
pub mod geo;
pub mod message;
pub mod transport;

pub use dispatcher::{
    DispatcherConfig, NotificationDispatcher, NotifyError, DEFAULT_NOTIFY_TIMEOUT,
    DEFAULT_RETRY_BACKOFF,
};
pub use geo::{
    nearest_safe_location, Coordinates, DistancePort, Haversine, MonitoredSite, NearestLocation,
    SafeLocation, EARTH_MEAN_RADIUS_KM,
};
pub use message::{format_alert, EscalationContext, NotificationEvent};
pub use transport::{
    Ack, DryRunMessenger, Messenger, SmsConfig, SmsGateway, Transport, TransportError,
};
