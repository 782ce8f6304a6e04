use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    error::EventError,
    storage::{BanTarget, LoginSurface},
};

/// Represents events that can be emitted by the event bus
///
/// Events notify interested parties (audit logs, alerting) about failed
/// logins and ban changes. They are informational: a failing handler never
/// changes the outcome of the operation that emitted the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Emitted after a failed login has been recorded and counted.
    LoginFailed {
        /// Client address, empty if unknown
        ip_address: String,
        /// The submitted username
        username: String,
        /// Which login entry point was used
        surface: LoginSurface,
        /// Attempts from this IP inside the window, `None` when IP checks are disabled
        ip_attempts: Option<u32>,
        /// Attempts for this username inside the window
        username_attempts: u32,
        /// When the attempt occurred
        timestamp: DateTime<Utc>,
    },

    /// Emitted when a threshold is crossed for a key with no ban yet.
    ///
    /// This is a security-relevant event that should trigger alerts.
    BanIssued {
        target: BanTarget,
        /// The attempt count that crossed the threshold, `None` for operator bans
        attempts: Option<u32>,
        timestamp: DateTime<Utc>,
    },

    /// Emitted when a threshold is crossed again for an already banned key.
    BanRenewed {
        target: BanTarget,
        attempts: Option<u32>,
        timestamp: DateTime<Utc>,
    },

    /// Emitted when a ban is removed by an operator.
    BanLifted {
        target: BanTarget,
        timestamp: DateTime<Utc>,
    },
}

/// A trait for handling events emitted by the event bus
///
/// # Examples
///
/// ```
/// # use loginlimit_core::events::{Event, EventHandler};
/// # use loginlimit_core::error::EventError;
/// # use async_trait::async_trait;
/// struct MyHandler;
///
/// #[async_trait]
/// impl EventHandler for MyHandler {
///     async fn handle_event(&self, event: &Event) -> Result<(), EventError> {
///         // Handle the event...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle_event(&self, event: &Event) -> Result<(), EventError>;
}

/// Event bus that can emit events and register event handlers
///
/// Cloning the bus is cheap; clones share the same handler list.
#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register an event handler with the event bus
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().await.push(handler);
    }

    /// Emit an event to all registered handlers
    ///
    /// Stops at the first handler error and returns it.
    pub async fn emit(&self, event: &Event) -> Result<(), EventError> {
        for handler in self.handlers.read().await.iter() {
            handler.handle_event(event).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct TestEventHandler {
        called: Arc<AtomicBool>,
        call_count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for TestEventHandler {
        async fn handle_event(&self, _event: &Event) -> Result<(), EventError> {
            self.called.store(true, Ordering::SeqCst);
            self.call_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ErroringEventHandler;

    #[async_trait]
    impl EventHandler for ErroringEventHandler {
        async fn handle_event(&self, _event: &Event) -> Result<(), EventError> {
            Err(EventError::HandlerError("Test error".into()))
        }
    }

    fn ban_issued() -> Event {
        Event::BanIssued {
            target: BanTarget::Ip("10.0.0.1".to_string()),
            attempts: Some(3),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_empty() {
        let event_bus = EventBus::default();

        // Should succeed with no handlers
        event_bus
            .emit(&ban_issued())
            .await
            .expect("Failed to emit event");
    }

    #[tokio::test]
    async fn test_event_bus_multiple_handlers() {
        let event_bus = EventBus::default();
        let called1 = Arc::new(AtomicBool::new(false));
        let count1 = Arc::new(AtomicUsize::new(0));
        let called2 = Arc::new(AtomicBool::new(false));
        let count2 = Arc::new(AtomicUsize::new(0));

        event_bus
            .register(Arc::new(TestEventHandler {
                called: called1.clone(),
                call_count: count1.clone(),
            }))
            .await;
        event_bus
            .register(Arc::new(TestEventHandler {
                called: called2.clone(),
                call_count: count2.clone(),
            }))
            .await;

        event_bus
            .emit(&ban_issued())
            .await
            .expect("Failed to emit event");

        assert!(called1.load(Ordering::SeqCst), "First handler was not called");
        assert!(called2.load(Ordering::SeqCst), "Second handler was not called");
        assert_eq!(count1.load(Ordering::SeqCst), 1);
        assert_eq!(count2.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_event_bus_error_propagation() {
        let event_bus = EventBus::default();
        event_bus.register(Arc::new(ErroringEventHandler)).await;

        let result = event_bus.emit(&ban_issued()).await;
        assert!(matches!(result.unwrap_err(), EventError::HandlerError(_)));
    }

    #[tokio::test]
    async fn test_clones_share_handlers() {
        let event_bus = EventBus::default();
        let clone = event_bus.clone();
        let called = Arc::new(AtomicBool::new(false));
        let count = Arc::new(AtomicUsize::new(0));

        clone
            .register(Arc::new(TestEventHandler {
                called: called.clone(),
                call_count: count.clone(),
            }))
            .await;

        let events = vec![
            Event::LoginFailed {
                ip_address: "10.0.0.1".to_string(),
                username: "alice".to_string(),
                surface: LoginSurface::Frontend,
                ip_attempts: Some(1),
                username_attempts: 1,
                timestamp: Utc::now(),
            },
            ban_issued(),
            Event::BanRenewed {
                target: BanTarget::Username("alice".to_string()),
                attempts: Some(4),
                timestamp: Utc::now(),
            },
            Event::BanLifted {
                target: BanTarget::Username("alice".to_string()),
                timestamp: Utc::now(),
            },
        ];

        for event in events {
            event_bus.emit(&event).await.expect("Failed to emit event");
        }

        assert!(called.load(Ordering::SeqCst));
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }
}
