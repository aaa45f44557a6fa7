//! Message bus: decode an inbound event, run its handler chain, record it,
//! and broadcast the result to its group.

pub mod errors;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use holotable_core::{Event, MessageError, MessageType};
use metrics::{counter, histogram};
use serde_json::Value;
use tracing::{Span, debug, error, instrument, warn};

use crate::websocket::registry::GroupRegistry;
use crate::metrics::{
    BUS_EVENTS_DROPPED_TOTAL, BUS_EVENTS_TOTAL, BUS_HANDLER_DURATION_SECONDS,
    BUS_HANDLER_ERRORS_TOTAL, BUS_HISTORY_ERRORS_TOTAL,
};

pub use errors::{BusError, HandlerError};

/// Maximum time a single handler (or the history sink) may run.
///
/// A timeout drops only the awaiting future. Work a handler already handed
/// to the blocking pool still runs to completion, so a store write can
/// commit for an event that is then neither recorded nor broadcast.
pub const HANDLER_TIMEOUT: Duration = Duration::from_secs(60);

/// One step of a handler chain.
///
/// Receives the event produced by the previous step and returns the event
/// passed to the next one. Returning an error aborts the chain.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Apply the event and return it, possibly rewritten.
    async fn handle(&self, event: Event) -> Result<Event, HandlerError>;
}

/// Durable record of every event that completed its chain.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistorySink: Send + Sync {
    /// Record the final event.
    async fn record(&self, event: &Event) -> Result<(), HandlerError>;
}

/// Why an inbound event was discarded without running any handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// The discriminator names no known type.
    UnknownType(String),
    /// The payload has no discriminator.
    MissingDiscriminator,
    /// The payload is not an object, or does not fit its type.
    Malformed(String),
    /// The type is known but nothing is registered for it.
    NoHandler(MessageType),
}

impl DropReason {
    /// Metrics label.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::UnknownType(_) => "unknown_type",
            Self::MissingDiscriminator => "missing_discriminator",
            Self::Malformed(_) => "malformed",
            Self::NoHandler(_) => "no_handler",
        }
    }
}

impl From<MessageError> for DropReason {
    fn from(err: MessageError) -> Self {
        match err {
            MessageError::UnknownMessageType(tag) => Self::UnknownType(tag),
            MessageError::MissingDiscriminator => Self::MissingDiscriminator,
            other => Self::Malformed(other.to_string()),
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType(tag) => write!(f, "unknown message type {tag:?}"),
            Self::MissingDiscriminator => f.write_str("missing message_type"),
            Self::Malformed(reason) => write!(f, "malformed payload: {reason}"),
            Self::NoHandler(t) => write!(f, "no handler registered for {t}"),
        }
    }
}

/// What happened to an event that did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The chain completed and the final event was broadcast.
    Delivered {
        /// Type of the final event (a chain may change it).
        message_type: MessageType,
        /// Group the event was broadcast to.
        group_name: String,
        /// Sockets in the group at broadcast time.
        recipients: usize,
        /// Whether the history sink stored the event.
        history_recorded: bool,
    },
    /// The event was discarded before any handler ran.
    Dropped(DropReason),
}

impl Outcome {
    /// Whether the event reached the broadcast step.
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Routes events to ordered handler chains keyed by [`MessageType`].
pub struct MessageBus {
    handlers: HashMap<MessageType, Vec<Arc<dyn MessageHandler>>>,
    history: Option<Arc<dyn HistorySink>>,
    registry: Arc<GroupRegistry>,
    handler_timeout: Duration,
}

impl MessageBus {
    /// Create a bus with no handlers that broadcasts through `registry`.
    pub fn new(registry: Arc<GroupRegistry>) -> Self {
        Self {
            handlers: HashMap::new(),
            history: None,
            registry,
            handler_timeout: HANDLER_TIMEOUT,
        }
    }

    /// Override the per-handler timeout.
    #[must_use]
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Append a handler to the chain for `message_type`.
    pub fn register_handler(
        &mut self,
        message_type: MessageType,
        handler: impl MessageHandler + 'static,
    ) {
        self.handlers
            .entry(message_type)
            .or_default()
            .push(Arc::new(handler));
    }

    /// Install the history sink, replacing any previous one.
    pub fn set_history_sink(&mut self, sink: impl HistorySink + 'static) {
        self.history = Some(Arc::new(sink));
    }

    /// Number of handlers registered for `message_type`.
    pub fn handler_count(&self, message_type: MessageType) -> usize {
        self.handlers.get(&message_type).map_or(0, Vec::len)
    }

    /// Registry used for the final broadcast.
    pub fn registry(&self) -> &Arc<GroupRegistry> {
        &self.registry
    }

    /// Process one raw inbound event.
    ///
    /// Undecodable and unhandled events come back as [`Outcome::Dropped`].
    /// A failing handler aborts the chain: nothing is recorded or broadcast.
    /// A failing history sink is logged and the broadcast still happens.
    #[instrument(skip_all, fields(message_type = tracing::field::Empty, group = tracing::field::Empty))]
    pub async fn process(&self, raw: Value) -> Result<Outcome, BusError> {
        let mut event = match Event::from_value(raw) {
            Ok(event) => event,
            Err(e) => return Ok(Self::dropped(DropReason::from(e))),
        };
        let message_type = event.message_type();
        let span = Span::current();
        let _ = span.record("message_type", message_type.as_str());
        let _ = span.record("group", event.group_name.as_str());

        let Some(chain) = self.handlers.get(&message_type).filter(|c| !c.is_empty()) else {
            return Ok(Self::dropped(DropReason::NoHandler(message_type)));
        };
        counter!(BUS_EVENTS_TOTAL, "message_type" => message_type.as_str()).increment(1);

        let start = Instant::now();
        for (index, handler) in chain.iter().enumerate() {
            event = self.run_handler(message_type, index, handler.as_ref(), event).await?;
        }
        let elapsed = start.elapsed();
        histogram!(BUS_HANDLER_DURATION_SECONDS, "message_type" => message_type.as_str())
            .record(elapsed.as_secs_f64());
        if elapsed.as_secs() >= 5 {
            warn!(duration_secs = elapsed.as_secs_f64(), "slow handler chain");
        }

        let final_type = event.message_type();
        let wire = event.to_wire().map_err(|source| BusError::Encode {
            message_type: final_type,
            source,
        })?;
        let history_recorded = self.record_history(&event).await;
        let report = self.registry.broadcast(&event.group_name, &wire);
        debug!(
            final_type = final_type.as_str(),
            recipients = report.recipients,
            history_recorded,
            "event delivered"
        );

        Ok(Outcome::Delivered {
            message_type: final_type,
            group_name: event.group_name,
            recipients: report.recipients,
            history_recorded,
        })
    }

    async fn run_handler(
        &self,
        message_type: MessageType,
        index: usize,
        handler: &dyn MessageHandler,
        event: Event,
    ) -> Result<Event, BusError> {
        match tokio::time::timeout(self.handler_timeout, handler.handle(event)).await {
            Ok(Ok(next)) => Ok(next),
            Ok(Err(source)) => {
                counter!(BUS_HANDLER_ERRORS_TOTAL, "message_type" => message_type.as_str(), "error_type" => source.kind())
                    .increment(1);
                warn!(index, error = %source, "handler failed, event discarded");
                Err(BusError::Handler {
                    message_type,
                    index,
                    source,
                })
            }
            Err(_elapsed) => {
                counter!(BUS_HANDLER_ERRORS_TOTAL, "message_type" => message_type.as_str(), "error_type" => "timeout")
                    .increment(1);
                error!(index, "handler timed out after {:?}", self.handler_timeout);
                Err(BusError::Timeout {
                    message_type,
                    index,
                    timeout: self.handler_timeout,
                })
            }
        }
    }

    async fn record_history(&self, event: &Event) -> bool {
        let Some(sink) = &self.history else {
            return false;
        };
        match tokio::time::timeout(self.handler_timeout, sink.record(event)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                counter!(BUS_HISTORY_ERRORS_TOTAL).increment(1);
                warn!(error = %e, "history write failed, broadcasting anyway");
                false
            }
            Err(_elapsed) => {
                counter!(BUS_HISTORY_ERRORS_TOTAL).increment(1);
                warn!("history write timed out, broadcasting anyway");
                false
            }
        }
    }

    fn dropped(reason: DropReason) -> Outcome {
        counter!(BUS_EVENTS_DROPPED_TOTAL, "reason" => reason.label()).increment(1);
        warn!(%reason, "event dropped");
        Outcome::Dropped(reason)
    }
}
