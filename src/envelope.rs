//! Event records flowing from the routing layer into a sink.
//!
//! Envelopes are produced elsewhere and only read here. The routing layer fans one envelope out
//! to every sink of an application, so feeds carry `Arc<Envelope>`.

use bytes::Bytes;
use std::fmt;

/// Discriminant of an envelope's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    HttpStart,
    HttpStop,
    HttpStartStop,
    LogMessage,
    ValueMetric,
    CounterEvent,
    Error,
    ContainerMetric,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventType::HttpStart => "HttpStart",
            EventType::HttpStop => "HttpStop",
            EventType::HttpStartStop => "HttpStartStop",
            EventType::LogMessage => "LogMessage",
            EventType::ValueMetric => "ValueMetric",
            EventType::CounterEvent => "CounterEvent",
            EventType::Error => "Error",
            EventType::ContainerMetric => "ContainerMetric",
        };
        f.write_str(name)
    }
}

/// Stream a log line was written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Out,
    Err,
    /// Any other wire value.
    Unknown(i32),
}

impl MessageType {
    /// Syslog priority used on the drain: `OUT` is user.info (14), `ERR` is user.err (11).
    /// Anything else maps to -1.
    pub fn priority(&self) -> i32 {
        match self {
            MessageType::Out => 14,
            MessageType::Err => 11,
            MessageType::Unknown(_) => -1,
        }
    }
}

/// Log payload of an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub message: Bytes,
    pub message_type: MessageType,
    /// Nanoseconds since the Unix epoch.
    pub timestamp: i64,
    pub app_id: String,
    pub source_type: String,
    pub source_instance: String,
}

impl LogMessage {
    pub fn new(message: impl Into<Bytes>, message_type: MessageType, timestamp: i64) -> Self {
        Self {
            message: message.into(),
            message_type,
            timestamp,
            app_id: String::new(),
            source_type: String::new(),
            source_instance: String::new(),
        }
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    pub fn with_source(
        mut self,
        source_type: impl Into<String>,
        source_instance: impl Into<String>,
    ) -> Self {
        self.source_type = source_type.into();
        self.source_instance = source_instance.into();
        self
    }
}

/// An immutable event record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub origin: String,
    pub event_type: EventType,
    /// Nanoseconds since the Unix epoch.
    pub timestamp: i64,
    pub log_message: Option<LogMessage>,
}

impl Envelope {
    /// Envelope wrapping a log message; timestamp is taken from the message.
    pub fn log(origin: impl Into<String>, message: LogMessage) -> Self {
        Self {
            origin: origin.into(),
            event_type: EventType::LogMessage,
            timestamp: message.timestamp,
            log_message: Some(message),
        }
    }

    /// Envelope without a log payload, e.g. a metric or HTTP event.
    pub fn event(origin: impl Into<String>, event_type: EventType, timestamp: i64) -> Self {
        Self { origin: origin.into(), event_type, timestamp, log_message: None }
    }

    /// The log payload, if this envelope is a log message carrying one.
    pub fn as_log_message(&self) -> Option<&LogMessage> {
        match self.event_type {
            EventType::LogMessage => self.log_message.as_ref(),
            _ => None,
        }
    }

    pub fn is_log_message(&self) -> bool {
        self.as_log_message().is_some()
    }
}
