//! Correlation types for tracking one logical operation across the engine,
//! the store adapter and the caller's transport layer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_v7_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh, time-ordered identifier (UUIDv7)
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Wrap an identifier received from a caller
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

uuid_v7_id!(
    /// Identifies one inbound call (one engine command)
    CorrelationId
);
uuid_v7_id!(
    /// Trace identifier propagated from an upstream caller
    TraceId
);
uuid_v7_id!(
    /// Span identifier within a trace
    SpanId
);

/// Context carried through one engine command for log correlation
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub correlation_id: CorrelationId,
    pub trace_id: Option<TraceId>,
    /// Free-form actor label (editor name, service account) recorded in logs
    pub actor: Option<String>,
}

impl OperationContext {
    pub fn new() -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            trace_id: None,
            actor: None,
        }
    }

    pub fn with_correlation_id(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            trace_id: None,
            actor: None,
        }
    }

    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}
