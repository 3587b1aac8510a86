//! Correlation ids for update batches and the log lines they produce
//!
//! An update batch already carries a transaction id; when present it is
//! reused as the `RequestId`, so a batch can be followed from the sender's
//! logs into the engine's. Otherwise a fresh UUIDv7 is minted.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! correlation_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Fresh time-ordered id
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn from_string(s: String) -> Self {
                Self(s)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

correlation_id! {
    /// Identifies one engine operation, usually one update batch
    RequestId
}

correlation_id! {
    /// Links an operation to a trace started outside the engine
    TraceId
}

/// Ids attached to an operation's log lines and errors
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub trace_id: Option<TraceId>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            trace_id: None,
        }
    }

    /// Context keyed by a batch transaction id; blank ids get a fresh one
    pub fn for_transaction(transaction_id: &str) -> Self {
        match transaction_id.trim() {
            "" => Self::new(),
            tx => Self::with_request_id(RequestId::from_string(tx.to_string())),
        }
    }

    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }
}
