//! Trace correlation handle carried across the async boundary.
//!
//! A `TraceContext` is passed explicitly through every operation (HTTP handler →
//! lifecycle engine → publisher, and queue → ingestion loop → reconciler). Its wire
//! form is a W3C `traceparent` value:
//!
//! ```text
//! 00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01
//! ^^ ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^ ^^^^^^^^^^^^^^^^ ^^
//! |  trace id (16 bytes)              span id (8 bytes) flags
//! version
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const VERSION: &str = "00";
const FLAG_SAMPLED: u8 = 0x01;

/// Correlation handle for one unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TraceContext {
    trace_id: String,
    span_id: String,
    flags: u8,
}

impl TraceContext {
    /// Start a new, uncorrelated trace.
    pub fn new_root() -> Self {
        Self {
            trace_id: Uuid::new_v4().simple().to_string(),
            span_id: new_span_id(),
            flags: FLAG_SAMPLED,
        }
    }

    /// Derive a child context: same trace, fresh span.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: new_span_id(),
            flags: self.flags,
        }
    }

    /// Parse a `traceparent` value. Returns `None` for anything malformed.
    pub fn parse(traceparent: &str) -> Option<Self> {
        let value = traceparent.trim().to_ascii_lowercase();
        let mut parts = value.split('-');

        let version = parts.next()?;
        let trace_id = parts.next()?;
        let span_id = parts.next()?;
        let flags = parts.next()?;

        // Version 00 has exactly four fields; "ff" is reserved as invalid.
        if version.len() != 2 || !is_hex(version) || version == "ff" {
            return None;
        }
        if version == VERSION && parts.next().is_some() {
            return None;
        }
        if trace_id.len() != 32 || !is_hex(trace_id) || is_all_zero(trace_id) {
            return None;
        }
        if span_id.len() != 16 || !is_hex(span_id) || is_all_zero(span_id) {
            return None;
        }
        if flags.len() != 2 || !is_hex(flags) {
            return None;
        }
        let flags = u8::from_str_radix(flags, 16).ok()?;

        Some(Self {
            trace_id: trace_id.to_string(),
            span_id: span_id.to_string(),
            flags,
        })
    }

    /// Continue an inbound token as a child span, or start a fresh root when the
    /// token is absent or unusable.
    pub fn continue_from(traceparent: Option<&str>) -> Self {
        traceparent
            .and_then(Self::parse)
            .map(|parent| parent.child())
            .unwrap_or_else(Self::new_root)
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    pub fn is_sampled(&self) -> bool {
        self.flags & FLAG_SAMPLED != 0
    }

    /// Render as a `traceparent` value.
    pub fn to_traceparent(&self) -> String {
        format!("{VERSION}-{}-{}-{:02x}", self.trace_id, self.span_id, self.flags)
    }
}

impl core::fmt::Display for TraceContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.to_traceparent())
    }
}

impl TryFrom<String> for TraceContext {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid traceparent: {value}"))
    }
}

impl From<TraceContext> for String {
    fn from(value: TraceContext) -> Self {
        value.to_traceparent()
    }
}

fn new_span_id() -> String {
    // The low 64 bits of a v4 UUID always carry the variant bits, so never zero.
    format!("{:016x}", Uuid::new_v4().as_u128() as u64)
}

fn is_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_all_zero(s: &str) -> bool {
    s.bytes().all(|b| b == b'0')
}
