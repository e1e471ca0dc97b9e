//! Transport collaborator consumed by the pairing engines.

use async_trait::async_trait;
use hap_core::error::Result;

/// Pair-Setup endpoint path.
pub const ENDPOINT_PAIR_SETUP: &str = "/pair-setup";
/// Pair-Verify endpoint path.
pub const ENDPOINT_PAIR_VERIFY: &str = "/pair-verify";
/// Pairings endpoint path (add/remove/list).
pub const ENDPOINT_PAIRINGS: &str = "/pairings";
/// Content type for all pairing bodies.
pub const CONTENT_TYPE_PAIRING_TLV8: &str = "application/pairing+tlv8";

/// Request/response transport to an accessory.
///
/// Implementations POST the body to the given endpoint and return the
/// response body, raising a [`TransportError`](hap_core::error::TransportError)
/// on any non-2xx status or connection failure. Timeouts and cancellation
/// are the transport's responsibility; the engines add no retry logic.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&mut self, endpoint: &str, content_type: &str, body: &[u8]) -> Result<Vec<u8>>;
}
