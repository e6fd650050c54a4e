//! The network collaborator seam.
//!
//! A [`BulkSource`] supplies the bulk call, the optional single-item
//! fallback and the per-item policy. Implementations are selected when a
//! [`Loader`](crate::loader::Loader) is constructed.

use async_trait::async_trait;

use crate::diagnostics::DiagnosticSink;
use crate::error::{TransportError, ValidationError};
use crate::fingerprint::Fingerprinted;

/// A source of values that can be fetched in bulk.
#[async_trait]
pub trait BulkSource: Send + Sync + 'static {
    /// The lookup key sent to the remote side.
    type Key: Fingerprinted + Clone + Send + Sync + 'static;
    /// One element of a bulk response. Its fingerprint must equal the
    /// fingerprint of the key it answers.
    type Response: Fingerprinted + Clone + Send + Sync + 'static;

    /// Rewrites a key into its canonical form before fingerprinting.
    fn normalize(&self, key: Self::Key) -> Self::Key {
        key
    }

    /// Rejects structurally invalid keys.
    fn validate(&self, _key: &Self::Key) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Resolves a batch of keys with one network call.
    ///
    /// Keys are passed in enqueue order. An `Err` fails every item of the
    /// batch; the response may omit or reorder elements.
    async fn bulk_submit(&self, keys: &[Self::Key]) -> Result<Vec<Self::Response>, TransportError>;

    /// Resolves one key without waiting for a batch window.
    ///
    /// `Ok(None)` means the remote side returned nothing for the key.
    async fn fetch_single(&self, _key: &Self::Key) -> Result<Option<Self::Response>, TransportError> {
        Err(TransportError::Unsupported {
            operation: "fetch_single",
        })
    }

    /// Decides whether an item failed given its matched response.
    ///
    /// Returning `false` for a response that deviates from the request
    /// accepts it as a degraded success; implementations should report the
    /// deviation through `diagnostics`.
    fn did_item_fail(
        &self,
        _key: &Self::Key,
        response: Option<&Self::Response>,
        _diagnostics: &dyn DiagnosticSink,
    ) -> bool {
        response.is_none()
    }

    /// Whether a response represents an existing value. Responses for which
    /// this returns `false` are cached as confirmed negatives.
    fn exists(&self, _response: &Self::Response) -> bool {
        true
    }
}
