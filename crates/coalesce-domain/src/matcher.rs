//! Demultiplexes a bulk response back to the items that requested it.
//!
//! Response elements are indexed by their fingerprint and each item looks
//! up its own fingerprint, so the response may omit or reorder elements.
//! An item without a matching element resolves as
//! [`ItemFailure::Missing`]; its siblings are unaffected.

use std::collections::HashMap;

use crate::diagnostics::DiagnosticSink;
use crate::error::ItemFailure;
use crate::fingerprint::{Fingerprint, Fingerprinted};
use crate::source::BulkSource;
use crate::types::{BatchOutcome, RequestItem};

/// Pairs every item with its response element and classifies the result.
///
/// Outcomes are returned in item order. When the response carries several
/// elements with the same fingerprint the first one wins.
pub fn match_responses<S>(
    source: &S,
    items: &[RequestItem<S::Key>],
    responses: Vec<S::Response>,
    diagnostics: &dyn DiagnosticSink,
) -> Vec<BatchOutcome<S::Response>>
where
    S: BulkSource + ?Sized,
{
    let mut by_fingerprint: HashMap<Fingerprint, S::Response> =
        HashMap::with_capacity(responses.len());
    for response in responses {
        by_fingerprint
            .entry(response.fingerprint())
            .or_insert(response);
    }

    items
        .iter()
        .map(|item| classify(source, item, by_fingerprint.get(item.fingerprint()), diagnostics))
        .collect()
}

/// Classifies one item given its (possibly absent) response element.
///
/// The source's `did_item_fail` hook decides; a present response it
/// rejects becomes [`ItemFailure::Rejected`].
pub fn classify<S>(
    source: &S,
    item: &RequestItem<S::Key>,
    response: Option<&S::Response>,
    diagnostics: &dyn DiagnosticSink,
) -> BatchOutcome<S::Response>
where
    S: BulkSource + ?Sized,
{
    let failed = source.did_item_fail(item.key(), response, diagnostics);
    match response {
        Some(response) if !failed => BatchOutcome::Fulfilled(response.clone()),
        Some(_) => BatchOutcome::ItemFailed(ItemFailure::Rejected),
        None => BatchOutcome::ItemFailed(ItemFailure::Missing),
    }
}
