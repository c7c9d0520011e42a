//! Request handlers invoked by the protocol engine.
//!
//! Handlers are plain functions over a borrowed [`Snapshot`](crate::snapshot::Snapshot):
//! the caller loads the current snapshot once per request and every decision
//! in that request is made against it, even if a refresh publishes a newer one
//! meanwhile.
//!
//! The protocol engine and the filter language are not part of this crate.
//! They plug in through [`SearchResponder`] and [`EntryFilter`].

pub mod bind;
pub mod search;

pub use bind::BindHandler;
pub use search::{SearchHandler, SearchRequest};

use crate::entry::{AttributeMap, DirectoryEntry};
use crate::error::ResultCode;

/// Compiled search filter, evaluated against an entry's attributes.
pub trait EntryFilter {
    fn matches(&self, attributes: &AttributeMap) -> bool;
}

impl<F> EntryFilter for F
where
    F: Fn(&AttributeMap) -> bool,
{
    fn matches(&self, attributes: &AttributeMap) -> bool {
        self(attributes)
    }
}

/// Filter that accepts every entry, like `(objectClass=*)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchAll;

impl EntryFilter for MatchAll {
    fn matches(&self, _attributes: &AttributeMap) -> bool {
        true
    }
}

/// Outbound side of a search, implemented by the protocol engine.
pub trait SearchResponder {
    /// Send one matching entry.
    fn send_entry(&mut self, entry: &DirectoryEntry);

    /// Signal successful completion.
    fn end_results(&mut self);

    /// Signal failure; no further calls follow.
    fn fail(&mut self, code: ResultCode);
}

/// Responder that records everything it is sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectingResponder {
    pub entries: Vec<DirectoryEntry>,
    pub ended: bool,
    pub failure: Option<ResultCode>,
}

impl CollectingResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// DNs of the collected entries, in emission order.
    pub fn dns(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.dn.as_str()).collect()
    }
}

impl SearchResponder for CollectingResponder {
    fn send_entry(&mut self, entry: &DirectoryEntry) {
        self.entries.push(entry.clone());
    }

    fn end_results(&mut self) {
        self.ended = true;
    }

    fn fail(&mut self, code: ResultCode) {
        self.failure = Some(code);
    }
}
