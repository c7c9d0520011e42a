//! Search decisions.

use crate::config::AccessConfig;
use crate::error::ResultCode;
use crate::handlers::{EntryFilter, SearchResponder};
use crate::scope::{self, Scope};
use crate::snapshot::Snapshot;
use log::{debug, trace};

/// One inbound search, as decoded by the protocol engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base_dn: String,
    pub scope: Scope,
    /// Maximum entries to return; `None` or `Some(0)` means unlimited
    pub size_limit: Option<usize>,
    /// DN the connection is bound as, if any
    pub requester: Option<String>,
}

impl SearchRequest {
    pub fn new(base_dn: impl Into<String>, scope: Scope) -> Self {
        Self {
            base_dn: base_dn.into(),
            scope,
            size_limit: None,
            requester: None,
        }
    }

    pub fn with_size_limit(mut self, limit: usize) -> Self {
        self.size_limit = Some(limit);
        self
    }

    pub fn with_requester(mut self, dn: impl Into<String>) -> Self {
        self.requester = Some(dn.into());
        self
    }
}

/// Answers searches from a snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchHandler {
    access: AccessConfig,
}

impl SearchHandler {
    pub fn new(access: AccessConfig) -> Self {
        Self { access }
    }

    /// Run `request`, streaming matches to `responder`.
    ///
    /// Returns the number of entries sent. Failures are reported to the
    /// responder and returned as well.
    pub fn search<F, R>(
        &self,
        snapshot: &Snapshot,
        request: &SearchRequest,
        filter: &F,
        responder: &mut R,
    ) -> Result<usize, ResultCode>
    where
        F: EntryFilter + ?Sized,
        R: SearchResponder + ?Sized,
    {
        match self.run(snapshot, request, filter, responder) {
            Ok(sent) => {
                responder.end_results();
                Ok(sent)
            }
            Err(code) => {
                responder.fail(code);
                Err(code)
            }
        }
    }

    fn run<F, R>(
        &self,
        snapshot: &Snapshot,
        request: &SearchRequest,
        filter: &F,
        responder: &mut R,
    ) -> Result<usize, ResultCode>
    where
        F: EntryFilter + ?Sized,
        R: SearchResponder + ?Sized,
    {
        debug!(
            "Search base='{}' scope={} generation={}",
            request.base_dn,
            request.scope,
            snapshot.generation()
        );

        if self.access.require_bind_for_search {
            let bound = request
                .requester
                .as_deref()
                .is_some_and(|dn| snapshot.user(dn).is_some());
            if !bound {
                debug!("Search rejected: requester is not a known user");
                return Err(ResultCode::InsufficientAccess);
            }
        }

        if !scope::exists(snapshot, &request.base_dn) {
            return Err(ResultCode::NoSuchObject);
        }

        let limit = request.size_limit.filter(|limit| *limit > 0);
        let mut sent = 0;
        for entry in scope::resolve(snapshot, &request.base_dn, request.scope) {
            if !filter.matches(&entry.attributes) {
                continue;
            }
            if limit.is_some_and(|limit| sent >= limit) {
                return Err(ResultCode::SizeLimitExceeded);
            }
            trace!("Search match '{}'", entry.dn);
            responder.send_entry(entry);
            sent += 1;
        }

        Ok(sent)
    }
}
