//! Resource collections
//!
//! The four independently fetched data sets shown by the app: auctions,
//! orders, transactions and conversations. Each has its own status, error
//! and items so a failure in one never hides the others.
//!
//! All four live on a [`ResourceBoard`] tagged with the session epoch. Every
//! fetch records the epoch it was issued under; results carrying a stale
//! epoch are dropped, which is how an in-flight request that outlives a
//! logout is discarded.

use crate::client::config::Endpoint;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Auctions,
    Orders,
    Transactions,
    Conversations,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Auctions,
        ResourceKind::Orders,
        ResourceKind::Transactions,
        ResourceKind::Conversations,
    ];

    pub fn endpoint(self) -> Endpoint {
        match self {
            Self::Auctions => Endpoint::Auctions,
            Self::Orders => Endpoint::Orders,
            Self::Transactions => Endpoint::Transactions,
            Self::Conversations => Endpoint::Conversations,
        }
    }

    /// Wrapper keys accepted besides `data`.
    pub fn envelope_keys(self) -> &'static [&'static str] {
        match self {
            Self::Auctions => &["auctions"],
            Self::Orders => &["orders"],
            Self::Transactions => &["transactions"],
            Self::Conversations => &["conversations", "chats"],
        }
    }

    /// Only orders support incremental loading.
    pub fn is_paginated(self) -> bool {
        matches!(self, Self::Orders)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Auctions => "auctions",
            Self::Orders => "orders",
            Self::Transactions => "transactions",
            Self::Conversations => "conversations",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Auctions => 0,
            Self::Orders => 1,
            Self::Transactions => 2,
            Self::Conversations => 3,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Load state of one collection. The error detail exists only in `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResourceStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    Error(String),
}

/// Whether a fetch replaces the collection or appends the next page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Replace,
    Append,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceCollection {
    kind: ResourceKind,
    items: Vec<Value>,
    status: ResourceStatus,
    page: u32,
    has_more: bool,
    in_flight: bool,
    /// Sequence number of the ticket whose result will be accepted
    current: u64,
}

impl ResourceCollection {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
            status: ResourceStatus::Idle,
            page: 0,
            has_more: true,
            in_flight: false,
            current: 0,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn status(&self) -> &ResourceStatus {
        &self.status
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            ResourceStatus::Error(detail) => Some(detail),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Last page successfully loaded (0 before the first load).
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    fn reset(&mut self) {
        let current = self.current;
        *self = Self::new(self.kind);
        self.current = current;
    }
}

/// Handle for one admitted fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub kind: ResourceKind,
    pub epoch: u64,
    pub mode: FetchMode,
    pub page: u32,
    pub seq: u64,
}

/// The four collections plus the epoch they belong to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceBoard {
    epoch: u64,
    collections: [ResourceCollection; 4],
}

impl Default for ResourceBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceBoard {
    pub fn new() -> Self {
        Self {
            epoch: 0,
            collections: ResourceKind::ALL.map(ResourceCollection::new),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn get(&self, kind: ResourceKind) -> &ResourceCollection {
        &self.collections[kind.index()]
    }

    fn get_mut(&mut self, kind: ResourceKind) -> &mut ResourceCollection {
        &mut self.collections[kind.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceCollection> {
        self.collections.iter()
    }

    /// True while no collection holds any item.
    pub fn all_empty(&self) -> bool {
        self.collections.iter().all(ResourceCollection::is_empty)
    }

    /// Drop every collection back to idle and move to `epoch`.
    pub fn reset(&mut self, epoch: u64) {
        self.epoch = epoch;
        for collection in &mut self.collections {
            collection.reset();
        }
    }

    /// Admit a fetch issued under `epoch`.
    ///
    /// Returns `None` for a stale epoch, and for an append while another fetch
    /// of the same collection is in flight or no further pages exist. A
    /// replace supersedes whatever is in flight; only the newest ticket of a
    /// collection can complete it.
    pub fn begin(&mut self, kind: ResourceKind, epoch: u64, mode: FetchMode) -> Option<FetchTicket> {
        if epoch != self.epoch {
            return None;
        }
        let collection = self.get_mut(kind);
        let page = match mode {
            FetchMode::Replace => 1,
            FetchMode::Append => {
                if collection.in_flight || !collection.has_more || !kind.is_paginated() {
                    return None;
                }
                collection.page + 1
            }
        };
        collection.current += 1;
        collection.in_flight = true;
        collection.status = ResourceStatus::Loading;
        Some(FetchTicket {
            kind,
            epoch,
            mode,
            page,
            seq: collection.current,
        })
    }

    fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.epoch == self.epoch && ticket.seq == self.get(ticket.kind).current
    }

    /// Apply a finished fetch. Returns `false` when the ticket is stale or
    /// was superseded.
    pub fn complete(&mut self, ticket: FetchTicket, result: Result<Vec<Value>, String>) -> bool {
        if !self.is_current(&ticket) {
            return false;
        }
        let collection = self.get_mut(ticket.kind);
        collection.in_flight = false;
        match result {
            Ok(items) => {
                collection.has_more = !items.is_empty();
                match ticket.mode {
                    FetchMode::Replace => {
                        collection.items = items;
                        collection.page = 1;
                    }
                    FetchMode::Append => {
                        if !items.is_empty() {
                            collection.page = ticket.page;
                        }
                        collection.items.extend(items);
                    }
                }
                collection.status = ResourceStatus::Loaded;
            }
            Err(detail) => {
                if ticket.mode == FetchMode::Replace {
                    collection.items.clear();
                }
                collection.status = ResourceStatus::Error(detail);
            }
        }
        true
    }

    /// Release a ticket without a result (the session is being torn down).
    pub fn abandon(&mut self, ticket: FetchTicket) {
        if !self.is_current(&ticket) {
            return;
        }
        let collection = self.get_mut(ticket.kind);
        collection.in_flight = false;
        if collection.status == ResourceStatus::Loading {
            collection.status = if collection.items.is_empty() {
                ResourceStatus::Idle
            } else {
                ResourceStatus::Loaded
            };
        }
    }

    #[cfg(test)]
    pub(crate) fn fill(&mut self, kind: ResourceKind, items: Vec<Value>) {
        let collection = self.get_mut(kind);
        collection.items = items;
        collection.status = ResourceStatus::Loaded;
        collection.page = 1;
    }
}
