//! Endpoint addressing for the platform REST API.
//!
//! ```text
//!  Resource             ids          path
//!  ────────────────     ─────────    ─────────────────────────────────
//!  Orders               [id]         /orders[/{id}]
//!  UnlinkedOrders                    /unlinked_orders
//!  OrderTransactions    id [tx]      /orders/{id}/transactions[/{tx}]
//!  Transactions         [id]         /transactions[/{id}]
//!  Members              [id]         /members[/{id}]
//!  MemberRewards        id [reward]  /members/{id}/rewards[/{reward}]
//!  Checkins             [id]         /checkins[/{id}]
//!  Tables               [name]       /tables[/{name}]
//!  Bookings             [id]         /bookings[/{id}]
//!  Location                          /location
//!  Menu                              /menu
//!  MenuProducts                      /menu/products
//!  MenuSurcounts                     /menu/surcounts
//!  Config                            /config
//! ```

use std::fmt;

use url::Url;

use crate::error::{LinkError, LinkResult};

/// The closed set of REST resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Orders,
    UnlinkedOrders,
    OrderTransactions,
    Transactions,
    Members,
    MemberRewards,
    Checkins,
    Tables,
    Bookings,
    Location,
    Menu,
    MenuProducts,
    MenuSurcounts,
    Config,
}

impl Resource {
    /// (segments before the first id, segment between first and second id)
    fn layout(&self) -> (&'static [&'static str], Option<&'static str>) {
        match self {
            Resource::Orders => (&["orders"], None),
            Resource::UnlinkedOrders => (&["unlinked_orders"], None),
            Resource::OrderTransactions => (&["orders"], Some("transactions")),
            Resource::Transactions => (&["transactions"], None),
            Resource::Members => (&["members"], None),
            Resource::MemberRewards => (&["members"], Some("rewards")),
            Resource::Checkins => (&["checkins"], None),
            Resource::Tables => (&["tables"], None),
            Resource::Bookings => (&["bookings"], None),
            Resource::Location => (&["location"], None),
            Resource::Menu => (&["menu"], None),
            Resource::MenuProducts => (&["menu", "products"], None),
            Resource::MenuSurcounts => (&["menu", "surcounts"], None),
            Resource::Config => (&["config"], None),
        }
    }

    /// How many positional ids the resource accepts.
    pub fn max_ids(&self) -> usize {
        match self {
            Resource::UnlinkedOrders
            | Resource::Location
            | Resource::Menu
            | Resource::MenuProducts
            | Resource::MenuSurcounts
            | Resource::Config => 0,
            Resource::OrderTransactions | Resource::MemberRewards => 2,
            _ => 1,
        }
    }

    /// Nested resources need their parent id.
    fn min_ids(&self) -> usize {
        match self {
            Resource::OrderTransactions | Resource::MemberRewards => 1,
            _ => 0,
        }
    }
}

/// A resource plus positional ids and optional query pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    resource: Resource,
    ids: Vec<String>,
    query: Vec<(String, String)>,
}

impl Endpoint {
    pub fn new(resource: Resource) -> Self {
        Endpoint {
            resource,
            ids: Vec::new(),
            query: Vec::new(),
        }
    }

    /// Appends a positional id.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.ids.push(id.into());
        self
    }

    /// Appends a query pair.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    /// Resolves the endpoint against the platform base URL.
    ///
    /// Ids are percent-encoded as single path segments, so an id containing
    /// `/` cannot escape its slot.
    pub fn url(&self, base: &Url) -> LinkResult<Url> {
        let count = self.ids.len();
        if count < self.resource.min_ids() || count > self.resource.max_ids() {
            return Err(LinkError::InvalidUrl(format!(
                "{:?} takes {}..={} ids, got {}",
                self.resource,
                self.resource.min_ids(),
                self.resource.max_ids(),
                count
            )));
        }

        let (head, middle) = self.resource.layout();
        let mut url = base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| LinkError::InvalidUrl(format!("{base} cannot be a base URL")))?;
            segments.pop_if_empty();
            segments.extend(head);
            if let Some(first) = self.ids.first() {
                segments.push(first);
            }
            if let Some(middle) = middle {
                segments.push(middle);
            }
            if let Some(second) = self.ids.get(1) {
                segments.push(second);
            }
        }

        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }

        Ok(url)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (head, middle) = self.resource.layout();
        for segment in head {
            write!(f, "/{segment}")?;
        }
        if let Some(first) = self.ids.first() {
            write!(f, "/{first}")?;
        }
        if let Some(middle) = middle {
            write!(f, "/{middle}")?;
        }
        if let Some(second) = self.ids.get(1) {
            write!(f, "/{second}")?;
        }
        Ok(())
    }
}
