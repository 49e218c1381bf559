//! Address-table key encoding
//!
//! Every key in the address table is a single string: one prefix character
//! naming the key class followed by the key body. The prefix characters are
//! shared with the route-computation layer and must not change:
//!
//! | prefix | class |
//! |---|---|
//! | `M` | mobile address (`service.orders`) |
//! | `L` | address local to this router (`_local/x`, `_topo/<area>/<this router>/x`) |
//! | `R` | another router in this area (`_topo/<area>/<router>/...`) |
//! | `A` | another area (`_topo/<area>/...`) |
//! | `C` | link-route destination for incoming links |
//! | `D` | link-route destination for outgoing links |
//!
//! Link-route lookups reuse the key of the terminus address with its first
//! character overridden by `C` or `D`.

use crate::config::RouterIdentity;
use crate::errors::{RouterError, RouterResult};
use crate::types::Direction;
use core::fmt;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Key Prefix
// ----------------------------------------------------------------------------

/// Class of an address key, encoded as its first character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyPrefix {
    Mobile,
    Local,
    Router,
    Area,
    LinkRouteIncoming,
    LinkRouteOutgoing,
}

impl KeyPrefix {
    pub const fn as_char(self) -> char {
        match self {
            KeyPrefix::Mobile => 'M',
            KeyPrefix::Local => 'L',
            KeyPrefix::Router => 'R',
            KeyPrefix::Area => 'A',
            KeyPrefix::LinkRouteIncoming => 'C',
            KeyPrefix::LinkRouteOutgoing => 'D',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'M' => Some(KeyPrefix::Mobile),
            'L' => Some(KeyPrefix::Local),
            'R' => Some(KeyPrefix::Router),
            'A' => Some(KeyPrefix::Area),
            'C' => Some(KeyPrefix::LinkRouteIncoming),
            'D' => Some(KeyPrefix::LinkRouteOutgoing),
            _ => None,
        }
    }

    /// Link-route prefix used when resolving a link of the given direction
    pub const fn link_route(direction: Direction) -> Self {
        match direction {
            Direction::Incoming => KeyPrefix::LinkRouteIncoming,
            Direction::Outgoing => KeyPrefix::LinkRouteOutgoing,
        }
    }
}

// ----------------------------------------------------------------------------
// Address Key
// ----------------------------------------------------------------------------

/// Prefix-encoded key of an address-table entry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AddressKey(String);

impl AddressKey {
    /// Build a key from a prefix and a body
    pub fn new(prefix: KeyPrefix, body: &str) -> Self {
        let mut key = String::with_capacity(body.len() + 1);
        key.push(prefix.as_char());
        key.push_str(body);
        Self(key)
    }

    /// Validate a raw key string received from the route layer
    pub fn parse<S: Into<String>>(raw: S) -> RouterResult<Self> {
        let raw = raw.into();
        match raw.chars().next().and_then(KeyPrefix::from_char) {
            Some(_) => Ok(Self(raw)),
            None => Err(RouterError::InvalidAddressKey { key: raw }),
        }
    }

    /// Key under which a terminus address is stored (the "hash view")
    ///
    /// The scheme and host are dropped, `_local/` and `_topo/` addresses are
    /// classified against this router's identity, and anything else is
    /// mobile.
    pub fn for_address(address: &str, identity: &RouterIdentity) -> Self {
        let path = strip_scheme(address);

        if let Some(rest) = path.strip_prefix("_local/") {
            return Self::new(KeyPrefix::Local, rest);
        }

        if let Some(rest) = path.strip_prefix("_topo/") {
            let mut segments = rest.splitn(3, '/');
            let area = segments.next().unwrap_or_default();
            let router = segments.next().unwrap_or_default();
            let tail = segments.next().unwrap_or_default();

            if area != identity.area && area != "all" {
                return Self::new(KeyPrefix::Area, area);
            }
            if router == identity.router_id || router == "all" {
                return Self::new(KeyPrefix::Local, tail);
            }
            return Self::new(KeyPrefix::Router, router);
        }

        Self::new(KeyPrefix::Mobile, path)
    }

    /// Key of a router-local address such as the hello address
    pub fn local(name: &str) -> Self {
        Self::new(KeyPrefix::Local, name)
    }

    /// Key of a configured link-route prefix
    pub fn link_route(prefix: &str, direction: Direction) -> Self {
        Self::new(KeyPrefix::link_route(direction), prefix)
    }

    /// Same body with the prefix character replaced
    pub fn with_prefix(&self, prefix: KeyPrefix) -> Self {
        Self::new(prefix, self.body())
    }

    pub fn prefix(&self) -> KeyPrefix {
        // Construction guarantees a known ASCII prefix character
        self.0
            .chars()
            .next()
            .and_then(KeyPrefix::from_char)
            .unwrap_or(KeyPrefix::Mobile)
    }

    pub fn body(&self) -> &str {
        &self.0[1..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_mobile(&self) -> bool {
        self.prefix() == KeyPrefix::Mobile
    }
}

impl fmt::Display for AddressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AddressKey {
    type Error = RouterError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        AddressKey::parse(raw)
    }
}

impl From<AddressKey> for String {
    fn from(key: AddressKey) -> Self {
        key.0
    }
}

/// Drop `amqp://host/` or `amqp:/` and any leading slashes
fn strip_scheme(address: &str) -> &str {
    let path = if let Some(rest) = address.strip_prefix("amqp://") {
        match rest.find('/') {
            Some(idx) => &rest[idx..],
            None => "",
        }
    } else if let Some(rest) = address.strip_prefix("amqp:") {
        rest
    } else {
        address
    };
    path.trim_start_matches('/')
}
