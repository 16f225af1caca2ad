//! Logical endpoints and transport categories.

use std::{
    fmt::{self, Display, Formatter},
    sync::Arc,
};

/// The host name every node answers to in addition to its own.
pub const LOCALHOST: &str = "localhost";

/// A logical endpoint on the virtual network.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    /// The host name
    pub host: Arc<str>,
    /// The port on the host
    pub port: u16,
}

impl Address {
    /// Creates a new address from a host name and port.
    pub fn new(host: impl Into<Arc<str>>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The loopback alias for the given port.
    pub fn localhost(port: u16) -> Self {
        Self::new(LOCALHOST, port)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl<S: Into<Arc<str>>> From<(S, u16)> for Address {
    fn from((host, port): (S, u16)) -> Self {
        Self::new(host, port)
    }
}

/// A logical transport category. Each channel has an address space of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Channel {
    /// Stream-oriented delivery
    #[default]
    Tcp,
    /// Datagram-oriented delivery
    Udp,
}

impl Channel {
    /// The number of channels.
    pub const COUNT: usize = 2;

    /// Every channel, in declaration order.
    pub const ALL: [Channel; Channel::COUNT] = [Channel::Tcp, Channel::Udp];

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Tcp => write!(f, "tcp"),
            Channel::Udp => write!(f, "udp"),
        }
    }
}
