//! Transport implementations shipped with the client.

mod tcp;

pub use tcp::{TcpLinkFactory, TcpLinkTransport};
