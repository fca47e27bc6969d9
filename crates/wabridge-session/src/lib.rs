pub mod client;
pub mod mock;

pub use client::{EventSink, SessionClient, SessionConnector};
pub use mock::{MockConnector, MockSessionClient};
