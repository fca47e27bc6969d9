pub mod bridge;
pub mod handlers;
pub mod hub;
pub mod qr;
pub mod registry;
pub mod rendezvous;
pub mod server;

pub use bridge::IngestBridge;
pub use hub::Hub;
pub use registry::{MessageHistory, SessionRegistry};
pub use rendezvous::{LoginRendezvous, LoginState};
pub use server::{start, AppState, ServerConfig, ServerHandle};
