pub mod errors;
pub mod events;
pub mod ids;

pub use errors::BridgeError;
pub use events::{MediaMessage, MessageInfo, SessionEvent, TextMessage};
pub use ids::{MessageId, PeerId, SubscriberId};
