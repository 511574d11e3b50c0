pub mod delivery;
pub mod message;

pub use delivery::{DeliveryResult, iso8601};
pub use message::{Delivery, MarkSent, Message, MessageId, NewMessage};
