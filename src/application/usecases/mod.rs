pub mod list_sent_messages;
pub mod process_messages;
pub mod seed_messages;
pub mod select_unsent;
