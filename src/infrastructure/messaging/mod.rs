pub mod dispatch_queue;
pub mod webhook;
