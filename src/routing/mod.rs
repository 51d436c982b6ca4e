//! Outbound routing: turning one event into per-recipient topic publishes.

mod dispatcher;
mod fanout;

pub use dispatcher::Dispatcher;
pub use fanout::Fanout;
