mod event;
mod handler;

pub use event::{AppEvent, EventHandler, RawModeGuard};
pub use handler::handle_key;
