mod actor;
mod handle;
pub mod models;
pub mod parse;
pub mod time;

pub use handle::CalDavHandle;
pub use models::{CalendarEvent, EventKey};
