mod actor;

pub use actor::{TelegramActor, TelegramHandle};
