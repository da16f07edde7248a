//! Prelude re-exports for convenient use.

pub use crate::adapter::{HandlerSlot, MessageHandler, PlatformAdapter, reply_future};
pub use crate::dirs::MagabotDirs;
pub use crate::error::{CoreError, CoreResult};
pub use crate::identity::hash_user_id;
pub use crate::message::IncomingMessage;
