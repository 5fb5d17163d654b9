pub mod command;
pub mod playlist;
pub mod session;
pub mod sync;
pub mod transport;

pub use command::CommandSlot;
pub use playlist::Playlist;
pub use sync::{SyncOptions, Synchronizer, SystemClock};
pub use transport::{PlayerKeys, ProcessTransport};
