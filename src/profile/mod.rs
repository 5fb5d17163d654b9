pub mod library;
pub mod model;
pub mod store;

pub use library::{title_for, CachedAnalyzer, ProfileSource};
pub use model::{LightCode, SongProfile};
pub use store::ProfileStore;
