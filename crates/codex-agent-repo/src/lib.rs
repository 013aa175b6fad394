//! The groups/queues/bookmarks/tokens/file-change-index JSON
//! repositories (§4.7, §6): atomic read-modify-write-rename, with every
//! read swallowing parse/IO failures into an empty document.

pub mod bookmarks;
pub mod config_dir;
pub mod error;
pub mod file_changes;
pub mod groups;
pub mod queues;
pub mod store;
pub mod tokens;

pub use bookmarks::BookmarkRepository;
pub use config_dir::default_config_dir;
pub use error::RepoError;
pub use file_changes::{FileChangeIndexDocument, FileChangeIndexRepository};
pub use groups::GroupRepository;
pub use queues::QueueRepository;
pub use store::JsonStore;
pub use tokens::TokenRepository;
