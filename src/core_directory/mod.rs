pub mod listing;
pub mod path;
pub mod tree;

pub use listing::{parse_listing_line, ListingItem, TimestampStyle};
pub use tree::{DirId, Directory, DirectoryTree, RemoteFile};
