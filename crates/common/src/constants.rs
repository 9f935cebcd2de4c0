//! Shared constants used across prefixfs crates.

/// Separator between key components in the object namespace.
pub const PATH_SEPARATOR: char = '/';

/// Inode ID of the mount root. Lower IDs are never issued.
pub const ROOT_INODE_ID: u64 = 1;

/// Default number of keys requested per listing page.
pub const DEFAULT_LIST_PAGE_SIZE: usize = 1000;

/// Default freshness window for cached directory attributes, in seconds.
pub const DEFAULT_ATTR_CACHE_TTL_SECS: u64 = 60;
