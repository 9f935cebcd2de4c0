//! Configuration options for the VFS.
//!
//! This module provides configuration for VFS behavior including kernel
//! caching, attribute freshness, directory listing and request deadlines.

use std::time::Duration;

use prefixfs_common::{DEFAULT_ATTR_CACHE_TTL_SECS, DEFAULT_LIST_PAGE_SIZE};

/// Configuration options for the VFS.
///
/// # Example
///
/// ```ignore
/// let options = VfsOptions::default()
///     .with_listing(ListingOptions::default().with_implicit_dirs(true))
///     .with_attr_cache_ttl(Duration::from_secs(5));
///
/// let fs = BucketFs::new(client, location, Arc::new(RealClock), options);
/// ```
#[derive(Debug, Clone)]
pub struct VfsOptions {
    /// Kernel cache settings.
    pub kernel_cache: KernelCacheOptions,
    /// How long a directory's attributes stay fresh before the placeholder
    /// object is consulted again.
    pub attr_cache_ttl: Duration,
    /// Directory listing behavior.
    pub listing: ListingOptions,
    /// Timeout settings.
    pub timeouts: TimeoutOptions,
    /// Verify filesystem invariants around every critical section.
    pub check_invariants: bool,
}

impl Default for VfsOptions {
    fn default() -> Self {
        Self {
            kernel_cache: KernelCacheOptions::default(),
            attr_cache_ttl: Duration::from_secs(DEFAULT_ATTR_CACHE_TTL_SECS),
            listing: ListingOptions::default(),
            timeouts: TimeoutOptions::default(),
            check_invariants: cfg!(debug_assertions),
        }
    }
}

impl VfsOptions {
    /// Set kernel cache options.
    ///
    /// # Arguments
    /// * `kernel_cache` - Kernel cache configuration
    pub fn with_kernel_cache(mut self, kernel_cache: KernelCacheOptions) -> Self {
        self.kernel_cache = kernel_cache;
        self
    }

    /// Set the directory attribute cache TTL.
    ///
    /// # Arguments
    /// * `ttl` - Freshness window; zero disables caching
    pub fn with_attr_cache_ttl(mut self, ttl: Duration) -> Self {
        self.attr_cache_ttl = ttl;
        self
    }

    /// Set listing options.
    ///
    /// # Arguments
    /// * `listing` - Listing configuration
    pub fn with_listing(mut self, listing: ListingOptions) -> Self {
        self.listing = listing;
        self
    }

    /// Set timeout options.
    ///
    /// # Arguments
    /// * `timeouts` - Timeout configuration
    pub fn with_timeouts(mut self, timeouts: TimeoutOptions) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Enable or disable invariant verification.
    ///
    /// # Arguments
    /// * `enabled` - Whether to check invariants on every lock transition
    pub fn with_invariant_checks(mut self, enabled: bool) -> Self {
        self.check_invariants = enabled;
        self
    }
}

// ============================================================================
// Kernel Cache Options
// ============================================================================

/// Options for kernel-level caching (FUSE).
///
/// Controls how long the kernel may reuse attributes and lookups without
/// calling back into the VFS.
#[derive(Debug, Clone)]
pub struct KernelCacheOptions {
    /// Attribute cache timeout in seconds.
    pub attr_timeout_secs: u64,

    /// Entry cache timeout in seconds.
    /// How long the kernel caches directory entry lookups.
    pub entry_timeout_secs: u64,
}

impl Default for KernelCacheOptions {
    fn default() -> Self {
        Self {
            attr_timeout_secs: 1,
            entry_timeout_secs: 1,
        }
    }
}

impl KernelCacheOptions {
    /// Create options with no kernel caching.
    pub fn no_cache() -> Self {
        Self {
            attr_timeout_secs: 0,
            entry_timeout_secs: 0,
        }
    }

    /// Attribute TTL reported to the kernel.
    pub fn attr_ttl(&self) -> Duration {
        Duration::from_secs(self.attr_timeout_secs)
    }

    /// Entry TTL reported to the kernel.
    pub fn entry_ttl(&self) -> Duration {
        Duration::from_secs(self.entry_timeout_secs)
    }
}

// ============================================================================
// Listing Options
// ============================================================================

/// Options for resolving and listing directories.
#[derive(Debug, Clone)]
pub struct ListingOptions {
    /// Maximum keys requested per backing-store listing page.
    pub page_size: usize,

    /// Treat a prefix with objects below it as a directory even when no
    /// placeholder object exists.
    pub implicit_dirs: bool,
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_LIST_PAGE_SIZE,
            implicit_dirs: false,
        }
    }
}

impl ListingOptions {
    /// Set the listing page size.
    ///
    /// # Arguments
    /// * `page_size` - Keys per page; 0 is raised to 1 when the filesystem is built
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Enable or disable implicit directories.
    pub fn with_implicit_dirs(mut self, implicit_dirs: bool) -> Self {
        self.implicit_dirs = implicit_dirs;
        self
    }
}

// ============================================================================
// Timeout Options
// ============================================================================

/// Timeout settings for VFS operations.
#[derive(Debug, Clone)]
pub struct TimeoutOptions {
    /// Deadline for a single kernel request in seconds, including every
    /// backing-store call it makes. Zero disables the deadline.
    pub request_timeout_secs: u64,
}

impl Default for TimeoutOptions {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60, // 1 minute
        }
    }
}

impl TimeoutOptions {
    /// Request deadline, or `None` when disabled.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

// ============================================================================
// Tests
// ============================================================================
