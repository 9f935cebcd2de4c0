//! Directory handles: per-open iteration state over one directory.
//!
//! A handle presents the paginated listing of its directory as one stable
//! sequence of entries. Backing-store pages are fetched lazily, only when a
//! read asks for entries beyond what has been collected so far. Cursors are
//! positions in that sequence; the fuse adapter shifts them past "." and "..".

use std::collections::HashSet;
use std::sync::Arc;

use prefixfs_common::{is_dir_name, leaf_name};
use prefixfs_storage::ListPage;
use tokio::sync::Mutex;

use crate::error::VfsError;
use crate::inode::{DirInode, InodeKind};

/// Directory handle number. Never reused within one mount.
pub type HandleId = u64;

/// Position within a directory handle's entry sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DirCursor(u64);

impl DirCursor {
    /// Beginning of the directory. Reading from here restarts iteration.
    pub const START: DirCursor = DirCursor(0);

    pub fn new(offset: u64) -> Self {
        Self(offset)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Leaf name, without a trailing separator.
    pub name: String,
    pub kind: InodeKind,
    /// Cursor that resumes iteration just after this entry.
    pub next: DirCursor,
}

/// Result of one read on a directory handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadDirResponse {
    pub entries: Vec<DirEntry>,
    /// Cursor for the following read, or `None` once the directory is
    /// exhausted.
    pub next_cursor: Option<DirCursor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Listing {
    NotStarted,
    Continue(String),
    Exhausted,
}

#[derive(Debug)]
struct Iteration {
    entries: Vec<DirEntry>,
    seen: HashSet<String>,
    /// File names whose same-named directory may still appear on a later page.
    held: Vec<String>,
    listing: Listing,
}

impl Iteration {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            seen: HashSet::new(),
            held: Vec::new(),
            listing: Listing::NotStarted,
        }
    }

    fn is_exhausted(&self) -> bool {
        self.listing == Listing::Exhausted
    }

    /// Append the new entries of one listing page.
    ///
    /// A directory wins over a file of the same name. Keys arrive in
    /// lexicographic order, and `x/` sorts after `x.txt`, so the directory
    /// for a file `x` can land on a later page. A file is therefore only
    /// emitted once the listing has moved past `x/`; until then it is held.
    fn absorb(&mut self, dir_name: &str, page: ListPage) {
        let last_page = page.is_last();
        let mut frontier: &str = "";
        let mut fresh: Vec<(String, InodeKind)> = self
            .held
            .drain(..)
            .map(|name| (name, InodeKind::File))
            .collect();

        for prefix in &page.common_prefixes {
            if let Some(relative) = prefix.strip_prefix(dir_name) {
                frontier = frontier.max(relative);
            }
            if let Some(leaf) = leaf_name(dir_name, prefix) {
                fresh.push((leaf.to_string(), InodeKind::Directory));
            }
        }
        for object in &page.objects {
            if let Some(relative) = object.key.strip_prefix(dir_name) {
                frontier = frontier.max(relative);
            }
            // The directory's own placeholder has no leaf and is skipped.
            if let Some(leaf) = leaf_name(dir_name, &object.key) {
                let kind: InodeKind = if is_dir_name(&object.key) {
                    InodeKind::Directory
                } else {
                    InodeKind::File
                };
                fresh.push((leaf.to_string(), kind));
            }
        }
        // Directories sort ahead of files of the same name.
        fresh.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| (a.1 == InodeKind::File).cmp(&(b.1 == InodeKind::File)))
        });

        let mut held: Vec<String> = Vec::new();
        for (name, kind) in fresh {
            if self.seen.contains(&name) {
                continue;
            }
            let may_collide = kind == InodeKind::File && !last_page;
            if may_collide && format!("{name}/").as_str() > frontier {
                if held.last() != Some(&name) {
                    held.push(name);
                }
                continue;
            }
            self.seen.insert(name.clone());
            let next = DirCursor(self.entries.len() as u64 + 1);
            self.entries.push(DirEntry { name, kind, next });
        }
        self.held = held;

        self.listing = match page.next_continuation_token {
            Some(token) => Listing::Continue(token),
            None => Listing::Exhausted,
        };
    }
}

/// Iteration state for one open directory.
pub struct DirHandle {
    dir: Arc<DirInode>,
    page_size: usize,
    iteration: Mutex<Iteration>,
}

impl std::fmt::Debug for DirHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirHandle")
            .field("dir", &self.dir)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl DirHandle {
    /// Create a handle positioned at the start of `dir`.
    ///
    /// # Arguments
    /// * `dir` - Directory to iterate
    /// * `page_size` - Keys requested per backing-store page
    pub fn new(dir: Arc<DirInode>, page_size: usize) -> Self {
        Self {
            dir,
            page_size,
            iteration: Mutex::new(Iteration::new()),
        }
    }

    /// The directory this handle iterates.
    pub fn dir(&self) -> &Arc<DirInode> {
        &self.dir
    }

    /// Read up to `max_entries` entries starting at `cursor`.
    ///
    /// Reads on one handle are serialized. A read from [`DirCursor::START`]
    /// discards collected entries and lists the directory afresh. If a
    /// backing-store call fails or the future is dropped, entries collected
    /// so far are kept and the failed page is fetched again on the next read.
    ///
    /// # Arguments
    /// * `cursor` - Position to read from
    /// * `max_entries` - Upper bound on returned entries
    pub async fn read_dir(
        &self,
        cursor: DirCursor,
        max_entries: usize,
    ) -> Result<ReadDirResponse, VfsError> {
        let mut iteration = self.iteration.lock().await;
        if cursor == DirCursor::START {
            *iteration = Iteration::new();
        }

        let offset: usize = usize::try_from(cursor.value()).unwrap_or(usize::MAX);
        while iteration.entries.len() <= offset && !iteration.is_exhausted() {
            let token: Option<String> = match &iteration.listing {
                Listing::Continue(token) => Some(token.clone()),
                _ => None,
            };
            let page: ListPage = self.dir.list_children(token, self.page_size).await?;
            iteration.absorb(self.dir.name(), page);
        }

        let total: usize = iteration.entries.len();
        let start: usize = offset.min(total);
        let end: usize = start.saturating_add(max_entries).min(total);
        let entries: Vec<DirEntry> = iteration.entries[start..end].to_vec();

        let more: bool = end < total || !iteration.is_exhausted();
        Ok(ReadDirResponse {
            entries,
            next_cursor: more.then_some(DirCursor(end as u64)),
        })
    }
}
