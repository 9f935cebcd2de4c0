//! Structural invariants of the filesystem tables.
//!
//! [`verify_invariants`] re-derives every invariant by walking the tables.
//! It is pure, so tests can use it as an oracle; [`check_invariants`] is the
//! panicking form installed on the collection lock.

use std::sync::Arc;

use prefixfs_common::{is_dir_name, ROOT_INODE_ID};
use thiserror::Error;

use crate::handle::HandleId;
use crate::inode::{Inode, InodeId};
use crate::state::FsState;

/// A broken invariant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("Illegal inode ID {id} (root is {ROOT_INODE_ID}, next is {next})")]
    IllegalInodeId { id: InodeId, next: InodeId },

    #[error("Inode stored under {key} reports ID {actual}")]
    InodeIdMismatch { key: InodeId, actual: InodeId },

    #[error("Root inode is missing or not a directory")]
    BadRoot,

    #[error("Directory inode {id} has non-directory name {name:?}")]
    DirNameNotDirectory { id: InodeId, name: String },

    #[error("File inode {id} has directory name {name:?}")]
    FileNameIsDirectory { id: InodeId, name: String },

    #[error("Directory inode {id} ({name:?}) is missing from the name index")]
    NotIndexed { id: InodeId, name: String },

    #[error("Name index entry {key:?} holds directory named {name:?}")]
    IndexNameMismatch { key: String, name: String },

    #[error("Name index entry {key:?} refers to inode {id}, which is not live")]
    IndexNotLive { key: String, id: InodeId },

    #[error("Illegal handle ID {id} (next is {next})")]
    IllegalHandleId { id: HandleId, next: HandleId },

    #[error("Handle {id} refers to directory inode {dir}, which is not live")]
    HandleNotLive { id: HandleId, dir: InodeId },
}

/// Check every structural invariant of `state`.
///
/// # Errors
/// The first violation found.
pub fn verify_invariants(state: &FsState) -> Result<(), InvariantViolation> {
    match state.inodes.get(&ROOT_INODE_ID) {
        Some(Inode::Dir(root)) if root.name().is_empty() => {}
        _ => return Err(InvariantViolation::BadRoot),
    }

    let mut directories: usize = 0;
    for (&key, inode) in &state.inodes {
        if key < ROOT_INODE_ID || key >= state.next_inode_id {
            return Err(InvariantViolation::IllegalInodeId {
                id: key,
                next: state.next_inode_id,
            });
        }
        if inode.id() != key {
            return Err(InvariantViolation::InodeIdMismatch {
                key,
                actual: inode.id(),
            });
        }

        match inode {
            Inode::Dir(dir) => {
                directories += 1;
                if !is_dir_name(dir.name()) {
                    return Err(InvariantViolation::DirNameNotDirectory {
                        id: key,
                        name: dir.name().to_string(),
                    });
                }
                let indexed: bool = state
                    .dir_index
                    .get(dir.name())
                    .is_some_and(|entry| Arc::ptr_eq(entry, dir));
                if !indexed {
                    return Err(InvariantViolation::NotIndexed {
                        id: key,
                        name: dir.name().to_string(),
                    });
                }
            }
            Inode::File(file) => {
                if is_dir_name(file.name()) {
                    return Err(InvariantViolation::FileNameIsDirectory {
                        id: key,
                        name: file.name().to_string(),
                    });
                }
            }
        }
    }

    for (key, dir) in &state.dir_index {
        if dir.name() != key {
            return Err(InvariantViolation::IndexNameMismatch {
                key: key.clone(),
                name: dir.name().to_string(),
            });
        }
        let live: bool = matches!(
            state.inodes.get(&dir.id()),
            Some(Inode::Dir(entry)) if Arc::ptr_eq(entry, dir)
        );
        if !live {
            return Err(InvariantViolation::IndexNotLive {
                key: key.clone(),
                id: dir.id(),
            });
        }
    }
    // Every directory is indexed under its own name and every index entry
    // is a live directory, so equal sizes make the index a bijection.
    debug_assert_eq!(directories, state.dir_index.len());

    for (&id, handle) in &state.handles {
        if id >= state.next_handle_id {
            return Err(InvariantViolation::IllegalHandleId {
                id,
                next: state.next_handle_id,
            });
        }
        let dir = handle.dir();
        let live: bool = matches!(
            state.inodes.get(&dir.id()),
            Some(Inode::Dir(entry)) if Arc::ptr_eq(entry, dir)
        );
        if !live {
            return Err(InvariantViolation::HandleNotLive { id, dir: dir.id() });
        }
    }

    Ok(())
}

/// Panic if `state` violates an invariant.
pub fn check_invariants(state: &FsState) {
    if let Err(violation) = verify_invariants(state) {
        panic!("filesystem invariant violated: {}", violation);
    }
}
