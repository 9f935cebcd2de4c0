//! Key naming conventions for presenting a flat namespace as a tree.
//!
//! A key names a directory iff it is empty (the root) or ends with
//! [`PATH_SEPARATOR`]. Every other key names a file.

use crate::constants::PATH_SEPARATOR;
use crate::error::KeyError;

/// Check whether a key names a directory.
///
/// # Arguments
/// * `name` - Key relative to the mount root
pub fn is_dir_name(name: &str) -> bool {
    name.is_empty() || name.ends_with(PATH_SEPARATOR)
}

/// Normalize a root prefix so it can be joined directly with relative keys.
///
/// Leading separators are removed and a trailing separator is added to any
/// non-empty prefix.
///
/// # Arguments
/// * `prefix` - User-supplied prefix (e.g., "/data/logs")
///
/// # Returns
/// Either the empty string or a directory name (e.g., "data/logs/").
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed: &str = prefix.trim_start_matches(PATH_SEPARATOR);
    if trimmed.is_empty() || trimmed.ends_with(PATH_SEPARATOR) {
        trimmed.to_string()
    } else {
        format!("{}{}", trimmed, PATH_SEPARATOR)
    }
}

/// Strip a root prefix from a full object key.
///
/// # Arguments
/// * `prefix` - Normalized root prefix
/// * `key` - Full object key as reported by the store
///
/// # Errors
/// Returns `KeyOutsidePrefix` if the key is not rooted under `prefix`.
pub fn relative_key<'a>(prefix: &str, key: &'a str) -> Result<&'a str, KeyError> {
    key.strip_prefix(prefix)
        .ok_or_else(|| KeyError::KeyOutsidePrefix {
            key: key.to_string(),
            prefix: prefix.to_string(),
        })
}

/// Validate a leaf name received from the kernel.
///
/// A single trailing separator is tolerated and marks the leaf as a
/// directory; any other separator is rejected, as are `.` and `..`.
///
/// # Arguments
/// * `leaf` - Child name within a directory
pub fn validate_leaf_name(leaf: &str) -> Result<(), KeyError> {
    let bare: &str = leaf.strip_suffix(PATH_SEPARATOR).unwrap_or(leaf);
    let invalid: bool =
        bare.is_empty() || bare == "." || bare == ".." || bare.contains(PATH_SEPARATOR);

    if invalid {
        return Err(KeyError::InvalidLeafName {
            name: leaf.to_string(),
        });
    }
    Ok(())
}

/// Keys to probe when resolving a child of a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildCandidates {
    /// Directory key for the child (always ends with a separator).
    pub dir: String,
    /// File key for the child, absent when the leaf was given as a directory.
    pub file: Option<String>,
}

/// Compose the candidate keys for a child of `parent`.
///
/// # Arguments
/// * `parent` - Directory name of the parent
/// * `leaf` - Child name within the parent
///
/// # Returns
/// The directory key and, unless `leaf` already ends with a separator,
/// the file key.
///
/// # Errors
/// Returns `InvalidLeafName` if `leaf` is not a single component.
pub fn child_candidates(parent: &str, leaf: &str) -> Result<ChildCandidates, KeyError> {
    debug_assert!(is_dir_name(parent), "parent must be a directory name");
    validate_leaf_name(leaf)?;

    if is_dir_name(leaf) {
        return Ok(ChildCandidates {
            dir: format!("{}{}", parent, leaf),
            file: None,
        });
    }

    Ok(ChildCandidates {
        dir: format!("{}{}{}", parent, leaf, PATH_SEPARATOR),
        file: Some(format!("{}{}", parent, leaf)),
    })
}

/// Extract the leaf component of a key listed under `parent`.
///
/// # Arguments
/// * `parent` - Directory name the listing was issued for
/// * `key` - Object key or common prefix from the listing
///
/// # Returns
/// The leaf without any trailing separator, or `None` if `key` is the
/// parent itself or not a direct child of it.
pub fn leaf_name<'a>(parent: &str, key: &'a str) -> Option<&'a str> {
    let rest: &str = key.strip_prefix(parent)?;
    let bare: &str = rest.strip_suffix(PATH_SEPARATOR).unwrap_or(rest);

    if bare.is_empty() || bare.contains(PATH_SEPARATOR) {
        None
    } else {
        Some(bare)
    }
}
