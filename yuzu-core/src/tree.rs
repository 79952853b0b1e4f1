//! Path-addressed reads and writes into a `serde_json::Value` tree.
//!
//! Both the server's mutation tracker and the client's patch applier walk
//! the same shape of tree by the same path rule, so the walk itself lives
//! here once rather than twice.

use crate::error::{Error, Result};
use crate::path::Path;
use serde_json::Value;

/// Read the value at `path`, or `None` if any segment along the way is
/// missing.
pub fn read_at<'a>(root: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.segments() {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Assign `value` at `path`. The empty path replaces the whole tree.
/// Writing to an array index equal to its current length appends;
/// otherwise the index must already exist.
pub fn write_at(root: &mut Value, path: &Path, value: Value) -> Result<()> {
    if path.is_empty() {
        *root = value;
        return Ok(());
    }
    let (parent_segments, last) = path.segments().split_at(path.len() - 1);
    let parent = container_at_mut(root, parent_segments, path)?;
    match parent {
        Value::Object(map) => {
            map.insert(last[0].clone(), value);
        }
        Value::Array(items) => {
            let index: usize = last[0]
                .parse()
                .map_err(|_| Error::path_not_found(path.segments(), last[0].clone()))?;
            if index == items.len() {
                items.push(value);
            } else {
                let slot = items
                    .get_mut(index)
                    .ok_or_else(|| Error::path_not_found(path.segments(), last[0].clone()))?;
                *slot = value;
            }
        }
        _ => return Err(Error::path_not_found(path.segments(), last[0].clone())),
    }
    Ok(())
}

/// Assign-absent at `path` (§4.1: the only way to express removal).
/// Removes a keyed entry outright; nulls out an array element in place
/// since removing it would shift every later index.
pub fn delete_at(root: &mut Value, path: &Path) -> Result<()> {
    if path.is_empty() {
        *root = Value::Null;
        return Ok(());
    }
    let (parent_segments, last) = path.segments().split_at(path.len() - 1);
    let parent = container_at_mut(root, parent_segments, path)?;
    match parent {
        Value::Object(map) => {
            map.remove(&last[0]);
        }
        Value::Array(items) => {
            let index: usize = last[0]
                .parse()
                .map_err(|_| Error::path_not_found(path.segments(), last[0].clone()))?;
            if let Some(slot) = items.get_mut(index) {
                *slot = Value::Null;
            }
        }
        _ => return Err(Error::path_not_found(path.segments(), last[0].clone())),
    }
    Ok(())
}

fn container_at_mut<'a>(
    root: &'a mut Value,
    segments: &[String],
    full_path: &Path,
) -> Result<&'a mut Value> {
    let mut current = root;
    for segment in segments {
        current = match current {
            Value::Object(map) => map
                .get_mut(segment)
                .ok_or_else(|| Error::path_not_found(full_path.segments(), segment.clone()))?,
            Value::Array(items) => {
                let index: usize = segment
                    .parse()
                    .map_err(|_| Error::path_not_found(full_path.segments(), segment.clone()))?;
                items
                    .get_mut(index)
                    .ok_or_else(|| Error::path_not_found(full_path.segments(), segment.clone()))?
            }
            _ => return Err(Error::path_not_found(full_path.segments(), segment.clone())),
        };
    }
    Ok(current)
}

/// Resolve the array at `path`, failing if it is missing or not an array.
pub fn array_at_mut<'a>(root: &'a mut Value, path: &Path) -> Result<&'a mut Vec<Value>> {
    let target = container_at_mut(root, path.segments(), path)?;
    match target {
        Value::Array(items) => Ok(items),
        _ => Err(Error::path_not_found(
            path.segments(),
            path.segments().last().cloned().unwrap_or_default(),
        )),
    }
}

/// The error `readPathExisting` reports when `path`'s final segment is
/// missing from the tree.
pub fn missing_segment_error(path: &Path) -> Error {
    let segment = path.segments().last().cloned().unwrap_or_default();
    Error::path_not_found(path.segments(), segment)
}
