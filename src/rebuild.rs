//! Macro-preserving workbook rebuild.
//!
//! Cell-rewriting libraries for the legacy `.xls` format regenerate the
//! `Workbook` stream but silently drop everything else in the container,
//! most importantly the VBA project storage. The rebuild takes the
//! original container (with macros) and the rewritten one (with fresh
//! cell data), merges their streams, and assembles a new container that
//! has both.

use crate::error::{CfbError, Result};
use crate::reader::CfbFile;
use crate::writer::ContainerBuilder;
use std::io::Cursor;

/// Name of the BIFF workbook stream inside an `.xls` container.
pub const WORKBOOK_STREAM: &str = "Workbook";

/// Rebuild an `.xls` container, taking the `Workbook` stream from
/// `modified_workbook` and every other stream from `original`.
///
/// Pure function over in-memory buffers: no filesystem or network access,
/// no state retained between calls, and identical inputs always produce
/// byte-identical output.
///
/// # Errors
///
/// - [`CfbError::MalformedContainer`] if either input is not a valid
///   compound file
/// - [`CfbError::MissingWorkbookStream`] if `modified_workbook` carries
///   no `Workbook` stream
pub fn rebuild(original: &[u8], modified_workbook: &[u8]) -> Result<Vec<u8>> {
    let mut modified = CfbFile::open(Cursor::new(modified_workbook))?;
    let workbook = match modified.open_stream(&[WORKBOOK_STREAM]) {
        Ok(data) => data,
        Err(CfbError::StreamNotFound(_)) => return Err(CfbError::MissingWorkbookStream),
        Err(err) => return Err(err),
    };

    let mut source = CfbFile::open(Cursor::new(original))?;
    let mut streams: Vec<(String, Vec<u8>)> = Vec::new();
    for entry_path in source.list_streams() {
        let joined = entry_path.join("/");
        let data = if joined == WORKBOOK_STREAM {
            workbook.clone()
        } else {
            let parts: Vec<&str> = entry_path.iter().map(String::as_str).collect();
            source.open_stream(&parts)?
        };
        streams.push((joined, data));
    }

    // Originals without a Workbook stream still get the rewritten one
    if !streams.iter().any(|(path, _)| path == WORKBOOK_STREAM) {
        streams.push((WORKBOOK_STREAM.to_string(), workbook.clone()));
    }

    let mut builder = ContainerBuilder::new();
    for (path, data) in &streams {
        builder.insert(path, data);
    }
    builder.build()
}
