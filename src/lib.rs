//! cfbforge - a Compound File Binary (CFB/OLE2) container builder
//!
//! This library assembles well-formed version 3 compound files — the
//! binary container underlying legacy `.xls`, `.doc`, and `.ppt` — from a
//! flat map of stream paths to bytes, and uses that to rebuild `.xls`
//! workbooks without losing their embedded VBA project.
//!
//! Spreadsheet-rewriting tools regenerate the `Workbook` stream but write
//! out a container holding nothing else, so macros, summary streams, and
//! the VBA project storage vanish. [`rebuild`] merges the rewritten
//! `Workbook` stream back into a copy of the original container.
//!
//! # Example - Rebuilding a workbook
//!
//! ```no_run
//! # fn main() -> cfbforge::Result<()> {
//! let original = std::fs::read("report_with_macros.xls")?;
//! let modified = std::fs::read("report_rewritten.xls")?;
//!
//! let combined = cfbforge::rebuild(&original, &modified)?;
//! std::fs::write("report_final.xls", &combined)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Building a container from scratch
//!
//! ```
//! use cfbforge::ContainerBuilder;
//!
//! # fn main() -> cfbforge::Result<()> {
//! let mut builder = ContainerBuilder::new();
//! builder.insert("Workbook", b"workbook bytes");
//! builder.insert("_VBA_PROJECT_CUR/VBA/Module1", b"Sub x()\nEnd");
//! let container = builder.build()?;
//! # assert!(!container.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Inspecting a container
//!
//! ```no_run
//! use std::io::Cursor;
//! use cfbforge::CfbFile;
//!
//! # fn main() -> cfbforge::Result<()> {
//! let bytes = std::fs::read("report.xls")?;
//! let mut cfb = CfbFile::open(Cursor::new(&bytes))?;
//! for path in cfb.list_streams() {
//!     println!("{}", path.join("/"));
//! }
//! # Ok(())
//! # }
//! ```

/// Format constants shared by the reader and writer
pub mod consts;

/// Error types
pub mod error;

/// Compound file reader
pub mod reader;

/// Compound file writer
pub mod writer;

/// Macro-preserving workbook rebuild
pub mod rebuild;

pub use error::{CfbError, Result};
pub use reader::{CfbEntry, CfbFile};
pub use rebuild::{WORKBOOK_STREAM, rebuild};
pub use writer::ContainerBuilder;
