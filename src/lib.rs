//! # formpress
//!
//! A declarative instruction interpreter for paginated documents.
//!
//! The caller supplies an instruction tree (a JSON array of single-key
//! operations) and a dataset: tables of rows and cells, a form field
//! registry, form/submission metadata and global substitutions. The
//! interpreter walks the tree and drives a page-rendering surface, laying
//! out repeating table and form rows so every cell in a row has the same
//! height and no row is split across pages.
//!
//! ## Architecture
//!
//! ```text
//! Instruction tree (JSON)        RenderData + RenderOptions
//!       ↓                                   ↓
//!   [instruction]  parse operations    [model]
//!       ↓                                   ↓
//!   [layout]   dispatcher, pre-measure + render passes
//!       ↓          ↑ [resolve] [calc] [format] [logic]
//!   [surface]  capability contract
//!       ↓
//!   [pdf]      PDF 1.7 writer
//! ```

pub mod calc;
pub mod error;
pub mod format;
pub mod image_loader;
pub mod instruction;
pub mod layout;
pub mod logic;
pub mod model;
pub mod pdf;
pub mod resolve;
pub mod surface;

pub use error::FormpressError;
pub use instruction::Instruction;
pub use layout::{render, Interpreter, LayoutState};
pub use model::{RenderData, RenderOptions};
pub use pdf::PdfSurface;
pub use surface::{PageHooks, RecordingSurface, Surface, SurfaceCall};

/// Render an instruction tree given as JSON to PDF bytes.
///
/// This is the primary entry point. Only a malformed tree or a table
/// index outside `data` is an error; everything else degrades to a
/// documented default and is logged.
pub fn render_pdf(
    instructions: &str,
    data: &RenderData,
    options: &RenderOptions,
) -> Result<Vec<u8>, FormpressError> {
    let program = instruction::parse_str(instructions)?;
    let mut surface = PdfSurface::new();
    render(&mut surface, &program, data, options)?;
    Ok(surface.finish())
}
