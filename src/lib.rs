//!
//! # Flat21 GDSII Hierarchy Flattener
//!
//! GDSII is the IC industry's de facto standard for storing and sharing
//! layout data, and it is deeply hierarchical: cells instantiate other
//! cells, singly (SREF) and in two-dimensional arrays (AREF), with
//! magnification, rotation, and reflection at every step. Flat21 reads
//! GDSII data and *collapses* that hierarchy: given the name of a top
//! cell, it produces the flat list of absolute-coordinate polygons the
//! cell expands to, optionally restricted to a clip window, with path
//! (centerline-plus-width) elements offset into closed boundaries along
//! the way. The flat set can then be written back out as a single-cell
//! GDSII file readable by standard layout tooling.
//!
//! Flat21 is *not* a general GDSII manipulation library: text, node, and
//! box elements are read and discarded, element properties are skipped,
//! and the writer emits only flat boundaries. For full-fidelity GDSII
//! data models, see libraries such as [gds21](https://crates.io/crates/gds21),
//! whose reading and writing machinery this crate's is patterned on.
//!
//! ## Usage
//!
//! Loading a [GdsLibrary] from disk, collapsing one cell, and writing the
//! result:
//!
//! ```skip
//! use flat21::{ExtractOptions, GdsLibrary};
//! let lib = GdsLibrary::open("sample.gds")?;
//! let polys = lib.extract_polygons("NAND", &ExtractOptions::default(), None)?;
//! lib.write_polys("nand_flat.gds", &polys)?;
//! ```
//!
//! Restricting to a window given in user units, and capping the output:
//!
//! ```skip
//! let opts = ExtractOptions {
//!     bounds: Some(Bounds::new(28.7, 45.2, 80.0, 60.0)),
//!     max_polys: 1_000_000,
//!     ..Default::default()
//! };
//! let polys = lib.extract_polygons("NAND", &opts, None)?;
//! ```
//!

pub mod data;
pub mod flatten;
pub mod geom;
pub mod read;
pub mod write;

#[cfg(test)]
mod tests;

// Re-export the primary public interface
pub use data::{
    GdsArrayRef, GdsBoundary, GdsCell, GdsElement, GdsError, GdsLibrary, GdsPath, GdsPoint,
    GdsResult, GdsStats, GdsStructRef, Poly,
};
pub use flatten::{Bounds, ExtractOptions, ProgressFn, Transform};
pub use geom::{expand_path, poly_contains_point};
pub use write::GdsWriter;
