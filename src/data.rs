//!
//! # Flat21 Data Model
//!
//! GDSII's stream format is a sequence of variable-length records.
//! [GdsRecordType] enumerates every record type the format defines;
//! [GdsRecord] holds the decoded form of the subset this library acts on.
//! Decoded records are assembled into a [GdsLibrary]: a flat list of
//! [GdsCell] definitions, each an ordered sequence of [GdsElement]s
//! (polygons, paths, and references to other cells).
//!
//! The model is deliberately lean: it keeps exactly what hierarchy
//! collapse needs. Text, node, and box elements are read and discarded,
//! and element attributes with no geometric meaning (plex, elflags,
//! properties) are skipped by the reader.
//!

// Std-Lib Imports
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::path::Path;

// Crates.io
use derive_more::{Add, AddAssign};
use num_derive::FromPrimitive;
use serde::{Deserialize, Serialize};

// Local Imports
use crate::read::GdsParser;

///
/// # Gds Record Types
///
/// The one-byte record-type codes of the stream format. The variants sit
/// at their standard numeric values, in order, so the on-disk byte maps
/// straight onto the enum through [FromPrimitive]. Variant names shorten
/// the standard's mnemonics (BGNSTR, SNAME, ENDEL, and so on); the codes
/// themselves run from HEADER at 0x00 through LIBSECUR at 0x3B, element
/// records sandwiched between the library- and cell-level bookkeeping.
///
#[derive(FromPrimitive, Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub enum GdsRecordType {
    Header = 0x00,
    BgnLib,
    LibName,
    Units,
    EndLib,
    BgnStr,
    StrName,
    EndStr,
    Boundary,
    Path,
    Sref,
    Aref,
    Text,
    Layer,
    DataType,
    Width,
    Xy,
    EndEl,
    SName,
    ColRow,
    TextNode,
    Node,
    TextType,
    Presentation,
    Spacing,
    String,
    Strans,
    Mag,
    Angle,
    Uinteger,
    Ustring,
    RefLibs,
    Fonts,
    PathType,
    Generations,
    AttrTable,
    StypTable,
    StrType,
    ElemFlags,
    ElemKey,
    LinkType,
    LinkKeys,
    NodeType,
    PropAttr,
    PropValue,
    Box,
    BoxType,
    Plex,
    BgnExtn,
    EndExtn,
    TapeNum,
    TapeCode,
    StrClass,
    Reserved,
    Format,
    Mask,
    EndMasks,
    LibDirSize,
    SrfName,
    LibSecur,
}
impl GdsRecordType {
    /// Whether records of this type may appear in a conforming stream.
    /// The code space has holes no tool ever emits: features the format
    /// provisioned but never shipped (STYPTABLE, STRTYPE, ELKEY, the LINK
    /// records), records retired along the way (SPACING, UINTEGER,
    /// USTRING, TEXTNODE), and codes held back for Calma-internal or
    /// future use. The reader treats all of these like unknown vendor
    /// types and skips them.
    pub fn valid(self) -> bool {
        !matches!(
            self,
            Self::TextNode
                | Self::Spacing
                | Self::Uinteger
                | Self::Ustring
                | Self::StypTable
                | Self::StrType
                | Self::ElemKey
                | Self::LinkType
                | Self::LinkKeys
                | Self::StrClass
                | Self::Reserved
        )
    }
}
/// # Gds DataType Enumeration
///
/// In order as decoded from 16-bit integers in binary data
#[derive(FromPrimitive, Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub enum GdsDataType {
    NoData = 0,
    BitArray = 1,
    I16 = 2,
    I32 = 3,
    F32 = 4,
    F64 = 5,
    Str = 6,
}
///
/// # Gds Record Enumeration
///
/// The decoded form of each record type this library acts upon.
/// Record types with no bearing on hierarchy collapse (text and node
/// elements' attributes, property records, library metadata, and every
/// vendor extension) never make it this far; the reader skips their
/// payloads wholesale.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GdsRecord {
    Header { version: i16 },
    BgnLib,
    LibName(String),
    /// The two [GdsFloat64]-decoded values, plus the 16 raw payload bytes,
    /// retained verbatim for re-emission by the writer.
    Units { uu: f64, meters: f64, raw: [u8; 16] },
    EndLib,
    BgnStr,
    StrName(String),
    SName(String),
    EndStr,
    Boundary,
    Path,
    Sref,
    Aref,
    Text,
    Node,
    Box,
    Layer(i16),
    DataType(i16),
    Width(i32),
    Xy(Vec<i32>),
    EndEl,
    ColRow { cols: i16, rows: i16 },
    PathType(i16),
    Strans(u8, u8),
    Mag(f64),
    Angle(f64),
}
/// # GDSII's Home-Grown Floating-Point Format
///
/// Incredibly, GDSII is old enough to have its own float-format,
/// like most computers did before IEEE754.
/// Eight bytes: a sign bit, a seven-bit excess-64 base-16 exponent,
/// and a 56-bit unsigned mantissa normalized to the range (1/16, 1).
///
/// The [GdsFloat64] struct is not used as a data-store, but largely a namespace
/// for the `encode` and `decode` operations to and from IEEE754 double-precision format.
///
pub struct GdsFloat64;
impl GdsFloat64 {
    /// Decode eight GDSII-float-encoded bytes to `f64`
    pub fn decode(bytes: &[u8]) -> GdsResult<f64> {
        if bytes.len() != 8 {
            return Err(GdsError::Decode); // Bad length
        }
        let neg = (bytes[0] & 0x80) != 0; // Sign bit
        let exp: i32 = (bytes[0] & 0x7F) as i32 - 64; // Exponent 7b
        // Create the initially integer-valued mantissa from the seven low bytes
        let mantissa: u64 = (bytes[1] as u64) << (8 * 6)
            | (bytes[2] as u64) << (8 * 5)
            | (bytes[3] as u64) << (8 * 4)
            | (bytes[4] as u64) << (8 * 3)
            | (bytes[5] as u64) << (8 * 2)
            | (bytes[6] as u64) << 8
            | (bytes[7] as u64);
        // And normalize it to (1/16, 1)
        let mantissa: f64 = mantissa as f64 / 2f64.powi(8 * 7);
        let val = mantissa * 16f64.powi(exp);
        Ok(if neg { -val } else { val })
    }
    /// Encode `f64` to eight bytes, this time represented as `u64`.
    ///
    /// The magnitude is brought into the format's normalized fraction
    /// range `[1/16, 1)` one hex digit at a time, counting the base-16
    /// exponent along the way; each step scales by 16, which is exact in
    /// binary, so no precision is lost before the final 56-bit rounding.
    pub fn encode(val: f64) -> u64 {
        if val == 0.0 {
            return 0;
        }
        let sign = if val.is_sign_negative() { 1u64 << 63 } else { 0 };
        // Normalize |val| = frac * 16^(exp - 64), frac in [1/16, 1)
        let mut frac = val.abs();
        let mut exp: i32 = 64;
        while frac >= 1.0 {
            frac /= 16.0;
            exp += 1;
        }
        while frac < 1.0 / 16.0 {
            frac *= 16.0;
            exp -= 1;
        }
        let mut mantissa = (frac * 2f64.powi(56)).round() as u64;
        if mantissa >> 56 != 0 {
            // Rounding carried over into a new hex digit
            mantissa >>= 4;
            exp += 1;
        }
        sign | ((exp as u64) << 56) | mantissa
    }
}

/// # Gds Spatial Point
/// Coordinate in (x,y) layout-space, denoted in database units.
#[derive(Debug, Copy, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct GdsPoint {
    pub x: i32,
    pub y: i32,
}
impl GdsPoint {
    /// Create a new [GdsPoint]
    pub fn new(x: i32, y: i32) -> Self {
        GdsPoint { x, y }
    }
    /// Create a vector of [GdsPoint] from an array of tuples
    pub fn vec(pts: &[(i32, i32)]) -> Vec<Self> {
        pts.iter().map(|pt| GdsPoint::new(pt.0, pt.1)).collect()
    }
    /// Convert an n-element vector of `i32` into an n/2-element vector of [GdsPoint]s.
    pub(crate) fn parse_vec(from: &[i32]) -> GdsResult<Vec<GdsPoint>> {
        if from.len() % 2 != 0 {
            return Err(GdsError::Str(
                "GdsPoint coordinate vector: invalid number of elements".into(),
            ));
        }
        let mut rv = Vec::with_capacity(from.len() / 2);
        for i in 0..from.len() / 2 {
            rv.push(GdsPoint {
                x: from[i * 2],
                y: from[i * 2 + 1],
            });
        }
        Ok(rv)
    }
}

///
/// # Gds Boundary Element
///
/// A closed polygon on a layer. GDSII dictates that the first and final
/// coordinates shall be identical, "closing" the ring; an N-sided polygon
/// is represented by N+1 points. A single XY record holds at most 8191
/// coordinate pairs.
///
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct GdsBoundary {
    /// Layer Number
    pub layer: i16,
    /// Closed ring of x,y coordinates
    pub xy: Vec<GdsPoint>,
}
///
/// # Gds Path Element
///
/// An open centerline with a width and an endcap style (`path_type`).
/// The parser's post-pass offsets the centerline by half the width on
/// each side, filling `expanded` with the equivalent closed ring of
/// exactly `2n+1` points for an `n`-point centerline.
///
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct GdsPath {
    /// Layer Number
    pub layer: i16,
    /// Path width, in database units
    pub width: i32,
    /// Endcap style. 0 = flush, 2 = extended by half the width.
    /// Type 1 (rounded) is accepted and treated as type 0.
    pub path_type: i16,
    /// Open centerline of x,y coordinates
    pub xy: Vec<GdsPoint>,
    /// The centerline offset to a closed ring, filled after parsing
    pub expanded: Vec<GdsPoint>,
}
///
/// # Gds Struct Reference (Cell Instance)
///
/// A single instance of another cell, placed at `xy` with optional
/// magnification, rotation, and reflection.
///
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GdsStructRef {
    /// Referenced cell name
    pub name: String,
    /// Index of the referenced cell in [GdsLibrary::cells].
    /// Filled by the resolution post-pass; `None` means the name matches
    /// no cell definition, and the reference expands to nothing.
    pub cell: Option<usize>,
    /// Instance origin
    pub xy: GdsPoint,
    /// Magnification. Defaults to 1.0.
    pub mag: f64,
    /// Rotation angle, in radians counter-clockwise. Defaults to zero.
    /// (The ANGLE record carries degrees; the parser converts.)
    pub angle: f64,
    /// STRANS flag word. Bit 0x8000 selects reflection about the X axis,
    /// applied before rotation.
    pub strans: u16,
}
impl Default for GdsStructRef {
    fn default() -> Self {
        Self {
            name: String::new(),
            cell: None,
            xy: GdsPoint::default(),
            mag: 1.0,
            angle: 0.0,
            strans: 0,
        }
    }
}
/// Decode the reflection flag of a STRANS word: bit 0x8000 selects
/// reflection about the X axis, applied before rotation.
fn strans_reflected(strans: u16) -> bool {
    strans & 0x8000 != 0
}
impl GdsStructRef {
    /// Boolean indication of the STRANS reflection bit
    pub fn reflected(&self) -> bool {
        strans_reflected(self.strans)
    }
}
///
/// # Gds Array Reference
///
/// A two-dimensional array of instances of another cell.
/// The three `xy` points are the array origin and the far ends of the
/// column and row axes; element (c, r) of the array sits at
/// `xy[0] + c·(xy[1]-xy[0])/cols + r·(xy[2]-xy[0])/rows`.
///
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GdsArrayRef {
    /// Referenced cell name
    pub name: String,
    /// Index of the referenced cell in [GdsLibrary::cells], as for [GdsStructRef::cell]
    pub cell: Option<usize>,
    /// Array origin, column-axis endpoint, row-axis endpoint
    pub xy: [GdsPoint; 3],
    /// Number of columns
    pub cols: i16,
    /// Number of rows
    pub rows: i16,
    /// Magnification. Defaults to 1.0.
    pub mag: f64,
    /// Rotation angle, in radians counter-clockwise. Defaults to zero.
    pub angle: f64,
    /// STRANS flag word, as for [GdsStructRef::strans]
    pub strans: u16,
}
impl Default for GdsArrayRef {
    fn default() -> Self {
        Self {
            name: String::new(),
            cell: None,
            xy: [GdsPoint::default(); 3],
            cols: 0,
            rows: 0,
            mag: 1.0,
            angle: 0.0,
            strans: 0,
        }
    }
}
impl GdsArrayRef {
    /// Boolean indication of the STRANS reflection bit
    pub fn reflected(&self) -> bool {
        strans_reflected(self.strans)
    }
}
///
/// # Gds Element Enumeration
///
/// Union of the geometric elements and references which comprise a [GdsCell],
/// in their source order.
///
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum GdsElement {
    GdsBoundary(GdsBoundary),
    GdsPath(GdsPath),
    GdsStructRef(GdsStructRef),
    GdsArrayRef(GdsArrayRef),
}
impl From<GdsBoundary> for GdsElement {
    fn from(e: GdsBoundary) -> Self {
        GdsElement::GdsBoundary(e)
    }
}
impl From<GdsPath> for GdsElement {
    fn from(e: GdsPath) -> Self {
        GdsElement::GdsPath(e)
    }
}
impl From<GdsStructRef> for GdsElement {
    fn from(e: GdsStructRef) -> Self {
        GdsElement::GdsStructRef(e)
    }
}
impl From<GdsArrayRef> for GdsElement {
    fn from(e: GdsArrayRef) -> Self {
        GdsElement::GdsArrayRef(e)
    }
}
/// Summary statistics for a [GdsLibrary] or [GdsCell].
/// Total numbers of elements of each type.
#[derive(Debug, Default, Clone, Deserialize, Serialize, PartialEq, Eq, Add, AddAssign)]
pub struct GdsStats {
    pub cells: usize,
    pub boundaries: usize,
    pub paths: usize,
    pub struct_refs: usize,
    pub array_refs: usize,
}
///
/// # Gds Cell (Structure) Definition
///
/// GDSII's primary hierarchical layout-definition object is its "struct",
/// which most other layout systems (and this library) call a "cell".
/// Cells are an ordered sequence of [GdsElement]s.
///
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct GdsCell {
    /// Cell Name
    pub name: String,
    /// Elements List
    pub elems: Vec<GdsElement>,
}
impl GdsCell {
    /// Create a new and empty [GdsCell]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
    /// Count and return our element statistics
    pub fn stats(&self) -> GdsStats {
        let mut stats = GdsStats::default();
        stats.cells += 1;
        for elem in &self.elems {
            use GdsElement::*;
            match elem {
                GdsBoundary(_) => stats.boundaries += 1,
                GdsPath(_) => stats.paths += 1,
                GdsStructRef(_) => stats.struct_refs += 1,
                GdsArrayRef(_) => stats.array_refs += 1,
            };
        }
        stats
    }
}
///
/// # Gds Library (Database)
///
/// The parsed content of one GDSII file: a set of cell definitions plus
/// the library-level metadata hierarchy collapse requires.
/// Created once by the parser and immutable thereafter.
///
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GdsLibrary {
    /// Gds Spec Version
    pub version: i16,
    /// Size of a database unit, in user units
    pub uu_per_dbunit: f64,
    /// Size of a database unit, in meters. Stored but never used in geometry.
    pub meter_per_dbunit: f64,
    /// The UNITS record payload, retained verbatim for re-emission
    pub units_raw: [u8; 16],
    /// Cell Definitions
    pub cells: Vec<GdsCell>,
    /// Source file path
    pub fpath: String,
}
impl Default for GdsLibrary {
    /// Default (empty) library, with the default GDS units:
    /// 1nm database units, 1µm user units.
    fn default() -> Self {
        Self {
            version: 0,
            uu_per_dbunit: 1e-3,
            meter_per_dbunit: 1e-9,
            units_raw: [0; 16],
            cells: Vec::new(),
            fpath: String::new(),
        }
    }
}
impl GdsLibrary {
    /// Read a GDS loaded from file at path `fname`.
    /// A truncated file yields the database of its well-formed prefix.
    pub fn open(fname: impl AsRef<Path>) -> GdsResult<GdsLibrary> {
        let mut it = GdsParser::open(fname.as_ref())?;
        let mut lib = GdsLibrary::parse(&mut it)?;
        lib.fpath = fname.as_ref().to_string_lossy().into_owned();
        Ok(lib)
    }
    /// Read a GDS from already-open `file`
    pub fn from_file(file: File) -> GdsResult<GdsLibrary> {
        let mut it = GdsParser::from_file(file)?;
        GdsLibrary::parse(&mut it)
    }
    /// Get a reference to the cell named `name`, if defined.
    /// Lookup is by exact byte-equality; the first definition wins
    /// should a library carry duplicate names.
    pub fn cell(&self, name: &str) -> Option<&GdsCell> {
        self.cells.iter().find(|c| c.name == name)
    }
    /// List the cells referenced by no other cell's SREF or AREF.
    /// A cell referencing only itself still counts as a top.
    pub fn top_cells(&self) -> Vec<&GdsCell> {
        let mut referenced = vec![false; self.cells.len()];
        for (i, cell) in self.cells.iter().enumerate() {
            for elem in &cell.elems {
                let target = match elem {
                    GdsElement::GdsStructRef(sref) => sref.cell,
                    GdsElement::GdsArrayRef(aref) => aref.cell,
                    _ => None,
                };
                if let Some(t) = target {
                    if t != i {
                        referenced[t] = true;
                    }
                }
            }
        }
        self.cells
            .iter()
            .zip(referenced)
            .filter(|(_, r)| !r)
            .map(|(c, _)| c)
            .collect()
    }
    /// List every cell name, in definition order
    pub fn all_cells(&self) -> Vec<&str> {
        self.cells.iter().map(|c| c.name.as_str()).collect()
    }
    /// Get the user-unit scale: the size of a database unit in user units
    pub fn uu(&self) -> f64 {
        self.uu_per_dbunit
    }
    /// Get the source file path
    pub fn path(&self) -> &str {
        &self.fpath
    }
    /// Collect and return the library's aggregate statistics
    /// (numbers of cells, elements by type)
    pub fn stats(&self) -> GdsStats {
        let mut stats = GdsStats::default();
        for cell in self.cells.iter() {
            stats += cell.stats();
        }
        stats
    }
}
///
/// # Flat Output Polygon
///
/// A closed, absolute-coordinate ring on a layer: the flattener's output
/// and the writer's input. Same representation as a [GdsBoundary].
///
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Poly {
    /// Layer Number
    pub layer: i16,
    /// Closed ring of x,y coordinates
    pub xy: Vec<GdsPoint>,
}

/// # GdsResult Type-Alias
pub type GdsResult<T> = Result<T, GdsError>;
///
/// # Gds Error Enumeration
///
/// File I/O and argument errors surface immediately; parser anomalies
/// (unknown record types, unsupported elements, unresolvable reference
/// names) are tolerated silently, as real-world GDSII files routinely
/// carry vendor extensions.
///
#[derive(Debug)]
pub enum GdsError {
    /// Invalid binary -> record conversion
    RecordDecode(GdsRecordType, GdsDataType, u16),
    /// Invalid record length
    RecordLen(usize),
    /// File opening, reading, and writing
    FileIO(String),
    /// Named cell not defined in the library
    CellNotFound(String),
    /// Traversal aborted by the progress callback
    Interrupted,
    /// Reference nesting deeper than [crate::flatten::MAX_DEPTH];
    /// the inevitable fate of a cyclic reference graph
    RecursionLimit(usize),
    /// Other decoding errors
    Decode,
    /// Boxed (External) Errors
    Boxed(Box<dyn Error>),
    /// Other errors
    Str(String),
}
impl fmt::Display for GdsError {
    /// Display a [GdsError].
    /// This functionally delegates to the (derived) [fmt::Debug] implementation.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
impl Error for GdsError {}
impl From<std::io::Error> for GdsError {
    fn from(e: std::io::Error) -> Self {
        Self::Boxed(Box::new(e))
    }
}
impl From<std::str::Utf8Error> for GdsError {
    fn from(e: std::str::Utf8Error) -> Self {
        Self::Boxed(Box::new(e))
    }
}
impl From<String> for GdsError {
    fn from(e: String) -> Self {
        GdsError::Str(e)
    }
}
impl From<&str> for GdsError {
    fn from(e: &str) -> Self {
        GdsError::Str(e.to_string())
    }
}
