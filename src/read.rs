//!
//! # Flat21 Reading & Parsing
//!
//! [GdsReader] pulls length-prefixed records off a memory-mapped file,
//! decoding the subset of record types the data model carries and
//! skipping everything else. [GdsParser] iterates those records while
//! [GdsLibrary::parse] and the per-element parse loops assemble the
//! database.
//!
//! The parse is deliberately forgiving. Real-world GDSII files carry
//! vendor extensions and the occasional truncated tail, so:
//! * unrecognized and spec-invalid record types are payload-skipped,
//! * records that do not apply to the element being parsed are ignored,
//! * a short read anywhere ends the parse, yielding the database of the
//!   well-formed prefix; cells and elements are only committed by their
//!   ENDSTR / ENDEL records, so a cut-off trailing definition is dropped.
//!

// Std-Lib Imports
use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

// Crates.io
use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use memmap::Mmap;
use num_traits::FromPrimitive;

// Local Imports
use crate::data::*;
use crate::geom::expand_path;

/// Size (in bytes) of the read/decode buffer array.
/// Comfortably above the 65531-byte maximum record payload.
const READER_BUFSIZE: usize = 65536;

/// # GdsReader
///
/// Record-level reader over a memory-mapped GDS file.
/// Memory-mapping is much faster than a [std::io::BufReader] here, whose
/// [Seek] implementation makes skipping record payloads extra slow.
/// The mapping is the crate's one line of `unsafe`.
pub struct GdsReader {
    /// Read/conversion buffer
    buf: [u8; READER_BUFSIZE],
    /// File being read
    file: Cursor<Mmap>,
}
impl GdsReader {
    /// Create a [GdsReader], opening [File] at path `fname`
    pub fn open(fname: &Path) -> GdsResult<GdsReader> {
        let file = File::open(fname)
            .map_err(|e| GdsError::FileIO(format!("failed opening {}: {}", fname.display(), e)))?;
        Self::from_file(file)
    }
    /// Create a [GdsReader] of [File] `file`
    pub fn from_file(file: File) -> GdsResult<GdsReader> {
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self::new(Cursor::new(mmap)))
    }
    /// Create a [GdsReader] of `file`
    fn new(file: Cursor<Mmap>) -> GdsReader {
        GdsReader {
            file,
            buf: [0; READER_BUFSIZE],
        }
    }
    /// Read the next record the data model carries.
    /// Unrecognized, spec-invalid, and model-irrelevant record types are
    /// skipped along the way. Returns `Ok(None)` at a clean end of the
    /// stream, and equally at a truncated record: a short read is the end
    /// of the parse, not an error.
    pub fn read_record(&mut self) -> GdsResult<Option<GdsRecord>> {
        loop {
            // Read the 16-bit record-size. (In bytes, including the four header bytes.)
            let len = match self.file.read_u16::<BigEndian>() {
                Err(ref e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
                Err(e) => return Err(e.into()),
                Ok(num) if num < 4 => return Err(GdsError::RecordLen(num.into())), // Invalid (too short) length
                Ok(num) if num % 2 != 0 => return Err(GdsError::RecordLen(num.into())), // Invalid (odd) length
                Ok(num) => num,
            };
            let len = len - 4; // Strip out the four header-bytes

            // Read the record-type and data-type bytes
            let mut typebytes = [0u8; 2];
            match self.file.read_exact(&mut typebytes) {
                Err(ref e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
                Err(e) => return Err(e.into()),
                Ok(_) => (),
            };
            // Unknown record types are vendor extensions; unused ones are
            // deprecated or never-implemented parts of the spec. Skip both.
            let rtype: GdsRecordType = match <GdsRecordType as FromPrimitive>::from_u8(typebytes[0]) {
                Some(t) if t.valid() => t,
                _ => {
                    self.skip(len)?;
                    continue;
                }
            };
            let dtype: GdsDataType = match FromPrimitive::from_u8(typebytes[1]) {
                Some(d) => d,
                None => {
                    self.skip(len)?;
                    continue;
                }
            };
            // Pull the payload into our buffer
            match self.file.read_exact(&mut self.buf[..len as usize]) {
                Err(ref e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
                Err(e) => return Err(e.into()),
                Ok(_) => (),
            };
            match decode_record(rtype, dtype, &self.buf[..len as usize])? {
                Some(record) => return Ok(Some(record)),
                None => continue, // Valid record type with no bearing here
            }
        }
    }
    /// Skip over `len` bytes of record payload
    fn skip(&mut self, len: u16) -> GdsResult<()> {
        self.file.seek(SeekFrom::Current(len.into()))?;
        Ok(())
    }
}
/// Decode payload `data` of a record with header types `(rtype, dtype)`.
/// Returns `Ok(None)` for the valid record types the data model does not
/// carry; those are read and discarded.
fn decode_record(
    rtype: GdsRecordType,
    dtype: GdsDataType,
    data: &[u8],
) -> GdsResult<Option<GdsRecord>> {
    use GdsDataType::{BitArray, NoData, Str, F64, I16, I32};
    let len = data.len() as u16;
    let record: GdsRecord = match (rtype, dtype, len) {
        // Library-Level Records
        (GdsRecordType::Header, I16, 2) => GdsRecord::Header {
            version: BigEndian::read_i16(data),
        },
        (GdsRecordType::BgnLib, I16, 24) => GdsRecord::BgnLib,
        (GdsRecordType::LibName, Str, _) => GdsRecord::LibName(read_str(data)?),
        (GdsRecordType::Units, F64, 16) => {
            let mut raw = [0u8; 16];
            raw.copy_from_slice(data);
            GdsRecord::Units {
                uu: GdsFloat64::decode(&data[..8])?,
                meters: GdsFloat64::decode(&data[8..])?,
                raw,
            }
        }
        (GdsRecordType::EndLib, NoData, 0) => GdsRecord::EndLib,

        // Structure (Cell) Level Records
        (GdsRecordType::BgnStr, I16, 24) => GdsRecord::BgnStr,
        (GdsRecordType::StrName, Str, _) => GdsRecord::StrName(read_str(data)?),
        (GdsRecordType::SName, Str, _) => GdsRecord::SName(read_str(data)?),
        (GdsRecordType::EndStr, NoData, 0) => GdsRecord::EndStr,

        // Element-Level Records
        (GdsRecordType::Boundary, NoData, 0) => GdsRecord::Boundary,
        (GdsRecordType::Path, NoData, 0) => GdsRecord::Path,
        (GdsRecordType::Sref, NoData, 0) => GdsRecord::Sref,
        (GdsRecordType::Aref, NoData, 0) => GdsRecord::Aref,
        (GdsRecordType::Text, NoData, 0) => GdsRecord::Text,
        (GdsRecordType::Node, NoData, 0) => GdsRecord::Node,
        (GdsRecordType::Box, NoData, 0) => GdsRecord::Box,
        (GdsRecordType::Layer, I16, 2) => GdsRecord::Layer(BigEndian::read_i16(data)),
        (GdsRecordType::DataType, I16, 2) => GdsRecord::DataType(BigEndian::read_i16(data)),
        (GdsRecordType::Width, I32, 4) => GdsRecord::Width(BigEndian::read_i32(data)),
        (GdsRecordType::Xy, I32, l) if l % 4 == 0 => GdsRecord::Xy(read_i32s(data)),
        (GdsRecordType::EndEl, NoData, 0) => GdsRecord::EndEl,

        // Reference attributes
        (GdsRecordType::ColRow, I16, 4) => GdsRecord::ColRow {
            cols: BigEndian::read_i16(&data[0..2]),
            rows: BigEndian::read_i16(&data[2..4]),
        },
        (GdsRecordType::PathType, I16, 2) => GdsRecord::PathType(BigEndian::read_i16(data)),
        (GdsRecordType::Strans, BitArray, 2) => GdsRecord::Strans(data[0], data[1]),
        (GdsRecordType::Mag, F64, 8) => GdsRecord::Mag(GdsFloat64::decode(data)?),
        (GdsRecordType::Angle, F64, 8) => GdsRecord::Angle(GdsFloat64::decode(data)?),

        // Remaining valid record types: read and discarded
        (GdsRecordType::TextType, ..)
        | (GdsRecordType::Presentation, ..)
        | (GdsRecordType::String, ..)
        | (GdsRecordType::RefLibs, ..)
        | (GdsRecordType::Fonts, ..)
        | (GdsRecordType::Generations, ..)
        | (GdsRecordType::AttrTable, ..)
        | (GdsRecordType::ElemFlags, ..)
        | (GdsRecordType::NodeType, ..)
        | (GdsRecordType::PropAttr, ..)
        | (GdsRecordType::PropValue, ..)
        | (GdsRecordType::BoxType, ..)
        | (GdsRecordType::Plex, ..)
        | (GdsRecordType::BgnExtn, ..)
        | (GdsRecordType::EndExtn, ..)
        | (GdsRecordType::TapeNum, ..)
        | (GdsRecordType::TapeCode, ..)
        | (GdsRecordType::Format, ..)
        | (GdsRecordType::Mask, ..)
        | (GdsRecordType::EndMasks, ..)
        | (GdsRecordType::LibDirSize, ..)
        | (GdsRecordType::SrfName, ..)
        | (GdsRecordType::LibSecur, ..) => return Ok(None),

        // Failing to meet any of these clauses means this is an invalid record
        _ => return Err(GdsError::RecordDecode(rtype, dtype, len)),
    };
    Ok(Some(record))
}
/// Convert `data` to a `String`, stripping an optional trailing NUL pad
fn read_str(data: &[u8]) -> GdsResult<String> {
    let data = match data.last() {
        Some(&0u8) => &data[..data.len() - 1],
        _ => data,
    };
    Ok(std::str::from_utf8(data)?.into())
}
/// Convert big-endian `data` to a vector of `i32`.
/// Requires `data.len()` be a multiple of four.
fn read_i32s(data: &[u8]) -> Vec<i32> {
    let mut rv = vec![0i32; data.len() / 4];
    BigEndian::read_i32_into(data, &mut rv);
    rv
}

/// # GdsParser
///
/// Iterator of [GdsRecord]s, loaded from file one at a time.
pub struct GdsParser {
    /// File being read
    rdr: GdsReader,
    /// Set once ENDLIB (or the end of the stream) is reached
    done: bool,
}
impl GdsParser {
    /// Create a new [GdsParser] for the file at path `fname`
    pub fn open(fname: &Path) -> GdsResult<GdsParser> {
        Ok(Self::new(GdsReader::open(fname)?))
    }
    /// Create a new [GdsParser] reading open [File] `file`
    pub fn from_file(file: File) -> GdsResult<GdsParser> {
        Ok(Self::new(GdsReader::from_file(file)?))
    }
    fn new(rdr: GdsReader) -> GdsParser {
        GdsParser { rdr, done: false }
    }
    /// Advance and return the next record.
    /// Returns `None` upon ENDLIB, and forever after; likewise at a clean
    /// or truncated end of the underlying stream.
    fn next(&mut self) -> GdsResult<Option<GdsRecord>> {
        if self.done {
            return Ok(None);
        }
        match self.rdr.read_record()? {
            None | Some(GdsRecord::EndLib) => {
                self.done = true;
                Ok(None)
            }
            some => Ok(some),
        }
    }
}

impl GdsLibrary {
    /// Parse a [GdsLibrary] from parser `it`, then run the two
    /// post-passes: path expansion and reference resolution.
    pub(crate) fn parse(it: &mut GdsParser) -> GdsResult<GdsLibrary> {
        let mut lib = GdsLibrary::default();
        while let Some(r) = it.next()? {
            match r {
                GdsRecord::Header { version } => lib.version = version,
                GdsRecord::Units { uu, meters, raw } => {
                    lib.uu_per_dbunit = uu;
                    lib.meter_per_dbunit = meters;
                    lib.units_raw = raw;
                }
                GdsRecord::BgnStr => {
                    // A cell cut off before its ENDSTR is dropped
                    if let Some(cell) = GdsCell::parse(it)? {
                        lib.cells.push(cell);
                    }
                }
                // LIBNAME and everything else at library level: no effect
                _ => (),
            };
        }
        lib.expand_paths();
        lib.resolve_refs();
        Ok(lib)
    }
    /// Post-pass one: offset every path's centerline into its equivalent
    /// closed ring
    pub(crate) fn expand_paths(&mut self) {
        for cell in self.cells.iter_mut() {
            for elem in cell.elems.iter_mut() {
                if let GdsElement::GdsPath(p) = elem {
                    p.expanded = expand_path(&p.xy, p.width, p.path_type);
                }
            }
        }
    }
    /// Post-pass two: resolve every SREF/AREF name to its cell index.
    /// First definition wins for duplicated names; names matching no cell
    /// stay unresolved and later expand to nothing.
    pub(crate) fn resolve_refs(&mut self) {
        let mut index = HashMap::with_capacity(self.cells.len());
        for (i, cell) in self.cells.iter().enumerate() {
            index.entry(cell.name.clone()).or_insert(i);
        }
        for cell in self.cells.iter_mut() {
            for elem in cell.elems.iter_mut() {
                match elem {
                    GdsElement::GdsStructRef(sref) => sref.cell = index.get(&sref.name).copied(),
                    GdsElement::GdsArrayRef(aref) => aref.cell = index.get(&aref.name).copied(),
                    _ => (),
                };
            }
        }
    }
}
impl GdsCell {
    /// Parse a cell body, the BGNSTR record having been consumed.
    /// Returns `None` if the stream ends before ENDSTR.
    fn parse(it: &mut GdsParser) -> GdsResult<Option<GdsCell>> {
        let mut cell = GdsCell::default();
        while let Some(r) = it.next()? {
            match r {
                GdsRecord::EndStr => return Ok(Some(cell)), // End-of-cell
                GdsRecord::StrName(name) => cell.name = name,
                GdsRecord::Boundary => match GdsBoundary::parse(it)? {
                    Some(e) => cell.elems.push(e.into()),
                    None => break,
                },
                GdsRecord::Path => match GdsPath::parse(it)? {
                    Some(e) => cell.elems.push(e.into()),
                    None => break,
                },
                GdsRecord::Sref => match GdsStructRef::parse(it)? {
                    Some(e) => cell.elems.push(e.into()),
                    None => break,
                },
                GdsRecord::Aref => match GdsArrayRef::parse(it)? {
                    Some(e) => cell.elems.push(e.into()),
                    None => break,
                },
                // Text, node, and box elements are read and discarded
                GdsRecord::Text | GdsRecord::Node | GdsRecord::Box => {
                    if !skim_element(it)? {
                        break;
                    }
                }
                // Stray records between elements: no effect
                _ => (),
            };
        }
        Ok(None)
    }
}
impl GdsBoundary {
    /// Parse a boundary body, up to its ENDEL.
    /// Returns `None` if the stream ends first.
    fn parse(it: &mut GdsParser) -> GdsResult<Option<GdsBoundary>> {
        let mut e = GdsBoundary::default();
        while let Some(r) = it.next()? {
            match r {
                GdsRecord::EndEl => return Ok(Some(e)), // End-of-element
                GdsRecord::Layer(d) => e.layer = d,
                GdsRecord::Xy(d) => e.xy = GdsPoint::parse_vec(&d)?,
                // DATATYPE and the rest: no effect
                _ => (),
            };
        }
        Ok(None)
    }
}
impl GdsPath {
    /// Parse a path body, up to its ENDEL.
    /// Returns `None` if the stream ends first.
    fn parse(it: &mut GdsParser) -> GdsResult<Option<GdsPath>> {
        let mut e = GdsPath::default();
        while let Some(r) = it.next()? {
            match r {
                GdsRecord::EndEl => return Ok(Some(e)), // End-of-element
                GdsRecord::Layer(d) => e.layer = d,
                GdsRecord::Width(d) => e.width = d,
                GdsRecord::PathType(d) => e.path_type = d,
                GdsRecord::Xy(d) => e.xy = GdsPoint::parse_vec(&d)?,
                _ => (),
            };
        }
        Ok(None)
    }
}
impl GdsStructRef {
    /// Parse a struct-reference body, up to its ENDEL.
    /// Returns `None` if the stream ends first.
    fn parse(it: &mut GdsParser) -> GdsResult<Option<GdsStructRef>> {
        let mut e = GdsStructRef::default();
        while let Some(r) = it.next()? {
            match r {
                GdsRecord::EndEl => return Ok(Some(e)), // End-of-element
                GdsRecord::SName(d) => e.name = d,
                GdsRecord::Xy(d) => {
                    if let Some(p) = GdsPoint::parse_vec(&d)?.first() {
                        e.xy = *p;
                    }
                }
                GdsRecord::Strans(d0, d1) => e.strans = u16::from_be_bytes([d0, d1]),
                GdsRecord::Mag(d) => e.mag = d,
                // The ANGLE record carries degrees; the model holds radians
                GdsRecord::Angle(d) => e.angle = d.to_radians(),
                _ => (),
            };
        }
        Ok(None)
    }
}
impl GdsArrayRef {
    /// Parse an array-reference body, up to its ENDEL.
    /// Returns `None` if the stream ends first.
    fn parse(it: &mut GdsParser) -> GdsResult<Option<GdsArrayRef>> {
        let mut e = GdsArrayRef::default();
        while let Some(r) = it.next()? {
            match r {
                GdsRecord::EndEl => return Ok(Some(e)), // End-of-element
                GdsRecord::SName(d) => e.name = d,
                GdsRecord::ColRow { cols, rows } => {
                    e.cols = cols;
                    e.rows = rows;
                }
                GdsRecord::Xy(d) => {
                    // Origin, column-axis endpoint, row-axis endpoint
                    let pts = GdsPoint::parse_vec(&d)?;
                    if pts.len() >= 3 {
                        e.xy = [pts[0], pts[1], pts[2]];
                    }
                }
                GdsRecord::Strans(d0, d1) => e.strans = u16::from_be_bytes([d0, d1]),
                GdsRecord::Mag(d) => e.mag = d,
                GdsRecord::Angle(d) => e.angle = d.to_radians(),
                _ => (),
            };
        }
        Ok(None)
    }
}
/// Skim an unsupported element (TEXT, NODE, BOX) to its ENDEL, discarding
/// all content. Returns false if the stream ends first.
fn skim_element(it: &mut GdsParser) -> GdsResult<bool> {
    while let Some(r) = it.next()? {
        if r == GdsRecord::EndEl {
            return Ok(true);
        }
    }
    Ok(false)
}
