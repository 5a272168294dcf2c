//!
//! # Flat21 Byte-Encoding and Writing
//!
//! Serializes a flat polygon set as a complete GDSII library holding a
//! single cell named "TOP". The source library's UNITS payload is
//! re-emitted verbatim, so the output carries exactly the input's scale;
//! date fields are written zeroed.
//!

// Std-Lib Imports
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

// Crates.io
use byteorder::{BigEndian, WriteBytesExt};

// Local Imports
use crate::data::{GdsDataType, GdsError, GdsLibrary, GdsRecordType, GdsResult, Poly};

/// Gds Writing Helper
pub struct GdsWriter<'wr> {
    /// Write Destination
    dest: Box<dyn Write + 'wr>,
}
impl<'wr> GdsWriter<'wr> {
    /// Create a new [GdsWriter] with destination file `fname`
    pub fn open(fname: impl AsRef<Path>) -> GdsResult<Self> {
        let file = File::create(&fname).map_err(|e| {
            GdsError::FileIO(format!(
                "failed creating {}: {}",
                fname.as_ref().display(),
                e
            ))
        })?;
        Ok(Self::new(BufWriter::new(file)))
    }
    /// Create a new [GdsWriter] to destination `dest`
    pub fn new(dest: impl Write + 'wr) -> Self {
        Self {
            dest: Box::new(dest),
        }
    }
    /// Write polygon set `polys` as a single-cell library, with
    /// `units_raw` re-emitted verbatim as its UNITS record.
    pub fn write_flat(&mut self, units_raw: &[u8; 16], polys: &[Poly]) -> GdsResult<()> {
        // Zero-valued modification-date payload, for BGNLIB and BGNSTR alike
        let dates = [0u8; 24];
        self.write_header(GdsRecordType::Header, GdsDataType::I16, 2)?;
        self.dest.write_i16::<BigEndian>(600)?;
        self.write_bytes(GdsRecordType::BgnLib, GdsDataType::I16, &dates)?;
        self.write_str(GdsRecordType::LibName, "")?;
        self.write_bytes(GdsRecordType::Units, GdsDataType::F64, units_raw)?;
        self.write_bytes(GdsRecordType::BgnStr, GdsDataType::I16, &dates)?;
        self.write_str(GdsRecordType::StrName, "TOP")?;
        for poly in polys {
            self.write_poly(poly)?;
        }
        self.write_header(GdsRecordType::EndStr, GdsDataType::NoData, 0)?;
        self.write_header(GdsRecordType::EndLib, GdsDataType::NoData, 0)?;
        self.dest.flush()?;
        Ok(())
    }
    /// Write one polygon as a BOUNDARY element, on its layer with
    /// datatype zero. Vertices are written verbatim; ring closure is not
    /// checked.
    fn write_poly(&mut self, poly: &Poly) -> GdsResult<()> {
        self.write_header(GdsRecordType::Boundary, GdsDataType::NoData, 0)?;
        self.write_header(GdsRecordType::Layer, GdsDataType::I16, 2)?;
        self.dest.write_i16::<BigEndian>(poly.layer)?;
        self.write_header(GdsRecordType::DataType, GdsDataType::I16, 2)?;
        self.dest.write_i16::<BigEndian>(0)?;
        self.write_header(GdsRecordType::Xy, GdsDataType::I32, 8 * poly.xy.len())?;
        for p in poly.xy.iter() {
            self.dest.write_i32::<BigEndian>(p.x)?;
            self.dest.write_i32::<BigEndian>(p.y)?;
        }
        self.write_header(GdsRecordType::EndEl, GdsDataType::NoData, 0)?;
        Ok(())
    }
    /// Write a record header: the 16-bit total length (which includes
    /// these four header bytes), the record-type byte, and the data-type
    /// byte. Payloads too long for the length field are a [GdsError::RecordLen];
    /// a single XY record tops out at 8191 coordinate pairs.
    fn write_header(
        &mut self,
        rtype: GdsRecordType,
        dtype: GdsDataType,
        len: usize,
    ) -> GdsResult<()> {
        let total = match u16::try_from(len + 4) {
            Ok(val) => val,
            Err(_) => return Err(GdsError::RecordLen(len)),
        };
        self.dest.write_u16::<BigEndian>(total)?;
        self.dest.write_u8(rtype as u8)?;
        self.dest.write_u8(dtype as u8)?;
        Ok(())
    }
    /// Write a record with payload `data`
    fn write_bytes(
        &mut self,
        rtype: GdsRecordType,
        dtype: GdsDataType,
        data: &[u8],
    ) -> GdsResult<()> {
        self.write_header(rtype, dtype, data.len())?;
        self.dest.write_all(data)?;
        Ok(())
    }
    /// Write a string record. GDS allows only even record lengths, so
    /// odd-length strings are padded with a zero byte.
    fn write_str(&mut self, rtype: GdsRecordType, s: &str) -> GdsResult<()> {
        let len = s.len() + s.len() % 2;
        self.write_header(rtype, GdsDataType::Str, len)?;
        self.dest.write_all(s.as_bytes())?;
        if s.len() % 2 != 0 {
            self.dest.write_u8(0x00)?;
        }
        Ok(())
    }
}
impl GdsLibrary {
    /// Write polygon set `polys` to a new GDSII file at `dest`, carrying
    /// over this library's units
    pub fn write_polys(&self, dest: impl AsRef<Path>, polys: &[Poly]) -> GdsResult<()> {
        GdsWriter::open(dest)?.write_flat(&self.units_raw, polys)
    }
}
