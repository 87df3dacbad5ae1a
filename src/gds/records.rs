//! GDSII record codec
//!
//! A stream is a sequence of records: `[length: u16 BE][record type: u8][data type: u8][payload]`,
//! where `length` counts the 4-byte header. Multi-byte payload values are
//! big-endian; `Record::data` normalizes them according to the data type tag.

use crate::error::{ErrorCode, GdsError, Result};
use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

// Record types
pub const HEADER: u8 = 0x00;
pub const BGNLIB: u8 = 0x01;
pub const LIBNAME: u8 = 0x02;
pub const UNITS: u8 = 0x03;
pub const ENDLIB: u8 = 0x04;
pub const BGNSTR: u8 = 0x05;
pub const STRNAME: u8 = 0x06;
pub const ENDSTR: u8 = 0x07;
pub const BOUNDARY: u8 = 0x08;
pub const PATH: u8 = 0x09;
pub const SREF: u8 = 0x0A;
pub const AREF: u8 = 0x0B;
pub const TEXT: u8 = 0x0C;
pub const LAYER: u8 = 0x0D;
pub const DATATYPE: u8 = 0x0E;
pub const WIDTH: u8 = 0x0F;
pub const XY: u8 = 0x10;
pub const ENDEL: u8 = 0x11;
pub const SNAME: u8 = 0x12;
pub const COLROW: u8 = 0x13;
pub const BOX: u8 = 0x2D;

// Data types
pub const DT_NO_DATA: u8 = 0x00;
pub const DT_BIT_ARRAY: u8 = 0x01;
pub const DT_INT16: u8 = 0x02;
pub const DT_INT32: u8 = 0x03;
pub const DT_REAL32: u8 = 0x04;
pub const DT_REAL64: u8 = 0x05;
pub const DT_ASCII: u8 = 0x06;

const RECORD_NAMES: [&str; 60] = [
    "HEADER", "BGNLIB", "LIBNAME", "UNITS", "ENDLIB", "BGNSTR",
    "STRNAME", "ENDSTR", "BOUNDARY", "PATH", "SREF", "AREF",
    "TEXT", "LAYER", "DATATYPE", "WIDTH", "XY", "ENDEL",
    "SNAME", "COLROW", "TEXTNODE", "NODE", "TEXTTYPE", "PRESENTATION",
    "SPACING", "STRING", "STRANS", "MAG", "ANGLE", "UINTEGER",
    "USTRING", "REFLIBS", "FONTS", "PATHTYPE", "GENERATIONS", "ATTRTABLE",
    "STYPTABLE", "STRTYPE", "ELFLAGS", "ELKEY", "LINKTYPE", "LINKKEYS",
    "NODETYPE", "PROPATTR", "PROPVALUE", "BOX", "BOXTYPE", "PLEX",
    "BGNEXTN", "ENDEXTN", "TAPENUM", "TAPECODE", "STRCLASS", "RESERVED",
    "FORMAT", "MASK", "ENDMASKS", "LIBDIRSIZE", "SRFNAME", "LIBSECUR",
];

/// Name of a record type tag, for diagnostics
pub fn record_name(record_type: u8) -> &'static str {
    RECORD_NAMES
        .get(record_type as usize)
        .copied()
        .unwrap_or("UNKNOWN")
}

/// Read one record into `buffer`, replacing its contents.
///
/// The buffer grows to fit the record and keeps its allocation between
/// calls. Returns the record length (header included).
pub fn read_record<R: Read>(stream: &mut R, buffer: &mut Vec<u8>, limit: usize) -> Result<usize> {
    let length = stream
        .read_u16::<BigEndian>()
        .map_err(|e| GdsError::io("reading record header", e))? as usize;
    if length < 4 {
        return Err(GdsError::new(
            ErrorCode::TruncatedRecord,
            format!("record length {} is shorter than its header", length),
        ));
    }
    if length > limit {
        return Err(GdsError::new(
            ErrorCode::RecordTooLong,
            format!("record length {} exceeds limit {}", length, limit),
        ));
    }
    buffer.clear();
    buffer.resize(length, 0);
    BigEndian::write_u16(&mut buffer[..2], length as u16);
    stream
        .read_exact(&mut buffer[2..])
        .map_err(|e| GdsError::io("reading record body", e))?;
    Ok(length)
}

/// Stateful reader that tracks the stream offset of every record it returns
pub struct RecordReader<R> {
    inner: R,
    buffer: Vec<u8>,
    offset: u64,
    limit: usize,
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R, limit: usize) -> Self {
        Self {
            inner,
            buffer: Vec::with_capacity(limit.min(crate::config::MAX_RECORD_LENGTH) + 1),
            offset: 0,
            limit,
        }
    }

    /// Offset of the next record in the underlying stream
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn read_record(&mut self) -> Result<Record<'_>> {
        let start = self.offset;
        let length = read_record(&mut self.inner, &mut self.buffer, self.limit)?;
        self.offset += length as u64;
        Ok(Record {
            offset: start,
            bytes: &self.buffer[..length],
        })
    }
}

/// A single record borrowed from a reader buffer or a cell body
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    /// Offset of the record header in its stream
    pub offset: u64,
    bytes: &'a [u8],
}

/// Payload values normalized to host byte order
#[derive(Debug, Clone, PartialEq)]
pub enum RecordData<'a> {
    NoData,
    BitArray(Vec<u16>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    /// Raw 4-byte real bit patterns
    Real32(Vec<u32>),
    /// Raw 8-byte real bit patterns (excess-64 encoding, see `gdsii_real_to_f64`)
    Real64(Vec<u64>),
    Ascii(&'a [u8]),
}

impl<'a> Record<'a> {
    /// Wrap an already-framed record (`bytes` starts at the length field)
    pub fn from_bytes(offset: u64, bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(GdsError::new(ErrorCode::TruncatedRecord, "record shorter than its header"));
        }
        Ok(Self { offset, bytes })
    }

    pub fn length(&self) -> usize {
        self.bytes.len()
    }

    pub fn record_type(&self) -> u8 {
        self.bytes[2]
    }

    pub fn data_type(&self) -> u8 {
        self.bytes[3]
    }

    pub fn name(&self) -> &'static str {
        record_name(self.record_type())
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[4..]
    }

    /// The full record, header included
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn data(&self) -> RecordData<'a> {
        let payload = self.payload();
        match self.data_type() {
            DT_BIT_ARRAY => RecordData::BitArray(decode_words(payload, BigEndian::read_u16_into)),
            DT_INT16 => RecordData::Int16(decode_words(payload, BigEndian::read_i16_into)),
            DT_INT32 => RecordData::Int32(decode_words(payload, BigEndian::read_i32_into)),
            DT_REAL32 => RecordData::Real32(decode_words(payload, BigEndian::read_u32_into)),
            DT_REAL64 => RecordData::Real64(decode_words(payload, BigEndian::read_u64_into)),
            DT_NO_DATA if payload.is_empty() => RecordData::NoData,
            _ => RecordData::Ascii(payload),
        }
    }

    /// String payload with a single trailing NUL pad removed
    pub fn text(&self) -> &'a [u8] {
        match self.payload().split_last() {
            Some((&0, rest)) => rest,
            _ => self.payload(),
        }
    }

    /// String payload as UTF-8 with all trailing NUL padding removed
    pub fn text_str(&self) -> Result<&'a str> {
        let text = std::str::from_utf8(self.payload()).map_err(|e| {
            GdsError::new(
                ErrorCode::InvalidFile,
                format!("{} at offset {} is not valid UTF-8: {}", self.name(), self.offset, e),
            )
        })?;
        Ok(text.trim_end_matches('\0'))
    }

    /// Consecutive `(x, y)` pairs of a 4-byte integer payload
    pub fn coordinates(&self) -> impl Iterator<Item = (i32, i32)> + 'a {
        self.payload()
            .chunks_exact(8)
            .map(|pair| (BigEndian::read_i32(&pair[..4]), BigEndian::read_i32(&pair[4..])))
    }

    /// 8-byte reals decoded to `f64`
    pub fn reals(&self) -> Vec<f64> {
        match self.data() {
            RecordData::Real64(bits) => bits.into_iter().map(gdsii_real_to_f64).collect(),
            _ => Vec::new(),
        }
    }
}

fn decode_words<T: Default + Clone>(payload: &[u8], read_into: fn(&[u8], &mut [T])) -> Vec<T> {
    let width = std::mem::size_of::<T>();
    let count = payload.len() / width;
    let mut values = vec![T::default(); count];
    read_into(&payload[..count * width], &mut values);
    values
}

/// Iterate over the records packed in `bytes` (e.g. a materialized cell)
pub fn records_in(bytes: &[u8]) -> impl Iterator<Item = Result<Record<'_>>> + '_ {
    let mut pos = 0usize;
    std::iter::from_fn(move || {
        if pos >= bytes.len() {
            return None;
        }
        let start = pos;
        if bytes.len() - start < 4 {
            pos = bytes.len();
            return Some(Err(GdsError::new(ErrorCode::TruncatedRecord, "trailing bytes after last record")));
        }
        let length = BigEndian::read_u16(&bytes[start..]) as usize;
        if length < 4 || start + length > bytes.len() {
            pos = bytes.len();
            return Some(Err(GdsError::new(
                ErrorCode::TruncatedRecord,
                format!("record at offset {} declares length {}", start, length),
            )));
        }
        pos += length;
        Some(Record::from_bytes(start as u64, &bytes[start..start + length]))
    })
}

/// Encode one record; `payload` must already be big-endian
pub fn write_record<W: Write>(out: &mut W, record_type: u8, data_type: u8, payload: &[u8]) -> std::io::Result<()> {
    let length = payload.len() + 4;
    if length > crate::config::MAX_RECORD_LENGTH {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} payload of {} bytes does not fit a record", record_name(record_type), payload.len()),
        ));
    }
    out.write_u16::<BigEndian>(length as u16)?;
    out.write_u8(record_type)?;
    out.write_u8(data_type)?;
    out.write_all(payload)
}

/// Pad an ASCII payload to even length, as GDSII requires
pub fn ascii_payload(text: &str) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    if bytes.len() % 2 == 1 {
        bytes.push(0);
    }
    bytes
}

/// Decode an excess-64 base-16 real: sign bit, 7-bit exponent, 56-bit mantissa
pub fn gdsii_real_to_f64(bits: u64) -> f64 {
    let mantissa = bits & 0x00FF_FFFF_FFFF_FFFF;
    if mantissa == 0 {
        return 0.0;
    }
    let exponent = ((bits >> 56) & 0x7F) as i32 - 64;
    let value = mantissa as f64 * 2f64.powi(4 * exponent - 56);
    if bits >> 63 == 1 {
        -value
    } else {
        value
    }
}

/// Encode an `f64` as an excess-64 base-16 real
pub fn f64_to_gdsii_real(value: f64) -> u64 {
    if value == 0.0 || !value.is_finite() {
        return 0;
    }
    let sign = if value < 0.0 { 1u64 << 63 } else { 0 };
    let magnitude = value.abs();
    let fexp = 0.25 * magnitude.log2();
    let mut exponent = fexp.ceil() as i32;
    if fexp == exponent as f64 {
        exponent += 1;
    }
    let mantissa = (magnitude * 16f64.powi(14 - exponent)).round() as u64;
    sign | (((exponent + 64) as u64 & 0x7F) << 56) | (mantissa & 0x00FF_FFFF_FFFF_FFFF)
}
