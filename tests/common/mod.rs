//! Helpers for building small GDSII libraries in tests
#![allow(dead_code)]

use gds_rawcell::gds::records::*;
use std::io::Write;

/// Builds a GDSII stream record by record
pub struct GdsBuilder {
    bytes: Vec<u8>,
}

impl GdsBuilder {
    /// HEADER, BGNLIB, LIBNAME and UNITS
    pub fn library(name: &str, user: f64, meters: f64) -> Self {
        let mut builder = GdsBuilder { bytes: Vec::new() };
        builder.record(HEADER, DT_INT16, &600i16.to_be_bytes());
        builder.record(BGNLIB, DT_INT16, &[0u8; 24]);
        builder.record(LIBNAME, DT_ASCII, &ascii_payload(name));
        let mut units = Vec::new();
        units.extend_from_slice(&f64_to_gdsii_real(user).to_be_bytes());
        units.extend_from_slice(&f64_to_gdsii_real(meters).to_be_bytes());
        builder.record(UNITS, DT_REAL64, &units);
        builder
    }

    /// Current stream offset
    pub fn offset(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn record(&mut self, record_type: u8, data_type: u8, payload: &[u8]) -> &mut Self {
        write_record(&mut self.bytes, record_type, data_type, payload).unwrap();
        self
    }

    pub fn begin_cell(&mut self, name: &str) -> &mut Self {
        self.record(BGNSTR, DT_INT16, &[0u8; 24]);
        self.record(STRNAME, DT_ASCII, &ascii_payload(name))
    }

    pub fn end_cell(&mut self) -> &mut Self {
        self.record(ENDSTR, DT_NO_DATA, &[])
    }

    pub fn boundary(&mut self, points: &[(i32, i32)]) -> &mut Self {
        self.shape(BOUNDARY, points)
    }

    pub fn rect(&mut self, points: &[(i32, i32)]) -> &mut Self {
        self.shape(BOX, points)
    }

    pub fn path(&mut self, points: &[(i32, i32)]) -> &mut Self {
        self.record(PATH, DT_NO_DATA, &[]);
        self.record(LAYER, DT_INT16, &1i16.to_be_bytes());
        self.record(DATATYPE, DT_INT16, &0i16.to_be_bytes());
        self.record(WIDTH, DT_INT32, &10i32.to_be_bytes());
        self.record(XY, DT_INT32, &xy_payload(points));
        self.record(ENDEL, DT_NO_DATA, &[])
    }

    pub fn sref(&mut self, name: &str, at: (i32, i32)) -> &mut Self {
        self.record(SREF, DT_NO_DATA, &[]);
        self.record(SNAME, DT_ASCII, &ascii_payload(name));
        self.record(XY, DT_INT32, &xy_payload(&[at]));
        self.record(ENDEL, DT_NO_DATA, &[])
    }

    pub fn aref(&mut self, name: &str) -> &mut Self {
        self.record(AREF, DT_NO_DATA, &[]);
        self.record(SNAME, DT_ASCII, &ascii_payload(name));
        let mut colrow = Vec::new();
        colrow.extend_from_slice(&2i16.to_be_bytes());
        colrow.extend_from_slice(&2i16.to_be_bytes());
        self.record(COLROW, DT_INT16, &colrow);
        self.record(XY, DT_INT32, &xy_payload(&[(0, 0), (20, 0), (0, 20)]));
        self.record(ENDEL, DT_NO_DATA, &[])
    }

    /// Terminate with ENDLIB
    pub fn finish(&mut self) -> Vec<u8> {
        self.record(ENDLIB, DT_NO_DATA, &[]);
        self.bytes.clone()
    }

    /// Bytes so far, without ENDLIB
    pub fn unterminated(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    fn shape(&mut self, record_type: u8, points: &[(i32, i32)]) -> &mut Self {
        self.record(record_type, DT_NO_DATA, &[]);
        self.record(LAYER, DT_INT16, &1i16.to_be_bytes());
        self.record(DATATYPE, DT_INT16, &0i16.to_be_bytes());
        self.record(XY, DT_INT32, &xy_payload(points));
        self.record(ENDEL, DT_NO_DATA, &[])
    }
}

pub fn xy_payload(points: &[(i32, i32)]) -> Vec<u8> {
    points
        .iter()
        .flat_map(|(x, y)| x.to_be_bytes().into_iter().chain(y.to_be_bytes()))
        .collect()
}

pub fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(bytes).unwrap();
    tmp.flush().unwrap();
    tmp
}

/// TOP: one 2-vertex boundary then a reference to BOTTOM.
/// BOTTOM: one 2-vertex boundary. Units give a scale factor of 1.
pub fn two_cell_library() -> Vec<u8> {
    let mut gds = GdsBuilder::library("TWO", 1.0, 1e-6);
    gds.begin_cell("TOP")
        .boundary(&[(0, 0), (10, 20)])
        .sref("BOTTOM", (100, 100))
        .end_cell();
    gds.begin_cell("BOTTOM").boundary(&[(5, 5), (7, 9)]).end_cell();
    gds.finish()
}
