//! Flattened polygon extraction from raw cell bytes
//!
//! Re-scans a cell's records and emits the vertices of every BOUNDARY and
//! BOX element, scaled to the requested unit. Referenced cells are scanned
//! recursively up to the requested depth, and every shape gets an id that
//! is unique across the whole flattened output.

use super::rawcell::{GdsUnits, RawCell, RawCellMap};
use super::records::*;
use crate::config::RawCellConfig;
use crate::error::{ErrorCode, GdsError, Result};
use base64::{engine::general_purpose, Engine as _};
use serde::{Serialize, Serializer};

/// One output vertex, tagged with the shape it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PolygonVertex {
    pub x: i32,
    pub y: i32,
    pub polygon_id: i32,
}

/// Id counter and output shared by every level of a flattening call
#[derive(Debug, Default)]
pub struct PolygonAccumulator {
    next_id: i32,
    vertices: Vec<PolygonVertex>,
}

impl PolygonAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start numbering shapes at `first_id`
    pub fn starting_at(first_id: i32) -> Self {
        Self {
            next_id: first_id,
            vertices: Vec::new(),
        }
    }

    /// Id the next closed shape will receive
    pub fn next_id(&self) -> i32 {
        self.next_id
    }

    pub fn vertices(&self) -> &[PolygonVertex] {
        &self.vertices
    }

    pub fn into_vertices(self) -> Vec<PolygonVertex> {
        self.vertices
    }

    fn push(&mut self, x: i32, y: i32) {
        self.vertices.push(PolygonVertex {
            x,
            y,
            polygon_id: self.next_id,
        });
    }

    fn close_shape(&mut self) -> Result<()> {
        self.next_id = self.next_id.checked_add(1).ok_or_else(|| {
            GdsError::new(ErrorCode::IdOverflow, format!("more than {} shapes in one extraction", i32::MAX))
        })?;
        Ok(())
    }
}

/// Result of a top-level extraction
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolygonSet {
    #[serde(rename = "vertexData", serialize_with = "serialize_vertices_base64")]
    pub vertices: Vec<PolygonVertex>,
    pub vertex_count: usize,
    pub polygon_count: usize,
    /// Tolerance after unit derivation, for curve flattening downstream
    pub tolerance: f64,
}

impl PolygonSet {
    fn new(vertices: Vec<PolygonVertex>, polygon_count: usize, tolerance: f64) -> Self {
        Self {
            vertex_count: vertices.len(),
            vertices,
            polygon_count,
            tolerance,
        }
    }

    /// Row-major `N x 3` array of `[x, y, polygon_id]`
    pub fn to_flat_i32(&self) -> Vec<i32> {
        self.vertices
            .iter()
            .flat_map(|v| [v.x, v.y, v.polygon_id])
            .collect()
    }

    /// Vertices grouped by polygon id, in output order
    pub fn polygons(&self) -> Vec<(i32, Vec<(i32, i32)>)> {
        let mut grouped: Vec<(i32, Vec<(i32, i32)>)> = Vec::new();
        for v in &self.vertices {
            match grouped.last_mut() {
                Some((id, points)) if *id == v.polygon_id => points.push((v.x, v.y)),
                _ => grouped.push((v.polygon_id, vec![(v.x, v.y)])),
            }
        }
        grouped
    }
}

/// Serialize vertices as base64 of little-endian `i32` triples
pub fn serialize_vertices_base64<S>(data: &[PolygonVertex], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let bytes: Vec<u8> = data
        .iter()
        .flat_map(|v| [v.x, v.y, v.polygon_id])
        .flat_map(i32::to_le_bytes)
        .collect();
    serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
}

/// Scale factor and tolerance for a UNITS record.
///
/// `unit <= 0` keeps user units; otherwise coordinates are expressed in
/// multiples of `unit` meters. A non-positive tolerance is derived from the
/// database grid.
pub fn scale_factor(units: GdsUnits, unit: f64, tolerance: f64) -> (f64, f64) {
    let factor = if unit > 0.0 {
        units.meters / unit
    } else {
        units.user
    };
    let tolerance = if tolerance <= 0.0 {
        units.meters / factor
    } else {
        tolerance
    };
    (factor, tolerance)
}

impl RawCell {
    /// Flatten this cell's shapes.
    ///
    /// `depth` limits how many reference levels are inlined: 0 keeps only
    /// the cell's own shapes, a negative value inlines without limit.
    /// Failures are also reported through `config`'s diagnostic sink.
    pub fn get_polygons(&self, depth: i64, unit: f64, tolerance: f64, config: &RawCellConfig) -> Result<PolygonSet> {
        let mut acc = PolygonAccumulator::new();
        let tolerance = self.collect_polygons(depth, unit, tolerance, &mut acc, config)?;
        let polygon_count = acc.next_id() as usize;
        Ok(PolygonSet::new(acc.into_vertices(), polygon_count, tolerance))
    }

    /// Append this cell's flattened shapes to `acc`; returns the tolerance in effect
    pub fn collect_polygons(
        &self,
        depth: i64,
        unit: f64,
        tolerance: f64,
        acc: &mut PolygonAccumulator,
        config: &RawCellConfig,
    ) -> Result<f64> {
        let mut active = vec![self.name.clone()];
        self.scan_polygons(depth, unit, tolerance, acc, &mut active)
            .inspect_err(|err| {
                tracing::warn!(cell = %self.name, error = %err, "polygon extraction failed");
                config.report(&format!("Unable to extract polygons of cell {}: {}.", self.name, err));
            })
    }

    fn scan_polygons(
        &self,
        depth: i64,
        unit: f64,
        mut tolerance: f64,
        acc: &mut PolygonAccumulator,
        active: &mut Vec<String>,
    ) -> Result<f64> {
        let bytes = self.read_body()?;
        // Library units from the load pass; raw coordinates if none were seen
        let mut factor = 1.0;
        if let Some(units) = self.units {
            (factor, tolerance) = scale_factor(units, unit, tolerance);
        }
        let references = if depth != 0 {
            self.dependencies(false)
        } else {
            RawCellMap::new()
        };

        let mut in_target = false;
        let mut in_shape = false;
        for record in records_in(&bytes) {
            let record = record?;
            match record.record_type() {
                UNITS => {
                    let reals = record.reals();
                    if let &[user, meters, ..] = reals.as_slice() {
                        (factor, tolerance) = scale_factor(GdsUnits { user, meters }, unit, tolerance);
                    }
                }
                STRNAME => {
                    if !in_target && record.text_str()? == self.name {
                        tracing::debug!(cell = %self.name, depth, first_id = acc.next_id(), "scanning cell shapes");
                        in_target = true;
                    }
                }
                ENDSTR => {
                    // Only the target structure contributes shapes
                    if in_target {
                        break;
                    }
                }
                SNAME => {
                    if in_target && depth != 0 {
                        let name = record.text_str()?;
                        // Missing references were reported by the loader
                        let Some(child) = references.get(name) else {
                            continue;
                        };
                        if active.iter().any(|open| open == name) {
                            tracing::warn!(cell = %self.name, reference = %name, "skipping cyclic reference");
                            continue;
                        }
                        // Inline the child with the shared id counter, one level shallower
                        active.push(name.to_string());
                        let result = child
                            .borrow()
                            .scan_polygons(depth.saturating_sub(1), unit, tolerance, acc, active);
                        active.pop();
                        result?;
                    }
                }
                BOUNDARY | BOX => {
                    if in_target {
                        in_shape = true;
                    }
                }
                XY => {
                    // Reference and path XY records are positions, not outlines
                    if in_shape {
                        for (x, y) in record.coordinates() {
                            acc.push((factor * x as f64) as i32, (factor * y as f64) as i32);
                        }
                    }
                }
                ENDEL => {
                    if in_shape {
                        in_shape = false;
                        acc.close_shape()?;
                    }
                }
                _ => {}
            }
        }
        Ok(tolerance)
    }
}

/// Flatten the cell called `target_name`; an unknown name yields no shapes
pub fn extract_polygons(
    cells: &RawCellMap,
    target_name: &str,
    depth: i64,
    unit: f64,
    tolerance: f64,
    config: &RawCellConfig,
) -> Result<PolygonSet> {
    match cells.get(target_name) {
        Some(cell) => cell.borrow().get_polygons(depth, unit, tolerance, config),
        None => {
            tracing::debug!(cell = %target_name, "target cell not in library");
            Ok(PolygonSet::new(Vec::new(), 0, tolerance))
        }
    }
}
