//! In-memory table of string cells.
//!
//! Every pipeline stage is a whole-table transform: frame in, frame out, no
//! shared mutable state. Frames are small (territorial-authority and
//! health-region tables are hundreds of rows), so full materialization keeps
//! every stage independently testable and replayable.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use encoding_rs::Encoding;
use serde_json::Value as JsonValue;

use crate::io_utils;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Frame {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| anyhow!("Column '{name}' not found (headers: {:?})", self.headers))
    }

    pub fn read_csv(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<Self> {
        let mut reader = io_utils::open_csv_reader(path, delimiter)?;
        let headers = io_utils::reader_headers(&mut reader, encoding)?;
        let width = headers.len();
        let mut rows = Vec::new();
        for (row_idx, record) in reader.byte_records().enumerate() {
            let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
            let mut decoded = io_utils::decode_record(&record, encoding)?;
            decoded.resize(width, String::new());
            rows.push(decoded);
        }
        Ok(Self { headers, rows })
    }

    pub fn write_csv(&self, path: Option<&Path>, delimiter: u8) -> Result<()> {
        let mut writer = io_utils::open_csv_writer(path, delimiter)?;
        writer
            .write_record(&self.headers)
            .context("Writing header row")?;
        for row in &self.rows {
            writer.write_record(row).context("Writing data row")?;
        }
        writer.flush().context("Flushing output")?;
        Ok(())
    }
}

/// Reads a file as a frame, treating `.geojson`/`.json` inputs as feature
/// collections and everything else as delimited text.
pub fn read_input(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<Frame> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("geojson") || ext.eq_ignore_ascii_case("json") => {
            read_geojson(path)
        }
        _ => Frame::read_csv(path, delimiter, encoding),
    }
}

/// Flattens a GeoJSON feature collection's `properties` into a frame.
///
/// Column order is first-seen across features; features missing a property
/// get an empty cell. Geometry is ignored; only attributes take part in
/// key reconciliation.
pub fn read_geojson(path: &Path) -> Result<Frame> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Opening GeoJSON file {path:?}"))?;
    let doc: JsonValue =
        serde_json::from_str(&raw).with_context(|| format!("Parsing GeoJSON in {path:?}"))?;
    let features = doc
        .get("features")
        .and_then(|f| f.as_array())
        .ok_or_else(|| anyhow!("{path:?} is not a GeoJSON feature collection"))?;

    let mut headers: Vec<String> = Vec::new();
    let mut property_maps = Vec::with_capacity(features.len());
    for (idx, feature) in features.iter().enumerate() {
        let properties = feature
            .get("properties")
            .and_then(|p| p.as_object())
            .ok_or_else(|| anyhow!("Feature {idx} in {path:?} has no properties object"))?;
        for key in properties.keys() {
            if !headers.iter().any(|h| h == key) {
                headers.push(key.clone());
            }
        }
        property_maps.push(properties);
    }

    let rows = property_maps
        .into_iter()
        .map(|properties| {
            headers
                .iter()
                .map(|key| properties.get(key).map(json_cell).unwrap_or_default())
                .collect()
        })
        .collect();

    Ok(Frame { headers, rows })
}

fn json_cell(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}
