//! Framed data-model blob carried by the binary-model container variant.
//!
//! Layout (little-endian):
//!
//! ```text
//! "PBDM" | version u32 | segment_count u32 | segment*
//! segment := kind u8 | name_len u32 | name | compression u8 | payload_len u32 | payload
//! ```
//!
//! Opening parses only the segment directory. Table payloads are inflated on
//! demand and read row by row, so a sample never decodes more rows than it
//! returns.

use std::fmt;
use std::io::{self, Read, Write};
use std::ops::Range;

use flate2::Compression as DeflateLevel;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use thiserror::Error;

use crate::error_codes;
use crate::model::DataType;

const MAGIC: &[u8; 4] = b"PBDM";
const SUPPORTED_VERSION: u32 = 1;

const FIXED_DECIMAL_SCALE: i64 = 10_000;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DataModelError {
    #[error("data model blob does not start with the PBDM signature")]
    BadMagic,
    #[error("unsupported data model version: {0}")]
    UnsupportedVersion(u32),
    #[error("invalid framing structure: {0}")]
    FramingInvalid(String),
    #[error("failed to inflate segment '{segment}': {reason}")]
    Compression { segment: String, reason: String },
    #[error("table '{table}' has an invalid value: {reason}")]
    InvalidValue { table: String, reason: String },
    #[error("segment '{segment}' inflates past {limit} bytes")]
    SegmentTooLarge { segment: String, limit: u64 },
}

impl DataModelError {
    pub fn code(&self) -> &'static str {
        match self {
            DataModelError::BadMagic => error_codes::DATA_MODEL_BAD_MAGIC,
            DataModelError::UnsupportedVersion(_) => error_codes::DATA_MODEL_UNSUPPORTED_VERSION,
            DataModelError::FramingInvalid(_) => error_codes::DATA_MODEL_FRAMING,
            DataModelError::Compression { .. } => error_codes::DATA_MODEL_COMPRESSION,
            DataModelError::InvalidValue { .. } => error_codes::DATA_MODEL_VALUE,
            DataModelError::SegmentTooLarge { .. } => error_codes::DATA_MODEL_SEGMENT_TOO_LARGE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Schema,
    Table,
}

impl SegmentKind {
    fn tag(self) -> u8 {
        match self {
            SegmentKind::Schema => 1,
            SegmentKind::Table => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentCompression {
    Stored,
    Deflate,
}

impl SegmentCompression {
    fn tag(self) -> u8 {
        match self {
            SegmentCompression::Stored => 0,
            SegmentCompression::Deflate => 1,
        }
    }

    fn from_tag(tag: u8) -> Option<SegmentCompression> {
        match tag {
            0 => Some(SegmentCompression::Stored),
            1 => Some(SegmentCompression::Deflate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Segment {
    kind: SegmentKind,
    name: String,
    compression: SegmentCompression,
    payload: Range<usize>,
}

/// One stored value. Display renders values the way samples are shown in
/// prompts and on the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Text(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
    /// Milliseconds since the Unix epoch.
    DateTime(i64),
    Binary(Vec<u8>),
    /// Fixed decimal scaled by 10^4.
    FixedDecimal(i64),
}

impl CellValue {
    fn tag(&self) -> u8 {
        match self {
            CellValue::Null => 0,
            CellValue::Text(_) => 1,
            CellValue::Integer(_) => 2,
            CellValue::Double(_) => 3,
            CellValue::Boolean(_) => 4,
            CellValue::DateTime(_) => 5,
            CellValue::Binary(_) => 6,
            CellValue::FixedDecimal(_) => 7,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Integer(v) => write!(f, "{}", v),
            CellValue::Double(v) => write!(f, "{}", v),
            CellValue::Boolean(v) => write!(f, "{}", v),
            CellValue::DateTime(ms) => match chrono::DateTime::from_timestamp_millis(*ms) {
                Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
                None => write!(f, "#invalid-datetime({})", ms),
            },
            CellValue::Binary(bytes) => write!(f, "<binary {} bytes>", bytes.len()),
            CellValue::FixedDecimal(v) => {
                let sign = if *v < 0 { "-" } else { "" };
                let abs = v.unsigned_abs();
                let scale = FIXED_DECIMAL_SCALE as u64;
                write!(f, "{}{}.{:04}", sign, abs / scale, abs % scale)
            }
        }
    }
}

impl serde::Serialize for CellValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Null => serializer.serialize_none(),
            CellValue::Integer(v) => serializer.serialize_i64(*v),
            CellValue::Double(v) => serializer.serialize_f64(*v),
            CellValue::Boolean(v) => serializer.serialize_bool(*v),
            CellValue::Text(s) => serializer.serialize_str(s),
            other => serializer.collect_str(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoredColumn {
    pub name: String,
    pub data_type: DataType,
}

/// Rows read from one stored table.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRows {
    pub table: String,
    pub columns: Vec<StoredColumn>,
    pub total_rows: usize,
    pub rows: Vec<Vec<CellValue>>,
}

#[derive(Debug, Clone)]
pub struct DataModelBlob {
    bytes: Vec<u8>,
    version: u32,
    segments: Vec<Segment>,
}

impl DataModelBlob {
    pub fn parse(bytes: Vec<u8>) -> Result<DataModelBlob, DataModelError> {
        if bytes.len() < MAGIC.len() || &bytes[..MAGIC.len()] != MAGIC {
            return Err(DataModelError::BadMagic);
        }

        let mut offset = MAGIC.len();
        let version = read_u32_at(&bytes, offset).ok_or_else(|| framing("truncated header"))?;
        offset += 4;
        if version != SUPPORTED_VERSION {
            return Err(DataModelError::UnsupportedVersion(version));
        }

        let count = read_length(&bytes, offset)?;
        offset += 4;

        let mut segments = Vec::with_capacity(count.min(1024));
        for idx in 0..count {
            let kind_tag = *bytes
                .get(offset)
                .ok_or_else(|| framing(format!("segment #{} truncated", idx)))?;
            offset += 1;

            let name_len = read_length(&bytes, offset)?;
            offset += 4;
            let name_range = take_range(&bytes, &mut offset, name_len)?;
            let name = std::str::from_utf8(&bytes[name_range])
                .map_err(|_| framing(format!("segment #{} name is not UTF-8", idx)))?
                .to_string();

            let compression_tag = *bytes
                .get(offset)
                .ok_or_else(|| framing(format!("segment '{}' truncated", name)))?;
            offset += 1;
            let compression = SegmentCompression::from_tag(compression_tag).ok_or_else(|| {
                framing(format!(
                    "segment '{}' has unknown compression {}",
                    name, compression_tag
                ))
            })?;

            let payload_len = read_length(&bytes, offset)?;
            offset += 4;
            let payload = take_range(&bytes, &mut offset, payload_len)?;

            let kind = match kind_tag {
                1 => SegmentKind::Schema,
                2 => SegmentKind::Table,
                other => {
                    log::debug!("skipping data model segment '{}' of kind {}", name, other);
                    continue;
                }
            };

            segments.push(Segment {
                kind,
                name,
                compression,
                payload,
            });
        }

        if offset != bytes.len() {
            return Err(framing("trailing bytes after last segment"));
        }

        log::debug!(
            "data model blob v{}: {} segments, {} bytes",
            version,
            segments.len(),
            bytes.len()
        );

        Ok(DataModelBlob {
            bytes,
            version,
            segments,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Raw bytes of the embedded model description, if the blob carries one.
    /// Inflating stops with [`DataModelError::SegmentTooLarge`] once the
    /// output would exceed `max_bytes`.
    pub fn schema_bytes(&self, max_bytes: u64) -> Result<Option<Vec<u8>>, DataModelError> {
        let Some(segment) = self.segments.iter().find(|s| s.kind == SegmentKind::Schema) else {
            return Ok(None);
        };
        let mut out = Vec::new();
        self.segment_reader(segment)
            .take(max_bytes.saturating_add(1))
            .read_to_end(&mut out)
            .map_err(|e| DataModelError::Compression {
                segment: segment.name.clone(),
                reason: e.to_string(),
            })?;
        if out.len() as u64 > max_bytes {
            return Err(DataModelError::SegmentTooLarge {
                segment: segment.name.clone(),
                limit: max_bytes,
            });
        }
        Ok(Some(out))
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.table_segments().map(|s| s.name.as_str())
    }

    /// Stored spelling of `name`, matched exactly first and then ignoring
    /// ASCII case.
    pub fn table_name(&self, name: &str) -> Option<&str> {
        self.find_table(name).map(|s| s.name.as_str())
    }

    /// Reads at most `max_rows` rows of `table`. Returns `None` when the blob
    /// stores no such table.
    pub fn read_table(
        &self,
        table: &str,
        max_rows: usize,
    ) -> Result<Option<StoredRows>, DataModelError> {
        let Some(segment) = self.find_table(table) else {
            return Ok(None);
        };

        let mut reader = TableReader::new(&segment.name, self.segment_reader(segment))?;
        let mut rows = Vec::with_capacity(max_rows.min(reader.total_rows));
        while rows.len() < max_rows {
            match reader.next_row()? {
                Some(row) => rows.push(row),
                None => break,
            }
        }

        log::debug!(
            "decoded {} of {} rows from '{}'",
            rows.len(),
            reader.total_rows,
            segment.name
        );

        Ok(Some(StoredRows {
            table: segment.name.clone(),
            columns: reader.columns,
            total_rows: reader.total_rows,
            rows,
        }))
    }

    fn table_segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|s| s.kind == SegmentKind::Table)
    }

    fn find_table(&self, name: &str) -> Option<&Segment> {
        self.table_segments()
            .find(|s| s.name == name)
            .or_else(|| self.table_segments().find(|s| s.name.eq_ignore_ascii_case(name)))
    }

    fn segment_reader<'a>(&'a self, segment: &Segment) -> Box<dyn Read + 'a> {
        let payload = &self.bytes[segment.payload.clone()];
        match segment.compression {
            SegmentCompression::Stored => Box::new(payload),
            SegmentCompression::Deflate => Box::new(DeflateDecoder::new(payload)),
        }
    }
}

struct TableReader<'a> {
    table: String,
    reader: Box<dyn Read + 'a>,
    columns: Vec<StoredColumn>,
    total_rows: usize,
    rows_read: usize,
}

impl<'a> TableReader<'a> {
    fn new(table: &str, mut reader: Box<dyn Read + 'a>) -> Result<TableReader<'a>, DataModelError> {
        let column_count = read_u32(&mut reader, table)? as usize;
        let mut columns = Vec::with_capacity(column_count.min(4096));
        for _ in 0..column_count {
            let name = read_string(&mut reader, table)?;
            let data_type = DataType::from_tag(read_u8(&mut reader, table)?);
            columns.push(StoredColumn { name, data_type });
        }
        let total_rows = read_u32(&mut reader, table)? as usize;

        Ok(TableReader {
            table: table.to_string(),
            reader,
            columns,
            total_rows,
            rows_read: 0,
        })
    }

    fn next_row(&mut self) -> Result<Option<Vec<CellValue>>, DataModelError> {
        if self.rows_read >= self.total_rows {
            return Ok(None);
        }
        let mut row = Vec::with_capacity(self.columns.len());
        for _ in 0..self.columns.len() {
            row.push(self.read_value()?);
        }
        self.rows_read += 1;
        Ok(Some(row))
    }

    fn read_value(&mut self) -> Result<CellValue, DataModelError> {
        let table = self.table.as_str();
        let r = &mut self.reader;
        let value = match read_u8(r, table)? {
            0 => CellValue::Null,
            1 => CellValue::Text(read_string(r, table)?),
            2 => CellValue::Integer(i64::from_le_bytes(read_array(r, table)?)),
            3 => CellValue::Double(f64::from_le_bytes(read_array(r, table)?)),
            4 => CellValue::Boolean(read_u8(r, table)? != 0),
            5 => CellValue::DateTime(i64::from_le_bytes(read_array(r, table)?)),
            6 => CellValue::Binary(read_bytes(r, table)?),
            7 => CellValue::FixedDecimal(i64::from_le_bytes(read_array(r, table)?)),
            tag => {
                return Err(DataModelError::InvalidValue {
                    table: table.to_string(),
                    reason: format!("unknown value tag {} in row {}", tag, self.rows_read),
                });
            }
        };
        Ok(value)
    }
}

fn stream_error(table: &str, err: io::Error) -> DataModelError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        DataModelError::InvalidValue {
            table: table.to_string(),
            reason: "payload ends before the declared rows".to_string(),
        }
    } else {
        DataModelError::Compression {
            segment: table.to_string(),
            reason: err.to_string(),
        }
    }
}

fn read_array<const N: usize>(r: &mut dyn Read, table: &str) -> Result<[u8; N], DataModelError> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf).map_err(|e| stream_error(table, e))?;
    Ok(buf)
}

fn read_u8(r: &mut dyn Read, table: &str) -> Result<u8, DataModelError> {
    Ok(read_array::<1>(r, table)?[0])
}

fn read_u32(r: &mut dyn Read, table: &str) -> Result<u32, DataModelError> {
    Ok(u32::from_le_bytes(read_array(r, table)?))
}

fn read_bytes(r: &mut dyn Read, table: &str) -> Result<Vec<u8>, DataModelError> {
    let len = read_u32(r, table)? as u64;
    let mut buf = Vec::new();
    r.take(len)
        .read_to_end(&mut buf)
        .map_err(|e| stream_error(table, e))?;
    if buf.len() as u64 != len {
        return Err(stream_error(table, io::ErrorKind::UnexpectedEof.into()));
    }
    Ok(buf)
}

fn read_string(r: &mut dyn Read, table: &str) -> Result<String, DataModelError> {
    String::from_utf8(read_bytes(r, table)?).map_err(|_| DataModelError::InvalidValue {
        table: table.to_string(),
        reason: "text value is not UTF-8".to_string(),
    })
}

fn framing(reason: impl Into<String>) -> DataModelError {
    DataModelError::FramingInvalid(reason.into())
}

fn read_u32_at(bytes: &[u8], offset: usize) -> Option<u32> {
    let slice = bytes.get(offset..offset + 4)?;
    let array: [u8; 4] = slice.try_into().ok()?;
    Some(u32::from_le_bytes(array))
}

fn read_length(bytes: &[u8], offset: usize) -> Result<usize, DataModelError> {
    let len = read_u32_at(bytes, offset).ok_or_else(|| framing("truncated length field"))?;
    usize::try_from(len).map_err(|_| framing("length does not fit in memory"))
}

fn take_range(bytes: &[u8], offset: &mut usize, len: usize) -> Result<Range<usize>, DataModelError> {
    let start = *offset;
    let end = start
        .checked_add(len)
        .ok_or_else(|| framing("segment length overflows"))?;
    if end > bytes.len() {
        return Err(framing("segment runs past end of blob"));
    }
    *offset = end;
    Ok(start..end)
}

/// Writes blobs in the layout read by [`DataModelBlob`]. Used to build
/// fixtures.
#[doc(hidden)]
#[derive(Debug, Default)]
pub struct DataModelWriter {
    segments: Vec<(SegmentKind, String, SegmentCompression, Vec<u8>)>,
}

impl DataModelWriter {
    pub fn new() -> DataModelWriter {
        DataModelWriter::default()
    }

    pub fn schema(mut self, text: &str, compression: SegmentCompression) -> DataModelWriter {
        self.segments.push((
            SegmentKind::Schema,
            "DataModelSchema".to_string(),
            compression,
            text.as_bytes().to_vec(),
        ));
        self
    }

    pub fn table(
        mut self,
        name: &str,
        columns: &[(&str, DataType)],
        rows: &[Vec<CellValue>],
        compression: SegmentCompression,
    ) -> DataModelWriter {
        let mut payload = Vec::new();
        put_u32(&mut payload, columns.len());
        for (column, data_type) in columns {
            put_bytes(&mut payload, column.as_bytes());
            payload.push(data_type.tag());
        }
        put_u32(&mut payload, rows.len());
        for row in rows {
            for value in row {
                put_value(&mut payload, value);
            }
        }
        self.segments
            .push((SegmentKind::Table, name.to_string(), compression, payload));
        self
    }

    pub fn finish(self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&SUPPORTED_VERSION.to_le_bytes());
        put_u32(&mut out, self.segments.len());

        for (kind, name, compression, raw) in self.segments {
            let payload = match compression {
                SegmentCompression::Stored => raw,
                SegmentCompression::Deflate => {
                    let mut encoder = DeflateEncoder::new(Vec::new(), DeflateLevel::default());
                    encoder.write_all(&raw)?;
                    encoder.finish()?
                }
            };
            out.push(kind.tag());
            put_bytes(&mut out, name.as_bytes());
            out.push(compression.tag());
            put_bytes(&mut out, &payload);
        }
        Ok(out)
    }
}

fn put_u32(out: &mut Vec<u8>, value: usize) {
    out.extend_from_slice(&(value as u32).to_le_bytes());
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    put_u32(out, bytes.len());
    out.extend_from_slice(bytes);
}

fn put_value(out: &mut Vec<u8>, value: &CellValue) {
    out.push(value.tag());
    match value {
        CellValue::Null => {}
        CellValue::Text(s) => put_bytes(out, s.as_bytes()),
        CellValue::Integer(v) | CellValue::DateTime(v) | CellValue::FixedDecimal(v) => {
            out.extend_from_slice(&v.to_le_bytes())
        }
        CellValue::Double(v) => out.extend_from_slice(&v.to_le_bytes()),
        CellValue::Boolean(v) => out.push(u8::from(*v)),
        CellValue::Binary(bytes) => put_bytes(out, bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_blob(compression: SegmentCompression) -> Vec<u8> {
        let rows: Vec<Vec<CellValue>> = (0..50)
            .map(|i| {
                vec![
                    CellValue::Integer(i),
                    CellValue::Text(format!("item {}", i)),
                    if i % 7 == 0 {
                        CellValue::Null
                    } else {
                        CellValue::FixedDecimal(i * 12_500)
                    },
                ]
            })
            .collect();
        DataModelWriter::new()
            .schema(r#"{"model":{"tables":[]}}"#, compression)
            .table(
                "Sales",
                &[
                    ("Id", DataType::Integer),
                    ("Label", DataType::Text),
                    ("Amount", DataType::Decimal),
                ],
                &rows,
                compression,
            )
            .finish()
            .expect("write blob")
    }

    #[test]
    fn directory_and_rows_decode_for_both_compressions() {
        for compression in [SegmentCompression::Stored, SegmentCompression::Deflate] {
            let blob = DataModelBlob::parse(sample_blob(compression)).expect("parse blob");
            assert_eq!(blob.version(), 1);
            assert_eq!(blob.table_names().collect::<Vec<_>>(), vec!["Sales"]);

            let schema = blob.schema_bytes(u64::MAX).expect("schema").expect("present");
            assert_eq!(schema, br#"{"model":{"tables":[]}}"#);

            let rows = blob.read_table("sales", 10).expect("read").expect("table");
            assert_eq!(rows.table, "Sales");
            assert_eq!(rows.total_rows, 50);
            assert_eq!(rows.rows.len(), 10);
            assert_eq!(rows.columns[2].data_type, DataType::Decimal);
            assert_eq!(rows.rows[3][1], CellValue::Text("item 3".into()));
            assert!(rows.rows[7][2].is_null());
        }
    }

    #[test]
    fn schema_inflation_is_bounded() {
        let padded = format!("{{\"model\":{{}}}}{}", " ".repeat(4096));
        let bytes = DataModelWriter::new()
            .schema(&padded, SegmentCompression::Deflate)
            .finish()
            .expect("write blob");
        let blob = DataModelBlob::parse(bytes).expect("parse");

        let err = blob.schema_bytes(100).expect_err("over limit");
        assert!(matches!(err, DataModelError::SegmentTooLarge { limit: 100, .. }));
        assert_eq!(err.code(), error_codes::DATA_MODEL_SEGMENT_TOO_LARGE);

        let exact = blob.schema_bytes(padded.len() as u64).expect("at limit");
        assert_eq!(exact.map(|b| b.len()), Some(padded.len()));
    }

    #[test]
    fn limit_larger_than_table_returns_all_rows() {
        let blob = DataModelBlob::parse(sample_blob(SegmentCompression::Deflate)).expect("parse");
        let rows = blob.read_table("Sales", 200).expect("read").expect("table");
        assert_eq!(rows.rows.len(), 50);
        assert!(blob.read_table("Missing", 10).expect("read").is_none());
    }

    #[test]
    fn bad_header_is_rejected() {
        assert!(matches!(
            DataModelBlob::parse(b"XXXX".to_vec()),
            Err(DataModelError::BadMagic)
        ));

        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&7u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        let err = DataModelBlob::parse(bytes).expect_err("version");
        assert!(matches!(err, DataModelError::UnsupportedVersion(7)));
        assert_eq!(err.code(), error_codes::DATA_MODEL_UNSUPPORTED_VERSION);
    }

    #[test]
    fn truncated_segment_is_framing_error() {
        let mut bytes = sample_blob(SegmentCompression::Stored);
        bytes.truncate(bytes.len() - 3);
        let err = DataModelBlob::parse(bytes).expect_err("truncated");
        assert!(matches!(err, DataModelError::FramingInvalid(_)));
    }

    #[test]
    fn short_payload_reports_invalid_value() {
        let mut payload = Vec::new();
        put_u32(&mut payload, 1);
        put_bytes(&mut payload, b"Id");
        payload.push(DataType::Integer.tag());
        put_u32(&mut payload, 3);
        put_value(&mut payload, &CellValue::Integer(1));

        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        put_u32(&mut bytes, 1);
        bytes.push(SegmentKind::Table.tag());
        put_bytes(&mut bytes, b"T");
        bytes.push(SegmentCompression::Stored.tag());
        put_bytes(&mut bytes, &payload);

        let blob = DataModelBlob::parse(bytes).expect("directory is valid");
        let rows = blob.read_table("T", 1).expect("first row is intact").expect("table");
        assert_eq!(rows.rows, vec![vec![CellValue::Integer(1)]]);

        let err = blob.read_table("T", 3).expect_err("second row is missing");
        assert!(matches!(err, DataModelError::InvalidValue { .. }));
    }

    #[test]
    fn values_render_for_prompts() {
        assert_eq!(CellValue::FixedDecimal(123_450).to_string(), "12.3450");
        assert_eq!(CellValue::FixedDecimal(-5).to_string(), "-0.0005");
        assert_eq!(CellValue::DateTime(0).to_string(), "1970-01-01 00:00:00");
        assert_eq!(CellValue::Binary(vec![1, 2]).to_string(), "<binary 2 bytes>");
        assert_eq!(CellValue::Null.to_string(), "");
    }
}
