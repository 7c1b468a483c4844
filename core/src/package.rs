use std::io::{Read, Seek};
use std::sync::Arc;

use thiserror::Error;

use crate::config::LensConfig;
use crate::container::{
    ContainerError, ContainerLimits, ContainerVariant, DATA_MODEL_PATH, DATA_MODEL_SCHEMA_PATH,
    PbiContainer, REPORT_LAYOUT_PATH,
};
use crate::data_model::{DataModelBlob, DataModelError};
use crate::model::{MetadataModel, ModelParts, SchemaWarning, WarningKind};
use crate::report_layout::decode_layout;
use crate::sample::TabularDataAccessor;
use crate::script_analysis::analyze_script;
use crate::tabular_schema::decode_schema;
use crate::text_decode::decode_json_document;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PackageError {
    #[error("[{}] {0}", .0.code())]
    Container(#[from] ContainerError),
    #[error("[{}] {0}", .0.code())]
    DataModel(#[from] DataModelError),
}

impl PackageError {
    pub fn code(&self) -> &'static str {
        match self {
            PackageError::Container(e) => e.code(),
            PackageError::DataModel(e) => e.code(),
        }
    }
}

/// A loaded Power BI file: the metadata model plus, for the binary-model
/// variant, the stored table data.
#[derive(Debug, Clone)]
pub struct PbiPackage {
    model: Arc<MetadataModel>,
    data: Option<Arc<DataModelBlob>>,
    entries: Vec<String>,
}

impl PbiPackage {
    pub fn open<R: Read + Seek + 'static>(reader: R) -> Result<PbiPackage, PackageError> {
        Self::open_with_limits(reader, ContainerLimits::default(), None)
    }

    pub fn open_with_config<R: Read + Seek + 'static>(
        reader: R,
        config: &LensConfig,
    ) -> Result<PbiPackage, PackageError> {
        Self::open_with_limits(reader, config.limits, None)
    }

    #[cfg(feature = "std-fs")]
    pub fn open_path(
        path: impl AsRef<std::path::Path>,
        config: &LensConfig,
    ) -> Result<PbiPackage, PackageError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(ContainerError::from)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        Self::open_with_limits(file, config.limits, file_name)
    }

    /// Opens and decodes a container. Container-level failures abort,
    /// including a file with no model description anywhere; problems inside
    /// individual entries become warnings on the model.
    pub fn open_with_limits<R: Read + Seek + 'static>(
        reader: R,
        limits: ContainerLimits,
        file_name: Option<String>,
    ) -> Result<PbiPackage, PackageError> {
        let mut container = PbiContainer::open_from_reader_with_limits(reader, limits)?;
        let variant = container.variant();
        let entries: Vec<String> = container.file_names().map(str::to_string).collect();
        log::debug!("opened {:?} container with {} entries", variant, entries.len());

        let mut parts = ModelParts {
            file_name,
            ..ModelParts::default()
        };

        let data = match variant {
            ContainerVariant::BinaryModel => {
                let bytes = container.read_file_checked(DATA_MODEL_PATH)?;
                match DataModelBlob::parse(bytes) {
                    Ok(blob) => Some(Arc::new(blob)),
                    Err(e) if container.contains(DATA_MODEL_SCHEMA_PATH) => {
                        parts.warnings.push(SchemaWarning::new(
                            WarningKind::UndecodableEntry,
                            format!("[{}] {}: {}; row data unavailable", e.code(), DATA_MODEL_PATH, e),
                        ));
                        None
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            ContainerVariant::SchemaOnly => None,
        };

        let schema_bytes = match container.read_file_optional_checked(DATA_MODEL_SCHEMA_PATH)? {
            Some(bytes) => bytes,
            None => match &data {
                Some(blob) => blob
                    .schema_bytes(limits.max_part_uncompressed_bytes)?
                    .ok_or(ContainerError::MissingSchema)?,
                None => return Err(ContainerError::MissingSchema.into()),
            },
        };

        match decode_json_document(DATA_MODEL_SCHEMA_PATH, &schema_bytes) {
            Ok((doc, decoded)) => {
                log::debug!(
                    "model description decoded as {:?} (bom: {})",
                    decoded.encoding,
                    decoded.had_bom
                );
                let schema = decode_schema(&doc);
                parts.tables = schema.tables;
                parts.measures = schema.measures;
                parts.relationships = schema.relationships;
                parts.warnings.extend(schema.warnings);
            }
            Err(e) => parts.warnings.push(SchemaWarning::new(
                WarningKind::UndecodableEntry,
                format!("[{}] {}", e.code(), e),
            )),
        }

        match container.read_file_optional_checked(REPORT_LAYOUT_PATH)? {
            Some(bytes) => match decode_json_document(REPORT_LAYOUT_PATH, &bytes) {
                Ok((doc, _)) => {
                    let layout = decode_layout(&doc);
                    parts.pages = layout.pages;
                    parts.warnings.extend(layout.warnings);
                }
                Err(e) => parts.warnings.push(SchemaWarning::new(
                    WarningKind::UndecodableEntry,
                    format!("[{}] {}", e.code(), e),
                )),
            },
            None => log::debug!("no report layout in container"),
        }

        parts.scripts = parts
            .tables
            .iter()
            .filter_map(|t| {
                t.source_script
                    .as_deref()
                    .map(|script| analyze_script(&t.name, script))
            })
            .collect();

        Ok(PbiPackage {
            model: Arc::new(MetadataModel::assemble(parts, variant)),
            data,
            entries,
        })
    }

    pub fn model(&self) -> &Arc<MetadataModel> {
        &self.model
    }

    pub fn variant(&self) -> ContainerVariant {
        self.model.variant()
    }

    pub fn entry_names(&self) -> &[String] {
        &self.entries
    }

    pub fn data_model(&self) -> Option<&Arc<DataModelBlob>> {
        self.data.as_ref()
    }

    /// A fresh accessor over this file's stored rows, with an empty cache.
    pub fn data_accessor(&self, config: &LensConfig) -> TabularDataAccessor {
        TabularDataAccessor::new(self.data.clone(), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_model::{DataModelWriter, SegmentCompression};
    use std::io::{Cursor, Write};
    use zip::CompressionMethod;
    use zip::ZipWriter;
    use zip::write::FileOptions;

    fn make_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, contents) in entries {
            writer.start_file(*name, options).expect("start zip entry");
            writer.write_all(contents).expect("write zip entry");
        }
        writer.finish().expect("finish zip").into_inner()
    }

    const SCHEMA: &str = r#"{"model":{"tables":[{"name":"T","columns":[{"name":"C"}],
        "partitions":[{"source":{"type":"m","expression":"let Source = Sql.Database(\"s\", \"d\") in Source"}}]}]}}"#;

    #[test]
    fn schema_falls_back_to_blob_segment() {
        let blob = DataModelWriter::new()
            .schema(SCHEMA, SegmentCompression::Deflate)
            .finish()
            .expect("blob");
        let bytes = make_zip(&[("DataModel", blob.as_slice())]);
        let pkg = PbiPackage::open(Cursor::new(bytes)).expect("open");
        assert_eq!(pkg.variant(), ContainerVariant::BinaryModel);
        assert_eq!(pkg.model().tables().len(), 1);
        assert_eq!(pkg.model().script_analyses().len(), 1);
        assert!(pkg.data_model().is_some());
        assert!(pkg.model().pages().is_empty());
    }

    #[test]
    fn oversized_schema_segment_is_rejected() {
        let padded = format!("{}{}", SCHEMA, " ".repeat(8192));
        let blob = DataModelWriter::new()
            .schema(&padded, SegmentCompression::Deflate)
            .finish()
            .expect("blob");
        let bytes = make_zip(&[("DataModel", blob.as_slice())]);
        let limits = ContainerLimits {
            max_part_uncompressed_bytes: 2048,
            ..ContainerLimits::default()
        };
        let err = PbiPackage::open_with_limits(Cursor::new(bytes), limits, None)
            .expect_err("schema inflates past the part limit");
        assert!(matches!(
            err,
            PackageError::DataModel(DataModelError::SegmentTooLarge { limit: 2048, .. })
        ));
    }

    #[test]
    fn undecodable_entries_become_warnings() {
        let bytes = make_zip(&[
            ("DataModelSchema", b"{\"model\": "),
            ("Report/Layout", b"\xEF\xBB\xBF   "),
        ]);
        let pkg = PbiPackage::open(Cursor::new(bytes)).expect("open");
        assert!(pkg.model().tables().is_empty());
        let warnings = pkg.model().warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.kind == WarningKind::UndecodableEntry));
    }

    #[test]
    fn corrupt_blob_without_schema_fails() {
        let bytes = make_zip(&[("DataModel", b"garbage")]);
        let err = PbiPackage::open(Cursor::new(bytes)).expect_err("corrupt blob");
        assert!(matches!(err, PackageError::DataModel(DataModelError::BadMagic)));
    }

    #[test]
    fn corrupt_blob_with_schema_degrades_to_no_data() {
        let bytes = make_zip(&[("DataModel", b"garbage"), ("DataModelSchema", SCHEMA.as_bytes())]);
        let pkg = PbiPackage::open(Cursor::new(bytes)).expect("open");
        assert_eq!(pkg.variant(), ContainerVariant::BinaryModel);
        assert!(pkg.data_model().is_none());
        assert_eq!(pkg.model().tables().len(), 1);
        assert_eq!(pkg.model().warnings().len(), 1);
        assert!(!pkg.data_accessor(&LensConfig::default()).has_row_data());
    }
}
