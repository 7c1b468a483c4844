//! Zip container handling for Power BI files.
//!
//! Both supported variants are plain zip archives. The variant is decided by
//! which entries are present: a `DataModel` blob marks the binary-model
//! variant, a bare `DataModelSchema` marks the schema-only template variant.

use std::io::{Read, Seek};
use thiserror::Error;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error_codes;

pub(crate) const DATA_MODEL_SCHEMA_PATH: &str = "DataModelSchema";
pub(crate) const DATA_MODEL_PATH: &str = "DataModel";
pub(crate) const REPORT_LAYOUT_PATH: &str = "Report/Layout";

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ContainerLimits {
    pub max_entries: usize,
    pub max_part_uncompressed_bytes: u64,
    pub max_total_uncompressed_bytes: u64,
}

impl Default for ContainerLimits {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_part_uncompressed_bytes: 512 * 1024 * 1024,
            max_total_uncompressed_bytes: 1024 * 1024 * 1024,
        }
    }
}

/// Which of the two supported container layouts a file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerVariant {
    /// Template file: model description only, no row data.
    SchemaOnly,
    /// Full file: carries the binary data-model blob with stored rows.
    BinaryModel,
}

impl ContainerVariant {
    pub fn has_row_data(self) -> bool {
        matches!(self, ContainerVariant::BinaryModel)
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContainerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ZIP error: {0}")]
    Zip(String),
    #[error("not a ZIP container")]
    NotZipContainer,
    #[error("archive has too many entries: {entries} (limit: {max_entries})")]
    TooManyEntries { entries: usize, max_entries: usize },
    #[error("part '{path}' is too large: {size} bytes (limit: {limit} bytes)")]
    PartTooLarge { path: String, size: u64, limit: u64 },
    #[error("total uncompressed size exceeds limit: would exceed {limit} bytes")]
    TotalTooLarge { limit: u64 },
    #[error("failed to read ZIP entry '{path}': {reason}")]
    ZipRead { path: String, reason: String },
    #[error("file not found in archive: {path}")]
    FileNotFound { path: String },
    #[error("no model description found (neither DataModelSchema nor DataModel is present)")]
    MissingSchema,
}

impl ContainerError {
    pub fn code(&self) -> &'static str {
        match self {
            ContainerError::Io(_) => error_codes::CONTAINER_IO,
            ContainerError::Zip(_) => error_codes::CONTAINER_ZIP,
            ContainerError::NotZipContainer => error_codes::CONTAINER_NOT_ZIP,
            ContainerError::TooManyEntries { .. } => error_codes::CONTAINER_TOO_MANY_ENTRIES,
            ContainerError::PartTooLarge { .. } => error_codes::CONTAINER_PART_TOO_LARGE,
            ContainerError::TotalTooLarge { .. } => error_codes::CONTAINER_TOTAL_TOO_LARGE,
            ContainerError::ZipRead { .. } => error_codes::CONTAINER_ZIP,
            ContainerError::FileNotFound { .. } => error_codes::CONTAINER_ZIP,
            ContainerError::MissingSchema => error_codes::CONTAINER_MISSING_SCHEMA,
        }
    }
}

pub(crate) trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

pub struct PbiContainer {
    archive: ZipArchive<Box<dyn ReadSeek>>,
    limits: ContainerLimits,
    total_read: u64,
}

impl PbiContainer {
    pub fn open_from_reader<R: Read + Seek + 'static>(
        reader: R,
    ) -> Result<PbiContainer, ContainerError> {
        Self::open_from_reader_with_limits(reader, ContainerLimits::default())
    }

    pub fn open_from_reader_with_limits<R: Read + Seek + 'static>(
        reader: R,
        limits: ContainerLimits,
    ) -> Result<PbiContainer, ContainerError> {
        let reader: Box<dyn ReadSeek> = Box::new(reader);
        let archive = ZipArchive::new(reader).map_err(|err| match err {
            ZipError::InvalidArchive(_) | ZipError::UnsupportedArchive(_) => {
                ContainerError::NotZipContainer
            }
            ZipError::Io(e) => ContainerError::Io(e),
            other => ContainerError::Zip(other.to_string()),
        })?;

        if archive.len() > limits.max_entries {
            return Err(ContainerError::TooManyEntries {
                entries: archive.len(),
                max_entries: limits.max_entries,
            });
        }

        let container = PbiContainer {
            archive,
            limits,
            total_read: 0,
        };

        if !container.contains(DATA_MODEL_SCHEMA_PATH) && !container.contains(DATA_MODEL_PATH) {
            return Err(ContainerError::MissingSchema);
        }

        Ok(container)
    }

    #[cfg(feature = "std-fs")]
    pub fn open_from_path(
        path: impl AsRef<std::path::Path>,
    ) -> Result<PbiContainer, ContainerError> {
        Self::open_from_path_with_limits(path, ContainerLimits::default())
    }

    #[cfg(feature = "std-fs")]
    pub fn open_from_path_with_limits(
        path: impl AsRef<std::path::Path>,
        limits: ContainerLimits,
    ) -> Result<PbiContainer, ContainerError> {
        let file = std::fs::File::open(path)?;
        Self::open_from_reader_with_limits(file, limits)
    }

    pub fn variant(&self) -> ContainerVariant {
        if self.contains(DATA_MODEL_PATH) {
            ContainerVariant::BinaryModel
        } else {
            ContainerVariant::SchemaOnly
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.archive.file_names().any(|n| n == name)
    }

    pub fn read_file_checked(&mut self, name: &str) -> Result<Vec<u8>, ContainerError> {
        let size = {
            let file = self.archive.by_name(name).map_err(|e| match e {
                ZipError::FileNotFound => ContainerError::FileNotFound {
                    path: name.to_string(),
                },
                other => ContainerError::ZipRead {
                    path: name.to_string(),
                    reason: other.to_string(),
                },
            })?;
            file.size()
        };

        if size > self.limits.max_part_uncompressed_bytes {
            return Err(ContainerError::PartTooLarge {
                path: name.to_string(),
                size,
                limit: self.limits.max_part_uncompressed_bytes,
            });
        }

        let new_total = self.total_read.saturating_add(size);
        if new_total > self.limits.max_total_uncompressed_bytes {
            return Err(ContainerError::TotalTooLarge {
                limit: self.limits.max_total_uncompressed_bytes,
            });
        }

        let mut file = self.archive.by_name(name).map_err(|e| ContainerError::ZipRead {
            path: name.to_string(),
            reason: e.to_string(),
        })?;

        let mut buf = Vec::with_capacity(size.min(64 * 1024 * 1024) as usize);
        file.read_to_end(&mut buf).map_err(|e| ContainerError::ZipRead {
            path: name.to_string(),
            reason: e.to_string(),
        })?;

        self.total_read = new_total;
        Ok(buf)
    }

    pub fn read_file_optional_checked(
        &mut self,
        name: &str,
    ) -> Result<Option<Vec<u8>>, ContainerError> {
        match self.read_file_checked(name) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(ContainerError::FileNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.archive.file_names()
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn limits(&self) -> &ContainerLimits {
        &self.limits
    }
}
