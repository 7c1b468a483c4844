//! pbi-lens: reading Power BI files and talking about them.
//!
//! This crate provides functionality for:
//! - Opening `.pbit` templates and `.pbix` files and extracting their
//!   metadata model (tables, columns, measures, relationships, Power Query
//!   scripts, report pages and visuals)
//! - Sampling stored table rows from files that carry a data model
//! - A conversation loop that grounds a chat backend in the model and lets
//!   the backend ask for row samples mid-conversation
//!
//! # Quick Start
//!
//! ```ignore
//! use pbi_lens::{Credential, HttpBackend, LensConfig, PbiPackage, Session};
//!
//! let config = LensConfig::default();
//! let pkg = PbiPackage::open_path("Sales.pbix", &config)?;
//! println!("{} tables", pkg.model().tables().len());
//!
//! let backend = HttpBackend::new(config.backend.clone())?;
//! let mut session = Session::new(&pkg, backend, config);
//! session.set_credential(Credential::new(api_key));
//! let outcome = session.ask("Which measures use Sales[Amount]?").await?;
//! println!("{}", outcome.answer);
//! ```

pub mod chat;
mod config;
mod container;
mod data_model;
pub mod error_codes;
mod model;
mod package;
mod quick_answer;
mod report_layout;
mod sample;
mod script_analysis;
mod session;
mod tabular_schema;
mod text_decode;

#[cfg(feature = "http-backend")]
pub use chat::HttpBackend;
pub use chat::{
    BackendError, BackendReply, ChatBackend, ChatRequest, ConversationTurn, Credential, Role,
};
pub use config::{BackendSettings, ConfigError, LensConfig, LensConfigBuilder};
pub use container::{ContainerError, ContainerLimits, ContainerVariant, PbiContainer};
#[doc(hidden)]
pub use data_model::DataModelWriter;
pub use data_model::{
    CellValue, DataModelBlob, DataModelError, SegmentCompression, SegmentKind, StoredColumn,
    StoredRows,
};
pub use model::{
    CalculatedColumn, Cardinality, Column, ColumnKind, CrossFilter, DataType, FieldRef, Measure,
    MetadataModel, ReportPage, Relationship, SchemaWarning, ScriptAnalysis, ScriptStep, StepKind,
    Table, Visual, WarningKind, name_matches,
};
pub use package::{PackageError, PbiPackage};
pub use quick_answer::answer as quick_answer;
pub use sample::{SampleError, SampleStats, SampleTier, TableSample, TabularDataAccessor};
pub use script_analysis::analyze_steps;
pub use session::{ConversationState, Session, SessionError, TurnOutcome};
pub use text_decode::{DecodeError, DecodedText, TextEncoding, decode_json_document, decode_text};
