//! The metadata model built from one container.
//!
//! Every type here is immutable once the model is assembled. The model is
//! replaced wholesale when a new file is loaded, never patched in place.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Serialize, Serializer};

use crate::container::ContainerVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Text,
    Integer,
    Decimal,
    Boolean,
    DateTime,
    Binary,
    Unknown,
}

impl DataType {
    /// Maps a tabular schema `dataType` value.
    ///
    /// Newer files spell the type out; older ones carry the numeric code from
    /// the engine's type enumeration. Anything unrecognised is `Unknown`.
    pub fn from_schema_name(name: &str) -> DataType {
        match name.to_ascii_lowercase().as_str() {
            "string" | "text" => DataType::Text,
            "int64" | "integer" | "int" | "wholenumber" => DataType::Integer,
            "double" | "decimal" | "currency" | "number" | "fixeddecimal" => DataType::Decimal,
            "boolean" | "bool" => DataType::Boolean,
            "datetime" | "date" | "time" | "datetimezone" => DataType::DateTime,
            "binary" => DataType::Binary,
            _ => DataType::Unknown,
        }
    }

    pub fn from_schema_code(code: i64) -> DataType {
        match code {
            2 => DataType::Text,
            6 => DataType::Integer,
            8 | 10 => DataType::Decimal,
            9 => DataType::DateTime,
            11 => DataType::Boolean,
            17 => DataType::Binary,
            _ => DataType::Unknown,
        }
    }

    /// Type byte used by the binary data-model table header.
    pub fn tag(self) -> u8 {
        match self {
            DataType::Unknown => 0,
            DataType::Text => 1,
            DataType::Integer => 2,
            DataType::Decimal => 3,
            DataType::Boolean => 4,
            DataType::DateTime => 5,
            DataType::Binary => 6,
        }
    }

    pub fn from_tag(tag: u8) -> DataType {
        match tag {
            1 => DataType::Text,
            2 => DataType::Integer,
            3 => DataType::Decimal,
            4 => DataType::Boolean,
            5 => DataType::DateTime,
            6 => DataType::Binary,
            _ => DataType::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Text => "text",
            DataType::Integer => "integer",
            DataType::Decimal => "decimal",
            DataType::Boolean => "boolean",
            DataType::DateTime => "datetime",
            DataType::Binary => "binary",
            DataType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Source,
    Calculated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub kind: ColumnKind,
    pub is_hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_string: Option<String>,
}

impl Column {
    pub fn is_calculated(&self) -> bool {
        self.kind == ColumnKind::Calculated
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalculatedColumn {
    pub name: String,
    pub table: String,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Measure {
    pub name: String,
    pub table: String,
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_folder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_string: Option<String>,
    pub is_hidden: bool,
}

impl Measure {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.table, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub calculated_columns: Vec<CalculatedColumn>,
    pub is_hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// M script of the table's import partition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_script: Option<String>,
    /// DAX expression when the whole table is calculated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculated_expression: Option<String>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
    Unspecified,
}

impl Cardinality {
    pub fn from_code(code: &str) -> Cardinality {
        let normalized: String = code
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "onetoone" | "11" => Cardinality::OneToOne,
            "onetomany" | "1n" | "1m" => Cardinality::OneToMany,
            "manytoone" | "n1" | "m1" => Cardinality::ManyToOne,
            "manytomany" | "nn" | "mm" => Cardinality::ManyToMany,
            _ => Cardinality::Unspecified,
        }
    }

    /// Combines per-end cardinalities (`one` / `many`).
    pub fn from_ends(from: &str, to: &str) -> Cardinality {
        let is_many = |s: &str| s.eq_ignore_ascii_case("many");
        let is_one = |s: &str| s.eq_ignore_ascii_case("one");
        match (from, to) {
            (f, t) if is_one(f) && is_one(t) => Cardinality::OneToOne,
            (f, t) if is_one(f) && is_many(t) => Cardinality::OneToMany,
            (f, t) if is_many(f) && is_one(t) => Cardinality::ManyToOne,
            (f, t) if is_many(f) && is_many(t) => Cardinality::ManyToMany,
            _ => Cardinality::Unspecified,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Cardinality::OneToOne => "1:1",
            Cardinality::OneToMany => "1:*",
            Cardinality::ManyToOne => "*:1",
            Cardinality::ManyToMany => "*:*",
            Cardinality::Unspecified => "?",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossFilter {
    Single,
    Both,
    Unspecified,
}

impl CrossFilter {
    pub fn from_code(code: &str) -> CrossFilter {
        match code.to_ascii_lowercase().as_str() {
            "onedirection" | "single" | "singledirection" => CrossFilter::Single,
            "bothdirections" | "both" => CrossFilter::Both,
            _ => CrossFilter::Unspecified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relationship {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
    pub cardinality: Cardinality,
    pub cross_filter: CrossFilter,
    pub is_active: bool,
}

impl Relationship {
    pub fn involves(&self, table: &str) -> bool {
        self.from_table.eq_ignore_ascii_case(table) || self.to_table.eq_ignore_ascii_case(table)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Source,
    Filter,
    Transform,
    Merge,
    Other,
}

impl StepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::Source => "source",
            StepKind::Filter => "filter",
            StepKind::Transform => "transform",
            StepKind::Merge => "merge",
            StepKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptStep {
    pub name: String,
    pub kind: StepKind,
    pub description: String,
    /// Label of the pattern rule that classified the step; `None` when no
    /// rule matched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<&'static str>,
}

/// Heuristic summary of one table's M script.
///
/// Built by pattern matching only. A step's kind says which rule fired, not
/// what the step actually computes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptAnalysis {
    pub table: String,
    pub script: String,
    pub steps: Vec<ScriptStep>,
}

impl ScriptAnalysis {
    pub fn source(&self) -> Option<&ScriptStep> {
        self.steps.iter().find(|s| s.kind == StepKind::Source)
    }
}

/// A field referenced by a visual, normalised to `table.name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldRef {
    pub table: Option<String>,
    pub name: String,
}

impl FieldRef {
    pub fn new(table: Option<&str>, name: &str) -> FieldRef {
        let name = name.replace("'.'", ".").replace('\'', "");
        let table = table
            .map(|t| t.replace('\'', ""))
            .filter(|t| !t.is_empty());
        FieldRef {
            table,
            name: name.trim().to_string(),
        }
    }

    /// Parses `Table.Field` or a bare `Field`.
    pub fn parse(reference: &str) -> FieldRef {
        let cleaned = reference.replace("'.'", ".").replace('\'', "");
        match cleaned.split_once('.') {
            Some((table, name)) if !table.is_empty() && !name.is_empty() => {
                FieldRef::new(Some(table), name)
            }
            _ => FieldRef::new(None, &cleaned),
        }
    }

    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        let full = self.to_string().to_lowercase();
        if full == query {
            return true;
        }
        match query.split_once('.') {
            Some(_) => self.table.is_none() && query.ends_with(&format!(".{}", self.name.to_lowercase())),
            None => self.name.to_lowercase() == query,
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{}.{}", table, self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl Serialize for FieldRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Visual {
    pub visual_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub fields: BTreeSet<FieldRef>,
}

impl Visual {
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.visual_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportPage {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordinal: Option<i64>,
    pub visuals: Vec<Visual>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    MissingName,
    DuplicateName,
    DanglingRelationship,
    UndecodableEntry,
    UndecodableVisual,
    MalformedEntry,
}

/// A recoverable problem met while decoding; the affected entry was skipped
/// or degraded and the rest of the model is intact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaWarning {
    pub kind: WarningKind,
    pub message: String,
}

impl SchemaWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> SchemaWarning {
        let warning = SchemaWarning {
            kind,
            message: message.into(),
        };
        log::warn!("{:?}: {}", warning.kind, warning.message);
        warning
    }
}

impl fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ModelParts {
    pub file_name: Option<String>,
    pub tables: Vec<Table>,
    pub measures: Vec<Measure>,
    pub relationships: Vec<Relationship>,
    pub scripts: Vec<ScriptAnalysis>,
    pub pages: Vec<ReportPage>,
    pub warnings: Vec<SchemaWarning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetadataModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    file_name: Option<String>,
    variant: ContainerVariant,
    tables: Vec<Table>,
    measures: Vec<Measure>,
    relationships: Vec<Relationship>,
    scripts: Vec<ScriptAnalysis>,
    pages: Vec<ReportPage>,
    warnings: Vec<SchemaWarning>,
    #[serde(skip)]
    measure_index: HashMap<String, Vec<usize>>,
}

impl MetadataModel {
    pub(crate) fn assemble(parts: ModelParts, variant: ContainerVariant) -> MetadataModel {
        let mut measure_index: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, measure) in parts.measures.iter().enumerate() {
            measure_index
                .entry(measure.name.to_lowercase())
                .or_default()
                .push(idx);
        }

        MetadataModel {
            file_name: parts.file_name,
            variant,
            tables: parts.tables,
            measures: parts.measures,
            relationships: parts.relationships,
            scripts: parts.scripts,
            pages: parts.pages,
            warnings: parts.warnings,
            measure_index,
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn variant(&self) -> ContainerVariant {
        self.variant
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }

    pub fn column_count(&self) -> usize {
        self.tables.iter().map(|t| t.columns.len()).sum()
    }

    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    /// Looks a measure up by bare name, or by `Table.Measure`.
    ///
    /// A bare name shared by measures on several tables resolves to the first
    /// one declared; use [`MetadataModel::measures_named`] to see them all.
    pub fn measure(&self, name: &str) -> Option<&Measure> {
        if let Some(idx) = self
            .measure_index
            .get(&name.to_lowercase())
            .and_then(|v| v.first())
        {
            return self.measures.get(*idx);
        }
        let (table, bare) = name.split_once('.')?;
        self.measures_named(bare)
            .find(|m| m.table.eq_ignore_ascii_case(table))
    }

    pub fn measures_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Measure> + use<'a> {
        self.measure_index
            .get(&name.to_lowercase())
            .into_iter()
            .flatten()
            .filter_map(|idx| self.measures.get(*idx))
    }

    pub fn calculated_columns(&self) -> impl Iterator<Item = &CalculatedColumn> {
        self.tables.iter().flat_map(|t| t.calculated_columns.iter())
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn relationships_for<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a Relationship> {
        self.relationships.iter().filter(move |r| r.involves(table))
    }

    pub fn script_analyses(&self) -> &[ScriptAnalysis] {
        &self.scripts
    }

    pub fn script_for(&self, table: &str) -> Option<&ScriptAnalysis> {
        self.scripts
            .iter()
            .find(|s| s.table.eq_ignore_ascii_case(table))
    }

    pub fn pages(&self) -> &[ReportPage] {
        &self.pages
    }

    pub fn page(&self, name: &str) -> Option<&ReportPage> {
        self.pages
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn warnings(&self) -> &[SchemaWarning] {
        &self.warnings
    }

    pub fn search_tables<'a>(&'a self, filter: &'a str) -> impl Iterator<Item = &'a Table> {
        self.tables.iter().filter(move |t| name_matches(&t.name, filter))
    }

    pub fn search_measures<'a>(&'a self, filter: &'a str) -> impl Iterator<Item = &'a Measure> {
        self.measures
            .iter()
            .filter(move |m| name_matches(&m.name, filter) || name_matches(&m.table, filter))
    }

    pub fn search_calculated_columns<'a>(
        &'a self,
        filter: &'a str,
    ) -> impl Iterator<Item = &'a CalculatedColumn> {
        self.calculated_columns()
            .filter(move |c| name_matches(&c.name, filter) || name_matches(&c.table, filter))
    }

    pub fn search_relationships<'a>(
        &'a self,
        filter: &'a str,
    ) -> impl Iterator<Item = &'a Relationship> {
        self.relationships.iter().filter(move |r| {
            name_matches(&r.from_table, filter)
                || name_matches(&r.to_table, filter)
                || name_matches(&r.from_column, filter)
                || name_matches(&r.to_column, filter)
        })
    }

    pub fn search_scripts<'a>(&'a self, filter: &'a str) -> impl Iterator<Item = &'a ScriptAnalysis> {
        self.scripts.iter().filter(move |s| name_matches(&s.table, filter))
    }

    pub fn search_pages<'a>(&'a self, filter: &'a str) -> impl Iterator<Item = &'a ReportPage> {
        self.pages.iter().filter(move |p| name_matches(&p.name, filter))
    }

    /// Every visual that references `field`, with the page it sits on.
    pub fn visuals_using<'a>(
        &'a self,
        field: &'a str,
    ) -> impl Iterator<Item = (&'a ReportPage, &'a Visual)> {
        self.pages.iter().flat_map(move |page| {
            page.visuals
                .iter()
                .filter(move |v| v.fields.iter().any(|f| f.matches(field)))
                .map(move |v| (page, v))
        })
    }
}

/// Case-insensitive substring match; an empty filter matches everything.
pub fn name_matches(name: &str, filter: &str) -> bool {
    filter.is_empty() || name.to_lowercase().contains(&filter.to_lowercase())
}
