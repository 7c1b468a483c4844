//! Decoding of the report layout (`Report/Layout`).
//!
//! Each visual container stores its `config` and `filters` as JSON documents
//! serialized into string fields, so every visual is a second parse. A visual
//! that fails to parse still appears on its page with whatever could be read.

use std::collections::{BTreeSet, HashMap};

use serde_json::{Map, Value};

use crate::model::{FieldRef, ReportPage, SchemaWarning, Visual, WarningKind};

#[derive(Debug, Clone, Default)]
pub(crate) struct DecodedLayout {
    pub pages: Vec<ReportPage>,
    pub warnings: Vec<SchemaWarning>,
}

pub(crate) fn decode_layout(v: &Value) -> DecodedLayout {
    let mut out = DecodedLayout::default();

    let Some(sections) = v.get("sections").and_then(|s| s.as_array()) else {
        out.warnings.push(SchemaWarning::new(
            WarningKind::MalformedEntry,
            "report layout has no sections",
        ));
        return out;
    };

    for (idx, section) in sections.iter().enumerate() {
        if !section.is_object() {
            out.warnings.push(SchemaWarning::new(
                WarningKind::MalformedEntry,
                format!("report section #{} is not an object", idx),
            ));
            continue;
        }

        let name = opt_str(section, "displayName")
            .or_else(|| opt_str(section, "name"))
            .map(str::to_string)
            .unwrap_or_else(|| format!("Page {}", idx + 1));

        let mut visuals = Vec::new();
        if let Some(containers) = section.get("visualContainers").and_then(|c| c.as_array()) {
            for (vc_idx, container) in containers.iter().enumerate() {
                visuals.push(parse_visual_container(container, &name, vc_idx, &mut out.warnings));
            }
        }

        out.pages.push(ReportPage {
            name,
            ordinal: section.get("ordinal").and_then(|o| o.as_i64()),
            visuals,
        });
    }

    out.pages.sort_by_key(|p| p.ordinal.unwrap_or(i64::MAX));
    out
}

fn parse_visual_container(
    container: &Value,
    page: &str,
    idx: usize,
    warnings: &mut Vec<SchemaWarning>,
) -> Visual {
    let fallback_type = opt_str(container, "name").unwrap_or("unknown").to_string();

    let config = match embedded_document(container.get("config")) {
        Ok(Some(config)) => config,
        Ok(None) => Value::Object(Map::new()),
        Err(reason) => {
            warnings.push(SchemaWarning::new(
                WarningKind::UndecodableVisual,
                format!("visual #{} on page '{}': config is not JSON ({})", idx, page, reason),
            ));
            return Visual {
                visual_type: fallback_type,
                title: None,
                fields: BTreeSet::new(),
            };
        }
    };

    let single = config.get("singleVisual");
    let visual_type = single
        .and_then(|s| opt_str(s, "visualType"))
        .or_else(|| opt_str(&config, "visualType"))
        .map(str::to_string)
        .or_else(|| config.get("singleVisualGroup").map(|_| "group".to_string()))
        .or_else(|| opt_str(container, "name").map(str::to_string))
        .or_else(|| opt_str(&config, "name").map(str::to_string))
        .unwrap_or(fallback_type);

    let title = single.and_then(visual_title);

    let mut collector = FieldCollector::default();
    collector.collect_aliases(&config);
    if let Some(single) = single {
        collector.walk(single);
    }
    if let Some(transforms) = config.get("dataTransforms") {
        collector.walk(transforms);
    }

    match embedded_document(container.get("filters")) {
        Ok(Some(filters)) => {
            collector.collect_aliases(&filters);
            collector.walk(&filters);
        }
        Ok(None) => {}
        Err(reason) => warnings.push(SchemaWarning::new(
            WarningKind::UndecodableVisual,
            format!("visual #{} on page '{}': filters are not JSON ({})", idx, page, reason),
        )),
    }

    Visual {
        visual_type,
        title,
        fields: collector.fields,
    }
}

/// Accepts either a JSON string holding a document or an inline object.
fn embedded_document(v: Option<&Value>) -> Result<Option<Value>, String> {
    match v {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => serde_json::from_str(s).map(Some).map_err(|e| e.to_string()),
        Some(other) => Ok(Some(other.clone())),
    }
}

fn visual_title(single: &Value) -> Option<String> {
    let literal = single
        .get("vcObjects")?
        .get("title")?
        .get(0)?
        .get("properties")?
        .get("text")?
        .get("expr")?
        .get("Literal")?
        .get("Value")?
        .as_str()?;
    let title = literal.trim_matches('\'').to_string();
    (!title.is_empty()).then_some(title)
}

#[derive(Default)]
struct FieldCollector {
    aliases: HashMap<String, String>,
    fields: BTreeSet<FieldRef>,
}

impl FieldCollector {
    /// Records `From` aliases (`{"Name": "s", "Entity": "Sales"}`) anywhere in
    /// the document.
    fn collect_aliases(&mut self, v: &Value) {
        match v {
            Value::Object(map) => {
                if let Some(from) = map.get("From").and_then(|f| f.as_array()) {
                    for source in from {
                        if let (Some(alias), Some(entity)) =
                            (opt_str(source, "Name"), opt_str(source, "Entity"))
                        {
                            self.aliases.insert(alias.to_string(), entity.to_string());
                        }
                    }
                }
                for child in map.values() {
                    self.collect_aliases(child);
                }
            }
            Value::Array(items) => items.iter().for_each(|i| self.collect_aliases(i)),
            _ => {}
        }
    }

    fn walk(&mut self, v: &Value) {
        match v {
            Value::Object(map) => {
                self.visit_object(map);
                for child in map.values() {
                    self.walk(child);
                }
            }
            Value::Array(items) => items.iter().for_each(|i| self.walk(i)),
            _ => {}
        }
    }

    fn visit_object(&mut self, map: &Map<String, Value>) {
        for key in ["Column", "Measure"] {
            if let Some(Value::Object(inner)) = map.get(key)
                && let Some(property) = inner.get("Property").and_then(|p| p.as_str())
            {
                let table = inner.get("Expression").and_then(|e| self.source_entity(e));
                self.add(table.as_deref(), property);
            }
        }

        if let Some(Value::Object(level)) = map.get("HierarchyLevel") {
            let name = level.get("Level").and_then(|l| l.as_str()).or_else(|| {
                level
                    .get("Expression")
                    .and_then(|e| e.get("Level"))
                    .and_then(|l| l.get("Level"))
                    .and_then(|l| l.as_str())
            });
            if let Some(name) = name {
                let table = level.get("Expression").and_then(|e| self.find_entity(e));
                self.add(table.as_deref(), name);
            }
        }

        for key in ["queryRef", "queryName"] {
            if let Some(reference) = map.get(key).and_then(|r| r.as_str()) {
                let inner = unwrap_aggregate(reference);
                if !inner.is_empty() && !inner.contains(['(', ')', '[', ']', '{', '}']) {
                    self.fields.insert(FieldRef::parse(inner));
                }
            }
        }

        if let Some(table) = map.get("table").and_then(|t| t.as_str()) {
            let name = ["column", "level", "measure"]
                .iter()
                .find_map(|k| map.get(*k).and_then(|v| v.as_str()));
            if let Some(name) = name {
                self.add(Some(table), name);
            }
        } else if let Some(measure) = map.get("measure").and_then(|m| m.as_str()) {
            self.add(None, measure);
        }
    }

    /// Resolves `{"SourceRef": {"Source": alias}}` or `{"SourceRef": {"Entity": name}}`.
    fn source_entity(&self, expression: &Value) -> Option<String> {
        let source_ref = expression.get("SourceRef")?;
        if let Some(entity) = opt_str(source_ref, "Entity") {
            return Some(entity.to_string());
        }
        let alias = opt_str(source_ref, "Source")?;
        Some(
            self.aliases
                .get(alias)
                .cloned()
                .unwrap_or_else(|| alias.to_string()),
        )
    }

    /// First `SourceRef` found anywhere below `v`.
    fn find_entity(&self, v: &Value) -> Option<String> {
        if let Some(entity) = self.source_entity(v) {
            return Some(entity);
        }
        match v {
            Value::Object(map) => map.values().find_map(|c| self.find_entity(c)),
            Value::Array(items) => items.iter().find_map(|c| self.find_entity(c)),
            _ => None,
        }
    }

    fn add(&mut self, table: Option<&str>, name: &str) {
        let field = FieldRef::new(table, name);
        if !field.name.is_empty() {
            self.fields.insert(field);
        }
    }
}

/// `Sum(Sales.Amount)` becomes `Sales.Amount`; nested wrappers are peeled
/// one at a time.
fn unwrap_aggregate(reference: &str) -> &str {
    let mut current = reference.trim();
    loop {
        let Some(open) = current.find('(') else {
            return current;
        };
        let head = &current[..open];
        if !current.ends_with(')') || !head.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return current;
        }
        current = current[open + 1..current.len() - 1].trim();
    }
}

fn opt_str<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(|x| x.as_str()).filter(|s| !s.is_empty())
}
