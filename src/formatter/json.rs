use super::OutputFormatter;
use serde::Serialize;
use std::io::Write;

use crate::extractor::manifest::ProtectionLevel;
use crate::extractor::{MethodRecord, Permission, PermissionSource};

pub struct JsonFormatter {
    data: JsonData,
}

#[derive(Serialize, Default)]
struct JsonData {
    #[serde(skip_serializing_if = "Option::is_none")]
    mappings: Option<Vec<JsonMapping>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    permissions: Option<Vec<JsonPermission>>,
}

#[derive(Serialize)]
struct JsonMapping {
    signature: String,
    class: String,
    method: String,
    return_type: String,
    parameters: Vec<String>,
    heuristic: bool,
    permissions: Vec<Permission>,
}

impl JsonMapping {
    fn new(record: &MethodRecord, source: PermissionSource) -> Self {
        JsonMapping {
            signature: record.signature().to_string(),
            class: record.class_name.clone(),
            method: record.name.clone(),
            return_type: record.return_type.clone(),
            parameters: record.params.clone(),
            heuristic: record.is_heuristic(),
            permissions: record.permissions(source).iter().cloned().collect(),
        }
    }
}

#[derive(Serialize)]
struct JsonPermission {
    name: String,
    protection_level: &'static str,
}

impl JsonFormatter {
    pub fn new() -> Self {
        JsonFormatter { data: JsonData::default() }
    }
}

impl OutputFormatter for JsonFormatter {
    fn begin_document(&mut self, _w: &mut dyn Write) -> std::io::Result<()> {
        Ok(())
    }

    fn end_document(&mut self, w: &mut dyn Write) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(&self.data)?;
        writeln!(w, "{json}")?;
        Ok(())
    }

    fn mapping(&mut self, _w: &mut dyn Write, record: &MethodRecord, source: PermissionSource) -> std::io::Result<()> {
        self.data
            .mappings
            .get_or_insert_with(Vec::new)
            .push(JsonMapping::new(record, source));
        Ok(())
    }

    fn permission(&mut self, _w: &mut dyn Write, name: &str, level: ProtectionLevel) -> std::io::Result<()> {
        self.data.permissions.get_or_insert_with(Vec::new).push(JsonPermission {
            name: name.to_string(),
            protection_level: level.as_str(),
        });
        Ok(())
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}
