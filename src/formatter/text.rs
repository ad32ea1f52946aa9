use super::OutputFormatter;
use std::io::Write;

use crate::extractor::manifest::ProtectionLevel;
use crate::extractor::{MethodRecord, PermissionSource};

/// Line-oriented output: `<signature> :: <permissions>` per method, one
/// permission name per line for protection levels.
pub struct TextFormatter;

impl TextFormatter {
    pub fn new() -> Self {
        TextFormatter
    }
}

impl OutputFormatter for TextFormatter {
    fn begin_document(&mut self, _w: &mut dyn Write) -> std::io::Result<()> {
        Ok(())
    }

    fn end_document(&mut self, _w: &mut dyn Write) -> std::io::Result<()> {
        Ok(())
    }

    fn mapping(&mut self, w: &mut dyn Write, record: &MethodRecord, source: PermissionSource) -> std::io::Result<()> {
        match record.mapping_line(source) {
            Some(line) => writeln!(w, "{line}"),
            None => Ok(()),
        }
    }

    fn permission(&mut self, w: &mut dyn Write, name: &str, _level: ProtectionLevel) -> std::io::Result<()> {
        writeln!(w, "{name}")
    }

    fn extension(&self) -> &'static str {
        "txt"
    }
}
