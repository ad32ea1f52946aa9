use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::extractor::manifest::{ProtectionLevel, ProtectionLevels};
use crate::extractor::{MethodRecord, PermissionSource};

mod json;
mod text;

pub use json::JsonFormatter;
pub use text::TextFormatter;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

pub trait OutputFormatter {
    fn begin_document(&mut self, w: &mut dyn Write) -> std::io::Result<()>;
    fn end_document(&mut self, w: &mut dyn Write) -> std::io::Result<()>;

    /// One method and the permissions it requires according to `source`.
    fn mapping(&mut self, w: &mut dyn Write, record: &MethodRecord, source: PermissionSource) -> std::io::Result<()>;

    /// One declared permission of the given tier.
    fn permission(&mut self, w: &mut dyn Write, name: &str, level: ProtectionLevel) -> std::io::Result<()>;

    /// File extension of the documents this formatter writes.
    fn extension(&self) -> &'static str;
}

pub fn create_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter::new()),
        OutputFormat::Json => Box::new(JsonFormatter::new()),
    }
}

/// Write `annotations-Mappings` and `docs-Mappings` into `out_dir`.
pub fn write_mappings(records: &[MethodRecord], out_dir: &Path, format: OutputFormat) -> Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("failed to create {}", out_dir.display()))?;

    for source in [PermissionSource::Annotation, PermissionSource::Documentation] {
        let mut formatter = create_formatter(format);
        let path = out_dir.join(format!("{}.{}", source.file_stem(), formatter.extension()));
        write_document(&path, formatter.as_mut(), |formatter, w| {
            for record in records.iter().filter(|r| !r.permissions(source).is_empty()) {
                formatter.mapping(w, record, source)?;
            }
            Ok(())
        })?;
    }
    Ok(())
}

/// Write one `<tier>-permissions` file per protection level into `out_dir`.
pub fn write_protection_levels(levels: &ProtectionLevels, out_dir: &Path, format: OutputFormat) -> Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("failed to create {}", out_dir.display()))?;

    for level in ProtectionLevel::ALL {
        let mut formatter = create_formatter(format);
        let path = out_dir.join(format!("{level}-permissions.{}", formatter.extension()));
        write_document(&path, formatter.as_mut(), |formatter, w| {
            for name in levels.tier(level) {
                formatter.permission(w, name, level)?;
            }
            Ok(())
        })?;
    }
    Ok(())
}

fn write_document<F>(path: &Path, formatter: &mut dyn OutputFormatter, body: F) -> Result<()>
where
    F: FnOnce(&mut dyn OutputFormatter, &mut dyn Write) -> std::io::Result<()>,
{
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let w: &mut dyn Write = &mut writer;

    formatter.begin_document(w)?;
    body(&mut *formatter, &mut *w)?;
    formatter.end_document(w)?;
    w.flush()?;

    tracing::debug!(path = %path.display(), "wrote output");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("TEXT".parse::<OutputFormat>(), Ok(OutputFormat::Text));
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("rst".parse::<OutputFormat>().is_err());
    }
}
