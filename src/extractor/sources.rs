//! Source-tree enumeration and the per-SDK mapping extraction pass.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::ExtractError;
use crate::formatter::{write_mappings, OutputFormat};
use crate::java::{parse_file, CompilationUnit, SourceTypeSolver, TypeIndex};

use super::normalize::PermissionNormalizer;
use super::visitor::visit_file;
use super::{MethodRecord, SdkExtractor};

/// Packages mined when none are given on the command line.
pub const DEFAULT_PACKAGE_PREFIXES: &[&str] = &["android.", "androidx.", "com.android.", "com.google.android"];

/// Sources that are skipped by default.
pub const DEFAULT_SKIPPED: &[&str] = &["com.android.server.notification.NotificationManagerService"];

/// Which files of a source root get visited.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub package_prefixes: Vec<String>,
    /// Qualified names (`pkg.Class`) of files to leave out.
    pub skip: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            package_prefixes: DEFAULT_PACKAGE_PREFIXES.iter().map(|p| p.to_string()).collect(),
            skip: DEFAULT_SKIPPED.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ScanConfig {
    fn wants(&self, qualified_name: &str) -> bool {
        self.package_prefixes
            .iter()
            .any(|prefix| qualified_name.starts_with(prefix.as_str()))
            && !self.skip.iter().any(|skipped| skipped == qualified_name)
    }
}

/// A `.java` file located under a source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaSource {
    /// Package implied by the file's directory.
    pub package: String,
    /// `package.FileStem`
    pub qualified_name: String,
    pub path: PathBuf,
}

/// Every directory named `java` under `tree`, sorted.
pub fn find_source_roots(tree: &Path) -> Result<Vec<PathBuf>> {
    if !tree.is_dir() {
        anyhow::bail!("SDK tree does not exist: {}", tree.display());
    }
    let mut roots: Vec<PathBuf> = WalkDir::new(tree)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir() && entry.file_name() == "java")
        .map(|entry| entry.into_path())
        .collect();
    roots.sort();
    Ok(roots)
}

/// The `.java` files under `root` selected by `config`, sorted by path.
pub fn walk_java_sources(root: &Path, config: &ScanConfig) -> Vec<JavaSource> {
    let mut sources = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "java") {
            continue;
        }
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };

        let package = relative
            .parent()
            .map(dotted)
            .unwrap_or_default();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let qualified_name = if package.is_empty() {
            stem.to_string()
        } else {
            format!("{package}.{stem}")
        };

        if config.wants(&qualified_name) {
            sources.push(JavaSource { package, qualified_name, path: path.to_path_buf() });
        }
    }

    sources
}

fn dotted(dir: &Path) -> String {
    dir.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join(".")
}

/// A file that could not be turned into records.
#[derive(Debug)]
pub struct FailedFile {
    pub path: PathBuf,
    pub error: ExtractError,
}

/// Outcome of one extraction pass.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub roots: usize,
    pub files_visited: usize,
    pub records: usize,
    pub failed: Vec<FailedFile>,
}

impl ExtractionReport {
    /// Files aborted because of an annotation shape this tool cannot read.
    pub fn unsupported_annotations(&self) -> usize {
        self.failed
            .iter()
            .filter(|failed| failed.error.is_unsupported_annotation())
            .count()
    }
}

/// Mines `@RequiresPermission` and javadoc permission mappings from the
/// Java source roots of an SDK tree.
pub struct MappingExtractor {
    normalizer: PermissionNormalizer,
    config: ScanConfig,
}

impl MappingExtractor {
    pub fn new(config: ScanConfig) -> Result<Self> {
        Ok(MappingExtractor {
            normalizer: PermissionNormalizer::new()?,
            config,
        })
    }

    /// Records of every root, in root then file order.
    pub fn extract_roots(&self, sdk_version: u32, roots: &[PathBuf]) -> (Vec<MethodRecord>, ExtractionReport) {
        let mut report = ExtractionReport { roots: roots.len(), ..Default::default() };
        let mut records = Vec::new();
        for root in roots {
            records.extend(self.extract_root(sdk_version, root, &mut report));
        }
        report.records = records.len();
        (records, report)
    }

    fn extract_root(&self, sdk_version: u32, root: &Path, report: &mut ExtractionReport) -> Vec<MethodRecord> {
        let sources = walk_java_sources(root, &self.config);
        tracing::debug!(sdk_version, root = %root.display(), files = sources.len(), "scanning source root");

        let parsed: Vec<(JavaSource, crate::error::Result<CompilationUnit>)> = sources
            .into_par_iter()
            .map(|source| {
                tracing::debug!(sdk_version, package = %source.package, file = %source.qualified_name, "parsing");
                let unit = parse_file(&source.path);
                (source, unit)
            })
            .collect();

        let mut index = TypeIndex::new();
        for unit in parsed.iter().filter_map(|(_, unit)| unit.as_ref().ok()) {
            index.register(unit);
        }
        let solver = SourceTypeSolver::new(index);
        tracing::debug!(sdk_version, root = %root.display(), types = solver.index().len(), "indexed declared types");

        let visited: Vec<(JavaSource, crate::error::Result<Vec<MethodRecord>>)> = parsed
            .into_par_iter()
            .map(|(source, unit)| {
                let records = unit.and_then(|unit| visit_file(&unit, &self.normalizer, &solver));
                (source, records)
            })
            .collect();

        let mut records = Vec::new();
        for (source, result) in visited {
            report.files_visited += 1;
            match result {
                Ok(found) => records.extend(found),
                Err(error) => report.failed.push(FailedFile { path: source.path, error }),
            }
        }
        records
    }
}

impl SdkExtractor for MappingExtractor {
    fn name(&self) -> &'static str {
        "mappings"
    }

    fn extract(&self, tree: &Path, sdk_version: u32, out_dir: &Path, format: OutputFormat) -> Result<()> {
        let roots = find_source_roots(tree)?;
        let (records, report) = self.extract_roots(sdk_version, &roots);
        for failed in &report.failed {
            tracing::warn!(sdk_version, file = %failed.path.display(), error = %failed.error, "skipped file");
        }

        tracing::info!(
            sdk_version,
            roots = report.roots,
            files = report.files_visited,
            failed = report.failed.len(),
            unsupported_annotations = report.unsupported_annotations(),
            records = report.records,
            "extracted permission mappings"
        );

        write_mappings(&records, out_dir, format)
            .with_context(|| format!("failed to write mappings for API {sdk_version}"))
    }
}
