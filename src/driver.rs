//! Fans an extraction pass out over the SDK trees of a sources directory.

use anyhow::{Context, Result};
use rayon::prelude::*;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::extractor::SdkExtractor;
use crate::formatter::OutputFormat;

static SDK_DIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"sources-(\d\d)").expect("sdk directory pattern compiles"));

/// Where one SDK level's results go: `<out>/API<N>`.
pub fn output_dir(out: &Path, sdk_version: u32) -> PathBuf {
    out.join(format!("API{sdk_version}"))
}

/// `(level, tree)` for every `sources-NN` directory directly under `sdk`,
/// ordered by level.
pub fn sdk_versions(sdk: &Path) -> Result<Vec<(u32, PathBuf)>> {
    let mut versions = Vec::new();
    for entry in fs::read_dir(sdk).with_context(|| format!("failed to list {}", sdk.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let Some(level) = SDK_DIR.captures(&name).and_then(|caps| caps[1].parse::<u32>().ok()) else {
            tracing::debug!(dir = %name, "not an SDK source tree");
            continue;
        };
        versions.push((level, entry.path()));
    }
    versions.sort();
    Ok(versions)
}

/// Run `extractor` over a single SDK tree.
pub fn run_worker(
    extractor: &dyn SdkExtractor,
    tree: &Path,
    sdk_version: u32,
    out: &Path,
    format: OutputFormat,
) -> Result<()> {
    tracing::info!(sdk_version, tree = %tree.display(), pass = extractor.name(), "starting");
    extractor.extract(tree, sdk_version, &output_dir(out, sdk_version), format)
}

/// Run `extractor` over every SDK tree under `sdk` on a pool of `workers`
/// threads. A failing level does not stop the others.
pub fn run_batch(
    extractor: &dyn SdkExtractor,
    sdk: &Path,
    out: &Path,
    workers: usize,
    format: OutputFormat,
) -> Result<()> {
    let versions = sdk_versions(sdk)?;
    if versions.is_empty() {
        anyhow::bail!("no sources-NN directories under {}", sdk.display());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .context("failed to start worker pool")?;

    let results: Vec<(u32, Result<()>)> = pool.install(|| {
        versions
            .par_iter()
            .map(|(level, tree)| (*level, run_worker(extractor, tree, *level, out, format)))
            .collect()
    });

    let mut failed = Vec::new();
    for (level, result) in results {
        if let Err(err) = result {
            tracing::error!(sdk_version = level, "extraction failed: {err:#}");
            failed.push(level);
        }
    }

    if !failed.is_empty() {
        anyhow::bail!("{} of {} SDK versions failed: {:?}", failed.len(), versions.len(), failed);
    }
    tracing::info!(versions = versions.len(), pass = extractor.name(), "batch finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::manifest::MANIFEST_PATH;
    use crate::extractor::ProtectionLevelExtractor;
    use tempfile::TempDir;

    #[test]
    fn test_sdk_versions() {
        let sdk = TempDir::new().unwrap();
        fs::create_dir(sdk.path().join("sources-30")).unwrap();
        fs::create_dir(sdk.path().join("sources-23")).unwrap();
        fs::create_dir(sdk.path().join("tools")).unwrap();
        fs::write(sdk.path().join("sources-29"), "").unwrap();

        let versions = sdk_versions(sdk.path()).unwrap();
        assert_eq!(
            versions,
            vec![(23, sdk.path().join("sources-23")), (30, sdk.path().join("sources-30"))]
        );
    }

    #[test]
    fn test_output_dir() {
        assert_eq!(output_dir(Path::new("mappings"), 29), PathBuf::from("mappings/API29"));
    }

    #[test]
    fn test_batch_continues_past_failures() {
        let sdk = TempDir::new().unwrap();
        let good = sdk.path().join("sources-28").join(MANIFEST_PATH);
        fs::create_dir_all(good.parent().unwrap()).unwrap();
        fs::write(
            &good,
            r#"<manifest><permission android:name="android.permission.CAMERA" android:protectionLevel="dangerous"/></manifest>"#,
        )
        .unwrap();
        fs::create_dir(sdk.path().join("sources-29")).unwrap();
        let out = TempDir::new().unwrap();

        let result = run_batch(&ProtectionLevelExtractor::new(), sdk.path(), out.path(), 2, OutputFormat::Text);

        assert!(result.is_err());
        let dangerous = fs::read_to_string(out.path().join("API28/dangerous-permissions.txt")).unwrap();
        assert_eq!(dangerous, "android.permission.CAMERA\n");
        assert!(!out.path().join("API29").exists());
    }

    #[test]
    fn test_batch_without_sdk_trees() {
        let sdk = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        assert!(run_batch(&ProtectionLevelExtractor::new(), sdk.path(), out.path(), 1, OutputFormat::Text).is_err());
    }
}
