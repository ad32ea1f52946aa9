//! Protection levels of the permissions declared in the framework manifest
//! (`core/res/AndroidManifest.xml`).

use anyhow::Context;
use indexmap::IndexSet;
use regex::Regex;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::{ExtractError, Result};
use crate::formatter::{write_protection_levels, OutputFormat};

use super::SdkExtractor;

/// Manifest location relative to an SDK tree.
pub const MANIFEST_PATH: &str = "core/res/AndroidManifest.xml";

static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment pattern compiles"));

// `<permission ...>` but not `<permission-group>` or `<permission-tree>`
static PERMISSION_ELEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<permission(\s[^>]*)?>").expect("element pattern compiles"));

static ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([\w:.]+)\s*=\s*"([^"]*)""#).expect("attribute pattern compiles"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionLevel {
    Normal,
    Dangerous,
    Signature,
}

impl ProtectionLevel {
    pub const ALL: [ProtectionLevel; 3] = [ProtectionLevel::Normal, ProtectionLevel::Dangerous, ProtectionLevel::Signature];

    pub fn as_str(self) -> &'static str {
        match self {
            ProtectionLevel::Normal => "normal",
            ProtectionLevel::Dangerous => "dangerous",
            ProtectionLevel::Signature => "signature",
        }
    }

    /// Classify an `android:protectionLevel` value such as
    /// `signature|privileged`. `Ok(None)` means the level fits no tier.
    pub fn classify(permission: &str, level: &str) -> Result<Option<Self>> {
        if level.contains("dangerous") && level.contains("signature") {
            return Err(ExtractError::AmbiguousProtectionLevel {
                permission: permission.to_string(),
                level: level.to_string(),
            });
        }
        let tier = if level.starts_with("normal") {
            Some(ProtectionLevel::Normal)
        } else if level.starts_with("dangerous") {
            Some(ProtectionLevel::Dangerous)
        } else if level.starts_with("signature") || level.ends_with("signature") {
            Some(ProtectionLevel::Signature)
        } else {
            None
        };
        Ok(tier)
    }
}

impl fmt::Display for ProtectionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared permissions grouped by tier, each in manifest order.
#[derive(Debug, Default)]
pub struct ProtectionLevels {
    normal: IndexSet<String>,
    dangerous: IndexSet<String>,
    signature: IndexSet<String>,
    /// `(permission, protectionLevel)` pairs that fit no tier.
    pub unclassified: Vec<(String, String)>,
    /// Every `<permission>` element seen.
    pub declared: usize,
}

impl ProtectionLevels {
    pub fn tier(&self, level: ProtectionLevel) -> &IndexSet<String> {
        match level {
            ProtectionLevel::Normal => &self.normal,
            ProtectionLevel::Dangerous => &self.dangerous,
            ProtectionLevel::Signature => &self.signature,
        }
    }

    fn insert(&mut self, level: ProtectionLevel, permission: String) {
        match level {
            ProtectionLevel::Normal => self.normal.insert(permission),
            ProtectionLevel::Dangerous => self.dangerous.insert(permission),
            ProtectionLevel::Signature => self.signature.insert(permission),
        };
    }

    /// Parse the text of a manifest.
    pub fn parse(xml: &str) -> Result<Self> {
        let xml = COMMENT.replace_all(xml, "");
        let mut levels = ProtectionLevels::default();

        for element in PERMISSION_ELEMENT.captures_iter(&xml) {
            let attributes = element.get(1).map_or("", |m| m.as_str());
            let mut name = None;
            let mut level = None;
            for attr in ATTRIBUTE.captures_iter(attributes) {
                match &attr[1] {
                    "android:name" => name = Some(attr[2].to_string()),
                    "android:protectionLevel" => level = Some(attr[2].to_string()),
                    _ => {}
                }
            }
            let Some(name) = name else {
                tracing::warn!(element = %element[0].trim(), "permission without android:name");
                continue;
            };
            let level = level.unwrap_or_else(|| "normal".to_string());
            levels.declared += 1;

            match ProtectionLevel::classify(&name, &level)? {
                Some(tier) => levels.insert(tier, name),
                None => {
                    tracing::warn!(permission = %name, level = %level, "unclassified protection level");
                    levels.unclassified.push((name, level));
                }
            }
        }

        Ok(levels)
    }

    pub fn read(path: &Path) -> Result<Self> {
        Self::parse(&fs::read_to_string(path)?)
    }
}

/// Splits the permissions declared by an SDK's framework manifest into the
/// normal, dangerous and signature tiers.
#[derive(Debug, Default)]
pub struct ProtectionLevelExtractor;

impl ProtectionLevelExtractor {
    pub fn new() -> Self {
        ProtectionLevelExtractor
    }
}

impl SdkExtractor for ProtectionLevelExtractor {
    fn name(&self) -> &'static str {
        "protection-levels"
    }

    fn extract(&self, tree: &Path, sdk_version: u32, out_dir: &Path, format: OutputFormat) -> anyhow::Result<()> {
        let manifest = tree.join(MANIFEST_PATH);
        let levels = ProtectionLevels::read(&manifest)
            .with_context(|| format!("failed to read {}", manifest.display()))?;

        tracing::info!(
            sdk_version,
            declared = levels.declared,
            normal = levels.tier(ProtectionLevel::Normal).len(),
            dangerous = levels.tier(ProtectionLevel::Dangerous).len(),
            signature = levels.tier(ProtectionLevel::Signature).len(),
            unclassified = levels.unclassified.len(),
            "extracted protection levels"
        );

        write_protection_levels(&levels, out_dir, format)
            .with_context(|| format!("failed to write protection levels for API {sdk_version}"))
    }
}
