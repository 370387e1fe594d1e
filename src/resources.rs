//! Resource model: keys, qualifier-aware repositories and the tiered
//! configuration graph the environment assembles.
//!
//! Resource files are read with `roxmltree`; only the
//! value forms a render session consumes (`string`, `color`, `dimen`, `bool`,
//! `integer`, `style` parents and typed `item`s) are extracted.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use roxmltree::{Document, Node};
use serde::Serialize;

use crate::Result;

/// Namespace a resource key is resolved in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ResourceNamespace {
    /// Platform (framework) resources
    #[serde(rename = "android")]
    Android,
    /// Application resources, including merged libraries
    #[serde(rename = "res-auto")]
    ResAuto,
}

impl fmt::Display for ResourceNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceNamespace::Android => "android",
            ResourceNamespace::ResAuto => "res-auto",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceType {
    Bool,
    Color,
    Dimen,
    Id,
    Integer,
    String,
    Style,
}

impl ResourceType {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => ResourceType::Bool,
            "color" => ResourceType::Color,
            "dimen" => ResourceType::Dimen,
            "id" => ResourceType::Id,
            "integer" => ResourceType::Integer,
            "string" => ResourceType::String,
            "style" => ResourceType::Style,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Bool => "bool",
            ResourceType::Color => "color",
            ResourceType::Dimen => "dimen",
            ResourceType::Id => "id",
            ResourceType::Integer => "integer",
            ResourceType::String => "string",
            ResourceType::Style => "style",
        }
    }
}

/// A resource identity within one namespace, e.g. `string/app_name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey {
    pub kind: ResourceType,
    pub name: String,
}

impl ResourceKey {
    pub fn new(kind: ResourceType, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(ResourceType::String, name)
    }

    /// Parse a reference such as `@string/app_name` or `@android:color/white`.
    ///
    /// Returns the explicit namespace, if one was given, alongside the key.
    pub fn parse_reference(reference: &str) -> Option<(Option<ResourceNamespace>, Self)> {
        let body = reference.strip_prefix('@').unwrap_or(reference);
        let (namespace, body) = match body.split_once(':') {
            Some(("android", rest)) => (Some(ResourceNamespace::Android), rest),
            Some((_, rest)) => (Some(ResourceNamespace::ResAuto), rest),
            None => (None, body),
        };
        let (kind, name) = body.split_once('/')?;
        let kind = ResourceType::from_name(kind)?;
        if name.is_empty() {
            return None;
        }
        Some((namespace, Self::new(kind, name)))
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.as_str(), self.name)
    }
}

impl Serialize for ResourceKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The set of configuration qualifiers a device satisfies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifierSet {
    tokens: BTreeSet<String>,
    sdk_version: u32,
}

impl QualifierSet {
    pub fn new(sdk_version: u32) -> Self {
        Self {
            tokens: BTreeSet::new(),
            sdk_version,
        }
    }

    pub fn insert(&mut self, token: impl Into<String>) {
        self.tokens.insert(token.into());
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    pub fn sdk_version(&self) -> u32 {
        self.sdk_version
    }

    /// Whether a resource folder with these qualifiers applies to the device.
    pub fn matches(&self, folder_qualifiers: &[String]) -> bool {
        folder_qualifiers.iter().all(|q| {
            if let Some(version) = q.strip_prefix('v').and_then(|v| v.parse::<u32>().ok()) {
                return version <= self.sdk_version;
            }
            matches!(q.as_str(), "anydpi" | "nodpi") || self.tokens.contains(q)
        })
    }
}

/// Values declared in one `values[-qualifiers]` folder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceFolder {
    pub qualifiers: Vec<String>,
    pub values: BTreeMap<ResourceKey, String>,
}

impl ResourceFolder {
    /// Folder from a directory name such as `values-night-v29`.
    pub fn for_dir_name(dir_name: &str) -> Self {
        Self {
            qualifiers: dir_name.split('-').skip(1).map(str::to_string).collect(),
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, key: ResourceKey, value: impl Into<String>) -> Self {
        self.values.insert(key, value.into());
        self
    }

    /// Ordering key among folders that all match a device. One bit per
    /// qualifier category present, higher categories in higher bits, then
    /// the platform version for ties.
    fn precedence(&self) -> (u8, u32) {
        let mut categories = 0u8;
        let mut version = 0u32;
        for q in &self.qualifiers {
            let category = QualifierCategory::of(q);
            if category == QualifierCategory::Version {
                version = version.max(q[1..].parse::<u32>().unwrap_or(0));
            }
            categories |= 1 << (QualifierCategory::Version as u8 - category as u8);
        }
        (categories, version)
    }
}

/// Qualifier categories in decreasing precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QualifierCategory {
    Locale,
    LayoutDirection,
    Orientation,
    NightMode,
    Density,
    Version,
}

impl QualifierCategory {
    fn of(qualifier: &str) -> Self {
        match qualifier {
            "ldltr" | "ldrtl" => Self::LayoutDirection,
            "port" | "land" => Self::Orientation,
            "night" | "notnight" => Self::NightMode,
            "ldpi" | "mdpi" | "tvdpi" | "hdpi" | "xhdpi" | "xxhdpi" | "xxxhdpi" | "anydpi" | "nodpi" => Self::Density,
            q if q.strip_prefix('v').map_or(false, |v| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit())) => {
                Self::Version
            }
            _ => Self::Locale,
        }
    }
}

/// Resources of one source (an app module, a library or the platform).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceRepository {
    pub name: String,
    pub folders: Vec<ResourceFolder>,
}

impl ResourceRepository {
    pub fn new(name: impl Into<String>, folders: Vec<ResourceFolder>) -> Self {
        Self {
            name: name.into(),
            folders,
        }
    }

    /// Load all `values*` folders under a resource directory.
    ///
    /// Folders and files are visited in lexicographic order so the result does
    /// not depend on directory enumeration order.
    pub fn load(name: impl Into<String>, res_dir: &Path) -> Result<Self> {
        let mut folder_dirs: Vec<PathBuf> = fs::read_dir(res_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n == "values" || n.starts_with("values-"))
                    .unwrap_or(false)
            })
            .collect();
        folder_dirs.sort();

        let mut folders = Vec::with_capacity(folder_dirs.len());
        for dir in folder_dirs {
            let dir_name = dir.file_name().and_then(|n| n.to_str()).unwrap_or("values");
            let mut folder = ResourceFolder::for_dir_name(dir_name);

            let mut files: Vec<PathBuf> = fs::read_dir(&dir)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().map(|x| x == "xml").unwrap_or(false))
                .collect();
            files.sort();

            for file in files {
                let text = match fs::read_to_string(&file) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Skipping unreadable resource file {}: {}", file.display(), e);
                        continue;
                    }
                };
                if let Err(e) = parse_values(&text, &mut folder.values) {
                    warn!("Skipping malformed resource file {}: {}", file.display(), e);
                }
            }
            folders.push(folder);
        }

        let repo = Self::new(name, folders);
        debug!(
            "Loaded {} resource folders for '{}' from {}",
            repo.folders.len(),
            repo.name,
            res_dir.display()
        );
        Ok(repo)
    }

    /// Value of `key` for the device, picking the best matching folder.
    ///
    /// Folders are ranked by qualifier category precedence, so `values-en`
    /// beats `values-night` for an English night-mode device.
    pub fn resolve(&self, key: &ResourceKey, qualifiers: &QualifierSet) -> Option<&str> {
        self.folders
            .iter()
            .filter(|f| qualifiers.matches(&f.qualifiers))
            .filter_map(|f| f.values.get(key).map(|v| (f.precedence(), v)))
            .max_by_key(|(precedence, _)| *precedence)
            .map(|(_, v)| v.as_str())
    }

    /// Every key this repository defines, resolved for the device.
    pub fn configured(&self, qualifiers: &QualifierSet) -> BTreeMap<ResourceKey, String> {
        let mut matching: Vec<&ResourceFolder> = self
            .folders
            .iter()
            .filter(|f| qualifiers.matches(&f.qualifiers))
            .collect();
        matching.sort_by_key(|f| f.precedence());

        let mut out = BTreeMap::new();
        for folder in matching {
            for (k, v) in &folder.values {
                out.insert(k.clone(), v.clone());
            }
        }
        out
    }
}

/// Source tiers in decreasing precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceTier {
    Local,
    Module,
    Library,
    Framework,
}

impl ResourceTier {
    pub const ALL: [ResourceTier; 4] = [
        ResourceTier::Local,
        ResourceTier::Module,
        ResourceTier::Library,
        ResourceTier::Framework,
    ];

    pub fn namespace(&self) -> ResourceNamespace {
        match self {
            ResourceTier::Framework => ResourceNamespace::Android,
            _ => ResourceNamespace::ResAuto,
        }
    }
}

/// Resource repositories grouped by tier.
///
/// The same key defined at several tiers resolves to the highest-precedence
/// tier; within a tier the first repository wins. The framework tier is only
/// a fallback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceConfigurationGraph {
    tiers: BTreeMap<ResourceTier, Vec<ResourceRepository>>,
}

impl ResourceConfigurationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, tier: ResourceTier, repository: ResourceRepository) {
        self.tiers.entry(tier).or_default().push(repository);
    }

    pub fn with(mut self, tier: ResourceTier, repository: ResourceRepository) -> Self {
        self.add(tier, repository);
        self
    }

    pub fn repositories(&self, tier: ResourceTier) -> &[ResourceRepository] {
        self.tiers.get(&tier).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resolve a key across tiers, returning the winning tier and value.
    pub fn lookup(&self, key: &ResourceKey, qualifiers: &QualifierSet) -> Option<(ResourceTier, &str)> {
        ResourceTier::ALL.iter().find_map(|tier| {
            self.repositories(*tier)
                .iter()
                .find_map(|repo| repo.resolve(key, qualifiers))
                .map(|v| (*tier, v))
        })
    }

    /// Qualifier-resolved values per namespace.
    pub fn configured(&self, qualifiers: &QualifierSet) -> ResourceTable {
        let mut table = ResourceTable::default();
        // Lowest precedence first so later inserts override.
        for tier in ResourceTier::ALL.iter().rev() {
            let values = table.namespaces.entry(tier.namespace()).or_default();
            for repo in self.repositories(*tier).iter().rev() {
                values.extend(repo.configured(qualifiers));
            }
        }
        table
    }
}

/// Flattened, device-resolved resource values handed to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceTable {
    namespaces: BTreeMap<ResourceNamespace, BTreeMap<ResourceKey, String>>,
}

impl ResourceTable {
    const MAX_REFERENCE_DEPTH: usize = 16;

    pub fn insert(&mut self, namespace: ResourceNamespace, key: ResourceKey, value: impl Into<String>) {
        self.namespaces.entry(namespace).or_default().insert(key, value.into());
    }

    pub fn namespace(&self, namespace: ResourceNamespace) -> Option<&BTreeMap<ResourceKey, String>> {
        self.namespaces.get(&namespace)
    }

    pub fn get(&self, namespace: ResourceNamespace, key: &ResourceKey) -> Option<&str> {
        self.namespaces.get(&namespace)?.get(key).map(String::as_str)
    }

    /// Application value if present, otherwise the platform value.
    pub fn lookup(&self, key: &ResourceKey) -> Option<&str> {
        self.get(ResourceNamespace::ResAuto, key)
            .or_else(|| self.get(ResourceNamespace::Android, key))
    }

    /// Follow `@type/name` references until a literal value is reached.
    pub fn resolve_reference<'a>(&'a self, reference: &'a str) -> Option<&'a str> {
        let mut current = reference;
        let mut resolved = None;
        for _ in 0..Self::MAX_REFERENCE_DEPTH {
            if !current.starts_with('@') {
                return resolved.or(Some(current));
            }
            let (namespace, key) = ResourceKey::parse_reference(current)?;
            let value = match namespace {
                Some(ns) => self.get(ns, &key)?,
                None => self.lookup(&key)?,
            };
            resolved = Some(value);
            current = value;
        }
        None
    }

    /// Platform values overlaid with application values on key collision.
    pub fn merged(&self) -> BTreeMap<ResourceKey, String> {
        let mut out = BTreeMap::new();
        for ns in [ResourceNamespace::Android, ResourceNamespace::ResAuto] {
            if let Some(values) = self.namespaces.get(&ns) {
                out.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.namespaces.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parse one values file into `out`. Markup inside a value (`<b>`,
/// `<xliff:g>`) and CDATA sections contribute their text.
fn parse_values(text: &str, out: &mut BTreeMap<ResourceKey, String>) -> std::result::Result<(), roxmltree::Error> {
    let doc = Document::parse(text)?;
    for node in doc.root_element().children().filter(|n| n.is_element()) {
        let kind = match node.tag_name().name() {
            "item" => node.attribute("type").and_then(ResourceType::from_name),
            tag => ResourceType::from_name(tag),
        };
        let (Some(kind), Some(name)) = (kind, node.attribute("name")) else {
            continue;
        };
        let value = if kind == ResourceType::Style {
            node.attribute("parent").unwrap_or_default().to_string()
        } else {
            unescape(value_text(node).trim())
        };
        out.insert(ResourceKey::new(kind, name), value);
    }
    Ok(())
}

fn value_text(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|d| d.is_text())
        .filter_map(|d| d.text())
        .collect()
}

fn unescape(raw: &str) -> String {
    raw.replace("\\'", "'").replace("\\\"", "\"").replace("\\n", "\n")
}

/// Read the `package` attribute of a library manifest.
///
/// A manifest that is not well-formed XML yields `None` so the caller can
/// fall back to the directory name.
pub fn read_manifest_package(manifest: &Path) -> Result<Option<String>> {
    let text = fs::read_to_string(manifest)?;
    let doc = match Document::parse(&text) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Malformed manifest {}: {}", manifest.display(), e);
            return Ok(None);
        }
    };
    let root = doc.root_element();
    if root.tag_name().name() != "manifest" {
        return Ok(None);
    }
    Ok(root.attribute("package").map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(name: &str, folders: Vec<ResourceFolder>) -> ResourceRepository {
        ResourceRepository::new(name, folders)
    }

    #[test]
    fn parses_common_value_forms() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<resources>
    <string name="app_name">Demo</string>
    <string name="quote">It\'s here</string>
    <color name="accent">#FF0000</color>
    <dimen name="gap">8dp</dimen>
    <item type="bool" name="flag">true</item>
    <style name="AppTheme" parent="Theme.AppCompat.Light">
        <item name="colorAccent">@color/accent</item>
    </style>
</resources>"#;
        let mut values = BTreeMap::new();
        parse_values(xml, &mut values).unwrap();
        assert_eq!(values.get(&ResourceKey::string("app_name")).map(String::as_str), Some("Demo"));
        assert_eq!(values.get(&ResourceKey::string("quote")).map(String::as_str), Some("It's here"));
        assert_eq!(
            values.get(&ResourceKey::new(ResourceType::Color, "accent")).map(String::as_str),
            Some("#FF0000")
        );
        assert_eq!(
            values.get(&ResourceKey::new(ResourceType::Bool, "flag")).map(String::as_str),
            Some("true")
        );
        assert_eq!(
            values.get(&ResourceKey::new(ResourceType::Style, "AppTheme")).map(String::as_str),
            Some("Theme.AppCompat.Light")
        );
        assert!(!values.contains_key(&ResourceKey::new(ResourceType::String, "colorAccent")));
    }

    #[test]
    fn most_specific_matching_folder_wins() {
        let key = ResourceKey::string("title");
        let r = repo(
            "app",
            vec![
                ResourceFolder::for_dir_name("values").with_value(key.clone(), "Day"),
                ResourceFolder::for_dir_name("values-night").with_value(key.clone(), "Night"),
                ResourceFolder::for_dir_name("values-v99").with_value(key.clone(), "Future"),
            ],
        );
        let mut day = QualifierSet::new(31);
        day.insert("notnight");
        let mut night = QualifierSet::new(31);
        night.insert("night");
        assert_eq!(r.resolve(&key, &day), Some("Day"));
        assert_eq!(r.resolve(&key, &night), Some("Night"));
        assert_eq!(r.configured(&night).get(&key).map(String::as_str), Some("Night"));
    }

    #[test]
    fn tier_precedence_local_over_module_over_library() {
        let key = ResourceKey::string("app_name");
        let q = QualifierSet::new(31);
        let graph = ResourceConfigurationGraph::new()
            .with(ResourceTier::Library, repo("lib", vec![ResourceFolder::for_dir_name("values").with_value(key.clone(), "Lib")]))
            .with(ResourceTier::Module, repo("module", vec![ResourceFolder::for_dir_name("values").with_value(key.clone(), "Module")]))
            .with(ResourceTier::Local, repo("local", vec![ResourceFolder::for_dir_name("values").with_value(key.clone(), "Local")]));
        assert_eq!(graph.lookup(&key, &q), Some((ResourceTier::Local, "Local")));
        assert_eq!(graph.configured(&q).lookup(&key), Some("Local"));
    }

    #[test]
    fn library_shadows_framework() {
        let key = ResourceKey::string("ok");
        let q = QualifierSet::new(31);
        let graph = ResourceConfigurationGraph::new()
            .with(ResourceTier::Framework, repo("android", vec![ResourceFolder::for_dir_name("values").with_value(key.clone(), "OK")]))
            .with(ResourceTier::Library, repo("lib", vec![ResourceFolder::for_dir_name("values").with_value(key.clone(), "Okay")]));
        assert_eq!(graph.lookup(&key, &q), Some((ResourceTier::Library, "Okay")));
        let table = graph.configured(&q);
        assert_eq!(table.lookup(&key), Some("Okay"));
        assert_eq!(table.get(ResourceNamespace::Android, &key), Some("OK"));
        assert_eq!(table.merged().get(&key).map(String::as_str), Some("Okay"));
    }

    #[test]
    fn first_library_wins_within_tier() {
        let key = ResourceKey::string("name");
        let q = QualifierSet::new(31);
        let graph = ResourceConfigurationGraph::new()
            .with(ResourceTier::Library, repo("a", vec![ResourceFolder::for_dir_name("values").with_value(key.clone(), "A")]))
            .with(ResourceTier::Library, repo("b", vec![ResourceFolder::for_dir_name("values").with_value(key.clone(), "B")]));
        assert_eq!(graph.lookup(&key, &q), Some((ResourceTier::Library, "A")));
        assert_eq!(graph.configured(&q).lookup(&key), Some("A"));
    }

    #[test]
    fn references_resolve_through_namespaces() {
        let mut table = ResourceTable::default();
        table.insert(ResourceNamespace::Android, ResourceKey::string("ok"), "OK");
        table.insert(ResourceNamespace::ResAuto, ResourceKey::string("confirm"), "@android:string/ok");
        table.insert(ResourceNamespace::ResAuto, ResourceKey::string("loop"), "@string/loop");
        assert_eq!(table.resolve_reference("@string/confirm"), Some("OK"));
        assert_eq!(table.resolve_reference("plain"), Some("plain"));
        assert_eq!(table.resolve_reference("@string/missing"), None);
        assert_eq!(table.resolve_reference("@string/loop"), None);
    }

    #[test]
    fn parse_reference_handles_namespaces() {
        let (ns, key) = ResourceKey::parse_reference("@android:color/white").unwrap();
        assert_eq!(ns, Some(ResourceNamespace::Android));
        assert_eq!(key, ResourceKey::new(ResourceType::Color, "white"));
        assert!(ResourceKey::parse_reference("@string/").is_none());
        assert!(ResourceKey::parse_reference("@layout/main").is_none());
    }

    #[test]
    fn self_closing_styles_do_not_swallow_later_values() {
        let mut out = BTreeMap::new();
        parse_values(
            r#"<resources><style name="AppTheme" parent="Base"/><string name="after">Still here</string></resources>"#,
            &mut out,
        )
        .unwrap();
        assert_eq!(out.get(&ResourceKey::new(ResourceType::Style, "AppTheme")).map(String::as_str), Some("Base"));
        assert_eq!(out.get(&ResourceKey::string("after")).map(String::as_str), Some("Still here"));
    }

    #[test]
    fn inline_markup_and_cdata_keep_their_text() {
        let xml = r#"<resources xmlns:xliff="urn:oasis:names:tc:xliff:document:1.2">
    <string name="bold">Say <b>hi</b> now</string>
    <string name="placeholder">Hello <xliff:g id="name">%s</xliff:g>!</string>
    <string name="cdata"><![CDATA[<b>Hi</b>]]></string>
    <string name="slash">a/&gt;</string>
</resources>"#;
        let mut out = BTreeMap::new();
        parse_values(xml, &mut out).unwrap();
        let get = |name: &str| out.get(&ResourceKey::string(name)).map(String::as_str);
        assert_eq!(get("bold"), Some("Say hi now"));
        assert_eq!(get("placeholder"), Some("Hello %s!"));
        assert_eq!(get("cdata"), Some("<b>Hi</b>"));
        assert_eq!(get("slash"), Some("a/>"));
    }

    #[test]
    fn malformed_values_file_is_an_error() {
        let mut out = BTreeMap::new();
        assert!(parse_values("<resources><string name=\"x\">open", &mut out).is_err());
    }

    #[test]
    fn locale_outranks_night_mode() {
        let key = ResourceKey::string("greeting");
        let r = repo(
            "app",
            vec![
                ResourceFolder::for_dir_name("values").with_value(key.clone(), "Default"),
                ResourceFolder::for_dir_name("values-en").with_value(key.clone(), "English"),
                ResourceFolder::for_dir_name("values-night").with_value(key.clone(), "Night"),
            ],
        );
        let night = crate::DeviceProfile::pixel_5().with_night_mode(true).qualifiers(31);
        assert_eq!(r.resolve(&key, &night), Some("English"));
        assert_eq!(r.configured(&night).get(&key).map(String::as_str), Some("English"));
    }

    #[test]
    fn higher_version_breaks_ties() {
        let key = ResourceKey::string("label");
        let r = repo(
            "app",
            vec![
                ResourceFolder::for_dir_name("values-night-v29").with_value(key.clone(), "v29"),
                ResourceFolder::for_dir_name("values-night-v31").with_value(key.clone(), "v31"),
                ResourceFolder::for_dir_name("values-night-v23").with_value(key.clone(), "v23"),
            ],
        );
        let mut q = QualifierSet::new(31);
        q.insert("night");
        assert_eq!(r.resolve(&key, &q), Some("v31"));
        assert_eq!(r.configured(&q).get(&key).map(String::as_str), Some("v31"));
    }
}
