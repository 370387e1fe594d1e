//! Environment assembly: app, library and platform inputs resolved into a
//! tiered resource graph plus the static engine configuration.

use std::collections::BTreeMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::resources::{read_manifest_package, ResourceConfigurationGraph, ResourceRepository, ResourceTier};
use crate::{Error, Result};

const MANIFEST_FILE: &str = "AndroidManifest.xml";

/// Inputs for [`EnvironmentContext::build`].
#[derive(Debug, Clone)]
pub struct EnvironmentOptions {
    pub app_dir: PathBuf,
    /// Directories whose entries are libraries (default: `<app>/libs`)
    pub library_dirs: Vec<PathBuf>,
    /// Local resource dirs (default: `<app>/res` when it exists)
    pub local_resource_dirs: Vec<PathBuf>,
    pub module_resource_dirs: Vec<PathBuf>,
    pub module_asset_dirs: Vec<PathBuf>,
    pub sdk_home: PathBuf,
    pub compile_sdk_version: u32,
    /// Override for `<sdk>/platforms/android-<version>`
    pub platform_dir: Option<PathBuf>,
}

impl EnvironmentOptions {
    pub fn new(app_dir: impl Into<PathBuf>, sdk_home: impl Into<PathBuf>) -> Self {
        let app_dir = app_dir.into();
        Self {
            library_dirs: vec![app_dir.join("libs")],
            app_dir,
            local_resource_dirs: Vec::new(),
            module_resource_dirs: Vec::new(),
            module_asset_dirs: Vec::new(),
            sdk_home: sdk_home.into(),
            compile_sdk_version: 31,
            platform_dir: None,
        }
    }
}

/// A library discovered under one of the library dirs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LibraryEntry {
    pub dir: PathBuf,
    pub package: String,
}

/// Asset lookup over the app asset root followed by module and library dirs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssetResolver {
    pub asset_root: PathBuf,
    pub asset_dirs: Vec<PathBuf>,
}

impl AssetResolver {
    /// First existing file for `relative`, searching the root first.
    pub fn open(&self, relative: &str) -> Option<PathBuf> {
        std::iter::once(&self.asset_root)
            .chain(self.asset_dirs.iter())
            .map(|dir| dir.join(relative))
            .find(|p| p.is_file())
    }

    /// Every search directory that exists, in lookup order.
    pub fn existing_dirs(&self) -> Vec<PathBuf> {
        std::iter::once(&self.asset_root)
            .chain(self.asset_dirs.iter())
            .filter(|d| d.is_dir())
            .cloned()
            .collect()
    }
}

/// Static engine configuration, handed to the engine once at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineProperties {
    pub system_properties: BTreeMap<String, String>,
    pub font_dir: PathBuf,
    pub native_lib_dir: PathBuf,
    pub icu_data: PathBuf,
    pub keyboard_maps: Vec<PathBuf>,
    pub attrs: PathBuf,
    pub platform_sdk_version: u32,
}

/// Resolved inputs for one run. Built once, shared by every engine handle
/// created from it.
///
/// Equality and hashing only consider the canonical input paths and versions,
/// so callers can decide whether an existing engine handle can be reused.
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentContext {
    pub app_dir: PathBuf,
    pub library_dirs: Vec<PathBuf>,
    pub libraries: Vec<LibraryEntry>,
    pub resource_package_names: Vec<String>,
    pub local_resource_dirs: Vec<PathBuf>,
    pub module_resource_dirs: Vec<PathBuf>,
    pub library_resource_dirs: Vec<PathBuf>,
    pub module_asset_dirs: Vec<PathBuf>,
    pub library_asset_dirs: Vec<PathBuf>,
    pub sdk_home: PathBuf,
    pub compile_sdk_version: u32,
    pub platform_dir: PathBuf,
    pub res_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub platform_data_res_dir: PathBuf,
    #[serde(skip)]
    graph: Arc<ResourceConfigurationGraph>,
}

impl EnvironmentContext {
    /// Resolve inputs, scan libraries and load the resource graph.
    ///
    /// Fails with [`Error::MissingPlatformArtifact`] when the platform
    /// directory or its data directory is absent.
    pub fn build(options: EnvironmentOptions) -> Result<Self> {
        let app_dir = canonical_path(&options.app_dir)?;
        let sdk_home = canonical_path(&options.sdk_home)?;
        let version = options.compile_sdk_version;
        let platform_dir = match &options.platform_dir {
            Some(dir) => canonical_path(dir)?,
            None => sdk_home.join("platforms").join(format!("android-{}", version)),
        };
        if !platform_dir.is_dir() {
            return Err(Error::MissingPlatformArtifact {
                path: platform_dir,
                hint: format!(
                    "Missing platform version {v}. Install with sdkmanager --install \"platforms;android-{v}\"",
                    v = version
                ),
            });
        }
        let platform_data_res_dir = platform_dir.join("data").join("res");
        if !platform_data_res_dir.is_dir() {
            return Err(Error::MissingPlatformArtifact {
                path: platform_data_res_dir,
                hint: format!("Platform android-{} has no data/res directory; reinstall it", version),
            });
        }

        let library_dirs = canonical_paths(&options.library_dirs)?;
        let library_paths = scan_libraries(&library_dirs);
        let mut libraries = Vec::with_capacity(library_paths.len());
        for dir in library_paths {
            let package = match read_manifest_package(&dir.join(MANIFEST_FILE))? {
                Some(p) => p,
                None => {
                    let fallback = dir_name(&dir);
                    warn!("Manifest in {} has no package attribute; using '{}'", dir.display(), fallback);
                    fallback
                }
            };
            libraries.push(LibraryEntry { dir, package });
        }
        let resource_package_names = libraries.iter().map(|l| l.package.clone()).collect();
        let library_resource_dirs = existing_children(&libraries, "res");
        let library_asset_dirs = existing_children(&libraries, "assets");

        let res_dir = app_dir.join("res");
        let assets_dir = app_dir.join("assets");
        let local_resource_dirs = if options.local_resource_dirs.is_empty() {
            if res_dir.is_dir() {
                vec![res_dir.clone()]
            } else {
                Vec::new()
            }
        } else {
            canonical_paths(&options.local_resource_dirs)?
        };
        let module_resource_dirs = canonical_paths(&options.module_resource_dirs)?;
        let module_asset_dirs = canonical_paths(&options.module_asset_dirs)?;

        let mut graph = ResourceConfigurationGraph::new();
        graph.add(
            ResourceTier::Framework,
            ResourceRepository::load("android", &platform_data_res_dir)?,
        );
        for lib in &libraries {
            let res = lib.dir.join("res");
            if res.is_dir() {
                graph.add(ResourceTier::Library, ResourceRepository::load(lib.package.clone(), &res)?);
            }
        }
        for (tier, dirs) in [
            (ResourceTier::Module, &module_resource_dirs),
            (ResourceTier::Local, &local_resource_dirs),
        ] {
            for dir in dirs {
                if dir.is_dir() {
                    graph.add(tier, ResourceRepository::load(dir_name(dir), dir)?);
                } else {
                    warn!("Skipping missing resource dir {}", dir.display());
                }
            }
        }

        let env = Self {
            app_dir,
            library_dirs,
            libraries,
            resource_package_names,
            local_resource_dirs,
            module_resource_dirs,
            library_resource_dirs,
            module_asset_dirs,
            library_asset_dirs,
            sdk_home,
            compile_sdk_version: version,
            platform_dir,
            res_dir,
            assets_dir,
            platform_data_res_dir,
            graph: Arc::new(graph),
        };
        info!(
            "Environment ready: app={} libraries={} platform=android-{}",
            env.app_dir.display(),
            env.libraries.len(),
            version
        );
        Ok(env)
    }

    pub fn resource_graph(&self) -> Arc<ResourceConfigurationGraph> {
        self.graph.clone()
    }

    pub fn asset_resolver(&self) -> AssetResolver {
        AssetResolver {
            asset_root: self.assets_dir.clone(),
            asset_dirs: self
                .module_asset_dirs
                .iter()
                .chain(self.library_asset_dirs.iter())
                .cloned()
                .collect(),
        }
    }

    /// Static configuration for [`crate::engine::RenderEngine::init`].
    pub fn engine_properties(&self) -> Result<EngineProperties> {
        let data_dir = self.platform_dir.join("data");
        let build_prop = self.platform_dir.join("build.prop");
        let mut system_properties = if build_prop.is_file() {
            load_properties(&fs::read_to_string(&build_prop)?)
        } else {
            warn!("No build.prop in {}; engine starts without platform properties", self.platform_dir.display());
            BTreeMap::new()
        };
        system_properties.insert("debug.choreographer.frametime".to_string(), "false".to_string());

        Ok(EngineProperties {
            system_properties,
            font_dir: data_dir.join("fonts"),
            native_lib_dir: data_dir.join(native_lib_label()),
            icu_data: data_dir.join("icu").join("icudt70l.dat"),
            keyboard_maps: vec![data_dir.join("keyboards").join("Generic.kcm")],
            attrs: self.platform_data_res_dir.join("values").join("attrs.xml"),
            platform_sdk_version: self.compile_sdk_version,
        })
    }

    /// Hex SHA-256 over every identity input; equal environments share it.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for field in self.identity() {
            hasher.update(field.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }

    /// JSON view of the resolved inputs plus the fingerprint.
    pub fn summary(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let serde_json::Value::Object(map) = &mut value {
            map.insert("fingerprint".to_string(), self.fingerprint().into());
        }
        value
    }

    fn identity(&self) -> Vec<String> {
        fn paths(label: &str, list: &[PathBuf]) -> String {
            let joined: Vec<String> = list.iter().map(|p| p.display().to_string()).collect();
            format!("{}={}", label, joined.join("\u{1f}"))
        }
        vec![
            format!("app={}", self.app_dir.display()),
            paths("libs", &self.library_dirs),
            format!("packages={}", self.resource_package_names.join(",")),
            paths("local", &self.local_resource_dirs),
            paths("module", &self.module_resource_dirs),
            paths("library", &self.library_resource_dirs),
            paths("module_assets", &self.module_asset_dirs),
            paths("library_assets", &self.library_asset_dirs),
            format!("sdk={}", self.sdk_home.display()),
            format!("version={}", self.compile_sdk_version),
            format!("platform={}", self.platform_dir.display()),
            format!("res={}", self.res_dir.display()),
            format!("assets={}", self.assets_dir.display()),
        ]
    }
}

impl PartialEq for EnvironmentContext {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for EnvironmentContext {}

impl Hash for EnvironmentContext {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

/// Library entries (dirs holding a manifest) across all library dirs, sorted
/// by path so derived names and hashes never depend on enumeration order.
fn scan_libraries(library_dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = library_dirs
        .iter()
        .filter_map(|dir| match fs::read_dir(dir) {
            Ok(rd) => Some(rd),
            Err(e) => {
                debug!("No libraries under {}: {}", dir.display(), e);
                None
            }
        })
        .flatten()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.join(MANIFEST_FILE).is_file())
        .collect();
    entries.sort();
    entries.dedup();
    entries
}

fn existing_children(libraries: &[LibraryEntry], child: &str) -> Vec<PathBuf> {
    libraries
        .iter()
        .map(|l| l.dir.join(child))
        .filter(|p| p.is_dir())
        .collect()
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Absolute form of `path`: symlinks resolved when it exists, otherwise
/// made absolute and lexically normalized.
pub fn canonical_path(path: &Path) -> Result<PathBuf> {
    if let Ok(p) = fs::canonicalize(path) {
        return Ok(p);
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    Ok(out)
}

fn canonical_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    paths.iter().map(|p| canonical_path(p)).collect()
}

/// Parse `key=value` lines, ignoring blanks and `#` comments.
fn load_properties(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

/// Per-OS directory holding the engine's native libraries.
fn native_lib_label() -> &'static str {
    if cfg!(target_os = "windows") {
        "win/lib64"
    } else if cfg!(target_os = "macos") {
        if cfg!(target_arch = "x86_64") {
            "mac/lib64"
        } else {
            "mac-arm/lib64"
        }
    } else {
        "linux/lib64"
    }
}
