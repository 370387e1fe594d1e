//! Per-call session configuration.
//!
//! [`SessionConfigBuilder`] is copy-on-write: every modifier returns a new
//! builder and leaves the receiver untouched. [`SessionConfigBuilder::build`]
//! resolves the device against the resource graph once and produces an
//! immutable [`SessionConfig`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use serde::Serialize;

use crate::device::{DeviceProfile, LayoutDirection};
use crate::environment::{AssetResolver, EnvironmentContext};
use crate::resources::{ResourceConfigurationGraph, ResourceKey, ResourceNamespace, ResourceTable, ResourceType};
use crate::{Error, Result};

/// Theme applied when the caller does not pick one.
pub const DEFAULT_THEME: &str = "Theme.AppCompat.Light.NoActionBar";

/// Prefixes marking a theme name as a platform theme.
pub const PLATFORM_THEME_PREFIXES: [&str; 2] = ["android:", "platform:"];

/// Locale substituted when an RTL layout is requested for a locale the engine
/// does not already treat as RTL.
pub const RTL_FALLBACK_LOCALE: &str = "ur";

/// Skip the engine's implicit render while creating the session.
pub const FLAG_DO_NOT_RENDER_ON_CREATE: &str = "do_not_render_on_create";

const XML_FRAMELAYOUT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<FrameLayout
    xmlns:android="http://schemas.android.com/apk/res/android"
    android:layout_width="match_parent"
    android:layout_height="match_parent"
/>"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderingMode {
    /// Render at the device size
    Normal,
    /// Shrink vertically to the content
    VShrink,
    /// Shrink horizontally to the content
    HShrink,
    /// Shrink both dimensions to the content
    Shrink,
    /// Expand to fit the full content
    FullExpand,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeRef {
    pub namespace: ResourceNamespace,
    pub name: String,
    pub is_project_theme: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl From<bool> for FlagValue {
    fn from(v: bool) -> Self {
        FlagValue::Bool(v)
    }
}

impl From<i64> for FlagValue {
    fn from(v: i64) -> Self {
        FlagValue::Int(v)
    }
}

impl From<&str> for FlagValue {
    fn from(v: &str) -> Self {
        FlagValue::Str(v.to_string())
    }
}

impl From<String> for FlagValue {
    fn from(v: String) -> Self {
        FlagValue::Str(v)
    }
}

/// Layout the engine inflates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutSource {
    Xml(String),
    File(PathBuf),
}

impl Default for LayoutSource {
    fn default() -> Self {
        LayoutSource::Xml(XML_FRAMELAYOUT.to_string())
    }
}

/// Which locales the engine lays out right-to-left.
pub trait LocaleInfo: Send + Sync {
    fn is_rtl(&self, locale: &str) -> bool;
}

/// Language table mirroring the engine's built-in RTL locales.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinRtlLocales;

impl BuiltinRtlLocales {
    const LANGUAGES: [&'static str; 13] = [
        "ar", "ckb", "dv", "fa", "he", "iw", "ji", "ks", "ps", "sd", "ug", "ur", "yi",
    ];
}

impl LocaleInfo for BuiltinRtlLocales {
    fn is_rtl(&self, locale: &str) -> bool {
        let language = locale.split(['-', '_']).next().unwrap_or_default().to_ascii_lowercase();
        Self::LANGUAGES.contains(&language.as_str())
    }
}

/// Fully resolved, engine-ready configuration for one render call.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub device: DeviceProfile,
    pub theme: ThemeRef,
    pub rendering_mode: RenderingMode,
    pub min_sdk_version: u32,
    pub target_sdk_version: u32,
    pub layout: LayoutSource,
    pub flags: BTreeMap<String, FlagValue>,
    pub assets: AssetResolver,
    /// Whether system decoration (status/navigation bars) is drawn
    pub decor: bool,
    pub rtl_support: bool,
    pub resources: ResourceTable,
    /// Locale handed to the engine after RTL substitution
    pub locale: String,
    pub font_scale: f32,
    pub ui_mode: u32,
    pub project_key: Option<String>,
    pub timeout: Duration,
}

impl SessionConfig {
    pub fn flag(&self, key: &str) -> Option<&FlagValue> {
        self.flags.get(key)
    }
}

#[derive(Clone)]
pub struct SessionConfigBuilder {
    graph: Arc<ResourceConfigurationGraph>,
    assets: AssetResolver,
    platform_sdk_version: u32,
    device: DeviceProfile,
    rendering_mode: RenderingMode,
    min_sdk_version: u32,
    target_sdk_version: u32,
    flags: BTreeMap<String, FlagValue>,
    theme: Option<ThemeRef>,
    layout: LayoutSource,
    project_key: Option<String>,
    decor: bool,
    rtl_support: bool,
    timeout: Duration,
    locale_info: Arc<dyn LocaleInfo>,
}

impl fmt::Debug for SessionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfigBuilder")
            .field("device", &self.device.name)
            .field("theme", &self.theme)
            .field("rendering_mode", &self.rendering_mode)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl SessionConfigBuilder {
    /// A builder with no theme selected.
    pub fn new(graph: Arc<ResourceConfigurationGraph>, assets: AssetResolver, platform_sdk_version: u32) -> Self {
        let mut flags = BTreeMap::new();
        flags.insert(FLAG_DO_NOT_RENDER_ON_CREATE.to_string(), FlagValue::Bool(true));
        Self {
            graph,
            assets,
            platform_sdk_version,
            device: DeviceProfile::default(),
            rendering_mode: RenderingMode::Shrink,
            min_sdk_version: 0,
            target_sdk_version: 21,
            flags,
            theme: None,
            layout: LayoutSource::default(),
            project_key: None,
            decor: false,
            rtl_support: true,
            timeout: Duration::from_secs(30),
            locale_info: Arc::new(BuiltinRtlLocales),
        }
    }

    /// A builder over the environment's resources and assets with the default theme.
    pub fn from(environment: &EnvironmentContext) -> Self {
        Self::new(
            environment.resource_graph(),
            environment.asset_resolver(),
            environment.compile_sdk_version,
        )
        .with_theme(DEFAULT_THEME)
    }

    /// Select a theme by name. A platform prefix (`android:`) selects a
    /// platform theme; any other name is a project theme.
    pub fn with_theme(&self, name: &str) -> Self {
        match PLATFORM_THEME_PREFIXES.iter().find_map(|p| name.strip_prefix(p)) {
            Some(stripped) => self.with_theme_ref(ResourceNamespace::Android, stripped, false),
            None => self.with_theme_ref(ResourceNamespace::ResAuto, name, true),
        }
    }

    /// Select a project theme by name, without prefix interpretation.
    pub fn with_project_theme(&self, name: &str) -> Self {
        self.with_theme_ref(ResourceNamespace::ResAuto, name, true)
    }

    pub fn with_theme_ref(&self, namespace: ResourceNamespace, name: &str, is_project_theme: bool) -> Self {
        Self {
            theme: Some(ThemeRef {
                namespace,
                name: name.to_string(),
                is_project_theme,
            }),
            ..self.clone()
        }
    }

    pub fn without_theme(&self) -> Self {
        Self {
            theme: None,
            ..self.clone()
        }
    }

    /// Extend the flag map; a later value for the same key overrides.
    pub fn plus_flag(&self, key: &str, value: impl Into<FlagValue>) -> Self {
        let mut next = self.clone();
        next.flags.insert(key.to_string(), value.into());
        next
    }

    pub fn with_device(&self, device: DeviceProfile) -> Self {
        Self {
            device,
            ..self.clone()
        }
    }

    pub fn with_rendering_mode(&self, rendering_mode: RenderingMode) -> Self {
        Self {
            rendering_mode,
            ..self.clone()
        }
    }

    pub fn with_sdk_bounds(&self, min_sdk_version: u32, target_sdk_version: u32) -> Self {
        Self {
            min_sdk_version,
            target_sdk_version,
            ..self.clone()
        }
    }

    pub fn with_layout(&self, layout: LayoutSource) -> Self {
        Self {
            layout,
            ..self.clone()
        }
    }

    pub fn with_decor(&self, decor: bool) -> Self {
        Self {
            decor,
            ..self.clone()
        }
    }

    pub fn with_rtl_support(&self, rtl_support: bool) -> Self {
        Self {
            rtl_support,
            ..self.clone()
        }
    }

    pub fn with_project_key(&self, key: impl Into<String>) -> Self {
        Self {
            project_key: Some(key.into()),
            ..self.clone()
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    pub fn with_locale_info(&self, locale_info: Arc<dyn LocaleInfo>) -> Self {
        Self {
            locale_info,
            ..self.clone()
        }
    }

    pub fn theme(&self) -> Option<&ThemeRef> {
        self.theme.as_ref()
    }

    pub fn device(&self) -> &DeviceProfile {
        &self.device
    }

    pub fn build(&self) -> Result<SessionConfig> {
        let theme = self
            .theme
            .clone()
            .ok_or_else(|| Error::ConfigurationError("theme is not set".to_string()))?;
        if theme.name.is_empty() {
            return Err(Error::ConfigurationError("theme name is empty".to_string()));
        }
        if self.device.width == 0 || self.device.height == 0 {
            return Err(Error::ConfigurationError(format!(
                "device '{}' has an empty screen ({}x{})",
                self.device.name, self.device.width, self.device.height
            )));
        }
        if self.min_sdk_version > self.target_sdk_version {
            return Err(Error::ConfigurationError(format!(
                "min sdk {} exceeds target sdk {}",
                self.min_sdk_version, self.target_sdk_version
            )));
        }

        let qualifiers = self.device.qualifiers(self.platform_sdk_version);
        let resources = self.graph.configured(&qualifiers);
        let style = ResourceKey::new(ResourceType::Style, theme.name.clone());
        if resources.get(theme.namespace, &style).is_none() {
            debug!("Theme {}:{} not found in resolved resources", theme.namespace, theme.name);
        }

        Ok(SessionConfig {
            device: self.device.clone(),
            locale: session_locale(&self.device, self.locale_info.as_ref()),
            font_scale: self.device.font_scale,
            ui_mode: self.device.ui_mode.mask(),
            theme,
            rendering_mode: self.rendering_mode,
            min_sdk_version: self.min_sdk_version,
            target_sdk_version: self.target_sdk_version,
            layout: self.layout.clone(),
            flags: self.flags.clone(),
            assets: self.assets.clone(),
            decor: self.decor,
            rtl_support: self.rtl_support,
            resources,
            project_key: self.project_key.clone(),
            timeout: self.timeout,
        })
    }
}

/// The engine only mirrors layouts for locales it knows are RTL, so an RTL
/// request with any other locale is forced through [`RTL_FALLBACK_LOCALE`].
fn session_locale(device: &DeviceProfile, locale_info: &dyn LocaleInfo) -> String {
    if device.layout_direction == LayoutDirection::Rtl && !locale_info.is_rtl(&device.locale) {
        RTL_FALLBACK_LOCALE.to_string()
    } else {
        device.locale.clone()
    }
}
