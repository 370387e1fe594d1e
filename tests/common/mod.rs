#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rflayout::{EnvironmentContext, EnvironmentOptions};
use tempfile::TempDir;

/// A throwaway SDK + app tree:
///
/// ```text
/// sdk/platforms/android-31/{build.prop, data/res/values/values.xml}
/// app/res/values/strings.xml
/// app/libs/{alpha,beta}/AndroidManifest.xml + res/values/strings.xml
/// ```
pub struct Fixture {
    pub root: TempDir,
}

pub const FRAMEWORK_VALUES: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<resources>
    <string name="app_name">Framework</string>
    <string name="ok">OK</string>
    <color name="white">#FFFFFF</color>
    <style name="Theme.Material.Light" parent="Theme.Material"/>
</resources>
"#;

impl Fixture {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let fx = Self { root };

        let platform = fx.platform_dir();
        write(&platform.join("build.prop"), "# platform\nro.build.version.sdk=31\n");
        write(&platform.join("data/res/values/values.xml"), FRAMEWORK_VALUES);

        fx.write_app(
            "res/values/strings.xml",
            r#"<resources>
    <string name="app_name">Local</string>
    <string name="greeting">@string/app_name</string>
    <color name="background">#102030</color>
    <style name="Theme.AppCompat.Light.NoActionBar" parent="Theme.AppCompat.Light"/>
</resources>"#,
        );
        fx.write_app(
            "res/values-night/strings.xml",
            r#"<resources><string name="mode">night</string></resources>"#,
        );
        fx.write_app(
            "res/values-ar/strings.xml",
            r#"<resources><string name="app_name">محلي</string></resources>"#,
        );
        fx.add_library("beta", Some("com.example.beta"), "Beta");
        fx.add_library("alpha", Some("com.example.alpha"), "Alpha");
        fx
    }

    pub fn sdk_home(&self) -> PathBuf {
        self.root.path().join("sdk")
    }

    pub fn app_dir(&self) -> PathBuf {
        self.root.path().join("app")
    }

    pub fn platform_dir(&self) -> PathBuf {
        self.sdk_home().join("platforms").join("android-31")
    }

    pub fn write_app(&self, relative: &str, contents: &str) {
        write(&self.app_dir().join(relative), contents);
    }

    /// A library under `app/libs/<dir>` declaring `lib_only` and `app_name`.
    pub fn add_library(&self, dir: &str, package: Option<&str>, app_name: &str) {
        let lib = self.app_dir().join("libs").join(dir);
        let manifest = match package {
            Some(p) => format!(r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="{}"/>"#, p),
            None => r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android"/>"#.to_string(),
        };
        write(&lib.join("AndroidManifest.xml"), &manifest);
        write(
            &lib.join("res/values/strings.xml"),
            &format!(
                r#"<resources><string name="app_name">{}</string><string name="lib_only">{}</string></resources>"#,
                app_name, dir
            ),
        );
    }

    pub fn options(&self) -> EnvironmentOptions {
        EnvironmentOptions::new(self.app_dir(), self.sdk_home())
    }

    pub fn environment(&self) -> EnvironmentContext {
        EnvironmentContext::build(self.options()).expect("environment")
    }
}

pub fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create dirs");
    }
    fs::write(path, contents).expect("write fixture file");
}
