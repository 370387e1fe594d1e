/// Device profiles used to configure a render session

use serde::Serialize;

use crate::resources::QualifierSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutDirection {
    Ltr,
    Rtl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UiModeType {
    Normal,
    Desk,
    Car,
    Television,
    Watch,
}

/// UI mode of the emulated device, encoded for the engine as a bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UiMode {
    pub kind: UiModeType,
    pub night: bool,
}

impl UiMode {
    const TYPE_NORMAL: u32 = 0x01;
    const TYPE_DESK: u32 = 0x02;
    const TYPE_CAR: u32 = 0x03;
    const TYPE_TELEVISION: u32 = 0x04;
    const TYPE_WATCH: u32 = 0x06;
    const NIGHT_NO: u32 = 0x10;
    const NIGHT_YES: u32 = 0x20;

    pub fn mask(&self) -> u32 {
        let kind = match self.kind {
            UiModeType::Normal => Self::TYPE_NORMAL,
            UiModeType::Desk => Self::TYPE_DESK,
            UiModeType::Car => Self::TYPE_CAR,
            UiModeType::Television => Self::TYPE_TELEVISION,
            UiModeType::Watch => Self::TYPE_WATCH,
        };
        let night = if self.night { Self::NIGHT_YES } else { Self::NIGHT_NO };
        kind | night
    }
}

impl Default for UiMode {
    fn default() -> Self {
        Self {
            kind: UiModeType::Normal,
            night: false,
        }
    }
}

/// Immutable description of the emulated screen and locale.
///
/// Width and height are in pixels, `density` in dots per inch. Modifiers
/// return a new profile and never mutate the receiver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceProfile {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub density: u32,
    pub font_scale: f32,
    pub ui_mode: UiMode,
    /// BCP 47 style tag such as `en-US`
    pub locale: String,
    pub layout_direction: LayoutDirection,
}

impl DeviceProfile {
    pub fn pixel_5() -> Self {
        Self::preset("pixel_5", 1080, 2340, 440)
    }

    pub fn pixel_3() -> Self {
        Self::preset("pixel_3", 1080, 2160, 440)
    }

    pub fn nexus_5() -> Self {
        Self::preset("nexus_5", 1080, 1920, 480)
    }

    /// Look up a preset by its name (`pixel_5`, `pixel_3`, `nexus_5`).
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "pixel_5" => Some(Self::pixel_5()),
            "pixel_3" => Some(Self::pixel_3()),
            "nexus_5" => Some(Self::nexus_5()),
            _ => None,
        }
    }

    fn preset(name: &str, width: u32, height: u32, density: u32) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            density,
            font_scale: 1.0,
            ui_mode: UiMode::default(),
            locale: "en-US".to_string(),
            layout_direction: LayoutDirection::Ltr,
        }
    }

    pub fn with_size(&self, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..self.clone()
        }
    }

    pub fn with_locale(&self, locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            ..self.clone()
        }
    }

    pub fn with_layout_direction(&self, layout_direction: LayoutDirection) -> Self {
        Self {
            layout_direction,
            ..self.clone()
        }
    }

    pub fn with_night_mode(&self, night: bool) -> Self {
        Self {
            ui_mode: UiMode { night, ..self.ui_mode },
            ..self.clone()
        }
    }

    pub fn with_font_scale(&self, font_scale: f32) -> Self {
        Self {
            font_scale,
            ..self.clone()
        }
    }

    pub fn orientation(&self) -> Orientation {
        if self.width > self.height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }

    /// Name of the generalized density bucket resources are selected from.
    pub fn density_bucket(&self) -> &'static str {
        match self.density {
            0..=120 => "ldpi",
            121..=160 => "mdpi",
            161..=213 => "tvdpi",
            214..=240 => "hdpi",
            241..=320 => "xhdpi",
            321..=480 => "xxhdpi",
            _ => "xxxhdpi",
        }
    }

    /// Language subtag of the locale (`en` for `en-US`).
    pub fn language(&self) -> &str {
        self.locale
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
    }

    /// Region subtag of the locale, if any (`US` for `en-US`).
    pub fn region(&self) -> Option<&str> {
        self.locale
            .split(['-', '_'])
            .nth(1)
            .filter(|r| r.len() == 2 || r.len() == 3)
    }

    /// Resource qualifiers this device satisfies for the given platform version.
    pub fn qualifiers(&self, sdk_version: u32) -> QualifierSet {
        let mut set = QualifierSet::new(sdk_version);
        let language = self.language();
        if !language.is_empty() {
            set.insert(language.to_ascii_lowercase());
            if let Some(region) = self.region() {
                set.insert(format!("r{}", region.to_ascii_uppercase()));
            }
        }
        set.insert(match self.layout_direction {
            LayoutDirection::Ltr => "ldltr",
            LayoutDirection::Rtl => "ldrtl",
        });
        set.insert(if self.ui_mode.night { "night" } else { "notnight" });
        set.insert(match self.orientation() {
            Orientation::Portrait => "port",
            Orientation::Landscape => "land",
        });
        set.insert(self.density_bucket());
        set
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::pixel_5()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_5_is_portrait_xxhdpi() {
        let d = DeviceProfile::pixel_5();
        assert_eq!(d.orientation(), Orientation::Portrait);
        assert_eq!(d.density_bucket(), "xxhdpi");
        assert_eq!(d.ui_mode.mask(), 0x11);
    }

    #[test]
    fn modifiers_leave_original_untouched() {
        let d = DeviceProfile::pixel_5();
        let rtl = d.with_locale("ar-EG").with_layout_direction(LayoutDirection::Rtl);
        assert_eq!(d.locale, "en-US");
        assert_eq!(rtl.language(), "ar");
        assert_eq!(rtl.region(), Some("EG"));
        assert_eq!(rtl.layout_direction, LayoutDirection::Rtl);
    }

    #[test]
    fn qualifiers_cover_locale_direction_and_night() {
        let q = DeviceProfile::pixel_5().with_night_mode(true).qualifiers(31);
        assert!(q.contains("en"));
        assert!(q.contains("rUS"));
        assert!(q.contains("ldltr"));
        assert!(q.contains("night"));
        assert!(q.contains("port"));
        assert!(!q.contains("notnight"));
        assert_eq!(q.sdk_version(), 31);
    }
}
