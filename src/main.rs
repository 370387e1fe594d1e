use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use log::info;
use serde_json::json;

use rflayout::device::LayoutDirection;
use rflayout::{DeviceProfile, EnvironmentContext, EnvironmentOptions, SessionConfigBuilder};

#[derive(Parser)]
#[command(name = "rflayout", version, about = "Inspect layout rendering environments")]
struct Cli {
    /// Application module directory
    #[arg(long, default_value = ".")]
    app_dir: PathBuf,

    /// SDK root (falls back to ANDROID_HOME)
    #[arg(long, env = "ANDROID_SDK_ROOT")]
    sdk_home: Option<PathBuf>,

    /// Directory holding library modules; repeatable
    #[arg(long = "lib-dir")]
    lib_dirs: Vec<PathBuf>,

    #[arg(long, default_value_t = 31)]
    compile_sdk: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the resolved environment as JSON
    Inspect,
    /// Print the resource table a session would see
    Resources {
        /// Device preset (pixel_5, pixel_3, nexus_5)
        #[arg(long, default_value = "pixel_5")]
        device: String,
        /// Theme name; prefix with `android:` for a platform theme
        #[arg(long)]
        theme: Option<String>,
        #[arg(long)]
        locale: Option<String>,
        /// Lay out right-to-left
        #[arg(long)]
        rtl: bool,
        #[arg(long)]
        night: bool,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let sdk_home = cli
        .sdk_home
        .or_else(|| std::env::var_os("ANDROID_HOME").map(PathBuf::from))
        .ok_or_else(|| anyhow!("no SDK root: pass --sdk-home or set ANDROID_SDK_ROOT / ANDROID_HOME"))?;

    let mut options = EnvironmentOptions::new(&cli.app_dir, sdk_home);
    options.compile_sdk_version = cli.compile_sdk;
    if !cli.lib_dirs.is_empty() {
        options.library_dirs = cli.lib_dirs;
    }
    let env = EnvironmentContext::build(options).context("building environment")?;

    match cli.command {
        Command::Inspect => {
            println!("{}", serde_json::to_string_pretty(&env.summary())?);
        }
        Command::Resources {
            device,
            theme,
            locale,
            rtl,
            night,
        } => {
            let mut profile =
                DeviceProfile::by_name(&device).ok_or_else(|| anyhow!("unknown device preset '{}'", device))?;
            if let Some(locale) = locale {
                profile = profile.with_locale(locale);
            }
            if rtl {
                profile = profile.with_layout_direction(LayoutDirection::Rtl);
            }
            profile = profile.with_night_mode(night);

            let mut builder = SessionConfigBuilder::from(&env).with_device(profile);
            if let Some(theme) = theme {
                builder = builder.with_theme(&theme);
            }
            let config = builder.build()?;
            info!("Resolved {} resources for {}", config.resources.len(), config.device.name);

            let table: serde_json::Map<String, serde_json::Value> = config
                .resources
                .merged()
                .into_iter()
                .map(|(key, value)| (key.to_string(), value.into()))
                .collect();
            let out = json!({
                "device": config.device.name,
                "locale": config.locale,
                "theme": config.theme,
                "uiMode": config.ui_mode,
                "resources": table,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}
