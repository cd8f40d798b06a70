use std::{
    env,
    ffi::OsString,
    fs,
    path::PathBuf,
    time::Duration,
};

use chromiumoxide::browser::BrowserConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;
use which::which_in;

use crate::error::{AdapterError, AdapterErrorKind};

/// Environment variable naming the Chrome/Chromium executable.
pub const CHROME_ENV: &str = "FORMFILL_CHROME";
/// Environment variable toggling headless mode ("0", "false", "no", "off" mean headful).
pub const HEADLESS_ENV: &str = "FORMFILL_HEADLESS";
/// Environment variable overriding the profile directory.
pub const PROFILE_ENV: &str = "FORMFILL_CHROME_PROFILE";

/// Configuration for launching the browser.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CdpConfig {
    /// Empty means "let chromiumoxide find one".
    pub executable: PathBuf,
    pub user_data_dir: PathBuf,
    pub headless: bool,
    /// Upper bound for one CDP request, navigation included.
    pub default_deadline_ms: u64,
    pub no_sandbox: bool,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            executable: detect_chrome_executable().unwrap_or_default(),
            user_data_dir: PathBuf::from("./.formfill-profile"),
            headless: true,
            default_deadline_ms: 30_000,
            no_sandbox: false,
        }
    }
}

impl CdpConfig {
    /// Apply `FORMFILL_CHROME`, `FORMFILL_HEADLESS` and `FORMFILL_CHROME_PROFILE`.
    pub fn apply_env(&mut self) {
        if let Some(path) = non_empty_env(CHROME_ENV) {
            self.executable = PathBuf::from(path);
        }
        if let Some(value) = non_empty_env(HEADLESS_ENV) {
            self.headless = parse_headless(&value);
        }
        if let Some(path) = non_empty_env(PROFILE_ENV) {
            self.user_data_dir = PathBuf::from(path);
        }
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.default_deadline_ms.max(1))
    }

    /// Build the chromiumoxide launch configuration, creating the profile dir.
    pub fn browser_config(&self) -> Result<BrowserConfig, AdapterError> {
        if !self.executable.as_os_str().is_empty() && !self.executable.exists() {
            return Err(AdapterError::new(AdapterErrorKind::LaunchFailed).with_hint(format!(
                "chrome executable not found at {}; set {} to the full path of chrome/chromium",
                self.executable.display(),
                CHROME_ENV
            )));
        }

        let profile_dir = if self.user_data_dir.is_absolute() {
            self.user_data_dir.clone()
        } else {
            let cwd = env::current_dir().map_err(|err| {
                AdapterError::new(AdapterErrorKind::Internal)
                    .with_hint(format!("failed to resolve cwd for user-data-dir: {err}"))
            })?;
            cwd.join(&self.user_data_dir)
        };
        fs::create_dir_all(&profile_dir).map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("failed to ensure user-data-dir: {err}"))
        })?;

        let mut builder = BrowserConfig::builder()
            .request_timeout(self.deadline())
            .launch_timeout(Duration::from_secs(20));
        if !self.headless {
            builder = builder.with_head();
        }
        if self.no_sandbox {
            builder = builder.no_sandbox();
        }

        let mut args = vec![
            "--disable-background-networking",
            "--disable-default-apps",
            "--disable-dev-shm-usage",
            "--disable-extensions",
            "--disable-popup-blocking",
            "--disable-sync",
            "--no-first-run",
            "--no-default-browser-check",
            "--password-store=basic",
            "--use-mock-keychain",
        ];
        if self.headless {
            args.push("--headless=new");
            args.push("--mute-audio");
        }
        builder = builder.args(args);

        if !self.executable.as_os_str().is_empty() {
            builder = builder.chrome_executable(self.executable.clone());
        }
        builder = builder.user_data_dir(profile_dir);

        builder.build().map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("browser config error: {err}"))
        })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn parse_headless(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

/// Locate Chrome/Chromium: `FORMFILL_CHROME`, then `PATH`, then well-known install paths.
pub fn detect_chrome_executable() -> Option<PathBuf> {
    find_chrome(
        non_empty_env(CHROME_ENV).as_deref(),
        env::var_os("PATH"),
        &os_specific_chrome_paths(),
    )
}

fn find_chrome(
    explicit: Option<&str>,
    search_path: Option<OsString>,
    fallbacks: &[PathBuf],
) -> Option<PathBuf> {
    if let Some(raw) = explicit {
        let candidate = PathBuf::from(raw);
        if candidate.exists() {
            return Some(candidate);
        }
        debug!(path = raw, "configured chrome executable does not exist");
    }

    if let Some(paths) = search_path {
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        for name in chrome_executable_names() {
            if let Ok(path) = which_in(name, Some(&paths), &cwd) {
                return Some(path);
            }
        }
    }

    fallbacks
        .iter()
        .find(|candidate| candidate.exists())
        .cloned()
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let mut paths = Vec::new();
        for key in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
            if let Some(root) = non_empty_env(key) {
                let root = PathBuf::from(root);
                paths.push(root.join("Google/Chrome/Application/chrome.exe"));
                paths.push(root.join("Chromium/Application/chrome.exe"));
            }
        }
        paths
    }

    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }
}
