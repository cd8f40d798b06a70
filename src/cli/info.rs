use anyhow::Result;
use cdp_adapter::detect_chrome_executable;
use formfill_cli::LoadedConfig;

pub async fn cmd_info(loaded: &LoadedConfig) -> Result<()> {
    println!("FormFill v{}", env!("CARGO_PKG_VERSION"));
    println!("Build Date: {}", env!("FORMFILL_BUILD_DATE"));
    println!("Git Commit: {}", env!("FORMFILL_GIT_HASH"));
    println!();
    println!("Configuration: {}", loaded.path.display());
    let browser = &loaded.config.browser;
    let executable = if browser.executable.as_os_str().is_empty() {
        detect_chrome_executable()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "not found".to_string())
    } else {
        browser.executable.display().to_string()
    };
    println!("Chrome executable: {}", executable);
    println!("Headless: {}", browser.headless);
    println!("Profile directory: {}", browser.user_data_dir.display());
    Ok(())
}
