use anyhow::Result;

use newsfeed_core::AppConfig;

pub fn run(config: &AppConfig, init: bool) -> Result<()> {
    let path = AppConfig::config_path();

    if init {
        if path.exists() {
            println!("Config already exists: {}", path.display());
        } else {
            config.save()?;
            println!("Wrote default config to {}", path.display());
        }
        return Ok(());
    }

    let mut shown = config.clone();
    if shown.api.api_key.is_some() {
        shown.api.api_key = Some("***".to_string());
    }

    println!("# {}", path.display());
    println!("{}", shown.to_toml()?);
    Ok(())
}
