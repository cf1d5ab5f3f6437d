//! 配置文件命令

use anyhow::{bail, Result};

use crate::config::CliConfig;
use crate::ConfigAction;

pub fn handle(action: ConfigAction) -> Result<()> {
    let path = CliConfig::config_path()?;

    match action {
        ConfigAction::Show => {
            let config = CliConfig::load_from(&path)?;
            println!("# {}", path.display());
            println!("{}", toml::to_string_pretty(&config.redacted())?);
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!("配置文件已存在: {:?}（使用 --force 覆盖）", path);
            }
            CliConfig::template().save_to(&path)?;
            println!("已生成配置文件: {}", path.display());
        }
    }
    Ok(())
}
