//! Configuration management commands.

use fixstore_core::Config;

use crate::{AppContext, ConfigAction};

pub fn handle(ctx: &AppContext, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            print!("{}", ctx.config.to_toml()?);
        }
        ConfigAction::Path => {
            let user = Config::config_dir().join("config.toml");
            println!("User config:    {}", describe(&user));
            let project = std::path::Path::new("fixstore.toml");
            println!("Project config: {}", describe(project));
            println!("Environment:    FIXSTORE_<SECTION>__<KEY>");
        }
    }
    Ok(())
}

fn describe(path: &std::path::Path) -> String {
    if path.exists() {
        format!("{}", path.display())
    } else {
        format!("{} (not found)", path.display())
    }
}
