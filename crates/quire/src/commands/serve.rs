//! Preview server command.

use std::path::PathBuf;

use anyhow::Result;
use quire_server::{DevServer, DevServerConfig, ReloadHub};

/// Run the serve command.
pub async fn run(port: u16, dir: PathBuf) -> Result<()> {
    if !dir.exists() {
        anyhow::bail!(
            "Directory not found: {}. Run 'quire build' first.",
            dir.display()
        );
    }

    let config = DevServerConfig {
        root: dir,
        port,
        open: true,
        reload: false,
        ..Default::default()
    };

    DevServer::new(config, ReloadHub::new()).start().await?;

    Ok(())
}
