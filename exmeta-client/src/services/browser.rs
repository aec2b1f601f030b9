//! Hand a URL to the user's default browser

use std::process::Command;
use tracing::info;

/// Opens URLs outside the process
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// Launches the platform URL handler
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        info!("Opening login page in browser");

        #[cfg(target_os = "windows")]
        {
            // `cmd /C start` would treat `&` in the query as a separator
            Command::new("rundll32")
                .args(["url.dll,FileProtocolHandler", url])
                .spawn()?;
        }

        #[cfg(target_os = "macos")]
        {
            Command::new("open").arg(url).spawn()?;
        }

        #[cfg(all(unix, not(target_os = "macos")))]
        {
            Command::new("xdg-open").arg(url).spawn()?;
        }

        Ok(())
    }
}
