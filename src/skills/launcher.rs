//! Launching URLs and desktop applications

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;

use crate::{Error, Result};

/// Side-effecting desktop actions used by the app and web skills
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Open a URL in the default browser
    async fn open_url(&self, url: &str) -> Result<()>;

    /// Start an application by name
    async fn open_app(&self, app: &str) -> Result<()>;

    /// Ask an application to quit
    async fn close_app(&self, app: &str) -> Result<()>;
}

/// Launcher using the platform's own tools
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

fn find(bin: &str) -> Result<PathBuf> {
    which::which(bin).map_err(|e| Error::NotFound(format!("{bin}: {e}")))
}

async fn run(mut command: Command) -> Result<()> {
    let status = command.status().await?;
    if status.success() {
        Ok(())
    } else {
        Err(Error::Skill(format!("command exited with {status}")))
    }
}

fn spawn_detached(mut command: Command) -> Result<()> {
    command
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()?;
    Ok(())
}

#[async_trait]
impl Launcher for SystemLauncher {
    async fn open_url(&self, url: &str) -> Result<()> {
        let command = if cfg!(target_os = "macos") {
            let mut c = Command::new(find("open")?);
            c.arg(url);
            c
        } else if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", "start", "", url]);
            c
        } else {
            let mut c = Command::new(find("xdg-open")?);
            c.arg(url);
            c
        };
        tracing::debug!(url, "opening url");
        spawn_detached(command)
    }

    async fn open_app(&self, app: &str) -> Result<()> {
        if cfg!(target_os = "macos") {
            let mut c = Command::new(find("open")?);
            c.args(["-a", app]);
            return run(c).await;
        }
        if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", "start", "", app]);
            return spawn_detached(c);
        }

        // Desktop apps are usually installed as a lowercase, dash-joined binary
        let bin = process_name(app).ok_or_else(|| Error::Skill(format!("not an application name: {app:?}")))?;
        match find(&bin) {
            Ok(path) => spawn_detached(Command::new(path)),
            Err(_) => {
                let mut c = Command::new(find("gtk-launch")?);
                c.arg(&bin);
                run(c).await
            }
        }
    }

    async fn close_app(&self, app: &str) -> Result<()> {
        if app.trim().is_empty() {
            return Err(Error::Skill("no application to close".to_string()));
        }
        if cfg!(target_os = "macos") {
            let mut c = Command::new(find("osascript")?);
            c.args(["-e", &format!("quit app \"{}\"", app.replace('"', ""))]);
            return run(c).await;
        }
        let name = process_name(app).ok_or_else(|| Error::Skill(format!("not a process name: {app:?}")))?;
        if cfg!(target_os = "windows") {
            let mut c = Command::new("taskkill");
            c.args(["/IM", &format!("{name}.exe")]);
            return run(c).await;
        }

        // Exact, case-insensitive process name; user text never reaches a full command-line match
        let mut c = Command::new(find("pkill")?);
        c.args(["-x", "-i", "--", &literal_pattern(&name)]);
        run(c).await
    }
}

/// Executable name for a spoken application name
///
/// Lowercased with spaces joined by dashes. Anything outside letters,
/// digits and `-_.+` is rejected, as is an empty name.
#[must_use]
pub fn process_name(app: &str) -> Option<String> {
    let name = app.split_whitespace().collect::<Vec<_>>().join("-").to_lowercase();
    let valid = !name.is_empty()
        && name.chars().any(char::is_alphanumeric)
        && name.chars().all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '+'));
    valid.then_some(name)
}

/// Escape the regex metacharacters a process name may contain
fn literal_pattern(name: &str) -> String {
    let mut pattern = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, '.' | '+') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern
}
