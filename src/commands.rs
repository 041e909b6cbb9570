use std::io::Write;

use anyhow::{bail, Context, Result};

use crate::{
    config::AppConfig,
    models::{group_by_category, non_blank, tree_rows, Link},
    store::LinkStore,
};

pub async fn add(
    store: &LinkStore,
    out: &mut impl Write,
    alias: &str,
    url: &str,
    description: Option<&str>,
    category: Option<&str>,
) -> Result<()> {
    let link = Link::new(alias, url, description, category);
    store.create(link).await?;
    writeln!(out, "Created go link: {alias} -> {url}")?;
    Ok(())
}

pub async fn list(store: &LinkStore, out: &mut impl Write) -> Result<()> {
    let links = store.list().await;
    if links.is_empty() {
        writeln!(out, "No links found.")?;
        return Ok(());
    }

    writeln!(out, "Go Links:")?;
    writeln!(out, "=========")?;
    for row in tree_rows(&group_by_category(links)) {
        match (&row.url, &row.description) {
            (Some(url), Some(description)) => {
                writeln!(out, "{}{} -> {} ({})", row.prefix, row.text, url, description)?
            }
            (Some(url), None) => writeln!(out, "{}{} -> {}", row.prefix, row.text, url)?,
            (None, _) => writeln!(out, "{}{}", row.prefix, row.text)?,
        }
    }
    Ok(())
}

/// Open `alias` in the browser, either through the go/ host or directly.
pub async fn open(store: &LinkStore, out: &mut impl Write, alias: &str, direct: bool) -> Result<()> {
    let link = store.get(alias).await?;
    let url = open_target(&link, direct);
    writeln!(out, "Opening {alias} ({url}) in browser")?;
    open_in_browser(&url)
}

fn open_target(link: &Link, direct: bool) -> String {
    if direct {
        link.url.clone()
    } else {
        format!("http://go/{}", link.alias)
    }
}

fn open_in_browser(url: &str) -> Result<()> {
    let mut command = if cfg!(target_os = "macos") {
        std::process::Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut command = std::process::Command::new("cmd");
        command.args(["/c", "start"]);
        command
    } else if cfg!(unix) {
        std::process::Command::new("xdg-open")
    } else {
        bail!("Unsupported operating system: {}", std::env::consts::OS);
    };

    let status = command
        .arg(url)
        .status()
        .context("Error opening URL")?;
    if !status.success() {
        bail!("Error opening URL: browser launcher exited with {status}");
    }
    Ok(())
}

/// Update fields of an existing link. `Some("")` clears description or
/// category. Timestamps are left as they are.
pub async fn edit(
    store: &LinkStore,
    out: &mut impl Write,
    alias: &str,
    url: Option<&str>,
    description: Option<&str>,
    category: Option<&str>,
) -> Result<()> {
    let mut link = store.get(alias).await?;
    if url.is_none() && description.is_none() && category.is_none() {
        bail!("Nothing to change; pass --url, --description or --category");
    }

    if let Some(url) = url {
        link.url = url.to_owned();
    }
    if description.is_some() {
        link.description = non_blank(description);
    }
    if category.is_some() {
        link.category = non_blank(category);
    }

    let url = link.url.clone();
    store.update(link).await?;
    writeln!(out, "Updated go link: {alias} -> {url}")?;
    Ok(())
}

pub async fn delete(store: &LinkStore, out: &mut impl Write, alias: &str) -> Result<()> {
    store.delete(alias).await?;
    writeln!(out, "Deleted go link: {alias}")?;
    Ok(())
}

/// Write an empty links file if none exists yet, so the server watches
/// and reports a file that can be opened in an editor.
pub async fn ensure_links_file(store: &LinkStore) -> Result<()> {
    let path = store.path();
    let exists = tokio::fs::try_exists(path)
        .await
        .with_context(|| format!("Error checking {}", path.display()))?;
    if !exists {
        store.save().await?;
        tracing::info!("Created empty links file {}", path.display());
    }
    Ok(())
}

pub fn set_storage_dir(
    config: &AppConfig,
    out: &mut impl Write,
    path: &std::path::Path,
) -> Result<()> {
    let dir = config.set_storage_dir(path)?;
    writeln!(out, "Storage directory set to: {}", dir.display())?;
    writeln!(out, "Restart the application for changes to take effect.")?;
    Ok(())
}

pub fn view_config(config: &AppConfig, out: &mut impl Write) -> Result<()> {
    writeln!(out, "Config directory: {}", config.config_dir.display())?;
    writeln!(out, "Storage directory: {}", config.storage_dir.display())?;
    match &config.config_file {
        Some(path) => writeln!(out, "Config file: {}", path.display())?,
        None => writeln!(out, "Config file: not found (using defaults)")?,
    }

    writeln!(out, "\nAll settings:")?;
    writeln!(out, "  storage_dir: {}", config.storage_dir.display())?;
    writeln!(out, "  host: {}", config.host)?;
    writeln!(out, "  port: {}", config.port)?;
    writeln!(
        out,
        "  not_found_url: {}",
        config.not_found_url.as_deref().unwrap_or("(none)")
    )?;
    writeln!(out, "  settle_delay_ms: {}", config.settle_delay.as_millis())?;
    Ok(())
}
