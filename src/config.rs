use anyhow::{Context, Result};
use convergence::ResourceSpec;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Default catalog location under the user's config directory.
pub fn default_catalog_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("converge").join("catalog.toml"))
}

/// The declared resource catalog: an ordered collection of resources,
/// converged strictly in declaration order.
#[derive(Debug, Deserialize)]
pub struct Catalog {
    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceSpec>,
}

impl Catalog {
    /// Load the catalog from `path`, or the default location.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let path = match path {
            Some(p) => PathBuf::from(shellexpand::tilde(p).as_ref()),
            None => default_catalog_path()?,
        };
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read catalog {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid catalog format in {}", path.display()))
    }
}
