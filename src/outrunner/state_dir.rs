//! The bbl state directory and the files other resources read from it.

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Files derived from the state for other pipeline resources.
pub const INTEROP_FILES: [&str; 3] = ["name", "metadata", "bdr-source-file"];

/// The parts of `bbl-state.json` that interop needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BblState {
    #[serde(default)]
    pub jumpbox: Jumpbox,
    #[serde(default, rename = "bosh")]
    pub director: Director,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Jumpbox {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Director {
    #[serde(default, rename = "directorUsername")]
    pub client_username: String,
    #[serde(default, rename = "directorPassword")]
    pub client_secret: String,
    #[serde(default, rename = "directorAddress")]
    pub address: String,
    #[serde(default, rename = "directorSSLCA")]
    pub ca_cert: String,
}

/// Source configuration for a bosh-deployment resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoshDeploymentResourceConfig {
    pub target: String,
    pub client: String,
    pub client_secret: String,
    pub ca_cert: String,
    pub jumpbox_url: String,
    pub jumpbox_ssh_key: String,
    pub jumpbox_username: String,
}

impl BoshDeploymentResourceConfig {
    pub fn new(state: &BblState, jumpbox_ssh_key: String) -> Self {
        Self {
            target: state.director.address.clone(),
            client: state.director.client_username.clone(),
            client_secret: state.director.client_secret.clone(),
            ca_cert: state.director.ca_cert.clone(),
            jumpbox_url: state.jumpbox.url.clone(),
            jumpbox_ssh_key,
            jumpbox_username: "jumpbox".to_string(),
        }
    }
}

/// Operations `out` performs on the state directory.
pub trait BblStateDir: Send + Sync {
    fn path(&self) -> &Path;

    /// `Ok(None)` when no `bbl-state.json` exists.
    fn read(&self) -> Result<Option<BblState>>;

    fn jumpbox_ssh_key(&self) -> Result<String>;

    fn write_interop_files(&self, name: &str, config: &BoshDeploymentResourceConfig) -> Result<()>;

    fn expunge_interop_files(&self) -> Result<()>;

    fn apply_plan_patches(&self, patches: &[PathBuf]) -> Result<()>;
}

/// A state directory on local disk.
#[derive(Debug, Clone)]
pub struct StateDir {
    dir: PathBuf,
}

impl StateDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl BblStateDir for StateDir {
    fn path(&self) -> &Path {
        &self.dir
    }

    fn read(&self) -> Result<Option<BblState>> {
        let state_file = self.dir.join("bbl-state.json");
        let contents = match fs::read(&state_file) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", state_file.display()))
            }
        };
        let state = serde_json::from_slice(&contents)
            .with_context(|| format!("Failed to parse {}", state_file.display()))?;
        Ok(Some(state))
    }

    fn jumpbox_ssh_key(&self) -> Result<String> {
        #[derive(Deserialize)]
        struct VarsStore {
            #[serde(default)]
            jumpbox_ssh: JumpboxSsh,
        }

        #[derive(Default, Deserialize)]
        struct JumpboxSsh {
            #[serde(default)]
            private_key: String,
        }

        let path = self.dir.join("vars").join("jumpbox-vars-store.yml");
        let contents = fs::read_to_string(&path).context("Read jumpbox vars store")?;
        let vars: VarsStore =
            serde_yaml::from_str(&contents).context("Parse jumpbox vars store")?;
        Ok(vars.jumpbox_ssh.private_key)
    }

    fn write_interop_files(&self, name: &str, config: &BoshDeploymentResourceConfig) -> Result<()> {
        fs::write(self.dir.join("name"), name)?;
        let yaml = serde_yaml::to_string(config)?;
        fs::write(self.dir.join("bdr-source-file"), &yaml)?;
        fs::write(self.dir.join("metadata"), &yaml)?;
        Ok(())
    }

    fn expunge_interop_files(&self) -> Result<()> {
        for file in INTEROP_FILES {
            match fs::remove_file(self.dir.join(file)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e).with_context(|| format!("Failed to remove {}", file)),
            }
        }
        Ok(())
    }

    fn apply_plan_patches(&self, patches: &[PathBuf]) -> Result<()> {
        for patch in patches {
            copy_over(patch, &self.dir)
                .with_context(|| format!("Failed to apply plan patch {}", patch.display()))?;
        }
        Ok(())
    }
}

/// Copy `source` over `dest`: a directory merges its contents into `dest`,
/// a single file lands at `dest/<file name>`. Symlinks are skipped.
fn copy_over(source: &Path, dest: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(source)?;
    if meta.file_type().is_symlink() {
        return Ok(());
    }

    fs::create_dir_all(dest)?;
    if meta.is_file() {
        let file_name = source
            .file_name()
            .with_context(|| format!("{} has no file name", source.display()))?;
        fs::copy(source, dest.join(file_name))?;
        return Ok(());
    }

    let walker = WalkBuilder::new(source)
        .standard_filters(false)
        .follow_links(false)
        .build();

    for entry in walker {
        let entry = entry?;
        if entry.depth() == 0 {
            continue;
        }
        let relative = entry.path().strip_prefix(source)?;
        let target = dest.join(relative);

        match entry.file_type() {
            Some(ft) if ft.is_symlink() => continue,
            Some(ft) if ft.is_dir() => fs::create_dir_all(&target)?,
            _ => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                // A stale link at the destination must not redirect the copy
                if fs::symlink_metadata(&target).is_ok_and(|m| m.file_type().is_symlink()) {
                    fs::remove_file(&target)?;
                }
                fs::copy(entry.path(), &target)?;
            }
        }
    }
    Ok(())
}
