//! Configuration discovery, layering, and parsing.
//!
//! Configuration is resolved from layers, later layers winning:
//! 1. Built-in defaults ([`Configuration::default`])
//! 2. User-level config from `ProjectDirs::config_dir()/config.{yaml,yml,json}`
//! 3. The project file: an explicit path, or `canon.{yaml,yml,json}` in the
//!    project root
//!
//! Layers are merged as JSON values: objects merge key by key, anything else
//! replaces the lower layer's value.

use std::ffi::OsStr;
use std::fs::read_to_string;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use color_eyre::{
    SectionExt,
    eyre::{Context, Result, bail},
};
use directories::ProjectDirs;
use serde_json::Value;
use tap::Tap;

pub use schema::*;

mod schema;

/// File names probed in the project root, in order.
const PROJECT_FILES: [&str; 3] = ["canon.yaml", "canon.yml", "canon.json"];

/// File names probed in the user config directory, in order.
const USER_FILES: [&str; 3] = ["config.yaml", "config.yml", "config.json"];

/// Get the project directories for the application.
#[tracing::instrument]
pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "canon", "canon")
}

/// Resolves the layered [`Configuration`] and keeps the current value.
#[derive(Debug, Clone)]
pub struct ConfigurationResolver {
    project_root: PathBuf,
    explicit: Option<PathBuf>,
    user_layer: bool,
    current: Configuration,
}

impl ConfigurationResolver {
    /// Resolve configuration for a project root.
    #[tracing::instrument]
    pub fn new(project_root: &Path) -> Result<Self> {
        Self {
            project_root: project_root.to_path_buf(),
            explicit: None,
            user_layer: true,
            current: Configuration::default(),
        }
        .resolved()
    }

    /// Resolve configuration from an explicit project config file.
    #[tracing::instrument]
    pub fn from_file(path: &Path) -> Result<Self> {
        let project_root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            project_root,
            explicit: Some(path.to_path_buf()),
            user_layer: true,
            current: Configuration::default(),
        }
        .resolved()
    }

    /// Skip the user-level layer; useful for hermetic runs.
    pub fn without_user_layer(mut self) -> Result<Self> {
        self.user_layer = false;
        self.resolved()
    }

    fn resolved(mut self) -> Result<Self> {
        self.reload()?;
        Ok(self)
    }

    /// The most recently resolved configuration.
    pub fn get_configuration(&self) -> &Configuration {
        &self.current
    }

    /// Re-read every layer and replace the current configuration.
    #[tracing::instrument(skip(self))]
    pub fn reload(&mut self) -> Result<&Configuration> {
        let mut merged = serde_json::to_value(Configuration::default())
            .context("serialize default configuration")?;

        if self.user_layer {
            if let Some(dirs) = project_dirs() {
                let dir = dirs.config_dir();
                if let Some(layer) = load_first(dir, &USER_FILES)
                    .with_context(|| format!("load user configuration from {dir:?}"))?
                {
                    merge(&mut merged, layer);
                }
            }
        }

        let project = match &self.explicit {
            Some(path) => match load_layer(path)? {
                Some(layer) => Some(layer),
                None => bail!("configuration file not found: {path:?}"),
            },
            None => load_first(&self.project_root, &PROJECT_FILES)
                .with_context(|| format!("load project configuration from {:?}", self.project_root))?,
        };
        if let Some(layer) = project {
            merge(&mut merged, layer);
        }

        self.current = serde_json::from_value::<Configuration>(merged)
            .context("parse merged configuration")?
            .tap(|config| tracing::debug!(?config, "resolved configuration"));
        Ok(&self.current)
    }
}

/// Load the first existing file among `names` in `dir`.
fn load_first(dir: &Path, names: &[&str]) -> Result<Option<Value>> {
    for name in names {
        if let Some(layer) = load_layer(&dir.join(name))? {
            return Ok(Some(layer));
        }
    }
    Ok(None)
}

/// Load one configuration file as a JSON value; `None` if it does not exist.
#[tracing::instrument]
pub fn load_layer(path: &Path) -> Result<Option<Value>> {
    let content = match read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).context(format!("read config file: {path:?}")),
    };

    let value = if path.extension() == Some(OsStr::new("json")) {
        serde_json::from_str::<Value>(&content)
            .with_context(|| format!("parse config file: {path:?}"))
            .with_context(|| content.clone().header("File content:"))?
    } else {
        serde_yaml::from_str::<Value>(&content)
            .with_context(|| format!("parse config file: {path:?}"))
            .with_context(|| content.clone().header("File content:"))?
    };

    // An empty YAML document parses as null; treat it as an empty layer.
    Ok(Some(match value {
        Value::Null => Value::Object(Default::default()),
        other => other,
    }))
}

/// Deep-merge `layer` into `base`.
pub fn merge(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, layer) => *base = layer,
    }
}
