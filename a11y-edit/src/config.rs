//! Editor configuration.
//!
//! Loaded from TOML; every field has a default, so an empty file (or no file
//! at all) gives a working editor for the standard `ui` component library.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::escape;
use crate::marker::AttributeKind;
use crate::session::Capability;

pub const CONFIG_FILE: &str = "a11y-edit.toml";
pub const SOURCE_ROOT_ENV: &str = "A11Y_EDIT_SOURCE_ROOT";
pub const STATE_DIR_ENV: &str = "A11Y_EDIT_STATE_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("could not determine a state directory")]
    NoStateDir,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Root the construction locations are resolved against
    pub source_root: PathBuf,
    pub generation: GenerationConfig,
    pub page_title: PageTitleConfig,
    pub main_role: MainRoleConfig,
    /// Component type (simple name) -> capabilities, for components whose
    /// runtime does not report them
    pub components: BTreeMap<String, BTreeSet<Capability>>,
    pub journal: JournalConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Kinds whose value goes through the translation function
    pub translate: Vec<AttributeKind>,
    pub translation_function: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageTitleConfig {
    /// Full path of the page-title attribute macro
    pub import: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MainRoleConfig {
    /// Containers that can be swapped for the semantic one
    pub generic_types: Vec<String>,
    pub semantic_type: String,
    pub import: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub enabled: bool,
    pub state_dir: Option<PathBuf>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        use Capability::*;

        let catalog: [(&str, &[Capability]); 11] = [
            ("TextField", &[Label, AriaLabel, Element]),
            ("TextArea", &[Label, AriaLabel, Element]),
            ("ComboBox", &[Label, AriaLabel, Element]),
            ("Checkbox", &[Label, AriaLabel, Element]),
            ("DatePicker", &[Label, AriaLabel, Element]),
            ("Button", &[AriaLabel, Element]),
            ("Image", &[ImageAlt, AriaLabel, Element]),
            ("Div", &[AriaLabel, Element]),
            ("Span", &[AriaLabel, Element]),
            ("Iframe", &[AriaLabel, Element]),
            ("Anchor", &[AriaLabel, Element]),
        ];

        Self {
            source_root: PathBuf::from("src"),
            generation: GenerationConfig::default(),
            page_title: PageTitleConfig::default(),
            main_role: MainRoleConfig::default(),
            components: catalog
                .iter()
                .map(|(name, caps)| (name.to_string(), caps.iter().copied().collect()))
                .collect(),
            journal: JournalConfig::default(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            translate: Vec::new(),
            translation_function: "tr".to_string(),
        }
    }
}

impl Default for PageTitleConfig {
    fn default() -> Self {
        Self {
            import: "ui::router::page_title".to_string(),
        }
    }
}

impl Default for MainRoleConfig {
    fn default() -> Self {
        Self {
            generic_types: vec![
                "Div".to_string(),
                "VerticalLayout".to_string(),
                "HorizontalLayout".to_string(),
            ],
            semantic_type: "Main".to_string(),
            import: "ui::html::Main".to_string(),
        }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            state_dir: None,
        }
    }
}

impl GenerationConfig {
    /// Call argument for `value`: the escaped literal, translated if configured.
    pub fn argument(&self, kind: AttributeKind, value: &str) -> String {
        let literal = escape::literal(value);
        if self.translate.contains(&kind) {
            format!("{}({})", self.translation_function, literal)
        } else {
            literal
        }
    }
}

impl PageTitleConfig {
    /// Name the attribute is written with once imported.
    pub fn attribute_name(&self) -> &str {
        self.import.rsplit("::").next().unwrap_or(&self.import)
    }
}

impl EditorConfig {
    /// Load configuration.
    ///
    /// Priority order:
    /// 1. `explicit` path (missing file is an error)
    /// 2. `./a11y-edit.toml` if present
    /// 3. Built-in defaults
    ///
    /// `A11Y_EDIT_SOURCE_ROOT` and `A11Y_EDIT_STATE_DIR` override the file.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let local = Path::new(CONFIG_FILE);
                if local.exists() {
                    Self::from_file(local)?
                } else {
                    Self::default()
                }
            }
        };

        if let Ok(root) = std::env::var(SOURCE_ROOT_ENV) {
            config.source_root = PathBuf::from(root);
        }
        if let Ok(dir) = std::env::var(STATE_DIR_ENV) {
            config.journal.state_dir = Some(PathBuf::from(dir));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.translation_function.trim().is_empty() {
            return Err(ConfigError::Invalid("translation_function is empty".into()));
        }
        if self.page_title.import.trim().is_empty() {
            return Err(ConfigError::Invalid("page_title.import is empty".into()));
        }
        if self.main_role.semantic_type.trim().is_empty() {
            return Err(ConfigError::Invalid("main_role.semantic_type is empty".into()));
        }
        if self.main_role.generic_types.contains(&self.main_role.semantic_type) {
            return Err(ConfigError::Invalid(
                "main_role.semantic_type is listed as a generic type".into(),
            ));
        }
        Ok(())
    }

    /// Catalog capabilities for a component type, matched by simple name.
    pub fn capabilities_of(&self, component_type: &str) -> BTreeSet<Capability> {
        let simple = component_type.rsplit("::").next().unwrap_or(component_type);
        self.components.get(simple).cloned().unwrap_or_default()
    }

    /// Directory for the edit journal.
    ///
    /// Priority order:
    /// 1. `journal.state_dir` (or `A11Y_EDIT_STATE_DIR`)
    /// 2. `local` flag (uses `./.a11y-edit`)
    /// 3. The user's data directory
    pub fn state_dir(&self, local: bool) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.journal.state_dir {
            return Ok(dir.clone());
        }

        if local {
            let current_dir = std::env::current_dir().map_err(|source| ConfigError::Read {
                path: PathBuf::from("."),
                source,
            })?;
            Ok(current_dir.join(".a11y-edit"))
        } else {
            let proj_dirs =
                ProjectDirs::from("com", "a11y-edit", "a11y-edit").ok_or(ConfigError::NoStateDir)?;
            Ok(proj_dirs.data_dir().to_path_buf())
        }
    }
}
