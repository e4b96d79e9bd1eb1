use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

pub const SERVICE_URL_VARS: [&str; 2] = ["SCHOOLDIR_SERVICE_URL", "SUPABASE_URL"];
pub const ANON_KEY_VARS: [&str; 2] = ["SCHOOLDIR_SERVICE_ANON_KEY", "SUPABASE_ANON_KEY"];

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ConfigFile {
    #[serde(alias = "url")]
    pub service_url: Option<String>,
    #[serde(alias = "key")]
    pub anon_key: Option<String>,
    pub table: Option<String>,
    pub timeout: Option<u64>,
    pub output_format: Option<String>,
    pub no_color: Option<bool>,
    pub check_images: Option<bool>,
}

/// Connection settings taken from the process environment.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EnvSettings {
    pub service_url: Option<String>,
    pub anon_key: Option<String>,
}

impl EnvSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// The first non-empty variable of each list wins.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };
        Self {
            service_url: first(&SERVICE_URL_VARS),
            anon_key: first(&ANON_KEY_VARS),
        }
    }
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
        .or_else(|| {
            let drive = env::var_os("HOMEDRIVE")?;
            let path = env::var_os("HOMEPATH")?;
            Some(PathBuf::from(drive).join(path))
        })
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(home_dir()?.join(".schooldir").join("config.yml"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn parse_config(contents: &str) -> Result<ConfigFile, String> {
    if contents.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str::<ConfigFile>(contents).map_err(|e| e.to_string())
}

pub fn load_config(path: &PathBuf, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_config(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

fn default_config_yaml() -> String {
    r#"# schooldir config
#
# Location (default):
#   ~/.schooldir/config.yml
#
# Values here are overridden by environment variables
# (SCHOOLDIR_SERVICE_URL, SCHOOLDIR_SERVICE_ANON_KEY, or the SUPABASE_*
# equivalents) and by command line flags.

# Data service (required)
# service_url: https://your-project.supabase.co
# anon_key: your-public-anon-key

# Table holding the school records
table: schools

# Request timeout in seconds
timeout: 30

# Output
output_format: text
no_color: false

# Probe image URLs before rendering cards
check_images: false
"#
    .to_string()
}

pub fn ensure_default_config_file(path: &PathBuf) -> Result<bool, String> {
    if path.exists() {
        return Ok(false);
    }
    let parent = path
        .parent()
        .ok_or_else(|| format!("invalid config path '{}'", path.display()))?;
    std::fs::create_dir_all(parent).map_err(|e| {
        format!(
            "failed to create config directory '{}': {e}",
            parent.display()
        )
    })?;
    let contents = default_config_yaml();
    std::fs::write(path, contents)
        .map_err(|e| format!("failed to write config file '{}': {e}", path.display()))?;
    Ok(true)
}
