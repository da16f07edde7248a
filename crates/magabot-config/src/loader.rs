//! Config file loading and saving.

use std::path::Path;

use tracing::info;

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;
use crate::validate;

/// Load and validate the config at `path`.
///
/// A missing file yields validated defaults, so a fresh install can start
/// and be configured over chat. On unix the file must not be
/// group/world-readable.
pub fn load(path: &Path) -> ConfigResult<Config> {
    if !path.exists() {
        info!(path = %path.display(), "no config file, using defaults");
        let config = Config::default();
        validate::validate(&config)?;
        return Ok(config);
    }

    #[cfg(unix)]
    check_permissions(path)?;

    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config: Config = serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    validate::validate(&config)?;
    Ok(config)
}

/// Serialize `config` to `path`, creating parents and setting 0600.
pub fn save(config: &Config, path: &Path) -> ConfigResult<()> {
    let yaml = serde_yaml::to_string(config).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }
    std::fs::write(path, yaml).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(
            |source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            },
        )?;
    }

    Ok(())
}

#[cfg(unix)]
fn check_permissions(path: &Path) -> ConfigResult<()> {
    use std::os::unix::fs::PermissionsExt;
    let metadata = std::fs::metadata(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mode = metadata.permissions().mode();
    if mode & 0o077 != 0 {
        return Err(ConfigError::InsecurePermissions {
            path: path.display().to_string(),
            mode: mode & 0o777,
        });
    }
    Ok(())
}
