use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "LINEART_CONFIG_DIR";
pub const ENV_DATA_DIR: &str = "LINEART_DATA_DIR";

const CONFIG_FILE: &str = "lineart.toml";
const RENDERS_DIR: &str = "renders";

/// Where the session config is read from and where renders are saved.
#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

#[derive(Debug, Clone, Copy)]
enum Location {
    Config,
    Data,
}

impl Location {
    fn env_var(self) -> &'static str {
        match self {
            Self::Config => ENV_CONFIG_DIR,
            Self::Data => ENV_DATA_DIR,
        }
    }

    fn platform_dir(self, dirs: &ProjectDirs) -> PathBuf {
        match self {
            Self::Config => dirs.config_dir().to_path_buf(),
            Self::Data => dirs.data_dir().to_path_buf(),
        }
    }
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        Self::resolve(|key| env::var_os(key))
    }

    /// Resolves both directories, preferring non-empty overrides from `lookup`.
    /// Platform directories are only consulted for locations left unset.
    fn resolve(lookup: impl Fn(&str) -> Option<OsString>) -> Result<Self> {
        let mut platform = None;
        let mut locate = |location: Location| -> Result<PathBuf> {
            if let Some(dir) = lookup(location.env_var()).filter(|value| !value.is_empty()) {
                return Ok(PathBuf::from(dir));
            }
            if platform.is_none() {
                platform = ProjectDirs::from("org", "Lineart", "lineart");
            }
            platform
                .as_ref()
                .map(|dirs| location.platform_dir(dirs))
                .ok_or_else(|| {
                    anyhow!(
                        "no home directory to place lineart files in; set {}",
                        location.env_var()
                    )
                })
        };

        Ok(Self {
            config_dir: locate(Location::Config)?,
            data_dir: locate(Location::Data)?,
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Default destination for saved galleries, stills, and videos.
    pub fn output_dir(&self) -> PathBuf {
        self.data_dir.join(RENDERS_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let vars: HashMap<String, OsString> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), OsString::from(value)))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn overrides_place_config_and_renders() {
        let paths = AppPaths::resolve(lookup(&[
            (ENV_CONFIG_DIR, "/srv/lineart/etc"),
            (ENV_DATA_DIR, "/srv/lineart/var"),
        ]))
        .unwrap();

        assert_eq!(paths.config_dir(), Path::new("/srv/lineart/etc"));
        assert_eq!(
            paths.config_file(),
            Path::new("/srv/lineart/etc/lineart.toml")
        );
        assert_eq!(paths.data_dir(), Path::new("/srv/lineart/var"));
        assert_eq!(paths.output_dir(), Path::new("/srv/lineart/var/renders"));
    }

    #[test]
    fn empty_override_is_ignored() {
        let overridden = AppPaths::resolve(lookup(&[
            (ENV_CONFIG_DIR, ""),
            (ENV_DATA_DIR, "/tmp/lineart-data"),
        ]));
        let Some(dirs) = ProjectDirs::from("org", "Lineart", "lineart") else {
            // Without a home directory the unset location cannot resolve.
            assert!(overridden.is_err());
            return;
        };

        let paths = overridden.unwrap();
        assert_eq!(paths.config_dir(), dirs.config_dir());
        assert_eq!(paths.data_dir(), Path::new("/tmp/lineart-data"));
    }

    #[test]
    fn locations_resolve_independently() {
        let paths = AppPaths::resolve(lookup(&[(ENV_DATA_DIR, "/data")]));
        if let Some(dirs) = ProjectDirs::from("org", "Lineart", "lineart") {
            let paths = paths.unwrap();
            assert_eq!(paths.config_dir(), dirs.config_dir());
            assert_eq!(paths.output_dir(), Path::new("/data/renders"));
        }
    }
}
