use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use log::info;

use super::app::AppConfig;
use crate::utils::error::ConfigError;

const CONFIG_FILE: &str = "config.toml";

/// `<platform config dir>/glsketch/config.toml`
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let proj_dirs =
        ProjectDirs::from("org", "glsketch", "glsketch").ok_or(ConfigError::NoProjectDir)?;
    Ok(proj_dirs.config_dir().join(CONFIG_FILE))
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ConfigError + '_ {
    move |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(io_error(path))?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(io_error(path))
    }

    /// Reads `path`, writing the defaults there first if it does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = AppConfig::default();
            config.save(path)?;
            info!("Wrote default config to {}", path.display());
            return Ok(config);
        }
        Self::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::Primitive;
    use crate::sketches::SketchKind;
    use log::LevelFilter;
    use tempfile::TempDir;

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let config = AppConfig::load_or_create(&path).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());

        let reloaded = AppConfig::load_or_create(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_save_and_load_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut config = AppConfig::default();
        config.sketch = SketchKind::Cube;
        config.particles.seed = Some(7);
        config.particles.primitive = Primitive::LineStrip;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.sketch, SketchKind::Cube);
        assert_eq!(loaded.particles.seed, Some(7));
        assert_eq!(loaded.particles.primitive, Primitive::LineStrip);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            "sketch = \"particles\"\n[particles]\ncount = 10\n[rectangles]\nseed = 3\n[logging]\nlevel = \"debug\"\n",
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.sketch, SketchKind::Particles);
        assert_eq!(config.particles.count, 10);
        assert_eq!(config.particles.point_size, 2.0);
        assert_eq!(config.rectangles.seed, Some(3));
        assert_eq!(config.rectangles.per_move, 5);
        assert_eq!(config.tumble, crate::config::TumbleConfig::default());
        assert_eq!(config.window, crate::config::WindowConfig::default());
        assert_eq!(config.logging.level_filter(), LevelFilter::Debug);
    }

    #[test]
    fn test_errors() {
        let dir = TempDir::new().unwrap();
        let missing = AppConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));

        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "sketch = [").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".into();
        assert_eq!(config.logging.level_filter(), LevelFilter::Info);
    }
}
