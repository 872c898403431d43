// Config on disk. A missing file means first run; a broken one is an error
// and is never written over.
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::pipeline::config::GeneratorConfig;

const FUNKGEN_DIR: &str = ".funkgen";
const CONFIG_FILE: &str = "config.json";

pub fn config_file_path(project_dir: &Path) -> PathBuf {
    project_dir.join(FUNKGEN_DIR).join(CONFIG_FILE)
}

/// `Ok(None)` only when there is no config file yet.
pub fn load_config(project_dir: &Path) -> anyhow::Result<Option<GeneratorConfig>> {
    let path = config_file_path(project_dir);
    let data = match std::fs::read_to_string(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
    };
    let config: GeneratorConfig = serde_json::from_str(&data)
        .with_context(|| format!("{} is not a valid funkgen config", path.display()))?;
    config
        .validate()
        .with_context(|| format!("bad values in {}", path.display()))?;
    Ok(Some(config))
}

pub fn save_config(project_dir: &Path, config: &GeneratorConfig) -> anyhow::Result<()> {
    let path = config_file_path(project_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::config::SinkKind;

    fn write_raw(dir: &Path, body: &str) -> PathBuf {
        let path = config_file_path(dir);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn missing_config_is_a_first_run() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(dir.path()).unwrap().is_none());
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = GeneratorConfig {
            seed: Some(1234),
            sink: SinkKind::Device,
            max_ticks: Some(448),
            ..GeneratorConfig::default()
        };
        save_config(dir.path(), &config).unwrap();
        assert!(config_file_path(dir.path()).exists());
        assert_eq!(load_config(dir.path()).unwrap(), Some(config));
    }

    #[test]
    fn typo_in_config_is_an_error_and_the_file_survives() {
        let dir = tempfile::tempdir().unwrap();
        // volume as a string
        let body = r#"{ "seed": 7, "sink": "wav", "volume": "0.5" }"#;
        let path = write_raw(dir.path(), body);

        let err = load_config(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("not a valid funkgen config"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), body);
    }

    #[test]
    fn out_of_range_root_is_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        write_raw(dir.path(), r#"{ "root_table": [54, 250] }"#);
        let err = load_config(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("250"));
    }
}
