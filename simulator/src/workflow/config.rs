use crate::generator::profile::GeneratorConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use subsoniccore::FilterConfig;

/// Command-line values that take precedence over the workflow file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub frames: Option<usize>,
    pub height: Option<usize>,
    pub width: Option<usize>,
    pub tile_width: Option<usize>,
    pub tile_height: Option<usize>,
    pub batch_size: Option<usize>,
    pub workers: Option<usize>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub filter: FilterConfig,
    pub generator: GeneratorConfig,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        config
            .filter
            .validate()
            .with_context(|| format!("validating workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(overrides: &Overrides) -> Self {
        let mut config = Self::default();
        config.apply(overrides);
        config
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        let generator = &mut self.generator;
        let filter = &mut self.filter;
        for (slot, value) in [
            (&mut generator.frames, overrides.frames),
            (&mut generator.height, overrides.height),
            (&mut generator.width, overrides.width),
            (&mut filter.tile_width, overrides.tile_width),
            (&mut filter.tile_height, overrides.tile_height),
            (&mut filter.batch_size, overrides.batch_size),
            (&mut filter.workers, overrides.workers),
        ] {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use subsoniccore::prelude::EdgePolicy;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_overrides_defaults() {
        let cfg = WorkflowConfig::from_args(&Overrides {
            frames: Some(32),
            tile_width: Some(64),
            ..Default::default()
        });
        assert_eq!(cfg.generator.frames, 32);
        assert_eq!(cfg.generator.height, GeneratorConfig::default().height);
        assert_eq!(cfg.filter.tile_width, 64);
        assert_eq!(cfg.filter.tile_height, 216);
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"filter:\n  v_ph: 3.5\n  edge:\n    kind: apodized\n    percent: 10.0\n  tile_width: 32\ngenerator:\n  frames: 16\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.filter.v_ph, 3.5);
        assert_eq!(cfg.filter.edge, EdgePolicy::Apodized { percent: 10.0 });
        assert_eq!(cfg.filter.tile_width, 32);
        assert_eq!(cfg.filter.t_step, 45.0);
        assert_eq!(cfg.generator.frames, 16);
    }

    #[test]
    fn config_load_rejects_invalid_filter() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"filter:\n  v_ph: -1.0\n").unwrap();
        let path = temp.into_temp_path();
        assert!(WorkflowConfig::load(&path).is_err());
    }
}
