//! Path filtering rules shared by the walker and the structure tree

use crate::config::Config;
use crate::ConfigError;
use globset::{Glob, GlobMatcher, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Compiled exclusion rules for one scan
#[derive(Debug, Clone)]
pub struct ScanRules {
    excluded_directories: HashSet<String>,
    excluded_files: GlobSet,
    restricted_paths: Vec<PathBuf>,
    pattern: Option<GlobMatcher>,
    include_hidden: bool,
}

impl ScanRules {
    /// Compiles the `[scan]` and `[security]` sections
    ///
    /// # Arguments
    ///
    /// * `config` - Run configuration
    /// * `pattern` - Optional glob every yielded file name must match
    pub fn from_config(config: &Config, pattern: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for glob in &config.scan.excluded_files {
            builder.add(compile(glob)?);
        }
        let excluded_files = builder
            .build()
            .map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;

        let pattern = pattern
            .map(|p| compile(p).map(|glob| glob.compile_matcher()))
            .transpose()?;

        Ok(Self {
            excluded_directories: config.scan.excluded_directories.iter().cloned().collect(),
            excluded_files,
            restricted_paths: config
                .security
                .restricted_paths
                .iter()
                .map(PathBuf::from)
                .collect(),
            pattern,
            include_hidden: config.scan.include_hidden,
        })
    }

    pub fn include_hidden(&self) -> bool {
        self.include_hidden
    }

    /// True when `path` lies under a restricted prefix
    ///
    /// Relative paths are resolved against the working directory first.
    pub fn is_restricted(&self, path: &Path) -> bool {
        let absolute = absolutize(path);
        self.restricted_paths
            .iter()
            .any(|restricted| absolute.starts_with(restricted))
    }

    /// Whether the walker should stay out of directory `path`
    pub fn skip_directory(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if self.excluded_directories.contains(name) {
            return true;
        }
        if !self.include_hidden && name.starts_with('.') {
            return true;
        }
        if self.is_restricted(path) {
            tracing::warn!("Skipping restricted path: {}", path.display());
            return true;
        }
        false
    }

    /// Whether file `path` should be left out of the scan
    pub fn skip_file(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return true;
        };
        if self.excluded_files.is_match(name) {
            return true;
        }
        if !self.include_hidden && name.starts_with('.') {
            return true;
        }
        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(name) {
                return true;
            }
        }
        if self.is_restricted(path) {
            tracing::warn!("Skipping restricted path: {}", path.display());
            return true;
        }
        false
    }
}

fn compile(glob: &str) -> Result<Glob, ConfigError> {
    Glob::new(glob).map_err(|e| ConfigError::InvalidPattern(format!("{}: {}", glob, e)))
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(pattern: Option<&str>) -> ScanRules {
        let mut config = Config::default();
        config.security.restricted_paths = vec!["/restricted/area".to_string()];
        ScanRules::from_config(&config, pattern).unwrap()
    }

    #[test]
    fn test_excluded_directories() {
        let rules = rules(None);
        assert!(rules.skip_directory(Path::new("/work/project/.git")));
        assert!(rules.skip_directory(Path::new("/work/project/node_modules")));
        assert!(!rules.skip_directory(Path::new("/work/project/src")));
    }

    #[test]
    fn test_hidden_entries() {
        let rules = rules(None);
        assert!(rules.skip_directory(Path::new("/work/.cache")));
        assert!(rules.skip_file(Path::new("/work/.profile")));

        let mut config = Config::default();
        config.scan.include_hidden = true;
        let inclusive = ScanRules::from_config(&config, None).unwrap();
        assert!(!inclusive.skip_file(Path::new("/work/.profile")));
        // Excluded names stay excluded even when hidden entries are included
        assert!(inclusive.skip_directory(Path::new("/work/.git")));
    }

    #[test]
    fn test_excluded_file_globs() {
        let rules = rules(None);
        assert!(rules.skip_file(Path::new("/work/module.pyc")));
        assert!(rules.skip_file(Path::new("/work/Thumbs.db")));
        assert!(!rules.skip_file(Path::new("/work/main.py")));
    }

    #[test]
    fn test_name_pattern() {
        let rules = rules(Some("*.rs"));
        assert!(!rules.skip_file(Path::new("/work/lib.rs")));
        assert!(rules.skip_file(Path::new("/work/README.md")));
    }

    #[test]
    fn test_restricted_prefix_is_component_wise() {
        let rules = rules(None);
        assert!(rules.is_restricted(Path::new("/restricted/area/file.txt")));
        assert!(rules.is_restricted(Path::new("/restricted/area")));
        assert!(!rules.is_restricted(Path::new("/restricted/areas/file.txt")));
        assert!(rules.skip_file(Path::new("/restricted/area/file.txt")));
    }

    #[test]
    fn test_invalid_pattern() {
        let mut config = Config::default();
        config.scan.excluded_files = vec!["[unclosed".to_string()];
        assert!(matches!(
            ScanRules::from_config(&config, None),
            Err(ConfigError::InvalidPattern(_))
        ));
    }
}
