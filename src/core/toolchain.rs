//! Toolchain discovery for child PATH augmentation
//!
//! GUI apps launched from a desktop environment inherit a minimal PATH, so
//! agent CLIs installed via npm, cargo, volta, or nvm are often invisible.
//! Each discovery strategy contributes candidate bin directories; existing
//! directories are prepended to the inherited PATH, deduplicated.

use std::path::PathBuf;

use super::pty::join_path_dedup;

/// A source of candidate bin directories.
pub trait ToolchainDiscovery {
    /// Candidate directories, most specific first. Non-existent entries are
    /// filtered by the caller.
    fn bin_dirs(&self) -> Vec<PathBuf>;
}

/// Well-known per-user and system install locations.
pub struct StaticDirs;

impl ToolchainDiscovery for StaticDirs {
    fn bin_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        if let Some(home) = home_dir() {
            dirs.push(home.join(".local/bin"));
            dirs.push(home.join(".cargo/bin"));
            dirs.push(home.join(".npm-global/bin"));
            dirs.push(home.join(".volta/bin"));
            dirs.push(home.join(".asdf/shims"));
        }
        dirs.push(PathBuf::from("/usr/local/bin"));
        dirs.push(PathBuf::from("/opt/homebrew/bin"));
        dirs
    }
}

/// nvm installs node versions under `~/.nvm/versions/node/<version>/bin`
/// with no stable symlink on PATH. Prefers the version the `default` alias
/// points at, falling back to the highest installed version.
pub struct NvmDirs;

impl ToolchainDiscovery for NvmDirs {
    fn bin_dirs(&self) -> Vec<PathBuf> {
        let Some(home) = home_dir() else {
            return Vec::new();
        };
        let nvm = home.join(".nvm");
        nvm_bin_dir(&nvm).into_iter().collect()
    }
}

fn nvm_bin_dir(nvm_root: &std::path::Path) -> Option<PathBuf> {
    let versions = nvm_root.join("versions/node");

    // The default alias holds a version string like "v20.11.0"
    if let Ok(alias) = std::fs::read_to_string(nvm_root.join("alias/default")) {
        let alias = alias.trim();
        if !alias.is_empty() {
            let bin = versions.join(alias).join("bin");
            if bin.is_dir() {
                return Some(bin);
            }
        }
    }

    // No usable alias: pick the highest installed version
    let entries = std::fs::read_dir(&versions).ok()?;
    let mut best: Option<(Vec<u32>, PathBuf)> = None;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(version) = parse_node_version(&name) {
            let bin = entry.path().join("bin");
            if bin.is_dir() && best.as_ref().map_or(true, |(v, _)| version > *v) {
                best = Some((version, bin));
            }
        }
    }
    best.map(|(_, path)| path)
}

/// Parse "v20.11.0" into [20, 11, 0] for ordering.
fn parse_node_version(name: &str) -> Option<Vec<u32>> {
    let rest = name.strip_prefix('v')?;
    let parts: Vec<u32> = rest.split('.').map(str::parse).collect::<Result<_, _>>().ok()?;
    (!parts.is_empty()).then_some(parts)
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// The PATH value for spawned children: discovered bin dirs prepended to
/// the inherited PATH, existing-dirs-only, first occurrence wins.
pub fn augmented_path() -> String {
    let strategies: [&dyn ToolchainDiscovery; 2] = [&StaticDirs, &NvmDirs];

    let mut dirs: Vec<PathBuf> = strategies
        .iter()
        .flat_map(|s| s.bin_dirs())
        .filter(|d| d.is_dir())
        .collect();

    if let Some(path) = std::env::var_os("PATH") {
        dirs.extend(std::env::split_paths(&path));
    }

    join_path_dedup(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_nvm_default_alias_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let nvm = tmp.path();
        for v in ["v18.19.0", "v20.11.0"] {
            fs::create_dir_all(nvm.join("versions/node").join(v).join("bin")).unwrap();
        }
        fs::create_dir_all(nvm.join("alias")).unwrap();
        fs::write(nvm.join("alias/default"), "v18.19.0\n").unwrap();

        let bin = nvm_bin_dir(nvm).unwrap();
        assert!(bin.ends_with("versions/node/v18.19.0/bin"));
    }

    #[test]
    fn test_nvm_falls_back_to_highest_version() {
        let tmp = tempfile::tempdir().unwrap();
        let nvm = tmp.path();
        for v in ["v18.19.0", "v20.11.0", "v20.9.5"] {
            fs::create_dir_all(nvm.join("versions/node").join(v).join("bin")).unwrap();
        }

        let bin = nvm_bin_dir(nvm).unwrap();
        assert!(bin.ends_with("versions/node/v20.11.0/bin"));
    }

    #[test]
    fn test_nvm_missing_root() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(nvm_bin_dir(&tmp.path().join("no-nvm")).is_none());
    }

    #[test]
    fn test_version_ordering() {
        assert!(parse_node_version("v20.11.0") > parse_node_version("v9.9.9"));
        assert!(parse_node_version("nonsense").is_none());
    }

    #[test]
    fn test_augmented_path_keeps_inherited_entries() {
        // Whatever is discovered, the inherited PATH entries must survive
        let path = augmented_path();
        if let Ok(inherited) = std::env::var("PATH") {
            for dir in inherited.split(':').filter(|s| !s.is_empty()) {
                assert!(path.split(':').any(|p| p == dir), "lost {}", dir);
            }
        }
    }
}
