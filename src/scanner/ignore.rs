//! Ignore-file parsing for directory scans.
//!
//! Omission rules come from a `.dudeignore` file, merged with `.gitignore`
//! rules read from the same location. Matching is by exact name segment, so
//! rules are plain names/path fragments, not globs.

use std::fs;
use std::path::Path;

use super::ScanError;

/// Project-local ignore file name
pub const IGNORE_FILE: &str = ".dudeignore";
/// Version-control ignore file merged in when present
pub const GIT_IGNORE_FILE: &str = ".gitignore";

/// Read omission rules from `location`.
///
/// When no `.dudeignore` exists the fallback is to omit just the ignore file
/// itself and version-control metadata. Otherwise its lines are merged with
/// any `.gitignore` at the same location; blank lines and `#` comments are
/// skipped and trailing slashes stripped. The ignore file and `.git` are
/// always part of the result.
pub fn read_ignore_rules(location: &Path) -> Result<Vec<String>, ScanError> {
    let ignore_path = location.join(IGNORE_FILE);
    if !ignore_path.exists() {
        return Ok(vec![IGNORE_FILE.to_string(), ".git".to_string()]);
    }

    let mut lines: Vec<String> = fs::read_to_string(&ignore_path)?
        .lines()
        .map(str::to_string)
        .collect();

    let gitignore_path = location.join(GIT_IGNORE_FILE);
    if gitignore_path.exists() {
        lines.extend(fs::read_to_string(&gitignore_path)?.lines().map(str::to_string));
    }

    let mut rules: Vec<String> = lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.trim_end_matches('/').to_string())
        .collect();
    rules.push(IGNORE_FILE.to_string());
    rules.push(".git".to_string());
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fallback_rules_when_missing() {
        let dir = TempDir::new().unwrap();
        let rules = read_ignore_rules(dir.path()).unwrap();
        assert_eq!(rules, vec![IGNORE_FILE.to_string(), ".git".to_string()]);
    }

    #[test]
    fn test_comments_and_blanks_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(IGNORE_FILE),
            "# build output\ntarget/\n\nnode_modules\n",
        )
        .unwrap();

        let rules = read_ignore_rules(dir.path()).unwrap();
        assert!(rules.contains(&"target".to_string()));
        assert!(rules.contains(&"node_modules".to_string()));
        assert!(!rules.iter().any(|r| r.starts_with('#')));
        assert!(!rules.iter().any(|r| r.is_empty()));
    }

    #[test]
    fn test_gitignore_merged() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(IGNORE_FILE), "secrets/\n").unwrap();
        std::fs::write(dir.path().join(GIT_IGNORE_FILE), "dist/\n").unwrap();

        let rules = read_ignore_rules(dir.path()).unwrap();
        assert!(rules.contains(&"secrets".to_string()));
        assert!(rules.contains(&"dist".to_string()));
    }

    #[test]
    fn test_self_and_git_always_present() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(IGNORE_FILE), "build\n").unwrap();

        let rules = read_ignore_rules(dir.path()).unwrap();
        assert!(rules.contains(&IGNORE_FILE.to_string()));
        assert!(rules.contains(&".git".to_string()));
    }
}
