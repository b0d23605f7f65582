//! Filesystem path completion for the inline prompt

use std::fs;
use std::path::{Path, PathBuf};

/// Names in the directory `partial` points into that start with its basename.
///
/// Directories come back with a trailing `/`. Hidden entries are only listed
/// when the typed basename itself starts with `.`. Sorted; empty on any I/O error.
pub fn complete_path(cwd: &Path, partial: &str) -> Vec<String> {
    let (dir_part, base) = split_partial(partial);
    let dir = resolve_dir(cwd, dir_part);

    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) => {
            crate::trace_log!("completion: cannot read {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let show_hidden = base.starts_with('.');
    let mut matches: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(base) || (name.starts_with('.') && !show_hidden) {
                return None;
            }
            // follows symlinks, so a link to a directory completes like one
            let is_dir = entry.path().is_dir();
            Some(if is_dir { format!("{}/", name) } else { name })
        })
        .collect();
    matches.sort();
    matches
}

pub fn longest_common_prefix(names: &[String]) -> String {
    let Some(first) = names.first() else {
        return String::new();
    };
    let mut prefix_len = first.len();
    for name in &names[1..] {
        prefix_len = first
            .char_indices()
            .zip(name.chars())
            .take_while(|((_, a), b)| a == b)
            .map(|((i, a), _)| i + a.len_utf8())
            .last()
            .unwrap_or(0)
            .min(prefix_len);
    }
    first[..prefix_len].to_string()
}

/// Text to append after `partial` given the matches from [`complete_path`].
pub fn completion_suffix(partial: &str, matches: &[String]) -> String {
    let (_, base) = split_partial(partial);
    let common = longest_common_prefix(matches);
    common
        .strip_prefix(base)
        .map(str::to_string)
        .unwrap_or_default()
}

/// The whitespace-delimited token at the end of the input, possibly empty.
pub fn trailing_token(input: &str) -> &str {
    match input.rfind(char::is_whitespace) {
        Some(pos) => {
            let ws_len = input[pos..].chars().next().map(char::len_utf8).unwrap_or(1);
            &input[pos + ws_len..]
        }
        None => input,
    }
}

/// Working directory of a running process, when the platform exposes it.
pub fn process_cwd(pid: u32) -> Option<PathBuf> {
    fs::read_link(format!("/proc/{}/cwd", pid)).ok()
}

/// `"src/ma"` -> `("src/", "ma")`, `"ma"` -> `("", "ma")`.
fn split_partial(partial: &str) -> (&str, &str) {
    match partial.rfind('/') {
        Some(slash) => partial.split_at(slash + 1),
        None => ("", partial),
    }
}

fn resolve_dir(cwd: &Path, dir_part: &str) -> PathBuf {
    if dir_part.is_empty() {
        return cwd.to_path_buf();
    }
    if let Some(rest) = dir_part.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    let path = Path::new(dir_part);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::create_dir(dir.path().join("scripts")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "").unwrap();
        fs::write(dir.path().join("src/mod.rs"), "").unwrap();
        fs::write(dir.path().join("setup.sh"), "").unwrap();
        fs::write(dir.path().join(".env"), "").unwrap();
        dir
    }

    #[test]
    fn test_relative_matches_sorted_with_dir_suffix() {
        let dir = fixture();
        assert_eq!(
            complete_path(dir.path(), "s"),
            vec!["scripts/", "setup.sh", "src/"]
        );
        assert_eq!(complete_path(dir.path(), "src/m"), vec!["main.rs", "mod.rs"]);
    }

    #[test]
    fn test_hidden_entries_need_a_dot() {
        let dir = fixture();
        assert!(!complete_path(dir.path(), "").contains(&".env".to_string()));
        assert_eq!(complete_path(dir.path(), ".e"), vec![".env"]);
    }

    #[test]
    fn test_absolute_path_and_missing_dir() {
        let dir = fixture();
        let partial = format!("{}/src/ma", dir.path().display());
        assert_eq!(complete_path(Path::new("/"), &partial), vec!["main.rs"]);
        assert!(complete_path(dir.path(), "nope/x").is_empty());
    }

    #[test]
    fn test_suffix_is_beyond_typed_text() {
        let one = vec!["scripts/".to_string()];
        assert_eq!(completion_suffix("sc", &one), "ripts/");

        let many = vec!["main.rs".to_string(), "mod.rs".to_string()];
        assert_eq!(completion_suffix("src/m", &many), "");

        let shared = vec!["setup.sh".to_string(), "setup.py".to_string()];
        assert_eq!(completion_suffix("s", &shared), "etup.");
        assert_eq!(completion_suffix("s", &[]), "");
    }

    #[test]
    fn test_longest_common_prefix_is_char_safe() {
        let names = vec!["héllo".to_string(), "hélp".to_string()];
        assert_eq!(longest_common_prefix(&names), "hél");
        let disjoint = vec!["abc".to_string(), "xyz".to_string()];
        assert_eq!(longest_common_prefix(&disjoint), "");
    }

    #[test]
    fn test_trailing_token() {
        assert_eq!(trailing_token("cat src/ma"), "src/ma");
        assert_eq!(trailing_token("cat "), "");
        assert_eq!(trailing_token("ls"), "ls");
    }
}
