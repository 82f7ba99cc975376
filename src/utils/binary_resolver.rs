use std::path::{Path, PathBuf};

/// Locate an executable.
///
/// Order: explicit override, extra candidate directories, system PATH. When
/// nothing matches, the bare name is returned so that spawning fails with
/// `NotFound` and the caller reports the missing tool in one place.
pub fn find_binary(name: &str, explicit: Option<&Path>, extra_dirs: &[PathBuf]) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    let file_name = executable_name(name);
    let mut checked_paths = Vec::new();

    for dir in extra_dirs {
        let candidate = dir.join(&file_name);
        if candidate.is_file() {
            return candidate;
        }
        checked_paths.push(candidate);
    }

    if let Ok(path) = which::which(&file_name) {
        return path;
    }

    log::debug!(
        "{} not found on PATH; checked:\n{}",
        name,
        checked_paths
            .iter()
            .map(|p| format!("  {}", p.display()))
            .collect::<Vec<_>>()
            .join("\n")
    );
    PathBuf::from(file_name)
}

/// Find the adb executable, preferring an Android SDK install
pub fn find_adb(explicit: Option<&Path>) -> PathBuf {
    find_binary("adb", explicit, &sdk_platform_tools_dirs())
}

/// Find the scrcpy executable
pub fn find_scrcpy(explicit: Option<&Path>) -> PathBuf {
    find_binary("scrcpy", explicit, &[])
}

fn executable_name(name: &str) -> String {
    if cfg!(windows) && !name.ends_with(".exe") {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

/// `platform-tools` directories of the SDKs we know about
fn sdk_platform_tools_dirs() -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = ["ANDROID_SDK_ROOT", "ANDROID_HOME"]
        .iter()
        .filter_map(|var| std::env::var_os(var))
        .map(PathBuf::from)
        .collect();

    if cfg!(target_os = "macos") {
        if let Some(home) = dirs::home_dir() {
            roots.push(home.join("Library/Android/sdk"));
        }
    } else if cfg!(windows) {
        if let Some(local) = dirs::data_local_dir() {
            roots.push(local.join("Android").join("Sdk"));
        }
    } else if let Some(home) = dirs::home_dir() {
        roots.push(home.join("Android").join("Sdk"));
    }

    roots.into_iter().map(|r| r.join("platform-tools")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let path = find_binary("adb", Some(Path::new("/opt/tools/adb")), &[]);
        assert_eq!(path, PathBuf::from("/opt/tools/adb"));
    }

    #[test]
    fn test_missing_binary_falls_back_to_bare_name() {
        let path = find_binary("no-such-tool-4242", None, &[PathBuf::from("/nonexistent")]);
        assert_eq!(path, PathBuf::from(executable_name("no-such-tool-4242")));
    }
}
