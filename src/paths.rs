use std::env;
use std::path::PathBuf;

const DATA_DIR_ENV: &str = "GOALPOST_DATA_DIR";
const APP_DIR: &str = "goalpost";

/// Resolves where the data files live: an explicit CLI directory wins, then
/// the GOALPOST_DATA_DIR environment variable, then the platform state
/// directory.
pub fn resolve_data_dir(cli_dir: Option<PathBuf>) -> PathBuf {
	if let Some(dir) = cli_dir {
		return dir;
	}

	if let Some(dir) = env::var_os(DATA_DIR_ENV) {
		if !dir.is_empty() {
			return PathBuf::from(dir);
		}
	}

	default_state_dir()
}

fn default_state_dir() -> PathBuf {
	#[cfg(target_os = "windows")]
	{
		if let Some(path) = env::var_os("LOCALAPPDATA") {
			return PathBuf::from(path).join(APP_DIR);
		}
	}

	if let Some(path) = env::var_os("XDG_STATE_HOME") {
		return PathBuf::from(path).join(APP_DIR);
	}

	if let Some(path) = env::var_os("HOME") {
		return PathBuf::from(path)
			.join(".local")
			.join("state")
			.join(APP_DIR);
	}

	PathBuf::from(format!(".{APP_DIR}"))
}
