use std::fmt::{Display, Formatter};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::{ActiveSessionMarker, Goal, TimeSession};

const GOALS_FILE: &str = "goals.toml";
const SESSIONS_FILE: &str = "sessions.jsonl";
const ACTIVE_MARKER_FILE: &str = "active_session.toml";
const SCHEMA_VERSION: u32 = 1;

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    TomlDecode(toml::de::Error),
    TomlEncode(toml::ser::Error),
    JsonDecode(serde_json::Error),
    JsonEncode(serde_json::Error),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(err) => write!(f, "io error: {err}"),
            StorageError::TomlDecode(err) => write!(f, "failed to parse TOML record: {err}"),
            StorageError::TomlEncode(err) => write!(f, "failed to encode TOML record: {err}"),
            StorageError::JsonDecode(err) => write!(f, "failed to parse JSONL session: {err}"),
            StorageError::JsonEncode(err) => write!(f, "failed to encode JSONL session: {err}"),
        }
    }
}

impl std::error::Error for StorageError {}

/// Durable storage for the two collections plus the optional active-session
/// marker. The marker methods have no-op defaults so a backend without that
/// capability still satisfies the trait; `append_session` defaults to the
/// load-push-save composition.
pub trait Store {
    fn load_goals(&self) -> Result<Vec<Goal>, StorageError>;
    fn save_goals(&mut self, goals: &[Goal]) -> Result<(), StorageError>;
    fn load_sessions(&self) -> Result<Vec<TimeSession>, StorageError>;
    fn save_sessions(&mut self, sessions: &[TimeSession]) -> Result<(), StorageError>;

    fn append_session(&mut self, session: &TimeSession) -> Result<(), StorageError> {
        let mut sessions = self.load_sessions()?;
        sessions.push(session.clone());
        self.save_sessions(&sessions)
    }

    fn load_active_marker(&self) -> Result<Option<ActiveSessionMarker>, StorageError> {
        Ok(None)
    }

    fn save_active_marker(
        &mut self,
        _marker: Option<&ActiveSessionMarker>,
    ) -> Result<(), StorageError> {
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GoalsFile {
    schema_version: u32,
    #[serde(default)]
    goals: Vec<Goal>,
}

/// File-backed store: a data directory holding the goal collection as a TOML
/// document (rewritten whole on every save), the session log as JSONL
/// (appended in place), and the active-session marker as a TOML file that is
/// present exactly while a timer runs.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn ensure_dir(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(StorageError::Io)
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl Store for FileStore {
    fn load_goals(&self) -> Result<Vec<Goal>, StorageError> {
        let raw = match fs::read_to_string(self.path(GOALS_FILE)) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StorageError::Io(err)),
        };

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let file: GoalsFile = toml::from_str(&raw).map_err(StorageError::TomlDecode)?;
        Ok(file.goals)
    }

    fn save_goals(&mut self, goals: &[Goal]) -> Result<(), StorageError> {
        self.ensure_dir()?;
        let file = GoalsFile {
            schema_version: SCHEMA_VERSION,
            goals: goals.to_vec(),
        };
        let blob = toml::to_string_pretty(&file).map_err(StorageError::TomlEncode)?;
        fs::write(self.path(GOALS_FILE), blob).map_err(StorageError::Io)
    }

    fn load_sessions(&self) -> Result<Vec<TimeSession>, StorageError> {
        let raw = match fs::read_to_string(self.path(SESSIONS_FILE)) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StorageError::Io(err)),
        };

        let mut sessions = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            sessions.push(serde_json::from_str(line).map_err(StorageError::JsonDecode)?);
        }

        Ok(sessions)
    }

    fn save_sessions(&mut self, sessions: &[TimeSession]) -> Result<(), StorageError> {
        self.ensure_dir()?;
        let mut file = fs::File::create(self.path(SESSIONS_FILE)).map_err(StorageError::Io)?;
        for session in sessions {
            let line = serde_json::to_string(session).map_err(StorageError::JsonEncode)?;
            file.write_all(line.as_bytes()).map_err(StorageError::Io)?;
            file.write_all(b"\n").map_err(StorageError::Io)?;
        }
        Ok(())
    }

    fn append_session(&mut self, session: &TimeSession) -> Result<(), StorageError> {
        self.ensure_dir()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(SESSIONS_FILE))
            .map_err(StorageError::Io)?;
        let line = serde_json::to_string(session).map_err(StorageError::JsonEncode)?;
        file.write_all(line.as_bytes()).map_err(StorageError::Io)?;
        file.write_all(b"\n").map_err(StorageError::Io)
    }

    fn load_active_marker(&self) -> Result<Option<ActiveSessionMarker>, StorageError> {
        let raw = match fs::read_to_string(self.path(ACTIVE_MARKER_FILE)) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StorageError::Io(err)),
        };

        if raw.trim().is_empty() {
            return Ok(None);
        }

        let marker = toml::from_str(&raw).map_err(StorageError::TomlDecode)?;
        Ok(Some(marker))
    }

    fn save_active_marker(
        &mut self,
        marker: Option<&ActiveSessionMarker>,
    ) -> Result<(), StorageError> {
        match marker {
            Some(marker) => {
                self.ensure_dir()?;
                let blob = toml::to_string_pretty(marker).map_err(StorageError::TomlEncode)?;
                fs::write(self.path(ACTIVE_MARKER_FILE), blob).map_err(StorageError::Io)
            }
            None => match fs::remove_file(self.path(ACTIVE_MARKER_FILE)) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
                Err(err) => Err(StorageError::Io(err)),
            },
        }
    }
}

/// In-memory store: the test double for the engine, also usable for
/// throwaway trackers. Save counters let tests assert which operations
/// touched the store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    pub goals: Vec<Goal>,
    pub sessions: Vec<TimeSession>,
    pub active_marker: Option<ActiveSessionMarker>,
    pub goal_saves: usize,
    pub session_saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn load_goals(&self) -> Result<Vec<Goal>, StorageError> {
        Ok(self.goals.clone())
    }

    fn save_goals(&mut self, goals: &[Goal]) -> Result<(), StorageError> {
        self.goals = goals.to_vec();
        self.goal_saves += 1;
        Ok(())
    }

    fn load_sessions(&self) -> Result<Vec<TimeSession>, StorageError> {
        Ok(self.sessions.clone())
    }

    fn save_sessions(&mut self, sessions: &[TimeSession]) -> Result<(), StorageError> {
        self.sessions = sessions.to_vec();
        self.session_saves += 1;
        Ok(())
    }

    fn append_session(&mut self, session: &TimeSession) -> Result<(), StorageError> {
        self.sessions.push(session.clone());
        self.session_saves += 1;
        Ok(())
    }

    fn load_active_marker(&self) -> Result<Option<ActiveSessionMarker>, StorageError> {
        Ok(self.active_marker.clone())
    }

    fn save_active_marker(
        &mut self,
        marker: Option<&ActiveSessionMarker>,
    ) -> Result<(), StorageError> {
        self.active_marker = marker.cloned();
        Ok(())
    }
}
