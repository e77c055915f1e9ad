pub mod analysis;
pub mod domain;
pub mod engine;
pub mod paths;
pub mod storage;

pub use analysis::{DailyLimitCheck, check_daily_limit, estimate_completion};
pub use domain::{Goal, TimeSession, format_duration};
pub use engine::{EngineError, GoalTracker};
pub use storage::{FileStore, MemoryStore, Store, StorageError};
