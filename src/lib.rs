pub mod config;
pub mod error;
pub mod matching;
pub mod model;
pub mod schedule;
pub mod server;
pub mod session;
pub mod store;

pub use config::{AppConfig, AutosaveConfig, HistoryConfig, MatchConfig, ServerConfig};
pub use error::{RosterError, RosterResult};
pub use matching::SkillMatchEngine;
pub use model::*;
pub use session::RosterSession;
