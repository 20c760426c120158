//! Voxshell - intent routing and skill dispatch for a voice assistant
//!
//! A transcribed utterance goes through a staged pipeline:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                       Router                         │
//! │  Pattern rules ─▶ Semantic lookup ─▶ Model tool pick │
//! └───────────┬───────────────────────────────┬──────────┘
//!             │                               │
//! ┌───────────▼───────────┐       ┌───────────▼──────────┐
//! │    Skill registry     │       │     Model client     │
//! │  intent ─▶ skill      │       │  remote ─▶ local ─▶  │
//! │  atomic reload        │       │  offline diagnostic  │
//! └───────────┬───────────┘       └──────────────────────┘
//!             │
//! ┌───────────▼───────────┐
//! │   Built-in skills     │──▶ background events
//! └───────────────────────┘
//! ```
//!
//! Speech capture, speech synthesis and any UI are outside this crate; the
//! [`daemon`] module provides a text conversation driver.

pub mod config;
pub mod daemon;
pub mod db;
pub mod error;
pub mod events;
pub mod memory;
pub mod model;
pub mod pattern;
pub mod persona;
pub mod profile;
pub mod response;
pub mod router;
pub mod semantic;
pub mod skills;

pub use config::Config;
pub use daemon::Daemon;
pub use db::{DbConn, DbPool};
pub use error::{Error, Result};
pub use events::{BackgroundEvent, EventBus, EventKind};
pub use memory::ConversationMemory;
pub use model::{GenerateOptions, Generation, ModelClient};
pub use pattern::PatternMatcher;
pub use persona::Persona;
pub use profile::{ProfileStore, UserProfile};
pub use response::{Entities, Intent, MatchResult, SkillResponse};
pub use router::{RouteKind, Routed, Router};
pub use semantic::SemanticMatcher;
pub use skills::{Skill, SkillCatalog, SkillContext, SkillRegistry};
