// Copyright 2025 EduMentor Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! EduMentor Memory System
//!
//! Session and long-term memory for the tutoring agents:
//! - **Sessions**: one student's bounded-lifetime record of query/response
//!   exchanges, with rolling progress and context state
//! - **Session Manager**: owns live sessions, evicts idle ones and snapshots
//!   a summary view to disk after every change
//! - **Memory Bank**: per-student long-term facts that outlive any session
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │        SessionManager        │   │          MemoryBank          │
//! │  session_id ──► Session      │   │  student ──► type ──► [entry]│
//! └──────────────┬───────────────┘   └──────────────┬───────────────┘
//!                │ summary view                     │ full store
//!         ┌──────▼──────┐                    ┌──────▼──────┐
//!         │sessions.json│                    │memory_bank  │
//!         └─────────────┘                    │   .json     │
//!                                            └─────────────┘
//! ```
//!
//! Every collection is guarded by its own lock; there is no ordering between
//! them.
//!
//! # Example
//!
//! ```rust,no_run
//! use edumentor_memory::{MemoryBank, MemoryConfig, SessionManager};
//!
//! fn main() -> edumentor_memory::MemoryResult<()> {
//!     let config = MemoryConfig::from_env();
//!     let sessions = SessionManager::from_config(&config);
//!     let bank = MemoryBank::from_config(&config);
//!
//!     let session = sessions.create_session("student-42")?;
//!     sessions.record_interaction(session.session_id(), "Explain photosynthesis", "...", None)?;
//!     bank.add_memory("student-42", "interest", "biology")?;
//!
//!     println!("{:?}", sessions.get_system_metrics());
//!     Ok(())
//! }
//! ```

pub mod bank;
pub mod config;
pub mod error;
pub mod manager;
pub mod session;
pub mod storage;

// Re-exports
pub use bank::{MemoryBank, MemoryEntry, MemoryStore, StudentMemories, StudentProfile};
pub use config::MemoryConfig;
pub use error::{MemoryError, MemoryResult};
pub use manager::{PersistedSession, PersistedSessions, SessionManager, SystemMetrics};
pub use session::{
    detect_subject, ContextMemory, Interaction, Metadata, ProgressTracking, Session,
    SessionSummary,
};
