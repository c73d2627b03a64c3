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

//! Memory system error types

use thiserror::Error;

/// Result type for session and memory operations
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Errors that can occur in the session and memory layer
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Session not found
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// A session with this ID is already registered
    #[error("Session already exists: {0}")]
    AlreadyExists(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serde_json::Error> for MemoryError {
    fn from(e: serde_json::Error) -> Self {
        MemoryError::SerializationError(e.to_string())
    }
}

impl From<toml::de::Error> for MemoryError {
    fn from(e: toml::de::Error) -> Self {
        MemoryError::ConfigError(e.to_string())
    }
}
