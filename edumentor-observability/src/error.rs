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

//! Observability error types

use thiserror::Error;

/// Result type for observability operations
pub type ObservabilityResult<T> = Result<T, ObservabilityError>;

/// Errors raised while exporting metrics, traces or logs
#[derive(Debug, Error)]
pub enum ObservabilityError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Logging subscriber could not be installed
    #[error("Subscriber error: {0}")]
    SubscriberError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serde_json::Error> for ObservabilityError {
    fn from(e: serde_json::Error) -> Self {
        ObservabilityError::SerializationError(e.to_string())
    }
}
