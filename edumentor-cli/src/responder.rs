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

//! Offline tutoring responder
//!
//! Stands in for a language-model backed agent: answers come from a small
//! table of canned explanations keyed on the query's phrasing.

use thiserror::Error;

/// Agent name under which responder calls are recorded
pub const AGENT_NAME: &str = "main";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ResponderError {
    #[error("query is empty")]
    EmptyQuery,
}

const EXPLANATIONS: [(&str, &str); 3] = [
    (
        "photosynthesis",
        "Photosynthesis is the process by which plants convert light energy into chemical energy, \
         turning carbon dioxide and water into glucose and oxygen.",
    ),
    (
        "pythagorean theorem",
        "The Pythagorean theorem states that in a right triangle the square of the hypotenuse \
         equals the sum of the squares of the other two sides.",
    ),
    (
        "french revolution",
        "The French Revolution (1789-1799) was a period of radical social and political upheaval \
         in France that ended the absolute monarchy.",
    ),
];

const EXAMPLES: [(&str, &str); 3] = [
    ("math", "Example: a right triangle with legs 3 and 4 has hypotenuse sqrt(3² + 4²) = 5."),
    ("science", "Example: in photosynthesis, 6CO₂ + 6H₂O → C₆H₁₂O₆ + 6O₂."),
    (
        "history",
        "Example: the storming of the Bastille on 14 July 1789 marked a turning point in the \
         French Revolution.",
    ),
];

const STEPS: [&str; 5] = [
    "Understand the problem statement",
    "Identify the key components and variables",
    "Apply the relevant concepts or formulas",
    "Work through the solution step by step",
    "Verify your answer and reflect on the process",
];

/// Canned educational responder
#[derive(Debug, Default, Clone, Copy)]
pub struct Responder;

impl Responder {
    pub fn assist(&self, query: &str) -> Result<String, ResponderError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResponderError::EmptyQuery);
        }

        let lowered = query.to_lowercase();
        let response = if lowered.contains("explain") || lowered.contains("what is") {
            lookup(&EXPLANATIONS, &lowered).map(str::to_string).unwrap_or_else(|| {
                format!("'{query}' is a fundamental concept that builds on a few key principles.")
            })
        } else if lowered.contains("how to") {
            let steps: Vec<String> = STEPS
                .iter()
                .enumerate()
                .map(|(i, step)| format!("{}. {step}", i + 1))
                .collect();
            format!("For '{query}', follow these steps:\n{}", steps.join("\n"))
        } else if lowered.contains("example") {
            lookup(&EXAMPLES, &lowered).map(str::to_string).unwrap_or_else(|| {
                format!("Here is an example related to '{query}' showing the idea in practice.")
            })
        } else {
            lookup(&EXPLANATIONS, &lowered)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Good question about '{query}'. The key points are these."))
        };

        Ok(response)
    }
}

fn lookup(table: &[(&'static str, &'static str)], lowered: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(key, _)| lowered.contains(key))
        .map(|(_, text)| *text)
}

/// Shorten a response for display, marking the cut
pub fn format_response(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.is_empty() {
        return "No response generated.".to_string();
    }
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars).collect();
    format!("{kept}...")
}
