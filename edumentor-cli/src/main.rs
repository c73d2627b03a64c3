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

//! EduMentor CLI
//!
//! Command-line front end for tutoring sessions, long-term memory and agent
//! metrics.

mod config;
mod responder;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use config::AppConfig;
use edumentor_memory::{MemoryBank, Metadata, SessionManager};
use edumentor_observability::{
    logging, ActivityLog, AgentTracer, Instrumentation, MetricsCollector, MetricsReport,
};
use responder::{format_response, Responder, AGENT_NAME};
use serde::Serialize;
use serde_json::json;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{info, warn};

const DEMO_QUERIES: [&str; 3] = [
    "Explain photosynthesis in simple terms",
    "What is the Pythagorean theorem?",
    "Tell me about the French Revolution",
];

/// Characters of a response shown in demo output
const DEMO_RESPONSE_CHARS: usize = 200;

#[derive(Parser)]
#[command(name = "edumentor")]
#[command(about = "EduMentor - educational assistant", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory, overriding the configuration
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Student the session or memories belong to
    #[arg(short, long, default_value = "student_001")]
    student: String,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Output as JSON (machine-readable)
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the canned demonstration queries (default)
    Demo,

    /// Ask questions from the terminal
    Interactive,

    /// Answer a single query
    Query {
        /// Query text
        text: String,
    },

    /// Show the last saved metrics report
    Metrics,

    /// Long-term memory commands
    Memory {
        #[command(subcommand)]
        command: MemoryCommands,
    },

    /// Show session statistics
    Sessions,
}

#[derive(Subcommand)]
enum MemoryCommands {
    /// Store a memory; JSON content is kept structured
    Add {
        /// Memory type, e.g. "preferences"
        memory_type: String,

        /// Content, JSON or plain text
        content: String,
    },

    /// List stored memories
    List {
        /// Only this memory type
        #[arg(long = "type")]
        memory_type: Option<String>,
    },

    /// Summarize the stored memories
    Profile,
}

/// Every long-lived component, built once per process
struct App {
    config: AppConfig,
    sessions: SessionManager,
    memory: MemoryBank,
    metrics: MetricsCollector,
    tracer: AgentTracer,
    activity: ActivityLog,
    responder: Responder,
    json: bool,
}

impl App {
    fn new(config: AppConfig, json: bool) -> Self {
        let observability = &config.observability;
        let metrics = MetricsCollector::with_max_errors(observability.max_error_log);
        let tracer = AgentTracer::new(&observability.traces_dir);
        let activity = ActivityLog::new(
            &observability.activity_log_path,
            observability.max_activity_entries,
        );

        Self {
            sessions: SessionManager::from_config(&config.memory),
            memory: MemoryBank::from_config(&config.memory),
            metrics,
            tracer,
            activity,
            responder: Responder,
            json,
            config,
        }
    }

    fn instrumentation(&self) -> Instrumentation<'_> {
        Instrumentation::new(&self.metrics)
            .with_tracer(&self.tracer)
            .with_activity_log(&self.activity)
    }

    /// Answer `query` and record the exchange on the session
    fn ask(&self, session_id: &str, query: &str) -> Result<String> {
        let response = self
            .instrumentation()
            .run(AGENT_NAME, "assist", || self.responder.assist(query))?;

        let mut metadata = Metadata::new();
        metadata.insert("agent".to_string(), json!(AGENT_NAME));
        self.sessions
            .record_interaction(session_id, query, &response, Some(metadata))?;
        Ok(response)
    }

    /// Evict sessions idle past the configured timeout
    ///
    /// Returns the session to keep using: `session_id` itself, or a fresh
    /// session for `student_id` when it was evicted.
    fn sweep_idle_at(
        &self,
        now: DateTime<Utc>,
        student_id: &str,
        session_id: &str,
    ) -> Result<String> {
        let removed = self
            .sessions
            .cleanup_inactive_at(now, self.sessions.timeout_minutes());
        if !removed.iter().any(|id| id == session_id) {
            return Ok(session_id.to_string());
        }

        info!(session_id, "session expired, starting a new one");
        let session = self.sessions.create_session_at(student_id, now)?;
        Ok(session.session_id().to_string())
    }

    /// End the session, remember its summary and save the metrics report
    fn finish(&self, student_id: &str, session_id: &str) -> Result<()> {
        if let Some(summary) = self.sessions.end_session(session_id) {
            if let Err(e) = self
                .memory
                .add_memory(student_id, "session_summary", serde_json::to_value(&summary)?)
            {
                warn!(student_id, error = %e, "failed to store session summary");
            }
        }

        let path = &self.config.observability.metrics_report_path;
        self.metrics
            .save_metrics(path)
            .with_context(|| format!("failed to save metrics to {}", path.display()))?;
        info!(path = %path.display(), "metrics report saved");
        Ok(())
    }

    fn print<T: Serialize>(&self, value: &T, human: impl FnOnce(&T)) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human(value);
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref(), cli.data_dir.clone())?;
    if cli.verbose {
        config.observability.log_level = "debug".to_string();
    }
    logging::init(&config.observability).context("failed to initialize logging")?;
    info!(data_dir = %config.memory.data_dir.display(), "starting EduMentor");

    let app = App::new(config, cli.json);
    let student_id = cli.student.as_str();

    match cli.command.unwrap_or(Commands::Demo) {
        Commands::Demo => run_demo(&app, student_id),
        Commands::Interactive => run_interactive(&app, student_id),
        Commands::Query { text } => run_query(&app, student_id, &text),
        Commands::Metrics => show_metrics(&app),
        Commands::Memory { command } => handle_memory_command(&app, student_id, command),
        Commands::Sessions => show_sessions(&app),
    }
}

fn run_demo(app: &App, student_id: &str) -> Result<()> {
    let session = app.sessions.create_session(student_id)?;
    let session_id = session.session_id();
    println!("Running EduMentor demo for {student_id}");

    for (i, query) in DEMO_QUERIES.iter().enumerate() {
        println!("\n{}", "=".repeat(50));
        println!("Demo {}: {query}", i + 1);
        println!("{}", "=".repeat(50));

        let response = app.ask(session_id, query)?;
        println!("Response: {}", format_response(&response, DEMO_RESPONSE_CHARS));
    }

    if let Some(session) = app.sessions.get_session(session_id) {
        let summary = session.get_session_summary();
        println!("\nSubjects studied: {}", summary.active_subjects.join(", "));
        println!("Recent topics: {}", summary.recent_topics.join(", "));
    }

    app.finish(student_id, session_id)?;
    print_report(&app.metrics.get_metrics_report());
    Ok(())
}

fn run_query(app: &App, student_id: &str, text: &str) -> Result<()> {
    let session = app.sessions.create_session(student_id)?;
    let outcome = app.ask(session.session_id(), text);
    app.finish(student_id, session.session_id())?;

    let response = outcome?;
    app.print(&json!({ "query": text, "response": response }), |_| {
        println!("Query: {text}");
        println!("Response: {response}");
    })
}

fn run_interactive(app: &App, student_id: &str) -> Result<()> {
    let mut session_id = app
        .sessions
        .create_session(student_id)?
        .session_id()
        .to_string();
    println!("Interactive mode. Type 'help' for commands, 'exit' to quit.");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("\nStudent query: ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let input = line.trim();
        let command = input.to_lowercase();

        if matches!(command.as_str(), "" | "exit" | "quit") {
            if command.is_empty() {
                continue;
            }
            break;
        }

        let current = app.sweep_idle_at(Utc::now(), student_id, &session_id)?;
        if current != session_id {
            println!("Your previous session expired, starting a new one.");
            session_id = current;
        }

        match command.as_str() {
            "help" => {
                println!("Commands:");
                println!("  help     Show this help");
                println!("  stats    Session and agent statistics");
                println!("  profile  Stored memories of this student");
                println!("  exit     Close the session");
            }
            "stats" => {
                if let Some(session) = app.sessions.get_session(&session_id) {
                    let summary = session.get_session_summary();
                    println!("Questions asked: {}", summary.total_interactions);
                    println!("Subjects: {}", summary.active_subjects.join(", "));
                }
                let system = app.sessions.get_system_metrics();
                println!("Live sessions: {} ({} active)", system.total_sessions, system.active_sessions);
                print_report(&app.metrics.get_metrics_report());
            }
            "profile" => print_profile(app, student_id),
            _ => match app.ask(&session_id, input) {
                Ok(response) => println!("\nResponse:\n{response}"),
                Err(e) => println!("Error: {e}"),
            },
        }
    }

    println!("Closing EduMentor. Have a great learning session!");
    app.finish(student_id, &session_id)
}

fn show_metrics(app: &App) -> Result<()> {
    let path = &app.config.observability.metrics_report_path;
    if !path.exists() {
        println!("No metrics report yet at {}", path.display());
        return Ok(());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let report: MetricsReport = serde_json::from_str(&content)
        .with_context(|| format!("invalid metrics report {}", path.display()))?;
    app.print(&report, print_report)
}

fn show_sessions(app: &App) -> Result<()> {
    let prior = app.sessions.prior_sessions();
    let metrics = app.sessions.get_system_metrics();
    let view = json!({ "system": metrics, "saved_sessions": prior });

    app.print(&view, |_| {
        println!("Saved sessions: {}", prior.len());
        for (session_id, record) in prior.iter() {
            println!(
                "  {session_id}: {} ({} interactions, {})",
                record.student_id,
                record.interactions_count,
                record.summary.active_subjects.join(", ")
            );
        }
        println!("Live sessions: {}", metrics.total_sessions);
        println!("  Active: {}", metrics.active_sessions);
        println!("  Interactions: {}", metrics.total_interactions);
        println!("  Unique students: {}", metrics.unique_students);
    })
}

fn handle_memory_command(app: &App, student_id: &str, command: MemoryCommands) -> Result<()> {
    match command {
        MemoryCommands::Add {
            memory_type,
            content,
        } => {
            let value = serde_json::from_str(&content).unwrap_or(serde_json::Value::String(content));
            app.memory
                .add_memory(student_id, &memory_type, value)
                .context("failed to persist memory")?;
            println!("✓ Stored {memory_type} memory for {student_id}");
            Ok(())
        }
        MemoryCommands::List { memory_type } => {
            let entries = app
                .memory
                .get_student_memories(student_id, memory_type.as_deref());
            app.print(&entries, |entries| {
                println!("{} memories for {student_id}", entries.len());
                for entry in entries {
                    println!("  [{}] {}", entry.timestamp.to_rfc3339(), entry.content);
                }
            })
        }
        MemoryCommands::Profile => {
            if app.json {
                app.print(&app.memory.get_student_profile(student_id), |_| {})
            } else {
                print_profile(app, student_id);
                Ok(())
            }
        }
    }
}

fn print_profile(app: &App, student_id: &str) {
    let profile = app.memory.get_student_profile(student_id);
    println!("Student: {}", profile.student_id);
    println!("  Memories: {}", profile.total_memories);
    println!("  Types: {}", profile.memory_types.join(", "));
}

fn print_report(report: &MetricsReport) {
    let overall = &report.overall;
    println!("\nEduMentor Metrics");
    println!("=================");
    println!("Queries: {} ({} successful)", overall.total_queries, overall.successful_queries);
    println!("Success rate: {:.2}%", overall.success_rate);
    println!("Avg response time: {:.3}s", overall.avg_response_time);
    println!("Errors: {}", overall.total_errors);

    for (agent, performance) in &report.agent_performance {
        println!(
            "  {agent}: {} calls, {:.1}% success, {:.3}s avg",
            performance.call_count, performance.success_rate, performance.avg_response_time
        );
    }

    for error in &report.recent_errors {
        println!("  ! {} {}: {}", error.agent, error.error_type, error.error);
    }
}
