//! Console entry point.
//!
//! The product UI is a web client; this binary exists so the chat pipeline
//! can be exercised end to end from a terminal.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Build the LLM client and the reasoning engine.
//! 4. Read lines from stdin; stream each turn's events to stdout.
//!
//! # Commands
//!
//! * `:tools`      - list the specialized modes
//! * `:tool <id>`  - activate a mode (`:tool none` to clear)
//! * `:verify`     - mark the license as verified for this session
//! * `:quit`       - exit

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use clinscribe::config::AppConfig;
use clinscribe::engine::{
    find_tool, ChatEvent, ChatTurn, ReasoningEngine, StructuredResult, ToolProfile, TurnRequest,
    TOOLS,
};
use clinscribe::knowledge::KnowledgeBase;
use clinscribe::llm::GeminiClient;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = AppConfig::load()?;
    if config.llm.api_key.is_none() {
        eprintln!(
            "warning: no API key configured; set llm.api_key in settings.toml \
             before sending a message"
        );
    }

    let client = Arc::new(GeminiClient::from_config(&config.llm));
    let engine = ReasoningEngine::new(
        client,
        Arc::new(KnowledgeBase::standard()),
        config.profile.doctor,
        config.profile.language.clone(),
    );

    println!("clinscribe console ({} mode). :tools lists modes, :quit exits.", config.profile.language);

    let mut history: Vec<ChatTurn> = Vec::new();
    let mut active_tool: Option<ToolProfile> = None;
    let mut verified = false;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt(&active_tool);
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        // ── Commands ─────────────────────────────────────────────────────
        if line == ":quit" {
            break;
        }
        if line == ":tools" {
            for tool in TOOLS {
                println!("  {:<16} {}", tool.id, tool.title);
            }
            continue;
        }
        if line == ":verify" {
            verified = true;
            println!("license marked as verified for this session");
            continue;
        }
        if let Some(id) = line.strip_prefix(":tool ") {
            let id = id.trim();
            if id == "none" {
                active_tool = None;
                println!("general chat mode");
            } else {
                match find_tool(id) {
                    Some(tool) => {
                        active_tool = Some(*tool);
                        println!("mode: {}", tool.title);
                    }
                    None => eprintln!("unknown tool '{id}'; try :tools"),
                }
            }
            continue;
        }

        // ── One chat turn ────────────────────────────────────────────────
        let (tx, mut rx) = mpsc::channel(32);
        let turn = TurnRequest {
            message: line.clone(),
            history: history.clone(),
            tool: active_tool,
            credential_verified: verified,
        };

        let respond = engine.respond(turn, tx);
        let render = async {
            let mut reply = String::new();
            while let Some(event) = rx.recv().await {
                match event {
                    ChatEvent::TextChunk(chunk) => {
                        print!("{chunk}");
                        use std::io::Write;
                        let _ = std::io::stdout().flush();
                        reply.push_str(&chunk);
                    }
                    ChatEvent::Citations(citations) => {
                        println!("\n\nSources:");
                        for c in citations {
                            println!("  - {} <{}>", c.title, c.uri);
                        }
                    }
                    ChatEvent::Structured(result) => {
                        reply = render_structured(&result);
                        println!("{reply}");
                    }
                    ChatEvent::VerificationRequired { .. } => {
                        println!(
                            "This topic requires license verification. \
                             Use :verify, then resend your message."
                        );
                    }
                    ChatEvent::Error { message } => {
                        eprintln!("error: {message}");
                    }
                }
            }
            println!();
            reply
        };

        let ((), reply) = tokio::join!(respond, render);
        if !reply.is_empty() {
            history.push(ChatTurn::user(line));
            history.push(ChatTurn::model(reply));
        }
    }

    Ok(())
}

fn print_prompt(active_tool: &Option<ToolProfile>) {
    use std::io::Write;
    match active_tool {
        Some(tool) => print!("[{}]> ", tool.id),
        None => print!("> "),
    }
    let _ = std::io::stdout().flush();
}

/// Render a structured payload for the console: summary first, then the
/// kind-specific body.
fn render_structured(result: &StructuredResult) -> String {
    let mut out = String::new();
    out.push_str(result.summary());
    out.push('\n');

    match result {
        StructuredResult::Ddx(report) => {
            for item in &report.diagnoses {
                out.push_str(&format!(
                    "\n  [{:?}] {} - {}",
                    item.confidence, item.diagnosis, item.rationale
                ));
            }
            if !report.questions.is_empty() {
                out.push_str("\n\n  Questions to ask:");
                for q in &report.questions {
                    out.push_str(&format!("\n  - {q}"));
                }
            }
        }
        StructuredResult::Lab(report) => {
            out.push_str(&format!("\n  {}\n", report.overall_interpretation));
            for r in &report.results {
                out.push_str(&format!(
                    "\n  {:<20} {:<12} ({})  {:?}: {}",
                    r.parameter, r.value, r.reference_range, r.urgency, r.interpretation
                ));
            }
        }
        StructuredResult::Handout(report) => {
            out.push_str(&format!("\n# {}\n\n{}\n", report.title, report.introduction));
            for section in &report.sections {
                out.push_str(&format!("\n## {}\n{}\n", section.heading, section.content));
            }
            out.push_str(&format!("\n_{}_", report.disclaimer));
        }
        StructuredResult::Risk(report) => {
            out.push_str(&format!("\n  Risk level: {:?}\n", report.risk_level));
            for factor in &report.risk_factors {
                out.push_str(&format!("\n  - {factor}"));
            }
            out.push_str("\n\n  Recommendations:");
            for rec in &report.recommendations {
                out.push_str(&format!("\n  - {rec}"));
            }
        }
    }

    out
}
