//! Round context: phase classification, urgency keywords, and the
//! project-wide counters that drive escalation.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Conversation phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Design,
    Development,
    Testing,
    Planning,
    Review,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Design => "design",
            Phase::Development => "development",
            Phase::Testing => "testing",
            Phase::Planning => "planning",
            Phase::Review => "review",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        PHASE_RULES
            .iter()
            .map(|(p, _)| *p)
            .find(|p| p.as_str() == s.trim().to_ascii_lowercase())
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase keyword sets in precedence order; the first set with a hit wins.
const PHASE_RULES: &[(Phase, &[&str])] = &[
    (Phase::Design, &["design", "mockup", "ui", "layout"]),
    (Phase::Development, &["code", "develop", "implement", "feature"]),
    (Phase::Testing, &["test", "bug", "qa", "quality"]),
    (Phase::Planning, &["requirements", "spec", "need", "want"]),
    (Phase::Review, &["review", "feedback", "check"]),
];

/// Tokens lifted into `Context::keywords`.
const URGENCY_WORDS: &[&str] = &["urgent", "deadline", "stuck", "help", "problem", "bug"];

const STUCK_WORDS: &[&str] = &["stuck", "problem"];
const UNSTUCK_WORDS: &[&str] = &["solved", "fixed"];
const POSITIVE_WORDS: &[&str] = &["good", "great", "perfect", "love"];
const NEGATIVE_WORDS: &[&str] = &["bad", "terrible", "hate", "wrong"];
const PRESSURE_WORDS: &[&str] = &["deadline", "urgent", "asap"];

const SATISFACTION_UP: f64 = 0.1;
const SATISFACTION_DOWN: f64 = 0.2;
const PRESSURE_STEP: f64 = 0.1;

/// Mutable project counters. Lives for the whole session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    pub satisfaction_level: f64,
    pub deadline_pressure: f64,
    pub bugs_found: u32,
    pub stuck_count: u32,
}

impl Default for ProjectState {
    fn default() -> Self {
        Self {
            satisfaction_level: 0.7,
            deadline_pressure: 0.3,
            bugs_found: 0,
            stuck_count: 0,
        }
    }
}

/// Context for one round, computed from its seed message.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    pub phase: Phase,
    pub keywords: BTreeSet<String>,
    pub last_message: String,
    pub project: ProjectState,
}

/// Classifies messages and folds agent replies into `ProjectState`.
#[derive(Debug, Clone)]
pub struct ContextAnalyzer {
    current_phase: Phase,
    state: ProjectState,
    /// Name of the agent whose sentiment moves satisfaction.
    feedback_agent: Option<String>,
    /// Name of the agent whose bug reports are counted.
    tester_agent: Option<String>,
}

fn tokens(message: &str) -> Vec<String> {
    message
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

impl ContextAnalyzer {
    pub fn new(state: ProjectState, phase: Phase) -> Self {
        Self {
            current_phase: phase,
            state,
            feedback_agent: None,
            tester_agent: None,
        }
    }

    pub fn with_feedback_agent(mut self, name: Option<&str>) -> Self {
        self.feedback_agent = name.map(String::from);
        self
    }

    pub fn with_tester_agent(mut self, name: Option<&str>) -> Self {
        self.tester_agent = name.map(String::from);
        self
    }

    pub fn state(&self) -> &ProjectState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.current_phase
    }

    /// Classify a message. A word hits a phase keyword when it starts with
    /// it ("testing" hits "test"); with no hit the last phase carries over.
    pub fn analyze(&mut self, message: &str) -> Context {
        let words = tokens(message);
        let phase = PHASE_RULES
            .iter()
            .find(|(_, keys)| {
                words
                    .iter()
                    .any(|w| keys.iter().any(|k| w.starts_with(k)))
            })
            .map(|(p, _)| *p)
            .unwrap_or(self.current_phase);
        self.current_phase = phase;

        let keywords = words
            .into_iter()
            .filter(|w| URGENCY_WORDS.contains(&w.as_str()))
            .collect();

        Context {
            phase,
            keywords,
            last_message: message.to_string(),
            project: self.state.clone(),
        }
    }

    /// Fold one agent reply into the project counters.
    pub fn update(&mut self, agent_name: &str, response: &str) {
        let lower = response.to_lowercase();

        if contains_any(&lower, STUCK_WORDS) {
            self.state.stuck_count += 1;
        } else if contains_any(&lower, UNSTUCK_WORDS) {
            self.state.stuck_count = self.state.stuck_count.saturating_sub(1);
        }

        if self.feedback_agent.as_deref() == Some(agent_name) {
            let s = &mut self.state.satisfaction_level;
            if contains_any(&lower, POSITIVE_WORDS) {
                *s = (*s + SATISFACTION_UP).min(1.0);
            } else if contains_any(&lower, NEGATIVE_WORDS) {
                *s = (*s - SATISFACTION_DOWN).max(0.0);
            }
        }

        if self.tester_agent.as_deref() == Some(agent_name)
            && lower.contains("bug")
            && !lower.contains("no bug")
        {
            self.state.bugs_found += 1;
        }

        if contains_any(&lower, PRESSURE_WORDS) {
            self.state.deadline_pressure = (self.state.deadline_pressure + PRESSURE_STEP).min(1.0);
        }

        tracing::debug!(
            agent = agent_name,
            stuck = self.state.stuck_count,
            satisfaction = self.state.satisfaction_level,
            "Context updated"
        );
    }
}
