//! Team agents: persona, triggers, capabilities and transcript.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::llm::{self, Message, ModelBackend};

/// Stable role identifier. Escalation looks agents up by role, never by
/// roster position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Developer,
    Client,
    Designer,
    Qa,
    Manager,
    Boss,
    RubberDuck,
    #[serde(untagged)]
    Custom(String),
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Developer => write!(f, "developer"),
            Role::Client => write!(f, "client"),
            Role::Designer => write!(f, "designer"),
            Role::Qa => write!(f, "qa"),
            Role::Manager => write!(f, "manager"),
            Role::Boss => write!(f, "boss"),
            Role::RubberDuck => write!(f, "rubber_duck"),
            Role::Custom(s) => write!(f, "{s}"),
        }
    }
}

/// What an agent is allowed to do with the project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub can_write_files: bool,
    #[serde(default)]
    pub can_read_files: bool,
    #[serde(default)]
    pub can_generate_images: bool,
}

impl Capabilities {
    pub fn any(&self) -> bool {
        self.can_write_files || self.can_read_files || self.can_generate_images
    }
}

/// Who produced a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    /// Instructions and synthetic file-content turns.
    System,
    /// Anyone other than this agent.
    Other,
    /// This agent's own replies.
    Own,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

/// One simulated team member.
#[derive(Debug, Clone)]
pub struct Agent {
    pub name: String,
    pub role: Role,
    pub persona: String,
    pub triggers: Vec<String>,
    pub capabilities: Capabilities,
    transcript: Vec<Turn>,
}

impl Agent {
    pub fn new(
        name: &str,
        role: Role,
        persona: &str,
        triggers: &[&str],
        capabilities: Capabilities,
    ) -> Self {
        let mut agent = Self {
            name: name.to_string(),
            role,
            persona: persona.to_string(),
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
            capabilities,
            transcript: Vec::new(),
        };
        agent.reset();
        agent
    }

    /// Restore the transcript to the single instruction turn.
    pub fn reset(&mut self) {
        self.transcript = vec![Turn {
            speaker: Speaker::System,
            text: self.intro(),
        }];
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    fn intro(&self) -> String {
        let mut text = format!(
            "Your name is {} and your personality is {}.",
            self.name, self.persona
        );
        let instructions = directive_instructions(&self.capabilities);
        if !instructions.is_empty() {
            text.push_str("\n\n");
            text.push_str(&instructions);
        }
        text
    }

    /// True if any trigger occurs in the phase, the keyword set, or the
    /// last message.
    pub fn should_activate(&self, ctx: &Context) -> bool {
        let phase = ctx.phase.as_str();
        self.triggers.iter().any(|t| {
            phase.contains(t.as_str())
                || ctx.keywords.contains(t)
                || ctx.last_message.contains(t.as_str())
        })
    }

    /// Append a turn said by someone else.
    pub fn hear(&mut self, speaker: &str, text: &str) {
        self.transcript.push(Turn {
            speaker: Speaker::Other,
            text: format!("{speaker}: {text}"),
        });
    }

    /// Append a synthetic file-content turn so later steps can see it.
    pub fn record_file_content(&mut self, path: &str, content: &str) {
        self.transcript.push(Turn {
            speaker: Speaker::System,
            text: format!("Content of {path}:\n```\n{content}\n```"),
        });
    }

    /// Transcript in backend message form.
    pub fn messages(&self) -> Vec<Message> {
        self.transcript
            .iter()
            .map(|t| match t.speaker {
                Speaker::System => Message::new("system", t.text.clone()),
                Speaker::Other => Message::new("user", t.text.clone()),
                Speaker::Own => Message::new("assistant", t.text.clone()),
            })
            .collect()
    }

    /// Ask the backend for this agent's next reply.
    ///
    /// `files_summary` (names and sizes) is appended for agents that touch
    /// the project. A backend failure becomes an `Error: ...` reply; it is
    /// recorded like any other reply and never aborts the round.
    pub async fn respond(
        &mut self,
        backend: &dyn ModelBackend,
        speaker: &str,
        prompt: &str,
        files_summary: Option<&str>,
    ) -> String {
        let mut context_prompt = prompt.to_string();
        if let Some(summary) = files_summary
            && self.capabilities.any()
        {
            context_prompt.push_str("\n\n");
            context_prompt.push_str(summary);
        }

        let new_turn = format!("{speaker}: {context_prompt}");
        let reply = match backend.complete(&self.messages(), &new_turn).await {
            Ok(raw) => llm::filter_reasoning(&raw),
            Err(e) => {
                tracing::warn!(agent = %self.name, error = %e, "Model backend failed");
                format!("Error: {e}")
            }
        };

        self.hear(speaker, prompt);
        self.transcript.push(Turn {
            speaker: Speaker::Own,
            text: reply.clone(),
        });
        reply
    }
}

/// Format instructions for the directive grammar, by capability.
pub fn directive_instructions(caps: &Capabilities) -> String {
    let mut out = Vec::new();
    if caps.can_write_files {
        out.push(
            r#"When you need to create or modify files, use this format:

FILE_ACTION: CREATE
FILENAME: file.ext
CONTENT:
```
[file content here]
```

FILE_ACTION: MODIFY
FILENAME: file.ext
CHANGES: [describe what you're changing]
CONTENT:
```
[new file content here]
```

To run a command in the project directory:

FILE_ACTION: RUN
COMMAND: [command line]

Always use this exact format when working with files."#,
        );
    }
    if caps.can_read_files {
        out.push(
            r#"When you need to see the current content of a file, use this format:

FILE_ACTION: READ
FILENAME: file.ext

The file content will be shown to you before your next turn."#,
        );
    }
    if caps.can_generate_images {
        out.push(
            r#"When you need to generate images, use this format:

IMAGE_ACTION: GENERATE
FILENAME: images/image.png
PROMPT: [detailed description of the image you want to generate]
STYLE: [optional style guidance like "photorealistic", "illustration", "minimalist", etc.]

Always be very descriptive in your prompts for better image generation."#,
        );
    }
    out.join("\n\n")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::context::{Phase, ProjectState};
    use crate::error::BackendError;

    struct Echo {
        seen: Mutex<Vec<(Vec<Message>, String)>>,
        reply: Result<String, ()>,
    }

    #[async_trait]
    impl ModelBackend for Echo {
        async fn complete(&self, transcript: &[Message], new_turn: &str) -> Result<String, BackendError> {
            self.seen
                .lock()
                .unwrap()
                .push((transcript.to_vec(), new_turn.to_string()));
            self.reply
                .clone()
                .map_err(|_| BackendError::Unavailable("connection refused".into()))
        }
    }

    fn dev() -> Agent {
        Agent::new(
            "Developer",
            Role::Developer,
            "a web developer",
            &["development", "code", "stuck"],
            Capabilities {
                can_write_files: true,
                can_read_files: true,
                can_generate_images: false,
            },
        )
    }

    fn ctx(phase: Phase, keywords: &[&str], msg: &str) -> Context {
        Context {
            phase,
            keywords: keywords.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            last_message: msg.to_string(),
            project: ProjectState::default(),
        }
    }

    #[test]
    fn activation_by_phase_keyword_or_message() {
        let a = dev();
        assert!(a.should_activate(&ctx(Phase::Development, &[], "")));
        assert!(a.should_activate(&ctx(Phase::Planning, &["stuck"], "")));
        assert!(a.should_activate(&ctx(Phase::Planning, &[], "write some code")));
        assert!(!a.should_activate(&ctx(Phase::Planning, &[], "pick colors")));
    }

    #[test]
    fn intro_carries_capability_instructions() {
        let a = dev();
        let intro = &a.transcript()[0].text;
        assert!(intro.starts_with("Your name is Developer"));
        assert!(intro.contains("FILE_ACTION: CREATE"));
        assert!(intro.contains("FILE_ACTION: READ"));
        assert!(!intro.contains("IMAGE_ACTION"));
    }

    #[tokio::test]
    async fn respond_filters_reasoning_and_records_turns() {
        let backend = Echo {
            seen: Mutex::new(Vec::new()),
            reply: Ok("<think>hmm</think>On it.".into()),
        };
        let mut a = dev();
        let reply = a
            .respond(&backend, "user", "Build the homepage", Some("Current project files:\n- a.html: 3 characters\n"))
            .await;
        assert_eq!(reply, "On it.");

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].0.len(), 1);
        assert!(seen[0].1.starts_with("user: Build the homepage"));
        assert!(seen[0].1.contains("- a.html: 3 characters"));

        assert_eq!(a.transcript().len(), 3);
        assert_eq!(a.transcript()[1].text, "user: Build the homepage");
        assert_eq!(a.transcript()[2].speaker, Speaker::Own);
    }

    #[tokio::test]
    async fn backend_failure_becomes_error_reply() {
        let backend = Echo {
            seen: Mutex::new(Vec::new()),
            reply: Err(()),
        };
        let mut a = dev();
        let reply = a.respond(&backend, "user", "hi", None).await;
        assert!(reply.starts_with("Error: backend unavailable"));
    }

    #[tokio::test]
    async fn reset_restores_initial_transcript() {
        let backend = Echo {
            seen: Mutex::new(Vec::new()),
            reply: Ok("ok".into()),
        };
        let mut a = dev();
        let initial = a.transcript().to_vec();
        a.respond(&backend, "user", "hi", None).await;
        a.record_file_content("index.html", "<p/>");
        assert_eq!(a.transcript().len(), 4);
        a.reset();
        assert_eq!(a.transcript(), initial.as_slice());
    }
}
