//! End-to-end conversation rounds with scripted backends.
//!
//! Tests cover:
//! - Mediator escalation after repeated "stuck" replies
//! - Escalation counters surviving a session restart via the journal
//! - READ directives feeding file content back into the agent's transcript
//! - Image batches where the image service fails for one request
//! - A full workflow resetting every agent at the end

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use sitecrew::agent::{Role, Speaker};
use sitecrew::error::BackendError;
use sitecrew::executor::{ActionExecutor, ActionOutcome};
use sitecrew::image_gen::{ImageBackend, ImageGenerator, ImageOutcome};
use sitecrew::journal::Journal;
use sitecrew::llm::{Message, ModelBackend};
use sitecrew::output::Console;
use sitecrew::roster::{Preset, Roster};
use sitecrew::store::FileEntry;
use sitecrew::studio::{Session, Workflow};

/// Replies per agent name, in order; "ok" once a script runs out.
struct ScriptedModel {
    scripts: Mutex<HashMap<String, Vec<String>>>,
    fallback: HashMap<String, String>,
}

impl ScriptedModel {
    fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback: HashMap::new(),
        }
    }

    fn script(self, agent: &str, replies: &[&str]) -> Self {
        self.scripts.lock().unwrap().insert(
            agent.to_string(),
            replies.iter().rev().map(|s| s.to_string()).collect(),
        );
        self
    }

    /// Reply used for `agent` after its script is exhausted.
    fn always(mut self, agent: &str, reply: &str) -> Self {
        self.fallback.insert(agent.to_string(), reply.to_string());
        self
    }
}

#[async_trait]
impl ModelBackend for ScriptedModel {
    async fn complete(&self, transcript: &[Message], _new_turn: &str) -> Result<String, BackendError> {
        let intro = &transcript[0].content;
        let name = intro
            .strip_prefix("Your name is ")
            .and_then(|rest| rest.split(" and your personality").next())
            .unwrap_or_default()
            .to_string();
        if let Some(reply) = self.scripts.lock().unwrap().get_mut(&name).and_then(Vec::pop) {
            return Ok(reply);
        }
        Ok(self.fallback.get(&name).cloned().unwrap_or_else(|| "ok".to_string()))
    }
}

/// Writes a stub image unless the destination mentions "broken".
struct FlakyImages;

#[async_trait]
impl ImageBackend for FlakyImages {
    async fn generate(&self, _prompt: &str, _style: &str, dest: &Path) -> Result<(), BackendError> {
        if dest.to_string_lossy().contains("broken") {
            return Err(BackendError::Timeout(std::time::Duration::from_secs(180)));
        }
        tokio::fs::write(dest, b"generated").await.unwrap();
        Ok(())
    }
}

async fn open(dir: &Path, preset: Preset, model: ScriptedModel) -> Session {
    Session::open(
        "bakery",
        dir,
        Roster::preset(preset),
        Box::new(model),
        ActionExecutor::new(ImageGenerator::new(Some(Box::new(FlakyImages))).with_size(32, 24), None),
    )
    .await
    .unwrap()
    .with_console(Console::buffered())
}

#[tokio::test]
async fn stuck_replies_bring_in_the_mediator_next_round() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new().always("Developer", "I'm stuck on the grid layout again.");
    let mut session = open(dir.path(), Preset::Full, model).await;

    let first = session.run_round("implement the code").await;
    assert_eq!(first.agents, ["Developer"]);
    assert_eq!(first.turns.len(), 3);
    assert_eq!(session.project_state().stuck_count, 3);

    // Nothing in this message triggers the mediator by itself.
    let second = session.run_round("implement the footer code").await;
    assert!(second.agents.contains(&"Rubber duck".to_string()));
    assert_eq!(second.agents[0], "Developer");
}

#[tokio::test]
async fn escalation_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let project = dir.path().join("bakery");
    let db = dir.path().join("sitecrew.db");

    {
        let model = ScriptedModel::new().always("Developer", "Still stuck, there's a problem.");
        let mut session = open(&project, Preset::Full, model)
            .await
            .with_journal(Journal::open(&db).unwrap())
            .unwrap();
        session.run_round("implement the code").await;
        assert_eq!(session.project_state().stuck_count, 3);
    }

    let mut session = open(&project, Preset::Full, ScriptedModel::new())
        .await
        .with_journal(Journal::open(&db).unwrap())
        .unwrap();
    assert_eq!(session.project_state().stuck_count, 3);
    let report = session.run_round("implement the code").await;
    assert!(report.agents.contains(&"Rubber duck".to_string()));

    let history = Journal::open(&db).unwrap().history("bakery").unwrap();
    assert!(history.iter().any(|e| e.kind == "round"));
    assert!(history.iter().filter(|e| e.kind == "turn").count() >= 6);
}

#[tokio::test]
async fn read_directive_appends_file_content_to_transcript() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>Sweet Treats</h1>").unwrap();

    let model = ScriptedModel::new().script(
        "Developer",
        &["Let me look first.\n\nFILE_ACTION: READ\nFILENAME: index.html\n", "Looks good, agreed."],
    );
    let mut session = open(dir.path(), Preset::Studio, model).await;
    let report = session.run_round("implement the code").await;

    assert_eq!(
        report.turns[0].outcomes,
        [ActionOutcome::Read {
            path: "index.html".into(),
            entry: FileEntry::Text("<h1>Sweet Treats</h1>".into()),
        }]
    );
    assert_eq!(report.turns.len(), 2);

    let developer = session.roster().by_role(&Role::Developer).unwrap();
    let transcript = developer.transcript();
    let read_at = transcript
        .iter()
        .position(|t| t.speaker == Speaker::System && t.text.starts_with("Content of index.html"))
        .expect("content turn");
    assert!(transcript[read_at].text.contains("<h1>Sweet Treats</h1>"));
    // The content turn lands before the agent's next reply.
    let last = transcript.len() - 1;
    assert!(read_at < last);
    assert_eq!(transcript[last].text, "Looks good, agreed.");
}

#[tokio::test]
async fn two_images_one_backend_failure() {
    let dir = tempfile::tempdir().unwrap();
    let reply = "\
Here are the visuals.

IMAGE_ACTION: GENERATE
**FILENAME:** images/hero.png
PROMPT: A warm bakery storefront at dawn
STYLE: photorealistic

IMAGE_ACTION: GENERATE
FILENAME: images/broken.png
PROMPT: Fresh croissants on a marble counter

Let's move forward.";
    let model = ScriptedModel::new().script("Designer", &[reply]);
    let mut session = open(dir.path(), Preset::Studio, model).await;

    let report = session.run_round("design the layout with images").await;
    assert_eq!(report.agents, ["Client", "Designer"]);

    let outcomes = &report.turns[1].outcomes;
    assert_eq!(outcomes.len(), 2);
    assert_eq!(
        outcomes[0],
        ActionOutcome::Image {
            path: "images/hero.png".into(),
            result: ImageOutcome::Generated,
        }
    );
    assert!(outcomes[1].is_failure());

    let files = session.store().files();
    assert_eq!(files.get("images/hero.png"), Some(&FileEntry::Image));
    assert_eq!(files.get("images/broken.png"), Some(&FileEntry::Image));
    assert!(dir.path().join("images/broken.png").exists());
}

#[tokio::test]
async fn workflow_runs_every_scenario_and_resets_agents() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = open(dir.path(), Preset::Studio, ScriptedModel::new()).await;
    let reports = session
        .run_workflow(Workflow::Improve, "Make the menu page easier to read")
        .await;
    assert_eq!(reports.len(), 3);
    for agent in session.roster().agents() {
        assert_eq!(agent.transcript().len(), 1);
    }
    let status_blocks = session
        .console()
        .lines()
        .iter()
        .filter(|l| l.as_str() == "=== PROJECT STATUS ===")
        .count();
    assert_eq!(status_blocks, 3);
}
