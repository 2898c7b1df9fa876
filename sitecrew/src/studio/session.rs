//! Conversation rounds over one project.
//!
//! A round analyzes its seed message, picks the agents, then runs up to
//! `max_exchanges` passes over them. Each turn's reply becomes the next
//! agent's prompt; directives in the reply are applied before the next
//! turn starts.

use std::path::Path;

use anyhow::Result;

use super::workflow::Workflow;
use crate::agent::{Capabilities, Role};
use crate::context::{ContextAnalyzer, Phase, ProjectState};
use crate::directive::{self, ActionDirective};
use crate::error::StoreError;
use crate::executor::{ActionExecutor, ActionOutcome};
use crate::journal::Journal;
use crate::llm::ModelBackend;
use crate::output::Console;
use crate::roster::Roster;
use crate::scheduler::SchedulerPolicy;
use crate::store::ProjectFileStore;

/// A reply containing one of these hands the floor back early.
const HANDOFF_PHRASES: &[&str] = &["need designer", "call the manager", "get qa"];
/// The last reply of an exchange containing one of these ends the round.
const CLOSING_PHRASES: &[&str] = &["that sounds good", "agreed", "let's move forward", "next step"];

fn contains_phrase(text: &str, phrases: &[&str]) -> bool {
    let lower = text.to_lowercase();
    phrases.iter().any(|p| lower.contains(p))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    NoActiveAgents,
    Closing,
    ExchangesExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Idle,
    Running { exchange: usize },
    Ended(EndReason),
}

#[derive(Debug, Clone)]
pub struct TurnRecord {
    pub exchange: usize,
    pub agent: String,
    pub reply: String,
    pub outcomes: Vec<ActionOutcome>,
    pub handoff: bool,
}

#[derive(Debug, Clone)]
pub struct RoundReport {
    pub phase: Phase,
    pub agents: Vec<String>,
    pub turns: Vec<TurnRecord>,
    pub end: EndReason,
}

fn permitted(caps: &Capabilities, directive: &ActionDirective) -> bool {
    match directive {
        ActionDirective::CreateFile { .. }
        | ActionDirective::ModifyFile { .. }
        | ActionDirective::RunCommand { .. } => caps.can_write_files,
        ActionDirective::ReadFile { .. } => caps.can_read_files || caps.can_write_files,
        ActionDirective::GenerateImage { .. } => caps.can_generate_images,
    }
}

fn analyzer_for(roster: &Roster, state: ProjectState, phase: Phase) -> ContextAnalyzer {
    ContextAnalyzer::new(state, phase)
        .with_feedback_agent(roster.by_role(&Role::Client).map(|a| a.name.as_str()))
        .with_tester_agent(roster.by_role(&Role::Qa).map(|a| a.name.as_str()))
}

/// One project, one team. Strictly sequential: a turn, including its
/// backend call and every resulting action, finishes before the next.
pub struct Session {
    project: String,
    roster: Roster,
    store: ProjectFileStore,
    analyzer: ContextAnalyzer,
    policy: SchedulerPolicy,
    executor: ActionExecutor,
    backend: Box<dyn ModelBackend>,
    journal: Option<Journal>,
    console: Console,
    max_exchanges: usize,
    debug: bool,
    state: RoundState,
}

impl Session {
    /// Open the project at `root` and load its files.
    pub async fn open(
        project: &str,
        root: &Path,
        roster: Roster,
        backend: Box<dyn ModelBackend>,
        executor: ActionExecutor,
    ) -> Result<Self, StoreError> {
        let mut store = ProjectFileStore::open(root).await?;
        store.load_tree().await?;
        let analyzer = analyzer_for(&roster, ProjectState::default(), Phase::Planning);
        Ok(Self {
            project: project.to_string(),
            roster,
            store,
            analyzer,
            policy: SchedulerPolicy::default(),
            executor,
            backend,
            journal: None,
            console: Console::stdout(),
            max_exchanges: 3,
            debug: false,
            state: RoundState::Idle,
        })
    }

    /// Attach a journal and restore the counters it holds for this project.
    pub fn with_journal(mut self, journal: Journal) -> Result<Self> {
        if let Some((state, phase)) = journal.load_state(&self.project)? {
            tracing::info!(
                project = %self.project,
                stuck = state.stuck_count,
                satisfaction = state.satisfaction_level,
                %phase,
                "Restored project state"
            );
            self.analyzer = analyzer_for(&self.roster, state, phase);
        }
        self.journal = Some(journal);
        Ok(self)
    }

    pub fn with_policy(mut self, policy: SchedulerPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_exchanges(mut self, n: usize) -> Self {
        self.max_exchanges = n.max(1);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn store(&self) -> &ProjectFileStore {
        &self.store
    }

    pub fn project_state(&self) -> &ProjectState {
        self.analyzer.state()
    }

    pub fn phase(&self) -> Phase {
        self.analyzer.phase()
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn reset_all_agents(&mut self) {
        self.roster.reset_all();
    }

    fn record(&self, kind: &str, key: &str, value: &str) {
        if let Some(journal) = &self.journal
            && let Err(e) = journal.log(&self.project, kind, key, value)
        {
            tracing::warn!(error = %e, "Failed to write journal entry");
        }
    }

    fn persist(&self) {
        if let Some(journal) = &self.journal
            && let Err(e) = journal.save_state(&self.project, self.analyzer.state(), self.analyzer.phase())
        {
            tracing::warn!(error = %e, "Failed to save project state");
        }
    }

    /// Run one round seeded with `seed`.
    pub async fn run_round(&mut self, seed: &str) -> RoundReport {
        let ctx = self.analyzer.analyze(seed);
        let active = self.policy.select(&ctx, &self.roster);
        let agents: Vec<String> = active
            .iter()
            .filter_map(|&i| self.roster.get(i))
            .map(|a| a.name.clone())
            .collect();
        let files: Vec<String> = self.store.files().keys().cloned().collect();
        self.console.round_banner(ctx.phase.as_str(), &agents, &files);
        tracing::info!(project = %self.project, phase = %ctx.phase, agents = ?agents, "Round started");
        self.record("round", ctx.phase.as_str(), seed);

        let mut turns = Vec::new();
        let mut end = EndReason::ExchangesExhausted;
        if active.is_empty() {
            self.console.status("💤", "No agent picked up this message");
            end = EndReason::NoActiveAgents;
        } else {
            let mut message = seed.to_string();
            let mut speaker = "user".to_string();
            for exchange in 0..self.max_exchanges {
                self.state = RoundState::Running { exchange };
                for &idx in &active {
                    let Some(turn) = self.take_turn(idx, exchange, &speaker, &message).await else {
                        continue;
                    };
                    speaker = turn.agent.clone();
                    message = turn.reply.clone();
                    let handoff = turn.handoff;
                    turns.push(turn);
                    if handoff {
                        tracing::debug!(agent = %speaker, "Hand-off requested");
                        break;
                    }
                }
                if contains_phrase(&message, CLOSING_PHRASES) {
                    end = EndReason::Closing;
                    break;
                }
            }
        }

        self.state = RoundState::Ended(end);
        self.persist();
        tracing::info!(project = %self.project, turns = turns.len(), end = ?end, "Round ended");
        RoundReport {
            phase: ctx.phase,
            agents,
            turns,
            end,
        }
    }

    async fn take_turn(
        &mut self,
        idx: usize,
        exchange: usize,
        speaker: &str,
        message: &str,
    ) -> Option<TurnRecord> {
        let summary = (!self.store.is_empty()).then(|| self.store.summary());
        let agent = self.roster.get_mut(idx)?;
        let reply = agent
            .respond(self.backend.as_ref(), speaker, message, summary.as_deref())
            .await;
        let name = agent.name.clone();
        let caps = agent.capabilities;

        self.console.say(&name, &reply);
        self.record("turn", &name, &reply);

        let mut outcomes = Vec::new();
        if caps.any() {
            if self.debug {
                for line in directive::debug_lines(&reply) {
                    self.console.status("🔍", &line);
                }
            }
            let parsed = directive::parse(&reply);
            for d in &parsed.diagnostics {
                tracing::debug!(agent = %name, line = d.line, reason = ?d.reason, "Dropped directive block");
            }
            let mut allowed = Vec::with_capacity(parsed.directives.len());
            for d in parsed.directives {
                if permitted(&caps, &d) {
                    allowed.push(d);
                } else {
                    tracing::warn!(agent = %name, directive = ?d, "Agent lacks capability, directive skipped");
                }
            }

            outcomes = self.executor.apply(&mut self.store, &allowed).await;
            for outcome in &outcomes {
                let line = outcome.to_string();
                self.console.status("🔧", &line);
                self.record("action", &name, &line);
                if let ActionOutcome::Read { path, entry } = outcome
                    && let Some(agent) = self.roster.get_mut(idx)
                {
                    agent.record_file_content(path, entry.as_str());
                }
            }
        }

        self.analyzer.update(&name, &reply);
        let handoff = contains_phrase(&reply, HANDOFF_PHRASES);
        Some(TurnRecord {
            exchange,
            agent: name,
            reply,
            outcomes,
            handoff,
        })
    }

    /// Print the project structure with sizes.
    pub async fn show_status(&mut self) {
        match self.store.structure().await {
            Ok(structure) => self.console.file_tree(&structure),
            Err(e) => self.console.error(&format!("Could not read project: {e}")),
        }
    }

    /// Run every scenario of `workflow`, then reset the team.
    pub async fn run_workflow(&mut self, workflow: Workflow, request: &str) -> Vec<RoundReport> {
        self.console
            .heading(&format!("{}: {}", workflow.title(), self.project));
        let mut reports = Vec::new();
        for (n, scenario) in workflow.scenarios(request).into_iter().enumerate() {
            self.console
                .heading(&format!("SCENARIO {}: {}", n + 1, scenario.title));
            reports.push(self.run_round(&scenario.prompt).await);
            self.show_status().await;
        }
        self.reset_all_agents();
        reports
    }
}
