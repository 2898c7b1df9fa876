//! Chooses which agents speak in a round, and in what order.

use crate::agent::Role;
use crate::context::Context;
use crate::roster::Roster;

/// Escalation rules and the per-round cap.
#[derive(Debug, Clone)]
pub struct SchedulerPolicy {
    pub max_active: usize,
    /// Joins whenever more than two agents trigger.
    pub facilitator: Option<Role>,
    /// Joins when satisfaction falls below `crisis_threshold`.
    pub crisis: Option<Role>,
    pub crisis_threshold: f64,
    /// Joins when the stuck count exceeds `mediator_threshold`.
    pub mediator: Option<Role>,
    pub mediator_threshold: u32,
}

impl Default for SchedulerPolicy {
    fn default() -> Self {
        Self {
            max_active: 3,
            facilitator: Some(Role::Manager),
            crisis: Some(Role::Boss),
            crisis_threshold: 0.3,
            mediator: Some(Role::RubberDuck),
            mediator_threshold: 2,
        }
    }
}

impl SchedulerPolicy {
    /// Roster indices of the agents taking part, in speaking order.
    ///
    /// Triggered agents keep roster order. Forced agents always get a slot:
    /// the remaining slots go to the earliest triggered agents, a forced
    /// agent that also triggered keeps its roster position, and the others
    /// are appended in forcing order.
    pub fn select(&self, ctx: &Context, roster: &Roster) -> Vec<usize> {
        let triggered: Vec<usize> = roster
            .agents()
            .iter()
            .enumerate()
            .filter(|(_, a)| a.should_activate(ctx))
            .map(|(i, _)| i)
            .collect();

        let mut forced: Vec<usize> = Vec::new();
        let mut force = |role: &Option<Role>, reason: &str| {
            if let Some(idx) = role.as_ref().and_then(|r| roster.position(r))
                && !forced.contains(&idx)
            {
                tracing::debug!(agent = idx, reason, "Forcing agent into round");
                forced.push(idx);
            }
        };
        if triggered.len() > 2 {
            force(&self.facilitator, "facilitator");
        }
        if ctx.project.satisfaction_level < self.crisis_threshold {
            force(&self.crisis, "crisis");
        }
        if ctx.project.stuck_count > self.mediator_threshold {
            force(&self.mediator, "mediator");
        }

        let free_slots = self.max_active.saturating_sub(forced.len());
        let mut kept = 0;
        let mut selected: Vec<usize> = Vec::new();
        for &idx in &triggered {
            if forced.contains(&idx) {
                selected.push(idx);
            } else if kept < free_slots {
                selected.push(idx);
                kept += 1;
            }
        }
        for idx in forced {
            if !selected.contains(&idx) {
                selected.push(idx);
            }
        }
        selected.truncate(self.max_active);
        selected
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::agent::{Agent, Capabilities};
    use crate::context::{Phase, ProjectState};
    use crate::roster::Preset;

    fn agent(name: &str, role: Role, triggers: &[&str]) -> Agent {
        Agent::new(name, role, "a teammate", triggers, Capabilities::default())
    }

    fn ctx(phase: Phase, msg: &str, project: ProjectState) -> Context {
        Context {
            phase,
            keywords: BTreeSet::new(),
            last_message: msg.to_string(),
            project,
        }
    }

    fn names(roster: &Roster, picked: &[usize]) -> Vec<String> {
        picked.iter().map(|&i| roster.get(i).unwrap().name.clone()).collect()
    }

    #[test]
    fn facilitator_joins_crowded_round() {
        let roster = Roster::new(vec![
            agent("A", Role::Developer, &["shop"]),
            agent("B", Role::Client, &["shop"]),
            agent("C", Role::Designer, &["shop"]),
            agent("Facilitator", Role::Manager, &["organize"]),
        ]);
        let picked = SchedulerPolicy::default()
            .select(&ctx(Phase::Planning, "build a shop", ProjectState::default()), &roster);
        assert!(picked.len() <= 3);
        assert_eq!(names(&roster, &picked), ["A", "B", "Facilitator"]);
    }

    #[test]
    fn triggered_facilitator_keeps_roster_position() {
        let roster = Roster::new(vec![
            agent("Facilitator", Role::Manager, &["shop"]),
            agent("A", Role::Developer, &["shop"]),
            agent("B", Role::Client, &["shop"]),
            agent("C", Role::Designer, &["shop"]),
        ]);
        let picked = SchedulerPolicy::default()
            .select(&ctx(Phase::Planning, "shop", ProjectState::default()), &roster);
        assert_eq!(names(&roster, &picked), ["Facilitator", "A", "B"]);
    }

    #[test]
    fn two_triggers_need_no_facilitator() {
        let roster = Roster::preset(Preset::Studio);
        // The phase wakes Developer, "feedback" wakes Client.
        let picked = SchedulerPolicy::default().select(
            &ctx(Phase::Development, "client feedback on checkout", ProjectState::default()),
            &roster,
        );
        assert_eq!(names(&roster, &picked), ["Developer", "Client"]);
    }

    #[test]
    fn mediator_joins_when_stuck() {
        let roster = Roster::preset(Preset::Full);
        let stuck = ProjectState {
            stuck_count: 3,
            ..ProjectState::default()
        };
        let picked = SchedulerPolicy::default().select(&ctx(Phase::Testing, "pick colors", stuck), &roster);
        assert_eq!(names(&roster, &picked), ["QA", "Rubber duck"]);

        let calm = SchedulerPolicy::default()
            .select(&ctx(Phase::Testing, "pick colors", ProjectState::default()), &roster);
        assert_eq!(names(&roster, &calm), ["QA"]);
    }

    #[test]
    fn crisis_agent_joins_on_low_satisfaction() {
        let roster = Roster::preset(Preset::Full);
        let unhappy = ProjectState {
            satisfaction_level: 0.1,
            ..ProjectState::default()
        };
        let picked = SchedulerPolicy::default()
            .select(&ctx(Phase::Development, "implement code", unhappy), &roster);
        assert_eq!(names(&roster, &picked), ["Developer", "Boss"]);
    }

    #[test]
    fn forced_agents_survive_truncation() {
        let roster = Roster::preset(Preset::Full);
        let bad = ProjectState {
            satisfaction_level: 0.0,
            stuck_count: 5,
            ..ProjectState::default()
        };
        let picked = SchedulerPolicy::default().select(
            &ctx(Phase::Design, "design code test requirements", bad),
            &roster,
        );
        assert_eq!(names(&roster, &picked), ["Manager", "Boss", "Rubber duck"]);
    }

    #[test]
    fn missing_roles_are_skipped() {
        let roster = Roster::preset(Preset::Studio);
        let stuck = ProjectState {
            stuck_count: 10,
            ..ProjectState::default()
        };
        let picked = SchedulerPolicy::default()
            .select(&ctx(Phase::Testing, "nothing relevant", stuck), &roster);
        assert_eq!(names(&roster, &picked), ["QA"]);
    }
}
