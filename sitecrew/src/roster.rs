//! Role-tagged agent registry and the built-in team presets.

use serde::{Deserialize, Serialize};

use crate::agent::{Agent, Capabilities, Role};

/// Built-in team compositions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Developer, Client, Designer, QA, Manager.
    #[default]
    Studio,
    /// Studio plus Boss (crisis) and Rubber duck (mediator).
    Full,
}

/// An agent definition from the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    pub role: Role,
    pub persona: String,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(flatten)]
    pub capabilities: Capabilities,
}

impl AgentSpec {
    fn build(&self) -> Agent {
        let triggers: Vec<&str> = self.triggers.iter().map(String::as_str).collect();
        Agent::new(&self.name, self.role.clone(), &self.persona, &triggers, self.capabilities)
    }
}

const DEVELOPER_PERSONA: &str = "You develop a website for a company. When you need to create or modify files, use the FILE_ACTION format exactly as instructed. Create actual HTML, CSS, and JavaScript files that work together to build the website. IMPORTANT: When implementing images in HTML, always use relative paths like 'images/filename.png' since HTML files are in the root directory and images are in the 'images' subdirectory. Always read existing files first to understand the current structure before making improvements.";

const CLIENT_PERSONA: &str = "You are the client of the company that wants a website for their business. You decide the overall design of the website and the features that the website will have.";

const DESIGNER_PERSONA: &str = "You are the designer of the company that the developer works for. You design the website and give the developer the design. When giving design specifications, be specific about colors, layouts, and styling. You can also generate images for the website using the IMAGE_ACTION format. Create beautiful, professional images that match the website's theme. ALWAYS use IMAGE_ACTION: GENERATE when the client or other agents request actual images to be created.";

const QA_PERSONA: &str = "You are the QA of the company that the developer works for. You test the website and give the developer feedback on the website. You can run commands to test functionality. Read existing files to analyze code quality, find potential bugs, and suggest improvements.";

const MANAGER_PERSONA: &str = "You are the manager of the company that the developer works for. You manage the other agents and the developer.";

const BOSS_PERSONA: &str = "You are the boss of the company that the developer works for. You watch over the developer and give them feedback on the website.";

const DUCK_PERSONA: &str = "When the client is unhappy you get bonked on the head and say quack quack.";

fn writer(read: bool, images: bool) -> Capabilities {
    Capabilities {
        can_write_files: true,
        can_read_files: read,
        can_generate_images: images,
    }
}

/// Ordered set of agents, addressed by index or by role.
#[derive(Debug, Clone)]
pub struct Roster {
    agents: Vec<Agent>,
}

impl Roster {
    pub fn new(agents: Vec<Agent>) -> Self {
        Self { agents }
    }

    pub fn preset(preset: Preset) -> Self {
        let mut agents = vec![
            Agent::new(
                "Developer",
                Role::Developer,
                DEVELOPER_PERSONA,
                &["development", "code", "implement", "feature", "stuck", "technical"],
                writer(true, false),
            ),
            Agent::new(
                "Client",
                Role::Client,
                CLIENT_PERSONA,
                &["planning", "requirements", "design", "review", "feedback"],
                Capabilities::default(),
            ),
            Agent::new(
                "Designer",
                Role::Designer,
                DESIGNER_PERSONA,
                &[
                    "design", "ui", "mockup", "layout", "visual", "images", "graphics",
                    "generate", "create images", "actual images", "professional images",
                ],
                writer(false, true),
            ),
            Agent::new(
                "QA",
                Role::Qa,
                QA_PERSONA,
                &["testing", "qa", "bug", "quality", "test"],
                writer(true, false),
            ),
            Agent::new(
                "Manager",
                Role::Manager,
                MANAGER_PERSONA,
                &["planning", "coordination", "meeting", "organize"],
                Capabilities::default(),
            ),
        ];
        if preset == Preset::Full {
            agents.push(Agent::new(
                "Boss",
                Role::Boss,
                BOSS_PERSONA,
                &["deadline", "budget", "urgent", "crisis", "review"],
                Capabilities::default(),
            ));
            agents.push(Agent::new(
                "Rubber duck",
                Role::RubberDuck,
                DUCK_PERSONA,
                &["stuck", "problem", "help", "frustrated"],
                Capabilities::default(),
            ));
        }
        Self { agents }
    }

    /// Build from config definitions; falls back to `preset` when empty.
    pub fn from_specs(specs: &[AgentSpec], preset: Preset) -> Self {
        if specs.is_empty() {
            return Self::preset(preset);
        }
        Self::new(specs.iter().map(AgentSpec::build).collect())
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn get(&self, idx: usize) -> Option<&Agent> {
        self.agents.get(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut Agent> {
        self.agents.get_mut(idx)
    }

    /// Index of the first agent with `role`.
    pub fn position(&self, role: &Role) -> Option<usize> {
        self.agents.iter().position(|a| &a.role == role)
    }

    pub fn by_role(&self, role: &Role) -> Option<&Agent> {
        self.position(role).and_then(|i| self.agents.get(i))
    }

    pub fn reset_all(&mut self) {
        for agent in &mut self.agents {
            agent.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn studio_preset() {
        let r = Roster::preset(Preset::Studio);
        let names: Vec<_> = r.agents().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["Developer", "Client", "Designer", "QA", "Manager"]);
        assert!(r.by_role(&Role::Boss).is_none());
        assert!(r.by_role(&Role::Designer).unwrap().capabilities.can_generate_images);
        assert!(r.by_role(&Role::Qa).unwrap().capabilities.can_read_files);
    }

    #[test]
    fn full_preset_adds_escalation_roles() {
        let r = Roster::preset(Preset::Full);
        assert_eq!(r.len(), 7);
        assert_eq!(r.position(&Role::RubberDuck), Some(6));
        assert_eq!(r.by_role(&Role::Boss).unwrap().name, "Boss");
    }

    #[test]
    fn role_lookup_survives_reordering() {
        let mut agents = Roster::preset(Preset::Studio).agents().to_vec();
        agents.reverse();
        let r = Roster::new(agents);
        assert_eq!(r.by_role(&Role::Manager).unwrap().name, "Manager");
        assert_eq!(r.position(&Role::Manager), Some(0));
    }

    #[test]
    fn specs_from_toml() {
        #[derive(Deserialize)]
        struct File {
            agents: Vec<AgentSpec>,
        }
        let f: File = toml::from_str(
            r#"
            [[agents]]
            name = "Writer"
            role = "copywriter"
            persona = "You write website copy."
            triggers = ["copy", "text"]
            can_write_files = true

            [[agents]]
            name = "Lead"
            role = "manager"
            persona = "You coordinate."
            "#,
        )
        .unwrap();
        let r = Roster::from_specs(&f.agents, Preset::Studio);
        assert_eq!(r.len(), 2);
        assert_eq!(r.get(0).unwrap().role, Role::Custom("copywriter".into()));
        assert!(r.get(0).unwrap().capabilities.can_write_files);
        assert_eq!(r.by_role(&Role::Manager).unwrap().name, "Lead");
    }
}
