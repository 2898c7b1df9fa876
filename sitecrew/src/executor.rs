//! Applies parsed directives to the project and its collaborators.

use std::fmt;

use crate::command::CommandRunner;
use crate::directive::ActionDirective;
use crate::error::{BackendError, StoreError};
use crate::image_gen::{ImageGenerator, ImageOutcome};
use crate::store::{FileEntry, ProjectFileStore};

/// What happened to one directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Created { path: String },
    Modified { path: String },
    Read { path: String, entry: FileEntry },
    NotFound { path: String },
    Image { path: String, result: ImageOutcome },
    Ran { command: String, output: String },
    Refused { command: String, reason: String },
    CommandFailed { command: String, reason: String },
    /// A store operation was rejected (bad path, I/O failure).
    Rejected { path: String, reason: String },
}

impl ActionOutcome {
    pub fn is_failure(&self) -> bool {
        match self {
            ActionOutcome::NotFound { .. }
            | ActionOutcome::Refused { .. }
            | ActionOutcome::CommandFailed { .. }
            | ActionOutcome::Rejected { .. } => true,
            ActionOutcome::Image { result, .. } => !matches!(result, ImageOutcome::Generated),
            _ => false,
        }
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionOutcome::Created { path } => write!(f, "✅ Created file: {path}"),
            ActionOutcome::Modified { path } => write!(f, "✅ Modified file: {path}"),
            ActionOutcome::Read { path, entry } => match entry {
                FileEntry::Text(s) => write!(f, "📖 Read file: {path} ({} characters)", s.chars().count()),
                other => write!(f, "📖 Read file: {path} ({})", other.as_str()),
            },
            ActionOutcome::NotFound { path } => write!(f, "❌ File not found: {path}"),
            ActionOutcome::Image { path, result } => match result {
                ImageOutcome::Generated => write!(f, "✅ Generated image: {path}"),
                ImageOutcome::Placeholder { reason } => {
                    write!(f, "⚠️ Image backend failed for {path} ({reason}); wrote placeholder")
                }
                ImageOutcome::Failed { reason } => {
                    write!(f, "❌ Failed to generate image: {path} ({reason})")
                }
            },
            ActionOutcome::Ran { command, output } => {
                write!(f, "🖥️ Ran `{command}`")?;
                if !output.is_empty() {
                    write!(f, "\n{output}")?;
                }
                Ok(())
            }
            ActionOutcome::Refused { command, reason } => {
                write!(f, "🚫 Refused `{command}`: {reason}")
            }
            ActionOutcome::CommandFailed { command, reason } => {
                write!(f, "❌ Command `{command}` failed: {reason}")
            }
            ActionOutcome::Rejected { path, reason } => write!(f, "❌ {path}: {reason}"),
        }
    }
}

/// Routes directives to the store, the image generator and the command
/// runner. One failed directive never stops the rest.
pub struct ActionExecutor {
    images: ImageGenerator,
    commands: Option<CommandRunner>,
}

impl ActionExecutor {
    pub fn new(images: ImageGenerator, commands: Option<CommandRunner>) -> Self {
        Self { images, commands }
    }

    pub async fn apply(
        &self,
        store: &mut ProjectFileStore,
        directives: &[ActionDirective],
    ) -> Vec<ActionOutcome> {
        let mut outcomes = Vec::with_capacity(directives.len());
        for directive in directives {
            outcomes.push(self.apply_one(store, directive).await);
        }
        outcomes
    }

    async fn apply_one(&self, store: &mut ProjectFileStore, directive: &ActionDirective) -> ActionOutcome {
        match directive {
            ActionDirective::CreateFile { path, content } => match store.create(path, content).await {
                Ok(path) => ActionOutcome::Created { path },
                Err(e) => rejected(path, e),
            },
            ActionDirective::ModifyFile { path, content } => match store.modify(path, content).await {
                Ok(path) => ActionOutcome::Modified { path },
                Err(e) => rejected(path, e),
            },
            ActionDirective::ReadFile { path } => match store.read(path).await {
                Ok(entry) => ActionOutcome::Read {
                    path: path.clone(),
                    entry,
                },
                Err(StoreError::NotFound(path)) => ActionOutcome::NotFound { path },
                Err(e) => rejected(path, e),
            },
            ActionDirective::GenerateImage {
                path,
                prompt,
                style,
            } => {
                let (rel, dest) = match store.resolve(path) {
                    Ok(resolved) => resolved,
                    Err(e) => return rejected(path, e),
                };
                tracing::info!(path = %rel, prompt = %prompt, style = %style, "Generating image");
                let result = self.images.generate(prompt, style, &dest).await;
                if result.wrote_file()
                    && let Err(e) = store.mark(&rel, FileEntry::Image)
                {
                    return rejected(&rel, e);
                }
                ActionOutcome::Image { path: rel, result }
            }
            ActionDirective::RunCommand { command } => {
                let Some(runner) = &self.commands else {
                    return ActionOutcome::Refused {
                        command: command.clone(),
                        reason: "commands are disabled".into(),
                    };
                };
                match runner.run(command).await {
                    Ok(output) => ActionOutcome::Ran {
                        command: command.clone(),
                        output,
                    },
                    Err(BackendError::Refused(reason)) => ActionOutcome::Refused {
                        command: command.clone(),
                        reason,
                    },
                    Err(e) => ActionOutcome::CommandFailed {
                        command: command.clone(),
                        reason: e.to_string(),
                    },
                }
            }
        }
    }
}

fn rejected(path: &str, e: StoreError) -> ActionOutcome {
    tracing::warn!(path, error = %e, "Directive rejected");
    ActionOutcome::Rejected {
        path: path.to_string(),
        reason: e.to_string(),
    }
}
