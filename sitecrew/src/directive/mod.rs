//! Action directives embedded in agent replies.
//!
//! Agents are prompted to emit a small line-oriented grammar inside their
//! free-form text:
//!
//! ~~~text
//! FILE_ACTION: CREATE | MODIFY | READ | RUN
//! FILENAME: path/to/file
//! CHANGES: free text, informational only
//! CONTENT:
//! ```lang
//! ...verbatim file body...
//! ```
//! COMMAND: program args
//!
//! IMAGE_ACTION: GENERATE
//! FILENAME: images/hero.png
//! PROMPT: description
//! STYLE: optional style
//! ~~~
//!
//! Keys are case-insensitive and may be wrapped in markdown emphasis,
//! inline code or list markers. This grammar is what agents are told to
//! write, so it is treated as a stable wire format.
//!
//! Parsing is pure: text in, directives out. Applying them is the
//! executor's job.

mod markdown;
mod parser;

pub use markdown::{Key, KeyLine, classify_line, strip_markdown};
pub use parser::{DropReason, Diagnostic, ParsedReply, debug_lines, parse};

/// Kind named by a `FILE_ACTION:` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileActionKind {
    Create,
    Modify,
    Read,
    Run,
}

impl FileActionKind {
    pub fn parse(value: &str) -> Option<Self> {
        let word = value.split_whitespace().next()?.to_ascii_uppercase();
        match word.as_str() {
            "CREATE" => Some(Self::Create),
            "MODIFY" => Some(Self::Modify),
            "READ" => Some(Self::Read),
            "RUN" => Some(Self::Run),
            _ => None,
        }
    }
}

/// One structured instruction extracted from a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionDirective {
    CreateFile { path: String, content: String },
    ModifyFile { path: String, content: String },
    ReadFile { path: String },
    RunCommand { command: String },
    GenerateImage { path: String, prompt: String, style: String },
}

impl ActionDirective {
    /// Target path, if the directive has one.
    pub fn path(&self) -> Option<&str> {
        match self {
            ActionDirective::CreateFile { path, .. }
            | ActionDirective::ModifyFile { path, .. }
            | ActionDirective::ReadFile { path }
            | ActionDirective::GenerateImage { path, .. } => Some(path),
            ActionDirective::RunCommand { .. } => None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, ActionDirective::GenerateImage { .. })
    }
}
