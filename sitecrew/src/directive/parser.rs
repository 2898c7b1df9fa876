//! Directive parser.
//!
//! File directives come from a line-driven state machine; image directives
//! from a second, independent pass. Malformed blocks are dropped and noted
//! as diagnostics, never reported as errors.

use super::markdown::{Key, KeyLine, classify_line, is_fence, strip_markdown};
use super::{ActionDirective, FileActionKind};

/// Why a block was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    UnknownAction(String),
    MissingAction,
    MissingFilename,
    MissingContent,
    UnclosedFence,
    CommandOutsideRun,
    EmptyCommand,
    IncompleteImage,
}

/// A dropped block and the line (1-based) where it was abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub reason: DropReason,
}

/// Result of parsing one reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedReply {
    /// File directives in reply order, followed by image directives in
    /// reply order.
    pub directives: Vec<ActionDirective>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParsedReply {
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}

/// Parse a reply into directives.
pub fn parse(text: &str) -> ParsedReply {
    let lines: Vec<&str> = text.lines().collect();
    let mut out = ParsedReply::default();
    FileScanner::default().run(&lines, &mut out);
    scan_images(&lines, &mut out);
    out
}

// ── File directives ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    /// No action pending.
    #[default]
    Idle,
    /// A FILE_ACTION is pending; collecting FILENAME/CONTENT/COMMAND.
    Header,
    /// Saw CONTENT:, waiting for the opening fence.
    AwaitFence,
    /// Inside the fenced body; lines are captured verbatim.
    Content,
    /// Inside a code fence that belongs to no directive; lines are ignored.
    Fenced,
}

#[derive(Debug)]
enum Event<'a> {
    Key(KeyLine, &'a str),
    Fence,
    Blank,
    Text(&'a str),
}

#[derive(Default)]
struct FileScanner {
    state: State,
    kind: Option<FileActionKind>,
    path: Option<String>,
    body: Vec<String>,
}

impl FileScanner {
    fn run(mut self, lines: &[&str], out: &mut ParsedReply) {
        for (i, raw) in lines.iter().enumerate() {
            let event = self.classify(raw);
            self.state = self.step(event, i + 1, out);
        }
        self.finish(lines.len(), out);
    }

    fn classify<'a>(&self, raw: &'a str) -> Event<'a> {
        if is_fence(raw) {
            return Event::Fence;
        }
        if matches!(self.state, State::Content | State::Fenced) {
            return Event::Text(raw);
        }
        if let Some(kl) = classify_line(raw) {
            return Event::Key(kl, raw);
        }
        if strip_markdown(raw).is_empty() {
            Event::Blank
        } else {
            Event::Text(raw)
        }
    }

    fn drop_block(&mut self, line: usize, reason: DropReason, out: &mut ParsedReply) {
        out.diagnostics.push(Diagnostic { line, reason });
        self.path = None;
        self.body.clear();
    }

    /// Idle if no action kind survives, otherwise back to collecting headers.
    fn rest_state(&self) -> State {
        if self.kind.is_some() {
            State::Header
        } else {
            State::Idle
        }
    }

    /// The transition table.
    fn step(&mut self, event: Event<'_>, line: usize, out: &mut ParsedReply) -> State {
        use State::*;
        // CONTENT: must be followed directly by its fence.
        if self.state == AwaitFence && !matches!(event, Event::Fence | Event::Blank) {
            self.drop_block(line, DropReason::MissingContent, out);
            self.state = self.rest_state();
        }
        match (self.state, event) {
            (Content, Event::Fence) => {
                self.close_body(line, out);
                self.rest_state()
            }
            (Content, Event::Text(raw)) => {
                self.body.push(raw.to_string());
                Content
            }
            (Content, _) => Content,

            (AwaitFence, Event::Fence) => {
                self.body.clear();
                Content
            }

            // A fence not announced by CONTENT: is an example, not a body.
            (Idle | Header, Event::Fence) => Fenced,
            (Fenced, Event::Fence) => self.rest_state(),
            (Fenced, _) => Fenced,

            (state, Event::Key(kl, raw)) => match kl.key {
                Key::FileAction => {
                    if self.pending_write() {
                        self.drop_block(line, DropReason::MissingContent, out);
                    }
                    self.path = None;
                    self.body.clear();
                    match FileActionKind::parse(&kl.value) {
                        Some(kind) => {
                            self.kind = Some(kind);
                            Header
                        }
                        None => {
                            self.kind = None;
                            out.diagnostics.push(Diagnostic {
                                line,
                                reason: DropReason::UnknownAction(kl.value),
                            });
                            Idle
                        }
                    }
                }
                Key::ImageAction => {
                    if self.pending_write() {
                        self.drop_block(line, DropReason::MissingContent, out);
                    }
                    self.kind = None;
                    self.path = None;
                    Idle
                }
                Key::Filename if state == Idle => Idle,
                Key::Filename => {
                    if kl.value.is_empty() {
                        return state;
                    }
                    if self.kind == Some(FileActionKind::Read) {
                        out.directives.push(ActionDirective::ReadFile { path: kl.value });
                        self.kind = None;
                        self.path = None;
                        return Idle;
                    }
                    self.path = Some(kl.value);
                    state
                }
                Key::Content if state == Header => {
                    self.body.clear();
                    if raw.contains("```") {
                        Content
                    } else {
                        AwaitFence
                    }
                }
                Key::Command if state == Header => {
                    if self.kind != Some(FileActionKind::Run) {
                        out.diagnostics.push(Diagnostic {
                            line,
                            reason: DropReason::CommandOutsideRun,
                        });
                        return Header;
                    }
                    self.kind = None;
                    self.path = None;
                    if kl.value.is_empty() {
                        out.diagnostics.push(Diagnostic {
                            line,
                            reason: DropReason::EmptyCommand,
                        });
                    } else {
                        out.directives.push(ActionDirective::RunCommand { command: kl.value });
                    }
                    Idle
                }
                Key::Content | Key::Command | Key::Changes | Key::Prompt | Key::Style => state,
            },

            (state, Event::Fence | Event::Blank | Event::Text(_)) => state,
        }
    }

    fn pending_write(&self) -> bool {
        matches!(
            self.kind,
            Some(FileActionKind::Create) | Some(FileActionKind::Modify)
        ) && self.path.is_some()
    }

    fn close_body(&mut self, line: usize, out: &mut ParsedReply) {
        let content = self.body.join("\n");
        let path = self.path.take();
        self.body.clear();
        match (self.kind, path) {
            (Some(FileActionKind::Create), Some(path)) => {
                out.directives.push(ActionDirective::CreateFile { path, content });
            }
            (Some(FileActionKind::Modify), Some(path)) => {
                out.directives.push(ActionDirective::ModifyFile { path, content });
            }
            (Some(FileActionKind::Create | FileActionKind::Modify), None) => {
                self.drop_block(line, DropReason::MissingFilename, out);
            }
            _ => self.drop_block(line, DropReason::MissingAction, out),
        }
    }

    fn finish(mut self, last_line: usize, out: &mut ParsedReply) {
        match self.state {
            State::Content => self.drop_block(last_line, DropReason::UnclosedFence, out),
            State::AwaitFence => self.drop_block(last_line, DropReason::MissingContent, out),
            State::Header if self.pending_write() => {
                self.drop_block(last_line, DropReason::MissingContent, out)
            }
            _ => {}
        }
    }
}

// ── Image directives ───────────────────────────────────────────────

#[derive(Default)]
struct ImageRecord {
    path: Option<String>,
    prompt: Option<String>,
    style: String,
}

fn emit_image(rec: Option<ImageRecord>, line: usize, out: &mut ParsedReply) {
    let Some(rec) = rec else { return };
    match (rec.path, rec.prompt) {
        (Some(path), Some(prompt)) if !path.is_empty() && !prompt.is_empty() => {
            out.directives.push(ActionDirective::GenerateImage {
                path,
                prompt,
                style: rec.style,
            });
        }
        _ => out.diagnostics.push(Diagnostic {
            line,
            reason: DropReason::IncompleteImage,
        }),
    }
}

fn scan_images(lines: &[&str], out: &mut ParsedReply) {
    let mut in_code = false;
    let mut record: Option<ImageRecord> = None;

    for (i, raw) in lines.iter().enumerate() {
        let line_no = i + 1;
        if is_fence(raw) {
            in_code = !in_code;
            continue;
        }
        let key = classify_line(raw);
        // Fenced text is skipped unless it carries a directive key: models
        // often wrap the whole image block in a fence.
        if in_code && key.is_none() {
            continue;
        }

        if let Some(kl) = &key
            && kl.key.starts_block()
        {
            emit_image(record.take(), line_no, out);
            if kl.key == Key::ImageAction && kl.value.to_ascii_uppercase().starts_with("GENERATE") {
                record = Some(ImageRecord::default());
            }
            continue;
        }

        let Some(rec) = record.as_mut() else {
            continue;
        };

        let this_key = key.as_ref().map(|k| k.key);
        if let Some(kl) = key {
            match kl.key {
                Key::Filename => rec.path = Some(kl.value),
                Key::Prompt => rec.prompt = Some(kl.value),
                Key::Style => rec.style = kl.value,
                _ => {}
            }
        }

        let next_key = lines.get(i + 1).and_then(|l| classify_line(l)).map(|k| k.key);
        let blank = strip_markdown(raw).is_empty();
        let ends = blank
            || i + 1 >= lines.len()
            || next_key.is_some_and(Key::starts_block)
            || (this_key == Some(Key::Style) && !next_key.is_some_and(Key::is_image_field));
        if ends {
            emit_image(record.take(), line_no, out);
        }
    }
    emit_image(record.take(), lines.len(), out);
}

/// Per-line view of detected keys, for debugging agent output.
pub fn debug_lines(text: &str) -> Vec<String> {
    let mut report = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let label = if is_fence(raw) {
            "CODE_BLOCK".to_string()
        } else if let Some(kl) = classify_line(raw) {
            format!("{:?}", kl.key).to_uppercase()
        } else {
            continue;
        };
        let preview: String = raw.chars().take(80).collect();
        report.push(format!("Line {:3}: [{label}] | {preview}", i + 1));
    }
    report
}
