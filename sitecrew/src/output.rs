//! Console output for conversation rounds.
//!
//! Agent replies, action outcomes and project status are what the user is
//! here to watch, so they go to stdout rather than through tracing.

use std::collections::BTreeMap;

const WRAP_WIDTH: usize = 100;

enum Sink {
    Stdout,
    Buffer(Vec<String>),
}

/// Where round output goes: stdout, or a buffer for tests.
pub struct Console {
    sink: Sink,
}

impl Default for Console {
    fn default() -> Self {
        Self::stdout()
    }
}

impl Console {
    pub fn stdout() -> Self {
        Self { sink: Sink::Stdout }
    }

    pub fn buffered() -> Self {
        Self {
            sink: Sink::Buffer(Vec::new()),
        }
    }

    /// Captured lines (empty for stdout).
    pub fn lines(&self) -> &[String] {
        match &self.sink {
            Sink::Buffer(lines) => lines,
            Sink::Stdout => &[],
        }
    }

    fn emit(&mut self, line: String) {
        match &mut self.sink {
            Sink::Stdout => println!("{line}"),
            Sink::Buffer(lines) => lines.push(line),
        }
    }

    /// An agent's reply, prefixed with its name.
    pub fn say(&mut self, agent: &str, text: &str) {
        self.emit(String::new());
        let mut lines = wrap_lines(text, WRAP_WIDTH).into_iter();
        let first = lines.next().unwrap_or_default();
        self.emit(format!("{agent}: {first}"));
        for line in lines {
            self.emit(line);
        }
    }

    /// A brief one-line status.
    pub fn status(&mut self, emoji: &str, text: &str) {
        self.emit(format!("{emoji} {text}"));
    }

    pub fn error(&mut self, text: &str) {
        self.status("❌", text);
    }

    pub fn heading(&mut self, text: &str) {
        self.emit(String::new());
        self.emit(format!("=== {text} ==="));
    }

    /// Round header: phase, active agents, known files.
    pub fn round_banner(&mut self, phase: &str, agents: &[String], files: &[String]) {
        self.emit(String::new());
        self.emit(format!("--- {} PHASE ---", phase.to_uppercase()));
        self.emit(format!("Active agents: [{}]", agents.join(", ")));
        self.emit(format!("Project files: [{}]", files.join(", ")));
        self.emit("-".repeat(50));
    }

    /// Project structure with byte sizes.
    pub fn file_tree(&mut self, structure: &BTreeMap<String, u64>) {
        self.heading("PROJECT STATUS");
        if structure.is_empty() {
            self.emit("(no files yet)".to_string());
        }
        for (path, size) in structure {
            self.emit(format!("📄 {path} ({size} bytes)"));
        }
        self.emit("=".repeat(23));
    }
}

/// Wrap text into lines of max_len, breaking on word boundaries.
fn wrap_lines(text: &str, max_len: usize) -> Vec<String> {
    let mut result = Vec::new();
    for line in text.lines() {
        if line.len() <= max_len {
            result.push(line.to_string());
        } else {
            let mut current = String::new();
            for word in line.split_whitespace() {
                if current.len() + word.len() + 1 > max_len {
                    if !current.is_empty() {
                        result.push(current);
                    }
                    current = word.to_string();
                } else {
                    if !current.is_empty() {
                        current.push(' ');
                    }
                    current.push_str(word);
                }
            }
            if !current.is_empty() {
                result.push(current);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_long_lines_on_words() {
        let text = "alpha beta gamma delta";
        assert_eq!(wrap_lines(text, 11), ["alpha beta", "gamma delta"]);
        assert_eq!(wrap_lines("short\n\nkept", 80), ["short", "", "kept"]);
    }

    #[test]
    fn buffered_console_captures_output() {
        let mut c = Console::buffered();
        c.say("QA", "Found a bug");
        let mut tree = BTreeMap::new();
        tree.insert("index.html".to_string(), 120);
        c.file_tree(&tree);
        assert!(c.lines().contains(&"QA: Found a bug".to_string()));
        assert!(c.lines().contains(&"📄 index.html (120 bytes)".to_string()));
    }
}
