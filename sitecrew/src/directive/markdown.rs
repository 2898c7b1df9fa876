//! Line classification for the directive grammar.
//!
//! Models decorate directive keys freely (`**FILENAME:**`, `` `PROMPT:` ``,
//! `- STYLE:`, `### FILE_ACTION: CREATE`). Stripping happens only on
//! header lines; fenced content is never passed through here.

/// A recognized directive key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    FileAction,
    ImageAction,
    Filename,
    Content,
    Changes,
    Command,
    Prompt,
    Style,
}

impl Key {
    fn from_head(head: &str) -> Option<Self> {
        let norm = head
            .trim()
            .trim_end_matches('_')
            .trim()
            .to_ascii_uppercase()
            .replace(' ', "_");
        match norm.as_str() {
            "FILE_ACTION" => Some(Key::FileAction),
            "IMAGE_ACTION" => Some(Key::ImageAction),
            "FILENAME" | "FILE_NAME" => Some(Key::Filename),
            "CONTENT" => Some(Key::Content),
            "CHANGES" => Some(Key::Changes),
            "COMMAND" => Some(Key::Command),
            "PROMPT" => Some(Key::Prompt),
            "STYLE" => Some(Key::Style),
            _ => None,
        }
    }

    /// Keys that start a new directive block.
    pub fn starts_block(self) -> bool {
        matches!(self, Key::FileAction | Key::ImageAction)
    }

    /// Keys that belong inside an image block.
    pub fn is_image_field(self) -> bool {
        matches!(self, Key::Filename | Key::Prompt | Key::Style)
    }
}

/// A header line split into key and cleaned value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLine {
    pub key: Key,
    pub value: String,
}

/// Remove emphasis, inline code, heading, quote and list decoration.
pub fn strip_markdown(line: &str) -> String {
    let mut s = line.trim();

    while let Some(rest) = s.strip_prefix('>') {
        s = rest.trim_start();
    }
    let hashes = s.chars().take_while(|&c| c == '#').count();
    if hashes > 0 && s[hashes..].starts_with(' ') {
        s = s[hashes..].trim_start();
    }
    s = strip_list_marker(s);

    let without: String = s.chars().filter(|&c| c != '*' && c != '`').collect();
    without.trim().trim_start_matches('_').trim().to_string()
}

fn strip_list_marker(s: &str) -> &str {
    for marker in ["- ", "* ", "+ "] {
        if let Some(rest) = s.strip_prefix(marker) {
            return rest.trim_start();
        }
    }
    let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &s[digits..];
        if let Some(r) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return r.trim_start();
        }
    }
    s
}

/// Trim quotes and leftover emphasis markers around a value.
fn clean_value(raw: &str) -> String {
    let mut v = raw.trim().trim_matches(|c| matches!(c, '"' | '\'')).trim();
    if let Some(rest) = v.strip_prefix("__ ").or_else(|| v.strip_prefix("_ ")) {
        v = rest.trim_start();
    }
    if let Some(rest) = v.strip_suffix(" __").or_else(|| v.strip_suffix(" _")) {
        v = rest.trim_end();
    }
    v.trim_matches(|c| matches!(c, '"' | '\'')).trim().to_string()
}

/// Classify a line as a directive header, if it is one.
pub fn classify_line(line: &str) -> Option<KeyLine> {
    let stripped = strip_markdown(line);
    let (head, value) = stripped.split_once(':')?;
    let key = Key::from_head(head)?;
    Some(KeyLine {
        key,
        value: clean_value(value),
    })
}

/// True for a code fence delimiter line.
pub fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kl(key: Key, value: &str) -> Option<KeyLine> {
        Some(KeyLine {
            key,
            value: value.to_string(),
        })
    }

    #[test]
    fn plain_keys() {
        assert_eq!(classify_line("FILE_ACTION: CREATE"), kl(Key::FileAction, "CREATE"));
        assert_eq!(classify_line("FILENAME: index.html"), kl(Key::Filename, "index.html"));
        assert_eq!(classify_line("CONTENT:"), kl(Key::Content, ""));
    }

    #[test]
    fn case_and_spacing_tolerance() {
        assert_eq!(classify_line("file_action : modify"), kl(Key::FileAction, "modify"));
        assert_eq!(classify_line("File Action: READ"), kl(Key::FileAction, "READ"));
        assert_eq!(classify_line("  Image_Action:GENERATE"), kl(Key::ImageAction, "GENERATE"));
    }

    #[test]
    fn markdown_decoration() {
        assert_eq!(classify_line("**FILENAME:** index.html"), kl(Key::Filename, "index.html"));
        assert_eq!(classify_line("`FILENAME: style.css`"), kl(Key::Filename, "style.css"));
        assert_eq!(classify_line("- **PROMPT:** a warm bakery"), kl(Key::Prompt, "a warm bakery"));
        assert_eq!(classify_line("3. STYLE: watercolor"), kl(Key::Style, "watercolor"));
        assert_eq!(classify_line("### FILE_ACTION: CREATE"), kl(Key::FileAction, "CREATE"));
        assert_eq!(classify_line("__FILENAME:__ about.html"), kl(Key::Filename, "about.html"));
        assert_eq!(classify_line("*FILENAME:* \"menu.html\""), kl(Key::Filename, "menu.html"));
    }

    #[test]
    fn underscores_inside_values_survive() {
        assert_eq!(
            classify_line("FILENAME: images/hero_image_1.png"),
            kl(Key::Filename, "images/hero_image_1.png")
        );
        assert_eq!(classify_line("FILENAME: _config.yml"), kl(Key::Filename, "_config.yml"));
    }

    #[test]
    fn prose_is_not_a_key() {
        assert_eq!(classify_line("Here is the FILENAME: index.html"), None);
        assert_eq!(classify_line("Note: remember the footer"), None);
        assert_eq!(classify_line("plain text"), None);
    }

    #[test]
    fn fences() {
        assert!(is_fence("```"));
        assert!(is_fence("   ```html"));
        assert!(!is_fence("`inline`"));
    }
}
