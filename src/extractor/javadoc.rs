//! Minimal javadoc model: a description followed by block tags, each holding
//! free text with `{@tag ...}` inline tags.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineTagKind {
    Link,
    LinkPlain,
    Code,
    Other,
}

impl InlineTagKind {
    fn from_name(name: &str) -> Self {
        match name {
            "link" => InlineTagKind::Link,
            "linkplain" => InlineTagKind::LinkPlain,
            "code" => InlineTagKind::Code,
            _ => InlineTagKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineTag {
    pub kind: InlineTagKind,
    /// Tag body with line breaks folded into spaces and outer whitespace trimmed.
    pub content: String,
}

/// A run of javadoc text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JavadocText {
    text: String,
}

impl JavadocText {
    fn new(text: String) -> Self {
        JavadocText { text }
    }

    pub fn to_text(&self) -> &str {
        &self.text
    }

    /// All `{@...}` inline tags in order of appearance. An unterminated tag
    /// ends the scan.
    pub fn inline_tags(&self) -> Vec<InlineTag> {
        let mut tags = Vec::new();
        let mut rest = self.text.as_str();

        while let Some(start) = rest.find("{@") {
            let body = &rest[start + 2..];
            let Some(end) = matching_brace(body) else {
                break;
            };
            let inner = &body[..end];
            let name_end = inner
                .find(char::is_whitespace)
                .unwrap_or(inner.len());
            let content = inner[name_end..]
                .split(['\n', '\r'])
                .collect::<Vec<_>>()
                .join(" ");
            tags.push(InlineTag {
                kind: InlineTagKind::from_name(&inner[..name_end]),
                content: content.trim().to_string(),
            });
            rest = &body[end + 1..];
        }

        tags
    }
}

/// Index of the `}` closing an inline tag body, honoring nested braces.
fn matching_brace(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, ch) in body.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' if depth == 0 => return Some(idx),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTag {
    /// Tag name without the `@`, e.g. `throws`.
    pub name: String,
    pub content: JavadocText,
}

impl BlockTag {
    /// The block tag as written, `@name content`.
    pub fn to_text(&self) -> String {
        format!("@{} {}", self.name, self.content.to_text())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Javadoc {
    pub description: JavadocText,
    pub block_tags: Vec<BlockTag>,
}

impl Javadoc {
    /// Parse a raw `/** ... */` comment. Text before the first line starting
    /// with `@` is the description.
    pub fn parse(comment: &str) -> Self {
        let body = comment.trim();
        let body = body.strip_prefix("/**").unwrap_or(body);
        let body = body.strip_suffix("*/").unwrap_or(body);

        let mut description: Vec<&str> = Vec::new();
        let mut blocks: Vec<(String, Vec<&str>)> = Vec::new();

        for line in body.lines() {
            let line = clean_line(line);
            if let Some(tag) = line.strip_prefix('@') {
                let name_end = tag.find(char::is_whitespace).unwrap_or(tag.len());
                let (name, content) = tag.split_at(name_end);
                blocks.push((name.to_string(), vec![content.trim_start()]));
            } else if let Some((_, lines)) = blocks.last_mut() {
                lines.push(line);
            } else {
                description.push(line);
            }
        }

        Javadoc {
            description: JavadocText::new(description.join("\n").trim().to_string()),
            block_tags: blocks
                .into_iter()
                .map(|(name, lines)| BlockTag {
                    name,
                    content: JavadocText::new(lines.join("\n").trim().to_string()),
                })
                .collect(),
        }
    }
}

fn clean_line(line: &str) -> &str {
    let line = line.trim();
    match line.strip_prefix('*') {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest).trim_end(),
        None => line,
    }
}
