//! Repairs the Markdown/LaTeX formatting defects that free-form model output
//! reliably exhibits: missing spaces after heading and list markers, bare
//! math fragments outside delimiters, unbraced exponents, untagged code
//! fences, and runaway blank lines.
//!
//! The pipeline is deterministic and idempotent: the text is parsed into
//! fenced-code and prose blocks, prose is further split into math spans and
//! plain runs, and each repair is applied at the level where it cannot
//! disturb the others. Fence bodies are never altered beyond tab expansion;
//! math spans are never altered beyond the exponent and fraction repairs.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// A `$$...$$` block or a single-line `$...$` span.
    static ref MATH_SPAN: Regex = Regex::new(r"(?s)\$\$.*?\$\$|\$[^$\n]+?\$").unwrap();
    /// Bare math fragments worth wrapping: `x = y+z`, `a^b`, `n/m`.
    static ref BARE_MATH: Regex = Regex::new(
        r"[A-Za-z0-9]+\s*=\s*[A-Za-z0-9+\-*/^]+|[A-Za-z0-9]+\s*\^\s*[A-Za-z0-9]+|\d+\s*/\s*\d+"
    )
    .unwrap();
    static ref EXPONENT: Regex = Regex::new(r"([A-Za-z0-9])\^([A-Za-z0-9]+)").unwrap();
    static ref LOOSE_FRAC: Regex =
        Regex::new(r"\\frac\s+([A-Za-z0-9]+)\s+([A-Za-z0-9]+)").unwrap();
    static ref NUMBERED_MARKER: Regex = Regex::new(r"^(\s*\d+\.)([^\s0-9].*)$").unwrap();
}

/// Normalize a responder's raw output into well-formed Markdown + LaTeX.
/// Applying it to its own output is a no-op.
pub fn normalize(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let blocks = parse_blocks(text.trim());

    let mut out: Vec<String> = Vec::new();
    for block in blocks {
        match block {
            Block::Prose(body) => {
                let lines = repair_prose(&body);
                if lines.is_empty() {
                    continue;
                }
                if !out.is_empty() {
                    out.push(String::new());
                }
                out.extend(lines);
            }
            Block::Fence { language, body } => {
                if !out.is_empty() {
                    out.push(String::new());
                }
                let tag = if language.is_empty() { "text" } else { &language };
                out.push(format!("```{tag}"));
                out.extend(repair_fence_body(&body));
                out.push("```".to_string());
            }
        }
    }

    out.join("\n")
}

enum Block {
    Prose(String),
    Fence { language: String, body: String },
}

/// Split the document at fence markers. An unterminated fence swallows the
/// rest of the text and is closed on re-serialization.
fn parse_blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut prose: Vec<&str> = Vec::new();
    let mut fence_body: Vec<&str> = Vec::new();
    let mut fence_language: Option<String> = None;

    for line in text.split('\n') {
        match &fence_language {
            None => {
                let trimmed = line.trim_start();
                if let Some(rest) = trimmed.strip_prefix("```") {
                    if !prose.is_empty() {
                        blocks.push(Block::Prose(prose.join("\n")));
                        prose.clear();
                    }
                    fence_language = Some(rest.trim().to_string());
                } else {
                    prose.push(line);
                }
            }
            Some(language) => {
                if line.trim() == "```" {
                    blocks.push(Block::Fence {
                        language: language.clone(),
                        body: fence_body.join("\n"),
                    });
                    fence_body.clear();
                    fence_language = None;
                } else {
                    fence_body.push(line);
                }
            }
        }
    }

    if let Some(language) = fence_language {
        blocks.push(Block::Fence {
            language,
            body: fence_body.join("\n"),
        });
    } else if !prose.is_empty() {
        blocks.push(Block::Prose(prose.join("\n")));
    }

    blocks
}

/// All prose-level repairs, in an order where each pass leaves the earlier
/// passes' output alone. Lines inside a multi-line `$$...$$` span are exempt
/// from the line-level repairs; only the span-level exponent and fraction
/// repairs may touch them.
fn repair_prose(body: &str) -> Vec<String> {
    let body = wrap_bare_math(body);
    let body = repair_math_spans(&body);

    let in_math = display_math_lines(&body);

    let mut lines: Vec<(String, bool)> = Vec::new();
    let mut blank_after_heading = false;
    for (idx, line) in body.split('\n').enumerate() {
        if in_math[idx] {
            if blank_after_heading && !line.is_empty() {
                lines.push((String::new(), false));
            }
            blank_after_heading = false;
            lines.push((line.to_string(), true));
            continue;
        }

        let line = line.trim_end();
        let line = fix_heading_marker(line);
        let line = fix_list_marker(&line);

        let is_heading = is_heading_line(&line);
        if blank_after_heading && !line.is_empty() {
            lines.push((String::new(), false));
        }
        if is_heading && lines.last().is_some_and(|(prev, _)| !prev.is_empty()) {
            lines.push((String::new(), false));
        }
        blank_after_heading = is_heading;
        lines.push((line, false));
    }

    collapse_blank_lines(lines)
}

/// Flag every line that intersects a `$$...$$` span covering more than one
/// line. A `-` or `#` at the start of such a line is math notation, not a
/// Markdown marker.
fn display_math_lines(body: &str) -> Vec<bool> {
    let mut flags = vec![false; body.split('\n').count()];
    for span in MATH_SPAN.find_iter(body) {
        if !span.as_str().contains('\n') {
            continue;
        }
        let first = body[..span.start()].matches('\n').count();
        let last = first + span.as_str().matches('\n').count();
        for flag in &mut flags[first..=last] {
            *flag = true;
        }
    }
    flags
}

/// Wrap bare algebraic fragments in inline math delimiters. Fragments that
/// touch an existing `$` are left alone so a second pass cannot nest
/// delimiters.
fn wrap_bare_math(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut cursor = 0;

    for span in MATH_SPAN.find_iter(body) {
        out.push_str(&wrap_fragments(&body[cursor..span.start()]));
        out.push_str(span.as_str());
        cursor = span.end();
    }
    out.push_str(&wrap_fragments(&body[cursor..]));
    out
}

fn wrap_fragments(plain: &str) -> String {
    let mut out = String::with_capacity(plain.len());
    let mut cursor = 0;

    for m in BARE_MATH.find_iter(plain) {
        let before = plain[..m.start()].chars().last();
        let after = plain[m.end()..].chars().next();
        let adjacent_dollar = before == Some('$') || after == Some('$');
        let mid_word = before.is_some_and(|c| c.is_alphanumeric() || c == '\\' || c == '_');

        out.push_str(&plain[cursor..m.start()]);
        if adjacent_dollar || mid_word {
            out.push_str(m.as_str());
        } else {
            out.push('$');
            out.push_str(m.as_str());
            out.push('$');
        }
        cursor = m.end();
    }
    out.push_str(&plain[cursor..]);
    out
}

/// Inside every delimited span, brace bare exponents and rebuild loose
/// `\frac a b` forms.
fn repair_math_spans(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut cursor = 0;

    for span in MATH_SPAN.find_iter(body) {
        out.push_str(&body[cursor..span.start()]);
        let repaired = EXPONENT.replace_all(span.as_str(), "$1^{$2}");
        let repaired = LOOSE_FRAC.replace_all(&repaired, r"\frac{$1}{$2}");
        out.push_str(&repaired);
        cursor = span.end();
    }
    out.push_str(&body[cursor..]);
    out
}

fn is_heading_line(line: &str) -> bool {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    (1..=6).contains(&hashes) && line[hashes..].starts_with(' ')
}

/// `##Title` -> `## Title`.
fn fix_heading_marker(line: &str) -> String {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    if (1..=6).contains(&hashes) {
        let rest = &line[hashes..];
        if !rest.is_empty() && !rest.starts_with(' ') && !rest.starts_with('#') {
            return format!("{} {}", &line[..hashes], rest);
        }
    }
    line.to_string()
}

/// `-item` -> `- item`, `1.item` -> `1. item`. A repeated marker character
/// (`---`, `**bold**`) or a decimal (`1.5`) is not a list item.
fn fix_list_marker(line: &str) -> String {
    let indent_len = line.len() - line.trim_start().len();
    let (indent, rest) = line.split_at(indent_len);

    let mut chars = rest.chars();
    if let (Some(marker), Some(next)) = (chars.next(), chars.clone().next()) {
        if matches!(marker, '-' | '*' | '+') && !next.is_whitespace() && next != marker {
            return format!("{indent}{marker} {}", &rest[marker.len_utf8()..]);
        }
    }

    if let Some(caps) = NUMBERED_MARKER.captures(line) {
        return format!("{} {}", &caps[1], &caps[2]);
    }

    line.to_string()
}

/// Collapse runs of blank lines to a single blank line and drop boundary
/// blanks. Blank lines inside display math are part of the span and survive.
fn collapse_blank_lines(lines: Vec<(String, bool)>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut prev_blank = true;
    for (line, in_math) in lines {
        let blank = !in_math && line.is_empty();
        if blank && prev_blank {
            continue;
        }
        prev_blank = blank;
        out.push(line);
    }
    while out.last().is_some_and(|line| line.is_empty()) {
        out.pop();
    }
    out
}

fn repair_fence_body(body: &str) -> Vec<String> {
    let lines: Vec<String> = body
        .split('\n')
        .map(|line| line.replace('\t', "    "))
        .collect();

    let start = lines.iter().position(|l| !l.trim().is_empty()).unwrap_or(0);
    let end = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map_or(0, |i| i + 1);
    lines[start..end.max(start)].to_vec()
}
