//! Python string literal decoding and docstring rendering.

/// Split a literal into its prefix letters and the quoted remainder.
fn split_prefix(literal: &str) -> (&str, &str) {
    let idx = literal
        .find(|c: char| c == '"' || c == '\'')
        .unwrap_or(literal.len());
    literal.split_at(idx)
}

/// True for string literals usable as docstrings: no f-string or bytes prefix.
pub fn is_plain_string(literal: &str) -> bool {
    let (prefix, rest) = split_prefix(literal);
    !rest.is_empty()
        && prefix
            .chars()
            .all(|c| matches!(c.to_ascii_lowercase(), 'r' | 'u'))
}

/// Decode the value of a plain string literal (prefix, quotes, escapes).
/// Returns `None` for f-strings, bytes, or malformed literals.
pub fn decode_string(literal: &str) -> Option<String> {
    if !is_plain_string(literal) {
        return None;
    }
    let (prefix, rest) = split_prefix(literal);
    let raw = prefix.chars().any(|c| c == 'r' || c == 'R');

    let quote = if rest.starts_with("\"\"\"") {
        "\"\"\""
    } else if rest.starts_with("'''") {
        "'''"
    } else if rest.starts_with('"') {
        "\""
    } else {
        "'"
    };
    if rest.len() < quote.len() * 2 || !rest.ends_with(quote) {
        return None;
    }
    let body = &rest[quote.len()..rest.len() - quote.len()];

    if raw {
        Some(body.to_string())
    } else {
        Some(unescape(body))
    }
}

/// Resolve backslash escapes the way the Python tokenizer does for `str`.
pub fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0C}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{0B}'),
            '0'..='7' => {
                let mut value = next.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.extend(char::from_u32(value));
            }
            'x' | 'u' | 'U' => {
                let width = match next {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = (0..width)
                    .filter_map(|_| chars.next_if(|d| d.is_ascii_hexdigit()))
                    .collect();
                match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                    Some(ch) if digits.len() == width => out.push(ch),
                    _ => {
                        out.push('\\');
                        out.push(next);
                        out.push_str(&digits);
                    }
                }
            }
            other => {
                // Unknown escapes, including \N{...}, stay literal.
                out.push('\\');
                out.push(other);
            }
        }
    }

    out
}

/// Expand tabs to the next multiple of `tabsize` columns.
fn expand_tabs(line: &str, tabsize: usize) -> String {
    let mut out = String::with_capacity(line.len());
    let mut column = 0;
    for c in line.chars() {
        if c == '\t' {
            let pad = tabsize - (column % tabsize);
            out.extend(std::iter::repeat(' ').take(pad));
            column += pad;
        } else {
            out.push(c);
            column += 1;
        }
    }
    out
}

/// Normalize docstring indentation like `inspect.cleandoc`: strip the first
/// line, remove the common margin of the others, and drop leading and
/// trailing blank lines.
pub fn clean_docstring(doc: &str) -> String {
    let mut lines: Vec<String> = doc.split('\n').map(|l| expand_tabs(l, 8)).collect();

    let margin = lines
        .iter()
        .skip(1)
        .filter_map(|line| {
            let content = line.trim_start().chars().count();
            (content > 0).then(|| line.chars().count() - content)
        })
        .min();

    if let Some(first) = lines.first_mut() {
        *first = first.trim_start().to_string();
    }
    if let Some(margin) = margin {
        for line in lines.iter_mut().skip(1) {
            *line = line.chars().skip(margin).collect();
        }
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    let leading = lines.iter().take_while(|l| l.is_empty()).count();
    lines.drain(..leading);

    lines.join("\n")
}

/// Escape text for a triple-double-quoted body: backslashes, embedded
/// triple quotes, and every trailing quote, which would otherwise merge
/// with the closing delimiter.
fn escape_docstring(text: &str) -> String {
    let text = text.replace('\\', "\\\\");
    let head = text.trim_end_matches('"');
    let trailing = text.len() - head.len();
    let mut out = head.replace("\"\"\"", "\\\"\\\"\\\"");
    out.push_str(&"\\\"".repeat(trailing));
    out
}

/// Render docstring text as a triple-double-quoted literal. Continuation
/// lines are indented with `indent`; the opening line is left to the caller.
pub fn render_docstring(text: &str, indent: &str) -> String {
    let escaped = escape_docstring(text);
    let lines: Vec<&str> = escaped.lines().collect();

    if lines.len() <= 1 {
        let line = lines.first().copied().unwrap_or("");
        return format!("\"\"\"{line}\"\"\"");
    }

    let mut out = String::from("\"\"\"");
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(indent);
            }
        }
        out.push_str(line);
    }
    out.push('\n');
    out.push_str(indent);
    out.push_str("\"\"\"");
    out
}
