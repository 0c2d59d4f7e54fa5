//! Minimal iCalendar (RFC 5545) writer and text value helpers.

/// Maximum line length in octets (not including CRLF)
const MAX_LINE_OCTETS: usize = 75;

/// Escape a TEXT value (RFC 5545 §3.3.11)
pub fn escape_text(value: &str) -> String {
    let mut result = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            ',' => result.push_str("\\,"),
            ';' => result.push_str("\\;"),
            '\n' => result.push_str("\\n"),
            '\r' => {}
            _ => result.push(c),
        }
    }
    result
}

/// Reverse of [`escape_text`] for values read from a feed
pub fn unescape_text(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => result.push('\n'),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }
    result
}

/// Fold a content line at 75 octets without splitting UTF-8 sequences
pub fn fold_line(line: &str) -> String {
    if line.len() <= MAX_LINE_OCTETS {
        return format!("{}\r\n", line);
    }

    let mut result = String::with_capacity(line.len() + (line.len() / MAX_LINE_OCTETS) * 3);
    let mut rest = line;
    let mut first = true;
    while !rest.is_empty() {
        // Continuation lines lose one octet to the leading space
        let max_len = if first { MAX_LINE_OCTETS } else { MAX_LINE_OCTETS - 1 };
        let mut end = rest.len().min(max_len);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if !first {
            result.push(' ');
        }
        result.push_str(&rest[..end]);
        result.push_str("\r\n");
        rest = &rest[end..];
        first = false;
    }
    result
}

/// Accumulates folded content lines
#[derive(Debug, Default)]
pub struct IcsWriter {
    out: String,
}

impl IcsWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, component: &str) -> &mut Self {
        self.raw("BEGIN", component)
    }

    pub fn end(&mut self, component: &str) -> &mut Self {
        self.raw("END", component)
    }

    /// Write a property whose value is already in wire form
    pub fn raw(&mut self, name: &str, value: &str) -> &mut Self {
        self.out.push_str(&fold_line(&format!("{}:{}", name, value)));
        self
    }

    /// Write a TEXT property, escaping its value
    pub fn text(&mut self, name: &str, value: &str) -> &mut Self {
        self.raw(name, &escape_text(value))
    }

    pub fn finish(self) -> String {
        self.out
    }
}
