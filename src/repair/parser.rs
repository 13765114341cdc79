use super::node::Node;
use super::{RepairError, MAX_DEPTH};

/// Parses `input` with the relaxed grammar.
///
/// Positions reported in errors are character offsets into the input after
/// any surrounding markdown code fence has been removed.
pub(super) fn parse(input: &str) -> Result<Node, RepairError> {
    let mut parser = Parser::new(strip_code_fence(input));
    parser.skip_insignificant();
    if parser.at_end() {
        return Err(RepairError::EmptyInput);
    }
    let node = parser.parse_value()?;
    parser.skip_insignificant();
    match parser.peek() {
        None => Ok(node),
        Some(ch) => Err(RepairError::UnexpectedCharacter {
            ch,
            position: parser.pos,
        }),
    }
}

fn strip_code_fence(input: &str) -> &str {
    let trimmed = input.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return input;
    };
    // Drop the info string ("json") on the opening fence line.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn unexpected(&self, ch: char) -> RepairError {
        RepairError::UnexpectedCharacter {
            ch,
            position: self.pos,
        }
    }

    fn enter(&mut self) -> Result<(), RepairError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(RepairError::TooDeep {
                limit: MAX_DEPTH,
                position: self.pos,
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Skips whitespace plus `//` and `/* */` comments.
    fn skip_insignificant(&mut self) {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(ch), _) if ch.is_whitespace() => self.pos += 1,
                (Some('/'), Some('/')) => {
                    while let Some(ch) = self.peek() {
                        if ch == '\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                (Some('/'), Some('*')) => {
                    self.pos += 2;
                    while !self.at_end() && !(self.peek() == Some('*') && self.peek_at(1) == Some('/'))
                    {
                        self.pos += 1;
                    }
                    self.pos = (self.pos + 2).min(self.chars.len());
                }
                _ => return,
            }
        }
    }

    fn parse_value(&mut self) -> Result<Node, RepairError> {
        self.skip_insignificant();
        match self.peek() {
            None => Ok(Node::Null),
            Some('{') => self.parse_object(),
            Some('[') => self.parse_array(),
            Some(ch) if closing_quote(ch).is_some() => Ok(Node::String(self.parse_string())),
            Some(ch @ (',' | ':' | '}' | ']')) => Err(self.unexpected(ch)),
            Some(_) => Ok(self.parse_bare_value()),
        }
    }

    fn parse_object(&mut self) -> Result<Node, RepairError> {
        self.enter()?;
        self.pos += 1;
        let mut members = Vec::new();
        loop {
            self.skip_insignificant();
            match self.peek() {
                None => break,
                Some('}') | Some(']') => {
                    self.pos += 1;
                    break;
                }
                Some(',') => {
                    self.pos += 1;
                    continue;
                }
                Some(ch @ ('{' | '[')) => return Err(self.unexpected(ch)),
                Some(_) => {}
            }

            let key = self.parse_key();
            self.skip_insignificant();
            let value = if self.peek() == Some(':') {
                self.pos += 1;
                self.skip_insignificant();
                match self.peek() {
                    None | Some(',') | Some('}') | Some(']') => Node::Null,
                    _ => self.parse_value()?,
                }
            } else {
                Node::Null
            };
            members.push((key, value));
        }
        self.leave();
        Ok(Node::Object(members))
    }

    fn parse_array(&mut self) -> Result<Node, RepairError> {
        self.enter()?;
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_insignificant();
            match self.peek() {
                None => break,
                Some(']') | Some('}') => {
                    self.pos += 1;
                    break;
                }
                Some(',') => {
                    self.pos += 1;
                }
                Some(':') => return Err(self.unexpected(':')),
                Some(_) => items.push(self.parse_value()?),
            }
        }
        self.leave();
        Ok(Node::Array(items))
    }

    fn parse_key(&mut self) -> String {
        if let Some(ch) = self.peek() {
            if closing_quote(ch).is_some() {
                return self.parse_string();
            }
        }
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if matches!(ch, ':' | ',' | '{' | '}' | '[' | ']' | '\n') {
                break;
            }
            self.pos += 1;
        }
        self.text(start, self.pos).trim().to_string()
    }

    /// Reads a quoted string, decoding escapes. An unterminated string runs
    /// to the end of input.
    ///
    /// A closing quote only ends the string when what follows it could end
    /// a value; otherwise it is kept as text, so `'it's'` reads as `it's`.
    fn parse_string(&mut self) -> String {
        let open = self.chars[self.pos];
        let close = closing_quote(open).unwrap_or(open);
        self.pos += 1;
        let mut out = String::new();
        while let Some(ch) = self.peek() {
            self.pos += 1;
            if ch == '\\' {
                self.parse_escape(&mut out);
            } else if ch == close && self.string_ends_here() {
                return out;
            } else {
                out.push(ch);
            }
        }
        out
    }

    /// True when the next significant character is a delimiter, a comment,
    /// the end of input, or sits on a later line.
    fn string_ends_here(&self) -> bool {
        let mut i = self.pos;
        let mut crossed_line = false;
        while let Some(&ch) = self.chars.get(i) {
            if !ch.is_whitespace() {
                break;
            }
            crossed_line |= ch == '\n';
            i += 1;
        }
        match self.chars.get(i) {
            None | Some(',' | ':' | '}' | ']') => true,
            Some('/') => matches!(self.chars.get(i + 1), Some('/' | '*')),
            Some(_) => crossed_line,
        }
    }

    fn parse_escape(&mut self, out: &mut String) {
        let Some(ch) = self.peek() else {
            return;
        };
        self.pos += 1;
        match ch {
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'u' => self.parse_unicode_escape(out),
            other => out.push(other),
        }
    }

    fn parse_unicode_escape(&mut self, out: &mut String) {
        let Some(high) = self.read_hex4() else {
            out.push('u');
            return;
        };
        if (0xD800..0xDC00).contains(&high)
            && self.peek() == Some('\\')
            && self.peek_at(1) == Some('u')
        {
            let checkpoint = self.pos;
            self.pos += 2;
            match self.read_hex4() {
                Some(low) if (0xDC00..0xE000).contains(&low) => {
                    let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                    out.push(char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER));
                    return;
                }
                _ => self.pos = checkpoint,
            }
        }
        out.push(char::from_u32(high).unwrap_or(char::REPLACEMENT_CHARACTER));
    }

    fn read_hex4(&mut self) -> Option<u32> {
        let digits: String = self.chars.get(self.pos..self.pos + 4)?.iter().collect();
        let code = u32::from_str_radix(&digits, 16).ok()?;
        self.pos += 4;
        Some(code)
    }

    /// Reads an unquoted scalar up to the next delimiter on the same line.
    fn parse_bare_value(&mut self) -> Node {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if matches!(ch, ',' | '}' | ']' | '\n' | '\r') || self.at_trailing_comment(start) {
                break;
            }
            self.pos += 1;
        }
        let raw = self.text(start, self.pos);
        let token = raw.trim_end();

        // `1 "next": 2` is a number followed by a member whose comma is missing.
        if let Some((first, _)) = token.split_once(char::is_whitespace) {
            if let Some(node) = literal_node(first) {
                self.pos = start + first.chars().count();
                return node;
            }
        }
        literal_node(token).unwrap_or_else(|| Node::String(token.to_string()))
    }

    fn at_trailing_comment(&self, start: usize) -> bool {
        self.peek() == Some('/')
            && matches!(self.peek_at(1), Some('/') | Some('*'))
            && (self.pos == start || self.chars[self.pos - 1].is_whitespace())
    }

    fn text(&self, start: usize, end: usize) -> String {
        self.chars[start..end].iter().collect()
    }
}

fn closing_quote(open: char) -> Option<char> {
    match open {
        '"' => Some('"'),
        '\'' => Some('\''),
        '\u{201C}' => Some('\u{201D}'),
        '\u{2018}' => Some('\u{2019}'),
        _ => None,
    }
}

fn literal_node(token: &str) -> Option<Node> {
    match token {
        "true" | "True" => Some(Node::Bool(true)),
        "false" | "False" => Some(Node::Bool(false)),
        "null" | "None" | "undefined" => Some(Node::Null),
        _ => number_text(token).map(Node::Number),
    }
}

/// Returns the JSON spelling of a numeric token, fixing a leading `+`, a
/// leading `.` or a trailing `.`.
fn number_text(token: &str) -> Option<String> {
    if is_json_number(token) {
        return Some(token.to_string());
    }
    let mut candidate = token.strip_prefix('+').unwrap_or(token).to_string();
    if candidate.ends_with('.') {
        candidate.push('0');
    }
    if let Some(rest) = candidate.strip_prefix("-.") {
        candidate = format!("-0.{rest}");
    } else if let Some(rest) = candidate.strip_prefix('.') {
        candidate = format!("0.{rest}");
    }
    is_json_number(&candidate).then_some(candidate)
}

/// `-? (0 | [1-9][0-9]*) (\.[0-9]+)? ([eE][+-]?[0-9]+)?`
fn is_json_number(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;
    if bytes.get(i) == Some(&b'-') {
        i += 1;
    }
    match bytes.get(i) {
        Some(b'0') => i += 1,
        Some(b'1'..=b'9') => {
            while matches!(bytes.get(i), Some(b'0'..=b'9')) {
                i += 1;
            }
        }
        _ => return false,
    }
    if bytes.get(i) == Some(&b'.') {
        i += 1;
        let digits_start = i;
        while matches!(bytes.get(i), Some(b'0'..=b'9')) {
            i += 1;
        }
        if i == digits_start {
            return false;
        }
    }
    if matches!(bytes.get(i), Some(b'e') | Some(b'E')) {
        i += 1;
        if matches!(bytes.get(i), Some(b'+') | Some(b'-')) {
            i += 1;
        }
        let digits_start = i;
        while matches!(bytes.get(i), Some(b'0'..=b'9')) {
            i += 1;
        }
        if i == digits_start {
            return false;
        }
    }
    i == bytes.len()
}
