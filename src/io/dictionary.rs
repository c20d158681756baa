//! Tokenizer and dictionary for field files.
//!
//! Understands the subset of the dictionary syntax that field files use:
//!
//! ```text
//! key  value tokens ;          // stream entry
//! key  { nested entries }      // sub-dictionary
//! /* block */ and // line comments
//! ```
//!
//! Streams keep their tokens; typed values are extracted on lookup.

use std::fmt;

use crate::error::{FvError, Result};
use crate::io::format::{parse_patch_value, parse_value};
use crate::types::FieldValue;

// =============================================================================
// Tokens
// =============================================================================

/// Lexical token.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    /// Bare word (`uniform`, `List<scalar>`, `fixedValue`)
    Word(String),
    /// Numeric literal
    Number(f64),
    /// Quoted string, quotes removed
    Str(String),
    /// One of `{ } ( ) [ ] ;`
    Punct(char),
}

impl Token {
    pub fn as_word(&self) -> Option<&str> {
        match self {
            Token::Word(w) | Token::Str(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Token::Number(x) => Some(*x),
            _ => None,
        }
    }

    pub fn is_punct(&self, c: char) -> bool {
        matches!(self, Token::Punct(p) if *p == c)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(w) => write!(f, "{w}"),
            Token::Number(x) => write!(f, "{}", crate::io::format::format_scalar(*x)),
            Token::Str(s) => write!(f, "\"{s}\""),
            Token::Punct(c) => write!(f, "{c}"),
        }
    }
}

fn is_punct(c: char) -> bool {
    matches!(c, '{' | '}' | '(' | ')' | '[' | ']' | ';')
}

/// Split text into tokens, each tagged with its 1-based line number.
pub fn tokenize(text: &str) -> Result<Vec<(Token, usize)>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\n' {
            line += 1;
            i += 1;
        } else if c.is_whitespace() {
            i += 1;
        } else if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && chars.get(i + 1) == Some(&'*') {
            let start_line = line;
            i += 2;
            loop {
                match chars.get(i) {
                    None => return Err(FvError::parse(start_line, "unterminated comment")),
                    Some('*') if chars.get(i + 1) == Some(&'/') => {
                        i += 2;
                        break;
                    }
                    Some('\n') => {
                        line += 1;
                        i += 1;
                    }
                    Some(_) => i += 1,
                }
            }
        } else if is_punct(c) {
            tokens.push((Token::Punct(c), line));
            i += 1;
        } else if c == '"' {
            let start_line = line;
            let mut s = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => return Err(FvError::parse(start_line, "unterminated string")),
                    Some('"') => {
                        i += 1;
                        break;
                    }
                    Some(&ch) => {
                        if ch == '\n' {
                            line += 1;
                        }
                        s.push(ch);
                        i += 1;
                    }
                }
            }
            tokens.push((Token::Str(s), start_line));
        } else {
            let start = i;
            while i < chars.len() && !chars[i].is_whitespace() && !is_punct(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            let token = match word.parse::<f64>() {
                Ok(x) if starts_numeric(&word) => Token::Number(x),
                _ => Token::Word(word),
            };
            tokens.push((token, line));
        }
    }
    Ok(tokens)
}

/// `inf`/`nan` parse as floats but are only numbers when written as such.
fn starts_numeric(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() || c == '.' => true,
        Some('-') | Some('+') => chars
            .next()
            .is_some_and(|c| c.is_ascii_digit() || c == '.' || c == 'i' || c == 'N'),
        Some('i') | Some('N') => word == "inf" || word == "NaN",
        _ => false,
    }
}

// =============================================================================
// Dictionary
// =============================================================================

/// Dictionary entry.
#[derive(Clone, Debug, PartialEq)]
pub enum Entry {
    /// Token stream terminated by `;`
    Stream { tokens: Vec<Token>, line: usize },
    /// Nested dictionary
    Dict(Dictionary),
}

/// Ordered keyword dictionary.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dictionary {
    entries: Vec<(String, Entry)>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse dictionary text.
    pub fn parse(text: &str) -> Result<Self> {
        let tokens = tokenize(text)?;
        let mut pos = 0;
        let dict = parse_entries(&tokens, &mut pos, false)?;
        Ok(dict)
    }

    /// Build from `(key, value text)` pairs, each value parsed as a stream.
    ///
    /// ```
    /// use fv_rs::io::Dictionary;
    ///
    /// let d = Dictionary::from_pairs(&[("value", "uniform 1"), ("gradient", "uniform 0")]).unwrap();
    /// assert_eq!(d.scalar("missing").is_err(), true);
    /// assert!(d.contains("gradient"));
    /// ```
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Result<Self> {
        let mut dict = Self::new();
        for (key, text) in pairs {
            dict.add_stream_text(key, text)?;
        }
        Ok(dict)
    }

    /// Insert or replace a stream entry from text.
    pub fn add_stream_text(&mut self, key: &str, text: &str) -> Result<()> {
        let tokens = tokenize(text)?.into_iter().map(|(t, _)| t).collect();
        self.insert(key, Entry::Stream { tokens, line: 0 });
        Ok(())
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, key: &str, entry: Entry) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = entry,
            None => self.entries.push((key.to_string(), entry)),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, e)| e)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn entries(&self) -> &[(String, Entry)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tokens of a stream entry, with its line.
    pub fn stream(&self, key: &str) -> Result<(&[Token], usize)> {
        match self.get(key) {
            Some(Entry::Stream { tokens, line }) => Ok((tokens, *line)),
            Some(Entry::Dict(_)) => Err(FvError::InvalidConfig(format!(
                "entry '{key}' is a dictionary, expected a value"
            ))),
            None => Err(FvError::not_found("dictionary entry", key)),
        }
    }

    /// Nested dictionary.
    pub fn sub_dict(&self, key: &str) -> Result<&Dictionary> {
        match self.get(key) {
            Some(Entry::Dict(d)) => Ok(d),
            Some(Entry::Stream { .. }) => Err(FvError::InvalidConfig(format!(
                "entry '{key}' is a value, expected a dictionary"
            ))),
            None => Err(FvError::not_found("dictionary", key)),
        }
    }

    /// Single-word entry.
    pub fn word(&self, key: &str) -> Result<String> {
        let (tokens, line) = self.stream(key)?;
        match tokens {
            [t] => t
                .as_word()
                .map(str::to_string)
                .ok_or_else(|| FvError::parse(line, format!("'{key}' must be a word"))),
            _ => Err(FvError::parse(line, format!("'{key}' must be a single word"))),
        }
    }

    /// Single-number entry.
    pub fn scalar(&self, key: &str) -> Result<f64> {
        let (tokens, line) = self.stream(key)?;
        match tokens {
            [t] => t
                .as_number()
                .ok_or_else(|| FvError::parse(line, format!("'{key}' must be a number"))),
            _ => Err(FvError::parse(line, format!("'{key}' must be a single number"))),
        }
    }

    /// Number entry with a default.
    pub fn scalar_or(&self, key: &str, default: f64) -> Result<f64> {
        if self.contains(key) {
            self.scalar(key)
        } else {
            Ok(default)
        }
    }

    /// Single typed value (`1.5`, `(1 0 0)`).
    pub fn value<T: FieldValue>(&self, key: &str) -> Result<T> {
        let (tokens, line) = self.stream(key)?;
        let (value, used) = parse_value::<T>(tokens)
            .ok_or_else(|| FvError::parse(line, format!("'{key}' is not a {}", T::TYPE_NAME)))?;
        if used != tokens.len() {
            return Err(FvError::parse(line, format!("trailing tokens after '{key}'")));
        }
        Ok(value)
    }

    /// Patch value (`uniform v` or `nonuniform List<type> n (...)`).
    pub fn patch_value<T: FieldValue>(
        &self,
        key: &str,
        n: usize,
    ) -> Result<crate::boundary::PatchValue<T>> {
        let (tokens, line) = self.stream(key)?;
        parse_patch_value::<T>(tokens, n).map_err(|message| {
            FvError::parse(line, format!("entry '{key}': {message}"))
        })
    }

    /// Patch value expanded to `n` entries.
    pub fn field<T: FieldValue>(&self, key: &str, n: usize) -> Result<Vec<T>> {
        Ok(self.patch_value::<T>(key, n)?.to_vec(n))
    }
}

fn parse_entries(tokens: &[(Token, usize)], pos: &mut usize, nested: bool) -> Result<Dictionary> {
    let mut dict = Dictionary::new();
    loop {
        let Some((token, line)) = tokens.get(*pos) else {
            if nested {
                let line = tokens.last().map_or(1, |(_, l)| *l);
                return Err(FvError::parse(line, "missing '}'"));
            }
            return Ok(dict);
        };
        if token.is_punct('}') {
            if !nested {
                return Err(FvError::parse(*line, "unexpected '}'"));
            }
            *pos += 1;
            return Ok(dict);
        }
        let key = token
            .as_word()
            .ok_or_else(|| FvError::parse(*line, format!("expected a keyword, found '{token}'")))?
            .to_string();
        let key_line = *line;
        *pos += 1;

        match tokens.get(*pos) {
            Some((t, _)) if t.is_punct('{') => {
                *pos += 1;
                let sub = parse_entries(tokens, pos, true)?;
                dict.insert(&key, Entry::Dict(sub));
            }
            _ => {
                let mut stream = Vec::new();
                let mut depth = 0i32;
                loop {
                    let Some((t, l)) = tokens.get(*pos) else {
                        return Err(FvError::parse(key_line, format!("entry '{key}' missing ';'")));
                    };
                    *pos += 1;
                    match t {
                        Token::Punct(';') if depth == 0 => break,
                        Token::Punct('(') | Token::Punct('[') | Token::Punct('{') => depth += 1,
                        Token::Punct(')') | Token::Punct(']') | Token::Punct('}') => {
                            depth -= 1;
                            if depth < 0 {
                                return Err(FvError::parse(*l, format!("unbalanced '{t}'")));
                            }
                        }
                        _ => {}
                    }
                    stream.push(t.clone());
                }
                dict.insert(
                    &key,
                    Entry::Stream {
                        tokens: stream,
                        line: key_line,
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vector;

    #[test]
    fn test_tokenize_with_comments() {
        let toks = tokenize("a 1.5; // note\n/* multi\nline */ b (1 2 3);").unwrap();
        assert_eq!(toks[0], (Token::Word("a".into()), 1));
        assert_eq!(toks[1], (Token::Number(1.5), 1));
        assert_eq!(toks[3].1, 3);
        assert!(tokenize("/* open").is_err());
    }

    #[test]
    fn test_parse_nested_dictionary() {
        let text = r#"
            boundaryField
            {
                inlet { type fixedValue; value uniform (1 0 0); }
                wall  { type zeroGradient; }
            }
            note "quoted text";
        "#;
        let dict = Dictionary::parse(text).unwrap();
        let bf = dict.sub_dict("boundaryField").unwrap();
        let inlet = bf.sub_dict("inlet").unwrap();
        assert_eq!(inlet.word("type").unwrap(), "fixedValue");
        let v = inlet.field::<Vector>("value", 2).unwrap();
        assert_eq!(v, vec![Vector::X, Vector::X]);
        assert_eq!(dict.word("note").unwrap(), "quoted text");
        assert_eq!(bf.keys().collect::<Vec<_>>(), vec!["inlet", "wall"]);
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let err = Dictionary::parse("a 1;\nb 2\n").unwrap_err();
        assert!(matches!(err, FvError::Parse { line: 2, .. }));
        let err = Dictionary::parse("a { b 1;\n").unwrap_err();
        assert!(matches!(err, FvError::Parse { .. }));
        let dict = Dictionary::parse("a word;").unwrap();
        assert!(dict.scalar("a").is_err());
        assert!(matches!(dict.scalar("b"), Err(FvError::NotFound { .. })));
    }

    #[test]
    fn test_special_float_words() {
        let dict = Dictionary::parse("a -1e-05; b inf; c infinite;").unwrap();
        assert_eq!(dict.scalar("a").unwrap(), -1e-5);
        assert_eq!(dict.scalar("b").unwrap(), f64::INFINITY);
        assert_eq!(dict.word("c").unwrap(), "infinite");
    }
}
