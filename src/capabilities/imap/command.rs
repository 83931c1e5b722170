//! IMAP command grammar
//!
//! A command is `<tag> <NAME> [args]`. Arguments are atoms, quoted strings (`"..."` with
//! `\"` and `\\` escapes) or literals. A literal is announced by `{n}` (or the
//! non-synchronizing `{n+}`) at the very end of a line; its `n` bytes follow the line
//! terminator and the command then continues on the next line. [`tokenize`] handles one
//! physical line and reports a pending literal so the session can fetch it.

use crate::error_handling::types::CommandError;

/// Largest literal accepted before the command is rejected.
pub const MAX_LITERAL_LENGTH: usize = 8192;

/// Parsed IMAP command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImapCommand {
    pub tag: String,
    /// Upper-cased command name
    pub name: String,
    pub args: Vec<String>,
}

impl ImapCommand {
    /// Builds a command from the arguments of all its lines.
    ///
    /// On failure the recovered tag, if any, is returned with the error.
    pub fn from_tokens(tokens: Vec<String>) -> Result<Self, (Option<String>, CommandError)> {
        let mut tokens = tokens.into_iter();
        let tag = tokens.next();
        let name = tokens.next();

        match (tag, name) {
            (Some(tag), _) if !is_valid_tag(&tag) => Err((None, CommandError::InvalidTag(tag))),
            (Some(tag), Some(name)) => Ok(ImapCommand {
                tag,
                name: name.to_ascii_uppercase(),
                args: tokens.collect(),
            }),
            (tag, _) => Err((tag, CommandError::MissingCommand)),
        }
    }
}

/// Literal announced at the end of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiteralSpec {
    pub length: usize,
    /// `{n}` waits for a `+` continuation, `{n+}` does not
    pub synchronizing: bool,
}

/// Arguments found on one physical line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineTokens {
    pub tokens: Vec<String>,
    pub literal: Option<LiteralSpec>,
}

pub fn tokenize(line: &str) -> Result<LineTokens, CommandError> {
    let mut result = LineTokens::default();
    let mut chars = line.chars().peekable();

    loop {
        while chars.next_if_eq(&' ').is_some() {}

        match chars.peek() {
            None => break,
            Some('"') => {
                chars.next();
                result.tokens.push(quoted(&mut chars)?);
                match chars.peek() {
                    None | Some(' ') => {}
                    Some(&c) => return Err(CommandError::UnexpectedCharacter(c)),
                }
            }
            Some('{') => {
                chars.next();
                let spec: String = chars.by_ref().take_while(|&c| c != '}').collect();
                if chars.next().is_some() {
                    return Err(CommandError::InvalidLiteral(
                        "literal must end the line".to_string(),
                    ));
                }
                result.literal = Some(literal(&spec)?);
                break;
            }
            Some(_) => result.tokens.push(atom(&mut chars)?),
        }
    }

    Ok(result)
}

/// Best guess at the tag of a line that failed to parse.
pub fn guess_tag(line: &str) -> Option<String> {
    line.split_whitespace()
        .next()
        .filter(|tag| is_valid_tag(tag))
        .map(str::to_string)
}

/// A tag is a non-empty atom without `+`, so `*` and `+` never come back as tags.
pub fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag.chars().all(|c| {
            !c.is_control()
                && !matches!(c, ' ' | '(' | ')' | '{' | '%' | '*' | '"' | '\\' | ']' | '+')
        })
}

fn quoted<I: Iterator<Item = char>>(chars: &mut I) -> Result<String, CommandError> {
    let mut value = String::new();
    loop {
        match chars.next() {
            None => return Err(CommandError::UnterminatedQuote),
            Some('"') => return Ok(value),
            Some('\\') => match chars.next() {
                Some(c @ ('"' | '\\')) => value.push(c),
                Some(c) => return Err(CommandError::InvalidEscape(c)),
                None => return Err(CommandError::UnterminatedQuote),
            },
            Some(c) => value.push(c),
        }
    }
}

fn atom<I: Iterator<Item = char>>(
    chars: &mut std::iter::Peekable<I>,
) -> Result<String, CommandError> {
    let mut value = String::new();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' => break,
            '"' => return Err(CommandError::UnexpectedCharacter(c)),
            _ => {
                value.push(c);
                chars.next();
            }
        }
    }
    Ok(value)
}

fn literal(spec: &str) -> Result<LiteralSpec, CommandError> {
    let (digits, synchronizing) = match spec.strip_suffix('+') {
        Some(digits) => (digits, false),
        None => (spec, true),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CommandError::InvalidLiteral(format!("{{{}}}", spec)));
    }
    let length: usize = digits
        .parse()
        .map_err(|_| CommandError::InvalidLiteral(format!("{{{}}}", spec)))?;
    if length > MAX_LITERAL_LENGTH {
        return Err(CommandError::LiteralTooLarge {
            length,
            synchronizing,
        });
    }

    Ok(LiteralSpec {
        length,
        synchronizing,
    })
}
