#![allow(clippy::module_name_repetitions)]

//! Lexer and parser for console command lines.
//!
//! `regal` produces a bounded token stream and `winnow` combinators walk it
//! against the [`catalog`](super::catalog) AST. Interval values stay signed
//! here; rejecting non-positive values is the control surface's job.

use core::fmt;
use core::ops::Range;

use heapless::Vec as HeaplessVec;
use regal::IncrementalError;
use regal::TokenCache;
use regal_macros::RegalLexer;
#[allow(deprecated)]
use winnow::error::ErrorKind;
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;
use winnow::stream::Stream;

use super::catalog::{self, ChoiceBranch, ChoiceTag, CommandTag, Node, ValueSpec};

/// Maximum number of tokens produced per command line.
pub const MAX_TOKENS: usize = 16;
const MAX_CACHE_RECORDS: usize = MAX_TOKENS * 2;

/// Keyword introducing the `interval=<n>` value form.
const INTERVAL_KEY: &str = "interval";

#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Integer literal with an `s` suffix.
    #[regex(r"-?[0-9]+s", priority = 2)]
    Seconds,
    #[regex(r"-?[0-9]+")]
    Integer,
    /// Identifier or keyword, matched case-insensitively by the parser.
    #[regex(r"[A-Za-z][A-Za-z0-9_]*")]
    Ident,
    #[token("=")]
    Equals,
    #[regex(r"[ \t]+", skip)]
    Whitespace,
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Eol,
    /// Anything the lexer does not recognize.
    #[default]
    #[regex(r".", priority = 1024)]
    Error,
}

/// Token with a byte span back into the source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: Range<usize>,
}

pub type TokenBuffer<'a> = HeaplessVec<Token<'a>, MAX_TOKENS>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexError {
    /// Line produced more tokens than the static buffer holds.
    TooManyTokens { processed: usize },
    Engine,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::TooManyTokens { processed } => {
                write!(f, "line too long after {processed} tokens")
            }
            LexError::Engine => f.write_str("lexer engine error"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarErrorKind<'a> {
    UnexpectedToken {
        expected: &'static str,
        found: &'a str,
        span: Range<usize>,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    InvalidInteger {
        lexeme: &'a str,
    },
    InvalidToken {
        lexeme: &'a str,
        span: Range<usize>,
    },
}

impl fmt::Display for GrammarErrorKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarErrorKind::UnexpectedToken {
                expected,
                found,
                span,
            } => write!(f, "expected {expected}, found `{found}` at {}", span.start),
            GrammarErrorKind::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of line, expected {expected}")
            }
            GrammarErrorKind::InvalidInteger { lexeme } => {
                write!(f, "integer out of range: `{lexeme}`")
            }
            GrammarErrorKind::InvalidToken { lexeme, span } => {
                write!(f, "unsupported character `{lexeme}` at {}", span.start)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarError<'a> {
    pub kind: GrammarErrorKind<'a>,
}

impl fmt::Display for GrammarError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind, f)
    }
}

impl<'a> GrammarError<'a> {
    fn unexpected(expected: &'static str, token: Option<&Token<'a>>) -> Self {
        GrammarError {
            kind: match token {
                Some(tok) if tok.kind != TokenKind::Eol => GrammarErrorKind::UnexpectedToken {
                    expected,
                    found: tok.lexeme,
                    span: tok.span.clone(),
                },
                _ => GrammarErrorKind::UnexpectedEnd { expected },
            },
        }
    }

    fn invalid_integer(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidInteger {
                lexeme: token.lexeme,
            },
        }
    }

    fn invalid_token(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidToken {
                lexeme: token.lexeme,
                span: token.span.clone(),
            },
        }
    }
}

type Input<'src, 'slice> = &'slice [Token<'src>];

#[allow(deprecated)]
impl<'src, 'slice> ParserError<Input<'src, 'slice>> for GrammarError<'src>
where
    'src: 'slice,
{
    fn from_error_kind(input: &Input<'src, 'slice>, _kind: ErrorKind) -> Self {
        GrammarError::unexpected("token", input.first())
    }

    fn append(
        self,
        _input: &Input<'src, 'slice>,
        _token_start: &<Input<'src, 'slice> as Stream>::Checkpoint,
        _kind: ErrorKind,
    ) -> Self {
        self
    }

    fn or(self, other: Self) -> Self {
        other
    }
}

/// Combined lex/parse error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Lex(LexError),
    Grammar(GrammarError<'a>),
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(err) => fmt::Display::fmt(err, f),
            ParseError::Grammar(err) => fmt::Display::fmt(err, f),
        }
    }
}

/// Parsed console command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Shoot(ShootCommand),
    Cancel,
    Status,
    Help { topic: Option<&'a str> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShootCommand {
    Now,
    /// One-shot after the given number of seconds.
    After(i64),
    /// Repeating every given number of seconds.
    Every(i64),
}

/// Tokenizes `line`.
///
/// # Errors
///
/// Returns [`LexError`] when the line overflows the token buffer.
pub fn lex(line: &str) -> Result<TokenBuffer<'_>, LexError> {
    let compiled = TokenKind::lexer();
    let mut cache: TokenCache<TokenKind, MAX_CACHE_RECORDS> = TokenCache::new();
    let partial = cache
        .rebuild(compiled, line)
        .map_err(map_incremental_error)?;
    let mut buffer = TokenBuffer::new();
    let overflow = |_| LexError::TooManyTokens {
        processed: MAX_TOKENS + 1,
    };

    for record in cache.tokens() {
        if record.skipped {
            continue;
        }
        buffer
            .push(Token {
                kind: record.token,
                lexeme: &line[record.start..record.end],
                span: record.start..record.end,
            })
            .map_err(overflow)?;
    }

    if let Some(partial) = partial.filter(|partial| !partial.fragment.is_empty()) {
        buffer
            .push(Token {
                kind: TokenKind::Error,
                lexeme: partial.fragment,
                span: partial.start..partial.start + partial.fragment.len(),
            })
            .map_err(overflow)?;
    }

    Ok(buffer)
}

fn map_incremental_error(error: IncrementalError) -> LexError {
    match error {
        IncrementalError::TokenOverflow => LexError::TooManyTokens {
            processed: MAX_TOKENS,
        },
        _ => LexError::Engine,
    }
}

/// Parses a single console command line.
///
/// # Errors
///
/// Returns [`ParseError`] for unknown commands, malformed arguments, or
/// characters outside the grammar.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = lex(line).map_err(ParseError::Lex)?;

    if let Some(bad) = tokens.iter().find(|token| token.kind == TokenKind::Error) {
        return Err(ParseError::Grammar(GrammarError::invalid_token(bad)));
    }

    let mut input = tokens.as_slice();
    let parsed = match command().parse_next(&mut input) {
        Ok(cmd) => cmd,
        Err(ErrMode::Backtrack(err) | ErrMode::Cut(err)) => return Err(ParseError::Grammar(err)),
        Err(ErrMode::Incomplete(_)) => {
            return Err(ParseError::Grammar(GrammarError::unexpected(
                "token",
                input.first(),
            )));
        }
    };

    if let Some(extra) = input.iter().find(|token| token.kind != TokenKind::Eol) {
        return Err(ParseError::Grammar(GrammarError::unexpected(
            "end of command",
            Some(extra),
        )));
    }

    Ok(parsed)
}

fn command<'src, 'slice>() -> impl Parser<Input<'src, 'slice>, Command<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| {
        let keyword = expect_kind(TokenKind::Ident, "command").parse_next(input)?;
        let Some(spec) = catalog::find(keyword.lexeme) else {
            return Err(ErrMode::Backtrack(GrammarError::unexpected(
                "command",
                Some(&keyword),
            )));
        };

        match (spec.tag, spec.grammar) {
            (CommandTag::Shoot, node) => parse_shoot(node, input).map(Command::Shoot),
            (CommandTag::Help, _) => parse_topic(input).map(|topic| Command::Help { topic }),
            (CommandTag::Cancel, _) => Ok(Command::Cancel),
            (CommandTag::Status, _) => Ok(Command::Status),
        }
    }
}

fn parse_shoot<'src, 'slice>(
    node: &'static Node,
    input: &mut Input<'src, 'slice>,
) -> Result<ShootCommand, ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    let Node::OptionalChoice { choices, default } = node else {
        return Ok(ShootCommand::Now);
    };

    match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Ident => {
            let Some(branch) = find_choice(choices, token.lexeme) else {
                return Err(ErrMode::Backtrack(GrammarError::unexpected(
                    "now, after, or every",
                    Some(token),
                )));
            };
            *input = rest;
            parse_choice_branch(input, branch)
        }
        None => apply_default(*default),
        Some((token, _)) if token.kind == TokenKind::Eol => apply_default(*default),
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            "now, after, or every",
            Some(token),
        ))),
    }
}

fn apply_default<'src>(default: Option<ChoiceTag>) -> Result<ShootCommand, ErrMode<GrammarError<'src>>> {
    match default {
        Some(ChoiceTag::ShootNow) | None => Ok(ShootCommand::Now),
        Some(_) => Err(ErrMode::Backtrack(GrammarError::unexpected("seconds", None))),
    }
}

fn parse_choice_branch<'src, 'slice>(
    input: &mut Input<'src, 'slice>,
    branch: &'static ChoiceBranch,
) -> Result<ShootCommand, ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    let seconds = match branch.value {
        ValueSpec::None => None,
        ValueSpec::Seconds => Some(parse_seconds(input)?),
    };

    match (branch.tag, seconds) {
        (ChoiceTag::ShootAfter, Some(value)) => Ok(ShootCommand::After(value)),
        (ChoiceTag::ShootEvery, Some(value)) => Ok(ShootCommand::Every(value)),
        _ => Ok(ShootCommand::Now),
    }
}

/// Accepts `5`, `5s`, or `interval=5` / `interval=5s`.
fn parse_seconds<'src, 'slice>(
    input: &mut Input<'src, 'slice>,
) -> Result<i64, ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    if let Some((token, rest)) = input.split_first()
        && token.kind == TokenKind::Ident
        && token.lexeme.eq_ignore_ascii_case(INTERVAL_KEY)
    {
        *input = rest;
        expect_kind(TokenKind::Equals, "=").parse_next(input)?;
    }

    match input.split_first() {
        Some((token, rest)) if matches!(token.kind, TokenKind::Integer | TokenKind::Seconds) => {
            *input = rest;
            parse_integer(token).map_err(ErrMode::Cut)
        }
        other => Err(ErrMode::Backtrack(GrammarError::unexpected(
            "seconds",
            other.map(|(token, _)| token),
        ))),
    }
}

fn parse_topic<'src, 'slice>(
    input: &mut Input<'src, 'slice>,
) -> Result<Option<&'src str>, ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Ident => {
            *input = rest;
            Ok(Some(token.lexeme))
        }
        None => Ok(None),
        Some((token, _)) if token.kind == TokenKind::Eol => Ok(None),
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            "command name",
            Some(token),
        ))),
    }
}

fn find_choice(choices: &'static [ChoiceBranch], lexeme: &str) -> Option<&'static ChoiceBranch> {
    choices
        .iter()
        .find(|choice| choice.keyword.eq_ignore_ascii_case(lexeme))
}

fn expect_kind<'src, 'slice>(
    kind: TokenKind,
    label: &'static str,
) -> impl Parser<Input<'src, 'slice>, Token<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| match input.split_first() {
        Some((token, rest)) if token.kind == kind => {
            *input = rest;
            Ok(token.clone())
        }
        other => Err(ErrMode::Backtrack(GrammarError::unexpected(
            label,
            other.map(|(token, _)| token),
        ))),
    }
}

fn parse_integer<'a>(token: &Token<'a>) -> Result<i64, GrammarError<'a>> {
    let digits = token.lexeme.strip_suffix('s').unwrap_or(token.lexeme);
    digits
        .parse::<i64>()
        .map_err(|_| GrammarError::invalid_integer(token))
}
