//! Tokens of the declaration language.
//!
//! Only the tokens the declaration scanner needs are distinguished. Everything else an
//! expression may contain is lexed as a generic [`Token::Symbol`] so function bodies and
//! initializers can be skipped without understanding them. Comments are stripped here.

use std::ops::Range;

use logos::{FilterResult, Lexer, Logos};

/// Skips a block comment (`/* .. */`, including KDoc) up to its closing `*/`. An unterminated
/// comment swallows the rest of the source and is reported as invalid.
fn skip_block_comment(lex: &mut Lexer<Token>) -> FilterResult<(), ()> {
    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            FilterResult::Skip
        }
        None => {
            lex.bump(lex.remainder().len());
            FilterResult::Error(())
        }
    }
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
pub enum Token {
    #[token("/*", skip_block_comment)]
    BlockComment,

    #[token("package")]
    Package,
    #[token("import")]
    Import,
    #[token("interface")]
    Interface,
    #[token("class")]
    Class,
    #[token("object")]
    Object,
    #[token("fun")]
    Fun,
    #[token("constructor")]
    Constructor,
    #[token("as")]
    As,

    #[regex(r"[\p{L}_][\p{L}\p{N}_]*")]
    Ident,
    #[regex(r"`[^`\n]+`")]
    QuotedIdent,

    #[regex(r#""([^"\\\n]|\\.)*""#)]
    StringLit,
    #[regex(r#""""([^"]|"[^"]|""[^"])*""""#)]
    RawStringLit,
    #[regex(r"'([^'\\\n]|\\.)+'")]
    CharLit,
    #[regex(r"[0-9][0-9A-Za-z_]*(\.[0-9][0-9A-Za-z_]*)?")]
    Number,

    #[token("@")]
    At,
    #[token("::")]
    ColonColon,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token("=")]
    Eq,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    /// Any other punctuation or operator character.
    #[regex(r"[^\s\p{L}\p{N}_@:.,;=(){}\[\]<>`'\x22]")]
    Symbol,
}

impl Token {
    pub fn is_open_bracket(self) -> bool {
        matches!(self, Token::LParen | Token::LBrace | Token::LBracket)
    }

    pub fn is_close_bracket(self) -> bool {
        matches!(self, Token::RParen | Token::RBrace | Token::RBracket)
    }
}

/// A token with the byte range it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpannedToken {
    pub token: Token,
    pub range: Range<usize>,
}

/// Tokenizes `source`. Byte ranges of characters no token accepts are returned separately.
pub fn tokenize(source: &str) -> (Vec<SpannedToken>, Vec<Range<usize>>) {
    let mut tokens = vec![];
    let mut invalid = vec![];
    for (result, range) in Token::lexer(source).spanned() {
        match result {
            Ok(token) => tokens.push(SpannedToken { token, range }),
            Err(()) => invalid.push(range),
        }
    }
    (tokens, invalid)
}
