//! Lexer for XML-like sources using logos
//!
//! Markup needs two lexers: one for character content between tags and one
//! for the inside of a tag. The driver morphs between them on `<` / `</` and
//! `>` / `/>`. No input byte is skipped, so concatenating the lexeme slices
//! reproduces the source exactly.

use crate::error::{ParseError, ParseResult};
use logos::{Lexer, Logos};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Tokens between tags
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentToken {
    #[token("<!--", |lex| skip_past(lex, "-->"))]
    Comment,

    #[token("<![CDATA[", |lex| skip_past(lex, "]]>"))]
    CData,

    #[token("<?", |lex| skip_past(lex, "?>"))]
    ProcessingInstruction,

    #[token("<!", declaration)]
    Declaration,

    #[token("</")]
    EndTagOpen,

    #[token("<")]
    TagOpen,

    #[regex(r"[^<]+")]
    Text,
}

/// Tokens inside a start or end tag
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagToken {
    #[regex(r"[A-Za-z_:][A-Za-z0-9_.:\-]*")]
    Name,

    #[token("=")]
    Equals,

    #[regex(r#""[^"]*""#)]
    #[regex(r"'[^']*'")]
    Value,

    #[regex(r"[ \t\r\n]+")]
    Whitespace,

    #[token(">")]
    Close,

    #[token("/>")]
    EmptyClose,
}

/// Unified token kind stored in the raw tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    Comment,
    CData,
    ProcessingInstruction,
    Declaration,
    EndTagOpen,
    TagOpen,
    Text,
    Name,
    Equals,
    Value,
    Whitespace,
    TagClose,
    EmptyTagClose,
}

impl From<ContentToken> for TokenKind {
    fn from(token: ContentToken) -> Self {
        match token {
            ContentToken::Comment => TokenKind::Comment,
            ContentToken::CData => TokenKind::CData,
            ContentToken::ProcessingInstruction => TokenKind::ProcessingInstruction,
            ContentToken::Declaration => TokenKind::Declaration,
            ContentToken::EndTagOpen => TokenKind::EndTagOpen,
            ContentToken::TagOpen => TokenKind::TagOpen,
            ContentToken::Text => TokenKind::Text,
        }
    }
}

impl From<TagToken> for TokenKind {
    fn from(token: TagToken) -> Self {
        match token {
            TagToken::Name => TokenKind::Name,
            TagToken::Equals => TokenKind::Equals,
            TagToken::Value => TokenKind::Value,
            TagToken::Whitespace => TokenKind::Whitespace,
            TagToken::Close => TokenKind::TagClose,
            TagToken::EmptyClose => TokenKind::EmptyTagClose,
        }
    }
}

/// A token kind plus its byte range in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

impl Lexeme {
    pub fn text<'src>(&self, source: &'src str) -> &'src str {
        &source[self.span.clone()]
    }
}

fn skip_past<'s, T>(lex: &mut Lexer<'s, T>, terminator: &str) -> bool
where
    T: Logos<'s, Source = str>,
{
    match lex.remainder().find(terminator) {
        Some(index) => {
            lex.bump(index + terminator.len());
            true
        }
        None => false,
    }
}

/// `<!DOCTYPE ...>` style declarations, including a bracketed internal subset
fn declaration(lex: &mut Lexer<ContentToken>) -> bool {
    let mut depth = 0usize;
    for (index, ch) in lex.remainder().char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '>' if depth == 0 => {
                lex.bump(index + 1);
                return true;
            }
            _ => {}
        }
    }
    false
}

/// Tokenize a source string
pub fn tokenize(source: &str) -> ParseResult<Vec<Lexeme>> {
    let mut lexemes = Vec::new();
    let mut content = ContentToken::lexer(source);

    while let Some(token) = content.next() {
        let token = token.map_err(|_| ParseError::lexer_error(content.span().start))?;
        lexemes.push(Lexeme {
            kind: token.into(),
            span: content.span(),
        });

        if matches!(token, ContentToken::TagOpen | ContentToken::EndTagOpen) {
            let mut tag = content.morph::<TagToken>();
            while let Some(token) = tag.next() {
                let token = token.map_err(|_| ParseError::lexer_error(tag.span().start))?;
                lexemes.push(Lexeme {
                    kind: token.into(),
                    span: tag.span(),
                });
                if matches!(token, TagToken::Close | TagToken::EmptyClose) {
                    break;
                }
            }
            content = tag.morph();
        }
    }

    Ok(lexemes)
}
