// Lexer for the constraint modelling language.
//
// Tokenizes model source with the `logos` crate. Whitespace (including
// newlines) is insignificant; `%` and `//` start line comments.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: unrecognized characters produce `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// Modelling-language token types.
///
/// Keywords and operators are matched as fixed strings. Identifiers carry
/// no value — use the span to retrieve the text from the source.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+|%[^\n]*|//[^\n]*")]
pub enum Token {
    // ── Keywords ──
    #[token("var")]
    Var,
    #[token("bool")]
    Bool,
    #[token("constraint")]
    Constraint,
    #[token("solve")]
    Solve,
    #[token("satisfy")]
    Satisfy,
    #[token("not")]
    Not,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("xor")]
    Xor,
    #[token("atmost")]
    AtMost,
    #[token("atleast")]
    AtLeast,
    #[token("exactly")]
    Exactly,

    // ── Operators ──
    #[token("<->")]
    Iff,
    #[token("->")]
    Arrow,
    #[token(r"\/")]
    OrOp,
    #[token(r"/\")]
    AndOp,
    #[token("~")]
    Tilde,
    #[token("!")]
    Bang,

    // ── Punctuation ──
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,

    // ── Literals ──
    /// Unsigned integer literal (cardinality bounds).
    #[regex(r"[0-9]+", parse_int)]
    Int(u32),

    // ── Identifier ──
    //
    // Placed after keywords — logos prioritises fixed `#[token]` matches
    // over regex for the same length, so `var` matches Var, not Ident.
    /// Identifier: `[A-Za-z_][A-Za-z0-9_]*`
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Var => write!(f, "var"),
            Token::Bool => write!(f, "bool"),
            Token::Constraint => write!(f, "constraint"),
            Token::Solve => write!(f, "solve"),
            Token::Satisfy => write!(f, "satisfy"),
            Token::Not => write!(f, "not"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Xor => write!(f, "xor"),
            Token::AtMost => write!(f, "atmost"),
            Token::AtLeast => write!(f, "atleast"),
            Token::Exactly => write!(f, "exactly"),
            Token::Iff => write!(f, "<->"),
            Token::Arrow => write!(f, "->"),
            Token::OrOp => write!(f, r"\/"),
            Token::AndOp => write!(f, r"/\"),
            Token::Tilde => write!(f, "~"),
            Token::Bang => write!(f, "!"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Colon => write!(f, ":"),
            Token::Comma => write!(f, ","),
            Token::Semi => write!(f, ";"),
            Token::Int(n) => write!(f, "{n}"),
            Token::Ident => write!(f, "<ident>"),
        }
    }
}

// ── Callbacks ──

fn parse_int(lex: &mut logos::Lexer<'_, Token>) -> Option<u32> {
    lex.slice().parse().ok()
}

// ── Public API ──

/// Lex a model source string into tokens.
///
/// Returns all successfully parsed tokens together with any errors for
/// unrecognised characters. Lexing is non-fatal: errors are collected and
/// the lexer continues past bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected character: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

/// Render a token stream back to source text.
///
/// Output is whitespace-normalised and comment-free; re-lexing it yields the
/// same token sequence. Identifier text is recovered from `source` via spans.
pub fn stringify(source: &str, tokens: &[(Token, Span)]) -> String {
    let mut out = String::new();
    for (token, span) in tokens {
        if !out.is_empty() {
            out.push(' ');
        }
        match token {
            Token::Ident => out.push_str(&source[span.start..span.end]),
            other => {
                use std::fmt::Write as _;
                let _ = write!(out, "{other}");
            }
        }
    }
    out
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: lex and assert no errors, return token list.
    fn lex_ok(source: &str) -> Vec<Token> {
        let result = lex(source);
        assert!(
            result.errors.is_empty(),
            "unexpected lex errors: {:?}",
            result.errors
        );
        result.tokens.into_iter().map(|(t, _)| t).collect()
    }

    // ── Keywords ──

    #[test]
    fn keywords() {
        let tokens = lex_ok("var bool constraint solve satisfy not true false xor");
        assert_eq!(
            tokens,
            vec![
                Token::Var,
                Token::Bool,
                Token::Constraint,
                Token::Solve,
                Token::Satisfy,
                Token::Not,
                Token::True,
                Token::False,
                Token::Xor,
            ]
        );
    }

    #[test]
    fn keyword_vs_ident() {
        // `variable` is an identifier, not keyword `var` + `iable`
        let tokens = lex_ok("var variable");
        assert_eq!(tokens, vec![Token::Var, Token::Ident]);
    }

    #[test]
    fn cardinality_keywords() {
        let tokens = lex_ok("atmost atleast exactly atmostly");
        assert_eq!(
            tokens,
            vec![Token::AtMost, Token::AtLeast, Token::Exactly, Token::Ident]
        );
    }

    // ── Operators ──

    #[test]
    fn operators() {
        let tokens = lex_ok(r"<-> -> \/ /\ ~ !");
        assert_eq!(
            tokens,
            vec![
                Token::Iff,
                Token::Arrow,
                Token::OrOp,
                Token::AndOp,
                Token::Tilde,
                Token::Bang,
            ]
        );
    }

    #[test]
    fn iff_wins_over_arrow() {
        // `<->` must not lex as `<` error + `->`
        let tokens = lex_ok("a <-> b");
        assert_eq!(tokens, vec![Token::Ident, Token::Iff, Token::Ident]);
    }

    // ── Literals ──

    #[test]
    fn integer_literal() {
        let tokens = lex_ok("atmost(2, [a, b])");
        assert_eq!(
            tokens,
            vec![
                Token::AtMost,
                Token::LParen,
                Token::Int(2),
                Token::Comma,
                Token::LBracket,
                Token::Ident,
                Token::Comma,
                Token::Ident,
                Token::RBracket,
                Token::RParen,
            ]
        );
    }

    #[test]
    fn integer_overflow_is_error() {
        let result = lex("99999999999999999999");
        assert_eq!(result.errors.len(), 1);
    }

    // ── Comments ──

    #[test]
    fn percent_comment_skipped() {
        let tokens = lex_ok("x % anything goes here ; var\ny");
        assert_eq!(tokens, vec![Token::Ident, Token::Ident]);
    }

    #[test]
    fn slash_comment_skipped() {
        let tokens = lex_ok("x // also a comment\ny");
        assert_eq!(tokens, vec![Token::Ident, Token::Ident]);
    }

    // ── Spans ──

    #[test]
    fn spans_correct() {
        let result = lex("var x");
        assert!(result.errors.is_empty());
        assert_eq!(result.tokens.len(), 2);
        assert_eq!(result.tokens[0].1, Span { start: 0, end: 3 });
        assert_eq!(result.tokens[1].1, Span { start: 4, end: 5 });
    }

    // ── Declaration statement ──

    #[test]
    fn declaration_statement() {
        let tokens = lex_ok("var bool: p1_1, p1_2;");
        assert_eq!(
            tokens,
            vec![
                Token::Var,
                Token::Bool,
                Token::Colon,
                Token::Ident,
                Token::Comma,
                Token::Ident,
                Token::Semi,
            ]
        );
    }

    // ── Error recovery ──

    #[test]
    fn error_recovery() {
        let result = lex("a $ b");
        let tokens: Vec<Token> = result.tokens.into_iter().map(|(t, _)| t).collect();
        assert_eq!(tokens, vec![Token::Ident, Token::Ident]);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].span, Span { start: 2, end: 3 });
    }

    // ── Stringify round-trip ──

    #[test]
    fn stringify_roundtrip() {
        let source = "var bool: a, b; % a comment\nconstraint a /\\ not b;\nsolve satisfy;";
        let first = lex(source);
        assert!(first.errors.is_empty());
        let rendered = stringify(source, &first.tokens);
        let second = lex(&rendered);
        assert!(second.errors.is_empty());
        let a: Vec<Token> = first.tokens.into_iter().map(|(t, _)| t).collect();
        let b: Vec<Token> = second.tokens.iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(a, b);
        assert!(rendered.contains("a /\\ not b"));
    }
}
