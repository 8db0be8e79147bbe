// Parser for the constraint modelling language.
//
// Parses a token stream (from the lexer) into a `Model` AST. Uses chumsky
// combinators over the logos token stream.
//
// Preconditions: input is a valid token stream from `lexer::lex()`.
// Postconditions: returns an AST plus any parse errors (non-fatal).
// Failure modes: syntax errors produce `Rich` diagnostics; parsing continues.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::diag::Diagnostic;
use crate::lexer::Token;

/// Result of parsing: AST plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub model: Option<Model>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

impl ParseResult {
    /// Convert parse errors into renderable diagnostics.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.errors
            .iter()
            .map(|e| {
                Diagnostic::error(*e.span(), format!("{e}"))
                    .with_hint("statements end with ';'; expressions use /\\, \\/, ->, <->")
            })
            .collect()
    }
}

/// Parse a model source string. Lexes then parses.
///
/// Returns an AST (if parsing succeeded) plus any errors.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    // Convert lexer output to chumsky stream.
    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = model_parser(source);
    let (model, parse_errors) = parser.parse(stream).into_output_errors();

    // Merge lex errors + parse errors.
    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        model,
        errors: all_errors,
    }
}

// ── Main parser builder ──
//
// All grammar rules are built inside `model_parser` so that the `source`
// reference is captured once and shared by all combinators.

fn model_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, Model, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    // ── Identifier ──

    let ident = just(Token::Ident).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Ident {
            name: source[span.start()..span.end()].to_string(),
            span,
        }
    });

    // ── Expression ──
    //
    // Precedence (loosest to tightest): <->, ->, \/, /\, prefix not.
    // `<->` chains fold left-associatively, `->` right-associatively;
    // `\/` and `/\` chains flatten into n-ary nodes.

    let expr = recursive(|expr| {
        let int = select! { Token::Int(n) => n };

        let card_kind = select! {
            Token::AtMost => CardKind::AtMost,
            Token::AtLeast => CardKind::AtLeast,
            Token::Exactly => CardKind::Exactly,
        };

        let var_list = ident
            .clone()
            .separated_by(just(Token::Comma))
            .at_least(1)
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBracket), just(Token::RBracket));

        let card = card_kind
            .then(
                int.then_ignore(just(Token::Comma))
                    .then(var_list)
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .map_with(|(kind, (bound, vars)), e| {
                Expr::Card(CardExpr {
                    kind,
                    bound,
                    vars,
                    span: e.span(),
                })
            });

        let xor = just(Token::Xor)
            .ignore_then(
                expr.clone()
                    .then_ignore(just(Token::Comma))
                    .then(expr.clone())
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .map_with(|(a, b), e| Expr::Xor(Box::new(a), Box::new(b), e.span()));

        let literal = select! {
            Token::True = e => Expr::Const(true, e.span()),
            Token::False = e => Expr::Const(false, e.span()),
        };

        let paren = expr
            .clone()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let atom = choice((
            card,
            xor,
            literal,
            paren,
            ident.clone().map(Expr::Var),
        ));

        let not_op = choice((
            just(Token::Not),
            just(Token::Tilde),
            just(Token::Bang),
        ))
        .map_with(|_, e| {
            let span: SimpleSpan = e.span();
            span
        });

        let not_expr = not_op
            .repeated()
            .collect::<Vec<SimpleSpan>>()
            .then(atom)
            .map(|(negs, inner)| {
                negs.into_iter()
                    .rev()
                    .fold(inner, |acc, span| Expr::Not(Box::new(acc), span))
            });

        let and_expr = not_expr
            .clone()
            .separated_by(just(Token::AndOp))
            .at_least(1)
            .collect::<Vec<_>>()
            .map_with(|mut terms, e| {
                if terms.len() == 1 {
                    terms.pop().unwrap()
                } else {
                    Expr::And(terms, e.span())
                }
            });

        let or_expr = and_expr
            .clone()
            .separated_by(just(Token::OrOp))
            .at_least(1)
            .collect::<Vec<_>>()
            .map_with(|mut terms, e| {
                if terms.len() == 1 {
                    terms.pop().unwrap()
                } else {
                    Expr::Or(terms, e.span())
                }
            });

        let impl_expr = or_expr
            .clone()
            .separated_by(just(Token::Arrow))
            .at_least(1)
            .collect::<Vec<_>>()
            .map_with(|terms, e| {
                let span: SimpleSpan = e.span();
                terms
                    .into_iter()
                    .rev()
                    .reduce(|rhs, lhs| Expr::Implies(Box::new(lhs), Box::new(rhs), span))
                    .unwrap()
            });

        impl_expr
            .clone()
            .separated_by(just(Token::Iff))
            .at_least(1)
            .collect::<Vec<_>>()
            .map_with(|terms, e| {
                let span: SimpleSpan = e.span();
                terms
                    .into_iter()
                    .reduce(|lhs, rhs| Expr::Iff(Box::new(lhs), Box::new(rhs), span))
                    .unwrap()
            })
    });

    // ── Statements ──

    let decl = just(Token::Var)
        .ignore_then(just(Token::Bool))
        .ignore_then(just(Token::Colon))
        .ignore_then(
            ident
                .clone()
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .then_ignore(just(Token::Semi))
        .map_with(|vars, e| {
            Item::Decl(DeclStmt {
                vars,
                span: e.span(),
            })
        });

    let constraint = just(Token::Constraint)
        .ignore_then(expr)
        .then_ignore(just(Token::Semi))
        .map_with(|expr, e| {
            Item::Constraint(ConstraintStmt {
                expr,
                span: e.span(),
            })
        });

    let solve = just(Token::Solve)
        .ignore_then(just(Token::Satisfy))
        .ignore_then(just(Token::Semi))
        .map_with(|_, e| Item::Solve(e.span()));

    let item = choice((decl, constraint, solve));

    item.repeated()
        .collect::<Vec<_>>()
        .map_with(|items, e| Model {
            items,
            span: e.span(),
        })
}

// ── Tests ──
