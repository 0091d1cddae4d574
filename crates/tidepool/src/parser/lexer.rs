use super::{ParseError, Spanned};
use chumsky::prelude::*;
use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token<'code> {
    ParenOpen,
    ParenClose,
    BraceOpen,
    BraceClose,
    BracketOpen,
    BracketClose,
    Comment(&'code str),
    Number(f64),
    /// Raw string literal content, escapes still in place.
    Str(&'code str),
    Identifier(&'code str),
    Let,
    Const,
    Var,
    Function,
    Return,
    Throw,
    If,
    Else,
    While,
    Try,
    Catch,
    New,
    Typeof,
    True,
    False,
    Null,
    Undefined,
    Semicolon,
    Comma,
    Dot,
    Colon,
    Question,
    Arrow,
    Assign,
    PlusAssign,
    MinusAssign,
    EqEq,
    EqEqEq,
    NotEq,
    NotEqEq,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    AndAnd,
    OrOr,
    Bang,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    VerticalBar,
    Newline,
}

impl<'code> Token<'code> {
    pub fn into_cow_str(self) -> Cow<'code, str> {
        match self {
            Self::ParenOpen => "(".into(),
            Self::ParenClose => ")".into(),
            Self::BraceOpen => "{".into(),
            Self::BraceClose => "}".into(),
            Self::BracketOpen => "[".into(),
            Self::BracketClose => "]".into(),
            Self::Comment(comment) => comment.into(),
            Self::Number(number) => number.to_string().into(),
            Self::Str(text) => text.into(),
            Self::Identifier(identifier) => identifier.into(),
            Self::Let => "let".into(),
            Self::Const => "const".into(),
            Self::Var => "var".into(),
            Self::Function => "function".into(),
            Self::Return => "return".into(),
            Self::Throw => "throw".into(),
            Self::If => "if".into(),
            Self::Else => "else".into(),
            Self::While => "while".into(),
            Self::Try => "try".into(),
            Self::Catch => "catch".into(),
            Self::New => "new".into(),
            Self::Typeof => "typeof".into(),
            Self::True => "true".into(),
            Self::False => "false".into(),
            Self::Null => "null".into(),
            Self::Undefined => "undefined".into(),
            Self::Semicolon => ";".into(),
            Self::Comma => ",".into(),
            Self::Dot => ".".into(),
            Self::Colon => ":".into(),
            Self::Question => "?".into(),
            Self::Arrow => "=>".into(),
            Self::Assign => "=".into(),
            Self::PlusAssign => "+=".into(),
            Self::MinusAssign => "-=".into(),
            Self::EqEq => "==".into(),
            Self::EqEqEq => "===".into(),
            Self::NotEq => "!=".into(),
            Self::NotEqEq => "!==".into(),
            Self::Less => "<".into(),
            Self::LessOrEqual => "<=".into(),
            Self::Greater => ">".into(),
            Self::GreaterOrEqual => ">=".into(),
            Self::AndAnd => "&&".into(),
            Self::OrOr => "||".into(),
            Self::Bang => "!".into(),
            Self::Plus => "+".into(),
            Self::Minus => "-".into(),
            Self::Star => "*".into(),
            Self::Slash => "/".into(),
            Self::Percent => "%".into(),
            Self::VerticalBar => "|".into(),
            Self::Newline => "\n".into(),
        }
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.into_cow_str())
    }
}

pub fn lexer<'code>()
-> impl Parser<'code, &'code str, Vec<Spanned<Token<'code>>>, extra::Err<ParseError<'code, char>>> {
    let line_comment = just("//")
        .then(any().and_is(text::newline().not()).repeated())
        .to_slice()
        .map(Token::Comment);

    let block_comment = just("/*")
        .then(any().and_is(just("*/").not()).repeated())
        .then(just("*/"))
        .to_slice()
        .map(Token::Comment);

    let comment = line_comment.or(block_comment);

    let number = text::int(10)
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .from_str()
        .unwrapped()
        .map(Token::Number);

    // The raw slice between the quotes is kept verbatim; escape sequences are
    // resolved later when the literal becomes an AST node.
    let double_quoted = just('"')
        .ignore_then(
            choice((just('\\').then(any()).ignored(), none_of("\\\"").ignored()))
                .repeated()
                .to_slice(),
        )
        .then_ignore(just('"'));

    let single_quoted = just('\'')
        .ignore_then(
            choice((just('\\').then(any()).ignored(), none_of("\\'").ignored()))
                .repeated()
                .to_slice(),
        )
        .then_ignore(just('\''));

    let string = double_quoted.or(single_quoted).map(Token::Str);

    let word = any()
        .filter(|character: &char| {
            character.is_ascii_alphabetic() || *character == '_' || *character == '$'
        })
        .then(
            any()
                .filter(|character: &char| {
                    character.is_ascii_alphanumeric() || *character == '_' || *character == '$'
                })
                .repeated(),
        )
        .to_slice()
        .map(|word: &str| match word {
            "let" => Token::Let,
            "const" => Token::Const,
            "var" => Token::Var,
            "function" => Token::Function,
            "return" => Token::Return,
            "throw" => Token::Throw,
            "if" => Token::If,
            "else" => Token::Else,
            "while" => Token::While,
            "try" => Token::Try,
            "catch" => Token::Catch,
            "new" => Token::New,
            "typeof" => Token::Typeof,
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            "undefined" => Token::Undefined,
            identifier => Token::Identifier(identifier),
        });

    let punctuation = choice((
        just('(').to(Token::ParenOpen),
        just(')').to(Token::ParenClose),
        just('{').to(Token::BraceOpen),
        just('}').to(Token::BraceClose),
        just('[').to(Token::BracketOpen),
        just(']').to(Token::BracketClose),
        just(';').to(Token::Semicolon),
        just(',').to(Token::Comma),
        just('.').to(Token::Dot),
        just(':').to(Token::Colon),
        just('?').to(Token::Question),
    ));

    // Longest first, so `===` never lexes as `==` `=`.
    let operator = choice((
        just("===").to(Token::EqEqEq),
        just("!==").to(Token::NotEqEq),
        just("==").to(Token::EqEq),
        just("!=").to(Token::NotEq),
        just("=>").to(Token::Arrow),
        just("<=").to(Token::LessOrEqual),
        just(">=").to(Token::GreaterOrEqual),
        just("&&").to(Token::AndAnd),
        just("||").to(Token::OrOr),
        just("+=").to(Token::PlusAssign),
        just("-=").to(Token::MinusAssign),
        just('=').to(Token::Assign),
        just('<').to(Token::Less),
        just('>').to(Token::Greater),
        just('!').to(Token::Bang),
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('*').to(Token::Star),
        just('/').to(Token::Slash),
        just('%').to(Token::Percent),
        just('|').to(Token::VerticalBar),
    ));

    let token = choice((
        comment,
        number,
        string,
        word,
        punctuation,
        operator,
        text::newline().to(Token::Newline),
    ));

    token
        .map_with(|token, extra| Spanned {
            node: token,
            span: extra.span(),
        })
        .padded_by(text::inline_whitespace())
        .recover_with(skip_then_retry_until(any().ignored(), end()))
        .repeated()
        .collect()
}
