//! Lexer, AST, and grammar for the playground's script dialect.
//!
//! The typed dialect is the same grammar with optional type annotations;
//! annotations are parsed and discarded, never checked.

use chumsky::{input::ValueInput, pratt::*, prelude::*};
use std::borrow::Cow;

mod lexer;
pub use lexer::{Token, lexer};

mod report;
pub use report::render;

pub use chumsky::prelude::{Input, Parser};

pub type Span = SimpleSpan;
pub type ParseError<'code, T> = Rich<'code, T, Span>;

/// Filename used in parse reports for playground snippets.
pub const SNIPPET_FILENAME: &str = "snippet";

#[derive(Debug, Clone)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

#[derive(Debug, Clone)]
pub enum Statement<'code> {
    Declaration {
        kind: DeclarationKind,
        name: &'code str,
        initializer: Option<Spanned<Expression<'code>>>,
    },
    Function {
        name: &'code str,
        parameters: Vec<Parameter<'code>>,
        body: Vec<Spanned<Statement<'code>>>,
    },
    Expression(Spanned<Expression<'code>>),
    Return(Option<Spanned<Expression<'code>>>),
    Throw(Spanned<Expression<'code>>),
    If {
        condition: Spanned<Expression<'code>>,
        then_branch: Vec<Spanned<Statement<'code>>>,
        /// Either a block or another `If` (an `else if` chain).
        else_branch: Option<Box<Spanned<Statement<'code>>>>,
    },
    While {
        condition: Spanned<Expression<'code>>,
        body: Vec<Spanned<Statement<'code>>>,
    },
    Try {
        body: Vec<Spanned<Statement<'code>>>,
        catch_binding: Option<&'code str>,
        catch_body: Vec<Spanned<Statement<'code>>>,
    },
    Block(Vec<Spanned<Statement<'code>>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Let,
    Const,
    Var,
}

#[derive(Debug, Clone, Copy)]
pub struct Parameter<'code> {
    pub name: &'code str,
}

#[derive(Debug, Clone)]
pub enum Expression<'code> {
    Literal(Literal<'code>),
    Identifier(&'code str),
    Array(Vec<Spanned<Self>>),
    Object(Vec<ObjectProperty<'code>>),
    Function {
        name: Option<&'code str>,
        parameters: Vec<Parameter<'code>>,
        body: Vec<Spanned<Statement<'code>>>,
    },
    Arrow {
        parameters: Vec<Parameter<'code>>,
        body: ArrowBody<'code>,
    },
    Member {
        object: Box<Spanned<Self>>,
        property: &'code str,
    },
    Index {
        object: Box<Spanned<Self>>,
        index: Box<Spanned<Self>>,
    },
    Call {
        callee: Box<Spanned<Self>>,
        arguments: Vec<Spanned<Self>>,
    },
    New {
        constructor: &'code str,
        arguments: Vec<Spanned<Self>>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Spanned<Self>>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Spanned<Self>>,
        right: Box<Spanned<Self>>,
    },
    Logical {
        operator: LogicalOperator,
        left: Box<Spanned<Self>>,
        right: Box<Spanned<Self>>,
    },
    Conditional {
        condition: Box<Spanned<Self>>,
        consequent: Box<Spanned<Self>>,
        alternate: Box<Spanned<Self>>,
    },
    Assignment {
        operator: AssignmentOperator,
        target: Box<Spanned<Self>>,
        value: Box<Spanned<Self>>,
    },
}

#[derive(Debug, Clone)]
pub enum ArrowBody<'code> {
    Expression(Box<Spanned<Expression<'code>>>),
    Block(Vec<Spanned<Statement<'code>>>),
}

#[derive(Debug, Clone)]
pub struct ObjectProperty<'code> {
    pub key: PropertyKey<'code>,
    pub value: Spanned<Expression<'code>>,
}

#[derive(Debug, Clone)]
pub enum PropertyKey<'code> {
    Identifier(&'code str),
    Text(Cow<'code, str>),
}

impl PropertyKey<'_> {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Identifier(name) => name,
            Self::Text(text) => text,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Literal<'code> {
    Number(f64),
    Text(Cow<'code, str>),
    Bool(bool),
    Null,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Negate,
    Typeof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOperator {
    Assign,
    AddAssign,
    SubtractAssign,
}

/// Resolves escape sequences in a raw string-literal slice. Borrows when the
/// literal has no escapes at all.
pub fn unescape(raw: &str) -> Cow<'_, str> {
    if !raw.contains('\\') {
        return Cow::Borrowed(raw);
    }
    let mut unescaped = String::with_capacity(raw.len());
    let mut characters = raw.chars();
    while let Some(character) = characters.next() {
        if character != '\\' {
            unescaped.push(character);
            continue;
        }
        match characters.next() {
            Some('n') => unescaped.push('\n'),
            Some('t') => unescaped.push('\t'),
            Some('r') => unescaped.push('\r'),
            Some('0') => unescaped.push('\0'),
            // `\\`, `\'`, `\"` and any unrecognized escape keep the character.
            Some(other) => unescaped.push(other),
            None => unescaped.push('\\'),
        }
    }
    Cow::Owned(unescaped)
}

/// A parse failure rendered for the output panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub message: String,
}

/// Lexes and parses one snippet. Comments are dropped between the stages.
pub fn parse<'code>(
    filename: &str,
    source_code: &'code str,
) -> Result<Vec<Spanned<Statement<'code>>>, ParseFailure> {
    let (tokens, errors) = lexer().parse(source_code).into_output_errors();
    if !errors.is_empty() {
        return Err(ParseFailure {
            message: render(errors, filename, source_code),
        });
    }
    let Some(mut tokens) = tokens else {
        return Err(ParseFailure {
            message: format!("{filename}: source produced no tokens"),
        });
    };

    tokens.retain(|spanned_token| !matches!(spanned_token.node, Token::Comment(_)));

    let (ast, errors) = parser()
        .parse(chumsky::input::Stream::from_iter(tokens).map(
            (source_code.len()..source_code.len()).into(),
            |Spanned { node, span }| (node, span),
        ))
        .into_output_errors();
    if !errors.is_empty() {
        return Err(ParseFailure {
            message: render(errors, filename, source_code),
        });
    }
    ast.ok_or_else(|| ParseFailure {
        message: format!("{filename}: parsing produced no syntax tree"),
    })
}

pub fn parser<'code, I>()
-> impl Parser<'code, I, Vec<Spanned<Statement<'code>>>, extra::Err<ParseError<'code, Token<'code>>>>
where
    I: ValueInput<'code, Token = Token<'code>, Span = Span>,
{
    let newlines = just(Token::Newline).repeated();
    let ident = select! { Token::Identifier(name) => name };

    // Typed-dialect annotations: `Name`, `Name<T, U>`, `Name[]`, unions with
    // `|`. Parsed for acceptance only; the output is discarded.
    let type_reference = recursive(|type_reference| {
        ident
            .then(
                type_reference
                    .separated_by(just(Token::Comma).padded_by(newlines.clone()))
                    .at_least(1)
                    .collect::<Vec<_>>()
                    .delimited_by(just(Token::Less), just(Token::Greater))
                    .or_not(),
            )
            .then(just(Token::BracketOpen).then(just(Token::BracketClose)).repeated())
            .ignored()
    });

    let type_expression = type_reference
        .separated_by(just(Token::VerticalBar).padded_by(newlines.clone()))
        .at_least(1)
        .collect::<Vec<_>>()
        .ignored();

    let annotation = just(Token::Colon).ignore_then(type_expression);

    let parameter = ident
        .then_ignore(annotation.clone().or_not())
        .map(|name| Parameter { name });

    let parameter_list = parameter
        .separated_by(just(Token::Comma).padded_by(newlines.clone()))
        .collect::<Vec<_>>()
        .delimited_by(
            just(Token::ParenOpen).then(newlines.clone()),
            newlines.clone().then(just(Token::ParenClose)),
        );

    let mut statement = Recursive::declare();
    let mut expression = Recursive::declare();

    let terminator = choice((
        just(Token::Semicolon).ignored(),
        just(Token::Newline).ignored(),
    ))
    .repeated()
    .at_least(1);

    let statements = statement
        .clone()
        .separated_by(terminator)
        .allow_leading()
        .allow_trailing()
        .collect::<Vec<_>>()
        .padded_by(newlines.clone());

    let block = statements
        .clone()
        .delimited_by(just(Token::BraceOpen), just(Token::BraceClose));

    // --- expressions ---

    let literal = choice((
        select! { Token::Number(number) => Literal::Number(number) },
        select! { Token::Str(raw) => Literal::Text(unescape(raw)) },
        just(Token::True).to(Literal::Bool(true)),
        just(Token::False).to(Literal::Bool(false)),
        just(Token::Null).to(Literal::Null),
        just(Token::Undefined).to(Literal::Undefined),
    ));

    let call_arguments = expression
        .clone()
        .separated_by(just(Token::Comma).padded_by(newlines.clone()))
        .collect::<Vec<_>>()
        .delimited_by(
            just(Token::ParenOpen).then(newlines.clone()),
            newlines.clone().then(just(Token::ParenClose)),
        );

    let array = expression
        .clone()
        .separated_by(just(Token::Comma).padded_by(newlines.clone()))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(
            just(Token::BracketOpen).then(newlines.clone()),
            newlines.clone().then(just(Token::BracketClose)),
        )
        .map(Expression::Array);

    let property_key = choice((
        ident.map(PropertyKey::Identifier),
        select! { Token::Str(raw) => PropertyKey::Text(unescape(raw)) },
    ));

    let object = property_key
        .then_ignore(just(Token::Colon).then(newlines.clone()))
        .then(expression.clone())
        .map(|(key, value)| ObjectProperty { key, value })
        .separated_by(just(Token::Comma).padded_by(newlines.clone()))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(
            just(Token::BraceOpen).then(newlines.clone()),
            newlines.clone().then(just(Token::BraceClose)),
        )
        .map(Expression::Object);

    let function_expression = just(Token::Function)
        .ignore_then(ident.or_not())
        .then(parameter_list.clone())
        .then_ignore(annotation.clone().or_not())
        .then(block.clone())
        .map(|((name, parameters), body)| Expression::Function {
            name,
            parameters,
            body,
        });

    let arrow_parameters = choice((
        ident.map(|name| vec![Parameter { name }]),
        parameter_list.clone(),
    ));

    let arrow_body = choice((
        block.clone().map(ArrowBody::Block),
        expression
            .clone()
            .map(|body| ArrowBody::Expression(Box::new(body))),
    ));

    let arrow = arrow_parameters
        .then_ignore(annotation.clone().or_not())
        .then_ignore(just(Token::Arrow).then(newlines.clone()))
        .then(arrow_body)
        .map(|(parameters, body)| Expression::Arrow { parameters, body });

    let new_expression = just(Token::New)
        .ignore_then(ident)
        .then(call_arguments.clone())
        .map(|(constructor, arguments)| Expression::New {
            constructor,
            arguments,
        });

    let nested = expression.clone().delimited_by(
        just(Token::ParenOpen).then(newlines.clone()),
        newlines.clone().then(just(Token::ParenClose)),
    );

    let primary = choice((
        arrow,
        function_expression,
        new_expression,
        literal.map(Expression::Literal),
        array,
        object,
        ident.map(Expression::Identifier),
    ))
    .map_with(|node, extra| Spanned {
        span: extra.span(),
        node,
    })
    .or(nested)
    .boxed();

    enum Postfix<'code> {
        Member(&'code str),
        Index(Spanned<Expression<'code>>),
        Call(Vec<Spanned<Expression<'code>>>),
    }

    let postfix_operator = choice((
        just(Token::Dot).ignore_then(ident).map(Postfix::Member),
        expression
            .clone()
            .delimited_by(
                just(Token::BracketOpen).then(newlines.clone()),
                newlines.clone().then(just(Token::BracketClose)),
            )
            .map(Postfix::Index),
        call_arguments.clone().map(Postfix::Call),
    ));

    let postfix = primary.foldl_with(postfix_operator.repeated(), |object, operator, extra| {
        let node = match operator {
            Postfix::Member(property) => Expression::Member {
                object: Box::new(object),
                property,
            },
            Postfix::Index(index) => Expression::Index {
                object: Box::new(object),
                index: Box::new(index),
            },
            Postfix::Call(arguments) => Expression::Call {
                callee: Box::new(object),
                arguments,
            },
        };
        Spanned {
            span: extra.span(),
            node,
        }
    });

    let binary = postfix.pratt((
        prefix(9, just(Token::Bang), |_, operand, extra| Spanned {
            span: extra.span(),
            node: Expression::Unary {
                operator: UnaryOperator::Not,
                operand: Box::new(operand),
            },
        }),
        prefix(9, just(Token::Minus), |_, operand, extra| Spanned {
            span: extra.span(),
            node: Expression::Unary {
                operator: UnaryOperator::Negate,
                operand: Box::new(operand),
            },
        }),
        prefix(9, just(Token::Typeof), |_, operand, extra| Spanned {
            span: extra.span(),
            node: Expression::Unary {
                operator: UnaryOperator::Typeof,
                operand: Box::new(operand),
            },
        }),
        infix(left(7), just(Token::Star), |left, _, right, extra| Spanned {
            span: extra.span(),
            node: Expression::Binary {
                operator: BinaryOperator::Multiply,
                left: Box::new(left),
                right: Box::new(right),
            },
        }),
        infix(left(7), just(Token::Slash), |left, _, right, extra| Spanned {
            span: extra.span(),
            node: Expression::Binary {
                operator: BinaryOperator::Divide,
                left: Box::new(left),
                right: Box::new(right),
            },
        }),
        infix(left(7), just(Token::Percent), |left, _, right, extra| Spanned {
            span: extra.span(),
            node: Expression::Binary {
                operator: BinaryOperator::Remainder,
                left: Box::new(left),
                right: Box::new(right),
            },
        }),
        infix(left(6), just(Token::Plus), |left, _, right, extra| Spanned {
            span: extra.span(),
            node: Expression::Binary {
                operator: BinaryOperator::Add,
                left: Box::new(left),
                right: Box::new(right),
            },
        }),
        infix(left(6), just(Token::Minus), |left, _, right, extra| Spanned {
            span: extra.span(),
            node: Expression::Binary {
                operator: BinaryOperator::Subtract,
                left: Box::new(left),
                right: Box::new(right),
            },
        }),
        infix(left(5), just(Token::Less), |left, _, right, extra| Spanned {
            span: extra.span(),
            node: Expression::Binary {
                operator: BinaryOperator::Less,
                left: Box::new(left),
                right: Box::new(right),
            },
        }),
        infix(left(5), just(Token::LessOrEqual), |left, _, right, extra| Spanned {
            span: extra.span(),
            node: Expression::Binary {
                operator: BinaryOperator::LessOrEqual,
                left: Box::new(left),
                right: Box::new(right),
            },
        }),
        infix(left(5), just(Token::Greater), |left, _, right, extra| Spanned {
            span: extra.span(),
            node: Expression::Binary {
                operator: BinaryOperator::Greater,
                left: Box::new(left),
                right: Box::new(right),
            },
        }),
        infix(left(5), just(Token::GreaterOrEqual), |left, _, right, extra| {
            Spanned {
                span: extra.span(),
                node: Expression::Binary {
                    operator: BinaryOperator::GreaterOrEqual,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            }
        }),
        infix(left(4), just(Token::EqEq), |left, _, right, extra| Spanned {
            span: extra.span(),
            node: Expression::Binary {
                operator: BinaryOperator::Equal,
                left: Box::new(left),
                right: Box::new(right),
            },
        }),
        infix(left(4), just(Token::NotEq), |left, _, right, extra| Spanned {
            span: extra.span(),
            node: Expression::Binary {
                operator: BinaryOperator::NotEqual,
                left: Box::new(left),
                right: Box::new(right),
            },
        }),
        infix(left(4), just(Token::EqEqEq), |left, _, right, extra| Spanned {
            span: extra.span(),
            node: Expression::Binary {
                operator: BinaryOperator::StrictEqual,
                left: Box::new(left),
                right: Box::new(right),
            },
        }),
        infix(left(4), just(Token::NotEqEq), |left, _, right, extra| Spanned {
            span: extra.span(),
            node: Expression::Binary {
                operator: BinaryOperator::StrictNotEqual,
                left: Box::new(left),
                right: Box::new(right),
            },
        }),
        infix(left(3), just(Token::AndAnd), |left, _, right, extra| Spanned {
            span: extra.span(),
            node: Expression::Logical {
                operator: LogicalOperator::And,
                left: Box::new(left),
                right: Box::new(right),
            },
        }),
        infix(left(2), just(Token::OrOr), |left, _, right, extra| Spanned {
            span: extra.span(),
            node: Expression::Logical {
                operator: LogicalOperator::Or,
                left: Box::new(left),
                right: Box::new(right),
            },
        }),
    ));

    let conditional = binary
        .then(
            just(Token::Question)
                .padded_by(newlines.clone())
                .ignore_then(expression.clone())
                .then_ignore(just(Token::Colon).padded_by(newlines.clone()))
                .then(expression.clone())
                .or_not(),
        )
        .map_with(|(condition, branches), extra| match branches {
            None => condition,
            Some((consequent, alternate)) => Spanned {
                span: extra.span(),
                node: Expression::Conditional {
                    condition: Box::new(condition),
                    consequent: Box::new(consequent),
                    alternate: Box::new(alternate),
                },
            },
        });

    let assignment_operator = choice((
        just(Token::Assign).to(AssignmentOperator::Assign),
        just(Token::PlusAssign).to(AssignmentOperator::AddAssign),
        just(Token::MinusAssign).to(AssignmentOperator::SubtractAssign),
    ));

    expression.define(
        conditional
            .then(
                assignment_operator
                    .then_ignore(newlines.clone())
                    .then(expression.clone())
                    .or_not(),
            )
            .map_with(|(target, assignment), extra| match assignment {
                None => target,
                Some((operator, value)) => Spanned {
                    span: extra.span(),
                    node: Expression::Assignment {
                        operator,
                        target: Box::new(target),
                        value: Box::new(value),
                    },
                },
            })
            .boxed(),
    );

    // --- statements ---

    let declaration = choice((
        just(Token::Let).to(DeclarationKind::Let),
        just(Token::Const).to(DeclarationKind::Const),
        just(Token::Var).to(DeclarationKind::Var),
    ))
    .then(ident)
    .then_ignore(annotation.clone().or_not())
    .then(
        just(Token::Assign)
            .then(newlines.clone())
            .ignore_then(expression.clone())
            .or_not(),
    )
    .map(|((kind, name), initializer)| Statement::Declaration {
        kind,
        name,
        initializer,
    });

    let function_declaration = just(Token::Function)
        .ignore_then(ident)
        .then(parameter_list.clone())
        .then_ignore(annotation.clone().or_not())
        .then(block.clone())
        .map(|((name, parameters), body)| Statement::Function {
            name,
            parameters,
            body,
        });

    let return_statement = just(Token::Return)
        .ignore_then(expression.clone().or_not())
        .map(Statement::Return);

    let throw_statement = just(Token::Throw)
        .ignore_then(expression.clone())
        .map(Statement::Throw);

    let condition = expression.clone().delimited_by(
        just(Token::ParenOpen).then(newlines.clone()),
        newlines.clone().then(just(Token::ParenClose)),
    );

    let if_statement = just(Token::If)
        .ignore_then(condition.clone())
        .then(block.clone())
        .then(
            just(Token::Else)
                .padded_by(newlines.clone())
                .ignore_then(statement.clone())
                .or_not(),
        )
        .map(|((condition, then_branch), else_branch)| Statement::If {
            condition,
            then_branch,
            else_branch: else_branch.map(Box::new),
        });

    let while_statement = just(Token::While)
        .ignore_then(condition)
        .then(block.clone())
        .map(|(condition, body)| Statement::While { condition, body });

    let try_statement = just(Token::Try)
        .ignore_then(block.clone())
        .then(
            just(Token::Catch)
                .padded_by(newlines.clone())
                .ignore_then(
                    ident
                        .delimited_by(just(Token::ParenOpen), just(Token::ParenClose))
                        .or_not(),
                )
                .then(block.clone()),
        )
        .map(|(body, (catch_binding, catch_body))| Statement::Try {
            body,
            catch_binding,
            catch_body,
        });

    statement.define(
        choice((
            function_declaration,
            declaration,
            return_statement,
            throw_statement,
            if_statement,
            while_statement,
            try_statement,
            block.map(Statement::Block),
            expression.map(Statement::Expression),
        ))
        .map_with(|node, extra| Spanned {
            span: extra.span(),
            node,
        })
        .boxed(),
    );

    statements
}
