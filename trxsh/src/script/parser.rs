//! Parser for executable bodies
//!
//! Parses the token stream from [`lexer`] into a [`Program`]. Expression
//! precedence, loosest first: arrow/assignment, conditional, `??`, `||`, `&&`,
//! equality, relational, additive, multiplicative, `**`, unary, postfix,
//! call/member, primary.

use super::ast::*;
use super::lexer::{lexer, TemplatePart, Token};
use super::{ScriptError, ScriptResult};
use chumsky::prelude::*;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

type P<T> = BoxedParser<'static, Token, T, Simple<Token>>;

/// Parse a whole executable body.
pub fn parse_program(code: &str) -> ScriptResult<Program> {
    let tokens = lexer().parse(code).map_err(syntax_error)?;
    statement()
        .repeated()
        .then_ignore(end())
        .parse(tokens)
        .map_err(syntax_error)
}

/// Parse a single expression, as found inside a template substitution.
pub fn parse_expression(code: &str) -> ScriptResult<Expr> {
    let tokens = lexer().parse(code).map_err(syntax_error)?;
    expression(block(statement()))
        .then_ignore(end())
        .parse(tokens)
        .map_err(syntax_error)
}

fn syntax_error<T: fmt::Display + Hash + Eq>(errors: Vec<Simple<T>>) -> ScriptError {
    let message = errors
        .first()
        .map_or_else(|| "invalid syntax".to_string(), ToString::to_string);
    ScriptError::Syntax(message)
}

fn punct(p: &'static str) -> impl Parser<Token, Token, Error = Simple<Token>> + Clone {
    just(Token::Punct(p))
}

fn ident() -> impl Parser<Token, String, Error = Simple<Token>> + Clone {
    filter_map(|span, tok| match tok {
        Token::Ident(name) => Ok(name),
        _ => Err(Simple::expected_input_found(span, None, Some(tok))),
    })
}

/// Property names also accept keywords and literal keys: `{ default: 1, "a-b": 2 }`.
fn property_name() -> impl Parser<Token, String, Error = Simple<Token>> + Clone {
    filter_map(|span, tok: Token| match tok {
        Token::Ident(name) | Token::Str(name) | Token::Number(name) => Ok(name),
        other => other
            .keyword_text()
            .map(str::to_string)
            .ok_or_else(|| Simple::expected_input_found(span, None, Some(other))),
    })
}

fn of_keyword() -> impl Parser<Token, (), Error = Simple<Token>> + Clone {
    filter_map(|span, tok| match tok {
        Token::Ident(ref word) if word == "of" => Ok(()),
        _ => Err(Simple::expected_input_found(span, None, Some(tok))),
    })
}

fn params() -> impl Parser<Token, Vec<String>, Error = Simple<Token>> + Clone {
    ident()
        .separated_by(punct(","))
        .allow_trailing()
        .delimited_by(punct("("), punct(")"))
}

fn block(stmt: impl Parser<Token, Stmt, Error = Simple<Token>> + Clone + 'static) -> P<Vec<Stmt>> {
    stmt.repeated()
        .delimited_by(punct("{"), punct("}"))
        .boxed()
}

fn template(parts: Vec<TemplatePart>) -> ScriptResult<Expr> {
    parts
        .into_iter()
        .map(|part| match part {
            TemplatePart::Str(s) => Ok(TemplateSegment::Str(s)),
            TemplatePart::Code(code) => parse_expression(&code).map(TemplateSegment::Expr),
        })
        .collect::<ScriptResult<Vec<_>>>()
        .map(Expr::Template)
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn binary_level(
    operand: P<Expr>,
    op: impl Parser<Token, BinaryOp, Error = Simple<Token>> + 'static,
) -> P<Expr> {
    operand
        .clone()
        .then(op.then(operand).repeated())
        .foldl(|left, (op, right)| binary(op, left, right))
        .boxed()
}

fn logical_level(operand: P<Expr>, token: &'static str, op: LogicalOp) -> P<Expr> {
    operand
        .clone()
        .then(punct(token).ignore_then(operand).repeated())
        .foldl(move |left, right| Expr::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
        .boxed()
}

#[derive(Clone)]
enum Prefix {
    Unary(UnaryOp),
    Await,
    Update(bool),
}

enum Suffix {
    Member(String, bool),
    Index(Expr),
    Call(Vec<Expr>),
}

fn expression(block: P<Vec<Stmt>>) -> P<Expr> {
    recursive(move |expr| {
        let function_def = |name: Option<String>, params: Vec<String>, body: Vec<Stmt>| {
            Arc::new(FunctionDef { name, params, body })
        };

        let item = punct("...")
            .ignore_then(expr.clone())
            .map(|e| Expr::Spread(Box::new(e)))
            .or(expr.clone())
            .boxed();
        let args = item
            .clone()
            .separated_by(punct(","))
            .allow_trailing()
            .delimited_by(punct("("), punct(")"))
            .boxed();

        let arrow = just(Token::Async)
            .or_not()
            .ignore_then(ident().map(|p| vec![p]).or(params()))
            .then_ignore(punct("=>"))
            .then(
                block
                    .clone()
                    .or(expr.clone().map(|e| vec![Stmt::Return(Some(e))])),
            )
            .map(move |(params, body)| Expr::Function(function_def(None, params, body)))
            .boxed();

        let function = just(Token::Async)
            .or_not()
            .ignore_then(just(Token::Function))
            .ignore_then(ident().or_not())
            .then(params())
            .then(block.clone())
            .map(move |((name, params), body)| Expr::Function(function_def(name, params, body)));

        let literal = filter_map(|span, tok| match tok {
            Token::Number(n) => n
                .parse::<f64>()
                .map(Expr::Number)
                .map_err(|e| Simple::custom(span, e.to_string())),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Template(parts) => {
                template(parts).map_err(|e| Simple::custom(span, e.message()))
            }
            Token::True => Ok(Expr::Bool(true)),
            Token::False => Ok(Expr::Bool(false)),
            Token::Null => Ok(Expr::Null),
            Token::Undefined => Ok(Expr::Undefined),
            Token::Ident(name) => Ok(Expr::Ident(name)),
            _ => Err(Simple::expected_input_found(span, None, Some(tok))),
        });

        let array = item
            .clone()
            .separated_by(punct(","))
            .allow_trailing()
            .delimited_by(punct("["), punct("]"))
            .map(Expr::Array);

        let property = choice((
            punct("...").ignore_then(expr.clone()).map(Property::Spread),
            property_name()
                .then_ignore(punct(":"))
                .then(expr.clone())
                .map(|(key, value)| Property::KeyValue(key, value)),
            just(Token::Async)
                .or_not()
                .ignore_then(property_name())
                .then(params())
                .then(block.clone())
                .map(move |((key, params), body)| {
                    let method = function_def(Some(key.clone()), params, body);
                    Property::KeyValue(key, Expr::Function(method))
                }),
            ident().map(|key| Property::KeyValue(key.clone(), Expr::Ident(key))),
        ));
        let object = property
            .separated_by(punct(","))
            .allow_trailing()
            .delimited_by(punct("{"), punct("}"))
            .map(Expr::Object);

        // `new X(args)` has no construction semantics; it is a plain call.
        let new_call = just(Token::New)
            .ignore_then(ident())
            .then(args.clone().or_not())
            .map(|(name, args)| Expr::Call {
                callee: Box::new(Expr::Ident(name)),
                args: args.unwrap_or_default(),
            });

        let paren = expr.clone().delimited_by(punct("("), punct(")"));

        let primary = choice((function, new_call, literal, array, object, paren));

        let suffix = choice((
            punct(".")
                .ignore_then(property_name())
                .map(|name| Suffix::Member(name, false)),
            punct("?.")
                .ignore_then(property_name())
                .map(|name| Suffix::Member(name, true)),
            punct("?.")
                .or_not()
                .ignore_then(expr.clone().delimited_by(punct("["), punct("]")))
                .map(Suffix::Index),
            punct("?.").or_not().ignore_then(args).map(Suffix::Call),
        ));
        let call = primary
            .then(suffix.repeated())
            .foldl(|object, suffix| match suffix {
                Suffix::Member(property, optional) => Expr::Member {
                    object: Box::new(object),
                    property,
                    optional,
                },
                Suffix::Index(index) => Expr::Index {
                    object: Box::new(object),
                    index: Box::new(index),
                },
                Suffix::Call(args) => Expr::Call {
                    callee: Box::new(object),
                    args,
                },
            });

        let postfix = call
            .then(choice((punct("++").to(true), punct("--").to(false))).or_not())
            .try_map(|(target, update), span| match update {
                None => Ok(target),
                Some(increment) if target.is_place() => Ok(Expr::Update {
                    target: Box::new(target),
                    increment,
                    prefix: false,
                }),
                Some(_) => Err(Simple::custom(
                    span,
                    "Invalid left-hand side expression in postfix operation",
                )),
            });

        let prefix = choice((
            punct("!").to(Prefix::Unary(UnaryOp::Not)),
            punct("-").to(Prefix::Unary(UnaryOp::Neg)),
            punct("+").to(Prefix::Unary(UnaryOp::Plus)),
            just(Token::Typeof).to(Prefix::Unary(UnaryOp::Typeof)),
            just(Token::Await).to(Prefix::Await),
            punct("++").to(Prefix::Update(true)),
            punct("--").to(Prefix::Update(false)),
        ));
        let unary = prefix
            .repeated()
            .then(postfix)
            .foldr(|prefix, expr| match prefix {
                Prefix::Unary(op) => Expr::Unary {
                    op,
                    expr: Box::new(expr),
                },
                Prefix::Await => Expr::Await(Box::new(expr)),
                Prefix::Update(increment) => Expr::Update {
                    target: Box::new(expr),
                    increment,
                    prefix: true,
                },
            })
            .boxed();

        // `**` is right-associative.
        let power = unary
            .separated_by(punct("**"))
            .at_least(1)
            .map(|operands| {
                operands
                    .into_iter()
                    .rev()
                    .reduce(|right, left| binary(BinaryOp::Pow, left, right))
                    .unwrap_or(Expr::Undefined)
            })
            .boxed();

        let multiplicative = binary_level(
            power,
            choice((
                punct("*").to(BinaryOp::Mul),
                punct("/").to(BinaryOp::Div),
                punct("%").to(BinaryOp::Rem),
            )),
        );
        let additive = binary_level(
            multiplicative,
            punct("+").to(BinaryOp::Add).or(punct("-").to(BinaryOp::Sub)),
        );
        let relational = binary_level(
            additive,
            choice((
                punct("<=").to(BinaryOp::LtEq),
                punct(">=").to(BinaryOp::GtEq),
                punct("<").to(BinaryOp::Lt),
                punct(">").to(BinaryOp::Gt),
                just(Token::In).to(BinaryOp::In),
            )),
        );
        let equality = binary_level(
            relational,
            choice((
                punct("===").to(BinaryOp::StrictEq),
                punct("!==").to(BinaryOp::StrictNotEq),
                punct("==").to(BinaryOp::Eq),
                punct("!=").to(BinaryOp::NotEq),
            )),
        );
        let and = logical_level(equality, "&&", LogicalOp::And);
        let or = logical_level(and, "||", LogicalOp::Or);
        let nullish = logical_level(or, "??", LogicalOp::Nullish);

        let conditional = nullish
            .then(
                punct("?")
                    .ignore_then(expr.clone())
                    .then_ignore(punct(":"))
                    .then(expr.clone())
                    .or_not(),
            )
            .map(|(test, branches)| match branches {
                None => test,
                Some((consequent, alternate)) => Expr::Conditional {
                    test: Box::new(test),
                    consequent: Box::new(consequent),
                    alternate: Box::new(alternate),
                },
            });

        let assign_op = choice((
            punct("=").to(None),
            punct("+=").to(Some(BinaryOp::Add)),
            punct("-=").to(Some(BinaryOp::Sub)),
            punct("*=").to(Some(BinaryOp::Mul)),
            punct("/=").to(Some(BinaryOp::Div)),
            punct("%=").to(Some(BinaryOp::Rem)),
        ));
        let assignment = conditional
            .then(assign_op.then(expr).or_not())
            .try_map(|(target, assign), span| match assign {
                None => Ok(target),
                Some((op, value)) if target.is_place() => Ok(Expr::Assign {
                    op,
                    target: Box::new(target),
                    value: Box::new(value),
                }),
                Some(_) => Err(Simple::custom(span, "Invalid left-hand side in assignment")),
            });

        arrow.or(assignment)
    })
    .boxed()
}

fn pattern() -> impl Parser<Token, Pattern, Error = Simple<Token>> + Clone {
    let object = property_name()
        .then(punct(":").ignore_then(ident()).or_not())
        .map(|(key, local)| {
            let local = local.unwrap_or_else(|| key.clone());
            (key, local)
        })
        .separated_by(punct(","))
        .allow_trailing()
        .delimited_by(punct("{"), punct("}"))
        .map(Pattern::Object);
    let array = ident()
        .or_not()
        .separated_by(punct(","))
        .delimited_by(punct("["), punct("]"))
        .map(Pattern::Array);

    choice((ident().map(Pattern::Ident), object, array))
}

fn statement() -> P<Stmt> {
    recursive(|stmt| {
        let block = block(stmt.clone());
        let expr = expression(block.clone());
        let semi = punct(";").or_not();

        let declarator = pattern()
            .then(punct("=").ignore_then(expr.clone()).or_not())
            .map(|(pattern, init)| Declarator { pattern, init });
        let kind = choice((
            just(Token::Let).to(false),
            just(Token::Var).to(false),
            just(Token::Const).to(true),
        ));
        let declaration = kind
            .clone()
            .then(declarator.separated_by(punct(",")).at_least(1))
            .map(|(constant, declarators)| Stmt::Declare {
                constant,
                declarators,
            })
            .boxed();

        let function = just(Token::Async)
            .or_not()
            .ignore_then(just(Token::Function))
            .ignore_then(ident())
            .then(params())
            .then(block.clone())
            .map(|((name, params), body)| {
                Stmt::Function(Arc::new(FunctionDef {
                    name: Some(name),
                    params,
                    body,
                }))
            });

        let condition = expr.clone().delimited_by(punct("("), punct(")"));

        let if_stmt = just(Token::If)
            .ignore_then(condition.clone())
            .then(stmt.clone())
            .then(just(Token::Else).ignore_then(stmt.clone()).or_not())
            .map(|((test, consequent), alternate)| Stmt::If {
                test,
                consequent: Box::new(consequent),
                alternate: alternate.map(Box::new),
            });

        let while_stmt = just(Token::While)
            .ignore_then(condition.clone())
            .then(stmt.clone())
            .map(|(test, body)| Stmt::While {
                test,
                body: Box::new(body),
            });

        let do_while = just(Token::Do)
            .ignore_then(stmt.clone())
            .then_ignore(just(Token::While))
            .then(condition)
            .then_ignore(semi.clone())
            .map(|(body, test)| Stmt::DoWhile {
                body: Box::new(body),
                test,
            });

        let for_each = just(Token::For)
            .ignore_then(punct("("))
            .ignore_then(kind.or_not())
            .ignore_then(pattern())
            .then(of_keyword().to(false).or(just(Token::In).to(true)))
            .then(expr.clone())
            .then_ignore(punct(")"))
            .then(stmt.clone())
            .map(|(((pattern, keys), iterable), body)| Stmt::ForEach {
                pattern,
                keys,
                iterable,
                body: Box::new(body),
            });

        let for_init = declaration.clone().or(expr.clone().map(Stmt::Expr));
        let for_loop = just(Token::For)
            .ignore_then(punct("("))
            .ignore_then(for_init.or_not())
            .then_ignore(punct(";"))
            .then(expr.clone().or_not())
            .then_ignore(punct(";"))
            .then(expr.clone().or_not())
            .then_ignore(punct(")"))
            .then(stmt.clone())
            .map(|(((init, test), update), body)| Stmt::For {
                init: init.map(Box::new),
                test,
                update,
                body: Box::new(body),
            });

        let return_stmt = just(Token::Return)
            .ignore_then(expr.clone().or_not())
            .then_ignore(semi.clone())
            .map(Stmt::Return);
        let break_stmt = just(Token::Break).then_ignore(semi.clone()).to(Stmt::Break);
        let continue_stmt = just(Token::Continue)
            .then_ignore(semi.clone())
            .to(Stmt::Continue);
        let throw_stmt = just(Token::Throw)
            .ignore_then(expr.clone())
            .then_ignore(semi.clone())
            .map(Stmt::Throw);

        let catch = just(Token::Catch)
            .ignore_then(ident().delimited_by(punct("("), punct(")")).or_not())
            .then(block.clone());
        let try_stmt = just(Token::Try)
            .ignore_then(block.clone())
            .then(catch.or_not())
            .then(just(Token::Finally).ignore_then(block.clone()).or_not())
            .try_map(|((block, catch), finalizer), span| {
                if catch.is_none() && finalizer.is_none() {
                    return Err(Simple::custom(span, "Missing catch or finally after try"));
                }
                let (param, handler) = match catch {
                    Some((param, handler)) => (param, Some(handler)),
                    None => (None, None),
                };
                Ok(Stmt::Try {
                    block,
                    param,
                    handler,
                    finalizer,
                })
            });

        choice((
            punct(";").to(Stmt::Empty),
            block.map(Stmt::Block),
            declaration.then_ignore(semi.clone()),
            function,
            if_stmt,
            while_stmt,
            do_while,
            for_each,
            for_loop,
            return_stmt,
            break_stmt,
            continue_stmt,
            throw_stmt,
            try_stmt,
            expr.then_ignore(semi).map(Stmt::Expr),
        ))
    })
    .boxed()
}
