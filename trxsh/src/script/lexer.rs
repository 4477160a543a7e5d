//! Lexer for executable bodies

use chumsky::prelude::*;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TemplatePart {
    Str(String),
    /// Source text of a `${...}` substitution
    Code(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Token {
    Ident(String),
    Number(String),
    Str(String),
    Template(Vec<TemplatePart>),
    Punct(&'static str),

    // Keywords
    Let,
    Const,
    Var,
    If,
    Else,
    While,
    Do,
    For,
    In,
    Break,
    Continue,
    Return,
    Function,
    Async,
    Await,
    True,
    False,
    Null,
    Undefined,
    Typeof,
    Try,
    Catch,
    Finally,
    Throw,
    New,
}

impl Token {
    fn keyword(word: &str) -> Option<Self> {
        Some(match word {
            "let" => Self::Let,
            "const" => Self::Const,
            "var" => Self::Var,
            "if" => Self::If,
            "else" => Self::Else,
            "while" => Self::While,
            "do" => Self::Do,
            "for" => Self::For,
            "in" => Self::In,
            "break" => Self::Break,
            "continue" => Self::Continue,
            "return" => Self::Return,
            "function" => Self::Function,
            "async" => Self::Async,
            "await" => Self::Await,
            "true" => Self::True,
            "false" => Self::False,
            "null" => Self::Null,
            "undefined" => Self::Undefined,
            "typeof" => Self::Typeof,
            "try" => Self::Try,
            "catch" => Self::Catch,
            "finally" => Self::Finally,
            "throw" => Self::Throw,
            "new" => Self::New,
            _ => return None,
        })
    }

    /// Source spelling of keyword tokens, so they can be used as property names.
    pub fn keyword_text(&self) -> Option<&'static str> {
        Some(match self {
            Self::Let => "let",
            Self::Const => "const",
            Self::Var => "var",
            Self::If => "if",
            Self::Else => "else",
            Self::While => "while",
            Self::Do => "do",
            Self::For => "for",
            Self::In => "in",
            Self::Break => "break",
            Self::Continue => "continue",
            Self::Return => "return",
            Self::Function => "function",
            Self::Async => "async",
            Self::Await => "await",
            Self::True => "true",
            Self::False => "false",
            Self::Null => "null",
            Self::Undefined => "undefined",
            Self::Typeof => "typeof",
            Self::Try => "try",
            Self::Catch => "catch",
            Self::Finally => "finally",
            Self::Throw => "throw",
            Self::New => "new",
            Self::Ident(_)
            | Self::Number(_)
            | Self::Str(_)
            | Self::Template(_)
            | Self::Punct(_) => return None,
        })
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(s) | Self::Number(s) => write!(f, "{s}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Template(_) => write!(f, "template string"),
            Self::Punct(p) => write!(f, "{p}"),
            other => write!(f, "{}", other.keyword_text().unwrap_or("?")),
        }
    }
}

/// Longest spellings first so `===` wins over `==` and `=`.
const PUNCTUATION: &[&str] = &[
    "===", "!==", "...", "**", "=>", "==", "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--",
    "+=", "-=", "*=", "/=", "%=", "+", "-", "*", "/", "%", "<", ">", "=", "!", "?", ":", ".", ",",
    ";", "(", ")", "[", "]", "{", "}",
];

fn punctuation() -> BoxedParser<'static, char, Token, Simple<char>> {
    let mut parser = just(PUNCTUATION[0]).to(Token::Punct(PUNCTUATION[0])).boxed();
    for &p in &PUNCTUATION[1..] {
        parser = parser.or(just(p).to(Token::Punct(p))).boxed();
    }
    parser
}

fn escape() -> impl Parser<char, char, Error = Simple<char>> + Clone {
    let unicode = just('u').ignore_then(
        filter(char::is_ascii_hexdigit)
            .repeated()
            .exactly(4)
            .collect::<String>()
            .try_map(|hex, span| {
                u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| Simple::custom(span, "invalid unicode escape"))
            }),
    );

    just('\\').ignore_then(choice((
        just('n').to('\n'),
        just('t').to('\t'),
        just('r').to('\r'),
        just('0').to('\0'),
        just('b').to('\u{8}'),
        just('f').to('\u{c}'),
        just('v').to('\u{b}'),
        unicode,
        any(),
    )))
}

pub fn lexer() -> impl Parser<char, Vec<Token>, Error = Simple<char>> {
    let line_comment = just("//").then(none_of("\n").repeated()).ignored();
    let block_comment = just("/*").then(take_until(just("*/"))).ignored();
    let trivia = choice((
        filter(|c: &char| c.is_whitespace()).ignored(),
        line_comment,
        block_comment,
    ))
    .repeated();

    let string = |quote: char| {
        just(quote)
            .ignore_then(
                escape()
                    .or(filter(move |c: &char| *c != quote && *c != '\\' && *c != '\n'))
                    .repeated(),
            )
            .then_ignore(just(quote))
            .collect::<String>()
            .map(Token::Str)
    };

    // Template pieces are single chars or whole `${...}` substitutions; adjacent
    // chars are merged afterwards.
    let template = choice((
        just("${")
            .ignore_then(none_of("}").repeated().collect::<String>())
            .then_ignore(just('}'))
            .map(TemplatePart::Code),
        escape().map(|c| TemplatePart::Str(c.to_string())),
        none_of("`\\").map(|c: char| TemplatePart::Str(c.to_string())),
    ))
    .repeated()
    .delimited_by(just('`'), just('`'))
    .map(|pieces| {
        let mut parts: Vec<TemplatePart> = Vec::new();
        for piece in pieces {
            match (parts.last_mut(), piece) {
                (Some(TemplatePart::Str(acc)), TemplatePart::Str(s)) => acc.push_str(&s),
                (_, piece) => parts.push(piece),
            }
        }
        Token::Template(parts)
    });

    let digits = filter(char::is_ascii_digit).repeated().at_least(1).collect::<String>();
    let hex = just("0x")
        .or(just("0X"))
        .ignore_then(filter(char::is_ascii_hexdigit).repeated().at_least(1).collect::<String>())
        .try_map(|hex, span| {
            i64::from_str_radix(&hex, 16)
                .map(|v| Token::Number(v.to_string()))
                .map_err(|e| Simple::custom(span, e.to_string()))
        });
    let decimal = digits
        .clone()
        .then(just('.').ignore_then(digits.clone()).or_not())
        .then(
            one_of("eE")
                .ignore_then(one_of("+-").or_not())
                .then(digits)
                .or_not(),
        )
        .map(|((int, frac), exp)| {
            let mut number = int;
            if let Some(frac) = frac {
                number.push('.');
                number.push_str(&frac);
            }
            if let Some((sign, exp)) = exp {
                number.push('e');
                if let Some(sign) = sign {
                    number.push(sign);
                }
                number.push_str(&exp);
            }
            Token::Number(number)
        });

    let word = filter(|c: &char| c.is_ascii_alphabetic() || *c == '_' || *c == '$')
        .chain(filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_' || *c == '$').repeated())
        .collect::<String>()
        .map(|word| Token::keyword(&word).unwrap_or(Token::Ident(word)));

    let token = choice((
        hex,
        decimal,
        string('"'),
        string('\''),
        template,
        word,
        punctuation(),
    ));

    trivia
        .clone()
        .ignore_then(token)
        .repeated()
        .then_ignore(trivia)
        .then_ignore(end())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<Token> {
        lexer().parse(input).unwrap()
    }

    fn ident(s: &str) -> Token {
        Token::Ident(s.to_string())
    }

    #[test]
    fn test_statement() {
        assert_eq!(
            lex("const x = t.args[0];"),
            vec![
                Token::Const,
                ident("x"),
                Token::Punct("="),
                ident("t"),
                Token::Punct("."),
                ident("args"),
                Token::Punct("["),
                Token::Number("0".to_string()),
                Token::Punct("]"),
                Token::Punct(";"),
            ]
        );
    }

    #[test]
    fn test_longest_operator_wins() {
        assert_eq!(
            lex("a === b !== c => d ?? e"),
            vec![
                ident("a"),
                Token::Punct("==="),
                ident("b"),
                Token::Punct("!=="),
                ident("c"),
                Token::Punct("=>"),
                ident("d"),
                Token::Punct("??"),
                ident("e"),
            ]
        );
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(lex(r#""a\"b\n""#), vec![Token::Str("a\"b\n".to_string())]);
        assert_eq!(lex(r"'it\'s'"), vec![Token::Str("it's".to_string())]);
        assert_eq!(lex(r#""A""#), vec![Token::Str("A".to_string())]);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(lex("42 3.5 1e3 0xff"), vec![
            Token::Number("42".to_string()),
            Token::Number("3.5".to_string()),
            Token::Number("1e3".to_string()),
            Token::Number("255".to_string()),
        ]);
    }

    #[test]
    fn test_template() {
        assert_eq!(
            lex("`Hello ${name}! $5`"),
            vec![Token::Template(vec![
                TemplatePart::Str("Hello ".to_string()),
                TemplatePart::Code("name".to_string()),
                TemplatePart::Str("! $5".to_string()),
            ])]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            lex("// line\na /* block */ b // trailing"),
            vec![ident("a"), ident("b")]
        );
    }

    #[test]
    fn test_keywords_and_dollar_idents() {
        assert_eq!(lex("await $el"), vec![Token::Await, ident("$el")]);
        assert_eq!(lex("letter"), vec![ident("letter")]);
    }

    #[test]
    fn test_unterminated_string_fails() {
        assert!(lexer().parse("'open").is_err());
    }
}
