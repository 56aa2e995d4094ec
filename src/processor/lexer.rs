//! Small hand-written lexer for the script language.
//!
//! Keywords are not recognised here: `var`, `if`, `foreach`, ... all come
//! out as `Ident` and the parser gives them meaning.
//
//  Lexical items:
//
//      Ident    ::= [A-Za-z_][A-Za-z0-9_]*
//      Int      ::= [0-9]+           (fits in i64)
//      Str      ::= '"' ( escape | [^"\n] )* '"'
//      Symbols  ::= ( ) { } [ ] , . ; = += -= + - * / % ! == != < <= > >= && ||
//      Whitespace, `// …` and `/* … */` comments are discarded.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::model::{Diagnostic, Span};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Ident(String),
    Int(i64),
    Str(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Semicolon,
    Assign,
    PlusAssign,
    MinusAssign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Eof,
}

impl Token {
    /// How the token reads in a diagnostic.
    pub fn describe(&self) -> String {
        let s = match self {
            Token::Ident(name) => return format!("`{name}`"),
            Token::Int(n) => return format!("`{n}`"),
            Token::Str(_) => "string literal",
            Token::LParen => "`(`",
            Token::RParen => "`)`",
            Token::LBrace => "`{`",
            Token::RBrace => "`}`",
            Token::LBracket => "`[`",
            Token::RBracket => "`]`",
            Token::Comma => "`,`",
            Token::Dot => "`.`",
            Token::Semicolon => "`;`",
            Token::Assign => "`=`",
            Token::PlusAssign => "`+=`",
            Token::MinusAssign => "`-=`",
            Token::Plus => "`+`",
            Token::Minus => "`-`",
            Token::Star => "`*`",
            Token::Slash => "`/`",
            Token::Percent => "`%`",
            Token::Bang => "`!`",
            Token::EqEq => "`==`",
            Token::NotEq => "`!=`",
            Token::Lt => "`<`",
            Token::Le => "`<=`",
            Token::Gt => "`>`",
            Token::Ge => "`>=`",
            Token::AndAnd => "`&&`",
            Token::OrOr => "`||`",
            Token::Eof => "end of script",
        };
        s.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
}

#[derive(Clone)]
pub struct Lexer<'a> {
    chars: Peekable<CharIndices<'a>>,
    src: &'a str,
    line: u32,
    column: u32,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            chars: src.char_indices().peekable(),
            src,
            line: 0,
            column: 0,
            finished: false,
        }
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.src.len(), |&(i, _)| i)
    }

    fn here(&mut self) -> Span {
        Span {
            offset: self.offset(),
            line: self.line,
            column: self.column,
        }
    }

    fn next_char(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next().map(|(_, c)| c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.next_char();
            true
        } else {
            false
        }
    }

    fn consume_while<F: Fn(char) -> bool>(&mut self, pred: F, buf: &mut String) {
        while let Some(c) = self.peek_char() {
            if pred(c) {
                buf.push(c);
                self.next_char();
            } else {
                break;
            }
        }
    }

    /// Skips whitespace and comments. An unterminated block comment is
    /// reported once and swallows the rest of the input.
    fn skip_trivia(&mut self) -> Option<Diagnostic> {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.next_char();
                }
                Some('/') if self.peek_second() == Some('/') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.next_char();
                    }
                }
                Some('/') if self.peek_second() == Some('*') => {
                    let start = self.here();
                    self.next_char();
                    self.next_char();
                    let mut closed = false;
                    while let Some(c) = self.next_char() {
                        if c == '*' && self.eat('/') {
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        return Some(Diagnostic::error(
                            "SG1035",
                            start,
                            "end-of-file found, '*/' expected",
                        ));
                    }
                }
                _ => return None,
            }
        }
    }

    fn read_identifier(&mut self, first: char) -> String {
        let mut id = String::new();
        id.push(first);
        self.consume_while(|c| c.is_ascii_alphanumeric() || c == '_', &mut id);
        id
    }

    fn read_number(&mut self, first: char, start: Span) -> Result<i64, Diagnostic> {
        let mut num = String::new();
        num.push(first);
        self.consume_while(|c| c.is_ascii_digit(), &mut num);
        num.parse::<i64>().map_err(|_| {
            Diagnostic::error(
                "SG1021",
                start,
                format!("integral constant is too large: {num}"),
            )
        })
    }

    /// Reads the body of a string literal; the opening quote is consumed.
    fn read_string(&mut self, start: Span) -> Result<String, Diagnostic> {
        let mut txt = String::new();
        loop {
            let escape_at = self.here();
            match self.next_char() {
                Some('"') => return Ok(txt),
                Some('\\') => match self.next_char() {
                    Some('n') => txt.push('\n'),
                    Some('t') => txt.push('\t'),
                    Some('r') => txt.push('\r'),
                    Some('0') => txt.push('\0'),
                    Some('"') => txt.push('"'),
                    Some('\\') => txt.push('\\'),
                    Some(other) => {
                        // Keep scanning so the closing quote is still found.
                        self.consume_to_quote();
                        return Err(Diagnostic::error(
                            "SG1009",
                            escape_at,
                            format!("unrecognized escape sequence `\\{other}`"),
                        ));
                    }
                    None => break,
                },
                Some('\n') | None => break,
                Some(c) => txt.push(c),
            }
        }
        Err(Diagnostic::error("SG1010", start, "newline in constant"))
    }

    /// Skips the rest of a string literal, honouring `\"` and `\\`.
    fn consume_to_quote(&mut self) {
        while let Some(c) = self.peek_char() {
            if c == '\n' {
                return;
            }
            self.next_char();
            match c {
                '"' => return,
                '\\' if self.peek_char() != Some('\n') => {
                    self.next_char();
                }
                _ => {}
            }
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Spanned, Diagnostic>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        if let Some(diag) = self.skip_trivia() {
            return Some(Err(diag));
        }

        let span = self.here();
        let ch = match self.next_char() {
            Some(c) => c,
            None => {
                self.finished = true;
                return Some(Ok(Spanned {
                    token: Token::Eof,
                    span,
                }));
            }
        };

        let tok_res = match ch {
            '(' => Ok(Token::LParen),
            ')' => Ok(Token::RParen),
            '{' => Ok(Token::LBrace),
            '}' => Ok(Token::RBrace),
            '[' => Ok(Token::LBracket),
            ']' => Ok(Token::RBracket),
            ',' => Ok(Token::Comma),
            '.' => Ok(Token::Dot),
            ';' => Ok(Token::Semicolon),
            '*' => Ok(Token::Star),
            '/' => Ok(Token::Slash),
            '%' => Ok(Token::Percent),
            '+' if self.eat('=') => Ok(Token::PlusAssign),
            '+' => Ok(Token::Plus),
            '-' if self.eat('=') => Ok(Token::MinusAssign),
            '-' => Ok(Token::Minus),
            '=' if self.eat('=') => Ok(Token::EqEq),
            '=' => Ok(Token::Assign),
            '!' if self.eat('=') => Ok(Token::NotEq),
            '!' => Ok(Token::Bang),
            '<' if self.eat('=') => Ok(Token::Le),
            '<' => Ok(Token::Lt),
            '>' if self.eat('=') => Ok(Token::Ge),
            '>' => Ok(Token::Gt),
            '&' if self.eat('&') => Ok(Token::AndAnd),
            '|' if self.eat('|') => Ok(Token::OrOr),
            '"' => self.read_string(span).map(Token::Str),
            c if c.is_ascii_digit() => self.read_number(c, span).map(Token::Int),
            c if c.is_ascii_alphabetic() || c == '_' => Ok(Token::Ident(self.read_identifier(c))),
            e => Err(Diagnostic::error(
                "SG1001",
                span,
                format!("unexpected character `{e}`"),
            )),
        };

        Some(tok_res.map(|token| Spanned { token, span }))
    }
}

/// Lexes a whole script. Lexical errors are collected and lexing carries
/// on, so the token list always ends with `Eof`.
pub fn tokenize(src: &str) -> (Vec<Spanned>, Vec<Diagnostic>) {
    let mut tokens = Vec::new();
    let mut diagnostics = Vec::new();
    for item in Lexer::new(src) {
        match item {
            Ok(tok) => tokens.push(tok),
            Err(diag) => diagnostics.push(diag),
        }
    }
    (tokens, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        let (tokens, diags) = tokenize(src);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        tokens.into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn test_tokenisation() {
        let test_cases = vec![
            (
                r#"Context.WriteLine("Hello {0}", "World");"#,
                vec![
                    Token::Ident("Context".into()),
                    Token::Dot,
                    Token::Ident("WriteLine".into()),
                    Token::LParen,
                    Token::Str("Hello {0}".into()),
                    Token::Comma,
                    Token::Str("World".into()),
                    Token::RParen,
                    Token::Semicolon,
                    Token::Eof,
                ],
            ),
            (
                "Indentation += 4; // bump",
                vec![
                    Token::Ident("Indentation".into()),
                    Token::PlusAssign,
                    Token::Int(4),
                    Token::Semicolon,
                    Token::Eof,
                ],
            ),
            (
                "a<=b && !c /* x */ || d != 1",
                vec![
                    Token::Ident("a".into()),
                    Token::Le,
                    Token::Ident("b".into()),
                    Token::AndAnd,
                    Token::Bang,
                    Token::Ident("c".into()),
                    Token::OrOr,
                    Token::Ident("d".into()),
                    Token::NotEq,
                    Token::Int(1),
                    Token::Eof,
                ],
            ),
        ];

        for (src, expected) in test_cases {
            assert_eq!(kinds(src), expected, "source: {src}");
        }
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\tb\n\"c\"\\""#),
            vec![Token::Str("a\tb\n\"c\"\\".into()), Token::Eof]
        );
    }

    #[test]
    fn test_bad_escape_skips_the_whole_literal() {
        let (tokens, diags) = tokenize(r#"var s = "\q \" still inside"; next;"#);
        assert_eq!(diags.len(), 1, "{diags:?}");
        assert_eq!(diags[0].code, "SG1009");
        let rest: Vec<&Token> = tokens.iter().skip(3).map(|t| &t.token).collect();
        assert_eq!(
            rest,
            vec![&Token::Semicolon, &Token::Ident("next".into()), &Token::Semicolon, &Token::Eof]
        );
    }

    #[test]
    fn test_spans_track_lines_and_columns() {
        let (tokens, _) = tokenize("var x = 1;\n  x;");
        let second_x = &tokens[5];
        assert_eq!(second_x.token, Token::Ident("x".into()));
        assert_eq!(second_x.span.line, 1);
        assert_eq!(second_x.span.column, 2);
        assert_eq!(second_x.span.offset, 13);
    }

    #[test]
    fn test_lexical_errors_are_collected() {
        let test_cases = vec![
            ("var x = #;", "SG1001"),
            ("var s = \"open;\n", "SG1010"),
            ("var s = \"\\q\";", "SG1009"),
            (r#"var s = "\q\" rest";"#, "SG1009"),
            (r#"var s = "\q\\"; x;"#, "SG1009"),
            ("/* never closed", "SG1035"),
            ("99999999999999999999999;", "SG1021"),
        ];

        for (src, code) in test_cases {
            let (tokens, diags) = tokenize(src);
            assert_eq!(diags.len(), 1, "source: {src}: {diags:?}");
            assert_eq!(diags[0].code, code, "source: {src}");
            assert_eq!(tokens.last().map(|t| &t.token), Some(&Token::Eof));
        }
    }
}
