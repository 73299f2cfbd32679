use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use serde_json::{Map, Number, Value};

use crate::ast::{Document, Field, OperationDefinition, SelectionSet};
use crate::backend::{Parser, SyntaxError};
use crate::result::Location;

/// Recursive-descent parser for query documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeParser;

impl Parser for NativeParser {
    fn parse(&self, source: &str) -> Result<Document, SyntaxError> {
        let tokens = tokenize(source)?;
        DocumentParser { tokens, pos: 0 }.document()
    }

    fn print(&self, document: &Document) -> String {
        super::printer::print_document(document)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Punct(char),
    Name(String),
    Str(String),
    Int(i64),
    Float(f64),
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Punct(c) => write!(f, "\"{c}\""),
            Token::Name(name) => write!(f, "Name \"{name}\""),
            Token::Str(s) => write!(f, "String \"{s}\""),
            Token::Int(i) => write!(f, "Int \"{i}\""),
            Token::Float(x) => write!(f, "Float \"{x}\""),
            Token::Eof => f.write_str("<EOF>"),
        }
    }
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn location(&self) -> Location {
        Location::new(self.line, self.column)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_ignored(&mut self) {
        while let Some(&c) = self.chars.peek() {
            match c {
                ' ' | '\t' | '\r' | '\n' | ',' | '\u{feff}' => {
                    self.bump();
                }
                '#' => {
                    while let Some(&c) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<(Token, Location), SyntaxError> {
        self.skip_ignored();
        let location = self.location();
        let Some(&c) = self.chars.peek() else {
            return Ok((Token::Eof, location));
        };

        let token = match c {
            '{' | '}' | '(' | ')' | ':' => {
                self.bump();
                Token::Punct(c)
            }
            '"' => self.string(location)?,
            c if c == '-' || c.is_ascii_digit() => self.number(location)?,
            c if c == '_' || c.is_ascii_alphabetic() => {
                let mut name = String::new();
                while let Some(&c) = self.chars.peek() {
                    if c == '_' || c.is_ascii_alphanumeric() {
                        name.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                Token::Name(name)
            }
            other => {
                return Err(SyntaxError::new(
                    format!("Unexpected character \"{other}\"."),
                    location,
                ))
            }
        };
        Ok((token, location))
    }

    fn string(&mut self, start: Location) -> Result<Token, SyntaxError> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(Token::Str(value)),
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('b') => value.push('\u{8}'),
                    Some('f') => value.push('\u{c}'),
                    Some('u') => value.push(self.unicode_escape()?),
                    Some(c @ ('"' | '\\' | '/')) => value.push(c),
                    _ => {
                        return Err(SyntaxError::new(
                            "Invalid character escape sequence.",
                            self.location(),
                        ))
                    }
                },
                Some('\n') | None => {
                    return Err(SyntaxError::new("Unterminated string.", start));
                }
                Some(c) => value.push(c),
            }
        }
    }

    /// The four hex digits after `\u`.
    fn unicode_escape(&mut self) -> Result<char, SyntaxError> {
        let location = self.location();
        let invalid = || SyntaxError::new("Invalid Unicode escape sequence.", location);
        let mut code = 0u32;
        for _ in 0..4 {
            let digit = self.bump().and_then(|c| c.to_digit(16)).ok_or_else(invalid)?;
            code = code * 16 + digit;
        }
        char::from_u32(code).ok_or_else(invalid)
    }

    fn number(&mut self, start: Location) -> Result<Token, SyntaxError> {
        let mut text = String::new();
        let mut is_float = false;
        while let Some(&c) = self.chars.peek() {
            match c {
                '0'..='9' | '-' | '+' => text.push(c),
                '.' | 'e' | 'E' => {
                    is_float = true;
                    text.push(c);
                }
                _ => break,
            }
            self.bump();
        }

        let invalid = || SyntaxError::new(format!("Invalid number \"{text}\"."), start);
        if is_float {
            text.parse().map(Token::Float).map_err(|_| invalid())
        } else {
            text.parse().map(Token::Int).map_err(|_| invalid())
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<(Token, Location)>, SyntaxError> {
    let mut lexer = Lexer {
        chars: source.chars().peekable(),
        line: 1,
        column: 1,
    };
    let mut tokens = Vec::new();
    loop {
        let (token, location) = lexer.next_token()?;
        let done = token == Token::Eof;
        tokens.push((token, location));
        if done {
            return Ok(tokens);
        }
    }
}

struct DocumentParser {
    tokens: Vec<(Token, Location)>,
    pos: usize,
}

impl DocumentParser {
    fn peek(&self) -> &Token {
        // The token list always ends with Eof and `advance` never moves past it.
        &self.tokens[self.pos].0
    }

    fn location(&self) -> Location {
        self.tokens[self.pos].1
    }

    fn advance(&mut self) -> (Token, Location) {
        let current = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        current
    }

    fn unexpected(&self) -> SyntaxError {
        SyntaxError::new(format!("Unexpected {}.", self.peek()), self.location())
    }

    fn expect_punct(&mut self, punct: char) -> Result<Location, SyntaxError> {
        if *self.peek() == Token::Punct(punct) {
            Ok(self.advance().1)
        } else {
            Err(SyntaxError::new(
                format!("Expected \"{punct}\", found {}.", self.peek()),
                self.location(),
            ))
        }
    }

    fn expect_name(&mut self) -> Result<(String, Location), SyntaxError> {
        match self.advance() {
            (Token::Name(name), location) => Ok((name, location)),
            (token, location) => Err(SyntaxError::new(
                format!("Expected Name, found {token}."),
                location,
            )),
        }
    }

    fn document(mut self) -> Result<Document, SyntaxError> {
        if *self.peek() == Token::Eof {
            return Err(self.unexpected());
        }
        let mut operations = Vec::new();
        while *self.peek() != Token::Eof {
            operations.push(self.operation()?);
        }
        Ok(Document { operations })
    }

    fn operation(&mut self) -> Result<OperationDefinition, SyntaxError> {
        let location = self.location();
        match self.peek() {
            Token::Punct('{') => Ok(OperationDefinition {
                name: None,
                selection_set: self.selection_set()?,
                location,
            }),
            Token::Name(keyword) if keyword == "query" => {
                self.advance();
                let name = match self.peek() {
                    Token::Name(_) => Some(self.expect_name()?.0),
                    _ => None,
                };
                Ok(OperationDefinition {
                    name,
                    selection_set: self.selection_set()?,
                    location,
                })
            }
            _ => Err(self.unexpected()),
        }
    }

    fn selection_set(&mut self) -> Result<SelectionSet, SyntaxError> {
        self.expect_punct('{')?;
        let mut fields = vec![self.field()?];
        while *self.peek() != Token::Punct('}') {
            fields.push(self.field()?);
        }
        self.advance();
        Ok(SelectionSet { fields })
    }

    fn field(&mut self) -> Result<Field, SyntaxError> {
        let (first, location) = self.expect_name()?;
        let (alias, name) = if *self.peek() == Token::Punct(':') {
            self.advance();
            (Some(first), self.expect_name()?.0)
        } else {
            (None, first)
        };

        let arguments = if *self.peek() == Token::Punct('(') {
            self.arguments()?
        } else {
            Map::new()
        };

        let selection_set = if *self.peek() == Token::Punct('{') {
            self.selection_set()?
        } else {
            SelectionSet::default()
        };

        Ok(Field {
            alias,
            name,
            arguments,
            selection_set,
            location,
        })
    }

    fn arguments(&mut self) -> Result<Map<String, Value>, SyntaxError> {
        self.expect_punct('(')?;
        let mut arguments = Map::new();
        loop {
            let (name, _) = self.expect_name()?;
            self.expect_punct(':')?;
            let value = self.value()?;
            arguments.insert(name, value);
            if *self.peek() == Token::Punct(')') {
                self.advance();
                return Ok(arguments);
            }
        }
    }

    fn value(&mut self) -> Result<Value, SyntaxError> {
        let location = self.location();
        let value = match self.peek() {
            Token::Str(s) => Value::String(s.clone()),
            Token::Int(i) => Value::from(*i),
            Token::Float(x) => Number::from_f64(*x)
                .map(Value::Number)
                .ok_or_else(|| SyntaxError::new("Invalid number.", location))?,
            Token::Name(name) if name == "true" => Value::Bool(true),
            Token::Name(name) if name == "false" => Value::Bool(false),
            Token::Name(name) if name == "null" => Value::Null,
            _ => return Err(self.unexpected()),
        };
        self.advance();
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(source: &str) -> Result<Document, SyntaxError> {
        NativeParser.parse(source)
    }

    #[test]
    fn test_parse_shorthand_query() {
        let doc = parse("{ hello, asyncHello }").unwrap();
        assert_eq!(doc.operations.len(), 1);
        let op = &doc.operations[0];
        assert!(op.name.is_none());
        let names: Vec<_> = op.selection_set.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["hello", "asyncHello"]);
    }

    #[test]
    fn test_parse_named_query_with_alias_arguments_and_nesting() {
        let doc = parse(
            r#"
            query Greeting {
              # comment
              hi: greet(name: "Ada", times: 2, loud: true) 
              me { name friends { name } }
            }
            "#,
        )
        .unwrap();
        let op = &doc.operations[0];
        assert_eq!(op.name.as_deref(), Some("Greeting"));

        let greet = &op.selection_set.fields[0];
        assert_eq!(greet.alias.as_deref(), Some("hi"));
        assert_eq!(greet.response_key(), "hi");
        assert_eq!(greet.arguments["name"], json!("Ada"));
        assert_eq!(greet.arguments["times"], json!(2));
        assert_eq!(greet.arguments["loud"], json!(true));

        let me = &op.selection_set.fields[1];
        assert_eq!(me.selection_set.fields[1].name, "friends");
        assert_eq!(me.selection_set.fields[1].selection_set.fields[0].name, "name");
    }

    #[test]
    fn test_unterminated_selection_is_syntax_error() {
        let err = parse("{ hello ").unwrap_err();
        assert_eq!(err.message, "Expected Name, found <EOF>.");
        assert_eq!(err.location, Location::new(1, 9));
    }

    #[test]
    fn test_empty_document_is_syntax_error() {
        let err = parse("   ").unwrap_err();
        assert_eq!(err.message, "Unexpected <EOF>.");
    }

    #[test]
    fn test_unexpected_character() {
        let err = parse("{ hel%lo }").unwrap_err();
        assert_eq!(err.message, "Unexpected character \"%\".");
        assert_eq!(err.location, Location::new(1, 6));
    }

    #[test]
    fn test_locations_track_lines() {
        let doc = parse("{\n  a\n  b\n}").unwrap();
        let fields = &doc.operations[0].selection_set.fields;
        assert_eq!(fields[0].location, Location::new(2, 3));
        assert_eq!(fields[1].location, Location::new(3, 3));
    }

    #[test]
    fn test_print_roundtrips_through_parse() {
        let source = r#"query Q { a: b(x: 1, s: "t") { c } d }"#;
        let doc = parse(source).unwrap();
        let printed = NativeParser.print(&doc);
        let reparsed = parse(&printed).unwrap();
        assert_eq!(reparsed.operations[0].name, doc.operations[0].name);
        assert_eq!(
            NativeParser.print(&reparsed),
            printed,
            "printing must be stable"
        );
    }

    #[test]
    fn test_control_characters_survive_print() {
        let doc = parse(r#"{ greet(name: "a\u0001b\bc\fd\u00e9") }"#).unwrap();
        let name = &doc.operations[0].selection_set.fields[0].arguments["name"];
        assert_eq!(name, &json!("a\u{1}b\u{8}c\u{c}d\u{e9}"));

        let reparsed = parse(&NativeParser.print(&doc)).unwrap();
        assert_eq!(&reparsed.operations[0].selection_set.fields[0].arguments["name"], name);
    }

    #[test]
    fn test_bad_unicode_escape() {
        let err = parse(r#"{ greet(name: "\u12G4") }"#).unwrap_err();
        assert_eq!(err.message, "Invalid Unicode escape sequence.");
    }
}
