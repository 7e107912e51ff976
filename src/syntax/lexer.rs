//! Tokenizer for Go source with automatic semicolon insertion.
//!
//! Comments are emitted as tokens so the parser can keep them. A newline
//! after a token that may end a statement produces an implicit semicolon
//! (text `"\n"`) placed *before* any comment that follows on the same line,
//! the same ordering the Go scanner uses.

use super::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Keyword,
    Int,
    Float,
    Imag,
    Char,
    String,
    Op,
    Semicolon,
    Comment,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub line: u32,
    pub col: u32,
    /// Line of the last character (differs from `line` for raw strings and block comments).
    pub end_line: u32,
}

impl Token<'_> {
    pub fn is_op(&self, op: &str) -> bool {
        self.kind == TokenKind::Op && self.text == op
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == keyword
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Int
                | TokenKind::Float
                | TokenKind::Imag
                | TokenKind::Char
                | TokenKind::String
        )
    }
}

const KEYWORDS: &[&str] = &[
    "break",
    "case",
    "chan",
    "const",
    "continue",
    "default",
    "defer",
    "else",
    "fallthrough",
    "for",
    "func",
    "go",
    "goto",
    "if",
    "import",
    "interface",
    "map",
    "package",
    "range",
    "return",
    "select",
    "struct",
    "switch",
    "type",
    "var",
];

// Longest operators first so that prefix matching picks the right one.
const OPERATORS: &[&str] = &[
    "<<=", ">>=", "&^=", "...", "&&", "||", "<-", "++", "--", "==", "!=", "<=", ">=", ":=", "+=",
    "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<", ">>", "&^", "+", "-", "*", "/", "%", "&", "|",
    "^", "<", ">", "=", "!", "(", ")", "[", "]", "{", "}", ",", ";", ".", ":", "~",
];

/// Splits `src` into tokens, ending with a single [`TokenKind::Eof`].
pub fn tokenize(src: &str) -> Result<Vec<Token<'_>>, ParseError> {
    let mut lexer = Lexer {
        src,
        bytes: src.as_bytes(),
        pos: 0,
        line: 1,
        line_start: 0,
        insert_semi: false,
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    line_start: usize,
    insert_semi: bool,
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn col(&self) -> u32 {
        (self.pos - self.line_start + 1) as u32
    }

    fn newline(&mut self) {
        self.pos += 1;
        self.line += 1;
        self.line_start = self.pos;
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            line: self.line,
            column: self.col(),
            message: message.into(),
        }
    }

    fn implicit_semicolon(&mut self) -> Token<'a> {
        self.insert_semi = false;
        Token {
            kind: TokenKind::Semicolon,
            text: "\n",
            line: self.line,
            col: self.col(),
            end_line: self.line,
        }
    }

    fn next_token(&mut self) -> Result<Token<'a>, ParseError> {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r') => self.pos += 1,
                Some(b'\n') => {
                    if self.insert_semi {
                        let token = self.implicit_semicolon();
                        self.newline();
                        return Ok(token);
                    }
                    self.newline();
                }
                _ => break,
            }
        }

        let Some(c) = self.peek() else {
            if self.insert_semi {
                return Ok(self.implicit_semicolon());
            }
            return Ok(Token {
                kind: TokenKind::Eof,
                text: "",
                line: self.line,
                col: self.col(),
                end_line: self.line,
            });
        };

        if c == b'/' && matches!(self.peek_at(1), Some(b'/' | b'*')) {
            if self.insert_semi && self.comment_ends_line()? {
                return Ok(self.implicit_semicolon());
            }
            return self.comment();
        }

        let start = self.pos;
        let line = self.line;
        let col = self.col();
        let kind = if c.is_ascii_alphabetic() || c == b'_' || c >= 0x80 {
            while let Some(c) = self.peek() {
                if c.is_ascii_alphanumeric() || c == b'_' || c >= 0x80 {
                    self.pos += 1;
                } else {
                    break;
                }
            }
            if KEYWORDS.contains(&&self.src[start..self.pos]) {
                TokenKind::Keyword
            } else {
                TokenKind::Ident
            }
        } else if c.is_ascii_digit()
            || (c == b'.' && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()))
        {
            self.number()
        } else if c == b'"' {
            self.quoted(b'"')?;
            TokenKind::String
        } else if c == b'\'' {
            self.quoted(b'\'')?;
            TokenKind::Char
        } else if c == b'`' {
            self.raw_string()?;
            TokenKind::String
        } else {
            let rest = &self.src[self.pos..];
            let Some(op) = OPERATORS.iter().find(|op| rest.starts_with(**op)) else {
                return Err(self.error(format!("unexpected character {:?}", c as char)));
            };
            self.pos += op.len();
            if *op == ";" {
                self.insert_semi = false;
                return Ok(Token {
                    kind: TokenKind::Semicolon,
                    text: ";",
                    line,
                    col,
                    end_line: line,
                });
            }
            TokenKind::Op
        };

        let text = &self.src[start..self.pos];
        self.insert_semi = match kind {
            TokenKind::Ident
            | TokenKind::Int
            | TokenKind::Float
            | TokenKind::Imag
            | TokenKind::Char
            | TokenKind::String => true,
            TokenKind::Keyword => matches!(text, "break" | "continue" | "fallthrough" | "return"),
            TokenKind::Op => matches!(text, "++" | "--" | ")" | "]" | "}"),
            _ => false,
        };
        Ok(Token {
            kind,
            text,
            line,
            col,
            end_line: self.line,
        })
    }

    /// Whether the comment at the cursor runs to the end of the line.
    fn comment_ends_line(&self) -> Result<bool, ParseError> {
        if self.peek_at(1) == Some(b'/') {
            return Ok(true);
        }
        let rest = &self.src[self.pos + 2..];
        let Some(end) = rest.find("*/") else {
            return Err(self.error("comment not terminated"));
        };
        if rest[..end].contains('\n') {
            return Ok(true);
        }
        let after = rest[end + 2..].trim_start_matches([' ', '\t', '\r']);
        Ok(after.is_empty() || after.starts_with('\n') || after.starts_with("//"))
    }

    fn comment(&mut self) -> Result<Token<'a>, ParseError> {
        let start = self.pos;
        let line = self.line;
        let col = self.col();
        if self.peek_at(1) == Some(b'/') {
            while let Some(c) = self.peek() {
                if c == b'\n' {
                    break;
                }
                self.pos += 1;
            }
        } else {
            self.pos += 2;
            loop {
                match self.peek() {
                    None => return Err(self.error("comment not terminated")),
                    Some(b'*') if self.peek_at(1) == Some(b'/') => {
                        self.pos += 2;
                        break;
                    }
                    Some(b'\n') => self.newline(),
                    Some(_) => self.pos += 1,
                }
            }
        }
        Ok(Token {
            kind: TokenKind::Comment,
            text: self.src[start..self.pos].trim_end_matches('\r'),
            line,
            col,
            end_line: self.line,
        })
    }

    fn number(&mut self) -> TokenKind {
        let start = self.pos;
        let hex = self.src[start..].starts_with("0x") || self.src[start..].starts_with("0X");
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_alphanumeric() || c == b'_' => {
                    self.pos += 1;
                    let exponent = if hex {
                        matches!(c, b'p' | b'P')
                    } else {
                        matches!(c, b'e' | b'E')
                    };
                    if exponent && matches!(self.peek(), Some(b'+' | b'-')) {
                        self.pos += 1;
                    }
                }
                Some(b'.') if self.peek_at(1) != Some(b'.') => self.pos += 1,
                _ => break,
            }
        }
        let text = &self.src[start..self.pos];
        if text.ends_with('i') {
            TokenKind::Imag
        } else if text.contains('.')
            || (hex && text.contains(['p', 'P']))
            || (!hex && text.contains(['e', 'E']))
        {
            TokenKind::Float
        } else {
            TokenKind::Int
        }
    }

    fn quoted(&mut self, quote: u8) -> Result<(), ParseError> {
        self.pos += 1;
        loop {
            match self.peek() {
                None | Some(b'\n') => return Err(self.error("literal not terminated")),
                Some(b'\\') => self.pos += 2,
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn raw_string(&mut self) -> Result<(), ParseError> {
        self.pos += 1;
        loop {
            match self.peek() {
                None => return Err(self.error("raw string literal not terminated")),
                Some(b'`') => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(b'\n') => self.newline(),
                Some(_) => self.pos += 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<(TokenKind, String)> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text.to_string()))
            .collect()
    }

    #[test]
    fn inserts_semicolon_after_statement_end() {
        let tokens = kinds("x := f()\ny++\n");
        let semis = tokens
            .iter()
            .filter(|(kind, _)| *kind == TokenKind::Semicolon)
            .count();
        assert_eq!(semis, 2);
        assert_eq!(tokens.last().unwrap().0, TokenKind::Eof);
    }

    #[test]
    fn no_semicolon_after_operator_at_line_end() {
        let tokens = kinds("a +\nb");
        let texts: Vec<_> = tokens.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(texts, vec!["a", "+", "b", "\n", ""]);
    }

    #[test]
    fn semicolon_precedes_trailing_comment() {
        let tokens = tokenize("x := 1 // one\n").unwrap();
        assert_eq!(tokens[3].kind, TokenKind::Semicolon);
        assert_eq!(tokens[4].kind, TokenKind::Comment);
        assert_eq!(tokens[4].text, "// one");
        assert_eq!(tokens[4].line, 1);
    }

    #[test]
    fn raw_strings_track_lines() {
        let tokens = tokenize("s := `a\nb`\nt").unwrap();
        assert_eq!(tokens[2].kind, TokenKind::String);
        assert_eq!(tokens[2].end_line, 2);
        assert_eq!(tokens[4].line, 3);
    }

    #[test]
    fn numbers_and_exponents() {
        let tokens = kinds("1e+5 0x1F 0x1p-2 .5 3i 1_000");
        let got: Vec<_> = tokens
            .iter()
            .take(6)
            .map(|(kind, text)| (*kind, text.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                (TokenKind::Float, "1e+5"),
                (TokenKind::Int, "0x1F"),
                (TokenKind::Float, "0x1p-2"),
                (TokenKind::Float, ".5"),
                (TokenKind::Imag, "3i"),
                (TokenKind::Int, "1_000"),
            ]
        );
    }

    #[test]
    fn reports_unterminated_string() {
        let err = tokenize("x := \"abc\n").unwrap_err();
        assert_eq!(err.line, 1);
    }
}
