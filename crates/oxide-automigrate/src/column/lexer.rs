//! Tokenizer for encoded column builder chains.

/// Token kinds of the builder-chain grammar.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    /// Method or path segment name.
    Identifier(String),
    /// Quoted string literal, unescaped.
    Str(String),
    /// Numeric literal as written.
    Number(String),
    Dot,
    Comma,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    /// Lexing error.
    Error(String),
    Eof,
}

/// A token with its starting byte offset.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

/// A lexer over an encoded column.
pub(crate) struct Lexer<'a> {
    /// The input text.
    input: &'a str,
    /// The current byte position.
    pos: usize,
    /// The byte position of the start of the current token.
    start: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    pub(crate) const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            start: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token {
            kind,
            offset: self.start,
        }
    }

    fn scan_identifier(&mut self) -> Token {
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
        {
            self.advance();
        }
        let text = &self.input[self.start..self.pos];
        self.make_token(TokenKind::Identifier(text.to_string()))
    }

    /// Scans a quoted string. Backslash escapes the next character.
    fn scan_string(&mut self, quote: char) -> Token {
        self.advance();
        let mut value = String::new();
        loop {
            match self.advance() {
                Some('\\') => match self.advance() {
                    Some(escaped) => value.push(escaped),
                    None => break,
                },
                Some(c) if c == quote => return self.make_token(TokenKind::Str(value)),
                Some(c) => value.push(c),
                None => break,
            }
        }
        self.make_token(TokenKind::Error("unterminated string literal".to_string()))
    }

    fn scan_number(&mut self) -> Token {
        if self.peek() == Some('-') {
            self.advance();
        }
        let mut digits = 0usize;
        let mut previous = None;
        while let Some(c) = self.peek() {
            let exponent_sign = matches!(c, '+' | '-') && matches!(previous, Some('e' | 'E'));
            if !(c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E') || exponent_sign) {
                break;
            }
            self.advance();
            previous = Some(c);
            digits += 1;
        }
        if digits == 0 {
            return self.make_token(TokenKind::Error("expected digits after '-'".to_string()));
        }
        let text = &self.input[self.start..self.pos];
        self.make_token(TokenKind::Number(text.to_string()))
    }

    /// Returns the next token.
    pub(crate) fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        self.start = self.pos;

        let Some(c) = self.peek() else {
            return self.make_token(TokenKind::Eof);
        };

        let simple = match c {
            '.' => Some(TokenKind::Dot),
            ',' => Some(TokenKind::Comma),
            '(' => Some(TokenKind::LeftParen),
            ')' => Some(TokenKind::RightParen),
            '[' => Some(TokenKind::LeftBracket),
            ']' => Some(TokenKind::RightBracket),
            _ => None,
        };
        if let Some(kind) = simple {
            self.advance();
            return self.make_token(kind);
        }

        match c {
            '\'' | '"' => self.scan_string(c),
            '-' | '0'..='9' => self.scan_number(),
            c if c.is_alphabetic() || c == '_' => self.scan_identifier(),
            other => {
                self.advance();
                self.make_token(TokenKind::Error(format!("unexpected character '{other}'")))
            }
        }
    }

    /// Tokenizes the whole input, ending with `Eof` or the first error.
    pub(crate) fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = matches!(token.kind, TokenKind::Eof | TokenKind::Error(_));
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_builder_chain() {
        assert_eq!(
            kinds("t.string('email', 50).unique()"),
            vec![
                TokenKind::Identifier("t".into()),
                TokenKind::Dot,
                TokenKind::Identifier("string".into()),
                TokenKind::LeftParen,
                TokenKind::Str("email".into()),
                TokenKind::Comma,
                TokenKind::Number("50".into()),
                TokenKind::RightParen,
                TokenKind::Dot,
                TokenKind::Identifier("unique".into()),
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_escaped_quote() {
        assert_eq!(
            kinds(r"'it\'s'"),
            vec![TokenKind::Str("it's".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_negative_and_decimal_numbers() {
        assert_eq!(
            kinds("-12 3.5"),
            vec![
                TokenKind::Number("-12".into()),
                TokenKind::Number("3.5".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_exponent_numbers() {
        assert_eq!(
            kinds("1e-7, -2.5E-9, 1e+300, 4-2"),
            vec![
                TokenKind::Number("1e-7".into()),
                TokenKind::Comma,
                TokenKind::Number("-2.5E-9".into()),
                TokenKind::Comma,
                TokenKind::Number("1e+300".into()),
                TokenKind::Comma,
                TokenKind::Number("4".into()),
                TokenKind::Number("-2".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let tokens = Lexer::new("t.string('name").tokenize();
        assert!(matches!(
            tokens.last().map(|t| &t.kind),
            Some(TokenKind::Error(_))
        ));
    }

    #[test]
    fn test_offsets() {
        let tokens = Lexer::new("t . x").tokenize();
        let offsets: Vec<usize> = tokens.iter().map(|t| t.offset).collect();
        assert_eq!(offsets, vec![0, 2, 4, 5]);
    }
}
