//! Byte-oriented lexer for MiniC source text.

use crate::token::Token;
use minic_common::{CompileError, CompileResult};

/// Scans a whole source string into a flat token stream.
pub struct Lexer<'a> {
    input: &'a [u8],
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            position: 0,
        }
    }

    /// Tokenizes the whole input, ending with a trailing `Token::Eof`.
    pub fn tokenize(mut self) -> CompileResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    fn current(&self) -> Option<u8> {
        self.input.get(self.position).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.current();
        if c.is_some() {
            self.position += 1;
        }
        c
    }

    fn skip_whitespace_and_comments(&mut self) -> CompileResult<()> {
        loop {
            match self.current() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.advance();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while !matches!(self.current(), None | Some(b'\n')) {
                        self.advance();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    self.advance();
                    self.advance();
                    loop {
                        match self.current() {
                            None => return Err(CompileError::UnterminatedComment),
                            Some(b'*') if self.peek_at(1) == Some(b'/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            Some(_) => {
                                self.advance();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn next_token(&mut self) -> CompileResult<Token> {
        self.skip_whitespace_and_comments()?;

        let c = match self.current() {
            None => return Ok(Token::Eof),
            Some(c) => c,
        };

        if c.is_ascii_digit() {
            return self.lex_number();
        }
        if c.is_ascii_alphabetic() || c == b'_' {
            return Ok(self.lex_ident_or_keyword());
        }

        self.advance();
        let token = match c {
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'{' => Token::LBrace,
            b'}' => Token::RBrace,
            b',' => Token::Comma,
            b';' => Token::Semi,
            b'+' => Token::Plus,
            b'-' => Token::Minus,
            b'*' => Token::Star,
            b'/' => Token::Slash,
            b'%' => Token::Percent,
            b'=' => {
                if self.current() == Some(b'=') {
                    self.advance();
                    Token::EqEq
                } else {
                    Token::Assign
                }
            }
            b'<' => {
                if self.current() == Some(b'=') {
                    self.advance();
                    Token::Le
                } else {
                    Token::Lt
                }
            }
            b'>' => {
                if self.current() == Some(b'=') {
                    self.advance();
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            b'!' => {
                if self.current() == Some(b'=') {
                    self.advance();
                    Token::Ne
                } else {
                    Token::Not
                }
            }
            b'&' if self.current() == Some(b'&') => {
                self.advance();
                Token::AndAnd
            }
            b'|' if self.current() == Some(b'|') => {
                self.advance();
                Token::OrOr
            }
            other => return Err(CompileError::UnexpectedChar(other as char)),
        };
        Ok(token)
    }

    fn lex_ident_or_keyword(&mut self) -> Token {
        let start = self.position;
        while matches!(self.current(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
            self.advance();
        }
        let word = std::str::from_utf8(&self.input[start..self.position])
            .expect("ascii identifier is valid utf8");
        Token::keyword(word).unwrap_or_else(|| Token::Ident(word.to_string()))
    }

    fn lex_number(&mut self) -> CompileResult<Token> {
        let start = self.position;
        if self.current() == Some(b'0')
            && matches!(self.peek_at(1), Some(b'x') | Some(b'X'))
        {
            self.advance();
            self.advance();
            let digits_start = self.position;
            while matches!(self.current(), Some(c) if c.is_ascii_hexdigit()) {
                self.advance();
            }
            if self.position == digits_start {
                return Err(CompileError::InvalidIntLiteral);
            }
            let text = std::str::from_utf8(&self.input[digits_start..self.position]).unwrap();
            let value = u32::from_str_radix(text, 16).map_err(|_| CompileError::InvalidIntLiteral)?;
            return Ok(Token::IntLit(value as i32));
        }

        while matches!(self.current(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        let text = std::str::from_utf8(&self.input[start..self.position]).unwrap();

        // A leading zero followed by more digits is octal (e.g. C integer lexis).
        let value: i32 = if text.len() > 1 && text.starts_with('0') {
            u32::from_str_radix(text, 8)
                .map_err(|_| CompileError::InvalidIntLiteral)? as i32
        } else {
            text.parse::<i64>()
                .map(|v| v as i32)
                .map_err(|_| CompileError::InvalidIntLiteral)?
        };
        Ok(Token::IntLit(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<Token> {
        Lexer::new(src).tokenize().expect("lex should succeed")
    }

    #[test]
    fn lexes_keywords_and_punctuation() {
        let tokens = lex("int main(){return 0;}");
        assert_eq!(
            tokens,
            vec![
                Token::KwInt,
                Token::Ident("main".to_string()),
                Token::LParen,
                Token::RParen,
                Token::LBrace,
                Token::KwReturn,
                Token::IntLit(0),
                Token::Semi,
                Token::RBrace,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn lexes_two_char_operators_greedily() {
        let tokens = lex("a<=b && c!=d");
        assert!(tokens.contains(&Token::Le));
        assert!(tokens.contains(&Token::AndAnd));
        assert!(tokens.contains(&Token::Ne));
    }

    #[test]
    fn skips_line_and_block_comments() {
        let tokens = lex("// hi\n/* block */ int x;");
        assert_eq!(
            tokens,
            vec![
                Token::KwInt,
                Token::Ident("x".to_string()),
                Token::Semi,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_comment_is_an_error() {
        let err = Lexer::new("/* never closed").tokenize().unwrap_err();
        assert_eq!(err, CompileError::UnterminatedComment);
    }

    #[test]
    fn lexes_hex_and_octal_literals() {
        assert_eq!(lex("0x1F")[0], Token::IntLit(31));
        assert_eq!(lex("017")[0], Token::IntLit(15));
        assert_eq!(lex("0")[0], Token::IntLit(0));
    }
}
