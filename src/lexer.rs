//! 标签过滤语言的词法分析器

use crate::token::{Span, Token, TokenKind};

/// 词法单元的来源。
///
/// 语法分析器只依赖这个 trait，因此既可以直接读取 [`Lexer`]，
/// 也可以读取预先构造好的 token 序列（见 [`TokenStream`]）。
/// 输入耗尽后必须一直返回 `Eof`。
pub trait TokenSource<'a> {
    fn next_token(&mut self) -> Token<'a>;
}

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, position: 0 }
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 推进位置一个字符并返回该字符
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    /// 跳过空白字符
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn make_token(&self, kind: TokenKind, start: usize) -> Token<'a> {
        Token::new(kind, &self.input[start..self.position], Span::new(start, self.position))
    }

    /// 读取标识符
    /// 标识符由单词字符、`.` 和 `/` 组成，例如 `photos/2023` 或 `v1.2`
    fn read_identifier(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if is_identifier_char(c) {
                self.bump();
            } else {
                break;
            }
        }
        self.make_token(TokenKind::Identifier, start)
    }

    /// 返回下一个 token；到达输入末尾后总是返回 `Eof`
    pub fn next_token(&mut self) -> Token<'a> {
        self.skip_whitespace();
        let start = self.position;

        let Some(c) = self.bump() else {
            return Token::eof(self.input.len());
        };

        match c {
            '&' => self.make_token(TokenKind::And, start),
            '|' => self.make_token(TokenKind::Or, start),
            '!' => self.make_token(TokenKind::Not, start),
            '(' => self.make_token(TokenKind::LParen, start),
            ')' => self.make_token(TokenKind::RParen, start),
            ':' => self.make_token(TokenKind::Colon, start),
            c if is_identifier_char(c) => self.read_identifier(start),
            _ => self.make_token(TokenKind::Illegal, start),
        }
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.' || c == '/'
}

impl<'a> TokenSource<'a> for Lexer<'a> {
    fn next_token(&mut self) -> Token<'a> {
        Lexer::next_token(self)
    }
}

/// 迭代时产生 `Eof` 之前的所有 token
impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            None
        } else {
            Some(token)
        }
    }
}

/// 预先构造好的 token 序列，主要用于测试语法分析器
#[derive(Debug, Clone)]
pub struct TokenStream<'a> {
    tokens: Vec<Token<'a>>,
    position: usize,
}

impl<'a> TokenStream<'a> {
    pub fn new(tokens: Vec<Token<'a>>) -> Self {
        Self { tokens, position: 0 }
    }
}

impl<'a> From<Vec<Token<'a>>> for TokenStream<'a> {
    fn from(tokens: Vec<Token<'a>>) -> Self {
        Self::new(tokens)
    }
}

impl<'a> TokenSource<'a> for TokenStream<'a> {
    fn next_token(&mut self) -> Token<'a> {
        match self.tokens.get(self.position) {
            Some(token) => {
                self.position += 1;
                *token
            }
            None => Token::eof(self.tokens.last().map_or(0, |t| t.span.end)),
        }
    }
}
