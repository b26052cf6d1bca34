//! 标签过滤语言的语法分析器
//!
//! ## 语法
//!
//! ```text
//! filter   := EOF                          => True
//!           | binary EOF
//! binary   := unary ( ('&' | '|') unary )*
//! unary    := '!' unary | primary
//! primary  := '(' binary ')'
//!           | IDENTIFIER (':' IDENTIFIER)?
//! ```
//!
//! ## 优先级
//!
//! 1. **括号分组** `(expression)`
//! 2. **NOT操作** `!expression`，右递归，`!!a` 解析为 `Not(Not(a))`
//! 3. **AND / OR 操作** 同一优先级，从左到右结合：
//!    `a & b | c` 解析为 `(a & b) | c`，`a | b & c` 解析为 `(a | b) & c`
//!
//! ## 嵌套深度
//!
//! 每个 `(`、`!` 以及二元链中每个额外的操作数都占用一层深度，
//! 超过 [`MAX_DEPTH`] 时返回 `Expression nested too deeply` 错误，
//! 因此解析得到的树满足 `filter.depth() <= MAX_DEPTH`。
//!
//! ## 解析示例
//!
//! ```text
//! // 空输入, 匹配所有实体
//!
//! // 单个标签
//! tag1
//!
//! // 元标签
//! sort:newest
//!
//! // 组合条件
//! !abcd & (efgh | ijkl)
//! ```

use crate::ast::{Filter, MetaTag, Tag};
use crate::lexer::{Lexer, TokenSource};
use crate::token::{Span, Token, TokenKind};
use thiserror::Error;

/// 允许的最大嵌套深度
pub const MAX_DEPTH: usize = 256;

/// 语法错误：缺少期望的 token、括号未闭合或存在多余输入
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: String,
    /// 出错 token 的位置
    pub span: Span,
}

impl SyntaxError {
    fn unexpected(expected: &str, found: &Token<'_>) -> Self {
        let found_desc = match found.kind {
            TokenKind::Identifier | TokenKind::Illegal => {
                format!("{} '{}'", found.kind, found.lexeme)
            }
            kind => kind.to_string(),
        };
        Self {
            message: format!("{}, found {}", expected, found_desc),
            span: found.span,
        }
    }

    fn too_deep(span: Span) -> Self {
        Self {
            message: "Expression nested too deeply".to_string(),
            span,
        }
    }

    /// 输出带源码上下文的错误信息，在出错位置下方标出 `^`
    pub fn format_with_source(&self, source: &str) -> String {
        let start = self.span.start.min(source.len());
        let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
        let line_end = source[start..]
            .find('\n')
            .map_or(source.len(), |i| start + i);
        let line = &source[line_start..line_end];
        let column = source[line_start..start].chars().count();
        let width = source[start..self.span.end.clamp(start, line_end)]
            .chars()
            .count()
            .max(1);

        format!(
            "error: {}\n  | {}\n  | {}{}",
            self.message,
            line,
            " ".repeat(column),
            "^".repeat(width)
        )
    }
}

pub struct Parser<'a, S: TokenSource<'a> = Lexer<'a>> {
    source: S,
    /// 当前 token（一个 token 的前瞻）
    current: Token<'a>,
    /// 当前已占用的嵌套深度
    depth: usize,
}

impl<'a> Parser<'a, Lexer<'a>> {
    pub fn new(input: &'a str) -> Self {
        Self::from_source(Lexer::new(input))
    }
}

impl<'a, S: TokenSource<'a>> Parser<'a, S> {
    /// 从任意 token 来源构造语法分析器
    pub fn from_source(mut source: S) -> Self {
        let current = source.next_token();
        Self {
            source,
            current,
            depth: 0,
        }
    }

    /// 返回当前 token 并推进位置
    fn advance(&mut self) -> Token<'a> {
        let token = self.current;
        self.current = self.source.next_token();
        token
    }

    /// 若当前 token 匹配给定类型则消费它
    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.current.kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    /// 期望特定类型的 token 并推进，否则返回错误
    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<Token<'a>, SyntaxError> {
        if self.current.kind == kind {
            Ok(self.advance())
        } else {
            Err(SyntaxError::unexpected(message, &self.current))
        }
    }

    /// 占用一层嵌套深度，超过上限时在 `span` 处报错
    fn descend(&mut self, span: Span) -> Result<(), SyntaxError> {
        if self.depth >= MAX_DEPTH {
            return Err(SyntaxError::too_deep(span));
        }
        self.depth += 1;
        Ok(())
    }

    pub fn parse(&mut self) -> Result<Filter, SyntaxError> {
        if self.current.kind == TokenKind::Eof {
            return Ok(Filter::True);
        }

        let filter = self.parse_binary()?;
        self.expect(TokenKind::Eof, "Expected end of input")?;
        Ok(filter)
    }

    /// 解析二元表达式
    ///
    /// 语法: `unary (('&' | '|') unary)*`
    /// AND 与 OR 没有优先级区别，按出现顺序从左到右结合
    ///
    /// 左结合的链每多一个操作数，树就深一层
    fn parse_binary(&mut self) -> Result<Filter, SyntaxError> {
        let mut left = self.parse_unary()?;
        let mut chain = 0;

        loop {
            let operator = self.current;
            if self.match_token(TokenKind::And) {
                self.descend(operator.span)?;
                chain += 1;
                let right = self.parse_unary()?;
                left = Filter::And(Box::new(left), Box::new(right));
            } else if self.match_token(TokenKind::Or) {
                self.descend(operator.span)?;
                chain += 1;
                let right = self.parse_unary()?;
                left = Filter::Or(Box::new(left), Box::new(right));
            } else {
                break;
            }
        }

        self.depth -= chain;
        Ok(left)
    }

    /// 解析NOT表达式
    ///
    /// 语法: `'!' unary | primary`
    fn parse_unary(&mut self) -> Result<Filter, SyntaxError> {
        let bang = self.current;
        if self.match_token(TokenKind::Not) {
            self.descend(bang.span)?;
            let operand = self.parse_unary()?;
            self.depth -= 1;
            Ok(Filter::Not(Box::new(operand)))
        } else {
            self.parse_primary()
        }
    }

    /// 解析基础表达式
    ///
    /// - `(binary)` - 分组表达式
    /// - `key` - 普通标签
    /// - `key:value` - 元标签
    fn parse_primary(&mut self) -> Result<Filter, SyntaxError> {
        let open = self.current;
        if self.match_token(TokenKind::LParen) {
            self.descend(open.span)?;
            let expr = self.parse_binary()?;
            self.expect(TokenKind::RParen, "Expected closing parenthesis")?;
            self.depth -= 1;
            return Ok(expr);
        }

        let key = self.expect(TokenKind::Identifier, "Expected identifier")?;
        if self.match_token(TokenKind::Colon) {
            let value = self.expect(TokenKind::Identifier, "Expected meta tag value")?;
            return Ok(Filter::Meta(MetaTag::new(key.lexeme, value.lexeme)));
        }
        Ok(Filter::Tag(Tag::new(key.lexeme)))
    }
}

/// 解析过滤字符串
pub fn parse(input: &str) -> Result<Filter, SyntaxError> {
    Parser::new(input).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::TokenStream;
    use pretty_assertions::assert_eq;

    fn tag(key: &str) -> Filter {
        Filter::tag(key)
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(parse("").unwrap(), Filter::True);
        assert_eq!(parse("   ").unwrap(), Filter::True);
    }

    #[test]
    fn test_single_tag() {
        assert_eq!(parse("abcd").unwrap(), tag("abcd"));
    }

    #[test]
    fn test_meta_tag() {
        assert_eq!(parse("abcd:dcba").unwrap(), Filter::meta("abcd", "dcba"));
        assert_eq!(parse("sort : newest").unwrap(), Filter::meta("sort", "newest"));
    }

    #[test]
    fn test_negated_tag() {
        assert_eq!(parse("!abcd").unwrap(), Filter::not(tag("abcd")));
    }

    #[test]
    fn test_double_negation() {
        assert_eq!(
            parse("!!abcd").unwrap(),
            Filter::not(Filter::not(tag("abcd")))
        );
    }

    #[test]
    fn test_and_or() {
        assert_eq!(
            parse("abcd & efgh").unwrap(),
            Filter::and(tag("abcd"), tag("efgh"))
        );
        assert_eq!(
            parse("abcd | efgh").unwrap(),
            Filter::or(tag("abcd"), tag("efgh"))
        );
    }

    #[test]
    fn test_flat_left_to_right_association() {
        assert_eq!(
            parse("a & b | c").unwrap(),
            Filter::or(Filter::and(tag("a"), tag("b")), tag("c"))
        );
        assert_eq!(
            parse("a | b & c").unwrap(),
            Filter::and(Filter::or(tag("a"), tag("b")), tag("c"))
        );
    }

    #[test]
    fn test_groupings() {
        assert_eq!(
            parse("(abcd & efgh) | (ijkl & mnop)").unwrap(),
            Filter::or(
                Filter::and(tag("abcd"), tag("efgh")),
                Filter::and(tag("ijkl"), tag("mnop")),
            )
        );
        assert_eq!(
            parse("tag1 | (tag3 & tag4)").unwrap(),
            Filter::or(tag("tag1"), Filter::and(tag("tag3"), tag("tag4")))
        );
    }

    #[test]
    fn test_complex_expression() {
        assert_eq!(
            parse("!abcd & (efgh | ijkl)").unwrap(),
            Filter::and(
                Filter::not(tag("abcd")),
                Filter::or(tag("efgh"), tag("ijkl")),
            )
        );
    }

    #[test]
    fn test_not_binds_tighter_than_binary() {
        assert_eq!(
            parse("!a | b").unwrap(),
            Filter::or(Filter::not(tag("a")), tag("b"))
        );
        assert_eq!(
            parse("!(a | b)").unwrap(),
            Filter::not(Filter::or(tag("a"), tag("b")))
        );
    }

    #[test]
    fn test_display_round_trip() {
        for input in ["", "!abcd & (efgh | sort:newest) | x/y.z", "!!(a | !b) & c:d"] {
            let filter = parse(input).unwrap();
            assert_eq!(parse(&filter.to_string()).unwrap(), filter, "{}", input);
        }
    }

    #[test]
    fn test_unterminated_deep_group_is_rejected() {
        let input = "(".repeat(10_000);
        let err = parse(&input).unwrap_err();
        assert_eq!(err.message, "Expression nested too deeply");
        assert_eq!(err.span, Span::new(MAX_DEPTH, MAX_DEPTH + 1));
    }

    #[test]
    fn test_deep_negation_is_rejected() {
        let input = format!("{}tag1", "!".repeat(10_000));
        let err = parse(&input).unwrap_err();
        assert_eq!(err.message, "Expression nested too deeply");
    }

    #[test]
    fn test_balanced_deep_group_is_rejected() {
        let input = format!("{}tag1{}", "(".repeat(1_000), ")".repeat(1_000));
        assert!(parse(&input).is_err());
    }

    #[test]
    fn test_long_chain_is_rejected() {
        let tags: Vec<String> = (0..10_000).map(|i| format!("t{}", i)).collect();
        let err = parse(&tags.join(" | ")).unwrap_err();
        assert_eq!(err.message, "Expression nested too deeply");
    }

    #[test]
    fn test_nesting_up_to_the_limit() {
        let input = format!("{}tag1", "!".repeat(MAX_DEPTH));
        let filter = parse(&input).unwrap();
        assert_eq!(filter.depth(), MAX_DEPTH);

        let input = format!("{}tag1{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert_eq!(parse(&input).unwrap(), tag("tag1"));

        let tags: Vec<String> = (0..=MAX_DEPTH).map(|i| format!("t{}", i)).collect();
        assert_eq!(parse(&tags.join(" & ")).unwrap().depth(), MAX_DEPTH);
    }

    #[test]
    fn test_depth_is_released_after_groups() {
        // 相邻的分组不会累积深度
        let group = format!("{}a{}", "(".repeat(MAX_DEPTH - 1), ")".repeat(MAX_DEPTH - 1));
        let input = format!("{} & {}", group, group);
        assert!(parse(&input).is_ok());
    }

    #[test]
    fn test_unclosed_group() {
        let err = parse("(").unwrap_err();
        assert_eq!(err.message, "Expected identifier, found end of input");

        let err = parse("(a & b").unwrap_err();
        assert_eq!(err.message, "Expected closing parenthesis, found end of input");
        assert_eq!(err.span, Span::new(6, 6));
    }

    #[test]
    fn test_missing_operand() {
        let err = parse("tag1 &").unwrap_err();
        assert!(err.message.starts_with("Expected identifier"));
        assert!(parse("& tag1").is_err());
        assert!(parse("!").is_err());
        assert!(parse("()").is_err());
    }

    #[test]
    fn test_trailing_input() {
        let err = parse("tag1))").unwrap_err();
        assert_eq!(err.message, "Expected end of input, found ')'");
        assert_eq!(err.span, Span::new(4, 5));

        let err = parse("tag1 tag2").unwrap_err();
        assert_eq!(err.message, "Expected end of input, found identifier 'tag2'");
    }

    #[test]
    fn test_meta_tag_requires_value() {
        assert!(parse("sort:").is_err());
        assert!(parse("sort:(a)").is_err());
        assert!(parse("a:b:c").is_err());
    }

    #[test]
    fn test_illegal_character_is_syntax_error() {
        let err = parse("tag1 & #tag2").unwrap_err();
        assert_eq!(err.message, "Expected identifier, found illegal character '#'");
        assert_eq!(err.span, Span::new(7, 8));
    }

    #[test]
    fn test_synthetic_token_stream() {
        let tokens = vec![
            Token::new(TokenKind::Not, "!", Span::new(0, 1)),
            Token::new(TokenKind::Identifier, "a", Span::new(1, 2)),
            Token::new(TokenKind::And, "&", Span::new(2, 3)),
            Token::new(TokenKind::Identifier, "k", Span::new(3, 4)),
            Token::new(TokenKind::Colon, ":", Span::new(4, 5)),
            Token::new(TokenKind::Identifier, "v", Span::new(5, 6)),
        ];
        let mut parser = Parser::from_source(TokenStream::new(tokens));
        assert_eq!(
            parser.parse().unwrap(),
            Filter::and(Filter::not(tag("a")), Filter::meta("k", "v"))
        );
    }

    #[test]
    fn test_format_with_source() {
        let source = "tag1 & #tag2";
        let err = parse(source).unwrap_err();
        let formatted = err.format_with_source(source);
        assert_eq!(
            formatted,
            "error: Expected identifier, found illegal character '#'\n  | tag1 & #tag2\n  |        ^"
        );
    }
}
