use std::fmt;

/// AST 的根节点, 代表一个完整的标签过滤表达式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// 普通标签, 例如：`tag1`
    Tag(Tag),
    /// `key:value` 形式的元标签, 例如：`sort:newest`
    Meta(MetaTag),
    /// 恒真过滤器, 由空输入产生
    True,
    /// 逻辑与运算 (&)
    And(Box<Filter>, Box<Filter>),
    /// 逻辑或运算 (|)
    Or(Box<Filter>, Box<Filter>),
    /// 逻辑非运算 (!)
    Not(Box<Filter>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetaTag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl MetaTag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Filter {
    pub fn tag(key: impl Into<String>) -> Self {
        Filter::Tag(Tag::new(key))
    }

    pub fn meta(key: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Meta(MetaTag::new(key, value))
    }

    pub fn and(left: Filter, right: Filter) -> Self {
        Filter::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Filter, right: Filter) -> Self {
        Filter::Or(Box::new(left), Box::new(right))
    }

    pub fn not(inner: Filter) -> Self {
        Filter::Not(Box::new(inner))
    }

    /// 运算符嵌套层数，叶子节点为 0
    ///
    /// 使用显式栈遍历，任意深度的树都不会耗尽调用栈
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self, 0)];
        while let Some((node, depth)) = stack.pop() {
            max = max.max(depth);
            match node {
                Filter::Tag(_) | Filter::Meta(_) | Filter::True => {}
                Filter::And(left, right) | Filter::Or(left, right) => {
                    stack.push((left, depth + 1));
                    stack.push((right, depth + 1));
                }
                Filter::Not(inner) => stack.push((inner, depth + 1)),
            }
        }
        max
    }

    fn is_binary(&self) -> bool {
        matches!(self, Filter::And(..) | Filter::Or(..))
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_binary() {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl fmt::Display for MetaTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key, self.value)
    }
}

/// 以过滤语言的语法输出表达式，嵌套的二元表达式总是加括号。
///
/// `True` 输出为空字符串，语法中没有对应的写法，所以只有在 `True`
/// 仅作为根节点出现时（即语法分析器产生的树），输出才能被重新解析为同一棵树。
impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Tag(tag) => fmt::Display::fmt(tag, f),
            Filter::Meta(meta) => fmt::Display::fmt(meta, f),
            Filter::True => Ok(()),
            Filter::And(left, right) => {
                left.fmt_operand(f)?;
                f.write_str(" & ")?;
                right.fmt_operand(f)
            }
            Filter::Or(left, right) => {
                left.fmt_operand(f)?;
                f.write_str(" | ")?;
                right.fmt_operand(f)
            }
            Filter::Not(inner) => {
                f.write_str("!")?;
                inner.fmt_operand(f)
            }
        }
    }
}
