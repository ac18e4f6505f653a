// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 模板引擎核心模块
//!
//! 该模块负责把模板源码编译为可复用的 [`CompiledTemplate`] 并针对上下文执行。
//! 核心流程分为三步：
//! 1. **扫描**：把源码切分为字面量片段与 `<% %>` / `<%= %>` 标记块。
//! 2. **解析**：把标记块组织为封闭构造集的类型化语法树
//!    （`Literal | Output | If | Loop`）。
//! 3. **求值**：树遍历解释器在显式传入的上下文对象上执行受控的字段查找，
//!    模板文本永远无法执行宿主代码。
//!
//! 编译对输入字符串而言是纯函数：同一份源码编译两次，对相同上下文必然产生
//! 相同输出。

use serde_json::Value;
use std::borrow::Cow;

use crate::exception::Exception;
use crate::param::{MARKER_CLOSE, MARKER_OPEN};

/// 计算模板源码的内容哈希（djb2 异或变体，32 位）。
///
/// 该哈希仅用作模板缓存键，不具备密码学强度。以内容而非路径为键，
/// 使得从不同路径加载的相同内容共享同一份编译产物。
pub fn content_hash(source: &str) -> u32 {
    let mut hash: u32 = 5381;
    for byte in source.bytes() {
        hash = hash.wrapping_mul(33) ^ byte as u32;
    }
    hash
}

/// 标记内允许出现的表达式。
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// 点号分隔的字段访问路径，如 `user.name`
    Path(Vec<String>),
    /// 字符串字面量（单引号或双引号）
    Str(String),
    /// 整数字面量
    Int(i64),
    /// 布尔字面量
    Bool(bool),
    /// 相等比较
    Eq(Box<Expr>, Box<Expr>),
    /// 不等比较
    Ne(Box<Expr>, Box<Expr>),
}

/// 编译产物的树节点。构造集是封闭的：输出、条件、循环，再无其他。
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// 原样输出的字面量文本
    Literal(String),
    /// `<%= expr %>`：求值并把结果文本追加到输出
    Output(Expr),
    /// `<% if expr %> … <% else %> … <% end %>`
    If {
        cond: Expr,
        then_branch: Vec<Node>,
        else_branch: Vec<Node>,
    },
    /// `<% for ident in path %> … <% end %>`：遍历数组，循环变量绑定在内层作用域
    Loop {
        var: String,
        over: Vec<String>,
        body: Vec<Node>,
    },
}

/// 一份模板的可执行产物。构建完成后不可变，可被任意多次并发执行。
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    nodes: Vec<Node>,
}

impl CompiledTemplate {
    /// 针对上下文对象执行模板，返回完整的渲染结果。
    ///
    /// 渲染失败时不产生任何部分输出。引用上下文中不存在的绑定、对非对象值
    /// 做字段访问、对非数组做循环，都会以 [`Exception::TemplateRender`] 返回。
    pub fn render(&self, context: &Value) -> Result<String, Exception> {
        let mut output = String::new();
        let mut scope = Scope {
            root: context,
            locals: Vec::new(),
        };
        render_nodes(&self.nodes, &mut scope, &mut output)?;
        Ok(output)
    }

    #[cfg(test)]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// 把模板源码编译为 [`CompiledTemplate`]。
///
/// 编译前先做空白归一化：源码中的 CR、LF、TAB 逐个替换为单个空格，
/// 这样字面量文本嵌入任何后续处理都不会丢失或错位字符。
pub fn compile(source: &str) -> Result<CompiledTemplate, Exception> {
    let normalized: String = source
        .chars()
        .map(|c| match c {
            '\r' | '\n' | '\t' => ' ',
            other => other,
        })
        .collect();

    let mut parser = Parser::new();
    let mut rest = normalized.as_str();

    loop {
        match rest.find(MARKER_OPEN) {
            None => {
                if rest.contains(MARKER_CLOSE) {
                    return Err(compile_error("stray '%>' outside of a marker"));
                }
                parser.push_literal(rest);
                break;
            }
            Some(open_at) => {
                let literal = &rest[..open_at];
                if literal.contains(MARKER_CLOSE) {
                    return Err(compile_error("stray '%>' outside of a marker"));
                }
                parser.push_literal(literal);

                let after_open = &rest[open_at + MARKER_OPEN.len()..];
                let close_at = after_open
                    .find(MARKER_CLOSE)
                    .ok_or_else(|| compile_error("marker opened with '<%' is never closed"))?;
                let inner = &after_open[..close_at];
                if inner.contains(MARKER_OPEN) {
                    return Err(compile_error("nested '<%' inside a marker"));
                }
                rest = &after_open[close_at + MARKER_CLOSE.len()..];

                // 紧跟在 <% 之后的 '=' 表示插值标记，其余为语句标记
                match inner.strip_prefix('=') {
                    Some(expr_src) => {
                        let expr = parse_expr(expr_src)?;
                        parser.push_node(Node::Output(expr));
                    }
                    None => parser.statement(inner.trim())?,
                }
            }
        }
    }

    parser.finish()
}

fn compile_error(detail: &str) -> Exception {
    Exception::TemplateCompile(detail.to_string())
}

// --- 语句层解析 ---

/// 尚未闭合的块级构造。`outer` 保存进入该块之前已经完成的节点序列。
enum OpenBlock {
    If {
        cond: Expr,
        then_branch: Option<Vec<Node>>,
        outer: Vec<Node>,
    },
    Loop {
        var: String,
        over: Vec<String>,
        outer: Vec<Node>,
    },
}

struct Parser {
    current: Vec<Node>,
    open: Vec<OpenBlock>,
}

impl Parser {
    fn new() -> Self {
        Self {
            current: Vec::new(),
            open: Vec::new(),
        }
    }

    fn push_literal(&mut self, text: &str) {
        if !text.is_empty() {
            self.current.push(Node::Literal(text.to_string()));
        }
    }

    fn push_node(&mut self, node: Node) {
        self.current.push(node);
    }

    fn statement(&mut self, stmt: &str) -> Result<(), Exception> {
        if stmt == "end" {
            return self.close_block();
        }
        if stmt == "else" {
            return self.begin_else();
        }
        if let Some(cond_src) = stmt.strip_prefix("if ") {
            let cond = parse_expr(cond_src)?;
            self.open.push(OpenBlock::If {
                cond,
                then_branch: None,
                outer: std::mem::take(&mut self.current),
            });
            return Ok(());
        }
        if let Some(loop_src) = stmt.strip_prefix("for ") {
            let (var, over) = parse_loop_head(loop_src)?;
            self.open.push(OpenBlock::Loop {
                var,
                over,
                outer: std::mem::take(&mut self.current),
            });
            return Ok(());
        }
        Err(compile_error(&format!(
            "unknown statement '{}' (expected if / else / end / for)",
            stmt
        )))
    }

    fn begin_else(&mut self) -> Result<(), Exception> {
        match self.open.last_mut() {
            Some(OpenBlock::If { then_branch, .. }) if then_branch.is_none() => {
                *then_branch = Some(std::mem::take(&mut self.current));
                Ok(())
            }
            Some(OpenBlock::If { .. }) => Err(compile_error("duplicate 'else' in one if block")),
            _ => Err(compile_error("'else' outside of an if block")),
        }
    }

    fn close_block(&mut self) -> Result<(), Exception> {
        let block = self
            .open
            .pop()
            .ok_or_else(|| compile_error("'end' without an open block"))?;
        match block {
            OpenBlock::If {
                cond,
                then_branch,
                outer,
            } => {
                let (then_branch, else_branch) = match then_branch {
                    Some(then) => (then, std::mem::take(&mut self.current)),
                    None => (std::mem::take(&mut self.current), Vec::new()),
                };
                self.current = outer;
                self.current.push(Node::If {
                    cond,
                    then_branch,
                    else_branch,
                });
            }
            OpenBlock::Loop { var, over, outer } => {
                let body = std::mem::take(&mut self.current);
                self.current = outer;
                self.current.push(Node::Loop { var, over, body });
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<CompiledTemplate, Exception> {
        if !self.open.is_empty() {
            return Err(compile_error("unclosed block at end of template"));
        }
        Ok(CompiledTemplate {
            nodes: std::mem::take(&mut self.current),
        })
    }
}

/// 解析 `for` 语句头：`<ident> in <path>`。
fn parse_loop_head(src: &str) -> Result<(String, Vec<String>), Exception> {
    let mut parts = src.splitn(2, " in ");
    let var = parts
        .next()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| compile_error("malformed for statement"))?;
    let over_src = parts
        .next()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| compile_error("for statement is missing 'in <path>'"))?;

    if !is_identifier(var) {
        return Err(compile_error(&format!(
            "'{}' is not a valid loop variable name",
            var
        )));
    }
    match parse_expr(over_src)? {
        Expr::Path(path) => Ok((var.to_string(), path)),
        _ => Err(compile_error("for statement expects a field path to iterate")),
    }
}

fn is_identifier(word: &str) -> bool {
    !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !word.chars().next().is_some_and(|c| c.is_ascii_digit())
}

// --- 表达式层解析 ---

#[derive(Debug, PartialEq)]
enum Token {
    Word(String),
    Str(String),
    Int(i64),
    OpEq,
    OpNe,
}

fn tokenize(src: &str) -> Result<Vec<Token>, Exception> {
    let mut tokens = Vec::new();
    let mut chars = src.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c == ' ' {
            chars.next();
        } else if c == '\'' || c == '"' {
            chars.next();
            let mut value = String::new();
            loop {
                match chars.next() {
                    Some(q) if q == c => break,
                    Some(other) => value.push(other),
                    None => return Err(compile_error("unterminated string literal")),
                }
            }
            tokens.push(Token::Str(value));
        } else if c == '=' {
            chars.next();
            match chars.next() {
                Some('=') => tokens.push(Token::OpEq),
                _ => return Err(compile_error("single '=' is not a valid operator")),
            }
        } else if c == '!' {
            chars.next();
            match chars.next() {
                Some('=') => tokens.push(Token::OpNe),
                _ => return Err(compile_error("'!' must be followed by '='")),
            }
        } else if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
            let mut word = String::new();
            while let Some(&w) = chars.peek() {
                if w.is_ascii_alphanumeric() || w == '_' || w == '.' || w == '-' {
                    word.push(w);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(word_token(&word)?);
        } else {
            return Err(compile_error(&format!(
                "unexpected character '{}' in expression",
                c
            )));
        }
    }
    Ok(tokens)
}

fn word_token(word: &str) -> Result<Token, Exception> {
    if word == "true" {
        return Ok(Token::Word("true".to_string()));
    }
    if word.starts_with('-') || word.starts_with(|c: char| c.is_ascii_digit()) {
        return word
            .parse::<i64>()
            .map(Token::Int)
            .map_err(|_| compile_error(&format!("'{}' is not a valid integer literal", word)));
    }
    Ok(Token::Word(word.to_string()))
}

/// 解析单个表达式：`term (("==" | "!=") term)?`。
pub fn parse_expr(src: &str) -> Result<Expr, Exception> {
    let tokens = tokenize(src)?;
    let mut iter = tokens.into_iter();

    let left = term(iter.next(), src)?;
    match iter.next() {
        None => Ok(left),
        Some(Token::OpEq) => {
            let right = term(iter.next(), src)?;
            expect_exhausted(iter.next(), src)?;
            Ok(Expr::Eq(Box::new(left), Box::new(right)))
        }
        Some(Token::OpNe) => {
            let right = term(iter.next(), src)?;
            expect_exhausted(iter.next(), src)?;
            Ok(Expr::Ne(Box::new(left), Box::new(right)))
        }
        Some(_) => Err(compile_error(&format!(
            "expected an operator in expression '{}'",
            src.trim()
        ))),
    }
}

fn term(token: Option<Token>, src: &str) -> Result<Expr, Exception> {
    match token {
        Some(Token::Word(word)) => match word.as_str() {
            "true" => Ok(Expr::Bool(true)),
            "false" => Ok(Expr::Bool(false)),
            path => parse_path(path),
        },
        Some(Token::Str(value)) => Ok(Expr::Str(value)),
        Some(Token::Int(value)) => Ok(Expr::Int(value)),
        Some(Token::OpEq) | Some(Token::OpNe) => Err(compile_error(&format!(
            "operator without a left-hand side in '{}'",
            src.trim()
        ))),
        None => Err(compile_error(&format!(
            "empty expression in marker '{}'",
            src.trim()
        ))),
    }
}

fn expect_exhausted(token: Option<Token>, src: &str) -> Result<(), Exception> {
    match token {
        None => Ok(()),
        Some(_) => Err(compile_error(&format!(
            "trailing tokens in expression '{}'",
            src.trim()
        ))),
    }
}

fn parse_path(word: &str) -> Result<Expr, Exception> {
    let segments: Vec<String> = word.split('.').map(str::to_string).collect();
    if segments.iter().any(|s| !is_identifier(s)) {
        return Err(compile_error(&format!("'{}' is not a valid field path", word)));
    }
    Ok(Expr::Path(segments))
}

// --- 树遍历解释器 ---

/// 求值作用域：根上下文对象加上由外到内的循环变量绑定。
struct Scope<'a, 'b> {
    root: &'a Value,
    locals: Vec<(&'b str, &'a Value)>,
}

impl<'a, 'b> Scope<'a, 'b> {
    /// 受控字段查找。路径首段优先在循环变量中由内向外解析，随后回落到根上下文。
    fn lookup(&self, path: &[String]) -> Result<&'a Value, Exception> {
        let head = path[0].as_str();
        let mut current = match self.locals.iter().rev().find(|(name, _)| *name == head) {
            Some((_, value)) => *value,
            None => match self.root {
                Value::Object(map) => map.get(head).ok_or_else(|| {
                    Exception::TemplateRender(format!("undefined binding '{}'", head))
                })?,
                _ => {
                    return Err(Exception::TemplateRender(format!(
                        "undefined binding '{}' (context is not an object)",
                        head
                    )))
                }
            },
        };
        for segment in &path[1..] {
            current = match current {
                Value::Object(map) => map.get(segment).ok_or_else(|| {
                    Exception::TemplateRender(format!(
                        "undefined field '{}' in path '{}'",
                        segment,
                        path.join(".")
                    ))
                })?,
                _ => {
                    return Err(Exception::TemplateRender(format!(
                        "cannot access field '{}' of a non-object value in path '{}'",
                        segment,
                        path.join(".")
                    )))
                }
            };
        }
        Ok(current)
    }

    fn eval(&self, expr: &Expr) -> Result<Cow<'a, Value>, Exception> {
        match expr {
            Expr::Path(path) => Ok(Cow::Borrowed(self.lookup(path)?)),
            Expr::Str(s) => Ok(Cow::Owned(Value::String(s.clone()))),
            Expr::Int(n) => Ok(Cow::Owned(Value::from(*n))),
            Expr::Bool(b) => Ok(Cow::Owned(Value::Bool(*b))),
            Expr::Eq(left, right) => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                Ok(Cow::Owned(Value::Bool(values_equal(l.as_ref(), r.as_ref()))))
            }
            Expr::Ne(left, right) => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                Ok(Cow::Owned(Value::Bool(!values_equal(
                    l.as_ref(),
                    r.as_ref(),
                ))))
            }
        }
    }
}

fn render_nodes<'a, 'b>(
    nodes: &'b [Node],
    scope: &mut Scope<'a, 'b>,
    output: &mut String,
) -> Result<(), Exception> {
    for node in nodes {
        match node {
            Node::Literal(text) => output.push_str(text),
            Node::Output(expr) => {
                let value = scope.eval(expr)?;
                output.push_str(&stringify(value.as_ref())?);
            }
            Node::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let branch = if is_truthy(scope.eval(cond)?.as_ref()) {
                    then_branch
                } else {
                    else_branch
                };
                render_nodes(branch, scope, output)?;
            }
            Node::Loop { var, over, body } => {
                let target = scope.lookup(over)?;
                let items = match target {
                    Value::Array(items) => items,
                    _ => {
                        return Err(Exception::TemplateRender(format!(
                            "cannot loop over non-array value at '{}'",
                            over.join(".")
                        )))
                    }
                };
                for item in items {
                    scope.locals.push((var.as_str(), item));
                    let result = render_nodes(body, scope, output);
                    scope.locals.pop();
                    result?;
                }
            }
        }
    }
    Ok(())
}

/// 插值输出的取值规则：null 输出空串，标量输出显示形式，复合值输出紧凑 JSON。
fn stringify(value: &Value) -> Result<String, Exception> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.clone()),
        composite => serde_json::to_string(composite)
            .map_err(|e| Exception::TemplateRender(format!("cannot format value: {}", e))),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

/// 数值按数学意义比较（整型与浮点表示视为相等），其余类型按结构比较。
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => match (l.as_f64(), r.as_f64()) {
            (Some(lf), Some(rf)) => lf == rf,
            _ => l == r,
        },
        _ => left == right,
    }
}
