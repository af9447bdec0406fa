use crate::error::{Error, ParseError, Result};
use crate::traits::Scalar;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Binary operators of the expression language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => " + ",
            BinaryOp::Sub => " - ",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "**",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div => 2,
            BinaryOp::Pow => 4,
        }
    }
}

/// Single-argument elementary functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Exp,
    /// Natural logarithm; spelled `log` or `ln`.
    Ln,
    Sqrt,
    Sinh,
    Cosh,
    Tanh,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        let function = match name {
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "exp" => Function::Exp,
            "log" | "ln" => Function::Ln,
            "sqrt" => Function::Sqrt,
            "sinh" => Function::Sinh,
            "cosh" => Function::Cosh,
            "tanh" => Function::Tanh,
            _ => return None,
        };
        Some(function)
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Exp => "exp",
            Function::Ln => "log",
            Function::Sqrt => "sqrt",
            Function::Sinh => "sinh",
            Function::Cosh => "cosh",
            Function::Tanh => "tanh",
        }
    }

    pub fn apply<T: Scalar>(self, a: T) -> T {
        match self {
            Function::Sin => a.sin(),
            Function::Cos => a.cos(),
            Function::Tan => a.tan(),
            Function::Exp => a.exp(),
            Function::Ln => a.ln(),
            Function::Sqrt => a.sqrt(),
            Function::Sinh => a.sinh(),
            Function::Cosh => a.cosh(),
            Function::Tanh => a.tanh(),
        }
    }
}

/// Named mathematical constants recognised by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
    Pi,
    E,
}

impl Constant {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pi" => Some(Constant::Pi),
            "E" => Some(Constant::E),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Constant::Pi => "pi",
            Constant::E => "E",
        }
    }

    pub fn value(self) -> f64 {
        match self {
            Constant::Pi => std::f64::consts::PI,
            Constant::E => std::f64::consts::E,
        }
    }
}

/// Returns true if `name` is taken by a function or a constant.
pub fn is_reserved(name: &str) -> bool {
    Function::from_name(name).is_some() || Constant::from_name(name).is_some()
}

// --- AST ---

/// Abstract Syntax Tree of a real-valued expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Constant(Constant),
    Variable(String),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    Neg(Box<Expr>),
    Call(Function, Box<Expr>),
}

impl Expr {
    /// Returns true if the expression mentions `var`.
    pub fn depends_on(&self, var: &str) -> bool {
        match self {
            Expr::Number(_) | Expr::Constant(_) => false,
            Expr::Variable(name) => name == var,
            Expr::Binary(left, _, right) => left.depends_on(var) || right.depends_on(var),
            Expr::Neg(operand) | Expr::Call(_, operand) => operand.depends_on(var),
        }
    }

    /// Free variables, sorted by name.
    pub fn variables(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Expr::Number(_) | Expr::Constant(_) => {}
            Expr::Variable(name) => {
                out.insert(name.as_str());
            }
            Expr::Binary(left, _, right) => {
                left.collect_variables(out);
                right.collect_variables(out);
            }
            Expr::Neg(operand) | Expr::Call(_, operand) => operand.collect_variables(out),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary(_, op, _) => op.precedence(),
            Expr::Neg(_) => 3,
            Expr::Number(n) if *n < 0.0 => 3,
            _ => 5,
        }
    }
}

fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{n}")
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr, parens: bool) -> fmt::Result {
    if parens {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write_number(f, *n),
            Expr::Constant(c) => f.write_str(c.name()),
            Expr::Variable(name) => f.write_str(name),
            Expr::Binary(left, op, right) => {
                let prec = op.precedence();
                // `**` is right-associative, everything else left-associative.
                let left_parens = if *op == BinaryOp::Pow {
                    left.precedence() <= prec
                } else {
                    left.precedence() < prec
                };
                let right_parens = if *op == BinaryOp::Pow {
                    right.precedence() < prec
                } else {
                    right.precedence() <= prec
                };
                write_operand(f, left, left_parens)?;
                f.write_str(op.symbol())?;
                write_operand(f, right, right_parens)
            }
            Expr::Neg(operand) => {
                f.write_str("-")?;
                write_operand(f, operand, operand.precedence() <= 3)
            }
            Expr::Call(func, arg) => write!(f, "{}({arg})", func.name()),
        }
    }
}

// --- Bytecode & VM ---

/// OpCodes for the Stack-based Virtual Machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    /// Pushes a constant `f64` value onto the stack.
    LoadConst(f64),
    /// Pushes the value of a variable (by its declared index) onto the stack.
    LoadVar(usize),
    /// Pops top two values (b, a), pushes (a + b).
    Add,
    /// Pops top two values (b, a), pushes (a - b).
    Sub,
    /// Pops top two values (b, a), pushes (a * b).
    Mul,
    /// Pops top two values (b, a), pushes (a / b).
    Div,
    /// Pops top two values (b, a), pushes (a ** b).
    Pow,
    /// Pops top value (a), pushes -a.
    Neg,
    /// Pops top value (a), pushes func(a).
    Call(Function),
}

/// A compiled sequence of operations together with the stack depth it needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Bytecode {
    ops: Vec<OpCode>,
    max_depth: usize,
}

impl Bytecode {
    pub fn ops(&self) -> &[OpCode] {
        &self.ops
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

/// Stateless stack machine; the caller owns the scratch stack so that batch
/// evaluation can reuse one allocation.
pub struct VM;

impl VM {
    pub fn execute<T: Scalar>(bytecode: &Bytecode, vars: &[T], stack: &mut Vec<T>) -> Result<T> {
        stack.clear();

        for op in &bytecode.ops {
            match *op {
                OpCode::LoadConst(val) => {
                    let val = T::from_f64(val)
                        .ok_or(Error::MalformedBytecode("constant not representable"))?;
                    stack.push(val);
                }
                OpCode::LoadVar(idx) => {
                    let val = vars
                        .get(idx)
                        .copied()
                        .ok_or(Error::MalformedBytecode("variable index out of range"))?;
                    stack.push(val);
                }
                OpCode::Add => binary(stack, |a, b| a + b)?,
                OpCode::Sub => binary(stack, |a, b| a - b)?,
                OpCode::Mul => binary(stack, |a, b| a * b)?,
                OpCode::Div => binary(stack, |a, b| a / b)?,
                OpCode::Pow => binary(stack, |a, b| a.powf(b))?,
                OpCode::Neg => {
                    let a = pop(stack)?;
                    stack.push(-a);
                }
                OpCode::Call(func) => {
                    let a = pop(stack)?;
                    stack.push(func.apply(a));
                }
            }
        }

        let result = pop(stack)?;
        if !stack.is_empty() {
            return Err(Error::MalformedBytecode("operands left on the stack"));
        }
        Ok(result)
    }
}

fn pop<T: Scalar>(stack: &mut Vec<T>) -> Result<T> {
    stack.pop().ok_or(Error::MalformedBytecode("stack underflow"))
}

fn binary<T: Scalar>(stack: &mut Vec<T>, op: impl Fn(T, T) -> T) -> Result<()> {
    let b = pop(stack)?;
    let a = pop(stack)?;
    stack.push(op(a, b));
    Ok(())
}

/// Compiles an AST (`Expr`) into `Bytecode`.
/// Resolves variable names to their declared indices.
pub struct Compiler {
    pub var_map: HashMap<String, usize>,
}

impl Compiler {
    pub fn new(var_names: &[String]) -> Self {
        let var_map = var_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self { var_map }
    }

    pub fn compile(&self, expr: &Expr) -> Result<Bytecode> {
        let mut bytecode = Bytecode {
            ops: Vec::new(),
            max_depth: 0,
        };
        self.compile_recursive(expr, &mut bytecode, 0)?;
        Ok(bytecode)
    }

    /// `depth` is the number of operands already on the stack when `expr` starts.
    fn compile_recursive(&self, expr: &Expr, code: &mut Bytecode, depth: usize) -> Result<()> {
        code.max_depth = code.max_depth.max(depth + 1);
        match expr {
            Expr::Number(n) => code.ops.push(OpCode::LoadConst(*n)),
            Expr::Constant(c) => code.ops.push(OpCode::LoadConst(c.value())),
            Expr::Variable(name) => {
                let idx = self.var_map.get(name).ok_or_else(|| {
                    Error::InvalidArgument(format!("unknown variable `{name}`"))
                })?;
                code.ops.push(OpCode::LoadVar(*idx));
            }
            Expr::Binary(left, op, right) => {
                self.compile_recursive(left, code, depth)?;
                self.compile_recursive(right, code, depth + 1)?;
                code.ops.push(match op {
                    BinaryOp::Add => OpCode::Add,
                    BinaryOp::Sub => OpCode::Sub,
                    BinaryOp::Mul => OpCode::Mul,
                    BinaryOp::Div => OpCode::Div,
                    BinaryOp::Pow => OpCode::Pow,
                });
            }
            Expr::Neg(operand) => {
                self.compile_recursive(operand, code, depth)?;
                code.ops.push(OpCode::Neg);
            }
            Expr::Call(func, arg) => {
                self.compile_recursive(arg, code, depth)?;
                code.ops.push(OpCode::Call(*func));
            }
        }
        Ok(())
    }
}

// --- Parser ---

/// Rewrites the caret exponent notation into the canonical `**` operator.
pub fn normalize_exponent(input: &str) -> String {
    input.replace('^', "**")
}

/// Parses an expression over the declared `variables`.
///
/// The input must already use `**` for powers; see [`normalize_exponent`].
/// Any identifier that is neither declared, a function, nor a constant is
/// rejected with the position where it appears.
pub fn parse(input: &str, variables: &[String]) -> std::result::Result<Expr, ParseError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
        variables,
    };
    let expr = parser.parse_expression()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(ParseError::new(
            format!("unexpected {} after complete expression", token.kind.describe()),
            token.position,
        )),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    LParen,
    RParen,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            TokenKind::Number(n) => format!("number `{n}`"),
            TokenKind::Identifier(name) => format!("identifier `{name}`"),
            TokenKind::Plus => "`+`".to_string(),
            TokenKind::Minus => "`-`".to_string(),
            TokenKind::Star => "`*`".to_string(),
            TokenKind::DoubleStar => "`**`".to_string(),
            TokenKind::Slash => "`/`".to_string(),
            TokenKind::LParen => "`(`".to_string(),
            TokenKind::RParen => "`)`".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    position: usize,
}

fn tokenize(input: &str) -> std::result::Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut end = start;
            while let Some(&(i, d)) = chars.peek() {
                if d.is_ascii_digit() || d == '.' {
                    end = i + 1;
                    chars.next();
                } else {
                    break;
                }
            }
            // Scientific notation only when the exponent actually has digits,
            // so `2E` stays a number followed by an identifier.
            if let Some(&(i, e)) = chars.peek() {
                if e == 'e' || e == 'E' {
                    let mut digits_at = i + 1;
                    if matches!(bytes.get(digits_at), Some(b'+') | Some(b'-')) {
                        digits_at += 1;
                    }
                    if bytes.get(digits_at).is_some_and(u8::is_ascii_digit) {
                        while chars.peek().is_some_and(|&(j, _)| j < digits_at) {
                            chars.next();
                        }
                        end = digits_at;
                        while let Some(&(j, d)) = chars.peek() {
                            if d.is_ascii_digit() {
                                end = j + 1;
                                chars.next();
                            } else {
                                break;
                            }
                        }
                    }
                }
            }
            let text = &input[start..end];
            let value = text
                .parse::<f64>()
                .map_err(|_| ParseError::new(format!("malformed number `{text}`"), start))?;
            if !value.is_finite() {
                return Err(ParseError::new(
                    format!("number `{text}` is out of range"),
                    start,
                ));
            }
            tokens.push(Token {
                kind: TokenKind::Number(value),
                position: start,
            });
        } else if c.is_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(&(_, d)) = chars.peek() {
                if d.is_alphanumeric() || d == '_' {
                    ident.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token {
                kind: TokenKind::Identifier(ident),
                position: start,
            });
        } else {
            chars.next();
            let kind = match c {
                '+' => TokenKind::Plus,
                '-' => TokenKind::Minus,
                '*' => {
                    if chars.peek().is_some_and(|&(_, d)| d == '*') {
                        chars.next();
                        TokenKind::DoubleStar
                    } else {
                        TokenKind::Star
                    }
                }
                '/' => TokenKind::Slash,
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                other => {
                    return Err(ParseError::new(
                        format!("unexpected character `{other}`"),
                        start,
                    ))
                }
            };
            tokens.push(Token {
                kind,
                position: start,
            });
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    end: usize,
    variables: &'a [String],
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect_rparen(&mut self, opened_at: usize) -> std::result::Result<(), ParseError> {
        match self.consume() {
            Some(Token {
                kind: TokenKind::RParen,
                ..
            }) => Ok(()),
            Some(token) => Err(ParseError::new(
                format!("expected `)` but found {}", token.kind.describe()),
                token.position,
            )),
            None => Err(ParseError::new(
                format!("unclosed `(` opened at position {opened_at}"),
                self.end,
            )),
        }
    }

    fn parse_expression(&mut self) -> std::result::Result<Expr, ParseError> {
        let mut left = self.parse_term()?;

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.consume();
            let right = self.parse_term()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> std::result::Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.consume();
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> std::result::Result<Expr, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Minus) => {
                self.consume();
                let operand = self.parse_unary()?;
                Ok(Expr::Neg(Box::new(operand)))
            }
            Some(TokenKind::Plus) => {
                self.consume();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> std::result::Result<Expr, ParseError> {
        let base = self.parse_primary()?;
        if let Some(TokenKind::DoubleStar) = self.peek_kind() {
            self.consume();
            // Recursing through unary keeps `**` right-associative and allows `x**-1`.
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(Box::new(base), BinaryOp::Pow, Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> std::result::Result<Expr, ParseError> {
        let token = self
            .consume()
            .ok_or_else(|| ParseError::new("unexpected end of input", self.end))?;

        match token.kind {
            TokenKind::Number(n) => Ok(Expr::Number(n)),
            TokenKind::Identifier(name) => self.parse_identifier(name, token.position),
            TokenKind::LParen => {
                let expr = self.parse_expression()?;
                self.expect_rparen(token.position)?;
                Ok(expr)
            }
            other => Err(ParseError::new(
                format!("unexpected {}", other.describe()),
                token.position,
            )),
        }
    }

    fn parse_identifier(
        &mut self,
        name: String,
        position: usize,
    ) -> std::result::Result<Expr, ParseError> {
        let is_call = matches!(self.peek_kind(), Some(TokenKind::LParen));

        if let Some(func) = Function::from_name(&name) {
            if !is_call {
                return Err(ParseError::new(
                    format!("function `{name}` must be called with an argument"),
                    position,
                ));
            }
            let open_at = self.consume().map_or(position, |open| open.position);
            let arg = self.parse_expression()?;
            self.expect_rparen(open_at)?;
            return Ok(Expr::Call(func, Box::new(arg)));
        }
        if is_call {
            return Err(ParseError::new(format!("unknown function `{name}`"), position));
        }
        if let Some(constant) = Constant::from_name(&name) {
            return Ok(Expr::Constant(constant));
        }
        if self.variables.iter().any(|v| *v == name) {
            return Ok(Expr::Variable(name));
        }
        Err(ParseError::new(
            format!(
                "undeclared symbol `{name}` (declared: {})",
                self.variables.join(", ")
            ),
            position,
        ))
    }
}
