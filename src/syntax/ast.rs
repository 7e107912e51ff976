//! Syntax tree for Go source files.
//!
//! The tree is owned and mutable: recipes rewrite it in place and the
//! printer turns it back into gofmt-style text. Comments and blank lines
//! are carried on the nodes they precede so that untouched code prints back
//! the way it was written.

/// A single `//` or `/* */` comment, stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
    /// A blank line separated this comment from whatever came before it.
    pub blank_before: bool,
}

impl Comment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            blank_before: false,
        }
    }
}

/// One parsed source file.
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    /// Comments above the package clause (license, build constraints, package doc).
    pub doc: Vec<Comment>,
    /// A blank line separates `doc` from the package clause.
    pub blank_before_package: bool,
    pub package: String,
    pub decls: Vec<Decl>,
    /// Comments after the last declaration.
    pub tail: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decl {
    pub doc: Vec<Comment>,
    pub kind: DeclKind,
    pub comment: Option<Comment>,
    pub blank_before: bool,
}

impl Decl {
    pub fn new(kind: DeclKind) -> Self {
        Self {
            doc: Vec::new(),
            kind,
            comment: None,
            blank_before: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclKind {
    Import(ImportDecl),
    Gen(GenDecl),
    Func(FuncDecl),
    /// Free-floating comment group between declarations.
    Comments(Vec<Comment>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImportDecl {
    pub specs: Vec<ImportSpec>,
    pub grouped: bool,
    pub tail: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSpec {
    pub doc: Vec<Comment>,
    /// Explicit local name: an identifier, `_` or `.`.
    pub name: Option<String>,
    /// Unquoted import path.
    pub path: String,
    pub comment: Option<Comment>,
    /// First spec of a new group inside a parenthesised import.
    pub blank_before: bool,
}

impl ImportSpec {
    pub fn new(name: Option<&str>, path: impl Into<String>) -> Self {
        Self {
            doc: Vec::new(),
            name: name.map(str::to_string),
            path: path.into(),
            comment: None,
            blank_before: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenKeyword {
    Const,
    Var,
    Type,
}

impl GenKeyword {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Const => "const",
            Self::Var => "var",
            Self::Type => "type",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenDecl {
    pub keyword: GenKeyword,
    pub specs: Vec<Spec>,
    pub grouped: bool,
    pub tail: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spec {
    pub doc: Vec<Comment>,
    pub kind: SpecKind,
    pub comment: Option<Comment>,
    pub blank_before: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpecKind {
    Value(ValueSpec),
    Type(TypeSpec),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueSpec {
    pub names: Vec<String>,
    pub ty: Option<Expr>,
    pub values: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeSpec {
    pub name: String,
    pub type_params: Vec<Field>,
    /// `type A = B`
    pub alias: bool,
    pub ty: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub recv: Option<Vec<Field>>,
    pub name: String,
    pub type_params: Vec<Field>,
    pub sig: FuncType,
    pub body: Option<Block>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FuncType {
    pub params: Vec<Field>,
    pub results: Vec<Field>,
    /// The closing parenthesis of the parameter list sat on its own line.
    pub params_close_break: bool,
}

/// Parameter, result, struct field or interface element.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub doc: Vec<Comment>,
    pub names: Vec<String>,
    pub ty: Expr,
    pub tag: Option<String>,
    pub comment: Option<Comment>,
    /// Started on a new line (parameter lists).
    pub newline: bool,
    /// Preceded by a blank line (struct and interface bodies).
    pub blank_before: bool,
}

impl Field {
    pub fn new(names: Vec<String>, ty: Expr) -> Self {
        Self {
            doc: Vec::new(),
            names,
            ty,
            tag: None,
            comment: None,
            newline: false,
            blank_before: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    /// Braces were on the same line in the source.
    pub one_line: bool,
    /// A blank line separates the last statement from the closing brace.
    pub blank_before_close: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    /// Trailing comment on the statement's last line.
    pub comment: Option<Comment>,
    pub blank_before: bool,
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self {
            kind,
            comment: None,
            blank_before: false,
        }
    }

    pub fn expr(expr: Expr) -> Self {
        Self::new(StmtKind::Expr(expr))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Comment(Comment),
    Decl(GenDecl),
    Labeled { label: String, stmt: Box<Stmt> },
    Expr(Expr),
    Send { chan: Expr, value: Expr },
    IncDec { x: Expr, inc: bool },
    Assign { lhs: Vec<Expr>, op: AssignOp, rhs: Vec<Expr> },
    Go(Expr),
    Defer(Expr),
    Return(Vec<Expr>),
    Branch { kind: BranchKind, label: Option<String> },
    Block(Block),
    If(Box<IfStmt>),
    Switch(Box<SwitchStmt>),
    TypeSwitch(Box<TypeSwitchStmt>),
    Select(Vec<CommClause>),
    For(Box<ForStmt>),
    Range(Box<RangeStmt>),
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Define,
    Assign,
    Compound(BinaryOp),
}

impl AssignOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Define => ":=",
            Self::Assign => "=",
            Self::Compound(op) => match op {
                BinaryOp::Add => "+=",
                BinaryOp::Sub => "-=",
                BinaryOp::Mul => "*=",
                BinaryOp::Div => "/=",
                BinaryOp::Rem => "%=",
                BinaryOp::And => "&=",
                BinaryOp::Or => "|=",
                BinaryOp::Xor => "^=",
                BinaryOp::Shl => "<<=",
                BinaryOp::Shr => ">>=",
                BinaryOp::AndNot => "&^=",
                _ => "=",
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    Break,
    Continue,
    Goto,
    Fallthrough,
}

impl BranchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Break => "break",
            Self::Continue => "continue",
            Self::Goto => "goto",
            Self::Fallthrough => "fallthrough",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub init: Option<Stmt>,
    pub cond: Expr,
    pub then: Block,
    /// Either another `if` or a plain block.
    pub els: Option<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchStmt {
    pub init: Option<Stmt>,
    pub tag: Option<Expr>,
    pub clauses: Vec<CaseClause>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeSwitchStmt {
    pub init: Option<Stmt>,
    /// `x := y.(type)` or `y.(type)`
    pub guard: Stmt,
    pub clauses: Vec<CaseClause>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseClause {
    pub doc: Vec<Comment>,
    /// Empty for `default`.
    pub list: Vec<Expr>,
    pub is_default: bool,
    pub body: Vec<Stmt>,
    pub blank_before: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommClause {
    pub doc: Vec<Comment>,
    /// `None` for `default`.
    pub comm: Option<Stmt>,
    pub body: Vec<Stmt>,
    pub blank_before: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub init: Option<Stmt>,
    pub cond: Option<Expr>,
    pub post: Option<Stmt>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeStmt {
    pub key: Option<Expr>,
    pub value: Option<Expr>,
    pub define: bool,
    pub x: Expr,
    pub body: Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    LogOr,
    LogAnd,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Or,
    Xor,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    And,
    AndNot,
}

impl BinaryOp {
    pub fn from_token(text: &str) -> Option<Self> {
        Some(match text {
            "||" => Self::LogOr,
            "&&" => Self::LogAnd,
            "==" => Self::Eq,
            "!=" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "+" => Self::Add,
            "-" => Self::Sub,
            "|" => Self::Or,
            "^" => Self::Xor,
            "*" => Self::Mul,
            "/" => Self::Div,
            "%" => Self::Rem,
            "<<" => Self::Shl,
            ">>" => Self::Shr,
            "&" => Self::And,
            "&^" => Self::AndNot,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LogOr => "||",
            Self::LogAnd => "&&",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Or => "|",
            Self::Xor => "^",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::And => "&",
            Self::AndNot => "&^",
        }
    }

    pub fn precedence(self) -> u8 {
        match self {
            Self::LogOr => 1,
            Self::LogAnd => 2,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge => 3,
            Self::Add | Self::Sub | Self::Or | Self::Xor => 4,
            Self::Mul
            | Self::Div
            | Self::Rem
            | Self::Shl
            | Self::Shr
            | Self::And
            | Self::AndNot => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
    Xor,
    Addr,
    Recv,
    Tilde,
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Pos => "+",
            Self::Not => "!",
            Self::Xor => "^",
            Self::Addr => "&",
            Self::Recv => "<-",
            Self::Tilde => "~",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

/// Line structure of a bracketed argument list as written in the source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListLayout {
    /// `breaks[i]`: a newline preceded argument `i`.
    pub breaks: Vec<bool>,
    /// The closing bracket sat on its own line.
    pub close_break: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub fun: Box<Expr>,
    pub args: Vec<Expr>,
    /// Last argument is spread with `...`.
    pub ellipsis: bool,
    pub layout: ListLayout,
}

impl Call {
    /// Inserts `arg` at `index`, taking over the line position of the
    /// argument it displaces so one-per-line lists stay one-per-line.
    pub fn insert_arg(&mut self, index: usize, arg: Expr) {
        let index = index.min(self.args.len());
        let breaks = &mut self.layout.breaks;
        breaks.resize(self.args.len(), false);
        let newline = breaks
            .get(index)
            .or_else(|| breaks.last())
            .copied()
            .unwrap_or(false);
        breaks.insert(index, newline);
        self.args.insert(index, arg);
    }

    pub fn push_arg(&mut self, arg: Expr) {
        self.insert_arg(self.args.len(), arg);
    }

    pub fn breaks_before(&self, index: usize) -> bool {
        self.layout.breaks.get(index).copied().unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositeLit {
    /// `None` for elided types inside an outer literal.
    pub ty: Option<Box<Expr>>,
    pub elts: Vec<Element>,
    /// The closing brace sat on its own line.
    pub close_break: bool,
    pub tail: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub doc: Vec<Comment>,
    pub value: Expr,
    pub comment: Option<Comment>,
    /// Started on a new line.
    pub newline: bool,
    pub blank_before: bool,
}

impl Element {
    pub fn new(value: Expr) -> Self {
        Self {
            doc: Vec::new(),
            value,
            comment: None,
            newline: false,
            blank_before: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncLit {
    pub sig: FuncType,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructType {
    pub fields: Vec<Field>,
    pub one_line: bool,
    pub tail: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InterfaceType {
    pub methods: Vec<Field>,
    pub one_line: bool,
    pub tail: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(String),
    /// Literal kept exactly as written, quotes included.
    BasicLit(String),
    CompositeLit(CompositeLit),
    FuncLit(Box<FuncLit>),
    Paren(Box<Expr>),
    /// `newline`: the selector was continued on the next line (`x.\n\tSel`).
    Selector { x: Box<Expr>, sel: String, newline: bool },
    Index { x: Box<Expr>, indices: Vec<Expr> },
    Slice {
        x: Box<Expr>,
        low: Option<Box<Expr>>,
        high: Option<Box<Expr>>,
        max: Option<Box<Expr>>,
        three: bool,
    },
    /// `x.(T)`; `ty` is `None` for `x.(type)`.
    TypeAssert { x: Box<Expr>, ty: Option<Box<Expr>> },
    Call(Call),
    Star(Box<Expr>),
    Unary { op: UnaryOp, x: Box<Expr> },
    /// `newline`: the right operand started on the line after the operator.
    Binary { x: Box<Expr>, op: BinaryOp, y: Box<Expr>, newline: bool },
    KeyValue { key: Box<Expr>, value: Box<Expr> },
    /// `[N]T`, `[]T` (no length) or `[...]T` (length is `Ellipsis(None)`).
    Array { len: Option<Box<Expr>>, elem: Box<Expr> },
    Map { key: Box<Expr>, value: Box<Expr> },
    Chan { dir: ChanDir, elem: Box<Expr> },
    Func(FuncType),
    Struct(StructType),
    Interface(InterfaceType),
    Ellipsis(Option<Box<Expr>>),
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Self::Ident(name.into())
    }

    pub fn selector(x: Expr, sel: impl Into<String>) -> Self {
        Self::Selector {
            x: Box::new(x),
            sel: sel.into(),
            newline: false,
        }
    }

    /// `pkg.Name`
    pub fn qualified(package: &str, name: &str) -> Self {
        Self::selector(Self::ident(package), name)
    }

    pub fn call(fun: Expr, args: Vec<Expr>) -> Self {
        Self::Call(Call {
            fun: Box::new(fun),
            args,
            ellipsis: false,
            layout: ListLayout::default(),
        })
    }

    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Self::Ident(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_call(&self) -> Option<&Call> {
        match self {
            Self::Call(call) => Some(call),
            _ => None,
        }
    }

    /// `pkg.Name` split into its parts.
    pub fn as_qualified(&self) -> Option<(&str, &str)> {
        match self {
            Self::Selector { x, sel, .. } => x.as_ident().map(|pkg| (pkg, sel.as_str())),
            _ => None,
        }
    }
}
