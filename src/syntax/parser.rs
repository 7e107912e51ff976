//! Recursive-descent parser producing an [`ast::File`](super::ast::File).
//!
//! Comments are attached at list boundaries (declarations, specs, fields,
//! statements, literal elements): a comment on the same line as the previous
//! element becomes its trailing comment, everything else leads the next
//! element. Comments buried inside an expression are hoisted to the next
//! boundary.

use std::mem;

use super::ParseError;
use super::ast::*;
use super::lexer::{Token, TokenKind, tokenize};

type PResult<T> = Result<T, ParseError>;

/// Parses one Go source file.
pub fn parse_file(src: &str) -> Result<File, ParseError> {
    Parser::new(src)?.file()
}

/// Comments found in front of the next list element.
struct Leading {
    /// Same-line comment belonging to the previous element.
    trailing: Option<Comment>,
    comments: Vec<Comment>,
    /// A blank line separates the next token from what precedes it.
    blank_before: bool,
}

impl Leading {
    fn first_blank(&self) -> bool {
        self.comments
            .first()
            .map_or(self.blank_before, |c| c.blank_before)
    }

    /// Hands the trailing comment to the previous element, or keeps it as a
    /// leading comment when there is none.
    fn attach(&mut self, slot: Option<&mut Option<Comment>>) {
        if let Some(trailing) = self.trailing.take() {
            match slot {
                Some(slot) => *slot = Some(trailing),
                None => self.comments.insert(0, trailing),
            }
        }
    }
}

enum Simple {
    Stmt(Stmt),
    Range(RangeHeader),
}

struct RangeHeader {
    key: Option<Expr>,
    value: Option<Expr>,
    define: bool,
    x: Expr,
}

/// A parsed `case`/`default` clause before it is given its concrete type.
struct Clause<H> {
    doc: Vec<Comment>,
    blank_before: bool,
    head: Option<H>,
    body: Vec<Stmt>,
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    /// `comments[i]` holds the comments in front of `tokens[i]`.
    comments: Vec<Vec<Token<'a>>>,
    pos: usize,
    prev_end: u32,
    stray: Vec<Comment>,
    /// Below zero inside control clause headers, where `{` opens the body.
    expr_lev: i32,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> PResult<Self> {
        let mut tokens = Vec::new();
        let mut comments = Vec::new();
        let mut pending = Vec::new();
        for token in tokenize(src)? {
            if token.kind == TokenKind::Comment {
                pending.push(token);
            } else {
                tokens.push(token);
                comments.push(mem::take(&mut pending));
            }
        }
        Ok(Self {
            tokens,
            comments,
            pos: 0,
            prev_end: 0,
            stray: Vec::new(),
            expr_lev: 0,
        })
    }

    fn tok(&self) -> Token<'a> {
        self.tokens[self.pos]
    }

    fn peek(&self, n: usize) -> Token<'a> {
        self.tokens[(self.pos + n).min(self.tokens.len() - 1)]
    }

    fn next(&mut self) -> Token<'a> {
        let token = self.tokens[self.pos];
        for comment in mem::take(&mut self.comments[self.pos]) {
            self.stray.push(Comment::new(comment.text));
        }
        self.prev_end = token.end_line;
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn at_op(&self, op: &str) -> bool {
        self.tok().is_op(op)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.tok().is_keyword(keyword)
    }

    fn at_semi(&self) -> bool {
        self.tok().kind == TokenKind::Semicolon
    }

    fn at_eof(&self) -> bool {
        self.tok().kind == TokenKind::Eof
    }

    fn at_clause_end(&self) -> bool {
        self.at_keyword("case") || self.at_keyword("default")
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let token = self.tok();
        ParseError {
            line: token.line,
            column: token.col,
            message: message.into(),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.tok();
        let found = match token.kind {
            TokenKind::Eof => "EOF".to_string(),
            TokenKind::Semicolon if token.text == "\n" => "newline".to_string(),
            _ => format!("{:?}", token.text),
        };
        self.error(format!("expected {expected}, found {found}"))
    }

    fn expect_op(&mut self, op: &str) -> PResult<Token<'a>> {
        if self.at_op(op) {
            Ok(self.next())
        } else {
            Err(self.unexpected(&format!("'{op}'")))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> PResult<()> {
        if self.at_keyword(keyword) {
            self.next();
            Ok(())
        } else {
            Err(self.unexpected(keyword))
        }
    }

    /// Statement terminator; optional right before `closing` or at EOF.
    fn expect_semi(&mut self, closing: &str) -> PResult<()> {
        if self.at_semi() {
            self.next();
            return Ok(());
        }
        if (!closing.is_empty() && self.at_op(closing)) || self.at_eof() {
            return Ok(());
        }
        Err(self.unexpected("';' or newline"))
    }

    fn ident(&mut self) -> PResult<String> {
        let token = self.tok();
        if token.kind != TokenKind::Ident {
            return Err(self.unexpected("identifier"));
        }
        self.next();
        Ok(token.text.to_string())
    }

    fn ident_list(&mut self) -> PResult<Vec<String>> {
        let mut names = vec![self.ident()?];
        while self.at_op(",") {
            self.next();
            names.push(self.ident()?);
        }
        Ok(names)
    }

    fn leading(&mut self) -> Leading {
        let raw = mem::take(&mut self.comments[self.pos]);
        let mut comments = Vec::new();
        let mut trailing = None;
        let mut last = self.prev_end;
        for token in raw {
            if trailing.is_none()
                && comments.is_empty()
                && self.prev_end > 0
                && token.line == self.prev_end
            {
                trailing = Some(Comment::new(token.text));
            } else {
                comments.push(Comment {
                    text: token.text.to_string(),
                    blank_before: token.line > last + 1,
                });
            }
            last = token.end_line;
        }
        let blank_before = self.tok().line > last + 1;
        if !self.stray.is_empty() {
            let mut hoisted = mem::take(&mut self.stray);
            hoisted.append(&mut comments);
            comments = hoisted;
        }
        Leading {
            trailing,
            comments,
            blank_before,
        }
    }

    // ---- declarations ----

    fn file(mut self) -> PResult<File> {
        let lead = self.leading();
        let blank_before_package = !lead.comments.is_empty() && lead.blank_before;
        let doc = lead.comments;
        self.expect_keyword("package")?;
        let package = self.ident()?;
        self.expect_semi("")?;

        let mut decls: Vec<Decl> = Vec::new();
        loop {
            let mut lead = self.leading();
            lead.attach(decls.last_mut().and_then(|d| match d.kind {
                DeclKind::Comments(_) => None,
                _ => Some(&mut d.comment),
            }));
            if self.at_eof() {
                return Ok(File {
                    doc,
                    blank_before_package,
                    package,
                    decls,
                    tail: lead.comments,
                });
            }
            let (free, doc_comments, blank_before) = split_doc(lead);
            for group in free {
                let blank_before = group.first().is_some_and(|c| c.blank_before);
                decls.push(Decl {
                    doc: Vec::new(),
                    kind: DeclKind::Comments(group),
                    comment: None,
                    blank_before,
                });
            }
            let kind = self.decl()?;
            decls.push(Decl {
                doc: doc_comments,
                kind,
                comment: None,
                blank_before,
            });
            self.expect_semi("")?;
        }
    }

    fn decl(&mut self) -> PResult<DeclKind> {
        let token = self.tok();
        if token.kind != TokenKind::Keyword {
            return Err(self.unexpected("declaration"));
        }
        match token.text {
            "import" => Ok(DeclKind::Import(self.import_decl()?)),
            "const" | "var" | "type" => Ok(DeclKind::Gen(self.gen_decl()?)),
            "func" => Ok(DeclKind::Func(self.func_decl()?)),
            _ => Err(self.unexpected("declaration")),
        }
    }

    fn import_decl(&mut self) -> PResult<ImportDecl> {
        self.next();
        if !self.at_op("(") {
            return Ok(ImportDecl {
                specs: vec![self.import_spec()?],
                grouped: false,
                tail: Vec::new(),
            });
        }
        self.next();
        let mut specs: Vec<ImportSpec> = Vec::new();
        loop {
            let mut lead = self.leading();
            lead.attach(specs.last_mut().map(|s| &mut s.comment));
            if self.at_op(")") {
                self.next();
                return Ok(ImportDecl {
                    specs,
                    grouped: true,
                    tail: lead.comments,
                });
            }
            let mut spec = self.import_spec()?;
            spec.blank_before = !specs.is_empty() && lead.first_blank();
            spec.doc = lead.comments;
            specs.push(spec);
            self.expect_semi(")")?;
        }
    }

    fn import_spec(&mut self) -> PResult<ImportSpec> {
        let token = self.tok();
        let name = if token.kind == TokenKind::Ident {
            self.next();
            Some(token.text)
        } else if token.is_op(".") {
            self.next();
            Some(".")
        } else {
            None
        };
        let path = self.tok();
        if path.kind != TokenKind::String || path.text.len() < 2 {
            return Err(self.unexpected("import path"));
        }
        self.next();
        Ok(ImportSpec::new(name, &path.text[1..path.text.len() - 1]))
    }

    fn gen_decl(&mut self) -> PResult<GenDecl> {
        let keyword = match self.next().text {
            "const" => GenKeyword::Const,
            "var" => GenKeyword::Var,
            _ => GenKeyword::Type,
        };
        if !self.at_op("(") {
            let kind = self.spec(keyword)?;
            return Ok(GenDecl {
                keyword,
                specs: vec![Spec {
                    doc: Vec::new(),
                    kind,
                    comment: None,
                    blank_before: false,
                }],
                grouped: false,
                tail: Vec::new(),
            });
        }
        self.next();
        let mut specs: Vec<Spec> = Vec::new();
        loop {
            let mut lead = self.leading();
            lead.attach(specs.last_mut().map(|s| &mut s.comment));
            if self.at_op(")") {
                self.next();
                return Ok(GenDecl {
                    keyword,
                    specs,
                    grouped: true,
                    tail: lead.comments,
                });
            }
            let blank_before = !specs.is_empty() && lead.first_blank();
            let kind = self.spec(keyword)?;
            specs.push(Spec {
                doc: lead.comments,
                kind,
                comment: None,
                blank_before,
            });
            self.expect_semi(")")?;
        }
    }

    fn spec(&mut self, keyword: GenKeyword) -> PResult<SpecKind> {
        match keyword {
            GenKeyword::Type => Ok(SpecKind::Type(self.type_spec()?)),
            GenKeyword::Const | GenKeyword::Var => Ok(SpecKind::Value(self.value_spec()?)),
        }
    }

    fn value_spec(&mut self) -> PResult<ValueSpec> {
        let names = self.ident_list()?;
        let ty = if !self.at_op("=") && !self.at_semi() && !self.at_op(")") && !self.at_eof() {
            Some(self.parse_type()?)
        } else {
            None
        };
        let values = if self.at_op("=") {
            self.next();
            self.expr_list()?
        } else {
            Vec::new()
        };
        Ok(ValueSpec { names, ty, values })
    }

    fn type_spec(&mut self) -> PResult<TypeSpec> {
        let name = self.ident()?;
        let type_params = if self.at_op("[") && self.at_type_param_list() {
            self.type_params()?
        } else {
            Vec::new()
        };
        let alias = self.at_op("=");
        if alias {
            self.next();
        }
        let ty = self.parse_type()?;
        Ok(TypeSpec {
            name,
            type_params,
            alias,
            ty,
        })
    }

    /// `type T[P any]` as opposed to the array type `type T [N]int`.
    fn at_type_param_list(&self) -> bool {
        let first = self.peek(1);
        let second = self.peek(2);
        first.kind == TokenKind::Ident
            && match second.kind {
                TokenKind::Ident => true,
                TokenKind::Keyword => {
                    matches!(second.text, "interface" | "func" | "map" | "chan" | "struct")
                }
                TokenKind::Op => matches!(second.text, "," | "[" | "~"),
                _ => false,
            }
    }

    fn type_params(&mut self) -> PResult<Vec<Field>> {
        self.expect_op("[")?;
        let mut fields = Vec::new();
        let mut names = Vec::new();
        while !self.at_op("]") {
            names.push(self.ident()?);
            if self.at_op(",") {
                self.next();
                continue;
            }
            let constraint = self.constraint()?;
            fields.push(Field::new(mem::take(&mut names), constraint));
            if !self.at_op(",") {
                break;
            }
            self.next();
        }
        if !names.is_empty() {
            return Err(self.error("type parameter is missing a constraint"));
        }
        self.expect_op("]")?;
        Ok(fields)
    }

    fn constraint(&mut self) -> PResult<Expr> {
        let mut x = self.constraint_term()?;
        while self.at_op("|") {
            self.next();
            let y = self.constraint_term()?;
            x = Expr::Binary {
                x: Box::new(x),
                op: BinaryOp::Or,
                y: Box::new(y),
                newline: false,
            };
        }
        Ok(x)
    }

    fn constraint_term(&mut self) -> PResult<Expr> {
        if self.at_op("~") {
            self.next();
            return Ok(Expr::Unary {
                op: UnaryOp::Tilde,
                x: Box::new(self.parse_type()?),
            });
        }
        self.parse_type()
    }

    fn func_decl(&mut self) -> PResult<FuncDecl> {
        self.next();
        let recv = if self.at_op("(") {
            Some(self.params()?.0)
        } else {
            None
        };
        let name = self.ident()?;
        let type_params = if self.at_op("[") {
            self.type_params()?
        } else {
            Vec::new()
        };
        let sig = self.signature()?;
        let body = if self.at_op("{") {
            Some(self.block()?)
        } else {
            None
        };
        Ok(FuncDecl {
            recv,
            name,
            type_params,
            sig,
            body,
        })
    }

    fn signature(&mut self) -> PResult<FuncType> {
        let (params, params_close_break) = self.params()?;
        let results = if self.at_op("(") {
            self.params()?.0
        } else if self.at_type_start() {
            vec![Field::new(Vec::new(), self.parse_type()?)]
        } else {
            Vec::new()
        };
        Ok(FuncType {
            params,
            results,
            params_close_break,
        })
    }

    fn params(&mut self) -> PResult<(Vec<Field>, bool)> {
        let open = self.expect_op("(")?;
        let mut items = Vec::new();
        let mut prev_line = open.line;
        while !self.at_op(")") {
            let newline = self.tok().line > prev_line;
            let (name, ty) = self.param_item()?;
            items.push((name, ty, newline));
            prev_line = self.prev_end;
            if !self.at_op(",") {
                break;
            }
            self.next();
        }
        let close_break = !items.is_empty() && self.tok().line > prev_line;
        self.expect_op(")")?;
        Ok((self.fields_from(items)?, close_break))
    }

    fn param_item(&mut self) -> PResult<(Option<String>, Option<Expr>)> {
        let token = self.tok();
        if token.kind == TokenKind::Ident {
            let next = self.peek(1);
            if next.is_op(".") {
                return Ok((None, Some(self.parse_type()?)));
            }
            if next.is_op("[") {
                let (name, ty) = self.array_field_or_instance()?;
                return Ok((name, Some(ty)));
            }
            self.next();
            let name = token.text.to_string();
            if self.at_op(",") || self.at_op(")") {
                return Ok((Some(name), None));
            }
            return Ok((Some(name), Some(self.variadic_or_type()?)));
        }
        Ok((None, Some(self.variadic_or_type()?)))
    }

    fn variadic_or_type(&mut self) -> PResult<Expr> {
        if self.at_op("...") {
            self.next();
            return Ok(Expr::Ellipsis(Some(Box::new(self.parse_type()?))));
        }
        self.parse_type()
    }

    /// Resolves `name [` as either a named array/slice field or a generic
    /// instantiation used as an anonymous type.
    fn array_field_or_instance(&mut self) -> PResult<(Option<String>, Expr)> {
        let name = self.ident()?;
        self.expect_op("[")?;
        if self.at_op("]") {
            self.next();
            let elem = self.parse_type()?;
            let ty = Expr::Array {
                len: None,
                elem: Box::new(elem),
            };
            return Ok((Some(name), ty));
        }
        if self.at_op("...") {
            self.next();
            self.expect_op("]")?;
            let elem = self.parse_type()?;
            let ty = Expr::Array {
                len: Some(Box::new(Expr::Ellipsis(None))),
                elem: Box::new(elem),
            };
            return Ok((Some(name), ty));
        }
        self.expr_lev += 1;
        let mut args = vec![self.expr()?];
        while self.at_op(",") {
            self.next();
            if self.at_op("]") {
                break;
            }
            args.push(self.expr()?);
        }
        self.expr_lev -= 1;
        self.expect_op("]")?;
        if args.len() == 1 && self.at_type_start() {
            let elem = self.parse_type()?;
            if let Some(len) = args.pop() {
                let ty = Expr::Array {
                    len: Some(Box::new(len)),
                    elem: Box::new(elem),
                };
                return Ok((Some(name), ty));
            }
        }
        let ty = Expr::Index {
            x: Box::new(Expr::Ident(name)),
            indices: args,
        };
        Ok((None, ty))
    }

    fn fields_from(&self, items: Vec<(Option<String>, Option<Expr>, bool)>) -> PResult<Vec<Field>> {
        let named = items.iter().any(|(name, ty, _)| name.is_some() && ty.is_some());
        if !named {
            return Ok(items
                .into_iter()
                .filter_map(|(name, ty, newline)| {
                    let ty = ty.or_else(|| name.map(Expr::Ident))?;
                    let mut field = Field::new(Vec::new(), ty);
                    field.newline = newline;
                    Some(field)
                })
                .collect());
        }
        let mut fields = Vec::new();
        let mut names = Vec::new();
        let mut newline = None;
        for (name, ty, line_break) in items {
            let starts_on_new_line = *newline.get_or_insert(line_break);
            names.extend(name);
            if let Some(ty) = ty {
                let mut field = Field::new(mem::take(&mut names), ty);
                field.newline = starts_on_new_line;
                fields.push(field);
                newline = None;
            }
        }
        if !names.is_empty() {
            return Err(self.error("mixed named and unnamed parameters"));
        }
        Ok(fields)
    }

    // ---- types ----

    fn at_type_start(&self) -> bool {
        let token = self.tok();
        match token.kind {
            TokenKind::Ident => true,
            TokenKind::Keyword => {
                matches!(token.text, "func" | "map" | "chan" | "struct" | "interface")
            }
            TokenKind::Op => matches!(token.text, "*" | "[" | "(" | "<-"),
            _ => false,
        }
    }

    fn parse_type(&mut self) -> PResult<Expr> {
        let token = self.tok();
        match (token.kind, token.text) {
            (TokenKind::Ident, _) => self.type_name(),
            (TokenKind::Op, "*") => {
                self.next();
                Ok(Expr::Star(Box::new(self.parse_type()?)))
            }
            (TokenKind::Op, "[") => self.array_type(),
            (TokenKind::Op, "(") => {
                self.next();
                let inner = self.parse_type()?;
                self.expect_op(")")?;
                Ok(Expr::Paren(Box::new(inner)))
            }
            (TokenKind::Op, "<-") => {
                self.next();
                self.expect_keyword("chan")?;
                let elem = self.parse_type()?;
                Ok(Expr::Chan {
                    dir: ChanDir::Recv,
                    elem: Box::new(elem),
                })
            }
            (TokenKind::Keyword, "func") => {
                self.next();
                Ok(Expr::Func(self.signature()?))
            }
            (TokenKind::Keyword, "map") => self.map_type(),
            (TokenKind::Keyword, "chan") => self.chan_type(),
            (TokenKind::Keyword, "struct") => self.struct_type(),
            (TokenKind::Keyword, "interface") => self.interface_type(),
            _ => Err(self.unexpected("type")),
        }
    }

    fn type_name(&mut self) -> PResult<Expr> {
        let mut x = Expr::Ident(self.ident()?);
        if self.at_op(".") {
            self.next();
            x = Expr::selector(x, self.ident()?);
        }
        if self.at_op("[") && !self.peek(1).is_op("]") {
            self.next();
            self.expr_lev += 1;
            let mut indices = vec![self.parse_type()?];
            while self.at_op(",") {
                self.next();
                if self.at_op("]") {
                    break;
                }
                indices.push(self.parse_type()?);
            }
            self.expr_lev -= 1;
            self.expect_op("]")?;
            x = Expr::Index {
                x: Box::new(x),
                indices,
            };
        }
        Ok(x)
    }

    fn array_type(&mut self) -> PResult<Expr> {
        self.expect_op("[")?;
        let len = if self.at_op("]") {
            None
        } else if self.at_op("...") {
            self.next();
            Some(Box::new(Expr::Ellipsis(None)))
        } else {
            self.expr_lev += 1;
            let len = self.expr()?;
            self.expr_lev -= 1;
            Some(Box::new(len))
        };
        self.expect_op("]")?;
        let elem = self.parse_type()?;
        Ok(Expr::Array {
            len,
            elem: Box::new(elem),
        })
    }

    fn map_type(&mut self) -> PResult<Expr> {
        self.next();
        self.expect_op("[")?;
        let key = self.parse_type()?;
        self.expect_op("]")?;
        let value = self.parse_type()?;
        Ok(Expr::Map {
            key: Box::new(key),
            value: Box::new(value),
        })
    }

    fn chan_type(&mut self) -> PResult<Expr> {
        self.next();
        let dir = if self.at_op("<-") {
            self.next();
            ChanDir::Send
        } else {
            ChanDir::Both
        };
        let elem = self.parse_type()?;
        Ok(Expr::Chan {
            dir,
            elem: Box::new(elem),
        })
    }

    fn struct_type(&mut self) -> PResult<Expr> {
        self.next();
        let open = self.expect_op("{")?;
        let mut fields: Vec<Field> = Vec::new();
        loop {
            let mut lead = self.leading();
            lead.attach(fields.last_mut().map(|f| &mut f.comment));
            if self.at_op("}") {
                let close = self.next();
                return Ok(Expr::Struct(StructType {
                    fields,
                    one_line: open.line == close.line,
                    tail: lead.comments,
                }));
            }
            let blank_before = !fields.is_empty() && lead.first_blank();
            let mut field = self.struct_field()?;
            field.doc = lead.comments;
            field.blank_before = blank_before;
            field.newline = true;
            fields.push(field);
            self.expect_semi("}")?;
        }
    }

    fn struct_field(&mut self) -> PResult<Field> {
        let token = self.tok();
        let mut field = if token.kind == TokenKind::Ident {
            let next = self.peek(1);
            if next.is_op(".") {
                Field::new(Vec::new(), self.parse_type()?)
            } else if next.is_op("[") {
                match self.array_field_or_instance()? {
                    (Some(name), ty) => Field::new(vec![name], ty),
                    (None, ty) => Field::new(Vec::new(), ty),
                }
            } else if next.kind == TokenKind::Semicolon
                || next.kind == TokenKind::String
                || next.is_op("}")
            {
                self.next();
                Field::new(Vec::new(), Expr::Ident(token.text.to_string()))
            } else {
                let names = self.ident_list()?;
                Field::new(names, self.parse_type()?)
            }
        } else {
            Field::new(Vec::new(), self.parse_type()?)
        };
        if self.tok().kind == TokenKind::String {
            field.tag = Some(self.next().text.to_string());
        }
        Ok(field)
    }

    fn interface_type(&mut self) -> PResult<Expr> {
        self.next();
        let open = self.expect_op("{")?;
        let mut methods: Vec<Field> = Vec::new();
        loop {
            let mut lead = self.leading();
            lead.attach(methods.last_mut().map(|f| &mut f.comment));
            if self.at_op("}") {
                let close = self.next();
                return Ok(Expr::Interface(InterfaceType {
                    methods,
                    one_line: open.line == close.line,
                    tail: lead.comments,
                }));
            }
            let blank_before = !methods.is_empty() && lead.first_blank();
            let token = self.tok();
            let mut field = if token.kind == TokenKind::Ident && self.peek(1).is_op("(") {
                self.next();
                let sig = self.signature()?;
                Field::new(vec![token.text.to_string()], Expr::Func(sig))
            } else {
                Field::new(Vec::new(), self.constraint()?)
            };
            field.doc = lead.comments;
            field.blank_before = blank_before;
            field.newline = true;
            methods.push(field);
            self.expect_semi("}")?;
        }
    }

    // ---- statements ----

    fn block(&mut self) -> PResult<Block> {
        let open = self.expect_op("{")?;
        let (stmts, rest) = self.stmt_list(false)?;
        let close = self.expect_op("}")?;
        Ok(Block {
            blank_before_close: rest.blank_before && !stmts.is_empty(),
            stmts,
            one_line: open.line == close.line,
        })
    }

    /// Statements up to `}` or, for clause bodies, the next `case`/`default`.
    /// Comments in front of a following clause are handed back to the caller.
    fn stmt_list(&mut self, clause: bool) -> PResult<(Vec<Stmt>, Leading)> {
        let mut stmts: Vec<Stmt> = Vec::new();
        loop {
            let mut lead = self.leading();
            lead.attach(stmts.last_mut().map(|s| &mut s.comment));
            let at_end = self.at_op("}") || self.at_eof();
            if clause && (at_end || self.at_clause_end()) {
                return Ok((stmts, lead));
            }
            let blank_before = lead.blank_before;
            for comment in lead.comments {
                let blank = comment.blank_before;
                let mut stmt = Stmt::new(StmtKind::Comment(comment));
                stmt.blank_before = blank;
                stmts.push(stmt);
            }
            if at_end {
                let rest = Leading {
                    trailing: None,
                    comments: Vec::new(),
                    blank_before,
                };
                return Ok((stmts, rest));
            }
            let mut stmt = self.stmt()?;
            stmt.blank_before = blank_before;
            if !self.at_op("}") && !(clause && self.at_clause_end()) {
                self.expect_semi("}")?;
            }
            if !matches!(stmt.kind, StmtKind::Empty) {
                stmts.push(stmt);
            }
        }
    }

    fn stmt(&mut self) -> PResult<Stmt> {
        let token = self.tok();
        let kind = match (token.kind, token.text) {
            (TokenKind::Keyword, "var" | "const" | "type") => StmtKind::Decl(self.gen_decl()?),
            (TokenKind::Keyword, "go") => {
                self.next();
                StmtKind::Go(self.expr()?)
            }
            (TokenKind::Keyword, "defer") => {
                self.next();
                StmtKind::Defer(self.expr()?)
            }
            (TokenKind::Keyword, "return") => {
                self.next();
                let results = if self.at_semi() || self.at_op("}") || self.at_clause_end() {
                    Vec::new()
                } else {
                    self.expr_list()?
                };
                StmtKind::Return(results)
            }
            (TokenKind::Keyword, "break" | "continue" | "goto" | "fallthrough") => {
                self.next();
                let kind = match token.text {
                    "break" => BranchKind::Break,
                    "continue" => BranchKind::Continue,
                    "goto" => BranchKind::Goto,
                    _ => BranchKind::Fallthrough,
                };
                let label = if self.tok().kind == TokenKind::Ident {
                    Some(self.next().text.to_string())
                } else {
                    None
                };
                StmtKind::Branch { kind, label }
            }
            (TokenKind::Op, "{") => StmtKind::Block(self.block()?),
            (TokenKind::Keyword, "if") => self.if_stmt()?,
            (TokenKind::Keyword, "switch") => self.switch_stmt()?,
            (TokenKind::Keyword, "select") => self.select_stmt()?,
            (TokenKind::Keyword, "for") => self.for_stmt()?,
            (TokenKind::Semicolon, _) => StmtKind::Empty,
            _ => return self.simple_stmt_only(true),
        };
        Ok(Stmt::new(kind))
    }

    fn simple_stmt_only(&mut self, label_ok: bool) -> PResult<Stmt> {
        match self.simple_stmt(label_ok, false)? {
            Simple::Stmt(stmt) => Ok(stmt),
            Simple::Range(_) => Err(self.error("unexpected range clause")),
        }
    }

    fn simple_stmt(&mut self, label_ok: bool, range_ok: bool) -> PResult<Simple> {
        if range_ok && self.at_keyword("range") {
            self.next();
            let x = self.expr()?;
            return Ok(Simple::Range(RangeHeader {
                key: None,
                value: None,
                define: false,
                x,
            }));
        }
        let mut lhs = self.expr_list()?;
        let token = self.tok();
        if token.kind == TokenKind::Op {
            if let Some(op) = assign_op(token.text) {
                self.next();
                if range_ok
                    && self.at_keyword("range")
                    && matches!(op, AssignOp::Define | AssignOp::Assign)
                {
                    self.next();
                    let x = self.expr()?;
                    let mut vars = lhs.into_iter();
                    return Ok(Simple::Range(RangeHeader {
                        key: vars.next(),
                        value: vars.next(),
                        define: op == AssignOp::Define,
                        x,
                    }));
                }
                let rhs = self.expr_list()?;
                return Ok(Simple::Stmt(Stmt::new(StmtKind::Assign { lhs, op, rhs })));
            }
            match token.text {
                ":" if label_ok && lhs.len() == 1 && matches!(lhs[0], Expr::Ident(_)) => {
                    let colon = self.next();
                    let label = match lhs.pop() {
                        Some(Expr::Ident(label)) => label,
                        _ => return Err(self.error("invalid label")),
                    };
                    let stmt = if self.at_op("}") {
                        Stmt::new(StmtKind::Empty)
                    } else {
                        let blank_before = self.tok().line > colon.line + 1;
                        let mut stmt = self.stmt()?;
                        stmt.blank_before = blank_before;
                        stmt
                    };
                    return Ok(Simple::Stmt(Stmt::new(StmtKind::Labeled {
                        label,
                        stmt: Box::new(stmt),
                    })));
                }
                "<-" | "++" | "--" if lhs.len() == 1 => {
                    self.next();
                    let Some(x) = lhs.pop() else {
                        return Err(self.error("missing operand"));
                    };
                    let kind = match token.text {
                        "<-" => StmtKind::Send {
                            chan: x,
                            value: self.expr()?,
                        },
                        op => StmtKind::IncDec { x, inc: op == "++" },
                    };
                    return Ok(Simple::Stmt(Stmt::new(kind)));
                }
                _ => {}
            }
        }
        if lhs.len() != 1 {
            return Err(self.unexpected("':=', '=' or assignment operator"));
        }
        match lhs.pop() {
            Some(x) => Ok(Simple::Stmt(Stmt::expr(x))),
            None => Err(self.unexpected("expression")),
        }
    }

    fn if_stmt(&mut self) -> PResult<StmtKind> {
        self.next();
        let outer = mem::replace(&mut self.expr_lev, -1);
        let header = self.if_header();
        self.expr_lev = outer;
        let (init, cond) = header?;
        let then = self.block()?;
        let els = if self.at_keyword("else") {
            self.next();
            if self.at_keyword("if") {
                Some(Stmt::new(self.if_stmt()?))
            } else if self.at_op("{") {
                Some(Stmt::new(StmtKind::Block(self.block()?)))
            } else {
                return Err(self.unexpected("if statement or block"));
            }
        } else {
            None
        };
        Ok(StmtKind::If(Box::new(IfStmt {
            init,
            cond,
            then,
            els,
        })))
    }

    fn if_header(&mut self) -> PResult<(Option<Stmt>, Expr)> {
        if self.at_op("{") {
            return Err(self.error("missing condition in if statement"));
        }
        let init = if self.at_semi() {
            None
        } else {
            Some(self.simple_stmt_only(false)?)
        };
        if self.at_semi() {
            self.next();
            let cond = self.expr()?;
            return Ok((init, cond));
        }
        match init {
            Some(Stmt {
                kind: StmtKind::Expr(cond),
                ..
            }) => Ok((None, cond)),
            _ => Err(self.error("expected condition in if statement")),
        }
    }

    fn switch_stmt(&mut self) -> PResult<StmtKind> {
        self.next();
        let outer = mem::replace(&mut self.expr_lev, -1);
        let header = self.switch_header();
        self.expr_lev = outer;
        let (init, tag) = header?;
        let clauses: Vec<CaseClause> = self
            .clauses(|p| p.expr_list())?
            .into_iter()
            .map(|clause| CaseClause {
                doc: clause.doc,
                is_default: clause.head.is_none(),
                list: clause.head.unwrap_or_default(),
                body: clause.body,
                blank_before: clause.blank_before,
            })
            .collect();
        match tag {
            Some(guard) if is_type_guard(&guard) => {
                Ok(StmtKind::TypeSwitch(Box::new(TypeSwitchStmt {
                    init,
                    guard,
                    clauses,
                })))
            }
            Some(Stmt {
                kind: StmtKind::Expr(tag),
                ..
            }) => Ok(StmtKind::Switch(Box::new(SwitchStmt {
                init,
                tag: Some(tag),
                clauses,
            }))),
            None => Ok(StmtKind::Switch(Box::new(SwitchStmt {
                init,
                tag: None,
                clauses,
            }))),
            Some(_) => Err(self.error(
                "switch expression must be an expression or type switch guard",
            )),
        }
    }

    fn switch_header(&mut self) -> PResult<(Option<Stmt>, Option<Stmt>)> {
        let mut init = None;
        let mut tag = None;
        if !self.at_op("{") {
            if !self.at_semi() {
                tag = Some(self.simple_stmt_only(false)?);
            }
            if self.at_semi() {
                self.next();
                init = tag.take();
                if !self.at_op("{") {
                    tag = Some(self.simple_stmt_only(false)?);
                }
            }
        }
        Ok((init, tag))
    }

    fn select_stmt(&mut self) -> PResult<StmtKind> {
        self.next();
        let clauses = self
            .clauses(|p| p.simple_stmt_only(false))?
            .into_iter()
            .map(|clause| CommClause {
                doc: clause.doc,
                comm: clause.head,
                body: clause.body,
                blank_before: clause.blank_before,
            })
            .collect();
        Ok(StmtKind::Select(clauses))
    }

    /// `{ case ...: ... default: ... }`; `head` parses what follows `case`.
    fn clauses<H>(
        &mut self,
        mut head: impl FnMut(&mut Self) -> PResult<H>,
    ) -> PResult<Vec<Clause<H>>> {
        self.expect_op("{")?;
        let mut clauses: Vec<Clause<H>> = Vec::new();
        let mut lead = self.leading();
        lead.attach(None);
        while !self.at_op("}") {
            let is_default = self.at_keyword("default");
            if !is_default && !self.at_keyword("case") {
                return Err(self.unexpected("case or default"));
            }
            self.next();
            let head = if is_default { None } else { Some(head(self)?) };
            self.expect_op(":")?;
            let (body, next) = self.stmt_list(true)?;
            let blank_before = !clauses.is_empty() && lead.first_blank();
            clauses.push(Clause {
                blank_before,
                doc: mem::take(&mut lead.comments),
                head,
                body,
            });
            lead = next;
        }
        match clauses.last_mut() {
            Some(last) => last.body.extend(lead.comments.into_iter().map(|c| {
                let blank = c.blank_before;
                let mut stmt = Stmt::new(StmtKind::Comment(c));
                stmt.blank_before = blank;
                stmt
            })),
            None => self.stray.extend(lead.comments),
        }
        self.expect_op("}")?;
        Ok(clauses)
    }

    fn for_stmt(&mut self) -> PResult<StmtKind> {
        self.next();
        let outer = mem::replace(&mut self.expr_lev, -1);
        let header = self.for_header();
        self.expr_lev = outer;
        let header = header?;
        let body = self.block()?;
        Ok(match header {
            ForHeader::Range(range) => StmtKind::Range(Box::new(RangeStmt {
                key: range.key,
                value: range.value,
                define: range.define,
                x: range.x,
                body,
            })),
            ForHeader::Loop { init, cond, post } => StmtKind::For(Box::new(ForStmt {
                init,
                cond,
                post,
                body,
            })),
        })
    }

    fn for_header(&mut self) -> PResult<ForHeader> {
        let mut init = None;
        let mut cond = None;
        let mut post = None;
        if self.at_op("{") {
            return Ok(ForHeader::Loop { init, cond, post });
        }
        let mut first = None;
        if !self.at_semi() {
            match self.simple_stmt(false, true)? {
                Simple::Range(range) => return Ok(ForHeader::Range(range)),
                Simple::Stmt(stmt) => first = Some(stmt),
            }
        }
        if self.at_semi() {
            self.next();
            init = first;
            if !self.at_semi() {
                cond = Some(self.expr()?);
            }
            if !self.at_semi() {
                return Err(self.unexpected("';'"));
            }
            self.next();
            if !self.at_op("{") {
                post = Some(self.simple_stmt_only(false)?);
            }
        } else {
            match first {
                Some(Stmt {
                    kind: StmtKind::Expr(x),
                    ..
                }) => cond = Some(x),
                Some(_) => return Err(self.error("expected for loop condition")),
                None => {}
            }
        }
        Ok(ForHeader::Loop { init, cond, post })
    }

    // ---- expressions ----

    fn expr_list(&mut self) -> PResult<Vec<Expr>> {
        let mut list = vec![self.expr()?];
        while self.at_op(",") {
            self.next();
            list.push(self.expr()?);
        }
        Ok(list)
    }

    fn expr(&mut self) -> PResult<Expr> {
        self.binary_expr(1)
    }

    fn binary_expr(&mut self, prec1: u8) -> PResult<Expr> {
        let mut x = self.unary_expr()?;
        loop {
            let token = self.tok();
            if token.kind != TokenKind::Op {
                break;
            }
            let Some(op) = BinaryOp::from_token(token.text) else {
                break;
            };
            if op.precedence() < prec1 {
                break;
            }
            self.next();
            let newline = self.tok().line > token.line;
            let y = self.binary_expr(op.precedence() + 1)?;
            x = Expr::Binary {
                x: Box::new(x),
                op,
                y: Box::new(y),
                newline,
            };
        }
        Ok(x)
    }

    fn unary_expr(&mut self) -> PResult<Expr> {
        let token = self.tok();
        if token.kind == TokenKind::Op {
            let op = match token.text {
                "+" => Some(UnaryOp::Pos),
                "-" => Some(UnaryOp::Neg),
                "!" => Some(UnaryOp::Not),
                "^" => Some(UnaryOp::Xor),
                "&" => Some(UnaryOp::Addr),
                "~" => Some(UnaryOp::Tilde),
                _ => None,
            };
            if let Some(op) = op {
                self.next();
                let x = self.unary_expr()?;
                return Ok(Expr::Unary { op, x: Box::new(x) });
            }
            match token.text {
                "<-" => {
                    self.next();
                    if self.at_keyword("chan") {
                        self.next();
                        let elem = self.parse_type()?;
                        return Ok(Expr::Chan {
                            dir: ChanDir::Recv,
                            elem: Box::new(elem),
                        });
                    }
                    let x = self.unary_expr()?;
                    return Ok(Expr::Unary {
                        op: UnaryOp::Recv,
                        x: Box::new(x),
                    });
                }
                "*" => {
                    self.next();
                    let x = self.unary_expr()?;
                    return Ok(Expr::Star(Box::new(x)));
                }
                _ => {}
            }
        }
        self.primary_expr()
    }

    fn primary_expr(&mut self) -> PResult<Expr> {
        let mut x = self.operand()?;
        loop {
            let token = self.tok();
            if token.kind != TokenKind::Op {
                return Ok(x);
            }
            match token.text {
                "." => {
                    self.next();
                    let next = self.tok();
                    if next.kind == TokenKind::Ident {
                        self.next();
                        x = Expr::Selector {
                            x: Box::new(x),
                            sel: next.text.to_string(),
                            newline: next.line > token.line,
                        };
                    } else if next.is_op("(") {
                        self.next();
                        let ty = if self.at_keyword("type") {
                            self.next();
                            None
                        } else {
                            Some(Box::new(self.parse_type()?))
                        };
                        self.expect_op(")")?;
                        x = Expr::TypeAssert { x: Box::new(x), ty };
                    } else {
                        return Err(self.unexpected("selector or type assertion"));
                    }
                }
                "[" => x = self.index_or_slice(x)?,
                "(" => x = self.call(x)?,
                "{" if self.is_literal_type(&x) => x = self.composite_lit(Some(x))?,
                _ => return Ok(x),
            }
        }
    }

    fn is_literal_type(&self, x: &Expr) -> bool {
        match x {
            Expr::Ident(_) | Expr::Selector { .. } | Expr::Index { .. } => self.expr_lev >= 0,
            Expr::Array { .. } | Expr::Map { .. } | Expr::Struct(_) => true,
            _ => false,
        }
    }

    fn index_or_slice(&mut self, x: Expr) -> PResult<Expr> {
        self.next();
        self.expr_lev += 1;
        let mut parts: [Option<Box<Expr>>; 3] = [None, None, None];
        let mut colons = 0;
        if !self.at_op(":") {
            parts[0] = Some(Box::new(self.expr()?));
        }
        while self.at_op(":") && colons < 2 {
            colons += 1;
            self.next();
            if !self.at_op(":") && !self.at_op("]") {
                parts[colons] = Some(Box::new(self.expr()?));
            }
        }
        let mut indices = Vec::new();
        if colons == 0 {
            indices.extend(parts[0].take().map(|b| *b));
            while self.at_op(",") {
                self.next();
                if self.at_op("]") {
                    break;
                }
                indices.push(self.expr()?);
            }
        }
        self.expr_lev -= 1;
        self.expect_op("]")?;
        if colons == 0 {
            return Ok(Expr::Index {
                x: Box::new(x),
                indices,
            });
        }
        let [low, high, max] = parts;
        Ok(Expr::Slice {
            x: Box::new(x),
            low,
            high,
            max,
            three: colons == 2,
        })
    }

    fn call(&mut self, fun: Expr) -> PResult<Expr> {
        let open = self.next();
        self.expr_lev += 1;
        let mut args = Vec::new();
        let mut breaks = Vec::new();
        let mut ellipsis = false;
        let mut prev_line = open.line;
        while !self.at_op(")") {
            breaks.push(self.tok().line > prev_line);
            args.push(self.expr()?);
            if self.at_op("...") {
                ellipsis = true;
                self.next();
            }
            prev_line = self.prev_end;
            if !self.at_op(",") {
                break;
            }
            self.next();
        }
        self.expr_lev -= 1;
        let close_break = !args.is_empty() && self.tok().line > prev_line;
        self.expect_op(")")?;
        Ok(Expr::Call(Call {
            fun: Box::new(fun),
            args,
            ellipsis,
            layout: ListLayout { breaks, close_break },
        }))
    }

    fn composite_lit(&mut self, ty: Option<Expr>) -> PResult<Expr> {
        let open = self.expect_op("{")?;
        let outer = self.expr_lev;
        self.expr_lev = outer.max(0) + 1;
        let mut elts: Vec<Element> = Vec::new();
        let mut prev_line = open.line;
        let tail = loop {
            let mut lead = self.leading();
            lead.attach(elts.last_mut().map(|e| &mut e.comment));
            if self.at_op("}") {
                break lead.comments;
            }
            let newline = !lead.comments.is_empty() || self.tok().line > prev_line;
            let blank_before = !elts.is_empty() && lead.first_blank();
            let value = self.element()?;
            elts.push(Element {
                doc: lead.comments,
                value,
                comment: None,
                newline,
                blank_before,
            });
            prev_line = self.prev_end;
            if !self.at_op(",") {
                let mut lead = self.leading();
                lead.attach(elts.last_mut().map(|e| &mut e.comment));
                break lead.comments;
            }
            self.next();
        };
        let close_break = self.tok().line > prev_line;
        self.expect_op("}")?;
        self.expr_lev = outer;
        Ok(Expr::CompositeLit(CompositeLit {
            ty: ty.map(Box::new),
            elts,
            close_break,
            tail,
        }))
    }

    fn element(&mut self) -> PResult<Expr> {
        let key = self.element_value()?;
        if self.at_op(":") {
            self.next();
            let value = self.element_value()?;
            return Ok(Expr::KeyValue {
                key: Box::new(key),
                value: Box::new(value),
            });
        }
        Ok(key)
    }

    fn element_value(&mut self) -> PResult<Expr> {
        if self.at_op("{") {
            return self.composite_lit(None);
        }
        self.expr()
    }

    fn operand(&mut self) -> PResult<Expr> {
        let token = self.tok();
        match (token.kind, token.text) {
            (TokenKind::Ident, _) => {
                self.next();
                Ok(Expr::Ident(token.text.to_string()))
            }
            _ if token.is_literal() => {
                self.next();
                Ok(Expr::BasicLit(token.text.to_string()))
            }
            (TokenKind::Op, "(") => {
                self.next();
                self.expr_lev += 1;
                let x = self.expr()?;
                self.expr_lev -= 1;
                self.expect_op(")")?;
                Ok(Expr::Paren(Box::new(x)))
            }
            (TokenKind::Op, "[") => self.array_type(),
            (TokenKind::Keyword, "func") => {
                self.next();
                let sig = self.signature()?;
                if !self.at_op("{") {
                    return Ok(Expr::Func(sig));
                }
                let outer = mem::replace(&mut self.expr_lev, 0);
                let body = self.block();
                self.expr_lev = outer;
                Ok(Expr::FuncLit(Box::new(FuncLit { sig, body: body? })))
            }
            (TokenKind::Keyword, "map") => self.map_type(),
            (TokenKind::Keyword, "chan") => self.chan_type(),
            (TokenKind::Keyword, "struct") => self.struct_type(),
            (TokenKind::Keyword, "interface") => self.interface_type(),
            _ => Err(self.unexpected("expression")),
        }
    }
}

enum ForHeader {
    Range(RangeHeader),
    Loop {
        init: Option<Stmt>,
        cond: Option<Expr>,
        post: Option<Stmt>,
    },
}

fn assign_op(text: &str) -> Option<AssignOp> {
    match text {
        ":=" => Some(AssignOp::Define),
        "=" => Some(AssignOp::Assign),
        "==" | "!=" | "<=" | ">=" => None,
        _ => text
            .strip_suffix('=')
            .and_then(BinaryOp::from_token)
            .map(AssignOp::Compound),
    }
}

fn is_type_guard(stmt: &Stmt) -> bool {
    let x = match &stmt.kind {
        StmtKind::Expr(x) => x,
        StmtKind::Assign {
            op: AssignOp::Define,
            lhs,
            rhs,
        } if lhs.len() == 1 && rhs.len() == 1 => &rhs[0],
        _ => return false,
    };
    matches!(x, Expr::TypeAssert { ty: None, .. })
}

/// Splits comments in front of a declaration into free-floating groups and
/// the doc comment directly attached to it.
fn split_doc(lead: Leading) -> (Vec<Vec<Comment>>, Vec<Comment>, bool) {
    let Leading {
        comments,
        blank_before,
        ..
    } = lead;
    let mut groups: Vec<Vec<Comment>> = Vec::new();
    for comment in comments {
        match groups.last_mut() {
            Some(group) if !comment.blank_before => group.push(comment),
            _ => groups.push(vec![comment]),
        }
    }
    if blank_before {
        return (groups, Vec::new(), true);
    }
    match groups.pop() {
        Some(doc) => {
            let blank = doc.first().is_some_and(|c| c.blank_before);
            (groups, doc, blank)
        }
        None => (groups, Vec::new(), false),
    }
}
