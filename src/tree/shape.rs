use crate::syntax::ast::{Expr, Stmt, StmtKind};

/// Approximate identity of a `pkg.Fn(a, b)` expression statement: the
/// package, the function and the names of the identifier arguments.
///
/// Two statements with the same shape are treated as the same statement.
/// Only names are compared, so a variable shadowed in an inner scope looks
/// identical to the outer one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallShape {
    pub package: String,
    pub function: String,
    pub args: Vec<String>,
}

impl CallShape {
    pub fn of(stmt: &Stmt) -> Option<Self> {
        let StmtKind::Expr(Expr::Call(call)) = &stmt.kind else {
            return None;
        };
        let (package, function) = call.fun.as_qualified()?;
        Some(Self {
            package: package.to_string(),
            function: function.to_string(),
            args: call
                .args
                .iter()
                .filter_map(Expr::as_ident)
                .map(str::to_string)
                .collect(),
        })
    }
}

/// Inserts `stmt` right after `stmts[index]` unless a statement of the same
/// shape already follows it in the same list. Nested blocks are not
/// searched.
pub fn insert_after_once(stmts: &mut Vec<Stmt>, index: usize, stmt: Stmt) -> bool {
    if index >= stmts.len() {
        return false;
    }
    let Some(shape) = CallShape::of(&stmt) else {
        return false;
    };
    if stmts[index + 1..]
        .iter()
        .any(|existing| CallShape::of(existing).as_ref() == Some(&shape))
    {
        return false;
    }
    stmts.insert(index + 1, stmt);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::ast::{Block, Expr};

    fn attach(name: &str) -> Stmt {
        Stmt::expr(Expr::call(
            Expr::qualified("instamux", "AddMiddleware"),
            vec![Expr::ident("__instanaSensor"), Expr::ident(name)],
        ))
    }

    fn other() -> Stmt {
        Stmt::expr(Expr::call(Expr::ident("run"), Vec::new()))
    }

    #[test]
    fn shape_keeps_only_identifier_arguments() {
        let stmt = Stmt::expr(Expr::call(
            Expr::qualified("pkg", "Fn"),
            vec![Expr::ident("a"), Expr::BasicLit("1".into()), Expr::ident("b")],
        ));
        let shape = CallShape::of(&stmt).unwrap();
        assert_eq!(shape.package, "pkg");
        assert_eq!(shape.function, "Fn");
        assert_eq!(shape.args, vec!["a", "b"]);
        assert_eq!(CallShape::of(&other()), None);
    }

    #[test]
    fn inserts_directly_after_the_index() {
        let mut stmts = vec![other(), other()];
        assert!(insert_after_once(&mut stmts, 0, attach("r")));
        assert_eq!(stmts[1], attach("r"));
        assert_eq!(stmts.len(), 3);
    }

    #[test]
    fn skips_when_the_same_shape_follows() {
        let mut stmts = vec![other(), other(), attach("r")];
        assert!(!insert_after_once(&mut stmts, 0, attach("r")));
        assert!(insert_after_once(&mut stmts, 0, attach("e")));
        assert!(!insert_after_once(&mut stmts, 9, attach("x")));
    }

    #[test]
    fn nested_blocks_do_not_count_as_already_present() {
        let nested = Stmt::new(StmtKind::Block(Block {
            stmts: vec![attach("r")],
            ..Block::default()
        }));
        let mut stmts = vec![other(), nested];
        assert!(insert_after_once(&mut stmts, 0, attach("r")));
    }
}
