//! Programmatic construction of declaration trees.
//!
//! Hosts that embed the checker as a library, and the test suites, build
//! trees with these helpers instead of spelling JSON. [`ProgramBuilder`]
//! hands out fresh [`DeclId`]s and gives each declaration its own line so
//! diagnostics stay distinguishable; the free functions build clauses,
//! expressions and statements.

use super::{
    Attribute, AttrKind, BaseSpec, Block, CastKind, ClassDecl, Decl, DeclId, DeclKind, Expr, ExprKind,
    FieldDecl, FunctionDecl, LocalDecl, ParamDecl, Program, Stmt, Type, VarDecl,
};
use crate::span::Span;

/// Builds a [`Program`] one declaration at a time.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    next_id: u32,
    next_line: u32,
    program: Program,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare regions at translation-unit scope.
    pub fn regions(&mut self, names: &[&str]) -> &mut Self {
        let span = self.span();
        self.program.attrs.push(Attribute::new(
            AttrKind::Region {
                names: strings(names),
            },
            span,
        ));
        self
    }

    /// Append a top-level declaration.
    pub fn push(&mut self, decl: Decl) -> DeclId {
        let id = decl.id;
        self.program.decls.push(decl);
        id
    }

    /// The program built so far.
    pub fn build(&self) -> Program {
        self.program.clone()
    }

    pub fn fresh_id(&mut self) -> DeclId {
        self.next_id += 1;
        DeclId(self.next_id)
    }

    fn span(&mut self) -> Span {
        self.next_line += 1;
        Span::at(self.next_line, 1)
    }

    fn decl(&mut self, name: &str, attrs: Vec<Attribute>, kind: DeclKind) -> Decl {
        Decl {
            id: self.fresh_id(),
            name: name.to_string(),
            span: self.span(),
            attrs,
            kind,
        }
    }

    pub fn class(&mut self, name: &str, attrs: Vec<Attribute>, bases: Vec<BaseSpec>, members: Vec<Decl>) -> Decl {
        self.decl(name, attrs, DeclKind::Class(ClassDecl { bases, members }))
    }

    pub fn field(&mut self, name: &str, ty: Type, attrs: Vec<Attribute>) -> Decl {
        self.decl(name, attrs, DeclKind::Field(FieldDecl { ty, is_static: false }))
    }

    pub fn static_field(&mut self, name: &str, ty: Type, attrs: Vec<Attribute>) -> Decl {
        self.decl(name, attrs, DeclKind::Field(FieldDecl { ty, is_static: true }))
    }

    pub fn var(&mut self, name: &str, ty: Type, attrs: Vec<Attribute>) -> Decl {
        self.decl(name, attrs, DeclKind::Var(VarDecl { ty }))
    }

    pub fn function(
        &mut self,
        name: &str,
        params: Vec<ParamDecl>,
        attrs: Vec<Attribute>,
        body: Option<Block>,
    ) -> Decl {
        self.decl(name, attrs, DeclKind::Function(function(params, body, false)))
    }

    pub fn virtual_method(
        &mut self,
        name: &str,
        params: Vec<ParamDecl>,
        attrs: Vec<Attribute>,
        body: Option<Block>,
    ) -> Decl {
        self.decl(name, attrs, DeclKind::Function(function(params, body, true)))
    }

    pub fn param(&mut self, name: &str, ty: Type, attrs: Vec<Attribute>) -> ParamDecl {
        ParamDecl {
            id: self.fresh_id(),
            name: name.to_string(),
            ty,
            attrs,
            span: self.span(),
        }
    }

    /// A local variable declaration statement.
    pub fn local(&mut self, name: &str, ty: Type, attrs: Vec<Attribute>, init: Option<Expr>) -> Stmt {
        Stmt::Local(LocalDecl {
            id: self.fresh_id(),
            name: name.to_string(),
            ty,
            is_static: false,
            attrs,
            init,
            span: self.span(),
        })
    }

    pub fn static_local(&mut self, name: &str, ty: Type, attrs: Vec<Attribute>) -> Stmt {
        Stmt::Local(LocalDecl {
            id: self.fresh_id(),
            name: name.to_string(),
            ty,
            is_static: true,
            attrs,
            init: None,
            span: self.span(),
        })
    }

    /// An expression statement on its own line.
    pub fn stmt(&mut self, mut expr: Expr) -> Stmt {
        expr.span = self.span();
        Stmt::Expr { expr }
    }
}

fn function(params: Vec<ParamDecl>, body: Option<Block>, is_virtual: bool) -> FunctionDecl {
    FunctionDecl {
        params,
        ret: Type::Scalar,
        is_virtual,
        is_static: false,
        signature: None,
        body,
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn clause(kind: AttrKind) -> Attribute {
    Attribute::new(kind, Span::dummy())
}

pub fn region(names: &[&str]) -> Attribute {
    clause(AttrKind::Region {
        names: strings(names),
    })
}

pub fn params(names: &[&str]) -> Attribute {
    clause(AttrKind::Param {
        names: strings(names),
    })
}

pub fn arg(rpls: &[&str]) -> Attribute {
    clause(AttrKind::Arg { rpls: strings(rpls) })
}

pub fn reads(rpls: &[&str]) -> Attribute {
    clause(AttrKind::Reads { rpls: strings(rpls) })
}

pub fn writes(rpls: &[&str]) -> Attribute {
    clause(AttrKind::Writes { rpls: strings(rpls) })
}

pub fn no_effect() -> Attribute {
    clause(AttrKind::NoEffect)
}

pub fn base_arg(base: &str, rpls: &[&str]) -> Attribute {
    clause(AttrKind::BaseArg {
        base: base.to_string(),
        rpls: strings(rpls),
    })
}

pub fn base(class: &str) -> BaseSpec {
    BaseSpec {
        class: class.to_string(),
        is_virtual: false,
        span: Span::dummy(),
    }
}

pub fn virtual_base(class: &str) -> BaseSpec {
    BaseSpec {
        is_virtual: true,
        ..base(class)
    }
}

fn expr(kind: ExprKind) -> Expr {
    Expr::new(kind, Span::dummy())
}

pub fn lit() -> Expr {
    expr(ExprKind::Literal)
}

pub fn name(name: &str) -> Expr {
    expr(ExprKind::Name { name: name.to_string() })
}

pub fn this() -> Expr {
    expr(ExprKind::This)
}

pub fn member(base: Expr, field: &str) -> Expr {
    expr(ExprKind::Member {
        base: Box::new(base),
        field: field.to_string(),
        arrow: false,
    })
}

pub fn arrow(base: Expr, field: &str) -> Expr {
    expr(ExprKind::Member {
        base: Box::new(base),
        field: field.to_string(),
        arrow: true,
    })
}

pub fn deref(operand: Expr) -> Expr {
    expr(ExprKind::Deref {
        operand: Box::new(operand),
    })
}

pub fn addr(operand: Expr) -> Expr {
    expr(ExprKind::AddressOf {
        operand: Box::new(operand),
    })
}

pub fn index(base: Expr, index: Expr) -> Expr {
    expr(ExprKind::Index {
        base: Box::new(base),
        index: Box::new(index),
    })
}

pub fn assign(target: Expr, value: Expr) -> Expr {
    expr(ExprKind::Assign {
        target: Box::new(target),
        value: Box::new(value),
        compound: false,
    })
}

pub fn compound_assign(target: Expr, value: Expr) -> Expr {
    expr(ExprKind::Assign {
        target: Box::new(target),
        value: Box::new(value),
        compound: true,
    })
}

pub fn increment(target: Expr) -> Expr {
    expr(ExprKind::Increment {
        target: Box::new(target),
    })
}

pub fn binary(lhs: Expr, rhs: Expr) -> Expr {
    expr(ExprKind::Binary {
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

pub fn call(callee: &str, args: Vec<Expr>) -> Expr {
    expr(ExprKind::Call {
        callee: Box::new(name(callee)),
        args,
    })
}

pub fn method_call(receiver: Expr, method: &str, args: Vec<Expr>) -> Expr {
    expr(ExprKind::MethodCall {
        receiver: Box::new(receiver),
        method: method.to_string(),
        arrow: false,
        args,
    })
}

pub fn arrow_call(receiver: Expr, method: &str, args: Vec<Expr>) -> Expr {
    expr(ExprKind::MethodCall {
        receiver: Box::new(receiver),
        method: method.to_string(),
        arrow: true,
        args,
    })
}

pub fn new_object(ty: Type) -> Expr {
    expr(ExprKind::New { ty, args: vec![] })
}

pub fn delete(operand: Expr) -> Expr {
    expr(ExprKind::Delete {
        operand: Box::new(operand),
    })
}

pub fn cast(operand: Expr, to: Type, kind: CastKind) -> Expr {
    expr(ExprKind::Cast {
        operand: Box::new(operand),
        to,
        kind,
    })
}

pub fn lambda(stmts: Vec<Stmt>) -> Expr {
    expr(ExprKind::Lambda {
        params: vec![],
        body: Block::new(stmts),
    })
}

pub fn expr_stmt(expr: Expr) -> Stmt {
    Stmt::Expr { expr }
}

pub fn ret(value: Option<Expr>) -> Stmt {
    Stmt::Return { value }
}

pub fn block(stmts: Vec<Stmt>) -> Block {
    Block::new(stmts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_assigns_fresh_ids_and_lines() {
        let mut b = ProgramBuilder::new();
        b.regions(&["Left"]);
        let x = b.var("x", Type::Scalar, vec![arg(&["Left"])]);
        let f = b.function("f", vec![], vec![writes(&["Left"])], Some(block(vec![])));
        assert_ne!(x.id, f.id);
        assert!(f.span.line > x.span.line);
        b.push(x);
        b.push(f);
        let program = b.build();
        assert_eq!(program.decls.len(), 2);
        assert_eq!(program.attrs.len(), 1);
    }
}
