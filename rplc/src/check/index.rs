//! Program index.
//!
//! Flattens the declaration tree into a table keyed by [`DeclId`] and
//! records the relations later passes ask about: enclosing class and
//! function, qualified names, direct bases resolved by name, and the
//! canonical declaration of every function (first seen by qualified name
//! and signature).

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tracing::warn;

use crate::hir::{
    Attribute, Block, ClassDecl, Decl, DeclId, DeclKind, ExprKind, FieldDecl, FunctionDecl, LocalDecl, ParamDecl,
    Program, Stmt, Type, VarDecl,
};
use crate::span::Span;

/// What an indexed declaration is.
#[derive(Debug, Clone, Copy)]
pub enum DeclEntry<'a> {
    Class(&'a ClassDecl),
    Function(&'a FunctionDecl),
    Field(&'a FieldDecl),
    Var(&'a VarDecl),
    Param(&'a ParamDecl),
    Local(&'a LocalDecl),
}

/// One indexed declaration.
#[derive(Debug, Clone)]
pub struct DeclInfo<'a> {
    pub id: DeclId,
    pub name: &'a str,
    /// `Outer::Inner::name` for class members, the plain name otherwise.
    pub qualified: String,
    pub span: Span,
    pub attrs: &'a [Attribute],
    /// Enclosing class for members, enclosing function for parameters and
    /// locals, `None` at namespace scope.
    pub parent: Option<DeclId>,
    pub entry: DeclEntry<'a>,
}

impl<'a> DeclInfo<'a> {
    /// The declared type of a value declaration.
    pub fn value_type(&self) -> Option<&'a Type> {
        match self.entry {
            DeclEntry::Field(field) => Some(&field.ty),
            DeclEntry::Var(var) => Some(&var.ty),
            DeclEntry::Param(param) => Some(&param.ty),
            DeclEntry::Local(local) => Some(&local.ty),
            DeclEntry::Class(_) | DeclEntry::Function(_) => None,
        }
    }

    /// Globals, static members and static locals.
    pub fn has_static_storage(&self) -> bool {
        match self.entry {
            DeclEntry::Var(_) => true,
            DeclEntry::Field(field) => field.is_static,
            DeclEntry::Local(local) => local.is_static,
            _ => false,
        }
    }

    pub fn is_class(&self) -> bool {
        matches!(self.entry, DeclEntry::Class(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self.entry, DeclEntry::Function(_))
    }
}

/// Lookup tables over one program.
#[derive(Debug)]
pub struct ProgramIndex<'a> {
    program: &'a Program,
    decls: IndexMap<DeclId, DeclInfo<'a>>,
    classes: IndexMap<String, DeclId>,
    globals: FxHashMap<String, DeclId>,
    bases: FxHashMap<DeclId, Vec<DeclId>>,
    canonical: FxHashMap<DeclId, DeclId>,
    canonical_functions: Vec<DeclId>,
    functions_by_name: FxHashMap<String, Vec<DeclId>>,
    redeclarations: FxHashMap<DeclId, Vec<DeclId>>,
    owner_class: FxHashMap<DeclId, DeclId>,
}

impl<'a> ProgramIndex<'a> {
    /// Index every declaration of `program`.
    pub fn build(program: &'a Program) -> Self {
        let mut index = Self {
            program,
            decls: IndexMap::new(),
            classes: IndexMap::new(),
            globals: FxHashMap::default(),
            bases: FxHashMap::default(),
            canonical: FxHashMap::default(),
            canonical_functions: Vec::new(),
            functions_by_name: FxHashMap::default(),
            redeclarations: FxHashMap::default(),
            owner_class: FxHashMap::default(),
        };
        for decl in &program.decls {
            index.add_decl(decl, None, None);
        }
        index.resolve_bases();
        index.group_functions();
        index
    }

    pub fn program(&self) -> &'a Program {
        self.program
    }

    fn insert(&mut self, info: DeclInfo<'a>) -> bool {
        if self.decls.contains_key(&info.id) {
            warn!(id = %info.id, name = info.name, "duplicate declaration id ignored");
            return false;
        }
        self.decls.insert(info.id, info);
        true
    }

    fn add_decl(&mut self, decl: &'a Decl, parent: Option<DeclId>, prefix: Option<&str>) {
        let qualified = match prefix {
            Some(prefix) => format!("{prefix}::{}", decl.name),
            None => decl.name.clone(),
        };
        let entry = match &decl.kind {
            DeclKind::Class(class) => DeclEntry::Class(class),
            DeclKind::Function(function) => DeclEntry::Function(function),
            DeclKind::Field(field) => DeclEntry::Field(field),
            DeclKind::Var(var) => DeclEntry::Var(var),
        };
        let info = DeclInfo {
            id: decl.id,
            name: &decl.name,
            qualified: qualified.clone(),
            span: decl.span,
            attrs: &decl.attrs,
            parent,
            entry,
        };
        if !self.insert(info) {
            return;
        }

        match &decl.kind {
            DeclKind::Class(class) => {
                self.classes.entry(qualified.clone()).or_insert(decl.id);
                for member in &class.members {
                    self.add_decl(member, Some(decl.id), Some(&qualified));
                }
            }
            DeclKind::Function(function) => {
                for param in &function.params {
                    self.add_param(param, decl.id);
                }
                if let Some(body) = &function.body {
                    self.add_block(body, decl.id);
                }
            }
            DeclKind::Field(field) => {
                if field.is_static {
                    self.globals.entry(qualified).or_insert(decl.id);
                }
            }
            DeclKind::Var(_) => {
                self.globals.entry(qualified).or_insert(decl.id);
            }
        }
    }

    fn add_param(&mut self, param: &'a ParamDecl, function: DeclId) {
        self.insert(DeclInfo {
            id: param.id,
            name: &param.name,
            qualified: param.name.clone(),
            span: param.span,
            attrs: &param.attrs,
            parent: Some(function),
            entry: DeclEntry::Param(param),
        });
    }

    fn add_block(&mut self, block: &'a Block, function: DeclId) {
        for stmt in &block.stmts {
            match stmt {
                Stmt::Local(local) => {
                    self.insert(DeclInfo {
                        id: local.id,
                        name: &local.name,
                        qualified: local.name.clone(),
                        span: local.span,
                        attrs: &local.attrs,
                        parent: Some(function),
                        entry: DeclEntry::Local(local),
                    });
                    if let Some(init) = &local.init {
                        self.add_expr(&init.kind, function);
                    }
                }
                Stmt::Block(inner) => self.add_block(inner, function),
                Stmt::If { cond, then, otherwise } => {
                    self.add_expr(&cond.kind, function);
                    self.add_block(then, function);
                    if let Some(otherwise) = otherwise {
                        self.add_block(otherwise, function);
                    }
                }
                Stmt::While { cond, body } => {
                    self.add_expr(&cond.kind, function);
                    self.add_block(body, function);
                }
                Stmt::Expr { expr } => self.add_expr(&expr.kind, function),
                Stmt::Return { value } => {
                    if let Some(value) = value {
                        self.add_expr(&value.kind, function);
                    }
                }
            }
        }
    }

    /// Closures declare parameters and locals of their own.
    fn add_expr(&mut self, expr: &'a ExprKind, function: DeclId) {
        match expr {
            ExprKind::Lambda { params, body } => {
                for param in params {
                    self.add_param(param, function);
                }
                self.add_block(body, function);
            }
            ExprKind::Literal | ExprKind::Name { .. } | ExprKind::This => {}
            ExprKind::Member { base, .. } => self.add_expr(&base.kind, function),
            ExprKind::Deref { operand }
            | ExprKind::AddressOf { operand }
            | ExprKind::Unary { operand }
            | ExprKind::Delete { operand }
            | ExprKind::Cast { operand, .. } => self.add_expr(&operand.kind, function),
            ExprKind::Increment { target } => self.add_expr(&target.kind, function),
            ExprKind::Index { base, index } => {
                self.add_expr(&base.kind, function);
                self.add_expr(&index.kind, function);
            }
            ExprKind::Assign { target, value, .. } => {
                self.add_expr(&target.kind, function);
                self.add_expr(&value.kind, function);
            }
            ExprKind::Binary { lhs, rhs } => {
                self.add_expr(&lhs.kind, function);
                self.add_expr(&rhs.kind, function);
            }
            ExprKind::Call { callee, args } => {
                self.add_expr(&callee.kind, function);
                for arg in args {
                    self.add_expr(&arg.kind, function);
                }
            }
            ExprKind::MethodCall { receiver, args, .. } => {
                self.add_expr(&receiver.kind, function);
                for arg in args {
                    self.add_expr(&arg.kind, function);
                }
            }
            ExprKind::New { args, .. } => {
                for arg in args {
                    self.add_expr(&arg.kind, function);
                }
            }
        }
    }

    fn resolve_bases(&mut self) {
        let classes: Vec<(DeclId, &'a ClassDecl)> = self
            .decls
            .values()
            .filter_map(|info| match info.entry {
                DeclEntry::Class(class) => Some((info.id, class)),
                _ => None,
            })
            .collect();
        for (id, class) in classes {
            let bases = class
                .bases
                .iter()
                .filter_map(|spec| {
                    let base = self.class_named(&spec.class, Some(id));
                    if base.is_none() {
                        warn!(class = %id, base = %spec.class, "unknown base class ignored");
                    }
                    base
                })
                .collect();
            self.bases.insert(id, bases);
        }
    }

    fn group_functions(&mut self) {
        let mut by_key: FxHashMap<(String, String), DeclId> = FxHashMap::default();
        let functions: Vec<(DeclId, String, String)> = self
            .decls
            .values()
            .filter_map(|info| match info.entry {
                DeclEntry::Function(function) => Some((info.id, info.qualified.clone(), function.signature())),
                _ => None,
            })
            .collect();

        for (id, qualified, signature) in functions {
            let canonical = *by_key.entry((qualified.clone(), signature)).or_insert(id);
            self.canonical.insert(id, canonical);
            if canonical == id {
                self.canonical_functions.push(id);
                self.functions_by_name.entry(qualified.clone()).or_default().push(id);
            } else {
                self.redeclarations.entry(canonical).or_default().push(id);
            }

            // Out-of-class definitions (`C::m` at namespace scope) belong to `C`.
            let owner = match self.decls.get(&id).and_then(|info| info.parent) {
                Some(parent) => Some(parent),
                None => match self.owner_class.get(&canonical) {
                    Some(owner) => Some(*owner),
                    None => qualified
                        .rsplit_once("::")
                        .and_then(|(prefix, _)| self.classes.get(prefix).copied()),
                },
            };
            if let Some(owner) = owner {
                self.owner_class.insert(id, owner);
            }
        }
    }

    pub fn get(&self, id: DeclId) -> Option<&DeclInfo<'a>> {
        self.decls.get(&id)
    }

    /// All declarations in tree order.
    pub fn decls(&self) -> impl Iterator<Item = &DeclInfo<'a>> {
        self.decls.values()
    }

    pub fn class(&self, id: DeclId) -> Option<&'a ClassDecl> {
        match self.get(id)?.entry {
            DeclEntry::Class(class) => Some(class),
            _ => None,
        }
    }

    pub fn function(&self, id: DeclId) -> Option<&'a FunctionDecl> {
        match self.get(id)?.entry {
            DeclEntry::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Every class, in declaration order.
    pub fn classes(&self) -> impl Iterator<Item = DeclId> + '_ {
        self.classes.values().copied()
    }

    /// Resolve a class name as written inside `context`.
    ///
    /// Nested classes of the enclosing classes are tried innermost first,
    /// then the name as written.
    pub fn class_named(&self, name: &str, context: Option<DeclId>) -> Option<DeclId> {
        let mut scope = context.and_then(|id| self.class_context(id));
        while let Some(class) = scope {
            if let Some(info) = self.get(class) {
                if let Some(id) = self.classes.get(&format!("{}::{name}", info.qualified)) {
                    return Some(*id);
                }
                scope = info.parent.filter(|p| self.get(*p).is_some_and(DeclInfo::is_class));
            } else {
                break;
            }
        }
        self.classes.get(name).copied()
    }

    /// The class whose scope `id` is in: itself for classes, the owner for
    /// members, the owner of the enclosing function for parameters and locals.
    fn class_context(&self, id: DeclId) -> Option<DeclId> {
        let info = self.get(id)?;
        match info.entry {
            DeclEntry::Class(_) => Some(id),
            DeclEntry::Function(_) => self.owner_class(id),
            DeclEntry::Param(_) | DeclEntry::Local(_) => info.parent.and_then(|f| self.owner_class(f)),
            DeclEntry::Field(_) | DeclEntry::Var(_) => info.parent,
        }
    }

    /// Direct bases of a class, resolved.
    pub fn bases(&self, class: DeclId) -> &[DeclId] {
        self.bases.get(&class).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every proper ancestor of a class, nearest first.
    pub fn ancestors(&self, class: DeclId) -> Vec<DeclId> {
        let mut found: Vec<DeclId> = Vec::new();
        let mut queue: std::collections::VecDeque<DeclId> = self.bases(class).iter().copied().collect();
        while let Some(current) = queue.pop_front() {
            if current == class || found.contains(&current) {
                continue;
            }
            found.push(current);
            queue.extend(self.bases(current).iter().copied());
        }
        found
    }

    /// The class a function is a member of, including out-of-class definitions.
    pub fn owner_class(&self, function: DeclId) -> Option<DeclId> {
        self.owner_class.get(&function).copied()
    }

    /// The function a parameter or local belongs to.
    pub fn enclosing_function(&self, id: DeclId) -> Option<DeclId> {
        let info = self.get(id)?;
        match info.entry {
            DeclEntry::Function(_) => Some(id),
            DeclEntry::Param(_) | DeclEntry::Local(_) => info.parent,
            _ => None,
        }
    }

    /// Classes lexically enclosing `class`, innermost first.
    pub fn outer_classes(&self, class: DeclId) -> Vec<DeclId> {
        let mut outer = Vec::new();
        let mut current = self.get(class).and_then(|info| info.parent);
        while let Some(id) = current {
            match self.get(id) {
                Some(info) if info.is_class() => {
                    outer.push(id);
                    current = info.parent;
                }
                _ => break,
            }
        }
        outer
    }

    /// The first-seen declaration with the same qualified name and signature.
    pub fn canonical(&self, function: DeclId) -> DeclId {
        self.canonical.get(&function).copied().unwrap_or(function)
    }

    pub fn is_canonical(&self, function: DeclId) -> bool {
        self.canonical(function) == function
    }

    /// Canonical function declarations, in declaration order.
    pub fn canonical_functions(&self) -> &[DeclId] {
        &self.canonical_functions
    }

    /// Later declarations and definitions of a canonical function.
    pub fn redeclarations(&self, canonical: DeclId) -> &[DeclId] {
        self.redeclarations.get(&canonical).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Canonical functions with a qualified name.
    pub fn functions_named(&self, qualified: &str) -> &[DeclId] {
        self.functions_by_name.get(qualified).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every declaration of a canonical function that has a body.
    pub fn definitions(&self, canonical: DeclId) -> Vec<DeclId> {
        std::iter::once(canonical)
            .chain(self.redeclarations(canonical).iter().copied())
            .filter(|id| self.function(*id).is_some_and(|f| f.body.is_some()))
            .collect()
    }

    /// Fields declared directly in `class`.
    pub fn field(&self, class: DeclId, name: &str) -> Option<DeclId> {
        self.class(class)?
            .members
            .iter()
            .find(|m| m.name == name && matches!(m.kind, DeclKind::Field(_)))
            .map(|m| m.id)
    }

    /// Canonical methods named `name` declared directly in `class`.
    pub fn methods(&self, class: DeclId, name: &str) -> Vec<DeclId> {
        let Some(class_decl) = self.class(class) else {
            return Vec::new();
        };
        let mut methods = Vec::new();
        for member in &class_decl.members {
            if member.name == name && matches!(member.kind, DeclKind::Function(_)) {
                let canonical = self.canonical(member.id);
                if !methods.contains(&canonical) {
                    methods.push(canonical);
                }
            }
        }
        methods
    }

    /// A namespace-scope variable or static member by qualified name.
    pub fn global(&self, qualified: &str) -> Option<DeclId> {
        self.globals.get(qualified).copied()
    }

    /// The display key of a function: its qualified name, with the
    /// signature appended when the name is overloaded.
    pub fn function_key(&self, function: DeclId) -> String {
        let Some(info) = self.get(function) else {
            return function.to_string();
        };
        if self.functions_named(&info.qualified).len() > 1 {
            if let DeclEntry::Function(decl) = info.entry {
                return format!("{}{}", info.qualified, decl.signature());
            }
        }
        info.qualified.clone()
    }
}
