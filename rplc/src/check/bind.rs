//! Annotation binding.
//!
//! Resolves every raw clause exactly once into typed records. The first
//! pass declares region names and region parameters so that annotations
//! may refer to names declared later in the file; the second pass resolves
//! argument bindings, effect clauses and base bindings against the scopes
//! visible from each declaration.
//!
//! Malformed clauses are diagnosed here and never reach later passes: an
//! RPL with an undeclared or misplaced element is replaced by `Global`, and
//! duplicate or misplaced clauses are dropped.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tracing::debug;

use super::index::{DeclEntry, DeclInfo, ProgramIndex};
use crate::diagnostics::{Category, Diagnostic, Diagnostics, Payload};
use crate::effects::{Effect, EffectKind};
use crate::hir::{AttrKind, Attribute, DeclId};
use crate::rpl::{
    split_rpl_text, DeclareError, ParamName, RegionName, RegionScopes, Rpl, RplElement, Scope, SpecialRegion,
};
use crate::span::Span;

/// An `arg` or `base_arg` clause after resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundArgs {
    pub rpls: Vec<Rpl>,
    pub span: Span,
}

/// The effect clauses of a function after resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum DeclaredEffects {
    /// `no_effect`.
    Pure,
    /// The union of its `reads` and `writes` clauses.
    Effects(Vec<Effect>),
}

/// Everything bound for one declaration.
#[derive(Debug, Clone, Default)]
pub struct DeclAnnotations {
    pub regions: Vec<RegionName>,
    /// Region parameters, if the declaration has a `param` clause.
    pub params: Option<Vec<ParamName>>,
    pub args: Option<BoundArgs>,
    pub effects: Option<DeclaredEffects>,
    /// Keyed by the base class.
    pub base_args: IndexMap<DeclId, BoundArgs>,
}

/// Typed annotations of a program, keyed by declaration.
#[derive(Debug, Clone, Default)]
pub struct AnnotationTable {
    entries: FxHashMap<DeclId, DeclAnnotations>,
    param_owner: FxHashMap<DeclId, DeclId>,
}

impl AnnotationTable {
    pub fn get(&self, id: DeclId) -> Option<&DeclAnnotations> {
        self.entries.get(&id)
    }

    pub fn args(&self, id: DeclId) -> Option<&BoundArgs> {
        self.get(id)?.args.as_ref()
    }

    pub fn effects(&self, id: DeclId) -> Option<&DeclaredEffects> {
        self.get(id)?.effects.as_ref()
    }

    pub fn base_args(&self, class: DeclId, base: DeclId) -> Option<&BoundArgs> {
        self.get(class)?.base_args.get(&base)
    }

    /// Whether the declaration declares its own region parameters.
    pub fn declares_params(&self, id: DeclId) -> bool {
        self.get(id).is_some_and(|a| a.params.is_some())
    }

    /// The declaration whose `param` clause a function uses. Redeclarations
    /// without their own clause share the canonical declaration's.
    pub fn param_owner(&self, function: DeclId) -> DeclId {
        self.param_owner.get(&function).copied().unwrap_or(function)
    }
}

/// The binder's output: typed annotations plus the declared names.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    pub table: AnnotationTable,
    pub scopes: RegionScopes,
}

impl Bindings {
    pub fn class_params(&self, class: DeclId) -> &[ParamName] {
        self.scopes.params(class)
    }

    pub fn function_params(&self, function: DeclId) -> &[ParamName] {
        self.scopes.params(self.table.param_owner(function))
    }
}

/// Bind all annotations of the indexed program.
pub fn bind(index: &ProgramIndex<'_>, diagnostics: &mut Diagnostics) -> Bindings {
    let mut binder = Binder {
        index,
        diagnostics,
        table: AnnotationTable::default(),
        scopes: RegionScopes::new(),
    };
    binder.declare_translation_unit();
    for info in index.decls() {
        binder.declare(info);
    }
    binder.link_params();
    for info in index.decls() {
        binder.resolve(info);
    }
    debug!(
        decls = binder.table.entries.len(),
        "bound annotations"
    );
    Bindings {
        table: binder.table,
        scopes: binder.scopes,
    }
}

enum RplError {
    Empty,
    Undeclared(String),
    LocalNamed,
    SpecialNotAtHead(String),
    ParamNotAtHead(String),
}

struct Binder<'i, 'a> {
    index: &'i ProgramIndex<'a>,
    diagnostics: &'i mut Diagnostics,
    table: AnnotationTable,
    scopes: RegionScopes,
}

fn accepts(entry: &DeclEntry<'_>, kind: &AttrKind) -> bool {
    match entry {
        DeclEntry::Class(_) => matches!(kind, AttrKind::Region { .. } | AttrKind::Param { .. } | AttrKind::BaseArg { .. }),
        DeclEntry::Function(_) => matches!(
            kind,
            AttrKind::Region { .. }
                | AttrKind::Param { .. }
                | AttrKind::Reads { .. }
                | AttrKind::Writes { .. }
                | AttrKind::NoEffect
        ),
        DeclEntry::Field(_) | DeclEntry::Var(_) | DeclEntry::Param(_) | DeclEntry::Local(_) => {
            matches!(kind, AttrKind::Arg { .. })
        }
    }
}

fn is_declaring(kind: &AttrKind) -> bool {
    matches!(kind, AttrKind::Region { .. } | AttrKind::Param { .. })
}

impl<'i, 'a> Binder<'i, 'a> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    fn misplaced(&mut self, attr: &Attribute, what: &str, decl: Option<DeclId>) {
        let mut diagnostic = Diagnostic::new(
            Category::MisplacedAttribute,
            format!("`{}` clause is not allowed on {what}; ignored", attr.kind.keyword()),
            attr.span,
        )
        .with_payload(Payload::Element {
            text: attr.kind.keyword().to_string(),
        });
        if let Some(decl) = decl {
            diagnostic = diagnostic.with_decl(decl);
        }
        self.report(diagnostic);
    }

    fn duplicate(&mut self, attr: &Attribute, info: &DeclInfo<'a>, detail: &str) {
        self.report(
            Diagnostic::new(
                Category::DuplicateAttribute,
                format!("{detail} on `{}`; the later clause is ignored", info.qualified),
                attr.span,
            )
            .with_decl(info.id)
            .with_payload(Payload::Element {
                text: attr.kind.keyword().to_string(),
            }),
        );
    }

    fn declare_error(&mut self, error: DeclareError, span: Span, decl: Option<DeclId>) {
        let category = match error {
            DeclareError::Duplicate(_) | DeclareError::Reserved(_) => Category::DuplicateAttribute,
            DeclareError::Invalid(_) => Category::RplElementUndeclared,
        };
        let text = match &error {
            DeclareError::Duplicate(name) | DeclareError::Reserved(name) | DeclareError::Invalid(name) => name.clone(),
        };
        let mut diagnostic =
            Diagnostic::new(category, error.to_string(), span).with_payload(Payload::Element { text });
        if let Some(decl) = decl {
            diagnostic = diagnostic.with_decl(decl);
        }
        self.report(diagnostic);
    }

    fn declare_translation_unit(&mut self) {
        let program = self.index.program();
        for attr in &program.attrs {
            match &attr.kind {
                AttrKind::Region { names } => {
                    for name in names {
                        if let Err(error) = self.scopes.declare(name, Scope::Global) {
                            self.declare_error(error, attr.span, None);
                        }
                    }
                }
                _ => self.misplaced(attr, "the translation unit", None),
            }
        }
    }

    /// First pass: `region` and `param` clauses.
    fn declare(&mut self, info: &DeclInfo<'a>) {
        for attr in info.attrs {
            if !is_declaring(&attr.kind) {
                continue;
            }
            if !accepts(&info.entry, &attr.kind) {
                self.misplaced(attr, &format!("`{}`", info.qualified), Some(info.id));
                continue;
            }
            match &attr.kind {
                AttrKind::Region { names } => {
                    for name in names {
                        match self.scopes.declare(name, Scope::Decl(info.id)) {
                            Ok(region) => self.table.entries.entry(info.id).or_default().regions.push(region),
                            Err(error) => self.declare_error(error, attr.span, Some(info.id)),
                        }
                    }
                }
                AttrKind::Param { names } => {
                    if self.table.declares_params(info.id) {
                        self.duplicate(attr, info, "duplicate `param` clause");
                        continue;
                    }
                    let mut params = Vec::with_capacity(names.len());
                    for name in names {
                        match self.scopes.declare_param(name, info.id) {
                            Ok(param) => params.push(param),
                            Err(error) => self.declare_error(error, attr.span, Some(info.id)),
                        }
                    }
                    self.table.entries.entry(info.id).or_default().params = Some(params);
                }
                _ => {}
            }
        }
    }

    fn link_params(&mut self) {
        for &canonical in self.index.canonical_functions() {
            self.table.param_owner.insert(canonical, canonical);
            for &redecl in self.index.redeclarations(canonical) {
                let owner = if self.table.declares_params(redecl) {
                    redecl
                } else {
                    canonical
                };
                self.table.param_owner.insert(redecl, owner);
            }
        }
    }

    /// Second pass: everything that refers to declared names.
    fn resolve(&mut self, info: &DeclInfo<'a>) {
        let mut saw_no_effect = false;
        let mut saw_effect_list = false;

        for attr in info.attrs {
            if is_declaring(&attr.kind) {
                continue;
            }
            if !accepts(&info.entry, &attr.kind) {
                self.misplaced(attr, &format!("`{}`", info.qualified), Some(info.id));
                continue;
            }
            match &attr.kind {
                AttrKind::Arg { rpls } => {
                    if self.table.args(info.id).is_some() {
                        self.duplicate(attr, info, "duplicate `arg` clause");
                        continue;
                    }
                    let rpls = rpls.iter().map(|text| self.resolve_rpl(text, info.id, attr.span)).collect();
                    self.table.entries.entry(info.id).or_default().args = Some(BoundArgs { rpls, span: attr.span });
                }
                AttrKind::Reads { rpls } | AttrKind::Writes { rpls } => {
                    if saw_no_effect {
                        self.duplicate(attr, info, "effect clause combined with `no_effect`");
                        continue;
                    }
                    saw_effect_list = true;
                    let kind = match attr.kind {
                        AttrKind::Reads { .. } => EffectKind::Read,
                        _ => EffectKind::Write,
                    };
                    let effects: Vec<Effect> = rpls
                        .iter()
                        .map(|text| Effect::new(kind, self.resolve_rpl(text, info.id, attr.span)))
                        .collect();
                    let entry = self.table.entries.entry(info.id).or_default();
                    match &mut entry.effects {
                        Some(DeclaredEffects::Effects(existing)) => existing.extend(effects),
                        _ => entry.effects = Some(DeclaredEffects::Effects(effects)),
                    }
                }
                AttrKind::NoEffect => {
                    if saw_no_effect {
                        self.duplicate(attr, info, "duplicate `no_effect` clause");
                        continue;
                    }
                    if saw_effect_list {
                        self.duplicate(attr, info, "`no_effect` combined with an effect clause");
                        continue;
                    }
                    saw_no_effect = true;
                    self.table.entries.entry(info.id).or_default().effects = Some(DeclaredEffects::Pure);
                }
                AttrKind::BaseArg { base, rpls } => self.resolve_base_arg(info, attr, base, rpls),
                AttrKind::Region { .. } | AttrKind::Param { .. } => {}
            }
        }
    }

    fn resolve_base_arg(&mut self, info: &DeclInfo<'a>, attr: &Attribute, base: &str, rpls: &[String]) {
        let base_id = self
            .index
            .class_named(base, Some(info.id))
            .filter(|id| self.index.bases(info.id).contains(id));
        let Some(base_id) = base_id else {
            self.misplaced(
                attr,
                &format!("`{}` because `{base}` is not a direct base", info.qualified),
                Some(info.id),
            );
            return;
        };
        if self.table.base_args(info.id, base_id).is_some() {
            self.duplicate(attr, info, &format!("duplicate `base_arg` clause for `{base}`"));
            return;
        }
        let rpls = rpls.iter().map(|text| self.resolve_rpl(text, info.id, attr.span)).collect();
        self.table
            .entries
            .entry(info.id)
            .or_default()
            .base_args
            .insert(base_id, BoundArgs { rpls, span: attr.span });
    }

    /// Resolve RPL text in the scopes visible from `context`, reporting at
    /// most one diagnostic and falling back to `Global`.
    fn resolve_rpl(&mut self, text: &str, context: DeclId, span: Span) -> Rpl {
        match self.try_resolve_rpl(text, context) {
            Ok(rpl) => rpl,
            Err(error) => {
                let (category, message, element) = match error {
                    RplError::Empty => (
                        Category::RplElementUndeclared,
                        format!("empty element in RPL `{text}`"),
                        String::new(),
                    ),
                    RplError::Undeclared(name) => (
                        Category::RplElementUndeclared,
                        format!("region `{name}` in `{text}` is not declared in an enclosing scope"),
                        name,
                    ),
                    RplError::LocalNamed => (
                        Category::RplElementUndeclared,
                        format!("`Local` cannot be named in an annotation (`{text}`)"),
                        "Local".to_string(),
                    ),
                    RplError::SpecialNotAtHead(name) => (
                        Category::RplElementUndeclared,
                        format!("`{name}` may only appear at the head of an RPL (`{text}`)"),
                        name,
                    ),
                    RplError::ParamNotAtHead(name) => (
                        Category::MisplacedRegionParameter,
                        format!("region parameter `{name}` may only appear at the head of an RPL (`{text}`)"),
                        name,
                    ),
                };
                self.report(
                    Diagnostic::new(category, format!("{message}; using `Global`"), span)
                        .with_decl(context)
                        .with_payload(Payload::Element { text: element }),
                );
                Rpl::global()
            }
        }
    }

    fn try_resolve_rpl(&self, text: &str, context: DeclId) -> Result<Rpl, RplError> {
        let scopes = self.visible_scopes(context);
        let param_owners = self.visible_param_owners(context);
        let mut elements = Vec::new();

        for (position, part) in split_rpl_text(text).into_iter().enumerate() {
            if part.is_empty() {
                return Err(RplError::Empty);
            }
            if part == "*" {
                elements.push(RplElement::Star);
                continue;
            }
            if let Some(special) = SpecialRegion::from_name(part) {
                if special == SpecialRegion::Local {
                    return Err(RplError::LocalNamed);
                }
                if position > 0 {
                    return Err(RplError::SpecialNotAtHead(part.to_string()));
                }
                elements.push(RplElement::Special(special));
                continue;
            }
            if let Some(param) = param_owners.iter().find_map(|owner| self.scopes.param(*owner, part)) {
                if position > 0 {
                    return Err(RplError::ParamNotAtHead(part.to_string()));
                }
                elements.push(RplElement::Param(param.clone()));
                continue;
            }
            match scopes.iter().find_map(|scope| self.scopes.region(*scope, part)) {
                Some(region) => elements.push(RplElement::Region(region.clone())),
                None => return Err(RplError::Undeclared(part.to_string())),
            }
        }
        Ok(Rpl::new(elements))
    }

    /// The class and function contexts of a declaration.
    fn contexts(&self, context: DeclId) -> (Option<DeclId>, Option<DeclId>) {
        let function = self.index.enclosing_function(context);
        let class = match function {
            Some(function) => self.index.owner_class(function),
            None => match self.index.get(context).map(|info| info.entry) {
                Some(DeclEntry::Class(_)) => Some(context),
                Some(DeclEntry::Field(_)) => self.index.get(context).and_then(|info| info.parent),
                _ => None,
            },
        };
        (function, class)
    }

    /// Region scopes searched from `context`: function, class, base
    /// classes, outer classes, translation unit.
    fn visible_scopes(&self, context: DeclId) -> Vec<Scope> {
        let (function, class) = self.contexts(context);
        let mut scopes = Vec::new();
        if let Some(function) = function {
            scopes.push(Scope::Decl(function));
            let canonical = self.index.canonical(function);
            if canonical != function {
                scopes.push(Scope::Decl(canonical));
            }
        }
        if let Some(class) = class {
            scopes.push(Scope::Decl(class));
            scopes.extend(self.index.ancestors(class).into_iter().map(Scope::Decl));
            scopes.extend(self.index.outer_classes(class).into_iter().map(Scope::Decl));
        }
        scopes.push(Scope::Global);
        scopes
    }

    /// Declarations whose region parameters are visible from `context`.
    fn visible_param_owners(&self, context: DeclId) -> Vec<DeclId> {
        let (function, class) = self.contexts(context);
        let mut owners = Vec::new();
        if let Some(function) = function {
            owners.push(self.table.param_owner(function));
        }
        if let Some(class) = class {
            owners.push(class);
            owners.extend(self.index.outer_classes(class));
        }
        owners
    }
}
