//! Region arguments.
//!
//! Lays out the region slots of every field, variable, parameter and local
//! and fills them from `arg` clauses, the default scheme, or fresh
//! inference variables. Also builds the inheritance DAG from `base_arg`
//! clauses, defaulting missing base bindings the same way.
//!
//! Slot layout: fields and static-storage variables first have a storage
//! slot. Then `T*`, `T&` and `T[]` add one slot followed by the slots of
//! `T`; a class type adds one slot per class parameter; scalars add none.

use rustc_hash::FxHashMap;
use tracing::debug;

use super::bind::Bindings;
use super::index::{DeclEntry, DeclInfo, ProgramIndex};
use crate::config::DefaultScheme;
use crate::diagnostics::{Category, Diagnostic, Diagnostics, Payload};
use crate::hir::{DeclId, Type};
use crate::rpl::{RegionVarId, Rpl, Scope};
use crate::span::Span;
use crate::subst::{InheritanceEdge, InheritanceGraph, Substitution};

/// The region slots of one value declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotArgs {
    /// Where the value itself lives. `None` for automatic storage.
    pub storage: Option<Rpl>,
    /// The regions named by the value's type.
    pub slots: Vec<Rpl>,
}

impl SlotArgs {
    pub fn map_rpls(&mut self, f: &impl Fn(&Rpl) -> Rpl) {
        if let Some(storage) = &mut self.storage {
            *storage = f(storage);
        }
        for slot in &mut self.slots {
            *slot = f(slot);
        }
    }
}

/// Where an inference variable came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarOrigin {
    pub decl: DeclId,
    /// Scope a synthesized region for this variable is declared in.
    pub scope: Scope,
    /// Name the synthesized region is derived from.
    pub hint: String,
}

/// Region arguments of every value declaration.
#[derive(Debug, Clone, Default)]
pub struct RegionTable {
    args: FxHashMap<DeclId, SlotArgs>,
    vars: Vec<VarOrigin>,
}

impl RegionTable {
    pub fn get(&self, id: DeclId) -> Option<&SlotArgs> {
        self.args.get(&id)
    }

    /// Inference variables, indexed by [`RegionVarId`].
    pub fn vars(&self) -> &[VarOrigin] {
        &self.vars
    }

    fn fresh_var(&mut self, origin: VarOrigin) -> Rpl {
        let id = RegionVarId(self.vars.len() as u32);
        self.vars.push(origin);
        Rpl::var(id)
    }

    /// Rewrite every slot, e.g. to replace solved inference variables.
    pub fn map_rpls(&mut self, f: &impl Fn(&Rpl) -> Rpl) {
        for args in self.args.values_mut() {
            args.map_rpls(f);
        }
    }
}

/// Number of region slots contributed by a type.
pub fn type_slot_count(index: &ProgramIndex<'_>, bindings: &Bindings, ty: &Type, context: DeclId) -> usize {
    match ty {
        Type::Scalar => 0,
        Type::Class { name } => index
            .class_named(name, Some(context))
            .map(|class| bindings.class_params(class).len())
            .unwrap_or(0),
        Type::Pointer { pointee: inner } | Type::Reference { referent: inner } | Type::Array { element: inner } => {
            1 + type_slot_count(index, bindings, inner, context)
        }
    }
}

enum SlotDefault {
    Fixed(Rpl),
    Fresh,
}

/// Compute region arguments and the inheritance DAG.
pub fn resolve_regions(
    index: &ProgramIndex<'_>,
    bindings: &Bindings,
    scheme: DefaultScheme,
    diagnostics: &mut Diagnostics,
) -> (RegionTable, InheritanceGraph) {
    let mut resolver = RegionResolver {
        index,
        bindings,
        scheme,
        diagnostics,
        table: RegionTable::default(),
    };
    for info in index.decls() {
        if info.value_type().is_some() {
            resolver.resolve_value(info);
        }
    }
    let graph = resolver.inheritance_graph();
    debug!(
        values = resolver.table.args.len(),
        vars = resolver.table.vars.len(),
        "resolved region arguments"
    );
    (resolver.table, graph)
}

struct RegionResolver<'r, 'a> {
    index: &'r ProgramIndex<'a>,
    bindings: &'r Bindings,
    scheme: DefaultScheme,
    diagnostics: &'r mut Diagnostics,
    table: RegionTable,
}

impl<'r, 'a> RegionResolver<'r, 'a> {
    /// The first region parameter in scope for the `param` scheme.
    fn first_param_in_scope(&self, info: &DeclInfo<'a>) -> Option<Rpl> {
        let function = self.index.enclosing_function(info.id);
        let class = match function {
            Some(function) => self.index.owner_class(function),
            None => info.parent,
        };
        class
            .and_then(|class| self.bindings.class_params(class).first())
            .or_else(|| function.and_then(|f| self.bindings.function_params(f).first()))
            .map(|param| Rpl::param(param.clone()))
    }

    fn default_for(&self, info: &DeclInfo<'a>) -> (SlotDefault, bool) {
        if info.has_static_storage() {
            return (SlotDefault::Fixed(Rpl::global()), false);
        }
        let automatic = matches!(info.entry, DeclEntry::Param(_) | DeclEntry::Local(_));
        match self.scheme {
            DefaultScheme::Global | DefaultScheme::EffectInference => (SlotDefault::Fixed(Rpl::global()), false),
            DefaultScheme::Simple if automatic => (SlotDefault::Fixed(Rpl::local()), false),
            DefaultScheme::Simple => (SlotDefault::Fixed(Rpl::global()), false),
            DefaultScheme::Param => match self.first_param_in_scope(info) {
                Some(param) => (SlotDefault::Fixed(param), false),
                None => (
                    SlotDefault::Fixed(Rpl::global()),
                    !matches!(info.entry, DeclEntry::Local(_)),
                ),
            },
            DefaultScheme::RegionInference | DefaultScheme::Inference => (SlotDefault::Fresh, false),
        }
    }

    fn var_scope(&self, info: &DeclInfo<'a>) -> Scope {
        match info.entry {
            DeclEntry::Field(_) => info.parent.map(Scope::Decl).unwrap_or(Scope::Global),
            _ => self
                .index
                .enclosing_function(info.id)
                .map(Scope::Decl)
                .unwrap_or(Scope::Global),
        }
    }

    fn resolve_value(&mut self, info: &DeclInfo<'a>) {
        let Some(ty) = info.value_type() else {
            return;
        };
        let has_storage = matches!(info.entry, DeclEntry::Field(_)) || info.has_static_storage();
        let needed = usize::from(has_storage) + type_slot_count(self.index, self.bindings, ty, info.id);

        let explicit = self.bindings.table.args(info.id).cloned();
        let mut rpls = match &explicit {
            Some(args) => {
                self.check_count(&info.qualified, args.rpls.len(), needed, args.span, info.id);
                args.rpls.iter().take(needed).cloned().collect()
            }
            None => Vec::new(),
        };

        if rpls.len() < needed {
            let (default, warn_missing) = self.default_for(info);
            if warn_missing && explicit.is_none() {
                self.diagnostics.push(
                    Diagnostic::new(
                        Category::MissingRegionArgument,
                        format!(
                            "no region parameter in scope to default the region arguments of `{}`; using `Global`",
                            info.qualified
                        ),
                        info.span,
                    )
                    .with_decl(info.id)
                    .with_payload(Payload::Rpl { rpl: Rpl::global() }),
                );
            }
            while rpls.len() < needed {
                let rpl = match &default {
                    SlotDefault::Fixed(rpl) => rpl.clone(),
                    SlotDefault::Fresh => {
                        let origin = VarOrigin {
                            decl: info.id,
                            scope: self.var_scope(info),
                            hint: info.name.to_string(),
                        };
                        self.table.fresh_var(origin)
                    }
                };
                rpls.push(rpl);
            }
        }

        let (storage, slots) = if has_storage {
            let mut iter = rpls.into_iter();
            let storage = iter.next();
            (storage, iter.collect())
        } else {
            (None, rpls)
        };
        self.table.args.insert(info.id, SlotArgs { storage, slots });
    }

    fn check_count(&mut self, what: &str, found: usize, needed: usize, span: Span, decl: DeclId) {
        if found < needed {
            self.diagnostics.push(
                Diagnostic::new(
                    Category::MissingRegionArgument,
                    format!("`{what}` expects {needed} region argument(s), found {found}; defaulting the rest"),
                    span,
                )
                .with_decl(decl),
            );
        } else if found > needed {
            self.diagnostics.push(
                Diagnostic::new(
                    Category::SuperfluousRegionArgument,
                    format!("`{what}` expects {needed} region argument(s), found {found}; extra ones ignored"),
                    span,
                )
                .with_decl(decl),
            );
        }
    }

    fn inheritance_graph(&mut self) -> InheritanceGraph {
        let mut graph = InheritanceGraph::new();
        let classes: Vec<DeclId> = self.index.classes().collect();
        for derived in classes {
            let Some(class) = self.index.class(derived) else {
                continue;
            };
            let qualified = self.index.get(derived).map(|i| i.qualified.clone()).unwrap_or_default();
            for spec in &class.bases {
                let Some(base) = self.index.class_named(&spec.class, Some(derived)) else {
                    continue;
                };
                let base_params = self.bindings.class_params(base).to_vec();
                let mut rpls: Vec<Rpl> = match self.bindings.table.base_args(derived, base).cloned() {
                    Some(args) => {
                        let what = format!("{qualified}: {}", spec.class);
                        self.check_count(&what, args.rpls.len(), base_params.len(), args.span, derived);
                        args.rpls.into_iter().take(base_params.len()).collect()
                    }
                    None => Vec::new(),
                };
                let fallback = match self.scheme {
                    DefaultScheme::Param => self
                        .bindings
                        .class_params(derived)
                        .first()
                        .map(|p| Rpl::param(p.clone()))
                        .unwrap_or_else(Rpl::global),
                    _ => Rpl::global(),
                };
                rpls.resize(base_params.len(), fallback);
                graph.add_edge(InheritanceEdge {
                    derived,
                    base,
                    subst: Substitution::positional(&base_params, rpls),
                    is_virtual: spec.is_virtual,
                });
            }
        }
        graph
    }
}
