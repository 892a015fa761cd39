//! Effect collection.
//!
//! Walks every function body once and records what the later phases need:
//!
//! - direct effects with the span of the access that produced them,
//! - call sites with the substitution that rewrites the callee's summary
//!   into the caller's vocabulary,
//! - flows `target ⊒ source` from assignments, initializers and argument
//!   passing (region inference constraints and compatibility checks),
//! - fork-join sites with the facts of each concurrent operand.
//!
//! Every expression is evaluated to a [`Place`] (an lvalue: where it lives
//! and the region slots of its type) or a [`Value`] (an rvalue: just the
//! slots). Loading a place reads its location unless it is frame-private.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use super::regions::type_slot_count;
use super::CheckContext;
use crate::config::ForkJoinShape;
use crate::diagnostics::{Category, Diagnostic, Diagnostics};
use crate::effects::{Effect, EffectKind, EffectSet, EffectSummary};
use crate::hir::{Block, CastKind, DeclId, Expr, ExprKind, FunctionDecl, ParamDecl, Stmt, Type};
use crate::rpl::{ParamName, Rpl};
use crate::span::Span;
use crate::subst::Substitution;

/// A call whose callee summary becomes part of the caller's effects.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
    /// Canonical declaration of the callee.
    pub callee: DeclId,
    /// Rewrites the callee's summary into the caller's vocabulary.
    pub subst: Substitution,
    pub span: Span,
}

/// What one body (or closure body) does.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BodyFacts {
    pub effects: Vec<(Effect, Span)>,
    pub calls: Vec<CallSite>,
    /// Some callee or name could not be resolved.
    pub opaque: bool,
}

impl BodyFacts {
    pub fn absorb(&mut self, other: BodyFacts) {
        self.effects.extend(other.effects);
        self.calls.extend(other.calls);
        self.opaque |= other.opaque;
    }

    pub fn map_rpls(&mut self, f: &impl Fn(&Rpl) -> Rpl) {
        for (effect, _) in &mut self.effects {
            *effect = effect.map_rpl(f);
        }
        for call in &mut self.calls {
            call.subst = call.subst.map_rpls(f);
        }
    }

    /// Direct effects plus the substituted summaries of the callees.
    pub fn resolve(&self, summaries: &IndexMap<DeclId, EffectSummary>) -> EffectSet {
        let mut set = EffectSet::new();
        for (effect, span) in &self.effects {
            set.insert(effect.clone(), *span);
        }
        for call in &self.calls {
            if let Some(summary) = summaries.get(&call.callee) {
                for effect in summary.effects() {
                    set.insert(call.subst.apply_effect(effect), call.span);
                }
            }
        }
        set
    }
}

/// A value flowing into a location: each `source` slot must be included in
/// the `target` slot at the same position.
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    pub target: Vec<Rpl>,
    pub source: Vec<Rpl>,
    pub span: Span,
    pub function: DeclId,
}

impl Flow {
    pub fn map_rpls(&mut self, f: &impl Fn(&Rpl) -> Rpl) {
        for rpl in self.target.iter_mut().chain(self.source.iter_mut()) {
            *rpl = f(rpl);
        }
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&Rpl, &Rpl)> {
        self.target.iter().zip(&self.source)
    }
}

/// One concurrent operand of a fork-join call.
#[derive(Debug, Clone, PartialEq)]
pub enum ForkJoinOperand {
    Closure { facts: BodyFacts, span: Span },
    Function { callee: DeclId, subst: Substitution, span: Span },
}

impl ForkJoinOperand {
    pub fn span(&self) -> Span {
        match self {
            Self::Closure { span, .. } | Self::Function { span, .. } => *span,
        }
    }

    pub fn map_rpls(&mut self, f: &impl Fn(&Rpl) -> Rpl) {
        match self {
            Self::Closure { facts, .. } => facts.map_rpls(f),
            Self::Function { subst, .. } => *subst = subst.map_rpls(f),
        }
    }
}

/// A recognized fork-join call.
#[derive(Debug, Clone, PartialEq)]
pub struct ForkJoinSite {
    pub function: DeclId,
    pub callee: String,
    pub shape: ForkJoinShape,
    pub operands: Vec<ForkJoinOperand>,
    pub span: Span,
}

/// Everything collected from a program's bodies.
#[derive(Debug, Clone, Default)]
pub struct Facts {
    /// Keyed by canonical function.
    pub bodies: IndexMap<DeclId, BodyFacts>,
    pub flows: Vec<Flow>,
    pub fork_joins: Vec<ForkJoinSite>,
}

impl Facts {
    pub fn map_rpls(&mut self, f: &impl Fn(&Rpl) -> Rpl) {
        for body in self.bodies.values_mut() {
            body.map_rpls(f);
        }
        for flow in &mut self.flows {
            flow.map_rpls(f);
        }
        for site in &mut self.fork_joins {
            for operand in &mut site.operands {
                operand.map_rpls(f);
            }
        }
    }
}

/// Collect facts from every function definition.
pub fn collect(cx: &CheckContext<'_, '_>, diagnostics: &mut Diagnostics) -> Facts {
    let mut facts = Facts::default();
    for &canonical in cx.index.canonical_functions() {
        for definition in cx.index.definitions(canonical) {
            let Some(function) = cx.index.function(definition) else {
                continue;
            };
            let Some(body) = &function.body else {
                continue;
            };
            let mut collector = BodyCollector::new(cx, diagnostics, definition, function);
            collector.walk_block(body);
            let BodyCollector {
                facts: mut body_facts,
                mut flows,
                mut fork_joins,
                ..
            } = collector;

            // Bodies attached to a redeclaration with its own `param` clause
            // speak that declaration's vocabulary.
            let own = cx.bindings.function_params(definition);
            let contract = cx.bindings.function_params(canonical);
            if cx.bindings.table.param_owner(definition) != cx.bindings.table.param_owner(canonical) {
                let rename = Substitution::positional(own, contract.iter().map(|p| Rpl::param(p.clone())));
                let apply = |rpl: &Rpl| rename.apply(rpl);
                body_facts.map_rpls(&apply);
                flows.iter_mut().for_each(|flow| flow.map_rpls(&apply));
                for site in &mut fork_joins {
                    site.operands.iter_mut().for_each(|operand| operand.map_rpls(&apply));
                }
            }
            for site in &mut fork_joins {
                site.function = canonical;
            }
            for flow in &mut flows {
                flow.function = canonical;
            }

            trace!(
                function = %cx.index.function_key(canonical),
                effects = body_facts.effects.len(),
                calls = body_facts.calls.len(),
                "collected body"
            );
            facts.bodies.entry(canonical).or_default().absorb(body_facts);
            facts.flows.extend(flows);
            facts.fork_joins.extend(fork_joins);
        }
    }
    debug!(
        bodies = facts.bodies.len(),
        flows = facts.flows.len(),
        fork_joins = facts.fork_joins.len(),
        "collected effects"
    );
    facts
}

/// An lvalue.
#[derive(Debug, Clone)]
struct Place {
    ty: Type,
    location: Rpl,
    /// Declared in the current frame: accesses have no effect.
    private: bool,
    slots: Vec<Rpl>,
}

/// An rvalue.
#[derive(Debug, Clone)]
struct Value {
    ty: Type,
    slots: Vec<Rpl>,
    /// An allocation or call result. Its regions are unknown and never
    /// constrain the location it flows into.
    fresh: bool,
}

impl Value {
    fn scalar() -> Self {
        Self {
            ty: Type::Scalar,
            slots: Vec::new(),
            fresh: false,
        }
    }
}

enum Operand {
    Place(Place),
    Value(Value),
    Functions(Vec<DeclId>),
    /// Already diagnosed as unresolvable.
    Opaque,
}

/// The object a method is invoked on or a field is read from.
struct Receiver {
    class: DeclId,
    args: Vec<Rpl>,
}

#[derive(Default)]
struct Frame {
    scopes: Vec<FxHashMap<String, DeclId>>,
}

struct BodyCollector<'x, 'c, 'a> {
    cx: &'x CheckContext<'c, 'a>,
    diagnostics: &'x mut Diagnostics,
    function: DeclId,
    class: Option<DeclId>,
    has_this: bool,
    frames: Vec<Frame>,
    span: Span,
    facts: BodyFacts,
    flows: Vec<Flow>,
    fork_joins: Vec<ForkJoinSite>,
}

impl<'x, 'c, 'a> BodyCollector<'x, 'c, 'a> {
    fn new(
        cx: &'x CheckContext<'c, 'a>,
        diagnostics: &'x mut Diagnostics,
        function: DeclId,
        decl: &FunctionDecl,
    ) -> Self {
        let class = cx.index.owner_class(function);
        let is_static = decl.is_static
            || cx
                .index
                .function(cx.index.canonical(function))
                .is_some_and(|canonical| canonical.is_static);
        let mut collector = Self {
            cx,
            diagnostics,
            function,
            class,
            has_this: class.is_some() && !is_static,
            frames: Vec::new(),
            span: cx.index.get(function).map(|info| info.span).unwrap_or_default(),
            facts: BodyFacts::default(),
            flows: Vec::new(),
            fork_joins: Vec::new(),
        };
        collector.push_frame(&decl.params);
        collector
    }

    // ------------------------------------------------------------------
    // Scopes
    // ------------------------------------------------------------------

    fn push_frame(&mut self, params: &[ParamDecl]) {
        let mut scope = FxHashMap::default();
        for param in params {
            scope.insert(param.name.clone(), param.id);
        }
        self.frames.push(Frame { scopes: vec![scope] });
    }

    fn push_scope(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.scopes.push(FxHashMap::default());
        }
    }

    fn pop_scope(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.scopes.pop();
        }
    }

    fn declare_local(&mut self, name: &str, id: DeclId) {
        if let Some(scope) = self.frames.last_mut().and_then(|frame| frame.scopes.last_mut()) {
            scope.insert(name.to_string(), id);
        }
    }

    /// A parameter or local by name; `true` when captured from an outer frame.
    fn lookup_local(&self, name: &str) -> Option<(DeclId, bool)> {
        for (depth, frame) in self.frames.iter().rev().enumerate() {
            for scope in frame.scopes.iter().rev() {
                if let Some(id) = scope.get(name) {
                    return Some((*id, depth > 0));
                }
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------

    fn report(&mut self, category: Category, message: String) {
        self.diagnostics
            .push(Diagnostic::new(category, message, self.span).with_decl(self.function));
    }

    fn not_implemented(&mut self, message: String) {
        self.facts.opaque = true;
        self.report(Category::NotImplemented, message);
    }

    fn access(&mut self, kind: EffectKind, place: &Place) {
        if !place.private {
            self.facts.effects.push((Effect::new(kind, place.location.clone()), self.span));
        }
    }

    fn flow(&mut self, target: &[Rpl], value: &Value) {
        if value.fresh || target.is_empty() || value.slots.is_empty() {
            return;
        }
        self.flows.push(Flow {
            target: target.to_vec(),
            source: value.slots.clone(),
            span: self.span,
            function: self.function,
        });
    }

    // ------------------------------------------------------------------
    // Types and slots
    // ------------------------------------------------------------------

    fn slot_count(&self, ty: &Type) -> usize {
        type_slot_count(self.cx.index, self.cx.bindings, ty, self.function)
    }

    fn unknown_slots(&self, ty: &Type) -> Vec<Rpl> {
        vec![Rpl::everything(); self.slot_count(ty)]
    }

    fn fit(&self, mut slots: Vec<Rpl>, ty: &Type) -> Vec<Rpl> {
        slots.resize(self.slot_count(ty), Rpl::everything());
        slots
    }

    fn class_of(&self, ty: &Type) -> Option<DeclId> {
        ty.class_name()
            .and_then(|name| self.cx.index.class_named(name, Some(self.function)))
    }

    fn class_params(&self, class: DeclId) -> Vec<Rpl> {
        self.cx
            .bindings
            .class_params(class)
            .iter()
            .map(|p| Rpl::param(p.clone()))
            .collect()
    }

    /// Rewrites members declared in `declaring` as seen through `receiver`.
    fn receiver_subst(&self, receiver: &Receiver, declaring: DeclId) -> Substitution {
        let params = self.cx.bindings.class_params(receiver.class);
        let mut binding = Substitution::positional(params, receiver.args.iter().cloned());
        binding.bind_missing(params, &Rpl::everything());
        let path = self
            .cx
            .graph
            .path_substitution(receiver.class, declaring)
            .unwrap_or_default();
        path.then(&binding)
    }

    /// Class arguments of `to` for an object of class `from`.
    fn upcast_args(&self, from: DeclId, args: &[Rpl], to: DeclId) -> Vec<Rpl> {
        let receiver = Receiver {
            class: from,
            args: args.to_vec(),
        };
        let subst = self.receiver_subst(&receiver, to);
        self.cx
            .bindings
            .class_params(to)
            .iter()
            .map(|q| subst.apply(&Rpl::param(q.clone())))
            .collect()
    }

    /// Convert a value to `to`, rewriting class arguments on upcasts.
    fn convert(&self, value: Value, to: &Type) -> Value {
        if value.fresh {
            return Value {
                ty: to.clone(),
                slots: self.unknown_slots(to),
                fresh: true,
            };
        }
        let indirect = |ty: &Type| matches!(ty, Type::Pointer { .. } | Type::Reference { .. });
        let slots = if indirect(&value.ty) && indirect(to) {
            let from = value.ty.inner().and_then(|t| self.class_of(t));
            let target = to.inner().and_then(|t| self.class_of(t));
            match (from, target) {
                (Some(from), Some(target)) if from != target && self.cx.graph.is_ancestor(target, from) => {
                    let mut slots = vec![value.slots.first().cloned().unwrap_or_else(Rpl::everything)];
                    slots.extend(self.upcast_args(from, value.slots.get(1..).unwrap_or(&[]), target));
                    slots
                }
                _ => self.fit(value.slots, to),
            }
        } else {
            match (self.class_of(&value.ty), self.class_of(to)) {
                (Some(from), Some(target)) if from != target && self.cx.graph.is_ancestor(target, from) => {
                    self.upcast_args(from, &value.slots, target)
                }
                _ => self.fit(value.slots, to),
            }
        };
        Value {
            ty: to.clone(),
            slots,
            fresh: false,
        }
    }

    /// References are transparent: naming one designates its referent.
    fn through_reference(&self, place: Place) -> Place {
        match &place.ty {
            Type::Reference { referent } => {
                let inner = (**referent).clone();
                let mut slots = place.slots.into_iter();
                let location = slots.next().unwrap_or_else(Rpl::everything);
                Place {
                    slots: self.fit(slots.collect(), &inner),
                    ty: inner,
                    location,
                    private: false,
                }
            }
            _ => place,
        }
    }

    fn load(&mut self, place: Place) -> Value {
        if let Type::Array { element } = &place.ty {
            // Arrays decay to a pointer to their first element.
            return Value {
                ty: Type::pointer((**element).clone()),
                slots: place.slots,
                fresh: false,
            };
        }
        self.access(EffectKind::Read, &place);
        Value {
            ty: place.ty,
            slots: place.slots,
            fresh: false,
        }
    }

    fn deref(&self, value: Value) -> Place {
        let inner = value.ty.inner().cloned().unwrap_or(Type::Scalar);
        let mut slots = value.slots.into_iter();
        let location = slots.next().unwrap_or_else(Rpl::everything);
        Place {
            slots: self.fit(slots.collect(), &inner),
            ty: inner,
            location,
            private: false,
        }
    }

    fn address_of(&self, place: Place) -> Value {
        let mut slots = vec![place.location];
        slots.extend(place.slots);
        Value {
            ty: Type::pointer(place.ty),
            slots,
            fresh: false,
        }
    }

    // ------------------------------------------------------------------
    // Name resolution
    // ------------------------------------------------------------------

    /// Qualified spellings of `name` as seen from the current class.
    fn qualified_candidates(&self, name: &str) -> Vec<String> {
        let mut candidates = Vec::new();
        if let Some(class) = self.class {
            for id in std::iter::once(class).chain(self.cx.index.outer_classes(class)) {
                if let Some(info) = self.cx.index.get(id) {
                    candidates.push(format!("{}::{name}", info.qualified));
                }
            }
        }
        candidates.push(name.to_string());
        candidates
    }

    fn local_place(&self, id: DeclId, captured: bool) -> Option<Place> {
        let info = self.cx.index.get(id)?;
        let ty = info.value_type()?.clone();
        let args = self.cx.regions.get(id)?;
        let place = if info.has_static_storage() {
            Place {
                location: args.storage.clone().unwrap_or_else(Rpl::global),
                private: false,
                slots: args.slots.clone(),
                ty,
            }
        } else {
            Place {
                location: Rpl::local_var(info.name, id),
                private: !captured,
                slots: args.slots.clone(),
                ty,
            }
        };
        Some(self.through_reference(place))
    }

    fn this_value(&self) -> Option<Value> {
        let class = self.class.filter(|_| self.has_this)?;
        let name = self.cx.index.get(class)?.qualified.clone();
        let mut slots = vec![Rpl::everything()];
        slots.extend(self.class_params(class));
        Some(Value {
            ty: Type::pointer(Type::class(name)),
            slots,
            fresh: false,
        })
    }

    fn find_field(&self, class: DeclId, name: &str) -> Option<(DeclId, DeclId)> {
        std::iter::once(class)
            .chain(self.cx.index.ancestors(class))
            .find_map(|c| self.cx.index.field(c, name).map(|field| (c, field)))
    }

    fn find_methods(&self, class: DeclId, name: &str) -> Option<(DeclId, Vec<DeclId>)> {
        std::iter::once(class)
            .chain(self.cx.index.ancestors(class))
            .find_map(|c| {
                let methods = self.cx.index.methods(c, name);
                (!methods.is_empty()).then_some((c, methods))
            })
    }

    fn field_place(&mut self, object: Place, field_name: &str) -> Operand {
        let Some(class) = self.class_of(&object.ty) else {
            self.not_implemented(format!("member access `.{field_name}` on a value of type `{}`", object.ty));
            return Operand::Opaque;
        };
        let Some((declaring, field)) = self.find_field(class, field_name) else {
            self.not_implemented(format!("unknown field `{field_name}`"));
            return Operand::Opaque;
        };
        let (Some(info), Some(args)) = (self.cx.index.get(field), self.cx.regions.get(field)) else {
            return Operand::Opaque;
        };
        let Some(ty) = info.value_type().cloned() else {
            return Operand::Opaque;
        };
        let receiver = Receiver {
            class,
            args: object.slots,
        };
        let subst = self.receiver_subst(&receiver, declaring);
        let place = Place {
            ty,
            location: subst.apply(args.storage.as_ref().unwrap_or(&Rpl::global())),
            private: false,
            slots: subst.apply_all(&args.slots),
        };
        Operand::Place(self.through_reference(place))
    }

    fn resolve_name(&mut self, name: &str) -> Operand {
        if let Some((id, captured)) = self.lookup_local(name) {
            return match self.local_place(id, captured) {
                Some(place) => Operand::Place(place),
                None => Operand::Opaque,
            };
        }
        if let Some(class) = self.class {
            if self.find_field(class, name).is_some() {
                if let Some(this) = self.this_value() {
                    let object = self.deref(this);
                    return self.field_place(object, name);
                }
            }
        }
        for candidate in self.qualified_candidates(name) {
            if let Some(id) = self.cx.index.global(&candidate) {
                if let Some(place) = self.local_place(id, false) {
                    return Operand::Place(place);
                }
            }
        }
        if let Some(functions) = self.resolve_functions(name) {
            return Operand::Functions(functions);
        }
        self.not_implemented(format!("cannot resolve `{name}`"));
        Operand::Opaque
    }

    /// Free functions, static members or methods of the current class.
    fn resolve_functions(&self, name: &str) -> Option<Vec<DeclId>> {
        if let Some(class) = self.class {
            if let Some((_, methods)) = self.find_methods(class, name) {
                return Some(methods);
            }
        }
        self.qualified_candidates(name).into_iter().find_map(|candidate| {
            let functions = self.cx.index.functions_named(&candidate);
            (!functions.is_empty()).then(|| functions.to_vec())
        })
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn walk_block(&mut self, block: &Block) {
        self.push_scope();
        for stmt in &block.stmts {
            self.walk_stmt(stmt);
        }
        self.pop_scope();
    }

    fn walk_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr { expr } => {
                self.operand(expr);
            }
            Stmt::Local(local) => {
                let saved = self.enter_span(local.span);
                if let Some(init) = &local.init {
                    let target = self.cx.regions.get(local.id).map(|args| args.slots.clone()).unwrap_or_default();
                    let source = if local.ty.is_reference() {
                        match self.operand(init) {
                            Operand::Place(place) => self.address_of(place),
                            Operand::Value(value) => value,
                            Operand::Functions(_) | Operand::Opaque => Value::scalar(),
                        }
                    } else {
                        let value = self.value(init);
                        self.convert(value, &local.ty)
                    };
                    self.flow(&target, &source);
                }
                self.declare_local(&local.name, local.id);
                self.span = saved;
            }
            Stmt::Block(block) => self.walk_block(block),
            Stmt::If { cond, then, otherwise } => {
                self.value(cond);
                self.walk_block(then);
                if let Some(otherwise) = otherwise {
                    self.walk_block(otherwise);
                }
            }
            Stmt::While { cond, body } => {
                self.value(cond);
                self.walk_block(body);
            }
            Stmt::Return { value } => {
                if let Some(value) = value {
                    self.value(value);
                }
            }
        }
    }

    fn walk_closure(&mut self, params: &[ParamDecl], body: &Block) -> BodyFacts {
        let outer = std::mem::take(&mut self.facts);
        self.push_frame(params);
        self.walk_block(body);
        self.frames.pop();
        std::mem::replace(&mut self.facts, outer)
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn enter_span(&mut self, span: Span) -> Span {
        if span.is_dummy() {
            self.span
        } else {
            std::mem::replace(&mut self.span, span)
        }
    }

    fn value(&mut self, expr: &Expr) -> Value {
        let saved = self.enter_span(expr.span);
        let value = match self.operand(expr) {
            Operand::Place(place) => self.load(place),
            Operand::Value(value) => value,
            Operand::Functions(_) | Operand::Opaque => Value::scalar(),
        };
        self.span = saved;
        value
    }

    fn place(&mut self, expr: &Expr) -> Option<Place> {
        match self.operand(expr) {
            Operand::Place(place) => Some(place),
            _ => None,
        }
    }

    fn operand(&mut self, expr: &Expr) -> Operand {
        let saved = self.enter_span(expr.span);
        let operand = self.operand_kind(&expr.kind);
        self.span = saved;
        operand
    }

    fn operand_kind(&mut self, kind: &ExprKind) -> Operand {
        match kind {
            ExprKind::Literal => Operand::Value(Value::scalar()),
            ExprKind::Name { name } => self.resolve_name(name),
            ExprKind::This => match self.this_value() {
                Some(this) => Operand::Value(this),
                None => {
                    self.not_implemented("`this` outside a member function".to_string());
                    Operand::Opaque
                }
            },
            ExprKind::Member { base, field, arrow } => {
                let object = if *arrow {
                    let pointer = self.value(base);
                    self.deref(pointer)
                } else {
                    match self.operand(base) {
                        Operand::Place(place) => place,
                        Operand::Value(value) => Place {
                            ty: value.ty,
                            location: Rpl::local(),
                            private: true,
                            slots: value.slots,
                        },
                        Operand::Functions(_) | Operand::Opaque => return Operand::Opaque,
                    }
                };
                self.field_place(object, field)
            }
            ExprKind::Deref { operand } => {
                let pointer = self.value(operand);
                Operand::Place(self.deref(pointer))
            }
            ExprKind::AddressOf { operand } => match self.operand(operand) {
                Operand::Place(place) => Operand::Value(self.address_of(place)),
                Operand::Value(value) => Operand::Value(value),
                Operand::Functions(_) => Operand::Value(Value::scalar()),
                Operand::Opaque => Operand::Opaque,
            },
            ExprKind::Index { base, index } => {
                self.value(index);
                match self.operand(base) {
                    Operand::Place(place) if matches!(place.ty, Type::Array { .. }) => {
                        let element = place.ty.inner().cloned().unwrap_or(Type::Scalar);
                        let mut slots = place.slots.into_iter();
                        let location = slots.next().unwrap_or_else(Rpl::everything);
                        Operand::Place(Place {
                            slots: self.fit(slots.collect(), &element),
                            ty: element,
                            location,
                            private: false,
                        })
                    }
                    Operand::Place(place) => {
                        let pointer = self.load(place);
                        Operand::Place(self.deref(pointer))
                    }
                    Operand::Value(pointer) => Operand::Place(self.deref(pointer)),
                    Operand::Functions(_) | Operand::Opaque => Operand::Opaque,
                }
            }
            ExprKind::Assign { target, value, compound } => {
                let value = self.value(value);
                let Some(target) = self.place(target) else {
                    return Operand::Value(Value::scalar());
                };
                if *compound {
                    self.access(EffectKind::Read, &target);
                    self.access(EffectKind::Write, &target);
                } else {
                    self.access(EffectKind::Write, &target);
                    let value = self.convert(value, &target.ty);
                    self.flow(&target.slots, &value);
                }
                Operand::Value(Value {
                    ty: target.ty,
                    slots: target.slots,
                    fresh: false,
                })
            }
            ExprKind::Increment { target } => {
                if let Some(target) = self.place(target) {
                    self.access(EffectKind::Read, &target);
                    self.access(EffectKind::Write, &target);
                    return Operand::Value(Value {
                        ty: target.ty,
                        slots: target.slots,
                        fresh: false,
                    });
                }
                Operand::Value(Value::scalar())
            }
            ExprKind::Unary { operand } => {
                self.value(operand);
                Operand::Value(Value::scalar())
            }
            ExprKind::Binary { lhs, rhs } => {
                let lhs = self.value(lhs);
                let rhs = self.value(rhs);
                // Pointer arithmetic keeps the pointer's regions.
                let result = match (&lhs.ty, &rhs.ty) {
                    (Type::Pointer { .. }, _) => lhs,
                    (_, Type::Pointer { .. }) => rhs,
                    _ => Value::scalar(),
                };
                Operand::Value(result)
            }
            ExprKind::Call { callee, args } => Operand::Value(self.call(callee, args)),
            ExprKind::MethodCall {
                receiver,
                method,
                arrow,
                args,
            } => Operand::Value(self.method_call(receiver, method, *arrow, args)),
            ExprKind::New { ty, args } => {
                for arg in args {
                    self.value(arg);
                }
                let ty = Type::pointer(ty.clone());
                Operand::Value(Value {
                    slots: self.unknown_slots(&ty),
                    ty,
                    fresh: true,
                })
            }
            ExprKind::Delete { operand } => {
                let pointer = self.value(operand);
                let freed = self.deref(pointer);
                // Deallocation is modeled as a read of the freed object.
                self.access(EffectKind::Read, &freed);
                Operand::Value(Value::scalar())
            }
            ExprKind::Cast { operand, to, kind } => {
                let value = self.value(operand);
                match kind {
                    CastKind::Upcast | CastKind::Value => Operand::Value(self.convert(value, to)),
                    CastKind::Reinterpret => {
                        self.not_implemented(format!("reinterpreting cast to `{to}`"));
                        Operand::Value(Value {
                            slots: self.unknown_slots(to),
                            ty: to.clone(),
                            fresh: false,
                        })
                    }
                }
            }
            ExprKind::Lambda { params, body } => {
                let facts = self.walk_closure(params, body);
                self.facts.absorb(facts);
                Operand::Value(Value::scalar())
            }
        }
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    fn call(&mut self, callee: &Expr, args: &[Expr]) -> Value {
        let ExprKind::Name { name } = &callee.kind else {
            self.value(callee);
            self.not_implemented("call through a computed callee".to_string());
            return self.discard_args(args);
        };
        if let Some(shape) = self.cx.config.fork_join_shape(name) {
            return self.fork_join(name, shape, args);
        }
        if self.lookup_local(name).is_some() {
            self.value(callee);
            self.not_implemented(format!("call through variable `{name}`"));
            return self.discard_args(args);
        }

        if let Some(class) = self.class {
            if let Some((declaring, methods)) = self.find_methods(class, name) {
                let receiver = self.has_this.then(|| Receiver {
                    class,
                    args: self.class_params(class),
                });
                return self.emit_call(name, &methods, receiver.map(|r| (r, declaring)), args);
            }
        }
        match self.resolve_functions(name) {
            Some(functions) => self.emit_call(name, &functions, None, args),
            None => {
                self.not_implemented(format!("call to unknown function `{name}`"));
                self.discard_args(args)
            }
        }
    }

    fn method_call(&mut self, receiver: &Expr, method: &str, arrow: bool, args: &[Expr]) -> Value {
        let object = if arrow {
            let pointer = self.value(receiver);
            Some(self.deref(pointer))
        } else {
            match self.operand(receiver) {
                Operand::Place(place) => Some(place),
                Operand::Value(value) => Some(Place {
                    ty: value.ty,
                    location: Rpl::local(),
                    private: true,
                    slots: value.slots,
                }),
                Operand::Functions(_) | Operand::Opaque => None,
            }
        };
        let Some(object) = object else {
            self.facts.opaque = true;
            return self.discard_args(args);
        };
        let Some(class) = self.class_of(&object.ty) else {
            self.not_implemented(format!("method call `{method}` on a value of type `{}`", object.ty));
            return self.discard_args(args);
        };
        let Some((declaring, methods)) = self.find_methods(class, method) else {
            self.not_implemented(format!("unknown method `{method}`"));
            return self.discard_args(args);
        };
        let receiver = Receiver {
            class,
            args: object.slots,
        };
        self.emit_call(method, &methods, Some((receiver, declaring)), args)
    }

    fn discard_args(&mut self, args: &[Expr]) -> Value {
        for arg in args {
            self.value(arg);
        }
        Value::scalar()
    }

    /// Strip `tail` from the end of `actual`, so that a formal `P:Rx` bound
    /// to an actual `A:B:Rx` binds `P` to `A:B`.
    fn strip_tail(actual: &Rpl, tail: &[crate::rpl::RplElement]) -> Rpl {
        if tail.is_empty() {
            return actual.clone();
        }
        let elements = actual.elements();
        if elements.len() > tail.len() && elements.ends_with(tail) {
            Rpl::new(elements[..elements.len() - tail.len()].to_vec())
        } else {
            Rpl::everything()
        }
    }

    fn emit_call(
        &mut self,
        name: &str,
        candidates: &[DeclId],
        receiver: Option<(Receiver, DeclId)>,
        args: &[Expr],
    ) -> Value {
        let index = self.cx.index;
        let chosen = candidates
            .iter()
            .copied()
            .find(|id| index.function(*id).is_some_and(|f| f.params.len() == args.len()))
            .or_else(|| (candidates.len() == 1).then(|| candidates[0]));
        let Some(callee) = chosen else {
            self.not_implemented(format!("no overload of `{name}` takes {} argument(s)", args.len()));
            return self.discard_args(args);
        };
        let Some(decl) = index.function(callee) else {
            return self.discard_args(args);
        };

        // Evaluate the arguments against the formal parameters.
        let mut actuals: Vec<(Value, Vec<Rpl>)> = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let formal = decl.params.get(i);
            let formal_slots = formal
                .and_then(|p| self.cx.regions.get(p.id))
                .map(|a| a.slots.clone())
                .unwrap_or_default();
            let value = match formal.map(|p| &p.ty) {
                Some(ty) if ty.is_reference() => match self.operand(arg) {
                    Operand::Place(place) => self.address_of(place),
                    Operand::Value(value) => value,
                    Operand::Functions(_) | Operand::Opaque => Value::scalar(),
                },
                Some(ty) => {
                    let value = self.value(arg);
                    self.convert(value, ty)
                }
                None => self.value(arg),
            };
            actuals.push((value, formal_slots));
        }

        // Function region parameters bound from the argument slots.
        let function_params: Vec<ParamName> = self.cx.bindings.function_params(callee).to_vec();
        let mut function_binding = Substitution::new();
        for (value, formal_slots) in &actuals {
            if value.fresh {
                continue;
            }
            for (formal, actual) in formal_slots.iter().zip(&value.slots) {
                if let Some(param) = formal.head_param() {
                    if function_params.contains(param) {
                        function_binding.bind(param.clone(), Self::strip_tail(actual, formal.tail()));
                    }
                }
            }
        }
        function_binding.bind_missing(&function_params, &Rpl::everything());

        // Class region parameters bound from the receiver.
        let mut class_binding = match &receiver {
            Some((receiver, declaring)) => self.receiver_subst(receiver, *declaring),
            None => Substitution::new(),
        };
        if let Some(owner) = index.owner_class(callee) {
            for class in std::iter::once(owner).chain(index.outer_classes(owner)) {
                class_binding.bind_missing(self.cx.bindings.class_params(class), &Rpl::everything());
            }
        }
        let subst = function_binding.union(&class_binding);

        for (value, formal_slots) in &actuals {
            let target = subst.apply_all(formal_slots);
            self.flow(&target, value);
        }
        self.facts.calls.push(CallSite {
            callee,
            subst,
            span: self.span,
        });

        Value {
            slots: self.unknown_slots(&decl.ret),
            ty: decl.ret.clone(),
            fresh: true,
        }
    }

    // ------------------------------------------------------------------
    // Fork-join
    // ------------------------------------------------------------------

    fn fork_join(&mut self, callee: &str, shape: ForkJoinShape, args: &[Expr]) -> Value {
        let (leading, operands, required) = match shape {
            ForkJoinShape::Invoke => (&[][..], args, 2),
            ForkJoinShape::ParallelFor => match args.split_last() {
                Some((last, rest)) => (rest, std::slice::from_ref(last), 1),
                None => (&[][..], &[][..], 1),
            },
        };
        for arg in leading {
            self.value(arg);
        }
        if operands.len() < required {
            self.report(
                Category::InvalidCallArgument,
                format!(
                    "`{callee}` needs at least {required} concurrent operand(s), found {}",
                    operands.len()
                ),
            );
            return self.discard_args(operands);
        }

        let mut checked = Vec::with_capacity(operands.len());
        for arg in operands {
            let saved = self.enter_span(arg.span);
            if let Some(operand) = self.fork_join_operand(callee, arg) {
                checked.push(operand);
            }
            self.span = saved;
        }
        self.fork_joins.push(ForkJoinSite {
            function: self.function,
            callee: callee.to_string(),
            shape,
            operands: checked,
            span: self.span,
        });
        Value::scalar()
    }

    fn fork_join_operand(&mut self, callee: &str, arg: &Expr) -> Option<ForkJoinOperand> {
        match &arg.kind {
            ExprKind::Lambda { params, body } => {
                let facts = self.walk_closure(params, body);
                self.facts.absorb(facts.clone());
                Some(ForkJoinOperand::Closure { facts, span: self.span })
            }
            ExprKind::Literal => {
                self.report(
                    Category::InvalidCallArgument,
                    format!("operand of `{callee}` is a literal, not a callable"),
                );
                None
            }
            ExprKind::Name { name } if self.lookup_local(name).is_none() => match self.resolve_name(name) {
                Operand::Functions(functions) => self.function_operand(callee, &functions),
                Operand::Place(place) => {
                    self.callable_object(callee, &place.ty);
                    None
                }
                Operand::Value(value) => {
                    self.callable_object(callee, &value.ty);
                    None
                }
                Operand::Opaque => None,
            },
            _ => {
                let ty = match self.operand(arg) {
                    Operand::Place(place) => Some(place.ty),
                    Operand::Value(value) => Some(value.ty),
                    Operand::Functions(_) | Operand::Opaque => None,
                };
                if let Some(ty) = ty {
                    self.callable_object(callee, &ty);
                }
                None
            }
        }
    }

    fn callable_object(&mut self, callee: &str, ty: &Type) {
        if ty.is_scalar() {
            self.report(
                Category::InvalidCallArgument,
                format!("operand of `{callee}` has scalar type and is not callable"),
            );
        } else {
            self.not_implemented(format!("operand of `{callee}` of type `{ty}` is not a closure or function"));
        }
    }

    fn function_operand(&mut self, callee: &str, functions: &[DeclId]) -> Option<ForkJoinOperand> {
        let index = self.cx.index;
        let chosen = functions
            .iter()
            .copied()
            .find(|id| index.function(*id).is_some_and(|f| f.params.is_empty()));
        let Some(function) = chosen else {
            self.report(
                Category::InvalidCallArgument,
                format!("operand of `{callee}` must be callable without arguments"),
            );
            return None;
        };
        if index.owner_class(function).is_some() && index.function(function).is_some_and(|f| !f.is_static) {
            self.not_implemented(format!("member function `{}` as a fork-join operand", index.function_key(function)));
            return None;
        }
        let mut subst = Substitution::new();
        subst.bind_missing(self.cx.bindings.function_params(function), &Rpl::everything());
        self.facts.calls.push(CallSite {
            callee: function,
            subst: subst.clone(),
            span: self.span,
        });
        Some(ForkJoinOperand::Function {
            callee: function,
            subst,
            span: self.span,
        })
    }
}
