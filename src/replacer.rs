//! Call-site discovery and template substitution.
//!
//! Walks a module's AST, finds every site that refers to a construct in the
//! active replacement set, and produces a [`Candidate`] per site: the byte
//! span to replace and the substituted text to splice in. Argument texts are
//! cut verbatim from the source, so caller-side formatting survives.
//!
//! Children are visited before their parent call. When a matched call is
//! nested inside another matched call, the inner candidate is folded into
//! the outer one's bound argument text, so the final candidate list is
//! always non-overlapping and one pass fully migrates nested chains.

use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, Result};
use regex::Regex;
use rustpython_parser::{ast, Parse};

use crate::collector::{decorator_name, MARKER_NAME};
use crate::model::{ActiveReplacementSet, ConstructKind, ReplacementTemplate, Span};

/// One replaceable site found in the source.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Name the site was matched under.
    pub name: String,
    pub span: Span,
    /// Original text of the span, kept for prompts and diffs.
    pub old_text: String,
    pub new_text: String,
    /// Substitution was best-effort: surplus arguments passed through or a
    /// placeholder left unbound.
    pub degraded: bool,
}

/// Finds every candidate in `source` for the given templates, in document
/// order. Bodies of definitions that themselves carry the marker are not
/// visited, so running the result through migration again is a no-op.
pub fn find_candidates(
    source: &str,
    templates: &ActiveReplacementSet,
) -> Result<Vec<Candidate>> {
    let suite = ast::Suite::parse(source, "<source>")
        .map_err(|err| anyhow!("failed to parse source: {err}"))?;

    let mut walker = Walker {
        source,
        templates,
        candidates: Vec::new(),
        placeholder: Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .expect("placeholder pattern is fixed"),
    };
    for stmt in &suite {
        walker.visit_stmt(stmt);
    }

    let mut candidates = walker.candidates;
    candidates.sort_by_key(|c| c.span.start);
    Ok(candidates)
}

struct Walker<'a> {
    source: &'a str,
    templates: &'a ActiveReplacementSet,
    candidates: Vec<Candidate>,
    placeholder: Regex,
}

impl<'a> Walker<'a> {
    fn visit_stmt(&mut self, stmt: &ast::Stmt) {
        match stmt {
            ast::Stmt::FunctionDef(def) => {
                if !has_marker(&def.decorator_list) {
                    self.visit_body(&def.body);
                }
            }
            ast::Stmt::AsyncFunctionDef(def) => {
                if !has_marker(&def.decorator_list) {
                    self.visit_body(&def.body);
                }
            }
            ast::Stmt::ClassDef(def) => {
                if !has_marker(&def.decorator_list) {
                    self.visit_body(&def.body);
                }
            }
            ast::Stmt::Return(ret) => {
                if let Some(value) = ret.value.as_deref() {
                    self.visit_expr(value);
                }
            }
            ast::Stmt::Delete(del) => self.visit_exprs(&del.targets),
            ast::Stmt::Assign(assign) => {
                self.visit_expr(&assign.value);
                self.visit_exprs(&assign.targets);
            }
            ast::Stmt::AugAssign(assign) => {
                self.visit_expr(&assign.value);
                self.visit_expr(&assign.target);
            }
            ast::Stmt::AnnAssign(assign) => {
                if let Some(value) = assign.value.as_deref() {
                    self.visit_expr(value);
                }
                self.visit_expr(&assign.target);
            }
            ast::Stmt::For(stmt) => {
                self.visit_expr(&stmt.iter);
                self.visit_expr(&stmt.target);
                self.visit_body(&stmt.body);
                self.visit_body(&stmt.orelse);
            }
            ast::Stmt::AsyncFor(stmt) => {
                self.visit_expr(&stmt.iter);
                self.visit_expr(&stmt.target);
                self.visit_body(&stmt.body);
                self.visit_body(&stmt.orelse);
            }
            ast::Stmt::While(stmt) => {
                self.visit_expr(&stmt.test);
                self.visit_body(&stmt.body);
                self.visit_body(&stmt.orelse);
            }
            ast::Stmt::If(stmt) => {
                self.visit_expr(&stmt.test);
                self.visit_body(&stmt.body);
                self.visit_body(&stmt.orelse);
            }
            ast::Stmt::With(stmt) => {
                for item in &stmt.items {
                    self.visit_expr(&item.context_expr);
                    if let Some(vars) = &item.optional_vars {
                        self.visit_expr(vars);
                    }
                }
                self.visit_body(&stmt.body);
            }
            ast::Stmt::AsyncWith(stmt) => {
                for item in &stmt.items {
                    self.visit_expr(&item.context_expr);
                    if let Some(vars) = &item.optional_vars {
                        self.visit_expr(vars);
                    }
                }
                self.visit_body(&stmt.body);
            }
            ast::Stmt::Match(stmt) => {
                self.visit_expr(&stmt.subject);
                for case in &stmt.cases {
                    if let Some(guard) = case.guard.as_deref() {
                        self.visit_expr(guard);
                    }
                    self.visit_body(&case.body);
                }
            }
            ast::Stmt::Raise(stmt) => {
                if let Some(exc) = stmt.exc.as_deref() {
                    self.visit_expr(exc);
                }
                if let Some(cause) = stmt.cause.as_deref() {
                    self.visit_expr(cause);
                }
            }
            ast::Stmt::Try(stmt) => {
                self.visit_body(&stmt.body);
                for handler in &stmt.handlers {
                    let ast::ExceptHandler::ExceptHandler(handler) = handler;
                    if let Some(type_) = handler.type_.as_deref() {
                        self.visit_expr(type_);
                    }
                    self.visit_body(&handler.body);
                }
                self.visit_body(&stmt.orelse);
                self.visit_body(&stmt.finalbody);
            }
            ast::Stmt::Assert(stmt) => {
                self.visit_expr(&stmt.test);
                if let Some(msg) = stmt.msg.as_deref() {
                    self.visit_expr(msg);
                }
            }
            ast::Stmt::Expr(stmt) => self.visit_expr(&stmt.value),
            _ => {}
        }
    }

    fn visit_body(&mut self, body: &[ast::Stmt]) {
        for stmt in body {
            self.visit_stmt(stmt);
        }
    }

    fn visit_exprs(&mut self, exprs: &[ast::Expr]) {
        for expr in exprs {
            self.visit_expr(expr);
        }
    }

    fn visit_expr(&mut self, expr: &ast::Expr) {
        match expr {
            ast::Expr::Call(call) => {
                self.visit_call_children(call);
                if let Some(candidate) = self.try_call_candidate(call, Span::of(call)) {
                    self.candidates.push(candidate);
                }
            }
            ast::Expr::Await(awaited) => {
                if let ast::Expr::Call(call) = awaited.value.as_ref() {
                    self.visit_call_children(call);
                    if let Some(mut candidate) = self.try_call_candidate(call, Span::of(call)) {
                        // The template already awaits; widen the span so the
                        // site keeps a single `await`.
                        if candidate.new_text.starts_with("await ") {
                            let outer = Span::of(awaited);
                            candidate.old_text = outer.text(self.source).to_string();
                            candidate.span = outer;
                        }
                        self.candidates.push(candidate);
                    }
                } else {
                    self.visit_expr(&awaited.value);
                }
            }
            ast::Expr::Attribute(attr) => {
                self.visit_expr(&attr.value);
                if matches!(attr.ctx, ast::ExprContext::Load) {
                    if let Some(candidate) = self.try_attribute_candidate(attr) {
                        self.candidates.push(candidate);
                    }
                }
            }
            ast::Expr::Name(name) => {
                if matches!(name.ctx, ast::ExprContext::Load) {
                    if let Some(candidate) = self.try_name_candidate(name) {
                        self.candidates.push(candidate);
                    }
                }
            }
            ast::Expr::BoolOp(op) => self.visit_exprs(&op.values),
            ast::Expr::NamedExpr(named) => {
                self.visit_expr(&named.value);
                self.visit_expr(&named.target);
            }
            ast::Expr::BinOp(op) => {
                self.visit_expr(&op.left);
                self.visit_expr(&op.right);
            }
            ast::Expr::UnaryOp(op) => self.visit_expr(&op.operand),
            ast::Expr::Lambda(lambda) => self.visit_expr(&lambda.body),
            ast::Expr::IfExp(ifexp) => {
                self.visit_expr(&ifexp.test);
                self.visit_expr(&ifexp.body);
                self.visit_expr(&ifexp.orelse);
            }
            ast::Expr::Dict(dict) => {
                for key in dict.keys.iter().flatten() {
                    self.visit_expr(key);
                }
                self.visit_exprs(&dict.values);
            }
            ast::Expr::Set(set) => self.visit_exprs(&set.elts),
            ast::Expr::ListComp(comp) => {
                self.visit_expr(&comp.elt);
                self.visit_generators(&comp.generators);
            }
            ast::Expr::SetComp(comp) => {
                self.visit_expr(&comp.elt);
                self.visit_generators(&comp.generators);
            }
            ast::Expr::DictComp(comp) => {
                self.visit_expr(&comp.key);
                self.visit_expr(&comp.value);
                self.visit_generators(&comp.generators);
            }
            ast::Expr::GeneratorExp(comp) => {
                self.visit_expr(&comp.elt);
                self.visit_generators(&comp.generators);
            }
            ast::Expr::Yield(yielded) => {
                if let Some(value) = yielded.value.as_deref() {
                    self.visit_expr(value);
                }
            }
            ast::Expr::YieldFrom(yielded) => self.visit_expr(&yielded.value),
            ast::Expr::Compare(cmp) => {
                self.visit_expr(&cmp.left);
                self.visit_exprs(&cmp.comparators);
            }
            ast::Expr::FormattedValue(value) => self.visit_expr(&value.value),
            ast::Expr::JoinedStr(joined) => self.visit_exprs(&joined.values),
            ast::Expr::Subscript(sub) => {
                self.visit_expr(&sub.value);
                self.visit_expr(&sub.slice);
            }
            ast::Expr::Starred(starred) => self.visit_expr(&starred.value),
            ast::Expr::List(list) => self.visit_exprs(&list.elts),
            ast::Expr::Tuple(tuple) => self.visit_exprs(&tuple.elts),
            ast::Expr::Slice(slice) => {
                if let Some(lower) = slice.lower.as_deref() {
                    self.visit_expr(lower);
                }
                if let Some(upper) = slice.upper.as_deref() {
                    self.visit_expr(upper);
                }
                if let Some(step) = slice.step.as_deref() {
                    self.visit_expr(step);
                }
            }
            _ => {}
        }
    }

    fn visit_generators(&mut self, generators: &[ast::Comprehension]) {
        for generator in generators {
            self.visit_expr(&generator.iter);
            self.visit_expr(&generator.target);
            self.visit_exprs(&generator.ifs);
        }
    }

    /// Visits a call's children without matching the callee name itself: a
    /// property or attribute template must never hijack the `.name` of a
    /// call it does not own.
    fn visit_call_children(&mut self, call: &ast::ExprCall) {
        match call.func.as_ref() {
            // A module attribute naming a callable may itself be the callee.
            ast::Expr::Name(name) => {
                if let Some(candidate) = self.try_name_candidate(name) {
                    self.candidates.push(candidate);
                }
            }
            ast::Expr::Attribute(attr) => self.visit_expr(&attr.value),
            other => self.visit_expr(other),
        }
        for arg in &call.args {
            self.visit_expr(arg);
        }
        for keyword in &call.keywords {
            self.visit_expr(&keyword.value);
        }
    }

    fn try_call_candidate(&mut self, call: &ast::ExprCall, span: Span) -> Option<Candidate> {
        let (name, receiver_span) = match call.func.as_ref() {
            ast::Expr::Name(n) => (n.id.to_string(), None),
            ast::Expr::Attribute(a) => (a.attr.to_string(), Some(Span::of(a.value.as_ref()))),
            _ => return None,
        };
        let template = self.templates.get(&name)?;
        if !matches!(
            template.kind,
            ConstructKind::Function
                | ConstructKind::AsyncFunction
                | ConstructKind::Classmethod
                | ConstructKind::Staticmethod
                | ConstructKind::Class
        ) {
            return None;
        }
        let template = template.clone();

        // Pull out candidates already found inside this call; their spans
        // would overlap ours, so they are folded into the bound texts.
        let inner = self.take_contained(span);

        let mut bindings: HashMap<String, String> = HashMap::new();
        if let (Some(recv), Some(recv_span)) = (template.kind.receiver(), receiver_span) {
            bindings.insert(recv.to_string(), self.folded_text(recv_span, &inner));
        }

        let mut extras: Vec<String> = Vec::new();
        let mut positional = template.positional.iter();
        let mut seen_star = false;
        for arg in &call.args {
            let text = self.folded_text(Span::of(arg), &inner);
            if matches!(arg, ast::Expr::Starred(_)) {
                seen_star = true;
                extras.push(text);
                continue;
            }
            match (seen_star, positional.next()) {
                (false, Some(param)) => {
                    bindings.insert(param.clone(), text);
                }
                _ => extras.push(text),
            }
        }
        for keyword in &call.keywords {
            let text = self.folded_text(Span::of(&keyword.value), &inner);
            match keyword.arg.as_ref().map(|a| a.as_str()) {
                Some(param)
                    if template.positional.iter().any(|p| p == param)
                        || template.keyword_only.iter().any(|p| p == param) =>
                {
                    bindings.insert(param.to_string(), text);
                }
                Some(param) => extras.push(format!("{param}={text}")),
                None => extras.push(format!("**{text}")),
            }
        }

        let mut degraded = !extras.is_empty();
        let mut new_text = self.substitute(&template, &bindings, &mut degraded);
        if !extras.is_empty() {
            match append_extras(&new_text, &extras) {
                Some(text) => new_text = text,
                None => {
                    // Nowhere to pass the surplus arguments; leave the site
                    // alone rather than drop them silently.
                    self.candidates.extend(inner);
                    return None;
                }
            }
        }

        if !parses_as_expression(&new_text) {
            self.candidates.extend(inner);
            return None;
        }

        Some(Candidate {
            name,
            span,
            old_text: span.text(self.source).to_string(),
            new_text,
            degraded,
        })
    }

    /// Bare attribute access: class attributes (`Config.OLD`) and
    /// properties (`obj.old_prop`).
    fn try_attribute_candidate(&mut self, attr: &ast::ExprAttribute) -> Option<Candidate> {
        let span = Span::of(attr);

        if let ast::Expr::Name(value) = attr.value.as_ref() {
            let qualified = format!("{}.{}", value.id, attr.attr);
            if let Some(template) = self.templates.get(&qualified) {
                if template.kind == ConstructKind::ClassAttribute {
                    let expr = template.expr.clone();
                    // The full span replacement subsumes anything matched
                    // inside it.
                    let inner = self.take_contained(span);
                    let candidate = self.plain_candidate(qualified, span, expr);
                    if candidate.is_none() {
                        self.candidates.extend(inner);
                    }
                    return candidate;
                }
            }
        }

        let template = self.templates.get(attr.attr.as_str())?;
        if template.kind != ConstructKind::Property {
            return None;
        }
        let template = template.clone();
        let inner = self.take_contained(span);
        let mut bindings = HashMap::new();
        if let Some(recv) = template.kind.receiver() {
            bindings.insert(
                recv.to_string(),
                self.folded_text(Span::of(attr.value.as_ref()), &inner),
            );
        }
        let mut degraded = false;
        let new_text = self.substitute(&template, &bindings, &mut degraded);
        if !parses_as_expression(&new_text) {
            self.candidates.extend(inner);
            return None;
        }
        Some(Candidate {
            name: attr.attr.to_string(),
            span,
            old_text: span.text(self.source).to_string(),
            new_text,
            degraded,
        })
    }

    fn try_name_candidate(&mut self, name: &ast::ExprName) -> Option<Candidate> {
        let template = self.templates.get(name.id.as_str())?;
        if template.kind != ConstructKind::ModuleAttribute {
            return None;
        }
        self.plain_candidate(name.id.to_string(), Span::of(name), template.expr.clone())
    }

    fn plain_candidate(&self, name: String, span: Span, new_text: String) -> Option<Candidate> {
        if !parses_as_expression(&new_text) {
            return None;
        }
        Some(Candidate {
            name,
            span,
            old_text: span.text(self.source).to_string(),
            new_text,
            degraded: false,
        })
    }

    /// Replaces `{name}` tokens with their bound texts. A parameter the call
    /// never bound stays as a literal placeholder and degrades the site;
    /// braces that are not parameters (dict and set literals) pass through.
    fn substitute(
        &self,
        template: &ReplacementTemplate,
        bindings: &HashMap<String, String>,
        degraded: &mut bool,
    ) -> String {
        let mut params: HashSet<&str> = template.placeholders().collect();
        if let Some(recv) = template.kind.receiver() {
            params.insert(recv);
        }
        self.placeholder
            .replace_all(&template.expr, |caps: &regex::Captures| {
                let name = &caps[1];
                if let Some(bound) = bindings.get(name) {
                    bound.clone()
                } else {
                    if params.contains(name) {
                        *degraded = true;
                    }
                    caps[0].to_string()
                }
            })
            .into_owned()
    }

    /// Source text of `span` with any already-folded inner candidates
    /// spliced in, back to front.
    fn folded_text(&self, span: Span, inner: &[Candidate]) -> String {
        let mut text = span.text(self.source).to_string();
        let mut within: Vec<&Candidate> = inner.iter().filter(|c| span.contains(&c.span)).collect();
        within.sort_by(|a, b| b.span.start.cmp(&a.span.start));
        for candidate in within {
            text.replace_range(
                candidate.span.start - span.start..candidate.span.end - span.start,
                &candidate.new_text,
            );
        }
        text
    }

    fn take_contained(&mut self, span: Span) -> Vec<Candidate> {
        let mut taken = Vec::new();
        let mut i = 0;
        while i < self.candidates.len() {
            if span.contains(&self.candidates[i].span) {
                taken.push(self.candidates.remove(i));
            } else {
                i += 1;
            }
        }
        taken
    }
}

fn has_marker(decorators: &[ast::Expr]) -> bool {
    decorators
        .iter()
        .any(|d| decorator_name(d) == Some(MARKER_NAME))
}

/// Inserts surplus arguments before the final closing paren of the
/// substituted expression. Returns `None` when there is no call to carry
/// them.
fn append_extras(new_text: &str, extras: &[String]) -> Option<String> {
    let close = new_text.rfind(')')?;
    let before = new_text[..close].trim_end();
    let joined = extras.join(", ");
    let insertion = if before.ends_with('(') {
        joined
    } else {
        format!(", {joined}")
    };
    let mut out = String::with_capacity(new_text.len() + insertion.len());
    out.push_str(&new_text[..close]);
    out.push_str(&insertion);
    out.push_str(&new_text[close..]);
    Some(out)
}

/// Candidate text must itself be a valid expression or the site is left
/// untouched. `await` only parses inside an async context, so it is checked
/// without the prefix.
fn parses_as_expression(text: &str) -> bool {
    let checked = text.strip_prefix("await ").unwrap_or(text);
    ast::Expr::parse(checked, "<replacement>").is_ok()
}
