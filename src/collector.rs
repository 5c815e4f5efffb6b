//! Marked-construct collection and template extraction.
//!
//! Walks a parsed Python module looking for definitions carrying the
//! `@replace_me` marker (or `NAME = replace_me(value)` assignments) and
//! extracts a [`ReplacementTemplate`] from each, or records an
//! [`ExtractionFailure`] explaining why it could not. Also collects
//! `from module import name` facts for the import resolver.
//!
//! Extraction order matters: the replacement expression's exact source text
//! is captured first, and parameter references become `{name}` placeholders
//! second, by patching the spans of `Name` nodes in the re-parsed
//! expression. Keyword-argument names, attribute names, and string contents
//! are not names, so `new(a, mode=mode)` becomes `new({a}, mode={mode})`.

use std::collections::HashSet;

use anyhow::{anyhow, Result};
use regex::Regex;
use rustpython_parser::{ast, Parse};

use crate::model::{
    ActiveReplacementSet, Construct, ConstructKind, ExtractionFailure, FailureReason,
    ImportBinding, ReplacementTemplate, Span,
};

/// The decorator / call name that marks a construct as deprecated.
pub const MARKER_NAME: &str = "replace_me";

/// Everything one collection pass produces for a single source text.
#[derive(Debug, Default)]
pub struct CollectorOutput {
    /// Successfully extracted templates, keyed by lookup name.
    pub templates: ActiveReplacementSet,
    /// Every marked construct seen, template or not.
    pub constructs: Vec<Construct>,
    /// Constructs excluded from the active set.
    pub failures: Vec<ExtractionFailure>,
    /// Constructs kept in the active set with degraded semantics.
    pub warnings: Vec<ExtractionFailure>,
    /// Import facts for cross-module resolution.
    pub imports: Vec<ImportBinding>,
}

/// Parses `source` and collects every marked construct in it.
pub fn collect(source: &str) -> Result<CollectorOutput> {
    let suite = ast::Suite::parse(source, "<source>")
        .map_err(|err| anyhow!("failed to parse source: {err}"))?;

    let mut output = CollectorOutput::default();
    walk_body(&suite, None, source, &mut output);
    Ok(output)
}

fn walk_body(
    body: &[ast::Stmt],
    class_name: Option<&str>,
    source: &str,
    output: &mut CollectorOutput,
) {
    for stmt in body {
        match stmt {
            ast::Stmt::FunctionDef(def) => {
                if let Some(marker) = find_marker(&def.decorator_list) {
                    let kind = classify_function(&def.decorator_list, false);
                    let result =
                        function_template(def.name.as_str(), kind, &def.args, &def.body, source);
                    record(
                        output,
                        def.name.to_string(),
                        kind,
                        marker,
                        construct_span(stmt, &def.decorator_list),
                        result,
                    );
                }
            }
            ast::Stmt::AsyncFunctionDef(def) => {
                if let Some(marker) = find_marker(&def.decorator_list) {
                    let kind = classify_function(&def.decorator_list, true);
                    let result =
                        function_template(def.name.as_str(), kind, &def.args, &def.body, source);
                    record(
                        output,
                        def.name.to_string(),
                        kind,
                        marker,
                        construct_span(stmt, &def.decorator_list),
                        result,
                    );
                }
            }
            ast::Stmt::ClassDef(def) => {
                if let Some(marker) = find_marker(&def.decorator_list) {
                    let result = class_template(def.name.as_str(), &def.body, source);
                    record(
                        output,
                        def.name.to_string(),
                        ConstructKind::Class,
                        marker,
                        construct_span(stmt, &def.decorator_list),
                        result,
                    );
                } else {
                    walk_body(&def.body, Some(def.name.as_str()), source, output);
                }
            }
            ast::Stmt::Assign(assign) => {
                if let Some(call) = marker_call(&assign.value) {
                    if let [ast::Expr::Name(target)] = assign.targets.as_slice() {
                        attribute_construct(
                            target.id.as_str(),
                            class_name,
                            call,
                            Span::of(stmt),
                            source,
                            output,
                        );
                    }
                }
            }
            ast::Stmt::AnnAssign(assign) => {
                if let Some(value) = assign.value.as_deref() {
                    if let (Some(call), ast::Expr::Name(target)) =
                        (marker_call(value), assign.target.as_ref())
                    {
                        attribute_construct(
                            target.id.as_str(),
                            class_name,
                            call,
                            Span::of(stmt),
                            source,
                            output,
                        );
                    }
                }
            }
            ast::Stmt::ImportFrom(import) => {
                if class_name.is_none() {
                    if let Some(module) = &import.module {
                        let names: Vec<_> = import
                            .names
                            .iter()
                            .map(|alias| {
                                (
                                    alias.name.to_string(),
                                    alias.asname.as_ref().map(|a| a.to_string()),
                                )
                            })
                            .collect();
                        if !names.is_empty() {
                            output.imports.push(ImportBinding {
                                module: module.to_string(),
                                names,
                            });
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

fn record(
    output: &mut CollectorOutput,
    name: String,
    kind: ConstructKind,
    marker: &ast::Expr,
    span: Span,
    result: std::result::Result<ReplacementTemplate, ExtractionFailure>,
) {
    let (since, remove_in) = marker_versions(marker);
    output.constructs.push(Construct {
        name: name.clone(),
        kind,
        since,
        remove_in,
        span,
    });
    match result {
        Ok(template) => {
            if template.has_vararg || template.has_kwarg {
                output.warnings.push(ExtractionFailure::new(
                    name.as_str(),
                    kind,
                    FailureReason::VariadicParams,
                    "surplus caller arguments are passed through verbatim",
                ));
            }
            output.templates.insert(name, template);
        }
        Err(failure) => output.failures.push(failure),
    }
}

/// Span of a definition including its decorator lines.
fn construct_span(stmt: &ast::Stmt, decorators: &[ast::Expr]) -> Span {
    let mut span = Span::of(stmt);
    for decorator in decorators {
        let deco = Span::of(decorator);
        if deco.start < span.start {
            span.start = deco.start;
        }
    }
    span
}

/// Returns the marker decorator expression if one is present.
fn find_marker(decorators: &[ast::Expr]) -> Option<&ast::Expr> {
    decorators
        .iter()
        .find(|d| decorator_name(d) == Some(MARKER_NAME))
}

/// The simple name of a decorator: handles `@name`, `@mod.name`,
/// `@name(...)`, and `@mod.name(...)`.
pub fn decorator_name(expr: &ast::Expr) -> Option<&str> {
    match expr {
        ast::Expr::Name(name) => Some(name.id.as_str()),
        ast::Expr::Attribute(attr) => Some(attr.attr.as_str()),
        ast::Expr::Call(call) => match call.func.as_ref() {
            ast::Expr::Name(name) => Some(name.id.as_str()),
            ast::Expr::Attribute(attr) => Some(attr.attr.as_str()),
            _ => None,
        },
        _ => None,
    }
}

/// Returns the call node when `expr` is a `replace_me(...)` call.
pub fn marker_call(expr: &ast::Expr) -> Option<&ast::ExprCall> {
    if let ast::Expr::Call(call) = expr {
        let name = match call.func.as_ref() {
            ast::Expr::Name(name) => name.id.as_str(),
            ast::Expr::Attribute(attr) => attr.attr.as_str(),
            _ => return None,
        };
        if name == MARKER_NAME {
            return Some(call);
        }
    }
    None
}

/// Extracts `(since, remove_in)` from a marker expression. A positional
/// first argument is treated as `since`, but an explicit keyword wins.
pub fn marker_versions(marker: &ast::Expr) -> (Option<String>, Option<String>) {
    let call = match marker {
        ast::Expr::Call(call) => call,
        _ => return (None, None),
    };
    versions_from_call(call)
}

fn versions_from_call(call: &ast::ExprCall) -> (Option<String>, Option<String>) {
    let (since, remove_in) = keyword_versions(call);
    let since = since.or_else(|| call.args.first().and_then(string_literal));
    (since, remove_in)
}

/// Versions from keyword arguments only. Used for the attribute form,
/// where the first positional argument is the replacement value, never a
/// version.
fn keyword_versions(call: &ast::ExprCall) -> (Option<String>, Option<String>) {
    let mut since = None;
    let mut remove_in = None;
    for keyword in &call.keywords {
        match keyword.arg.as_ref().map(|a| a.as_str()) {
            Some("since") => since = string_literal(&keyword.value),
            Some("remove_in") => remove_in = string_literal(&keyword.value),
            _ => {}
        }
    }
    (since, remove_in)
}

fn string_literal(expr: &ast::Expr) -> Option<String> {
    match expr {
        ast::Expr::Constant(constant) => match &constant.value {
            ast::Constant::Str(s) => Some(s.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Decides kind from the other decorators on the same definition,
/// order-independent.
fn classify_function(decorators: &[ast::Expr], is_async: bool) -> ConstructKind {
    let has = |name: &str| decorators.iter().any(|d| decorator_name(d) == Some(name));
    if has("property") {
        ConstructKind::Property
    } else if has("classmethod") {
        ConstructKind::Classmethod
    } else if has("staticmethod") {
        ConstructKind::Staticmethod
    } else if is_async {
        ConstructKind::AsyncFunction
    } else {
        ConstructKind::Function
    }
}

fn is_docstring(stmt: &ast::Stmt) -> bool {
    matches!(
        stmt,
        ast::Stmt::Expr(expr) if matches!(
            expr.value.as_ref(),
            ast::Expr::Constant(c) if matches!(c.value, ast::Constant::Str(_))
        )
    )
}

/// Extracts a template from an ordinary function-like construct.
fn function_template(
    name: &str,
    kind: ConstructKind,
    args: &ast::Arguments,
    body: &[ast::Stmt],
    source: &str,
) -> std::result::Result<ReplacementTemplate, ExtractionFailure> {
    let fail = |reason, detail: &str| Err(ExtractionFailure::new(name, kind, reason, detail));

    if body.is_empty() {
        return fail(FailureReason::EmptyBody, "definition has no body");
    }

    let mut stmts: &[ast::Stmt] = body;
    if is_docstring(&stmts[0]) {
        stmts = &stmts[1..];
    }
    if stmts.is_empty() {
        return fail(FailureReason::EmptyBody, "body is only a docstring");
    }
    if stmts
        .iter()
        .any(|s| matches!(s, ast::Stmt::Import(_) | ast::Stmt::ImportFrom(_)))
    {
        return fail(
            FailureReason::LocalImports,
            "imports inside the body cannot be inlined",
        );
    }
    if stmts.len() > 1 {
        return fail(
            FailureReason::MultiStatementBody,
            &format!("{} statements after the docstring", stmts.len()),
        );
    }

    let expr_text = match &stmts[0] {
        ast::Stmt::Pass(_) => "None".to_string(),
        ast::Stmt::Return(ret) => match ret.value.as_deref() {
            Some(value) => Span::of(value).text(source).to_string(),
            None => return fail(FailureReason::EmptyReturn, "return carries no value"),
        },
        _ => {
            return fail(
                FailureReason::NoReturn,
                "single statement is neither return nor pass",
            )
        }
    };

    if calls_itself(&expr_text, name) {
        return fail(
            FailureReason::Recursive,
            "inlining would call the deprecated name again",
        );
    }

    Ok(build_template(expr_text, kind, args))
}

/// Extracts a template from a marked class following the wrapper pattern:
/// an `__init__` whose body is exactly `self.<attr> = Other(<args>)`.
fn class_template(
    name: &str,
    body: &[ast::Stmt],
    source: &str,
) -> std::result::Result<ReplacementTemplate, ExtractionFailure> {
    let kind = ConstructKind::Class;
    let fail = |detail: &str| {
        Err(ExtractionFailure::new(
            name,
            kind,
            FailureReason::MultiStatementBody,
            detail,
        ))
    };

    let init = match body.iter().find_map(|stmt| match stmt {
        ast::Stmt::FunctionDef(def) if def.name.as_str() == "__init__" => Some(def),
        _ => None,
    }) {
        Some(init) => init,
        None => return fail("class wrapper pattern requires an __init__ method"),
    };

    let mut stmts: &[ast::Stmt] = &init.body;
    if !stmts.is_empty() && is_docstring(&stmts[0]) {
        stmts = &stmts[1..];
    }
    if stmts.len() != 1 {
        return fail("__init__ must contain exactly one statement");
    }

    let assign = match &stmts[0] {
        ast::Stmt::Assign(assign) => assign,
        _ => return fail("__init__ statement must be an assignment"),
    };
    let is_self_attr = matches!(
        assign.targets.as_slice(),
        [ast::Expr::Attribute(attr)]
            if matches!(attr.value.as_ref(), ast::Expr::Name(n) if n.id.as_str() == "self")
    );
    if !is_self_attr || !matches!(assign.value.as_ref(), ast::Expr::Call(_)) {
        return fail("__init__ must assign a constructor call to a self attribute");
    }

    let expr_text = Span::of(assign.value.as_ref()).text(source).to_string();
    if calls_itself(&expr_text, name) {
        return Err(ExtractionFailure::new(
            name,
            kind,
            FailureReason::Recursive,
            "wrapper constructs the deprecated class again",
        ));
    }

    Ok(build_template(expr_text, kind, &init.args))
}

/// Records an attribute construct (`NAME = replace_me(<value>)`). The
/// template is the exact text of `<value>`; attributes have no parameters,
/// so no placeholders are ever substituted.
fn attribute_construct(
    attr_name: &str,
    class_name: Option<&str>,
    call: &ast::ExprCall,
    span: Span,
    source: &str,
    output: &mut CollectorOutput,
) {
    let (kind, name) = match class_name {
        Some(class) => (ConstructKind::ClassAttribute, format!("{class}.{attr_name}")),
        None => (ConstructKind::ModuleAttribute, attr_name.to_string()),
    };

    // The first positional argument is always the replacement value here,
    // so versions come from keywords only.
    let result = match call.args.first() {
        Some(value) => Ok(ReplacementTemplate {
            expr: Span::of(value).text(source).to_string(),
            kind,
            positional: Vec::new(),
            keyword_only: Vec::new(),
            has_vararg: false,
            has_kwarg: false,
        }),
        None => Err(ExtractionFailure::new(
            name.as_str(),
            kind,
            FailureReason::EmptyBody,
            "marker call has no value argument",
        )),
    };

    let (since, remove_in) = keyword_versions(call);
    output.constructs.push(Construct {
        name: name.clone(),
        kind,
        since,
        remove_in,
        span,
    });
    match result {
        Ok(template) => {
            output.templates.insert(name, template);
        }
        Err(failure) => output.failures.push(failure),
    }
}

/// Substitutes every formal parameter reference with `{name}`. Receiver
/// parameters (`self`/`cls`) are substituted too but excluded from the
/// bindable parameter lists.
fn build_template(expr: String, kind: ConstructKind, args: &ast::Arguments) -> ReplacementTemplate {
    let mut positional = Vec::new();
    let mut keyword_only = Vec::new();
    let mut params = HashSet::new();

    for arg in args.posonlyargs.iter().chain(args.args.iter()) {
        let name = arg.def.arg.as_str();
        params.insert(name);
        if name != "self" && name != "cls" {
            positional.push(name.to_string());
        }
    }
    for arg in &args.kwonlyargs {
        let name = arg.def.arg.as_str();
        params.insert(name);
        keyword_only.push(name.to_string());
    }

    ReplacementTemplate {
        expr: brace_parameters(&expr, &params),
        kind,
        positional,
        keyword_only,
        has_vararg: args.vararg.is_some(),
        has_kwarg: args.kwarg.is_some(),
    }
}

/// Rewrites `Name` references to the given parameters as `{name}`
/// placeholders. Only name nodes are patched, so keyword-argument names,
/// attribute names, and string contents keep their text.
fn brace_parameters(expr: &str, params: &HashSet<&str>) -> String {
    // `await` only parses inside an async context.
    let (inner, offset) = match expr.strip_prefix("await ") {
        Some(rest) => (rest, "await ".len()),
        None => (expr, 0),
    };
    let parsed = match ast::Expr::parse(inner, "<template>") {
        Ok(parsed) => parsed,
        Err(_) => return expr.to_string(),
    };
    let mut names = Vec::new();
    parameter_names(&parsed, params, &mut names);
    names.sort_by(|a, b| b.0.start.cmp(&a.0.start));

    let mut out = expr.to_string();
    for (span, name) in names {
        out.replace_range(
            offset + span.start..offset + span.end,
            &format!("{{{name}}}"),
        );
    }
    out
}

/// Spans of `Name` nodes naming a formal parameter. Comprehension and
/// lambda targets introduce their own bindings and are not collected.
fn parameter_names(expr: &ast::Expr, params: &HashSet<&str>, out: &mut Vec<(Span, String)>) {
    match expr {
        ast::Expr::Name(name) => {
            if params.contains(name.id.as_str()) {
                out.push((Span::of(name), name.id.to_string()));
            }
        }
        ast::Expr::BoolOp(e) => {
            for value in &e.values {
                parameter_names(value, params, out);
            }
        }
        ast::Expr::NamedExpr(e) => {
            parameter_names(&e.target, params, out);
            parameter_names(&e.value, params, out);
        }
        ast::Expr::BinOp(e) => {
            parameter_names(&e.left, params, out);
            parameter_names(&e.right, params, out);
        }
        ast::Expr::UnaryOp(e) => parameter_names(&e.operand, params, out),
        ast::Expr::Lambda(e) => parameter_names(&e.body, params, out),
        ast::Expr::IfExp(e) => {
            parameter_names(&e.test, params, out);
            parameter_names(&e.body, params, out);
            parameter_names(&e.orelse, params, out);
        }
        ast::Expr::Dict(e) => {
            for key in e.keys.iter().flatten() {
                parameter_names(key, params, out);
            }
            for value in &e.values {
                parameter_names(value, params, out);
            }
        }
        ast::Expr::Set(e) => {
            for elt in &e.elts {
                parameter_names(elt, params, out);
            }
        }
        ast::Expr::ListComp(e) => {
            parameter_names(&e.elt, params, out);
            generator_names(&e.generators, params, out);
        }
        ast::Expr::SetComp(e) => {
            parameter_names(&e.elt, params, out);
            generator_names(&e.generators, params, out);
        }
        ast::Expr::DictComp(e) => {
            parameter_names(&e.key, params, out);
            parameter_names(&e.value, params, out);
            generator_names(&e.generators, params, out);
        }
        ast::Expr::GeneratorExp(e) => {
            parameter_names(&e.elt, params, out);
            generator_names(&e.generators, params, out);
        }
        ast::Expr::Await(e) => parameter_names(&e.value, params, out),
        ast::Expr::Yield(e) => {
            if let Some(value) = e.value.as_deref() {
                parameter_names(value, params, out);
            }
        }
        ast::Expr::YieldFrom(e) => parameter_names(&e.value, params, out),
        ast::Expr::Compare(e) => {
            parameter_names(&e.left, params, out);
            for comparator in &e.comparators {
                parameter_names(comparator, params, out);
            }
        }
        ast::Expr::Call(call) => {
            parameter_names(&call.func, params, out);
            for arg in &call.args {
                parameter_names(arg, params, out);
            }
            for keyword in &call.keywords {
                parameter_names(&keyword.value, params, out);
            }
        }
        ast::Expr::FormattedValue(e) => parameter_names(&e.value, params, out),
        ast::Expr::JoinedStr(e) => {
            for value in &e.values {
                parameter_names(value, params, out);
            }
        }
        ast::Expr::Attribute(e) => parameter_names(&e.value, params, out),
        ast::Expr::Subscript(e) => {
            parameter_names(&e.value, params, out);
            parameter_names(&e.slice, params, out);
        }
        ast::Expr::Starred(e) => parameter_names(&e.value, params, out),
        ast::Expr::List(e) => {
            for elt in &e.elts {
                parameter_names(elt, params, out);
            }
        }
        ast::Expr::Tuple(e) => {
            for elt in &e.elts {
                parameter_names(elt, params, out);
            }
        }
        ast::Expr::Slice(e) => {
            if let Some(lower) = e.lower.as_deref() {
                parameter_names(lower, params, out);
            }
            if let Some(upper) = e.upper.as_deref() {
                parameter_names(upper, params, out);
            }
            if let Some(step) = e.step.as_deref() {
                parameter_names(step, params, out);
            }
        }
        _ => {}
    }
}

fn generator_names(
    generators: &[ast::Comprehension],
    params: &HashSet<&str>,
    out: &mut Vec<(Span, String)>,
) {
    for generator in generators {
        parameter_names(&generator.iter, params, out);
        for cond in &generator.ifs {
            parameter_names(cond, params, out);
        }
    }
}

fn calls_itself(expr_text: &str, name: &str) -> bool {
    Regex::new(&format!(r"\b{}\s*\(", regex::escape(name)))
        .map(|re| re.is_match(expr_text))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(source: &str, name: &str) -> ReplacementTemplate {
        let output = collect(source).unwrap();
        assert!(
            output.templates.contains_key(name),
            "no template for {name}; failures: {:?}",
            output.failures
        );
        output.templates[name].clone()
    }

    fn failure(source: &str, name: &str) -> ExtractionFailure {
        let output = collect(source).unwrap();
        output
            .failures
            .into_iter()
            .find(|f| f.name == name)
            .expect("expected a failure")
    }

    #[test]
    fn extracts_simple_function_template() {
        let t = template(
            "@replace_me()\ndef old_func(x):\n    return new_func(x * 2)\n",
            "old_func",
        );
        assert_eq!(t.expr, "new_func({x} * 2)");
        assert_eq!(t.positional, vec!["x"]);
        assert_eq!(t.kind, ConstructKind::Function);
    }

    #[test]
    fn skips_docstring_before_return() {
        let t = template(
            "@replace_me()\ndef old(a):\n    \"\"\"Deprecated.\"\"\"\n    return new(a)\n",
            "old",
        );
        assert_eq!(t.expr, "new({a})");
    }

    #[test]
    fn pass_body_becomes_none() {
        let t = template("@replace_me()\ndef gone():\n    pass\n", "gone");
        assert_eq!(t.expr, "None");
    }

    #[test]
    fn parameter_inside_longer_identifier_is_untouched() {
        // `n` must not be replaced inside `range`.
        let t = template("@replace_me()\ndef old(n):\n    return range(n)\n", "old");
        assert_eq!(t.expr, "range({n})");
    }

    #[test]
    fn preserves_exact_expression_formatting() {
        let t = template(
            "@replace_me()\ndef old(x):\n    return new_func( x ,  mode='legacy' )\n",
            "old",
        );
        assert_eq!(t.expr, "new_func( {x} ,  mode='legacy' )");
    }

    #[test]
    fn multi_statement_body_fails() {
        let f = failure(
            "@replace_me()\ndef old(x):\n    y = x + 1\n    return new(y)\n",
            "old",
        );
        assert_eq!(f.reason, FailureReason::MultiStatementBody);
    }

    #[test]
    fn missing_return_fails() {
        let f = failure("@replace_me()\ndef old(x):\n    print(x)\n", "old");
        assert_eq!(f.reason, FailureReason::NoReturn);
    }

    #[test]
    fn bare_return_fails() {
        let f = failure("@replace_me()\ndef old():\n    return\n", "old");
        assert_eq!(f.reason, FailureReason::EmptyReturn);
    }

    #[test]
    fn docstring_only_body_fails() {
        let f = failure("@replace_me()\ndef old():\n    \"\"\"Gone.\"\"\"\n", "old");
        assert_eq!(f.reason, FailureReason::EmptyBody);
    }

    #[test]
    fn local_import_fails() {
        let f = failure(
            "@replace_me()\ndef old(x):\n    import os\n    return os.path.join(x)\n",
            "old",
        );
        assert_eq!(f.reason, FailureReason::LocalImports);
    }

    #[test]
    fn recursive_replacement_fails() {
        let f = failure("@replace_me()\ndef old(x):\n    return old(x + 1)\n", "old");
        assert_eq!(f.reason, FailureReason::Recursive);
    }

    #[test]
    fn variadic_parameters_degrade_with_warning() {
        let source =
            "@replace_me()\ndef old(a, *args, **kwargs):\n    return new(a, *args, **kwargs)\n";
        let output = collect(source).unwrap();
        let t = &output.templates["old"];
        assert!(t.has_vararg);
        assert!(t.has_kwarg);
        assert_eq!(output.warnings.len(), 1);
        assert_eq!(output.warnings[0].reason, FailureReason::VariadicParams);
    }

    #[test]
    fn classifies_property_and_receiver_elision() {
        let source = "class C:\n    @property\n    @replace_me()\n    def old_prop(self):\n        return self.new_prop\n";
        let t = template(source, "old_prop");
        assert_eq!(t.kind, ConstructKind::Property);
        assert_eq!(t.expr, "{self}.new_prop");
        assert!(t.positional.is_empty());
    }

    #[test]
    fn classifies_classmethod_and_staticmethod() {
        let source = concat!(
            "class C:\n",
            "    @classmethod\n",
            "    @replace_me()\n",
            "    def old_cm(cls, x):\n",
            "        return cls.new_cm(x)\n",
            "    @staticmethod\n",
            "    @replace_me()\n",
            "    def old_sm(x):\n",
            "        return new_sm(x)\n",
        );
        let output = collect(source).unwrap();
        let cm = &output.templates["old_cm"];
        assert_eq!(cm.kind, ConstructKind::Classmethod);
        assert_eq!(cm.expr, "{cls}.new_cm({x})");
        assert_eq!(cm.positional, vec!["x"]);
        let sm = &output.templates["old_sm"];
        assert_eq!(sm.kind, ConstructKind::Staticmethod);
        assert_eq!(sm.positional, vec!["x"]);
    }

    #[test]
    fn classifies_async_function() {
        let t = template(
            "@replace_me()\nasync def old(x):\n    return await new(x)\n",
            "old",
        );
        assert_eq!(t.kind, ConstructKind::AsyncFunction);
        assert_eq!(t.expr, "await new({x})");
    }

    #[test]
    fn instance_method_binds_self_placeholder() {
        let source = "class C:\n    @replace_me()\n    def old_method(self, x):\n        return self.new_method(x * 2)\n";
        let t = template(source, "old_method");
        assert_eq!(t.expr, "{self}.new_method({x} * 2)");
        assert_eq!(t.positional, vec!["x"]);
    }

    #[test]
    fn class_wrapper_pattern() {
        let source = concat!(
            "@replace_me()\n",
            "class OldClient:\n",
            "    def __init__(self, host, port):\n",
            "        self._inner = NewClient(host, port, secure=True)\n",
        );
        let t = template(source, "OldClient");
        assert_eq!(t.kind, ConstructKind::Class);
        assert_eq!(t.expr, "NewClient({host}, {port}, secure=True)");
        assert_eq!(t.positional, vec!["host", "port"]);
    }

    #[test]
    fn class_without_wrapper_init_fails() {
        let source = concat!(
            "@replace_me()\n",
            "class Old:\n",
            "    def __init__(self):\n",
            "        self.a = 1\n",
            "        self.b = 2\n",
        );
        let f = failure(source, "Old");
        assert_eq!(f.reason, FailureReason::MultiStatementBody);
    }

    #[test]
    fn module_and_class_attributes() {
        let source = concat!(
            "OLD_LIMIT = replace_me(NEW_LIMIT, since=\"1.0.0\")\n",
            "class Config:\n",
            "    OLD_DEFAULT = replace_me(\"new-default\")\n",
        );
        let output = collect(source).unwrap();
        assert_eq!(output.templates["OLD_LIMIT"].expr, "NEW_LIMIT");
        assert_eq!(
            output.templates["OLD_LIMIT"].kind,
            ConstructKind::ModuleAttribute
        );
        assert_eq!(output.templates["Config.OLD_DEFAULT"].expr, "\"new-default\"");
        assert_eq!(
            output.templates["Config.OLD_DEFAULT"].kind,
            ConstructKind::ClassAttribute
        );
        // A string value must not be mistaken for a positional `since`.
        assert_eq!(output.constructs[0].since.as_deref(), Some("1.0.0"));
        assert_eq!(output.constructs[1].since, None);
    }

    #[test]
    fn captures_marker_versions() {
        let source = "@replace_me(since=\"1.2\", remove_in=\"2.0\")\ndef old():\n    return new()\n";
        let output = collect(source).unwrap();
        let construct = &output.constructs[0];
        assert_eq!(construct.since.as_deref(), Some("1.2"));
        assert_eq!(construct.remove_in.as_deref(), Some("2.0"));
    }

    #[test]
    fn positional_marker_argument_is_since() {
        let source = "@replace_me(\"0.9\")\ndef old():\n    return new()\n";
        let output = collect(source).unwrap();
        assert_eq!(output.constructs[0].since.as_deref(), Some("0.9"));
    }

    #[test]
    fn collects_imports_with_aliases() {
        let source = "from mylib.legacy import old_func, other as renamed\n";
        let output = collect(source).unwrap();
        assert_eq!(output.imports.len(), 1);
        assert_eq!(output.imports[0].module, "mylib.legacy");
        assert_eq!(
            output.imports[0].names,
            vec![
                ("old_func".to_string(), None),
                ("other".to_string(), Some("renamed".to_string())),
            ]
        );
    }

    #[test]
    fn unmarked_definitions_are_ignored() {
        let output = collect("def plain(x):\n    return x + 1\n").unwrap();
        assert!(output.templates.is_empty());
        assert!(output.constructs.is_empty());
    }

    #[test]
    fn keyword_only_parameters_are_tracked() {
        let t = template(
            "@replace_me()\ndef old(a, *, mode):\n    return new(a, mode=mode)\n",
            "old",
        );
        assert_eq!(t.positional, vec!["a"]);
        assert_eq!(t.keyword_only, vec!["mode"]);
        assert_eq!(t.expr, "new({a}, mode={mode})");
    }

    #[test]
    fn keyword_argument_names_keep_their_text() {
        let t = template(
            "@replace_me()\ndef old(a, mode):\n    return new(a, mode=mode)\n",
            "old",
        );
        assert_eq!(t.expr, "new({a}, mode={mode})");
        assert_eq!(t.positional, vec!["a", "mode"]);
    }

    #[test]
    fn strings_and_attribute_names_are_not_parameters() {
        let t = template(
            "@replace_me()\ndef old(mode):\n    return new(obj.mode, \"mode\", mode)\n",
            "old",
        );
        assert_eq!(t.expr, "new(obj.mode, \"mode\", {mode})");
    }

    #[test]
    fn parse_error_is_fatal_for_the_unit() {
        assert!(collect("def broken(:\n").is_err());
    }
}
