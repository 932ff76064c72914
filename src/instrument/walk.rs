//! Function tree collection.
//!
//! Walks the oxc AST and records every function that gets a registration
//! wrapper, nested under its enclosing wrapped function. oxc's generated
//! visitor covers every statement and expression kind, so functions inside
//! call arguments, object literals, `try` blocks, loop heads, arrow bodies
//! and class bodies are all reached.

use oxc::ast::ast::{Function, FunctionBody, MethodDefinition, MethodDefinitionKind, Program};
use oxc::ast_visit::{Visit, walk};
use oxc::span::GetSpan;
use oxc::syntax::scope::ScopeFlags;

/// A wrapped function and the wrapped functions defined in its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionNode {
    /// Byte offset of the function start (header included)
    pub start: usize,
    /// Byte offset just past the closing brace
    pub end: usize,
    /// Byte offset where the wrapper is inserted
    pub body_start: usize,
    /// Byte offset where the original body statements end
    pub body_end: usize,
    /// Directly nested wrapped functions, in source order
    pub children: Vec<FunctionNode>,
}

/// Collect the top-level function nodes of a parsed program.
pub fn collect(program: &Program<'_>) -> Vec<FunctionNode> {
    let mut collector = FunctionCollector::default();
    collector.visit_program(program);
    collector.roots
}

#[derive(Default)]
struct FunctionCollector {
    roots: Vec<FunctionNode>,
    /// Wrapped functions currently being walked, innermost last
    stack: Vec<FunctionNode>,
}

impl FunctionCollector {
    fn attach(&mut self, node: FunctionNode) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.roots.push(node),
        }
    }

    /// Walk only the body; parameter defaults stay untouched.
    fn walk_body(&mut self, body: &FunctionBody<'_>) {
        self.visit_function_body(body);
    }
}

impl<'a> Visit<'a> for FunctionCollector {
    fn visit_function(&mut self, func: &Function<'a>, _flags: ScopeFlags) {
        let Some(body) = &func.body else {
            // declare-only signatures have nothing to wrap
            return;
        };

        // A synchronous wrapper can't resume a generator or await a promise.
        if func.generator || func.r#async {
            self.walk_body(body);
            return;
        }

        let span = func.span;
        let (body_start, body_end) = body_bounds(body);
        self.stack.push(FunctionNode {
            start: span.start as usize,
            end: span.end as usize,
            body_start,
            body_end,
            children: Vec::new(),
        });
        self.walk_body(body);
        if let Some(node) = self.stack.pop() {
            self.attach(node);
        }
    }

    fn visit_method_definition(&mut self, def: &MethodDefinition<'a>) {
        // Constructors may touch `this` only after `super()`, so the
        // wrapper's `apply(this, ...)` can't run first.
        if def.kind == MethodDefinitionKind::Constructor {
            if let Some(body) = &def.value.body {
                self.walk_body(body);
            }
            return;
        }
        walk::walk_method_definition(self, def);
    }
}

/// Byte range of the original body statements.
///
/// Directive prologues stay before the wrapper so `"use strict"` keeps
/// applying. An empty body falls back to the inside of the braces.
fn body_bounds(body: &FunctionBody<'_>) -> (usize, usize) {
    match (body.statements.first(), body.statements.last()) {
        (Some(first), Some(last)) => (
            first.span().start as usize,
            last.span().end as usize,
        ),
        _ => match body.directives.last() {
            Some(directive) => {
                let end = directive.span.end as usize;
                (end, end)
            }
            None => {
                let start = body.span.start as usize + 1;
                let end = (body.span.end as usize).saturating_sub(1).max(start);
                (start, end)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc::allocator::Allocator;
    use oxc::parser::Parser;
    use oxc::span::SourceType;

    fn tree(source: &str) -> Vec<FunctionNode> {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, SourceType::cjs()).parse();
        assert!(ret.errors.is_empty(), "parse errors: {:?}", ret.errors);
        collect(&ret.program)
    }

    #[test]
    fn test_collect_declaration() {
        let source = "function f() { return 1; }";
        let nodes = tree(source);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].start, 0);
        assert_eq!(nodes[0].end, source.len());
        assert_eq!(&source[nodes[0].body_start..nodes[0].body_end], "return 1;");
    }

    #[test]
    fn test_collect_nested() {
        let nodes = tree("function outer() { function inner() {} var x = function () {}; }");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].children.len(), 2);
    }

    #[test]
    fn test_collect_inside_expressions() {
        let source = r#"
            call(function a() {}, [function b() {}], { c: function () {} });
            try { x(function d() {}); } catch (e) { y(function e2() {}); } finally { z(function f() {}); }
            for (var i = (function g() { return 0; })(); i < 1; i++) { h(function () {}); }
            var o = cond ? function j() {} : function k() {};
            (() => function l() {})();
        "#;
        let nodes = tree(source);
        assert_eq!(nodes.len(), 11);
    }

    #[test]
    fn test_empty_body_uses_brace_bounds() {
        let source = "function f() {}";
        let nodes = tree(source);
        let node = &nodes[0];
        assert_eq!(node.body_start, source.len() - 1);
        assert_eq!(node.body_end, source.len() - 1);
    }

    #[test]
    fn test_directive_stays_in_header() {
        let source = r#"function f() { "use strict"; return 1; }"#;
        let nodes = tree(source);
        assert!(source[..nodes[0].body_start].contains("use strict"));
    }

    #[test]
    fn test_parameter_defaults_not_collected() {
        let nodes = tree("function f(a = function () {}) { return a; }");
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].children.is_empty());
    }

    #[test]
    fn test_generators_are_transparent() {
        let nodes = tree("function* gen() { yield function inner() {}; }");
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].children.is_empty());
    }

    #[test]
    fn test_constructor_not_wrapped_but_methods_are() {
        let nodes = tree("class A extends B { constructor() { super(); } run() { return 1; } }");
        assert_eq!(nodes.len(), 1);
    }
}
