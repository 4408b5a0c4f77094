//! Lexical scopes for variable bindings.

use prose_ast::{SmolStr, Span};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SymbolKind {
    Let,
    Const,
    /// Result of a named session; read-only.
    Session,
    /// `name = ...` inside a parallel block without a prior declaration.
    Branch,
    /// Block parameter.
    Parameter,
    /// Loop index, for-each item, catch error, pipe item or accumulator.
    Local,
}

impl SymbolKind {
    /// Bindings that may not be the target of a reassignment.
    pub(crate) fn is_read_only(self) -> bool {
        matches!(self, SymbolKind::Const | SymbolKind::Session)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Symbol {
    pub kind: SymbolKind,
    pub span: Span,
    pub used: bool,
}

/// Outcome of [`ScopeStack::declare`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Declared {
    Fresh,
    /// Already bound in the same scope; the existing symbol is kept.
    Duplicate(Span),
    /// Bound in an enclosing scope; the new symbol hides it.
    Shadows(Span),
}

#[derive(Debug, Default)]
pub(crate) struct Scope {
    symbols: FxHashMap<SmolStr, Symbol>,
}

impl Scope {
    pub(crate) fn into_symbols(self) -> impl Iterator<Item = (SmolStr, Symbol)> {
        self.symbols.into_iter()
    }
}

/// Innermost scope last. Never empty.
#[derive(Debug)]
pub(crate) struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    pub(crate) fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    pub(crate) fn push(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// The file scope is never popped; `None` when only it remains.
    pub(crate) fn pop(&mut self) -> Option<Scope> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    /// Remove and return the file scope. Leaves a fresh one behind.
    pub(crate) fn take_file_scope(&mut self) -> Scope {
        self.scopes.truncate(1);
        std::mem::take(&mut self.scopes[0])
    }

    pub(crate) fn declare(&mut self, name: &SmolStr, kind: SymbolKind, span: Span) -> Declared {
        let depth = self.scopes.len() - 1;
        if let Some(existing) = self.scopes[depth].symbols.get(name) {
            return Declared::Duplicate(existing.span);
        }
        let outer = self.scopes[..depth]
            .iter()
            .rev()
            .find_map(|scope| scope.symbols.get(name))
            .map(|symbol| symbol.span);
        self.scopes[depth].symbols.insert(
            name.clone(),
            Symbol {
                kind,
                span,
                used: false,
            },
        );
        match outer {
            Some(span) => Declared::Shadows(span),
            None => Declared::Fresh,
        }
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.symbols.get(name))
    }

    /// Mark the innermost binding of `name` as read. Returns false if unbound.
    pub(crate) fn mark_used(&mut self, name: &str) -> bool {
        match self
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.symbols.get_mut(name))
        {
            Some(symbol) => {
                symbol.used = true;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> SmolStr {
        SmolStr::new(s)
    }

    #[test]
    fn test_duplicate_in_same_scope() {
        let mut scopes = ScopeStack::new();
        let first = Span::from_offsets(0, 1);
        assert_eq!(scopes.declare(&name("x"), SymbolKind::Let, first), Declared::Fresh);
        assert_eq!(
            scopes.declare(&name("x"), SymbolKind::Const, Span::from_offsets(5, 6)),
            Declared::Duplicate(first)
        );
        assert_eq!(scopes.lookup("x").map(|s| s.kind), Some(SymbolKind::Let));
    }

    #[test]
    fn test_shadowing_and_pop() {
        let mut scopes = ScopeStack::new();
        let outer = Span::from_offsets(0, 1);
        scopes.declare(&name("x"), SymbolKind::Const, outer);
        scopes.push();
        assert_eq!(
            scopes.declare(&name("x"), SymbolKind::Local, Span::from_offsets(9, 10)),
            Declared::Shadows(outer)
        );
        assert_eq!(scopes.lookup("x").map(|s| s.kind), Some(SymbolKind::Local));
        assert!(scopes.pop().is_some());
        assert_eq!(scopes.lookup("x").map(|s| s.kind), Some(SymbolKind::Const));
        assert!(scopes.pop().is_none());
    }

    #[test]
    fn test_mark_used_hits_innermost() {
        let mut scopes = ScopeStack::new();
        scopes.declare(&name("x"), SymbolKind::Let, Span::dummy());
        scopes.push();
        scopes.declare(&name("x"), SymbolKind::Let, Span::dummy());
        assert!(scopes.mark_used("x"));
        assert!(!scopes.mark_used("y"));
        let inner = scopes.pop().unwrap();
        assert!(inner.into_symbols().all(|(_, s)| s.used));
        let file = scopes.take_file_scope();
        assert!(file.into_symbols().all(|(_, s)| !s.used));
    }
}
