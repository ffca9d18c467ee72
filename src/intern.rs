//! Identifier interning.
//!
//! Field names, parameter names, and PCM identifiers are compared and
//! hashed far more often than they are printed, so each is interned into a
//! small [`Symbol`] the same way `ouros::intern` interns strings — minus
//! that crate's ASCII fast path and static-string table, which exist to
//! keep a much hotter bytecode loop allocation-free. Contract identifiers
//! here are interned once per module and never touch a hot loop.

use ahash::AHashMap;
use std::fmt;

/// An interned identifier. Cheap to copy, compare, and hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, serde::Serialize, serde::Deserialize)]
pub struct Symbol(u32);

/// Owns the backing strings for every [`Symbol`] handed out so far.
#[derive(Debug, Default)]
pub struct Interner {
    strings: Vec<Box<str>>,
    lookup: AHashMap<Box<str>, Symbol>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `s`, returning the existing symbol if it was already seen.
    pub fn intern(&mut self, s: &str) -> Symbol {
        if let Some(&sym) = self.lookup.get(s) {
            return sym;
        }
        let sym = Symbol(self.strings.len() as u32);
        let boxed: Box<str> = s.into();
        self.strings.push(boxed.clone());
        self.lookup.insert(boxed, sym);
        sym
    }

    /// Resolves a previously interned symbol back to its string.
    ///
    /// # Panics
    ///
    /// Panics if `sym` was not produced by this interner.
    pub fn resolve(&self, sym: Symbol) -> &str {
        &self.strings[sym.0 as usize]
    }

    /// Looks up a symbol without interning, for call sites that only want to
    /// know whether an identifier has been seen before.
    pub fn get(&self, s: &str) -> Option<Symbol> {
        self.lookup.get(s).copied()
    }
}

/// Helper for `{:?}`-style printing of a symbol alongside its interner.
pub struct DisplaySymbol<'a> {
    pub interner: &'a Interner,
    pub symbol: Symbol,
}

impl fmt::Display for DisplaySymbol<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.interner.resolve(self.symbol))
    }
}
