//! String interning.
//!
//! Class names, field/method names, variable names and file names are all
//! interned so that the resolver can compare identifiers by a cheap integer
//! rather than repeatedly hashing/comparing `String`s. Mirrors the teacher's
//! `intern.rs`, trimmed to what the resolver/switch core needs (no bytes
//! interner: the core never touches bytes literals).

use ahash::AHashMap;

/// Index into the string interner.
///
/// Index 0 is reserved for `"<synthetic>"`, used as the file name for nodes
/// created by the resolver itself (synthesized init methods, wrappers,
/// inserted `VarDecl` statements) rather than parsed from source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct StringId(pub(crate) u32);

const SYNTHETIC_STRING_ID: StringId = StringId(0);

impl StringId {
    #[must_use]
    pub fn synthetic() -> Self {
        SYNTHETIC_STRING_ID
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Default for StringId {
    fn default() -> Self {
        SYNTHETIC_STRING_ID
    }
}

/// Owns the unique strings seen during compilation of a single unit.
///
/// Not shared across compilations: per §5, each compilation gets its own
/// `Resolver` (and therefore its own `Interns`), so there is no contention
/// and no need for interior mutability or synchronization.
#[derive(Debug)]
pub struct Interns {
    strings: Vec<String>,
    lookup: AHashMap<String, StringId>,
}

impl Default for Interns {
    fn default() -> Self {
        Self::new()
    }
}

impl Interns {
    #[must_use]
    pub fn new() -> Self {
        let mut interns = Self { strings: Vec::new(), lookup: AHashMap::new() };
        let id = interns.intern_new("<synthetic>");
        debug_assert_eq!(id, SYNTHETIC_STRING_ID);
        interns
    }

    /// Interns `s`, returning the existing id if already seen.
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.lookup.get(s) {
            return id;
        }
        self.intern_new(s)
    }

    fn intern_new(&mut self, s: &str) -> StringId {
        let id = StringId(self.strings.len().try_into().expect("too many interned strings"));
        self.strings.push(s.to_owned());
        self.lookup.insert(s.to_owned(), id);
        id
    }

    #[must_use]
    pub fn get(&self, id: StringId) -> &str {
        &self.strings[id.index()]
    }
}
