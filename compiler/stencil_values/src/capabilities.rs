//! Capability flags.
//!
//! The evaluator never asks what concrete type a value is. It asks which
//! capabilities the value offers and dispatches on that, so host objects
//! participate on equal terms with native values.

use bitflags::bitflags;

bitflags! {
    /// What a value can be used as.
    ///
    /// A value may offer several capabilities at once: a host object can be
    /// both a sequence and a mapping, a string is only a scalar.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct Capabilities: u16 {
        /// Convertible to text (strings, host scalars).
        const SCALAR = 1 << 0;
        const NUMERIC = 1 << 1;
        const BOOLEAN = 1 << 2;
        const DATE = 1 << 3;
        /// Indexed, sized, ordered.
        const SEQUENCE = 1 << 4;
        /// Keyed lookup.
        const MAPPING = 1 << 5;
        /// Iterable only.
        const COLLECTION = 1 << 6;
        /// Invocable as a function or macro.
        const CALLABLE = 1 << 7;
        const MARKUP = 1 << 8;
    }
}

impl Capabilities {
    /// Values `#list` can iterate.
    pub const ITERABLE: Capabilities = Capabilities::SEQUENCE
        .union(Capabilities::COLLECTION)
        .union(Capabilities::MAPPING);

    /// Human-readable list, e.g. `"string or number"`.
    pub fn describe(self) -> String {
        const NAMES: [(Capabilities, &str); 9] = [
            (Capabilities::SCALAR, "string"),
            (Capabilities::NUMERIC, "number"),
            (Capabilities::BOOLEAN, "boolean"),
            (Capabilities::DATE, "date"),
            (Capabilities::SEQUENCE, "sequence"),
            (Capabilities::MAPPING, "hash"),
            (Capabilities::COLLECTION, "collection"),
            (Capabilities::CALLABLE, "callable"),
            (Capabilities::MARKUP, "markup output"),
        ];
        let parts: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if parts.is_empty() {
            "nothing".to_owned()
        } else {
            parts.join(" or ")
        }
    }
}
