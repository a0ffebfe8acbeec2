//! Nominal-type arena and the bootstrap hierarchy.
//!
//! The hierarchy mirrors the source language's type tree:
//! ```text
//! Any
//!  ├── Number
//!  │    ├── Complex (parametric)
//!  │    └── Real
//!  │         ├── AbstractFloat
//!  │         │    └── Float16, Float32, Float64, BigFloat (concrete)
//!  │         ├── Rational (parametric)
//!  │         ├── AbstractIrrational
//!  │         └── Integer
//!  │              ├── Signed
//!  │              │    └── Int8, Int16, Int32, Int64, Int128, BigInt
//!  │              ├── Unsigned
//!  │              │    └── UInt8, UInt16, UInt32, UInt64, UInt128
//!  │              └── Bool (concrete)
//!  ├── AbstractString
//!  │    └── String (concrete)
//!  ├── AbstractArray
//!  │    └── Array, Memory (parametric)
//!  └── Exception
//!       └── MethodError, TypeError, ... (concrete)
//! ```
//!
//! Registration is monotonic: user `struct` / `abstract type` declarations
//! extend the arena, nothing is ever deleted. Every mutation bumps a version
//! counter that dispatch caches compare at lookup.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::Ty;

/// Index of a nominal type in the lattice arena.
///
/// Parent/child edges are stored as `TypeId`s so the type graph never holds
/// owned references and cannot form ownership cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(pub u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A named field of a concrete type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: Ty,
}

/// Node kind in the lattice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    /// Internal node with children; never directly instantiated.
    Abstract,
    /// Leaf backed directly by a `Value` variant (numbers, Bool, Char, ...).
    Primitive,
    /// Leaf with a fixed (possibly empty) field list.
    Concrete { fields: Vec<Field>, mutable: bool },
}

/// A registered nominal type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeNode {
    pub name: String,
    /// Abstract supertype. `Any` is its own parent.
    pub parent: TypeId,
    pub kind: TypeKind,
    /// Type parameter names (`Complex{T}` has ["T"], `Array{T,N}` has
    /// ["T", "N"]). Field declarations reference these as `Ty::Var`.
    pub params: Vec<String>,
}

impl TypeNode {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Errors raised by lattice registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LatticeError {
    DuplicateName(String),
    UnknownParent(String),
    /// The declared parent is a concrete type (only abstract types have children).
    ConcreteParent(String),
}

impl std::fmt::Display for LatticeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateName(name) => write!(f, "type `{}` is already defined", name),
            Self::UnknownParent(name) => write!(f, "supertype `{}` is not defined", name),
            Self::ConcreteParent(name) => {
                write!(f, "cannot subtype concrete type `{}`", name)
            }
        }
    }
}

impl std::error::Error for LatticeError {}

/// Well-known type ids assigned by [`TypeLattice::bootstrap`].
///
/// The ids are fixed by bootstrap registration order;
/// `test_core_ids_match_names` guards the mapping.
pub mod core_types {
    use super::TypeId;

    // Abstract tower
    pub const ANY: TypeId = TypeId(0);
    pub const NUMBER: TypeId = TypeId(1);
    pub const REAL: TypeId = TypeId(2);
    pub const INTEGER: TypeId = TypeId(3);
    pub const SIGNED: TypeId = TypeId(4);
    pub const UNSIGNED: TypeId = TypeId(5);
    pub const ABSTRACT_FLOAT: TypeId = TypeId(6);
    pub const ABSTRACT_IRRATIONAL: TypeId = TypeId(7);
    pub const ABSTRACT_STRING: TypeId = TypeId(8);
    pub const ABSTRACT_CHAR: TypeId = TypeId(9);
    pub const ABSTRACT_ARRAY: TypeId = TypeId(10);
    pub const FUNCTION: TypeId = TypeId(11);
    pub const EXCEPTION: TypeId = TypeId(12);
    pub const TYPE: TypeId = TypeId(13);
    // Concrete primitives
    pub const BOOL: TypeId = TypeId(14);
    pub const INT8: TypeId = TypeId(15);
    pub const INT16: TypeId = TypeId(16);
    pub const INT32: TypeId = TypeId(17);
    pub const INT64: TypeId = TypeId(18);
    pub const INT128: TypeId = TypeId(19);
    pub const UINT8: TypeId = TypeId(20);
    pub const UINT16: TypeId = TypeId(21);
    pub const UINT32: TypeId = TypeId(22);
    pub const UINT64: TypeId = TypeId(23);
    pub const UINT128: TypeId = TypeId(24);
    pub const BIGINT: TypeId = TypeId(25);
    pub const FLOAT16: TypeId = TypeId(26);
    pub const FLOAT32: TypeId = TypeId(27);
    pub const FLOAT64: TypeId = TypeId(28);
    pub const BIGFLOAT: TypeId = TypeId(29);
    pub const CHAR: TypeId = TypeId(30);
    pub const STRING: TypeId = TypeId(31);
    pub const SYMBOL: TypeId = TypeId(32);
    pub const NOTHING: TypeId = TypeId(33);
    pub const MISSING: TypeId = TypeId(34);
    // Parametric and container concretes
    pub const RATIONAL: TypeId = TypeId(35);
    pub const COMPLEX: TypeId = TypeId(36);
    pub const ARRAY: TypeId = TypeId(37);
    pub const MEMORY: TypeId = TypeId(38);
    pub const TUPLE: TypeId = TypeId(39);
    pub const NAMED_TUPLE: TypeId = TypeId(40);
    pub const PAIRS: TypeId = TypeId(41);
    pub const PAIR: TypeId = TypeId(42);
    pub const SET: TypeId = TypeId(43);
    pub const REGEX: TypeId = TypeId(44);
    pub const VERSION_NUMBER: TypeId = TypeId(45);
    pub const HTML: TypeId = TypeId(46);
    pub const TEXT: TypeId = TypeId(47);
    pub const MIME: TypeId = TypeId(48);
    pub const SOME: TypeId = TypeId(49);
    pub const DATA_TYPE: TypeId = TypeId(50);
    pub const UNION_ALL: TypeId = TypeId(51);
    pub const EXPR: TypeId = TypeId(52);
    pub const QUOTE_NODE: TypeId = TypeId(53);
    pub const GENERATOR: TypeId = TypeId(54);
    pub const IO_BUFFER: TypeId = TypeId(55);
    pub const CODE_UNITS: TypeId = TypeId(56);
    // Exception tree
    pub const METHOD_ERROR: TypeId = TypeId(57);
    pub const AMBIGUITY_ERROR: TypeId = TypeId(58);
    pub const TYPE_ERROR: TypeId = TypeId(59);
    pub const ARGUMENT_ERROR: TypeId = TypeId(60);
    pub const DIVIDE_ERROR: TypeId = TypeId(61);
    pub const DOMAIN_ERROR: TypeId = TypeId(62);
    pub const INEXACT_ERROR: TypeId = TypeId(63);
    pub const DIMENSION_MISMATCH: TypeId = TypeId(64);
    pub const KEY_ERROR: TypeId = TypeId(65);
    pub const STRING_INDEX_ERROR: TypeId = TypeId(66);
    pub const ASSERTION_ERROR: TypeId = TypeId(67);
    pub const EOF_ERROR: TypeId = TypeId(68);
    pub const UNDEF_KEYWORD_ERROR: TypeId = TypeId(69);
    pub const OVERFLOW_ERROR: TypeId = TypeId(70);
    pub const ERROR_EXCEPTION: TypeId = TypeId(71);
    pub const BOUNDS_ERROR: TypeId = TypeId(72);
    pub const UNDEF_VAR_ERROR: TypeId = TypeId(73);
    // Ranges
    pub const ABSTRACT_RANGE: TypeId = TypeId(74);
    pub const UNIT_RANGE: TypeId = TypeId(75);
    pub const STEP_RANGE: TypeId = TypeId(76);
}

/// Arena of nominal types with parent edges and a registration version.
#[derive(Debug, Clone)]
pub struct TypeLattice {
    nodes: Vec<TypeNode>,
    by_name: HashMap<String, TypeId>,
    /// Monotonic counter bumped on every registration; compared by dispatch
    /// caches to detect staleness.
    version: u64,
}

impl TypeLattice {
    /// Build the process-wide bootstrap lattice: the numeric tower, strings,
    /// containers, type objects, and the exception tree.
    pub fn bootstrap() -> Self {
        use core_types as c;

        let mut lat = Self {
            nodes: Vec::new(),
            by_name: HashMap::new(),
            version: 0,
        };

        // Order matters: ids must line up with the `core_types` constants.
        let abs = |lat: &mut Self, name: &str, parent: TypeId| {
            lat.push(name, parent, TypeKind::Abstract, Vec::new())
        };
        let prim = |lat: &mut Self, name: &str, parent: TypeId| {
            lat.push(name, parent, TypeKind::Primitive, Vec::new())
        };
        let conc = |lat: &mut Self, name: &str, parent: TypeId, params: &[&str]| {
            lat.push(
                name,
                parent,
                TypeKind::Concrete {
                    fields: Vec::new(),
                    mutable: false,
                },
                params.iter().map(|p| p.to_string()).collect(),
            )
        };

        abs(&mut lat, "Any", c::ANY);
        abs(&mut lat, "Number", c::ANY);
        abs(&mut lat, "Real", c::NUMBER);
        abs(&mut lat, "Integer", c::REAL);
        abs(&mut lat, "Signed", c::INTEGER);
        abs(&mut lat, "Unsigned", c::INTEGER);
        abs(&mut lat, "AbstractFloat", c::REAL);
        abs(&mut lat, "AbstractIrrational", c::REAL);
        abs(&mut lat, "AbstractString", c::ANY);
        abs(&mut lat, "AbstractChar", c::ANY);
        abs(&mut lat, "AbstractArray", c::ANY);
        abs(&mut lat, "Function", c::ANY);
        abs(&mut lat, "Exception", c::ANY);
        abs(&mut lat, "Type", c::ANY);

        prim(&mut lat, "Bool", c::INTEGER);
        prim(&mut lat, "Int8", c::SIGNED);
        prim(&mut lat, "Int16", c::SIGNED);
        prim(&mut lat, "Int32", c::SIGNED);
        prim(&mut lat, "Int64", c::SIGNED);
        prim(&mut lat, "Int128", c::SIGNED);
        prim(&mut lat, "UInt8", c::UNSIGNED);
        prim(&mut lat, "UInt16", c::UNSIGNED);
        prim(&mut lat, "UInt32", c::UNSIGNED);
        prim(&mut lat, "UInt64", c::UNSIGNED);
        prim(&mut lat, "UInt128", c::UNSIGNED);
        prim(&mut lat, "BigInt", c::SIGNED);
        prim(&mut lat, "Float16", c::ABSTRACT_FLOAT);
        prim(&mut lat, "Float32", c::ABSTRACT_FLOAT);
        prim(&mut lat, "Float64", c::ABSTRACT_FLOAT);
        prim(&mut lat, "BigFloat", c::ABSTRACT_FLOAT);
        prim(&mut lat, "Char", c::ABSTRACT_CHAR);
        prim(&mut lat, "String", c::ABSTRACT_STRING);
        prim(&mut lat, "Symbol", c::ANY);
        prim(&mut lat, "Nothing", c::ANY);
        prim(&mut lat, "Missing", c::ANY);

        lat.push(
            "Rational",
            c::REAL,
            TypeKind::Concrete {
                fields: vec![
                    Field {
                        name: "num".to_string(),
                        ty: Ty::Var("T".to_string()),
                    },
                    Field {
                        name: "den".to_string(),
                        ty: Ty::Var("T".to_string()),
                    },
                ],
                mutable: false,
            },
            vec!["T".to_string()],
        );
        lat.push(
            "Complex",
            c::NUMBER,
            TypeKind::Concrete {
                fields: vec![
                    Field {
                        name: "re".to_string(),
                        ty: Ty::Var("T".to_string()),
                    },
                    Field {
                        name: "im".to_string(),
                        ty: Ty::Var("T".to_string()),
                    },
                ],
                mutable: false,
            },
            vec!["T".to_string()],
        );
        conc(&mut lat, "Array", c::ABSTRACT_ARRAY, &["T", "N"]);
        conc(&mut lat, "Memory", c::ABSTRACT_ARRAY, &["T"]);
        conc(&mut lat, "Tuple", c::ANY, &[]);
        conc(&mut lat, "NamedTuple", c::ANY, &[]);
        conc(&mut lat, "Pairs", c::ANY, &[]);
        lat.push(
            "Pair",
            c::ANY,
            TypeKind::Concrete {
                fields: vec![
                    Field {
                        name: "first".to_string(),
                        ty: Ty::Var("A".to_string()),
                    },
                    Field {
                        name: "second".to_string(),
                        ty: Ty::Var("B".to_string()),
                    },
                ],
                mutable: false,
            },
            vec!["A".to_string(), "B".to_string()],
        );
        conc(&mut lat, "Set", c::ANY, &["T"]);
        conc(&mut lat, "Regex", c::ANY, &[]);
        conc(&mut lat, "VersionNumber", c::ANY, &[]);
        conc(&mut lat, "HTML", c::ANY, &["T"]);
        conc(&mut lat, "Text", c::ANY, &["T"]);
        conc(&mut lat, "MIME", c::ANY, &[]);
        conc(&mut lat, "Some", c::ANY, &["T"]);
        conc(&mut lat, "DataType", c::TYPE, &[]);
        conc(&mut lat, "UnionAll", c::TYPE, &[]);
        conc(&mut lat, "Expr", c::ANY, &[]);
        conc(&mut lat, "QuoteNode", c::ANY, &[]);
        conc(&mut lat, "Generator", c::ANY, &[]);
        conc(&mut lat, "IOBuffer", c::ANY, &[]);
        conc(&mut lat, "CodeUnits", c::ABSTRACT_ARRAY, &[]);

        for name in [
            "MethodError",
            "AmbiguityError",
            "TypeError",
            "ArgumentError",
            "DivideError",
            "DomainError",
            "InexactError",
            "DimensionMismatch",
            "KeyError",
            "StringIndexError",
            "AssertionError",
            "EOFError",
            "UndefKeywordError",
            "OverflowError",
            "ErrorException",
            "BoundsError",
            "UndefVarError",
        ] {
            conc(&mut lat, name, c::EXCEPTION, &[]);
        }

        abs(&mut lat, "AbstractRange", c::ABSTRACT_ARRAY);
        conc(&mut lat, "UnitRange", c::ABSTRACT_RANGE, &[]);
        conc(&mut lat, "StepRange", c::ABSTRACT_RANGE, &[]);

        lat.version = 1;
        lat
    }

    fn push(&mut self, name: &str, parent: TypeId, kind: TypeKind, params: Vec<String>) -> TypeId {
        let id = TypeId(self.nodes.len() as u32);
        self.nodes.push(TypeNode {
            name: name.to_string(),
            parent,
            kind,
            params,
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Register a user abstract type under `parent`.
    pub fn register_abstract(&mut self, name: &str, parent: TypeId) -> Result<TypeId, LatticeError> {
        self.check_new_name(name)?;
        self.check_abstract_parent(parent)?;
        let id = self.push(name, parent, TypeKind::Abstract, Vec::new());
        self.version += 1;
        Ok(id)
    }

    /// Register a user struct type under `parent` with the given field list.
    /// `params` names the type parameters of a parametric struct; field
    /// declarations reference them as `Ty::Var`.
    pub fn register_struct(
        &mut self,
        name: &str,
        parent: TypeId,
        fields: Vec<Field>,
        mutable: bool,
        params: Vec<String>,
    ) -> Result<TypeId, LatticeError> {
        self.check_new_name(name)?;
        self.check_abstract_parent(parent)?;
        let id = self.push(name, parent, TypeKind::Concrete { fields, mutable }, params);
        self.version += 1;
        Ok(id)
    }

    fn check_new_name(&self, name: &str) -> Result<(), LatticeError> {
        if self.by_name.contains_key(name) {
            return Err(LatticeError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    fn check_abstract_parent(&self, parent: TypeId) -> Result<(), LatticeError> {
        let node = self.node(parent);
        if !matches!(node.kind, TypeKind::Abstract) {
            return Err(LatticeError::ConcreteParent(node.name.clone()));
        }
        Ok(())
    }

    pub fn node(&self, id: TypeId) -> &TypeNode {
        &self.nodes[id.index()]
    }

    pub fn name(&self, id: TypeId) -> &str {
        &self.nodes[id.index()].name
    }

    pub fn id_of(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Iterate all registered nodes in id order.
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &TypeNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (TypeId(i as u32), node))
    }

    /// Walk parent edges: is `ancestor` on the (reflexive) ancestor chain of `of`?
    pub fn is_ancestor(&self, ancestor: TypeId, of: TypeId) -> bool {
        let mut current = of;
        loop {
            if current == ancestor {
                return true;
            }
            let parent = self.node(current).parent;
            if parent == current {
                // Reached Any (its own parent)
                return false;
            }
            current = parent;
        }
    }

    pub fn is_abstract(&self, id: TypeId) -> bool {
        matches!(self.node(id).kind, TypeKind::Abstract)
    }

    pub fn is_concrete(&self, id: TypeId) -> bool {
        !self.is_abstract(id)
    }

    /// Field list of a concrete type (empty for primitives and abstracts).
    pub fn fields(&self, id: TypeId) -> &[Field] {
        match &self.node(id).kind {
            TypeKind::Concrete { fields, .. } => fields,
            _ => &[],
        }
    }

    pub fn is_mutable(&self, id: TypeId) -> bool {
        matches!(self.node(id).kind, TypeKind::Concrete { mutable: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every `core_types` constant must resolve to the node with the matching
    /// name. If bootstrap registration order drifts, this test pinpoints it.
    #[test]
    fn test_core_ids_match_names() {
        use core_types as c;
        let lat = TypeLattice::bootstrap();
        for (id, name) in [
            (c::ANY, "Any"),
            (c::NUMBER, "Number"),
            (c::REAL, "Real"),
            (c::INTEGER, "Integer"),
            (c::SIGNED, "Signed"),
            (c::UNSIGNED, "Unsigned"),
            (c::ABSTRACT_FLOAT, "AbstractFloat"),
            (c::ABSTRACT_IRRATIONAL, "AbstractIrrational"),
            (c::ABSTRACT_STRING, "AbstractString"),
            (c::ABSTRACT_CHAR, "AbstractChar"),
            (c::ABSTRACT_ARRAY, "AbstractArray"),
            (c::FUNCTION, "Function"),
            (c::EXCEPTION, "Exception"),
            (c::TYPE, "Type"),
            (c::BOOL, "Bool"),
            (c::INT8, "Int8"),
            (c::INT16, "Int16"),
            (c::INT32, "Int32"),
            (c::INT64, "Int64"),
            (c::INT128, "Int128"),
            (c::UINT8, "UInt8"),
            (c::UINT16, "UInt16"),
            (c::UINT32, "UInt32"),
            (c::UINT64, "UInt64"),
            (c::UINT128, "UInt128"),
            (c::BIGINT, "BigInt"),
            (c::FLOAT16, "Float16"),
            (c::FLOAT32, "Float32"),
            (c::FLOAT64, "Float64"),
            (c::BIGFLOAT, "BigFloat"),
            (c::CHAR, "Char"),
            (c::STRING, "String"),
            (c::SYMBOL, "Symbol"),
            (c::NOTHING, "Nothing"),
            (c::MISSING, "Missing"),
            (c::RATIONAL, "Rational"),
            (c::COMPLEX, "Complex"),
            (c::ARRAY, "Array"),
            (c::MEMORY, "Memory"),
            (c::TUPLE, "Tuple"),
            (c::NAMED_TUPLE, "NamedTuple"),
            (c::PAIRS, "Pairs"),
            (c::PAIR, "Pair"),
            (c::SET, "Set"),
            (c::REGEX, "Regex"),
            (c::VERSION_NUMBER, "VersionNumber"),
            (c::HTML, "HTML"),
            (c::TEXT, "Text"),
            (c::MIME, "MIME"),
            (c::SOME, "Some"),
            (c::DATA_TYPE, "DataType"),
            (c::UNION_ALL, "UnionAll"),
            (c::EXPR, "Expr"),
            (c::QUOTE_NODE, "QuoteNode"),
            (c::GENERATOR, "Generator"),
            (c::IO_BUFFER, "IOBuffer"),
            (c::CODE_UNITS, "CodeUnits"),
            (c::METHOD_ERROR, "MethodError"),
            (c::AMBIGUITY_ERROR, "AmbiguityError"),
            (c::TYPE_ERROR, "TypeError"),
            (c::ARGUMENT_ERROR, "ArgumentError"),
            (c::DIVIDE_ERROR, "DivideError"),
            (c::DOMAIN_ERROR, "DomainError"),
            (c::INEXACT_ERROR, "InexactError"),
            (c::DIMENSION_MISMATCH, "DimensionMismatch"),
            (c::KEY_ERROR, "KeyError"),
            (c::STRING_INDEX_ERROR, "StringIndexError"),
            (c::ASSERTION_ERROR, "AssertionError"),
            (c::EOF_ERROR, "EOFError"),
            (c::UNDEF_KEYWORD_ERROR, "UndefKeywordError"),
            (c::OVERFLOW_ERROR, "OverflowError"),
            (c::ERROR_EXCEPTION, "ErrorException"),
            (c::BOUNDS_ERROR, "BoundsError"),
            (c::UNDEF_VAR_ERROR, "UndefVarError"),
            (c::ABSTRACT_RANGE, "AbstractRange"),
            (c::UNIT_RANGE, "UnitRange"),
            (c::STEP_RANGE, "StepRange"),
        ] {
            assert_eq!(
                lat.id_of(name),
                Some(id),
                "core id constant for `{}` does not match bootstrap order",
                name
            );
        }
    }

    #[test]
    fn test_numeric_tower_ancestry() {
        use core_types as c;
        let lat = TypeLattice::bootstrap();
        // Int64 <: Signed <: Integer <: Real <: Number <: Any
        assert!(lat.is_ancestor(c::SIGNED, c::INT64));
        assert!(lat.is_ancestor(c::INTEGER, c::INT64));
        assert!(lat.is_ancestor(c::REAL, c::INT64));
        assert!(lat.is_ancestor(c::NUMBER, c::INT64));
        assert!(lat.is_ancestor(c::ANY, c::INT64));
        // Bool sits directly under Integer, not under Signed/Unsigned
        assert!(lat.is_ancestor(c::INTEGER, c::BOOL));
        assert!(!lat.is_ancestor(c::SIGNED, c::BOOL));
        assert!(!lat.is_ancestor(c::UNSIGNED, c::BOOL));
        // Complex is a Number but not Real
        assert!(lat.is_ancestor(c::NUMBER, c::COMPLEX));
        assert!(!lat.is_ancestor(c::REAL, c::COMPLEX));
        // Rational is Real
        assert!(lat.is_ancestor(c::REAL, c::RATIONAL));
        // Exceptions live under Exception
        assert!(lat.is_ancestor(c::EXCEPTION, c::METHOD_ERROR));
        assert!(!lat.is_ancestor(c::NUMBER, c::METHOD_ERROR));
    }

    #[test]
    fn test_register_abstract_and_struct() {
        use core_types as c;
        let mut lat = TypeLattice::bootstrap();
        let v0 = lat.version();

        let shape = lat.register_abstract("Shape", c::ANY).unwrap();
        let circle = lat
            .register_struct(
                "Circle",
                shape,
                vec![Field {
                    name: "r".to_string(),
                    ty: Ty::Named(c::FLOAT64),
                }],
                false,
                Vec::new(),
            )
            .unwrap();

        assert!(lat.is_ancestor(shape, circle));
        assert!(lat.is_ancestor(c::ANY, circle));
        assert!(lat.version() > v0);

        // Duplicate names are rejected
        assert!(matches!(
            lat.register_abstract("Shape", c::ANY),
            Err(LatticeError::DuplicateName(_))
        ));
        // Concrete parents are rejected
        assert!(matches!(
            lat.register_abstract("SubCircle", circle),
            Err(LatticeError::ConcreteParent(_))
        ));
    }

    #[test]
    fn test_version_bumps_monotonically() {
        use core_types as c;
        let mut lat = TypeLattice::bootstrap();
        let v0 = lat.version();
        lat.register_abstract("Animal", c::ANY).unwrap();
        let v1 = lat.version();
        lat.register_abstract("Mammal", lat.id_of("Animal").unwrap())
            .unwrap();
        let v2 = lat.version();
        assert!(v0 < v1 && v1 < v2);
    }
}
