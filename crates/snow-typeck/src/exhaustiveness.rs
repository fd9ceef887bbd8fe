//! Maranget's usefulness algorithm for exhaustiveness and redundancy checking.
//!
//! This module implements Algorithm U from Luc Maranget's paper
//! "Warnings for Pattern Matching" (2007). It operates on an abstract
//! pattern representation (`Pat`), not AST nodes directly. Translation
//! from AST patterns to `Pat` happens elsewhere (Plan 04-04).
//!
//! The core predicate `is_useful(matrix, row, type_info)` determines whether
//! a new pattern row adds any coverage to the existing matrix. Both
//! exhaustiveness (is wildcard useful after all arms?) and redundancy
//! (is each arm useful given prior arms?) are expressed via `is_useful`.

// Placeholder module -- tests will be added first per TDD, implementation follows.

/// The kind of a literal pattern value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LitKind {
    Int,
    Float,
    Bool,
    String,
}

/// Abstract pattern representation for exhaustiveness checking.
///
/// These are NOT AST nodes -- they are a simplified representation
/// used only by the usefulness algorithm.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pat {
    /// Matches anything (wildcard `_` or variable binding).
    Wildcard,
    /// Matches a specific constructor with arguments.
    Constructor {
        name: String,
        type_name: String,
        args: Vec<Pat>,
    },
    /// Matches a specific literal value.
    Literal { value: String, ty: LitKind },
    /// Matches any of the alternatives (or-pattern).
    Or { alternatives: Vec<Pat> },
}

/// A row in the pattern matrix (one match arm's patterns).
pub type PatternRow = Vec<Pat>;

/// The pattern matrix: each row corresponds to one match arm.
#[derive(Clone, Debug)]
pub struct PatternMatrix {
    pub rows: Vec<PatternRow>,
}

/// Signature of a constructor (name + arity).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstructorSig {
    pub name: String,
    pub arity: usize,
}

/// Type information needed for exhaustiveness checking.
///
/// Tells the algorithm what constructors a type has, so it can
/// determine if all cases are covered.
#[derive(Clone, Debug)]
pub enum TypeInfo {
    /// A sum type with known, finite variants.
    SumType { variants: Vec<ConstructorSig> },
    /// Bool type (two constructors: true, false).
    Bool,
    /// A literal type with infinite inhabitants (Int, Float, String).
    Infinite,
}

/// Check whether a match expression is exhaustive.
///
/// Returns `None` if exhaustive, or `Some(witnesses)` with example
/// patterns that are not covered.
pub fn check_exhaustiveness(
    _arms: &[Pat],
    _scrutinee_type: &TypeInfo,
) -> Option<Vec<Pat>> {
    todo!()
}

/// Check for redundant (unreachable) arms in a match expression.
///
/// Returns the indices (0-based) of arms that are unreachable.
pub fn check_redundancy(
    _arms: &[Pat],
    _scrutinee_type: &TypeInfo,
) -> Vec<usize> {
    todo!()
}

/// Core usefulness predicate (Algorithm U).
///
/// Returns `true` if `row` is useful with respect to `matrix` --
/// i.e., there exists a value matched by `row` but not by any row
/// in `matrix`.
pub fn is_useful(
    _matrix: &PatternMatrix,
    _row: &[Pat],
    _type_info: &[TypeInfo],
) -> bool {
    todo!()
}
