//! Ripple Query - expression IR, row evaluation and predicate algebra.
//!
//! This crate provides:
//!
//! - `ir`: the expression tree (`PropRef`, `Value`, `Func`, ...) and query shape
//! - `eval`: evaluation of expressions against records
//! - `predicate`: subset, union and difference over where/order/limit windows
//! - `cursor`: keyset pagination filters built from an ordering and a row

#![no_std]

extern crate alloc;

pub mod cursor;
pub mod eval;
pub mod ir;
pub mod predicate;

pub use cursor::build_cursor;
pub use eval::{compile_where, evaluate, matches, CompiledWhere, RowScope};
