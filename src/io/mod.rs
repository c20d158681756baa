//! Field file input and output.
//!
//! This module provides:
//! - **Tokenizer and dictionary**: the subset of the dictionary syntax that
//!   field files use (`key value;`, nested `{ }` blocks, comments)
//! - **Value formatting**: shortest round-trip text for scalars and
//!   tensor-rank values, `uniform`/`nonuniform List<type>` lists
//! - **Field files**: ASCII read/write of [`GeometricField`](crate::field::GeometricField)
//!
//! # Example
//!
//! ```
//! use fv_rs::boundary::{BoundaryConditionRegistry, FixedValue};
//! use fv_rs::field::GeometricField;
//! use fv_rs::io::{read_field_string, write_field_string};
//! use fv_rs::mesh::HexBlock;
//! use fv_rs::types::DIM_PRESSURE;
//!
//! let mesh = HexBlock::new(2, 2, 1).build().unwrap();
//! let p = GeometricField::<f64>::builder("p", DIM_PRESSURE)
//!     .internal_from_centres(|c| c.x + 0.1)
//!     .patch("left", FixedValue::uniform(1.0))
//!     .build(&mesh)
//!     .unwrap();
//! let text = write_field_string(&p, &mesh).unwrap();
//! let registry = BoundaryConditionRegistry::<f64>::with_standard_conditions();
//! let back = read_field_string::<f64>(&text, &mesh, &registry).unwrap();
//! assert_eq!(back.internal(), p.internal());
//! ```

pub mod dictionary;
mod field_io;
pub mod format;

pub use dictionary::{Dictionary, Entry, Token, tokenize};
pub use field_io::{field_class, read_field, read_field_string, write_field, write_field_string};
pub use format::{format_field, format_list, format_scalar, format_value};
