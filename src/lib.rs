//! A path-expression engine over nested tree data.
//!
//! Paths combine dotted key traversal, list indexing and slicing, mapping
//! (`[]`), predicate filters with boolean composition (`[?a==1 && b>2]`),
//! wildcards (`*`, `**`), root back-references (`$$root`) and pipelined
//! value transforms (`|$double|$string`). Four operations execute a
//! compiled path against a caller-owned tree: [`get`], [`exists`], [`set`]
//! and [`unset`]; `set` and `unset` mutate the tree in place.
//!
//! ```
//! use serde_json::json;
//! use treepath::{get, set, GetOptions, SetOptions, Value};
//!
//! let mut data = Value::from(json!({
//!     "users": [{"id": 1, "name": "Ada"}, {"id": 2, "name": "Lin"}]
//! }));
//!
//! let name = get(&data, "users[?id==2].name[]", &GetOptions::default()).unwrap();
//! assert_eq!(name, Value::from(json!(["Lin"])));
//!
//! set(&mut data, "users[].active", Value::Bool(true), &SetOptions::default()).unwrap();
//! assert!(treepath::exists(&data, "users[0].active", false).unwrap());
//! ```

pub mod ast;
mod engine;
pub mod error;
mod functions;
mod parser;
mod pipeline;
pub mod value;
mod writer;

pub use ast::{ParsedPath, Token};
pub use engine::{exists, get, run_filter_function, GetOptions};
pub use error::PathError;
pub use parser::parse_path;
pub use value::Value;
pub use writer::{set, unset, SetOptions};
