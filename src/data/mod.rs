/// Data layer: core types, loading, and the table transformations.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Table
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ TimeFrame  │  current Table, column roles, date bounds
///   └───────────┘
///        │  borrow, return a new Table; commit to replace
///        ▼
///   ┌──────────┐  ┌───────────┐  ┌──────────┐
///   │  filter   │→ │ aggregate  │→ │ forecast  │
///   └──────────┘  └───────────┘  └──────────┘
/// ```

pub mod aggregate;
pub mod date;
pub mod error;
pub mod filter;
pub mod forecast;
pub mod frame;
pub mod loader;
pub mod model;

pub use error::FrameError;
pub use frame::TimeFrame;
pub use model::{Row, Table, Value};
