/// Data layer: table model, loading, statistics and grouping.
///
/// Architecture:
/// ```text
///  .csv / .tsv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader  │  parse file → Dataset (types inferred per column)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ Dataset  │  Vec<Column>, numeric or text, missing = None
///   └──────────┘
///        │
///        ├──► stats   describe / std / var / correlation
///        └──► group   group_by(key).aggregate(target, sum | mean)
/// ```

pub mod group;
pub mod loader;
pub mod model;
pub mod stats;
