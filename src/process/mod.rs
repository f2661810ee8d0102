//! Pure per-record field transformations. Nothing here touches the store or
//! shared state, so every function can run inside a rayon iterator.

pub mod date;
pub mod level;
pub mod normalize;
pub mod score;
pub mod surface;

pub use date::{DateBounds, resolve_date};
pub use level::{classify_tier, resolve_level};
pub use normalize::{ProcessingStats, derive_fields, normalize_doubles, normalize_matches, normalize_rankings};
pub use score::{canonical_score, parse_score};
pub use surface::resolve_surface;
