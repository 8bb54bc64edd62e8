// Submodules for separation of concerns
mod directives;
mod filter;
mod merge;
mod odata;
mod parsed;
mod raw;
pub(crate) mod types;

// Public API re-exports (preserve original paths)
pub use directives::{decode_limit, decode_select, decode_skip, decode_sort};
pub use filter::{CompareOp, FilterExpr, FilterGrammar, Operand, compile_filter};
pub use merge::deep_merge;
pub use odata::ODataGrammar;
pub use parsed::ParsedQuery;
pub use raw::parse_raw_query;
pub use types::{DEFAULT_LIMIT, Order, Projection, QueryParams, RESERVED_KEYS, is_reserved_key};
