//! `field:value` search syntax
//!
//! [`parse_search`] turns the search box string into AND-ed
//! [`SearchFilter`]s, which can be checked in memory against any
//! [`Searchable`] record or sent to PostgREST via [`to_postgrest_params`].

mod filter;
mod parser;

pub use filter::{
    field_for_shortcut, matches_all, to_postgrest_params, SearchFilter, Searchable, ANY_FIELD,
    BROAD_COLUMNS,
};
pub use parser::parse_search;
