//! City Linker: resolves company addresses to canonical city entities.
//!
//! The [`linking`] module holds the pure core (postal-code index and
//! resolver). [`loader`], [`config`] and [`server`] wrap it with CSV I/O,
//! configuration and an HTTP surface.

pub mod config;
pub mod linking;
pub mod loader;
pub mod server;

pub use config::LinkerConfig;
pub use linking::{
    resolve, AddressQuery, CityMatch, CityResolver, LinkError, MatchResult, PostalCodeIndex,
    RawCityRecord,
};
