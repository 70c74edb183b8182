use crate::linking::{CityResolver, PostalCodeIndex};

/// Shared, read-only state. The index is fully built before the state is
/// constructed, so handlers never see a partial index.
pub struct AppState {
    pub index: PostalCodeIndex,
    pub threshold: f64,
}

impl AppState {
    pub fn resolver(&self) -> CityResolver<'_> {
        CityResolver::new(&self.index, self.threshold)
    }
}
