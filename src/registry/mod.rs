// Reference data loaded once per run and shared read-only

pub mod countries;
pub mod grid;

pub use countries::CountryAllowList;
pub use grid::{AliasTable, InstitutionRegistry, RegistryEntry};
