// Pure stages: XML extraction, flattening, regex fields, entity selection and
// institution resolution

pub mod enrich;
pub mod entities;
pub mod extract;
pub mod flatten;
pub mod resolution;
