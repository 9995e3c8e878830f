pub mod anchor;
pub mod candidate;
pub mod finding;
pub mod provenance;
