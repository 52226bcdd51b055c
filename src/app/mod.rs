pub mod ports;
pub mod acquire_use_case;
pub mod enrich_use_case;
pub mod publish_use_case;
