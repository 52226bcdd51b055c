pub mod csv_output;
pub mod ner_client;
pub mod notifier;
pub mod object_store;
pub mod static_ner;
