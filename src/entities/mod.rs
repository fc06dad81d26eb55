pub mod config_document;
