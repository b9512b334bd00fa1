pub mod config;
pub mod document;
pub mod entries;
pub mod gaps;
pub mod history;
pub mod init;
pub mod manifest;
pub mod scan;
pub mod status;
