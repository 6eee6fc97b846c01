pub mod classify_types;
pub mod remote_file;
