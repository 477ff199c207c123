mod common;
mod files;
