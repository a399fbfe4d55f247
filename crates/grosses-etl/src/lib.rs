// Weekly Broadway grosses loader: fetches report pages, parses and
// normalizes them with grosses-core, and loads the rows into SQLite.

pub mod cli;
pub mod config;
pub mod db;
pub mod fetch;
pub mod parse;
pub mod pipeline;
