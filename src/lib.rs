pub mod config;
pub mod csv_rows;
pub mod db;
pub mod error;
pub mod loaders;
pub mod logging;
pub mod model;
pub mod paths;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod raw;
pub mod tour;
pub mod verify;
