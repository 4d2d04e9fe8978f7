extern crate serde;
extern crate serde_json;

extern crate chrono;
extern crate clap;
extern crate include_dir;
extern crate itertools;
#[macro_use]
extern crate lazy_static;
extern crate liquid;
extern crate petgraph;
extern crate reqwest;
#[macro_use]
extern crate tracing;
extern crate tracing_subscriber;
extern crate uuid;

pub mod errors;
pub mod file_format;
pub mod graph;

pub mod engine;
pub mod file_utils;
pub mod handlers;
pub mod logging;
pub mod repository;
pub mod templating;
pub mod views;

#[doc(hidden)]
pub mod utils;

pub use engine::{Dashboard, Engine};
pub use errors::{DashboardError, Result};
