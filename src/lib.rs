extern crate serde;
extern crate serde_json;

extern crate clap;
extern crate itertools;
#[macro_use]
extern crate lazy_static;
extern crate regex;
#[macro_use]
extern crate tracing;
extern crate tracing_subscriber;
extern crate uuid;

pub mod abstract_server;
pub mod config;
pub mod logging;
pub mod query;
pub mod word_graph;
