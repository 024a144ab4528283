mod local_index;
mod remote_server;
mod server_interface;

pub use local_index::{make_local_server, LocalIndex};
pub use remote_server::make_remote_server;
pub use server_interface::{
    AbstractServer, ErrorDetails, ErrorLayer, Phrase, PhraseWord, Result, SearchResults,
    ServerError, WordTag,
};

use url::Url;

/// Pick a backend the same way for every entry point: anything that parses as
/// a URL is a remote server, anything else is a path to a fixture file.
pub fn make_server(server: &str) -> Result<Box<dyn AbstractServer + Send + Sync>> {
    match Url::parse(server) {
        Ok(url) => make_remote_server(url),
        Err(_) => make_local_server(server),
    }
}
