use async_trait::async_trait;
use serde_json::from_str;
use url::{ParseError, Url};

use super::server_interface::{
    AbstractServer, ErrorDetails, ErrorLayer, Result, SearchResults, ServerError,
};

/// reqwest won't return an error for an unhappy status code itself; someone
/// would need to call `Response::error_from_status`, so for now we'll generally
/// assume everything is some kind of transient problem.
impl From<reqwest::Error> for ServerError {
    fn from(err: reqwest::Error) -> ServerError {
        ServerError::TransientProblem(ErrorDetails {
            layer: ErrorLayer::ServerLayer,
            message: err.to_string(),
        })
    }
}

impl From<ParseError> for ServerError {
    fn from(err: ParseError) -> ServerError {
        ServerError::StickyProblem(ErrorDetails {
            layer: ErrorLayer::BadInput,
            message: err.to_string(),
        })
    }
}

#[derive(Clone, Debug)]
struct RemoteServer {
    // reqwest's client is an `Arc` internally, so clones share the pool.
    client: reqwest::Client,
    search_url: Url,
}

async fn get_json(client: &reqwest::Client, url: Url) -> Result<reqwest::Response> {
    let res = client
        .get(url)
        .header("Accept", "application/json")
        .send()
        .await?;

    if !res.status().is_success() {
        if res.status().is_server_error() {
            return Err(ServerError::TransientProblem(ErrorDetails {
                layer: ErrorLayer::ServerLayer,
                message: format!("Server status of {}", res.status()),
            }));
        } else {
            return Err(ServerError::StickyProblem(ErrorDetails {
                layer: ErrorLayer::DataLayer,
                message: format!("Server status of {}", res.status()),
            }));
        }
    }

    Ok(res)
}

#[async_trait]
impl AbstractServer for RemoteServer {
    fn clonify(&self) -> Box<dyn AbstractServer + Send + Sync> {
        Box::new(self.clone())
    }

    async fn search(&self, query: &str, corpus: &str, topk: usize) -> Result<SearchResults> {
        let mut url = self.search_url.clone();
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("corpus", corpus)
            .append_pair("topk", &topk.to_string());
        trace!(url = %url);

        let raw_str = get_json(&self.client, url).await?.text().await?;
        match from_str(&raw_str) {
            Ok(results) => Ok(results),
            Err(err) => Err(ServerError::StickyProblem(ErrorDetails {
                layer: ErrorLayer::ServerLayer,
                message: err.to_string(),
            })),
        }
    }
}

pub fn make_remote_server(server_base_url: Url) -> Result<Box<dyn AbstractServer + Send + Sync>> {
    let search_url = server_base_url.join("search")?;

    Ok(Box::new(RemoteServer {
        client: reqwest::Client::new(),
        search_url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_url_is_relative_to_base() {
        let base = Url::parse("https://phrases.example.org/api/").unwrap();
        assert!(make_remote_server(base).is_ok());

        let joined = Url::parse("https://phrases.example.org/api/")
            .unwrap()
            .join("search")
            .unwrap();
        assert_eq!(joined.as_str(), "https://phrases.example.org/api/search");
    }
}
