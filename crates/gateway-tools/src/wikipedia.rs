//! Wikipedia Provider
//!
//! Article summaries and search over the public REST API. No key needed.

use agent_core::ParameterSchema;

use crate::rest::{ParamLocation, RestEndpoint, RestProvider};

pub const BASE_URL: &str = "https://en.wikipedia.org";

pub const USER_AGENT: &str = "ToolUseAPI/0.1";

/// Wikipedia provider against the public endpoint
pub fn provider(client: reqwest::Client) -> RestProvider {
    provider_at(BASE_URL, client)
}

/// Wikipedia provider against any compatible host
pub fn provider_at(base_url: &str, client: reqwest::Client) -> RestProvider {
    RestProvider::new(
        "wikipedia",
        "Wikipedia REST API for article summaries and search",
        base_url,
        client,
    )
    .header("User-Agent", USER_AGENT)
    .endpoint(
        RestEndpoint::get("get_summary", "/api/rest_v1/page/summary/{title}")
            .description("Get a summary of a Wikipedia article")
            .param(
                ParameterSchema::required(
                    "title",
                    "string",
                    "Article title (e.g. 'Python_(programming_language)')",
                ),
                ParamLocation::Path,
            ),
    )
    .endpoint(
        RestEndpoint::get("search", "/w/rest.php/v1/search/page")
            .description("Search Wikipedia articles")
            .param(
                ParameterSchema::required("q", "string", "Search query"),
                ParamLocation::Query,
            )
            .param(
                ParameterSchema::optional("limit", "integer", "Max results (default 10)"),
                ParamLocation::Query,
            )
            .extract("pages"),
    )
}
