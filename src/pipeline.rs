//! Request handling shared by the two Lambda functions.
//!
//! Both handlers follow the same shape: validate the payload size, parse
//! it, embed text, then hit the vector store. The query path additionally
//! asks the completion model for candidate item types and fans out one
//! embed-then-search round per candidate.

use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::bedrock::TextModels;
use crate::database::{ItemStore, SearchResult};
use crate::error::{Error, Result};
use crate::event::MAX_BODY_BYTES;
use crate::params::{LlmParameters, RecommendationDefaults};
use crate::templates;

/// Candidate item types in a completion are separated by this marker.
const CANDIDATE_DELIMITER: &str = "###";

/// Query-path request body.
#[derive(Debug, Deserialize)]
pub struct RecommendationRequest {
    pub text: String,
    pub num_items: Option<u32>,
    pub num_types: Option<u32>,
    /// Extra values bound into the search template after the embedding and
    /// the item count, in order.
    #[serde(default)]
    pub additional_query_parameters: Vec<String>,
    /// Extra values substituted into the prompt template after the text and
    /// the type count, in order.
    #[serde(default)]
    pub additional_prompt_parameters: Vec<String>,
}

/// Load-path request body.
#[derive(Debug, Deserialize)]
pub struct LoadRequest {
    pub text: String,
    #[serde(default)]
    pub additional_query_parameters: Vec<String>,
}

/// Query-path response body.
#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub items: Vec<SearchResult>,
}

/// Validates the body size and parses it.
///
/// The size bound is checked on the raw bytes before any parsing or
/// external call.
pub fn parse_request<T: DeserializeOwned>(body: &str) -> Result<T> {
    if body.len() > MAX_BODY_BYTES {
        return Err(Error::Validation(
            "Event body is too large".to_string(),
        ));
    }
    serde_json::from_str(body).map_err(|e| {
        Error::Validation(format!("malformed request body: {e}"))
    })
}

/// Splits a completion into candidate item types.
///
/// A completion containing the delimiter on a fresh line is split on the
/// delimiter; anything else is a single candidate. Candidates are trimmed
/// and empty ones dropped.
pub fn split_candidates(completion: &str) -> Vec<String> {
    let parts: Vec<&str> = if completion
        .contains(&format!("\n{CANDIDATE_DELIMITER}"))
    {
        completion.split(CANDIDATE_DELIMITER).collect()
    } else {
        vec![completion]
    };
    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(String::from)
        .collect()
}

/// Sorts matches ascending by distance and keeps the closest occurrence of
/// each id.
pub fn dedupe_by_distance(
    mut matches: Vec<SearchResult>,
) -> Vec<SearchResult> {
    matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    let mut seen = std::collections::HashSet::new();
    matches.retain(|m| seen.insert(m.id));
    matches
}

/// Produces ranked recommendations for one request.
///
/// The completion model proposes candidate item types; each candidate is
/// embedded and searched concurrently, then all matches are merged,
/// deduplicated and ranked. A failed candidate search is logged and its
/// matches are simply absent from the result, so a partial outcome is still
/// a successful response.
pub async fn recommend(
    models: &(impl TextModels + Sync),
    store: &(impl ItemStore + Sync),
    prompt_template: &str,
    query_template: &str,
    llm: &LlmParameters,
    defaults: &RecommendationDefaults,
    request: &RecommendationRequest,
) -> Result<Vec<SearchResult>> {
    let num_types = request.num_types.unwrap_or(defaults.num_types);
    let num_items = request.num_items.unwrap_or(defaults.num_items);

    let mut prompt_args =
        vec![request.text.clone(), num_types.to_string()];
    prompt_args
        .extend(request.additional_prompt_parameters.iter().cloned());
    let prompt = templates::render(prompt_template, &prompt_args)?;

    let completion =
        models.complete(&defaults.model_id, &prompt, llm).await?;
    let candidates = split_candidates(&completion);
    info!("completion yielded {} candidate item type(s)", candidates.len());

    let additional = &request.additional_query_parameters;
    let searches = candidates.iter().map(|candidate| async move {
        let embedding = models.embed(candidate).await?;
        store
            .search(query_template, &embedding, num_items, additional)
            .await
    });

    let mut matches = Vec::new();
    for outcome in join_all(searches).await {
        match outcome {
            Ok(mut rows) => matches.append(&mut rows),
            Err(e) => error!("candidate search failed: {e}"),
        }
    }

    Ok(dedupe_by_distance(matches))
}

/// Embeds one item and stores it.
///
/// A persistence failure is logged but does not fail the request; a retried
/// load must stay idempotent from the caller's point of view.
pub async fn load_item(
    models: &(impl TextModels + Sync),
    store: &(impl ItemStore + Sync),
    insert_template: &str,
    request: &LoadRequest,
) -> Result<()> {
    let embedding = models.embed(&request.text).await?;
    if let Err(e) = store
        .insert(
            insert_template,
            &request.text,
            &embedding,
            &request.additional_query_parameters,
        )
        .await
    {
        error!("failed to insert item into the vector store: {e}");
    }
    Ok(())
}
