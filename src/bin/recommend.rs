//! `recommend`
//!
//! You have to configure the following environment variables:
//! - `DB_READER_ENDPOINT`: hostname of the vector database reader endpoint.
//! - `DATABASE_NAME`: name of the database on the cluster.
//! - `TEMPLATE_BUCKET_NAME`: name of the S3 bucket that stores the prompt
//!   and query templates.
//! - `PROMPT_TEMPLATE_OBJECT_PATH`: object key of the prompt template.
//! - `QUERY_TEMPLATE_OBJECT_PATH`: object key of the vector search template.
//! - `LLM_PARAMETER_NAME`: SSM parameter holding the generation parameters.
//! - `RECOMMENDATION_PARAMETER_NAME`: SSM parameter holding the
//!   recommendation defaults.
//!
//! The function accepts an API Gateway proxy event whose body is a
//! [`RecommendationRequest`] and returns `{"items": [...]}`, either in the
//! proxy response (REST) or pushed over the invoking WebSocket connection.

use lambda_runtime::{run, service_fn, Error, LambdaEvent};

use recommender::bedrock::Bedrock;
use recommender::database::{self, DbCredentials, VectorStore};
use recommender::error::Error as CoreError;
use recommender::event::{
    self, ProxyRequest, ProxyResponse, Transport,
};
use recommender::params::{
    self, LlmParameters, RecommendationDefaults,
};
use recommender::pipeline::{
    self, RecommendationRequest, RecommendationResponse,
};
use recommender::templates;
use recommender::utils::required_env;

/// Clients and configuration resolved once at cold-start.
struct SharedState {
    aws_config: aws_config::SdkConfig,
    bedrock: Bedrock,
    s3: aws_sdk_s3::Client,
    reader_endpoint: String,
    database_name: String,
    template_bucket: String,
    prompt_template_path: String,
    query_template_path: String,
    llm: LlmParameters,
    defaults: RecommendationDefaults,
    credentials: DbCredentials,
}

async fn function_handler(
    state: &SharedState,
    event: LambdaEvent<ProxyRequest>,
) -> Result<ProxyResponse, Error> {
    let transport = match Transport::resolve(
        event.payload.request_context.as_ref(),
    ) {
        Ok(transport) => transport,
        Err(e) => return Ok(ProxyResponse::bad_request(e.to_string())),
    };

    let request: RecommendationRequest =
        match pipeline::parse_request(&event.payload.body) {
            Ok(request) => request,
            Err(e @ CoreError::Validation(_)) => {
                return Ok(ProxyResponse::bad_request(e.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

    let prompt_template = templates::fetch(
        &state.s3,
        &state.template_bucket,
        &state.prompt_template_path,
    )
    .await?;
    let query_template = templates::fetch(
        &state.s3,
        &state.template_bucket,
        &state.query_template_path,
    )
    .await?;

    // The connection lives for this invocation only and is released when
    // `store` goes out of scope, error paths included.
    let store = VectorStore::connect(
        &state.reader_endpoint,
        &state.database_name,
        &state.credentials,
    )
    .await?;
    let items = pipeline::recommend(
        &state.bedrock,
        &store,
        &prompt_template,
        &query_template,
        &state.llm,
        &state.defaults,
        &request,
    )
    .await?;
    drop(store);

    let body = serde_json::to_string(&RecommendationResponse { items })?;
    match transport {
        Transport::Direct => Ok(ProxyResponse::json(body)),
        Transport::Push {
            connection_id,
            callback_url,
        } => {
            event::push_to_connection(
                &state.aws_config,
                &connection_id,
                &callback_url,
                body.into_bytes(),
            )
            .await?;
            Ok(ProxyResponse::status(200))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        // disable printing the name of the module in every log line.
        .with_target(false)
        // disabling time is handy because CloudWatch will add the ingestion time.
        .without_time()
        .init();

    let reader_endpoint = required_env("DB_READER_ENDPOINT")?;
    let database_name = required_env("DATABASE_NAME")?;
    let template_bucket = required_env("TEMPLATE_BUCKET_NAME")?;
    let prompt_template_path = required_env("PROMPT_TEMPLATE_OBJECT_PATH")?;
    let query_template_path = required_env("QUERY_TEMPLATE_OBJECT_PATH")?;
    let llm_parameter_name = required_env("LLM_PARAMETER_NAME")?;
    let recommendation_parameter_name =
        required_env("RECOMMENDATION_PARAMETER_NAME")?;

    let aws_config = aws_config::load_defaults(
        aws_config::BehaviorVersion::latest(),
    )
    .await;
    let ssm = aws_sdk_ssm::Client::new(&aws_config);
    let secrets_manager =
        aws_sdk_secretsmanager::Client::new(&aws_config);

    let llm: LlmParameters =
        params::fetch_json(&ssm, &llm_parameter_name).await?;
    let defaults: RecommendationDefaults =
        params::fetch_json(&ssm, &recommendation_parameter_name).await?;
    let credentials =
        database::fetch_credentials(&secrets_manager).await?;

    let state = SharedState {
        bedrock: Bedrock::new(&aws_config),
        s3: aws_sdk_s3::Client::new(&aws_config),
        aws_config,
        reader_endpoint,
        database_name,
        template_bucket,
        prompt_template_path,
        query_template_path,
        llm,
        defaults,
        credentials,
    };
    let state = &state;

    run(service_fn(move |event: LambdaEvent<ProxyRequest>| {
        async move { function_handler(state, event).await }
    }))
    .await
}
