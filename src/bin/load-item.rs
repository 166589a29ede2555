//! `load-item`
//!
//! You have to configure the following environment variables:
//! - `DB_WRITER_ENDPOINT`: hostname of the vector database writer endpoint.
//! - `DATABASE_NAME`: name of the database on the cluster.
//! - `TEMPLATE_BUCKET_NAME`: name of the S3 bucket that stores the query
//!   templates.
//! - `QUERY_TEMPLATE_OBJECT_PATH`: object key of the vector insert template.
//!
//! The function accepts an API Gateway proxy event whose body is a
//! [`LoadRequest`], embeds the text and inserts it into the vector store,
//! acknowledging over the proxy response (REST) or the invoking WebSocket
//! connection.

use lambda_runtime::{run, service_fn, Error, LambdaEvent};

use recommender::bedrock::Bedrock;
use recommender::database::{self, DbCredentials, VectorStore};
use recommender::error::Error as CoreError;
use recommender::event::{
    self, ProxyRequest, ProxyResponse, Transport,
};
use recommender::pipeline::{self, LoadRequest};
use recommender::templates;
use recommender::utils::required_env;

const ACKNOWLEDGEMENT: &str = "Data has been loaded";

/// Clients and configuration resolved once at cold-start.
struct SharedState {
    aws_config: aws_config::SdkConfig,
    bedrock: Bedrock,
    s3: aws_sdk_s3::Client,
    writer_endpoint: String,
    database_name: String,
    template_bucket: String,
    insert_template_path: String,
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

    let request: LoadRequest =
        match pipeline::parse_request(&event.payload.body) {
            Ok(request) => request,
            Err(e @ CoreError::Validation(_)) => {
                return Ok(ProxyResponse::bad_request(e.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

    let insert_template = templates::fetch(
        &state.s3,
        &state.template_bucket,
        &state.insert_template_path,
    )
    .await?;

    // The connection lives for this invocation only and is released when
    // `store` goes out of scope, error paths included.
    let store = VectorStore::connect(
        &state.writer_endpoint,
        &state.database_name,
        &state.credentials,
    )
    .await?;
    pipeline::load_item(&state.bedrock, &store, &insert_template, &request)
        .await?;
    drop(store);

    match transport {
        Transport::Direct => Ok(ProxyResponse::text(ACKNOWLEDGEMENT)),
        Transport::Push {
            connection_id,
            callback_url,
        } => {
            event::push_to_connection(
                &state.aws_config,
                &connection_id,
                &callback_url,
                ACKNOWLEDGEMENT.as_bytes().to_vec(),
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

    let writer_endpoint = required_env("DB_WRITER_ENDPOINT")?;
    let database_name = required_env("DATABASE_NAME")?;
    let template_bucket = required_env("TEMPLATE_BUCKET_NAME")?;
    let insert_template_path = required_env("QUERY_TEMPLATE_OBJECT_PATH")?;

    let aws_config = aws_config::load_defaults(
        aws_config::BehaviorVersion::latest(),
    )
    .await;
    let secrets_manager =
        aws_sdk_secretsmanager::Client::new(&aws_config);
    let credentials =
        database::fetch_credentials(&secrets_manager).await?;

    let state = SharedState {
        bedrock: Bedrock::new(&aws_config),
        s3: aws_sdk_s3::Client::new(&aws_config),
        aws_config,
        writer_endpoint,
        database_name,
        template_bucket,
        insert_template_path,
        credentials,
    };
    let state = &state;

    run(service_fn(move |event: LambdaEvent<ProxyRequest>| {
        async move { function_handler(state, event).await }
    }))
    .await
}
