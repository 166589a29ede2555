//! API Gateway proxy event and response model.
//!
//! Both Lambda functions sit behind a REST API and a WebSocket API at the
//! same time. A WebSocket invocation carries a `routeKey` in its request
//! context plus the pieces needed to push data back over the open
//! connection; a REST invocation does not. [`Transport`] captures that
//! distinction once at entry so handlers never re-inspect the raw event.

use aws_sdk_apigatewaymanagement::primitives::Blob;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Serialized request bodies larger than this are rejected before parsing.
pub const MAX_BODY_BYTES: usize = 200_000;

/// Incoming proxy event, reduced to the fields the handlers use.
#[derive(Debug, Deserialize)]
pub struct ProxyRequest {
    /// Raw JSON request body.
    #[serde(default)]
    pub body: String,
    #[serde(rename = "requestContext")]
    pub request_context: Option<RequestContext>,
}

/// Invocation metadata supplied by API Gateway.
#[derive(Debug, Deserialize)]
pub struct RequestContext {
    #[serde(rename = "routeKey")]
    pub route_key: Option<String>,
    #[serde(rename = "domainName")]
    pub domain_name: Option<String>,
    pub stage: Option<String>,
    #[serde(rename = "connectionId")]
    pub connection_id: Option<String>,
}

/// Proxy response returned to API Gateway.
#[derive(Debug, Serialize)]
pub struct ProxyResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl ProxyResponse {
    /// 200 with a JSON body and content type header.
    pub fn json(body: String) -> Self {
        Self {
            status_code: 200,
            headers: Some(serde_json::json!({
                "Content-Type": "application/json",
            })),
            body: Some(body),
        }
    }

    /// 200 with a plain text body.
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            headers: None,
            body: Some(body.into()),
        }
    }

    /// Bare status code, no body. Used after pushing over a WebSocket.
    pub fn status(status_code: u16) -> Self {
        Self {
            status_code,
            headers: None,
            body: None,
        }
    }

    /// 400 with an explanatory body.
    pub fn bad_request(body: impl Into<String>) -> Self {
        Self {
            status_code: 400,
            headers: None,
            body: Some(body.into()),
        }
    }
}

/// How the result of an invocation reaches the caller.
#[derive(Debug, PartialEq, Eq)]
pub enum Transport {
    /// Result goes back in the proxy response body.
    Direct,
    /// Result is pushed over an open WebSocket connection; the proxy
    /// response is a bare 200.
    Push {
        connection_id: String,
        callback_url: String,
    },
}

impl Transport {
    /// Resolves the transport from the invocation metadata.
    ///
    /// A request context with a `routeKey` marks a WebSocket invocation,
    /// which always carries a domain, a stage, and a connection id; one
    /// missing any of them is rejected rather than answered over a proxy
    /// response no client reads.
    pub fn resolve(request_context: Option<&RequestContext>) -> Result<Self> {
        let Some(context) = request_context else {
            return Ok(Transport::Direct);
        };
        if context.route_key.is_none() {
            return Ok(Transport::Direct);
        }
        match (
            context.domain_name.as_deref(),
            context.stage.as_deref(),
            context.connection_id.as_deref(),
        ) {
            (Some(domain), Some(stage), Some(connection_id)) => {
                Ok(Transport::Push {
                    connection_id: connection_id.to_string(),
                    callback_url: format!("https://{domain}/{stage}"),
                })
            }
            _ => Err(Error::Validation(
                "WebSocket request context is missing its callback fields"
                    .to_string(),
            )),
        }
    }
}

/// Pushes `data` over the WebSocket connection the invocation arrived on.
///
/// The management client must target the per-API callback URL, so it is
/// built here per invocation instead of at cold-start.
pub async fn push_to_connection(
    shared_config: &aws_config::SdkConfig,
    connection_id: &str,
    callback_url: &str,
    data: Vec<u8>,
) -> Result<()> {
    let config =
        aws_sdk_apigatewaymanagement::config::Builder::from(shared_config)
            .endpoint_url(callback_url)
            .build();
    let client = aws_sdk_apigatewaymanagement::Client::from_conf(config);
    client
        .post_to_connection()
        .connection_id(connection_id)
        .data(Blob::new(data))
        .send()
        .await
        .map_err(|e| {
            Error::upstream(format!(
                "cannot push to connection {connection_id}: {e}",
            ))
        })?;
    Ok(())
}
