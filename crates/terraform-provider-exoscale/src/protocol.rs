//! Wire format between the engine and the provider process

use exoscale_provider::{Attributes, ErrorKind, Provider, ProviderError, ResourceState};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Validate {
        resource_type: String,
        #[serde(default)]
        attributes: Attributes,
    },
    Plan {
        resource_type: String,
        #[serde(default)]
        prior: Option<ResourceState>,
        #[serde(default)]
        attributes: Attributes,
    },
    Create {
        resource_type: String,
        #[serde(default)]
        attributes: Attributes,
    },
    Read {
        state: ResourceState,
    },
    Update {
        state: ResourceState,
        #[serde(default)]
        attributes: Attributes,
    },
    Delete {
        state: ResourceState,
    },
    Exists {
        state: ResourceState,
    },
    Import {
        resource_type: String,
        id: String,
    },
    UpgradeState {
        state: ResourceState,
    },
    ReadDataSource {
        data_source_type: String,
        #[serde(default)]
        attributes: Attributes,
    },
}

#[derive(Debug, PartialEq, Serialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Success { ok: bool, result: Value },
    Failure { ok: bool, error: ErrorBody },
}

impl Response {
    fn ok(result: impl Serialize) -> Self {
        match serde_json::to_value(result) {
            Ok(result) => Response::Success { ok: true, result },
            Err(e) => Self::error(&ProviderError::Json(e)),
        }
    }

    fn error(e: &ProviderError) -> Self {
        Response::Failure {
            ok: false,
            error: ErrorBody {
                kind: e.kind(),
                message: e.to_string(),
            },
        }
    }
}

impl From<exoscale_provider::Result<Value>> for Response {
    fn from(result: exoscale_provider::Result<Value>) -> Self {
        match result {
            Ok(value) => Response::ok(value),
            Err(e) => {
                tracing::warn!("request failed: {}", e);
                Response::error(&e)
            }
        }
    }
}

fn to_value(value: impl Serialize) -> exoscale_provider::Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Decode one request line, run it and build the response
pub async fn handle(provider: &Provider, line: &str) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => return Response::error(&ProviderError::Json(e)),
    };
    tracing::debug!("request: {:?}", request);
    dispatch(provider, request).await.into()
}

async fn dispatch(provider: &Provider, request: Request) -> exoscale_provider::Result<Value> {
    match request {
        Request::Validate {
            resource_type,
            attributes,
        } => {
            provider.validate(&resource_type, &attributes)?;
            Ok(Value::Null)
        }
        Request::Plan {
            resource_type,
            prior,
            attributes,
        } => to_value(provider.plan(&resource_type, prior.as_ref(), &attributes)?),
        Request::Create {
            resource_type,
            attributes,
        } => to_value(provider.create(&resource_type, attributes).await?),
        Request::Read { state } => to_value(provider.read(&state).await?),
        Request::Update { state, attributes } => to_value(provider.update(&state, attributes).await?),
        Request::Delete { state } => {
            provider.delete(&state).await?;
            Ok(Value::Null)
        }
        Request::Exists { state } => to_value(provider.exists(&state).await?),
        Request::Import { resource_type, id } => to_value(provider.import(&resource_type, &id).await?),
        Request::UpgradeState { state } => to_value(provider.upgrade_state(state)?),
        Request::ReadDataSource {
            data_source_type,
            attributes,
        } => to_value(
            provider
                .read_data_source(&data_source_type, attributes)
                .await?,
        ),
    }
}
