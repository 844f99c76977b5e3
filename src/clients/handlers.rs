use super::model::{ClientChanges, ClientRecord, ClientWithSecret, Supplemental, scopes};
use super::store::SharedClientStore;
use crate::auth::{Claims, DenialReason, authorize};
use crate::errors::ApiError;
use axum::{
    Extension,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use uuid::Uuid;

#[derive(Clone)]
pub struct ClientsState {
    pub store: SharedClientStore,
}

#[derive(Debug, Deserialize)]
pub struct CreateClientRequest {
    pub name: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub supplemental: Supplemental,
}

// bodies are parsed after the scope check, so a denied caller never learns
// anything about what a valid payload looks like
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

// anything that isn't a UUID can't name a client
fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::ClientNotFound)
}

// a caller can't hand out management scopes it doesn't hold itself
fn check_grantable(claims: &Claims, requested: &[String]) -> Result<(), ApiError> {
    match requested
        .iter()
        .find(|s| scopes::is_management(s) && !claims.has_scope(s))
    {
        Some(scope) => {
            tracing::warn!("Client {} tried to grant scope {} it does not hold", claims.sub, scope);
            Err(DenialReason::InsufficientPrivileges.into())
        }
        None => Ok(()),
    }
}

fn client_body(client: impl serde::Serialize) -> Json<serde_json::Value> {
    Json(json!({ "data": { "client": client } }))
}

/// POST /api/client
pub async fn create_client_handler(
    State(state): State<ClientsState>,
    Extension(claims): Extension<Claims>,
    body: Bytes,
) -> Result<Response, ApiError> {
    authorize(&claims, scopes::CLIENT_CREATE).into_result()?;
    let req: CreateClientRequest = parse_body(&body)?;
    check_grantable(&claims, &req.scopes)?;

    let record = ClientRecord::generate(req.name, req.scopes, req.supplemental)?;
    state.store.insert(record.clone()).await?;

    tracing::info!(
        "Client {} created client {} ({})",
        claims.sub,
        record.id,
        record.name
    );

    let created = ClientWithSecret {
        client: record.view(),
        secret: record.secret,
    };
    Ok((StatusCode::CREATED, client_body(created)).into_response())
}

/// GET /api/client/{id}
pub async fn fetch_client_handler(
    State(state): State<ClientsState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    authorize(&claims, scopes::CLIENT_FETCH).into_result()?;
    let id = parse_id(&id)?;

    let record = state
        .store
        .find_by_id(id)
        .await?
        .ok_or(ApiError::ClientNotFound)?;

    Ok((StatusCode::OK, client_body(record.view())).into_response())
}

/// PUT /api/client/{id}
pub async fn update_client_handler(
    State(state): State<ClientsState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    authorize(&claims, scopes::CLIENT_UPDATE).into_result()?;
    let id = parse_id(&id)?;
    let changes: ClientChanges = parse_body(&body)?;
    if let Some(requested) = &changes.scopes {
        check_grantable(&claims, requested)?;
    }
    let rotated = changes.rotate_secret;

    let mut record = state
        .store
        .find_by_id(id)
        .await?
        .ok_or(ApiError::ClientNotFound)?;
    record.apply(changes)?;

    if !state.store.update(record.clone()).await? {
        // deleted between the read and the write
        return Err(ApiError::ClientNotFound);
    }

    tracing::info!("Client {} updated client {}", claims.sub, record.id);

    if rotated {
        tracing::info!("Secret rotated for client {}", record.id);
        let updated = ClientWithSecret {
            client: record.view(),
            secret: record.secret,
        };
        return Ok((StatusCode::OK, client_body(updated)).into_response());
    }
    Ok((StatusCode::OK, client_body(record.view())).into_response())
}

/// DELETE /api/client/{id}
pub async fn delete_client_handler(
    State(state): State<ClientsState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    authorize(&claims, scopes::CLIENT_DELETE).into_result()?;
    let id = parse_id(&id)?;

    if !state.store.delete(id).await? {
        return Err(ApiError::ClientNotFound);
    }

    tracing::info!("Client {} deleted client {}", claims.sub, id);
    Ok((StatusCode::OK, Json(json!({ "data": { "deleted": id } }))).into_response())
}
