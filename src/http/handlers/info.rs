use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::context::Context;
use crate::model::{
    CatalogEntry, Host, HostSummary, MachineInfo, Metrics, NewDisk, NewHost, Role, User,
    VirtualMachine,
};

use super::{decode, Error};

#[derive(Debug, Deserialize)]
pub struct WhoRequest {
    #[serde(rename = "Email", default)]
    email: String,
}

/// Lists the requester's machines; administrators see the whole platform.
pub async fn machines(
    Extension(ctx): Extension<Arc<Context>>,
    payload: Result<Json<WhoRequest>, JsonRejection>,
) -> Result<Json<Vec<MachineInfo>>, Error> {
    let who = decode(payload, "Error al decodificar JSON de inicio de sesión")?;
    let mut conn = ctx.pool.conn().await?;
    let user = User::by_email(&who.email, &mut conn).await?;

    let machines = match user.role() {
        Ok(Role::Administrador) => VirtualMachine::all(&mut conn).await?,
        _ => VirtualMachine::for_user(&user.email, &mut conn).await?,
    };
    Ok(Json(machines))
}

pub async fn hosts(
    Extension(ctx): Extension<Arc<Context>>,
    payload: Result<Json<WhoRequest>, JsonRejection>,
) -> Result<Json<Vec<HostSummary>>, Error> {
    let who = decode(payload, "Error al decodificar JSON de inicio de sesión")?;
    let mut conn = ctx.pool.conn().await?;
    User::by_email(&who.email, &mut conn).await?;

    let hosts = Host::summaries(&mut conn).await?;
    Ok(Json(hosts))
}

pub async fn catalog(
    Extension(ctx): Extension<Arc<Context>>,
) -> Result<Json<Vec<CatalogEntry>>, Error> {
    let mut conn = ctx.pool.conn().await?;
    let entries = CatalogEntry::all(&mut conn).await?;
    Ok(Json(entries))
}

pub async fn metrics(Extension(ctx): Extension<Arc<Context>>) -> Result<Json<Metrics>, Error> {
    let mut conn = ctx.pool.conn().await?;
    let metrics = Metrics::collect(&mut conn).await?;
    Ok(Json(metrics))
}

pub async fn add_host(
    Extension(ctx): Extension<Arc<Context>>,
    payload: Result<Json<NewHost>, JsonRejection>,
) -> Result<Json<Value>, Error> {
    let new_host = decode(payload, "Error al decodificar JSON de especificaciones")?;
    let mut conn = ctx.pool.conn().await?;

    match new_host.create(&mut conn).await {
        Ok(()) => {
            tracing::info!("registro del host exitoso");
            Ok(Json(json!({ "registroCorrecto": true })))
        }
        Err(err) => {
            tracing::error!("error al registrar el host: {err}");
            Ok(Json(json!({ "registroCorrecto": false })))
        }
    }
}

pub async fn add_disk(
    Extension(ctx): Extension<Arc<Context>>,
    payload: Result<Json<NewDisk>, JsonRejection>,
) -> Result<Json<Value>, Error> {
    let new_disk = decode(payload, "Error al decodificar JSON de especificaciones")?;
    let mut conn = ctx.pool.conn().await?;

    match new_disk.create(&mut conn).await {
        Ok(()) => {
            tracing::info!("registro del disco exitoso");
            Ok(Json(json!({ "registroCorrecto": true })))
        }
        Err(err) => {
            tracing::error!("error al registrar el disco: {err}");
            Ok(Json(json!({ "registroCorrecto": false })))
        }
    }
}
