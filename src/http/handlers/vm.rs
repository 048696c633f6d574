use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::context::Context;
use crate::dispatch::request::{CreateVm, ManageVm, VmSpec};
use crate::model::{User, VirtualMachine, VmState};

use super::{decode, Error};

pub async fn create(
    Extension(ctx): Extension<Arc<Context>>,
    payload: Result<Json<CreateVm>, JsonRejection>,
) -> Result<Json<Value>, Error> {
    let request = decode(payload, "Error al decodificar JSON de la solicitud")?;
    let job_id = ctx.queues.create_vm(&ctx.jobs, request).await?;

    Ok(Json(json!({
        "mensaje": "Mensaje JSON de crear MV recibido correctamente",
        "solicitud_id": job_id,
    })))
}

pub async fn modify(
    Extension(ctx): Extension<Arc<Context>>,
    payload: Result<Json<ManageVm>, JsonRejection>,
) -> Result<Json<Value>, Error> {
    let request = decode(payload, "Error al decodificar JSON de la solicitud")?;
    if !matches!(request, ManageVm::Modify { .. }) {
        return Err(Error::bad_request("El campo 'tipo_solicitud' debe ser 'modify'"));
    }
    let job_id = ctx.queues.manage_vm(&ctx.jobs, request).await?;

    Ok(Json(json!({
        "mensaje": "Mensaje JSON de especificaciones para modificar MV recibido correctamente",
        "solicitud_id": job_id,
    })))
}

pub async fn delete(
    Extension(ctx): Extension<Arc<Context>>,
    payload: Result<Json<ManageVm>, JsonRejection>,
) -> Result<Json<Value>, Error> {
    let request = decode(payload, "Error al decodificar JSON de especificaciones")?;
    let ManageVm::Delete { ref name } = request else {
        return Err(Error::bad_request("El campo 'tipo_solicitud' debe ser 'delete'"));
    };
    if name.is_empty() {
        return Err(Error::bad_request(
            "El tipo de solicitud y el nombre de la máquina virtual son obligatorios",
        ));
    }
    let job_id = ctx.queues.manage_vm(&ctx.jobs, request).await?;

    Ok(Json(json!({
        "mensaje": "Mensaje JSON para eliminar MV recibido correctamente",
        "solicitud_id": job_id,
    })))
}

pub async fn start(
    Extension(ctx): Extension<Arc<Context>>,
    payload: Result<Json<ManageVm>, JsonRejection>,
) -> Result<Json<Value>, Error> {
    let request = decode(payload, "Error al decodificar JSON de especificaciones")?;
    let ManageVm::Start { ref name, .. } = request else {
        return Err(Error::bad_request("El campo 'tipo_solicitud' debe ser 'start'"));
    };
    if name.is_empty() {
        return Err(Error::bad_request(
            "El tipo de solicitud y nombre de la máquina virtual son obligatorios",
        ));
    }
    let name = name.clone();
    let job_id = ctx.queues.manage_vm(&ctx.jobs, request).await?;

    // The endpoint toggles; the reply reflects what is about to happen.
    let mut conn = ctx.pool.conn().await?;
    let state = VirtualMachine::state_of(&name, &mut conn)
        .await
        .unwrap_or_default();
    let mensaje = if state == VmState::Apagado.to_string() {
        "Encendiendo "
    } else {
        "Apagando "
    };

    Ok(Json(json!({ "mensaje": mensaje, "solicitud_id": job_id })))
}

pub async fn stop(
    Extension(ctx): Extension<Arc<Context>>,
    payload: Result<Json<ManageVm>, JsonRejection>,
) -> Result<Json<Value>, Error> {
    let request = decode(payload, "Error al decodificar JSON de especificaciones")?;
    let ManageVm::Stop { ref name, .. } = request else {
        return Err(Error::bad_request("El campo 'tipo_solicitud' debe ser 'stop'"));
    };
    if name.is_empty() {
        return Err(Error::bad_request(
            "El tipo de solicitud y nombre de la máquina virtual son obligatorios",
        ));
    }
    let job_id = ctx.queues.manage_vm(&ctx.jobs, request).await?;

    Ok(Json(json!({
        "mensaje": "Mensaje JSON para apagar MV recibido correctamente",
        "solicitud_id": job_id,
    })))
}

#[derive(Debug, Deserialize)]
pub struct GuestRequest {
    #[serde(default)]
    ip: String,
    #[serde(rename = "distribucion", default)]
    distro: String,
}

/// Anonymous provisioning: synthesises an Invitado account and queues a
/// minimal machine for it. The new account's email is the reply.
pub async fn create_guest(
    Extension(ctx): Extension<Arc<Context>>,
    payload: Result<Json<GuestRequest>, JsonRejection>,
) -> Result<Json<Value>, Error> {
    let request = decode(payload, "Error al decodificar el JSON ")?;
    let mut conn = ctx.pool.conn().await?;
    let user = User::create_guest(&mut conn).await?;

    let create = CreateVm {
        specifications: VmSpec {
            name: "Guest".to_string(),
            ram: 1024,
            cpu: 2,
            os: "Linux".to_string(),
            distro: request.distro,
            owner_email: user.email.clone(),
        },
        client_ip: request.ip,
    };
    ctx.queues.create_vm(&ctx.jobs, create).await?;

    Ok(Json(json!({ "mensaje": user.email })))
}
