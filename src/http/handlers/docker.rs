use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::context::Context;
use crate::dispatch::request::{ManageContainer, ManageImage};
use crate::docker::{self, Container, Image};

use super::{decode, Error};

const DECODE_MESSAGE: &str = "Error al decodificar JSON";

#[derive(Debug, Deserialize)]
pub struct HubRequest {
    #[serde(rename = "imagen")]
    image: String,
    #[serde(rename = "version")]
    tag: String,
    ip: String,
    hostname: String,
}

pub async fn image_from_hub(
    Extension(ctx): Extension<Arc<Context>>,
    payload: Result<Json<HubRequest>, JsonRejection>,
) -> Result<Json<Value>, Error> {
    let request = decode(payload, DECODE_MESSAGE)?;
    let mensaje = docker::pull_image(
        ctx.executor.as_ref(),
        &request.image,
        &request.tag,
        &request.ip,
        &request.hostname,
    )
    .await?;
    Ok(Json(json!({ "mensaje": mensaje })))
}

#[derive(Debug, Deserialize)]
pub struct TarRequest {
    #[serde(rename = "archivo")]
    archive: String,
    ip: String,
    hostname: String,
}

pub async fn image_from_tar(
    Extension(ctx): Extension<Arc<Context>>,
    payload: Result<Json<TarRequest>, JsonRejection>,
) -> Result<Json<Value>, Error> {
    let request = decode(payload, DECODE_MESSAGE)?;
    let mensaje = docker::load_image(
        ctx.executor.as_ref(),
        &request.archive,
        &request.ip,
        &request.hostname,
    )
    .await?;
    Ok(Json(json!({ "mensaje": mensaje })))
}

#[derive(Debug, Deserialize)]
pub struct DockerfileRequest {
    #[serde(rename = "archivo")]
    archive: String,
    #[serde(rename = "nombreImagen")]
    image: String,
    ip: String,
    hostname: String,
}

pub async fn image_from_dockerfile(
    Extension(ctx): Extension<Arc<Context>>,
    payload: Result<Json<DockerfileRequest>, JsonRejection>,
) -> Result<Json<Value>, Error> {
    let request = decode(payload, DECODE_MESSAGE)?;
    let mensaje = docker::build_image(
        ctx.executor.as_ref(),
        &request.archive,
        &request.image,
        &request.ip,
        &request.hostname,
    )
    .await?;
    Ok(Json(json!({ "mensaje": mensaje })))
}

pub async fn remove_image(
    Extension(ctx): Extension<Arc<Context>>,
    payload: Result<Json<ManageImage>, JsonRejection>,
) -> Result<Json<Value>, Error> {
    let request = decode(payload, DECODE_MESSAGE)?;
    let job_id = ctx.queues.manage_image(&ctx.jobs, request).await?;
    Ok(Json(json!({ "mensaje": "Se elimino la Imagen", "solicitud_id": job_id })))
}

#[derive(Debug, Deserialize)]
pub struct HostTarget {
    ip: String,
    hostname: String,
}

pub async fn images(
    Extension(ctx): Extension<Arc<Context>>,
    payload: Result<Json<HostTarget>, JsonRejection>,
) -> Result<Json<Vec<Image>>, Error> {
    let target = decode(payload, DECODE_MESSAGE)?;
    let images = docker::list_images(ctx.executor.as_ref(), &target.ip, &target.hostname).await?;
    Ok(Json(images))
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    #[serde(rename = "imagen")]
    image: String,
    #[serde(rename = "comando")]
    command: String,
    ip: String,
    hostname: String,
}

pub async fn create_container(
    Extension(ctx): Extension<Arc<Context>>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> Result<Json<Value>, Error> {
    let request = decode(payload, DECODE_MESSAGE)?;
    let mensaje = docker::create_container(
        ctx.executor.as_ref(),
        &request.image,
        &request.command,
        &request.ip,
        &request.hostname,
    )
    .await?;
    Ok(Json(json!({ "mensaje": mensaje })))
}

pub async fn manage_container(
    Extension(ctx): Extension<Arc<Context>>,
    payload: Result<Json<ManageContainer>, JsonRejection>,
) -> Result<Json<Value>, Error> {
    let request = decode(payload, DECODE_MESSAGE)?;
    let job_id = ctx.queues.manage_container(&ctx.jobs, request).await?;
    Ok(Json(json!({ "mensaje": "Comando Exitoso", "solicitud_id": job_id })))
}

pub async fn containers(
    Extension(ctx): Extension<Arc<Context>>,
    payload: Result<Json<HostTarget>, JsonRejection>,
) -> Result<Json<Vec<Container>>, Error> {
    let target = decode(payload, DECODE_MESSAGE)?;
    let containers = docker::list_containers(ctx.executor.as_ref(), &target.ip, &target.hostname).await?;
    Ok(Json(containers))
}
