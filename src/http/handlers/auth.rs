use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::context::Context;
use crate::model::{NewUser, Role, User};

use super::{decode, Error};

#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(rename = "Email", default)]
    email: String,
    #[serde(rename = "Contrasenia", default)]
    password: String,
}

pub async fn login(
    Extension(ctx): Extension<Arc<Context>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), Error> {
    let creds = decode(payload, "Error al decodificar JSON de inicio de sesión")?;
    let mut conn = ctx.pool.conn().await?;

    let user = match User::by_email(&creds.email, &mut conn).await {
        Ok(user) => user,
        Err(err) if err.is_not_found() => return Ok(rejected()),
        Err(err) => return Err(err.into()),
    };
    if !user.verify_password(&creds.password) {
        tracing::debug!("contraseña incorrecta para {}", creds.email);
        return Ok(rejected());
    }

    Ok((
        StatusCode::OK,
        Json(json!({ "loginCorrecto": true, "usuario": user })),
    ))
}

fn rejected() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "loginCorrecto": false, "usuario": null })),
    )
}

#[derive(Debug, Deserialize)]
pub struct Signup {
    #[serde(rename = "Nombre", default)]
    name: String,
    #[serde(rename = "Apellido", default)]
    surname: String,
    #[serde(rename = "Email")]
    email: String,
    #[serde(rename = "Contrasenia")]
    password: String,
}

/// Self-service registration. Everyone who signs up is an Estudiante.
pub async fn signup(
    Extension(ctx): Extension<Arc<Context>>,
    payload: Result<Json<Signup>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), Error> {
    let request = decode(payload, "Error al decodificar JSON de inicio de sesión")?;
    let mut conn = ctx.pool.conn().await?;

    let new_user = NewUser::new(
        &request.name,
        &request.surname,
        &request.email,
        &request.password,
        Role::Estudiante,
    )?;
    match new_user.create(&mut conn).await {
        Ok(user) => {
            tracing::info!("registro correcto: {}", user.email);
            Ok((StatusCode::OK, Json(json!({ "loginCorrecto": true }))))
        }
        Err(err) => {
            tracing::warn!("no se pudo registrar {}: {err}", request.email);
            Ok((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "loginCorrecto": false })),
            ))
        }
    }
}
