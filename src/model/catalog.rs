use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use displaydoc::Display;
use serde::Serialize;
use thiserror::Error;

use crate::database::Conn;

use super::schema::{catalogo, catalogo_disco, disco};

#[derive(Debug, Display, Error)]
pub enum Error {
    /// Failed to list the catalog: {0}
    List(diesel::result::Error),
}

/// A catalog offering: a named machine size joined with the OS of one of the
/// disks that can back it.
#[derive(Clone, Debug, Queryable, Serialize)]
pub struct CatalogEntry {
    #[serde(rename = "Id")]
    pub id: i32,
    #[serde(rename = "Nombre")]
    pub name: String,
    #[serde(rename = "Ram")]
    pub ram: i32,
    #[serde(rename = "Cpu")]
    pub cpu: i32,
    #[serde(rename = "Sistema_operativo")]
    pub os: String,
    #[serde(rename = "Distribucion_sistema_operativo")]
    pub distro: String,
    #[serde(rename = "Arquitectura")]
    pub arch: i32,
}

impl CatalogEntry {
    pub async fn all(conn: &mut Conn<'_>) -> Result<Vec<Self>, Error> {
        catalogo_disco::table
            .inner_join(catalogo::table)
            .inner_join(disco::table)
            .select((
                catalogo::id,
                catalogo::nombre,
                catalogo::ram,
                catalogo::cpu,
                disco::sistema_operativo,
                disco::distribucion_sistema_operativo,
                disco::arquitectura,
            ))
            .get_results(conn)
            .await
            .map_err(Error::List)
    }
}
