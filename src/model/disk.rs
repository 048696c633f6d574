use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use displaydoc::Display;
use serde::Deserialize;
use thiserror::Error;

use crate::database::Conn;

use super::schema::disco;

#[derive(Debug, Display, Error)]
pub enum Error {
    /// Failed to find a `{0}` `{1}` disk on host {2}: {3}
    Find(String, String, i32, diesel::result::Error),
    /// Failed to create disk: {0}
    Create(diesel::result::Error),
}

/// A pre-provisioned base disk, attached multi-attach to new machines.
#[derive(Clone, Debug, Queryable)]
pub struct Disk {
    pub id: i32,
    pub name: String,
    pub path: String,
    pub os: String,
    pub distro: String,
    pub arch: i32,
    pub host_id: i32,
}

impl Disk {
    pub async fn find(
        os: &str,
        distro: &str,
        host_id: i32,
        conn: &mut Conn<'_>,
    ) -> Result<Self, Error> {
        disco::table
            .filter(disco::sistema_operativo.eq(os))
            .filter(disco::distribucion_sistema_operativo.eq(distro))
            .filter(disco::host_id.eq(host_id))
            .first(conn)
            .await
            .map_err(|err| Error::Find(os.to_string(), distro.to_string(), host_id, err))
    }

    /// VirtualBox OS type identifier, e.g. `Debian_64`.
    pub fn os_type(&self) -> String {
        format!("{}_{}", self.distro, self.arch)
    }
}

#[derive(Debug, Deserialize, Insertable)]
#[diesel(table_name = disco)]
pub struct NewDisk {
    #[diesel(column_name = nombre)]
    #[serde(rename = "Nombre")]
    pub name: String,
    #[diesel(column_name = ruta_ubicacion)]
    #[serde(rename = "Ruta_ubicacion")]
    pub path: String,
    #[diesel(column_name = sistema_operativo)]
    #[serde(rename = "Sistema_operativo")]
    pub os: String,
    #[diesel(column_name = distribucion_sistema_operativo)]
    #[serde(rename = "Distribucion_sistema_operativo")]
    pub distro: String,
    #[diesel(column_name = arquitectura)]
    #[serde(rename = "Arquitectura")]
    pub arch: i32,
    #[diesel(column_name = host_id)]
    #[serde(rename = "Host_id")]
    pub host_id: i32,
}

impl NewDisk {
    pub async fn create(self, conn: &mut Conn<'_>) -> Result<(), Error> {
        diesel::insert_into(disco::table)
            .values(self)
            .execute(conn)
            .await
            .map_err(Error::Create)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_type_joins_distro_and_arch() {
        let disk = Disk {
            id: 1,
            name: "debian-base".into(),
            path: "/vms/debian.vdi".into(),
            os: "Linux".into(),
            distro: "Debian".into(),
            arch: 64,
            host_id: 1,
        };
        assert_eq!(disk.os_type(), "Debian_64");
    }
}
