use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::sql_types::Double;
use diesel_async::RunQueryDsl;
use displaydoc::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::database::Conn;

use super::schema::host;

#[derive(Debug, Display, Error)]
pub enum Error {
    /// Failed to find host `{0}`: {1}
    ById(i32, diesel::result::Error),
    /// Failed to find host with ip `{0}`: {1}
    ByIp(String, diesel::result::Error),
    /// Failed to pick a random host: {0}
    Random(diesel::result::Error),
    /// Failed to count hosts: {0}
    Count(diesel::result::Error),
    /// Failed to list hosts: {0}
    List(diesel::result::Error),
    /// Failed to create host: {0}
    Create(diesel::result::Error),
    /// Failed to update reservations of host `{0}`: {1}
    Reserve(i32, diesel::result::Error),
}

#[derive(Clone, Debug, Queryable, Serialize)]
pub struct Host {
    #[serde(rename = "Id")]
    pub id: i32,
    #[serde(rename = "Nombre")]
    pub name: String,
    #[serde(rename = "Mac")]
    pub mac: String,
    #[serde(rename = "Ip")]
    pub ip: String,
    /// Shell login user on the host.
    #[serde(rename = "Hostname")]
    pub username: String,
    #[serde(rename = "Ram_total")]
    pub ram_total: i32,
    #[serde(rename = "Cpu_total")]
    pub cpu_total: i32,
    #[serde(rename = "Almacenamiento_total")]
    pub storage_total: i32,
    #[serde(rename = "Ram_usada")]
    pub ram_used: i32,
    #[serde(rename = "Cpu_usada")]
    pub cpu_used: i32,
    #[serde(rename = "Almacenamiento_usado")]
    pub storage_used: i32,
    #[serde(rename = "Adaptador_red")]
    pub bridge_adapter: String,
    #[serde(rename = "Estado")]
    pub state: String,
    #[serde(rename = "Ruta_llave_ssh_pub")]
    pub public_key_path: String,
    #[serde(rename = "Sistema_operativo")]
    pub os: String,
    #[serde(rename = "Distribucion_sistema_operativo")]
    pub distro: String,
}

impl Host {
    pub async fn by_id(id: i32, conn: &mut Conn<'_>) -> Result<Self, Error> {
        host::table
            .find(id)
            .get_result(conn)
            .await
            .map_err(|err| Error::ById(id, err))
    }

    pub async fn by_ip(ip: &str, conn: &mut Conn<'_>) -> Result<Self, Error> {
        host::table
            .filter(host::ip.eq(ip))
            .first(conn)
            .await
            .map_err(|err| Error::ByIp(ip.to_string(), err))
    }

    /// Draws one registered host uniformly at random.
    pub async fn random(conn: &mut Conn<'_>) -> Result<Self, Error> {
        host::table
            .order(sql::<Double>("RAND()"))
            .first(conn)
            .await
            .map_err(Error::Random)
    }

    pub async fn count(conn: &mut Conn<'_>) -> Result<i64, Error> {
        host::table
            .count()
            .get_result(conn)
            .await
            .map_err(Error::Count)
    }

    pub async fn summaries(conn: &mut Conn<'_>) -> Result<Vec<HostSummary>, Error> {
        host::table
            .select((host::id, host::nombre))
            .get_results(conn)
            .await
            .map_err(Error::List)
    }

    /// Applies a signed delta to the CPU and RAM reservation counters.
    pub async fn adjust_reservation(
        id: i32,
        cpu_delta: i32,
        ram_delta: i32,
        conn: &mut Conn<'_>,
    ) -> Result<(), Error> {
        diesel::update(host::table.find(id))
            .set((
                host::cpu_usada.eq(host::cpu_usada + cpu_delta),
                host::ram_usada.eq(host::ram_usada + ram_delta),
            ))
            .execute(conn)
            .await
            .map_err(|err| Error::Reserve(id, err))?;
        Ok(())
    }
}

#[derive(Clone, Debug, Queryable, Serialize)]
pub struct HostSummary {
    #[serde(rename = "Id")]
    pub id: i32,
    #[serde(rename = "Nombre")]
    pub name: String,
}

#[derive(Debug, Deserialize, Insertable)]
#[diesel(table_name = host)]
pub struct NewHost {
    #[diesel(column_name = nombre)]
    #[serde(rename = "Nombre")]
    pub name: String,
    #[diesel(column_name = mac)]
    #[serde(rename = "Mac", default)]
    pub mac: String,
    #[diesel(column_name = ip)]
    #[serde(rename = "Ip")]
    pub ip: String,
    #[diesel(column_name = hostname)]
    #[serde(rename = "Hostname")]
    pub username: String,
    #[diesel(column_name = ram_total)]
    #[serde(rename = "Ram_total")]
    pub ram_total: i32,
    #[diesel(column_name = cpu_total)]
    #[serde(rename = "Cpu_total")]
    pub cpu_total: i32,
    #[diesel(column_name = almacenamiento_total)]
    #[serde(rename = "Almacenamiento_total")]
    pub storage_total: i32,
    #[diesel(column_name = adaptador_red)]
    #[serde(rename = "Adaptador_red")]
    pub bridge_adapter: String,
    #[diesel(column_name = ruta_llave_ssh_pub)]
    #[serde(rename = "Ruta_llave_ssh_pub", default)]
    pub public_key_path: String,
    #[diesel(column_name = sistema_operativo)]
    #[serde(rename = "Sistema_operativo", default)]
    pub os: String,
    #[diesel(column_name = distribucion_sistema_operativo)]
    #[serde(rename = "Distribucion_sistema_operativo", default)]
    pub distro: String,
}

impl NewHost {
    /// Registers the host. New hosts always start out `Activo` with zeroed
    /// reservation counters, whatever the caller sent.
    pub async fn create(self, conn: &mut Conn<'_>) -> Result<(), Error> {
        diesel::insert_into(host::table)
            .values((self, host::estado.eq("Activo")))
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
    fn host_serializes_with_wire_field_names() {
        let host = Host {
            id: 1,
            name: "H1".into(),
            mac: "aa:bb".into(),
            ip: "10.0.0.2".into(),
            username: "uqcloud".into(),
            ram_total: 8192,
            cpu_total: 8,
            storage_total: 500_000,
            ram_used: 1024,
            cpu_used: 2,
            storage_used: 0,
            bridge_adapter: "eth0".into(),
            state: "Activo".into(),
            public_key_path: "/keys/h1.pub".into(),
            os: "Linux".into(),
            distro: "Debian".into(),
        };
        let json = serde_json::to_value(&host).unwrap();
        assert_eq!(json["Nombre"], "H1");
        assert_eq!(json["Ram_usada"], 1024);
        assert_eq!(json["Adaptador_red"], "eth0");
    }

    #[test]
    fn add_host_payload_decodes() {
        let payload = serde_json::json!({
            "Nombre": "H2",
            "Ip": "10.0.0.3",
            "Hostname": "uqcloud",
            "Ram_total": 16384,
            "Cpu_total": 12,
            "Almacenamiento_total": 1_000_000,
            "Adaptador_red": "enp3s0",
        });
        let new: NewHost = serde_json::from_value(payload).unwrap();
        assert_eq!(new.name, "H2");
        assert_eq!(new.cpu_total, 12);
        assert!(new.mac.is_empty());
    }
}
