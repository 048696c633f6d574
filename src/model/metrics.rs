use diesel::dsl::sum;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use displaydoc::Display;
use serde::Serialize;
use thiserror::Error;

use crate::database::Conn;

use super::schema::{host, maquina_virtual, persona};
use super::user::Role;
use super::vm::VmState;

#[derive(Debug, Display, Error)]
pub enum Error {
    /// Failed to collect platform metrics: {0}
    Collect(diesel::result::Error),
}

/// Platform-wide aggregates. RAM figures are reported in GiB, the catalogue
/// stores MiB.
#[derive(Clone, Debug, Serialize)]
pub struct Metrics {
    pub total_maquinas_creadas: i64,
    pub total_maquinas_encendidas: i64,
    pub total_usuarios: i64,
    pub total_estudiantes: i64,
    pub total_invitados: i64,
    #[serde(rename = "total_RAM")]
    pub total_ram: i64,
    #[serde(rename = "total_RAM_usada")]
    pub total_ram_used: i64,
    #[serde(rename = "total_CPU")]
    pub total_cpu: i64,
    #[serde(rename = "total_CPU_usada")]
    pub total_cpu_used: i64,
}

impl Metrics {
    pub async fn collect(conn: &mut Conn<'_>) -> Result<Self, Error> {
        let total_maquinas_creadas = maquina_virtual::table
            .count()
            .get_result(conn)
            .await
            .map_err(Error::Collect)?;
        let total_maquinas_encendidas = maquina_virtual::table
            .filter(maquina_virtual::estado.eq(VmState::Encendido.to_string()))
            .count()
            .get_result(conn)
            .await
            .map_err(Error::Collect)?;
        let total_usuarios = persona::table
            .count()
            .get_result(conn)
            .await
            .map_err(Error::Collect)?;
        let total_estudiantes = persona::table
            .filter(persona::rol.eq(Role::Estudiante.to_string()))
            .count()
            .get_result(conn)
            .await
            .map_err(Error::Collect)?;
        let total_invitados = persona::table
            .filter(persona::rol.eq(Role::Invitado.to_string()))
            .count()
            .get_result(conn)
            .await
            .map_err(Error::Collect)?;
        let total_ram: Option<i64> = host::table
            .select(sum(host::ram_total))
            .get_result(conn)
            .await
            .map_err(Error::Collect)?;
        let total_cpu: Option<i64> = host::table
            .select(sum(host::cpu_total))
            .get_result(conn)
            .await
            .map_err(Error::Collect)?;
        let total_ram_used: Option<i64> = maquina_virtual::table
            .select(sum(maquina_virtual::ram))
            .get_result(conn)
            .await
            .map_err(Error::Collect)?;
        let total_cpu_used: Option<i64> = maquina_virtual::table
            .select(sum(maquina_virtual::cpu))
            .get_result(conn)
            .await
            .map_err(Error::Collect)?;

        Ok(Metrics {
            total_maquinas_creadas,
            total_maquinas_encendidas,
            total_usuarios,
            total_estudiantes,
            total_invitados,
            total_ram: total_ram.unwrap_or(0) / 1024,
            total_ram_used: total_ram_used.unwrap_or(0) / 1024,
            total_cpu: total_cpu.unwrap_or(0),
            total_cpu_used: total_cpu_used.unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_serialize_with_wire_field_names() {
        let metrics = Metrics {
            total_maquinas_creadas: 3,
            total_maquinas_encendidas: 1,
            total_usuarios: 4,
            total_estudiantes: 2,
            total_invitados: 1,
            total_ram: 16,
            total_ram_used: 2,
            total_cpu: 24,
            total_cpu_used: 6,
        };
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["total_maquinas_creadas"], 3);
        assert_eq!(json["total_RAM"], 16);
        assert_eq!(json["total_CPU_usada"], 6);
    }
}
