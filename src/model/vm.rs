use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use displaydoc::Display;
use serde::Serialize;
use thiserror::Error;

use crate::database::Conn;

use super::schema::{disco, maquina_virtual, persona};
use super::user::Role;

#[derive(Debug, Display, Error)]
pub enum Error {
    /// Failed to find machine `{0}`: {1}
    ByName(String, diesel::result::Error),
    /// Failed to check whether machine `{0}` exists: {1}
    Exists(String, diesel::result::Error),
    /// Failed to create machine: {0}
    Create(diesel::result::Error),
    /// Failed to update machine `{0}`: {1}
    Update(String, diesel::result::Error),
    /// Failed to delete machine `{0}`: {1}
    Delete(String, diesel::result::Error),
    /// Failed to list machines: {0}
    List(diesel::result::Error),
    /// Failed to count machines of `{0}`: {1}
    CountForUser(String, diesel::result::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum VmState {
    Apagado,
    Procesando,
    Encendido,
}

#[derive(Clone, Debug, Queryable, Serialize)]
pub struct VirtualMachine {
    #[serde(rename = "Uuid")]
    pub uuid: String,
    #[serde(rename = "Nombre")]
    pub name: String,
    #[serde(rename = "Ram")]
    pub ram: i32,
    #[serde(rename = "Cpu")]
    pub cpu: i32,
    #[serde(rename = "Ip")]
    pub ip: String,
    #[serde(rename = "Estado")]
    pub state: String,
    /// Login user inside the guest OS.
    #[serde(rename = "Hostname")]
    pub login_user: String,
    #[serde(rename = "Persona_email")]
    pub owner_email: String,
    #[serde(rename = "Host_id")]
    pub host_id: i32,
    #[serde(rename = "Disco_id")]
    pub disk_id: i32,
    #[serde(rename = "Fecha_creacion")]
    pub created_at: NaiveDateTime,
}

/// The per-user machine listing, joined with the backing disk for OS info.
#[derive(Clone, Debug, Queryable, Serialize)]
pub struct MachineInfo {
    #[serde(rename = "Nombre")]
    pub name: String,
    #[serde(rename = "Ram")]
    pub ram: i32,
    #[serde(rename = "Cpu")]
    pub cpu: i32,
    #[serde(rename = "Ip")]
    pub ip: String,
    #[serde(rename = "Estado")]
    pub state: String,
    #[serde(rename = "Sistema_operativo")]
    pub os: String,
    #[serde(rename = "Distribucion_sistema_operativo")]
    pub distro: String,
    #[serde(rename = "Hostname")]
    pub login_user: String,
}

impl VirtualMachine {
    pub async fn by_name(name: &str, conn: &mut Conn<'_>) -> Result<Self, Error> {
        maquina_virtual::table
            .find(name)
            .get_result(conn)
            .await
            .map_err(|err| Error::ByName(name.to_string(), err))
    }

    pub async fn exists(name: &str, conn: &mut Conn<'_>) -> Result<bool, Error> {
        diesel::select(diesel::dsl::exists(maquina_virtual::table.find(name)))
            .get_result(conn)
            .await
            .map_err(|err| Error::Exists(name.to_string(), err))
    }

    pub async fn state_of(name: &str, conn: &mut Conn<'_>) -> Result<String, Error> {
        maquina_virtual::table
            .find(name)
            .select(maquina_virtual::estado)
            .get_result(conn)
            .await
            .map_err(|err| Error::ByName(name.to_string(), err))
    }

    pub async fn set_state(name: &str, state: VmState, conn: &mut Conn<'_>) -> Result<(), Error> {
        diesel::update(maquina_virtual::table.find(name))
            .set(maquina_virtual::estado.eq(state.to_string()))
            .execute(conn)
            .await
            .map_err(|err| Error::Update(name.to_string(), err))?;
        Ok(())
    }

    /// A machine is `Encendido` exactly while it has an address.
    pub async fn set_running(name: &str, ip: &str, conn: &mut Conn<'_>) -> Result<(), Error> {
        diesel::update(maquina_virtual::table.find(name))
            .set((
                maquina_virtual::estado.eq(VmState::Encendido.to_string()),
                maquina_virtual::ip.eq(ip),
            ))
            .execute(conn)
            .await
            .map_err(|err| Error::Update(name.to_string(), err))?;
        Ok(())
    }

    pub async fn set_stopped(name: &str, conn: &mut Conn<'_>) -> Result<(), Error> {
        diesel::update(maquina_virtual::table.find(name))
            .set((
                maquina_virtual::estado.eq(VmState::Apagado.to_string()),
                maquina_virtual::ip.eq(""),
            ))
            .execute(conn)
            .await
            .map_err(|err| Error::Update(name.to_string(), err))?;
        Ok(())
    }

    pub async fn set_cpu(name: &str, cpu: i32, conn: &mut Conn<'_>) -> Result<(), Error> {
        diesel::update(maquina_virtual::table.find(name))
            .set(maquina_virtual::cpu.eq(cpu))
            .execute(conn)
            .await
            .map_err(|err| Error::Update(name.to_string(), err))?;
        Ok(())
    }

    pub async fn set_ram(name: &str, ram: i32, conn: &mut Conn<'_>) -> Result<(), Error> {
        diesel::update(maquina_virtual::table.find(name))
            .set(maquina_virtual::ram.eq(ram))
            .execute(conn)
            .await
            .map_err(|err| Error::Update(name.to_string(), err))?;
        Ok(())
    }

    pub async fn delete(name: &str, conn: &mut Conn<'_>) -> Result<(), Error> {
        diesel::delete(maquina_virtual::table.find(name))
            .execute(conn)
            .await
            .map_err(|err| Error::Delete(name.to_string(), err))?;
        Ok(())
    }

    pub async fn for_user(email: &str, conn: &mut Conn<'_>) -> Result<Vec<MachineInfo>, Error> {
        maquina_virtual::table
            .inner_join(disco::table)
            .filter(maquina_virtual::persona_email.eq(email))
            .select(Self::info_columns())
            .get_results(conn)
            .await
            .map_err(Error::List)
    }

    /// The platform-wide listing shown to administrators.
    pub async fn all(conn: &mut Conn<'_>) -> Result<Vec<MachineInfo>, Error> {
        maquina_virtual::table
            .inner_join(disco::table)
            .select(Self::info_columns())
            .get_results(conn)
            .await
            .map_err(Error::List)
    }

    /// All machines owned by Invitado accounts, for the reaper.
    pub async fn guest_machines(conn: &mut Conn<'_>) -> Result<Vec<Self>, Error> {
        maquina_virtual::table
            .inner_join(persona::table)
            .filter(persona::rol.eq(Role::Invitado.to_string()))
            .select(maquina_virtual::all_columns)
            .get_results(conn)
            .await
            .map_err(Error::List)
    }

    pub async fn count_for_user(email: &str, conn: &mut Conn<'_>) -> Result<i64, Error> {
        maquina_virtual::table
            .filter(maquina_virtual::persona_email.eq(email))
            .count()
            .get_result(conn)
            .await
            .map_err(|err| Error::CountForUser(email.to_string(), err))
    }

    #[allow(clippy::type_complexity)]
    fn info_columns() -> (
        maquina_virtual::nombre,
        maquina_virtual::ram,
        maquina_virtual::cpu,
        maquina_virtual::ip,
        maquina_virtual::estado,
        disco::sistema_operativo,
        disco::distribucion_sistema_operativo,
        maquina_virtual::hostname,
    ) {
        (
            maquina_virtual::nombre,
            maquina_virtual::ram,
            maquina_virtual::cpu,
            maquina_virtual::ip,
            maquina_virtual::estado,
            disco::sistema_operativo,
            disco::distribucion_sistema_operativo,
            maquina_virtual::hostname,
        )
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = maquina_virtual)]
pub struct NewVm<'a> {
    #[diesel(column_name = uuid)]
    pub uuid: &'a str,
    #[diesel(column_name = nombre)]
    pub name: &'a str,
    #[diesel(column_name = ram)]
    pub ram: i32,
    #[diesel(column_name = cpu)]
    pub cpu: i32,
    #[diesel(column_name = ip)]
    pub ip: &'a str,
    #[diesel(column_name = estado)]
    pub state: String,
    #[diesel(column_name = hostname)]
    pub login_user: &'a str,
    #[diesel(column_name = persona_email)]
    pub owner_email: &'a str,
    #[diesel(column_name = host_id)]
    pub host_id: i32,
    #[diesel(column_name = disco_id)]
    pub disk_id: i32,
    #[diesel(column_name = fecha_creacion)]
    pub created_at: NaiveDateTime,
}

impl NewVm<'_> {
    pub async fn create(self, conn: &mut Conn<'_>) -> Result<(), Error> {
        diesel::insert_into(maquina_virtual::table)
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
    fn state_round_trips_through_db_text() {
        for state in [VmState::Apagado, VmState::Procesando, VmState::Encendido] {
            assert_eq!(state.to_string().parse::<VmState>().unwrap(), state);
        }
        assert!("Suspendido".parse::<VmState>().is_err());
    }

    #[test]
    fn machine_info_serializes_with_wire_field_names() {
        let info = MachineInfo {
            name: "VM_ab12".into(),
            ram: 1024,
            cpu: 2,
            ip: "192.168.0.30".into(),
            state: VmState::Encendido.to_string(),
            os: "Linux".into(),
            distro: "Debian".into(),
            login_user: "uqcloud".into(),
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["Nombre"], "VM_ab12");
        assert_eq!(json["Distribucion_sistema_operativo"], "Debian");
        assert_eq!(json["Hostname"], "uqcloud");
    }
}
