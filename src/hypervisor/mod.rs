//! Drives machine lifecycle transitions on the hypervisor hosts.

pub mod vbox;

use std::time::Duration;

use displaydoc::Display;
use rand::distributions::{Alphanumeric, DistString};
use thiserror::Error;
use tokio::time::{sleep, Instant};

use crate::context::Context;
use crate::database::{self, Conn};
use crate::dispatch::request::VmSpec;
use crate::model::{Disk, Host, NewVm, User, VirtualMachine, VmState};
use crate::{remote, scheduler};

use self::vbox::PowerState;

/// Login user configured inside every guest image.
const GUEST_LOGIN_USER: &str = "uqcloud";

const IP_POLL_INTERVAL: Duration = Duration::from_secs(5);
const IP_WAIT_BUDGET: Duration = Duration::from_secs(2 * 60);
const POWEROFF_POLL_INTERVAL: Duration = Duration::from_secs(1);
const POWEROFF_BUDGET: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Display, Error)]
pub enum Error {
    /// Nombre de la MV no disponible
    NameTaken,
    /// La salida de createvm no contiene el UUID de la màquina
    MissingUuid,
    /// Para modificar la màquina primero debe apagarla
    ModifyWhileRunning,
    /// Debe apagar la màquina para eliminarla
    DeleteWhileRunning,
    /// No se logrò obtener la direcciòn IP, por favor contacte al administrador
    Unreachable,
    /// {0}
    Database(#[from] database::Error),
    /// {0}
    Placement(#[from] scheduler::Error),
    /// Error al ejecutar el comando remoto: {0}
    Remote(#[from] remote::Error),
    /// {0}
    User(#[from] crate::model::user::Error),
    /// {0}
    Host(#[from] crate::model::host::Error),
    /// {0}
    Disk(#[from] crate::model::disk::Error),
    /// {0}
    Vm(#[from] crate::model::vm::Error),
}

/// Creates a machine and immediately powers it on.
///
/// The hypervisor command sequence runs before any catalogue row is written,
/// so a mid-sequence failure leaves no row and no reservation behind.
pub async fn create(ctx: &Context, spec: VmSpec, client_ip: &str) -> Result<String, Error> {
    let mut conn = ctx.pool.conn().await?;
    let user = User::by_email(&spec.owner_email, &mut conn).await?;
    tracing::info!(
        "solicitud de {} ({}): crear {} con {} MB / {} cpus",
        user.email,
        user.role,
        spec.name,
        spec.ram,
        spec.cpu
    );

    let name = format!("{}_{}", spec.name, name_suffix());
    let _guard = ctx.locks.acquire(&name).await;
    if VirtualMachine::exists(&name, &mut conn).await? {
        return Err(Error::NameTaken);
    }

    let host = scheduler::place(spec.cpu, spec.ram, client_ip, &mut conn).await?;
    let disk = Disk::find(&spec.os, &spec.distro, host.id, &mut conn).await?;

    let created = run(ctx, &host, &vbox::create_vm(&name, &disk.os_type())).await?;
    run(ctx, &host, &vbox::set_memory(&name, spec.ram)).await?;
    run(ctx, &host, &vbox::add_storage_controller(&name)).await?;
    run(ctx, &host, &vbox::attach_disk(&name, &disk.path)).await?;
    run(ctx, &host, &vbox::set_cpus(&name, spec.cpu)).await?;
    run(ctx, &host, &vbox::set_bridged_nic(&name, &host.bridge_adapter)).await?;

    let uuid = vbox::parse_uuid(&created).ok_or(Error::MissingUuid)?;
    NewVm {
        uuid: &uuid,
        name: &name,
        ram: spec.ram,
        cpu: spec.cpu,
        ip: "",
        state: VmState::Apagado.to_string(),
        login_user: GUEST_LOGIN_USER,
        owner_email: &spec.owner_email,
        host_id: host.id,
        disk_id: disk.id,
        created_at: chrono::Utc::now().naive_utc(),
    }
    .create(&mut conn)
    .await?;
    Host::adjust_reservation(host.id, spec.cpu, spec.ram, &mut conn).await?;

    tracing::info!("màquina virtual {name} creada con èxito");
    start_locked(ctx, &mut conn, &name, client_ip).await?;
    Ok("Màquina virtual creada con èxito".to_string())
}

/// Powers a machine on, or off when it is already running (the public
/// endpoint is a toggle).
pub async fn start(ctx: &Context, name: &str, client_ip: &str) -> Result<String, Error> {
    let _guard = ctx.locks.acquire(name).await;
    let mut conn = ctx.pool.conn().await?;
    start_locked(ctx, &mut conn, name, client_ip).await
}

/// Powers a machine off, or on when it is already stopped (toggle).
pub async fn stop(ctx: &Context, name: &str, client_ip: &str) -> Result<String, Error> {
    let _guard = ctx.locks.acquire(name).await;
    let mut conn = ctx.pool.conn().await?;
    let vm = VirtualMachine::by_name(name, &mut conn).await?;
    let host = Host::by_id(vm.host_id, &mut conn).await?;

    if !is_running(ctx, &host, name).await? {
        return start_locked(ctx, &mut conn, name, client_ip).await;
    }
    shutdown(ctx, &mut conn, &host, name).await
}

/// Applies CPU and RAM changes independently. Shrinking is always allowed;
/// growing a dimension needs headroom on the machine's current host, and a
/// dimension without headroom is skipped rather than failing the other one.
pub async fn modify(ctx: &Context, spec: VmSpec) -> Result<String, Error> {
    let _guard = ctx.locks.acquire(&spec.name).await;
    let mut conn = ctx.pool.conn().await?;
    let vm = VirtualMachine::by_name(&spec.name, &mut conn).await?;
    let host = Host::by_id(vm.host_id, &mut conn).await?;

    if is_running(ctx, &host, &spec.name).await? {
        return Err(Error::ModifyWhileRunning);
    }

    if spec.cpu != 0 && spec.cpu != vm.cpu {
        let delta = spec.cpu - vm.cpu;
        if delta < 0 || scheduler::admits(&host, delta, 0) {
            resize(ctx, &mut conn, &host, &spec.name, Resize::Cpu(spec.cpu, delta)).await?;
        } else {
            tracing::warn!(
                "no se pudo aumentar la cpu de {}: el host {} no tiene recursos disponibles",
                spec.name,
                host.name
            );
        }
    }

    if spec.ram != 0 && spec.ram != vm.ram {
        let delta = spec.ram - vm.ram;
        if delta < 0 || scheduler::admits(&host, 0, delta) {
            resize(ctx, &mut conn, &host, &spec.name, Resize::Ram(spec.ram, delta)).await?;
        } else {
            tracing::warn!(
                "no se pudo aumentar la ram de {}: el host {} no tiene recursos disponibles",
                spec.name,
                host.name
            );
        }
    }

    Ok("Modificaciones realizadas con èxito".to_string())
}

/// Detaches the disk, unregisters the machine and releases its reservation.
/// Only stopped machines can be deleted.
pub async fn delete(ctx: &Context, name: &str) -> Result<String, Error> {
    let _guard = ctx.locks.acquire(name).await;
    let mut conn = ctx.pool.conn().await?;
    let vm = VirtualMachine::by_name(name, &mut conn).await?;
    let host = Host::by_id(vm.host_id, &mut conn).await?;

    if is_running(ctx, &host, name).await? {
        return Err(Error::DeleteWhileRunning);
    }

    run(ctx, &host, &vbox::detach_disk(name)).await?;
    run(ctx, &host, &vbox::unregister(name)).await?;

    VirtualMachine::delete(name, &mut conn).await?;
    Host::adjust_reservation(host.id, -vm.cpu, -vm.ram, &mut conn).await?;

    tracing::info!("màquina {name} eliminada correctamente");
    Ok("Màquina eliminada correctamente".to_string())
}

/// Shuts the machine down if it is running. Unlike [`stop`] this never turns
/// a stopped machine back on, which is what the reaper needs.
pub async fn ensure_off(ctx: &Context, name: &str) -> Result<(), Error> {
    let _guard = ctx.locks.acquire(name).await;
    let mut conn = ctx.pool.conn().await?;
    let vm = VirtualMachine::by_name(name, &mut conn).await?;
    let host = Host::by_id(vm.host_id, &mut conn).await?;

    if is_running(ctx, &host, name).await? {
        shutdown(ctx, &mut conn, &host, name).await?;
    }
    Ok(())
}

/// One dimension of a size change: the new value and the signed delta.
#[derive(Clone, Copy)]
enum Resize {
    Cpu(i32, i32),
    Ram(i32, i32),
}

/// Reservation counters move first, then the hypervisor, then the machine
/// row. A failed hypervisor command rolls the reservation back so the delta
/// does not leak capacity.
async fn resize(
    ctx: &Context,
    conn: &mut Conn<'_>,
    host: &Host,
    name: &str,
    change: Resize,
) -> Result<(), Error> {
    let (cpu_delta, ram_delta, command) = match change {
        Resize::Cpu(value, delta) => (delta, 0, vbox::set_cpus(name, value)),
        Resize::Ram(value, delta) => (0, delta, vbox::set_memory(name, value)),
    };

    Host::adjust_reservation(host.id, cpu_delta, ram_delta, conn).await?;
    if let Err(err) = run(ctx, host, &command).await {
        Host::adjust_reservation(host.id, -cpu_delta, -ram_delta, conn).await?;
        return Err(err);
    }

    match change {
        Resize::Cpu(value, _) => VirtualMachine::set_cpu(name, value, conn).await?,
        Resize::Ram(value, _) => VirtualMachine::set_ram(name, value, conn).await?,
    }
    Ok(())
}

async fn start_locked(
    ctx: &Context,
    conn: &mut Conn<'_>,
    name: &str,
    client_ip: &str,
) -> Result<String, Error> {
    let vm = VirtualMachine::by_name(name, conn).await?;
    let host = Host::by_id(vm.host_id, conn).await?;

    if is_running(ctx, &host, name).await? {
        return shutdown(ctx, conn, &host, name).await;
    }

    // A request coming from a registered host means someone is sitting at
    // that console and expects a window.
    let gui = Host::by_ip(client_ip, conn).await.is_ok();
    run(ctx, &host, &vbox::start(name, gui)).await?;
    VirtualMachine::set_state(name, VmState::Procesando, conn).await?;
    tracing::info!("encendiendo la màquina {name}, esperando direcciòn IP...");

    let Some(ip) = discover_ip(ctx, &host, name).await else {
        VirtualMachine::set_state(name, VmState::Apagado, conn).await?;
        return Err(Error::Unreachable);
    };

    VirtualMachine::set_running(name, &ip, conn).await?;
    tracing::info!("màquina {name} encendida, la direcciòn IP es {ip}");
    Ok(format!("Màquina encendida, la direcciòn IP es: {ip}"))
}

async fn shutdown(
    ctx: &Context,
    conn: &mut Conn<'_>,
    host: &Host,
    name: &str,
) -> Result<String, Error> {
    tracing::info!("apagando màquina {name}...");
    VirtualMachine::set_state(name, VmState::Procesando, conn).await?;
    run(ctx, host, &vbox::power_off(name)).await?;

    let deadline = Instant::now() + POWEROFF_BUDGET;
    while Instant::now() < deadline {
        if !is_running(ctx, host, name).await? {
            break;
        }
        sleep(POWEROFF_POLL_INTERVAL).await;
    }

    // The ACPI signal was ignored for the whole budget; repeat it.
    if is_running(ctx, host, name).await? {
        run(ctx, host, &vbox::power_off(name)).await?;
    }

    VirtualMachine::set_stopped(name, conn).await?;
    tracing::info!("màquina {name} apagada con èxito");
    Ok("Màquina apagada con èxito".to_string())
}

/// Polls the hypervisor for the guest's IPv4 address. After one exhausted
/// budget the machine is reset and the budget restarts once.
async fn discover_ip(ctx: &Context, host: &Host, name: &str) -> Option<String> {
    for round in 0..2 {
        let deadline = Instant::now() + IP_WAIT_BUDGET;
        while Instant::now() < deadline {
            let output = run(ctx, host, &vbox::guest_ip(name)).await.unwrap_or_default();
            if let Some(ip) = vbox::parse_guest_ip(&output) {
                return Some(ip);
            }
            sleep(IP_POLL_INTERVAL).await;
        }
        if round == 0 {
            tracing::warn!("reiniciando la màquina {name} para obtener una direcciòn IP");
            if run(ctx, host, &vbox::reset(name)).await.is_err() {
                return None;
            }
        }
    }
    None
}

async fn is_running(ctx: &Context, host: &Host, name: &str) -> Result<bool, Error> {
    let output = run(ctx, host, &vbox::show_info(name)).await?;
    Ok(matches!(
        vbox::parse_power_state(&output),
        Some(PowerState::Running)
    ))
}

async fn run(ctx: &Context, host: &Host, command: &str) -> Result<String, Error> {
    ctx.executor
        .run_keyed(&host.ip, &host.username, command)
        .await
        .map_err(Error::from)
}

/// Machine names get four random alphanumeric characters appended to keep
/// them globally unique.
fn name_suffix() -> String {
    Alphanumeric.sample_string(&mut rand::thread_rng(), 4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_names_match_the_expected_shape() {
        let pattern = regex::Regex::new(r"^VM_[A-Za-z0-9]{4}$").unwrap();
        for _ in 0..32 {
            let name = format!("VM_{}", name_suffix());
            assert!(pattern.is_match(&name), "unexpected name {name}");
        }
    }

    #[test]
    fn user_facing_errors_keep_their_wording() {
        assert_eq!(Error::NameTaken.to_string(), "Nombre de la MV no disponible");
        assert_eq!(
            Error::ModifyWhileRunning.to_string(),
            "Para modificar la màquina primero debe apagarla"
        );
        assert_eq!(
            scheduler::Error::InsufficientCapacity.to_string(),
            "No hay recursos disponibles el Desktop Cloud para crear la màquina virtual. Intente màs tarde"
        );
    }
}
