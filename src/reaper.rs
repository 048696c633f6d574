//! Garbage collection of expired guest machines and their accounts.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::task::JoinHandle;

use crate::context::Context;
use crate::hypervisor;
use crate::model::{User, VirtualMachine};

/// Starts the periodic sweep, unless disabled by configuration.
pub fn spawn(ctx: Arc<Context>) -> Option<JoinHandle<()>> {
    if !ctx.config.reaper.enabled {
        tracing::info!("recolecciòn de cuentas de invitados deshabilitada");
        return None;
    }
    Some(tokio::spawn(run(ctx)))
}

async fn run(ctx: Arc<Context>) {
    let mut ticker = tokio::time::interval(ctx.config.reaper.interval);
    // The first tick of an interval fires immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if let Err(err) = sweep(&ctx).await {
            tracing::error!("fallò el barrido de màquinas de invitados: {err}");
        }
    }
}

/// Powers off and deletes every Invitado-owned machine past its lifetime;
/// an account left with no machines goes with it. Failures on one machine do
/// not block the rest.
pub async fn sweep(ctx: &Context) -> Result<(), hypervisor::Error> {
    let machines = {
        let mut conn = ctx.pool.conn().await?;
        VirtualMachine::guest_machines(&mut conn).await?
    };

    let now = chrono::Utc::now().naive_utc();
    for machine in machines {
        if !expired(machine.created_at, now, ctx.config.reaper.guest_lifetime) {
            continue;
        }
        if let Err(err) = retire(ctx, &machine).await {
            tracing::error!("no se pudo eliminar la màquina {}: {err}", machine.name);
        }
    }
    Ok(())
}

async fn retire(ctx: &Context, machine: &VirtualMachine) -> Result<(), hypervisor::Error> {
    tracing::info!(
        "la màquina {} de {} excediò su tiempo de vida",
        machine.name,
        machine.owner_email
    );
    hypervisor::ensure_off(ctx, &machine.name).await?;
    hypervisor::delete(ctx, &machine.name).await?;

    let mut conn = ctx.pool.conn().await?;
    if VirtualMachine::count_for_user(&machine.owner_email, &mut conn).await? == 0 {
        User::delete(&machine.owner_email, &mut conn).await?;
        tracing::info!("cuenta temporal {} eliminada", machine.owner_email);
    }
    Ok(())
}

fn expired(created: NaiveDateTime, now: NaiveDateTime, lifetime: Duration) -> bool {
    now.signed_duration_since(created)
        .to_std()
        .map(|age| age > lifetime)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;

    const LIFETIME: Duration = Duration::from_secs(2 * 3600 + 20 * 60);

    #[test]
    fn machines_expire_after_their_lifetime() {
        let now = chrono::Utc::now().naive_utc();
        let fresh = now - ChronoDuration::minutes(30);
        let stale = now - ChronoDuration::minutes(141);

        assert!(!expired(fresh, now, LIFETIME));
        assert!(expired(stale, now, LIFETIME));
    }

    #[test]
    fn the_boundary_is_exclusive() {
        let now = chrono::Utc::now().naive_utc();
        let at_limit = now - ChronoDuration::minutes(140);
        assert!(!expired(at_limit, now, LIFETIME));
    }

    #[test]
    fn future_timestamps_never_expire() {
        let now = chrono::Utc::now().naive_utc();
        let future = now + ChronoDuration::minutes(5);
        assert!(!expired(future, now, LIFETIME));
    }
}
