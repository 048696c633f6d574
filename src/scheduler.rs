//! Host placement for new machines and size increases.

use displaydoc::Display;
use thiserror::Error;

use crate::database::Conn;
use crate::model::Host;

/// Fraction of a host's resources that may be reserved. The remainder is
/// headroom for the host itself.
const HEADROOM: f64 = 0.75;

/// Extra random draws beyond the host count before giving up.
const EXTRA_ATTEMPTS: i64 = 5;

#[derive(Debug, Display, Error)]
pub enum Error {
    /// No hay recursos disponibles el Desktop Cloud para crear la màquina virtual. Intente màs tarde
    InsufficientCapacity,
    /// {0}
    Host(#[from] crate::model::host::Error),
}

/// Whether `host` can take on `cpu` extra cores and `ram` extra MiB. A zero
/// request leaves that dimension untouched and unchecked; every requested
/// dimension must fit under the headroom cap (strict less-than).
pub fn admits(host: &Host, cpu: i32, ram: i32) -> bool {
    let cpu_fits = cpu == 0 || f64::from(host.cpu_used + cpu) < f64::from(host.cpu_total) * HEADROOM;
    let ram_fits = ram == 0 || f64::from(host.ram_used + ram) < f64::from(host.ram_total) * HEADROOM;
    cpu_fits && ram_fits
}

/// Picks a host for a machine of the given size.
///
/// A request arriving from a registered host prefers that host
/// (placement-on-origin). Otherwise up to `host count + 5` uniform random
/// draws look for an admissible host.
pub async fn place(
    cpu: i32,
    ram: i32,
    client_ip: &str,
    conn: &mut Conn<'_>,
) -> Result<Host, Error> {
    if let Ok(host) = Host::by_ip(client_ip, conn).await {
        if admits(&host, cpu, ram) {
            return Ok(host);
        }
    }

    let mut attempts = Host::count(conn).await? + EXTRA_ATTEMPTS;
    while attempts > 0 {
        let host = Host::random(conn).await?;
        if admits(&host, cpu, ram) {
            return Ok(host);
        }
        attempts -= 1;
    }

    Err(Error::InsufficientCapacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(cpu_total: i32, cpu_used: i32, ram_total: i32, ram_used: i32) -> Host {
        Host {
            id: 1,
            name: "H1".into(),
            mac: String::new(),
            ip: "10.0.0.2".into(),
            username: "uqcloud".into(),
            ram_total,
            cpu_total,
            storage_total: 0,
            ram_used,
            cpu_used,
            storage_used: 0,
            bridge_adapter: "eth0".into(),
            state: "Activo".into(),
            public_key_path: String::new(),
            os: "Linux".into(),
            distro: "Debian".into(),
        }
    }

    #[test]
    fn admits_below_the_headroom_cap() {
        let h = host(8, 0, 8192, 0);
        assert!(admits(&h, 2, 1024));
    }

    #[test]
    fn rejects_at_the_cap_boundary() {
        // 75% of 8 cores is 6; used + requested must stay strictly below it.
        let h = host(8, 6, 8192, 0);
        assert!(!admits(&h, 1, 0));

        // 5 + 1 = 6 is still not strictly below the cap.
        let h = host(8, 5, 8192, 0);
        assert!(!admits(&h, 1, 0));
        assert!(admits(&h, 0, 1024));
    }

    #[test]
    fn untouched_dimension_is_not_checked() {
        // RAM is exhausted, but a CPU-only change does not look at it.
        let h = host(8, 0, 8192, 8000);
        assert!(admits(&h, 2, 0));
        assert!(!admits(&h, 0, 1024));
    }

    #[test]
    fn joint_requests_need_both_dimensions() {
        let h = host(8, 0, 8192, 6000);
        assert!(!admits(&h, 2, 1024));
    }
}
