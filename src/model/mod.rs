pub mod catalog;
pub mod disk;
pub mod host;
pub mod metrics;
pub mod schema;
pub mod user;
pub mod vm;

pub use catalog::CatalogEntry;
pub use disk::{Disk, NewDisk};
pub use host::{Host, HostSummary, NewHost};
pub use metrics::Metrics;
pub use user::{NewUser, Role, User};
pub use vm::{MachineInfo, NewVm, VirtualMachine, VmState};
