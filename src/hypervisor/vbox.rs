//! VBoxManage command lines and parsers for their output.

use std::sync::OnceLock;

use regex::Regex;

pub fn create_vm(name: &str, os_type: &str) -> String {
    format!("VBoxManage createvm --name \"{name}\" --ostype {os_type} --register")
}

pub fn set_memory(name: &str, ram: i32) -> String {
    format!("VBoxManage modifyvm \"{name}\" --memory {ram}")
}

pub fn set_cpus(name: &str, cpus: i32) -> String {
    format!("VBoxManage modifyvm \"{name}\" --cpus {cpus}")
}

pub fn add_storage_controller(name: &str) -> String {
    format!("VBoxManage storagectl \"{name}\" --name hardisk --add sata")
}

pub fn attach_disk(name: &str, medium: &str) -> String {
    format!(
        "VBoxManage storageattach \"{name}\" --storagectl hardisk --port 0 --device 0 --type hdd --medium \"{medium}\""
    )
}

pub fn detach_disk(name: &str) -> String {
    format!(
        "VBoxManage storageattach \"{name}\" --storagectl hardisk --port 0 --device 0 --medium none"
    )
}

pub fn set_bridged_nic(name: &str, adapter: &str) -> String {
    format!("VBoxManage modifyvm \"{name}\" --nic1 bridged --bridgeadapter1 \"{adapter}\"")
}

/// A user sitting at the host console gets a window, everyone else headless.
pub fn start(name: &str, gui: bool) -> String {
    if gui {
        format!("VBoxManage startvm \"{name}\"")
    } else {
        format!("VBoxManage startvm \"{name}\" --type headless")
    }
}

pub fn power_off(name: &str) -> String {
    format!("VBoxManage controlvm \"{name}\" poweroff")
}

pub fn reset(name: &str) -> String {
    format!("VBoxManage controlvm \"{name}\" reset")
}

pub fn unregister(name: &str) -> String {
    format!("VBoxManage unregistervm \"{name}\" --delete")
}

pub fn show_info(name: &str) -> String {
    format!("VBoxManage showvminfo \"{name}\"")
}

pub fn guest_ip(name: &str) -> String {
    format!("VBoxManage guestproperty get \"{name}\" /VirtualBox/GuestInfo/Net/0/V4/IP")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerState {
    Running,
    PoweredOff,
}

/// Pulls the machine UUID out of `createvm` output.
pub fn parse_uuid(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.strip_prefix("UUID:"))
        .map(|uuid| uuid.trim().to_string())
        .filter(|uuid| !uuid.is_empty())
}

/// Classifies the `State:` line of `showvminfo` output. Anything besides
/// `running` or `powered off` (saved, aborted, ...) is unclassified.
pub fn parse_power_state(output: &str) -> Option<PowerState> {
    static STATE: OnceLock<Regex> = OnceLock::new();
    let regex = STATE.get_or_init(|| Regex::new(r"State:\s+(running|powered off)").unwrap());

    match regex.captures(output)?.get(1)?.as_str() {
        "running" => Some(PowerState::Running),
        _ => Some(PowerState::PoweredOff),
    }
}

/// Extracts the guest address from `guestproperty get` output.
///
/// Returns `None` while no usable address is assigned: an empty reply, the
/// literal `No value set!`, or an APIPA address in 169.x.x.x.
pub fn parse_guest_ip(output: &str) -> Option<String> {
    let value = output.trim();
    if value.is_empty() || value.contains("No value set!") {
        return None;
    }

    let ip = value.strip_prefix("Value:").unwrap_or(value).trim();
    if ip.is_empty() || ip.starts_with("169.") {
        return None;
    }
    Some(ip.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREATEVM_OUTPUT: &str = "\
Virtual machine 'VM_ab12' is created and registered.
UUID: 9a6b8e0c-3f64-4b2e-9d1a-5a0e6f2b7c41
Settings file: '/home/uqcloud/VirtualBox VMs/VM_ab12/VM_ab12.vbox'
";

    const SHOWVMINFO_RUNNING: &str = "\
Name:                        VM_ab12
Guest OS:                    Debian (64-bit)
Memory size:                 1024MB
State:                       running (since 2023-10-04T14:11:08.000000000)
";

    const SHOWVMINFO_OFF: &str = "\
Name:                        VM_ab12
State:                       powered off (since 2023-10-04T16:40:12.000000000)
";

    #[test]
    fn uuid_is_taken_from_the_uuid_line() {
        assert_eq!(
            parse_uuid(CREATEVM_OUTPUT).unwrap(),
            "9a6b8e0c-3f64-4b2e-9d1a-5a0e6f2b7c41"
        );
        assert_eq!(parse_uuid("no uuid here"), None);
    }

    #[test]
    fn power_state_is_classified_by_the_state_line() {
        assert_eq!(
            parse_power_state(SHOWVMINFO_RUNNING),
            Some(PowerState::Running)
        );
        assert_eq!(parse_power_state(SHOWVMINFO_OFF), Some(PowerState::PoweredOff));
        assert_eq!(parse_power_state("State: saved"), None);
        assert_eq!(parse_power_state(""), None);
    }

    #[test]
    fn guest_ip_strips_the_value_prefix() {
        assert_eq!(
            parse_guest_ip("Value: 192.168.0.23\n").unwrap(),
            "192.168.0.23"
        );
    }

    #[test]
    fn guest_ip_rejects_placeholders() {
        assert_eq!(parse_guest_ip(""), None);
        assert_eq!(parse_guest_ip("No value set!"), None);
        assert_eq!(parse_guest_ip("Value: 169.254.13.7"), None);
    }

    #[test]
    fn start_command_picks_gui_or_headless() {
        assert_eq!(start("vm", true), "VBoxManage startvm \"vm\"");
        assert_eq!(
            start("vm", false),
            "VBoxManage startvm \"vm\" --type headless"
        );
    }

    #[test]
    fn create_sequence_commands() {
        assert_eq!(
            create_vm("VM_ab12", "Debian_64"),
            "VBoxManage createvm --name \"VM_ab12\" --ostype Debian_64 --register"
        );
        assert_eq!(
            attach_disk("VM_ab12", "/vms/debian.vdi"),
            "VBoxManage storageattach \"VM_ab12\" --storagectl hardisk --port 0 --device 0 --type hdd --medium \"/vms/debian.vdi\""
        );
        assert_eq!(
            detach_disk("VM_ab12"),
            "VBoxManage storageattach \"VM_ab12\" --storagectl hardisk --port 0 --device 0 --medium none"
        );
        assert_eq!(
            set_bridged_nic("VM_ab12", "eth0"),
            "VBoxManage modifyvm \"VM_ab12\" --nic1 bridged --bridgeadapter1 \"eth0\""
        );
    }
}
