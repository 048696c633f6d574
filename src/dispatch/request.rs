//! Request payloads accepted at ingress and carried through the queues.

use serde::Deserialize;

/// The `specifications` object sent for machine creation and modification.
/// Clients send only the fields a given operation needs.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct VmSpec {
    #[serde(rename = "Nombre", default)]
    pub name: String,
    #[serde(rename = "Ram", default)]
    pub ram: i32,
    #[serde(rename = "Cpu", default)]
    pub cpu: i32,
    #[serde(rename = "Sistema_operativo", default)]
    pub os: String,
    #[serde(rename = "Distribucion_sistema_operativo", default)]
    pub distro: String,
    #[serde(rename = "Persona_email", default)]
    pub owner_email: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CreateVm {
    pub specifications: VmSpec,
    #[serde(rename = "clientIP", default)]
    pub client_ip: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "tipo_solicitud")]
pub enum ManageVm {
    #[serde(rename = "modify")]
    Modify { specifications: VmSpec },
    #[serde(rename = "delete")]
    Delete {
        #[serde(rename = "nombreVM")]
        name: String,
    },
    #[serde(rename = "start")]
    Start {
        #[serde(rename = "nombreVM")]
        name: String,
        #[serde(rename = "clientIP", default)]
        client_ip: String,
    },
    #[serde(rename = "stop")]
    Stop {
        #[serde(rename = "nombreVM")]
        name: String,
        #[serde(rename = "clientIP", default)]
        client_ip: String,
    },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "solicitud")]
pub enum ManageImage {
    /// `borar` is the spelling clients have sent since day one; the corrected
    /// form is accepted too.
    #[serde(rename = "borrar", alias = "borar")]
    Remove {
        #[serde(rename = "imagen")]
        image: String,
        ip: String,
        hostname: String,
    },
    #[serde(rename = "eliminar")]
    RemoveAll { ip: String, hostname: String },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "solicitud")]
pub enum ManageContainer {
    #[serde(rename = "correr")]
    Start {
        #[serde(rename = "contenedor")]
        container: String,
        ip: String,
        hostname: String,
    },
    #[serde(rename = "pausar")]
    Stop {
        #[serde(rename = "contenedor")]
        container: String,
        ip: String,
        hostname: String,
    },
    #[serde(rename = "reiniciar")]
    Restart {
        #[serde(rename = "contenedor")]
        container: String,
        ip: String,
        hostname: String,
    },
    #[serde(rename = "borrar")]
    Remove {
        #[serde(rename = "contenedor")]
        container: String,
        ip: String,
        hostname: String,
    },
    #[serde(rename = "eliminar")]
    RemoveAll { ip: String, hostname: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_payload_decodes() {
        let payload = serde_json::json!({
            "specifications": {
                "Nombre": "VM",
                "Ram": 1024,
                "Cpu": 2,
                "Sistema_operativo": "Linux",
                "Distribucion_sistema_operativo": "Debian",
                "Persona_email": "a@b",
            },
            "clientIP": "9.9.9.9",
        });
        let req: CreateVm = serde_json::from_value(payload).unwrap();
        assert_eq!(req.specifications.name, "VM");
        assert_eq!(req.specifications.ram, 1024);
        assert_eq!(req.client_ip, "9.9.9.9");
    }

    #[test]
    fn manage_vm_is_tagged_by_tipo_solicitud() {
        let start: ManageVm = serde_json::from_value(serde_json::json!({
            "tipo_solicitud": "start",
            "nombreVM": "VM_ab12",
            "clientIP": "10.0.0.2",
        }))
        .unwrap();
        assert!(matches!(start, ManageVm::Start { ref name, .. } if name == "VM_ab12"));

        let modify: ManageVm = serde_json::from_value(serde_json::json!({
            "tipo_solicitud": "modify",
            "specifications": { "Nombre": "VM_ab12", "Cpu": 4 },
        }))
        .unwrap();
        assert!(matches!(modify, ManageVm::Modify { ref specifications } if specifications.cpu == 4));

        let unknown = serde_json::from_value::<ManageVm>(serde_json::json!({
            "tipo_solicitud": "suspend",
            "nombreVM": "VM_ab12",
        }));
        assert!(unknown.is_err());
    }

    #[test]
    fn image_removal_accepts_both_spellings() {
        for tag in ["borar", "borrar"] {
            let req: ManageImage = serde_json::from_value(serde_json::json!({
                "solicitud": tag,
                "imagen": "nginx",
                "ip": "10.0.0.5",
                "hostname": "worker",
            }))
            .unwrap();
            assert!(matches!(req, ManageImage::Remove { ref image, .. } if image == "nginx"));
        }
    }

    #[test]
    fn container_requests_cover_all_commands() {
        let req: ManageContainer = serde_json::from_value(serde_json::json!({
            "solicitud": "reiniciar",
            "contenedor": "3f2a1b4c5d6e",
            "ip": "10.0.0.5",
            "hostname": "worker",
        }))
        .unwrap();
        assert!(matches!(req, ManageContainer::Restart { .. }));

        let req: ManageContainer = serde_json::from_value(serde_json::json!({
            "solicitud": "eliminar",
            "ip": "10.0.0.5",
            "hostname": "worker",
        }))
        .unwrap();
        assert!(matches!(req, ManageContainer::RemoveAll { .. }));
    }
}
