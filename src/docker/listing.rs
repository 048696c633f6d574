//! Parsers for the tabular listings printed by the container engine.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

const IMAGE_FIELDS: usize = 5;
const CONTAINER_FIELDS: usize = 7;

/// Format string passed to `docker images`.
pub const IMAGE_FORMAT: &str = "{{.Repository}},{{.Tag}},{{.ID}},{{.CreatedAt}},{{.Size}}";

/// Format string passed to `docker ps -a`.
pub const CONTAINER_FORMAT: &str = "{{.ID}},{{.Image}},{{.Command}},{{.CreatedAt}},{{.Status}},{{if .Ports}}{{.Ports}}{{else}}No ports exposed{{end}},{{.Names}}";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Image {
    #[serde(rename = "Repositorio")]
    pub repository: String,
    #[serde(rename = "Tag")]
    pub tag: String,
    #[serde(rename = "ImagenId")]
    pub id: String,
    #[serde(rename = "Creacion")]
    pub created: String,
    #[serde(rename = "Tamanio")]
    pub size: String,
    /// Which machine the listing came from, as `<ip> - <hostname>`.
    #[serde(rename = "MaquinaVM")]
    pub origin: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Container {
    // Wire key kept as the clients already learned it.
    #[serde(rename = "ConetendorId")]
    pub id: String,
    #[serde(rename = "Imagen")]
    pub image: String,
    #[serde(rename = "Comando")]
    pub command: String,
    #[serde(rename = "Creado")]
    pub created: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Puerto")]
    pub ports: String,
    #[serde(rename = "Nombre")]
    pub name: String,
    #[serde(rename = "MaquinaVM")]
    pub origin: String,
}

/// Splits a listing into positional fields on commas and newlines. Incomplete
/// trailing records are dropped.
fn fields(raw: &str) -> Vec<&str> {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    let separator = SEPARATOR.get_or_init(|| Regex::new("[,\n]+").unwrap());

    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }
    separator.split(raw).collect()
}

pub fn parse_images(raw: &str, origin: &str) -> Vec<Image> {
    fields(raw)
        .chunks_exact(IMAGE_FIELDS)
        .map(|record| Image {
            repository: record[0].to_string(),
            tag: record[1].to_string(),
            id: record[2].to_string(),
            created: record[3].to_string(),
            size: record[4].to_string(),
            origin: origin.to_string(),
        })
        .collect()
}

pub fn parse_containers(raw: &str, origin: &str) -> Vec<Container> {
    fields(raw)
        .chunks_exact(CONTAINER_FIELDS)
        .map(|record| Container {
            id: record[0].to_string(),
            image: record[1].to_string(),
            command: record[2].to_string(),
            created: record[3].to_string(),
            status: record[4].to_string(),
            ports: record[5].to_string(),
            name: record[6].to_string(),
            origin: origin.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMAGES_OUTPUT: &str = "\
nginx,latest,605c77e624dd,2023-09-12 09:40:21 +0000 UTC,141MB
redis,7.2,7614ae9453d1,2023-08-30 17:01:55 +0000 UTC,117MB
";

    const CONTAINERS_OUTPUT: &str = "\
3f2a1b4c5d6e,nginx:latest,\"/docker-entrypoint.…\",2023-10-02 11:00:41 +0000 UTC,Up 2 hours,0.0.0.0:8080->80/tcp,web
9e8d7c6b5a40,redis:7.2,\"docker-entrypoint.s…\",2023-10-01 08:15:02 +0000 UTC,Exited (0) 3 hours ago,No ports exposed,cache
";

    #[test]
    fn images_group_into_records_of_five() {
        let images = parse_images(IMAGES_OUTPUT, "10.0.0.5 - worker");
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].repository, "nginx");
        assert_eq!(images[0].size, "141MB");
        assert_eq!(images[1].id, "7614ae9453d1");
        assert_eq!(images[1].origin, "10.0.0.5 - worker");
    }

    #[test]
    fn containers_group_into_records_of_seven() {
        let containers = parse_containers(CONTAINERS_OUTPUT, "10.0.0.5 - worker");
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].id, "3f2a1b4c5d6e");
        assert_eq!(containers[0].ports, "0.0.0.0:8080->80/tcp");
        assert_eq!(containers[1].ports, "No ports exposed");
        assert_eq!(containers[1].name, "cache");
    }

    #[test]
    fn empty_output_yields_no_records() {
        assert!(parse_images("", "x").is_empty());
        assert!(parse_containers("\n", "x").is_empty());
    }

    #[test]
    fn incomplete_trailing_record_is_dropped() {
        let raw = "nginx,latest,605c77e624dd,2023-09-12 09:40:21 +0000 UTC,141MB\nredis,7.2";
        let images = parse_images(raw, "x");
        assert_eq!(images.len(), 1);
    }

    #[test]
    fn container_wire_keys() {
        let container = &parse_containers(CONTAINERS_OUTPUT, "10.0.0.5 - worker")[0];
        let json = serde_json::to_value(container).unwrap();
        assert_eq!(json["ConetendorId"], "3f2a1b4c5d6e");
        assert_eq!(json["MaquinaVM"], "10.0.0.5 - worker");
    }
}
