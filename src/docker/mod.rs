//! Drives the container engine on a host over SSH.
//!
//! Container hosts authenticate by password; every operation names its target
//! by `(ip, hostname)` straight from the request.

pub mod listing;

use displaydoc::Display;
use thiserror::Error;

use crate::remote::{self, Executor};

pub use self::listing::{Container, Image};

const SENT: &str = "Comando Enviado con Exito";

#[derive(Debug, Display, Error)]
pub enum Error {
    /// Error al ejecutar el comando remoto: {0}
    Remote(#[from] remote::Error),
}

/// Pulls `image:tag` from the public registry; returns the engine's output.
pub async fn pull_image(
    executor: &dyn Executor,
    image: &str,
    tag: &str,
    ip: &str,
    hostname: &str,
) -> Result<String, Error> {
    let output = run(executor, ip, hostname, &format!("docker pull {image}:{tag}")).await?;
    Ok(output)
}

/// Loads an image from a tar archive already present on the host.
pub async fn load_image(
    executor: &dyn Executor,
    archive: &str,
    ip: &str,
    hostname: &str,
) -> Result<String, Error> {
    run(executor, ip, hostname, &format!("docker load < {archive}")).await?;
    Ok("Comando Envidado con exito".to_string())
}

/// Unpacks a zipped build context into the user's home directory and builds
/// an image from it.
pub async fn build_image(
    executor: &dyn Executor,
    archive: &str,
    image: &str,
    ip: &str,
    hostname: &str,
) -> Result<String, Error> {
    let unpack =
        format!("mkdir /home/{hostname}/{image} && unzip {archive} -d /home/{hostname}/{image}");
    run(executor, ip, hostname, &unpack).await?;

    let build = format!("cd /home/{hostname}/{image} && docker build -t {image} .");
    let output = run(executor, ip, hostname, &build).await?;
    Ok(output)
}

pub async fn list_images(
    executor: &dyn Executor,
    ip: &str,
    hostname: &str,
) -> Result<Vec<Image>, Error> {
    let command = format!("docker images --format \"{}\"", listing::IMAGE_FORMAT);
    let output = run(executor, ip, hostname, &command).await?;
    Ok(listing::parse_images(&output, &origin(ip, hostname)))
}

pub async fn list_containers(
    executor: &dyn Executor,
    ip: &str,
    hostname: &str,
) -> Result<Vec<Container>, Error> {
    let command = format!("docker ps -a --format '{}'", listing::CONTAINER_FORMAT);
    let output = run(executor, ip, hostname, &command).await?;
    Ok(listing::parse_containers(&output, &origin(ip, hostname)))
}

pub async fn remove_image(
    executor: &dyn Executor,
    image: &str,
    ip: &str,
    hostname: &str,
) -> Result<String, Error> {
    run(executor, ip, hostname, &format!("docker rmi {image}")).await?;
    Ok(SENT.to_string())
}

pub async fn remove_all_images(
    executor: &dyn Executor,
    ip: &str,
    hostname: &str,
) -> Result<String, Error> {
    run(executor, ip, hostname, "docker rmi $(docker images -a -q)").await?;
    Ok(SENT.to_string())
}

/// Runs the caller-supplied engine command against an image, e.g.
/// `docker run -d` plus the image name.
pub async fn create_container(
    executor: &dyn Executor,
    image: &str,
    command: &str,
    ip: &str,
    hostname: &str,
) -> Result<String, Error> {
    run(executor, ip, hostname, &format!("{command} {image}")).await?;
    Ok(SENT.to_string())
}

pub async fn start_container(
    executor: &dyn Executor,
    container: &str,
    ip: &str,
    hostname: &str,
) -> Result<String, Error> {
    run(executor, ip, hostname, &format!("docker start {container}")).await?;
    Ok(SENT.to_string())
}

pub async fn stop_container(
    executor: &dyn Executor,
    container: &str,
    ip: &str,
    hostname: &str,
) -> Result<String, Error> {
    run(executor, ip, hostname, &format!("docker stop {container}")).await?;
    Ok(SENT.to_string())
}

pub async fn restart_container(
    executor: &dyn Executor,
    container: &str,
    ip: &str,
    hostname: &str,
) -> Result<String, Error> {
    run(executor, ip, hostname, &format!("docker restart {container}")).await?;
    Ok(SENT.to_string())
}

pub async fn remove_container(
    executor: &dyn Executor,
    container: &str,
    ip: &str,
    hostname: &str,
) -> Result<String, Error> {
    run(executor, ip, hostname, &format!("docker rm {container}")).await?;
    Ok(SENT.to_string())
}

pub async fn remove_all_containers(
    executor: &dyn Executor,
    ip: &str,
    hostname: &str,
) -> Result<String, Error> {
    run(executor, ip, hostname, "docker rm $(docker ps -a -q)").await?;
    Ok(SENT.to_string())
}

fn origin(ip: &str, hostname: &str) -> String {
    format!("{ip} - {hostname}")
}

async fn run(
    executor: &dyn Executor,
    ip: &str,
    hostname: &str,
    command: &str,
) -> Result<String, Error> {
    executor
        .run_password(ip, hostname, command)
        .await
        .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use crate::remote::MockExecutor;

    use super::*;

    #[tokio::test]
    async fn pull_runs_the_registry_command() {
        let mut executor = MockExecutor::new();
        executor
            .expect_run_password()
            .with(eq("10.0.0.5"), eq("worker"), eq("docker pull nginx:latest"))
            .once()
            .returning(|_, _, _| Ok("latest: Pulling from library/nginx".to_string()));

        let output = pull_image(&executor, "nginx", "latest", "10.0.0.5", "worker")
            .await
            .unwrap();
        assert!(output.contains("Pulling"));
    }

    #[tokio::test]
    async fn build_unpacks_then_builds() {
        let mut executor = MockExecutor::new();
        executor
            .expect_run_password()
            .with(
                eq("10.0.0.5"),
                eq("worker"),
                eq("mkdir /home/worker/app && unzip app.zip -d /home/worker/app"),
            )
            .once()
            .returning(|_, _, _| Ok(String::new()));
        executor
            .expect_run_password()
            .with(
                eq("10.0.0.5"),
                eq("worker"),
                eq("cd /home/worker/app && docker build -t app ."),
            )
            .once()
            .returning(|_, _, _| Ok("Successfully built 3f2a1b4c5d6e".to_string()));

        let output = build_image(&executor, "app.zip", "app", "10.0.0.5", "worker")
            .await
            .unwrap();
        assert!(output.contains("Successfully built"));
    }

    #[tokio::test]
    async fn listing_images_parses_the_engine_output() {
        let mut executor = MockExecutor::new();
        executor.expect_run_password().once().returning(|_, _, _| {
            Ok("nginx,latest,605c77e624dd,2023-09-12 09:40:21 +0000 UTC,141MB\n".to_string())
        });

        let images = list_images(&executor, "10.0.0.5", "worker").await.unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].repository, "nginx");
        assert_eq!(images[0].origin, "10.0.0.5 - worker");
    }

    #[tokio::test]
    async fn container_control_uses_the_engine_verbs() {
        let mut executor = MockExecutor::new();
        executor
            .expect_run_password()
            .with(eq("10.0.0.5"), eq("worker"), eq("docker restart 3f2a"))
            .once()
            .returning(|_, _, _| Ok(String::new()));

        let mensaje = restart_container(&executor, "3f2a", "10.0.0.5", "worker")
            .await
            .unwrap();
        assert_eq!(mensaje, "Comando Enviado con Exito");
    }

    #[tokio::test]
    async fn bulk_delete_expands_all_ids() {
        let mut executor = MockExecutor::new();
        executor
            .expect_run_password()
            .with(eq("10.0.0.5"), eq("worker"), eq("docker rm $(docker ps -a -q)"))
            .once()
            .returning(|_, _, _| Ok(String::new()));

        remove_all_containers(&executor, "10.0.0.5", "worker")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn remote_failures_surface_as_errors() {
        let mut executor = MockExecutor::new();
        executor.expect_run_password().once().returning(|_, _, _| {
            Err(crate::remote::Error::CommandFailed(
                1,
                "Error response from daemon".to_string(),
            ))
        });

        let result = stop_container(&executor, "3f2a", "10.0.0.5", "worker").await;
        assert!(result.is_err());
    }
}
