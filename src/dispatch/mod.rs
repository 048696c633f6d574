//! Per-topic request queues and their dispatchers.
//!
//! Each topic is a bounded channel drained by a single worker, so enqueue
//! order is dispatch order within a topic. Dispatched jobs run in their own
//! task and settle through the job registry; the worker never waits for them.

pub mod job;
pub mod request;

use std::fmt::Display;
use std::sync::Arc;

use displaydoc::Display as DisplayDoc;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::context::Context;
use crate::{docker, hypervisor};

use self::job::JobRegistry;
use self::request::{CreateVm, ManageContainer, ManageImage, ManageVm};

pub mod topic {
    pub const CREATE_VM: &str = "create-vm";
    pub const MANAGE_VM: &str = "manage-vm";
    pub const MANAGE_IMAGE: &str = "manage-image";
    pub const MANAGE_CONTAINER: &str = "manage-container";
}

#[derive(Debug, DisplayDoc, Error)]
pub enum Error {
    /// The dispatcher for this queue has shut down
    Closed,
}

/// A queued item: the decoded request plus its correlation id.
#[derive(Debug)]
pub struct Queued<T> {
    pub job_id: Uuid,
    pub request: T,
}

/// Producer ends of the four topic queues.
pub struct Queues {
    create_vm: mpsc::Sender<Queued<CreateVm>>,
    manage_vm: mpsc::Sender<Queued<ManageVm>>,
    manage_image: mpsc::Sender<Queued<ManageImage>>,
    manage_container: mpsc::Sender<Queued<ManageContainer>>,
}

/// Consumer ends, handed to [`spawn`] once the context is built.
pub struct Workers {
    create_vm: mpsc::Receiver<Queued<CreateVm>>,
    manage_vm: mpsc::Receiver<Queued<ManageVm>>,
    manage_image: mpsc::Receiver<Queued<ManageImage>>,
    manage_container: mpsc::Receiver<Queued<ManageContainer>>,
}

pub fn queues(depth: usize) -> (Queues, Workers) {
    let (create_tx, create_rx) = mpsc::channel(depth);
    let (manage_tx, manage_rx) = mpsc::channel(depth);
    let (image_tx, image_rx) = mpsc::channel(depth);
    let (container_tx, container_rx) = mpsc::channel(depth);

    let queues = Queues {
        create_vm: create_tx,
        manage_vm: manage_tx,
        manage_image: image_tx,
        manage_container: container_tx,
    };
    let workers = Workers {
        create_vm: create_rx,
        manage_vm: manage_rx,
        manage_image: image_rx,
        manage_container: container_rx,
    };
    (queues, workers)
}

impl Queues {
    pub async fn create_vm(&self, jobs: &JobRegistry, request: CreateVm) -> Result<Uuid, Error> {
        let job_id = jobs.enqueue(topic::CREATE_VM);
        self.create_vm
            .send(Queued { job_id, request })
            .await
            .map_err(|_| Error::Closed)?;
        Ok(job_id)
    }

    pub async fn manage_vm(&self, jobs: &JobRegistry, request: ManageVm) -> Result<Uuid, Error> {
        let job_id = jobs.enqueue(topic::MANAGE_VM);
        self.manage_vm
            .send(Queued { job_id, request })
            .await
            .map_err(|_| Error::Closed)?;
        Ok(job_id)
    }

    pub async fn manage_image(
        &self,
        jobs: &JobRegistry,
        request: ManageImage,
    ) -> Result<Uuid, Error> {
        let job_id = jobs.enqueue(topic::MANAGE_IMAGE);
        self.manage_image
            .send(Queued { job_id, request })
            .await
            .map_err(|_| Error::Closed)?;
        Ok(job_id)
    }

    pub async fn manage_container(
        &self,
        jobs: &JobRegistry,
        request: ManageContainer,
    ) -> Result<Uuid, Error> {
        let job_id = jobs.enqueue(topic::MANAGE_CONTAINER);
        self.manage_container
            .send(Queued { job_id, request })
            .await
            .map_err(|_| Error::Closed)?;
        Ok(job_id)
    }
}

/// Starts the four single-consumer dispatchers.
pub fn spawn(ctx: Arc<Context>, workers: Workers) {
    let Workers {
        create_vm,
        manage_vm,
        manage_image,
        manage_container,
    } = workers;

    tokio::spawn(create_vm_worker(ctx.clone(), create_vm));
    tokio::spawn(manage_vm_worker(ctx.clone(), manage_vm));
    tokio::spawn(manage_image_worker(ctx.clone(), manage_image));
    tokio::spawn(manage_container_worker(ctx, manage_container));
}

async fn create_vm_worker(ctx: Arc<Context>, mut rx: mpsc::Receiver<Queued<CreateVm>>) {
    while let Some(item) = rx.recv().await {
        ctx.jobs.running(item.job_id);
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let request = item.request;
            let outcome = hypervisor::create(&ctx, request.specifications, &request.client_ip).await;
            settle(&ctx, item.job_id, outcome);
        });
    }
}

async fn manage_vm_worker(ctx: Arc<Context>, mut rx: mpsc::Receiver<Queued<ManageVm>>) {
    while let Some(item) = rx.recv().await {
        ctx.jobs.running(item.job_id);
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let outcome = match item.request {
                ManageVm::Modify { specifications } => {
                    hypervisor::modify(&ctx, specifications).await
                }
                ManageVm::Delete { name } => hypervisor::delete(&ctx, &name).await,
                ManageVm::Start { name, client_ip } => {
                    hypervisor::start(&ctx, &name, &client_ip).await
                }
                ManageVm::Stop { name, client_ip } => {
                    hypervisor::stop(&ctx, &name, &client_ip).await
                }
            };
            settle(&ctx, item.job_id, outcome);
        });
    }
}

async fn manage_image_worker(ctx: Arc<Context>, mut rx: mpsc::Receiver<Queued<ManageImage>>) {
    while let Some(item) = rx.recv().await {
        ctx.jobs.running(item.job_id);
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let executor = ctx.executor.as_ref();
            let outcome = match item.request {
                ManageImage::Remove {
                    image,
                    ip,
                    hostname,
                } => docker::remove_image(executor, &image, &ip, &hostname).await,
                ManageImage::RemoveAll { ip, hostname } => {
                    docker::remove_all_images(executor, &ip, &hostname).await
                }
            };
            settle(&ctx, item.job_id, outcome);
        });
    }
}

async fn manage_container_worker(
    ctx: Arc<Context>,
    mut rx: mpsc::Receiver<Queued<ManageContainer>>,
) {
    while let Some(item) = rx.recv().await {
        ctx.jobs.running(item.job_id);
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let executor = ctx.executor.as_ref();
            let outcome = match item.request {
                ManageContainer::Start {
                    container,
                    ip,
                    hostname,
                } => docker::start_container(executor, &container, &ip, &hostname).await,
                ManageContainer::Stop {
                    container,
                    ip,
                    hostname,
                } => docker::stop_container(executor, &container, &ip, &hostname).await,
                ManageContainer::Restart {
                    container,
                    ip,
                    hostname,
                } => docker::restart_container(executor, &container, &ip, &hostname).await,
                ManageContainer::Remove {
                    container,
                    ip,
                    hostname,
                } => docker::remove_container(executor, &container, &ip, &hostname).await,
                ManageContainer::RemoveAll { ip, hostname } => {
                    docker::remove_all_containers(executor, &ip, &hostname).await
                }
            };
            settle(&ctx, item.job_id, outcome);
        });
    }
}

fn settle<E: Display>(ctx: &Context, job_id: Uuid, outcome: Result<String, E>) {
    match outcome {
        Ok(detail) => ctx.jobs.finish(job_id, Ok(detail)),
        Err(err) => {
            tracing::error!("{err}");
            ctx.jobs.finish(job_id, Err(err.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_order_is_dispatch_order() {
        let jobs = JobRegistry::default();
        let (queues, mut workers) = queues(8);

        let mut sent = Vec::new();
        for name in ["a", "b", "c", "d"] {
            let id = queues
                .manage_vm(
                    &jobs,
                    ManageVm::Delete {
                        name: name.to_string(),
                    },
                )
                .await
                .unwrap();
            sent.push((id, name.to_string()));
        }

        for (id, name) in sent {
            let item = workers.manage_vm.recv().await.unwrap();
            assert_eq!(item.job_id, id);
            assert!(matches!(item.request, ManageVm::Delete { name: ref n } if *n == name));
        }
    }

    #[tokio::test]
    async fn enqueue_fails_once_the_worker_is_gone() {
        let jobs = JobRegistry::default();
        let (queues, workers) = queues(1);
        drop(workers);

        let result = queues
            .manage_image(
                &jobs,
                ManageImage::RemoveAll {
                    ip: "10.0.0.5".into(),
                    hostname: "worker".into(),
                },
            )
            .await;
        assert!(matches!(result, Err(Error::Closed)));
    }
}
