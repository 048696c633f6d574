use std::sync::Arc;

use async_trait::async_trait;
use displaydoc::Display;
use russh::client;
use russh::{ChannelMsg, Disconnect};
use russh_keys::key;
use thiserror::Error;

use crate::config::{DockerConfig, SshConfig};

/// SSH port on every managed host.
const SSH_PORT: u16 = 22;

#[derive(Debug, Display, Error)]
pub enum Error {
    /// Failed to open an SSH connection to `{0}`: {1}
    Connect(String, russh::Error),
    /// Failed to read the private key at `{0}`: {1}
    LoadKey(String, russh_keys::Error),
    /// Host `{0}` rejected the authentication attempt
    AuthRejected(String),
    /// Failed to run a remote command: {0}
    Channel(russh::Error),
    /// Remote command exited with status {0}: {1}
    CommandFailed(u32, String),
}

/// One-shot command execution against a host. Each call opens a session, runs
/// a single command and collects combined stdout/stderr.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Executor: Send + Sync {
    /// Runs `command` as `user` on `addr`, authenticating with the
    /// controller's private key.
    async fn run_keyed(&self, addr: &str, user: &str, command: &str) -> Result<String, Error>;

    /// Runs `command` as `user` on `addr`, authenticating with the shared
    /// container-host password.
    async fn run_password(&self, addr: &str, user: &str, command: &str) -> Result<String, Error>;
}

enum Auth {
    Key,
    Password,
}

pub struct SshExecutor {
    key_path: String,
    docker_password: String,
    strict_host_key: bool,
}

impl SshExecutor {
    pub fn new(ssh: &SshConfig, docker: &DockerConfig) -> Self {
        SshExecutor {
            key_path: ssh.key_path.clone(),
            docker_password: docker.password.clone(),
            strict_host_key: ssh.strict_host_key,
        }
    }

    async fn session(
        &self,
        addr: &str,
        user: &str,
        auth: Auth,
    ) -> Result<client::Handle<HostKeyPolicy>, Error> {
        let config = Arc::new(client::Config::default());
        let policy = HostKeyPolicy {
            addr: addr.to_string(),
            strict: self.strict_host_key,
        };
        let mut session = client::connect(config, (addr, SSH_PORT), policy)
            .await
            .map_err(|err| Error::Connect(addr.to_string(), err))?;

        let authenticated = match auth {
            Auth::Key => {
                let pair = russh_keys::load_secret_key(&self.key_path, None)
                    .map_err(|err| Error::LoadKey(self.key_path.clone(), err))?;
                session
                    .authenticate_publickey(user, Arc::new(pair))
                    .await
                    .map_err(|err| Error::Connect(addr.to_string(), err))?
            }
            Auth::Password => session
                .authenticate_password(user, &self.docker_password)
                .await
                .map_err(|err| Error::Connect(addr.to_string(), err))?,
        };
        if !authenticated {
            return Err(Error::AuthRejected(addr.to_string()));
        }

        Ok(session)
    }

    async fn run(&self, addr: &str, user: &str, auth: Auth, command: &str) -> Result<String, Error> {
        tracing::debug!("ssh {user}@{addr}: {command}");
        let mut session = self.session(addr, user, auth).await?;

        let mut channel = session
            .channel_open_session()
            .await
            .map_err(Error::Channel)?;
        channel.exec(true, command).await.map_err(Error::Channel)?;

        let mut output = Vec::new();
        let mut status = None;
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => output.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, .. } => output.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status } => status = Some(exit_status),
                _ => (),
            }
        }
        let _ = session
            .disconnect(Disconnect::ByApplication, "", "en")
            .await;

        let output = String::from_utf8_lossy(&output).into_owned();
        match status {
            Some(code) if code != 0 => Err(Error::CommandFailed(code, output)),
            _ => Ok(output),
        }
    }
}

#[async_trait]
impl Executor for SshExecutor {
    async fn run_keyed(&self, addr: &str, user: &str, command: &str) -> Result<String, Error> {
        self.run(addr, user, Auth::Key, command).await
    }

    async fn run_password(&self, addr: &str, user: &str, command: &str) -> Result<String, Error> {
        self.run(addr, user, Auth::Password, command).await
    }
}

/// Accepts any server key unless strict checking against the operator's
/// known_hosts file is enabled.
struct HostKeyPolicy {
    addr: String,
    strict: bool,
}

#[async_trait]
impl client::Handler for HostKeyPolicy {
    type Error = russh::Error;

    async fn check_server_key(self, key: &key::PublicKey) -> Result<(Self, bool), Self::Error> {
        if !self.strict {
            return Ok((self, true));
        }
        let ok = russh_keys::check_known_hosts(&self.addr, SSH_PORT, key).unwrap_or(false);
        Ok((self, ok))
    }
}
