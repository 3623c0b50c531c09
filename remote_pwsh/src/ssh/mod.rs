use crate::client::{Command, CommandOutput, Config, Session};

use async_trait::async_trait;
use russh::client;
use russh::keys::{
    decode_secret_key, parse_public_key_base64, PrivateKey, PrivateKeyWithHashAlg, PublicKey,
};
use russh::{ChannelMsg, Disconnect, Sig};
use russh_sftp::client::SftpSession;
use std::{fmt, sync::Arc};
use tokio::{io::AsyncWriteExt, time::Duration};
use tracing::{debug, info, warn};

/// How the session authenticates.
#[derive(Clone)]
pub enum Auth {
    Password(String),
    /// Private key text in OpenSSH or PEM format.
    PrivateKey(String),
}

impl Auth {
    fn method(&self) -> &'static str {
        match self {
            Auth::Password(_) => "password",
            Auth::PrivateKey(_) => "private key",
        }
    }

    /// Decode the key up front so a bad key fails before any network traffic.
    fn prepare(&self) -> crate::Result<Credential<'_>> {
        match self {
            Auth::Password(password) => Ok(Credential::Password(password)),
            Auth::PrivateKey(key) => decode_secret_key(key, None)
                .map(Credential::Key)
                .map_err(|e| crate::Error::ConnectionError(format!("Invalid private key: {}", e))),
        }
    }
}

/// Credentials ready to hand to the server.
enum Credential<'a> {
    Password(&'a str),
    Key(PrivateKey),
}

/// Configuration for an SSH session
///
/// Built with [`SSHConfig::password`] or [`SSHConfig::key`]; immutable apart
/// from the optional builder settings.
#[derive(Clone)]
pub struct SSHConfig {
    host: String,
    port: u16,
    username: String,
    auth: Auth,
    host_key: Option<PublicKey>,
    inactivity_timeout: Option<Duration>,
}

impl SSHConfig {
    pub fn password<U: Into<String>, P: Into<String>, H: Into<String>>(
        username: U,
        password: P,
        host: H,
        port: u16,
    ) -> crate::Result<Self> {
        Self::new(username.into(), Auth::Password(password.into()), host.into(), port)
    }

    pub fn key<U: Into<String>, K: Into<String>, H: Into<String>>(
        username: U,
        private_key: K,
        host: H,
        port: u16,
    ) -> crate::Result<Self> {
        Self::new(username.into(), Auth::PrivateKey(private_key.into()), host.into(), port)
    }

    fn new(username: String, auth: Auth, host: String, port: u16) -> crate::Result<Self> {
        if host.trim().is_empty() {
            return Err(crate::Error::ConfigError("SSH host name is empty".to_string()));
        }
        if username.trim().is_empty() {
            return Err(crate::Error::ConfigError("SSH username is empty".to_string()));
        }
        if port == 0 {
            return Err(crate::Error::ConfigError("SSH port must not be 0".to_string()));
        }

        Ok(SSHConfig {
            host,
            port,
            username,
            auth,
            host_key: None,
            inactivity_timeout: None,
        })
    }

    /// Only accept a server presenting this key (base64 OpenSSH public key,
    /// with or without the algorithm prefix).
    pub fn with_host_key(mut self, key: &str) -> crate::Result<Self> {
        let encoded = key.split_whitespace().find(|part| part.starts_with("AAAA"));
        let parsed = encoded
            .ok_or_else(|| crate::Error::ConfigError("Host key is not base64 encoded".into()))
            .and_then(|k| {
                parse_public_key_base64(k)
                    .map_err(|e| crate::Error::ConfigError(format!("Invalid host key: {}", e)))
            })?;
        self.host_key = Some(parsed);
        Ok(self)
    }

    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = Some(timeout);
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for SSHConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SSHConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("auth", &self.auth.method())
            .field("host_key_pinned", &self.host_key.is_some())
            .field("inactivity_timeout", &self.inactivity_timeout)
            .finish()
    }
}

pub struct SSHSession {
    session: client::Handle<Handler>,
    closed: bool,
}

impl SSHSession {
    fn ensure_ready(&self) -> crate::Result<()> {
        if self.closed {
            return Err(crate::Error::ProtocolError("Session is closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Session for SSHSession {
    async fn disconnect(&mut self) -> crate::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        info!("Disconnecting");
        self.session
            .disconnect(Disconnect::ByApplication, "", "English")
            .await?;
        info!("Disconnected");
        Ok(())
    }

    /// Execute a command on the remote host
    async fn exec(&mut self, cmd: &Command) -> crate::Result<CommandOutput> {
        self.ensure_ready()?;

        let mut channel = self.session.channel_open_session().await.map_err(|e| {
            crate::Error::ProtocolError(format!("Failed to open exec channel: {}", e))
        })?;

        let command: Vec<u8> = cmd.into();
        channel.exec(true, command).await.map_err(|e| {
            crate::Error::ProtocolError(format!("Failed to start command: {}", e))
        })?;

        let mut output = CommandOutput::default();

        // Exit status may arrive before the last data packet, so drain until close.
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => {
                    debug!("(SSH-STDOUT) {}", String::from_utf8_lossy(data).trim_end());
                    output.stdout.extend_from_slice(data);
                }
                ChannelMsg::ExtendedData { ref data, ext: 1 } => {
                    debug!("(SSH-STDERR) {}", String::from_utf8_lossy(data).trim_end());
                    output.stderr.extend_from_slice(data);
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    output.exit_code = Some(exit_status);
                }
                ChannelMsg::ExitSignal { signal_name, .. } => {
                    output.signal = Some(signal_to_string(signal_name));
                }
                _ => {}
            }
        }

        Ok(output)
    }

    async fn transfer_file(
        &mut self,
        file_contents: Arc<Vec<u8>>,
        remote_dest: &str,
    ) -> crate::Result<()> {
        self.ensure_ready()?;

        let channel = self.session.channel_open_session().await.map_err(|e| {
            crate::Error::TransferError(format!("Failed to open SFTP channel: {}", e))
        })?;

        // Request SFTP subsystem
        channel.request_subsystem(true, "sftp").await.map_err(|e| {
            crate::Error::TransferError(format!("Failed to request SFTP subsystem: {}", e))
        })?;

        let sftp = SftpSession::new(channel.into_stream()).await.map_err(|e| {
            crate::Error::TransferError(format!("Failed to create SFTP session: {}", e))
        })?;

        // Parent directories are not created; the destination must be writable as-is.
        let mut remote_file = sftp.create(remote_dest).await.map_err(|e| {
            crate::Error::TransferError(format!(
                "Failed to create remote file {}: {}",
                remote_dest, e
            ))
        })?;

        remote_file.write_all(&file_contents).await.map_err(|e| {
            crate::Error::TransferError(format!("Failed to write to remote file: {}", e))
        })?;

        remote_file.shutdown().await.map_err(|e| {
            crate::Error::TransferError(format!("Failed to close remote file: {}", e))
        })?;

        debug!("File uploaded to {}", remote_dest);
        Ok(())
    }
}

#[async_trait]
impl Config for SSHConfig {
    type SessionType = SSHSession;

    /// Create a new SSH session
    async fn create_session(&self) -> crate::Result<Self::SessionType> {
        let credential = self.auth.prepare()?;

        info!(
            "Connecting to {}:{} as {}",
            self.host, self.port, self.username
        );
        let mut session = get_handle(
            (self.host.as_str(), self.port),
            self.inactivity_timeout,
            self.host_key.clone(),
        )
        .await?;

        let authenticated = match credential {
            Credential::Password(password) => session
                .authenticate_password(&self.username, password)
                .await?
                .success(),
            Credential::Key(key_pair) => {
                let hash_alg = session.best_supported_rsa_hash().await?.flatten();
                session
                    .authenticate_publickey(
                        &self.username,
                        PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg),
                    )
                    .await?
                    .success()
            }
        };

        if !authenticated {
            warn!("Authentication rejected for {}", self.username);
            let _ = session
                .disconnect(Disconnect::ByApplication, "", "English")
                .await;
            return Err(crate::Error::ConnectionError(format!(
                "Failed to authenticate with {}",
                self.auth.method()
            )));
        }

        info!("Connection ready");
        Ok(SSHSession {
            session,
            closed: false,
        })
    }
}

/// Get a handle to the SSH session
async fn get_handle<S: tokio::net::ToSocketAddrs>(
    socket: S,
    timeout: Option<Duration>,
    host_key: Option<PublicKey>,
) -> crate::Result<client::Handle<Handler>> {
    let config = client::Config {
        inactivity_timeout: timeout,
        ..Default::default()
    };

    let config = Arc::new(config);

    let sh = Handler { host_key };

    let handle = client::connect(config, socket, sh).await?;

    Ok(handle)
}

fn signal_to_string(sig: Sig) -> String {
    match sig {
        Sig::Custom(name) => name,
        other => format!("{:?}", other),
    }
}

struct Handler {
    host_key: Option<PublicKey>,
}

impl client::Handler for Handler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        match &self.host_key {
            Some(expected) => {
                let matches = expected.key_data() == server_public_key.key_data();
                if !matches {
                    warn!("Server host key does not match the pinned key");
                }
                Ok(matches)
            }
            None => Ok(true),
        }
    }
}
