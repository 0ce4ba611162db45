//! RouterOS API client: login and the account command surface.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::addr::DeviceAddress;
use crate::commander::{AccountCounts, Confirmation, DeviceCommander};
use crate::config::DeviceConfig;
use crate::error::{DeviceError, DeviceResult};
use crate::proto::{
    ReplySentence, attribute_word, classify_sentence, query_word, read_sentence, write_sentence,
};
use crate::transport::{Connection, DeviceTransport, TcpTransport};

/// Trap message RouterOS emits when removing something that is gone.
/// Matched on substring so delete stays idempotent across versions.
const NO_SUCH_ITEM: &str = "no such item";

/// RouterOS API client.
///
/// Stateless between calls: each operation dials the device, logs in
/// with the configured service account, runs its commands, and drops
/// the connection. Holding router sessions open across lifecycle
/// operations is not worth the reconnect-on-idle-drop complexity at
/// this call volume.
#[derive(Clone)]
pub struct RouterOsClient {
    transport: Arc<dyn DeviceTransport>,
    config: Arc<DeviceConfig>,
}

impl RouterOsClient {
    /// Client over plain TCP with the config's connect timeout.
    pub fn new(config: DeviceConfig) -> Self {
        let transport = Arc::new(TcpTransport::new(config.connect_timeout));
        Self::with_transport(config, transport)
    }

    /// Client over a caller-supplied transport (TLS wrapper, test
    /// harness, ...).
    pub fn with_transport(config: DeviceConfig, transport: Arc<dyn DeviceTransport>) -> Self {
        Self {
            transport,
            config: Arc::new(config),
        }
    }

    /// Dial and authenticate, returning a ready session.
    async fn open_session(&self, device: &DeviceAddress) -> DeviceResult<Session> {
        let conn = self.transport.dial(device).await?;
        let mut session = Session {
            conn,
            device: device.clone(),
            command_timeout: self.config.command_timeout,
        };
        session
            .login(&self.config.service_user, &self.config.service_password)
            .await?;
        Ok(session)
    }
}

#[async_trait]
impl DeviceCommander for RouterOsClient {
    async fn create_account(
        &self,
        device: &DeviceAddress,
        username: &str,
        group: &str,
        password: &SecretString,
        comment: &str,
    ) -> DeviceResult<Confirmation> {
        let mut session = self.open_session(device).await?;
        session
            .command(
                "/user/add",
                vec![
                    attribute_word("name", username),
                    attribute_word("password", password.expose_secret()),
                    attribute_word("group", group),
                    attribute_word("comment", comment),
                ],
                "/user/add",
            )
            .await?;
        info!(device = %device, username, group, "created account");
        Ok(Confirmation {
            device: device.clone(),
            username: username.to_string(),
        })
    }

    async fn delete_account(
        &self,
        device: &DeviceAddress,
        username: &str,
    ) -> DeviceResult<Confirmation> {
        let mut session = self.open_session(device).await?;
        let result = session
            .command(
                "/user/remove",
                vec![attribute_word("numbers", username)],
                "/user/remove",
            )
            .await;
        match result {
            Ok(_) => {
                info!(device = %device, username, "removed account");
            }
            // Already gone counts as removed; that is what makes
            // delete retries safe after indeterminate outcomes.
            Err(DeviceError::Command { message, .. })
                if message.to_lowercase().contains(NO_SUCH_ITEM) =>
            {
                debug!(device = %device, username, "account already absent");
            }
            Err(e) => return Err(e),
        }
        Ok(Confirmation {
            device: device.clone(),
            username: username.to_string(),
        })
    }

    async fn account_exists(&self, device: &DeviceAddress, username: &str) -> DeviceResult<bool> {
        let mut session = self.open_session(device).await?;
        let rows = session
            .command(
                "/user/print",
                vec![
                    attribute_word(".proplist", "name"),
                    query_word("name", username),
                ],
                "/user/print",
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn check_reachable(&self, device: &DeviceAddress) -> DeviceResult<bool> {
        match self.transport.dial(device).await {
            Ok(_) => Ok(true),
            Err(DeviceError::Unreachable { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn fetch_identity(&self, device: &DeviceAddress) -> DeviceResult<Option<String>> {
        let mut session = self.open_session(device).await?;
        let rows = session
            .command(
                "/system/identity/print",
                vec![attribute_word(".proplist", "name")],
                "/system/identity/print",
            )
            .await?;
        Ok(rows.into_iter().next().and_then(|row| row.get("name").cloned()))
    }

    async fn count_accounts(&self, device: &DeviceAddress) -> DeviceResult<AccountCounts> {
        let mut session = self.open_session(device).await?;
        let rows = session
            .command("/user/print", Vec::new(), "/user/print")
            .await?;
        let marker = self.config.comment_marker.to_lowercase();
        let mut counts = AccountCounts::default();
        for row in &rows {
            if matches!(row.get("disabled").map(String::as_str), Some("true" | "yes")) {
                continue;
            }
            counts.total += 1;
            if row
                .get("comment")
                .is_some_and(|c| c.to_lowercase().contains(&marker))
            {
                counts.temporary += 1;
            }
        }
        Ok(counts)
    }
}

/// One authenticated connection to one device.
struct Session {
    conn: Box<dyn Connection>,
    device: DeviceAddress,
    command_timeout: Duration,
}

impl Session {
    /// Plain `/login` (RouterOS 6.43+). Pre-6.43 challenge login is not
    /// supported; a challenge reply is reported as an auth failure.
    async fn login(&mut self, user: &str, password: &SecretString) -> DeviceResult<()> {
        let words = vec![
            "/login".to_string(),
            attribute_word("name", user),
            attribute_word("password", password.expose_secret()),
        ];
        let reply = self.exchange(words, "/login").await;
        match reply {
            Ok(done_attrs) => {
                if done_attrs.done.contains_key("ret") {
                    // Old API answered with an MD5 challenge instead of
                    // accepting the plain login.
                    warn!(device = %self.device, "device requested pre-6.43 challenge login");
                    return Err(DeviceError::Auth {
                        device: self.device.to_string(),
                    });
                }
                debug!(device = %self.device, user, "login accepted");
                Ok(())
            }
            Err(DeviceError::Command { .. }) => Err(DeviceError::Auth {
                device: self.device.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    /// Run one command and collect its `!re` rows.
    async fn command(
        &mut self,
        command: &str,
        args: Vec<String>,
        operation: &'static str,
    ) -> DeviceResult<Vec<HashMap<String, String>>> {
        let mut words = Vec::with_capacity(args.len() + 1);
        words.push(command.to_string());
        words.extend(args);
        let reply = self.exchange(words, operation).await?;
        Ok(reply.rows)
    }

    /// Send one sentence and read the full reply, under the command
    /// timeout. A timeout here is indeterminate by definition: the
    /// sentence may already have reached the device.
    async fn exchange(
        &mut self,
        words: Vec<String>,
        operation: &'static str,
    ) -> DeviceResult<Reply> {
        tokio::time::timeout(self.command_timeout, self.exchange_inner(words))
            .await
            .map_err(|_| DeviceError::Timeout {
                device: self.device.to_string(),
                operation,
            })?
    }

    async fn exchange_inner(&mut self, words: Vec<String>) -> DeviceResult<Reply> {
        write_sentence(&mut self.conn, &words)
            .await
            .map_err(|e| self.protocol_error(format!("write failed: {e}")))?;

        let mut rows = Vec::new();
        let mut trap: Option<String> = None;
        loop {
            let sentence = read_sentence(&mut self.conn)
                .await
                .map_err(|e| self.protocol_error(format!("read failed: {e}")))?;
            if sentence.is_empty() {
                continue;
            }
            match classify_sentence(&sentence) {
                Some(ReplySentence::Data(attrs)) => rows.push(attrs),
                Some(ReplySentence::Done(done)) => {
                    // `!trap` is followed by `!done`; surface the trap.
                    if let Some(message) = trap {
                        return Err(DeviceError::Command {
                            device: self.device.to_string(),
                            message,
                        });
                    }
                    return Ok(Reply { rows, done });
                }
                Some(ReplySentence::Trap { message, fatal }) => {
                    if fatal {
                        // The connection is dead after !fatal; no !done
                        // will follow and remote state is unknown.
                        return Err(self.protocol_error(format!("fatal: {message}")));
                    }
                    trap = Some(message);
                }
                None => {
                    debug!(device = %self.device, word = %sentence[0], "skipping unknown control word");
                }
            }
        }
    }

    fn protocol_error(&self, detail: String) -> DeviceError {
        DeviceError::Protocol {
            device: self.device.to_string(),
            detail,
        }
    }
}

/// Parsed command reply: data rows plus the `!done` attributes.
struct Reply {
    rows: Vec<HashMap<String, String>>,
    done: HashMap<String, String>,
}
