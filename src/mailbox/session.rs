//! IMAP implementation of [`Mailbox`].
//!
//! Each [`poll_wait`](Mailbox::poll_wait) runs one IDLE exchange bounded by
//! the poll timeout and ends it with DONE before returning, so the session
//! never holds an IDLE across calls. Changes the server reports between
//! those exchanges land in the session's unsolicited-response queue and are
//! picked up by the next poll.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use imap::extensions::idle::WaitOutcome;
use imap::types::UnsolicitedResponse;
use native_tls::{TlsConnector, TlsStream};
use tracing::{debug, info, warn};

use super::{FetchedMessage, Mailbox, MessageId, NotificationFilter, WaitSignal};
use crate::config::MailConfig;
use crate::error::{Result, Rr2OpmlError};

type Session = imap::Session<TlsStream<TcpStream>>;

/// A logged-in IMAP session with the notification folder selected.
pub struct ImapMailbox {
    session: Session,
    /// Second handle on the TCP socket, used to restore the read timeout
    /// after each IDLE (the IDLE handle resets it).
    socket: TcpStream,
    timeout: Duration,
    waiting: bool,
}

impl ImapMailbox {
    /// Connect over implicit TLS, log in, and select the configured folder.
    ///
    /// Every failure here is fatal to startup: there is no retry loop around
    /// the initial login.
    pub fn connect(mail: &MailConfig) -> Result<Self> {
        let timeout = mail.timeout();
        let connect_error = |reason: String| Rr2OpmlError::Connect {
            host: mail.host.clone(),
            reason,
        };

        debug!(host = %mail.host, port = mail.port, "Connecting");
        let tcp = connect_tcp(&mail.host, mail.port, timeout).map_err(|e| connect_error(e.to_string()))?;
        tcp.set_read_timeout(Some(timeout))
            .and_then(|()| tcp.set_write_timeout(Some(timeout)))
            .map_err(|e| connect_error(e.to_string()))?;
        let socket = tcp.try_clone().map_err(|e| connect_error(e.to_string()))?;

        let tls = TlsConnector::new().map_err(|e| connect_error(e.to_string()))?;
        let stream = tls
            .connect(&mail.host, tcp)
            .map_err(|e| connect_error(e.to_string()))?;

        let mut client = imap::Client::new(stream);
        client
            .read_greeting()
            .map_err(|e| connect_error(e.to_string()))?;

        debug!(user = %mail.username, "Logging in");
        let mut session = client
            .login(&mail.username, &mail.password)
            .map_err(|(source, _client)| Rr2OpmlError::Login {
                user: mail.username.clone(),
                source,
            })?;

        let folder = session
            .select(&mail.folder)
            .map_err(|source| Rr2OpmlError::Login {
                user: mail.username.clone(),
                source,
            })?;
        info!(
            host = %mail.host,
            folder = %mail.folder,
            exists = folder.exists,
            "Mailbox selected"
        );

        Ok(Self {
            session,
            socket,
            timeout,
            waiting: false,
        })
    }

    /// End the session politely. Errors are logged, not returned.
    pub fn logout(mut self) {
        if let Err(e) = self.session.logout() {
            warn!(error = %e, "Logout failed");
        }
    }

    /// Empty the unsolicited-response queue; true if it reported new mail.
    fn drain_unsolicited(&mut self) -> bool {
        let mut changed = false;
        while let Ok(response) = self.session.unsolicited_responses.try_recv() {
            match response {
                UnsolicitedResponse::Exists(n) | UnsolicitedResponse::Recent(n) => {
                    debug!(count = n, "Folder size changed");
                    changed = true;
                }
                other => debug!(response = ?other, "Ignoring unsolicited response"),
            }
        }
        changed
    }
}

impl Mailbox for ImapMailbox {
    fn search(&mut self, filter: &NotificationFilter) -> Result<Vec<MessageId>> {
        let mut ids: Vec<MessageId> = self
            .session
            .search(filter.to_search_query())?
            .into_iter()
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn fetch(&mut self, ids: &[MessageId]) -> Result<Vec<FetchedMessage>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let set = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let fetches = self.session.fetch(&set, "RFC822")?;
        let mut messages = Vec::with_capacity(fetches.len());
        for fetch in fetches.iter() {
            match fetch.body() {
                Some(raw) => messages.push(FetchedMessage {
                    id: fetch.message,
                    raw: raw.to_vec(),
                }),
                None => warn!(id = fetch.message, "Fetch returned no message body"),
            }
        }
        Ok(messages)
    }

    fn begin_wait(&mut self) -> Result<()> {
        // Anything queued before arming belongs to the previous cycle.
        if self.drain_unsolicited() {
            debug!("Discarding changes reported before the wait was armed");
        }
        self.waiting = true;
        Ok(())
    }

    fn poll_wait(&mut self, timeout: Duration) -> Result<WaitSignal> {
        if !self.waiting {
            return Ok(WaitSignal::Quiet);
        }
        if self.drain_unsolicited() {
            return Ok(WaitSignal::Changed);
        }

        let outcome = self.session.idle()?.wait_with_timeout(timeout);
        // The IDLE handle clears the socket read timeout before sending DONE,
        // so the DONE reply is read without one. Restore it for what follows.
        if let Err(e) = self.socket.set_read_timeout(Some(self.timeout)) {
            warn!(error = %e, "Could not restore socket read timeout");
        }

        match outcome? {
            WaitOutcome::MailboxChanged => Ok(WaitSignal::Changed),
            WaitOutcome::TimedOut => Ok(WaitSignal::Quiet),
        }
    }

    fn end_wait(&mut self) -> Result<()> {
        self.waiting = false;
        Ok(())
    }
}

/// Open a TCP connection, trying every resolved address with a timeout.
fn connect_tcp(host: &str, port: u16, timeout: Duration) -> std::io::Result<TcpStream> {
    let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    let mut last_error = None;
    for addr in &addrs {
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(%addr, error = %e, "Connect attempt failed");
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no addresses found for {host}"),
        )
    }))
}
