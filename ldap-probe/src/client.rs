//! Session orchestration: Bind, one operation, best-effort Unbind.
//!
//! One Session per probe request, one socket per Session, one
//! operation per connection.  Message IDs run 1 (Bind), 2 (the
//! operation), 3 (Unbind); the connection never pipelines.

use super::connection::{Connection, Deadline, OriginGate};
use super::controls;
use super::error::Error;
use super::frame::FrameMode;
use super::message;
use super::params::{AddParams, ConnectParams, DeleteParams, ModifyParams, SearchParams};
use super::parse::{self, LdapResult, SearchEntry};
use super::spec;
use super::util;
use std::time::Instant;

/// Search operation outcome for the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse {
    pub result: LdapResult,
    pub entries: Vec<SearchEntry>,

    /// Hex-encoded paging cookie to echo on the next page request.
    pub cookie: String,

    /// True when the server reports more pages behind the cookie.
    pub has_more: bool,

    /// Milliseconds from connect to the final response frame.
    pub rtt_ms: u64,
}

impl SearchResponse {
    pub fn success(&self) -> bool {
        self.result.success()
    }
}

/// Add/Modify/Delete outcome: the server's LDAPResult plus the
/// echoed target DN.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteResponse {
    pub result: LdapResult,
    pub dn: String,
    pub rtt_ms: u64,
}

impl WriteResponse {
    pub fn success(&self) -> bool {
        self.result.success()
    }
}

/// An open, bound connection ready to run exactly one operation.
///
/// ```no_run
/// use ldap_probe::{ConnectParams, SearchParams, Session};
///
/// let mut connect = ConnectParams::new("ldap.example.com");
/// connect.set_bind_dn("cn=admin,dc=example,dc=com");
/// connect.set_password("secret");
///
/// let mut session = Session::start(&connect).expect("bind failed");
///
/// let search = SearchParams::new("dc=example,dc=com", "(objectClass=*)");
/// let resp = session.search(&search).expect("search failed");
/// session.finish();
///
/// println!("{} entries in {} ms", resp.entries.len(), resp.rtt_ms);
/// ```
#[derive(Debug)]
pub struct Session {
    conn: Connection,
    started: Instant,
    last_msg_id: i64,
    closed: bool,
}

impl Session {
    /// Connect and Bind without an origin gate.
    pub fn start(params: &ConnectParams) -> Result<Self, Error> {
        Self::start_gated(params, None)
    }

    /// Connect and Bind, consulting the origin gate first.
    ///
    /// A nonzero BindResponse closes the socket and returns
    /// BindFailed; the main operation is never attempted.
    pub fn start_gated(
        params: &ConnectParams,
        gate: Option<&dyn OriginGate>,
    ) -> Result<Self, Error> {
        if let Some(gate) = gate {
            if let Some(reason) = gate.refuse_reason(params.host(), params.port()) {
                log::info!("origin gate refused {}:{}", params.host(), params.port());
                return Err(Error::OriginRefused(reason));
            }
        }

        let deadline = Deadline::new(params.timeout());
        let started = Instant::now();
        let conn = Connection::connect(params.host(), params.port(), deadline)?;

        let mut session = Session {
            conn,
            started,
            last_msg_id: 0,
            closed: false,
        };

        let bind = message::build_bind(
            session.next_msg_id(),
            params.bind_dn(),
            params.password(),
        );

        let resp = session.exchange(&bind, FrameMode::Single)?;

        let result = match parse::parse_result(&resp, spec::TAG_BIND_RESPONSE) {
            Ok(r) => r,
            Err(e) => return Err(session.fail(e)),
        };

        if !result.success() {
            log::info!("{} bind failed: {}", session.conn.peer(), result.message());
            return Err(session.fail(Error::BindFailed {
                code: result.code,
                message: result.message(),
            }));
        }

        log::debug!("{} bound as '{}'", session.conn.peer(), params.bind_dn());

        Ok(session)
    }

    /// Run a Search, optionally paged.
    ///
    /// The filter is compiled before any bytes move; an unsupported
    /// filter never reaches the server.
    pub fn search(&mut self, params: &SearchParams) -> Result<SearchResponse, Error> {
        let filter = match message::compile_filter(params.filter()) {
            Ok(f) => f,
            Err(e) => return Err(self.fail(e)),
        };

        let cookie = match util::hex_decode(params.cookie()) {
            Ok(c) => c,
            Err(e) => return Err(self.fail(e)),
        };

        let controls = if params.page_size() > 0 {
            Some(controls::encode_paged_control(params.page_size(), &cookie))
        } else {
            None
        };

        let request = message::build_search(
            self.next_msg_id(),
            params.base_dn(),
            params.scope(),
            params.size_limit(),
            &filter,
            params.attributes(),
            controls.as_deref(),
        );

        let resp = self.exchange(&request, FrameMode::UntilSearchDone)?;

        let outcome = match parse::parse_search(&resp) {
            Ok(o) => o,
            Err(e) => return Err(self.fail(e)),
        };

        log::info!(
            "{} search '{}' at '{}': {} entries, code {}",
            self.conn.peer(),
            params.filter(),
            params.base_dn(),
            outcome.entries.len(),
            outcome.result.code,
        );

        Ok(SearchResponse {
            has_more: !outcome.cookie.is_empty(),
            cookie: util::hex_encode(&outcome.cookie),
            entries: outcome.entries,
            result: outcome.result,
            rtt_ms: self.rtt_ms(),
        })
    }

    /// Run an Add.
    pub fn add(&mut self, params: &AddParams) -> Result<WriteResponse, Error> {
        let request = message::build_add(self.next_msg_id(), params.dn(), params.attributes());
        self.write_op(&request, spec::TAG_ADD_RESPONSE, params.dn())
    }

    /// Run a Modify.
    pub fn modify(&mut self, params: &ModifyParams) -> Result<WriteResponse, Error> {
        let request = message::build_modify(self.next_msg_id(), params.dn(), params.changes());
        self.write_op(&request, spec::TAG_MODIFY_RESPONSE, params.dn())
    }

    /// Run a Delete.
    pub fn delete(&mut self, params: &DeleteParams) -> Result<WriteResponse, Error> {
        let request = message::build_delete(self.next_msg_id(), params.dn());
        self.write_op(&request, spec::TAG_DEL_RESPONSE, params.dn())
    }

    /// Best-effort Unbind, then close.
    ///
    /// Unbind has no response and its failure is advisory only; it
    /// never changes the outcome of the operation that preceded it.
    pub fn finish(mut self) {
        if self.closed {
            return;
        }

        let unbind = message::build_unbind(self.next_msg_id());
        if let Err(e) = self.conn.send(&unbind) {
            log::debug!("{} unbind failed (ignored): {e}", self.conn.peer());
        }

        self.conn.disconnect();
        self.closed = true;
    }

    fn write_op(
        &mut self,
        request: &[u8],
        expected_tag: u8,
        dn: &str,
    ) -> Result<WriteResponse, Error> {
        let resp = self.exchange(request, FrameMode::Single)?;

        let result = match parse::parse_result(&resp, expected_tag) {
            Ok(r) => r,
            Err(e) => return Err(self.fail(e)),
        };

        log::info!(
            "{} op 0x{expected_tag:02X} on '{dn}': code {}",
            self.conn.peer(),
            result.code,
        );

        Ok(WriteResponse {
            result,
            dn: dn.to_string(),
            rtt_ms: self.rtt_ms(),
        })
    }

    fn exchange(&mut self, request: &[u8], mode: FrameMode) -> Result<Vec<u8>, Error> {
        match self.conn.request(request, mode) {
            Ok(resp) => Ok(resp),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Close the socket exactly once and hand the error back.
    fn fail(&mut self, err: Error) -> Error {
        if !self.closed {
            self.conn.disconnect();
            self.closed = true;
        }
        err
    }

    fn next_msg_id(&mut self) -> i64 {
        self.last_msg_id += 1;
        self.last_msg_id
    }

    fn rtt_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

impl Drop for Session {
    /// Backstop for sessions abandoned without finish(); sockets must
    /// never outlive their request.
    fn drop(&mut self) {
        if !self.closed {
            self.conn.disconnect();
            self.closed = true;
        }
    }
}

/// Full probe lifecycle for one Search request.
pub fn run_search(
    connect: &ConnectParams,
    search: &SearchParams,
    gate: Option<&dyn OriginGate>,
) -> Result<SearchResponse, Error> {
    let mut session = Session::start_gated(connect, gate)?;
    let resp = session.search(search);
    session.finish();
    resp
}

/// Full probe lifecycle for one Add request.
pub fn run_add(
    connect: &ConnectParams,
    add: &AddParams,
    gate: Option<&dyn OriginGate>,
) -> Result<WriteResponse, Error> {
    let mut session = Session::start_gated(connect, gate)?;
    let resp = session.add(add);
    session.finish();
    resp
}

/// Full probe lifecycle for one Modify request.
pub fn run_modify(
    connect: &ConnectParams,
    modify: &ModifyParams,
    gate: Option<&dyn OriginGate>,
) -> Result<WriteResponse, Error> {
    let mut session = Session::start_gated(connect, gate)?;
    let resp = session.modify(modify);
    session.finish();
    resp
}

/// Full probe lifecycle for one Delete request.
pub fn run_delete(
    connect: &ConnectParams,
    delete: &DeleteParams,
    gate: Option<&dyn OriginGate>,
) -> Result<WriteResponse, Error> {
    let mut session = Session::start_gated(connect, gate)?;
    let resp = session.delete(delete);
    session.finish();
    resp
}
