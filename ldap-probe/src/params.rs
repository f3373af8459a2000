//! Per-request parameter sets.
//!
//! Each probe request carries its own parameters; nothing is shared
//! or cached between requests.

use super::error::Error;
use super::spec;
use std::time::Duration;

/// Search scope per RFC 4511.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scope {
    Base = 0,
    One = 1,
    Sub = 2,
}

impl Scope {
    pub fn from_number(n: i64) -> Result<Self, Error> {
        match n {
            0 => Ok(Scope::Base),
            1 => Ok(Scope::One),
            2 => Ok(Scope::Sub),
            _ => Err(Error::RequestFormatError(format!(
                "invalid search scope: {n}"
            ))),
        }
    }
}

/// Modify change type per RFC 4511.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModifyOp {
    Add,
    Delete,
    Replace,
}

impl ModifyOp {
    pub fn from_name(name: &str) -> Result<Self, Error> {
        match name {
            "add" => Ok(ModifyOp::Add),
            "delete" => Ok(ModifyOp::Delete),
            "replace" => Ok(ModifyOp::Replace),
            _ => Err(Error::RequestFormatError(format!(
                "invalid modify operation: {name}"
            ))),
        }
    }
}

/// One attribute change within a ModifyRequest.
#[derive(Debug, Clone)]
pub struct ModifyChange {
    pub operation: ModifyOp,
    pub attribute: String,
    pub values: Vec<String>,
}

/// Where and how to connect and bind.
///
/// Empty bind DN and password produce an anonymous simple bind.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    host: String,
    port: u16,
    bind_dn: String,
    password: String,
    timeout: Duration,
}

impl ConnectParams {
    pub fn new(host: &str) -> Self {
        ConnectParams {
            host: host.to_string(),
            port: spec::DEFAULT_PORT,
            bind_dn: String::new(),
            password: String::new(),
            timeout: Duration::from_secs(spec::DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }
    pub fn port(&self) -> u16 {
        self.port
    }
    pub fn bind_dn(&self) -> &str {
        &self.bind_dn
    }
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Caller timeout clamped to the implementation maximum.
    pub fn timeout(&self) -> Duration {
        self.timeout
            .min(Duration::from_secs(spec::MAX_TIMEOUT_SECS))
    }

    pub fn set_port(&mut self, port: u16) -> &mut Self {
        self.port = port;
        self
    }
    pub fn set_bind_dn(&mut self, dn: &str) -> &mut Self {
        self.bind_dn = dn.to_string();
        self
    }
    pub fn set_password(&mut self, password: &str) -> &mut Self {
        self.password = password.to_string();
        self
    }
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = timeout;
        self
    }
}

/// Parameters for one Search operation.
#[derive(Debug, Clone)]
pub struct SearchParams {
    base_dn: String,
    filter: String,
    scope: Scope,
    attributes: Vec<String>,
    size_limit: i64,
    page_size: i64,
    /// Hex-encoded paging cookie from the previous response.
    cookie: String,
}

impl SearchParams {
    pub fn new(base_dn: &str, filter: &str) -> Self {
        SearchParams {
            base_dn: base_dn.to_string(),
            filter: filter.to_string(),
            scope: Scope::Sub,
            attributes: Vec::new(),
            size_limit: 0,
            page_size: 0,
            cookie: String::new(),
        }
    }

    pub fn base_dn(&self) -> &str {
        &self.base_dn
    }
    pub fn filter(&self) -> &str {
        &self.filter
    }
    pub fn scope(&self) -> Scope {
        self.scope
    }
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }
    pub fn size_limit(&self) -> i64 {
        self.size_limit
    }
    pub fn page_size(&self) -> i64 {
        self.page_size
    }
    pub fn cookie(&self) -> &str {
        &self.cookie
    }

    pub fn set_scope(&mut self, scope: Scope) -> &mut Self {
        self.scope = scope;
        self
    }
    pub fn set_attributes(&mut self, attributes: &[&str]) -> &mut Self {
        self.attributes = attributes.iter().map(|a| a.to_string()).collect();
        self
    }
    pub fn set_size_limit(&mut self, limit: i64) -> &mut Self {
        self.size_limit = limit;
        self
    }
    pub fn set_page_size(&mut self, size: i64) -> &mut Self {
        self.page_size = size;
        self
    }
    /// Echo the cookie hex string from the previous page verbatim.
    pub fn set_cookie(&mut self, cookie: &str) -> &mut Self {
        self.cookie = cookie.to_string();
        self
    }
}

/// Parameters for one Add operation.
///
/// Attribute order is preserved on the wire.
#[derive(Debug, Clone)]
pub struct AddParams {
    dn: String,
    attributes: Vec<(String, Vec<String>)>,
}

impl AddParams {
    pub fn new(dn: &str) -> Self {
        AddParams {
            dn: dn.to_string(),
            attributes: Vec::new(),
        }
    }

    pub fn dn(&self) -> &str {
        &self.dn
    }
    pub fn attributes(&self) -> &[(String, Vec<String>)] {
        &self.attributes
    }

    pub fn add_value(&mut self, attribute: &str, value: &str) -> &mut Self {
        if let Some((_, values)) = self.attributes.iter_mut().find(|(a, _)| a == attribute) {
            values.push(value.to_string());
        } else {
            self.attributes
                .push((attribute.to_string(), vec![value.to_string()]));
        }
        self
    }
}

/// Parameters for one Delete operation.
#[derive(Debug, Clone)]
pub struct DeleteParams {
    dn: String,
}

impl DeleteParams {
    pub fn new(dn: &str) -> Self {
        DeleteParams { dn: dn.to_string() }
    }

    pub fn dn(&self) -> &str {
        &self.dn
    }
}

/// Parameters for one Modify operation.
#[derive(Debug, Clone)]
pub struct ModifyParams {
    dn: String,
    changes: Vec<ModifyChange>,
}

impl ModifyParams {
    pub fn new(dn: &str) -> Self {
        ModifyParams {
            dn: dn.to_string(),
            changes: Vec::new(),
        }
    }

    pub fn dn(&self) -> &str {
        &self.dn
    }
    pub fn changes(&self) -> &[ModifyChange] {
        &self.changes
    }

    pub fn add_change(&mut self, operation: ModifyOp, attribute: &str, values: &[&str]) -> &mut Self {
        self.changes.push(ModifyChange {
            operation,
            attribute: attribute.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        });
        self
    }
}
