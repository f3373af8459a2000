//! JSON boundary for the probe types.
//!
//! The HTTP layer that fronts this crate speaks JSON; these routines
//! translate inbound request objects into parameter sets and probe
//! outcomes into response objects.  No HTTP lives here.

use super::client::{SearchResponse, WriteResponse};
use super::params::{
    AddParams, ConnectParams, DeleteParams, ModifyOp, ModifyParams, Scope, SearchParams,
};
use json::JsonValue;
use std::error;
use std::fmt;
use std::time::Duration;

/// Errors related specifically to probe <=> JSON routines.
#[derive(Debug)]
pub enum ProbeJsonError {
    /// Data does not contain the required content, e.g. a host.
    RequestFormatError(String),
}

impl error::Error for ProbeJsonError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        None
    }
}

impl fmt::Display for ProbeJsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeJsonError::RequestFormatError(s) => {
                write!(f, "probe request could not be read from JSON: {s}")
            }
        }
    }
}

impl ConnectParams {
    /// Build connection parameters from a request object.
    ///
    /// ```
    /// use ldap_probe::ConnectParams;
    /// use json;
    ///
    /// let req = json::object! {
    ///     "host": "ldap.example.com",
    ///     "port": 10389,
    ///     "bindDn": "cn=admin,dc=example,dc=com",
    ///     "password": "secret"
    /// };
    ///
    /// let params = ConnectParams::from_json_value(&req).unwrap();
    /// assert_eq!(params.port(), 10389);
    /// ```
    pub fn from_json_value(value: &JsonValue) -> Result<ConnectParams, ProbeJsonError> {
        let host = match value["host"].as_str() {
            Some(h) if !h.is_empty() => h,
            _ => {
                return Err(ProbeJsonError::RequestFormatError(
                    "'host' is required".to_string(),
                ))
            }
        };

        let mut params = ConnectParams::new(host);

        if let Some(port) = value["port"].as_u16() {
            params.set_port(port);
        }
        if let Some(dn) = value["bindDn"].as_str() {
            params.set_bind_dn(dn);
        }
        if let Some(pw) = value["password"].as_str() {
            params.set_password(pw);
        }
        if let Some(ms) = value["timeout"].as_u64() {
            params.set_timeout(Duration::from_millis(ms));
        }

        Ok(params)
    }
}

impl SearchParams {
    pub fn from_json_value(value: &JsonValue) -> Result<SearchParams, ProbeJsonError> {
        let base_dn = value["baseDn"].as_str().unwrap_or("");
        let filter = value["filter"].as_str().unwrap_or("(objectClass=*)");

        let mut params = SearchParams::new(base_dn, filter);

        if let Some(scope) = value["scope"].as_i64() {
            let scope = Scope::from_number(scope).map_err(|e| {
                ProbeJsonError::RequestFormatError(e.to_string())
            })?;
            params.set_scope(scope);
        }

        if value["attributes"].is_array() {
            let attrs: Vec<&str> = value["attributes"]
                .members()
                .filter_map(|a| a.as_str())
                .collect();
            params.set_attributes(&attrs);
        }

        if let Some(limit) = value["sizeLimit"].as_i64() {
            params.set_size_limit(limit);
        }
        if let Some(size) = value["pageSize"].as_i64() {
            params.set_page_size(size);
        }
        if let Some(cookie) = value["cookie"].as_str() {
            params.set_cookie(cookie);
        }

        Ok(params)
    }
}

impl AddParams {
    /// Attribute values may be a string or an array of strings.
    pub fn from_json_value(value: &JsonValue) -> Result<AddParams, ProbeJsonError> {
        let dn = require_dn(value)?;
        let mut params = AddParams::new(dn);

        for (name, val) in value["attributes"].entries() {
            if val.is_array() {
                for v in val.members() {
                    params.add_value(name, &stringify(v));
                }
            } else {
                params.add_value(name, &stringify(val));
            }
        }

        Ok(params)
    }
}

impl ModifyParams {
    pub fn from_json_value(value: &JsonValue) -> Result<ModifyParams, ProbeJsonError> {
        let dn = require_dn(value)?;
        let mut params = ModifyParams::new(dn);

        for change in value["changes"].members() {
            let op_name = change["operation"].as_str().unwrap_or("");
            let op = ModifyOp::from_name(op_name).map_err(|e| {
                ProbeJsonError::RequestFormatError(e.to_string())
            })?;

            let attribute = match change["attribute"].as_str() {
                Some(a) if !a.is_empty() => a,
                _ => {
                    return Err(ProbeJsonError::RequestFormatError(
                        "change without an attribute".to_string(),
                    ))
                }
            };

            let values: Vec<String> =
                change["values"].members().map(stringify).collect();
            let value_refs: Vec<&str> = values.iter().map(|v| v.as_str()).collect();

            params.add_change(op, attribute, &value_refs);
        }

        Ok(params)
    }
}

impl DeleteParams {
    pub fn from_json_value(value: &JsonValue) -> Result<DeleteParams, ProbeJsonError> {
        Ok(DeleteParams::new(require_dn(value)?))
    }
}

impl SearchResponse {
    /// Translate a search outcome into the response object shape.
    pub fn to_json_value(&self) -> JsonValue {
        let entries: Vec<JsonValue> = self
            .entries
            .iter()
            .map(|e| {
                let attrs: Vec<JsonValue> = e
                    .attributes
                    .iter()
                    .map(|(name, values)| {
                        json::object! {
                            "type": name.as_str(),
                            "values": values.clone()
                        }
                    })
                    .collect();

                json::object! { "dn": e.dn.as_str(), "attributes": attrs }
            })
            .collect();

        json::object! {
            "success": self.success(),
            "resultCode": self.result.code,
            "message": self.result.message(),
            "entries": entries,
            "cookie": self.cookie.as_str(),
            "hasMore": self.has_more,
            "rtt": self.rtt_ms
        }
    }
}

impl WriteResponse {
    pub fn to_json_value(&self) -> JsonValue {
        json::object! {
            "success": self.success(),
            "resultCode": self.result.code,
            "message": self.result.message(),
            "dn": self.dn.as_str(),
            "rtt": self.rtt_ms
        }
    }
}

fn require_dn(value: &JsonValue) -> Result<&str, ProbeJsonError> {
    match value["dn"].as_str() {
        Some(dn) if !dn.is_empty() => Ok(dn),
        _ => Err(ProbeJsonError::RequestFormatError(
            "'dn' is required".to_string(),
        )),
    }
}

fn stringify(value: &JsonValue) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.dump(),
    }
}
