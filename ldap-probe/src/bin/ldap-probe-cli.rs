use ldap_probe::*;
use std::env;
use std::time::Duration;

const HELP_TEXT: &str = r#"
Probe an LDAP server and print results to STDOUT.

Synopsis:

ldap-probe-cli --host ldap.example.com                \
    --bind-dn "cn=admin,dc=example,dc=com"            \
    --password secret                                 \
    --operation search                                \
    --base-dn "dc=example,dc=com"                     \
    --filter "(objectClass=*)"

Parameters:

    --host <hostname> (required)
    --port <port> [default=389]
    --bind-dn <dn>
        Empty means an anonymous bind.
    --password <password>
    --timeout <seconds>

    --operation <search|add|modify|delete> [default=search]

Search parameters:
    --base-dn <dn>
    --filter <filter>
        Presence "(attr=*)" and equality "(attr=value)" only.
    --scope <0|1|2> [default=2]
    --attribute <name> [Repeatable]
    --size-limit <count>
    --page-size <count>
        Page through the full result set with RFC 2696 paging.

Add/Modify/Delete parameters:
    --dn <dn>
    --value <attr=value> [Repeatable; add]
    --change <op:attr=value> [Repeatable; modify, op in add|replace|delete]
"#;

fn main() {
    let options = read_options();

    if options.opt_present("help") {
        println!("{HELP_TEXT}");
        return;
    }

    let host = match options.opt_str("host") {
        Some(h) => h,
        None => {
            eprintln!("--host is required");
            return;
        }
    };

    let mut connect = ConnectParams::new(&host);

    if let Some(port) = options.opt_str("port") {
        connect.set_port(port.parse::<u16>().expect("Valid Port"));
    }
    if let Some(dn) = options.opt_str("bind-dn") {
        connect.set_bind_dn(&dn);
    }
    if let Some(pw) = options.opt_str("password") {
        connect.set_password(&pw);
    }
    if let Some(secs) = options.opt_str("timeout") {
        connect.set_timeout(Duration::from_secs(
            secs.parse::<u64>().expect("Valid Timeout"),
        ));
    }

    let operation = options
        .opt_str("operation")
        .unwrap_or_else(|| "search".to_string());

    let outcome = match operation.as_str() {
        "search" => run_paged_search(&connect, &options),
        "add" => run_add_op(&connect, &options),
        "modify" => run_modify_op(&connect, &options),
        "delete" => run_delete_op(&connect, &options),
        other => {
            eprintln!("Unknown operation: {other}");
            return;
        }
    };

    if let Err(e) = outcome {
        eprintln!("Probe failed: {e}");
        std::process::exit(1);
    }
}

fn read_options() -> getopts::Matches {
    let args: Vec<String> = env::args().collect();

    let mut opts = getopts::Options::new();

    opts.optflag("h", "help", "");
    opts.optopt("", "host", "", "");
    opts.optopt("", "port", "", "");
    opts.optopt("", "bind-dn", "", "");
    opts.optopt("", "password", "", "");
    opts.optopt("", "timeout", "", "");
    opts.optopt("", "operation", "", "");
    opts.optopt("", "base-dn", "", "");
    opts.optopt("", "filter", "", "");
    opts.optopt("", "scope", "", "");
    opts.optmulti("", "attribute", "", "");
    opts.optopt("", "size-limit", "", "");
    opts.optopt("", "page-size", "", "");
    opts.optopt("", "dn", "", "");
    opts.optmulti("", "value", "", "");
    opts.optmulti("", "change", "", "");

    opts.parse(&args[1..]).expect("Valid Options")
}

fn run_paged_search(connect: &ConnectParams, options: &getopts::Matches) -> Result<(), Error> {
    let base_dn = options.opt_str("base-dn").unwrap_or_default();
    let filter = options
        .opt_str("filter")
        .unwrap_or_else(|| "(objectClass=*)".to_string());

    let mut params = SearchParams::new(&base_dn, &filter);

    if let Some(scope) = options.opt_str("scope") {
        params.set_scope(Scope::from_number(
            scope.parse::<i64>().expect("Valid Scope"),
        )?);
    }

    let attrs: Vec<String> = options.opt_strs("attribute");
    let attr_refs: Vec<&str> = attrs.iter().map(|a| a.as_str()).collect();
    params.set_attributes(&attr_refs);

    if let Some(limit) = options.opt_str("size-limit") {
        params.set_size_limit(limit.parse::<i64>().expect("Valid Size Limit"));
    }
    if let Some(size) = options.opt_str("page-size") {
        params.set_page_size(size.parse::<i64>().expect("Valid Page Size"));
    }

    let mut total = 0;

    loop {
        let resp = run_search(connect, &params, None)?;

        for entry in &resp.entries {
            println!("dn: {}", entry.dn);
            for (name, values) in &entry.attributes {
                for value in values {
                    println!("{name}: {value}");
                }
            }
            println!();
        }

        total += resp.entries.len();

        if !resp.has_more {
            println!(
                "# {} entries; code={} ({}); rtt={}ms",
                total,
                resp.result.code,
                resp.result.message(),
                resp.rtt_ms
            );
            return resp.result.require_success();
        }

        params.set_cookie(&resp.cookie);
    }
}

fn run_add_op(connect: &ConnectParams, options: &getopts::Matches) -> Result<(), Error> {
    let dn = options.opt_str("dn").expect("--dn Required");
    let mut params = AddParams::new(&dn);

    for pair in options.opt_strs("value") {
        let (attr, value) = pair.split_once('=').expect("Valid attr=value Pair");
        params.add_value(attr, value);
    }

    report(run_add(connect, &params, None)?)
}

fn run_modify_op(connect: &ConnectParams, options: &getopts::Matches) -> Result<(), Error> {
    let dn = options.opt_str("dn").expect("--dn Required");
    let mut params = ModifyParams::new(&dn);

    for change in options.opt_strs("change") {
        let (op, pair) = change.split_once(':').expect("Valid op:attr=value Change");
        let (attr, value) = pair.split_once('=').expect("Valid attr=value Pair");
        let op = ModifyOp::from_name(op)?;

        if value.is_empty() {
            params.add_change(op, attr, &[]);
        } else {
            params.add_change(op, attr, &[value]);
        }
    }

    report(run_modify(connect, &params, None)?)
}

fn run_delete_op(connect: &ConnectParams, options: &getopts::Matches) -> Result<(), Error> {
    let dn = options.opt_str("dn").expect("--dn Required");
    report(run_delete(connect, &DeleteParams::new(&dn), None)?)
}

fn report(resp: WriteResponse) -> Result<(), Error> {
    println!(
        "dn: {}\ncode={} ({}); rtt={}ms",
        resp.dn,
        resp.result.code,
        resp.result.message(),
        resp.rtt_ms
    );
    resp.result.require_success()
}
