//! uperf workload profiles
//!
//! A profile is an XML file describing thread groups, the transactions each
//! group runs and the flowops inside each transaction:
//!
//! ```xml
//! <profile name="iPERF">
//!   <group nthreads="$nthr">
//!     <transaction duration="30s">
//!       <flowop type="write" options="count=10 size=8k"/>
//!     </transaction>
//!   </group>
//! </profile>
//! ```
//!
//! `$NAME` tokens are resolved from the environment before the XML is decoded.

use super::error::{OptionFormatError, WorkloadError};
use crate::util::units::parse_duration;
use crate::Result;
use anyhow::Context;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Sentinel for a transaction attribute that was not specified
pub const UNSET: i64 = -1;

/// A decoded workload profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub groups: Vec<Group>,
}

/// Threads running the same list of transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub thread_count: u32,
    pub transactions: Vec<Transaction>,
}

/// Unit of work bounded by a duration or an iteration count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Whole seconds, or [`UNSET`]
    pub duration_seconds: i64,
    /// Iteration count, or [`UNSET`]
    pub iterations: i64,
    pub flowops: Vec<FlowOp>,
}

impl Transaction {
    pub fn duration(&self) -> Option<u64> {
        u64::try_from(self.duration_seconds).ok()
    }

    pub fn iterations_opt(&self) -> Option<u64> {
        u64::try_from(self.iterations).ok()
    }
}

/// One operation of a transaction, e.g. `connect`, `read` or `write`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowOp {
    #[serde(rename = "type")]
    pub kind: String,
    /// Space-separated `key=value` pairs, kept as written
    pub options: String,
}

impl FlowOp {
    pub fn parse_options(&self) -> std::result::Result<FlowOpOptions, OptionFormatError> {
        parse_flow_op_options(&self.options)
    }
}

/// Parsed flowop options
pub type FlowOpOptions = BTreeMap<String, String>;

/// Split a flowop `options` attribute into its `key=value` pairs
///
/// Each whitespace-separated token must contain exactly one `=`.
pub fn parse_flow_op_options(text: &str) -> std::result::Result<FlowOpOptions, OptionFormatError> {
    let mut options = FlowOpOptions::new();

    for token in text.split_whitespace() {
        let mut parts = token.split('=');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(value), None) => {
                options.insert(key.to_string(), value.to_string());
            }
            _ => {
                return Err(OptionFormatError {
                    token: token.to_string(),
                })
            }
        }
    }

    Ok(options)
}

/// `$` followed by an alphanumeric variable name
static ENV_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$[a-zA-Z0-9]+").expect("environment token pattern is valid"));

/// Replace `$NAME` tokens with values from the process environment
pub fn substitute_env(raw: &[u8]) -> std::result::Result<Cow<'_, [u8]>, WorkloadError> {
    substitute_env_with(raw, |name| std::env::var(name).ok())
}

/// Replace `$NAME` tokens with values from `lookup`
///
/// Every token must resolve, otherwise nothing is substituted and the error
/// names the missing variable with the longest name. Tokens are matched
/// greedily, so `$h2` is never read as `$h` followed by `2`, and substituted
/// values are not scanned again. Input without tokens is returned borrowed.
pub fn substitute_env_with<F>(
    raw: &[u8],
    lookup: F,
) -> std::result::Result<Cow<'_, [u8]>, WorkloadError>
where
    F: Fn(&str) -> Option<String>,
{
    let text = std::str::from_utf8(raw)?;

    let mut tokens: Vec<&str> = ENV_TOKEN
        .find_iter(text)
        .map(|m| m.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if tokens.is_empty() {
        return Ok(Cow::Borrowed(raw));
    }
    tokens.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut resolved = HashMap::with_capacity(tokens.len());
    for token in tokens {
        let name = &token[1..];
        let value = lookup(name).ok_or_else(|| WorkloadError::UndefinedVariable {
            name: name.to_string(),
        })?;
        resolved.insert(token, value);
    }

    let substituted = ENV_TOKEN.replace_all(text, |caps: &Captures| resolved[&caps[0]].clone());
    Ok(Cow::Owned(substituted.into_owned().into_bytes()))
}

// Mirror of the XML layout. Every attribute arrives as a string and is
// coerced into the typed profile afterwards.

#[derive(Debug, Deserialize)]
struct ProfileXml {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "group", default)]
    groups: Vec<GroupXml>,
}

#[derive(Debug, Deserialize)]
struct GroupXml {
    #[serde(rename = "@nthreads")]
    nthreads: String,
    #[serde(rename = "transaction", default)]
    transactions: Vec<TransactionXml>,
}

#[derive(Debug, Deserialize)]
struct TransactionXml {
    #[serde(rename = "@duration")]
    duration: Option<String>,
    #[serde(rename = "@iterations")]
    iterations: Option<String>,
    #[serde(rename = "flowop", default)]
    flowops: Vec<FlowOpXml>,
}

#[derive(Debug, Deserialize)]
struct FlowOpXml {
    #[serde(rename = "@type")]
    kind: String,
    #[serde(rename = "@options", default)]
    options: String,
}

fn invalid(attribute: &'static str, value: &str, reason: impl fmt::Display) -> WorkloadError {
    WorkloadError::InvalidAttribute {
        attribute,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn coerce_thread_count(value: &str) -> std::result::Result<u32, WorkloadError> {
    value.trim().parse::<u32>().map_err(|e| invalid("nthreads", value, e))
}

fn coerce_duration(value: Option<&str>) -> std::result::Result<i64, WorkloadError> {
    let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
        return Ok(UNSET);
    };

    let seconds = parse_duration(value).map_err(|e| invalid("duration", value, e))?;
    if seconds < 0.0 {
        return Err(invalid("duration", value, "duration must not be negative"));
    }
    Ok(seconds.trunc() as i64)
}

fn coerce_iterations(value: Option<&str>) -> std::result::Result<i64, WorkloadError> {
    let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
        return Ok(UNSET);
    };

    let iterations = value
        .trim()
        .parse::<i64>()
        .map_err(|e| invalid("iterations", value, e))?;
    if iterations < 0 {
        return Err(invalid("iterations", value, "iterations must not be negative"));
    }
    Ok(iterations)
}

impl TryFrom<ProfileXml> for Profile {
    type Error = WorkloadError;

    fn try_from(xml: ProfileXml) -> std::result::Result<Self, Self::Error> {
        let mut groups = Vec::with_capacity(xml.groups.len());

        for group in xml.groups {
            let mut transactions = Vec::with_capacity(group.transactions.len());
            for txn in group.transactions {
                transactions.push(Transaction {
                    duration_seconds: coerce_duration(txn.duration.as_deref())?,
                    iterations: coerce_iterations(txn.iterations.as_deref())?,
                    flowops: txn
                        .flowops
                        .into_iter()
                        .map(|op| FlowOp {
                            kind: op.kind,
                            options: op.options,
                        })
                        .collect(),
                });
            }

            groups.push(Group {
                thread_count: coerce_thread_count(&group.nthreads)?,
                transactions,
            });
        }

        Ok(Profile {
            name: xml.name,
            groups,
        })
    }
}

/// Decode an already-substituted workload document
pub fn decode_profile(bytes: &[u8]) -> std::result::Result<Profile, WorkloadError> {
    let text = std::str::from_utf8(bytes)?;
    let xml: ProfileXml = quick_xml::de::from_str(text)?;
    Profile::try_from(xml)
}

/// A workload file after substitution and decoding
#[derive(Debug, Clone)]
pub struct Workload {
    pub path: PathBuf,
    /// File contents with environment tokens resolved
    pub text: String,
    pub profile: Profile,
}

/// Read, substitute and decode a workload file
pub fn load_workload(path: &Path) -> Result<Workload> {
    let raw = std::fs::read(path)
        .with_context(|| format!("Failed to read workload file: {}", path.display()))?;

    let substituted = substitute_env(&raw).with_context(|| {
        format!("Failed to resolve environment variables in workload file: {}", path.display())
    })?;

    let profile = decode_profile(&substituted)
        .with_context(|| format!("Failed to parse workload file: {}", path.display()))?;

    let text = String::from_utf8_lossy(&substituted).into_owned();
    Ok(Workload {
        path: path.to_path_buf(),
        text,
        profile,
    })
}

/// Read, substitute and decode a workload file, keeping only the profile
pub fn load_profile(path: &Path) -> Result<Profile> {
    load_workload(path).map(|workload| workload.profile)
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} groups)", self.name, self.groups.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const IPERF: &str = include_str!("testdata/iperf.xml");
    const IPERF_SUBSTITUTED: &str = include_str!("testdata/iperf_substituted.xml");
    const VOIP_RX: &str = include_str!("testdata/voip_rx.xml");

    fn test_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("h", "127.0.0.1"),
            ("h2", "myhost.custom"),
            ("proto", "tcp"),
            ("nthr", "10"),
        ])
    }

    fn lookup(name: &str) -> Option<String> {
        test_env().get(name).map(|v| v.to_string())
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_substitute_env_resolves_all_tokens() {
        let out = substitute_env_with(IPERF.as_bytes(), lookup).unwrap();
        assert_eq!(std::str::from_utf8(&out).unwrap(), IPERF_SUBSTITUTED);
    }

    #[test]
    fn test_substitute_env_prefers_longer_names() {
        let out = substitute_env_with(VOIP_RX.as_bytes(), lookup).unwrap();
        let text = std::str::from_utf8(&out).unwrap();

        assert!(text.contains("remotehost=127.0.0.1 protocol=udp"));
        assert!(text.contains("remotehost=myhost.custom"));
        assert!(!text.contains("127.0.0.12"));
        assert!(!text.contains('$'));
    }

    #[test]
    fn test_substitute_env_inserts_values_literally() {
        let env = HashMap::from([("h2", "pre$h"), ("h", "H")]);
        let out = substitute_env_with(b"a=$h2 b=$h", |name| env.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(&*out, b"a=pre$h b=H");
    }

    #[test]
    fn test_substitute_env_is_idempotent() {
        let once = substitute_env_with(IPERF.as_bytes(), lookup).unwrap().into_owned();
        let twice = substitute_env_with(&once, no_env).unwrap();

        assert!(matches!(twice, Cow::Borrowed(_)));
        assert_eq!(twice.as_ref(), once.as_slice());
    }

    #[test]
    fn test_substitute_env_undefined_variable() {
        let partial = |name: &str| if name == "h" { Some("127.0.0.1".to_string()) } else { None };
        let err = substitute_env_with(IPERF.as_bytes(), partial).unwrap_err();

        match err {
            WorkloadError::UndefinedVariable { name } => assert_eq!(name, "proto"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_substitute_env_without_tokens_borrows() {
        let raw = b"<profile name=\"plain\"/>";
        let out = substitute_env_with(raw, no_env).unwrap();
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn test_decode_iperf_profile() {
        let profile = decode_profile(IPERF_SUBSTITUTED.as_bytes()).unwrap();

        assert_eq!(profile.name, "iPERF");
        assert_eq!(profile.groups.len(), 1);

        let group = &profile.groups[0];
        assert_eq!(group.thread_count, 10);
        assert_eq!(group.transactions.len(), 3);

        let connect = &group.transactions[0];
        assert_eq!(connect.iterations, 1);
        assert_eq!(connect.duration_seconds, UNSET);
        assert_eq!(connect.duration(), None);
        assert_eq!(connect.flowops[0].kind, "connect");

        let write = &group.transactions[1];
        assert_eq!(write.duration_seconds, 30);
        assert_eq!(write.iterations, UNSET);
        assert_eq!(write.iterations_opt(), None);
        assert_eq!(write.duration(), Some(30));
        assert_eq!(write.flowops[0].options, "count=10 size=8k");

        let disconnect = &group.transactions[2];
        assert_eq!(disconnect.flowops[0].kind, "disconnect");
        assert_eq!(disconnect.flowops[0].options, "");
    }

    #[test]
    fn test_decode_voip_profile_multiline_options() {
        let substituted = substitute_env_with(VOIP_RX.as_bytes(), lookup).unwrap();
        let profile = decode_profile(&substituted).unwrap();

        assert_eq!(profile.name, "VoIP Rx");
        assert_eq!(profile.groups.len(), 2);
        assert!(profile.groups.iter().all(|g| g.thread_count == 200));
        assert_eq!(profile.groups[1].transactions[1].duration_seconds, 120);

        let options = profile.groups[1].transactions[0].flowops[0].parse_options().unwrap();
        assert_eq!(options["remotehost"], "myhost.custom");
        assert_eq!(options["protocol"], "udp");
    }

    #[test]
    fn test_decode_rejects_bad_attributes() {
        let err = decode_profile(br#"<profile name="x"><group nthreads="many"/></profile>"#).unwrap_err();
        assert!(matches!(err, WorkloadError::InvalidAttribute { attribute: "nthreads", .. }));

        let err = decode_profile(
            br#"<profile name="x"><group nthreads="1"><transaction duration="30parsecs"/></group></profile>"#,
        )
        .unwrap_err();
        assert!(matches!(err, WorkloadError::InvalidAttribute { attribute: "duration", .. }));

        let err = decode_profile(
            br#"<profile name="x"><group nthreads="1"><transaction iterations="-3"/></group></profile>"#,
        )
        .unwrap_err();
        assert!(matches!(err, WorkloadError::InvalidAttribute { attribute: "iterations", .. }));

        assert!(matches!(decode_profile(b"<profile"), Err(WorkloadError::Xml(_))));
        assert!(matches!(decode_profile(&[0xff, 0xfe]), Err(WorkloadError::Encoding(_))));
    }

    #[test]
    fn test_parse_flow_op_options() {
        let options = parse_flow_op_options("remotehost=127.0.0.1  protocol=tcp wndsz=50k").unwrap();
        assert_eq!(options.len(), 3);
        assert_eq!(options["wndsz"], "50k");

        assert!(parse_flow_op_options("").unwrap().is_empty());

        let err = parse_flow_op_options("remotehost=127.0.0.1 tcp_nodelay").unwrap_err();
        assert_eq!(err.token, "tcp_nodelay");
        assert!(parse_flow_op_options("a=b=c").is_err());
    }

    #[test]
    fn test_load_profile_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(IPERF_SUBSTITUTED.as_bytes()).unwrap();

        let workload = load_workload(file.path()).unwrap();
        assert_eq!(workload.profile.name, "iPERF");
        assert_eq!(workload.text, IPERF_SUBSTITUTED);
        assert_eq!(load_profile(file.path()).unwrap(), workload.profile);
    }

    #[test]
    fn test_load_profile_missing_file() {
        let err = load_profile(Path::new("/nonexistent/workload.xml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/workload.xml"));
    }
}
