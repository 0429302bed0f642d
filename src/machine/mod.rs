use std::process::Command;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

const EC2_IDENTITY_URL: &str = "http://169.254.169.254/latest/dynamic/instance-identity/document";
const EC2_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Snapshot of the machine a hive run executes on, attached verbatim to the
/// run document and to every persisted message. Probed once at startup;
/// read-only thereafter. Every probe is best-effort.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineMeta {
    pub hostname: String,
    pub os: String,
    pub arch: String,
    pub lsb_release: LsbRelease,
    pub uname: Uname,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws_ec2: Option<Ec2IdentityDocument>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LsbRelease {
    pub id: String,
    pub description: String,
    pub release: String,
    pub codename: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Uname {
    pub kernel_name: String,
    pub node_name: String,
    pub kernel_release: String,
    pub kernel_version: String,
    pub machine: String,
    pub processor: String,
    pub hardware_platform: String,
    pub operating_system: String,
}

/// The subset of the EC2 instance-identity document worth keeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ec2IdentityDocument {
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub availability_zone: String,
    #[serde(default)]
    pub image_id: String,
    #[serde(default)]
    pub instance_id: String,
    #[serde(default)]
    pub instance_type: String,
    #[serde(default)]
    pub private_ip: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub version: String,
}

impl MachineMeta {
    /// Full snapshot, including the EC2 identity probe. Off AWS the probe
    /// fails fast against the link-local address.
    pub fn snapshot() -> Self {
        let mut meta = Self::probe_local();
        meta.aws_ec2 = probe_ec2_identity();
        meta
    }

    /// Everything that can be probed without touching the network.
    pub fn probe_local() -> Self {
        let hostname = nix::unistd::gethostname()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            hostname,
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            lsb_release: LsbRelease {
                id: command_stdout("lsb_release", &["-i"]),
                description: command_stdout("lsb_release", &["--description"]),
                release: command_stdout("lsb_release", &["--release"]),
                codename: command_stdout("lsb_release", &["--codename"]),
            },
            uname: Uname {
                kernel_name: command_stdout("uname", &["--kernel-name"]),
                node_name: command_stdout("uname", &["--nodename"]),
                kernel_release: command_stdout("uname", &["--kernel-release"]),
                kernel_version: command_stdout("uname", &["--kernel-version"]),
                machine: command_stdout("uname", &["--machine"]),
                processor: command_stdout("uname", &["--processor"]),
                hardware_platform: command_stdout("uname", &["--hardware-platform"]),
                operating_system: command_stdout("uname", &["--operating-system"]),
            },
            aws_ec2: None,
        }
    }
}

fn command_stdout(program: &str, args: &[&str]) -> String {
    match Command::new(program).args(args).output() {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        }
        _ => String::new(),
    }
}

fn probe_ec2_identity() -> Option<Ec2IdentityDocument> {
    let client = reqwest::blocking::Client::builder()
        .timeout(EC2_PROBE_TIMEOUT)
        .build()
        .ok()?;

    let response = client
        .get(EC2_IDENTITY_URL)
        .send()
        .map_err(|err| debug!("EC2 identity endpoint unreachable, probably not on AWS: {err}"))
        .ok()?;

    if !response.status().is_success() {
        debug!(
            status = %response.status(),
            "EC2 identity endpoint answered with a non-success status"
        );
        return None;
    }

    response
        .json::<Ec2IdentityDocument>()
        .map_err(|err| debug!("cannot parse EC2 identity document: {err}"))
        .ok()
}
