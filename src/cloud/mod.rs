use std::io::Write;

use anyhow::Result;

use crate::core::{BucketGrant, Instance, IpPermission, SecurityGroup};

mod aws;

pub use aws::AwsCli;

pub const OPEN_IPV4: &str = "0.0.0.0/0";
pub const OPEN_IPV6: &str = "::/0";

const ALL_USERS_MARKER: &str = "AllUsers";

/// The management-API calls the exposure scan needs. Each call covers one
/// resource so failures stay per-resource.
pub trait CloudApi {
    fn describe_instances(&self) -> Result<Vec<Instance>>;
    fn describe_security_groups(&self, group_id: &str) -> Result<Vec<SecurityGroup>>;
    fn list_buckets(&self) -> Result<Vec<String>>;
    fn bucket_acl(&self, bucket: &str) -> Result<Vec<BucketGrant>>;
    fn list_users(&self) -> Result<Vec<String>>;
    fn attached_user_policies(&self, user: &str) -> Result<Vec<String>>;
}

/// Probes a public address and returns the line to report.
pub type PortProbe<'a> = &'a mut dyn FnMut(&str) -> String;

pub fn scan_all<A, W>(api: &A, out: &mut W, probe: Option<PortProbe<'_>>)
where
    A: CloudApi + ?Sized,
    W: Write,
{
    let _ = writeln!(out, "=== AWS Pentest Scanner ===");
    let _ = writeln!(out);
    scan_ec2(api, out, probe);
    scan_s3(api, out);
    scan_iam(api, out);
}

pub fn scan_ec2<A, W>(api: &A, out: &mut W, mut probe: Option<PortProbe<'_>>)
where
    A: CloudApi + ?Sized,
    W: Write,
{
    let _ = writeln!(out, "[+] Scanning EC2 Instances...");
    let instances = match api.describe_instances() {
        Ok(instances) => instances,
        Err(err) => {
            tracing::warn!("describe instances failed: {err:#}");
            let _ = writeln!(out, "[!] EC2 Error: {err:#}");
            return;
        }
    };

    for instance in &instances {
        let _ = writeln!(out, "  - Instance ID: {}", instance.instance_id);
        let _ = writeln!(
            out,
            "    Public IP: {}",
            instance.public_ip.as_deref().unwrap_or("None")
        );
        if let (Some(ip), Some(probe)) = (instance.public_ip.as_deref(), probe.as_deref_mut()) {
            let _ = writeln!(out, "    [NMAP] Scanning {ip} for open ports...");
            let _ = writeln!(out, "    {}", probe(ip));
        }
        check_security_groups(api, out, &instance.security_group_ids);
    }
}

pub fn check_security_groups<A, W>(api: &A, out: &mut W, group_ids: &[String])
where
    A: CloudApi + ?Sized,
    W: Write,
{
    for group_id in group_ids {
        match api.describe_security_groups(group_id) {
            Ok(groups) => {
                for group in &groups {
                    for line in insecure_rule_lines(group) {
                        let _ = writeln!(out, "    ⚠️  {line}");
                    }
                }
            }
            Err(err) => {
                tracing::warn!(group_id, "describe security group failed: {err:#}");
                let _ = writeln!(out, "    [!] Security group {group_id} error: {err:#}");
            }
        }
    }
}

/// One line per inbound rule range open to every address.
pub fn insecure_rule_lines(group: &SecurityGroup) -> Vec<String> {
    let mut lines = Vec::new();
    for perm in &group.ip_permissions {
        let open_v4 = perm
            .ip_ranges
            .iter()
            .filter(|r| r.cidr_ip.as_deref() == Some(OPEN_IPV4))
            .count();
        let open_v6 = perm
            .ipv6_ranges
            .iter()
            .filter(|r| r.cidr_ipv6.as_deref() == Some(OPEN_IPV6))
            .count();
        for _ in 0..open_v4 + open_v6 {
            lines.push(format!(
                "Insecure SG: {} ({}) exposes port(s) {} to the world",
                group.group_name,
                group.group_id,
                format_ports(perm)
            ));
        }
    }
    lines
}

fn format_ports(perm: &IpPermission) -> String {
    match (perm.from_port, perm.to_port) {
        (Some(from), _) if from < 0 => "all".to_string(),
        (Some(from), Some(to)) if to > from => format!("{from}-{to}"),
        (Some(from), _) => from.to_string(),
        (None, _) => "all".to_string(),
    }
}

pub fn scan_s3<A, W>(api: &A, out: &mut W)
where
    A: CloudApi + ?Sized,
    W: Write,
{
    let _ = writeln!(out, "[+] Scanning S3 Buckets...");
    let buckets = match api.list_buckets() {
        Ok(buckets) => buckets,
        Err(err) => {
            tracing::warn!("list buckets failed: {err:#}");
            let _ = writeln!(out, "  [!] S3 Error: {err:#}");
            return;
        }
    };

    for name in &buckets {
        match api.bucket_acl(name) {
            Ok(grants) => {
                let public = public_permissions(&grants);
                if !public.is_empty() {
                    let _ = writeln!(
                        out,
                        "  ⚠️  Public bucket found: {name} ({})",
                        public.join(", ")
                    );
                }
            }
            Err(err) => {
                tracing::warn!(bucket = name.as_str(), "get bucket acl failed: {err:#}");
                let _ = writeln!(out, "  [!] Error accessing bucket {name}: {err:#}");
            }
        }
    }
}

/// Permissions granted to the "all users" principal, deduplicated.
pub fn public_permissions(grants: &[BucketGrant]) -> Vec<String> {
    let mut perms: Vec<String> = grants
        .iter()
        .filter(|g| g.grantee.contains(ALL_USERS_MARKER))
        .map(|g| g.permission.clone())
        .collect();
    perms.sort();
    perms.dedup();
    perms
}

pub fn scan_iam<A, W>(api: &A, out: &mut W)
where
    A: CloudApi + ?Sized,
    W: Write,
{
    let _ = writeln!(out, "[+] Scanning IAM Users...");
    let users = match api.list_users() {
        Ok(users) => users,
        Err(err) => {
            tracing::warn!("list users failed: {err:#}");
            let _ = writeln!(out, "  [!] IAM Error: {err:#}");
            return;
        }
    };

    for user in &users {
        match api.attached_user_policies(user) {
            Ok(policies) => {
                for policy in &policies {
                    let _ = writeln!(out, "  - User: {user} has attached policy: {policy}");
                }
            }
            Err(err) => {
                tracing::warn!(user = user.as_str(), "list attached policies failed: {err:#}");
                let _ = writeln!(out, "  [!] Error listing policies for {user}: {err:#}");
            }
        }
    }
}

/// First line of `nmap -sS -Pn -T4 <ip>`, or the failure.
pub fn nmap_first_line(ip: &str, timeout: std::time::Duration) -> String {
    match crate::platform::run_command("nmap", &["-sS", "-Pn", "-T4", ip], timeout) {
        Ok(out) => match out.stdout.lines().next() {
            Some(line) => line.to_string(),
            None => format!("[!] Nmap failed: no output (exit code {})", out.exit_code),
        },
        Err(err) => format!("[!] Nmap failed: {err:#}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{IpRange, Ipv6Range};
    use std::collections::HashMap;

    fn group(id: &str, name: &str, perms: Vec<IpPermission>) -> SecurityGroup {
        SecurityGroup {
            group_id: id.to_string(),
            group_name: name.to_string(),
            ip_permissions: perms,
        }
    }

    fn tcp(from: i64, to: i64, cidrs: &[&str]) -> IpPermission {
        IpPermission {
            ip_protocol: Some("tcp".to_string()),
            from_port: Some(from),
            to_port: Some(to),
            ip_ranges: cidrs
                .iter()
                .map(|c| IpRange {
                    cidr_ip: Some(c.to_string()),
                })
                .collect(),
            ipv6_ranges: vec![],
        }
    }

    #[test]
    fn open_world_rule_is_flagged_once_with_port_and_group() {
        let sg = group("sg-abc", "ssh-open", vec![tcp(22, 22, &["0.0.0.0/0"])]);
        let lines = insecure_rule_lines(&sg);
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0],
            "Insecure SG: ssh-open (sg-abc) exposes port(s) 22 to the world"
        );
    }

    #[test]
    fn private_cidr_is_not_flagged() {
        let sg = group("sg-abc", "ssh-open", vec![tcp(22, 22, &["10.0.0.0/8"])]);
        assert!(insecure_rule_lines(&sg).is_empty());
    }

    #[test]
    fn ipv6_any_and_port_ranges_are_reported() {
        let mut perm = tcp(8000, 8080, &[]);
        perm.ipv6_ranges.push(Ipv6Range {
            cidr_ipv6: Some("::/0".to_string()),
        });
        let all = IpPermission {
            ip_protocol: Some("-1".to_string()),
            ip_ranges: vec![IpRange {
                cidr_ip: Some("0.0.0.0/0".to_string()),
            }],
            ..IpPermission::default()
        };
        let sg = group("sg-web", "web", vec![perm, all]);
        let lines = insecure_rule_lines(&sg);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("port(s) 8000-8080"), "lines={lines:?}");
        assert!(lines[1].contains("port(s) all"), "lines={lines:?}");
    }

    #[test]
    fn all_users_grant_marks_bucket_public() {
        let grants = vec![
            BucketGrant {
                grantee: "http://acs.amazonaws.com/groups/global/AllUsers".to_string(),
                permission: "READ".to_string(),
            },
            BucketGrant {
                grantee: "79a59df900b949e55d96a1e698fbacedfd6e09d98eacf8f8d5218e7cd47ef2be"
                    .to_string(),
                permission: "FULL_CONTROL".to_string(),
            },
        ];
        assert_eq!(public_permissions(&grants), vec!["READ"]);
        assert!(public_permissions(&grants[1..]).is_empty());
    }

    #[derive(Default)]
    struct FakeCloud {
        instances: Vec<Instance>,
        groups: HashMap<String, SecurityGroup>,
        buckets: Vec<(String, Result<Vec<BucketGrant>, String>)>,
        users: Vec<(String, Vec<String>)>,
        fail_instances: bool,
    }

    impl CloudApi for FakeCloud {
        fn describe_instances(&self) -> Result<Vec<Instance>> {
            if self.fail_instances {
                anyhow::bail!("UnauthorizedOperation");
            }
            Ok(self.instances.clone())
        }

        fn describe_security_groups(&self, group_id: &str) -> Result<Vec<SecurityGroup>> {
            match self.groups.get(group_id) {
                Some(g) => Ok(vec![g.clone()]),
                None => anyhow::bail!("InvalidGroup.NotFound: {group_id}"),
            }
        }

        fn list_buckets(&self) -> Result<Vec<String>> {
            Ok(self.buckets.iter().map(|(n, _)| n.clone()).collect())
        }

        fn bucket_acl(&self, bucket: &str) -> Result<Vec<BucketGrant>> {
            let (_, acl) = self
                .buckets
                .iter()
                .find(|(n, _)| n == bucket)
                .ok_or_else(|| anyhow::anyhow!("NoSuchBucket"))?;
            acl.clone().map_err(anyhow::Error::msg)
        }

        fn list_users(&self) -> Result<Vec<String>> {
            Ok(self.users.iter().map(|(u, _)| u.clone()).collect())
        }

        fn attached_user_policies(&self, user: &str) -> Result<Vec<String>> {
            Ok(self
                .users
                .iter()
                .find(|(u, _)| u == user)
                .map(|(_, p)| p.clone())
                .unwrap_or_default())
        }
    }

    #[test]
    fn scan_continues_past_per_resource_errors() {
        let mut fake = FakeCloud::default();
        fake.instances = vec![
            Instance {
                instance_id: "i-1".to_string(),
                public_ip: Some("203.0.113.10".to_string()),
                security_group_ids: vec!["sg-missing".to_string(), "sg-abc".to_string()],
            },
            Instance {
                instance_id: "i-2".to_string(),
                public_ip: None,
                security_group_ids: vec![],
            },
        ];
        fake.groups.insert(
            "sg-abc".to_string(),
            group("sg-abc", "ssh-open", vec![tcp(22, 22, &["0.0.0.0/0"])]),
        );
        fake.buckets = vec![
            ("locked".to_string(), Err("AccessDenied".to_string())),
            (
                "site".to_string(),
                Ok(vec![BucketGrant {
                    grantee: "http://acs.amazonaws.com/groups/global/AllUsers".to_string(),
                    permission: "READ".to_string(),
                }]),
            ),
        ];
        fake.users = vec![("alice".to_string(), vec!["AdministratorAccess".to_string()])];

        let mut probed = Vec::new();
        let mut probe = |ip: &str| {
            probed.push(ip.to_string());
            format!("Starting Nmap against {ip}")
        };
        let mut out = Vec::new();
        scan_all(&fake, &mut out, Some(&mut probe));
        let out = String::from_utf8(out).expect("utf8");

        assert_eq!(probed, vec!["203.0.113.10"]);
        assert!(out.contains("    Public IP: None"), "out={out}");
        assert!(out.contains("[!] Security group sg-missing error"), "out={out}");
        assert!(out.contains("Insecure SG: ssh-open (sg-abc) exposes port(s) 22"), "out={out}");
        assert!(out.contains("Instance ID: i-2"), "out={out}");
        assert!(out.contains("[!] Error accessing bucket locked: AccessDenied"), "out={out}");
        assert!(out.contains("Public bucket found: site (READ)"), "out={out}");
        assert!(out.contains("User: alice has attached policy: AdministratorAccess"), "out={out}");
    }

    #[test]
    fn ec2_failure_does_not_stop_s3_and_iam() {
        let fake = FakeCloud {
            fail_instances: true,
            users: vec![("bob".to_string(), vec!["ReadOnlyAccess".to_string()])],
            ..FakeCloud::default()
        };
        let mut out = Vec::new();
        scan_all(&fake, &mut out, None);
        let out = String::from_utf8(out).expect("utf8");
        assert!(out.contains("[!] EC2 Error: UnauthorizedOperation"), "out={out}");
        assert!(out.contains("[+] Scanning S3 Buckets..."), "out={out}");
        assert!(out.contains("User: bob has attached policy: ReadOnlyAccess"), "out={out}");
    }
}
