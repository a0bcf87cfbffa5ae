//! CLI argument parsing tests for the ip command.
//!
//! These tests only take help and error paths, so they need neither
//! network access nor root privileges.

use assert_cmd::Command;
use predicates::prelude::*;

fn ip_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_ip"))
}

mod global_flags {
    use super::*;

    #[test]
    fn test_clap_help() {
        ip_cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Network configuration tool"));
    }

    #[test]
    fn test_version() {
        ip_cmd()
            .arg("-V")
            .assert()
            .success()
            .stdout(predicate::str::contains("ip"));
    }

    #[test]
    fn test_mpls_rejected() {
        ip_cmd()
            .args(["-M", "link"])
            .assert()
            .failure()
            .code(1)
            .stderr(predicate::str::contains(
                "ip: protocol family MPLS is not yet supported",
            ));
    }

    #[test]
    fn test_bridge_family_rejected() {
        ip_cmd()
            .args(["-family", "bridge", "link"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("protocol family bridge is not yet supported"));
    }

    #[test]
    fn test_unknown_family() {
        ip_cmd()
            .args(["-f", "ipx", "link"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid family ipx"));
    }

    #[test]
    fn test_resolve_rejected() {
        ip_cmd()
            .args(["-r", "route"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("resolving DNS names is unsupported"));
    }

    #[test]
    fn test_color_rejected() {
        ip_cmd()
            .args(["-color", "link"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("color output is unsupported"));
    }

    #[test]
    fn test_bad_rcvbuf() {
        ip_cmd()
            .args(["-rc", "lots", "link"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("failed to parse rcvbuf flag"));
    }

    #[test]
    fn test_missing_namespace() {
        ip_cmd()
            .args(["-n", "ipcmd-test-no-such-ns", "link"])
            .assert()
            .failure()
            .stderr(predicate::str::contains(
                "failed to find network namespace \"ipcmd-test-no-such-ns\"",
            ));
    }
}

mod help {
    use super::*;

    #[test]
    fn test_global_help() {
        ip_cmd()
            .arg("help")
            .assert()
            .success()
            .stdout(predicate::str::starts_with("Usage: ip [ OPTIONS ] OBJECT"));
    }

    #[test]
    fn test_object_help() {
        for (object, usage) in [
            ("address", "Usage: ip address"),
            ("link", "Usage: ip link"),
            ("route", "Usage: ip route"),
            ("neigh", "Usage: ip neigh"),
            ("tunnel", "Usage: ip tunnel"),
            ("tuntap", "Usage: ip tuntap"),
            ("vrf", "Usage: ip vrf"),
            ("monitor", "Usage: ip monitor"),
            ("tcp_metrics", "Usage: ip tcp_metrics help"),
        ] {
            ip_cmd()
                .args([object, "help"])
                .assert()
                .success()
                .stdout(predicate::str::starts_with(usage));
        }
    }

    #[test]
    fn test_prefix_object_help() {
        ip_cmd()
            .args(["r", "help"])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("Usage: ip route"));
    }

    #[test]
    fn test_xfrm_help() {
        ip_cmd()
            .args(["xfrm", "monitor", "help"])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("Usage: ip xfrm monitor"));
    }

    #[test]
    fn test_flags_before_help() {
        ip_cmd()
            .args(["-4", "-br", "-json", "link", "help"])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("Usage: ip link"));
    }
}

mod usage_errors {
    use super::*;

    #[test]
    fn test_unknown_object() {
        ip_cmd()
            .arg("bogus")
            .assert()
            .failure()
            .code(1)
            .stderr(predicate::str::contains(
                "this was not understood, 'bogus'",
            ));
    }

    #[test]
    fn test_ambiguous_object() {
        ip_cmd()
            .arg("t")
            .assert()
            .failure()
            .stderr(predicate::str::contains("only options are"));
    }

    #[test]
    fn test_xfrm_needs_object() {
        ip_cmd()
            .arg("xfrm")
            .assert()
            .failure()
            .stderr(predicate::str::contains("expected"));
    }

    #[test]
    fn test_tcp_metrics_only_help() {
        ip_cmd()
            .args(["tcp_metrics", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("this was not understood, 'show'"));
    }

    #[test]
    fn test_unknown_route_subcommand() {
        ip_cmd()
            .args(["route", "frobnicate"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("'frobnicate'"));
    }

    #[test]
    fn test_route_needs_dev_or_gateway() {
        ip_cmd()
            .args(["route", "add", "10.0.0.0/8"])
            .assert()
            .failure()
            .stderr(predicate::str::contains(
                "a unicast route needs a device or a gateway",
            ));
    }
}
