//! Guest OS classification by marker files.

use crate::runtime::HostRuntime;
use steward_common::OsFamily;
use tracing::debug;

/// Probe markers in fixed order; first present marker wins.
///
/// Existence checks only. A probe that cannot run counts as "absent".
pub async fn classify(host: &dyn HostRuntime, vmid: u32) -> OsFamily {
    for (os, marker) in OsFamily::MARKERS.iter() {
        let argv = vec!["test".to_string(), "-e".to_string(), marker.to_string()];
        match host.exec(vmid, &argv).await {
            Ok(output) if output.success() => {
                debug!("Container {} has {}, classified {}", vmid, marker, os);
                return *os;
            }
            Ok(_) => debug!("Container {}: {} absent", vmid, marker),
            Err(e) => debug!("Container {}: probe for {} failed: {:#}", vmid, marker, e),
        }
    }

    OsFamily::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeHostBuilder;

    #[tokio::test]
    async fn test_first_match_wins() {
        let host = FakeHostBuilder::new()
            .marker(101, "/etc/alpine-release")
            .marker(101, "/etc/debian_version")
            .build();
        assert_eq!(classify(&host, 101).await, OsFamily::Debian);
        // Stops after the first hit
        assert_eq!(host.calls_matching("exec 101").len(), 1);
    }

    #[tokio::test]
    async fn test_each_family() {
        let host = FakeHostBuilder::new()
            .marker(1, "/etc/alpine-release")
            .marker(2, "/etc/arch-release")
            .marker(3, "/etc/fedora-release")
            .build();
        assert_eq!(classify(&host, 1).await, OsFamily::Alpine);
        assert_eq!(classify(&host, 2).await, OsFamily::Arch);
        assert_eq!(classify(&host, 3).await, OsFamily::Fedora);
        assert_eq!(classify(&host, 4).await, OsFamily::Unknown);
    }

    #[tokio::test]
    async fn test_probe_errors_are_absent() {
        let host = FakeHostBuilder::new()
            .marker(5, "/etc/debian_version")
            .exec_error(5)
            .build();
        assert_eq!(classify(&host, 5).await, OsFamily::Unknown);
        // every marker was still tried
        assert_eq!(host.calls_matching("exec 5").len(), 4);
    }
}
