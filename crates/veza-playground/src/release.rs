//! Release-asset selection for the download link: detect the host target,
//! fetch the latest release listing, and pick the first asset whose name
//! matches both the platform and the architecture.

use std::io::Read;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use serde::Deserialize;

#[derive(Args, Debug)]
pub struct DownloadUrlArgs {
    /// GitHub `owner/name` to query for the latest release.
    #[arg(long, default_value = "veza-lang/veza")]
    repo: String,

    /// Override the release API endpoint (mirrors, tests).
    #[arg(long)]
    api_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Release {
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostTarget {
    pub os: String,
    pub arch: String,
}

/// Canonical normalization for asset matching: trimmed and lowercased, with
/// the `x86-64` spelling folded into `x86_64`.
pub fn normalize_component(raw: &str) -> String {
    let lower = raw.trim().to_ascii_lowercase();
    if lower == "x86-64" {
        "x86_64".to_string()
    } else {
        lower
    }
}

pub fn detect_host() -> HostTarget {
    HostTarget {
        os: normalize_component(std::env::consts::OS),
        arch: normalize_component(std::env::consts::ARCH),
    }
}

/// First asset whose name contains both target substrings. Names are
/// lowercased before matching so case drift in release artifacts cannot
/// break selection.
pub fn select_asset<'a>(
    target: &HostTarget,
    assets: &'a [ReleaseAsset],
) -> Option<&'a ReleaseAsset> {
    assets.iter().find(|asset| {
        let name = asset.name.to_ascii_lowercase();
        name.contains(&target.os) && name.contains(&target.arch)
    })
}

pub fn fetch_latest_release(api_url: &str) -> Result<Release> {
    let resp = ureq::get(api_url)
        // GitHub's API rejects requests without a user agent.
        .header("User-Agent", "veza-playground")
        .call()
        .map_err(|e| anyhow::anyhow!("http GET {api_url}: {e}"))?;
    let mut reader = resp.into_body().into_reader();
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .context("read release response")?;
    serde_json::from_slice(&buf).context("parse release JSON")
}

pub fn cmd_download_url(args: DownloadUrlArgs) -> Result<ExitCode> {
    let api_url = match &args.api_url {
        Some(url) => url.clone(),
        None => format!(
            "https://api.github.com/repos/{}/releases/latest",
            args.repo
        ),
    };
    let target = detect_host();
    let release = fetch_latest_release(&api_url)?;
    match select_asset(&target, &release.assets) {
        Some(asset) => {
            println!("{}", asset.browser_download_url);
            Ok(ExitCode::SUCCESS)
        }
        None => anyhow::bail!(
            "no release asset matches os={} arch={} (assets: {})",
            target.os,
            target.arch,
            release
                .assets
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(name: &str) -> ReleaseAsset {
        ReleaseAsset {
            name: name.to_string(),
            browser_download_url: format!("https://example.org/dl/{name}"),
        }
    }

    #[test]
    fn normalization_is_lowercase_with_x86_64_folded() {
        assert_eq!(normalize_component("Windows"), "windows");
        assert_eq!(normalize_component("x86-64"), "x86_64");
        assert_eq!(normalize_component("X86-64"), "x86_64");
        assert_eq!(normalize_component("aarch64"), "aarch64");
        assert_eq!(normalize_component("  Linux "), "linux");
    }

    #[test]
    fn selection_needs_both_substrings() {
        let target = HostTarget {
            os: "linux".to_string(),
            arch: "x86_64".to_string(),
        };
        let assets = vec![
            asset("veza-0.3.0-macos-x86_64.tar.gz"),
            asset("veza-0.3.0-linux-aarch64.tar.gz"),
            asset("veza-0.3.0-linux-x86_64.tar.gz"),
        ];
        let hit = select_asset(&target, &assets).expect("match");
        assert_eq!(hit.name, "veza-0.3.0-linux-x86_64.tar.gz");
    }

    #[test]
    fn selection_takes_the_first_match_ignoring_case() {
        let target = HostTarget {
            os: "windows".to_string(),
            arch: "x86_64".to_string(),
        };
        let assets = vec![
            asset("Veza-0.3.0-Windows-X86_64.zip"),
            asset("veza-0.3.0-windows-x86_64-portable.zip"),
        ];
        let hit = select_asset(&target, &assets).expect("match");
        assert_eq!(hit.name, "Veza-0.3.0-Windows-X86_64.zip");
    }

    #[test]
    fn no_match_is_none() {
        let target = HostTarget {
            os: "linux".to_string(),
            arch: "riscv64".to_string(),
        };
        let assets = vec![asset("veza-0.3.0-linux-x86_64.tar.gz")];
        assert!(select_asset(&target, &assets).is_none());
    }

    #[test]
    fn release_json_parses_the_github_shape() {
        let body = r#"{
            "tag_name": "v0.3.0",
            "assets": [
                {
                    "name": "veza-0.3.0-linux-x86_64.tar.gz",
                    "browser_download_url": "https://example.org/dl/veza.tar.gz",
                    "size": 123456
                }
            ]
        }"#;
        let release: Release = serde_json::from_str(body).expect("parse");
        assert_eq!(release.assets.len(), 1);
        assert_eq!(
            release.assets[0].browser_download_url,
            "https://example.org/dl/veza.tar.gz"
        );
    }

    #[test]
    fn detect_host_is_already_normalized() {
        let target = detect_host();
        assert_eq!(target.os, normalize_component(&target.os));
        assert_eq!(target.arch, normalize_component(&target.arch));
    }
}
