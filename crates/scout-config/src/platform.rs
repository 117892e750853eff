//! Platform (core agent binary variant) detection.
//!
//! `detect_triple` is a pure function of the compiling target: the arch/OS
//! combination baked into the binary at compile time, not anything sampled at
//! runtime. This keeps it deterministic per host, which is the property the
//! Derived config source and the [`crate`]-level tests rely on.

use std::fmt;

/// Closed set of supported `{arch}-{platform}` triples for the core agent
/// binary, plus an `unknown-*` catch-all.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Triple {
    /// `x86_64-linux-gnu`
    X86_64LinuxGnu,
    /// `x86_64-linux-musl`
    X86_64LinuxMusl,
    /// `x86_64-darwin`
    X86_64Darwin,
    /// `i686-linux-gnu`
    I686LinuxGnu,
    /// `i686-linux-musl`
    I686LinuxMusl,
    /// `i686-darwin`
    I686Darwin,
    /// Arch or platform outside the enumerated set. Carries the best-effort
    /// `{arch}-{platform}` string that was actually detected.
    Unknown(String),
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X86_64LinuxGnu => f.write_str("x86_64-linux-gnu"),
            Self::X86_64LinuxMusl => f.write_str("x86_64-linux-musl"),
            Self::X86_64Darwin => f.write_str("x86_64-darwin"),
            Self::I686LinuxGnu => f.write_str("i686-linux-gnu"),
            Self::I686LinuxMusl => f.write_str("i686-linux-musl"),
            Self::I686Darwin => f.write_str("i686-darwin"),
            Self::Unknown(s) => write!(f, "unknown-{s}"),
        }
    }
}

fn detect_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "x86_64",
        "x86" => "i686",
        _ => "unknown",
    }
}

fn detect_platform() -> &'static str {
    if cfg!(target_os = "macos") {
        "darwin"
    } else if cfg!(target_os = "linux") {
        if cfg!(target_env = "musl") {
            "linux-musl"
        } else {
            "linux-gnu"
        }
    } else {
        "unknown"
    }
}

/// Detect the `{arch}-{platform}` triple selecting the core agent binary
/// variant for this host.
pub fn detect_triple() -> Triple {
    match (detect_arch(), detect_platform()) {
        ("x86_64", "linux-gnu") => Triple::X86_64LinuxGnu,
        ("x86_64", "linux-musl") => Triple::X86_64LinuxMusl,
        ("x86_64", "darwin") => Triple::X86_64Darwin,
        ("i686", "linux-gnu") => Triple::I686LinuxGnu,
        ("i686", "linux-musl") => Triple::I686LinuxMusl,
        ("i686", "darwin") => Triple::I686Darwin,
        (arch, platform) => Triple::Unknown(format!("{arch}-{platform}")),
    }
}

/// Parse a triple string back into the closed set, validating both halves
/// belong to the enumerated arch/platform sets.
///
/// Splits on the *first* `-`; the remainder (which may itself contain `-`,
/// e.g. `linux-gnu`) is the platform half.
pub fn parse_triple(s: &str) -> Triple {
    match s.split_once('-') {
        Some(("x86_64", "linux-gnu")) => Triple::X86_64LinuxGnu,
        Some(("x86_64", "linux-musl")) => Triple::X86_64LinuxMusl,
        Some(("x86_64", "darwin")) => Triple::X86_64Darwin,
        Some(("i686", "linux-gnu")) => Triple::I686LinuxGnu,
        Some(("i686", "linux-musl")) => Triple::I686LinuxMusl,
        Some(("i686", "darwin")) => Triple::I686Darwin,
        Some((arch, platform)) => Triple::Unknown(format!("{arch}-{platform}")),
        None => Triple::Unknown(s.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_triple_is_deterministic() {
        let a = detect_triple();
        let b = detect_triple();
        assert_eq!(a, b);
    }

    #[test]
    fn detect_triple_is_enumerated_or_unknown_prefixed() {
        let t = detect_triple().to_string();
        let known = [
            "x86_64-linux-gnu",
            "x86_64-linux-musl",
            "x86_64-darwin",
            "i686-linux-gnu",
            "i686-linux-musl",
            "i686-darwin",
        ];
        assert!(known.contains(&t.as_str()) || t.starts_with("unknown-"));
    }

    #[test]
    fn parse_triple_round_trips_known_values() {
        for s in [
            "x86_64-linux-gnu",
            "x86_64-linux-musl",
            "x86_64-darwin",
            "i686-linux-gnu",
            "i686-linux-musl",
            "i686-darwin",
        ] {
            assert_eq!(parse_triple(s).to_string(), s);
        }
    }

    #[test]
    fn parse_triple_unknown_arch_is_unknown_prefixed() {
        let t = parse_triple("arm64-linux-gnu");
        assert!(t.to_string().starts_with("unknown-"));
    }

    #[test]
    fn parse_triple_no_dash_is_unknown() {
        let t = parse_triple("garbage");
        assert_eq!(t.to_string(), "unknown-garbage");
    }
}
